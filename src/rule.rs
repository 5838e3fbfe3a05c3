use std::{
    cmp::Ordering,
    ops::{Range, RangeInclusive},
    sync::Arc,
};

use {
    anyhow::Context,
    jiff::{
        Span, Zoned,
        civil::{DateTime, Weekday},
        tz::TimeZone,
    },
};

use crate::{frequency::Frequency, iter::RecurrenceIter};

/// An RFC 5545 recurrence rule, bound to its starting point.
///
/// A rule is a declarative description of a (possibly infinite) sequence of
/// datetimes: a base frequency, a starting point (the `DTSTART` of the
/// enclosing component, which also serves as the lower bound of every
/// occurrence), an optional count or "until" bound, an interval, and any
/// number of BY-rules that expand or constrain the sequence. Rules are
/// validated on construction and immutable afterwards; any number of
/// iterators can be created from one rule.
///
/// The RFC 7529 `SKIP` extension is supported for the Gregorian calendar
/// (see [`Skip`]).
#[derive(Clone, Debug)]
pub struct RecurrenceRule {
    pub(crate) inner: Arc<RecurrenceRuleInner>,
}

#[derive(Debug)]
pub(crate) struct RecurrenceRuleInner {
    pub(crate) freq: Frequency,
    pub(crate) zoned_start: Zoned,
    pub(crate) civil_start: DateTime,
    pub(crate) count: Option<u64>,
    pub(crate) zoned_until: Option<Zoned>,
    pub(crate) until_floating: bool,
    pub(crate) interval: i32,
    pub(crate) stride: Span,
    pub(crate) skip: Skip,
    pub(crate) by_month: Box<[i8]>,
    // can be negative
    pub(crate) by_week: Box<[i8]>,
    // can be negative
    pub(crate) by_year_day: Box<[i16]>,
    // can be negative
    pub(crate) by_month_day: Box<[i8]>,
    pub(crate) by_week_day: Box<[ByWeekday]>,
    pub(crate) by_hour: Box<[i8]>,
    pub(crate) by_minute: Box<[i8]>,
    pub(crate) by_second: Box<[i8]>,
    // can be negative
    pub(crate) by_set_pos: Box<[i32]>,
    pub(crate) week_start: Weekday,
}

impl RecurrenceRule {
    /// Returns a builder for constructing a `RecurrenceRule`.
    ///
    /// The frequency and the starting point are the only two things
    /// required to create a rule. The starting point is truncated to whole
    /// seconds, which is the resolution occurrences are generated at.
    pub fn builder(freq: Frequency, start: Zoned) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder::new(freq, start)
    }

    /// Parses an RFC 5545 `RRULE` property value, e.g.
    /// `FREQ=WEEKLY;BYDAY=MO;INTERVAL=2`.
    ///
    /// The starting point is carried separately from the rule text (as
    /// `DTSTART` is in iCalendar), so it must be provided here.
    pub fn parse(value: &str, start: Zoned) -> anyhow::Result<RecurrenceRule> {
        crate::parse::parse(value, start)
    }

    /// Returns an iterator over all datetimes in this recurrence rule.
    ///
    /// Note that the iterator may be "infinite," in the sense that it
    /// returns datetimes all the way up to jiff's supported maximum. Rules
    /// without a count or an "until" bound should be consumed with
    /// `take(N)` or an equivalent cap.
    pub fn iter(&self) -> RecurrenceIter<'_> {
        RecurrenceIter::new(self)
    }

    /// Materializes at most `limit` occurrences into a vector.
    ///
    /// With `limit == 0`, materializes every occurrence until the rule
    /// terminates naturally.
    ///
    /// # Panics
    ///
    /// When `limit == 0` and the rule has neither a count nor an "until"
    /// bound. Such a rule only stops at the end of representable time,
    /// which is never what a caller collecting into memory wants.
    pub fn all(&self, limit: usize) -> Vec<Zoned> {
        if limit == 0 {
            assert!(
                self.inner.count.is_some() || self.inner.zoned_until.is_some(),
                "cannot materialize every occurrence of a recurrence rule \
                 with no count and no 'until' time",
            );
            self.iter().collect()
        } else {
            self.iter().take(limit).collect()
        }
    }

    /// Returns the time zone that datetimes emitted by this rule should be
    /// in.
    pub(crate) fn time_zone(&self) -> &TimeZone {
        self.inner.zoned_start.time_zone()
    }
}

impl<'r> IntoIterator for &'r RecurrenceRule {
    type IntoIter = RecurrenceIter<'r>;
    type Item = Zoned;

    fn into_iter(self) -> RecurrenceIter<'r> {
        self.iter()
    }
}

impl PartialEq for RecurrenceRule {
    fn eq(&self, rhs: &RecurrenceRule) -> bool {
        let (lhs, rhs) = (&*self.inner, &*rhs.inner);
        // A floating "until" is a wall-clock bound, so it compares by its
        // civil fields. An absolute one compares by instant.
        let until_eq = lhs.until_floating == rhs.until_floating
            && match (&lhs.zoned_until, &rhs.zoned_until) {
                (None, None) => true,
                (Some(lhs_until), Some(rhs_until)) if lhs.until_floating => {
                    lhs_until.datetime() == rhs_until.datetime()
                }
                (Some(lhs_until), Some(rhs_until)) => lhs_until == rhs_until,
                _ => false,
            };
        lhs.freq == rhs.freq
            && lhs.zoned_start == rhs.zoned_start
            && lhs.count == rhs.count
            && until_eq
            && lhs.interval == rhs.interval
            && lhs.skip == rhs.skip
            && lhs.by_month == rhs.by_month
            && lhs.by_week == rhs.by_week
            && lhs.by_year_day == rhs.by_year_day
            && lhs.by_month_day == rhs.by_month_day
            && lhs.by_week_day == rhs.by_week_day
            && lhs.by_hour == rhs.by_hour
            && lhs.by_minute == rhs.by_minute
            && lhs.by_second == rhs.by_second
            && lhs.by_set_pos == rhs.by_set_pos
            && lhs.week_start == rhs.week_start
    }
}

impl Eq for RecurrenceRule {}

/// The RFC 7529 policy for occurrences whose resolved date does not exist,
/// like February 30 or day 366 of a common year.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Skip {
    /// Drop the occurrence. This is the default, and what plain RFC 5545
    /// prescribes.
    #[default]
    Omit,
    /// Move the occurrence back to the closest day that exists (February 30
    /// becomes February 28, or 29 in a leap year).
    Backward,
    /// Move the occurrence forward, carrying the overflow past the end of
    /// the month or year (February 30 becomes March 1 in a leap year and
    /// March 2 otherwise).
    Forward,
}

impl Skip {
    /// Returns the RFC 7529 token for this policy.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Skip::Omit => "OMIT",
            Skip::Backward => "BACKWARD",
            Skip::Forward => "FORWARD",
        }
    }
}

impl std::str::FromStr for Skip {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Skip> {
        match &*s.to_uppercase() {
            "OMIT" => Ok(Skip::Omit),
            "BACKWARD" => Ok(Skip::Backward),
            "FORWARD" => Ok(Skip::Forward),
            unk => anyhow::bail!("unrecognized skip policy: `{unk}`"),
        }
    }
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A builder for constructing a valid recurrence rule.
///
/// All of the `by_*` methods accumulate: calling one twice extends the
/// rule's list rather than replacing it. Values are sorted and deduplicated
/// when the rule is built.
#[derive(Clone, Debug)]
pub struct RecurrenceRuleBuilder {
    freq: Frequency,
    start: Zoned,
    count: Option<u64>,
    until: Option<Zoned>,
    until_floating: bool,
    interval: i32,
    skip: Skip,
    by_month: Vec<i8>,
    by_week: Vec<i8>,
    by_year_day: Vec<i16>,
    by_month_day: Vec<i8>,
    by_week_day: Vec<ByWeekday>,
    by_hour: Vec<i8>,
    by_minute: Vec<i8>,
    by_second: Vec<i8>,
    by_set_pos: Vec<i32>,
    week_start: Weekday,
}

impl RecurrenceRuleBuilder {
    fn new(freq: Frequency, start: Zoned) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder {
            freq,
            start,
            count: None,
            until: None,
            until_floating: false,
            interval: 1,
            skip: Skip::Omit,
            by_month: vec![],
            by_week: vec![],
            by_year_day: vec![],
            by_month_day: vec![],
            by_week_day: vec![],
            by_hour: vec![],
            by_minute: vec![],
            by_second: vec![],
            by_set_pos: vec![],
            week_start: Weekday::Monday,
        }
    }

    pub fn build(&self) -> anyhow::Result<RecurrenceRule> {
        fn sort_and_dedup<T: Clone + Ord>(slice: &[T]) -> Box<[T]> {
            let mut vec = slice.to_vec();
            vec.sort();
            vec.dedup();
            vec.into_boxed_slice()
        }

        anyhow::ensure!(
            self.interval >= 1,
            "interval value of `{}` is invalid \
             (interval must be greater than or equal to 1)",
            self.interval,
        );
        if let Some(count) = self.count {
            anyhow::ensure!(
                count >= 1,
                "count value of `{count}` is invalid \
                 (count must be greater than or equal to 1)",
            );
            anyhow::ensure!(
                self.until.is_none(),
                "'count' and 'until' cannot both be used in the same rule",
            );
        }
        for &v in self.by_month.iter() {
            anyhow::ensure!(
                1 <= v && v <= 12,
                "invalid 'by month' value `{v}` \
                 (values must be in range 1..=12)",
            );
        }
        for &v in self.by_week.iter() {
            anyhow::ensure!(
                (-53 <= v && v <= -1) || (1 <= v && v <= 53),
                "invalid 'by week' value `{v}` \
                 (values must be in range 1..=53 or -53..=-1)",
            );
        }
        for &v in self.by_year_day.iter() {
            anyhow::ensure!(
                (-366 <= v && v <= -1) || (1 <= v && v <= 366),
                "invalid 'by day of the year' value `{v}` \
                 (values must be in range 1..=366 or -366..=-1)",
            );
        }
        for &v in self.by_month_day.iter() {
            anyhow::ensure!(
                (-31 <= v && v <= -1) || (1 <= v && v <= 31),
                "invalid 'by day of the month' value `{v}` \
                 (values must be in range 1..=31 or -31..=-1)",
            );
        }
        for &v in self.by_week_day.iter() {
            let nth = match v {
                ByWeekday::Any(_) => continue,
                ByWeekday::Numbered { nth, .. } => nth,
            };
            // Firstly, numbered weekdays are only allowed for YEARLY or
            // MONTHLY frequencies.
            anyhow::ensure!(
                matches!(self.freq, Frequency::Yearly | Frequency::Monthly),
                "numbered weekday `{v}` is only allowed at \
                 yearly or monthly frequencies",
            );
            // ... except when using YEARLY frequency with BYWEEKNO set.
            anyhow::ensure!(
                !matches!(self.freq, Frequency::Yearly)
                    || self.by_week.is_empty(),
                "numbered weekday `{v}` is only allowed at yearly \
                 frequency when 'by week' is not used",
            );
            // Secondly, check the bounds on `nth`. The enclosing period is
            // the year when the frequency is yearly and BYMONTH isn't set.
            // Otherwise, it's the month.
            if matches!(self.freq, Frequency::Yearly)
                && self.by_month.is_empty()
            {
                anyhow::ensure!(
                    (-53 <= nth && nth <= -1) || (1 <= nth && nth <= 53),
                    "invalid numbered 'by week day' value `{v}` \
                     (values must be in range 1..=53 or -53..=-1)",
                );
            } else {
                anyhow::ensure!(
                    (-5 <= nth && nth <= -1) || (1 <= nth && nth <= 5),
                    "invalid numbered 'by week day' value `{v}` \
                     (values must be in range 1..=5 or -5..=-1)",
                );
            }
        }
        for &v in self.by_hour.iter() {
            anyhow::ensure!(
                0 <= v && v <= 23,
                "invalid 'by hour' value `{v}` \
                 (values must be in range 0..=23)",
            );
        }
        for &v in self.by_minute.iter() {
            anyhow::ensure!(
                0 <= v && v <= 59,
                "invalid 'by minute' value `{v}` \
                 (values must be in range 0..=59)",
            );
        }
        for &v in self.by_second.iter() {
            // RFC 5545 technically allows a value of `60` here, presumably
            // for leap seconds. jiff doesn't support leap seconds outside
            // of parsing, and clamping doesn't make sense here, so reject
            // it. This is also what `python-dateutil` does.
            anyhow::ensure!(
                0 <= v && v <= 59,
                "invalid 'by second' value `{v}` \
                 (values must be in range 0..=59)",
            );
        }
        for &v in self.by_set_pos.iter() {
            anyhow::ensure!(
                (-366 <= v && v <= -1) || (1 <= v && v <= 366),
                "invalid 'by set position' value `{v}` \
                 (values must be in range 1..=366 or -366..=-1)",
            );
        }

        if !self.by_month_day.is_empty() {
            anyhow::ensure!(
                !matches!(self.freq, Frequency::Weekly),
                "'by day of the month' cannot be used with weekly frequency",
            );
        }

        // A BYSETPOS specific error is that, if it's given, then there MUST
        // be another BY* rule.
        if !self.by_set_pos.is_empty() {
            anyhow::ensure!(
                !self.by_month.is_empty()
                    || !self.by_week.is_empty()
                    || !self.by_year_day.is_empty()
                    || !self.by_month_day.is_empty()
                    || !self.by_week_day.is_empty()
                    || !self.by_hour.is_empty()
                    || !self.by_minute.is_empty()
                    || !self.by_second.is_empty(),
                "when 'by set position' is used, at least one other \
                 'by' rule must be specified, but all are empty",
            );
        }

        let stride = self.freq.to_span(self.interval).with_context(|| {
            format!(
                "could not convert {freq} interval of `{interval}` to \
                 time span",
                freq = self.freq.as_str(),
                interval = self.interval,
            )
        })?;
        // Occurrences are generated at whole-second resolution, so the
        // bounds must live at that resolution too.
        let start =
            self.start.with().subsec_nanosecond(0).build().with_context(
                || format!("failed to truncate `{}` to seconds", self.start),
            )?;
        let until = match self.until {
            None => None,
            Some(ref until) => Some(
                until.with().subsec_nanosecond(0).build().with_context(
                    || format!("failed to truncate `{until}` to seconds"),
                )?,
            ),
        };
        let civil_start = start.datetime();
        let inner = Arc::new(RecurrenceRuleInner {
            freq: self.freq,
            zoned_start: start,
            civil_start,
            count: self.count,
            zoned_until: until,
            until_floating: self.until_floating,
            interval: self.interval,
            stride,
            skip: self.skip,
            by_month: sort_and_dedup(&self.by_month),
            by_week: sort_and_dedup(&self.by_week),
            by_year_day: sort_and_dedup(&self.by_year_day),
            by_month_day: sort_and_dedup(&self.by_month_day),
            by_week_day: sort_and_dedup(&self.by_week_day),
            by_hour: sort_and_dedup(&self.by_hour),
            by_minute: sort_and_dedup(&self.by_minute),
            by_second: sort_and_dedup(&self.by_second),
            by_set_pos: sort_and_dedup(&self.by_set_pos),
            week_start: self.week_start,
        });
        Ok(RecurrenceRule { inner })
    }

    /// Sets the maximum number of occurrences the rule generates.
    ///
    /// Mutually exclusive with `until`; `build` rejects a rule with both.
    pub fn count(&mut self, count: u64) -> &mut RecurrenceRuleBuilder {
        self.count = Some(count);
        self
    }

    /// Sets the instant after which no occurrences are generated
    /// (inclusive: an occurrence exactly at `until` is produced).
    pub fn until(&mut self, until: Zoned) -> &mut RecurrenceRuleBuilder {
        self.until = Some(until);
        self.until_floating = false;
        self
    }

    /// Like `until`, but the bound is "floating": occurrences are compared
    /// against it by their wall-clock fields, ignoring offsets. This
    /// corresponds to an RFC 5545 `UNTIL` written without a trailing `Z`.
    pub fn until_floating(
        &mut self,
        until: Zoned,
    ) -> &mut RecurrenceRuleBuilder {
        self.until = Some(until);
        self.until_floating = true;
        self
    }

    pub fn interval(&mut self, increment: i32) -> &mut RecurrenceRuleBuilder {
        self.interval = increment;
        self
    }

    /// Sets the policy for occurrences whose resolved date does not exist.
    pub fn skip(&mut self, skip: Skip) -> &mut RecurrenceRuleBuilder {
        self.skip = skip;
        self
    }

    pub fn by_month<I: IntoI8Iter>(
        &mut self,
        months: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_month.extend(months.into_i8_iter());
        self
    }

    pub fn by_week<I: IntoI8Iter>(
        &mut self,
        weeks: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_week.extend(weeks.into_i8_iter());
        self
    }

    pub fn by_year_day<I: IntoI16Iter>(
        &mut self,
        days: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_year_day.extend(days.into_i16_iter());
        self
    }

    pub fn by_month_day<I: IntoI8Iter>(
        &mut self,
        days: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_month_day.extend(days.into_i8_iter());
        self
    }

    pub fn by_week_day<I: IntoByWeekdayIter>(
        &mut self,
        week_days: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_week_day.extend(week_days.into_by_weekday_iter());
        self
    }

    pub fn by_hour<I: IntoI8Iter>(
        &mut self,
        hours: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_hour.extend(hours.into_i8_iter());
        self
    }

    pub fn by_minute<I: IntoI8Iter>(
        &mut self,
        minutes: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_minute.extend(minutes.into_i8_iter());
        self
    }

    pub fn by_second<I: IntoI8Iter>(
        &mut self,
        seconds: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_second.extend(seconds.into_i8_iter());
        self
    }

    pub fn by_set_position<I: IntoI32Iter>(
        &mut self,
        positions: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_set_pos.extend(positions.into_i32_iter());
        self
    }

    /// Sets the first day of the week (RFC 5545 `WKST`, Monday by default).
    ///
    /// The week start matters for weekly rules with an interval greater
    /// than one, and for week-number rules.
    pub fn week_start(
        &mut self,
        weekday: Weekday,
    ) -> &mut RecurrenceRuleBuilder {
        self.week_start = weekday;
        self
    }
}

/// A type describing "day of week" inputs.
///
/// This implements `Ord` even though the actual order of weekdays cannot be
/// determined unless the _start_ of the week is known (which is commonly
/// either Sunday or Monday, but RFC 5545 lets any day be the start).
/// However, we implement `Ord` to make it easy to sort and de-duplicate
/// collections containing a `ByWeekday`. We never actually rely on its
/// ordering for generating datetimes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ByWeekday {
    /// Every occurrence of a weekday within the enclosing period.
    Any(Weekday),
    /// The nth occurrence of a weekday within the enclosing period, where
    /// the period is the month or the year depending on the frequency, and
    /// negative numbers count from the end of the period.
    Numbered { nth: i8, weekday: Weekday },
}

impl Ord for ByWeekday {
    fn cmp(&self, rhs: &ByWeekday) -> Ordering {
        match (*self, *rhs) {
            (ByWeekday::Any(lhs), ByWeekday::Any(rhs)) => {
                lhs.to_monday_one_offset().cmp(&rhs.to_monday_one_offset())
            }
            (
                ByWeekday::Numbered { nth: lhs_nth, weekday: lhs_weekday },
                ByWeekday::Numbered { nth: rhs_nth, weekday: rhs_weekday },
            ) => {
                let lhs = (lhs_nth, lhs_weekday.to_monday_one_offset());
                let rhs = (rhs_nth, rhs_weekday.to_monday_one_offset());
                lhs.cmp(&rhs)
            }
            (ByWeekday::Any(_), ByWeekday::Numbered { .. }) => Ordering::Less,
            (ByWeekday::Numbered { .. }, ByWeekday::Any(_)) => {
                Ordering::Greater
            }
        }
    }
}

impl PartialOrd for ByWeekday {
    fn partial_cmp(&self, rhs: &ByWeekday) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}

impl std::str::FromStr for ByWeekday {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<ByWeekday> {
        anyhow::ensure!(
            s.is_ascii() && s.len() >= 2,
            "failed to parse `{s}` as a weekday \
             (expected a two-letter code with an optional signed prefix)",
        );
        let (nth, code) = s.split_at(s.len() - 2);
        let weekday = weekday_from_code(code)?;
        if nth.is_empty() {
            return Ok(ByWeekday::Any(weekday));
        }
        let nth = nth
            .strip_prefix('+')
            .unwrap_or(nth)
            .parse::<i8>()
            .with_context(|| {
                format!("failed to parse `{nth}` as a weekday ordinal")
            })?;
        Ok(ByWeekday::Numbered { nth, weekday })
    }
}

impl std::fmt::Display for ByWeekday {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ByWeekday::Any(weekday) => {
                write!(f, "{}", weekday_code(weekday))
            }
            ByWeekday::Numbered { nth, weekday } => {
                write!(f, "{nth}{}", weekday_code(weekday))
            }
        }
    }
}

/// Returns the RFC 5545 two-letter code for a weekday.
pub(crate) fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "MO",
        Weekday::Tuesday => "TU",
        Weekday::Wednesday => "WE",
        Weekday::Thursday => "TH",
        Weekday::Friday => "FR",
        Weekday::Saturday => "SA",
        Weekday::Sunday => "SU",
    }
}

/// Parses an RFC 5545 two-letter weekday code.
pub(crate) fn weekday_from_code(code: &str) -> anyhow::Result<Weekday> {
    let weekday = match &*code.to_uppercase() {
        "MO" => Weekday::Monday,
        "TU" => Weekday::Tuesday,
        "WE" => Weekday::Wednesday,
        "TH" => Weekday::Thursday,
        "FR" => Weekday::Friday,
        "SA" => Weekday::Saturday,
        "SU" => Weekday::Sunday,
        unk => anyhow::bail!("unrecognized weekday code: `{unk}`"),
    };
    Ok(weekday)
}

/// A trait that permits flexibly specifying a sequence of `i8` integers.
///
/// This trait is used for builder methods on `RecurrenceRuleBuilder`. It
/// permits callers to provide integers in a number of flexible ways:
///
/// * A single integer: `5`
/// * An array or vector of integers: `[1, 3, 5]`.
/// * A single range of integers: `5..8` or `5..=8`.
/// * An array of ranges of integers: `[5..=10, 15..=20]`.
///
/// The reason this trait, [`IntoI16Iter`] and [`IntoI32Iter`] all exist
/// (instead of one generic trait with an associated integer type) is
/// inference: with a single generic trait, the type of the `5` in
/// `builder.by_month(5)` could not be inferred unambiguously.
pub trait IntoI8Iter {
    /// Creates an iterator over all integers in this sequence.
    fn into_i8_iter(self) -> impl Iterator<Item = i8>;
}

/// A trait that permits flexibly specifying a sequence of `i16` integers.
///
/// See [`IntoI8Iter`] for the supported argument shapes and for why this
/// isn't one generic trait.
pub trait IntoI16Iter {
    /// Creates an iterator over all integers in this sequence.
    fn into_i16_iter(self) -> impl Iterator<Item = i16>;
}

/// A trait that permits flexibly specifying a sequence of `i32` integers.
///
/// See [`IntoI8Iter`] for the supported argument shapes and for why this
/// isn't one generic trait.
pub trait IntoI32Iter {
    /// Creates an iterator over all integers in this sequence.
    fn into_i32_iter(self) -> impl Iterator<Item = i32>;
}

impl IntoI8Iter for i8 {
    fn into_i8_iter(self) -> impl Iterator<Item = i8> {
        std::iter::once(self)
    }
}

impl IntoI16Iter for i16 {
    fn into_i16_iter(self) -> impl Iterator<Item = i16> {
        std::iter::once(self)
    }
}

impl IntoI32Iter for i32 {
    fn into_i32_iter(self) -> impl Iterator<Item = i32> {
        std::iter::once(self)
    }
}

impl IntoI8Iter for Range<i8> {
    fn into_i8_iter(self) -> impl Iterator<Item = i8> {
        self.into_iter()
    }
}

impl IntoI16Iter for Range<i16> {
    fn into_i16_iter(self) -> impl Iterator<Item = i16> {
        self.into_iter()
    }
}

impl IntoI32Iter for Range<i32> {
    fn into_i32_iter(self) -> impl Iterator<Item = i32> {
        self.into_iter()
    }
}

impl IntoI8Iter for RangeInclusive<i8> {
    fn into_i8_iter(self) -> impl Iterator<Item = i8> {
        self.into_iter()
    }
}

impl IntoI16Iter for RangeInclusive<i16> {
    fn into_i16_iter(self) -> impl Iterator<Item = i16> {
        self.into_iter()
    }
}

impl IntoI32Iter for RangeInclusive<i32> {
    fn into_i32_iter(self) -> impl Iterator<Item = i32> {
        self.into_iter()
    }
}

impl<const N: usize> IntoI8Iter for [i8; N] {
    fn into_i8_iter(self) -> impl Iterator<Item = i8> {
        self.into_iter()
    }
}

impl<const N: usize> IntoI16Iter for [i16; N] {
    fn into_i16_iter(self) -> impl Iterator<Item = i16> {
        self.into_iter()
    }
}

impl<const N: usize> IntoI32Iter for [i32; N] {
    fn into_i32_iter(self) -> impl Iterator<Item = i32> {
        self.into_iter()
    }
}

impl IntoI8Iter for Vec<i8> {
    fn into_i8_iter(self) -> impl Iterator<Item = i8> {
        self.into_iter()
    }
}

impl IntoI16Iter for Vec<i16> {
    fn into_i16_iter(self) -> impl Iterator<Item = i16> {
        self.into_iter()
    }
}

impl IntoI32Iter for Vec<i32> {
    fn into_i32_iter(self) -> impl Iterator<Item = i32> {
        self.into_iter()
    }
}

impl<const N: usize> IntoI8Iter for [Range<i8>; N] {
    fn into_i8_iter(self) -> impl Iterator<Item = i8> {
        self.into_iter().flatten()
    }
}

impl<const N: usize> IntoI16Iter for [Range<i16>; N] {
    fn into_i16_iter(self) -> impl Iterator<Item = i16> {
        self.into_iter().flatten()
    }
}

impl<const N: usize> IntoI32Iter for [Range<i32>; N] {
    fn into_i32_iter(self) -> impl Iterator<Item = i32> {
        self.into_iter().flatten()
    }
}

impl<const N: usize> IntoI8Iter for [RangeInclusive<i8>; N] {
    fn into_i8_iter(self) -> impl Iterator<Item = i8> {
        self.into_iter().flatten()
    }
}

impl<const N: usize> IntoI16Iter for [RangeInclusive<i16>; N] {
    fn into_i16_iter(self) -> impl Iterator<Item = i16> {
        self.into_iter().flatten()
    }
}

impl<const N: usize> IntoI32Iter for [RangeInclusive<i32>; N] {
    fn into_i32_iter(self) -> impl Iterator<Item = i32> {
        self.into_iter().flatten()
    }
}

/// A trait that permits flexibly specifying a sequence of weekdays.
///
/// Each weekday can just mean "any" weekday (e.g., `Weekday::Saturday`), or
/// it can mean a numbered weekday. For example, when the frequency for a
/// recurrence rule is yearly, then `(3, Weekday::Saturday)` corresponds to
/// the third Saturday of the year.
///
/// This trait is primarily used for the `RecurrenceRuleBuilder::by_week_day`
/// builder method. It permits callers to provide weekdays in a number of
/// flexible ways:
///
/// * Directly via `ByWeekday::Numbered { nth: 3, weekday: Weekday::Monday }`.
/// * As just any weekday via `Weekday::Monday`.
/// * As a range of weekdays via `Weekday::Monday..=Weekday::Wednesday`.
/// * As an array of weekdays via `[Weekday::Monday, Weekday::Friday]`.
/// * As an array of numbered weekdays via
///   `[(2, Weekday::Monday), (1, Weekday::Friday)]`.
pub trait IntoByWeekdayIter {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday>;
}

impl IntoByWeekdayIter for ByWeekday {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        std::iter::once(self)
    }
}

impl IntoByWeekdayIter for Weekday {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        std::iter::once(ByWeekday::Any(self))
    }
}

impl IntoByWeekdayIter for (i8, Weekday) {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        let (nth, weekday) = self;
        std::iter::once(ByWeekday::Numbered { nth, weekday })
    }
}

impl IntoByWeekdayIter for RangeInclusive<Weekday> {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        let (start, end) = (*self.start(), *self.end());
        // OK because `Weekday::until` guarantees `0..=6`.
        // And add `1` because this is an inclusive range.
        let count = 1 + usize::try_from(start.until(end)).unwrap();
        start.cycle_forward().take(count).map(ByWeekday::Any)
    }
}

impl<const N: usize> IntoByWeekdayIter for [ByWeekday; N] {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        self.into_iter()
    }
}

impl<const N: usize> IntoByWeekdayIter for [Weekday; N] {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        self.into_iter().flat_map(|any| any.into_by_weekday_iter())
    }
}

impl<const N: usize> IntoByWeekdayIter for [(i8, Weekday); N] {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        self.into_iter().flat_map(|numbered| numbered.into_by_weekday_iter())
    }
}

impl<const N: usize> IntoByWeekdayIter for [RangeInclusive<Weekday>; N] {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        self.into_iter().flat_map(|any| any.into_by_weekday_iter())
    }
}

impl IntoByWeekdayIter for Vec<ByWeekday> {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        self.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Zoned {
        "2018-08-25T09:08:07[UTC]".parse().unwrap()
    }

    fn expect_err(builder: &mut RecurrenceRuleBuilder) -> anyhow::Error {
        match builder.build() {
            Err(err) => err,
            Ok(ok) => {
                panic!("expected recurrence rule error, but got:\n{ok:?}")
            }
        }
    }

    #[test]
    fn interval_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Daily, now()).interval(0),
        );
        insta::assert_snapshot!(
            err,
            @"interval value of `0` is invalid (interval must be greater than or equal to 1)",
        );
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Daily, now()).interval(-2),
        );
        insta::assert_snapshot!(
            err,
            @"interval value of `-2` is invalid (interval must be greater than or equal to 1)",
        );
    }

    #[test]
    fn count_and_until_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Daily, now()).count(0),
        );
        insta::assert_snapshot!(
            err,
            @"count value of `0` is invalid (count must be greater than or equal to 1)",
        );

        let err = expect_err(
            RecurrenceRule::builder(Frequency::Daily, now())
                .count(3)
                .until(now()),
        );
        insta::assert_snapshot!(
            err,
            @"'count' and 'until' cannot both be used in the same rule",
        );
    }

    #[test]
    fn by_month_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now()).by_month(0),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by month' value `0` (values must be in range 1..=12)",
        );
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now()).by_month(13),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by month' value `13` (values must be in range 1..=12)",
        );
    }

    #[test]
    fn by_week_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now()).by_week(0),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by week' value `0` (values must be in range 1..=53 or -53..=-1)",
        );
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now()).by_week(54),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by week' value `54` (values must be in range 1..=53 or -53..=-1)",
        );
    }

    #[test]
    fn by_year_day_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now())
                .by_year_day(367),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by day of the year' value `367` (values must be in range 1..=366 or -366..=-1)",
        );
    }

    #[test]
    fn by_month_day_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Monthly, now())
                .by_month_day(32),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by day of the month' value `32` (values must be in range 1..=31 or -31..=-1)",
        );

        let err = expect_err(
            RecurrenceRule::builder(Frequency::Weekly, now())
                .by_month_day(10),
        );
        insta::assert_snapshot!(
            err,
            @"'by day of the month' cannot be used with weekly frequency",
        );
    }

    #[test]
    fn numbered_weekday_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Daily, now())
                .by_week_day((1, Weekday::Tuesday)),
        );
        insta::assert_snapshot!(
            err,
            @"numbered weekday `1TU` is only allowed at yearly or monthly frequencies",
        );

        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now())
                .by_week(20)
                .by_week_day((1, Weekday::Tuesday)),
        );
        insta::assert_snapshot!(
            err,
            @"numbered weekday `1TU` is only allowed at yearly frequency when 'by week' is not used",
        );

        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now())
                .by_week_day((54, Weekday::Wednesday)),
        );
        insta::assert_snapshot!(
            err,
            @"invalid numbered 'by week day' value `54WE` (values must be in range 1..=53 or -53..=-1)",
        );

        let err = expect_err(
            RecurrenceRule::builder(Frequency::Monthly, now())
                .by_week_day((0, Weekday::Monday)),
        );
        insta::assert_snapshot!(
            err,
            @"invalid numbered 'by week day' value `0MO` (values must be in range 1..=5 or -5..=-1)",
        );

        // With BYMONTH, a yearly numbered weekday is scoped to the month.
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now())
                .by_month(8)
                .by_week_day((6, Weekday::Monday)),
        );
        insta::assert_snapshot!(
            err,
            @"invalid numbered 'by week day' value `6MO` (values must be in range 1..=5 or -5..=-1)",
        );
    }

    #[test]
    fn time_field_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now()).by_hour(24),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by hour' value `24` (values must be in range 0..=23)",
        );
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now()).by_minute(-1),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by minute' value `-1` (values must be in range 0..=59)",
        );
        // No leap seconds.
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now()).by_second(60),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by second' value `60` (values must be in range 0..=59)",
        );
    }

    #[test]
    fn by_set_position_errors() {
        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now())
                .by_hour(9)
                .by_set_position(0),
        );
        insta::assert_snapshot!(
            err,
            @"invalid 'by set position' value `0` (values must be in range 1..=366 or -366..=-1)",
        );

        let err = expect_err(
            RecurrenceRule::builder(Frequency::Yearly, now())
                .by_set_position(1),
        );
        insta::assert_snapshot!(
            err,
            @"when 'by set position' is used, at least one other 'by' rule must be specified, but all are empty",
        );
    }

    #[test]
    fn start_is_truncated_to_seconds() {
        let start: Zoned = "2018-08-25T09:08:07.123456789[UTC]".parse().unwrap();
        let rule = RecurrenceRule::builder(Frequency::Daily, start)
            .count(1)
            .build()
            .unwrap();
        let got = rule.all(0);
        assert_eq!(
            vec!["2018-08-25T09:08:07+00:00[UTC]".to_string()],
            got.iter().map(|zdt| zdt.to_string()).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn equality_is_structural() {
        let mk = || {
            RecurrenceRule::builder(Frequency::Weekly, now())
                .by_week_day([Weekday::Tuesday, Weekday::Thursday])
                .count(10)
                .build()
                .unwrap()
        };
        assert_eq!(mk(), mk());

        let other = RecurrenceRule::builder(Frequency::Weekly, now())
            .by_week_day([Weekday::Tuesday, Weekday::Thursday])
            .count(11)
            .build()
            .unwrap();
        assert_ne!(mk(), other);

        // The order values are given in does not matter.
        let shuffled = RecurrenceRule::builder(Frequency::Weekly, now())
            .by_week_day([Weekday::Thursday, Weekday::Tuesday])
            .count(10)
            .build()
            .unwrap();
        assert_eq!(mk(), shuffled);
    }

    #[test]
    fn materialize_with_cap() {
        let rule = RecurrenceRule::builder(Frequency::Daily, now())
            .build()
            .unwrap();
        assert_eq!(5, rule.all(5).len());

        let rule = RecurrenceRule::builder(Frequency::Daily, now())
            .count(3)
            .build()
            .unwrap();
        assert_eq!(3, rule.all(0).len());
    }

    #[test]
    #[should_panic(expected = "cannot materialize every occurrence")]
    fn materialize_unbounded_panics() {
        let rule = RecurrenceRule::builder(Frequency::Daily, now())
            .build()
            .unwrap();
        rule.all(0);
    }

    #[test]
    fn by_weekday_text_round_trips() {
        for s in ["MO", "SU", "1TU", "-17MO", "35WE", "-1FR"] {
            let parsed: ByWeekday = s.parse().unwrap();
            assert_eq!(s, parsed.to_string());
        }
        // An explicit plus sign parses but renders without it.
        let parsed: ByWeekday = "+2TH".parse().unwrap();
        assert_eq!("2TH", parsed.to_string());

        let err = "XX".parse::<ByWeekday>().unwrap_err();
        insta::assert_snapshot!(err, @"unrecognized weekday code: `XX`");
        let err = "M".parse::<ByWeekday>().unwrap_err();
        insta::assert_snapshot!(
            err,
            @"failed to parse `M` as a weekday (expected a two-letter code with an optional signed prefix)",
        );
        let err = "xTU".parse::<ByWeekday>().unwrap_err();
        insta::assert_snapshot!(
            err,
            @"failed to parse `x` as a weekday ordinal",
        );
    }
}
