use {
    anyhow::Context,
    jiff::{
        ToSpan,
        civil::{Date, Weekday},
    },
};

/// A week numbering scheme anchored on an arbitrary first day of the week.
///
/// RFC 5545 numbers weeks the way ISO 8601 does, except that the first day
/// of the week is whatever `WKST` says it is (Monday by default): week one
/// of a year is the first week that contains at least four days of that
/// year. This type captures the `WKST` choice and does all week arithmetic
/// relative to it. `jiff::civil::ISOWeekDate` is not enough here precisely
/// because it hard-codes Monday.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WeekNumbering {
    start: Weekday,
}

impl WeekNumbering {
    /// Create a week numbering scheme whose weeks begin on the given day.
    pub(crate) fn new(start: Weekday) -> WeekNumbering {
        WeekNumbering { start }
    }

    /// Returns the week year and week number containing the given date.
    ///
    /// The week year may differ from the Gregorian year for dates near the
    /// boundary. For example, with weeks starting on Monday, 1998-01-01
    /// falls in week 1 of 1998, but 1999-01-01 falls in week 53 of 1998.
    pub(crate) fn week_of(&self, date: Date) -> anyhow::Result<(i16, i8)> {
        let mut start_of_year = self.start_of_week_year(date.year())?;
        if date < start_of_year {
            start_of_year = self.start_of_week_year(date.year() - 1)?;
        } else if let Ok(next) = self.start_of_week_year(date.year() + 1) {
            // The only way this fails is when `date` is in jiff's maximum
            // year, in which case `date` cannot be in the following week
            // year anyway.
            if date >= next {
                start_of_year = next;
            }
        }
        // OK since we just established `start_of_year <= date`, and jiff
        // guarantees `until` between valid dates.
        let days = start_of_year.until(date).unwrap().get_days();
        // +1 because week numbers are one-indexed. The cast is fine because
        // a date is never more than 53 weeks past the start of its week
        // year.
        let week = i8::try_from(days / 7).unwrap() + 1;
        // The week year matches the Gregorian year four days into the first
        // week.
        let year = (start_of_year + 4.days()).year();
        Ok((year, week))
    }

    /// Returns the number of weeks (52 or 53) in the given week year.
    pub(crate) fn weeks_in(&self, year: i16) -> i8 {
        // Adapted from the weeks-per-year relation on the ISO week date
        // calendar, generalized to any week start: a year is "long" when it
        // ends on the fourth day of the week, or on the fifth in a leap
        // year.
        let last = jiff::civil::date(year, 12, 31);
        let weekday = last.weekday();
        let long = weekday == self.start.wrapping_add(3)
            || (last.in_leap_year() && weekday == self.start.wrapping_add(4));
        if long { 53 } else { 52 }
    }

    /// Returns the first date of the given numbered week.
    ///
    /// This returns an error when the week number does not exist in the
    /// given week year (week 53 of a 52-week year), or when the date falls
    /// outside jiff's representable range.
    pub(crate) fn first_date(
        &self,
        year: i16,
        week: i8,
    ) -> anyhow::Result<Date> {
        anyhow::ensure!(
            1 <= week && week <= self.weeks_in(year),
            "week number `{week}` (for weeks starting on {start:?}) \
             is invalid for year `{year}`",
            start = self.start,
        );
        let start_of_year = self.start_of_week_year(year)?;
        let days = i32::from(week - 1) * 7;
        start_of_year.checked_add(days.days()).with_context(|| {
            format!(
                "week `{year:04}-W{week:02}` (for weeks starting on \
                 {start:?}) is out of range",
                start = self.start,
            )
        })
    }

    /// Returns the first date of the week containing the given date.
    pub(crate) fn first_of_week(&self, date: Date) -> anyhow::Result<Date> {
        if date.weekday() == self.start {
            Ok(date)
        } else {
            date.nth_weekday(-1, self.start).with_context(|| {
                format!(
                    "failed to find first day of week containing {date}, \
                     for weeks starting on {start:?}",
                    start = self.start,
                )
            })
        }
    }

    /// Returns the last date of the week containing the given date.
    pub(crate) fn last_of_week(&self, date: Date) -> anyhow::Result<Date> {
        let last = self.start.wrapping_sub(1);
        if date.weekday() == last {
            Ok(date)
        } else {
            date.nth_weekday(1, last).with_context(|| {
                format!(
                    "failed to find last day of week containing {date}, \
                     for weeks starting on {start:?}",
                    start = self.start,
                )
            })
        }
    }

    /// Returns the first date of week one of the given week year.
    ///
    /// The date returned always falls on `self.start`.
    fn start_of_week_year(&self, year: i16) -> anyhow::Result<Date> {
        // Week one is the first week with at least four days in the year,
        // so January 4 is always inside it.
        let in_first_week = Date::new(year, 1, 4).with_context(|| {
            format!(
                "failed to find first week of year `{year}` for weeks \
                 starting on {start:?}",
                start = self.start,
            )
        })?;
        let days_into_week = in_first_week.weekday().since(self.start);
        in_first_week.checked_sub(days_into_week.days()).with_context(|| {
            format!(
                "first week of year `{year}` for weeks starting on \
                 {start:?} begins out of range",
                start = self.start,
            )
        })
    }
}
