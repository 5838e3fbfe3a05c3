use jiff::{
    ToSpan,
    civil::{DateTime, Weekday},
};

use crate::{
    batch::Batch,
    rule::{ByWeekday, Skip},
    weekdate::WeekNumbering,
};

// The expanders in this module are the "expand" half of the BY-rule pairs
// (the "limit" half lives in `limit`). Each one substitutes one calendar
// axis of every candidate in a batch, fanning a single candidate out into
// zero or more. An empty rule list is the identity. Candidates whose
// substitution produces a date that does not exist are resolved through the
// rule's `Skip` policy where RFC 7529 calls for it, and dropped otherwise.

/// Expands every candidate with each of the given seconds.
pub(crate) fn by_seconds(batch: &mut Batch, seconds: &[i8]) {
    if seconds.is_empty() {
        return;
    }
    batch.expand(|dt| {
        seconds
            .iter()
            .copied()
            .filter_map(move |second| dt.with().second(second).build().ok())
    });
}

/// Expands every candidate with each of the given minutes.
pub(crate) fn by_minutes(batch: &mut Batch, minutes: &[i8]) {
    if minutes.is_empty() {
        return;
    }
    batch.expand(|dt| {
        minutes
            .iter()
            .copied()
            .filter_map(move |minute| dt.with().minute(minute).build().ok())
    });
}

/// Expands every candidate with each of the given hours.
pub(crate) fn by_hours(batch: &mut Batch, hours: &[i8]) {
    if hours.is_empty() {
        return;
    }
    batch.expand(|dt| {
        hours
            .iter()
            .copied()
            .filter_map(move |hour| dt.with().hour(hour).build().ok())
    });
}

/// Expands every candidate with each of the given days of the month.
///
/// Negative days count from the end of the candidate's month, so `-1` is
/// its last day. A positive day beyond the end of the month is resolved
/// through the skip policy.
pub(crate) fn by_month_days(batch: &mut Batch, skip: Skip, days: &[i8]) {
    if days.is_empty() {
        return;
    }
    batch.expand(|dt| {
        let days_in_month = dt.days_in_month();
        days.iter().copied().filter_map(move |mut day| {
            if day.is_negative() {
                // Add 1 because -1 is the last day of the month, and the
                // days of the month are 1-indexed.
                day = days_in_month.checked_add(day + 1)?;
                if day < 1 {
                    return None;
                }
            }
            if day <= days_in_month {
                return dt.with().day(day).build().ok();
            }
            match skip {
                Skip::Omit => None,
                Skip::Backward => dt.with().day(days_in_month).build().ok(),
                Skip::Forward => {
                    let overflow = i32::from(day - days_in_month);
                    let last = dt.with().day(days_in_month).build().ok()?;
                    last.checked_add(overflow.days()).ok()
                }
            }
        })
    });
}

/// Expands every candidate with each of the given days of the year.
///
/// Negative days count from the end of the candidate's year. Day 366 of a
/// 365-day year is resolved through the skip policy: `Backward` lands on
/// December 31 of the same year, `Forward` on January 1 of the next.
pub(crate) fn by_year_days(batch: &mut Batch, skip: Skip, days: &[i16]) {
    if days.is_empty() {
        return;
    }
    batch.expand(|dt| {
        let days_in_year = dt.days_in_year();
        days.iter().copied().filter_map(move |mut day| {
            if day.is_negative() {
                // Add 1 because -1 is the last day of the year, and the
                // days of the year are 1-indexed.
                day = days_in_year.checked_add(day + 1)?;
                if day < 1 {
                    return None;
                }
            }
            if day <= days_in_year {
                return dt.with().day_of_year(day).build().ok();
            }
            match skip {
                Skip::Omit => None,
                Skip::Backward => {
                    dt.with().day_of_year(days_in_year).build().ok()
                }
                Skip::Forward => {
                    let overflow = i32::from(day - days_in_year);
                    let last =
                        dt.with().day_of_year(days_in_year).build().ok()?;
                    last.checked_add(overflow.days()).ok()
                }
            }
        })
    });
}

/// Expands every candidate with each of the given months.
///
/// The day materialized in each month is the candidate's own, unless `day`
/// overrides it. (The override covers the case where the pivot's day was
/// clamped by interval arithmetic, e.g. a February 29 anchor: the day to
/// restore in the target months is the anchor's, not the clamped pivot's.)
/// A day beyond the end of the target month is resolved through the skip
/// policy.
pub(crate) fn by_months(
    batch: &mut Batch,
    skip: Skip,
    day: Option<i8>,
    months: &[i8],
) {
    if months.is_empty() {
        return;
    }
    batch.expand(|dt| {
        let day = day.unwrap_or(dt.day());
        months.iter().copied().filter_map(move |month| {
            let first = dt.with().month(month).day(1).build().ok()?;
            let days_in_month = first.days_in_month();
            if day <= days_in_month {
                return first.with().day(day).build().ok();
            }
            match skip {
                Skip::Omit => None,
                Skip::Backward => {
                    first.with().day(days_in_month).build().ok()
                }
                Skip::Forward => {
                    let overflow = i32::from(day - days_in_month);
                    let last =
                        first.with().day(days_in_month).build().ok()?;
                    last.checked_add(overflow.days()).ok()
                }
            }
        })
    });
}

/// Expands every candidate with the matching weekdays of its month.
///
/// A plain weekday selects every matching date in the month. A numbered
/// weekday selects the nth matching date from the start of the month
/// (or from its end, for negative numbers), and selects nothing when no
/// such date exists.
pub(crate) fn by_weekdays_in_month(
    batch: &mut Batch,
    weekdays: &[ByWeekday],
) {
    if weekdays.is_empty() {
        return;
    }
    batch.expand(|dt| {
        let start = dt.first_of_month();
        let end = dt.last_of_month();
        weekdays
            .iter()
            .copied()
            .flat_map(move |weekday| weekday_dates(weekday, start, end))
    });
}

/// Expands every candidate with the matching weekdays of its year.
///
/// Like `by_weekdays_in_month`, with the year as the enclosing period.
pub(crate) fn by_weekdays_in_year(
    batch: &mut Batch,
    weekdays: &[ByWeekday],
) {
    if weekdays.is_empty() {
        return;
    }
    batch.expand(|dt| {
        let start = dt.first_of_year();
        let end = dt.last_of_year();
        weekdays
            .iter()
            .copied()
            .flat_map(move |weekday| weekday_dates(weekday, start, end))
    });
}

/// Expands every candidate with the listed weekdays of the week containing
/// it, where weeks begin on `week_start`.
///
/// # Panics
///
/// When any weekday is numbered. Rule validation rejects numbered weekdays
/// at weekly frequency.
pub(crate) fn by_weekdays_in_week(
    batch: &mut Batch,
    week_start: Weekday,
    weekdays: &[ByWeekday],
) {
    if weekdays.is_empty() {
        return;
    }
    let weeks = WeekNumbering::new(week_start);
    batch.expand(|dt| {
        let first = weeks.first_of_week(dt.date()).ok();
        weekdays.iter().copied().filter_map(move |weekday| {
            let ByWeekday::Any(weekday) = weekday else {
                unreachable!("numbered weekday at weekly frequency");
            };
            let offset = i32::from(weekday.since(week_start));
            let date = first?.checked_add(offset.days()).ok()?;
            dt.with().date(date).build().ok()
        })
    });
}

/// Expands every candidate with the days of the given numbered weeks of its
/// year, where weeks begin on `week_start`.
///
/// Negative week numbers count from the last week of the year. When plain
/// weekdays are given, only those days of each selected week are produced;
/// otherwise a week number selects every day of its week. Week numbers that
/// do not exist in the candidate's year (week 53 of a 52-week year) select
/// nothing.
///
/// # Panics
///
/// When any weekday is numbered. Rule validation rejects numbered weekdays
/// in combination with week numbers.
pub(crate) fn by_week_numbers(
    batch: &mut Batch,
    week_start: Weekday,
    weekdays: &[ByWeekday],
    week_numbers: &[i8],
) {
    if week_numbers.is_empty() {
        return;
    }
    let weeks = WeekNumbering::new(week_start);
    batch.expand(|dt| {
        let year = dt.year();
        let weeks_in_year = weeks.weeks_in(year);
        let mut dates = vec![];
        for &week in week_numbers {
            let week = if week.is_negative() {
                // Add 1 because -1 is the last week of the year, and the
                // weeks of the year are 1-indexed.
                match weeks_in_year.checked_add(week + 1) {
                    Some(week) if week >= 1 => week,
                    _ => continue,
                }
            } else {
                week
            };
            let Ok(first) = weeks.first_date(year, week) else { continue };
            if weekdays.is_empty() {
                for offset in 0..7 {
                    if let Ok(date) = first.checked_add(offset.days()) {
                        dates.push(date);
                    }
                }
            } else {
                for &weekday in weekdays {
                    let ByWeekday::Any(weekday) = weekday else {
                        unreachable!("numbered weekday with week numbers");
                    };
                    let offset = i32::from(weekday.since(week_start));
                    if let Ok(date) = first.checked_add(offset.days()) {
                        dates.push(date);
                    }
                }
            }
        }
        dates
            .into_iter()
            .filter_map(move |date| dt.with().date(date).build().ok())
    });
}

/// Returns the dates selected by one BY-day entry within `start..=end`.
fn weekday_dates(
    weekday: ByWeekday,
    start: DateTime,
    end: DateTime,
) -> impl Iterator<Item = DateTime> {
    match weekday {
        ByWeekday::Any(weekday) => {
            Either::Left(each_weekday(weekday, start, end))
        }
        ByWeekday::Numbered { nth, weekday } => Either::Right(
            nth_weekday_in(nth, weekday, start, end).into_iter(),
        ),
    }
}

/// Returns an iterator over every date with the given weekday between
/// `start` and `end` (inclusive).
pub(crate) fn each_weekday(
    weekday: Weekday,
    start: DateTime,
    end: DateTime,
) -> impl Iterator<Item = DateTime> {
    (start.weekday() == weekday).then_some(start).into_iter().chain({
        let mut cur = start.nth_weekday(1, weekday).ok();
        std::iter::from_fn(move || {
            let next = cur.take()?;
            if next > end {
                return None;
            }
            cur = next.nth_weekday(1, weekday).ok();
            Some(next)
        })
    })
}

/// Resolves the nth occurrence of a weekday within `start..=end`.
///
/// Positive `nth` counts from `start`, negative from `end`. Returns `None`
/// when the period does not contain that many matching days, or when `nth`
/// is zero.
pub(crate) fn nth_weekday_in(
    nth: i8,
    weekday: Weekday,
    start: DateTime,
    end: DateTime,
) -> Option<DateTime> {
    let found = if nth >= 1 {
        let first = if start.weekday() == weekday {
            start
        } else {
            start.nth_weekday(1, weekday).ok()?
        };
        if nth == 1 {
            first
        } else {
            first.nth_weekday(i32::from(nth) - 1, weekday).ok()?
        }
    } else if nth <= -1 {
        let last = if end.weekday() == weekday {
            end
        } else {
            end.nth_weekday(-1, weekday).ok()?
        };
        if nth == -1 {
            last
        } else {
            last.nth_weekday(i32::from(nth) + 1, weekday).ok()?
        }
    } else {
        return None;
    };
    (start <= found && found <= end).then_some(found)
}

/// A simple `Either` type for easy construction of `impl Iterator`.
///
/// Useful when an iterator is more naturally written with case analysis
/// than as a single chain.
enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R, I> Iterator for Either<L, R>
where
    L: Iterator<Item = I>,
    R: Iterator<Item = I>,
{
    type Item = I;

    fn next(&mut self) -> Option<I> {
        match *self {
            Either::Left(ref mut it) => it.next(),
            Either::Right(ref mut it) => it.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::tz::TimeZone;

    use super::*;

    fn batch_of(s: &str) -> Batch {
        let mut batch = Batch::new();
        batch.stage(s.parse().unwrap());
        batch
    }

    fn drain(mut batch: Batch) -> Vec<String> {
        batch.finalize(&TimeZone::UTC, false, &[]);
        std::iter::from_fn(|| {
            batch.pop().map(|zdt| zdt.datetime().to_string())
        })
        .collect()
    }

    #[test]
    fn month_days_resolve_negative_indices() {
        let mut batch = batch_of("2018-02-10T09:00:00");
        by_month_days(&mut batch, Skip::Omit, &[-1, 1]);
        assert_eq!(
            vec!["2018-02-01T09:00:00", "2018-02-28T09:00:00"],
            drain(batch),
        );
    }

    #[test]
    fn month_day_overflow_follows_skip_policy() {
        let mut batch = batch_of("2018-02-10T09:00:00");
        by_month_days(&mut batch, Skip::Omit, &[30]);
        assert!(drain(batch).is_empty());

        let mut batch = batch_of("2018-02-10T09:00:00");
        by_month_days(&mut batch, Skip::Backward, &[30]);
        assert_eq!(vec!["2018-02-28T09:00:00"], drain(batch));

        // Carrying the overflow: February 30 is two days past the 28th.
        let mut batch = batch_of("2018-02-10T09:00:00");
        by_month_days(&mut batch, Skip::Forward, &[30]);
        assert_eq!(vec!["2018-03-02T09:00:00"], drain(batch));

        let mut batch = batch_of("2020-02-10T09:00:00");
        by_month_days(&mut batch, Skip::Forward, &[30]);
        assert_eq!(vec!["2020-03-01T09:00:00"], drain(batch));
    }

    #[test]
    fn year_day_366_follows_skip_policy() {
        let mut batch = batch_of("2017-06-01T00:00:00");
        by_year_days(&mut batch, Skip::Omit, &[366]);
        assert!(drain(batch).is_empty());

        let mut batch = batch_of("2017-06-01T00:00:00");
        by_year_days(&mut batch, Skip::Backward, &[366]);
        assert_eq!(vec!["2017-12-31T00:00:00"], drain(batch));

        let mut batch = batch_of("2017-06-01T00:00:00");
        by_year_days(&mut batch, Skip::Forward, &[366]);
        assert_eq!(vec!["2018-01-01T00:00:00"], drain(batch));

        // In a leap year, day 366 exists and the policy never fires.
        let mut batch = batch_of("2020-06-01T00:00:00");
        by_year_days(&mut batch, Skip::Omit, &[366]);
        assert_eq!(vec!["2020-12-31T00:00:00"], drain(batch));
    }

    #[test]
    fn months_keep_the_requested_day() {
        let mut batch = batch_of("2019-01-31T12:00:00");
        by_months(&mut batch, Skip::Omit, None, &[2, 3]);
        assert_eq!(vec!["2019-03-31T12:00:00"], drain(batch));

        let mut batch = batch_of("2019-01-31T12:00:00");
        by_months(&mut batch, Skip::Backward, None, &[2]);
        assert_eq!(vec!["2019-02-28T12:00:00"], drain(batch));

        // A clamped pivot (February 28 from a day-29 anchor) restores the
        // anchor's day in the target month.
        let mut batch = batch_of("2019-02-28T12:00:00");
        by_months(&mut batch, Skip::Omit, Some(29), &[8]);
        assert_eq!(vec!["2019-08-29T12:00:00"], drain(batch));
    }

    #[test]
    fn numbered_weekdays_count_from_either_end() {
        let start: DateTime = "2018-01-01T09:00:00".parse().unwrap();
        let end: DateTime = "2018-12-31T09:00:00".parse().unwrap();
        // The 35th Wednesday and 17th-from-last Monday of 2018.
        assert_eq!(
            Some("2018-08-29T09:00:00".parse().unwrap()),
            nth_weekday_in(35, Weekday::Wednesday, start, end),
        );
        assert_eq!(
            Some("2018-09-10T09:00:00".parse().unwrap()),
            nth_weekday_in(-17, Weekday::Monday, start, end),
        );
        // 2018 has no 53rd Wednesday.
        assert_eq!(None, nth_weekday_in(53, Weekday::Wednesday, start, end));
        assert_eq!(None, nth_weekday_in(0, Weekday::Wednesday, start, end));
    }

    #[test]
    fn fifth_weekday_of_short_month_is_dropped() {
        // September 2018 has only four Mondays.
        let mut batch = batch_of("2018-09-10T09:00:00");
        by_weekdays_in_month(
            &mut batch,
            &[ByWeekday::Numbered { nth: 5, weekday: Weekday::Monday }],
        );
        assert!(drain(batch).is_empty());

        let mut batch = batch_of("2018-09-10T09:00:00");
        by_weekdays_in_month(
            &mut batch,
            &[ByWeekday::Numbered { nth: -1, weekday: Weekday::Monday }],
        );
        assert_eq!(vec!["2018-09-24T09:00:00"], drain(batch));
    }

    #[test]
    fn week_numbers_select_whole_weeks_or_listed_days() {
        // Week 20 of 1997 runs May 12 (Monday) through May 18.
        let mut batch = batch_of("1997-05-12T09:00:00");
        by_week_numbers(
            &mut batch,
            Weekday::Monday,
            &[ByWeekday::Any(Weekday::Monday)],
            &[20],
        );
        assert_eq!(vec!["1997-05-12T09:00:00"], drain(batch));

        let mut batch = batch_of("1997-05-12T09:00:00");
        by_week_numbers(&mut batch, Weekday::Monday, &[], &[20]);
        assert_eq!(7, drain(batch).len());

        // -1 selects the last week of the year.
        let mut batch = batch_of("1997-05-12T09:00:00");
        by_week_numbers(
            &mut batch,
            Weekday::Monday,
            &[ByWeekday::Any(Weekday::Monday)],
            &[-1],
        );
        assert_eq!(vec!["1997-12-22T09:00:00"], drain(batch));
    }
}
