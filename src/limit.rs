use jiff::civil::{DateTime, Weekday};

use crate::{expand, rule::ByWeekday, weekdate::WeekNumbering};

// The predicates in this module are the "limit" half of the BY-rule pairs
// (the "expand" half lives in `expand`). Each one answers whether a single
// candidate satisfies one BY axis. An empty rule list accepts everything.
// The lists are sorted and deduplicated by the rule builder, which is what
// lets the signed axes use binary search for both the positive and the
// negative encoding of the same day.

/// The period a numbered weekday resolves against when weekdays act as a
/// limiter: the candidate's month or its year.
#[derive(Clone, Copy, Debug)]
pub(crate) enum WeekdayScope {
    Month,
    Year,
}

/// Returns true if and only if the candidate's month is allowed.
pub(crate) fn valid_month(months: &[i8], dt: DateTime) -> bool {
    months.is_empty() || months.contains(&dt.month())
}

/// Returns true if and only if the candidate's week number is allowed.
///
/// Negative rule values count from the last week of the candidate's week
/// year, which has 52 or 53 weeks depending on the year and the week start.
pub(crate) fn valid_week_number(
    weeks: &[i8],
    week_start: Weekday,
    dt: DateTime,
) -> bool {
    if weeks.is_empty() {
        return true;
    }
    let numbering = WeekNumbering::new(week_start);
    let Ok((year, week)) = numbering.week_of(dt.date()) else { return false };
    // Minus 1 because -1 is the last week of the year, and the weeks of
    // the year are 1-indexed.
    let negative = week - 1 - numbering.weeks_in(year);
    weeks.binary_search(&week).is_ok()
        || weeks.binary_search(&negative).is_ok()
}

/// Returns true if and only if the candidate's day of the year is allowed.
pub(crate) fn valid_year_day(days: &[i16], dt: DateTime) -> bool {
    if days.is_empty() {
        return true;
    }
    let positive = dt.day_of_year();
    // Minus 1 because -1 is the last day of the year, and the days of the
    // year are 1-indexed.
    let negative = positive - 1 - dt.days_in_year();
    days.binary_search(&positive).is_ok()
        || days.binary_search(&negative).is_ok()
}

/// Returns true if and only if the candidate's day of the month is allowed.
pub(crate) fn valid_month_day(days: &[i8], dt: DateTime) -> bool {
    if days.is_empty() {
        return true;
    }
    let positive = dt.day();
    // Minus 1 because -1 is the last day of the month, and the days of the
    // month are 1-indexed.
    let negative = positive - 1 - dt.days_in_month();
    days.binary_search(&positive).is_ok()
        || days.binary_search(&negative).is_ok()
}

/// Returns true if and only if the candidate's weekday is allowed.
///
/// A plain entry matches any date with that weekday. A numbered entry
/// matches only the nth such date of the enclosing period given by `scope`
/// (counted from the end, for negative numbers).
pub(crate) fn valid_weekday(
    weekdays: &[ByWeekday],
    scope: WeekdayScope,
    dt: DateTime,
) -> bool {
    if weekdays.is_empty() {
        return true;
    }
    weekdays.iter().any(|&entry| match entry {
        ByWeekday::Any(weekday) => dt.weekday() == weekday,
        ByWeekday::Numbered { nth, weekday } => {
            let (start, end) = match scope {
                WeekdayScope::Month => {
                    (dt.first_of_month(), dt.last_of_month())
                }
                WeekdayScope::Year => (dt.first_of_year(), dt.last_of_year()),
            };
            expand::nth_weekday_in(nth, weekday, start, end)
                .is_some_and(|found| found.date() == dt.date())
        }
    })
}

/// Returns true if and only if the candidate's hour is allowed.
pub(crate) fn valid_hour(hours: &[i8], dt: DateTime) -> bool {
    hours.is_empty() || hours.contains(&dt.hour())
}

/// Returns true if and only if the candidate's minute is allowed.
pub(crate) fn valid_minute(minutes: &[i8], dt: DateTime) -> bool {
    minutes.is_empty() || minutes.contains(&dt.minute())
}

/// Returns true if and only if the candidate's second is allowed.
pub(crate) fn valid_second(seconds: &[i8], dt: DateTime) -> bool {
    seconds.is_empty() || seconds.contains(&dt.second())
}

#[cfg(test)]
mod tests {
    use jiff::civil::Weekday::*;

    use super::*;

    fn dt(s: &str) -> DateTime {
        s.parse().unwrap()
    }

    #[test]
    fn empty_rules_accept_everything() {
        let d = dt("2018-08-25T09:08:07");
        assert!(valid_month(&[], d));
        assert!(valid_week_number(&[], Monday, d));
        assert!(valid_year_day(&[], d));
        assert!(valid_month_day(&[], d));
        assert!(valid_weekday(&[], WeekdayScope::Year, d));
        assert!(valid_hour(&[], d));
        assert!(valid_minute(&[], d));
        assert!(valid_second(&[], d));
    }

    #[test]
    fn signed_axes_match_from_either_end() {
        // 2018-12-31 is day 365 of a 365-day year, i.e. day -1.
        let d = dt("2018-12-31T00:00:00");
        assert!(valid_year_day(&[365], d));
        assert!(valid_year_day(&[-1], d));
        assert!(!valid_year_day(&[366], d));

        // 2018-02-28 is the last day of its month.
        let d = dt("2018-02-28T00:00:00");
        assert!(valid_month_day(&[-1], d));
        assert!(valid_month_day(&[28], d));
        assert!(!valid_month_day(&[-2, 27], d));
    }

    #[test]
    fn week_numbers_respect_the_week_start() {
        // 1997-05-12 is the Monday starting ISO week 20.
        let d = dt("1997-05-12T09:00:00");
        assert!(valid_week_number(&[20], Monday, d));
        assert!(!valid_week_number(&[19, 21], Monday, d));
        // With weeks starting on Tuesday, May 12 is still in week 19.
        assert!(valid_week_number(&[19], Tuesday, d));
    }

    #[test]
    fn numbered_weekdays_limit_within_scope() {
        // 2018-11-06 is the first Tuesday of November, and the 45th
        // Tuesday of 2018.
        let d = dt("2018-11-06T09:00:00");
        let first_tuesday = [ByWeekday::Numbered { nth: 1, weekday: Tuesday }];
        assert!(valid_weekday(&first_tuesday, WeekdayScope::Month, d));
        assert!(!valid_weekday(&first_tuesday, WeekdayScope::Year, d));
        let nth45 = [ByWeekday::Numbered { nth: 45, weekday: Tuesday }];
        assert!(valid_weekday(&nth45, WeekdayScope::Year, d));

        let plain = [ByWeekday::Any(Tuesday), ByWeekday::Any(Friday)];
        assert!(valid_weekday(&plain, WeekdayScope::Month, d));
        assert!(!valid_weekday(&[ByWeekday::Any(Friday)], WeekdayScope::Month, d));
    }
}
