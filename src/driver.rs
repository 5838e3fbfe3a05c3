use jiff::{ToSpan, civil::DateTime};

use crate::{
    batch::Batch,
    expand,
    frequency::Frequency,
    limit::{self, WeekdayScope},
    rule::{RecurrenceRuleInner, Skip},
};

/// The per-frequency strategy of a recurrence rule.
///
/// A driver answers three questions for the iterator kernel: where the next
/// pivot is (`next_pivot`), which candidates one pivot fans out into
/// (`expand`), and whether a candidate survives the rule's limiters
/// (`is_valid`). Which BY-rules expand and which limit depends on the base
/// frequency; the assignments below follow RFC 5545 §3.3.10, note 2, with
/// errata 3747 and 3779.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Driver<'r> {
    rule: &'r RecurrenceRuleInner,
}

impl<'r> Driver<'r> {
    pub(crate) fn new(rule: &'r RecurrenceRuleInner) -> Driver<'r> {
        Driver { rule }
    }

    /// Returns the pivot following the given attempt number, along with its
    /// own attempt number.
    ///
    /// Pivots are always computed as `anchor + attempt * stride` rather
    /// than by advancing the previous pivot. Repeatedly adding months or
    /// years to a clamped result never gets back to a leap day (2024-02-29
    /// plus one year is 2025-02-28, plus another is 2026-02-28, and so on),
    /// while multiplying out from the anchor does.
    ///
    /// Returns `None` when the next pivot would fall outside the
    /// representable range, which ends iteration.
    pub(crate) fn next_pivot(
        &self,
        attempt: i64,
    ) -> Option<(i64, DateTime)> {
        let rule = self.rule;
        let anchor = rule.civil_start;
        let mut attempt = attempt;
        loop {
            attempt = attempt.checked_add(1)?;
            let span = rule.stride.checked_mul(attempt).ok()?;
            let next = anchor.checked_add(span).ok()?;
            // Month and year arithmetic clamps the day when the target
            // month is too short: 2019-08-29 plus six months is 2020-02-29,
            // but six more lands on 2021-02-28. A clamped pivot goes
            // through the skip policy, unless a date-setting BY-rule will
            // overwrite the day during expansion anyway.
            if matches!(rule.freq, Frequency::Monthly | Frequency::Yearly)
                && next.day() != anchor.day()
                && !self.sets_own_dates()
            {
                match rule.skip {
                    Skip::Omit => continue,
                    // The clamp already landed on the last day the target
                    // month has.
                    Skip::Backward => return Some((attempt, next)),
                    Skip::Forward => {
                        let overflow = i32::from(anchor.day() - next.day());
                        let next = next.checked_add(overflow.days()).ok()?;
                        return Some((attempt, next));
                    }
                }
            }
            return Some((attempt, next));
        }
    }

    /// Fans the given pivot out into the batch of candidates for its
    /// interval.
    pub(crate) fn expand(&self, pivot: DateTime, batch: &mut Batch) {
        let rule = self.rule;
        batch.stage(pivot);
        match rule.freq {
            // A secondly pivot is its own lone candidate.
            Frequency::Secondly => {}
            Frequency::Minutely => {
                expand::by_seconds(batch, &rule.by_second);
            }
            Frequency::Hourly => {
                expand::by_minutes(batch, &rule.by_minute);
                expand::by_seconds(batch, &rule.by_second);
            }
            Frequency::Daily => {
                expand::by_hours(batch, &rule.by_hour);
                expand::by_minutes(batch, &rule.by_minute);
                expand::by_seconds(batch, &rule.by_second);
            }
            Frequency::Weekly => {
                expand::by_hours(batch, &rule.by_hour);
                expand::by_minutes(batch, &rule.by_minute);
                expand::by_seconds(batch, &rule.by_second);
                expand::by_weekdays_in_week(
                    batch,
                    rule.week_start,
                    &rule.by_week_day,
                );
            }
            Frequency::Monthly => {
                expand::by_seconds(batch, &rule.by_second);
                expand::by_minutes(batch, &rule.by_minute);
                expand::by_hours(batch, &rule.by_hour);
                if !rule.by_month_day.is_empty() {
                    expand::by_month_days(
                        batch,
                        rule.skip,
                        &rule.by_month_day,
                    );
                } else {
                    expand::by_weekdays_in_month(batch, &rule.by_week_day);
                }
            }
            Frequency::Yearly => {
                expand::by_seconds(batch, &rule.by_second);
                expand::by_minutes(batch, &rule.by_minute);
                expand::by_hours(batch, &rule.by_hour);
                expand::by_month_days(batch, rule.skip, &rule.by_month_day);
                expand::by_year_days(batch, rule.skip, &rule.by_year_day);
                let chooses_day = !rule.by_month_day.is_empty()
                    || !rule.by_year_day.is_empty();
                // When nothing else picked the day, the months expansion
                // must materialize the anchor's day, not the pivot's: the
                // pivot's may have been clamped (a February 29 anchor in a
                // common year).
                let day = if chooses_day {
                    None
                } else {
                    Some(rule.civil_start.day())
                };
                expand::by_months(batch, rule.skip, day, &rule.by_month);
                // When BYMONTHDAY or BYYEARDAY picked the dates, BYDAY only
                // limits. Otherwise it expands, and its enclosing period
                // depends on which other rules are present.
                if !chooses_day {
                    if !rule.by_month.is_empty() {
                        expand::by_weekdays_in_month(
                            batch,
                            &rule.by_week_day,
                        );
                    } else if !rule.by_week.is_empty() {
                        expand::by_week_numbers(
                            batch,
                            rule.week_start,
                            &rule.by_week_day,
                            &rule.by_week,
                        );
                    } else {
                        expand::by_weekdays_in_year(
                            batch,
                            &rule.by_week_day,
                        );
                    }
                }
            }
        }
    }

    /// Returns true if and only if the candidate satisfies every BY-rule
    /// that acts as a limiter at this rule's frequency.
    pub(crate) fn is_valid(&self, dt: DateTime) -> bool {
        let rule = self.rule;
        match rule.freq {
            Frequency::Secondly => {
                self.valid_date_limiters(dt)
                    && limit::valid_hour(&rule.by_hour, dt)
                    && limit::valid_minute(&rule.by_minute, dt)
                    && limit::valid_second(&rule.by_second, dt)
            }
            Frequency::Minutely => {
                self.valid_date_limiters(dt)
                    && limit::valid_hour(&rule.by_hour, dt)
                    && limit::valid_minute(&rule.by_minute, dt)
            }
            Frequency::Hourly => {
                self.valid_date_limiters(dt)
                    && limit::valid_hour(&rule.by_hour, dt)
            }
            Frequency::Daily => {
                limit::valid_month(&rule.by_month, dt)
                    && limit::valid_month_day(&rule.by_month_day, dt)
                    && limit::valid_weekday(
                        &rule.by_week_day,
                        self.weekday_scope(),
                        dt,
                    )
            }
            Frequency::Weekly => limit::valid_month(&rule.by_month, dt),
            Frequency::Monthly => {
                limit::valid_month(&rule.by_month, dt)
                    && (rule.by_month_day.is_empty()
                        || limit::valid_weekday(
                            &rule.by_week_day,
                            self.weekday_scope(),
                            dt,
                        ))
            }
            Frequency::Yearly => {
                limit::valid_month(&rule.by_month, dt)
                    && ((rule.by_year_day.is_empty()
                        && rule.by_month_day.is_empty())
                        || limit::valid_weekday(
                            &rule.by_week_day,
                            self.weekday_scope(),
                            dt,
                        ))
            }
        }
    }

    /// The limiters shared by the three time-based frequencies.
    fn valid_date_limiters(&self, dt: DateTime) -> bool {
        let rule = self.rule;
        limit::valid_month(&rule.by_month, dt)
            && limit::valid_week_number(&rule.by_week, rule.week_start, dt)
            && limit::valid_year_day(&rule.by_year_day, dt)
            && limit::valid_month_day(&rule.by_month_day, dt)
            && limit::valid_weekday(
                &rule.by_week_day,
                self.weekday_scope(),
                dt,
            )
    }

    /// Returns true when expansion will overwrite the pivot's day, which
    /// exempts the pivot from the skip policy.
    fn sets_own_dates(&self) -> bool {
        let rule = self.rule;
        match rule.freq {
            Frequency::Monthly => {
                !rule.by_week_day.is_empty() || !rule.by_month_day.is_empty()
            }
            Frequency::Yearly => {
                !rule.by_month.is_empty()
                    || !rule.by_week.is_empty()
                    || !rule.by_year_day.is_empty()
                    || !rule.by_month_day.is_empty()
                    || !rule.by_week_day.is_empty()
            }
            _ => false,
        }
    }

    /// The period a numbered BY-day entry is counted within.
    fn weekday_scope(&self) -> WeekdayScope {
        match self.rule.freq {
            Frequency::Monthly => WeekdayScope::Month,
            Frequency::Yearly if !self.rule.by_month.is_empty() => {
                WeekdayScope::Month
            }
            _ => WeekdayScope::Year,
        }
    }
}
