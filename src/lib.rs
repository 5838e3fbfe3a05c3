/*!
A library for materializing the occurrences of calendar recurrence rules,
as defined by RFC 5545 (the iCalendar `RRULE`), with the `SKIP` extension
of RFC 7529 for the Gregorian calendar.

A [`RecurrenceRule`] pairs a base frequency and a starting point with any
number of BY-rules that expand or constrain the sequence of occurrences.
Rules are built programmatically or parsed from the RFC 5545 text form,
validated eagerly, and then iterated:

```
use jiff::{Zoned, civil::Weekday};
use recur::{Frequency, RecurrenceRule};

fn example() -> anyhow::Result<()> {
    // Every other Monday and Wednesday at 09:00, New York time.
    let start: Zoned = "2024-06-03T09:00:00[America/New_York]".parse()?;
    let rule = RecurrenceRule::builder(Frequency::Weekly, start)
        .interval(2)
        .by_week_day([Weekday::Monday, Weekday::Wednesday])
        .build()?;
    for occurrence in rule.iter().take(4) {
        println!("{occurrence}");
    }
    Ok(())
}
# example().unwrap();
```

Occurrences are produced as [`jiff::Zoned`] values in the starting point's
time zone, at whole-second resolution, in non-decreasing order and without
duplicates. Iteration itself never fails: calendar arithmetic that lands on
a nonexistent date is resolved by the rule's [`Skip`] policy, wall-clock
times erased by a DST transition are skipped per RFC 5545, and times
repeated by a transition occur once per offset for the time-based
frequencies.

This crate deliberately stops at single-rule expansion. Merging `RRULE`
with `RDATE`/`EXDATE`, iCalendar component parsing, and non-Gregorian
`RSCALE` values all live a layer above.
*/

pub use crate::{
    frequency::Frequency,
    iter::RecurrenceIter,
    rule::{
        ByWeekday, IntoByWeekdayIter, IntoI8Iter, IntoI16Iter, IntoI32Iter,
        RecurrenceRule, RecurrenceRuleBuilder, Skip,
    },
};

mod batch;
mod driver;
mod expand;
mod frequency;
mod iter;
mod limit;
mod parse;
mod rule;
mod weekdate;
