use {
    anyhow::Context,
    jiff::{
        Zoned,
        civil::{DateTime, Weekday},
        tz::TimeZone,
    },
};

use crate::{
    frequency::Frequency,
    rule::{
        ByWeekday, RecurrenceRule, Skip, weekday_code, weekday_from_code,
    },
};

/// Parses an RFC 5545 `RRULE` property value into a validated rule.
///
/// The grammar is a semicolon-separated sequence of `KEY=value` pairs. The
/// `FREQ` key is required; everything else is optional. `DTSTART` is not
/// part of the property value in iCalendar, so the starting point comes in
/// as `start`.
///
/// The RFC 7529 `SKIP` and `RSCALE` keys are accepted, with `GREGORIAN` as
/// the only supported calendar scale.
pub(crate) fn parse(
    value: &str,
    start: Zoned,
) -> anyhow::Result<RecurrenceRule> {
    let mut freq: Option<Frequency> = None;
    let mut until: Option<(Zoned, bool)> = None;
    let mut count: Option<u64> = None;
    let mut interval: Option<i32> = None;
    let mut by_second: Vec<i8> = vec![];
    let mut by_minute: Vec<i8> = vec![];
    let mut by_hour: Vec<i8> = vec![];
    let mut by_week_day: Vec<ByWeekday> = vec![];
    let mut by_month_day: Vec<i8> = vec![];
    let mut by_year_day: Vec<i16> = vec![];
    let mut by_week: Vec<i8> = vec![];
    let mut by_month: Vec<i8> = vec![];
    let mut by_set_pos: Vec<i32> = vec![];
    let mut skip: Option<Skip> = None;
    let mut week_start: Option<Weekday> = None;

    for part in value.split(';') {
        let Some((key, val)) = part.split_once('=') else {
            anyhow::bail!(
                "malformed RRULE part `{part}` (expected `KEY=value`)",
            );
        };
        match &*key.to_uppercase() {
            "FREQ" => freq = Some(val.parse()?),
            "UNTIL" => until = Some(parse_until(val, &start)?),
            "COUNT" => {
                count = Some(val.parse().with_context(|| {
                    format!("failed to parse `COUNT` value `{val}`")
                })?);
            }
            "INTERVAL" => {
                interval = Some(val.parse().with_context(|| {
                    format!("failed to parse `INTERVAL` value `{val}`")
                })?);
            }
            "BYSECOND" => by_second = int_list("BYSECOND", val)?,
            "BYMINUTE" => by_minute = int_list("BYMINUTE", val)?,
            "BYHOUR" => by_hour = int_list("BYHOUR", val)?,
            "BYDAY" => {
                by_week_day = val
                    .split(',')
                    .map(|entry| entry.parse::<ByWeekday>())
                    .collect::<anyhow::Result<_>>()?;
            }
            "BYMONTHDAY" => by_month_day = int_list("BYMONTHDAY", val)?,
            "BYYEARDAY" => by_year_day = int_list("BYYEARDAY", val)?,
            "BYWEEKNO" => by_week = int_list("BYWEEKNO", val)?,
            "BYMONTH" => by_month = int_list("BYMONTH", val)?,
            "BYSETPOS" => by_set_pos = int_list("BYSETPOS", val)?,
            "WKST" => week_start = Some(weekday_from_code(val)?),
            "SKIP" => skip = Some(val.parse()?),
            "RSCALE" => {
                anyhow::ensure!(
                    val.eq_ignore_ascii_case("GREGORIAN"),
                    "unsupported calendar scale `{val}` \
                     (only GREGORIAN is supported)",
                );
            }
            unk => anyhow::bail!("unrecognized RRULE key `{unk}`"),
        }
    }

    let freq = freq.context("RRULE is missing the required FREQ part")?;
    let mut builder = RecurrenceRule::builder(freq, start);
    match until {
        Some((until, true)) => {
            builder.until_floating(until);
        }
        Some((until, false)) => {
            builder.until(until);
        }
        None => {}
    }
    if let Some(count) = count {
        builder.count(count);
    }
    if let Some(interval) = interval {
        builder.interval(interval);
    }
    if let Some(skip) = skip {
        builder.skip(skip);
    }
    if let Some(week_start) = week_start {
        builder.week_start(week_start);
    }
    builder
        .by_second(by_second)
        .by_minute(by_minute)
        .by_hour(by_hour)
        .by_week_day(by_week_day)
        .by_month_day(by_month_day)
        .by_year_day(by_year_day)
        .by_week(by_week)
        .by_month(by_month)
        .by_set_position(by_set_pos)
        .build()
}

/// Parses an `UNTIL` timestamp.
///
/// `YYYYMMDDTHHMMSSZ` is an absolute instant (UTC). The same form without
/// the trailing `Z` is floating: it is resolved in the starting point's
/// time zone and flagged for wall-clock comparison.
fn parse_until(value: &str, start: &Zoned) -> anyhow::Result<(Zoned, bool)> {
    let (civil, floating) = match value.strip_suffix('Z') {
        Some(civil) => (civil, false),
        None => (value, true),
    };
    // The grammar is exactly `YYYYMMDDTHHMMSS`, with the optional trailing
    // `Z` already stripped. jiff's ISO 8601 parser is more liberal (it
    // accepts date-only forms, for one), so check the shape first.
    let well_formed = civil.len() == 15
        && civil.bytes().enumerate().all(|(i, b)| {
            if i == 8 { b == b'T' } else { b.is_ascii_digit() }
        });
    anyhow::ensure!(
        well_formed,
        "failed to parse `UNTIL` value `{value}` as a timestamp",
    );
    let datetime: DateTime = civil.parse().with_context(|| {
        format!("failed to parse `UNTIL` value `{value}` as a timestamp")
    })?;
    let tz = if floating {
        start.time_zone().clone()
    } else {
        TimeZone::UTC
    };
    let zoned = datetime.to_zoned(tz).with_context(|| {
        format!("`UNTIL` value `{value}` is unrepresentable")
    })?;
    Ok((zoned, floating))
}

/// Parses a comma-separated list of integers.
fn int_list<T>(key: &str, value: &str) -> anyhow::Result<Vec<T>>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    value
        .split(',')
        .map(|v| {
            v.parse::<T>().with_context(|| {
                format!(
                    "failed to parse `{v}` as an integer \
                     in `{key}` value `{value}`",
                )
            })
        })
        .collect()
}

impl std::fmt::Display for RecurrenceRule {
    /// Renders the canonical `RRULE` property value for this rule.
    ///
    /// Defaults are omitted, and BY-rule values appear sorted (the rule
    /// stores them that way), so the output is a normal form: parsing it
    /// yields a rule equal to this one.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        fn list<T: std::fmt::Display>(
            f: &mut std::fmt::Formatter,
            key: &str,
            values: &[T],
        ) -> std::fmt::Result {
            if values.is_empty() {
                return Ok(());
            }
            write!(f, ";{key}=")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{v}")?;
            }
            Ok(())
        }

        let rule = &*self.inner;
        write!(f, "FREQ={}", rule.freq)?;
        if let Some(ref until) = rule.zoned_until {
            if rule.until_floating {
                write!(
                    f,
                    ";UNTIL={}",
                    until.datetime().strftime("%Y%m%dT%H%M%S"),
                )?;
            } else {
                let utc = until.timestamp().to_zoned(TimeZone::UTC);
                write!(
                    f,
                    ";UNTIL={}Z",
                    utc.datetime().strftime("%Y%m%dT%H%M%S"),
                )?;
            }
        }
        if let Some(count) = rule.count {
            write!(f, ";COUNT={count}")?;
        }
        if rule.interval != 1 {
            write!(f, ";INTERVAL={}", rule.interval)?;
        }
        list(f, "BYSECOND", &rule.by_second)?;
        list(f, "BYMINUTE", &rule.by_minute)?;
        list(f, "BYHOUR", &rule.by_hour)?;
        list(f, "BYDAY", &rule.by_week_day)?;
        list(f, "BYMONTHDAY", &rule.by_month_day)?;
        list(f, "BYYEARDAY", &rule.by_year_day)?;
        list(f, "BYWEEKNO", &rule.by_week)?;
        list(f, "BYMONTH", &rule.by_month)?;
        list(f, "BYSETPOS", &rule.by_set_pos)?;
        if rule.skip != Skip::Omit {
            write!(f, ";SKIP={};RSCALE=GREGORIAN", rule.skip)?;
        }
        if rule.week_start != Weekday::Monday {
            write!(f, ";WKST={}", weekday_code(rule.week_start))?;
        }
        Ok(())
    }
}
