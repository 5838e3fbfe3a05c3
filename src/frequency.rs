use jiff::{Span, ToSpan};

/// The base frequency at which a recurrence rule repeats.
///
/// The frequency determines the stride of the recurrence (together with
/// `RecurrenceRuleBuilder::interval`) and how each `by_*` rule is
/// interpreted: depending on the frequency, a rule either expands the set of
/// occurrences generated for one interval, or limits it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    /// Converts this frequency, multiplied by the given interval, to a span
    /// suitable for calendar arithmetic.
    ///
    /// This returns an error when the interval is out of range for the
    /// corresponding span unit.
    pub(crate) fn to_span(self, interval: i32) -> anyhow::Result<Span> {
        let base = match self {
            Frequency::Yearly => 1.year(),
            Frequency::Monthly => 1.month(),
            Frequency::Weekly => 1.week(),
            Frequency::Daily => 1.day(),
            Frequency::Hourly => 1.hour(),
            Frequency::Minutely => 1.minute(),
            Frequency::Secondly => 1.second(),
        };
        Ok(base.checked_mul(i64::from(interval))?)
    }

    /// Returns the RFC 5545 token for this frequency.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Frequency::Yearly => "YEARLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Daily => "DAILY",
            Frequency::Hourly => "HOURLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Secondly => "SECONDLY",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Frequency> {
        use self::Frequency::*;

        let freq = match &*s.to_uppercase() {
            "YEARLY" => Yearly,
            "MONTHLY" => Monthly,
            "WEEKLY" => Weekly,
            "DAILY" => Daily,
            "HOURLY" => Hourly,
            "MINUTELY" => Minutely,
            "SECONDLY" => Secondly,
            unk => anyhow::bail!("unrecognized frequency: `{unk}`"),
        };
        Ok(freq)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_round_trips_tokens() {
        let tokens = [
            "SECONDLY", "MINUTELY", "HOURLY", "DAILY", "WEEKLY", "MONTHLY",
            "YEARLY",
        ];
        for token in tokens {
            let freq: Frequency = token.parse().unwrap();
            assert_eq!(token, freq.as_str());
        }
        // Case insensitive, since some producers emit lowercase keys.
        assert_eq!(Frequency::Weekly, "weekly".parse().unwrap());
    }

    #[test]
    fn from_str_rejects_unknown() {
        let err = "fortnightly".parse::<Frequency>().unwrap_err();
        insta::assert_snapshot!(
            err,
            @"unrecognized frequency: `FORTNIGHTLY`",
        );
    }
}
