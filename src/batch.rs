use jiff::{
    Zoned,
    civil::DateTime,
    tz::{AmbiguousOffset, TimeZone},
};

/// The set of candidate occurrences generated from one pivot.
///
/// A batch goes through two phases. While the per-frequency driver runs,
/// candidates are civil datetimes: expanders substitute calendar fields and
/// limiters drop candidates, all without caring about the time zone. Then
/// `finalize` resolves every civil candidate against the rule's time zone,
/// sorts what survives by instant, and applies BYSETPOS. After that, `pop`
/// drains the batch in chronological order.
///
/// The two phases exist because BYSETPOS indexes the *ordered* occurrence
/// set, and civil order is not instant order near a DST transition. Sorting
/// civil datetimes and then resolving them lazily can emit the two halves of
/// a fold out of order, so the whole batch is resolved eagerly instead.
#[derive(Clone, Debug)]
pub(crate) struct Batch {
    civil: Vec<DateTime>,
    zoned: Vec<Zoned>,
}

impl Batch {
    pub(crate) fn new() -> Batch {
        Batch { civil: vec![], zoned: vec![] }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.civil.is_empty() && self.zoned.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.civil.clear();
        self.zoned.clear();
    }

    /// Adds one civil candidate to the batch.
    pub(crate) fn stage(&mut self, dt: DateTime) {
        self.civil.push(dt);
    }

    /// Drops every civil candidate that does not satisfy the predicate.
    pub(crate) fn retain(
        &mut self,
        predicate: impl FnMut(&mut DateTime) -> bool,
    ) {
        self.civil.retain_mut(predicate);
    }

    /// Replaces every civil candidate with its expansion.
    ///
    /// An expansion that yields nothing removes the candidate. An expansion
    /// that yields the input unchanged keeps it.
    pub(crate) fn expand<E, I>(&mut self, expand: E)
    where
        E: Fn(DateTime) -> I,
        I: Iterator<Item = DateTime>,
    {
        // Every datetime currently in the batch is replaced by its
        // expansion. Record how many there are now, append the expansions
        // and drain the originals in one sweep at the end.
        let len = self.civil.len();
        for i in 0..len {
            self.civil.extend(expand(self.civil[i]));
        }
        self.civil.drain(..len);
    }

    /// Resolves the civil candidates into zoned datetimes, sorts them by
    /// instant, drops duplicates and applies the BYSETPOS selection.
    ///
    /// A civil datetime that falls in a DST gap is skipped, per RFC 5545.
    /// A civil datetime repeated by a DST fold resolves to its earlier
    /// offset, except when `duplicate_folds` is set, in which case both
    /// offsets are produced. The caller is responsible for only requesting
    /// duplication when the batch spans the whole fold, since otherwise the
    /// later-offset occurrences would land amid later batches.
    pub(crate) fn finalize(
        &mut self,
        tz: &TimeZone,
        duplicate_folds: bool,
        by_set_pos: &[i32],
    ) {
        self.civil.sort();
        self.civil.dedup();
        for dt in self.civil.drain(..) {
            let ambiguous = tz.to_ambiguous_zoned(dt);
            match ambiguous.offset() {
                AmbiguousOffset::Unambiguous { offset } => {
                    if let Ok(ts) = offset.to_timestamp(dt) {
                        self.zoned.push(ts.to_zoned(tz.clone()));
                    }
                }
                AmbiguousOffset::Gap { .. } => {}
                AmbiguousOffset::Fold { before, after } => {
                    if let Ok(ts) = before.to_timestamp(dt) {
                        self.zoned.push(ts.to_zoned(tz.clone()));
                    }
                    if duplicate_folds {
                        if let Ok(ts) = after.to_timestamp(dt) {
                            self.zoned.push(ts.to_zoned(tz.clone()));
                        }
                    }
                }
            }
        }
        self.zoned.sort();
        self.zoned.dedup();
        if !by_set_pos.is_empty() {
            let len = self.zoned.len();
            let mut position = 0;
            self.zoned.retain(|_| {
                let keep = selected(by_set_pos, position, len);
                position += 1;
                keep
            });
        }
        // Popping from the end of the vector must yield instants in
        // ascending order.
        self.zoned.reverse();
    }

    /// Removes and returns the chronologically next occurrence.
    pub(crate) fn pop(&mut self) -> Option<Zoned> {
        self.zoned.pop()
    }
}

/// Returns true if and only if the given `position` in an ordered set of
/// length `len` is selected by the (sorted) BYSETPOS values.
fn selected(by_set_pos: &[i32], position: usize, len: usize) -> bool {
    let Ok(position) = i32::try_from(position) else { return false };
    let Ok(len) = i32::try_from(len) else { return false };
    let positive = position + 1;
    // Minus 1 because -1 is the last occurrence of the set, and the
    // positions of a set are 1-indexed according to RFC 5545.
    let negative = positive - 1 - len;
    by_set_pos.binary_search(&positive).is_ok()
        || by_set_pos.binary_search(&negative).is_ok()
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    fn dt(s: &str) -> DateTime {
        s.parse().unwrap()
    }

    #[test]
    fn expansion_replaces_candidates() {
        let mut batch = Batch::new();
        batch.stage(dt("2018-08-25T09:08:07"));
        batch.expand(|dt| {
            [1, 2].into_iter().filter_map(move |day| {
                dt.with().day(day).build().ok()
            })
        });
        batch.finalize(&TimeZone::UTC, false, &[]);
        let days: Vec<i8> =
            std::iter::from_fn(|| batch.pop().map(|zdt| zdt.day())).collect();
        assert_eq!(vec![1, 2], days);
    }

    #[test]
    fn finalize_sorts_and_dedups() {
        let mut batch = Batch::new();
        for day in [3, 1, 3, 2] {
            batch.stage(date(2018, 8, day).at(9, 0, 0, 0));
        }
        batch.finalize(&TimeZone::UTC, false, &[]);
        let days: Vec<i8> =
            std::iter::from_fn(|| batch.pop().map(|zdt| zdt.day())).collect();
        assert_eq!(vec![1, 2, 3], days);
    }

    #[test]
    fn set_position_selects_from_both_ends() {
        let mut batch = Batch::new();
        for day in 1..=10 {
            batch.stage(date(2018, 8, day).at(9, 0, 0, 0));
        }
        // Sorted, as the rule builder guarantees.
        batch.finalize(&TimeZone::UTC, false, &[-1, 1, 3]);
        let days: Vec<i8> =
            std::iter::from_fn(|| batch.pop().map(|zdt| zdt.day())).collect();
        assert_eq!(vec![1, 3, 10], days);
    }

    #[test]
    fn set_position_out_of_range_is_ignored() {
        let mut batch = Batch::new();
        for day in 1..=3 {
            batch.stage(date(2018, 8, day).at(9, 0, 0, 0));
        }
        batch.finalize(&TimeZone::UTC, false, &[-10, 2, 7]);
        let days: Vec<i8> =
            std::iter::from_fn(|| batch.pop().map(|zdt| zdt.day())).collect();
        assert_eq!(vec![2], days);
    }

    #[test]
    fn gap_is_skipped_and_fold_duplicates_on_request() {
        let tz = TimeZone::get("America/New_York").unwrap();

        // 2018-03-11T02:30 does not exist in New York.
        let mut batch = Batch::new();
        batch.stage(dt("2018-03-11T02:30:00"));
        batch.finalize(&tz, true, &[]);
        assert!(batch.pop().is_none());

        // 2018-11-04T01:30 happens twice.
        let mut batch = Batch::new();
        batch.stage(dt("2018-11-04T01:30:00"));
        batch.finalize(&tz, true, &[]);
        let got: Vec<String> =
            std::iter::from_fn(|| batch.pop().map(|zdt| zdt.to_string()))
                .collect();
        assert_eq!(
            vec![
                "2018-11-04T01:30:00-04:00[America/New_York]".to_string(),
                "2018-11-04T01:30:00-05:00[America/New_York]".to_string(),
            ],
            got,
        );

        // With `duplicate_folds` disabled, only the earlier offset remains.
        let mut batch = Batch::new();
        batch.stage(dt("2018-11-04T01:30:00"));
        batch.finalize(&tz, false, &[]);
        let got: Vec<String> =
            std::iter::from_fn(|| batch.pop().map(|zdt| zdt.to_string()))
                .collect();
        assert_eq!(
            vec!["2018-11-04T01:30:00-04:00[America/New_York]".to_string()],
            got,
        );
    }
}
