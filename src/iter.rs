use jiff::{ToSpan, Zoned, civil::DateTime};

use crate::{batch::Batch, driver::Driver, frequency::Frequency, rule::RecurrenceRule};

/// How many consecutive intervals may produce no occurrences before the
/// iterator gives up on the rule.
///
/// A rule whose BY-rules filter out every interval (say, a yearly rule
/// asking for day 366 with only common years left in range) would otherwise
/// advance forever without yielding anything. Hitting this cap is reported
/// through `log::warn!` and ends iteration.
const MAX_EMPTY_INTERVALS: u32 = 10_000;

/// How far past the "until" bound the pivot may advance before iteration
/// stops.
///
/// Candidates are checked against the bound individually, but a rule whose
/// batches are all empty near the bound needs a stopping point for the
/// pivot itself. A pivot's batch never reaches back more than its own year
/// plus one week of week-numbering spill, so a year and change of slack is
/// enough at every frequency.
const UNTIL_SLACK_DAYS: i32 = 370;

/// An iterator over the occurrences of one recurrence rule.
///
/// The iterator owns all mutable state: the pivot cursor, the batch of
/// pending occurrences generated from the current pivot, and the emission
/// count. The rule itself is never mutated, so any number of iterators can
/// run against it independently.
#[derive(Clone, Debug)]
pub struct RecurrenceIter<'r> {
    /// The recurrence rule that we're generating zoned datetimes for.
    rule: &'r RecurrenceRule,
    /// Occurrences computed from the current pivot that have not been
    /// yielded yet.
    batch: Batch,
    /// The attempt index along with the current pivot.
    ///
    /// The pivot for attempt `i` is always `start + i * stride`, never
    /// `previous pivot + stride`; see `Driver::next_pivot` for why. When
    /// this is `None`, iteration has ceased.
    cur: Option<(i64, DateTime)>,
    /// The number of occurrences yielded so far, for enforcing the count.
    emitted: u64,
    /// The occurrence yielded last, for dropping exact duplicates across
    /// batch boundaries.
    last: Option<Zoned>,
    /// How many intervals in a row have produced nothing.
    empty_intervals: u32,
    /// The "until" bound expressed in the rule's wall clock, used only to
    /// stop the pivot from advancing forever past the bound.
    until_civil: Option<DateTime>,
}

impl<'r> RecurrenceIter<'r> {
    pub(crate) fn new(rule: &'r RecurrenceRule) -> RecurrenceIter<'r> {
        let until_civil = rule.inner.zoned_until.as_ref().map(|until| {
            if rule.inner.until_floating {
                until.datetime()
            } else {
                until
                    .timestamp()
                    .to_zoned(rule.time_zone().clone())
                    .datetime()
            }
        });
        RecurrenceIter {
            rule,
            batch: Batch::new(),
            cur: Some((0, rule.inner.civil_start)),
            emitted: 0,
            last: None,
            empty_intervals: 0,
            until_civil,
        }
    }

    /// Computes the batch of occurrences for the given pivot.
    fn fill(&mut self, pivot: DateTime) {
        let driver = Driver::new(&self.rule.inner);
        driver.expand(pivot, &mut self.batch);
        self.batch.retain(|dt| driver.is_valid(*dt));
        // An hourly batch spans at most one wall-clock hour, so emitting
        // both halves of a DST fold keeps the batch internally ordered by
        // instant. Minutely and secondly batches are narrower than the
        // fold, where the same duplication would interleave with later
        // batches out of order; those frequencies resolve a fold to its
        // earlier offset instead.
        let duplicate_folds =
            matches!(self.rule.inner.freq, Frequency::Hourly);
        self.batch.finalize(
            self.rule.time_zone(),
            duplicate_folds,
            &self.rule.inner.by_set_pos,
        );
    }

    /// Advances the pivot cursor, stopping at the representable horizon and
    /// once the pivot is hopelessly past the "until" bound.
    fn advance(&self, attempt: i64) -> Option<(i64, DateTime)> {
        let driver = Driver::new(&self.rule.inner);
        let Some((attempt, pivot)) = driver.next_pivot(attempt) else {
            log::trace!(
                "recurrence rule reached the end of the representable \
                 time range",
            );
            return None;
        };
        if let Some(until) = self.until_civil {
            if let Ok(bound) = until.checked_add(UNTIL_SLACK_DAYS.days()) {
                if pivot > bound {
                    return None;
                }
            }
        }
        Some((attempt, pivot))
    }

    /// Returns true when the occurrence falls after the "until" bound.
    fn exceeds_until(&self, zdt: &Zoned) -> bool {
        let Some(ref until) = self.rule.inner.zoned_until else {
            return false;
        };
        if self.rule.inner.until_floating {
            zdt.datetime() > until.datetime()
        } else {
            zdt > until
        }
    }
}

impl<'r> Iterator for RecurrenceIter<'r> {
    type Item = Zoned;

    fn next(&mut self) -> Option<Zoned> {
        loop {
            if self
                .rule
                .inner
                .count
                .is_some_and(|count| self.emitted >= count)
            {
                self.batch.clear();
                self.cur = None;
                return None;
            }
            while let Some(zdt) = self.batch.pop() {
                // For simplicity of implementation, the generator may
                // create occurrences before the starting point. This can
                // generally only happen within the first pivot's batch, so
                // we don't worry about it too much and just filter them
                // here. (BYSETPOS has already run at this point, which is
                // load-bearing: positions index the full batch, including
                // any pre-start occurrences.)
                if zdt < self.rule.inner.zoned_start {
                    continue;
                }
                if self.exceeds_until(&zdt) {
                    // Occurrences only move forward in time, so nothing
                    // after this one can come back under the bound.
                    self.batch.clear();
                    self.cur = None;
                    return None;
                }
                // Adjacent batches can touch in rare configurations (a
                // skip policy that rolled a pivot into the next interval);
                // emitted occurrences must stay unique.
                if self.last.as_ref() == Some(&zdt) {
                    continue;
                }
                self.emitted += 1;
                self.last = Some(zdt.clone());
                return Some(zdt);
            }
            let (attempt, pivot) = self.cur?;
            self.fill(pivot);
            if self.batch.is_empty() {
                self.empty_intervals += 1;
                if self.empty_intervals >= MAX_EMPTY_INTERVALS {
                    log::warn!(
                        "giving up on recurrence rule starting at `{start}` \
                         after {MAX_EMPTY_INTERVALS} consecutive intervals \
                         produced no occurrences",
                        start = self.rule.inner.zoned_start,
                    );
                    self.cur = None;
                    return None;
                }
            } else {
                self.empty_intervals = 0;
            }
            self.cur = self.advance(attempt);
        }
    }
}

impl<'r> std::iter::FusedIterator for RecurrenceIter<'r> {}
