//! Refill diff: what changed between two renderings of the list.
//!
//! Rows are compared by identifier. An edited registration keeps its id and
//! counts as unchanged; placeholders all share the empty identifier.

use similar::{capture_diff_slices, Algorithm, DiffTag};
use worktime_core::RegistrationId;

use crate::row::ListRow;

/// How the sentinel row moved between two renderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentinelChange {
    #[default]
    Absent,
    Added,
    Removed,
    Kept,
}

/// Summary of a refill against the previously rendered rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefillDiff {
    pub inserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub sentinel: SentinelChange,
}

impl RefillDiff {
    pub fn between(previous: &[ListRow], next: &[ListRow]) -> Self {
        let mut diff = RefillDiff {
            sentinel: sentinel_change(previous, next),
            ..RefillDiff::default()
        };
        let before = row_ids(previous);
        let after = row_ids(next);
        for op in capture_diff_slices(Algorithm::Myers, &before, &after) {
            let (tag, old, new) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => diff.unchanged += old.len(),
                DiffTag::Delete => diff.deleted += old.len(),
                DiffTag::Insert => diff.inserted += new.len(),
                DiffTag::Replace => {
                    diff.deleted += old.len();
                    diff.inserted += new.len();
                }
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.deleted == 0
    }
}

fn row_ids(rows: &[ListRow]) -> Vec<Option<RegistrationId>> {
    rows.iter().map(ListRow::id).collect()
}

fn sentinel_change(previous: &[ListRow], next: &[ListRow]) -> SentinelChange {
    let before = previous.last().is_some_and(ListRow::is_sentinel);
    let after = next.last().is_some_and(ListRow::is_sentinel);
    match (before, after) {
        (false, false) => SentinelChange::Absent,
        (false, true) => SentinelChange::Added,
        (true, false) => SentinelChange::Removed,
        (true, true) => SentinelChange::Kept,
    }
}

/// Narrow interface to whatever renders the rows.
pub trait ListView: Send {
    fn refill(&mut self, rows: &[ListRow], diff: &RefillDiff);
}
