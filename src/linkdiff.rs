//! Keyed set difference.
//!
//! Comparing a current collection against a desired one by key is the shape
//! behind tag-link reconciliation, registry anchor advancement and annotation
//! classification. [`diff_keyed`] does it once for all of them.

use std::collections::HashSet;
use std::hash::Hash;

/// Result of comparing `current` against `desired`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedDiff<C, D> {
    /// Only in desired; in desired order.
    pub added: Vec<D>,
    /// Only in current; in current order.
    pub removed: Vec<C>,
    /// In both, paired; in desired order.
    pub kept: Vec<(C, D)>,
}

/// Compare two collections by key.
///
/// Keys are expected to be unique within each side; on duplicates the first
/// occurrence wins and later ones are ignored.
pub fn diff_keyed<C, D, K, FC, FD>(
    current: impl IntoIterator<Item = C>,
    desired: impl IntoIterator<Item = D>,
    current_key: FC,
    desired_key: FD,
) -> KeyedDiff<C, D>
where
    K: Eq + Hash,
    FC: Fn(&C) -> K,
    FD: Fn(&D) -> K,
{
    let mut current_seen = HashSet::new();
    let mut current: Vec<Option<C>> = current
        .into_iter()
        .filter(|c| current_seen.insert(current_key(c)))
        .map(Some)
        .collect();

    let mut index = std::collections::HashMap::with_capacity(current.len());
    for (i, c) in current.iter().enumerate() {
        if let Some(c) = c {
            index.insert(current_key(c), i);
        }
    }

    let mut added = Vec::new();
    let mut kept = Vec::new();
    let mut desired_seen = HashSet::new();
    for d in desired {
        let key = desired_key(&d);
        if !desired_seen.insert(desired_key(&d)) {
            continue;
        }
        match index.get(&key).and_then(|&i| current[i].take()) {
            Some(c) => kept.push((c, d)),
            None => added.push(d),
        }
    }

    let removed = current.into_iter().flatten().collect();
    KeyedDiff {
        added,
        removed,
        kept,
    }
}
