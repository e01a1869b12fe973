//! Oldest-First Eviction
//!
//! Victim selection shared by every capacity-bounded map in the crate. Callers
//! supply an orderable age per key; the smallest ages are dropped first.

// == Eviction Count ==
/// Entries to drop from a map holding `len` so that one insert afterwards
/// leaves it within `ceil(max_size / 2)`.
pub fn eviction_count(len: usize, max_size: usize) -> usize {
    let keep = max_size.div_ceil(2).saturating_sub(1);
    len.saturating_sub(keep)
}

// == Victim Selection ==
/// Keys of the `count` oldest items by age.
pub fn oldest_keys<'a, K, A>(items: impl Iterator<Item = (&'a K, A)>, count: usize) -> Vec<K>
where
    K: Clone + 'a,
    A: Ord,
{
    let mut by_age: Vec<(&K, A)> = items.collect();
    by_age.sort_unstable_by(|a, b| a.1.cmp(&b.1));
    by_age
        .into_iter()
        .take(count)
        .map(|(key, _)| key.clone())
        .collect()
}
