//! Validity oracle: decides whether a group of items forms a set
//!
//! The game core treats the oracle as opaque: it only asks whether a claimed
//! group is valid and whether any valid group exists among some items. Both
//! calls are pure and may run concurrently.

use std::fmt;
use std::sync::Arc;

use crate::domain::Item;

#[cfg_attr(test, mockall::automock)]
pub trait ValidityOracle: Send + Sync {
    /// Is this exact group of items a valid combination?
    fn is_valid(&self, items: &[Item]) -> bool;

    /// Up to `limit` valid combinations drawn from `items`
    fn find_combinations(&self, items: &[Item], limit: usize) -> Vec<Vec<Item>>;
}

/// Enumerate `k`-subsets of `items` in lexicographic index order, keeping those
/// accepted by `accept`, stopping after `limit` hits.
fn search_combinations<F>(items: &[Item], k: usize, limit: usize, accept: F) -> Vec<Vec<Item>>
where
    F: Fn(&[Item]) -> bool,
{
    let mut found = Vec::new();
    if k == 0 || k > items.len() || limit == 0 {
        return found;
    }

    let n = items.len();
    let mut idx: Vec<usize> = (0..k).collect();
    let mut group = Vec::with_capacity(k);

    loop {
        group.clear();
        group.extend(idx.iter().map(|&i| items[i]));
        if accept(&group) {
            found.push(group.clone());
            if found.len() >= limit {
                return found;
            }
        }

        // Advance to the next combination
        let mut i = k;
        while i > 0 {
            i -= 1;
            if idx[i] != i + n - k {
                break;
            }
            if i == 0 {
                return found;
            }
        }
        if idx[i] == i + n - k {
            return found;
        }
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// The classic card rule: each item encodes `feature_count` features, each
/// taking one of `feature_size` values. A group of `feature_size` items is a
/// set when, for every feature, the values are all equal or all distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCardOracle {
    feature_size: usize,
    feature_count: usize,
}

impl SetCardOracle {
    pub fn new(feature_size: usize, feature_count: usize) -> Self {
        Self {
            feature_size,
            feature_count,
        }
    }

    /// Number of distinct items (`feature_size ^ feature_count`)
    pub fn deck_size(&self) -> usize {
        self.feature_size.pow(self.feature_count as u32)
    }

    /// Feature values of an item, least significant feature first
    pub fn features(&self, item: Item) -> Vec<usize> {
        let mut rest = item.index();
        (0..self.feature_count)
            .map(|_| {
                let value = rest % self.feature_size;
                rest /= self.feature_size;
                value
            })
            .collect()
    }
}

impl ValidityOracle for SetCardOracle {
    fn is_valid(&self, items: &[Item]) -> bool {
        if items.len() != self.feature_size || self.feature_size < 2 {
            return false;
        }
        if items.iter().any(|i| i.index() >= self.deck_size()) {
            return false;
        }

        let features: Vec<Vec<usize>> = items.iter().map(|&i| self.features(i)).collect();
        (0..self.feature_count).all(|f| {
            let mut values: Vec<usize> = features.iter().map(|card| card[f]).collect();
            values.sort_unstable();
            values.dedup();
            values.len() == 1 || values.len() == items.len()
        })
    }

    fn find_combinations(&self, items: &[Item], limit: usize) -> Vec<Vec<Item>> {
        search_combinations(items, self.feature_size, limit, |group| {
            self.is_valid(group)
        })
    }
}

type Predicate = dyn Fn(&[Item]) -> bool + Send + Sync;

/// Closure-backed oracle for embedding custom rules
#[derive(Clone)]
pub struct PredicateOracle {
    set_size: usize,
    predicate: Arc<Predicate>,
}

impl PredicateOracle {
    pub fn new<F>(set_size: usize, predicate: F) -> Self
    where
        F: Fn(&[Item]) -> bool + Send + Sync + 'static,
    {
        Self {
            set_size,
            predicate: Arc::new(predicate),
        }
    }

    /// Accepts every group of the right size
    pub fn always(set_size: usize) -> Self {
        Self::new(set_size, |_| true)
    }

    /// Rejects everything
    pub fn never(set_size: usize) -> Self {
        Self::new(set_size, |_| false)
    }
}

impl fmt::Debug for PredicateOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateOracle")
            .field("set_size", &self.set_size)
            .finish()
    }
}

impl ValidityOracle for PredicateOracle {
    fn is_valid(&self, items: &[Item]) -> bool {
        items.len() == self.set_size && (self.predicate)(items)
    }

    fn find_combinations(&self, items: &[Item], limit: usize) -> Vec<Vec<Item>> {
        search_combinations(items, self.set_size, limit, |group| {
            (self.predicate)(group)
        })
    }
}
