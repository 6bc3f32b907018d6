use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::IntoEnumIterator;

#[derive(
    Debug,
    strum::EnumIter,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum RequestStatus {
    HIT = 0,
    /// miss that filled an invalid way
    MISS_EMPTY,
    /// miss that replaced the least recently used way
    MISS_EVICTION,
}

pub type CacheCsvRow = (RequestStatus, usize);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    pub accesses: HashMap<RequestStatus, usize>,
    /// Number of explicit flushes.
    pub num_flushes: usize,
    /// Number of dirty lines written back (on eviction or flush).
    pub num_writebacks: usize,
}

impl Cache {
    #[must_use]
    pub fn flatten(self) -> Vec<CacheCsvRow> {
        let mut flattened: Vec<_> = self.accesses.into_iter().collect();
        flattened.sort_by_key(|(status, _)| *status);
        flattened
    }

    #[inline]
    pub fn inc(&mut self, status: RequestStatus, count: usize) {
        *self.accesses.entry(status).or_insert(0) += count;
    }

    #[must_use]
    pub fn get(&self, status: RequestStatus) -> usize {
        self.accesses.get(&status).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_accesses(&self) -> usize {
        self.accesses.values().sum()
    }

    #[must_use]
    pub fn num_hits(&self) -> usize {
        self.get(RequestStatus::HIT)
    }

    #[must_use]
    pub fn num_misses(&self) -> usize {
        self.get(RequestStatus::MISS_EMPTY) + self.get(RequestStatus::MISS_EVICTION)
    }

    /// Fraction of accesses that hit, or `None` before the first access.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.total_accesses();
        if total == 0 {
            return None;
        }
        Some(self.num_hits() as f64 / total as f64)
    }
}

impl std::ops::AddAssign for Cache {
    fn add_assign(&mut self, other: Self) {
        for (k, v) in other.accesses {
            *self.accesses.entry(k).or_insert(0) += v;
        }
        self.num_flushes += other.num_flushes;
        self.num_writebacks += other.num_writebacks;
    }
}

impl Default for Cache {
    fn default() -> Self {
        let accesses = RequestStatus::iter().map(|status| (status, 0)).collect();
        Self {
            accesses,
            num_flushes: 0,
            num_writebacks: 0,
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut accesses: Vec<_> = self
            .accesses
            .iter()
            .filter(|(_, &count)| count > 0)
            .collect();
        accesses.sort_by_key(|(status, _)| **status);

        let mut out = f.debug_struct("CacheStats");
        for (status, count) in accesses {
            out.field(&format!("{status:?}"), count);
        }
        out.field("flushes", &self.num_flushes);
        out.field("writebacks", &self.num_writebacks);
        out.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cache, RequestStatus};

    #[test]
    fn default_has_zero_entry_per_status() {
        let stats = Cache::default();
        assert_eq!(stats.accesses.len(), 3);
        assert_eq!(stats.total_accesses(), 0);
        assert_eq!(stats.hit_rate(), None);
    }

    #[test]
    fn add_assign_merges_counters() {
        let mut a = Cache::default();
        a.inc(RequestStatus::HIT, 3);
        a.inc(RequestStatus::MISS_EMPTY, 1);
        let mut b = Cache::default();
        b.inc(RequestStatus::HIT, 1);
        b.inc(RequestStatus::MISS_EVICTION, 2);
        b.num_writebacks = 1;
        a += b;
        assert_eq!(a.num_hits(), 4);
        assert_eq!(a.num_misses(), 3);
        assert_eq!(a.num_writebacks, 1);
        assert_eq!(a.hit_rate(), Some(4.0 / 7.0));
        assert_eq!(
            a.flatten(),
            vec![
                (RequestStatus::HIT, 4),
                (RequestStatus::MISS_EMPTY, 1),
                (RequestStatus::MISS_EVICTION, 2),
            ]
        );
    }
}
