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
pub enum AccessKind {
    WORD_READ = 0,
    WORD_WRITE,
    LINE_READ,
    LINE_WRITE,
}

/// Backing store traffic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DRAM {
    /// Number of accesses per kind
    pub accesses: HashMap<AccessKind, u64>,
    /// Number of bytes moved in either direction
    pub bytes: u64,
}

impl Default for DRAM {
    fn default() -> Self {
        Self {
            accesses: AccessKind::iter().map(|kind| (kind, 0)).collect(),
            bytes: 0,
        }
    }
}

impl std::ops::AddAssign for DRAM {
    fn add_assign(&mut self, other: Self) {
        for (k, v) in other.accesses {
            *self.accesses.entry(k).or_insert(0) += v;
        }
        self.bytes += other.bytes;
    }
}

impl DRAM {
    #[inline]
    pub fn inc(&mut self, kind: AccessKind, bytes: u64) {
        *self.accesses.entry(kind).or_insert(0) += 1;
        self.bytes += bytes;
    }

    #[must_use]
    pub fn get(&self, kind: AccessKind) -> u64 {
        self.accesses.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.get(AccessKind::WORD_READ) + self.get(AccessKind::LINE_READ)
    }
}
