use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tlb {
    pub hits: u64,
    pub misses: u64,
    /// Completed page table walks.
    pub translations: u64,
}

impl Tlb {
    #[must_use]
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

impl std::ops::AddAssign for Tlb {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.translations += other.translations;
    }
}
