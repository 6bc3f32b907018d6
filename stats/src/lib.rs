#![allow(non_camel_case_types, clippy::upper_case_acronyms)]

pub mod cache;
pub mod dram;
pub mod tlb;

pub use cache::Cache;
pub use dram::DRAM;
pub use tlb::Tlb;

use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub cache: Cache,
    pub tlb: Tlb,
    pub dram: DRAM,
}

impl std::ops::AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.cache += other.cache;
        self.tlb += other.tlb;
        self.dram += other.dram;
    }
}
