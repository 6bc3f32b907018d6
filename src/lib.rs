#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod addrdec;
pub mod cache;
pub mod config;
pub mod event;
pub mod mem;
pub mod mmu;
pub mod tlb;
pub mod trace;

#[cfg(test)]
pub mod testing;

pub use cache::Cache;
pub use config::Config;
pub use event::{Event, EventSink, MissKind};
pub use mem::{BackingStore, MainMemory};
pub use mmu::Mmu;

pub type address = u32;
