use crate::address;
use crate::addrdec::PAGE_NUMBER_MASK;

/// Number of TLB entries.
pub const NUM_ENTRIES: usize = 2;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Entry {
    pub vpn: address,
    pub ppn: address,
}

/// Translation lookaside buffer.
///
/// Replacement is strict round robin: the slot written next alternates after
/// every insertion, independent of lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tlb {
    entries: [Option<Entry>; NUM_ENTRIES],
    next: usize,
}

impl Tlb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the physical page number for `vpn`.
    #[must_use]
    pub fn lookup(&self, vpn: address) -> Option<address> {
        self.entries
            .iter()
            .flatten()
            .find(|entry| entry.vpn == vpn)
            .map(|entry| entry.ppn)
    }

    /// Installs a translation into the next round robin slot.
    ///
    /// # Returns
    /// The slot written and the entry it replaced, if any.
    pub fn insert(&mut self, vpn: address, ppn: address) -> (usize, Option<Entry>) {
        let slot = self.next;
        let entry = Entry {
            vpn: vpn & PAGE_NUMBER_MASK,
            ppn: ppn & PAGE_NUMBER_MASK,
        };
        let replaced = self.entries[slot].replace(entry);
        log::debug!(
            "tlb::insert(vpn={}, ppn={}) => slot {} (replaced {:?})",
            entry.vpn,
            entry.ppn,
            slot,
            replaced
        );
        self.next = (self.next + 1) % NUM_ENTRIES;
        (slot, replaced)
    }

    #[must_use]
    pub fn entries(&self) -> &[Option<Entry>; NUM_ENTRIES] {
        &self.entries
    }

    /// Slot the next insertion will overwrite.
    #[must_use]
    pub fn next_slot(&self) -> usize {
        self.next
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
