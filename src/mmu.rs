//! Virtual memory in front of the cache.

use crate::addrdec::{self, VirtualAddress, PAGE_NUMBER_MASK, PTE_SIZE};
use crate::cache::Cache;
use crate::event::EventSink;
use crate::mem::{self, BackingStore, MainMemory};
use crate::{address, tlb};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum State {
    Disabled,
    Enabled,
}

/// Memory management unit.
///
/// Translates virtual addresses using a two entry TLB backed by a single
/// level page table that lives in physical memory. Page table entries are
/// fetched through the cache with physical addresses, so a page table walk
/// never triggers another translation.
///
/// Nothing invalidates the TLB: after changing a page table entry, the TLB
/// may keep serving the old translation.
///
/// A page table walk is reported as `tlb_miss`, `translation_start`, the
/// cache events of the entry fetch and `translation_end`. The entry address
/// is checked first, so a walk that fails reports nothing.
#[derive(Debug, Clone)]
pub struct Mmu<M = MainMemory, S = ()> {
    cache: Cache<M, S>,
    tlb: tlb::Tlb,
    state: State,
    /// Base address of the most recent `enable`, kept while disabled.
    page_table_base: address,
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new(Cache::default())
    }
}

impl<M, S> Mmu<M, S>
where
    M: BackingStore,
    S: EventSink,
{
    #[must_use]
    pub fn new(cache: Cache<M, S>) -> Self {
        Self {
            cache,
            tlb: tlb::Tlb::new(),
            state: State::Disabled,
            page_table_base: 0,
        }
    }

    /// Creates a disabled MMU over a fresh cache.
    #[must_use]
    pub fn with_memory(memory: M, sink: S) -> Self {
        Self::new(Cache::new(memory, sink))
    }

    /// Enables translation using the page table at physical address `page_table_base`.
    pub fn enable(&mut self, page_table_base: address) {
        log::debug!("mmu::enable(page_table_base={:#x})", page_table_base);
        self.state = State::Enabled;
        self.page_table_base = page_table_base;
    }

    /// Disables translation. The TLB keeps its entries.
    pub fn disable(&mut self) {
        log::debug!("mmu::disable");
        self.state = State::Disabled;
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state == State::Enabled
    }

    #[must_use]
    pub fn page_table_base(&self) -> address {
        self.page_table_base
    }

    fn pte_addr(&self, page_table_base: address, vpn: address) -> Result<address, mem::Error> {
        addrdec::pte_addr(page_table_base, vpn).ok_or_else(|| mem::Error::OutOfRange {
            addr: page_table_base,
            size: PTE_SIZE as usize * ((vpn & PAGE_NUMBER_MASK) as usize + 1),
            capacity: self.cache.memory().capacity(),
        })
    }

    /// Translates `addr` to a physical address.
    ///
    /// Returns `addr` unchanged when translation is disabled.
    pub fn translate(&mut self, addr: address) -> Result<address, mem::Error> {
        if self.state == State::Disabled {
            return Ok(addr);
        }

        let va = VirtualAddress::new(addr);
        if let Some(ppn) = self.tlb.lookup(va.vpn) {
            self.cache.sink_mut().tlb_hit(va.vpn);
            let physical = va.physical(ppn);
            log::trace!(
                "mmu::translate({:#x}) => tlb hit vpn={} ppn={} => {:#x}",
                addr,
                va.vpn,
                ppn,
                physical
            );
            return Ok(physical);
        }

        // page table is addressed physically
        let pte_addr = self.pte_addr(self.page_table_base, va.vpn)?;
        self.cache.check_range(pte_addr)?;

        self.cache.sink_mut().tlb_miss(va.vpn);
        self.cache.sink_mut().translation_start(addr);
        let pte = self.cache.read(pte_addr)?;
        let ppn = pte & PAGE_NUMBER_MASK;
        let physical = va.physical(ppn);

        self.cache.sink_mut().translation_end(physical);
        log::debug!(
            "mmu::translate({:#x}) => walked pte {:#x} = {:#x}: vpn={} ppn={} => {:#x}",
            addr,
            pte_addr,
            pte,
            va.vpn,
            ppn,
            physical
        );
        self.tlb.insert(va.vpn, ppn);
        Ok(physical)
    }

    pub fn read(&mut self, addr: address) -> Result<u32, mem::Error> {
        let physical = self.translate(addr)?;
        self.cache.read(physical)
    }

    pub fn write(&mut self, addr: address, value: u32) -> Result<(), mem::Error> {
        let physical = self.translate(addr)?;
        self.cache.write(physical, value)
    }

    /// Resets the cache. The TLB is not affected.
    pub fn initialize_cache(&mut self) {
        self.cache.initialize();
    }

    /// Flushes the cache. The TLB is not affected.
    pub fn flush(&mut self) -> Result<usize, mem::Error> {
        self.cache.flush()
    }

    /// Reads a word directly from physical memory, bypassing cache and TLB.
    ///
    /// Does not observe dirty lines still held by the cache.
    pub fn load_word(&mut self, physical_addr: address) -> Result<u32, mem::Error> {
        let (memory, sink) = self.cache.memory_and_sink_mut();
        let value = memory.read_word(physical_addr)?;
        sink.backing_read(physical_addr, value);
        Ok(value)
    }

    /// Writes a word directly to physical memory, bypassing cache and TLB.
    ///
    /// Used to set up page tables. A line of the same address already held by
    /// the cache is not updated.
    pub fn store_word(&mut self, physical_addr: address, value: u32) -> Result<(), mem::Error> {
        let (memory, sink) = self.cache.memory_and_sink_mut();
        memory.write_word(physical_addr, value)?;
        sink.backing_write(physical_addr, value);
        Ok(())
    }

    /// Writes the page table entry mapping `vpn` to `ppn` for the page table at
    /// `page_table_base`, directly to physical memory.
    pub fn map_page(
        &mut self,
        page_table_base: address,
        vpn: address,
        ppn: address,
    ) -> Result<(), mem::Error> {
        let pte_addr = self.pte_addr(page_table_base, vpn)?;
        self.store_word(pte_addr, ppn & PAGE_NUMBER_MASK)
    }

    #[must_use]
    pub fn tlb(&self) -> &tlb::Tlb {
        &self.tlb
    }

    #[must_use]
    pub fn cache(&self) -> &Cache<M, S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache<M, S> {
        &mut self.cache
    }

    #[must_use]
    pub fn into_cache(self) -> Cache<M, S> {
        self.cache
    }
}
