//! Address decomposition for the cache and for virtual memory.
//!
//! All fields are extracted with shift-and-mask arithmetic over [`address`].

use super::address;

/// Cache line size in bytes.
pub const LINE_SIZE: usize = 32;
pub const LINE_SIZE_LOG2: u32 = LINE_SIZE.trailing_zeros();

/// Number of cache sets.
pub const NUM_SETS: usize = 4;
pub const NUM_SETS_LOG2: u32 = NUM_SETS.trailing_zeros();

/// Number of ways per set.
pub const ASSOCIATIVITY: usize = 2;

/// The tag holds every address bit above the set index.
pub const TAG_BITS: u32 = address::BITS - LINE_SIZE_LOG2 - NUM_SETS_LOG2;
pub const TAG_MASK: address = address::MAX >> (LINE_SIZE_LOG2 + NUM_SETS_LOG2);

pub const OFFSET_MASK: address = LINE_SIZE as address - 1;
pub const SET_INDEX_MASK: address = NUM_SETS as address - 1;

/// Size of a word in bytes.
pub const WORD_SIZE: usize = 4;

/// Virtual page size in bytes.
pub const PAGE_SIZE: usize = 1024;
pub const PAGE_SIZE_LOG2: u32 = PAGE_SIZE.trailing_zeros();
pub const PAGE_OFFSET_MASK: address = PAGE_SIZE as address - 1;

/// Width of virtual and physical page numbers.
pub const PAGE_NUMBER_BITS: u32 = 6;
pub const PAGE_NUMBER_MASK: address = (1 << PAGE_NUMBER_BITS) - 1;

/// Size of a page table entry in bytes.
pub const PTE_SIZE: address = 4;

/// A cache address split into its tag, set index and line offset.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Decomposed {
    pub tag: address,
    pub set_index: usize,
    pub offset: usize,
}

impl Decomposed {
    #[inline]
    #[must_use]
    pub fn new(addr: address) -> Self {
        Self {
            tag: tag(addr),
            set_index: set_index(addr),
            offset: line_offset(addr),
        }
    }
}

impl std::fmt::Display for Decomposed {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "tag={:#x} set={} offset={}",
            self.tag, self.set_index, self.offset
        )
    }
}

#[inline]
#[must_use]
pub fn tag(addr: address) -> address {
    (addr >> (LINE_SIZE_LOG2 + NUM_SETS_LOG2)) & TAG_MASK
}

#[inline]
#[must_use]
pub fn set_index(addr: address) -> usize {
    ((addr >> LINE_SIZE_LOG2) & SET_INDEX_MASK) as usize
}

#[inline]
#[must_use]
pub fn line_offset(addr: address) -> usize {
    (addr & OFFSET_MASK) as usize
}

/// Line-aligned address containing `addr`.
#[inline]
#[must_use]
pub fn block_addr(addr: address) -> address {
    addr & !OFFSET_MASK
}

/// Rebuilds an address from its cache fields.
///
/// Used to find where a dirty line has to be written back.
#[inline]
#[must_use]
pub fn compose(tag: address, set_index: usize, offset: usize) -> address {
    ((tag & TAG_MASK) << (LINE_SIZE_LOG2 + NUM_SETS_LOG2))
        | ((set_index as address & SET_INDEX_MASK) << LINE_SIZE_LOG2)
        | (offset as address & OFFSET_MASK)
}

/// A virtual address split into page number and page offset.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct VirtualAddress {
    pub vpn: address,
    pub page_offset: address,
}

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub fn new(addr: address) -> Self {
        Self {
            vpn: (addr >> PAGE_SIZE_LOG2) & PAGE_NUMBER_MASK,
            page_offset: addr & PAGE_OFFSET_MASK,
        }
    }

    /// Physical address of this page offset within physical page `ppn`.
    #[inline]
    #[must_use]
    pub fn physical(&self, ppn: address) -> address {
        ((ppn & PAGE_NUMBER_MASK) << PAGE_SIZE_LOG2) | self.page_offset
    }
}

/// Physical address of the page table entry for `vpn`.
///
/// `None` if the entry lies beyond the end of the address space.
#[inline]
#[must_use]
pub fn pte_addr(page_table_base: address, vpn: address) -> Option<address> {
    page_table_base.checked_add(PTE_SIZE * (vpn & PAGE_NUMBER_MASK))
}
