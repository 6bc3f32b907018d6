use crate::addrdec::{LINE_SIZE, WORD_SIZE};
use crate::{address, mem};

/// Line status.
///
/// A `MODIFIED` line is valid and dirty, so an `INVALID` line can never be dirty.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Status {
    INVALID = 0,
    VALID,
    MODIFIED,
}

/// One way of a cache set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Line {
    pub tag: address,
    pub status: Status,
    pub last_access_time: u64,
    data: mem::CacheLine,
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("tag", &self.tag)
            .field("status", &self.status)
            .field("last_access", &self.last_access_time)
            .finish()
    }
}

impl Default for Line {
    fn default() -> Self {
        Self {
            tag: 0,
            status: Status::INVALID,
            last_access_time: 0,
            data: [0; LINE_SIZE],
        }
    }
}

impl Line {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the line to invalid, clean, zeroed data.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Installs a freshly fetched line.
    #[inline]
    pub fn allocate(&mut self, tag: address, data: mem::CacheLine, time: u64) {
        self.tag = tag;
        self.data = data;
        self.status = Status::VALID;
        self.last_access_time = time;
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status != Status::INVALID
    }

    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.status == Status::INVALID
    }

    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.status == Status::MODIFIED
    }

    /// Hit check: only valid lines match a tag.
    #[inline]
    #[must_use]
    pub fn matches(&self, tag: address) -> bool {
        self.is_valid() && self.tag == tag
    }

    #[inline]
    pub fn set_last_access_time(&mut self, time: u64) {
        self.last_access_time = time;
    }

    /// Marks a modified line as clean after write back.
    #[inline]
    pub fn clean(&mut self) {
        if self.is_modified() {
            self.status = Status::VALID;
        }
    }

    #[must_use]
    pub fn data(&self) -> &mem::CacheLine {
        &self.data
    }

    /// Reads the little endian word at `offset`.
    ///
    /// # Panics
    /// If the word does not fit in the line.
    #[inline]
    #[must_use]
    pub fn read_word(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; WORD_SIZE];
        bytes.copy_from_slice(&self.data[offset..offset + WORD_SIZE]);
        u32::from_le_bytes(bytes)
    }

    /// Writes the little endian word at `offset` and marks the line modified.
    ///
    /// # Panics
    /// If the line is invalid or the word does not fit in the line.
    #[inline]
    pub fn write_word(&mut self, offset: usize, value: u32) {
        debug_assert!(self.is_valid(), "write to invalid line");
        self.data[offset..offset + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
        self.status = Status::MODIFIED;
    }
}
