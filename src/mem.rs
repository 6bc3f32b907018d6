//! Backing store (main memory) underneath the cache.

use crate::address;
use crate::addrdec::{self, LINE_SIZE, WORD_SIZE};

/// Fixed size unit of transfer between cache and backing store.
pub type CacheLine = [u8; LINE_SIZE];

/// Default backing store capacity in bytes (48 KiB).
pub const DEFAULT_CAPACITY: usize = 48 * 1024;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("access of {size} bytes at {addr:#x} exceeds memory capacity of {capacity} bytes")]
    OutOfRange {
        addr: address,
        size: usize,
        capacity: usize,
    },

    #[error("access of {size} bytes at {addr:#x} is not aligned")]
    Unaligned { addr: address, size: usize },
}

/// Word and line granular access to the memory behind a cache.
pub trait BackingStore: std::fmt::Debug {
    /// Capacity in bytes.
    #[must_use]
    fn capacity(&self) -> usize;

    fn read_word(&self, addr: address) -> Result<u32, Error>;

    fn write_word(&mut self, addr: address, value: u32) -> Result<(), Error>;

    /// Reads the line starting at the line aligned address `addr`.
    fn read_line(&self, addr: address) -> Result<CacheLine, Error>;

    /// Writes the line starting at the line aligned address `addr`.
    fn write_line(&mut self, addr: address, line: &CacheLine) -> Result<(), Error>;
}

/// Main memory.
///
/// A flat, zero initialized byte array. Words are little endian.
#[derive(Clone, PartialEq, Eq)]
pub struct MainMemory {
    data: Vec<u8>,
}

impl std::fmt::Debug for MainMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MainMemory")
            .field("capacity", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl Default for MainMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MainMemory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
        }
    }

    /// Raw view of the memory contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, addr: address, size: usize) -> Result<std::ops::Range<usize>, Error> {
        let start = addr as usize;
        let capacity = self.data.len();
        match start.checked_add(size) {
            Some(end) if end <= capacity => Ok(start..end),
            _ => Err(Error::OutOfRange {
                addr,
                size,
                capacity,
            }),
        }
    }

    fn line_range(&self, addr: address) -> Result<std::ops::Range<usize>, Error> {
        if addrdec::line_offset(addr) != 0 {
            return Err(Error::Unaligned {
                addr,
                size: LINE_SIZE,
            });
        }
        self.range(addr, LINE_SIZE)
    }
}

impl BackingStore for MainMemory {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read_word(&self, addr: address) -> Result<u32, Error> {
        let range = self.range(addr, WORD_SIZE)?;
        let mut bytes = [0u8; WORD_SIZE];
        bytes.copy_from_slice(&self.data[range]);
        Ok(u32::from_le_bytes(bytes))
    }

    fn write_word(&mut self, addr: address, value: u32) -> Result<(), Error> {
        let range = self.range(addr, WORD_SIZE)?;
        self.data[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn read_line(&self, addr: address) -> Result<CacheLine, Error> {
        let range = self.line_range(addr)?;
        let mut line = [0u8; LINE_SIZE];
        line.copy_from_slice(&self.data[range]);
        Ok(line)
    }

    fn write_line(&mut self, addr: address, line: &CacheLine) -> Result<(), Error> {
        let range = self.line_range(addr)?;
        self.data[range].copy_from_slice(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BackingStore, Error, MainMemory};

    #[test]
    fn test_memory_word() -> Result<(), Error> {
        let mut mem = MainMemory::new(0x8000);
        mem.write_word(0x10, 0x1234_5678)?;
        assert_eq!(mem.read_word(0x10)?, 0x1234_5678);
        assert_eq!(&mem.as_bytes()[0x10..0x14], &[0x78, 0x56, 0x34, 0x12]);
        Ok(())
    }

    #[test]
    fn test_memory_line() -> Result<(), Error> {
        let mut mem = MainMemory::new(0x100);
        let mut line = [0u8; super::LINE_SIZE];
        line[4] = 0xab;
        mem.write_line(0x40, &line)?;
        assert_eq!(mem.read_word(0x44)?, 0xab);
        assert_eq!(mem.read_line(0x40)?, line);
        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let mut mem = MainMemory::new(64);
        assert_eq!(mem.read_word(60), Ok(0));
        assert_eq!(
            mem.read_word(61),
            Err(Error::OutOfRange {
                addr: 61,
                size: 4,
                capacity: 64
            })
        );
        assert!(matches!(
            mem.write_line(64, &[1; super::LINE_SIZE]),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            mem.read_word(u32::MAX),
            Err(Error::OutOfRange { .. })
        ));
        assert!(mem.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_unaligned_line() {
        let mem = MainMemory::new(64);
        assert_eq!(
            mem.read_line(4),
            Err(Error::Unaligned { addr: 4, size: 32 })
        );
    }
}
