//! Set associative write-back cache in front of a backing store.

pub mod block;

pub use block::Line;

use crate::address;
use crate::addrdec::{self, ASSOCIATIVITY, LINE_SIZE, NUM_SETS, WORD_SIZE};
use crate::event::{EventSink, MissKind};
use crate::mem::{self, BackingStore, MainMemory};

#[derive(Debug, strum::EnumIter, Clone, Copy, Hash, PartialEq, Eq)]
pub enum RequestStatus {
    HIT = 0,
    /// Miss served by an invalid way.
    MISS_EMPTY,
    /// Miss served by replacing the least recently used way.
    MISS_EVICTION,
}

impl RequestStatus {
    #[must_use]
    pub fn miss_kind(self) -> Option<MissKind> {
        match self {
            Self::HIT => None,
            Self::MISS_EMPTY => Some(MissKind::Empty),
            Self::MISS_EVICTION => Some(MissKind::Eviction),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessKind {
    Read,
    Write(u32),
}

/// A 4 set, 2 way, write-back, write-allocate cache with LRU replacement.
///
/// Recency is tracked with a single logical clock shared by all sets that
/// advances on every hit and every fill. On a tie, way 0 is evicted.
#[derive(Debug, Clone)]
pub struct Cache<M = MainMemory, S = ()> {
    /// `NUM_SETS` x `ASSOCIATIVITY` lines in total
    lines: Vec<Line>,
    time: u64,
    memory: M,
    sink: S,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(MainMemory::default(), ())
    }
}

impl<M, S> Cache<M, S>
where
    M: BackingStore,
    S: EventSink,
{
    #[must_use]
    pub fn new(memory: M, sink: S) -> Self {
        let lines = (0..NUM_SETS * ASSOCIATIVITY)
            .map(|_| Line::default())
            .collect();
        Self {
            lines,
            time: 0,
            memory,
            sink,
        }
    }

    /// Invalidates every line without writing anything back.
    pub fn initialize(&mut self) {
        log::debug!("cache::initialize");
        for line in &mut self.lines {
            line.reset();
        }
        self.time = 0;
    }

    /// Reads the word at `addr`.
    pub fn read(&mut self, addr: address) -> Result<u32, mem::Error> {
        self.access(addr, AccessKind::Read)
    }

    /// Writes `value` to the word at `addr`.
    ///
    /// The line is allocated on a miss and written back only when evicted
    /// or flushed.
    pub fn write(&mut self, addr: address, value: u32) -> Result<(), mem::Error> {
        self.access(addr, AccessKind::Write(value))?;
        Ok(())
    }

    /// Writes back all modified lines and invalidates the whole cache.
    ///
    /// # Returns
    /// The number of dirty lines written back.
    pub fn flush(&mut self) -> Result<usize, mem::Error> {
        self.sink.cache_flush();
        let mut flushed = 0;
        for (idx, line) in self.lines.iter_mut().enumerate() {
            if line.is_modified() {
                let set_index = idx / ASSOCIATIVITY;
                let block_addr = addrdec::compose(line.tag, set_index, 0);
                log::debug!(
                    "cache::flush: writing back line {} to {:#x}",
                    line,
                    block_addr
                );
                self.memory.write_line(block_addr, line.data())?;
                self.sink.backing_line_write(block_addr, line.data());
                flushed += 1;
            }
            line.reset();
        }
        log::debug!("cache::flush: {} dirty lines written back", flushed);
        Ok(flushed)
    }

    /// Probes a set for a tag.
    ///
    /// # Returns
    /// The way to use and the request status. On a miss, the first invalid way
    /// is preferred, otherwise the least recently used way.
    #[must_use]
    pub fn probe(&self, tag: address, set_index: usize) -> (usize, RequestStatus) {
        let mut invalid_way = None;
        let mut valid_way = None;
        let mut valid_time = u64::MAX;

        for way in 0..ASSOCIATIVITY {
            let line = &self.lines[set_index * ASSOCIATIVITY + way];
            log::trace!(
                "cache::probe(tag={:#x}, set={}) => checking way {} (tag={:#x}, status={:?}, last_access={})",
                tag,
                set_index,
                way,
                line.tag,
                line.status,
                line.last_access_time,
            );
            if line.matches(tag) {
                return (way, RequestStatus::HIT);
            }
            if line.is_invalid() {
                invalid_way.get_or_insert(way);
            } else if line.last_access_time < valid_time {
                valid_time = line.last_access_time;
                valid_way = Some(way);
            }
        }

        match (invalid_way, valid_way) {
            (Some(invalid), _) => (invalid, RequestStatus::MISS_EMPTY),
            (None, Some(valid)) => (valid, RequestStatus::MISS_EVICTION),
            (None, None) => unreachable!("set without ways"),
        }
    }

    /// Checks that the word at `addr` and its line can be cached.
    pub(crate) fn check_range(&self, addr: address) -> Result<(), mem::Error> {
        let capacity = self.memory.capacity();
        let block_end = (addrdec::block_addr(addr) as usize).saturating_add(LINE_SIZE);
        if (addr as usize).saturating_add(WORD_SIZE) > capacity || block_end > capacity {
            return Err(mem::Error::OutOfRange {
                addr,
                size: WORD_SIZE,
                capacity,
            });
        }
        if addrdec::line_offset(addr) + WORD_SIZE > LINE_SIZE {
            return Err(mem::Error::Unaligned {
                addr,
                size: WORD_SIZE,
            });
        }
        Ok(())
    }

    fn access(&mut self, addr: address, kind: AccessKind) -> Result<u32, mem::Error> {
        self.check_range(addr)?;

        let decomposed = addrdec::Decomposed::new(addr);
        let set_index = decomposed.set_index;
        let (way, status) = self.probe(decomposed.tag, set_index);
        let index = set_index * ASSOCIATIVITY + way;

        log::trace!(
            "cache::access({:#x}, {:?}) [{}] => {:?} way={}",
            addr,
            kind,
            decomposed,
            status,
            way
        );

        match status.miss_kind() {
            None => {
                self.time += 1;
                self.lines[index].set_last_access_time(self.time);
                self.sink.cache_hit(addr, set_index, way);
            }
            Some(miss_kind) => {
                let line = &mut self.lines[index];
                if line.is_modified() {
                    let evicted_addr = addrdec::compose(line.tag, set_index, 0);
                    log::debug!(
                        "cache::access({:#x}): evicting dirty line {} to {:#x}",
                        addr,
                        line,
                        evicted_addr
                    );
                    self.memory.write_line(evicted_addr, line.data())?;
                    self.sink.backing_line_write(evicted_addr, line.data());
                    line.clean();
                }

                let block_addr = addrdec::block_addr(addr);
                let data = self.memory.read_line(block_addr)?;
                self.sink.backing_line_read(block_addr, &data);

                self.time += 1;
                line.allocate(decomposed.tag, data, self.time);
                log::debug!(
                    "cache::access({:#x}): filled set {} way {} ({:?})",
                    addr,
                    set_index,
                    way,
                    miss_kind
                );
                self.sink.cache_miss(addr, set_index, way, miss_kind);
            }
        }

        let line = &mut self.lines[index];
        match kind {
            AccessKind::Read => Ok(line.read_word(decomposed.offset)),
            AccessKind::Write(value) => {
                line.write_word(decomposed.offset, value);
                Ok(value)
            }
        }
    }

    /// The line stored in `way` of `set_index`.
    ///
    /// # Panics
    /// If `set_index` or `way` is out of bounds.
    #[must_use]
    pub fn line(&self, set_index: usize, way: usize) -> &Line {
        assert!(way < ASSOCIATIVITY, "way {way} out of bounds");
        &self.lines[set_index * ASSOCIATIVITY + way]
    }

    /// All lines, ordered by set then way.
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[must_use]
    pub fn num_dirty(&self) -> usize {
        self.lines.iter().filter(|line| line.is_modified()).count()
    }

    /// Current value of the recency clock.
    #[must_use]
    pub fn time(&self) -> u64 {
        self.time
    }

    #[must_use]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Direct access to the backing store, bypassing the cache.
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Splits borrows of the backing store and the sink.
    pub fn memory_and_sink_mut(&mut self) -> (&mut M, &mut S) {
        (&mut self.memory, &mut self.sink)
    }

    #[must_use]
    pub fn into_parts(self) -> (M, S) {
        (self.memory, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::{Cache, RequestStatus};
    use crate::addrdec::NUM_SETS;
    use crate::event::{self, Event, MissKind};
    use crate::mem::{self, BackingStore, MainMemory};
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;

    fn new_cache() -> Cache<MainMemory, Vec<Event>> {
        crate::testing::init_logging();
        Cache::new(MainMemory::default(), Vec::new())
    }

    /// Addresses mapping to set 0 with distinct tags.
    const A: u32 = 0;
    const B: u32 = 128;
    const C: u32 = 256;

    #[test]
    fn test_cold_start_misses_empty() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.initialize();
        for set in 0..NUM_SETS as u32 {
            cache.read(set * 32 + 4)?;
        }
        let kinds: Vec<_> = cache
            .sink()
            .iter()
            .filter_map(|event| match event {
                Event::CacheMiss { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        diff::assert_eq_sorted!(kinds, vec![MissKind::Empty; NUM_SETS]);
        Ok(())
    }

    #[test]
    fn test_miss_then_hit() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.memory_mut().write_word(0x44, 0xcafe)?;

        assert_eq!(cache.read(0x44)?, 0xcafe);
        assert_eq!(event::miss_kind(cache.sink()), Some(MissKind::Empty));
        cache.sink_mut().clear();

        assert_eq!(cache.read(0x44)?, 0xcafe);
        diff::assert_eq_sorted!(
            cache.sink().clone(),
            vec![Event::CacheHit {
                addr: 0x44,
                set: 2,
                way: 0
            }]
        );
        Ok(())
    }

    #[test]
    fn test_write_allocate() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.write(0x10, 42)?;
        assert_eq!(cache.read(0x10)?, 42);
        assert!(cache.line(0, 0).is_modified());
        assert_eq!(cache.num_dirty(), 1);
        // not written through
        assert_eq!(cache.memory().read_word(0x10)?, 0);
        assert!(event::line_writes(cache.sink()).is_empty());
        Ok(())
    }

    #[test]
    fn test_lru_eviction() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.read(A)?;
        cache.read(B)?;
        assert_eq!(cache.probe(crate::addrdec::tag(A), 0), (0, RequestStatus::HIT));
        assert_eq!(cache.probe(crate::addrdec::tag(B), 0), (1, RequestStatus::HIT));

        cache.sink_mut().clear();
        cache.read(C)?;
        diff::assert_eq_sorted!(
            cache.sink().last().cloned(),
            Some(Event::CacheMiss {
                addr: C,
                set: 0,
                way: 0,
                kind: MissKind::Eviction
            })
        );

        cache.sink_mut().clear();
        cache.read(B)?;
        assert!(event::was_hit(cache.sink()));

        cache.sink_mut().clear();
        cache.read(A)?;
        assert_eq!(event::miss_kind(cache.sink()), Some(MissKind::Eviction));
        // C was least recently used
        assert_eq!(cache.line(0, 0).tag, crate::addrdec::tag(A));
        assert_eq!(cache.line(0, 1).tag, crate::addrdec::tag(B));
        Ok(())
    }

    #[test]
    fn test_recency_clock_is_global() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.read(A)?; // t=1, set 0 way 0
        cache.read(32)?; // t=2, set 1 way 0
        cache.read(B)?; // t=3, set 0 way 1
        cache.read(32 + 128)?; // t=4, set 1 way 1
        cache.read(A)?; // t=5, hit
        assert_eq!(cache.time(), 5);
        assert_eq!(cache.line(0, 0).last_access_time, 5);
        assert_eq!(cache.line(1, 1).last_access_time, 4);
        assert_eq!(cache.probe(crate::addrdec::tag(C), 0), (1, RequestStatus::MISS_EVICTION));
        Ok(())
    }

    #[test]
    fn test_dirty_eviction_writes_back_once() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.write(A + 8, 0x11)?;
        cache.read(B)?;
        cache.sink_mut().clear();

        cache.read(C)?;
        let events = cache.sink().clone();
        diff::assert_eq_sorted!(event::line_writes(&events), vec![A]);
        diff::assert_eq_sorted!(event::line_reads(&events), vec![C]);
        let write_pos = events
            .iter()
            .position(|e| matches!(e, Event::BackingLineWrite { .. }));
        let read_pos = events
            .iter()
            .position(|e| matches!(e, Event::BackingLineRead { .. }));
        assert!(write_pos < read_pos);

        assert_eq!(cache.memory().read_word(A + 8)?, 0x11);
        // the refilled way is clean
        assert!(!cache.line(0, 0).is_modified());
        Ok(())
    }

    #[test]
    fn test_write_miss_eviction_marks_dirty() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.read(A)?;
        cache.read(B)?;
        cache.write(C + 4, 7)?;
        assert!(cache.line(0, 0).is_modified());
        assert_eq!(cache.line(0, 0).read_word(4), 7);
        assert!(!cache.line(0, 1).is_modified());
        Ok(())
    }

    #[test]
    fn test_flush_clean_cache() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.read(A)?;
        cache.read(0x60)?;
        cache.sink_mut().clear();

        assert_eq!(cache.flush()?, 0);
        diff::assert_eq_sorted!(cache.sink().clone(), vec![Event::CacheFlush]);
        assert!(cache.lines().iter().all(super::Line::is_invalid));
        Ok(())
    }

    #[test]
    fn test_flush_writes_back_dirty_lines() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.write(0x24, 1)?;
        cache.write(0x1a4, 2)?;
        cache.read(0x40)?;

        cache.sink_mut().clear();
        assert_eq!(cache.flush()?, 2);
        diff::assert_eq_sorted!(event::line_writes(cache.sink()), vec![0x20, 0x1a0]);
        assert_eq!(cache.memory().read_word(0x24)?, 1);
        assert_eq!(cache.memory().read_word(0x1a4)?, 2);
        assert!(cache
            .lines()
            .iter()
            .all(|line| *line == super::Line::default()));
        Ok(())
    }

    #[test]
    fn test_end_to_end() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.write(0, 0x1)?;
        assert_eq!(cache.read(0)?, 0x1);
        cache.write(128, 0x2)?;

        cache.sink_mut().clear();
        assert_eq!(cache.read(0)?, 0x1);
        assert!(event::was_hit(cache.sink()));
        assert_eq!(cache.read(128)?, 0x2);
        Ok(())
    }

    #[test]
    fn test_out_of_range_leaves_state_untouched() {
        let mut cache = Cache::new(MainMemory::new(64), Vec::new());
        assert_eq!(
            cache.read(64),
            Err(mem::Error::OutOfRange {
                addr: 64,
                size: 4,
                capacity: 64
            })
        );
        assert!(cache.write(62, 1).is_err());
        assert!(cache.sink().is_empty());
        assert_eq!(cache.time(), 0);
        assert!(cache.lines().iter().all(super::Line::is_invalid));
    }

    #[test]
    fn test_word_crossing_line_is_rejected() {
        let mut cache = new_cache();
        assert_eq!(
            cache.read(30),
            Err(mem::Error::Unaligned { addr: 30, size: 4 })
        );
        assert!(cache.sink().is_empty());
    }

    #[test]
    fn test_initialize_discards_dirty_lines() -> eyre::Result<()> {
        let mut cache = new_cache();
        cache.write(A, 9)?;
        cache.initialize();
        assert_eq!(cache.num_dirty(), 0);
        assert_eq!(cache.flush()?, 0);
        assert_eq!(cache.memory().read_word(A)?, 0);
        Ok(())
    }
}
