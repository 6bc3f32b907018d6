use crate::address;
use crate::mem::CacheLine;

/// How a cache miss was served.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, strum::EnumIter)]
pub enum MissKind {
    /// The line was placed into an invalid way.
    Empty,
    /// The least recently used way was replaced.
    Eviction,
}

impl From<MissKind> for stats::cache::RequestStatus {
    fn from(kind: MissKind) -> Self {
        match kind {
            MissKind::Empty => Self::MISS_EMPTY,
            MissKind::Eviction => Self::MISS_EVICTION,
        }
    }
}

/// Observer of memory hierarchy events.
///
/// Every method is called synchronously at the point the event happens.
/// All methods default to doing nothing.
pub trait EventSink {
    fn cache_hit(&mut self, _addr: address, _set: usize, _way: usize) {}

    fn cache_miss(&mut self, _addr: address, _set: usize, _way: usize, _kind: MissKind) {}

    fn cache_flush(&mut self) {}

    fn backing_read(&mut self, _addr: address, _value: u32) {}

    fn backing_write(&mut self, _addr: address, _value: u32) {}

    fn backing_line_read(&mut self, _addr: address, _line: &CacheLine) {}

    fn backing_line_write(&mut self, _addr: address, _line: &CacheLine) {}

    fn tlb_hit(&mut self, _vpn: address) {}

    fn tlb_miss(&mut self, _vpn: address) {}

    fn translation_start(&mut self, _virtual_addr: address) {}

    fn translation_end(&mut self, _physical_addr: address) {}
}

/// No-op sink.
impl EventSink for () {}

impl<S> EventSink for &mut S
where
    S: EventSink + ?Sized,
{
    fn cache_hit(&mut self, addr: address, set: usize, way: usize) {
        (**self).cache_hit(addr, set, way);
    }
    fn cache_miss(&mut self, addr: address, set: usize, way: usize, kind: MissKind) {
        (**self).cache_miss(addr, set, way, kind);
    }
    fn cache_flush(&mut self) {
        (**self).cache_flush();
    }
    fn backing_read(&mut self, addr: address, value: u32) {
        (**self).backing_read(addr, value);
    }
    fn backing_write(&mut self, addr: address, value: u32) {
        (**self).backing_write(addr, value);
    }
    fn backing_line_read(&mut self, addr: address, line: &CacheLine) {
        (**self).backing_line_read(addr, line);
    }
    fn backing_line_write(&mut self, addr: address, line: &CacheLine) {
        (**self).backing_line_write(addr, line);
    }
    fn tlb_hit(&mut self, vpn: address) {
        (**self).tlb_hit(vpn);
    }
    fn tlb_miss(&mut self, vpn: address) {
        (**self).tlb_miss(vpn);
    }
    fn translation_start(&mut self, virtual_addr: address) {
        (**self).translation_start(virtual_addr);
    }
    fn translation_end(&mut self, physical_addr: address) {
        (**self).translation_end(physical_addr);
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Event {
    CacheHit {
        addr: address,
        set: usize,
        way: usize,
    },
    CacheMiss {
        addr: address,
        set: usize,
        way: usize,
        kind: MissKind,
    },
    CacheFlush,
    BackingRead {
        addr: address,
        value: u32,
    },
    BackingWrite {
        addr: address,
        value: u32,
    },
    BackingLineRead {
        addr: address,
        line: CacheLine,
    },
    BackingLineWrite {
        addr: address,
        line: CacheLine,
    },
    TlbHit {
        vpn: address,
    },
    TlbMiss {
        vpn: address,
    },
    TranslationStart {
        virtual_addr: address,
    },
    TranslationEnd {
        physical_addr: address,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::CacheHit { addr, set, way } => {
                write!(f, "cache hit: addr={addr:#06x} set={set} way={way}")
            }
            Self::CacheMiss {
                addr,
                set,
                way,
                kind,
            } => write!(
                f,
                "cache miss ({kind:?}): addr={addr:#06x} set={set} way={way}"
            ),
            Self::CacheFlush => write!(f, "cache flush"),
            Self::BackingRead { addr, value } => {
                write!(f, "memory read: addr={addr:#06x} value={value:#010x}")
            }
            Self::BackingWrite { addr, value } => {
                write!(f, "memory write: addr={addr:#06x} value={value:#010x}")
            }
            Self::BackingLineRead { addr, .. } => write!(f, "memory line read: addr={addr:#06x}"),
            Self::BackingLineWrite { addr, .. } => {
                write!(f, "memory line write: addr={addr:#06x}")
            }
            Self::TlbHit { vpn } => write!(f, "tlb hit: vpn={vpn}"),
            Self::TlbMiss { vpn } => write!(f, "tlb miss: vpn={vpn}"),
            Self::TranslationStart { virtual_addr } => {
                write!(f, "translation start: virtual={virtual_addr:#06x}")
            }
            Self::TranslationEnd { physical_addr } => {
                write!(f, "translation end: physical={physical_addr:#06x}")
            }
        }
    }
}

/// Records every event in order.
impl EventSink for Vec<Event> {
    fn cache_hit(&mut self, addr: address, set: usize, way: usize) {
        self.push(Event::CacheHit { addr, set, way });
    }
    fn cache_miss(&mut self, addr: address, set: usize, way: usize, kind: MissKind) {
        self.push(Event::CacheMiss {
            addr,
            set,
            way,
            kind,
        });
    }
    fn cache_flush(&mut self) {
        self.push(Event::CacheFlush);
    }
    fn backing_read(&mut self, addr: address, value: u32) {
        self.push(Event::BackingRead { addr, value });
    }
    fn backing_write(&mut self, addr: address, value: u32) {
        self.push(Event::BackingWrite { addr, value });
    }
    fn backing_line_read(&mut self, addr: address, line: &CacheLine) {
        self.push(Event::BackingLineRead { addr, line: *line });
    }
    fn backing_line_write(&mut self, addr: address, line: &CacheLine) {
        self.push(Event::BackingLineWrite { addr, line: *line });
    }
    fn tlb_hit(&mut self, vpn: address) {
        self.push(Event::TlbHit { vpn });
    }
    fn tlb_miss(&mut self, vpn: address) {
        self.push(Event::TlbMiss { vpn });
    }
    fn translation_start(&mut self, virtual_addr: address) {
        self.push(Event::TranslationStart { virtual_addr });
    }
    fn translation_end(&mut self, physical_addr: address) {
        self.push(Event::TranslationEnd { physical_addr });
    }
}

/// Accumulates counters.
impl EventSink for stats::Stats {
    fn cache_hit(&mut self, _addr: address, _set: usize, _way: usize) {
        self.cache.inc(stats::cache::RequestStatus::HIT, 1);
    }
    fn cache_miss(&mut self, _addr: address, _set: usize, _way: usize, kind: MissKind) {
        self.cache.inc(kind.into(), 1);
    }
    fn cache_flush(&mut self) {
        self.cache.num_flushes += 1;
    }
    fn backing_read(&mut self, _addr: address, _value: u32) {
        self.dram.inc(stats::dram::AccessKind::WORD_READ, 4);
    }
    fn backing_write(&mut self, _addr: address, _value: u32) {
        self.dram.inc(stats::dram::AccessKind::WORD_WRITE, 4);
    }
    fn backing_line_read(&mut self, _addr: address, line: &CacheLine) {
        self.dram
            .inc(stats::dram::AccessKind::LINE_READ, line.len() as u64);
    }
    fn backing_line_write(&mut self, _addr: address, line: &CacheLine) {
        self.cache.num_writebacks += 1;
        self.dram
            .inc(stats::dram::AccessKind::LINE_WRITE, line.len() as u64);
    }
    fn tlb_hit(&mut self, _vpn: address) {
        self.tlb.hits += 1;
    }
    fn tlb_miss(&mut self, _vpn: address) {
        self.tlb.misses += 1;
    }
    fn translation_end(&mut self, _physical_addr: address) {
        self.tlb.translations += 1;
    }
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct Trace;

impl Trace {
    #[allow(clippy::unused_self)]
    fn log(self, event: &Event) {
        log::debug!("{}", event);
    }
}

impl EventSink for Trace {
    fn cache_hit(&mut self, addr: address, set: usize, way: usize) {
        self.log(&Event::CacheHit { addr, set, way });
    }
    fn cache_miss(&mut self, addr: address, set: usize, way: usize, kind: MissKind) {
        self.log(&Event::CacheMiss {
            addr,
            set,
            way,
            kind,
        });
    }
    fn cache_flush(&mut self) {
        self.log(&Event::CacheFlush);
    }
    fn backing_read(&mut self, addr: address, value: u32) {
        self.log(&Event::BackingRead { addr, value });
    }
    fn backing_write(&mut self, addr: address, value: u32) {
        self.log(&Event::BackingWrite { addr, value });
    }
    fn backing_line_read(&mut self, addr: address, line: &CacheLine) {
        self.log(&Event::BackingLineRead { addr, line: *line });
    }
    fn backing_line_write(&mut self, addr: address, line: &CacheLine) {
        self.log(&Event::BackingLineWrite { addr, line: *line });
    }
    fn tlb_hit(&mut self, vpn: address) {
        self.log(&Event::TlbHit { vpn });
    }
    fn tlb_miss(&mut self, vpn: address) {
        self.log(&Event::TlbMiss { vpn });
    }
    fn translation_start(&mut self, virtual_addr: address) {
        self.log(&Event::TranslationStart { virtual_addr });
    }
    fn translation_end(&mut self, physical_addr: address) {
        self.log(&Event::TranslationEnd { physical_addr });
    }
}

/// Forwards every event to two sinks, first `.0` then `.1`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tee<A, B>(pub A, pub B);

impl<A, B> EventSink for Tee<A, B>
where
    A: EventSink,
    B: EventSink,
{
    fn cache_hit(&mut self, addr: address, set: usize, way: usize) {
        self.0.cache_hit(addr, set, way);
        self.1.cache_hit(addr, set, way);
    }
    fn cache_miss(&mut self, addr: address, set: usize, way: usize, kind: MissKind) {
        self.0.cache_miss(addr, set, way, kind);
        self.1.cache_miss(addr, set, way, kind);
    }
    fn cache_flush(&mut self) {
        self.0.cache_flush();
        self.1.cache_flush();
    }
    fn backing_read(&mut self, addr: address, value: u32) {
        self.0.backing_read(addr, value);
        self.1.backing_read(addr, value);
    }
    fn backing_write(&mut self, addr: address, value: u32) {
        self.0.backing_write(addr, value);
        self.1.backing_write(addr, value);
    }
    fn backing_line_read(&mut self, addr: address, line: &CacheLine) {
        self.0.backing_line_read(addr, line);
        self.1.backing_line_read(addr, line);
    }
    fn backing_line_write(&mut self, addr: address, line: &CacheLine) {
        self.0.backing_line_write(addr, line);
        self.1.backing_line_write(addr, line);
    }
    fn tlb_hit(&mut self, vpn: address) {
        self.0.tlb_hit(vpn);
        self.1.tlb_hit(vpn);
    }
    fn tlb_miss(&mut self, vpn: address) {
        self.0.tlb_miss(vpn);
        self.1.tlb_miss(vpn);
    }
    fn translation_start(&mut self, virtual_addr: address) {
        self.0.translation_start(virtual_addr);
        self.1.translation_start(virtual_addr);
    }
    fn translation_end(&mut self, physical_addr: address) {
        self.0.translation_end(physical_addr);
        self.1.translation_end(physical_addr);
    }
}

#[must_use]
pub fn line_writes(events: &[Event]) -> Vec<address> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::BackingLineWrite { addr, .. } => Some(*addr),
            _ => None,
        })
        .collect()
}

#[must_use]
pub fn line_reads(events: &[Event]) -> Vec<address> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::BackingLineRead { addr, .. } => Some(*addr),
            _ => None,
        })
        .collect()
}

#[must_use]
pub fn was_hit(events: &[Event]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, Event::CacheHit { .. }))
}

#[must_use]
pub fn miss_kind(events: &[Event]) -> Option<MissKind> {
    events.iter().find_map(|event| match event {
        Event::CacheMiss { kind, .. } => Some(*kind),
        _ => None,
    })
}
