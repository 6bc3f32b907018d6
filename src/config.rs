use crate::address;
use crate::addrdec::{ASSOCIATIVITY, LINE_SIZE, NUM_SETS};
use crate::event::EventSink;
use crate::mem::{self, BackingStore, MainMemory};
use crate::mmu::Mmu;
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A page table entry to install before running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mapping {
    pub vpn: address,
    pub ppn: address,
}

/// Simulation configuration.
///
/// Cache and TLB geometry are fixed, only the memory around them is configurable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backing store capacity in bytes.
    pub memory_size: usize,
    /// Page table base address. Translation starts enabled when set.
    pub page_table: Option<address>,
    /// Page table entries written before the first access.
    pub mappings: Vec<Mapping>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_size: mem::DEFAULT_CAPACITY,
            page_table: None,
            mappings: Vec::new(),
        }
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let memory = human_bytes::human_bytes(self.memory_size as f64);
        let cache = human_bytes::human_bytes((NUM_SETS * ASSOCIATIVITY * LINE_SIZE) as f64);
        write!(
            f,
            "{memory} memory, {cache} cache ({NUM_SETS} set, {ASSOCIATIVITY}-way, {LINE_SIZE} byte line)"
        )?;
        match self.page_table {
            Some(base) => write!(f, ", page table at {base:#x}"),
            None => write!(f, ", no translation"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("mappings given without a page table base address")]
    MissingPageTable,

    #[error("page table at {base:#x} does not fit in {memory_size} bytes of memory")]
    PageTableOutOfRange { base: address, memory_size: usize },
}

impl Config {
    /// Loads a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to open config {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        let config = serde_yaml::from_reader(reader)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self.page_table {
            None if !self.mappings.is_empty() => Err(Error::MissingPageTable),
            Some(base) => {
                let end = self
                    .mappings
                    .iter()
                    .map(|mapping| {
                        crate::addrdec::pte_addr(base, mapping.vpn)
                            .map_or(usize::MAX, |pte_addr| pte_addr as usize + 4)
                    })
                    .max()
                    .unwrap_or(base as usize);
                if end > self.memory_size {
                    Err(Error::PageTableOutOfRange {
                        base,
                        memory_size: self.memory_size,
                    })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }

    /// Builds the memory hierarchy described by this configuration.
    ///
    /// Mappings are stored uncached and translation is enabled if a page
    /// table is configured.
    pub fn build<S>(&self, sink: S) -> eyre::Result<Mmu<MainMemory, S>>
    where
        S: EventSink,
    {
        self.validate()?;
        let mut mmu = Mmu::with_memory(MainMemory::new(self.memory_size), sink);
        if let Some(base) = self.page_table {
            for mapping in &self.mappings {
                mmu.map_page(base, mapping.vpn, mapping.ppn)?;
            }
            mmu.enable(base);
        }
        log::debug!(
            "built memory hierarchy: {} ({} bytes)",
            self,
            mmu.cache().memory().capacity()
        );
        Ok(mmu)
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Error, Mapping};
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;

    #[test]
    fn test_parse_yaml() -> eyre::Result<()> {
        let config: Config = serde_yaml::from_str(
            r#"
memory_size: 65536
page_table: 16384
mappings:
  - { vpn: 0, ppn: 7 }
  - { vpn: 1, ppn: 2 }
"#,
        )?;
        diff::assert_eq_sorted!(
            config,
            Config {
                memory_size: 65536,
                page_table: Some(0x4000),
                mappings: vec![Mapping { vpn: 0, ppn: 7 }, Mapping { vpn: 1, ppn: 2 }],
            }
        );
        Ok(())
    }

    #[test]
    fn test_defaults() -> eyre::Result<()> {
        let config: Config = serde_yaml::from_str("{}")?;
        diff::assert_eq_sorted!(config, Config::default());
        assert_eq!(config.memory_size, 49152);
        Ok(())
    }

    #[test]
    fn test_validate() {
        let mut config = Config {
            mappings: vec![Mapping { vpn: 1, ppn: 1 }],
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(Error::MissingPageTable));

        config.page_table = Some(0xbffc);
        assert!(matches!(
            config.validate(),
            Err(Error::PageTableOutOfRange { .. })
        ));

        config.page_table = Some(0xffff_fffc);
        assert!(matches!(
            config.validate(),
            Err(Error::PageTableOutOfRange { .. })
        ));

        config.page_table = Some(0x8000);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_build_enables_translation() -> eyre::Result<()> {
        let config = Config {
            page_table: Some(0x8000),
            mappings: vec![Mapping { vpn: 1, ppn: 4 }],
            ..Config::default()
        };
        let mut mmu = config.build(())?;
        assert!(mmu.is_enabled());
        mmu.write((1 << 10) | 8, 3)?;
        assert_eq!(mmu.cache_mut().read((4 << 10) | 8)?, 3);
        Ok(())
    }
}
