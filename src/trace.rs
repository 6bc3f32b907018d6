//! Memory access traces.

use crate::address;
use crate::event::EventSink;
use crate::mem::{self, BackingStore};
use crate::mmu::Mmu;
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Cached (and possibly translated) read.
    Read { addr: address },
    /// Cached (and possibly translated) write.
    Write { addr: address, value: u32 },
    Flush,
    /// Invalidates the cache without writing anything back.
    Init,
    EnableVm { page_table: address },
    DisableVm,
    /// Uncached physical read.
    Load { addr: address },
    /// Uncached physical write.
    Store { addr: address, value: u32 },
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Read { addr } => write!(f, "read({addr:#x})"),
            Self::Write { addr, value } => write!(f, "write({addr:#x}, {value:#x})"),
            Self::Flush => write!(f, "flush"),
            Self::Init => write!(f, "init"),
            Self::EnableVm { page_table } => write!(f, "enable_vm({page_table:#x})"),
            Self::DisableVm => write!(f, "disable_vm"),
            Self::Load { addr } => write!(f, "load({addr:#x})"),
            Self::Store { addr, value } => write!(f, "store({addr:#x}, {value:#x})"),
        }
    }
}

/// Value observed by a command that returns one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    /// Position of the command in the trace
    pub index: usize,
    pub command: Command,
    pub value: u32,
}

pub fn parse_commands(path: impl AsRef<Path>) -> eyre::Result<Vec<Command>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("failed to open trace {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let commands = serde_json::from_reader(reader)
        .wrap_err_with(|| format!("failed to parse trace {}", path.display()))?;
    Ok(commands)
}

#[derive(thiserror::Error, Debug)]
#[error("command {index} ({command}) failed")]
pub struct Error {
    pub index: usize,
    pub command: Command,
    #[source]
    pub source: mem::Error,
}

/// Executes a single command.
///
/// # Returns
/// The value read by `Read` and `Load` commands.
pub fn execute<M, S>(mmu: &mut Mmu<M, S>, command: Command) -> Result<Option<u32>, mem::Error>
where
    M: BackingStore,
    S: EventSink,
{
    match command {
        Command::Read { addr } => mmu.read(addr).map(Some),
        Command::Write { addr, value } => mmu.write(addr, value).map(|()| None),
        Command::Flush => mmu.flush().map(|_| None),
        Command::Init => {
            mmu.initialize_cache();
            Ok(None)
        }
        Command::EnableVm { page_table } => {
            mmu.enable(page_table);
            Ok(None)
        }
        Command::DisableVm => {
            mmu.disable();
            Ok(None)
        }
        Command::Load { addr } => mmu.load_word(addr).map(Some),
        Command::Store { addr, value } => mmu.store_word(addr, value).map(|()| None),
    }
}

/// Runs all commands in order, stopping at the first failure.
pub fn run<M, S>(mmu: &mut Mmu<M, S>, commands: &[Command]) -> Result<Vec<Output>, Error>
where
    M: BackingStore,
    S: EventSink,
{
    let mut outputs = Vec::new();
    for (index, command) in commands.iter().copied().enumerate() {
        log::trace!("trace[{}]: {}", index, command);
        let value = execute(mmu, command).map_err(|source| Error {
            index,
            command,
            source,
        })?;
        if let Some(value) = value {
            log::info!("{} = {:#010x}", command, value);
            outputs.push(Output {
                index,
                command,
                value,
            });
        }
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::{Command, Output};
    use crate::mem::{self, MainMemory};
    use crate::mmu::Mmu;
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;

    #[test]
    fn test_parse_json() -> eyre::Result<()> {
        let commands: Vec<Command> = serde_json::from_str(
            r#"[
                {"op": "store", "addr": 32768, "value": 5},
                {"op": "enable_vm", "page_table": 32768},
                {"op": "write", "addr": 16, "value": 1},
                {"op": "read", "addr": 16},
                {"op": "flush"},
                {"op": "disable_vm"},
                {"op": "init"},
                {"op": "load", "addr": 5136}
            ]"#,
        )?;
        diff::assert_eq_sorted!(
            commands,
            vec![
                Command::Store {
                    addr: 0x8000,
                    value: 5
                },
                Command::EnableVm { page_table: 0x8000 },
                Command::Write { addr: 16, value: 1 },
                Command::Read { addr: 16 },
                Command::Flush,
                Command::DisableVm,
                Command::Init,
                Command::Load { addr: 5136 },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_run() -> eyre::Result<()> {
        let commands = [
            Command::Store {
                addr: 0x8000,
                value: 5,
            },
            Command::EnableVm { page_table: 0x8000 },
            Command::Write { addr: 16, value: 1 },
            Command::Read { addr: 16 },
            Command::Flush,
            Command::DisableVm,
            Command::Load {
                addr: (5 << 10) | 16,
            },
        ];
        let mut stats = stats::Stats::default();
        let mut mmu = Mmu::with_memory(MainMemory::default(), &mut stats);
        let outputs = super::run(&mut mmu, &commands)?;
        drop(mmu);

        diff::assert_eq_sorted!(
            outputs,
            vec![
                Output {
                    index: 3,
                    command: commands[3],
                    value: 1
                },
                Output {
                    index: 6,
                    command: commands[6],
                    value: 1
                },
            ]
        );
        assert_eq!(stats.tlb.misses, 1);
        assert_eq!(stats.tlb.hits, 1);
        assert_eq!(stats.cache.num_hits(), 1);
        assert_eq!(stats.cache.num_misses(), 2);
        assert_eq!(stats.cache.num_writebacks, 1);
        Ok(())
    }

    #[test]
    fn test_run_reports_failing_command() {
        let mut mmu = Mmu::with_memory(MainMemory::new(64), ());
        let commands = [Command::Read { addr: 0 }, Command::Read { addr: 64 }];
        let err = super::run(&mut mmu, &commands).unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, mem::Error::OutOfRange { .. }));
        assert_eq!(err.to_string(), "command 1 (read(0x40)) failed");
    }
}
