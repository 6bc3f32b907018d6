use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use memsim::{event, trace, Config};
use std::path::PathBuf;

fn parse_address(value: &str) -> Result<memsim::address, std::num::ParseIntError> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => memsim::address::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// JSON trace of memory commands
    #[arg(value_name = "TRACE")]
    trace: PathBuf,
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Backing store size in bytes
    #[arg(long = "memory-size")]
    memory_size: Option<usize>,
    /// Enable translation with the page table at this physical address
    #[arg(long = "page-table", value_parser = parse_address)]
    page_table: Option<memsim::address>,
    /// Write statistics as JSON to this file instead of stdout
    #[arg(long = "stats-out")]
    stats_out: Option<PathBuf>,
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let mut log_builder = env_logger::Builder::new();
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    log_builder.filter_level(level);
    log_builder.parse_default_env();
    log_builder.init();
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = Options::parse();
    init_logging(options.verbose);

    let mut config = match options.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(memory_size) = options.memory_size {
        config.memory_size = memory_size;
    }
    if let Some(page_table) = options.page_table {
        config.page_table = Some(page_table);
    }
    log::info!("config: {}", config);

    let commands = trace::parse_commands(&options.trace)?;
    log::info!("running {} commands", commands.len());

    let sink = event::Tee(stats::Stats::default(), event::Trace);
    let mut mmu = config.build(sink)?;
    let outputs = trace::run(&mut mmu, &commands)?;
    for output in &outputs {
        println!("{} = {:#010x}", output.command, output.value);
    }

    let event::Tee(stats, _) = mmu.into_cache().into_parts().1;
    if let Some(hit_rate) = stats.cache.hit_rate() {
        log::info!("cache hit rate: {:.2}%", hit_rate * 100.0);
    }
    log::debug!("cache accesses: {:?}", stats.cache.clone().flatten());
    log::info!(
        "tlb: {} lookups, {} misses",
        stats.tlb.total_lookups(),
        stats.tlb.misses
    );
    let stats_json = serde_json::to_string_pretty(&stats)?;
    match options.stats_out {
        Some(ref path) => std::fs::write(path, stats_json)
            .wrap_err_with(|| format!("failed to write stats to {}", path.display()))?,
        None => println!("{stats_json}"),
    }
    Ok(())
}
