use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use common::cli::CacheOpts;
use common::util::parse_u32;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod trace;

/// Replays a memory access trace through the L1/L2 cache hierarchy
#[derive(Debug, Parser)]
#[clap(name = "cache-mu", version)]
struct Cli {
    #[command(flatten)]
    cache: CacheOpts,

    /// Raw image copied into memory before the trace runs
    #[arg(long)]
    image: Option<PathBuf>,

    /// Address the image is loaded at
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    load_addr: u32,

    /// Access trace to replay
    trace: PathBuf,
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut system = memory::new(&cli.cache)?;

    if let Some(path) = &cli.image {
        let image = fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
        system.memory_mut().load(cli.load_addr, &image)?;
        info!("loaded {} bytes at {:#010x}", image.len(), cli.load_addr);
    }

    let text = fs::read_to_string(&cli.trace)
        .with_context(|| format!("reading trace {}", cli.trace.display()))?;
    let accesses = trace::parse(&text)?;

    for access in &accesses {
        if let Some(output) = access.run(&mut system) {
            println!("{}", output);
        }
    }
    info!("replayed {} accesses", accesses.len());

    for (name, stats) in system.stats() {
        println!("{}: {}", name, stats);
    }

    Ok(())
}
