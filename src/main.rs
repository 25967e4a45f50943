use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use env_logger::Builder;
use log::{debug, info, LevelFilter};
use signal_hook::consts::{SIGINT, SIGTERM};
use tokio::runtime;

use bgp_router::{serve, NeighborConfig, RouterConfig};

#[derive(Parser, Debug)]
#[clap(name = "router", rename_all = "kebab-case")]
/// Simulated BGP router
struct Args {
    /// AS number of this router
    asn: u32,
    /// Neighbors as <address>-<relation>, relation one of cust, peer, prov
    /// (E.g. 192.168.0.2-cust)
    #[clap(required = true)]
    neighbors: Vec<NeighborConfig>,
    /// Path to a config.toml with router tunables
    #[clap(short, long)]
    config: Option<String>,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences))]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let (router_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("bgp_router"), router_level)
        .filter(Some("router"), router_level)
        .filter(None, other_level)
        .init();
    info!("Logging at levels {}/{}", router_level, other_level);

    let config = RouterConfig::new(args.asn, args.neighbors, args.config.as_deref())?;
    debug!(
        "Configured {} neighbors, polling every {:?}",
        config.neighbors.len(),
        config.poll_interval
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;

    let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(serve(config, shutdown))?;
    Ok(())
}
