//! Demo driver for `netsim-core`: builds one of the example topologies,
//! steps it for a configurable number of ticks, and prints a per-tick
//! trace plus a final report. Grounded on the teacher's `xtask`/`mcp`
//! binaries: a thin `std` front end sitting beside the `no_std`-friendly
//! core, owning its own logging setup and CLI parsing.

mod topology;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use netsim_core::application::dhcp::{DhcpClient, DhcpClientState};
use netsim_core::application::ping::Ping;
use netsim_core::snapshot;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TopologyKind {
    /// A router between two DHCP-served subnets (`simple_routing.py`).
    SimpleRouting,
    /// A three-tier switch fabric with DHCP client devices (`tier3_network.py`).
    Tier3,
}

#[derive(Parser, Debug)]
#[command(about = "Steps a netsim-core topology and prints a trace")]
struct Args {
    #[arg(value_enum, default_value = "simple-routing")]
    topology: TopologyKind,

    /// Number of ticks to run.
    #[arg(short, long, default_value_t = 60)]
    ticks: u64,

    /// Master RNG seed; reusing a seed reproduces the exact same run.
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Client device count for the tier3 topology.
    #[arg(long, default_value_t = 8)]
    clients: usize,

    /// Write the final topology snapshot as JSON to this path.
    #[arg(long)]
    snapshot_out: Option<std::path::PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut built = match args.topology {
        TopologyKind::SimpleRouting => topology::simple_routing(args.seed),
        TopologyKind::Tier3 => topology::tier3_network(args.seed, args.clients),
    };

    info!(
        "built {:?} topology: {} devices, seed {}",
        args.topology,
        built.sim.device_slots().len(),
        args.seed
    );

    for tick in 1..=args.ticks {
        built.sim.step();
        if tick % 10 == 0 || tick == args.ticks {
            info!("tick {tick}/{}", args.ticks);
        }
    }

    println!("== final report after {} ticks ==", built.sim.ticks());
    for host in &built.monitored {
        let device = built.sim.host_mut(host.id);
        let Some(device) = device else { continue };

        if let Some(client) = device
            .applications()
            .iter()
            .find_map(|a| a.as_any().downcast_ref::<DhcpClient>())
        {
            match client.state() {
                DhcpClientState::Bound => {
                    let (addr, _) = client.bind().expect("bound state carries a bind");
                    println!("{:<16} dhcp: BOUND {addr}", host.name);
                }
                state => println!("{:<16} dhcp: {state:?}", host.name),
            }
        }

        if let Some(ping) = device
            .applications()
            .iter()
            .find_map(|a| a.as_any().downcast_ref::<Ping>())
        {
            let last = ping.log().back();
            println!("{:<16} ping: {:?}", host.name, last.map(|e| e.outcome));
        }
    }

    if let Some(path) = args.snapshot_out {
        let snap = snapshot::to_snapshot(&built.sim);
        let json = serde_json::to_string_pretty(&snap).context("serializing snapshot")?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote snapshot to {}", path.display());
    }

    Ok(())
}
