//! vm-sim - demand-paged virtual memory simulator
//!
//! Usage: vm-sim [OPTIONS]
//!
//! Runs `k` process actors against one MMU with `f` physical frames. Each
//! process owns an `m`-entry page table; faults are served from the free pool
//! or by evicting the faulting process's own least recently used page.
//!
//! Examples:
//!   vm-sim -k 3 -m 8 -f 6 -r 20 --seed 1
//!   vm-sim --config sim.toml --workload refs.txt --output results.txt -v

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use vm_sim::config::SimConfig;
use vm_sim::io::{write_results, Workload};
use vm_sim::process::Termination;
use vm_sim::{Simulation, SimulationReport};

/// Command-line configuration
#[derive(Debug, Parser)]
#[command(name = "vm-sim", version, about = "Demand-paged virtual memory simulator with local LRU replacement")]
struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of processes (k)
    #[arg(short = 'k', long)]
    processes: Option<usize>,

    /// Virtual pages per process (m)
    #[arg(short = 'm', long)]
    pages: Option<usize>,

    /// Physical frames (f)
    #[arg(short = 'f', long)]
    frames: Option<usize>,

    /// References generated per process
    #[arg(short = 'r', long)]
    ref_len: Option<usize>,

    /// Seed for reference generation
    #[arg(long)]
    seed: Option<u64>,

    /// Give each process a random bound in 1..=m
    #[arg(long)]
    random_bounds: bool,

    /// Percentage of generated references placed past the bound
    #[arg(long)]
    illegal_percent: Option<u8>,

    /// Workload file (`bound: refs...` per line) instead of generated references
    #[arg(short, long)]
    workload: Option<PathBuf>,

    /// Write each process's reply codes to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug-level logging of every resolution
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    // Run the simulator and handle any errors
    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Build the config: file first, then flag overrides
fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };

    if let Some(k) = args.processes {
        config.processes = k;
    }
    if let Some(m) = args.pages {
        config.pages_per_process = m;
    }
    if let Some(f) = args.frames {
        config.frames = f;
    }
    if let Some(len) = args.ref_len {
        config.reference_length = len;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.random_bounds {
        config.random_bounds = true;
    }
    if let Some(p) = args.illegal_percent {
        config.illegal_percent = p;
    }
    Ok(config)
}

/// Main logic separated from main() for cleaner error handling
fn run(args: &Args) -> Result<()> {
    let mut config = load_config(args)?;

    let simulation = match &args.workload {
        Some(path) => {
            let workload =
                Workload::from_file(path).with_context(|| format!("loading workload {}", path.display()))?;
            let explicit = args.processes.is_some() || args.config.is_some();
            if let Some(requested) = adopt_workload_size(&mut config, &workload, explicit) {
                warn!(
                    "processes={} ignored, workload {} describes {} processes",
                    requested,
                    path.display(),
                    workload.len()
                );
            }
            if let Some(max) = workload.max_page() {
                if max >= config.pages_per_process as i32 {
                    warn!(
                        "workload references page {} but page tables only have {} entries; those references are invalid",
                        max, config.pages_per_process
                    );
                }
            }
            Simulation::new(config, workload)?
        }
        None => Simulation::from_config(config)?,
    };

    let report = simulation.run()?;
    print_summary(&report);

    if let Some(path) = &args.output {
        write_results(path, &report.processes)?;
        println!("Results written to: {}", path.display());
    }
    Ok(())
}

/// The workload file decides how many processes there are. Returns the
/// overridden count when one was set explicitly and disagrees.
fn adopt_workload_size(config: &mut SimConfig, workload: &Workload, explicit: bool) -> Option<usize> {
    let requested = config.processes;
    config.processes = workload.len();
    (explicit && requested != workload.len()).then_some(requested)
}

fn print_summary(report: &SimulationReport) {
    println!("=== Summary ===");
    println!(
        "{:>4} {:>6} {:>6} {:>6} {:>8} {:>8}  termination",
        "pid", "hits", "faults", "evicts", "invalid", "unresolv"
    );
    for (pid, stats) in report.mmu.stats().iter().enumerate() {
        let termination = report
            .processes
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| match p.termination {
                Termination::Completed => "completed".to_string(),
                Termination::IllegalPage(page) => format!("illegal page {}", page),
                Termination::Unresolvable(page) => format!("unresolvable fault on page {}", page),
                Termination::Cancelled => "cancelled".to_string(),
            })
            .unwrap_or_default();
        println!(
            "{:>4} {:>6} {:>6} {:>6} {:>8} {:>8}  {}",
            pid, stats.hits, stats.faults, stats.evictions, stats.invalid_refs, stats.unresolvable, termination
        );
    }
    println!("Admission order: {:?}", report.scheduler.admitted);
    println!(
        "Free frames: {}/{}  clock: {}",
        report.mmu.pool().count(),
        report.mmu.pool().capacity(),
        report.mmu.clock()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_overrides_process_count() {
        let workload = Workload::parse("4: 0 1\n4: 2\n").unwrap();

        let mut config = SimConfig {
            processes: 5,
            ..SimConfig::default()
        };
        assert_eq!(adopt_workload_size(&mut config, &workload, true), Some(5));
        assert_eq!(config.processes, 2);

        // matching or defaulted counts are adopted quietly
        assert_eq!(adopt_workload_size(&mut config, &workload, true), None);
        let mut config = SimConfig::default();
        assert_eq!(adopt_workload_size(&mut config, &workload, false), None);
        assert_eq!(config.processes, 2);
    }

    #[test]
    fn test_cli_flags_override_config() {
        let args = Args::parse_from(["vm-sim", "-k", "4", "-f", "2", "--seed", "9"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.processes, 4);
        assert_eq!(config.frames, 2);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.pages_per_process, SimConfig::default().pages_per_process);
    }
}
