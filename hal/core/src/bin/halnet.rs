use anyhow::Context;
use clap::Parser;
use hal_core::{Console, MemoryMode, NetworkBuilder, NetworkConfig, ProcessorReport, Topology};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_FAULT_LOG: &str = "page_fault_log";

#[derive(Parser, Debug)]
#[command(
    name = "halnet",
    about = "Run a network of HAL accumulator processors described by a topology file."
)]
struct Args {
    /// Topology file listing processors, connections and stdio bindings.
    #[arg(value_name = "TOPOLOGY")]
    topology: PathBuf,

    /// JSON file with a `NetworkConfig`; flags below override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Back every processor with untranslated memory.
    #[arg(long, default_value_t = false)]
    flat_memory: bool,

    /// Disable the translation cache (every access walks the page table).
    #[arg(long, default_value_t = false)]
    no_tlb: bool,

    /// Page-fault log; defaults to `page_fault_log` in the working directory.
    #[arg(long, value_name = "FILE")]
    fault_log: Option<PathBuf>,

    /// Write a JSON run report here.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Emit per-access memory trace events (needs RUST_LOG=trace).
    #[arg(long, default_value_t = false)]
    trace_memory: bool,

    /// Emit per-instruction trace events (needs RUST_LOG=trace).
    #[arg(long, default_value_t = false)]
    trace_exec: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    topology: &'a PathBuf,
    elapsed_ms: u64,
    processors: &'a [ProcessorReport],
}

fn load_config(args: &Args) -> anyhow::Result<NetworkConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => NetworkConfig::default(),
    };
    if args.flat_memory {
        config.processor.memory = MemoryMode::Flat;
    }
    if args.no_tlb {
        config.processor.mmu.tlb_enabled = false;
    }
    if args.trace_memory {
        config.processor.mmu.trace = true;
    }
    if args.trace_exec {
        config.processor.trace = true;
    }
    if let Some(path) = &args.fault_log {
        config.fault_log = Some(path.clone());
    }
    if config.fault_log.is_none() {
        config.fault_log = Some(PathBuf::from(DEFAULT_FAULT_LOG));
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let topology = Topology::load(&args.topology)
        .with_context(|| format!("loading topology {}", args.topology.display()))?;

    let network = NetworkBuilder::from_topology(&topology, &config)?.build(Console::stdio())?;
    let started = Instant::now();
    let outcome = network.run()?;
    let elapsed = started.elapsed();

    for report in &outcome.reports {
        eprintln!(
            "hal {}: {:?} pc={} acc={} steps={} faults={} {}ms{}",
            report.id,
            report.state,
            report.pc,
            report.accumulator,
            report.steps,
            report.memory.page_faults,
            report.elapsed_ms,
            report
                .error
                .as_deref()
                .map(|e| format!(" error: {e}"))
                .unwrap_or_default()
        );
    }

    if let Some(path) = &args.report {
        let report = RunReport {
            topology: &args.topology,
            elapsed_ms: elapsed.as_millis() as u64,
            processors: &outcome.reports,
        };
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    }
    Ok(())
}
