use std::fs::File;
use std::time::Instant;
use clap::Parser;
use cachelib::config::LayeredCacheConfig;
use cachelib::io::get_reader;
use cachelib::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Replays a memory trace through a hierarchy of caches"))]
struct Args {
    /// JSON description of the caches, nearest the processor first
    config: String,
    /// Trace of memory accesses, one record per line
    trace: String,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,

    /// Log more detail to stderr, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(log_level(args.verbose))
        .target(env_logger::Target::Stderr)
        .init();

    let config_json = std::fs::read_to_string(&args.config).map_err(|e| format!("Couldn't open the config file at path {}: {e}", args.config))?;
    let config = LayeredCacheConfig::from_json(&config_json).map_err(|e| e.to_string())?;
    let mut simulator = Simulator::new(&config).map_err(|e| format!("Invalid cache configuration: {e}"))?;
    let trace_file = File::open(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let trace_reader = get_reader(trace_file).map_err(|e| format!("Couldn't map the trace file: {e}"))?;
    let result = simulator.simulate(trace_reader).map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string_pretty(&result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    if args.performance {
        let simulation_time = simulator.get_execution_time();
        let total_time = start.elapsed();
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        let resident_lines = simulator.get_resident_line_counts();
        let formatted = config
            .caches
            .iter()
            .zip(resident_lines.iter())
            .map(|(cache, count)| format!("{}: {count}", cache.name))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Resident cache lines by layer: ({formatted})");
        println!("Total resident cache lines: {}", resident_lines.iter().sum::<u64>())
    }
    Ok(())
}
