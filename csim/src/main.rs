use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;
use csimlib::cache::{AccessOutcome, CacheStats};
use csimlib::config::{CacheConfig, RawCacheConfig};
use csimlib::io::open_trace;
use csimlib::simulator::Simulator;
use csimlib::trace::TraceRecord;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(
    name = "csim",
    about = String::from("Set-associative LRU cache simulator for valgrind memory traces"),
    after_help = "Examples:\n  csim -s 4 -E 1 -b 4 -t traces/yi.trace\n  csim -v -s 8 -E 2 -b 4 -t traces/yi.trace"
)]
struct Args {
    /// Print every data access with its outcome
    #[arg(short, long)]
    verbose: bool,

    /// Number of set index bits
    #[arg(short = 's', value_name = "num", allow_negative_numbers = true)]
    set_index_bits: Option<i64>,

    /// Number of lines per set
    #[arg(short = 'E', value_name = "num", allow_negative_numbers = true)]
    associativity: Option<i64>,

    /// Number of block offset bits
    #[arg(short = 'b', value_name = "num", allow_negative_numbers = true)]
    block_bits: Option<i64>,

    /// Trace file
    #[arg(short = 't', value_name = "file")]
    trace: PathBuf,

    /// JSON file with any of "s", "E" and "b". Flags take precedence
    #[arg(short, long, value_name = "file")]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Also write "hits misses evictions" to this file
    #[arg(short, long, value_name = "file")]
    results: Option<PathBuf>,

    #[arg(short, long)]
    performance: bool,

    /// Print the configuration and line usage after the summary, `-d false` turns it off
    #[arg(
        short,
        long,
        value_name = "bool",
        default_value_t = DEBUG_DEFAULT,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    debug: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Layers the command line flags over the config file, if any, and validates the result
fn load_config(args: &Args) -> Result<CacheConfig, String> {
    let from_file = match &args.config {
        Some(path) => {
            let config_file = File::open(path)
                .map_err(|e| format!("Couldn't open the config file at path {}: {e}", path.display()))?;
            serde_json::from_reader(BufReader::new(config_file))
                .map_err(|e| format!("Couldn't parse the config file: {e}"))?
        }
        None => RawCacheConfig::default(),
    };
    let from_flags = RawCacheConfig {
        s: args.set_index_bits,
        e: args.associativity,
        b: args.block_bits,
    };
    CacheConfig::try_from(from_file.merge(from_flags))
        .map_err(|e| format!("Invalid cache configuration: {e} (see --help)"))
}

fn format_outcomes(record: &TraceRecord, outcomes: &[AccessOutcome]) -> String {
    outcomes
        .iter()
        .fold(record.to_string(), |line, outcome| format!("{line} {outcome}"))
}

/// The summary printed on stdout, either the cache-lab line or pretty JSON
fn format_summary(stats: &CacheStats, json: bool) -> Result<String, String> {
    if json {
        serde_json::to_string_pretty(stats).map_err(|e| format!("Couldn't serialise the output {e}"))
    } else {
        Ok(stats.to_string())
    }
}

/// Contents of the `-r` results file, the same layout as cache-lab's `.csim_results`
fn format_results_file(stats: &CacheStats) -> String {
    format!("{} {} {}\n", stats.hits, stats.misses, stats.evictions)
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    init_logging();
    let config = load_config(&args)?;
    tracing::debug!(?config, "Parsed configuration");
    let mut simulator = Simulator::new(config).map_err(|e| format!("Couldn't build the cache: {e}"))?;
    let trace_reader = open_trace(&args.trace)
        .map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace.display()))?;
    let replayed = if args.verbose {
        simulator.simulate_with(trace_reader, |record, outcomes| println!("{}", format_outcomes(record, outcomes)))
    } else {
        simulator.simulate(trace_reader)
    };
    let result = *replayed.map_err(|e| format!("Couldn't simulate {}: {e}", args.trace.display()))?;

    println!("{}", format_summary(&result, args.json)?);
    if let Some(path) = &args.results {
        fs::write(path, format_results_file(&result))
            .map_err(|e| format!("Couldn't write the results file at path {}: {e}", path.display()))?;
    }
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default (pass -d false to turn it off). If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        println!("Records replayed: {}", simulator.get_record_count());
        println!(
            "Uninitialised cache lines: {} of {}",
            simulator.get_cache().uninitialised_line_count(),
            config.num_lines()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn cache_lab_flags() {
        let args = Args::try_parse_from(["csim", "-v", "-s", "4", "-E", "2", "-b", "4", "-t", "yi.trace"]).unwrap();
        assert!(args.verbose);
        assert_eq!(load_config(&args).unwrap(), CacheConfig::try_from(RawCacheConfig::new(4, 2, 4)).unwrap());
    }

    #[test]
    fn negative_values_reach_validation() {
        let args = Args::try_parse_from(["csim", "-s", "-1", "-E", "1", "-b", "1", "-t", "t"]).unwrap();
        assert!(load_config(&args).unwrap_err().contains("must be positive"));
    }

    #[test]
    fn missing_values_are_reported() {
        let args = Args::try_parse_from(["csim", "-s", "1", "-b", "1", "-t", "t"]).unwrap();
        assert!(load_config(&args).unwrap_err().contains("missing required parameter -E"));
    }

    #[test]
    fn trace_is_required() {
        assert!(Args::try_parse_from(["csim", "-s", "1", "-E", "1", "-b", "1"]).is_err());
    }

    #[test]
    fn verbose_line_format() {
        let record: TraceRecord = " M 20,1".parse().unwrap();
        assert_eq!(
            format_outcomes(&record, &[AccessOutcome::MissWithEviction, AccessOutcome::Hit]),
            "M 20,1 miss eviction hit"
        );
    }

    #[test]
    fn summary_line() {
        let stats = CacheStats { hits: 9, misses: 8, evictions: 6 };
        assert_eq!(format_summary(&stats, false).unwrap(), "hits:9 misses:8 evictions:6");
    }

    #[test]
    fn json_summary_has_exactly_the_three_counters() {
        let stats = CacheStats { hits: 4, misses: 5, evictions: 2 };
        let rendered = format_summary(&stats, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["evictions", "hits", "misses"]);
        assert_eq!(value["hits"], 4);
        assert_eq!(value["misses"], 5);
        assert_eq!(value["evictions"], 2);
    }

    #[test]
    fn results_file_layout() {
        let stats = CacheStats { hits: 167, misses: 71, evictions: 67 };
        assert_eq!(format_results_file(&stats), "167 71 67\n");
    }

    #[test]
    fn debug_report_can_be_switched_off() {
        let base = ["csim", "-s", "1", "-E", "1", "-b", "1", "-t", "t"];
        let off = Args::try_parse_from(base.iter().copied().chain(["-d", "false"])).unwrap();
        assert!(!off.debug);
        let on = Args::try_parse_from(base.iter().copied().chain(["-d"])).unwrap();
        assert!(on.debug);
        let before_trace = Args::try_parse_from(["csim", "-d", "-s", "1", "-E", "1", "-b", "1", "-t", "t"]).unwrap();
        assert!(before_trace.debug);
        assert_eq!(Args::try_parse_from(base).unwrap().debug, DEBUG_DEFAULT);
    }
}
