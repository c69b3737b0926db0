use std::error::Error;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

/// Environment variable pointing at a directory of reference cases
pub const SAMPLES_ENV: &str = "CACHESIM_SAMPLES";

/// Paths making up one reference case: a configuration, a trace, and the expected output for
/// that pair
pub struct TestCasePaths {
    pub config: PathBuf,
    pub trace: PathBuf,
    pub output: PathBuf,
}

/// The reference case directory, if one has been configured
pub fn samples_dir() -> Option<PathBuf> {
    std::env::var_os(SAMPLES_ENV).map(PathBuf::from)
}

/// Finds every reference case under `root`
///
/// Expected outputs live in `root/sample-outputs` and are named
/// `output-<trace>-<config>.json`, which refer to `root/trace-files/<trace>.out` and
/// `root/sample-inputs/<config>.json`. Cases are returned sorted by output file name
pub fn get_configs(root: &Path) -> Result<Vec<TestCasePaths>, Box<dyn Error>> {
    let output_pattern = Regex::new(r"^output-(?P<trace>[0-9a-zA-Z_]+)-(?P<config>[0-9a-zA-Z_]+)\.json$")?;
    let mut file_names = Vec::new();
    for entry in fs::read_dir(root.join("sample-outputs"))? {
        let file_name = entry?
            .file_name()
            .into_string()
            .map_err(|e| format!("Can't convert OS string ({e:?}) to standard string"))?;
        if output_pattern.is_match(&file_name) {
            file_names.push(file_name);
        }
    }
    file_names.sort();
    let mut out = Vec::new();
    for file_name in file_names {
        let tokens = output_pattern.captures(&file_name).ok_or("Couldn't parse the file name")?;
        let trace = tokens.name("trace").ok_or("Couldn't get the trace file from the output file name")?.as_str();
        let config = tokens.name("config").ok_or("Couldn't get the config file from the output file name")?.as_str();
        out.push(TestCasePaths {
            config: root.join("sample-inputs").join(format!("{config}.json")),
            trace: root.join("trace-files").join(format!("{trace}.out")),
            output: root.join("sample-outputs").join(&file_name),
        });
    }
    Ok(out)
}

/// Generates a trace of `records` accesses in the usual record format
///
/// Addresses are drawn mostly from a small working set with occasional far accesses, so that
/// caches of a few kilobytes see a mix of hits, conflicts, and capacity misses. The same seed
/// always produces the same trace
pub fn synthetic_trace(records: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut trace = String::with_capacity(records * 40);
    let mut program_counter: u64 = 0x40_1000;
    for _ in 0..records {
        let address: u64 = if rng.gen_bool(0.9) {
            0x7fff_0000 + rng.gen_range(0..16 * 1024)
        } else {
            rng.gen_range(0..1u64 << 32)
        };
        let mode = if rng.gen_bool(0.3) { 'W' } else { 'R' };
        let size = [1u64, 2, 4, 8, 16][rng.gen_range(0..5)];
        program_counter += 4;
        // Writing to a String can't fail
        let _ = writeln!(trace, "{program_counter:016x} {address:016x} {mode} {size:03}");
    }
    trace
}
