use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Cursor};
use proptest::prelude::*;
use crate::cache::{CacheLevel, LevelStats, Probe};
use crate::config::{CacheConfig, CacheKindConfig, LayeredCacheConfig, ReplacementPolicyConfig};
use crate::error::SimError;
use crate::hierarchy::Hierarchy;
use crate::io::get_reader;
use crate::simulator::{CacheResult, LayeredCacheResult, Simulator};
use crate::util::{get_configs, samples_dir, synthetic_trace};

const LINE: u64 = 64;

fn layered(caches: &[(u64, &str, &str)]) -> LayeredCacheConfig {
    LayeredCacheConfig {
        caches: caches
            .iter()
            .enumerate()
            .map(|(i, (size, kind, policy))| CacheConfig {
                name: format!("L{}", i + 1),
                size: *size,
                line_size: LINE,
                kind: kind.parse().unwrap(),
                replacement_policy: policy.parse().unwrap(),
            })
            .collect(),
    }
}

#[test]
fn run_all_examples() -> Result<(), Box<dyn Error>> {
    let Some(root) = samples_dir() else {
        println!("No reference cases configured, skipping");
        return Ok(());
    };
    for test in get_configs(&root)? {
        println!("Running test for {}", test.output.display());
        let expected_output: LayeredCacheResult = serde_json::from_reader(BufReader::new(File::open(&test.output)?))?;
        let config: LayeredCacheConfig = serde_json::from_reader(BufReader::new(File::open(&test.config)?))?;
        let mut simulator = Simulator::new(&config)?;
        let result = simulator.simulate(get_reader(File::open(&test.trace)?)?)?;
        assert_eq!(result, expected_output);
        let time = simulator.get_execution_time();
        println!("Success for {}, time: {}", test.output.display(), time.as_nanos() as f64 / 1e9);
    }
    Ok(())
}

#[test]
fn direct_mapped_end_to_end() {
    let config = layered(&[(1024, "direct", "rr")]);
    let mut simulator = Simulator::new(&config).unwrap();
    let trace = "0000000000401000 0000000000000000 R 008\n\
                 0000000000401004 0000000000000040 R 008\n\
                 0000000000401008 0000000000000000 W 004\n";
    let result = simulator.simulate(Cursor::new(trace)).unwrap();
    assert_eq!(
        result,
        LayeredCacheResult {
            main_memory_accesses: 2,
            caches: vec![CacheResult {
                name: "L1".to_string(),
                hits: 1,
                misses: 2
            }],
        }
    );
}

#[test]
fn output_format() {
    let config = layered(&[(1024, "direct", "rr"), (4096, "4way", "lru")]);
    let mut simulator = Simulator::new(&config).unwrap();
    let result = simulator.simulate(Cursor::new("0 100 R 4\n")).unwrap();
    let json: serde_json::Value = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "main_memory_accesses": 1,
            "caches": [
                {"name": "L1", "hits": 0, "misses": 1},
                {"name": "L2", "hits": 0, "misses": 1}
            ]
        })
    );
}

#[test]
fn simulate_accumulates_across_calls() {
    let config = layered(&[(1024, "2way", "lfu")]);
    let mut simulator = Simulator::new(&config).unwrap();
    simulator.simulate(Cursor::new("0 0 R 4\n")).unwrap();
    let result = simulator.simulate(Cursor::new("0 0 R 4\n")).unwrap();
    assert_eq!((result.caches[0].hits, result.caches[0].misses), (1, 1));
    assert_eq!(simulator.get_resident_line_counts(), vec![1]);
}

#[test]
fn malformed_trace_aborts() {
    let config = layered(&[(1024, "direct", "rr")]);
    let mut simulator = Simulator::new(&config).unwrap();
    let err = simulator.simulate(Cursor::new("0 0 R 4\n0 40 R\n0 80 R 4\n")).unwrap_err();
    assert!(matches!(err, SimError::Trace(ref e) if e.line == 2), "{err}");
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = layered(&[(1024, "direct", "rr")]);
    config.caches[0].size = 1000;
    assert!(matches!(Simulator::new(&config), Err(SimError::Config(_))));
    config.caches.clear();
    assert!(matches!(Simulator::new(&config), Err(SimError::Config(_))));
}

#[test]
fn three_level_synthetic_trace() {
    let config = layered(&[(1024, "direct", "rr"), (8192, "4way", "lru"), (65536, "full", "lfu")]);
    let mut simulator = Simulator::new(&config).unwrap();
    let result = simulator.simulate(Cursor::new(synthetic_trace(20_000, 1))).unwrap();
    let caches = &result.caches;
    assert!(caches.iter().all(|c| c.hits > 0 && c.misses > 0), "{result:?}");
    assert_eq!(caches[1].hits + caches[1].misses, caches[0].misses);
    assert_eq!(caches[2].hits + caches[2].misses, caches[1].misses);
    assert_eq!(result.main_memory_accesses, caches[2].misses);
}

fn kind() -> impl Strategy<Value = CacheKindConfig> {
    prop_oneof![
        Just(CacheKindConfig::Direct),
        Just(CacheKindConfig::Full),
        Just(CacheKindConfig::Ways(2)),
        Just(CacheKindConfig::Ways(4)),
    ]
}

fn policy() -> impl Strategy<Value = ReplacementPolicyConfig> {
    prop_oneof![
        Just(ReplacementPolicyConfig::RoundRobin),
        Just(ReplacementPolicyConfig::LeastRecentlyUsed),
        Just(ReplacementPolicyConfig::LeastFrequentlyUsed),
    ]
}

/// Between one and three caches of 256 bytes to 4KiB, all with the same line size
fn hierarchy_config() -> impl Strategy<Value = LayeredCacheConfig> {
    prop::collection::vec((2u32..7, kind(), policy()), 1..=3).prop_map(|levels| LayeredCacheConfig {
        caches: levels
            .into_iter()
            .enumerate()
            .map(|(i, (lines_log2, kind, replacement_policy))| CacheConfig {
                name: format!("L{}", i + 1),
                size: LINE << lines_log2,
                line_size: LINE,
                kind,
                replacement_policy,
            })
            .collect(),
    })
}

/// Like `hierarchy_config`, but each cache picks its own line size
fn mixed_line_config() -> impl Strategy<Value = LayeredCacheConfig> {
    let line_size = prop_oneof![Just(32u64), Just(64u64), Just(128u64)];
    prop::collection::vec((line_size, 2u32..7, kind(), policy()), 2..=3).prop_map(|levels| LayeredCacheConfig {
        caches: levels
            .into_iter()
            .enumerate()
            .map(|(i, (line_size, lines_log2, kind, replacement_policy))| CacheConfig {
                name: format!("L{}", i + 1),
                size: line_size << lines_log2,
                line_size,
                kind,
                replacement_policy,
            })
            .collect(),
    })
}

/// Replays accesses one level at a time instead of depth first
///
/// A level's state only depends on the requests it receives, in order, so resolving every level
/// for an access before moving down gives the same counts as the hierarchy. Each miss passes on
/// the part of its request which falls in the missing line
fn replay_level_by_level(config: &LayeredCacheConfig, accesses: &[(u64, u64)]) -> (Vec<LevelStats>, u64) {
    let mut levels: Vec<CacheLevel> = config.caches.iter().map(|c| CacheLevel::from_config(c).unwrap()).collect();
    let mut main_memory_accesses = 0;
    for &(address, size) in accesses {
        let mut requests = vec![(address, address + size - 1)];
        for level in &mut levels {
            let line_size = level.line_size();
            let mut missed = Vec::new();
            for (first, last) in requests {
                for line in first / line_size..=last / line_size {
                    let base = line * line_size;
                    let decoded = level.decode(base);
                    let set = decoded.set_index as usize;
                    if level.probe(set, decoded.tag) == Probe::Hit {
                        continue;
                    }
                    if !level.has_capacity(set) {
                        level.evict_one(set);
                    }
                    level.insert(set, decoded.tag);
                    missed.push((first.max(base), last.min(base + line_size - 1)));
                }
            }
            requests = missed;
        }
        main_memory_accesses += requests.len() as u64;
    }
    (levels.iter().map(CacheLevel::stats).collect(), main_memory_accesses)
}

#[test]
fn byte_access_through_smaller_lines_fetches_one_line() {
    let config = LayeredCacheConfig {
        caches: vec![
            CacheConfig {
                name: "L1".to_string(),
                size: 1024,
                line_size: 128,
                kind: CacheKindConfig::Direct,
                replacement_policy: ReplacementPolicyConfig::RoundRobin,
            },
            CacheConfig {
                name: "L2".to_string(),
                size: 1024,
                line_size: 32,
                kind: CacheKindConfig::Direct,
                replacement_policy: ReplacementPolicyConfig::RoundRobin,
            },
        ],
    };
    let mut simulator = Simulator::new(&config).unwrap();
    let result = simulator.simulate(Cursor::new("0x0 0x10 R 1\n")).unwrap();
    assert_eq!(result.caches[1].hits + result.caches[1].misses, 1);
    assert_eq!(result.main_memory_accesses, 1);
}

/// Accesses within 16KiB so small caches see plenty of reuse
fn accesses() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec((0u64..16 * 1024, 1u64..=2 * LINE), 1..400)
}

proptest! {
    #[test]
    fn every_probe_is_a_hit_or_a_miss(config in hierarchy_config(), accesses in accesses()) {
        let mut hierarchy = Hierarchy::from_config(&config).unwrap();
        let mut expected_probes = 0;
        for &(address, size) in &accesses {
            hierarchy.access(address, size);
            expected_probes += (address + size - 1) / LINE - address / LINE + 1;
        }
        // With equal line sizes, each level sees exactly the misses of the level above
        for stats in hierarchy.stats() {
            prop_assert_eq!(stats.probes(), expected_probes);
            expected_probes = stats.misses;
        }
        prop_assert_eq!(hierarchy.main_memory_accesses(), expected_probes);
    }

    #[test]
    fn sets_never_overflow(config in hierarchy_config(), accesses in accesses()) {
        let mut hierarchy = Hierarchy::from_config(&config).unwrap();
        for (address, size) in accesses {
            hierarchy.access(address, size);
            // The line just accessed is always resident nearest the processor
            let first = &hierarchy.levels()[0];
            let decoded = first.decode(address + size - 1);
            prop_assert!(first.contains(decoded.set_index as usize, decoded.tag));
        }
        for level in hierarchy.levels() {
            for set in 0..level.num_sets() as usize {
                prop_assert!(level.set_len(set) <= level.ways());
            }
            prop_assert!(level.resident_line_count() as u64 <= level.size() / level.line_size());
        }
    }

    #[test]
    fn replay_is_deterministic(config in hierarchy_config(), accesses in accesses()) {
        let mut a = Hierarchy::from_config(&config).unwrap();
        let mut b = Hierarchy::from_config(&config).unwrap();
        for &(address, size) in &accesses {
            a.access(address, size);
            b.access(address, size);
        }
        prop_assert_eq!(a.report(), b.report());
    }

    #[test]
    fn mixed_line_sizes_match_level_by_level_replay(config in mixed_line_config(), accesses in accesses()) {
        let mut hierarchy = Hierarchy::from_config(&config).unwrap();
        for &(address, size) in &accesses {
            hierarchy.access(address, size);
        }
        let (expected_stats, expected_memory) = replay_level_by_level(&config, &accesses);
        prop_assert_eq!(hierarchy.stats(), expected_stats);
        prop_assert_eq!(hierarchy.main_memory_accesses(), expected_memory);
        let first_line = config.caches[0].line_size;
        let expected_first: u64 = accesses
            .iter()
            .map(|&(address, size)| (address + size - 1) / first_line - address / first_line + 1)
            .sum();
        prop_assert_eq!(hierarchy.stats()[0].probes(), expected_first);
    }

    #[test]
    fn mixed_line_sizes_never_overflow(config in mixed_line_config(), accesses in accesses()) {
        let mut hierarchy = Hierarchy::from_config(&config).unwrap();
        for (address, size) in accesses {
            hierarchy.access(address, size);
        }
        for level in hierarchy.levels() {
            for set in 0..level.num_sets() as usize {
                prop_assert!(level.set_len(set) <= level.ways());
            }
        }
    }
}
