use std::io::BufRead;
use std::time::{Duration, Instant};
use log::{info, trace};
use serde::{Deserialize, Serialize};
use crate::config::LayeredCacheConfig;
use crate::error::SimResult;
use crate::hierarchy::Hierarchy;
use crate::trace::{Access, TraceReader};

/// The simulator replays traces against a cache hierarchy, and collects results.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// results accordingly
pub struct Simulator {
    hierarchy: Hierarchy,
    simulation_time: Duration,
    accesses: u64,
}

/// The result of a cache simulation. Can be serialised to the required output format
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct LayeredCacheResult {
    pub main_memory_accesses: u64,
    pub caches: Vec<CacheResult>,
}

/// The result for an individual cache. Can be serialised to the required output format
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CacheResult {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A cache configuration, usually resulting from parsing JSON
    ///
    /// returns: SimResult<Simulator>
    pub fn new(config: &LayeredCacheConfig) -> SimResult<Self> {
        Ok(Self::with_hierarchy(Hierarchy::from_config(config)?))
    }

    pub fn with_hierarchy(hierarchy: Hierarchy) -> Self {
        Self {
            hierarchy,
            simulation_time: Duration::new(0, 0),
            accesses: 0,
        }
    }

    /// Performs a single access, the hierarchy handles splitting it into lines
    pub fn access(&mut self, access: Access) {
        trace!("{:?} of {} bytes at {:#x}", access.mode, access.size, access.address);
        self.hierarchy.access(access.address, access.size);
        self.accesses += 1;
    }

    /// Simulates every record read from `reader`, in order
    ///
    /// Reads from the source are *guaranteed to be sequential*. This means that when using
    /// something like mmap, one can advise the operating system that sequential reads will be
    /// used, which can increase read performance
    ///
    /// # Errors
    ///
    /// The first malformed record or read failure. The run stops there and no result is returned;
    /// the counters will include the records before it
    pub fn simulate<R: BufRead>(&mut self, reader: R) -> SimResult<LayeredCacheResult> {
        let start = Instant::now();
        let before = self.accesses;
        for access in TraceReader::new(reader) {
            self.access(access?);
        }
        self.simulation_time += start.elapsed();
        let result = self.result();
        info!(
            "simulated {} accesses, {} main memory accesses",
            self.accesses - before,
            result.main_memory_accesses
        );
        Ok(result)
    }

    /// The results accumulated so far
    pub fn result(&self) -> LayeredCacheResult {
        self.hierarchy.report()
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of resident lines for each cache
    pub fn get_resident_line_counts(&self) -> Vec<u64> {
        self.hierarchy
            .levels()
            .iter()
            .map(|level| level.resident_line_count() as u64)
            .collect()
    }
}
