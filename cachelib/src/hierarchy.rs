use log::debug;
use crate::cache::{CacheLevel, LevelStats, Probe};
use crate::config::LayeredCacheConfig;
use crate::decoder::Decoded;
use crate::error::SimResult;
use crate::simulator::{CacheResult, LayeredCacheResult};

/// An ordered chain of caches in front of main memory
///
/// Main memory is the implicit final level. It never holds anything, every request which reaches
/// it counts as one main memory access
///
/// The hierarchy is fully inclusive along the miss path: when a line misses in a cache, it is
/// fetched from the next level down and then filled into the cache that missed, evicting if the
/// set is full. Caches which hit are left alone, as are caches the request never reached
pub struct Hierarchy {
    levels: Vec<CacheLevel>,
    main_memory_accesses: u64,
}

impl Hierarchy {
    /// Builds a hierarchy from caches ordered nearest the processor first
    pub fn new(levels: Vec<CacheLevel>) -> Self {
        Self {
            levels,
            main_memory_accesses: 0,
        }
    }

    /// Builds every cache in a configuration
    ///
    /// # Errors
    ///
    /// The first cache which fails validation
    pub fn from_config(config: &LayeredCacheConfig) -> SimResult<Self> {
        config.validate()?;
        let levels = config
            .caches
            .iter()
            .map(CacheLevel::from_config)
            .collect::<SimResult<Vec<_>>>()?;
        debug!("hierarchy of {} caches in front of main memory", levels.len());
        Ok(Self::new(levels))
    }

    /// Accesses `size` bytes starting at `address`
    ///
    /// The range is split into the lines of the first cache. A zero sized access touches nothing
    pub fn access(&mut self, address: u64, size: u64) {
        if size == 0 {
            return;
        }
        let last = address.saturating_add(size - 1);
        self.fetch(0, address, last);
    }

    /// Resolves the inclusive byte range `first..=last` at level `depth` and below
    ///
    /// Each line of this level covering the range is probed. On a miss the part of the range in
    /// that line is requested from the next level, which splits it by its own line size, and then
    /// the line is filled here
    fn fetch(&mut self, depth: usize, first: u64, last: u64) {
        let Some(level) = self.levels.get(depth) else {
            self.main_memory_accesses += 1;
            return;
        };
        let line_size = level.line_size();
        for line in first / line_size..=last / line_size {
            let base = line * line_size;
            let level = &mut self.levels[depth];
            let Decoded { set_index, tag, .. } = level.decode(base);
            let set = set_index as usize;
            if level.probe(set, tag) == Probe::Hit {
                continue;
            }
            let line_last = base.saturating_add(line_size - 1);
            self.fetch(depth + 1, first.max(base), last.min(line_last));
            let level = &mut self.levels[depth];
            if !level.has_capacity(set) {
                level.evict_one(set);
            }
            level.insert(set, tag);
        }
    }

    pub fn levels(&self) -> &[CacheLevel] {
        &self.levels
    }

    pub fn main_memory_accesses(&self) -> u64 {
        self.main_memory_accesses
    }

    pub fn stats(&self) -> Vec<LevelStats> {
        self.levels.iter().map(CacheLevel::stats).collect()
    }

    /// Snapshot of the counters in the output format
    pub fn report(&self) -> LayeredCacheResult {
        LayeredCacheResult {
            main_memory_accesses: self.main_memory_accesses,
            caches: self
                .levels
                .iter()
                .map(|level| CacheResult {
                    name: level.name().to_string(),
                    hits: level.stats().hits,
                    misses: level.stats().misses,
                })
                .collect(),
        }
    }
}
