use log::{debug, trace};
use crate::config::{check_geometry, CacheConfig};
use crate::decoder::{Decoded, Decoder};
use crate::error::SimResult;
use crate::replacement_policies::{Policy, ReplacementPolicy};
use crate::Tag;

/// The outcome of looking a line up in one cache
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Probe {
    Hit,
    Miss,
}

/// Hit and miss counts for one cache
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub hits: u64,
    pub misses: u64,
}

impl LevelStats {
    /// Every probe is exactly one hit or one miss
    pub fn probes(&self) -> u64 {
        self.hits + self.misses
    }
}

/// One level of the hierarchy, parameterised at construction by a replacement policy
///
/// The level only answers whether a line is resident and keeps count; it never decides on its own
/// to insert a line. Insertion and eviction are separate primitives so the hierarchy controls what
/// gets filled where.
///
/// Resident tags are kept in a flat vector of `num_sets * ways` slots. A set only ever holds tags
/// whose set index is that set, so a tag can't be resident in two sets of the same level
pub struct CacheLevel {
    name: String,
    size: u64,
    ways: usize,
    decoder: Decoder,
    lines: Vec<Tag>,
    // Number of occupied slots at the start of each set's range
    occupancy: Vec<usize>,
    policy: Policy,
    stats: LevelStats,
}

impl CacheLevel {
    /// Builds a level with `size / (line_size * ways)` sets
    ///
    /// # Errors
    ///
    /// If the geometry doesn't divide into whole sets of whole lines
    pub fn new(name: impl Into<String>, size: u64, line_size: u64, ways: u64, policy: Policy) -> SimResult<Self> {
        let name = name.into();
        let num_sets = check_geometry(&name, size, line_size, ways)?;
        let decoder = Decoder::new(line_size, num_sets)?;
        Ok(Self {
            name,
            size,
            ways: ways as usize,
            decoder,
            lines: vec![0; (num_sets * ways) as usize],
            occupancy: vec![0; num_sets as usize],
            policy,
            stats: LevelStats::default(),
        })
    }

    /// Creates a cache from a cache configuration
    pub fn from_config(config: &CacheConfig) -> SimResult<Self> {
        let geometry = config.geometry()?;
        let policy = Policy::new(config.replacement_policy, geometry.num_sets as usize, geometry.ways as usize);
        let level = Self::new(&*config.name, config.size, config.line_size, geometry.ways, policy)?;
        debug!(
            "built {}: {} bytes, {} byte lines, {} sets of {} ways, {} replacement",
            level.name, level.size, config.line_size, geometry.num_sets, geometry.ways, config.replacement_policy
        );
        Ok(level)
    }

    #[inline]
    pub fn decode(&self, address: u64) -> Decoded {
        self.decoder.decode(address)
    }

    fn set_range(&self, set: usize) -> std::ops::Range<usize> {
        let start = set * self.ways;
        start..start + self.occupancy[set]
    }

    /// Looks `tag` up in `set`, counting a hit or a miss
    ///
    /// A hit is reported to the replacement policy. A miss changes nothing but the counter
    pub fn probe(&mut self, set: usize, tag: Tag) -> Probe {
        if self.lines[self.set_range(set)].contains(&tag) {
            self.stats.hits += 1;
            self.policy.touch(set, tag);
            Probe::Hit
        } else {
            self.stats.misses += 1;
            Probe::Miss
        }
    }

    pub fn has_capacity(&self, set: usize) -> bool {
        self.occupancy[set] < self.ways
    }

    /// Makes `tag` resident in `set` and starts tracking it in the replacement policy
    ///
    /// # Panics
    ///
    /// If the set is already full
    pub fn insert(&mut self, set: usize, tag: Tag) {
        assert!(self.has_capacity(set), "{}: inserting into full set {set}", self.name);
        let slot = set * self.ways + self.occupancy[set];
        self.lines[slot] = tag;
        self.occupancy[set] += 1;
        self.policy.touch(set, tag);
    }

    /// Asks the replacement policy for a victim in `set` and removes it, returning its tag
    ///
    /// # Panics
    ///
    /// If the set isn't full, or the policy picks a tag which isn't resident
    pub fn evict_one(&mut self, set: usize) -> Tag {
        assert!(!self.has_capacity(set), "{}: evicting from set {set} which isn't full", self.name);
        let victim = self.policy.evict(set);
        let range = self.set_range(set);
        let position = self.lines[range.clone()]
            .iter()
            .position(|&t| t == victim)
            .unwrap_or_else(|| panic!("{}: policy evicted tag {victim:#x} which isn't in set {set}", self.name));
        // Order within a set doesn't matter, the policy tracks its own
        self.lines.swap(range.start + position, range.end - 1);
        self.occupancy[set] -= 1;
        trace!("{}: evicted tag {victim:#x} from set {set}", self.name);
        victim
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn line_size(&self) -> u64 {
        self.decoder.line_size()
    }

    pub fn ways(&self) -> usize {
        self.ways
    }

    pub fn num_sets(&self) -> u64 {
        self.decoder.set_count()
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn stats(&self) -> LevelStats {
        self.stats
    }

    /// Number of tags currently resident in `set`
    pub fn set_len(&self, set: usize) -> usize {
        self.occupancy[set]
    }

    /// Gets the number of resident cache lines. Useful for analysing cache performance or
    /// debugging
    pub fn resident_line_count(&self) -> usize {
        self.occupancy.iter().sum()
    }

    /// Whether `tag` is resident in `set`, without counting a probe
    pub fn contains(&self, set: usize, tag: Tag) -> bool {
        self.lines[self.set_range(set)].contains(&tag)
    }
}

impl TryFrom<&CacheConfig> for CacheLevel {
    type Error = crate::error::SimError;

    fn try_from(value: &CacheConfig) -> Result<Self, Self::Error> {
        Self::from_config(value)
    }
}
