use std::fmt;
use std::str::FromStr;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::error::{ConfigError, SimResult};

lazy_static! {
    static ref N_WAY: Regex = Regex::new(r"^(?P<ways>[0-9])[0-9]*way$").expect("valid n-way pattern");
}

/// A cache configuration with multiple layers, ordered from the cache closest to the processor to
/// the cache closest to main memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayeredCacheConfig {
    pub caches: Vec<CacheConfig>,
}

/// A configuration for a single cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    pub size: u64,
    pub line_size: u64,
    pub kind: CacheKindConfig,
    #[serde(default = "ReplacementPolicyConfig::default")]
    pub replacement_policy: ReplacementPolicyConfig,
}

/// The kind of cache - direct, full, or `<N>way`
///
/// Only the leading digit of `<N>` counts, so `16way` is a one way cache
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CacheKindConfig {
    Direct,
    Full,
    /// Set associative with the given number of ways
    Ways(u64),
}

/// The replacement policy, if applicable - round robin, lru, or lfu. Defaults to round robin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReplacementPolicyConfig {
    #[default]
    RoundRobin,
    LeastRecentlyUsed,
    LeastFrequentlyUsed,
}

impl LayeredCacheConfig {
    /// Checks every cache can be built, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caches.is_empty() {
            return Err(ConfigError::NoCaches);
        }
        self.caches.iter().try_for_each(|cache| cache.geometry().map(|_| ()))
    }

    /// Parses and validates a JSON configuration
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// The derived shape of a cache
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub ways: u64,
    pub num_sets: u64,
}

impl CacheConfig {
    /// Works out the associativity and set count of the cache
    ///
    /// # Errors
    ///
    /// If the size or line size is zero, or the cache can't be split into whole sets of whole lines
    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        let ways = match self.kind {
            CacheKindConfig::Direct => 1,
            CacheKindConfig::Full => self.size.checked_div(self.line_size).unwrap_or(0),
            CacheKindConfig::Ways(n) => n,
        };
        let num_sets = check_geometry(&self.name, self.size, self.line_size, ways)?;
        Ok(Geometry { ways, num_sets })
    }
}

/// Checks a cache of `size` bytes splits into whole sets of `ways` lines, returning the set count
pub(crate) fn check_geometry(name: &str, size: u64, line_size: u64, ways: u64) -> Result<u64, ConfigError> {
    let name = || name.to_string();
    if size == 0 {
        return Err(ConfigError::ZeroSize { name: name() });
    }
    if line_size == 0 {
        return Err(ConfigError::ZeroLineSize { name: name() });
    }
    if ways == 0 && line_size <= size {
        return Err(ConfigError::ZeroAssociativity { name: name() });
    }
    match line_size.checked_mul(ways) {
        Some(set_bytes) if set_bytes != 0 && size % set_bytes == 0 => Ok(size / set_bytes),
        _ => Err(ConfigError::Indivisible {
            name: name(),
            size,
            line_size,
            ways,
        }),
    }
}

impl FromStr for CacheKindConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "full" => Ok(Self::Full),
            _ => N_WAY
                .captures(s)
                .and_then(|c| c.name("ways"))
                .and_then(|ways| ways.as_str().parse().ok())
                .map(Self::Ways)
                .ok_or_else(|| ConfigError::UnknownKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for CacheKindConfig {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CacheKindConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKindConfig::Direct => write!(f, "direct"),
            CacheKindConfig::Full => write!(f, "full"),
            CacheKindConfig::Ways(n) => write!(f, "{n}way"),
        }
    }
}

impl From<CacheKindConfig> for String {
    fn from(value: CacheKindConfig) -> Self {
        value.to_string()
    }
}

impl FromStr for ReplacementPolicyConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" => Ok(Self::RoundRobin),
            "lru" => Ok(Self::LeastRecentlyUsed),
            "lfu" => Ok(Self::LeastFrequentlyUsed),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for ReplacementPolicyConfig {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ReplacementPolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplacementPolicyConfig::RoundRobin => "rr",
            ReplacementPolicyConfig::LeastRecentlyUsed => "lru",
            ReplacementPolicyConfig::LeastFrequentlyUsed => "lfu",
        })
    }
}

impl From<ReplacementPolicyConfig> for String {
    fn from(value: ReplacementPolicyConfig) -> Self {
        value.to_string()
    }
}
