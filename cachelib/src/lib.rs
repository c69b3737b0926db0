//! # CacheLib
//!
//! Cachelib is a library for simulating a hierarchy of caches in front of main memory
//!
//! Each level of the hierarchy is a set associative cache whose replacement policy (round robin,
//! LRU, or LFU) is chosen when it is built. The simulator replays a memory trace through the
//! hierarchy and reports the hits and misses at each level along with the number of accesses
//! which reached main memory
//!
//! While designed to accommodate high performance, it prioritises flexibility, being easy to
//! maintain and expand with new policies

/// The identity of a line within its set, every address bit above the set index
pub type Tag = u64;

/// Contains the implementation of a single cache level
pub mod cache;

/// Contains definitions for the JSON input format
pub mod config;

/// Splits addresses into a set index, tag, and offset
pub mod decoder;

/// Error types for configuration, trace parsing, and address decoding
pub mod error;

/// Contains the multi-level hierarchy which routes accesses between caches and main memory
pub mod hierarchy;

/// Opening trace files
pub mod io;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the simulator used to simulate a program with a given cache configuration
pub mod simulator;

/// Parsing of trace records
pub mod trace;

#[cfg(test)]
mod test;

/// Contains utilities for running tests and benchmarks.
pub mod util;
