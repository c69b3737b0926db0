use thiserror::Error;

/// Convenience alias for anything that can fail while configuring or running a simulation
pub type SimResult<T> = Result<T, SimError>;

/// A level specification which can't be turned into a cache
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration doesn't contain any caches
    #[error("the configuration must contain at least one cache")]
    NoCaches,

    #[error("cache `{name}`: size must be positive")]
    ZeroSize { name: String },

    #[error("cache `{name}`: line size must be positive")]
    ZeroLineSize { name: String },

    #[error("cache `{name}`: associativity must be positive")]
    ZeroAssociativity { name: String },

    /// The cache can't be split evenly into sets of whole lines
    #[error("cache `{name}`: size {size} is not divisible by line size {line_size} x associativity {ways}")]
    Indivisible {
        name: String,
        size: u64,
        line_size: u64,
        ways: u64,
    },

    #[error("unrecognised cache kind `{0}`, expected direct, full, or <N>way")]
    UnknownKind(String),

    #[error("unrecognised replacement policy `{0}`, expected rr, lru, or lfu")]
    UnknownPolicy(String),
}

/// A trace record which couldn't be parsed into an address and a size
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("trace line {line}: {reason} (`{text}`)")]
pub struct TraceFormatError {
    /// 1-based line number in the trace
    pub line: usize,
    pub text: String,
    pub reason: &'static str,
}

/// Misuse of the address decoder
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecoderError {
    /// Mask based decoding only works when the set count is a power of two
    #[error("set count {0} is not a power of two, mask decoding needs the modulo form instead")]
    NotPowerOfTwo(u64),

    #[error("decoder needs a positive line size and set count (got {line_size} and {set_count})")]
    ZeroGeometry { line_size: u64, set_count: u64 },
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("couldn't parse the config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Trace(#[from] TraceFormatError),

    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error("couldn't read the trace: {0}")]
    Io(#[from] std::io::Error),
}
