//! Error types for graph compilation.

use thiserror::Error;

/// Caller configuration rejected before any graph is emitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("password is empty")]
    EmptyPassword,

    #[error("password symbol {symbol} at position {position} is outside 1..=7")]
    SymbolOutOfRange { position: usize, symbol: i64 },

    #[error("password is not a comma separated list of symbols: {0}")]
    MalformedPassword(String),

    #[error("{field} = {value} is outside [{min}, {max}]")]
    TimingOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("warning threshold {warning} exceeds countdown duration {duration}")]
    WarningExceedsDuration { warning: f64, duration: f64 },

    #[error("padding state count {count} exceeds limit {limit}")]
    PaddingTooLarge { count: usize, limit: usize },

    #[error("host layer count {count} exceeds limit {limit}")]
    HostLayersOutOfRange { count: usize, limit: usize },

    #[error("duplicate effect name: {0}")]
    DuplicateEffect(String),
}

/// Internal graph defect. Caught by the self-check inside `compile`; a
/// controller carrying one of these is never returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyViolation {
    #[error("layer {layer}: duplicate state name {state}")]
    DuplicateStateName { layer: String, state: String },

    #[error("layer {layer}: duplicate layer name")]
    DuplicateLayerName { layer: String },

    #[error("layer {layer}: transition references unknown state {state}")]
    UnknownState { layer: String, state: String },

    #[error("layer {layer}: required state {state} is unreachable")]
    UnreachableRequired { layer: String, state: String },

    #[error("layer {layer}: padding state {state} is reachable")]
    ReachablePadding { layer: String, state: String },

    #[error("layer {layer}: state {state} has overlapping instant guards {first} and {second} (witness {witness})")]
    OverlappingGuards {
        layer: String,
        state: String,
        first: String,
        second: String,
        witness: String,
    },

    #[error("layer {layer}: parameter {param} is not declared with kind {expected}")]
    UndeclaredParameter {
        layer: String,
        param: String,
        expected: &'static str,
    },

    #[error("layer {owner}: mask covers {channel}, which layer {layer} drives")]
    MaskOverlap {
        owner: String,
        layer: String,
        channel: String,
    },

    #[error("layer {layer}: state {state} writes layer weight but only the lock layer may")]
    ForeignWeightWriter { layer: String, state: String },

    #[error("layer {layer}: weight instruction targets layer {target} outside 0..{count}")]
    WeightTargetOutOfRange {
        layer: String,
        target: usize,
        count: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("topology invariant violation: {0}")]
    Topology(#[from] TopologyViolation),
}

impl CompileError {
    pub fn is_config(&self) -> bool {
        matches!(self, CompileError::Config(_))
    }
}

/// Failure reading or writing a serialized controller asset.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("asset json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("asset io: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported asset format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("asset digest mismatch: recorded {recorded}, computed {computed}")]
    DigestMismatch { recorded: String, computed: String },
}
