//! Error types

use thiserror::Error;

/// Malformed or missing configuration. Fatal at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required section: {0}")]
    MissingSection(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown symbol '{symbol}' referenced in {context}")]
    UnknownSymbol { symbol: String, context: String },

    #[error("Invalid payline {line}: {reason}")]
    InvalidPayline { line: String, reason: String },

    #[error("Invalid match count '{count}' for symbol '{symbol}'")]
    InvalidMatchCount { symbol: String, count: String },

    #[error("Invalid bucket '{name}': {reason}")]
    InvalidBucket { name: String, reason: String },

    #[error("Win tiers '{lower}' and '{upper}' have overlapping ranges")]
    OverlappingTiers { lower: String, upper: String },
}

/// Engine-level failures surfaced to the caller
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Engine not ready: bucket store construction has not completed")]
    NotReady,

    #[error("Bucket store construction failed: {0}")]
    BuildFailed(String),
}
