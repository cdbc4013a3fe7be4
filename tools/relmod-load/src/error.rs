use std::path::PathBuf;

use relmod::{LoadFailure, RelmodError};

/// All errors produced by relmod-load.
///
/// Variants are split into two categories:
/// - **Infrastructure errors** (exit code 2): unreadable inputs, bad config or symbol map
/// - **Operational errors** (exit code 1): the module itself cannot be loaded
#[derive(thiserror::Error, Debug)]
pub enum LoadToolError {
    // ── Infrastructure errors (exit code 2) ──────────────────────────
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Config parse error: {0}")]
    ConfigParseError(String),

    #[error("Invalid address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("Invalid symbol map entry '{name}': {reason}")]
    InvalidSymbolMap { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // ── Operational errors (exit code 1) ─────────────────────────────
    #[error("Not a RELMOD module: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Parse failed: {0}")]
    ParseFailed(#[from] RelmodError),

    #[error("Load failed: {0}")]
    LoadFailed(#[from] LoadFailure),
}

impl LoadToolError {
    /// Map each error variant to its process exit code.
    ///
    /// - `2`: infrastructure error
    /// - `1`: operational failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::FileNotFound { .. }
            | Self::ConfigParseError(_)
            | Self::InvalidAddress { .. }
            | Self::InvalidSymbolMap { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => 2,

            Self::UnsupportedFormat { .. } | Self::ParseFailed(_) | Self::LoadFailed(_) => 1,
        }
    }
}
