//! Cadence Core - keyed model cache for synthesis inference
//!
//! This crate holds expensive-to-construct resources (voice models) behind an
//! integer or other ordered key, with TTL expiry, oldest-first eviction when a
//! capacity bound is hit, and deduplication of concurrent loads per key.

// Module declarations
pub mod config;
pub mod loader;
pub mod model_cache;
pub mod stats;
pub mod synth;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The injected loader could not produce a resource for a key
    #[error("Load failure [{code}] for key {key}: {message}\nSuggestion: {suggestion}")]
    LoadFailure {
        code: &'static str,
        key: String,
        message: String,
        suggestion: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration parsing and validation errors
    #[error("Configuration error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Configuration {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        config_path: Option<std::path::PathBuf>,
        field_name: Option<String>,
    },

    /// Input validation and parameter errors
    #[error("Invalid input [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    InvalidInput {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        parameter_name: Option<String>,
        value: Option<String>,
    },

    /// File system and I/O errors
    #[error("IO error [{code}]: {message}\nPath: {path:?}\nSuggestion: {suggestion}")]
    Io {
        code: &'static str,
        message: String,
        path: Option<std::path::PathBuf>,
        suggestion: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Wrap a loader failure with the key it was loading
    pub fn load_failure<K: std::fmt::Debug>(key: &K, source: anyhow::Error) -> Self {
        Self::LoadFailure {
            code: "CACHE_LOAD_FAILED",
            key: format!("{:?}", key),
            message: format!("{:#}", source),
            suggestion: "Check the resource exists and its configuration is valid, then retry"
                .to_string(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Configuration {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            config_path: None,
            field_name: None,
        }
    }

    /// Create a configuration error pointing at a specific field
    pub fn configuration_field<S1, S2, S3, S4>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        field_name: S4,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self::Configuration {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            config_path: None,
            field_name: Some(field_name.into()),
        }
    }

    /// Create an invalid input error with parameter details
    pub fn invalid_parameter<S1, S2, S3, S4, S5>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        param_name: S4,
        value: S5,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
        S5: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            parameter_name: Some(param_name.into()),
            value: Some(value.into()),
        }
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::LoadFailure { code, .. } => code,
            Self::Configuration { code, .. } => code,
            Self::InvalidInput { code, .. } => code,
            Self::Io { code, .. } => code,
        }
    }

    /// Whether this error came out of a loader
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::LoadFailure { .. })
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        let (code, suggestion) = match err.kind() {
            std::io::ErrorKind::NotFound => (
                "IO_FILE_NOT_FOUND",
                "Check that the file path is correct and the file exists",
            ),
            std::io::ErrorKind::PermissionDenied => (
                "IO_PERMISSION_DENIED",
                "Check file permissions or run with appropriate privileges",
            ),
            std::io::ErrorKind::InvalidData => (
                "IO_INVALID_DATA",
                "The file may be corrupted or in an unexpected format",
            ),
            _ => (
                "IO_UNKNOWN",
                "Check the file system and try the operation again",
            ),
        };

        Self::Io {
            code,
            message: err.to_string(),
            path: None,
            suggestion: suggestion.to_string(),
            source: err,
        }
    }
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        config::ModelCacheConfig,
        loader::{loader_fn, FnLoader, ResourceLoader},
        model_cache::{EvictionHook, ModelCache},
        stats::{CacheCounters, CacheStats},
        synth::{VoiceModel, VoiceModelConfig, VoiceModelLoader, VoiceModelCache},
        CoreError, Result,
    };
}

// Re-export key types at the crate root
pub use config::ModelCacheConfig;
pub use loader::ResourceLoader;
pub use model_cache::ModelCache;
pub use stats::CacheStats;
