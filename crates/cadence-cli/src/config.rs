//! Configuration management for the Cadence CLI

use anyhow::{Context, Result};
use cadence_core::prelude::*;
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `CADENCE_CACHE__MAX_SIZE=8`
pub const ENV_PREFIX: &str = "CADENCE";

/// CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Directory of `{model_id}.bin` weight blobs. Models are built
    /// without weights when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<PathBuf>,

    /// Model cache settings
    #[serde(default)]
    pub cache: ModelCacheConfig,

    /// Parameters every voice model is loaded with
    #[serde(default)]
    pub voice: VoiceModelConfig,
}

impl CliConfig {
    /// Load configuration from an optional TOML file layered under
    /// `CADENCE_`-prefixed environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| match path {
                Some(path) => format!("Failed to read config file: {}", path.display()),
                None => "Failed to read configuration from the environment".to_string(),
            })?;

        let config: CliConfig = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.cache.validate().context("Invalid [cache] section")?;
        self.voice.validate().context("Invalid [voice] section")?;
        if let Some(dir) = &self.models_dir {
            anyhow::ensure!(
                !dir.as_os_str().is_empty(),
                "models_dir must not be empty; remove it to build models without weights"
            );
        }
        Ok(())
    }

    /// Loader matching `models_dir`
    pub fn loader(&self) -> VoiceModelLoader {
        match &self.models_dir {
            Some(dir) => VoiceModelLoader::from_dir(dir),
            None => VoiceModelLoader::in_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cadence.toml");

        let config = CliConfig {
            cache: ModelCacheConfig::new(2, Duration::from_secs(90))
                .with_sweep_interval(Duration::from_secs(30)),
            voice: VoiceModelConfig {
                sample_rate: 16000,
                ..VoiceModelConfig::default()
            },
            models_dir: Some(dir.path().join("models")),
        };
        config.save(&path).unwrap();

        let loaded = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[cache]\nmax_size = 9\n").unwrap();

        let loaded = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.cache.max_size, 9);
        assert_eq!(loaded.cache.ttl_ms, 3_600_000);
        assert_eq!(loaded.voice, VoiceModelConfig::default());
        assert!(loaded.models_dir.is_none());
    }

    #[test]
    fn test_invalid_cache_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[cache]\nmax_size = 0\n").unwrap();

        let err = CliConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("CONFIG_MAX_SIZE_ZERO"));
    }

    #[test]
    fn test_invalid_voice_section_is_rejected() {
        let mut config = CliConfig::default();
        config.voice.amplitude = 2.0;
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("amplitude"));
    }
}
