//! Mock voice model used as the cached resource for speech synthesis
//!
//! The model renders text as a sine tone whose length follows the number of
//! characters. It stands in for a real synthesis network: loading it is the
//! expensive step the cache exists to avoid repeating, and `release` is where a
//! real model would hand its accelerator memory back.

use anyhow::{ensure, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::loader::ResourceLoader;
use crate::model_cache::ModelCache;
use crate::{CoreError, Result};

/// Highest supported output sample rate
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Longest audio a single request may render
pub const MAX_SYNTH_SECONDS: f32 = 600.0;

/// Cache of voice models keyed by model id
pub type VoiceModelCache = ModelCache<u64, VoiceModelConfig, VoiceModel>;

/// Parameters a voice model is loaded with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceModelConfig {
    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Frequency of the rendered tone
    #[serde(default = "default_base_frequency_hz")]
    pub base_frequency_hz: f32,

    /// Peak amplitude, 0.0 to 1.0
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,

    /// Seconds of audio produced per input character
    #[serde(default = "default_seconds_per_char")]
    pub seconds_per_char: f32,
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_base_frequency_hz() -> f32 {
    220.0
}

fn default_amplitude() -> f32 {
    0.5
}

fn default_seconds_per_char() -> f32 {
    0.06
}

impl Default for VoiceModelConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            base_frequency_hz: default_base_frequency_hz(),
            amplitude: default_amplitude(),
            seconds_per_char: default_seconds_per_char(),
        }
    }
}

impl VoiceModelConfig {
    /// Check the parameters describe a renderable model
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.sample_rate > 0 && self.sample_rate <= MAX_SAMPLE_RATE,
            "sample_rate must be in 1..={}, got {}",
            MAX_SAMPLE_RATE,
            self.sample_rate
        );
        ensure!(
            self.base_frequency_hz.is_finite() && self.base_frequency_hz > 0.0,
            "base_frequency_hz must be a positive number, got {}",
            self.base_frequency_hz
        );
        ensure!(
            self.base_frequency_hz < self.sample_rate as f32 / 2.0,
            "base_frequency_hz {} is above the Nyquist limit for {} Hz",
            self.base_frequency_hz,
            self.sample_rate
        );
        ensure!(
            self.amplitude.is_finite() && self.amplitude > 0.0 && self.amplitude <= 1.0,
            "amplitude must be in (0.0, 1.0], got {}",
            self.amplitude
        );
        ensure!(
            self.seconds_per_char.is_finite()
                && self.seconds_per_char > 0.0
                && self.seconds_per_char <= MAX_SYNTH_SECONDS,
            "seconds_per_char must be in (0, {}], got {}",
            MAX_SYNTH_SECONDS,
            self.seconds_per_char
        );
        Ok(())
    }
}

/// A loaded voice model
#[derive(Debug)]
pub struct VoiceModel {
    model_id: u64,
    config: VoiceModelConfig,
    weights: Vec<u8>,
}

impl VoiceModel {
    pub fn new(model_id: u64, config: VoiceModelConfig, weights: Vec<u8>) -> Self {
        Self {
            model_id,
            config,
            weights,
        }
    }

    pub fn model_id(&self) -> u64 {
        self.model_id
    }

    pub fn config(&self) -> &VoiceModelConfig {
        &self.config
    }

    /// Size of the weights blob the model was loaded from
    pub fn weights_len(&self) -> usize {
        self.weights.len()
    }

    /// Render `text` to mono f32 samples at the model's sample rate
    pub fn synthesize(&self, text: &str) -> Result<Vec<f32>> {
        let chars = text.trim().chars().count();
        if chars == 0 {
            return Err(CoreError::invalid_parameter(
                "SYNTH_EMPTY_TEXT",
                "Cannot synthesize empty text",
                format!("Synthesis request for model {}", self.model_id),
                "Provide at least one non-whitespace character",
                "text",
                format!("{:?}", text),
            ));
        }

        let rate = self.config.sample_rate as f32;
        let seconds = chars as f32 * self.config.seconds_per_char;
        if seconds > MAX_SYNTH_SECONDS {
            return Err(CoreError::invalid_parameter(
                "SYNTH_TOO_LONG",
                format!(
                    "Text would render {:.1}s of audio, above the {}s limit",
                    seconds, MAX_SYNTH_SECONDS
                ),
                format!("Synthesis request for model {}", self.model_id),
                "Split the text into shorter requests",
                "text",
                format!("{} characters", chars),
            ));
        }
        let len = (seconds * rate).round() as usize;
        let step = TAU * self.config.base_frequency_hz / rate;

        let samples = (0..len)
            .map(|n| self.config.amplitude * (step * n as f32).sin())
            .collect();

        debug!(model_id = self.model_id, chars, samples = len, "Synthesized text");
        Ok(samples)
    }

    /// Playback length of `samples` produced by this model
    pub fn duration(&self, samples: &[f32]) -> Duration {
        Duration::from_secs_f64(samples.len() as f64 / self.config.sample_rate as f64)
    }

    /// Free what the model holds outside ordinary memory.
    ///
    /// Installed as the cache's eviction hook.
    pub fn release(&self) -> anyhow::Result<()> {
        info!(
            model_id = self.model_id,
            weights_bytes = self.weights.len(),
            "Unloading voice model"
        );
        Ok(())
    }
}

/// Loads voice models, optionally from `{models_dir}/{model_id}.bin` blobs
#[derive(Debug, Clone, Default)]
pub struct VoiceModelLoader {
    models_dir: Option<PathBuf>,
}

impl VoiceModelLoader {
    /// Loader that builds models without any backing weights
    pub fn in_memory() -> Self {
        Self { models_dir: None }
    }

    /// Loader that requires a weights blob per model in `models_dir`
    pub fn from_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: Some(models_dir.into()),
        }
    }

    /// Path of the weights blob for `model_id`, if a models dir is set
    pub fn weights_path(&self, model_id: u64) -> Option<PathBuf> {
        self.models_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.bin", model_id)))
    }
}

#[async_trait]
impl ResourceLoader<u64, VoiceModelConfig, VoiceModel> for VoiceModelLoader {
    async fn load(&self, model_id: &u64, config: &VoiceModelConfig) -> anyhow::Result<VoiceModel> {
        config
            .validate()
            .with_context(|| format!("Invalid configuration for voice model {}", model_id))?;

        let weights = match self.weights_path(*model_id) {
            Some(path) => tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read weights from {}", path.display()))?,
            None => Vec::new(),
        };

        Ok(VoiceModel::new(*model_id, config.clone(), weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(VoiceModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = VoiceModelConfig::default();
        config.amplitude = 1.5;
        assert!(config.validate().is_err());

        let mut config = VoiceModelConfig::default();
        config.base_frequency_hz = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = VoiceModelConfig::default();
        config.base_frequency_hz = 20_000.0;
        assert!(config.validate().is_err());

        let mut config = VoiceModelConfig::default();
        config.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = VoiceModelConfig::default();
        config.sample_rate = 10_000_000;
        assert!(config.validate().is_err());

        let mut config = VoiceModelConfig::default();
        config.seconds_per_char = 1e9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("seconds_per_char"));
    }

    #[test]
    fn test_synthesize_length_follows_text() {
        let config = VoiceModelConfig {
            sample_rate: 1000,
            base_frequency_hz: 100.0,
            amplitude: 0.5,
            seconds_per_char: 0.01,
        };
        let model = VoiceModel::new(1, config, Vec::new());

        let samples = model.synthesize("hello").unwrap();
        assert_eq!(samples.len(), 50);
        assert_eq!(samples[0], 0.0);
        assert!(samples.iter().all(|s| s.abs() <= 0.5 + f32::EPSILON));
        assert_eq!(model.duration(&samples).as_millis(), 50);
    }

    #[test]
    fn test_synthesize_rejects_overlong_audio() {
        let config = VoiceModelConfig {
            seconds_per_char: 1.0,
            ..VoiceModelConfig::default()
        };
        let model = VoiceModel::new(4, config, Vec::new());

        let err = model.synthesize(&"a".repeat(601)).unwrap_err();
        assert_eq!(err.code(), "SYNTH_TOO_LONG");
        assert_eq!(model.synthesize(&"a".repeat(3)).unwrap().len(), 3 * 22050);
    }

    #[test]
    fn test_synthesize_rejects_empty_text() {
        let model = VoiceModel::new(3, VoiceModelConfig::default(), Vec::new());
        let err = model.synthesize("   ").unwrap_err();
        assert_eq!(err.code(), "SYNTH_EMPTY_TEXT");
    }

    #[tokio::test]
    async fn test_loader_reads_weights_blob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("5.bin"), [1u8, 2, 3, 4]).unwrap();

        let loader = VoiceModelLoader::from_dir(dir.path());
        let model = loader.load(&5, &VoiceModelConfig::default()).await.unwrap();
        assert_eq!(model.model_id(), 5);
        assert_eq!(model.weights_len(), 4);
    }

    #[tokio::test]
    async fn test_loader_fails_on_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let loader = VoiceModelLoader::from_dir(dir.path());

        let err = loader.load(&9, &VoiceModelConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("9.bin"));
    }

    #[tokio::test]
    async fn test_loader_rejects_malformed_config() {
        let loader = VoiceModelLoader::in_memory();
        let config = VoiceModelConfig {
            seconds_per_char: -1.0,
            ..VoiceModelConfig::default()
        };

        let err = loader.load(&1, &config).await.unwrap_err();
        assert!(format!("{:#}", err).contains("seconds_per_char"));
    }

    #[tokio::test]
    async fn test_cache_wraps_loader_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VoiceModelCache::new(
            crate::ModelCacheConfig::default(),
            VoiceModelLoader::from_dir(dir.path()),
        )
        .unwrap();

        let err = cache.get(&2, &VoiceModelConfig::default()).await.unwrap_err();
        assert_eq!(err.code(), "CACHE_LOAD_FAILED");
        assert!(err.to_string().contains("2.bin"));
        assert!(cache.is_empty());
    }
}
