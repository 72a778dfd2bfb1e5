//! Configuration management for acquisition parameters
//!
//! Loads and saves [`AcquisitionConfig`] as JSON, validates every change and
//! supports batched runtime updates with optional rollback.

use crate::api::types::AcquisitionConfig;
use crate::platform::StreamOptions;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A parameter is outside its valid range
    #[error("invalid parameter '{parameter}' = '{value}'")]
    InvalidParameter { parameter: String, value: String },
    /// Reading or writing the configuration file failed
    #[error("I/O error: {message}")]
    Io { message: String },
    /// The configuration file is not valid JSON for this schema
    #[error("serialization error: {message}")]
    Serialization { message: String },
    /// `save` was called before any file was loaded or saved
    #[error("no file path set for saving configuration")]
    NoFilePath,
    /// A batch update failed and was rolled back
    #[error("batch update rolled back after {failures} failed update(s): {summary}")]
    RolledBack { failures: usize, summary: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// On-disk layout of a configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFileData {
    /// Format version, bumped on incompatible changes
    #[serde(default = "default_version")]
    version: u32,
    acquisition: AcquisitionConfig,
}

fn default_version() -> u32 {
    1
}

/// Owns the active acquisition configuration
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config: AcquisitionConfig,
    config_file_path: Option<String>,
    is_modified: bool,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    /// Create a manager holding the default configuration
    pub fn new() -> Self {
        Self {
            config: AcquisitionConfig::default(),
            config_file_path: None,
            is_modified: false,
        }
    }

    /// Create a manager and load `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn get_config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Replace the whole configuration after validating it
    pub fn update_config(&mut self, config: AcquisitionConfig) -> ConfigResult<()> {
        config.validate()?;
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            message: format!("failed to read config file '{}': {}", path_str, e),
        })?;

        let data: ConfigFileData =
            serde_json::from_str(&content).map_err(|e| ConfigError::Serialization {
                message: format!("failed to parse config file '{}': {}", path_str, e),
            })?;

        if data.version != default_version() {
            warn!(
                "config file '{}' has version {}, expected {}",
                path_str,
                data.version,
                default_version()
            );
        }
        data.acquisition.validate()?;

        self.config = data.acquisition;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        info!("loaded acquisition config from {:?}", self.config_file_path);
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let data = ConfigFileData {
            version: default_version(),
            acquisition: self.config.clone(),
        };
        let content =
            serde_json::to_string_pretty(&data).map_err(|e| ConfigError::Serialization {
                message: format!("failed to serialize config: {}", e),
            })?;

        fs::write(&path, content).map_err(|e| ConfigError::Io {
            message: format!("failed to write config file '{}': {}", path_str, e),
        })?;

        debug!("saved acquisition config to {}", path_str);
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the most recently loaded or saved path
    pub fn save(&mut self) -> ConfigResult<()> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::NoFilePath),
        }
    }

    /// Whether the configuration changed since the last load or save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn file_path(&self) -> Option<&str> {
        self.config_file_path.as_deref()
    }

    /// Set the window duration, returning the previous value
    pub fn set_window_duration(&mut self, window_duration_ms: u64) -> ConfigResult<u64> {
        let candidate = self.config.clone().with_window(window_duration_ms);
        candidate.validate()?;
        let old = self.config.window_duration_ms;
        self.config = candidate;
        self.is_modified = true;
        Ok(old)
    }

    /// Set the progress tick interval, returning the previous value
    pub fn set_progress_tick(&mut self, progress_tick_ms: u64) -> ConfigResult<u64> {
        let candidate = self.config.clone().with_tick(progress_tick_ms);
        candidate.validate()?;
        let old = self.config.progress_tick_ms;
        self.config = candidate;
        self.is_modified = true;
        Ok(old)
    }

    /// Set the display accuracy threshold, returning the previous value
    pub fn set_accuracy_threshold(&mut self, threshold_m: f64) -> ConfigResult<f64> {
        let candidate = self.config.clone().with_accuracy_threshold(threshold_m);
        candidate.validate()?;
        let old = self.config.accuracy_threshold_m;
        self.config = candidate;
        self.is_modified = true;
        Ok(old)
    }

    pub fn set_stream_options(&mut self, options: StreamOptions) -> StreamOptions {
        let old = self.config.stream_options;
        self.config.stream_options = options;
        self.is_modified = true;
        old
    }

    pub fn set_retain_samples(&mut self, retain: bool) -> bool {
        let old = self.config.retain_samples;
        self.config.retain_samples = retain;
        self.is_modified = true;
        old
    }

    /// Apply several updates at once.
    ///
    /// Each update is validated against the configuration as it stands after
    /// the previous ones. With `rollback_on_failure` any failure restores the
    /// state from before the call.
    pub fn update_parameters(
        &mut self,
        updates: ParameterUpdates,
    ) -> ConfigResult<ParameterUpdateResult> {
        let original_config = self.config.clone();
        let original_modified = self.is_modified;
        let total_updates = updates.count_updates();

        let mut applied_updates = Vec::new();
        let mut failed_updates = Vec::new();

        if let Some(window) = updates.window_duration_ms {
            match self.set_window_duration(window) {
                Ok(old) => applied_updates.push(format!("window_duration_ms: {} -> {}", old, window)),
                Err(e) => failed_updates.push(format!("window_duration_ms: {}", e)),
            }
        }

        if let Some(tick) = updates.progress_tick_ms {
            match self.set_progress_tick(tick) {
                Ok(old) => applied_updates.push(format!("progress_tick_ms: {} -> {}", old, tick)),
                Err(e) => failed_updates.push(format!("progress_tick_ms: {}", e)),
            }
        }

        if let Some(threshold) = updates.accuracy_threshold_m {
            match self.set_accuracy_threshold(threshold) {
                Ok(old) => {
                    applied_updates.push(format!("accuracy_threshold_m: {} -> {}", old, threshold))
                }
                Err(e) => failed_updates.push(format!("accuracy_threshold_m: {}", e)),
            }
        }

        if let Some(high_accuracy) = updates.high_accuracy {
            let mut options = self.config.stream_options;
            options.high_accuracy = high_accuracy;
            let old = self.set_stream_options(options);
            applied_updates.push(format!(
                "high_accuracy: {} -> {}",
                old.high_accuracy, high_accuracy
            ));
        }

        if let Some(retain) = updates.retain_samples {
            let old = self.set_retain_samples(retain);
            applied_updates.push(format!("retain_samples: {} -> {}", old, retain));
        }

        if !failed_updates.is_empty() && updates.rollback_on_failure {
            self.config = original_config;
            self.is_modified = original_modified;
            warn!("rolled back {} parameter update(s)", total_updates);
            return Err(ConfigError::RolledBack {
                failures: failed_updates.len(),
                summary: failed_updates.join("; "),
            });
        }

        Ok(ParameterUpdateResult {
            applied_updates,
            failed_updates,
            total_updates,
        })
    }

    /// Capture the current state for a later [`restore_from_snapshot`](Self::restore_from_snapshot)
    pub fn create_snapshot(&self) -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            config: self.config.clone(),
            is_modified: self.is_modified,
        }
    }

    pub fn restore_from_snapshot(&mut self, snapshot: ConfigurationSnapshot) {
        self.config = snapshot.config;
        self.is_modified = snapshot.is_modified;
    }
}

/// Batch of optional parameter changes
#[derive(Debug, Clone, Default)]
pub struct ParameterUpdates {
    pub window_duration_ms: Option<u64>,
    pub progress_tick_ms: Option<u64>,
    pub accuracy_threshold_m: Option<f64>,
    pub high_accuracy: Option<bool>,
    pub retain_samples: Option<bool>,
    /// Undo every change if any update fails
    pub rollback_on_failure: bool,
}

impl ParameterUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window_duration(mut self, window_duration_ms: u64) -> Self {
        self.window_duration_ms = Some(window_duration_ms);
        self
    }

    pub fn with_progress_tick(mut self, progress_tick_ms: u64) -> Self {
        self.progress_tick_ms = Some(progress_tick_ms);
        self
    }

    pub fn with_accuracy_threshold(mut self, threshold_m: f64) -> Self {
        self.accuracy_threshold_m = Some(threshold_m);
        self
    }

    pub fn with_high_accuracy(mut self, high_accuracy: bool) -> Self {
        self.high_accuracy = Some(high_accuracy);
        self
    }

    pub fn with_retain_samples(mut self, retain: bool) -> Self {
        self.retain_samples = Some(retain);
        self
    }

    pub fn with_rollback_on_failure(mut self) -> Self {
        self.rollback_on_failure = true;
        self
    }

    pub fn count_updates(&self) -> usize {
        [
            self.window_duration_ms.is_some(),
            self.progress_tick_ms.is_some(),
            self.accuracy_threshold_m.is_some(),
            self.high_accuracy.is_some(),
            self.retain_samples.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Result of a batch parameter update
#[derive(Debug)]
pub struct ParameterUpdateResult {
    pub applied_updates: Vec<String>,
    pub failed_updates: Vec<String>,
    pub total_updates: usize,
}

impl ParameterUpdateResult {
    pub fn is_complete(&self) -> bool {
        self.failed_updates.is_empty()
    }
}

/// Saved configuration state
#[derive(Debug, Clone)]
pub struct ConfigurationSnapshot {
    config: AcquisitionConfig,
    is_modified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fix-acquisition-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_manager_defaults() {
        let manager = ConfigurationManager::new();
        assert_eq!(manager.get_config(), &AcquisitionConfig::default());
        assert!(!manager.is_modified());
        assert!(manager.file_path().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = temp_path("roundtrip");
        let mut manager = ConfigurationManager::new();
        manager.set_window_duration(15_000).unwrap();
        manager.set_retain_samples(false);
        assert!(manager.is_modified());

        manager.save_to_file(&path).unwrap();
        assert!(!manager.is_modified());

        let loaded = ConfigurationManager::from_file(&path).unwrap();
        assert_eq!(loaded.get_config().window_duration_ms, 15_000);
        assert!(!loaded.get_config().retain_samples);
        assert_eq!(loaded.file_path(), Some(path.to_string_lossy().as_ref()));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"acquisition": {"accuracy_threshold_m": 25.0}}"#).unwrap();

        let manager = ConfigurationManager::from_file(&path).unwrap();
        assert_eq!(manager.get_config().accuracy_threshold_m, 25.0);
        assert_eq!(manager.get_config().window_duration_ms, 20_000);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let path = temp_path("invalid");
        fs::write(&path, r#"{"acquisition": {"progress_tick_ms": 0}}"#).unwrap();
        let err = ConfigurationManager::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));

        fs::write(&path, "not json").unwrap();
        let err = ConfigurationManager::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Serialization { .. }));

        let _ = fs::remove_file(path);
        let err = ConfigurationManager::from_file(temp_path("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_save_without_path() {
        let mut manager = ConfigurationManager::new();
        assert_eq!(manager.save(), Err(ConfigError::NoFilePath));
    }

    #[test]
    fn test_setters_validate() {
        let mut manager = ConfigurationManager::new();
        assert_eq!(manager.set_progress_tick(100).unwrap(), 50);
        assert!(manager.set_progress_tick(0).is_err());
        assert!(manager.set_window_duration(10).is_err());
        assert!(manager.set_accuracy_threshold(0.0).is_err());
        assert_eq!(manager.get_config().progress_tick_ms, 100);
    }

    #[test]
    fn test_batch_update_partial_failure() {
        let mut manager = ConfigurationManager::new();
        let updates = ParameterUpdates::new()
            .with_window_duration(10_000)
            .with_accuracy_threshold(-5.0)
            .with_high_accuracy(false);

        let result = manager.update_parameters(updates).unwrap();
        assert_eq!(result.total_updates, 3);
        assert_eq!(result.applied_updates.len(), 2);
        assert_eq!(result.failed_updates.len(), 1);
        assert!(!result.is_complete());
        assert_eq!(manager.get_config().window_duration_ms, 10_000);
        assert!(!manager.get_config().stream_options.high_accuracy);
    }

    #[test]
    fn test_batch_update_rollback() {
        let mut manager = ConfigurationManager::new();
        let updates = ParameterUpdates::new()
            .with_window_duration(10_000)
            .with_progress_tick(0)
            .with_rollback_on_failure();

        let err = manager.update_parameters(updates).unwrap_err();
        assert!(matches!(err, ConfigError::RolledBack { failures: 1, .. }));
        assert_eq!(manager.get_config(), &AcquisitionConfig::default());
        assert!(!manager.is_modified());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut manager = ConfigurationManager::new();
        let snapshot = manager.create_snapshot();
        manager.set_accuracy_threshold(20.0).unwrap();
        manager.restore_from_snapshot(snapshot);
        assert_eq!(manager.get_config().accuracy_threshold_m, 50.0);
        assert!(!manager.is_modified());
    }
}
