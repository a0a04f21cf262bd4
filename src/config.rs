//! Configuration management for the kinship engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (kinship.toml)
//! - Environment variables (KINSHIP__*)
//!
//! ## Example config file (kinship.toml):
//! ```toml
//! [traversal]
//! default_depth = 3
//! default_mode = "hourglass"
//!
//! [labels]
//! default_locale = "ru"
//!
//! [duplicates]
//! min_confidence = 40
//! fuzzy_threshold = 0.8
//! birth_year_window = 2
//! prefilter = true
//!
//! [duplicates.weights]
//! birth_exact = 30
//!
//! [output]
//! format = "compact"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::duplicates::{ScanRequest, ScanType, ScoringWeights};
use crate::error::Result;
use crate::graph::TreeMode;
use crate::kinship::Locale;

/// Main configuration for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tree query defaults
    #[serde(default)]
    pub traversal: TraversalConfig,

    /// Label generation
    #[serde(default)]
    pub labels: LabelsConfig,

    /// Duplicate scanning
    #[serde(default)]
    pub duplicates: DuplicatesConfig,

    /// CLI output
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Requested depth; clamped to [1, 10] when used
    #[serde(default = "default_depth")]
    pub default_depth: i64,

    #[serde(default)]
    pub default_mode: TreeMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelsConfig {
    #[serde(default)]
    pub default_locale: Locale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicatesConfig {
    /// Review threshold, 0..=100
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u32,

    /// Minimum normalised edit-distance similarity for a fuzzy name match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Birth years further apart than this never pair up
    #[serde(default = "default_year_window")]
    pub birth_year_window: u32,

    /// Bucket by surname and birth year before scoring
    #[serde(default = "default_true")]
    pub prefilter: bool,

    #[serde(default = "default_true")]
    pub include_relationship_matching: bool,

    #[serde(default)]
    pub weights: ScoringWeights,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_depth() -> i64 {
    3
}

fn default_min_confidence() -> u32 {
    40
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}

fn default_year_window() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            default_mode: TreeMode::default(),
        }
    }
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            fuzzy_threshold: default_fuzzy_threshold(),
            birth_year_window: default_year_window(),
            prefilter: true,
            include_relationship_matching: true,
            weights: ScoringWeights::default(),
        }
    }
}

impl DuplicatesConfig {
    /// A request carrying the configured cutoff
    pub fn scan_request(&self, scan_type: ScanType) -> ScanRequest {
        ScanRequest {
            scan_type,
            min_confidence: self.min_confidence,
            include_relationship_matching: self.include_relationship_matching,
            ..ScanRequest::default()
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        for location in ["kinship.toml", ".kinship.toml", "config/kinship.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("org", "kinship", "kinship-engine") {
            let xdg_config = dirs.config_dir().join("kinship.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // KINSHIP__DUPLICATES__MIN_CONFIDENCE=60
        builder = builder.add_source(
            Environment::with_prefix("KINSHIP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.traversal.default_depth, 3);
        assert_eq!(config.traversal.default_mode, TreeMode::Hourglass);
        assert_eq!(config.labels.default_locale, Locale::En);
        assert_eq!(config.duplicates.min_confidence, 40);
        assert!(config.duplicates.prefilter);
        assert_eq!(config.duplicates.weights.birth_exact, 25);
    }

    #[test]
    fn test_serialize_config() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[traversal]"));
        assert!(toml_str.contains("[duplicates.weights]"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[labels]\ndefault_locale = \"ru\"\n\n[duplicates]\nmin_confidence = 55\n\n[duplicates.weights]\nbirth_exact = 30\n",
        )
        .unwrap();

        let config = EngineConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.labels.default_locale, Locale::Ru);
        assert_eq!(config.duplicates.min_confidence, 55);
        assert_eq!(config.duplicates.weights.birth_exact, 30);
        assert_eq!(config.duplicates.weights.last_name, 20);
        assert_eq!(config.traversal.default_depth, 3);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = EngineConfig::default();
        config.output.format = OutputFormat::Compact;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.output.format, OutputFormat::Compact);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EngineConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
