use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::noise::{
    Calibration, GaussianMechanism, PrivacyLayer, AGE_SENSITIVITY, AGE_SENSITIVITY_SIMPLIFIED,
    SCORE_SENSITIVITY,
};
use crate::core::{matcher::DEFAULT_GLOBAL_TOP_K, Matcher};
use crate::error::MatchError;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub privacy: PrivacySettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub estimator: EstimatorSettings,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrivacySettings {
    #[serde(default = "default_score_epsilon")]
    pub score_epsilon: f64,
    #[serde(default = "default_delta")]
    pub score_delta: f64,
    #[serde(default = "default_age_epsilon")]
    pub age_epsilon: f64,
    #[serde(default = "default_delta")]
    pub age_delta: f64,
    /// Defaults to 10 with classic calibration, 80 with simplified
    #[serde(default)]
    pub age_sensitivity: Option<f64>,
    #[serde(default)]
    pub calibration: Calibration,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            score_epsilon: default_score_epsilon(),
            score_delta: default_delta(),
            age_epsilon: default_age_epsilon(),
            age_delta: default_delta(),
            age_sensitivity: None,
            calibration: Calibration::default(),
        }
    }
}

impl PrivacySettings {
    /// Age-difference sensitivity, falling back to the calibration's default
    pub fn effective_age_sensitivity(&self) -> f64 {
        self.age_sensitivity.unwrap_or(match self.calibration {
            Calibration::Classic => AGE_SENSITIVITY,
            Calibration::Simplified => AGE_SENSITIVITY_SIMPLIFIED,
        })
    }

    /// Build the noise layer, rejecting invalid ε, δ or Δ
    pub fn build(&self) -> Result<PrivacyLayer, MatchError> {
        let score = GaussianMechanism::with_calibration(
            self.score_epsilon,
            self.score_delta,
            SCORE_SENSITIVITY,
            self.calibration,
        )?;
        let age = GaussianMechanism::with_calibration(
            self.age_epsilon,
            self.age_delta,
            self.effective_age_sensitivity(),
            self.calibration,
        )?;

        Ok(PrivacyLayer::new(score, age))
    }
}

fn default_score_epsilon() -> f64 { 0.5 }
fn default_age_epsilon() -> f64 { 1.0 }
fn default_delta() -> f64 { 1e-5 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_global_top_k")]
    pub global_top_k: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            global_top_k: default_global_top_k(),
        }
    }
}

fn default_global_top_k() -> usize { DEFAULT_GLOBAL_TOP_K }

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorSettings {
    #[serde(default = "default_train_on_startup")]
    pub train_on_startup: bool,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            train_on_startup: default_train_on_startup(),
        }
    }
}

fn default_train_on_startup() -> bool { true }

#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    #[serde(default = "default_profiles_path")]
    pub profiles_path: PathBuf,
    /// JSON-lines file for match summaries; persistence is off when unset
    #[serde(default)]
    pub matches_path: Option<PathBuf>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            profiles_path: default_profiles_path(),
            matches_path: None,
        }
    }
}

fn default_profiles_path() -> PathBuf { PathBuf::from("mock_profiles.json") }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with ORGAN__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., ORGAN__PRIVACY__SCORE_EPSILON -> privacy.score_epsilon
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    /// Matcher configured with these privacy and ranking settings
    pub fn build_matcher(&self) -> Result<Matcher, MatchError> {
        let privacy = self.privacy.build()?;
        Ok(Matcher::new(privacy).with_global_top_k(self.matching.global_top_k))
    }
}

fn environment() -> Environment {
    Environment::with_prefix("ORGAN")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
