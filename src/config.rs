//! Configuration management for SecureChain
//!
//! All scoring weights, thresholds, window sizes, and model hyperparameters
//! live here rather than inside the components that consume them, so tuning
//! never requires a code change.

use serde::Deserialize;
use std::fs;

use crate::error::{ChainError, Result};

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Rule weights and score bands for the fraud-scoring engine.
///
/// The amount tiers are cumulative: an amount strictly above several tiers
/// collects the weight of every tier it crosses. Equality at a tier boundary
/// does not trigger that tier.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_amount_tiers")]
    pub amount_tiers: [f64; 3],
    #[serde(default = "default_tier_weights")]
    pub tier_weights: [f64; 3],
    /// Amounts that are exact multiples of this unit pick up `round_weight`
    /// (structuring signal).
    #[serde(default = "default_round_unit")]
    pub round_unit: f64,
    #[serde(default = "default_round_weight")]
    pub round_weight: f64,
    /// Trailing window for sender-velocity checks, in seconds.
    #[serde(default = "default_frequency_window_secs")]
    pub frequency_window_secs: i64,
    /// In-window submissions a sender may make before velocity weight kicks in.
    #[serde(default = "default_frequency_cap")]
    pub frequency_cap: usize,
    /// Weight added per submission beyond the cap.
    #[serde(default = "default_excess_weight")]
    pub excess_weight: f64,
    /// Excess submissions counted at most, so velocity alone cannot saturate
    /// the score.
    #[serde(default = "default_max_excess")]
    pub max_excess: usize,
    /// Night hours are [night_start_hour, night_end_hour) wrapping midnight,
    /// in UTC.
    #[serde(default = "default_night_start_hour")]
    pub night_start_hour: u32,
    #[serde(default = "default_night_end_hour")]
    pub night_end_hour: u32,
    #[serde(default = "default_night_weight")]
    pub night_weight: f64,
    /// Share of the final score taken from the anomaly model once it is
    /// trained; the rule score carries the remainder.
    #[serde(default = "default_model_blend")]
    pub model_blend: f64,
    /// Scores below this are Clear.
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
    /// Scores at or above this are Suspicious; in between is Review.
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: f64,
}

/// Isolation-forest hyperparameters.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_tree_count")]
    pub tree_count: usize,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Fixed RNG seed so retraining on identical history yields an identical
    /// model snapshot.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_min_train_samples")]
    pub min_train_samples: usize,
    /// How often the server binary retrains, in seconds.
    #[serde(default = "default_retrain_interval_secs")]
    pub retrain_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { api_port: default_api_port() }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            amount_tiers: default_amount_tiers(),
            tier_weights: default_tier_weights(),
            round_unit: default_round_unit(),
            round_weight: default_round_weight(),
            frequency_window_secs: default_frequency_window_secs(),
            frequency_cap: default_frequency_cap(),
            excess_weight: default_excess_weight(),
            max_excess: default_max_excess(),
            night_start_hour: default_night_start_hour(),
            night_end_hour: default_night_end_hour(),
            night_weight: default_night_weight(),
            model_blend: default_model_blend(),
            review_threshold: default_review_threshold(),
            suspicious_threshold: default_suspicious_threshold(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            tree_count: default_tree_count(),
            max_samples: default_max_samples(),
            seed: default_seed(),
            min_train_samples: default_min_train_samples(),
            retrain_interval_secs: default_retrain_interval_secs(),
        }
    }
}

fn default_api_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./data/securechain.db".to_string()
}

fn default_amount_tiers() -> [f64; 3] {
    [5_000.0, 10_000.0, 50_000.0]
}

fn default_tier_weights() -> [f64; 3] {
    [0.12, 0.18, 0.30]
}

fn default_round_unit() -> f64 {
    1_000.0
}

fn default_round_weight() -> f64 {
    0.05
}

fn default_frequency_window_secs() -> i64 {
    3_600
}

fn default_frequency_cap() -> usize {
    10
}

fn default_excess_weight() -> f64 {
    0.04
}

fn default_max_excess() -> usize {
    6
}

fn default_night_start_hour() -> u32 {
    22
}

fn default_night_end_hour() -> u32 {
    6
}

fn default_night_weight() -> f64 {
    0.10
}

fn default_model_blend() -> f64 {
    0.4
}

fn default_review_threshold() -> f64 {
    0.4
}

fn default_suspicious_threshold() -> f64 {
    0.7
}

fn default_tree_count() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_seed() -> u64 {
    42
}

fn default_min_train_samples() -> usize {
    10
}

fn default_retrain_interval_secs() -> u64 {
    60
}

/// Load `config.toml` from the working directory, falling back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)
            .map_err(|e| ChainError::Config(format!("Failed to parse config.toml: {}", e)))?
    };

    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject configurations that would make scores leave [0, 1] or make the
    /// bands nonsensical.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;

        if self.database.path.is_empty() {
            return Err(ChainError::Config("database.path must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&s.model_blend) {
            return Err(ChainError::Config("scoring.model_blend must be in [0, 1]".to_string()));
        }
        if s.review_threshold >= s.suspicious_threshold {
            return Err(ChainError::Config(
                "scoring.review_threshold must be below scoring.suspicious_threshold".to_string(),
            ));
        }
        if s.night_start_hour > 23 || s.night_end_hour > 23 {
            return Err(ChainError::Config("night hours must be in [0, 23]".to_string()));
        }
        if s.round_unit <= 0.0 {
            return Err(ChainError::Config("scoring.round_unit must be positive".to_string()));
        }
        if self.model.tree_count == 0 || self.model.max_samples < 2 {
            return Err(ChainError::Config(
                "model.tree_count must be positive and model.max_samples at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
