//! Fraud scoring engine: blends the rule-based heuristic with the anomaly
//! model's last committed snapshot.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ModelConfig, ScoringConfig};
use crate::fraud::features;
use crate::fraud::forest::{AnomalyModel, IsolationForest};
use crate::fraud::rules::{build_rules, rule_score, Rule, RuleInput};

/// Consistent view of the relevant history at scoring time. Captured once per
/// submission so the score is a pure function of `(candidate, snapshot,
/// model snapshot)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistorySnapshot {
    /// Sender submissions inside the recency window, including the candidate.
    pub sender_in_window: usize,
    /// All-time sender transaction count, including the candidate.
    pub sender_frequency: usize,
    /// All-time receiver transaction count, including the candidate.
    pub receiver_frequency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub trained: bool,
    pub algorithm: &'static str,
    pub min_train_samples: usize,
}

pub struct FraudScorer {
    scoring: ScoringConfig,
    model_config: ModelConfig,
    rules: Vec<Rule>,
    /// Last fully committed model. Swapped wholesale on successful retrain;
    /// scoring never observes a half-trained forest.
    model: RwLock<Option<Arc<IsolationForest>>>,
}

impl FraudScorer {
    pub fn new(scoring: ScoringConfig, model_config: ModelConfig) -> Self {
        let rules = build_rules(&scoring);
        FraudScorer {
            scoring,
            model_config,
            rules,
            model: RwLock::new(None),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            trained: self.is_trained(),
            algorithm: "isolation-forest",
            min_train_samples: self.model_config.min_train_samples,
        }
    }

    /// Score a candidate transaction in [0, 1]. Deterministic: identical
    /// inputs against the same model snapshot always produce the same score.
    pub fn score(&self, amount: f64, timestamp: DateTime<Utc>, history: &HistorySnapshot) -> f64 {
        let hour_of_day = timestamp.hour();
        let input = RuleInput {
            amount,
            hour_of_day,
            sender_in_window: history.sender_in_window,
        };
        let rule = rule_score(&self.rules, &input);

        let snapshot = self.model.read().clone();
        match snapshot {
            Some(model) => {
                let vector = features::extract(
                    amount,
                    history.sender_frequency,
                    history.receiver_frequency,
                    hour_of_day,
                );
                let anomaly = model.score(&vector);
                let blend = self.scoring.model_blend;
                ((1.0 - blend) * rule + blend * anomaly).clamp(0.0, 1.0)
            }
            None => {
                // Degraded mode is expected during cold start; observable but
                // never an error.
                debug!(rule_score = rule, "anomaly model not trained, using rule-based score only");
                rule
            }
        }
    }

    /// Train a fresh forest off to the side and commit it as the new
    /// snapshot. Returns whether a new snapshot was committed; failure
    /// (typically too little history) leaves the previous snapshot in place.
    pub fn retrain(&self, samples: &[features::FeatureVector]) -> bool {
        let mut forest = IsolationForest::new(self.model_config.clone());
        match forest.train(samples) {
            Ok(()) => {
                info!(samples = samples.len(), "committed new anomaly model snapshot");
                *self.model.write() = Some(Arc::new(forest));
                true
            }
            Err(e) => {
                warn!(error = %e, "anomaly model retraining failed, keeping previous snapshot");
                false
            }
        }
    }
}
