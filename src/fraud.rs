// Thin re-export module: feature extraction, the declarative rule engine,
// the isolation-forest anomaly model, and the scorer that blends them.

pub mod features;
pub mod forest;
pub mod rules;
pub mod scorer;

pub use features::{FeatureVector, FEATURE_DIM};
pub use forest::{AnomalyModel, IsolationForest};
pub use rules::{build_rules, rule_score, Rule, RuleInput};
pub use scorer::{FraudScorer, HistorySnapshot, ModelStatus};
