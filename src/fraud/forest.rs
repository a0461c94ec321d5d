//! Unsupervised anomaly detection.
//!
//! The scorer only depends on the [`AnomalyModel`] contract; the isolation
//! forest below is one conforming implementation and can be swapped for any
//! detector that maps a feature vector to an anomaly score in [0, 1].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ModelConfig;
use crate::error::{ChainError, Result};
use crate::fraud::features::{FeatureVector, FEATURE_DIM};

/// Narrow capability interface for outlier detectors. Higher scores mean
/// more anomalous.
pub trait AnomalyModel: Send + Sync {
    fn train(&mut self, samples: &[FeatureVector]) -> Result<()>;
    fn score(&self, sample: &FeatureVector) -> f64;
}

enum Node {
    Split {
        dim: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

struct Tree {
    root: Node,
}

/// Isolation forest: an ensemble of randomly built partition trees. Points
/// that isolate in few splits (short average path) are outliers and score
/// close to 1; dense, ordinary points score nearer 0.5 and below.
///
/// All randomness comes from one seeded RNG, so training on identical
/// samples with identical configuration always yields an identical model.
pub struct IsolationForest {
    config: ModelConfig,
    trees: Vec<Tree>,
    /// Subsample size actually used at training time, needed to normalize
    /// path lengths when scoring.
    sample_size: usize,
}

impl IsolationForest {
    pub fn new(config: ModelConfig) -> Self {
        IsolationForest {
            config,
            trees: Vec::new(),
            sample_size: 0,
        }
    }

    pub fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Average unsuccessful-search path length in a binary search tree of
    /// `n` nodes; the standard normalizer for isolation path lengths.
    fn average_path_length(n: usize) -> f64 {
        if n < 2 {
            return 0.0;
        }
        let n = n as f64;
        const EULER: f64 = 0.577_215_664_901_532_9;
        let harmonic = (n - 1.0).ln() + EULER;
        2.0 * harmonic - 2.0 * (n - 1.0) / n
    }

    fn build_tree(rng: &mut StdRng, samples: &mut [FeatureVector], depth: usize, height_limit: usize) -> Node {
        if samples.len() <= 1 || depth >= height_limit {
            return Node::Leaf { size: samples.len() };
        }

        // Pick a split dimension where the partition still has spread; give
        // up and close the leaf if every dimension is constant.
        let mut candidate_dims: Vec<usize> = (0..FEATURE_DIM).collect();
        let (dim, min, max) = loop {
            if candidate_dims.is_empty() {
                return Node::Leaf { size: samples.len() };
            }
            let pick = rng.gen_range(0..candidate_dims.len());
            let dim = candidate_dims.swap_remove(pick);

            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for sample in samples.iter() {
                min = min.min(sample[dim]);
                max = max.max(sample[dim]);
            }
            if max > min {
                break (dim, min, max);
            }
        };

        let value = rng.gen_range(min..max);
        let split = partition_in_place(samples, |s| s[dim] < value);
        let (left_samples, right_samples) = samples.split_at_mut(split);

        Node::Split {
            dim,
            value,
            left: Box::new(Self::build_tree(rng, left_samples, depth + 1, height_limit)),
            right: Box::new(Self::build_tree(rng, right_samples, depth + 1, height_limit)),
        }
    }

    fn path_length(node: &Node, sample: &FeatureVector, depth: usize) -> f64 {
        match node {
            Node::Leaf { size } => depth as f64 + Self::average_path_length(*size),
            Node::Split { dim, value, left, right } => {
                if sample[*dim] < *value {
                    Self::path_length(left, sample, depth + 1)
                } else {
                    Self::path_length(right, sample, depth + 1)
                }
            }
        }
    }
}

/// In-place stable-enough partition: moves elements matching `pred` to the
/// front, returns the split point.
fn partition_in_place<T, F: Fn(&T) -> bool>(slice: &mut [T], pred: F) -> usize {
    let mut split = 0;
    for i in 0..slice.len() {
        if pred(&slice[i]) {
            slice.swap(split, i);
            split += 1;
        }
    }
    split
}

impl AnomalyModel for IsolationForest {
    fn train(&mut self, samples: &[FeatureVector]) -> Result<()> {
        if samples.len() < self.config.min_train_samples {
            return Err(ChainError::Model(format!(
                "need at least {} samples to train, got {}",
                self.config.min_train_samples,
                samples.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let sample_size = samples.len().min(self.config.max_samples);
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let mut trees = Vec::with_capacity(self.config.tree_count);
        for _ in 0..self.config.tree_count {
            // Subsample without replacement for each tree.
            let mut pool: Vec<FeatureVector> = samples.to_vec();
            for i in 0..sample_size {
                let j = rng.gen_range(i..pool.len());
                pool.swap(i, j);
            }
            pool.truncate(sample_size);

            let root = Self::build_tree(&mut rng, &mut pool, 0, height_limit);
            trees.push(Tree { root });
        }

        self.trees = trees;
        self.sample_size = sample_size;
        Ok(())
    }

    /// Anomaly score `2^(-E(h) / c(n))`: shorter average isolation paths
    /// push the score toward 1.
    fn score(&self, sample: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }

        let total: f64 = self
            .trees
            .iter()
            .map(|tree| Self::path_length(&tree.root, sample, 0))
            .sum();
        let mean_path = total / self.trees.len() as f64;
        let normalizer = Self::average_path_length(self.sample_size).max(f64::MIN_POSITIVE);

        let score = 2f64.powf(-mean_path / normalizer);
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fraud::features::extract;

    fn normal_samples() -> Vec<FeatureVector> {
        // A cloud of ordinary daytime activity.
        (0..60)
            .map(|i| extract(80.0 + (i % 7) as f64 * 15.0, 1 + i % 4, 1 + i % 3, 9 + (i % 8) as u32))
            .collect()
    }

    fn trained_forest() -> IsolationForest {
        let mut forest = IsolationForest::new(ModelConfig::default());
        forest.train(&normal_samples()).unwrap();
        forest
    }

    #[test]
    fn refuses_to_train_on_too_few_samples() {
        let mut forest = IsolationForest::new(ModelConfig::default());
        let samples = vec![extract(100.0, 1, 1, 12); 3];
        assert!(forest.train(&samples).is_err());
        assert!(!forest.is_trained());
    }

    #[test]
    fn untrained_forest_scores_zero() {
        let forest = IsolationForest::new(ModelConfig::default());
        assert_eq!(forest.score(&extract(1_000_000.0, 1, 1, 3)), 0.0);
    }

    #[test]
    fn outlier_scores_higher_than_inlier() {
        let forest = trained_forest();
        let inlier = forest.score(&extract(100.0, 2, 2, 11));
        let outlier = forest.score(&extract(500_000.0, 1, 1, 3));
        assert!(
            outlier > inlier,
            "outlier {} should exceed inlier {}",
            outlier,
            inlier
        );
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let forest = trained_forest();
        for sample in [
            extract(0.01, 1, 1, 0),
            extract(100.0, 3, 2, 12),
            extract(1e9, 1, 1, 23),
        ] {
            let s = forest.score(&sample);
            assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
        }
    }

    #[test]
    fn training_is_deterministic_for_a_fixed_seed() {
        let samples = normal_samples();
        let probe = extract(12_345.0, 1, 1, 2);

        let mut a = IsolationForest::new(ModelConfig::default());
        let mut b = IsolationForest::new(ModelConfig::default());
        a.train(&samples).unwrap();
        b.train(&samples).unwrap();

        assert_eq!(a.score(&probe), b.score(&probe));
    }

    #[test]
    fn different_seeds_build_different_forests() {
        let samples = normal_samples();
        let probe = extract(12_345.0, 1, 1, 2);

        let mut a = IsolationForest::new(ModelConfig::default());
        let mut b = IsolationForest::new(ModelConfig {
            seed: 7,
            ..ModelConfig::default()
        });
        a.train(&samples).unwrap();
        b.train(&samples).unwrap();

        // Same contract, almost surely different ensembles.
        assert_ne!(a.score(&probe), b.score(&probe));
    }
}
