//! Bagged decision-tree classifier used as the default outcome model.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("classifier has not been fitted")]
    NotFitted,

    #[error("empty training set")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row} column {col} is not a finite number")]
    NonFinite { row: usize, col: usize },

    #[error("invalid classifier parameters: {0}")]
    InvalidParams(String),
}

/// Something that can learn discrete labels from a numeric feature matrix.
pub trait Classifier {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), ClassifierError>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u8>, ClassifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            min_samples_split: 10,
            max_depth: None,
            seed: 1,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.n_estimators == 0 {
            return Err(ClassifierError::InvalidParams(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ClassifierError::InvalidParams(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(ClassifierError::InvalidParams(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        probs: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_probs(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { probs } => return probs,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    classes: Vec<u8>,
    n_features: usize,
    trees: Vec<Tree>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            classes: Vec::new(),
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    /// Labels seen during fitting, ascending.
    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    /// Mean per-class probability across trees, columns ordered as [`Self::classes`].
    pub fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        if self.trees.is_empty() {
            return Err(ClassifierError::NotFitted);
        }
        check_matrix(features, Some(self.n_features))?;
        let k = self.classes.len();
        let n_trees = self.trees.len() as f64;
        Ok(features
            .iter()
            .map(|row| {
                let mut acc = vec![0.0_f64; k];
                for tree in &self.trees {
                    for (slot, p) in acc.iter_mut().zip(tree.leaf_probs(row)) {
                        *slot += p;
                    }
                }
                acc.iter_mut().for_each(|p| *p /= n_trees);
                acc
            })
            .collect())
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), ClassifierError> {
        self.params.validate()?;
        if features.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }
        if features.len() != labels.len() {
            return Err(ClassifierError::LengthMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let n_features = check_matrix(features, None)?;

        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let y: Vec<usize> = labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let builder = TreeBuilder {
            x: features,
            y: &y,
            n_classes: classes.len(),
            max_features: candidate_features(n_features),
            min_samples_split: self.params.min_samples_split,
            max_depth: self.params.max_depth,
        };

        // One RNG per tree keeps the result independent of thread scheduling.
        let seed = self.params.seed;
        let n = features.len();
        self.trees = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                builder.build(bootstrap, &mut rng)
            })
            .collect();
        self.classes = classes;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u8>, ClassifierError> {
        let probs = self.predict_proba(features)?;
        Ok(probs
            .iter()
            .map(|row| {
                let mut best = 0;
                for (idx, p) in row.iter().enumerate() {
                    if *p > row[best] {
                        best = idx;
                    }
                }
                self.classes[best]
            })
            .collect())
    }
}

/// Features drawn per split: `floor(sqrt(n))`, at least one.
fn candidate_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).clamp(1, n_features.max(1))
}

fn check_matrix(features: &[Vec<f64>], expected: Option<usize>) -> Result<usize, ClassifierError> {
    let width = expected.unwrap_or_else(|| features.first().map(Vec::len).unwrap_or(0));
    for (row, values) in features.iter().enumerate() {
        if values.len() != width {
            return Err(ClassifierError::RaggedRow {
                row,
                expected: width,
                found: values.len(),
            });
        }
        if let Some(col) = values.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::NonFinite { row, col });
        }
    }
    if width == 0 && !features.is_empty() {
        return Err(ClassifierError::InvalidParams(
            "feature rows are empty".to_string(),
        ));
    }
    Ok(width)
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
    min_samples_split: usize,
    max_depth: Option<usize>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, samples: Vec<usize>, rng: &mut StdRng) -> Tree {
        let mut nodes = Vec::new();
        self.grow(&mut nodes, samples, 0, rng);
        Tree { nodes }
    }

    fn grow(
        &self,
        nodes: &mut Vec<Node>,
        samples: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let counts = self.class_counts(&samples);
        let idx = nodes.len();
        let pure = counts.iter().filter(|c| **c > 0).count() <= 1;
        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);

        let split = if pure || depth_reached || samples.len() < self.min_samples_split {
            None
        } else {
            self.best_split(&samples, &counts, rng)
        };

        let Some(split) = split else {
            nodes.push(Node::Leaf {
                probs: normalize(&counts),
            });
            return idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|s| self.x[*s][split.feature] <= split.threshold);

        // Reserve the slot; children are appended after it.
        nodes.push(Node::Leaf { probs: Vec::new() });
        let left_idx = self.grow(nodes, left, depth + 1, rng);
        let right_idx = self.grow(nodes, right, depth + 1, rng);
        nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_idx,
            right: right_idx,
        };
        idx
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for s in samples {
            counts[self.y[*s]] += 1;
        }
        counts
    }

    fn best_split(&self, samples: &[usize], counts: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let n_features = self.x[samples[0]].len();
        let parent = gini(counts, samples.len());
        let mut best: Option<BestSplit> = None;

        // Visit features in random order; keep going past `max_features` only
        // while no usable split has been found.
        let feature_order = sample(rng, n_features, n_features);
        for (visited, feature) in feature_order.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            let mut order: Vec<usize> = samples.to_vec();
            order.sort_by(|a, b| self.x[*a][feature].total_cmp(&self.x[*b][feature]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();
            let total = order.len();

            for pos in 0..total - 1 {
                let s = order[pos];
                left[self.y[s]] += 1;
                right[self.y[s]] -= 1;

                let here = self.x[s][feature];
                let next = self.x[order[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = total - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / total as f64;
                if impurity + 1e-12 < parent
                    && best.as_ref().is_none_or(|b| impurity < b.impurity)
                {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|c| {
            let p = *c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn normalize(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|c| *c as f64 / total as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::{candidate_features, gini};

    #[test]
    fn gini_is_zero_for_pure_nodes() {
        assert_eq!(gini(&[4, 0, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn candidate_features_round_down() {
        assert_eq!(candidate_features(15), 3);
        assert_eq!(candidate_features(16), 4);
        assert_eq!(candidate_features(3), 1);
        assert_eq!(candidate_features(1), 1);
    }
}
