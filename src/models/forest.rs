//! Bagged random forest of CART trees

use crate::error::{Result, ScoringError};
use crate::models::tree::{DecisionTree, TreeParams};
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random forest hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples a node needs before it may be split
    pub min_samples_split: usize,
    /// Seed for bootstrap sampling and feature selection
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// Allowed drift of the importance sum from 1 in a loaded forest
const IMPORTANCE_TOLERANCE: f64 = 1e-6;

/// Fitted random forest producing class-1 probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
    /// Mean decrease in impurity per feature, sums to 1
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit a forest on `x` (one row per sample) and binary labels `y`.
    ///
    /// Each tree sees a bootstrap sample of the rows and considers
    /// `floor(sqrt(n_features))` features per split. Identical inputs and
    /// params always produce an identical forest.
    pub fn fit(x: ArrayView2<'_, f64>, y: &[u8], params: ForestParams) -> Result<Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ScoringError::DimensionMismatch {
                features: n_samples,
                labels: y.len(),
            });
        }
        if n_samples == 0 {
            return Err(ScoringError::InvalidInput(
                "training set is empty".to_string(),
            ));
        }
        if n_features == 0 {
            return Err(ScoringError::InvalidInput(
                "training set has no features".to_string(),
            ));
        }
        if let Some(position) = y.iter().position(|&label| label > 1) {
            return Err(ScoringError::InvalidInput(format!(
                "label at row {} is {}, expected 0 or 1",
                position, y[position]
            )));
        }
        if x.iter().any(|value| !value.is_finite()) {
            return Err(ScoringError::InvalidInput(
                "training features contain non-finite values".to_string(),
            ));
        }
        if params.n_estimators == 0 || params.max_depth == 0 {
            return Err(ScoringError::InvalidInput(
                "n_estimators and max_depth must be positive".to_string(),
            ));
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            max_features: ((n_features as f64).sqrt() as usize).max(1),
        };

        let mut master = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(master.gen());
            let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

            let (tree, raw) = DecisionTree::fit(x, y, bootstrap, tree_params, &mut rng);

            let total: f64 = raw.iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&raw) {
                    *acc += value / total;
                }
            }
            trees.push(tree);
        }

        let feature_importances = normalize(importances);

        debug!(
            trees = trees.len(),
            samples = n_samples,
            features = n_features,
            "Random forest fitted"
        );

        Ok(Self {
            params,
            n_features,
            trees,
            feature_importances,
        })
    }

    /// Class-1 probability for one row: mean of the per-tree leaf probabilities
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict_proba(row)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    /// Class-1 probability for every row of `x`
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if x.ncols() != self.n_features {
            return Err(ScoringError::InvalidInput(format!(
                "expected {} features per row, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x.outer_iter().map(|row| self.predict_proba_row(row)).collect())
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check structural soundness of a deserialized forest
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.feature_importances.len() != self.n_features {
            return Err(format!(
                "{} feature importances for {} features",
                self.feature_importances.len(),
                self.n_features
            ));
        }
        if self
            .feature_importances
            .iter()
            .any(|value| !value.is_finite() || *value < 0.0)
        {
            return Err("feature importances must be finite and non-negative".to_string());
        }
        let total: f64 = self.feature_importances.iter().sum();
        if (total - 1.0).abs() > IMPORTANCE_TOLERANCE {
            return Err(format!("feature importances sum to {}, expected 1", total));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|reason| format!("tree {}: {}", index, reason))?;
        }
        Ok(())
    }
}

/// Scale to sum 1. A forest with no splits at all spreads weight evenly.
fn normalize(values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.into_iter().map(|value| value / total).collect()
    } else {
        let uniform = 1.0 / values.len() as f64;
        vec![uniform; values.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Label depends on the first feature only; the second is noise
    fn toy_dataset(n: usize) -> (Array2<f64>, Vec<u8>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 7919) % 13) as f64,
            _ => ((i * 104729) % 5) as f64,
        });
        let y = (0..n).map(|i| u8::from(i >= n / 2)).collect();
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_fit_and_predict() {
        let (x, y) = toy_dataset(60);
        let forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();

        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.n_features(), 3);

        let probabilities = forest.predict_proba(x.view()).unwrap();
        assert_eq!(probabilities.len(), 60);
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(probabilities[0] < 0.5);
        assert!(probabilities[59] > 0.5);
    }

    #[test]
    fn test_feature_importances_sum_to_one() {
        let (x, y) = toy_dataset(60);
        let forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();

        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 3);
        assert!(importances.iter().all(|&v| v >= 0.0));
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[2]);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = toy_dataset(40);
        let a = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        let b = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, _) = toy_dataset(10);
        let result = RandomForest::fit(x.view(), &[0, 1, 0], small_params());
        assert!(matches!(
            result,
            Err(ScoringError::DimensionMismatch {
                features: 10,
                labels: 3
            })
        ));
    }

    #[test]
    fn test_rejects_bad_labels_and_empty_sets() {
        let (x, mut y) = toy_dataset(10);
        y[4] = 2;
        assert!(matches!(
            RandomForest::fit(x.view(), &y, small_params()),
            Err(ScoringError::InvalidInput(_))
        ));

        let empty = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            RandomForest::fit(empty.view(), &[], small_params()),
            Err(ScoringError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_single_class_gives_uniform_importances() {
        let (x, _) = toy_dataset(20);
        let y = vec![1u8; 20];
        let forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();

        for &value in forest.feature_importances() {
            assert!((value - 1.0 / 3.0).abs() < 1e-12);
        }
        assert_eq!(forest.predict_proba_row(x.row(0)), 1.0);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (x, y) = toy_dataset(20);
        let forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        let narrow = Array2::<f64>::zeros((2, 2));
        assert!(forest.predict_proba(narrow.view()).is_err());
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let (x, y) = toy_dataset(50);
        let forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();

        assert!(restored.validate().is_ok());
        assert_eq!(
            forest.predict_proba(x.view()).unwrap(),
            restored.predict_proba(x.view()).unwrap()
        );
    }

    #[test]
    fn test_validate_rejects_unnormalized_importances() {
        let (x, y) = toy_dataset(30);
        let mut forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        forest.feature_importances = vec![1.0; 3];

        let reason = forest.validate().unwrap_err();
        assert!(reason.contains("sum to 3"));
    }
}
