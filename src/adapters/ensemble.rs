//! Soft-voting ensemble artifact.
//!
//! The training pipeline exports the final ensemble as JSON. Each member
//! estimator produces a positive-class probability and the ensemble returns
//! their weighted mean (scikit-learn `VotingClassifier(voting="soft")`).
//!
//! Supported members:
//! - `logistic_regression`: `sigmoid(w . x + b)`
//! - `random_forest`: mean of classification trees whose leaves hold P(positive)
//! - `gradient_boosting`: `sigmoid(init + lr * sum(leaf))` over regression trees
//!
//! Trees are flat node arrays rooted at index 0. A split sends the walk left
//! when `x[feature] <= threshold`. Children always appear after their parent,
//! so every walk terminates.

use serde::{Deserialize, Serialize};

use super::artifacts::ArtifactError;
use crate::ports::{ModelError, RiskClassifier};

/// One node of an exported decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Exported decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    #[must_use]
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    fn validate(&self, n_features: usize, probability_leaves: bool) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {i} splits on unknown feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child index {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {i} has a non-finite value"));
                    }
                    if probability_leaves && !(0.0..=1.0).contains(value) {
                        return Err(format!("leaf {i} probability {value} outside [0, 1]"));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => return *value,
            }
        }
    }
}

/// Member estimator of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    RandomForest {
        trees: Vec<DecisionTree>,
    },
    GradientBoosting {
        init_score: f64,
        learning_rate: f64,
        trees: Vec<DecisionTree>,
    },
}

impl Estimator {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        match self {
            Self::LogisticRegression {
                coefficients,
                intercept,
            } => {
                if coefficients.len() != n_features {
                    return Err(format!(
                        "logistic_regression has {} coefficients, expected {n_features}",
                        coefficients.len()
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("logistic_regression parameters must be finite".into());
                }
                Ok(())
            }
            Self::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err("random_forest has no trees".into());
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.validate(n_features, true)
                        .map_err(|e| format!("random_forest tree {t}: {e}"))?;
                }
                Ok(())
            }
            Self::GradientBoosting {
                init_score,
                learning_rate,
                trees,
            } => {
                if !init_score.is_finite() || !learning_rate.is_finite() || *learning_rate <= 0.0 {
                    return Err("gradient_boosting needs a finite init_score and positive learning_rate".into());
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.validate(n_features, false)
                        .map_err(|e| format!("gradient_boosting tree {t}: {e}"))?;
                }
                Ok(())
            }
        }
    }

    fn probability(&self, x: &[f64]) -> f64 {
        match self {
            Self::LogisticRegression {
                coefficients,
                intercept,
            } => {
                let z: f64 = coefficients.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + intercept;
                sigmoid(z)
            }
            Self::RandomForest { trees } => {
                trees.iter().map(|t| t.evaluate(x)).sum::<f64>() / trees.len() as f64
            }
            Self::GradientBoosting {
                init_score,
                learning_rate,
                trees,
            } => {
                let raw: f64 = trees.iter().map(|t| t.evaluate(x)).sum();
                sigmoid(init_score + learning_rate * raw)
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ExportedEnsemble {
    feature_names: Vec<String>,
    #[serde(default)]
    weights: Option<Vec<f64>>,
    estimators: Vec<Estimator>,
}

/// Weighted soft-voting ensemble over heterogeneous estimators.
#[derive(Debug, Clone)]
pub struct SoftVotingEnsemble {
    feature_names: Vec<String>,
    /// Normalized to sum to 1
    weights: Vec<f64>,
    estimators: Vec<Estimator>,
}

impl SoftVotingEnsemble {
    /// Build an ensemble from members. `None` weights means equal voting.
    ///
    /// # Errors
    /// Returns `ArtifactError::Schema` if any member or weight is invalid.
    pub fn new(
        feature_names: Vec<String>,
        estimators: Vec<Estimator>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, ArtifactError> {
        let n = feature_names.len();
        if n == 0 {
            return Err(ArtifactError::Schema("ensemble has no features".into()));
        }
        if estimators.is_empty() {
            return Err(ArtifactError::Schema("ensemble has no estimators".into()));
        }
        for (i, estimator) in estimators.iter().enumerate() {
            estimator
                .validate(n)
                .map_err(|e| ArtifactError::Schema(format!("estimator {i}: {e}")))?;
        }

        let weights = weights.unwrap_or_else(|| vec![1.0; estimators.len()]);
        if weights.len() != estimators.len() {
            return Err(ArtifactError::Schema(format!(
                "{} weights for {} estimators",
                weights.len(),
                estimators.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ArtifactError::Schema(
                "ensemble weights must be finite and non-negative".into(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(ArtifactError::Schema("ensemble weights sum to zero".into()));
        }

        Ok(Self {
            feature_names,
            weights: weights.iter().map(|w| w / total).collect(),
            estimators,
        })
    }

    /// Parse and validate an exported ensemble.
    ///
    /// # Errors
    /// Returns `ArtifactError` if the JSON is malformed or inconsistent.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let exported: ExportedEnsemble = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactError::Format(format!("ensemble: {e}")))?;
        Self::new(exported.feature_names, exported.estimators, exported.weights)
    }

    #[must_use]
    pub fn estimator_count(&self) -> usize {
        self.estimators.len()
    }
}

impl RiskClassifier for SoftVotingEnsemble {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.feature_names.len() {
            return Err(ModelError::ShapeMismatch {
                got: features.len(),
                expected: self.feature_names.len(),
            });
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Evaluation(
                "input contains non-finite values".into(),
            ));
        }

        let p: f64 = self
            .estimators
            .iter()
            .zip(&self.weights)
            .map(|(e, w)| w * e.probability(features))
            .sum();

        // Normalized weights can overshoot by one ulp.
        Ok(p.clamp(0.0, 1.0))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> DecisionTree {
        DecisionTree::new(vec![
            TreeNode::Split {
                feature,
                threshold,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { value: low },
            TreeNode::Leaf { value: high },
        ])
    }

    #[test]
    fn test_logistic_regression_probability() {
        let ensemble = SoftVotingEnsemble::new(
            names(2),
            vec![Estimator::LogisticRegression {
                coefficients: vec![1.0, -1.0],
                intercept: 0.0,
            }],
            None,
        )
        .expect("valid");

        let p = ensemble.predict_proba(&[2.0, 2.0]).expect("predict");
        assert!((p - 0.5).abs() < 1e-12);

        let p = ensemble.predict_proba(&[3.0, 0.0]).expect("predict");
        assert!((p - 1.0 / (1.0 + (-3.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_random_forest_split_goes_left_on_equal() {
        let ensemble = SoftVotingEnsemble::new(
            names(1),
            vec![Estimator::RandomForest {
                trees: vec![stump(0, 1.0, 0.1, 0.9), stump(0, 5.0, 0.3, 0.7)],
            }],
            None,
        )
        .expect("valid");

        assert!((ensemble.predict_proba(&[1.0]).expect("predict") - 0.2).abs() < 1e-12);
        assert!((ensemble.predict_proba(&[3.0]).expect("predict") - 0.6).abs() < 1e-12);
        assert!((ensemble.predict_proba(&[9.0]).expect("predict") - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_boosting_probability() {
        let ensemble = SoftVotingEnsemble::new(
            names(1),
            vec![Estimator::GradientBoosting {
                init_score: -1.0,
                learning_rate: 0.5,
                trees: vec![stump(0, 0.0, -2.0, 2.0), stump(0, 0.0, 0.0, 2.0)],
            }],
            None,
        )
        .expect("valid");

        // -1 + 0.5 * (2 + 2) = 1
        let p = ensemble.predict_proba(&[1.0]).expect("predict");
        assert!((p - sigmoid(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_soft_vote() {
        let ensemble = SoftVotingEnsemble::new(
            names(1),
            vec![
                Estimator::RandomForest {
                    trees: vec![stump(0, 0.0, 0.0, 0.0)],
                },
                Estimator::RandomForest {
                    trees: vec![stump(0, 0.0, 1.0, 1.0)],
                },
            ],
            Some(vec![1.0, 3.0]),
        )
        .expect("valid");

        let p = ensemble.predict_proba(&[0.0]).expect("predict");
        assert!((p - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_wrong_length_and_non_finite_input() {
        let ensemble = SoftVotingEnsemble::new(
            names(2),
            vec![Estimator::LogisticRegression {
                coefficients: vec![0.0, 0.0],
                intercept: 0.0,
            }],
            None,
        )
        .expect("valid");

        assert_eq!(
            ensemble.predict_proba(&[1.0]),
            Err(ModelError::ShapeMismatch { got: 1, expected: 2 })
        );
        assert!(ensemble.predict_proba(&[f64::NAN, 0.0]).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_trees() {
        // Child pointing back at its parent would loop forever.
        let cyclic = DecisionTree::new(vec![TreeNode::Split {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
        }]);
        let err = SoftVotingEnsemble::new(
            names(1),
            vec![Estimator::RandomForest { trees: vec![cyclic] }],
            None,
        )
        .expect_err("must reject");
        assert!(err.to_string().contains("invalid child"));

        let out_of_range_feature = stump(4, 0.0, 0.1, 0.2);
        assert!(SoftVotingEnsemble::new(
            names(1),
            vec![Estimator::RandomForest {
                trees: vec![out_of_range_feature]
            }],
            None,
        )
        .is_err());

        let bad_probability = stump(0, 0.0, 0.1, 1.5);
        assert!(SoftVotingEnsemble::new(
            names(1),
            vec![Estimator::RandomForest {
                trees: vec![bad_probability]
            }],
            None,
        )
        .is_err());
    }

    #[test]
    fn test_validation_rejects_bad_weights() {
        let member = || Estimator::LogisticRegression {
            coefficients: vec![0.0],
            intercept: 0.0,
        };
        assert!(SoftVotingEnsemble::new(names(1), vec![member()], Some(vec![0.0])).is_err());
        assert!(SoftVotingEnsemble::new(names(1), vec![member()], Some(vec![-1.0])).is_err());
        assert!(SoftVotingEnsemble::new(names(1), vec![member()], Some(vec![1.0, 1.0])).is_err());
        assert!(SoftVotingEnsemble::new(names(1), vec![], None).is_err());
    }

    #[test]
    fn test_from_slice_parses_all_kinds() {
        let json = br#"{
            "feature_names": ["f0"],
            "weights": [2, 1, 1],
            "estimators": [
                {"kind": "logistic_regression", "coefficients": [0.0], "intercept": 0.0},
                {"kind": "random_forest", "trees": [[
                    {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                    {"value": 0.0},
                    {"value": 1.0}
                ]]},
                {"kind": "gradient_boosting", "init_score": 0.0, "learning_rate": 0.1, "trees": []}
            ]
        }"#;
        let ensemble = SoftVotingEnsemble::from_slice(json).expect("parse");
        assert_eq!(ensemble.estimator_count(), 3);

        // 0.5 * 0.5 + 0.25 * 1.0 + 0.25 * 0.5
        let p = ensemble.predict_proba(&[1.0]).expect("predict");
        assert!((p - 0.625).abs() < 1e-12);
    }
}
