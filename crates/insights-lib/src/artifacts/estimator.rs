//! Estimator capabilities and the native JSON estimator formats
//!
//! The pipeline never looks inside a trained model. It only uses the
//! capabilities defined here: [`Classifier`] for churn, [`Regressor`] for
//! LTV, and optionally [`ExplainableModel`] for feature importances.

use serde::Deserialize;

/// Binary classifier used by the churn model
pub trait Classifier: Send + Sync {
    /// Probabilities of class 0 and class 1
    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], String>;

    /// Predicted class; class 1 only when it is strictly more likely
    fn predict(&self, features: &[f64]) -> Result<u8, String> {
        let [p0, p1] = self.predict_proba(features)?;
        Ok(u8::from(p1 > p0))
    }

    fn explainable(&self) -> Option<&dyn ExplainableModel> {
        None
    }
}

/// Scalar regressor used by the LTV model
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64, String>;

    fn explainable(&self) -> Option<&dyn ExplainableModel> {
        None
    }
}

/// Models that report a global importance score per input column
pub trait ExplainableModel: Send + Sync {
    /// One score per feature, in schema order
    fn feature_importances(&self) -> &[f64];
}

/// A loaded estimator, typed by how the pipeline uses it
pub enum Estimator {
    Classifier(Box<dyn Classifier>),
    Regressor(Box<dyn Regressor>),
}

impl Estimator {
    pub fn explainable(&self) -> Option<&dyn ExplainableModel> {
        match self {
            Estimator::Classifier(c) => c.explainable(),
            Estimator::Regressor(r) => r.explainable(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::Classifier(_) => "classifier",
            Estimator::Regressor(_) => "regressor",
        }
    }
}

impl std::fmt::Debug for Estimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Estimator")
            .field("kind", &self.kind())
            .field("explainable", &self.explainable().is_some())
            .finish()
    }
}

/// Decision tree in flattened array form.
///
/// Node `i` is a leaf when `children_left[i] == -1`; otherwise samples with
/// `x[feature[i]] <= threshold[i]` go to `children_left[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|len| *len != n)
        {
            return Err("tree arrays have different lengths".to_string());
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == -1 {
                if right != -1 {
                    return Err(format!("node {} has only one child", node));
                }
                continue;
            }
            // Children always point forward, which rules out cycles
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(format!("node {} has invalid child {}", node, child));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!(
                    "node {} splits on feature {} but the schema has {}",
                    node, feature, n_features
                ));
            }
        }
        Ok(())
    }

    /// Leaf value reached by `features`. Assumes the tree was validated.
    fn leaf_value(&self, features: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            let x = features[self.feature[node] as usize];
            node = if x <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

/// On-disk form of the native estimators
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    GradientBoosting {
        init: f64,
        learning_rate: f64,
        trees: Vec<DecisionTree>,
        #[serde(default)]
        feature_importances: Option<Vec<f64>>,
    },
    RandomForest {
        trees: Vec<DecisionTree>,
        #[serde(default)]
        feature_importances: Option<Vec<f64>>,
    },
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

/// Native estimator evaluated in-process
#[derive(Debug, Clone)]
pub struct NativeEstimator {
    spec: EstimatorSpec,
    n_features: usize,
}

impl NativeEstimator {
    /// Validate an estimator definition against the width of its training schema
    pub fn new(spec: EstimatorSpec, n_features: usize) -> Result<Self, String> {
        match &spec {
            EstimatorSpec::GradientBoosting {
                trees,
                feature_importances,
                learning_rate,
                init,
            } => {
                if !learning_rate.is_finite() || !init.is_finite() {
                    return Err("gradient boosting parameters must be finite".to_string());
                }
                validate_ensemble(trees, feature_importances.as_deref(), n_features)?;
            }
            EstimatorSpec::RandomForest {
                trees,
                feature_importances,
            } => validate_ensemble(trees, feature_importances.as_deref(), n_features)?,
            EstimatorSpec::Logistic { coefficients, .. }
            | EstimatorSpec::Linear { coefficients, .. } => {
                if coefficients.len() != n_features {
                    return Err(format!(
                        "{} coefficients for {} features",
                        coefficients.len(),
                        n_features
                    ));
                }
            }
        }
        Ok(Self { spec, n_features })
    }

    pub fn kind(&self) -> &'static str {
        match self.spec {
            EstimatorSpec::GradientBoosting { .. } => "gradient_boosting",
            EstimatorSpec::RandomForest { .. } => "random_forest",
            EstimatorSpec::Logistic { .. } => "logistic",
            EstimatorSpec::Linear { .. } => "linear",
        }
    }

    pub fn supports_classification(&self) -> bool {
        !matches!(self.spec, EstimatorSpec::Linear { .. })
    }

    pub fn supports_regression(&self) -> bool {
        !matches!(self.spec, EstimatorSpec::Logistic { .. })
    }

    fn check_input(&self, features: &[f64]) -> Result<(), String> {
        if features.len() != self.n_features {
            return Err(format!(
                "model expects {} features, got {}",
                self.n_features,
                features.len()
            ));
        }
        if let Some(i) = features.iter().position(|x| !x.is_finite()) {
            return Err(format!("feature {} is not a finite number", i));
        }
        Ok(())
    }

    /// Raw model output before any link function
    fn decision(&self, features: &[f64]) -> f64 {
        match &self.spec {
            EstimatorSpec::GradientBoosting {
                init,
                learning_rate,
                trees,
                ..
            } => {
                init + learning_rate
                    * trees.iter().map(|t| t.leaf_value(features)).sum::<f64>()
            }
            EstimatorSpec::RandomForest { trees, .. } => {
                trees.iter().map(|t| t.leaf_value(features)).sum::<f64>() / trees.len() as f64
            }
            EstimatorSpec::Logistic {
                coefficients,
                intercept,
            }
            | EstimatorSpec::Linear {
                coefficients,
                intercept,
            } => {
                intercept
                    + coefficients
                        .iter()
                        .zip(features)
                        .map(|(w, x)| w * x)
                        .sum::<f64>()
            }
        }
    }
}

impl Classifier for NativeEstimator {
    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], String> {
        self.check_input(features)?;
        let decision = self.decision(features);
        let p1 = match self.spec {
            // Forest leaves already hold the class-1 probability
            EstimatorSpec::RandomForest { .. } => decision.clamp(0.0, 1.0),
            EstimatorSpec::Linear { .. } => {
                return Err("linear estimator cannot classify".to_string())
            }
            _ => sigmoid(decision),
        };
        if !p1.is_finite() {
            return Err("model produced a non-finite probability".to_string());
        }
        Ok([1.0 - p1, p1])
    }

    fn explainable(&self) -> Option<&dyn ExplainableModel> {
        self.importances().map(|_| self as &dyn ExplainableModel)
    }
}

impl Regressor for NativeEstimator {
    fn predict(&self, features: &[f64]) -> Result<f64, String> {
        self.check_input(features)?;
        if let EstimatorSpec::Logistic { .. } = self.spec {
            return Err("logistic estimator cannot regress".to_string());
        }
        let value = self.decision(features);
        if !value.is_finite() {
            return Err("model produced a non-finite value".to_string());
        }
        Ok(value)
    }

    fn explainable(&self) -> Option<&dyn ExplainableModel> {
        self.importances().map(|_| self as &dyn ExplainableModel)
    }
}

impl NativeEstimator {
    fn importances(&self) -> Option<&[f64]> {
        match &self.spec {
            EstimatorSpec::GradientBoosting {
                feature_importances,
                ..
            }
            | EstimatorSpec::RandomForest {
                feature_importances,
                ..
            } => feature_importances.as_deref(),
            _ => None,
        }
    }
}

impl ExplainableModel for NativeEstimator {
    fn feature_importances(&self) -> &[f64] {
        self.importances().unwrap_or(&[])
    }
}

fn validate_ensemble(
    trees: &[DecisionTree],
    importances: Option<&[f64]>,
    n_features: usize,
) -> Result<(), String> {
    if trees.is_empty() {
        return Err("ensemble has no trees".to_string());
    }
    for (i, tree) in trees.iter().enumerate() {
        tree.validate(n_features)
            .map_err(|e| format!("tree {}: {}", i, e))?;
    }
    if let Some(importances) = importances {
        if importances.len() != n_features {
            return Err(format!(
                "{} feature importances for {} features",
                importances.len(),
                n_features
            ));
        }
    }
    Ok(())
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Single split on feature 0 at 0.5
    fn stump(left: f64, right: f64) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![0.5, -2.0, -2.0],
            value: vec![0.0, left, right],
        }
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let spec = EstimatorSpec::GradientBoosting {
            init: 0.0,
            learning_rate: 0.5,
            trees: vec![stump(-2.0, 2.0), stump(-2.0, 2.0)],
            feature_importances: Some(vec![0.8, 0.2]),
        };
        let model = NativeEstimator::new(spec, 2).unwrap();

        let [p0, p1] = Classifier::predict_proba(&model, &[1.0, 0.0]).unwrap();
        assert!((p1 - sigmoid(2.0)).abs() < 1e-12);
        assert!((p0 + p1 - 1.0).abs() < 1e-12);
        assert_eq!(Classifier::predict(&model, &[1.0, 0.0]).unwrap(), 1);
        assert_eq!(Classifier::predict(&model, &[0.0, 0.0]).unwrap(), 0);

        let explain = Classifier::explainable(&model).unwrap();
        assert_eq!(explain.feature_importances(), &[0.8, 0.2]);
    }

    #[test]
    fn test_random_forest_regressor_averages_trees() {
        let spec = EstimatorSpec::RandomForest {
            trees: vec![stump(100.0, 300.0), stump(200.0, 500.0)],
            feature_importances: None,
        };
        let model = NativeEstimator::new(spec, 1).unwrap();
        assert_eq!(Regressor::predict(&model, &[0.0]).unwrap(), 150.0);
        assert_eq!(Regressor::predict(&model, &[0.9]).unwrap(), 400.0);
        assert!(Regressor::explainable(&model).is_none());
    }

    #[test]
    fn test_linear_models() {
        let logistic = NativeEstimator::new(
            EstimatorSpec::Logistic {
                coefficients: vec![1.0, -1.0],
                intercept: 0.0,
            },
            2,
        )
        .unwrap();
        let [p0, p1] = logistic.predict_proba(&[1.0, 1.0]).unwrap();
        assert_eq!((p0, p1), (0.5, 0.5));
        // Ties go to class 0
        assert_eq!(Classifier::predict(&logistic, &[1.0, 1.0]).unwrap(), 0);
        assert!(Regressor::predict(&logistic, &[1.0, 1.0]).is_err());

        let linear = NativeEstimator::new(
            EstimatorSpec::Linear {
                coefficients: vec![2.0, 3.0],
                intercept: 10.0,
            },
            2,
        )
        .unwrap();
        assert_eq!(Regressor::predict(&linear, &[1.0, 1.0]).unwrap(), 15.0);
        assert!(linear.predict_proba(&[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        let model = NativeEstimator::new(
            EstimatorSpec::Linear {
                coefficients: vec![1.0, 1.0],
                intercept: 0.0,
            },
            2,
        )
        .unwrap();
        assert!(Regressor::predict(&model, &[1.0]).is_err());
        let err = Regressor::predict(&model, &[1.0, f64::NAN]).unwrap_err();
        assert!(err.contains("finite"));
    }

    #[test]
    fn test_tree_validation() {
        let mut cyclic = stump(0.0, 1.0);
        cyclic.children_left[0] = 0;
        let spec = EstimatorSpec::RandomForest {
            trees: vec![cyclic],
            feature_importances: None,
        };
        assert!(NativeEstimator::new(spec, 1).is_err());

        let spec = EstimatorSpec::RandomForest {
            trees: vec![stump(0.0, 1.0)],
            feature_importances: None,
        };
        // Split feature 0 is out of range for an empty schema
        assert!(NativeEstimator::new(spec.clone(), 0).is_err());
        assert!(NativeEstimator::new(spec, 1).is_ok());

        let spec = EstimatorSpec::GradientBoosting {
            init: 0.0,
            learning_rate: 0.1,
            trees: vec![stump(0.0, 1.0)],
            feature_importances: Some(vec![1.0, 0.0, 0.0]),
        };
        let err = NativeEstimator::new(spec, 2).unwrap_err();
        assert!(err.contains("importances"));
    }

    #[test]
    fn test_spec_from_json() {
        let spec: EstimatorSpec = serde_json::from_value(json!({
            "kind": "logistic",
            "coefficients": [0.5, -0.25],
            "intercept": 0.1
        }))
        .unwrap();
        let model = NativeEstimator::new(spec, 2).unwrap();
        assert_eq!(model.kind(), "logistic");
        assert!(model.supports_classification());
        assert!(!model.supports_regression());
    }
}
