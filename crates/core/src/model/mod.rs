//! Spread models
//!
//! - `tree`: regression-tree weak learner
//! - `boosting`: gradient-boosted classifier and regressor
//! - `metrics`: held-out evaluation
//!
//! The forecaster only sees the two traits below, so tests can swap the
//! trained ensembles for fixed-output doubles.

pub mod boosting;
pub mod metrics;
pub mod tree;

pub use boosting::{
    BinomialDeviance, BoostedTrees, GbmParams, GradientBoostingClassifier,
    GradientBoostingRegressor, Loss, Objective, SquaredError,
};
pub use metrics::{ClassificationReport, ConfusionMatrix, RegressionScores};
pub use tree::{Node, RegressionTree, TreeLimits};

use crate::error::IgnisResult;
use crate::features::FeatureVector;

/// File name of the persisted spread classifier
pub const CLASSIFIER_FILE: &str = "wildfire_spread_classifier_advanced.json";

/// File name of the persisted spread-ratio regressor
pub const REGRESSOR_FILE: &str = "wildfire_spread_regressor_advanced.json";

/// Binary "will it spread" model
pub trait SpreadClassifier: Send + Sync {
    /// Probability that the fire grows by more than the label threshold
    fn spread_probability(&self, features: &FeatureVector) -> IgnisResult<f64>;

    /// Hard decision
    fn will_spread(&self, features: &FeatureVector) -> IgnisResult<bool>;
}

/// Continuous spread-ratio model
pub trait SpreadRegressor: Send + Sync {
    /// Unclipped predicted ratio of next-day to current fire area
    fn spread_ratio(&self, features: &FeatureVector) -> IgnisResult<f64>;
}

impl SpreadClassifier for GradientBoostingClassifier {
    fn spread_probability(&self, features: &FeatureVector) -> IgnisResult<f64> {
        self.predict_proba(features.as_slice())
    }

    fn will_spread(&self, features: &FeatureVector) -> IgnisResult<bool> {
        self.predict(features.as_slice())
    }
}

impl SpreadRegressor for GradientBoostingRegressor {
    fn spread_ratio(&self, features: &FeatureVector) -> IgnisResult<f64> {
        self.predict(features.as_slice())
    }
}
