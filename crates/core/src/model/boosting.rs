//! Gradient-boosted tree ensembles for spread classification and regression
//!
//! Both estimators share one additive model:
//!
//! ```text
//! raw(x) = init + learning_rate · Σ tree_m(x)
//! ```
//!
//! The regressor fits squared error (prior = target mean, leaves = residual
//! means). The classifier fits binomial deviance (prior = log-odds of the
//! positive rate, leaves = one Newton step) and maps `raw` through the logistic
//! function. Hyper-parameter defaults match the ones the spread models were
//! tuned with: 200 trees of depth 5, learning rate 0.1.

use crate::error::{IgnisError, IgnisResult};
use crate::features::FEATURE_NAMES;
use crate::model::tree::{RegressionTree, TreeLimits};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Probability clamp for the log-odds prior
const PRIOR_EPSILON: f64 = 1e-12;

/// Newton denominators below this give a zero leaf
const NEWTON_EPSILON: f64 = 1e-150;

/// Boosting hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each tree
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 5,
            learning_rate: 0.1,
            min_samples_split: 5,
            min_samples_leaf: 2,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

impl GbmParams {
    /// Reject values that would make training meaningless
    pub fn validate(&self) -> IgnisResult<()> {
        if self.n_estimators == 0 {
            return Err(IgnisError::Config("n_estimators must be > 0".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(IgnisError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(IgnisError::Config(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        Ok(())
    }

    fn limits(&self) -> TreeLimits {
        TreeLimits {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Training objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    SquaredError,
    BinomialDeviance,
}

/// Loss-specific pieces of the boosting loop
pub trait Loss: Sync {
    /// Constant raw prediction before any tree
    fn initial_raw(&self, y: &[f64]) -> f64;

    /// Pseudo-residual for one sample
    fn negative_gradient(&self, y: f64, raw: f64) -> f64;

    /// Output of a leaf reached by `indices`
    fn leaf_value(&self, indices: &[usize], y: &[f64], residual: &[f64]) -> f64;

    /// Mean loss over the training set
    fn loss(&self, y: &[f64], raw: &[f64]) -> f64;

    /// Tag stored in the model file
    fn objective(&self) -> Objective;
}

/// Least squares
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredError;

impl Loss for SquaredError {
    fn initial_raw(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            0.0
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        }
    }

    fn negative_gradient(&self, y: f64, raw: f64) -> f64 {
        y - raw
    }

    fn leaf_value(&self, indices: &[usize], _y: &[f64], residual: &[f64]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        indices.iter().map(|&i| residual[i]).sum::<f64>() / indices.len() as f64
    }

    fn loss(&self, y: &[f64], raw: &[f64]) -> f64 {
        mean(y.iter().zip(raw).map(|(t, p)| (t - p) * (t - p)))
    }

    fn objective(&self) -> Objective {
        Objective::SquaredError
    }
}

/// Logistic loss for 0/1 targets
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialDeviance;

impl Loss for BinomialDeviance {
    fn initial_raw(&self, y: &[f64]) -> f64 {
        let p = SquaredError
            .initial_raw(y)
            .clamp(PRIOR_EPSILON, 1.0 - PRIOR_EPSILON);
        (p / (1.0 - p)).ln()
    }

    fn negative_gradient(&self, y: f64, raw: f64) -> f64 {
        y - sigmoid(raw)
    }

    fn leaf_value(&self, indices: &[usize], y: &[f64], residual: &[f64]) -> f64 {
        let (numerator, denominator) = indices.iter().fold((0.0, 0.0), |(num, den), &i| {
            let p = y[i] - residual[i];
            (num + residual[i], den + p * (1.0 - p))
        });
        if denominator.abs() < NEWTON_EPSILON {
            0.0
        } else {
            numerator / denominator
        }
    }

    fn loss(&self, y: &[f64], raw: &[f64]) -> f64 {
        // log(1 + e^r) - y·r, written to avoid overflow for large |r|
        mean(y.iter().zip(raw).map(|(t, r)| {
            let softplus = if *r > 0.0 {
                r + (-r).exp().ln_1p()
            } else {
                r.exp().ln_1p()
            };
            softplus - t * r
        }))
    }

    fn objective(&self) -> Objective {
        Objective::BinomialDeviance
    }
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Logistic function
#[inline]
pub fn sigmoid(raw: f64) -> f64 {
    1.0 / (1.0 + (-raw).exp())
}

/// Fitted additive tree ensemble, shared by both estimators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    pub objective: Objective,
    pub params: GbmParams,
    pub feature_names: Vec<String>,
    pub init_raw: f64,
    pub trees: Vec<RegressionTree>,
    /// Normalized impurity-based importances (sum to 1 when any split exists)
    pub feature_importances: Vec<f64>,
    /// Mean training loss after each stage
    pub train_loss: Vec<f64>,
    pub trained_at: DateTime<Utc>,
}

impl BoostedTrees {
    /// Run the boosting loop
    pub fn fit<R, L>(x: &[R], y: &[f64], params: GbmParams, loss: &L) -> IgnisResult<Self>
    where
        R: AsRef<[f64]> + Sync,
        L: Loss,
    {
        params.validate()?;
        let n_features = check_matrix(x, y.len())?;

        let n = y.len();
        let init_raw = loss.initial_raw(y);
        let mut raw = vec![init_raw; n];
        let mut residual = vec![0.0; n];
        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut train_loss = Vec::with_capacity(params.n_estimators);
        let mut rng = StdRng::seed_from_u64(params.random_state);
        let sample_size = ((params.subsample * n as f64).round() as usize).clamp(1, n);

        for stage in 0..params.n_estimators {
            residual
                .par_iter_mut()
                .zip(y.par_iter().zip(raw.par_iter()))
                .for_each(|(r, (&t, &p))| *r = loss.negative_gradient(t, p));

            let mut indices: Vec<usize> = if sample_size < n {
                sample(&mut rng, n, sample_size).into_vec()
            } else {
                (0..n).collect()
            };
            indices.sort_unstable();

            let tree = RegressionTree::fit(
                x,
                &residual,
                &indices,
                params.limits(),
                |leaf: &[usize]| loss.leaf_value(leaf, y, &residual),
                &mut importances,
            );

            raw.par_iter_mut()
                .zip(x.par_iter())
                .for_each(|(p, row)| *p += params.learning_rate * tree.predict(row.as_ref()));
            trees.push(tree);

            let stage_loss = loss.loss(y, &raw);
            train_loss.push(stage_loss);
            if (stage + 1) % 20 == 0 || stage == 0 {
                info!("Iter {:>4}: train loss {:.4}", stage + 1, stage_loss);
            } else {
                debug!("Iter {:>4}: train loss {:.6}", stage + 1, stage_loss);
            }
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        Ok(Self {
            objective: loss.objective(),
            params,
            feature_names: feature_names_for(n_features),
            init_raw,
            trees,
            feature_importances: importances,
            train_loss,
            trained_at: Utc::now(),
        })
    }

    /// Width of the rows this ensemble was trained on
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Additive score for one row
    pub fn raw_predict(&self, row: &[f64]) -> IgnisResult<f64> {
        if row.len() != self.n_features() {
            return Err(IgnisError::InvalidInput(format!(
                "expected {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok(self.init_raw + self.params.learning_rate * sum)
    }

    /// Additive scores for many rows, in parallel
    pub fn raw_predict_batch<R: AsRef<[f64]> + Sync>(&self, rows: &[R]) -> IgnisResult<Vec<f64>> {
        rows.par_iter()
            .map(|row| self.raw_predict(row.as_ref()))
            .collect()
    }

    /// Importances sorted from most to least useful
    pub fn ranked_importances(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .map(String::as_str)
            .zip(self.feature_importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> IgnisResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    fn load<P: AsRef<Path>>(path: P, expected: Objective) -> IgnisResult<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let model: Self = serde_json::from_reader(reader)?;
        if model.objective != expected {
            return Err(IgnisError::InvalidInput(format!(
                "{} holds a {:?} model, expected {:?}",
                path.as_ref().display(),
                model.objective,
                expected
            )));
        }
        if let Some(bad) = model.trees.iter().position(|t| !t.is_well_formed()) {
            return Err(IgnisError::InvalidInput(format!(
                "{}: tree {bad} has dangling or cyclic node links",
                path.as_ref().display()
            )));
        }
        if model
            .trees
            .iter()
            .filter_map(RegressionTree::max_feature)
            .any(|f| f >= model.n_features())
        {
            return Err(IgnisError::InvalidInput(format!(
                "{} references features beyond its {} columns",
                path.as_ref().display(),
                model.n_features()
            )));
        }
        Ok(model)
    }
}

/// Row width shared by every row, checked against the label count
fn check_matrix<R: AsRef<[f64]>>(x: &[R], labels: usize) -> IgnisResult<usize> {
    if x.is_empty() {
        return Err(IgnisError::InvalidInput("training set is empty".to_string()));
    }
    if x.len() != labels {
        return Err(IgnisError::InvalidInput(format!(
            "{} rows but {} labels",
            x.len(),
            labels
        )));
    }
    let width = x[0].as_ref().len();
    if let Some(bad) = x.iter().position(|r| r.as_ref().len() != width) {
        return Err(IgnisError::InvalidInput(format!(
            "row {bad} has {} features, expected {width}",
            x[bad].as_ref().len()
        )));
    }
    Ok(width)
}

/// Canonical names when the width matches the spread layout, positional otherwise
fn feature_names_for(n_features: usize) -> Vec<String> {
    if n_features == FEATURE_NAMES.len() {
        FEATURE_NAMES.iter().map(ToString::to_string).collect()
    } else {
        (0..n_features).map(|i| format!("f{i}")).collect()
    }
}

/// Binary spread classifier (binomial deviance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradientBoostingClassifier {
    model: BoostedTrees,
}

impl GradientBoostingClassifier {
    /// Fit on 0/1 labels
    pub fn fit<R: AsRef<[f64]> + Sync>(
        x: &[R],
        labels: &[u8],
        params: GbmParams,
    ) -> IgnisResult<Self> {
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(IgnisError::InvalidInput(format!(
                "classifier labels must be 0 or 1, got {bad}"
            )));
        }
        let y: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        Ok(Self {
            model: BoostedTrees::fit(x, &y, params, &BinomialDeviance)?,
        })
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, row: &[f64]) -> IgnisResult<f64> {
        self.model.raw_predict(row).map(sigmoid)
    }

    /// Hard label (positive when probability exceeds one half)
    pub fn predict(&self, row: &[f64]) -> IgnisResult<bool> {
        Ok(self.model.raw_predict(row)? > 0.0)
    }

    /// Positive-class probabilities for many rows
    pub fn predict_proba_batch<R: AsRef<[f64]> + Sync>(&self, rows: &[R]) -> IgnisResult<Vec<f64>> {
        Ok(self
            .model
            .raw_predict_batch(rows)?
            .into_iter()
            .map(sigmoid)
            .collect())
    }

    /// Underlying ensemble
    pub fn ensemble(&self) -> &BoostedTrees {
        &self.model
    }

    /// Persist as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> IgnisResult<()> {
        self.model.save(path)
    }

    /// Load a classifier file, rejecting regressor files
    pub fn load<P: AsRef<Path>>(path: P) -> IgnisResult<Self> {
        Ok(Self {
            model: BoostedTrees::load(path, Objective::BinomialDeviance)?,
        })
    }
}

/// Spread-ratio regressor (squared error)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradientBoostingRegressor {
    model: BoostedTrees,
}

impl GradientBoostingRegressor {
    /// Fit on continuous targets
    pub fn fit<R: AsRef<[f64]> + Sync>(x: &[R], y: &[f64], params: GbmParams) -> IgnisResult<Self> {
        Ok(Self {
            model: BoostedTrees::fit(x, y, params, &SquaredError)?,
        })
    }

    /// Predicted value for one row
    pub fn predict(&self, row: &[f64]) -> IgnisResult<f64> {
        self.model.raw_predict(row)
    }

    /// Predicted values for many rows
    pub fn predict_batch<R: AsRef<[f64]> + Sync>(&self, rows: &[R]) -> IgnisResult<Vec<f64>> {
        self.model.raw_predict_batch(rows)
    }

    /// Underlying ensemble
    pub fn ensemble(&self) -> &BoostedTrees {
        &self.model
    }

    /// Persist as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> IgnisResult<()> {
        self.model.save(path)
    }

    /// Load a regressor file, rejecting classifier files
    pub fn load<P: AsRef<Path>>(path: P) -> IgnisResult<Self> {
        Ok(Self {
            model: BoostedTrees::load(path, Objective::SquaredError)?,
        })
    }
}
