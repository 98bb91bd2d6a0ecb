//! Shared plumbing for the `ignis` and `predict-spread` binaries

use anyhow::{Context, Result};
use ignis_core::config::{ForecastConfig, PipelineConfig};
use ignis_core::features::{Dataset, DatasetBuilder};
use ignis_core::model::metrics::{self, ClassificationReport, RegressionScores};
use ignis_core::model::{GbmParams, GradientBoostingClassifier, GradientBoostingRegressor};
use ignis_core::record::inspect_shard;
use ignis_core::{DataConfig, PredictionRequest, SpreadForecaster};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout only carries results; `RUST_LOG` overrides `info`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file if given, defaults otherwise
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load(p)
            .with_context(|| format!("failed to load config from {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Run one forecast and return it as a JSON line
///
/// The configuration is validated first, so a zero timeout cannot silently
/// push every lookup onto the fallback path.
pub fn predict_json(request_json: &str, config: &ForecastConfig) -> Result<String> {
    config.validate().context("invalid forecast configuration")?;
    let request =
        PredictionRequest::from_json(request_json).context("invalid prediction request")?;
    let forecaster = SpreadForecaster::from_config(config).with_context(|| {
        format!("failed to load spread models from {}", config.model_dir.display())
    })?;
    let result = forecaster.predict(&request)?;
    Ok(serde_json::to_string(&result)?)
}

/// `key: kind with length N` for the first record of a shard
pub fn inspect(shard: &Path) -> Result<String> {
    let summaries =
        inspect_shard(shard).with_context(|| format!("failed to inspect {}", shard.display()))?;
    let mut out = String::from("Keys in the example:\n");
    for s in &summaries {
        out.push_str(&format!("- {}\n", s.key));
    }
    out.push_str("\nFeature types and lengths:\n");
    for s in &summaries {
        out.push_str(&format!("{}: {} with length {}\n", s.key, s.kind, s.len));
    }
    Ok(out)
}

/// Build and save the train and test datasets
pub fn extract(data: &DataConfig) -> Result<(Dataset, Dataset)> {
    std::fs::create_dir_all(&data.output_dir)
        .with_context(|| format!("cannot create {}", data.output_dir.display()))?;

    info!("Extracting features from training data...");
    let train = build_dataset(data, &data.train_shard_paths(), data.max_train_samples);
    info!("Extracting features from test data...");
    let test = build_dataset(data, &data.test_shard_paths(), data.max_test_samples);

    info!("Saving processed data...");
    train.save(data.train_dataset_path())?;
    test.save(data.test_dataset_path())?;
    info!(
        "Processed and saved {} training samples and {} test samples",
        train.len(),
        test.len()
    );
    Ok((train, test))
}

fn build_dataset(data: &DataConfig, shards: &[PathBuf], max_samples: usize) -> Dataset {
    let mut builder = DatasetBuilder::new(data.layout, max_samples);
    builder.extend_from_shards(shards);
    builder.finish()
}

fn load_split(data: &DataConfig) -> Result<(Dataset, Dataset)> {
    info!("Loading data...");
    let train = Dataset::load(data.train_dataset_path()).with_context(|| {
        format!(
            "cannot load {}; run `ignis extract` first",
            data.train_dataset_path().display()
        )
    })?;
    let test = Dataset::load(data.test_dataset_path())
        .with_context(|| format!("cannot load {}", data.test_dataset_path().display()))?;
    if train.is_empty() {
        anyhow::bail!("training set is empty");
    }
    info!(
        "Training samples: {}, Test samples: {}, Features: {}",
        train.len(),
        test.len(),
        train.feature_names.len()
    );
    Ok((train, test))
}

fn importance_table(ranked: &[(&str, f64)]) -> String {
    ranked
        .iter()
        .enumerate()
        .map(|(i, (name, imp))| format!("{}. {}: {:.4}\n", i + 1, name, imp))
        .collect()
}

/// Fit, evaluate and save the spread classifier; returns the printed report
pub fn train_classifier(data: &DataConfig, params: GbmParams, model_path: &Path) -> Result<String> {
    let (train, test) = load_split(data)?;
    info!("{}", train.stats());

    info!("Training Gradient Boosting Classifier...");
    let started = Instant::now();
    let model = GradientBoostingClassifier::fit(&train.features, &train.spread_labels, params)?;
    info!("Training completed in {:.2} seconds", started.elapsed().as_secs_f64());

    info!("Evaluating model...");
    let probabilities = model.predict_proba_batch(&test.features)?;
    let predicted: Vec<u8> = probabilities.iter().map(|&p| u8::from(p > 0.5)).collect();
    let report = ClassificationReport::new(&test.spread_labels, &predicted);

    let mut out = format!("Test Accuracy: {:.4}\n", report.accuracy);
    match metrics::roc_auc(&test.spread_labels, &probabilities) {
        Some(auc) => out.push_str(&format!("ROC AUC Score: {auc:.4}\n")),
        None => out.push_str("ROC AUC Score: undefined (single class in test set)\n"),
    }
    out.push_str(&format!("\nClassification Report:\n{report}\n"));
    out.push_str(&format!("\nConfusion Matrix:\n{}\n", report.confusion));
    out.push_str("\nFeature Importance:\n");
    out.push_str(&importance_table(&model.ensemble().ranked_importances()));

    save_model(model_path, |p| model.save(p))?;
    out.push_str(&format!("Model saved as {}\n", model_path.display()));
    Ok(out)
}

/// Fit, evaluate and save the spread-ratio regressor; returns the printed report
pub fn train_regressor(data: &DataConfig, params: GbmParams, model_path: &Path) -> Result<String> {
    let (train, test) = load_split(data)?;
    info!("{}", train.stats());

    info!("Training Gradient Boosting Regressor...");
    let started = Instant::now();
    let model = GradientBoostingRegressor::fit(&train.features, &train.spread_ratios, params)?;
    info!("Training completed in {:.2} seconds", started.elapsed().as_secs_f64());

    info!("Evaluating model...");
    let predicted = model.predict_batch(&test.features)?;
    let scores = RegressionScores::new(&test.spread_ratios, &predicted);

    let mut out = format!(
        "Test MSE: {:.4}\nTest RMSE: {:.4}\nTest MAE: {:.4}\nTest R² Score: {:.4}\n",
        scores.mse, scores.rmse, scores.mae, scores.r2
    );
    out.push_str("\nFeature Importance:\n");
    out.push_str(&importance_table(&model.ensemble().ranked_importances()));

    save_model(model_path, |p| model.save(p))?;
    out.push_str(&format!("Model saved as {}\n", model_path.display()));
    Ok(out)
}

fn save_model<F>(path: &Path, save: F) -> Result<()>
where
    F: FnOnce(&Path) -> ignis_core::IgnisResult<()>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    save(path).with_context(|| format!("failed to save model to {}", path.display()))
}
