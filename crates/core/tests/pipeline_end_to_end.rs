//! Shards on disk → datasets → trained models → forecast
//!
//! Run with: cargo test --test `pipeline_end_to_end`

mod common;

use common::{fire_payload, scratch_dir, write_shard, StubSource};
use ignis_core::config::{DataConfig, ForecastConfig};
use ignis_core::features::{Dataset, DatasetBuilder, FEATURE_COUNT};
use ignis_core::model::metrics::{roc_auc, ClassificationReport, RegressionScores};
use ignis_core::model::{GbmParams, GradientBoostingClassifier, GradientBoostingRegressor};
use ignis_core::record::{inspect_shard, ChannelLayout};
use ignis_core::{PredictionRequest, SpreadForecaster};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Spread depends on wind: fast wind grows the fire, calm wind shrinks it
fn shard_payloads(seed: usize, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let k = seed + i;
            let prev = 20 + (k * 7) % 60;
            let windy = k % 2 == 0;
            let wind = if windy { 8.0 + (k % 5) as f32 } else { 1.0 + (k % 3) as f32 };
            let next = if windy { prev * 2 } else { prev / 2 };
            fire_payload(prev, next, wind)
        })
        .collect()
}

fn small_params() -> GbmParams {
    GbmParams {
        n_estimators: 40,
        max_depth: 3,
        ..GbmParams::default()
    }
}

#[test]
fn test_full_pipeline() {
    let dir = scratch_dir("pipeline");
    let data = DataConfig {
        data_dir: dir.clone(),
        output_dir: dir.join("processed"),
        train_shards: 2,
        test_shards: 1,
        max_train_samples: 70,
        ..DataConfig::default()
    };

    let train_paths = data.train_shard_paths();
    let mut first = shard_payloads(0, 40);
    // Degenerate records the filters must drop
    first.push(fire_payload(3, 50, 9.0));
    first.push(fire_payload(20, 400, 9.0));
    write_shard(&train_paths[0], &first);
    write_shard(&train_paths[1], &shard_payloads(40, 40));
    write_shard(&data.test_shard_paths()[0], &shard_payloads(1000, 30));

    let summary = inspect_shard(&train_paths[0]).unwrap();
    assert_eq!(summary.len(), 10);
    assert!(summary
        .iter()
        .any(|s| s.key == "PrevFireMask" && s.kind == "float_list" && s.len == 4096));

    let mut builder = DatasetBuilder::new(data.layout, data.max_train_samples);
    builder.extend_from_shards(&data.train_shard_paths());
    let train = builder.finish();
    assert_eq!(train.len(), 70);
    assert_eq!(train.skipped, 2);
    assert!(train.features.iter().all(|f| f.as_slice().len() == FEATURE_COUNT));
    assert!(train
        .spread_ratios
        .iter()
        .all(|r| (0.1..=10.0).contains(r)));

    let mut builder = DatasetBuilder::new(data.layout, data.max_test_samples);
    builder.extend_from_shards(&data.test_shard_paths());
    let test = builder.finish();
    assert_eq!(test.len(), 30);

    std::fs::create_dir_all(&data.output_dir).unwrap();
    train.save(data.train_dataset_path()).unwrap();
    let train = Dataset::load(data.train_dataset_path()).unwrap();

    let classifier =
        GradientBoostingClassifier::fit(&train.features, &train.spread_labels, small_params())
            .unwrap();
    let probabilities = classifier.predict_proba_batch(&test.features).unwrap();
    let predicted: Vec<u8> = probabilities.iter().map(|&p| u8::from(p > 0.5)).collect();
    let report = ClassificationReport::new(&test.spread_labels, &predicted);
    assert!(report.accuracy > 0.9, "accuracy {}", report.accuracy);
    assert!(roc_auc(&test.spread_labels, &probabilities).unwrap() > 0.9);
    assert_eq!(
        classifier.ensemble().ranked_importances()[0].0,
        "wind_speed_mean",
        "wind speed is the only label signal besides fire size"
    );

    let regressor =
        GradientBoostingRegressor::fit(&train.features, &train.spread_ratios, small_params())
            .unwrap();
    let predicted = regressor.predict_batch(&test.features).unwrap();
    let scores = RegressionScores::new(&test.spread_ratios, &predicted);
    assert!(scores.r2 > 0.8, "r2 {}", scores.r2);

    let forecast = ForecastConfig {
        model_dir: dir.join("models"),
        ..ForecastConfig::default()
    };
    std::fs::create_dir_all(&forecast.model_dir).unwrap();
    classifier.save(forecast.classifier_path()).unwrap();
    regressor.save(forecast.regressor_path()).unwrap();

    let forecaster = SpreadForecaster::new(
        Box::new(GradientBoostingClassifier::load(forecast.classifier_path()).unwrap()),
        Box::new(GradientBoostingRegressor::load(forecast.regressor_path()).unwrap()),
        Box::new(StubSource::offline()),
        &forecast,
    );
    let request = PredictionRequest::from_json(r#"{"lat": 38.5, "lng": -121.5, "brightness": 380}"#)
        .unwrap();
    let result = forecaster
        .predict_with(&request, 8, &mut StdRng::seed_from_u64(5))
        .unwrap();
    assert!((0.0..=1.0).contains(&result.spread_probability));
    assert!((0.1..=10.0).contains(&result.spread_ratio));
    assert_eq!(result.geojson.features.len(), 11);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_shard_is_skipped() {
    let dir = scratch_dir("missing-shard");
    let present = dir.join("present.tfrecord");
    write_shard(&present, &shard_payloads(0, 5));

    let mut builder = DatasetBuilder::new(ChannelLayout::default(), 100);
    builder.extend_from_shards(&[dir.join("absent.tfrecord"), present]);
    assert_eq!(builder.finish().len(), 5);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_models_refuse_wrong_file() {
    let dir = scratch_dir("wrong-model");
    let x: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i), 1.0]).collect();
    let y: Vec<f64> = (0..20).map(f64::from).collect();
    let path = dir.join("regressor.json");
    GradientBoostingRegressor::fit(&x, &y, small_params())
        .unwrap()
        .save(&path)
        .unwrap();

    assert!(GradientBoostingClassifier::load(&path).is_err());
    assert!(GradientBoostingClassifier::load(dir.join("nope.json")).is_err());

    std::fs::remove_dir_all(&dir).ok();
}
