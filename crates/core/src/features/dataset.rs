//! Labelled dataset assembly and persistence
//!
//! Streams TFRecord shards in order, runs the extractor over every decodable
//! record and stops once `max_samples` samples were accepted. The result is
//! stored column-wise (feature matrix plus the two label vectors) so the
//! trainers can borrow it without reshaping.

use crate::error::{IgnisError, IgnisResult};
use crate::features::{extract, Extraction, FeatureVector, LabelledSample, FEATURE_NAMES};
use crate::record::{ChannelLayout, Example, FireRecord, RecordReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Feature matrix with classification and regression targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Names of the feature columns, for provenance
    pub feature_names: Vec<String>,
    /// One row per accepted record
    pub features: Vec<FeatureVector>,
    /// Binary spread labels
    pub spread_labels: Vec<u8>,
    /// Continuous spread ratios
    pub spread_ratios: Vec<f64>,
    /// Records rejected by the fire-area, ratio or finiteness filters
    pub skipped: usize,
    /// Records that could not be decoded
    pub decode_errors: usize,
}

impl Dataset {
    /// Empty dataset carrying the canonical feature names
    pub fn new() -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when no record was accepted
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Append one accepted sample
    pub fn push(&mut self, sample: LabelledSample) {
        self.features.push(sample.features);
        self.spread_labels.push(sample.spread_label);
        self.spread_ratios.push(sample.spread_ratio);
    }

    /// Summary statistics over the labels
    pub fn stats(&self) -> DatasetStats {
        let positives = self.spread_labels.iter().filter(|&&l| l == 1).count();
        let (ratio_min, ratio_max, ratio_sum) = self.spread_ratios.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, sum), &r| (lo.min(r), hi.max(r), sum + r),
        );
        let n = self.len();
        DatasetStats {
            samples: n,
            skipped: self.skipped,
            decode_errors: self.decode_errors,
            positives,
            ratio_min: if n == 0 { 0.0 } else { ratio_min },
            ratio_max: if n == 0 { 0.0 } else { ratio_max },
            ratio_mean: if n == 0 { 0.0 } else { ratio_sum / n as f64 },
        }
    }

    /// Load a dataset written by [`Dataset::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> IgnisResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let dataset: Self = serde_json::from_reader(reader)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Write the dataset as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> IgnisResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Column lengths must agree
    pub fn validate(&self) -> IgnisResult<()> {
        if self.spread_labels.len() != self.features.len()
            || self.spread_ratios.len() != self.features.len()
        {
            return Err(IgnisError::InvalidInput(format!(
                "dataset columns disagree: {} rows, {} labels, {} ratios",
                self.features.len(),
                self.spread_labels.len(),
                self.spread_ratios.len()
            )));
        }
        Ok(())
    }
}

/// Label summary printed after extraction and before training
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetStats {
    pub samples: usize,
    pub skipped: usize,
    pub decode_errors: usize,
    pub positives: usize,
    pub ratio_min: f64,
    pub ratio_max: f64,
    pub ratio_mean: f64,
}

impl DatasetStats {
    /// Share of positive labels in percent
    pub fn positive_percent(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.positives as f64 / self.samples as f64 * 100.0
        }
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Samples: {} (skipped {}, undecodable {})",
            self.samples, self.skipped, self.decode_errors
        )?;
        writeln!(
            f,
            "Positive examples: {} ({:.2}%)",
            self.positives,
            self.positive_percent()
        )?;
        write!(
            f,
            "Spread ratio stats: min={:.2}, max={:.2}, mean={:.2}",
            self.ratio_min, self.ratio_max, self.ratio_mean
        )
    }
}

/// Streams shards into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    layout: ChannelLayout,
    max_samples: usize,
    dataset: Dataset,
}

impl DatasetBuilder {
    /// Builder that stops after `max_samples` accepted samples
    pub fn new(layout: ChannelLayout, max_samples: usize) -> Self {
        Self {
            layout,
            max_samples,
            dataset: Dataset::new(),
        }
    }

    /// True once the sample cap is reached
    pub fn is_full(&self) -> bool {
        self.dataset.len() >= self.max_samples
    }

    /// Process one serialized Example payload
    ///
    /// Decode errors are counted and logged, never returned.
    pub fn push_payload(&mut self, payload: &[u8]) {
        if self.is_full() {
            return;
        }
        match Example::decode(payload) {
            Ok(example) => self.push_record(&FireRecord::from_example(&example, self.layout)),
            Err(e) => {
                self.dataset.decode_errors += 1;
                warn!("Error processing record: {}", e);
            }
        }
    }

    /// Process one materialized record
    pub fn push_record(&mut self, record: &FireRecord) {
        if self.is_full() {
            return;
        }
        match extract(record, self.layout.side) {
            Extraction::Sample(sample) => self.dataset.push(sample),
            Extraction::Skipped(reason) => {
                self.dataset.skipped += 1;
                debug!("Skipped record: {:?}", reason);
            }
        }
    }

    /// Drain a record stream until it ends or the cap is reached
    pub fn extend_from_reader<R: Read>(&mut self, reader: RecordReader<R>) {
        for frame in reader {
            if self.is_full() {
                break;
            }
            match frame {
                Ok(payload) => self.push_payload(&payload),
                Err(e) => {
                    self.dataset.decode_errors += 1;
                    warn!("Error processing record: {}", e);
                }
            }
        }
    }

    /// Read shards in order; a shard that cannot be opened is logged and skipped
    pub fn extend_from_shards<P: AsRef<Path>>(&mut self, shards: &[P]) {
        info!("Processing {} files...", shards.len());
        for shard in shards {
            if self.is_full() {
                break;
            }
            let shard = shard.as_ref();
            match RecordReader::open(shard) {
                Ok(reader) => {
                    let before = self.dataset.len();
                    self.extend_from_reader(reader);
                    debug!(
                        "{}: {} samples accepted",
                        shard.display(),
                        self.dataset.len() - before
                    );
                }
                Err(e) => warn!("Cannot open {}: {}", shard.display(), e),
            }
        }
        info!(
            "Skipped {} records with no fire, unreasonable spread ratios or non-finite values",
            self.dataset.skipped
        );
    }

    /// Finish and hand back the dataset
    pub fn finish(self) -> Dataset {
        self.dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;
    use crate::record::{FeatureValue, RecordWriter};
    use std::io::Cursor;

    fn fire_payload(prev: usize, next: usize) -> Vec<u8> {
        let mut prev_mask = vec![0.0f32; 4096];
        prev_mask[..prev].fill(1.0);
        let mut next_mask = vec![0.0f32; 4096];
        next_mask[..next].fill(1.0);

        let mut example = Example::new();
        example.insert("PrevFireMask", FeatureValue::Floats(prev_mask));
        example.insert("FireMask", FeatureValue::Floats(next_mask));
        example.insert("vs", FeatureValue::Floats(vec![5.0; 64]));
        example.encode()
    }

    fn shard(payloads: &[Vec<u8>]) -> RecordReader<Cursor<Vec<u8>>> {
        let mut writer = RecordWriter::new(Vec::new());
        for p in payloads {
            writer.write_record(p).unwrap();
        }
        RecordReader::new(Cursor::new(writer.finish().unwrap()))
    }

    #[test]
    fn test_filters_and_counts() {
        let mut builder = DatasetBuilder::new(ChannelLayout::default(), 100);
        builder.extend_from_reader(shard(&[
            fire_payload(5, 5),   // no active fire
            fire_payload(20, 30), // ratio 1.5 → positive
            fire_payload(10, 200), // ratio 20 → implausible
            vec![0x0A, 0xFF],     // undecodable
            fire_payload(20, 20), // ratio 1.0 → negative
        ]));
        let dataset = builder.finish();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.skipped, 2);
        assert_eq!(dataset.decode_errors, 1);
        assert_eq!(dataset.spread_labels, vec![1, 0]);
        assert!(dataset.features.iter().all(|f| f.0.len() == FEATURE_COUNT));

        let stats = dataset.stats();
        assert_eq!(stats.positives, 1);
        assert_eq!(stats.positive_percent(), 50.0);
        assert_eq!(stats.ratio_min, 1.0);
        assert_eq!(stats.ratio_max, 1.5);
    }

    #[test]
    fn test_stops_at_max_samples() {
        let mut builder = DatasetBuilder::new(ChannelLayout::default(), 2);
        builder.extend_from_reader(shard(&vec![fire_payload(20, 20); 5]));
        assert!(builder.is_full());
        assert_eq!(builder.finish().len(), 2);
    }

    #[test]
    fn test_save_load_preserves_columns() {
        let mut builder = DatasetBuilder::new(ChannelLayout::default(), 10);
        builder.extend_from_reader(shard(&[fire_payload(20, 30), fire_payload(40, 20)]));
        let dataset = builder.finish();

        let path = std::env::temp_dir().join(format!("ignis-dataset-{}.json", std::process::id()));
        dataset.save(&path).unwrap();
        let loaded = Dataset::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, dataset);
        assert_eq!(loaded.feature_names.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_non_finite_record_never_reaches_disk() {
        let layout = ChannelLayout::default();
        let mut noisy = FireRecord::zeroed(layout);
        noisy.prev_fire_mask[..20].fill(1.0);
        noisy.fire_mask[..20].fill(1.0);
        noisy.elevation[7] = f32::NAN;

        let mut builder = DatasetBuilder::new(layout, 10);
        builder.push_record(&noisy);
        builder.extend_from_reader(shard(&[fire_payload(20, 30)]));
        let dataset = builder.finish();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.skipped, 1);

        let path = std::env::temp_dir().join(format!("ignis-noisy-{}.json", std::process::id()));
        dataset.save(&path).unwrap();
        let loaded = Dataset::load(&path);
        std::fs::remove_file(&path).ok();

        let loaded = loaded.unwrap();
        assert_eq!(loaded, dataset);
        assert!(loaded.features.iter().all(|f| f.0.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_mismatched_columns_rejected() {
        let mut dataset = Dataset::new();
        dataset.spread_labels.push(1);
        assert!(dataset.validate().is_err());
    }
}
