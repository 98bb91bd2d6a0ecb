//! Reading fire-monitoring records from TFRecord shards
//!
//! - `tfrecord`: container framing with CRC32C checks
//! - `example`: `tf.train.Example` protobuf decoding
//! - `channels`: named raster channels with padding rules

pub mod channels;
pub mod example;
pub mod tfrecord;

pub use channels::{Channel, ChannelLayout, FireRecord};
pub use example::{Example, FeatureSummary, FeatureValue};
pub use tfrecord::{crc32c, masked_crc32c, RecordReader, RecordWriter};

use crate::error::{IgnisError, IgnisResult};
use std::path::Path;

/// Key/kind/length listing of the first record in a shard
pub fn inspect_shard<P: AsRef<Path>>(path: P) -> IgnisResult<Vec<FeatureSummary>> {
    let mut reader = RecordReader::open(path.as_ref())?;
    match reader.next() {
        Some(payload) => Ok(Example::decode(&payload?)?.describe()),
        None => Err(IgnisError::CorruptFrame(format!(
            "{} contains no records",
            path.as_ref().display()
        ))),
    }
}
