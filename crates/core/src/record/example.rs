//! `tf.train.Example` protobuf decoding
//!
//! Only the subset of the protobuf wire format the Example message uses is
//! handled: varints, length-delimited fields, and fixed 32/64-bit scalars.
//! Unknown fields are skipped, so newer producers with extra fields still decode.
//!
//! ```text
//! Example  { features: Features = 1 }
//! Features { feature: map<string, Feature> = 1 }      // entry { key = 1, value = 2 }
//! Feature  { bytes_list = 1 | float_list = 2 | int64_list = 3 }
//! *List    { value: repeated = 1 }                     // packed or unpacked
//! ```

use crate::error::{IgnisError, IgnisResult};
use rustc_hash::FxHashMap;
use serde::Serialize;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Values stored under one feature key
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    /// `bytes_list`
    Bytes(Vec<Vec<u8>>),
    /// `float_list`
    Floats(Vec<f32>),
    /// `int64_list`
    Int64s(Vec<i64>),
}

impl FeatureValue {
    /// Name of the list kind as TensorFlow reports it
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes_list",
            Self::Floats(_) => "float_list",
            Self::Int64s(_) => "int64_list",
        }
    }

    /// Number of values in the list
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(v) => v.len(),
            Self::Floats(v) => v.len(),
            Self::Int64s(v) => v.len(),
        }
    }

    /// True when the list holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key, kind and length of one feature, as printed by `ignis inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSummary {
    pub key: String,
    pub kind: &'static str,
    pub len: usize,
}

/// Decoded Example message: a map of named feature lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Example {
    features: FxHashMap<String, FeatureValue>,
}

impl Example {
    /// Empty example
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a serialized Example payload
    pub fn decode(bytes: &[u8]) -> IgnisResult<Self> {
        let mut example = Self::new();
        let mut reader = WireReader::new(bytes, 0);
        while let Some((field, wire)) = reader.next_key()? {
            if field == 1 && wire == WIRE_LEN {
                let (features, base) = reader.read_len_delimited()?;
                example.decode_features(features, base)?;
            } else {
                reader.skip(wire)?;
            }
        }
        Ok(example)
    }

    fn decode_features(&mut self, bytes: &[u8], base: usize) -> IgnisResult<()> {
        let mut reader = WireReader::new(bytes, base);
        while let Some((field, wire)) = reader.next_key()? {
            if field == 1 && wire == WIRE_LEN {
                let (entry, entry_base) = reader.read_len_delimited()?;
                let (key, value) = decode_map_entry(entry, entry_base)?;
                if let Some(value) = value {
                    self.features.insert(key, value);
                }
            } else {
                reader.skip(wire)?;
            }
        }
        Ok(())
    }

    /// Insert or replace a feature
    pub fn insert(&mut self, key: impl Into<String>, value: FeatureValue) {
        self.features.insert(key.into(), value);
    }

    /// Look up a feature by key
    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.features.get(key)
    }

    /// Float values under `key`, if the feature is a float list
    pub fn floats(&self, key: &str) -> Option<&[f32]> {
        match self.features.get(key) {
            Some(FeatureValue::Floats(values)) => Some(values),
            _ => None,
        }
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when the example carries no features
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Sorted key/kind/length listing
    pub fn describe(&self) -> Vec<FeatureSummary> {
        let mut summary: Vec<FeatureSummary> = self
            .features
            .iter()
            .map(|(key, value)| FeatureSummary {
                key: key.clone(),
                kind: value.kind(),
                len: value.len(),
            })
            .collect();
        summary.sort_by(|a, b| a.key.cmp(&b.key));
        summary
    }

    /// Serialize back to protobuf wire format (packed lists, keys sorted)
    pub fn encode(&self) -> Vec<u8> {
        let mut keys: Vec<&String> = self.features.keys().collect();
        keys.sort();

        let mut features = Vec::new();
        for key in keys {
            let value = &self.features[key];
            let mut entry = Vec::new();
            write_len_field(&mut entry, 1, key.as_bytes());
            write_len_field(&mut entry, 2, &encode_feature(value));
            write_len_field(&mut features, 1, &entry);
        }

        let mut out = Vec::new();
        write_len_field(&mut out, 1, &features);
        out
    }
}

fn decode_map_entry(bytes: &[u8], base: usize) -> IgnisResult<(String, Option<FeatureValue>)> {
    let mut reader = WireReader::new(bytes, base);
    let mut key = String::new();
    let mut value = None;
    while let Some((field, wire)) = reader.next_key()? {
        match (field, wire) {
            (1, WIRE_LEN) => {
                let offset = reader.offset();
                let (raw, _) = reader.read_len_delimited()?;
                key = String::from_utf8(raw.to_vec())
                    .map_err(|_| IgnisError::malformed(offset, "feature key is not UTF-8"))?;
            }
            (2, WIRE_LEN) => {
                let (raw, feature_base) = reader.read_len_delimited()?;
                value = decode_feature(raw, feature_base)?;
            }
            _ => reader.skip(wire)?,
        }
    }
    Ok((key, value))
}

fn decode_feature(bytes: &[u8], base: usize) -> IgnisResult<Option<FeatureValue>> {
    let mut reader = WireReader::new(bytes, base);
    let mut value = None;
    while let Some((field, wire)) = reader.next_key()? {
        match (field, wire) {
            (1, WIRE_LEN) => {
                let (raw, list_base) = reader.read_len_delimited()?;
                value = Some(FeatureValue::Bytes(decode_bytes_list(raw, list_base)?));
            }
            (2, WIRE_LEN) => {
                let (raw, list_base) = reader.read_len_delimited()?;
                value = Some(FeatureValue::Floats(decode_float_list(raw, list_base)?));
            }
            (3, WIRE_LEN) => {
                let (raw, list_base) = reader.read_len_delimited()?;
                value = Some(FeatureValue::Int64s(decode_int64_list(raw, list_base)?));
            }
            _ => reader.skip(wire)?,
        }
    }
    Ok(value)
}

fn decode_bytes_list(bytes: &[u8], base: usize) -> IgnisResult<Vec<Vec<u8>>> {
    let mut reader = WireReader::new(bytes, base);
    let mut values = Vec::new();
    while let Some((field, wire)) = reader.next_key()? {
        if field == 1 && wire == WIRE_LEN {
            values.push(reader.read_len_delimited()?.0.to_vec());
        } else {
            reader.skip(wire)?;
        }
    }
    Ok(values)
}

fn decode_float_list(bytes: &[u8], base: usize) -> IgnisResult<Vec<f32>> {
    let mut reader = WireReader::new(bytes, base);
    let mut values = Vec::new();
    while let Some((field, wire)) = reader.next_key()? {
        match (field, wire) {
            (1, WIRE_LEN) => {
                let offset = reader.offset();
                let (packed, _) = reader.read_len_delimited()?;
                if packed.len() % 4 != 0 {
                    return Err(IgnisError::malformed(
                        offset,
                        format!("packed float list of {} bytes", packed.len()),
                    ));
                }
                values.reserve(packed.len() / 4);
                values.extend(
                    packed
                        .chunks_exact(4)
                        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                );
            }
            (1, WIRE_FIXED32) => values.push(f32::from_bits(reader.read_fixed32()?)),
            _ => reader.skip(wire)?,
        }
    }
    Ok(values)
}

fn decode_int64_list(bytes: &[u8], base: usize) -> IgnisResult<Vec<i64>> {
    let mut reader = WireReader::new(bytes, base);
    let mut values = Vec::new();
    while let Some((field, wire)) = reader.next_key()? {
        match (field, wire) {
            (1, WIRE_LEN) => {
                let (packed, packed_base) = reader.read_len_delimited()?;
                let mut inner = WireReader::new(packed, packed_base);
                while !inner.is_done() {
                    values.push(inner.read_varint()? as i64);
                }
            }
            (1, WIRE_VARINT) => values.push(reader.read_varint()? as i64),
            _ => reader.skip(wire)?,
        }
    }
    Ok(values)
}

fn encode_feature(value: &FeatureValue) -> Vec<u8> {
    let mut list = Vec::new();
    let field = match value {
        FeatureValue::Bytes(items) => {
            for item in items {
                write_len_field(&mut list, 1, item);
            }
            1
        }
        FeatureValue::Floats(items) => {
            let packed: Vec<u8> = items.iter().flat_map(|f| f.to_le_bytes()).collect();
            write_len_field(&mut list, 1, &packed);
            2
        }
        FeatureValue::Int64s(items) => {
            let mut packed = Vec::new();
            for &item in items {
                write_varint(&mut packed, item as u64);
            }
            write_len_field(&mut list, 1, &packed);
            3
        }
    };
    let mut out = Vec::new();
    write_len_field(&mut out, field, &list);
    out
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn write_len_field(out: &mut Vec<u8>, field: u32, payload: &[u8]) {
    write_varint(out, (u64::from(field) << 3) | u64::from(WIRE_LEN));
    write_varint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

/// Cursor over a protobuf message; `base` is the offset of `buf` within the
/// whole record so errors point at the right byte.
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8], base: usize) -> Self {
        Self { buf, pos: 0, base }
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn is_done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_varint(&mut self) -> IgnisResult<u64> {
        let start = self.offset();
        let mut result = 0u64;
        for shift in (0..64).step_by(7) {
            let Some(&byte) = self.buf.get(self.pos) else {
                return Err(IgnisError::malformed(start, "varint runs past end of message"));
            };
            self.pos += 1;
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(IgnisError::malformed(start, "varint longer than 10 bytes"))
    }

    fn next_key(&mut self) -> IgnisResult<Option<(u32, u8)>> {
        if self.is_done() {
            return Ok(None);
        }
        let key = self.read_varint()?;
        Ok(Some(((key >> 3) as u32, (key & 0x7) as u8)))
    }

    fn take(&mut self, len: usize) -> IgnisResult<(&'a [u8], usize)> {
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                IgnisError::malformed(
                    self.base + start,
                    format!("field of {len} bytes runs past end of message"),
                )
            })?;
        self.pos = end;
        Ok((&self.buf[start..end], self.base + start))
    }

    fn read_len_delimited(&mut self) -> IgnisResult<(&'a [u8], usize)> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    fn read_fixed32(&mut self) -> IgnisResult<u32> {
        let (raw, _) = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn skip(&mut self, wire: u8) -> IgnisResult<()> {
        match wire {
            WIRE_VARINT => self.read_varint().map(|_| ()),
            WIRE_FIXED64 => self.take(8).map(|_| ()),
            WIRE_LEN => self.read_len_delimited().map(|_| ()),
            WIRE_FIXED32 => self.take(4).map(|_| ()),
            other => Err(IgnisError::malformed(
                self.offset(),
                format!("unsupported wire type {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_mixed_kinds() {
        let mut example = Example::new();
        example.insert("elevation", FeatureValue::Floats(vec![1.0, 2.5, -3.0]));
        example.insert("ids", FeatureValue::Int64s(vec![0, 300, -1]));
        example.insert("tag", FeatureValue::Bytes(vec![b"fire".to_vec()]));

        let decoded = Example::decode(&example.encode()).unwrap();
        assert_eq!(decoded, example);
        assert_eq!(decoded.floats("elevation"), Some(&[1.0, 2.5, -3.0][..]));
        assert_eq!(decoded.floats("ids"), None);
    }

    #[test]
    fn test_unpacked_floats_accepted() {
        // float_list { value: 1.5 value: 2.0 } written unpacked (wire type 5)
        let mut list = Vec::new();
        for v in [1.5f32, 2.0] {
            list.push((1 << 3) | WIRE_FIXED32);
            list.extend_from_slice(&v.to_le_bytes());
        }
        let mut feature = Vec::new();
        write_len_field(&mut feature, 2, &list);
        let mut entry = Vec::new();
        write_len_field(&mut entry, 1, b"vs");
        write_len_field(&mut entry, 2, &feature);
        let mut features = Vec::new();
        write_len_field(&mut features, 1, &entry);
        let mut bytes = Vec::new();
        write_len_field(&mut bytes, 1, &features);

        let example = Example::decode(&bytes).unwrap();
        assert_eq!(example.floats("vs"), Some(&[1.5, 2.0][..]));
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let mut example = Example::new();
        example.insert("th", FeatureValue::Floats(vec![0.0; 16]));
        let bytes = example.encode();
        let err = Example::decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, IgnisError::MalformedExample { .. }));
    }

    #[test]
    fn test_describe_is_sorted() {
        let mut example = Example::new();
        example.insert("vs", FeatureValue::Floats(vec![0.0; 4]));
        example.insert("NDVI", FeatureValue::Floats(vec![0.0; 2]));
        let summary = example.describe();
        assert_eq!(summary[0].key, "NDVI");
        assert_eq!(summary[0].kind, "float_list");
        assert_eq!(summary[1].len, 4);
    }
}
