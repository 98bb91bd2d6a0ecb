//! TFRecord container framing
//!
//! Each record on disk is laid out as:
//!
//! ```text
//! ┌──────────────┬───────────────────────┬───────────┬─────────────────────┐
//! │ len: u64 LE  │ masked_crc32c(len) u32│ data[len] │ masked_crc32c(data) │
//! └──────────────┴───────────────────────┴───────────┴─────────────────────┘
//! ```
//!
//! A bad length checksum or a short read means the framing is lost, so the
//! reader reports the error once and then ends. A bad data checksum only
//! poisons that one record; iteration continues with the next frame.

use crate::error::{IgnisError, IgnisResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// Constant added after rotation when masking a CRC
const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32C checksum (Castagnoli polynomial)
pub fn crc32c(data: &[u8]) -> u32 {
    // CRC32C lookup table (reflected polynomial 0x82F63B78)
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0x82F6_3B78;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ TABLE[idx];
    }
    !crc
}

/// Masked CRC32C as stored in TFRecord frames
#[inline]
pub fn masked_crc32c(data: &[u8]) -> u32 {
    crc32c(data).rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Streaming reader yielding the payload of each record in a shard
pub struct RecordReader<R> {
    inner: R,
    records_read: usize,
    finished: bool,
}

impl RecordReader<BufReader<File>> {
    /// Open a shard on disk
    pub fn open<P: AsRef<Path>>(path: P) -> IgnisResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap any byte stream
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            records_read: 0,
            finished: false,
        }
    }

    /// Number of frames consumed so far (including ones with bad data checksums)
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Fill `buf` completely. Returns `Ok(false)` on a clean end of stream
    /// before the first byte.
    fn fill(&mut self, buf: &mut [u8]) -> IgnisResult<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(IgnisError::CorruptFrame(format!(
                        "truncated frame after {} of {} bytes",
                        filled,
                        buf.len()
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    fn fill_required(&mut self, buf: &mut [u8], what: &str) -> IgnisResult<()> {
        if self.fill(buf)? {
            Ok(())
        } else {
            Err(IgnisError::CorruptFrame(format!("stream ended before {what}")))
        }
    }

    fn read_frame(&mut self) -> IgnisResult<Option<IgnisResult<Vec<u8>>>> {
        let mut len_bytes = [0u8; 8];
        if !self.fill(&mut len_bytes)? {
            return Ok(None);
        }

        let mut crc_bytes = [0u8; 4];
        self.fill_required(&mut crc_bytes, "length checksum")?;
        let expected = u32::from_le_bytes(crc_bytes);
        let actual = masked_crc32c(&len_bytes);
        if expected != actual {
            return Err(IgnisError::CorruptFrame(format!(
                "length checksum mismatch (stored {expected:#010x}, computed {actual:#010x})"
            )));
        }

        let len = u64::from_le_bytes(len_bytes);
        let mut data = Vec::new();
        let copied = (&mut self.inner).take(len).read_to_end(&mut data)?;
        if copied as u64 != len {
            return Err(IgnisError::CorruptFrame(format!(
                "truncated payload: expected {len} bytes, got {copied}"
            )));
        }

        self.fill_required(&mut crc_bytes, "data checksum")?;
        self.records_read += 1;
        let expected = u32::from_le_bytes(crc_bytes);
        let actual = masked_crc32c(&data);
        if expected != actual {
            return Ok(Some(Err(IgnisError::CorruptFrame(format!(
                "data checksum mismatch in record {}: stored {expected:#010x}, got {actual:#010x}",
                self.records_read - 1
            )))));
        }

        Ok(Some(Ok(data)))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = IgnisResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Writer producing the same framing, used for fixtures and tooling
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) a shard on disk
    pub fn create<P: AsRef<Path>>(path: P) -> IgnisResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordWriter<W> {
    /// Wrap any byte sink
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Append one framed record
    pub fn write_record(&mut self, data: &[u8]) -> IgnisResult<()> {
        let len_bytes = (data.len() as u64).to_le_bytes();
        self.inner.write_all(&len_bytes)?;
        self.inner.write_all(&masked_crc32c(&len_bytes).to_le_bytes())?;
        self.inner.write_all(data)?;
        self.inner.write_all(&masked_crc32c(data).to_le_bytes())?;
        Ok(())
    }

    /// Flush and hand back the sink
    pub fn finish(mut self) -> IgnisResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn framed(records: &[&[u8]]) -> Vec<u8> {
        let mut writer = RecordWriter::new(Vec::new());
        for r in records {
            writer.write_record(r).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_crc32c_check_value() {
        // Standard check value for CRC-32C
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn test_reader_yields_records_in_order() {
        let bytes = framed(&[b"first", b"", b"third record"]);
        let records: Vec<Vec<u8>> = RecordReader::new(Cursor::new(bytes))
            .map(Result::unwrap)
            .collect();
        assert_eq!(records, vec![b"first".to_vec(), Vec::new(), b"third record".to_vec()]);
    }

    #[test]
    fn test_data_checksum_mismatch_skips_only_that_record() {
        let mut bytes = framed(&[b"aaaa", b"bbbb"]);
        // First payload starts after 8-byte length and 4-byte length crc
        bytes[12] ^= 0xFF;

        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert!(matches!(reader.next(), Some(Err(IgnisError::CorruptFrame(_)))));
        assert_eq!(reader.next().unwrap().unwrap(), b"bbbb".to_vec());
        assert!(reader.next().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn test_truncated_frame_ends_stream() {
        let mut bytes = framed(&[b"complete", b"partial"]);
        bytes.truncate(bytes.len() - 6);

        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_length_checksum_mismatch_ends_stream() {
        let mut bytes = framed(&[b"x", b"y"]);
        bytes[8] ^= 0x01;
        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
