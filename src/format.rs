// SPDX-License-Identifier: MIT
//! Trace container header format
//!
//! The header block is plain ASCII made of fixed-width, newline-terminated
//! records so that its length depends only on the number of entries:
//!
//! ```text
//! [0, 32)              "<count>"  space-padded, '\n' at byte 31
//! [32 + 96*i, +96)     "<name> <start> <length>"  space-padded, '\n' at byte 95
//! ```

use crate::error::{ContainerError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Width of the entry-count record, including its newline
pub const COUNT_RECORD_SIZE: usize = 32;

/// Width of one entry record, including its newline
pub const ENTRY_RECORD_SIZE: usize = 96;

/// Longest `"name start length"` text that fits in an entry record
pub const MAX_ENTRY_TEXT_LEN: usize = ENTRY_RECORD_SIZE - 1;

const PAD: u8 = b' ';
const TERMINATOR: u8 = b'\n';

/// Total header block length for `count` entries.
///
/// Depends only on the count, so the writer can reserve the block before any
/// payload exists.
#[inline]
pub const fn header_block_len(count: usize) -> u64 {
    (COUNT_RECORD_SIZE + count * ENTRY_RECORD_SIZE) as u64
}


/// Metadata for one member file of a container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRecord {
    /// File name without directory components
    pub name: String,

    /// Absolute offset of the compressed payload
    pub start: u64,

    /// Compressed payload length in bytes
    pub length: u64,
}

impl EntryRecord {
    pub fn new(name: impl Into<String>, start: u64, length: u64) -> Self {
        Self {
            name: name.into(),
            start,
            length,
        }
    }

    /// One past the last payload byte, `None` if it overflows.
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.length)
    }

    /// Byte range of the payload inside the container.
    pub fn range(&self) -> Option<Range<u64>> {
        self.end().map(|end| self.start..end)
    }
}

/// Decoded header block: entry records in container order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBlock {
    entries: Vec<EntryRecord>,
}

impl HeaderBlock {
    pub fn new(entries: Vec<EntryRecord>) -> Self {
        Self { entries }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[EntryRecord] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<EntryRecord> {
        self.entries
    }

    /// Length of the encoded block
    #[inline]
    pub fn encoded_len(&self) -> u64 {
        header_block_len(self.entries.len())
    }

    /// Encode the count record followed by every entry record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.encoded_len() as usize);
        buffer.extend_from_slice(&encode_count(self.entries.len() as u64));
        for entry in &self.entries {
            buffer.extend_from_slice(&encode_entry(entry)?);
        }

        debug_assert_eq!(buffer.len() as u64, self.encoded_len());
        Ok(buffer)
    }
}

/// Encode the entry count as a 32-byte record.
///
/// A `u64` has at most 20 decimal digits, so this cannot overflow the field.
pub fn encode_count(count: u64) -> [u8; COUNT_RECORD_SIZE] {
    let mut record = [PAD; COUNT_RECORD_SIZE];
    let digits = count.to_string();
    record[..digits.len()].copy_from_slice(digits.as_bytes());
    record[COUNT_RECORD_SIZE - 1] = TERMINATOR;
    record
}

/// Encode one entry as a 96-byte record.
pub fn encode_entry(entry: &EntryRecord) -> Result<[u8; ENTRY_RECORD_SIZE]> {
    validate_encodable_name(&entry.name)?;

    let text = format!("{} {} {}", entry.name, entry.start, entry.length);
    if text.len() > MAX_ENTRY_TEXT_LEN {
        return Err(ContainerError::RecordOverflow {
            name: entry.name.clone(),
            len: text.len(),
        });
    }

    let mut record = [PAD; ENTRY_RECORD_SIZE];
    record[..text.len()].copy_from_slice(text.as_bytes());
    record[ENTRY_RECORD_SIZE - 1] = TERMINATOR;
    Ok(record)
}

/// Decode the 32-byte count record.
pub fn decode_count(record: &[u8]) -> Result<u64> {
    let text = record_text(record, COUNT_RECORD_SIZE, "count")?;
    parse_decimal(text.trim_end_matches(' '), "entry count")
}

/// Decode one 96-byte entry record.
pub fn decode_entry(record: &[u8]) -> Result<EntryRecord> {
    let text = record_text(record, ENTRY_RECORD_SIZE, "entry")?;

    let mut fields = text.trim_end_matches(' ').split(' ');
    let (Some(name), Some(start), Some(length), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(ContainerError::MalformedHeader(format!(
            "entry record {:?} does not have exactly three fields",
            text.trim_end()
        )));
    };

    validate_decoded_name(name)?;
    Ok(EntryRecord {
        name: name.to_string(),
        start: parse_decimal(start, "entry start")?,
        length: parse_decimal(length, "entry length")?,
    })
}

/// Decode a complete header block from the start of `bytes`.
///
/// Bytes past the header block (the payload region) are ignored.
pub fn decode_header(bytes: &[u8]) -> Result<HeaderBlock> {
    if bytes.len() < COUNT_RECORD_SIZE {
        return Err(ContainerError::MalformedHeader(format!(
            "container is {} bytes, shorter than the count record",
            bytes.len()
        )));
    }

    let count = decode_count(&bytes[..COUNT_RECORD_SIZE])?;
    let block_len = announced_block_len(count)?;
    if (bytes.len() as u64) < block_len {
        return Err(ContainerError::MalformedHeader(format!(
            "header block for {count} entries needs {block_len} bytes, found {}",
            bytes.len()
        )));
    }

    let entries = bytes[COUNT_RECORD_SIZE..block_len as usize]
        .chunks_exact(ENTRY_RECORD_SIZE)
        .map(decode_entry)
        .collect::<Result<Vec<_>>>()?;

    Ok(HeaderBlock { entries })
}

/// Required length of the header block announced by a count record.
pub(crate) fn announced_block_len(count: u64) -> Result<u64> {
    count
        .checked_mul(ENTRY_RECORD_SIZE as u64)
        .and_then(|len| len.checked_add(COUNT_RECORD_SIZE as u64))
        .ok_or_else(|| {
        ContainerError::MalformedHeader(format!("entry count {count} is out of range"))
    })
}

fn record_text<'a>(record: &'a [u8], width: usize, kind: &str) -> Result<&'a str> {
    if record.len() != width {
        return Err(ContainerError::MalformedHeader(format!(
            "{kind} record must be {width} bytes, got {}",
            record.len()
        )));
    }
    if record[width - 1] != TERMINATOR {
        return Err(ContainerError::MalformedHeader(format!(
            "{kind} record is not newline-terminated"
        )));
    }

    std::str::from_utf8(&record[..width - 1])
        .map_err(|_| ContainerError::MalformedHeader(format!("{kind} record is not valid UTF-8")))
}

fn parse_decimal(field: &str, what: &str) -> Result<u64> {
    // `u64::from_str` would also take a leading '+'
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ContainerError::MalformedHeader(format!(
            "{what} {field:?} is not a non-negative integer"
        )));
    }

    field.parse().map_err(|_| {
        ContainerError::MalformedHeader(format!("{what} {field:?} does not fit in 64 bits"))
    })
}

fn validate_encodable_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '\0') {
        return Err(ContainerError::InvalidEntryName(name.to_string()));
    }
    Ok(())
}

/// Names are joined onto the extraction directory, so they must stay a
/// single plain path component.
fn validate_decoded_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(ContainerError::MalformedHeader(format!(
            "entry name {name:?} is not a plain file name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_block_len() {
        assert_eq!(header_block_len(0), 32);
        assert_eq!(header_block_len(1), 128);
        assert_eq!(header_block_len(10), 32 + 960);
    }

    #[test]
    fn test_encode_count_layout() {
        let record = encode_count(2);
        assert_eq!(record.len(), COUNT_RECORD_SIZE);
        assert_eq!(record[0], b'2');
        assert!(record[1..31].iter().all(|&b| b == b' '));
        assert_eq!(record[31], b'\n');
    }

    #[test]
    fn test_encode_count_max() {
        let record = encode_count(u64::MAX);
        assert_eq!(decode_count(&record).unwrap(), u64::MAX);
    }

    #[test]
    fn test_encode_entry_layout() {
        let record = encode_entry(&EntryRecord::new("a.log", 224, 13)).unwrap();
        assert_eq!(record.len(), ENTRY_RECORD_SIZE);
        assert!(record.starts_with(b"a.log 224 13 "));
        assert_eq!(record[95], b'\n');
        assert_eq!(record.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn test_encode_entry_exact_fit() {
        // "x...x 1 1" = name + 4 bytes
        let name = "x".repeat(MAX_ENTRY_TEXT_LEN - 4);
        let record = encode_entry(&EntryRecord::new(name.clone(), 1, 1)).unwrap();
        assert_eq!(record[94], b'1');
        assert_eq!(decode_entry(&record).unwrap().name, name);
    }

    #[test]
    fn test_encode_entry_overflow() {
        let name = "x".repeat(MAX_ENTRY_TEXT_LEN - 3);
        let err = encode_entry(&EntryRecord::new(name, 1, 1)).unwrap_err();
        match err {
            ContainerError::RecordOverflow { len, .. } => assert_eq!(len, 96),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_encode_entry_overflow_from_offsets() {
        // Fits with small numbers, overflows once offsets grow
        let name = "n".repeat(80);
        assert!(encode_entry(&EntryRecord::new(name.clone(), 1, 1)).is_ok());
        assert!(matches!(
            encode_entry(&EntryRecord::new(name, u64::MAX, u64::MAX)),
            Err(ContainerError::RecordOverflow { .. })
        ));
    }

    #[test]
    fn test_encode_entry_rejects_whitespace() {
        for name in ["has space.log", "tab\t.log", "", "new\nline"] {
            assert!(matches!(
                encode_entry(&EntryRecord::new(name, 0, 0)),
                Err(ContainerError::InvalidEntryName(_))
            ));
        }
    }

    #[test]
    fn test_decode_count_rejects_placeholder() {
        let placeholder = [0u8; COUNT_RECORD_SIZE];
        assert!(matches!(
            decode_count(&placeholder),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_decode_count_rejects_non_numeric() {
        let mut record = [b' '; COUNT_RECORD_SIZE];
        record[..2].copy_from_slice(b"-1");
        record[31] = b'\n';
        assert!(decode_count(&record).is_err());

        record[..2].copy_from_slice(b"+1");
        assert!(decode_count(&record).is_err());

        let blank = {
            let mut r = [b' '; COUNT_RECORD_SIZE];
            r[31] = b'\n';
            r
        };
        assert!(decode_count(&blank).is_err());
    }

    #[test]
    fn test_decode_entry_rejects_bad_fields() {
        let mut record = [b' '; ENTRY_RECORD_SIZE];
        record[95] = b'\n';

        let text = b"a.log abc 5";
        record[..text.len()].copy_from_slice(text);
        assert!(matches!(
            decode_entry(&record),
            Err(ContainerError::MalformedHeader(_))
        ));

        let text = b"a.log 12";
        let mut short = [b' '; ENTRY_RECORD_SIZE];
        short[95] = b'\n';
        short[..text.len()].copy_from_slice(text);
        assert!(decode_entry(&short).is_err());
    }

    #[test]
    fn test_decode_entry_rejects_traversal() {
        for name in ["..", ".", "../escape", "dir/file"] {
            let mut record = [b' '; ENTRY_RECORD_SIZE];
            record[95] = b'\n';
            let text = format!("{name} 32 4");
            record[..text.len()].copy_from_slice(text.as_bytes());
            assert!(
                matches!(decode_entry(&record), Err(ContainerError::MalformedHeader(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_header_block_encode_decode() {
        let block = HeaderBlock::new(vec![
            EntryRecord::new("b.log", 224, 13),
            EntryRecord::new("a.log", 237, 13),
        ]);
        let bytes = block.encode().unwrap();
        assert_eq!(bytes.len() as u64, header_block_len(2));
        assert!(bytes.starts_with(b"2 "));

        let decoded = decode_header(&bytes).unwrap();
        assert_eq!(decoded, block);
        // Order is preserved, not sorted
        assert_eq!(decoded.entries()[0].name, "b.log");
    }

    #[test]
    fn test_decode_header_ignores_payload() {
        let block = HeaderBlock::new(vec![EntryRecord::new("a.log", 128, 3)]);
        let mut bytes = block.encode().unwrap();
        bytes.extend_from_slice(&[0xAB, 0xCD, 0xEF]);
        assert_eq!(decode_header(&bytes).unwrap(), block);
    }

    #[test]
    fn test_decode_header_truncated() {
        let block = HeaderBlock::new(vec![
            EntryRecord::new("a.log", 224, 1),
            EntryRecord::new("b.log", 225, 1),
        ]);
        let bytes = block.encode().unwrap();
        assert!(matches!(
            decode_header(&bytes[..bytes.len() - 1]),
            Err(ContainerError::MalformedHeader(_))
        ));
        assert!(decode_header(&bytes[..10]).is_err());
    }

    #[test]
    fn test_decode_header_huge_count() {
        let record = encode_count(u64::MAX);
        assert!(matches!(
            decode_header(&record),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_empty_header() {
        let bytes = HeaderBlock::default().encode().unwrap();
        assert_eq!(bytes.len(), COUNT_RECORD_SIZE);
        assert_eq!(decode_header(&bytes).unwrap().count(), 0);
    }

    #[test]
    fn test_entry_range() {
        let entry = EntryRecord::new("a.log", 100, 20);
        assert_eq!(entry.range(), Some(100..120));
        assert_eq!(EntryRecord::new("a.log", u64::MAX, 1).end(), None);
    }
}
