// SPDX-License-Identifier: MIT
//! Container reader: parses the header block and extracts entries

use crate::config::CodecConfig;
use crate::error::{ContainerError, IoResultExt, Result};
use crate::format::{
    announced_block_len, decode_count, decode_header, EntryRecord, HeaderBlock, COUNT_RECORD_SIZE,
};
use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reader for trace containers
///
/// Opening a reader parses and validates the whole header block; payloads
/// are only touched by the extract methods.
#[derive(Debug)]
pub struct ContainerReader {
    path: PathBuf,
    header: HeaderBlock,
    container_len: u64,
    config: CodecConfig,
}

impl ContainerReader {
    /// Open a container and parse its header
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, CodecConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let mut file = File::open(&path).at(&path)?;
        let container_len = file.metadata().at(&path)?.len();
        let header = read_header(&mut file, &path, container_len)?;
        validate_ranges(&header, container_len)?;

        debug!(
            container = %path.display(),
            entries = header.count(),
            container_len,
            "Parsed container header"
        );

        Ok(Self {
            path,
            header,
            container_len,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &HeaderBlock {
        &self.header
    }

    pub fn entries(&self) -> &[EntryRecord] {
        self.header.entries()
    }

    /// Look up an entry by name
    pub fn entry(&self, name: &str) -> Option<&EntryRecord> {
        self.entries().iter().find(|e| e.name == name)
    }

    /// Inflate one entry into `dest_dir/<name>`, returning the bytes written.
    pub fn extract_entry(&self, entry: &EntryRecord, dest_dir: &Path) -> Result<u64> {
        let mut container = File::open(&self.path).at(&self.path)?;
        container
            .seek(SeekFrom::Start(entry.start))
            .at(&self.path)?;

        // Bounded view over [start, start + length)
        let payload =
            BufReader::with_capacity(self.config.buffer_size, container).take(entry.length);
        let mut decoder = ZlibDecoder::new(payload);

        let dest_path = dest_dir.join(&entry.name);
        let dest = File::create(&dest_path).at(&dest_path)?;
        let mut out = BufWriter::with_capacity(self.config.buffer_size, dest);

        let partial = |e: io::Error| ContainerError::PartialWrite {
            name: entry.name.clone(),
            source: e,
        };
        let written = io::copy(&mut decoder, &mut out).map_err(partial)?;
        out.flush().map_err(partial)?;

        debug!(
            name = %entry.name,
            start = entry.start,
            length = entry.length,
            written,
            "Extracted entry"
        );
        Ok(written)
    }

    /// Extract every entry into `dest_dir`, in header order.
    ///
    /// Stops at the first failure; files extracted before it stay in place.
    pub fn extract_all(&self, dest_dir: &Path) -> Result<ExtractSummary> {
        info!(
            container = %self.path.display(),
            dest = %dest_dir.display(),
            entries = self.header.count(),
            "Extracting container"
        );

        let mut summary = ExtractSummary::default();
        for entry in self.entries() {
            let written = self.extract_entry(entry, dest_dir).inspect_err(|e| {
                warn!(name = %entry.name, error = %e, "Extraction aborted")
            })?;
            summary.entries += 1;
            summary.bytes_written += written;
        }

        info!(
            entries = summary.entries,
            bytes_written = summary.bytes_written,
            "Extraction complete"
        );
        Ok(summary)
    }

    /// Get container statistics
    pub fn stats(&self) -> ContainerStats {
        let header_len = self.header.encoded_len();
        ContainerStats {
            entry_count: self.header.count(),
            header_len,
            payload_len: self.entries().iter().map(|e| e.length).sum(),
            container_len: self.container_len,
        }
    }
}

/// Extract `container_path` into the existing directory `dest_dir`.
pub fn decompress(container_path: &Path, dest_dir: &Path) -> Result<ExtractSummary> {
    ContainerReader::open(container_path)?.extract_all(dest_dir)
}

/// Outcome of a successful extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub entries: usize,
    pub bytes_written: u64,
}

/// Container statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    pub entry_count: usize,
    pub header_len: u64,
    /// Sum of compressed payload lengths
    pub payload_len: u64,
    pub container_len: u64,
}

impl ContainerStats {
    /// Share of the container taken by the header block
    pub fn header_overhead(&self) -> f64 {
        if self.container_len == 0 {
            return 0.0;
        }
        self.header_len as f64 / self.container_len as f64
    }
}

/// Read the count record, then exactly the header block it announces.
fn read_header(file: &mut File, path: &Path, container_len: u64) -> Result<HeaderBlock> {
    if container_len < COUNT_RECORD_SIZE as u64 {
        return Err(ContainerError::MalformedHeader(format!(
            "container is {container_len} bytes, shorter than the count record"
        )));
    }

    let mut count_record = [0u8; COUNT_RECORD_SIZE];
    file.read_exact(&mut count_record).at(path)?;
    let count = decode_count(&count_record)?;

    let block_len = announced_block_len(count)?;
    if block_len > container_len {
        return Err(ContainerError::MalformedHeader(format!(
            "header block for {count} entries needs {block_len} bytes, container has {container_len}"
        )));
    }

    let mut block = vec![0u8; block_len as usize];
    block[..COUNT_RECORD_SIZE].copy_from_slice(&count_record);
    file.read_exact(&mut block[COUNT_RECORD_SIZE..]).at(path)?;

    decode_header(&block)
}

/// Every payload range must sit between the header block and end of file.
fn validate_ranges(header: &HeaderBlock, container_len: u64) -> Result<()> {
    let payload_start = header.encoded_len();
    for entry in header.entries() {
        let in_bounds = entry
            .end()
            .is_some_and(|end| entry.start >= payload_start && end <= container_len);
        if !in_bounds {
            return Err(ContainerError::MalformedHeader(format!(
                "entry '{}' range {}+{} lies outside the payload region [{payload_start}, {container_len})",
                entry.name, entry.start, entry.length
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{encode_count, header_block_len};
    use crate::writer::compress;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_container(dir: &TempDir) -> PathBuf {
        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.log"), b"hello").unwrap();
        fs::write(source.join("b.log"), b"world").unwrap();

        let container = dir.path().join("trace.trc");
        compress(&source, &container).unwrap();
        container
    }

    #[test]
    fn test_open_reads_entries() {
        let dir = TempDir::new().unwrap();
        let reader = ContainerReader::open(create_test_container(&dir)).unwrap();

        assert_eq!(reader.header().count(), 2);
        assert!(reader.entry("a.log").is_some());
        assert!(reader.entry("missing.log").is_none());
    }

    #[test]
    fn test_extract_single_entry() {
        let dir = TempDir::new().unwrap();
        let reader = ContainerReader::open(create_test_container(&dir)).unwrap();
        let dest = TempDir::new().unwrap();

        let entry = reader.entry("b.log").unwrap().clone();
        let written = reader.extract_entry(&entry, dest.path()).unwrap();

        assert_eq!(written, 5);
        assert_eq!(fs::read(dest.path().join("b.log")).unwrap(), b"world");
        assert!(!dest.path().join("a.log").exists());
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let reader = ContainerReader::open(create_test_container(&dir)).unwrap();

        let stats = reader.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.header_len, header_block_len(2));
        assert_eq!(stats.header_len + stats.payload_len, stats.container_len);
        assert!(stats.header_overhead() > 0.0 && stats.header_overhead() < 1.0);
    }

    #[test]
    fn test_placeholder_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("placeholder.trc");
        fs::write(&path, vec![0u8; header_block_len(3) as usize]).unwrap();

        assert!(matches!(
            ContainerReader::open(&path),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_too_small_container() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.trc");
        fs::write(&path, b"1").unwrap();

        assert!(matches!(
            ContainerReader::open(&path),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_count_beyond_file_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.trc");
        fs::write(&path, encode_count(1_000_000)).unwrap();

        assert!(matches!(
            ContainerReader::open(&path),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_range_past_end_is_rejected() {
        let dir = TempDir::new().unwrap();
        let container = create_test_container(&dir);
        let bytes = fs::read(&container).unwrap();
        fs::write(&container, &bytes[..bytes.len() - 1]).unwrap();

        assert!(matches!(
            ContainerReader::open(&container),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_range_inside_header_is_rejected() {
        let header = HeaderBlock::new(vec![EntryRecord::new("a.log", 0, 4)]);
        assert!(validate_ranges(&header, 1024).is_err());

        let header = HeaderBlock::new(vec![EntryRecord::new("a.log", u64::MAX, 4)]);
        assert!(validate_ranges(&header, u64::MAX).is_err());
    }

    #[test]
    fn test_corrupt_payload_is_partial_write() {
        let dir = TempDir::new().unwrap();
        let container = create_test_container(&dir);
        let reader = ContainerReader::open(&container).unwrap();
        let start = reader.entry("a.log").unwrap().start as usize;

        // Break the zlib stream header of the first entry
        let mut bytes = fs::read(&container).unwrap();
        bytes[start] = 0xFF;
        bytes[start + 1] = 0xFF;
        fs::write(&container, &bytes).unwrap();

        let dest = TempDir::new().unwrap();
        let err = decompress(&container, dest.path()).unwrap_err();
        assert!(matches!(err, ContainerError::PartialWrite { ref name, .. } if name == "a.log"));
    }

    #[test]
    fn test_missing_destination() {
        let dir = TempDir::new().unwrap();
        let container = create_test_container(&dir);

        let err = decompress(&container, &dir.path().join("does-not-exist")).unwrap_err();
        assert!(matches!(err, ContainerError::Io { .. }));
    }
}
