// SPDX-License-Identifier: MIT
//! Container writer: packs a flat trace directory into one container file
//!
//! The header block is reserved up front as a zero-filled placeholder, each
//! source file is deflated and appended in turn, and the real header is
//! written over the placeholder once every entry is known. A failed run leaves
//! the placeholder in place, which readers reject.

use crate::config::CodecConfig;
use crate::error::{ContainerError, IoResultExt, Result};
use crate::format::{encode_entry, header_block_len, EntryRecord, HeaderBlock};
use flate2::write::ZlibEncoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a successful [`ContainerWriter::compress`] run
#[derive(Debug, Clone)]
pub struct CompressSummary {
    /// Header written to the container, in container order
    pub header: HeaderBlock,
    /// Uncompressed bytes read from the source directory
    pub bytes_read: u64,
    /// Final container length
    pub container_len: u64,
}

impl CompressSummary {
    /// Compressed payload bytes over uncompressed bytes (0.0 for empty input)
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_read == 0 {
            return 0.0;
        }
        let payload = self.container_len - self.header.encoded_len();
        payload as f64 / self.bytes_read as f64
    }
}

/// A source file queued for compression
#[derive(Debug, Clone)]
struct SourceFile {
    name: String,
    path: PathBuf,
}

/// Writer for trace containers
#[derive(Debug, Clone, Default)]
pub struct ContainerWriter {
    config: CodecConfig,
}

impl ContainerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Compress every top-level file of `source_dir` into `container_path`.
    ///
    /// `container_path` is created or truncated. On error the file is left
    /// with a placeholder header and the caller owns cleanup.
    pub fn compress(&self, source_dir: &Path, container_path: &Path) -> Result<CompressSummary> {
        self.config.validate()?;

        let sources = list_source_files(source_dir)?;
        info!(
            source = %source_dir.display(),
            container = %container_path.display(),
            entries = sources.len(),
            "Compressing trace directory"
        );

        let summary = self
            .write_container(&sources, container_path)
            .inspect_err(|e| {
                warn!(container = %container_path.display(), error = %e, "Compression aborted")
            })?;

        info!(
            entries = summary.header.count(),
            bytes_read = summary.bytes_read,
            container_len = summary.container_len,
            "Compression complete"
        );
        Ok(summary)
    }

    fn write_container(
        &self,
        sources: &[SourceFile],
        container_path: &Path,
    ) -> Result<CompressSummary> {
        let header_len = header_block_len(sources.len());

        let mut container = File::create(container_path).at(container_path)?;
        io::copy(&mut io::repeat(0).take(header_len), &mut container).at(container_path)?;

        let mut out = BufWriter::with_capacity(self.config.buffer_size, container);
        let mut cursor = header_len;
        let mut entries = Vec::with_capacity(sources.len());
        let mut bytes_read = 0u64;

        // Strictly sequential: each start offset is the running total so far
        for source in sources {
            let (read, length) = self.append_entry(source, &mut out)?;
            let entry = EntryRecord::new(source.name.clone(), cursor, length);
            debug!(name = %entry.name, start = entry.start, length, raw = read, "Appended entry");

            cursor += length;
            bytes_read += read;
            entries.push(entry);
        }

        let mut container = out
            .into_inner()
            .map_err(io::IntoInnerError::into_error)
            .at(container_path)?;

        let header = HeaderBlock::new(entries);
        let header_bytes = header.encode()?;
        debug_assert_eq!(header_bytes.len() as u64, header_len);

        container.seek(SeekFrom::Start(0)).at(container_path)?;
        container.write_all(&header_bytes).at(container_path)?;
        container.flush().at(container_path)?;
        drop(container);

        Ok(CompressSummary {
            header,
            bytes_read,
            container_len: cursor,
        })
    }

    /// Deflate one source file onto the end of the container.
    ///
    /// Returns `(uncompressed bytes read, compressed bytes written)`.
    fn append_entry<W: Write>(&self, source: &SourceFile, out: &mut W) -> Result<(u64, u64)> {
        let file = File::open(&source.path).at(&source.path)?;
        let mut input = BufReader::with_capacity(self.config.buffer_size, file);

        let partial = |e: io::Error| ContainerError::PartialWrite {
            name: source.name.clone(),
            source: e,
        };

        let mut encoder = ZlibEncoder::new(CountingWriter::new(out), self.config.compression());
        let read = io::copy(&mut input, &mut encoder).map_err(partial)?;
        let counter = encoder.finish().map_err(partial)?;

        Ok((read, counter.written))
    }
}

/// Compress `source_dir` into `container_path` with the default configuration.
pub fn compress(source_dir: &Path, container_path: &Path) -> Result<CompressSummary> {
    ContainerWriter::new().compress(source_dir, container_path)
}

/// List the top-level files of `dir`, sorted by name.
///
/// Names that can never fit in a header record are rejected here, before any
/// payload is written.
fn list_source_files(dir: &Path) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::new();

    for dir_entry in fs::read_dir(dir).at(dir)? {
        let dir_entry = dir_entry.at(dir)?;
        let path = dir_entry.path();

        let metadata = fs::metadata(&path).at(&path)?;
        if !metadata.is_file() {
            return Err(ContainerError::UnsupportedEntry(path));
        }

        let name = dir_entry.file_name().into_string().map_err(|raw| {
            ContainerError::InvalidEntryName(raw.to_string_lossy().into_owned())
        })?;
        encode_entry(&EntryRecord::new(name.clone(), 0, 0))?;

        sources.push(SourceFile { name, path });
    }

    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sources)
}

/// Pass-through writer that counts the bytes accepted by the inner writer
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
