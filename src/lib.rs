// SPDX-License-Identifier: MIT
//! # Trace Container
//!
//! Packs a flat directory of diagnostics log files into a single container
//! file and unpacks it again.
//!
//! ## Format Specification
//!
//! ```text
//! Trace Container (.trc)
//! ======================
//!
//! Header block (32 + 96 * N bytes, ASCII):
//! - Count record: entry count, left-justified, space-padded, '\n' at byte 31
//! - N entry records: "<name> <start> <length>", space-padded, '\n' at byte 95
//!   start/length are absolute byte offsets/lengths into the container
//!
//! Payload (variable size):
//! - One standalone zlib stream per entry, concatenated in header order
//! ```
//!
//! The header length depends only on the entry count. The writer reserves it
//! as a zero-filled placeholder, appends every compressed payload, then writes
//! the real header over the placeholder. A container whose compression failed
//! keeps its placeholder and is rejected by [`ContainerReader`].
//!
//! There are no subdirectories, permissions, timestamps or in-place updates.
//! No two operations may target the same container path concurrently; the
//! codec does no locking of its own.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use trace_container::{compress, decompress};
//!
//! compress(Path::new("trace-run"), Path::new("trace-run.trc")).unwrap();
//! decompress(Path::new("trace-run.trc"), Path::new("_tracelog")).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod reader;
pub mod trace_dir;
pub mod writer;

// Re-export main types
pub use config::CodecConfig;
pub use error::{ContainerError, Result};
pub use format::{
    decode_header, encode_count, encode_entry, header_block_len, EntryRecord, HeaderBlock,
    COUNT_RECORD_SIZE, ENTRY_RECORD_SIZE,
};
pub use reader::{decompress, ContainerReader, ContainerStats, ExtractSummary};
pub use writer::{compress, CompressSummary, ContainerWriter};
