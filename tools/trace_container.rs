// SPDX-License-Identifier: MIT
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trace_container::{
    trace_dir::{default_container_name, ensure_trace_dir, prepare_target_dir, DEFAULT_TARGET_DIR},
    CodecConfig, ContainerReader, ContainerWriter,
};

#[derive(Parser)]
#[command(name = "trace-container", version, about = "Pack and unpack diagnostics trace directories")]
struct Cli {
    /// Log every entry as it is processed
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress the specified trace directory
    Compress {
        trace: PathBuf,

        /// Container file to write (default: <trace>.trc)
        #[arg(long)]
        location: Option<PathBuf>,

        /// zlib compression level, 0-9
        #[arg(long)]
        level: Option<u32>,
    },

    /// Decompress the specified container into a trace directory
    Decompress {
        container: PathBuf,

        /// Directory to extract into (default: ./_tracelog)
        #[arg(long)]
        location: Option<PathBuf>,
    },

    /// List the entries of a container
    List {
        container: PathBuf,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = CodecConfig::from_env();

    match cli.command {
        Command::Compress {
            trace,
            location,
            level,
        } => {
            if let Some(level) = level {
                config = config.with_compression_level(level);
            }
            config.validate()?;

            let trace_dir = ensure_trace_dir(&trace)?;
            let container = location.unwrap_or_else(|| default_container_name(&trace_dir));

            let start = Instant::now();
            let summary = ContainerWriter::with_config(config)
                .compress(&trace_dir, &container)
                .with_context(|| format!("failed to compress {}", trace_dir.display()))?;

            println!(
                "Compressed {} entries ({} bytes -> {} bytes) into {}.",
                summary.header.count(),
                summary.bytes_read,
                summary.container_len,
                container.display()
            );
            println!(
                "Completed compression in {:.3}s.",
                start.elapsed().as_secs_f64()
            );
        }

        Command::Decompress {
            container,
            location,
        } => {
            config.validate()?;
            let target = location.unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR));
            let target = prepare_target_dir(&target)
                .context("skipping decompression to avoid any accidental data loss")?;

            let start = Instant::now();
            let summary = ContainerReader::open_with_config(&container, config)
                .and_then(|reader| reader.extract_all(&target))
                .with_context(|| format!("failed to decompress {}", container.display()))?;

            println!(
                "Extracted {} entries ({} bytes) into {}.",
                summary.entries,
                summary.bytes_written,
                target.display()
            );
            println!(
                "Completed decompression in {:.3}s.",
                start.elapsed().as_secs_f64()
            );
        }

        Command::List { container, json } => {
            let reader = ContainerReader::open_with_config(&container, config)
                .with_context(|| format!("failed to read {}", container.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(reader.entries())?);
            } else {
                let stats = reader.stats();
                println!(
                    "{}: {} entries, {} bytes",
                    container.display(),
                    stats.entry_count,
                    stats.container_len
                );
                for entry in reader.entries() {
                    println!("    {} (offset {}, {} bytes)", entry.name, entry.start, entry.length);
                }
            }
        }
    }

    Ok(())
}
