//! offsetlog CLI
//!
//! Command-line tools for offset logs.
//!
//! # Commands
//!
//! - `example` - Append the demonstration values and print their offsets
//! - `append` - Append one JSON value
//! - `get` - Print the value at an offset (read-only)
//! - `dump` - Print records in order or in reverse (read-only)
//! - `verify` - Check every frame without modifying the file

mod commands;

use clap::{Parser, Subcommand};
use offsetlog_core::CodecKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// offsetlog command-line tools.
#[derive(Parser)]
#[command(name = "offsetlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log file
    #[arg(global = true, short, long, default_value = "offsetlog.log")]
    path: PathBuf,

    /// Record codec (cbor, json)
    #[arg(global = true, short, long, default_value = "cbor")]
    codec: CodecKind,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append the demonstration values in order
    Example,

    /// Append one value given as JSON
    Append {
        /// The value, as JSON text
        json: String,
    },

    /// Print the value stored at an offset
    Get {
        /// Offset of the record
        offset: u64,
    },

    /// Print records
    Dump {
        /// Start from this offset
        #[arg(long)]
        from: Option<u64>,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Newest first
        #[arg(short, long)]
        reverse: bool,

        /// Wait at the end of the log instead of stopping
        #[arg(short, long, conflicts_with = "reverse")]
        follow: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify log integrity
    Verify,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Example => commands::example::run(&cli.path, cli.codec)?,
        Commands::Append { json } => commands::append::run(&cli.path, cli.codec, &json)?,
        Commands::Get { offset } => commands::get::run(&cli.path, cli.codec, offset)?,
        Commands::Dump {
            from,
            limit,
            reverse,
            follow,
            format,
        } => {
            let options = commands::dump::DumpOptions {
                from,
                limit,
                reverse,
                follow,
            };
            commands::dump::run(&cli.path, cli.codec, &options, &format)?;
        }
        Commands::Verify => commands::verify::run(&cli.path)?,
    }

    Ok(())
}
