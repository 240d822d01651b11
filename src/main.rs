mod commands;
mod core;
mod error;
mod types;
mod utils;

use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::types::{DirOptions, FileOptions, RepackOptions, TranscodeConfig};

#[derive(Parser)]
#[command(
    name = "cbzpack",
    version,
    about = "Repack comic archives with their pages transcoded to lossy WebP"
)]
struct Cli {
    /// Log per-entry details (RUST_LOG takes precedence)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repack a single archive
    File {
        input: PathBuf,

        #[command(flatten)]
        transcode: TranscodeArgs,
    },

    /// Repack every archive directly inside a directory
    Dir {
        dir: PathBuf,

        /// Archives processed at once [default: available parallelism]
        #[arg(short = 'j', long)]
        jobs: Option<NonZeroUsize>,

        #[command(flatten)]
        transcode: TranscodeArgs,
    },
}

#[derive(Args)]
struct TranscodeArgs {
    /// WebP quality, 0-100
    #[arg(short = 'q', long, default_value = "75", allow_negative_numbers = true)]
    quality: i32,

    /// Maximum page height in pixels, -1 to keep the original size
    #[arg(short = 'm', long, default_value = "-1", allow_negative_numbers = true, value_parser = parse_max_height)]
    max_height: MaxHeight,

    /// Copy entries that are not page images into the output unchanged
    #[arg(long)]
    keep_other: bool,

    /// Print the result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Hide progress bars and the summary
    #[arg(long)]
    quiet: bool,
}

#[derive(Clone, Copy)]
struct MaxHeight(Option<u32>);

fn parse_max_height(value: &str) -> Result<MaxHeight, String> {
    match value.parse::<i64>() {
        Ok(-1) => Ok(MaxHeight(None)),
        Ok(height) if height > 0 && height <= u32::MAX as i64 => Ok(MaxHeight(Some(height as u32))),
        Ok(_) => Err("must be -1 or a positive number of pixels".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

impl TranscodeArgs {
    fn config(&self) -> TranscodeConfig {
        TranscodeConfig {
            quality: self.quality,
            max_height: self.max_height.0,
        }
    }

    fn repack(&self) -> RepackOptions {
        RepackOptions {
            keep_other_entries: self.keep_other,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "cbzpack=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::File { input, transcode } => commands::file::repack_file(&FileOptions {
            input,
            config: transcode.config(),
            repack: transcode.repack(),
            json: transcode.json,
            quiet: transcode.quiet,
        })
        .map(|_| ()),
        Commands::Dir {
            dir,
            jobs,
            transcode,
        } => commands::dir::repack_dir(&DirOptions {
            dir,
            config: transcode.config(),
            repack: transcode.repack(),
            jobs: jobs.map(NonZeroUsize::get),
            json: transcode.json,
            quiet: transcode.quiet,
        })
        .map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}
