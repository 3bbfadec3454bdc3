mod cli;
mod commands;
mod downloader;
mod error;
mod providers;
mod selection;
mod state;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressDrawTarget;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::cli::CollisionMode;
use crate::commands::RunOptions;
use crate::downloader::Downloader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model page URL, e.g. https://huggingface.co/runwayml/stable-diffusion-v1-5 (prompted for if omitted)
    #[arg(index = 1)]
    url: Option<String>,

    /// Numbers of the files to download, separated by spaces (prompted for if omitted)
    #[arg(short = 's', long)]
    select: Option<String>,

    /// Directory that receives one folder per model [default: ../Downloaded models]
    #[arg(short = 'd', long = "download-dir")]
    download_dir: Option<PathBuf>,

    /// Maximum number of concurrent downloads (defaults to number of logical CPUs)
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Revision/branch whose file tree is listed
    #[arg(short = 'b', long = "branch", default_value = "main")]
    branch: String,

    /// How to name selected files that share a basename
    #[arg(long = "on-collision", value_enum, default_value = "rename")]
    on_collision: CollisionMode,

    /// Only print the list of available files
    #[arg(short = 'l', long, requires = "url")]
    list: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);
    debug!(?args, "CLI arguments parsed");

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let download_root = match &args.download_dir {
        Some(dir) if dir.is_relative() => cwd.join(dir),
        Some(dir) => dir.clone(),
        None => crate::utils::default_download_root(&cwd),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if args.list {
            let url = args.url.as_deref().unwrap_or_default();
            return crate::commands::list_files(url, &args.branch).await;
        }

        let concurrency = args.concurrency.unwrap_or_else(num_cpus::get);
        let downloader = Arc::new(Downloader::new(
            concurrency,
            ProgressDrawTarget::stderr_with_hz(5),
        ));

        crate::commands::run_downloads(
            RunOptions {
                url: args.url.clone(),
                selection: args.select.clone(),
                download_root,
                branch: args.branch.clone(),
                on_collision: args.on_collision,
            },
            downloader,
        )
        .await
        .map(|_| ())
    })
}

/// `RUST_LOG` wins; otherwise the -q/-v flags pick the level.
fn init_tracing(args: &Args) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
