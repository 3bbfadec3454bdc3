use anyhow::{Context, Result};
use indicatif::HumanBytes;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::cli::CollisionMode;
use crate::downloader::Downloader;
use crate::error::Error;
use crate::providers::{self, huggingface, ModelRef};
use crate::selection::Selection;
use crate::state::{DownloadTask, TaskOutcome};
use crate::utils::{get_filename_from_url, http_client, plan_destinations};

pub const NO_FILES_MESSAGE: &str = "No valid model files found. Please check the URL and try again.";

pub struct RunOptions {
    /// Model page; asked for on stdin when absent.
    pub url: Option<String>,
    /// Selection string; asked for on stdin when absent.
    pub selection: Option<String>,
    pub download_root: PathBuf,
    pub branch: String,
    pub on_collision: CollisionMode,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Deduplicated links offered to the user.
    pub links: Vec<String>,
    pub destination: Option<PathBuf>,
    pub rejected: Vec<Error>,
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

pub async fn run_downloads(options: RunOptions, downloader: Arc<Downloader>) -> Result<BatchReport> {
    let url = match options.url {
        Some(url) => url,
        None => prompt("Please enter the URL of the model on Hugging Face (e.g. https://huggingface.co/runwayml/stable-diffusion-v1-5): ").await?,
    };

    let mut report = BatchReport::default();
    let Some((model, links)) = fetch_file_list(&url, &options.branch).await else {
        println!("{}", NO_FILES_MESSAGE);
        return Ok(report);
    };
    let destination = options.download_root.join(&model.name);
    report.destination = Some(destination.clone());
    report.links = links;

    println!("\nAvailable model files:");
    print_file_list(&report.links);

    let input = match options.selection {
        Some(selection) => selection,
        None => prompt("\nEnter the numbers of the files you want to download (separated by spaces): ").await?,
    };
    let selection = Selection::parse(&input, report.links.len());
    for err in &selection.rejected {
        eprintln!("Skipping selection: {}", err);
    }
    let urls: Vec<String> = selection.resolve(&report.links).into_iter().cloned().collect();
    report.rejected = selection.rejected;
    if urls.is_empty() {
        println!("No files selected.");
        return Ok(report);
    }

    fs::create_dir_all(&destination)
        .await
        .with_context(|| format!("Failed to create download directory {:?}", destination))?;

    let paths = plan_destinations(&urls, &destination, options.on_collision)?;
    let tasks: Vec<DownloadTask> = urls
        .into_iter()
        .zip(paths)
        .map(|(url, path)| DownloadTask::new(url, path))
        .collect();

    info!(files = tasks.len(), dir = %destination.display(), "Dispatching downloads");
    report.outcomes = downloader.download_all(tasks).await;

    let mut bytes = 0;
    for outcome in &report.outcomes {
        bytes += outcome.task.transferred;
        if let Some(err) = &outcome.error {
            eprintln!(
                "Error occurred while downloading {}: {}",
                outcome.task.file_name(),
                err
            );
        }
    }
    println!(
        "\nDone: {} completed, {} failed, {} written to {:?}",
        report.completed(),
        report.failed(),
        HumanBytes(bytes),
        destination
    );
    info!(
        completed = report.completed(),
        failed = report.failed(),
        bytes,
        "Batch finished"
    );

    Ok(report)
}

/// Prints the enumerated file list for a model without downloading anything.
pub async fn list_files(url: &str, branch: &str) -> Result<()> {
    match fetch_file_list(url, branch).await {
        Some((model, links)) => {
            println!("Available model files for {}:", model.name);
            print_file_list(&links);
        }
        None => println!("{}", NO_FILES_MESSAGE),
    }
    Ok(())
}

/// Resolves the model page and scrapes its file list. Any failure, or an
/// empty list, comes back as `None` after being reported.
async fn fetch_file_list(url: &str, branch: &str) -> Option<(ModelRef, Vec<String>)> {
    let model = match ModelRef::from_url(url, branch) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("{}", e);
            return None;
        }
    };

    let client = http_client();
    let links = match huggingface::extract_links(&client, &model.listing_url).await {
        Ok(links) => providers::dedup_links(links),
        Err(e) => {
            warn!(url = %model.listing_url, error = %e, "Could not read file list");
            eprintln!("{}", e);
            return None;
        }
    };

    if links.is_empty() {
        return None;
    }
    Some((model, links))
}

fn print_file_list(links: &[String]) {
    for (i, link) in links.iter().enumerate() {
        let name = get_filename_from_url(link).unwrap_or_else(|_| link.clone());
        println!("{}: {}", i + 1, name);
    }
}

async fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;

    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await?
    .context("Failed to read from stdin")?;

    Ok(line.trim().to_string())
}
