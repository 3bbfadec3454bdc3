use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::cli::CollisionMode;
use crate::error::Error;

pub const DOWNLOAD_ROOT_NAME: &str = "Downloaded models";

pub fn http_client() -> Client {
    Client::builder()
        .user_agent(concat!("hfdl/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub fn get_filename_from_url(url_str: &str) -> Result<String, Error> {
    let url = Url::parse(url_str).map_err(|source| Error::InvalidUrl {
        url: url_str.to_string(),
        source,
    })?;

    if let Some(filename) = url.path_segments().and_then(|mut s| s.next_back()) {
        if !filename.is_empty() {
            return Ok(filename.to_string());
        }
    }

    // Fallback if no filename found in path
    Ok(format!("download_{}", uuid::Uuid::new_v4()))
}

/// `<parent of cwd>/Downloaded models`, or `<cwd>/Downloaded models` at the filesystem root.
pub fn default_download_root(cwd: &Path) -> PathBuf {
    cwd.parent().unwrap_or(cwd).join(DOWNLOAD_ROOT_NAME)
}

/// Maps every URL to a file path inside `dir`, named after the URL's basename.
pub fn plan_destinations(
    urls: &[String],
    dir: &Path,
    mode: CollisionMode,
) -> Result<Vec<PathBuf>, Error> {
    let mut claimed = HashSet::new();
    let mut paths = Vec::with_capacity(urls.len());

    for url in urls {
        let filename = get_filename_from_url(url)?;
        let filename = match mode {
            CollisionMode::Overwrite => filename,
            CollisionMode::Rename => unique_filename(&claimed, &filename),
        };
        claimed.insert(filename.clone());
        paths.push(dir.join(filename));
    }

    Ok(paths)
}

fn unique_filename(claimed: &HashSet<String>, filename: &str) -> String {
    if !claimed.contains(filename) {
        return filename.to_string();
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = if extension.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, extension)
        };
        if !claimed.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_url_basename() {
        let name = get_filename_from_url(
            "https://huggingface.co/runwayml/stable-diffusion-v1-5/resolve/main/v1-5-pruned.ckpt",
        )
        .unwrap();
        assert_eq!(name, "v1-5-pruned.ckpt");
    }

    #[test]
    fn filename_falls_back_when_path_is_empty() {
        let name = get_filename_from_url("https://example.com/").unwrap();
        assert!(name.starts_with("download_"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = get_filename_from_url("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn download_root_sits_next_to_working_directory() {
        let root = default_download_root(Path::new("/home/me/tools"));
        assert_eq!(root, PathBuf::from("/home/me/Downloaded models"));

        let root = default_download_root(Path::new("/"));
        assert_eq!(root, PathBuf::from("/Downloaded models"));
    }

    #[test]
    fn colliding_basenames_are_renamed() {
        let urls = vec![
            "https://h/a/resolve/main/model.bin".to_string(),
            "https://h/a/resolve/main/sub/model.bin".to_string(),
            "https://h/a/resolve/main/other/model.bin".to_string(),
            "https://h/a/resolve/main/config.yaml".to_string(),
        ];
        let dir = Path::new("/out");

        let paths = plan_destinations(&urls, dir, CollisionMode::Rename).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.join("model.bin"),
                dir.join("model_1.bin"),
                dir.join("model_2.bin"),
                dir.join("config.yaml"),
            ]
        );

        let paths = plan_destinations(&urls, dir, CollisionMode::Overwrite).unwrap();
        assert_eq!(paths[0], paths[1]);
        assert_eq!(paths[1], paths[2]);
    }
}
