pub mod huggingface;

use std::collections::HashSet;

use url::Url;

use crate::error::Error;

/// File suffixes worth offering for download.
pub const MODEL_EXTENSIONS: [&str; 5] = [".ckpt", ".safetensors", ".yaml", ".bin", ".pt"];

pub fn has_model_extension(path: &str) -> bool {
    MODEL_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// A model page the user pointed us at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRef {
    /// Last path segment of the model URL; names the destination folder.
    pub name: String,
    /// Page that lists the model's files.
    pub listing_url: String,
}

impl ModelRef {
    /// `https://host/org/model` lists `https://host/org/model/tree/<branch>`.
    /// URLs already pointing at a `<model>/tree/<rev>` page are listed as given.
    pub fn from_url(input: &str, branch: &str) -> Result<Self, Error> {
        let input = input.trim();
        let mut url = Url::parse(input).map_err(|source| Error::InvalidUrl {
            url: input.to_string(),
            source,
        })?;
        url.set_query(None);
        url.set_fragment(None);

        let segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        if let Some(pos) = segments.iter().position(|seg| seg == "tree") {
            if pos > 0 && pos + 1 < segments.len() {
                return Ok(Self {
                    name: segments[pos - 1].clone(),
                    listing_url: url.to_string(),
                });
            }
        }

        let name = segments
            .last()
            .cloned()
            .or_else(|| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "model".to_string());
        let listing_url = format!(
            "{}/tree/{}",
            url.as_str().trim_end_matches('/'),
            branch
        );

        Ok(Self { name, listing_url })
    }
}

/// Drops repeated URLs, keeping the first occurrence of each.
pub fn dedup_links(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(links.len());
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}
