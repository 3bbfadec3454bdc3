use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use super::has_model_extension;
use crate::error::Error;

fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static ANCHOR_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<a\b[^>]*?\shref\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});
static HTML_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?s)<!--.*?-->"));

/// A model file link found on a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateLink {
    pub href: String,
    /// Direct-download ("resolve") URL.
    pub url: String,
}

impl CandidateLink {
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// Fetches a listing page and returns the download URL of every model file
/// it links to, in page order. Repeats are kept.
pub async fn extract_links(client: &Client, listing_url: &str) -> Result<Vec<String>, Error> {
    let base = Url::parse(listing_url).map_err(|source| Error::InvalidUrl {
        url: listing_url.to_string(),
        source,
    })?;

    let resp = client
        .get(base.clone())
        .send()
        .await
        .map_err(|e| Error::network(listing_url, e))?;
    if !resp.status().is_success() {
        return Err(Error::HttpStatus {
            url: listing_url.to_string(),
            status: resp.status().as_u16(),
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| Error::network(listing_url, e))?;
    let html = std::str::from_utf8(&body).map_err(|e| Error::Parse {
        url: listing_url.to_string(),
        reason: e.to_string(),
    })?;

    let links: Vec<String> = candidate_links(html, &base)
        .into_iter()
        .map(|link| {
            debug!(href = %link.href, file = link.file_name(), "Found model file");
            link.url
        })
        .collect();
    info!(url = %listing_url, links = links.len(), "Scanned listing page");

    Ok(links)
}

/// Scans every anchor in `html` for hrefs ending in a model file extension.
pub fn candidate_links(html: &str, base: &Url) -> Vec<CandidateLink> {
    let mut links = Vec::new();
    let html = HTML_COMMENT_RE.replace_all(html, "");

    for caps in ANCHOR_HREF_RE.captures_iter(&html) {
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let href = decode_entities(raw.as_str().trim());
        if !has_model_extension(&href) {
            continue;
        }

        match to_resolve_url(base, &href) {
            Some(url) => links.push(CandidateLink { href, url }),
            None => debug!(href = %href, "Skipping unresolvable href"),
        }
    }

    links
}

/// Joins `href` onto the hosting site and swaps `blob` (the viewer page)
/// for `resolve` (the raw file).
fn to_resolve_url(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href).ok()?;
    let path = url
        .path()
        .split('/')
        .map(|seg| if seg == "blob" { "resolve" } else { seg })
        .collect::<Vec<_>>()
        .join("/");
    url.set_path(&path);
    Some(url.to_string())
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn base() -> Url {
        Url::parse("https://huggingface.co/runwayml/stable-diffusion-v1-5/tree/main").unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
          <a href="/runwayml/stable-diffusion-v1-5/blob/main/v1-5-pruned.ckpt">v1-5-pruned.ckpt</a>
          <a class="file" title="download" href='/runwayml/stable-diffusion-v1-5/blob/main/unet/diffusion_pytorch_model.safetensors'>unet</a>
          <A HREF="/runwayml/stable-diffusion-v1-5/blob/main/v1-inference.yaml">yaml</A>
          <a href="/runwayml/stable-diffusion-v1-5/blob/main/model_index.json">json</a>
          <a href="/runwayml/stable-diffusion-v1-5/blob/main/README.md">readme</a>
          <a href="/runwayml/stable-diffusion-v1-5/resolve/main/text_encoder/pytorch_model.bin?download=true">bin</a>
          <a href="/runwayml/stable-diffusion-v1-5/blob/main/vae/diffusion_pytorch_model.pt">pt</a>
          <a name="anchor-without-href">nothing</a>
        </body></html>
    "#;

    #[test]
    fn only_model_extensions_are_extracted_and_rewritten() {
        let urls: Vec<String> = candidate_links(LISTING, &base())
            .into_iter()
            .map(|l| l.url)
            .collect();

        assert_eq!(
            urls,
            vec![
                "https://huggingface.co/runwayml/stable-diffusion-v1-5/resolve/main/v1-5-pruned.ckpt",
                "https://huggingface.co/runwayml/stable-diffusion-v1-5/resolve/main/unet/diffusion_pytorch_model.safetensors",
                "https://huggingface.co/runwayml/stable-diffusion-v1-5/resolve/main/v1-inference.yaml",
                "https://huggingface.co/runwayml/stable-diffusion-v1-5/resolve/main/vae/diffusion_pytorch_model.pt",
            ]
        );
    }

    #[test]
    fn page_without_model_links_yields_nothing() {
        let html = r#"<html><a href="/org/m/blob/main/config.json">c</a><p>no files</p></html>"#;
        assert!(candidate_links(html, &base()).is_empty());
        assert!(candidate_links("", &base()).is_empty());
    }

    #[test]
    fn repeated_anchors_are_kept_in_order() {
        let html = r#"
            <a href="/org/m/blob/main/A.safetensors">A</a>
            <a href="/org/m/blob/main/A.safetensors">A again</a>
            <a href="/org/m/blob/main/B.ckpt">B</a>
        "#;
        let links = candidate_links(html, &base());
        let names: Vec<&str> = links.iter().map(|l| l.file_name()).collect();
        assert_eq!(names, vec!["A.safetensors", "A.safetensors", "B.ckpt"]);
        assert_eq!(links[0].href, "/org/m/blob/main/A.safetensors");
    }

    #[test]
    fn entities_in_href_are_decoded() {
        let html = r#"<a href="/org/m/blob/main/a&amp;b.bin">x</a>"#;
        let links = candidate_links(html, &base());
        assert_eq!(links[0].href, "/org/m/blob/main/a&b.bin");
        assert_eq!(links[0].file_name(), "a&b.bin");
    }

    #[test]
    fn only_the_real_href_attribute_counts() {
        let html = r#"<a data-href="/o/m/blob/main/x.bin" href="/o/m/blob/main/README.md">x</a>
                      <a data-href="/o/m/blob/main/y.bin">y</a>
                      <a title="t"
                         href="/o/m/blob/main/z.bin">z</a>"#;
        let links = candidate_links(html, &base());
        let names: Vec<&str> = links.iter().map(|l| l.file_name()).collect();
        assert_eq!(names, vec!["z.bin"]);
    }

    #[test]
    fn commented_out_anchors_are_ignored() {
        let html = r#"<!-- <a href="/o/m/blob/main/old.bin">old</a> -->
                      <!--
                        <a href="/o/m/blob/main/older.ckpt">older</a>
                      -->
                      <a href="/o/m/blob/main/new.bin">new</a>"#;
        let links = candidate_links(html, &base());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].file_name(), "new.bin");
    }

    #[tokio::test]
    async fn extract_links_fetches_and_rewrites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/org/model/tree/main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/org/model/blob/main/model.safetensors">m</a>
                   <a href="/org/model/blob/main/notes.txt">n</a>"#,
            ))
            .mount(&server)
            .await;

        let client = Client::new();
        let listing = format!("{}/org/model/tree/main", server.uri());
        let links = extract_links(&client, &listing).await.unwrap();

        assert_eq!(
            links,
            vec![format!("{}/org/model/resolve/main/model.safetensors", server.uri())]
        );
    }

    #[tokio::test]
    async fn extract_links_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        let listing = format!("{}/org/missing/tree/main", server.uri());
        let err = extract_links(&client, &listing).await.unwrap_err();

        assert!(matches!(err, Error::HttpStatus { status: 404, .. }), "{err}");
    }

    #[tokio::test]
    async fn extract_links_fails_on_binary_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x00, 0x80]))
            .mount(&server)
            .await;

        let client = Client::new();
        let listing = format!("{}/org/model/tree/main", server.uri());
        let err = extract_links(&client, &listing).await.unwrap_err();

        assert!(matches!(err, Error::Parse { .. }), "{err}");
    }
}
