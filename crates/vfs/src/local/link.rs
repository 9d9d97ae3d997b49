//! Link fetching for downloads.
//!
//! `file://` links name a virtual path inside the same filesystem and are
//! copied locally; `http://` and `https://` links are fetched with reqwest
//! and streamed to disk.

use std::borrow::Cow;
use std::path::Path;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::FsError;

/// Characters escaped in the path of a `file://` link.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Builds the `file://` link for a virtual path.
pub(crate) fn file_href(virtual_path: &str) -> String {
    format!("file://{}", utf8_percent_encode(virtual_path, PATH_ESCAPE))
}

/// Where a link points to.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LinkSource<'a> {
    /// Virtual path inside the served filesystem.
    Local(Cow<'a, str>),
    Remote(&'a str),
}

pub(crate) fn classify(href: &str) -> Result<LinkSource<'_>, FsError> {
    if let Some(path) = href.strip_prefix("file://") {
        let decoded = percent_decode_str(path)
            .decode_utf8()
            .map_err(|e| FsError::Encoding(format!("invalid link {href}: {e}")))?;
        Ok(LinkSource::Local(decoded))
    } else if href.starts_with("http://") || href.starts_with("https://") {
        Ok(LinkSource::Remote(href))
    } else {
        Err(FsError::NotSupported(format!("unsupported link scheme: {href}")))
    }
}

/// Streams the body of `url` into a new file at `dest`.
///
/// A partially written file is removed when the transfer fails.
pub(crate) async fn fetch_http(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, FsError> {
    let result = fetch_http_inner(client, url, dest).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %dest.display(), error = %e, "failed to remove partial download");
            }
        }
    }
    result
}

async fn fetch_http_inner(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, FsError> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FsError::NotReadable(format!("failed to download {url}: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(match status.as_u16() {
            404 | 410 => FsError::NotFound(format!("download {url}: HTTP {status}")),
            401 | 403 => FsError::Security(format!("download {url}: HTTP {status}")),
            _ => FsError::NotReadable(format!("download {url}: HTTP {status}")),
        });
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut total = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FsError::NotReadable(format!("failed to download {url}: {e}")))?
    {
        file.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(url, bytes = total, path = %dest.display(), "download complete");
    Ok(total)
}
