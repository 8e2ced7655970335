//! HTTP range request source

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, ETAG, EXPIRES, HeaderMap, HeaderName, RANGE};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{RangeResponse, Source, cancellable, check_cancelled};
use crate::config::ReaderConfig;
use crate::error::{ReaderError, ReaderResult};

/// Archive served over HTTP(S) with byte range support
///
/// Once the server reports a different version of the archive, every later
/// request is sent with `Cache-Control: no-cache` so intermediaries cannot
/// hand back stale ranges.
#[derive(Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    must_reload: AtomicBool,
}

impl HttpSource {
    /// Source for `url` with default client settings
    pub fn new(url: impl Into<String>) -> ReaderResult<Self> {
        Self::with_config(url, &ReaderConfig::default())
    }

    /// Source for `url` using timeout and user agent from `config`
    pub fn with_config(url: impl Into<String>, config: &ReaderConfig) -> ReaderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Self::with_client(url, client)
    }

    /// Source for `url` sharing an existing client
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> ReaderResult<Self> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| ReaderError::InvalidSource(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ReaderError::InvalidSource(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            client,
            url,
            must_reload: AtomicBool::new(false),
        })
    }

    /// URL of the archive
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(
        &self,
        offset: u64,
        length: u64,
        cancel: Option<&CancellationToken>,
    ) -> ReaderResult<reqwest::Response> {
        let last = offset
            .checked_add(length.max(1) - 1)
            .ok_or_else(|| ReaderError::InvalidSource(format!("range {offset}+{length} overflows")))?;
        let mut request = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-{last}"));
        if self.must_reload.load(Ordering::Relaxed) {
            request = request.header(CACHE_CONTROL, "no-cache");
        }
        debug!(url = %self.url, offset, length, "range request");
        Ok(cancellable(cancel, request.send()).await??)
    }
}

#[async_trait]
impl Source for HttpSource {
    fn key(&self) -> String {
        self.url.clone()
    }

    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        cancel: Option<&CancellationToken>,
        expected_etag: Option<&str>,
    ) -> ReaderResult<RangeResponse> {
        check_cancelled(cancel)?;
        let mut response = self.send(offset, length, cancel).await?;

        // a first read past the end of a small archive: retry with the real size
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE
            && offset == 0
            && let Some(total) = content_range_total(response.headers())
            && total > 0
        {
            debug!(url = %self.url, total, "initial range too long, retrying");
            response = self.send(0, total, cancel).await?;
        }

        let etag = strong_etag(response.headers());
        let status = response.status();
        let changed = matches!((expected_etag, etag.as_deref()), (Some(a), Some(b)) if a != b);
        if status == StatusCode::RANGE_NOT_SATISFIABLE || changed {
            warn!(url = %self.url, expected = ?expected_etag, actual = ?etag, "archive changed on server");
            self.must_reload.store(true, Ordering::Relaxed);
            return Err(ReaderError::EtagMismatch {
                expected: expected_etag.map(str::to_string),
                actual: etag,
            });
        }

        if status.as_u16() >= 300 {
            return Err(ReaderError::HttpStatus(status.as_u16()));
        }

        if status == StatusCode::OK {
            match header_string(response.headers(), &CONTENT_LENGTH).and_then(|v| v.parse::<u64>().ok()) {
                Some(content_length) if content_length <= length => {}
                Some(content_length) => {
                    return Err(ReaderError::ByteServingUnsupported(format!(
                        "server returned {content_length} bytes for a {length}-byte range"
                    )));
                }
                None => {
                    return Err(ReaderError::ByteServingUnsupported(
                        "full response without Content-Length".to_string(),
                    ));
                }
            }
        }

        let cache_control = header_string(response.headers(), &CACHE_CONTROL);
        let expires = header_string(response.headers(), &EXPIRES);
        let data = cancellable(cancel, response.bytes()).await??;

        Ok(RangeResponse {
            data,
            etag,
            cache_control,
            expires,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Etag header unless it is a weak validator
fn strong_etag(headers: &HeaderMap) -> Option<String> {
    header_string(headers, &ETAG).filter(|etag| !etag.starts_with("W/"))
}

/// Total size from `Content-Range: bytes */N`
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = header_string(headers, &CONTENT_RANGE)?;
    let (unit, rest) = value.split_once(' ')?;
    if unit != "bytes" {
        return None;
    }
    rest.split_once('/')?.1.trim().parse().ok()
}
