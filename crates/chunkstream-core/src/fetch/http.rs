//! libcurl-backed fetcher.
//!
//! Each fetch runs a blocking GET on Tokio's blocking pool. Cancellation is
//! cooperative: the progress callback checks the token and aborts the
//! transfer, which curl reports as "aborted by callback".

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::TransportSettings;

use super::classify::classify_http_status;
use super::error::FetchError;
use super::Fetcher;

/// Fetches keys as HTTP(S) URLs with a plain GET.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlFetcher;

impl CurlFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Fetcher for CurlFetcher {
    async fn fetch(
        &self,
        key: &str,
        settings: &TransportSettings,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, FetchError> {
        let url = key.to_string();
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || get(&url, &settings, &cancel))
            .await
            .map_err(|e| FetchError::Transport(format!("fetch task: {}", e)))?
    }
}

/// Blocking GET of `url` into memory. Call from `spawn_blocking` in async code.
fn get(
    url: &str,
    settings: &TransportSettings,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(settings.follow_redirects)?;
    easy.max_redirections(10)?;
    if let Some(secs) = settings.connect_timeout_secs {
        easy.connect_timeout(Duration::from_secs(secs))?;
    }
    if let Some(secs) = settings.timeout_secs {
        easy.timeout(Duration::from_secs(secs))?;
    }
    // Progress callbacks are off by default in libcurl.
    easy.progress(true)?;

    let mut list = curl::easy::List::new();
    for (k, v) in &settings.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !settings.headers.is_empty() {
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        if let Err(e) = transfer.perform() {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            return Err(e.into());
        }
    }

    let code = easy.response_code()?;
    if let Some(err) = classify_http_status(code) {
        tracing::debug!(url, code, "fetch returned non-success status");
        return Err(err);
    }
    Ok(body)
}
