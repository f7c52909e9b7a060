//! Capabilities the coordinator needs from its collaborators.
//!
//! A `Fetcher` turns a key (the chunk URL) into raw bytes and must honour
//! cooperative cancellation; a `Decoder` turns those bytes into the payload
//! that ends up in the chunk cache. `CurlFetcher` is the libcurl-backed
//! default fetcher.

mod classify;
mod error;
mod http;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::TransportSettings;

pub use classify::{classify_curl_error, classify_http_status};
pub use error::{DecodeError, FetchError};
pub use http::CurlFetcher;

/// Retrieves the raw bytes for one key.
///
/// Implementations should return `FetchError::Cancelled` once `cancel` fires;
/// that is what the coordinator reports as `aborted` rather than `failed`.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(
        &self,
        key: &str,
        settings: &TransportSettings,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Turns fetched bytes into a cacheable payload.
pub trait Decoder: Send + Sync + 'static {
    type Payload: Send + Sync + 'static;

    fn decode(&self, key: &str, bytes: Vec<u8>) -> Result<Self::Payload, DecodeError>;
}

/// Decoder that keeps the fetched bytes as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBytes;

impl Decoder for RawBytes {
    type Payload = Vec<u8>;

    fn decode(&self, _key: &str, bytes: Vec<u8>) -> Result<Vec<u8>, DecodeError> {
        Ok(bytes)
    }
}
