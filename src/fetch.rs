//! Asset retrieval and normalization
//!
//! Fetches a named animation asset by URL and normalizes it to the binary
//! handle the decode workers consume. Assets delivered as an opaque octet
//! stream are compressed and run through the injected decompression
//! capability; any other body is taken verbatim.
//!
//! No retry here: retry policy belongs to the caller.

use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Decompression capability consumed by the fetcher
///
/// In the reference client this is an RPC to a crypto worker; here it is an
/// injected boundary the embedding application implements.
pub trait Decompress: Send + Sync {
    fn decompress(&self, bytes: &[u8]) -> std::result::Result<Vec<u8>, String>;
}

/// Normalized animation asset, ready to hand to a decode worker
///
/// Ownership transfers to whichever player's decode job consumes it.
#[derive(Debug, Clone)]
pub struct AnimationAsset {
    /// Asset name (built-in asset name, or the source URL as a fallback)
    pub name: String,

    /// Raw (decompressed) animation definition bytes
    pub data: Vec<u8>,
}

/// Retrieves and normalizes animation assets
pub struct AssetFetcher {
    client: reqwest::Client,
    decompressor: Arc<dyn Decompress>,
}

impl AssetFetcher {
    pub fn new(decompressor: Arc<dyn Decompress>) -> Self {
        Self {
            client: reqwest::Client::new(),
            decompressor,
        }
    }

    /// Fetch `url` and normalize the body to an [`AnimationAsset`]
    ///
    /// A `Content-Type: application/octet-stream` response is treated as a
    /// compressed payload and expanded before use.
    pub async fn fetch(&self, url: &str, name: &str) -> Result<AnimationAsset> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "{}: HTTP {}",
                url,
                response.status()
            )));
        }

        let compressed = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/octet-stream"))
            .unwrap_or(false);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        let data = if compressed {
            debug!("Decompressing octet-stream asset: {} ({} bytes)", name, body.len());
            self.decompressor
                .decompress(&body)
                .map_err(Error::Decompression)?
        } else {
            body.to_vec()
        };

        Ok(AnimationAsset {
            name: name.to_string(),
            data,
        })
    }
}
