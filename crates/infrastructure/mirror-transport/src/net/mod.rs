use std::num::NonZeroU32;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::TransportError;

pub type ByteRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Build a byte-budget rate limiter from a KiB/s figure (spec §4.1's
/// `rate_kib_per_s`, default 1024). `None` disables limiting.
pub fn rate_limiter(rate_kib_per_s: Option<u32>) -> Option<Arc<ByteRateLimiter>> {
    rate_kib_per_s
        .and_then(|kib| NonZeroU32::new(kib.saturating_mul(1024)))
        .map(|quota| Arc::new(RateLimiter::direct(Quota::per_second(quota))))
}

/// `download(src_url, dst_path, pool, rate_kib_per_s, max_retries)` (spec
/// §4.1). Streams to `<dst_path>.downloading`, consuming `chunk.len()`
/// cells from `limiter` before each write, then renames onto `dst_path` on
/// success. On exhausting `max_retries` the temp file is removed and no
/// partial file is ever left at `dst_path`.
pub async fn download(
    client: &Client,
    src_url: &str,
    dst_path: &Utf8Path,
    limiter: Option<&Arc<ByteRateLimiter>>,
    max_retries: u32,
) -> Result<(), TransportError> {
    let tmp_path = Utf8PathBuf::from(format!("{dst_path}.downloading"));

    if let Some(parent) = dst_path.parent() {
        tokio::fs::create_dir_all(parent.as_std_path())
            .await
            .map_err(|e| TransportError::Io {
                path: parent.to_string(),
                source: e,
            })?;
    }

    let mut last_err = None;

    for attempt in 1..=max_retries.max(1) {
        match try_download_once(client, src_url, &tmp_path, limiter).await {
            Ok(()) => {
                tokio::fs::rename(tmp_path.as_std_path(), dst_path.as_std_path())
                    .await
                    .map_err(|e| TransportError::Io {
                        path: dst_path.to_string(),
                        source: e,
                    })?;
                return Ok(());
            }
            Err(e) => {
                warn!(url = src_url, attempt, max_retries, error = %e, "download attempt failed");
                let _ = tokio::fs::remove_file(tmp_path.as_std_path()).await;
                last_err = Some(e);
                if attempt < max_retries {
                    let backoff = std::time::Duration::from_millis(200 * attempt as u64);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or(TransportError::Status {
        url: src_url.to_string(),
        status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
    }))
}

async fn try_download_once(
    client: &Client,
    src_url: &str,
    tmp_path: &Utf8Path,
    limiter: Option<&Arc<ByteRateLimiter>>,
) -> Result<(), TransportError> {
    use futures::StreamExt;

    let resp = client
        .get(src_url)
        .send()
        .await
        .map_err(|e| TransportError::Request {
            url: src_url.to_string(),
            attempts: 1,
            source: e,
        })?;

    if !resp.status().is_success() {
        return Err(TransportError::Status {
            url: src_url.to_string(),
            status: resp.status(),
        });
    }

    let mut file =
        tokio::fs::File::create(tmp_path.as_std_path())
            .await
            .map_err(|e| TransportError::Io {
                path: tmp_path.to_string(),
                source: e,
            })?;

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::Request {
            url: src_url.to_string(),
            attempts: 1,
            source: e,
        })?;

        if let Some(lim) = limiter {
            if let Some(cells) = NonZeroU32::new(chunk.len() as u32) {
                lim.until_n_ready(cells).await.ok();
            }
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| TransportError::Io {
                path: tmp_path.to_string(),
                source: e,
            })?;
    }

    file.flush().await.map_err(|e| TransportError::Io {
        path: tmp_path.to_string(),
        source: e,
    })
}

/// `fetch_repo`/`fetch_patch_files` share this: GET a URL and decode the
/// JSON body (spec §4.2). Callers are responsible for appending the
/// cache-buster via `mirror_core::with_cache_buster` first.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
) -> Result<T, TransportError> {
    let bytes = get_bytes(client, url).await?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Json {
        url: url.to_string(),
        source: e,
    })
}

/// Raw GET, used when the caller needs the bytes themselves (e.g. to hash
/// them for the version record) rather than a parsed value.
pub async fn get_bytes(client: &Client, url: &str) -> Result<bytes::Bytes, TransportError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| TransportError::Request {
            url: url.to_string(),
            attempts: 1,
            source: e,
        })?;

    if !resp.status().is_success() {
        return Err(TransportError::Status {
            url: url.to_string(),
            status: resp.status(),
        });
    }

    resp.bytes().await.map_err(|e| TransportError::Request {
        url: url.to_string(),
        attempts: 1,
        source: e,
    })
}
