//! Raster byte sources: local files, HTTP(S) with retry, and memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::config::CompositeConfig;
use crate::error::{CompositeError, Result};

/// Fetches the raw bytes behind a raster href.
#[async_trait]
pub trait RasterStore: Send + Sync {
    async fn fetch(&self, href: &str) -> Result<Bytes>;
}

/// Reads hrefs from the local filesystem. Relative paths are resolved
/// against `root` when one is set; a `file://` prefix is accepted.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    root: Option<PathBuf>,
}

impl LocalStore {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn resolve(&self, href: &str) -> PathBuf {
        let path = Path::new(href.strip_prefix("file://").unwrap_or(href));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl RasterStore for LocalStore {
    async fn fetch(&self, href: &str) -> Result<Bytes> {
        let path = self.resolve(href);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| CompositeError::source_unavailable(path.display().to_string(), e))?;
        debug!(path = %path.display(), bytes = data.len(), "Read local raster");
        Ok(Bytes::from(data))
    }
}

/// Retry schedule for remote fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the retry after one that waited `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        std::cmp::min(current.saturating_mul(2), self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Fetches hrefs over HTTP(S).
///
/// Connection failures, timeouts and 5xx responses are retried with
/// exponential backoff; any other failure is returned at once.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    retry: RetryPolicy,
}

enum Attempt {
    Retry(String),
    Fail(String),
}

impl HttpStore {
    pub fn new(retry: RetryPolicy, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                CompositeError::invalid_config(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client, retry })
    }

    pub fn from_config(config: &CompositeConfig) -> Result<Self> {
        Self::new(
            RetryPolicy {
                max_retries: config.max_retries,
                initial_delay: config.initial_retry_delay(),
                max_delay: config.max_retry_delay(),
            },
            config.request_timeout(),
        )
    }

    async fn attempt(&self, href: &str) -> std::result::Result<Bytes, Attempt> {
        let response = self.client.get(href).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                Attempt::Retry(e.to_string())
            } else {
                Attempt::Fail(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Retry(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(Attempt::Fail(format!("HTTP {}", status)));
        }

        response
            .bytes()
            .await
            .map_err(|e| Attempt::Retry(format!("body read failed: {}", e)))
    }
}

#[async_trait]
impl RasterStore for HttpStore {
    #[instrument(skip(self))]
    async fn fetch(&self, href: &str) -> Result<Bytes> {
        let mut retry_count = 0;
        let mut delay = self.retry.initial_delay;

        loop {
            match self.attempt(href).await {
                Ok(bytes) => {
                    debug!(bytes = bytes.len(), retries = retry_count, "Fetched remote raster");
                    return Ok(bytes);
                }
                Err(Attempt::Fail(reason)) => {
                    return Err(CompositeError::source_unavailable(href, reason));
                }
                Err(Attempt::Retry(reason)) => {
                    retry_count += 1;
                    if retry_count > self.retry.max_retries {
                        return Err(CompositeError::source_unavailable(
                            href,
                            format!("failed after {} retries: {}", self.retry.max_retries, reason),
                        ));
                    }

                    warn!(
                        error = %reason,
                        retry = retry_count,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Fetch failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = self.retry.next_delay(delay);
                }
            }
        }
    }
}

/// Sends `http://` and `https://` hrefs to an [`HttpStore`] and everything
/// else to a [`LocalStore`].
#[derive(Debug, Clone)]
pub struct RoutingStore {
    local: LocalStore,
    http: HttpStore,
}

impl RoutingStore {
    pub fn new(local: LocalStore, http: HttpStore) -> Self {
        Self { local, http }
    }

    pub fn from_config(config: &CompositeConfig) -> Result<Self> {
        Ok(Self::new(
            LocalStore::new(config.data_root.clone()),
            HttpStore::from_config(config)?,
        ))
    }
}

#[async_trait]
impl RasterStore for RoutingStore {
    async fn fetch(&self, href: &str) -> Result<Bytes> {
        if is_remote(href) {
            self.http.fetch(href).await
        } else {
            self.local.fetch(href).await
        }
    }
}

pub fn is_remote(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

/// In-memory store keyed by href.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, href: impl Into<String>, data: impl Into<Bytes>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(href.into(), data.into());
        }
    }

    pub fn remove(&self, href: &str) -> Option<Bytes> {
        self.objects.write().ok()?.remove(href)
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RasterStore for MemoryStore {
    async fn fetch(&self, href: &str) -> Result<Bytes> {
        self.objects
            .read()
            .map_err(|_| CompositeError::source_unavailable(href, "store lock poisoned"))?
            .get(href)
            .cloned()
            .ok_or_else(|| CompositeError::source_unavailable(href, "not found"))
    }
}
