use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

const CACHEABLE_SUFFIX: &str = "html";

/// Anything that turns a URL into page text.
#[async_trait]
pub trait PageSource {
    async fn fetch(&mut self, url: &str) -> Result<String>;
}

/// Cache file name for a URL. Yearly digest pages end in `/` and are never
/// cached.
pub fn cache_key(url: &str) -> Option<&str> {
    if !url.ends_with(CACHEABLE_SUFFIX) {
        return None;
    }
    url.rsplit('/').next().filter(|name| !name.is_empty())
}

/// How long to wait before the next remote fetch may start.
fn remaining_delay(last: Option<Instant>, now: Instant, spacing: Duration) -> Duration {
    match last {
        Some(last) => spacing.saturating_sub(now.saturating_duration_since(last)),
        None => Duration::ZERO,
    }
}

/// HTTP page source with an optional read-through disk cache.
pub struct CachedFetcher {
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
    spacing: Duration,
    last_remote: Option<Instant>,
}

impl CachedFetcher {
    pub fn new(cache_dir: Option<PathBuf>, delay_ms: u64) -> Result<Self> {
        if let Some(dir) = &cache_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create cache dir {}", dir.display()))?;
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            cache_dir,
            spacing: Duration::from_millis(delay_ms),
            last_remote: None,
        })
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let dir = self.cache_dir.as_deref()?;
        cache_key(url).map(|name| dir.join(name))
    }

    async fn fetch_remote(&mut self, url: &str) -> Result<String> {
        let wait = remaining_delay(self.last_remote, Instant::now(), self.spacing);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.last_remote = Some(Instant::now());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad response from {}", url))?;
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        info!("Fetched {} ({} bytes, remote)", url, text.len());
        Ok(text)
    }
}

async fn read_cached(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read cache file {}", path.display())),
    }
}

#[async_trait]
impl PageSource for CachedFetcher {
    async fn fetch(&mut self, url: &str) -> Result<String> {
        let Some(path) = self.cache_path(url) else {
            return self.fetch_remote(url).await;
        };

        if let Some(text) = read_cached(&path).await? {
            debug!("Fetched {} (cache {})", url, path.display());
            return Ok(text);
        }

        let text = self.fetch_remote(url).await?;
        tokio::fs::write(&path, text.as_bytes())
            .await
            .with_context(|| format!("Failed to write cache file {}", path.display()))?;
        Ok(text)
    }
}
