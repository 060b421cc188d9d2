use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use theoriq_token::{CapabilityToken, TokenError};

use crate::error::ProviderError;

pub const DEFAULT_RENEW_MARGIN_SECS: i64 = 300;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can trade a held credential for a fresh operational token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<CapabilityToken, ProviderError>;
}

/// The provider's single cache entry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: CapabilityToken,
    /// Unix timestamp after which the token is renewed on next use
    pub renew_after: i64,
}

/// Hands out one live token per credential, renewing it ahead of expiry.
///
/// The check-and-fetch section runs under a single async mutex, so concurrent
/// callers never race two renewals: one fetches, the others wait and receive
/// the same token. A failed or timed-out renewal clears the entry and is
/// returned to the caller; an expired token is never handed out in its place.
pub struct TokenProvider<S> {
    source: S,
    cache: Mutex<Option<CachedToken>>,
    timeout: Duration,
    renew_margin: i64,
}

impl<S: TokenSource> TokenProvider<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Mutex::new(None),
            timeout: DEFAULT_FETCH_TIMEOUT,
            renew_margin: DEFAULT_RENEW_MARGIN_SECS,
        }
    }

    /// Upper bound on a single renewal fetch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Seconds before expiry at which the cached token is considered stale.
    pub fn with_renew_margin(mut self, margin_secs: i64) -> Self {
        self.renew_margin = margin_secs;
        self
    }

    /// Seeds the cache, e.g. with a token obtained out of band.
    pub fn with_cached(mut self, token: CapabilityToken, renew_after: i64) -> Self {
        self.cache = Mutex::new(Some(CachedToken { token, renew_after }));
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn get_token(&self) -> Result<CapabilityToken, ProviderError> {
        self.get_token_at(Utc::now().timestamp()).await
    }

    /// Returns the cached token unless `now` is past its renewal point, in
    /// which case a new one is fetched first.
    pub async fn get_token_at(&self, now: i64) -> Result<CapabilityToken, ProviderError> {
        let mut cache = self.cache.lock().await;

        if let Some(entry) = cache.as_ref() {
            if now <= entry.renew_after {
                return Ok(entry.token.clone());
            }
            debug!("cached token stale since {}", entry.renew_after);
        }

        match self.renew(now).await {
            Ok(entry) => {
                let token = entry.token.clone();
                *cache = Some(entry);
                Ok(token)
            }
            Err(e) => {
                *cache = None;
                warn!("token renewal failed: {}", e);
                Err(e)
            }
        }
    }

    async fn renew(&self, now: i64) -> Result<CachedToken, ProviderError> {
        let token = tokio::time::timeout(self.timeout, self.source.fetch())
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let expires_at = token
            .facts()?
            .expires_at()
            .map_err(TokenError::from)?;
        if expires_at <= now {
            return Err(ProviderError::Renewal(format!(
                "issued token already expired at {}",
                expires_at
            )));
        }

        let renew_after = expires_at - self.renew_margin;
        info!(
            "renewed token, expires at {}, renewing after {}",
            expires_at, renew_after
        );
        Ok(CachedToken { token, renew_after })
    }

    /// Drops the cached token; the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    pub async fn cached(&self) -> Option<CachedToken> {
        self.cache.lock().await.clone()
    }
}
