use crate::provider::PaymentProvider;
use chrono::{DateTime, Duration, Utc};
use shared::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Caches the provider bearer credential until shortly before it expires.
/// Concurrent callers that observe an expired token may each fetch fresh
/// credentials; the last write wins.
pub struct TokenCache {
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<CachedToken>>,
    leeway: Duration,
}

impl TokenCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: Mutex::new(None),
            leeway: Duration::seconds(30),
        }
    }

    pub async fn bearer(&self, provider: &dyn PaymentProvider) -> Result<String> {
        let now = self.clock.now();
        {
            let slot = self.slot.lock().await;
            if let Some(cached) = slot.as_ref() {
                if now < cached.expires_at {
                    return Ok(cached.token.clone());
                }
            }
        }

        let credentials = provider.fetch_credentials().await?;
        let expires_at = now + Duration::seconds(credentials.expires_in) - self.leeway;
        debug!(%expires_at, "Refreshed provider credentials");

        let mut slot = self.slot.lock().await;
        *slot = Some(CachedToken {
            token: credentials.access_token.clone(),
            expires_at,
        });
        Ok(credentials.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderCredentials, PushPayment};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeClock {
        now: std::sync::Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: std::sync::Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, seconds: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(seconds);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    struct CountingProvider {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PaymentProvider for CountingProvider {
        async fn fetch_credentials(&self) -> Result<ProviderCredentials> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderCredentials {
                access_token: format!("token-{n}"),
                expires_in: 3600,
            })
        }

        async fn push_payment(&self, _bearer: &str, _push: &PushPayment) -> Result<String> {
            Ok("unused".to_string())
        }
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_expiry() {
        let clock = FakeClock::new();
        let cache = TokenCache::new(clock.clone());
        let provider = CountingProvider {
            fetches: AtomicUsize::new(0),
        };

        let first = cache.bearer(&provider).await.unwrap();
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);

        clock.advance(1800);
        let second = cache.bearer(&provider).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);

        clock.advance(3600);
        let third = cache.bearer(&provider).await.unwrap();
        assert_ne!(third, first);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }
}
