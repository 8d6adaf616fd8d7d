//! Timeout and bounded retry around any knowledge source.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

use super::{KnowledgeSource, LookupError, SearchHit};
use crate::config::LookupPolicy;

/// Applies a [`LookupPolicy`] to an inner source.
///
/// Each attempt is cut off at `policy.timeout`. Transient failures are
/// retried with exponential backoff up to `policy.max_retries` times;
/// permanent failures return immediately.
pub struct ResilientLookup {
    inner: Arc<dyn KnowledgeSource>,
    policy: LookupPolicy,
}

impl ResilientLookup {
    pub fn new(inner: Arc<dyn KnowledgeSource>, policy: LookupPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &LookupPolicy {
        &self.policy
    }

    async fn attempt(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        match tokio::time::timeout(self.policy.timeout, self.inner.lookup(query)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(self.policy.timeout)),
        }
    }
}

#[async_trait]
impl KnowledgeSource for ResilientLookup {
    async fn lookup(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.policy.min_delay)
            .with_max_delay(self.policy.max_delay)
            .with_max_times(self.policy.max_retries);

        let mut hits = (|| self.attempt(query))
            .retry(backoff)
            .when(LookupError::is_transient)
            .notify(|err: &LookupError, delay: Duration| {
                tracing::warn!(
                    source = %self.inner.name(),
                    error = %err,
                    delay = ?delay,
                    "Knowledge lookup failed, retrying"
                );
            })
            .await?;

        hits.truncate(self.policy.max_results);
        Ok(hits)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with `error` for the first `failures` calls, then succeeds.
    struct FlakySource {
        failures: usize,
        error: LookupError,
        calls: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures: usize, error: LookupError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KnowledgeSource for FlakySource {
        async fn lookup(&self, _query: &str) -> Result<Vec<SearchHit>, LookupError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok((0..10).map(|i| SearchHit::new(format!("hit {}", i), "s")).collect())
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct StalledSource;

    #[async_trait]
    impl KnowledgeSource for StalledSource {
        async fn lookup(&self, _query: &str) -> Result<Vec<SearchHit>, LookupError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    fn fast_policy(max_retries: usize) -> LookupPolicy {
        LookupPolicy {
            timeout: Duration::from_millis(50),
            max_retries,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_results: 3,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let source = Arc::new(FlakySource::new(2, LookupError::RateLimited));
        let lookup = ResilientLookup::new(source.clone(), fast_policy(2));

        let hits = lookup.lookup("q").await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let source = Arc::new(FlakySource::new(10, LookupError::Http("reset".into())));
        let lookup = ResilientLookup::new(source.clone(), fast_policy(2));

        assert!(lookup.lookup("q").await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let source = Arc::new(FlakySource::new(
            10,
            LookupError::Unavailable("down".into()),
        ));
        let lookup = ResilientLookup::new(source.clone(), fast_policy(5));

        assert!(matches!(
            lookup.lookup("q").await,
            Err(LookupError::Unavailable(_))
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let lookup = ResilientLookup::new(Arc::new(StalledSource), fast_policy(0));
        assert!(matches!(
            lookup.lookup("q").await,
            Err(LookupError::Timeout(_))
        ));
    }
}
