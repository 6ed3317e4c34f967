//! Cached access to external data sources
//!
//! The [`Fetcher`] owns the TTL cache. A lookup checks the cache first; on a
//! miss it calls the registered [`DataSource`], stores a successful result and
//! returns it. Failures never populate the cache.
//!
//! At most one outbound call per cache key is in flight at a time: concurrent
//! callers for the same key wait on a per-key lock and then read what the
//! first caller cached.

mod nass;
mod weather;

pub use nass::{
    NassClient, NassCommoditySource, NassPriceSource, NASS_COMMODITIES, NASS_PRICES,
    NATIONAL_AVERAGE,
};
pub use weather::{OpenWeatherSource, OPENWEATHER};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::Config;
use crate::error::{Error, FetchError, Result};
use crate::models::{cache_key, Params, Record};

/// An external system that yields records for a set of parameters
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Identifier callers use to address this source
    fn id(&self) -> &str;

    /// Perform one outbound request
    async fn fetch(&self, params: &Params) -> std::result::Result<Vec<Record>, FetchError>;
}

/// Retry behavior for network failures
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Delay before the first retry, doubled each attempt
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Cache-fronted dispatcher over registered data sources
pub struct Fetcher {
    sources: HashMap<String, Arc<dyn DataSource>>,
    cache: Mutex<TtlCache<Vec<Record>>>,
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl Fetcher {
    /// Create a fetcher with no sources registered
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sources: HashMap::new(),
            cache: Mutex::new(TtlCache::new(ttl, clock.clone())),
            in_flight: DashMap::new(),
            retry: RetryPolicy::default(),
            clock,
        }
    }

    /// Build a fetcher with the NASS and (if a key is configured) OpenWeather sources
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("cropcast/", env!("CARGO_PKG_VERSION")))
            .timeout(config.fetch.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        let nass = NassClient::new(
            http.clone(),
            &config.sources.nass_base_url,
            config.sources.nass_api_key.clone(),
        );

        let mut fetcher = Self::new(config.cache.ttl, Arc::new(SystemClock))
            .with_retry(RetryPolicy {
                max_retries: config.fetch.max_retries,
                backoff: config.fetch.retry_backoff,
            })
            .register(NassPriceSource::new(nass.clone()))
            .register(NassCommoditySource::new(nass));

        match &config.sources.openweather_api_key {
            Some(key) => {
                fetcher = fetcher.register(OpenWeatherSource::new(
                    http,
                    &config.sources.openweather_base_url,
                    key.clone(),
                ));
            }
            None => warn!("No OpenWeather API key configured; weather endpoints are disabled"),
        }

        Ok(fetcher)
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register a data source under its id, replacing any previous one
    #[must_use]
    pub fn register(mut self, source: impl DataSource + 'static) -> Self {
        self.sources.insert(source.id().to_string(), Arc::new(source));
        self
    }

    /// Clock used for cache stamping
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Records for `params` from `source_id`, served from cache when fresh
    pub async fn fetch(&self, source_id: &str, params: &Params) -> Result<Vec<Record>> {
        let source = self
            .sources
            .get(source_id)
            .cloned()
            .ok_or_else(|| Error::not_found("data source", source_id))?;

        let key = cache_key(source_id, params);

        if let Some(records) = self.cached(&key) {
            metrics::counter!("cropcast_cache_hits_total", "source" => source_id.to_owned())
                .increment(1);
            debug!(key = %key, "Cache hit");
            return Ok(records);
        }
        metrics::counter!("cropcast_cache_misses_total", "source" => source_id.to_owned())
            .increment(1);

        let flight = InFlight::join(&self.in_flight, &key);
        let _guard = flight.lock.lock().await;

        // Another caller may have filled the entry while we waited.
        let result = match self.cached(&key) {
            Some(records) => Ok(records),
            None => self.fetch_with_retry(source.as_ref(), params).await.map(|records| {
                self.cache.lock().put(key.clone(), records.clone());
                records
            }),
        };

        Ok(result?)
    }

    /// Drop a cached entry so the next fetch goes to the source
    pub fn invalidate(&self, source_id: &str, params: &Params) -> bool {
        self.cache.lock().invalidate(&cache_key(source_id, params))
    }

    fn cached(&self, key: &str) -> Option<Vec<Record>> {
        self.cache.lock().get(key)
    }

    async fn fetch_with_retry(
        &self,
        source: &dyn DataSource,
        params: &Params,
    ) -> std::result::Result<Vec<Record>, FetchError> {
        let mut attempt = 0;
        loop {
            metrics::counter!("cropcast_fetches_total", "source" => source.id().to_owned())
                .increment(1);

            match source.fetch(params).await {
                Ok(records) if records.is_empty() => {
                    return Err(FetchError::empty(source.id(), "source returned no records"));
                }
                Ok(records) => {
                    debug!(source = source.id(), count = records.len(), "Fetched records");
                    return Ok(records);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        source = source.id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    metrics::counter!(
                        "cropcast_fetch_failures_total",
                        "source" => source.id().to_owned(),
                        "kind" => e.kind.to_string()
                    )
                    .increment(1);
                    return Err(e);
                }
            }
        }
    }
}

/// A caller's membership in the per-key single-flight lock.
///
/// Dropping it, including when the owning future is cancelled, removes the
/// map entry once no other caller holds the lock.
struct InFlight<'a> {
    map: &'a DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn join(map: &'a DashMap<String, Arc<tokio::sync::Mutex<()>>>, key: &'a str) -> Self {
        let lock = map.entry(key.to_string()).or_default().clone();
        Self { map, key, lock }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // One reference in the map, one held here.
        self.map.remove_if(self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedSource;
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::FetchErrorKind;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn records() -> Vec<Record> {
        let day = |month| Utc.with_ymd_and_hms(2023, month, 15, 0, 0, 0).unwrap();
        vec![
            Record::new(day(1), "Iowa", 6.54, "$ / BU").with_detail("JAN"),
            Record::new(day(2), "Iowa", 6.61, "$ / BU"),
        ]
    }

    fn params(crop: &str) -> Params {
        let mut p = Params::new();
        p.insert("commodity_desc".into(), crop.into());
        p
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()))
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let source = ScriptedSource::ok("prices", records());
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock()).register(source);

        let first = fetcher.fetch("prices", &params("CORN")).await.unwrap();
        let second = fetcher.fetch("prices", &params("CORN")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_records_round_trip_unchanged() {
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock())
            .register(ScriptedSource::ok("prices", records()));

        let fetched = fetcher.fetch("prices", &params("CORN")).await.unwrap();
        let cached = fetcher.fetch("prices", &params("CORN")).await.unwrap();

        assert_eq!(
            serde_json::to_vec(&fetched).unwrap(),
            serde_json::to_vec(&cached).unwrap()
        );
        assert_eq!(cached, records());
    }

    #[tokio::test]
    async fn different_params_use_different_entries() {
        let source = ScriptedSource::ok("prices", records());
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock()).register(source);

        fetcher.fetch("prices", &params("CORN")).await.unwrap();
        fetcher.fetch("prices", &params("WHEAT")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let clock = clock();
        let source = ScriptedSource::ok("prices", records());
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(60), clock.clone()).register(source);

        fetcher.fetch("prices", &params("CORN")).await.unwrap();
        clock.advance(chrono::Duration::seconds(61));
        fetcher.fetch("prices", &params("CORN")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let source = ScriptedSource::ok("prices", records())
            .then(Err(FetchError::parse("prices", "bad json")));
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock()).register(source);

        let err = fetcher.fetch("prices", &params("CORN")).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(ref e) if e.kind == FetchErrorKind::Parse));

        let ok = fetcher.fetch("prices", &params("CORN")).await.unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_result_is_an_error() {
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock())
            .register(ScriptedSource::ok("prices", vec![]));

        let err = fetcher.fetch("prices", &params("CORN")).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(ref e) if e.kind == FetchErrorKind::Empty));
    }

    #[tokio::test]
    async fn unknown_source_is_not_found() {
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock());
        let err = fetcher.fetch("missing", &Params::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn network_errors_are_retried() {
        let source = ScriptedSource::ok("prices", records())
            .then(Err(FetchError::network("prices", "connection reset")));
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock())
            .with_retry(RetryPolicy {
                max_retries: 2,
                backoff: Duration::from_millis(1),
            })
            .register(source);

        let got = fetcher.fetch("prices", &params("CORN")).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parse_errors_are_not_retried() {
        let source = ScriptedSource::ok("prices", records())
            .then(Err(FetchError::parse("prices", "bad json")));
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock())
            .with_retry(RetryPolicy {
                max_retries: 3,
                backoff: Duration::from_millis(1),
            })
            .register(source);

        assert!(fetcher.fetch("prices", &params("CORN")).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let source = ScriptedSource::ok("prices", records())
            .then(Err(FetchError::network("prices", "timeout")))
            .then(Err(FetchError::network("prices", "timeout")))
            .then(Err(FetchError::network("prices", "timeout")));
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock())
            .with_retry(RetryPolicy {
                max_retries: 1,
                backoff: Duration::from_millis(1),
            })
            .register(source);

        assert!(fetcher.fetch("prices", &params("CORN")).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_call() {
        let source =
            ScriptedSource::ok("prices", records()).with_delay(Duration::from_millis(50));
        let calls = source.calls();
        let fetcher = Arc::new(Fetcher::new(Duration::from_secs(3600), clock()).register(source));

        let tasks = (0..8).map(|_| {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch("prices", &params("CORN")).await })
        });
        let results = futures::future::join_all(tasks).await;

        for result in results {
            assert_eq!(result.unwrap().unwrap().len(), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(fetcher.in_flight.is_empty());
    }

    #[tokio::test]
    async fn cancelled_fetch_releases_its_lock() {
        let source = ScriptedSource::ok("prices", records()).with_delay(Duration::from_secs(5));
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock()).register(source);

        let corn = params("CORN");
        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), fetcher.fetch("prices", &corn)).await;

        assert!(timed_out.is_err());
        assert!(fetcher.in_flight.is_empty());
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let source = ScriptedSource::ok("prices", records());
        let calls = source.calls();
        let fetcher = Fetcher::new(Duration::from_secs(3600), clock()).register(source);

        fetcher.fetch("prices", &params("CORN")).await.unwrap();
        assert!(fetcher.invalidate("prices", &params("CORN")));
        fetcher.fetch("prices", &params("CORN")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }
}
