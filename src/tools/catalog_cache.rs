//! Time-boxed cache in front of the scrape orchestrator.
//!
//! Holds the last successful product list and its capture time. At most one
//! scrape runs at a time: the first caller that needs one spawns it and
//! publishes a shared future in the in-flight slot; every other caller that
//! arrives while it runs awaits that same future. The spawned task, not the
//! callers, writes the cache, so a dropped request never abandons a scrape
//! half-way and the entry is only ever replaced by a complete result.

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use super::scrape::CatalogScraper;
use crate::core::errors::ScrapeError;
use crate::types::ProductRecord;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for freshness tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Last successful scrape. Replaced wholesale, never merged.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub records: Arc<Vec<ProductRecord>>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Result of [`CatalogCache::get_or_scrape`].
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub records: Arc<Vec<ProductRecord>>,
    pub served_from_cache: bool,
}

type ScrapeOutcome = Result<Arc<Vec<ProductRecord>>, ScrapeError>;
type SharedScrape = Shared<BoxFuture<'static, ScrapeOutcome>>;

struct InFlight {
    generation: u64,
    scrape: SharedScrape,
}

struct CacheInner {
    scraper: Arc<dyn CatalogScraper>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    entry: RwLock<CacheEntry>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

impl CacheInner {
    fn snapshot(&self) -> CacheEntry {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_records(&self) -> Option<Arc<Vec<ProductRecord>>> {
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        let captured_at = entry.captured_at?;
        let age = self.clock.now().signed_duration_since(captured_at);
        (age < self.ttl).then(|| Arc::clone(&entry.records))
    }

    fn store(&self, records: Arc<Vec<ProductRecord>>) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        *entry = CacheEntry {
            records,
            captured_at: Some(self.clock.now()),
        };
    }
}

/// Clears the in-flight slot when the scrape task ends, however it ends.
/// The entry is written before this runs, so late callers see fresh data.
struct SlotRelease {
    inner: Arc<CacheInner>,
    generation: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|r| r.generation == self.generation) {
            *slot = None;
        }
    }
}

enum Plan {
    Cached(Arc<Vec<ProductRecord>>),
    Await(SharedScrape),
}

/// Process-wide product cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CacheInner>,
}

impl CatalogCache {
    pub fn new(scraper: Arc<dyn CatalogScraper>, ttl: Duration) -> Self {
        Self::with_clock(scraper, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(scraper: Arc<dyn CatalogScraper>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                scraper,
                clock,
                ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
                entry: RwLock::new(CacheEntry::default()),
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current entry (empty before the first successful scrape).
    pub fn get(&self) -> CacheEntry {
        self.inner.snapshot()
    }

    pub fn is_fresh(&self) -> bool {
        self.inner.fresh_records().is_some()
    }

    pub fn is_scraping(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Serve the entry while it is younger than the TTL, otherwise scrape.
    /// On failure the error is returned and the previous entry is kept.
    pub async fn get_or_scrape(&self) -> Result<CatalogSnapshot, ScrapeError> {
        if let Some(records) = self.inner.fresh_records() {
            info!("📦 Serving {} cached products", records.len());
            return Ok(CatalogSnapshot {
                records,
                served_from_cache: true,
            });
        }

        match self.plan(true) {
            Plan::Cached(records) => Ok(CatalogSnapshot {
                records,
                served_from_cache: true,
            }),
            Plan::Await(scrape) => Ok(CatalogSnapshot {
                records: scrape.await?,
                served_from_cache: false,
            }),
        }
    }

    /// Scrape regardless of freshness. Joins a scrape that is already
    /// running instead of launching a second browser.
    pub async fn force_scrape(&self) -> Result<Arc<Vec<ProductRecord>>, ScrapeError> {
        match self.plan(false) {
            Plan::Cached(records) => Ok(records),
            Plan::Await(scrape) => scrape.await,
        }
    }

    fn plan(&self, allow_cached: bool) -> Plan {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(running) = slot.as_ref() {
            info!("⏳ Joining in-flight scrape #{}", running.generation);
            return Plan::Await(running.scrape.clone());
        }

        // A scrape may have finished between the caller's freshness check and here.
        if allow_cached {
            if let Some(records) = self.inner.fresh_records() {
                return Plan::Cached(records);
            }
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        info!("🔄 Starting scrape #{}", generation);

        let task = tokio::spawn(async move {
            // Dropped last, including on panic, so the slot never outlives its scrape.
            let _release = SlotRelease {
                inner: Arc::clone(&inner),
                generation,
            };
            let outcome = inner.scraper.scrape().await.map(Arc::new);
            match &outcome {
                Ok(records) => {
                    inner.store(Arc::clone(records));
                    info!("💾 Cached {} products (scrape #{})", records.len(), generation);
                }
                Err(e) => warn!("Scrape #{} failed, keeping previous cache: {}", generation, e),
            }
            outcome
        });

        let scrape: SharedScrape = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ScrapeError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            generation,
            scrape: scrape.clone(),
        });
        Plan::Await(scrape)
    }
}
