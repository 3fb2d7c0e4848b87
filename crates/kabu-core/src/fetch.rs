use crate::error::FetchError;
use crate::table::RawTable;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, trace};

/// A source of daily OHLCV observations.
///
/// Symbols without trading activity in range must come back as missing
/// values rather than as an error.
pub trait Fetcher {
    fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<RawTable, FetchError>> + Send;
}

type CacheKey = (Vec<String>, NaiveDate, NaiveDate);

struct CacheEntry {
    table: RawTable,
    stored: Instant,
}

/// Memoizes successful fetches per `(symbols, start, end)` for `ttl`.
///
/// Failures are not cached. A zero `ttl` disables reuse.
pub struct CachedFetcher<F> {
    inner: F,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl<F> CachedFetcher<F> {
    pub fn new(inner: F, ttl: Duration) -> Self {
        CachedFetcher {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl<F> Fetcher for CachedFetcher<F>
where
    F: Fetcher + Sync,
{
    async fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError> {
        let key: CacheKey = (symbols.to_vec(), start, end);

        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&key) {
                if entry.stored.elapsed() < self.ttl {
                    debug!("Serving {symbols:?} {start}..{end} from cache");
                    return Ok(entry.table.clone());
                }
            }
        }

        let table = self.inner.fetch(symbols, start, end).await?;

        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored.elapsed() < ttl);
        if !ttl.is_zero() {
            trace!("Caching {symbols:?} {start}..{end} for {}s", ttl.as_secs());
            entries.insert(
                key,
                CacheEntry {
                    table: table.clone(),
                    stored: Instant::now(),
                },
            );
        }
        Ok(table)
    }
}
