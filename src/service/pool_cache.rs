use crate::models::question::QuestionPools;
use crate::service::question_source::QuestionSource;
use crate::service::sheets::SheetsError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct CachedPools {
    pools: Arc<QuestionPools>,
    fetched_at: Instant,
}

/// Read-through cache in front of the question source.
///
/// The lock is held while refreshing, so callers arriving during a refresh
/// wait for it instead of issuing their own upstream fetch.
pub struct PoolCache {
    source: Arc<dyn QuestionSource>,
    ttl: Duration,
    cached: Mutex<Option<CachedPools>>,
}

impl PoolCache {
    pub fn new(source: Arc<dyn QuestionSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn get_pools(&self) -> Result<Arc<QuestionPools>, SheetsError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref()
            && entry.fetched_at.elapsed() <= self.ttl
        {
            return Ok(entry.pools.clone());
        }

        // A failed refresh leaves the previous entry untouched.
        let fetched_at = Instant::now();
        let pools = Arc::new(self.source.load_pools().await?);
        debug!(pool_a = pools.a.len(), pool_b = pools.b.len(), "refreshed question pool cache");

        *cached = Some(CachedPools {
            pools: pools.clone(),
            fetched_at,
        });

        Ok(pools)
    }
}
