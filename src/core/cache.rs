use crate::domain::model::AppointmentFilter;
use crate::utils::error::Result;
use chrono::NaiveDate;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

const MAX_ENTRIES: u64 = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Offices,
    Hosts(i64),
    Slots(i64, NaiveDate),
    Appointments(AppointmentFilter),
}

/// 查詢快取：以 QueryKey 為鍵保存 JSON，逾時自動失效
#[derive(Clone)]
pub struct QueryCache {
    inner: Option<Cache<QueryKey, serde_json::Value>>,
}

impl QueryCache {
    /// `ttl` 為 0 時停用快取
    pub fn new(ttl: Duration) -> Self {
        if ttl.is_zero() {
            return Self::disabled();
        }

        let inner = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        Self { inner: Some(inner) }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// 命中時直接回傳，否則呼叫 `fetch` 並寫入快取
    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(cache) = &self.inner else {
            return fetch().await;
        };

        if let Some(cached) = cache.get(&key).await {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    tracing::debug!("🗄️ cache hit for {:?}", key);
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!("⚠️ dropping unreadable cache entry {:?}: {}", key, e);
                    cache.invalidate(&key).await;
                }
            }
        }

        tracing::debug!("🗄️ cache miss for {:?}", key);
        let value = fetch().await?;
        cache.insert(key, serde_json::to_value(&value)?).await;
        Ok(value)
    }

    pub async fn invalidate(&self, key: &QueryKey) {
        if let Some(cache) = &self.inner {
            cache.invalidate(key).await;
        }
    }

    pub async fn invalidate_slots(&self, office_id: i64, date: NaiveDate) {
        self.invalidate(&QueryKey::Slots(office_id, date)).await;
    }

    /// 使所有預約列表失效（不論查詢條件）
    pub fn invalidate_appointments(&self) {
        if let Some(cache) = &self.inner {
            if let Err(e) =
                cache.invalidate_entries_if(|key, _| matches!(key, QueryKey::Appointments(_)))
            {
                tracing::warn!("⚠️ could not invalidate appointment lists: {}", e);
                cache.invalidate_all();
            }
        }
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn fetch_count(cache: &QueryCache, key: QueryKey, calls: &AtomicUsize) -> Vec<i64> {
        cache
            .get_or_fetch(key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1_i64, 2, 3])
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        assert_eq!(fetch_count(&cache, QueryKey::Offices, &calls).await, vec![1, 2, 3]);
        assert_eq!(fetch_count(&cache, QueryKey::Offices, &calls).await, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_slots_forces_refetch() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

        fetch_count(&cache, QueryKey::Slots(1, date), &calls).await;
        cache.invalidate_slots(1, date).await;
        fetch_count(&cache, QueryKey::Slots(1, date), &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_appointments_keeps_other_entries() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let appointment_calls = AtomicUsize::new(0);
        let office_calls = AtomicUsize::new(0);
        let by_office = QueryKey::Appointments(AppointmentFilter {
            office_id: Some(1),
            ..Default::default()
        });
        let everything = QueryKey::Appointments(AppointmentFilter::default());

        fetch_count(&cache, by_office.clone(), &appointment_calls).await;
        fetch_count(&cache, everything.clone(), &appointment_calls).await;
        fetch_count(&cache, QueryKey::Offices, &office_calls).await;

        cache.invalidate_appointments();

        fetch_count(&cache, by_office, &appointment_calls).await;
        fetch_count(&cache, everything, &appointment_calls).await;
        fetch_count(&cache, QueryKey::Offices, &office_calls).await;
        assert_eq!(appointment_calls.load(Ordering::SeqCst), 4);
        assert_eq!(office_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_fetches() {
        let cache = QueryCache::new(Duration::ZERO);
        let calls = AtomicUsize::new(0);
        assert!(!cache.is_enabled());

        fetch_count(&cache, QueryKey::Hosts(3), &calls).await;
        fetch_count(&cache, QueryKey::Hosts(3), &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_errors_are_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let failed: Result<Vec<i64>> = cache
            .get_or_fetch(QueryKey::Offices, || async {
                Err(crate::utils::error::BookingError::Unauthorized)
            })
            .await;
        assert!(failed.is_err());

        let calls = AtomicUsize::new(0);
        fetch_count(&cache, QueryKey::Offices, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
