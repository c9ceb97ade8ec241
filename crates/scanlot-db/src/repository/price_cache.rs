//! # Price Cache Repository
//!
//! PLU → price-per-kilo, so weighted labels can be interpreted while the
//! remote catalogue is unreachable. The most recent write for a PLU wins.
//!
//! ## Expiry
//! ```text
//! age = now - timestamp
//!
//! get_fresh(plu, ttl)   → None when age ≥ ttl days
//! purge(max_age_days)   → removes every record with age ≥ max_age_days
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::age;
use crate::error::DbResult;
use crate::store::{get_json, scan_json, set_json, KeyValueStore, Namespace};
use scanlot_core::{Money, PriceCacheRecord, ProductMeta};

/// Repository for cached prices.
#[derive(Clone)]
pub struct PriceCacheRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl PriceCacheRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        PriceCacheRepository { kv }
    }

    /// Stores a price stamped with the current time.
    pub async fn put(
        &self,
        plu: &str,
        price_per_kilo: Money,
        product_info: Option<ProductMeta>,
    ) -> DbResult<PriceCacheRecord> {
        let record = PriceCacheRecord {
            plu: plu.to_string(),
            price_per_kilo,
            product_info,
            timestamp: Utc::now(),
        };
        self.put_record(&record).await?;
        Ok(record)
    }

    /// Stores a record as given, keeping its timestamp.
    pub async fn put_record(&self, record: &PriceCacheRecord) -> DbResult<()> {
        debug!(plu = %record.plu, price = %record.price_per_kilo, "Caching price");
        set_json(
            self.kv.as_ref(),
            &Namespace::PRICE_CACHE.key(&record.plu),
            record,
        )
        .await
    }

    /// Returns the cached record for a PLU regardless of age.
    pub async fn get(&self, plu: &str) -> DbResult<Option<PriceCacheRecord>> {
        get_json(self.kv.as_ref(), &Namespace::PRICE_CACHE.key(plu)).await
    }

    /// Returns the cached record only if it is younger than `ttl_days`.
    pub async fn get_fresh(&self, plu: &str, ttl_days: u32) -> DbResult<Option<PriceCacheRecord>> {
        let now = Utc::now();
        Ok(self
            .get(plu)
            .await?
            .filter(|record| age(record.timestamp, now) < Duration::days(i64::from(ttl_days))))
    }

    /// Every cached record, ordered by PLU.
    pub async fn list(&self) -> DbResult<Vec<PriceCacheRecord>> {
        Ok(scan_json(self.kv.as_ref(), Namespace::PRICE_CACHE)
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Removes records at least `max_age_days` old. Returns how many were
    /// removed.
    pub async fn purge(&self, max_age_days: u32) -> DbResult<usize> {
        self.purge_as_of(max_age_days, Utc::now()).await
    }

    /// [`purge`](Self::purge) against an explicit clock.
    pub async fn purge_as_of(&self, max_age_days: u32, now: DateTime<Utc>) -> DbResult<usize> {
        let limit = Duration::days(i64::from(max_age_days));
        let mut removed = 0;

        for (key, record) in scan_json::<PriceCacheRecord>(self.kv.as_ref(), Namespace::PRICE_CACHE)
            .await?
        {
            if age(record.timestamp, now) >= limit && self.kv.remove(&key).await? {
                removed += 1;
            }
        }

        info!(removed, max_age_days, "Purged price cache");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    fn repo() -> PriceCacheRepository {
        PriceCacheRepository::new(Arc::new(MemoryKvStore::new()))
    }

    fn record(plu: &str, cents: i64, at: DateTime<Utc>) -> PriceCacheRecord {
        PriceCacheRecord {
            plu: plu.to_string(),
            price_per_kilo: Money::from_cents(cents),
            product_info: None,
            timestamp: at,
        }
    }

    #[tokio::test]
    async fn test_latest_write_wins() {
        let repo = repo();
        repo.put("8310", Money::from_cents(12_000), None).await.unwrap();
        repo.put("8310", Money::from_cents(12_500), Some(ProductMeta::new("Jamón", "kg")))
            .await
            .unwrap();

        let cached = repo.get("8310").await.unwrap().unwrap();
        assert_eq!(cached.price_per_kilo.cents(), 12_500);
        assert_eq!(cached.product_info.unwrap().name, "Jamón");
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_is_inclusive_at_the_boundary() {
        let repo = repo();
        let now = Utc::now();
        repo.put_record(&record("0001", 100, now - Duration::days(30)))
            .await
            .unwrap();
        repo.put_record(&record("0002", 100, now - Duration::days(29)))
            .await
            .unwrap();

        let removed = repo.purge_as_of(30, now).await.unwrap();

        assert_eq!(removed, 1);
        assert!(repo.get("0001").await.unwrap().is_none());
        assert!(repo.get("0002").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_fresh_ignores_expired() {
        let repo = repo();
        let now = Utc::now();
        repo.put_record(&record("0001", 100, now - Duration::days(31)))
            .await
            .unwrap();
        repo.put_record(&record("0002", 100, now - Duration::days(1)))
            .await
            .unwrap();

        assert!(repo.get_fresh("0001", 30).await.unwrap().is_none());
        assert!(repo.get_fresh("0002", 30).await.unwrap().is_some());
        assert!(repo.get_fresh("9999", 30).await.unwrap().is_none());
    }
}
