//! SQLite-backed [`KeyValueStore`] over the `kv_store` table.

use async_trait::async_trait;
use chrono::Utc;

use super::KeyValueStore;
use crate::error::DbResult;
use crate::pool::Database;

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> DbResult<()> {
        let updated_at = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<(String, String)>> {
        // substr() rather than LIKE: keys may contain '%' or '_'
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT key, value FROM kv_store
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn increment(&self, key: &str) -> DbResult<u64> {
        let next: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, '1', ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = CAST(CAST(value AS INTEGER) + 1 AS TEXT),
                updated_at = excluded.updated_at
            RETURNING CAST(value AS INTEGER)
            "#,
        )
        .bind(key)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(self.pool())
        .await?;
        Ok(next as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::DbConfig;
    use crate::store::assert_store_contract;

    #[tokio::test]
    async fn test_sqlite_store_contract() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_store_contract(&db).await;
    }

    #[tokio::test]
    async fn test_prefix_with_like_wildcards() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.set("a_b:1", "x").await.unwrap();
        db.set("axb:1", "y").await.unwrap();

        let scanned = db.scan_prefix("a_b:").await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].1, "x");
    }

    #[tokio::test]
    async fn test_closed_database_is_unavailable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        let err = db.get("anything").await.unwrap_err();
        assert!(matches!(err, DbError::Unavailable(_)));
    }
}
