//! # Local Store Commands
//!
//! Export, backups and the price cache.

use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

use scanlot_core::{BackupSnapshot, BackupSummary, ExportFormat, Money, PriceCacheRecord, ProductMeta};

use crate::error::{CliError, CliResult};
use crate::state::AppContext;

// =============================================================================
// Export
// =============================================================================

/// Renders every local record in `format`, to `out` or as the return value.
pub async fn export(ctx: &AppContext, format: &str, out: Option<&Path>) -> CliResult<String> {
    let rendered = ctx.gateway.export_all(&ExportFormat::parse(format)).await?;
    if let Some(path) = out {
        std::fs::write(path, &rendered).map_err(|e| CliError::file(path, e))?;
        info!(?path, format, "Export written");
    }
    Ok(rendered)
}

// =============================================================================
// Backups
// =============================================================================

pub async fn backup_create(ctx: &AppContext) -> CliResult<BackupSummary> {
    Ok(ctx.gateway.create_backup().await?)
}

pub async fn backup_list(ctx: &AppContext) -> CliResult<Vec<BackupSummary>> {
    Ok(ctx.gateway.list_backups().await?)
}

/// The snapshot at `at` (RFC 3339), or the newest one.
pub async fn backup_restore(ctx: &AppContext, at: Option<&str>) -> CliResult<BackupSnapshot> {
    match at {
        Some(raw) => {
            let created_at = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| CliError::Usage(format!("invalid timestamp '{}': {}", raw, e)))?
                .with_timezone(&Utc);
            Ok(ctx.gateway.restore(created_at).await?)
        }
        None => ctx
            .gateway
            .restore_latest()
            .await?
            .ok_or_else(|| CliError::Usage("no backups stored".into())),
    }
}

/// Deletes backups older than `days` (default: configured retention).
pub async fn backup_prune(ctx: &AppContext, days: Option<u32>) -> CliResult<usize> {
    let days = days.unwrap_or(ctx.config.backup.retention_days);
    Ok(ctx.gateway.prune_backups(days).await?)
}

// =============================================================================
// Price Cache
// =============================================================================

pub async fn cache_set(
    ctx: &AppContext,
    plu: &str,
    price_per_kilo_cents: i64,
    name: Option<String>,
) -> CliResult<PriceCacheRecord> {
    if price_per_kilo_cents <= 0 {
        return Err(CliError::Usage("price per kilo must be positive".into()));
    }
    let info = name.map(|name| ProductMeta::new(name, "kg"));
    Ok(ctx
        .gateway
        .cache_price(plu, Money::from_cents(price_per_kilo_cents), info)
        .await?)
}

pub async fn cache_get(ctx: &AppContext, plu: &str) -> CliResult<Option<PriceCacheRecord>> {
    Ok(ctx.gateway.cached_price(plu).await?)
}

/// Purges records at least `days` old (default: configured TTL).
pub async fn cache_purge(ctx: &AppContext, days: Option<u32>) -> CliResult<usize> {
    let days = days.unwrap_or(ctx.config.cache.price_ttl_days);
    Ok(ctx.gateway.purge_price_cache(days).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlot_core::BatchSession;
    use scanlot_sync::ScanlotConfig;

    async fn context_with_records() -> AppContext {
        let ctx = AppContext::in_memory(ScanlotConfig::default(), None);
        let mut session = BatchSession::new(ctx.config.session.rules());
        session
            .add_manual("ABC-12345", &ProductMeta::new("Café", "pz"), 2, Money::from_cents(5000))
            .unwrap();
        ctx.gateway
            .commit_session(&mut session, None, Some("B-2"))
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_export_formats() {
        let ctx = context_with_records().await;

        let csv = export(&ctx, "csv", None).await.unwrap();
        assert!(csv.starts_with("code,name,brand,quantity,unit,date,location"));
        assert!(csv.contains("ABC-12345"));

        let json = export(&ctx, "JSON", None).await.unwrap();
        assert!(json.contains("\"code\": \"ABC-12345\""));

        let err = export(&ctx, "xlsx", None).await.unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[tokio::test]
    async fn test_backup_create_and_restore_latest() {
        let ctx = context_with_records().await;
        assert!(backup_restore(&ctx, None).await.is_err());

        let summary = backup_create(&ctx).await.unwrap();
        assert_eq!(summary.record_count, 1);

        let snapshot = backup_restore(&ctx, None).await.unwrap();
        assert_eq!(snapshot.records.len(), 1);

        let by_time = backup_restore(&ctx, Some(&summary.created_at.to_rfc3339()))
            .await
            .unwrap();
        assert_eq!(by_time.created_at, summary.created_at);

        assert!(backup_restore(&ctx, Some("yesterday")).await.is_err());
        assert_eq!(backup_prune(&ctx, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_commands() {
        let ctx = AppContext::in_memory(ScanlotConfig::default(), None);
        assert!(cache_set(&ctx, "8310", 0, None).await.is_err());

        cache_set(&ctx, "8310", 12000, Some("Queso".into())).await.unwrap();
        let record = cache_get(&ctx, "8310").await.unwrap().unwrap();
        assert_eq!(record.price_per_kilo, Money::from_cents(12000));

        // Fresh records survive a TTL purge, a zero-day purge takes everything
        assert_eq!(cache_purge(&ctx, None).await.unwrap(), 0);
        assert_eq!(cache_purge(&ctx, Some(0)).await.unwrap(), 1);
        assert!(cache_get(&ctx, "8310").await.unwrap().is_none());
    }
}
