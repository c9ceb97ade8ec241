//! # Session Commands
//!
//! Build up the batch session and commit it.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌──────────┐  add / feed / manual  ┌──────────┐  commit  ┌──────────┐  │
//! │  │  Empty   │──────────────────────►│ Scanning │─────────►│ Committed│  │
//! │  │ session  │                       │          │          │ (local + │  │
//! │  └──────────┘◄──────── clear ───────│ update   │          │  remote/ │  │
//! │       ▲                             │ remove   │          │  queue)  │  │
//! │       │                             └──────────┘          └────┬─────┘  │
//! │       └────────────────────────────────────────────────────────┘        │
//! │                        (session emptied on commit)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::io::BufRead;
use tracing::{debug, warn};

use scanlot_core::barcode::{self, ScanDebouncer};
use scanlot_core::{
    BatchSession, DecodedItem, Money, ProductMeta, SessionEntry, SessionTotals,
};
use scanlot_sync::CommitOutcome;

use crate::error::CliResult;
use crate::state::AppContext;

/// Catalogue data given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ProductArgs {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub variant: Option<String>,
}

/// Entries and totals, as printed by `session list`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub entries: Vec<SessionEntry>,
    pub totals: SessionTotals,
}

impl From<&BatchSession> for SessionView {
    fn from(session: &BatchSession) -> Self {
        SessionView {
            entries: session.entries().to_vec(),
            totals: session.totals(),
        }
    }
}

/// Outcome of feeding a stream of scans.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedSummary {
    pub accepted: usize,
    /// Repeated reads inside the debounce window.
    pub suppressed: usize,
    /// `line: error` for scans that did not decode or validate.
    pub rejected: Vec<String>,
}

/// Catalogue data for a scan: the cached product info for weighted PLUs,
/// overridden by whatever was given explicitly. Falls back to the code as
/// the name and `pz` as the unit.
async fn resolve_meta(
    ctx: &AppContext,
    item: &DecodedItem,
    args: &ProductArgs,
) -> CliResult<ProductMeta> {
    let cached = match &item.plu {
        Some(plu) => ctx
            .gateway
            .cached_price(plu)
            .await?
            .and_then(|record| record.product_info),
        None => None,
    };

    let mut meta = cached.unwrap_or_default();
    if let Some(name) = &args.name {
        meta.name = name.clone();
    }
    if let Some(unit) = &args.unit {
        meta.unit = unit.clone();
    }
    if args.brand.is_some() {
        meta.brand = args.brand.clone();
    }
    if args.category.is_some() {
        meta.category = args.category.clone();
    }
    if let Some(cents) = args.price_cents {
        meta.unit_price = Some(Money::from_cents(cents));
    }
    if args.variant.is_some() {
        meta.variant = args.variant.clone();
    }

    if meta.name.trim().is_empty() {
        meta.name = item.code.clone();
    }
    if meta.unit.trim().is_empty() {
        meta.unit = "pz".to_string();
    }
    Ok(meta)
}

/// Decodes `raw` and adds `qty` of it.
pub async fn add(
    ctx: &AppContext,
    session: &mut BatchSession,
    raw: &str,
    args: &ProductArgs,
    qty: i64,
) -> CliResult<SessionEntry> {
    let item = barcode::decode(raw)?;
    let meta = resolve_meta(ctx, &item, args).await?;
    let entry = session.add_entry(&item, &meta, qty)?;
    debug!(code = %entry.code, quantity = entry.quantity, "Session entry added");
    Ok(entry.clone())
}

/// Adds a keyboard-entered code at an explicit price.
pub fn manual(
    session: &mut BatchSession,
    code: &str,
    args: &ProductArgs,
    qty: i64,
    price_cents: i64,
) -> CliResult<SessionEntry> {
    let mut meta = ProductMeta::new(
        args.name.clone().unwrap_or_else(|| code.trim().to_string()),
        args.unit.clone().unwrap_or_else(|| "pz".to_string()),
    );
    meta.brand = args.brand.clone();
    meta.category = args.category.clone();
    meta.variant = args.variant.clone();

    let entry = session.add_manual(code, &meta, qty, Money::from_cents(price_cents))?;
    Ok(entry.clone())
}

/// Adds one unit per scanned line, dropping scanner repeats.
pub async fn feed<R: BufRead>(
    ctx: &AppContext,
    session: &mut BatchSession,
    input: R,
) -> CliResult<FeedSummary> {
    let mut debouncer = ScanDebouncer::new(ctx.config.session.debounce_ms);
    let mut summary = FeedSummary::default();
    let args = ProductArgs::default();

    for line in input.lines() {
        let line = line.map_err(|e| crate::error::CliError::Usage(e.to_string()))?;
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        if !debouncer.accept(raw, chrono::Utc::now()) {
            summary.suppressed += 1;
            continue;
        }
        match add(ctx, session, raw, &args, 1).await {
            Ok(_) => summary.accepted += 1,
            Err(e) => {
                warn!(scan = %raw, error = %e, "Scan rejected");
                summary.rejected.push(format!("{}: {}", raw, e));
            }
        }
    }

    Ok(summary)
}

pub fn update(session: &mut BatchSession, index: usize, qty: i64) -> CliResult<SessionEntry> {
    Ok(session.update_quantity(index, qty)?.clone())
}

pub fn remove(session: &mut BatchSession, index: usize) -> CliResult<SessionEntry> {
    Ok(session.remove_at(index)?)
}

/// Commits the session through the gateway. The session is emptied only
/// when the local write succeeds.
pub async fn commit(
    ctx: &AppContext,
    session: &mut BatchSession,
    user: Option<&str>,
    location: Option<&str>,
) -> CliResult<CommitOutcome> {
    Ok(ctx.gateway.commit_session(session, user, location).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlot_core::INVENTORY_TABLE;
    use scanlot_sync::{InMemoryRemoteStore, ScanlotConfig};
    use std::io::Cursor;
    use std::sync::Arc;

    fn context() -> AppContext {
        AppContext::in_memory(ScanlotConfig::default(), None)
    }

    fn new_session(ctx: &AppContext) -> BatchSession {
        BatchSession::new(ctx.config.session.rules())
    }

    #[tokio::test]
    async fn test_add_uses_cached_product_info() {
        let ctx = context();
        ctx.gateway
            .cache_price(
                "8310",
                Money::from_cents(10000),
                Some(ProductMeta::new("Jamón", "kg")),
            )
            .await
            .unwrap();
        let mut session = new_session(&ctx);

        let entry = add(&ctx, &mut session, "283100000391746", &ProductArgs::default(), 1)
            .await
            .unwrap();

        assert_eq!(entry.name, "Jamón");
        assert_eq!(entry.unit, "kg");
        assert_eq!(entry.unit_price, Money::from_cents(3917));
    }

    #[tokio::test]
    async fn test_add_falls_back_to_code_as_name() {
        let ctx = context();
        let mut session = new_session(&ctx);
        let args = ProductArgs {
            price_cents: Some(1500),
            ..Default::default()
        };

        let entry = add(&ctx, &mut session, "4006381333931", &args, 2).await.unwrap();

        assert_eq!(entry.name, "4006381333931");
        assert_eq!(entry.subtotal, Money::from_cents(3000));
    }

    #[tokio::test]
    async fn test_feed_debounces_and_reports_rejects() {
        let ctx = context();
        let mut session = new_session(&ctx);
        let input = Cursor::new("283100000391746\n283100000391746\n\nnot a code\n283100000420046\n");

        let summary = feed(&ctx, &mut session, input).await.unwrap();

        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.suppressed, 1);
        assert_eq!(summary.rejected.len(), 1);
        assert!(summary.rejected[0].starts_with("not a code"));
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_offline_queues_and_clears() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        remote.set_reachable(false);
        let ctx = AppContext::in_memory(ScanlotConfig::default(), Some(remote.clone()));
        let mut session = new_session(&ctx);
        manual(&mut session, "ABC-12345", &ProductArgs::default(), 3, 990).unwrap();

        let outcome = commit(&ctx, &mut session, Some("ana"), Some("A-1")).await.unwrap();

        assert_eq!((outcome.stored, outcome.remote_written, outcome.queued), (1, 0, 1));
        assert!(session.is_empty());
        assert!(remote.rows(INVENTORY_TABLE).await.is_empty());
        assert_eq!(ctx.gateway.local().sync_queue().len().await.unwrap(), 1);
    }

    #[test]
    fn test_update_and_remove_by_index() {
        let mut session = BatchSession::new(Default::default());
        manual(&mut session, "ABC-12345", &ProductArgs::default(), 1, 100).unwrap();
        manual(&mut session, "XYZ-98765", &ProductArgs::default(), 1, 200).unwrap();

        let updated = update(&mut session, 1, 4).unwrap();
        assert_eq!(updated.subtotal, Money::from_cents(800));

        let removed = remove(&mut session, 0).unwrap();
        assert_eq!(removed.code, "ABC-12345");
        assert!(remove(&mut session, 5).is_err());

        let view = SessionView::from(&session);
        assert_eq!(view.totals.item_count, 1);
    }
}
