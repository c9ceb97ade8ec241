//! # Scan Commands
//!
//! Decode a raw scan without touching the session.

use serde::Serialize;

use scanlot_core::barcode::{self, portion_grams};
use scanlot_core::{BarcodeFormat, Classification, DecodedItem, Money, ProductRelation};

use crate::error::CliResult;
use crate::state::AppContext;

/// Decoded scan plus what the local cache and relation table add to it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanView {
    pub item: DecodedItem,
    /// Cached (or default) price per kilo, weighted labels only.
    pub price_per_kilo: Option<Money>,
    /// Portion weight derived from the label price, weighted labels only.
    pub portion_grams: Option<i64>,
    /// Present when relations were requested.
    pub classification: Option<Classification>,
}

/// One input of `scanlot decode`: the view, or why it failed.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeOutcome {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decodes `raw`, classifying it when a relation map is given. Weighted
/// labels are classified by PLU.
pub async fn decode(
    ctx: &AppContext,
    raw: &str,
    relation: Option<&ProductRelation>,
) -> CliResult<ScanView> {
    let item = barcode::decode(raw)?;

    let (price_per_kilo, grams) = match (&item.format, &item.plu, item.unit_price) {
        (BarcodeFormat::Code128Weighted, Some(plu), Some(price)) => {
            let ppk = ctx.gateway.lookup_price_per_kilo(plu).await?;
            (Some(ppk), portion_grams(price, ppk))
        }
        _ => (None, None),
    };

    Ok(ScanView {
        classification: relation.map(|relation| relation.classify(item.product_code())),
        item,
        price_per_kilo,
        portion_grams: grams,
    })
}

/// Decodes every input. A bad scan is reported in its outcome and does not
/// stop the rest; `classify` loads the relation table once up front.
pub async fn decode_all(
    ctx: &AppContext,
    inputs: &[String],
    classify: bool,
) -> CliResult<Vec<DecodeOutcome>> {
    let relation = if classify {
        Some(ctx.gateway.load_relations().await?)
    } else {
        None
    };

    let mut outcomes = Vec::with_capacity(inputs.len());
    for input in inputs {
        let outcome = match decode(ctx, input, relation.as_ref()).await {
            Ok(view) => DecodeOutcome {
                input: input.clone(),
                scan: Some(view),
                error: None,
            },
            Err(e) => DecodeOutcome {
                input: input.clone(),
                scan: None,
                error: Some(e.to_string()),
            },
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
