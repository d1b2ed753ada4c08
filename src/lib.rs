//! Multimarket Commerce Pricing
//!
//! Pricing core for a multi-market storefront: supplier base prices in CNY,
//! tiered sell prices per target market (Argentina/USD, Colombia/COP,
//! China/USD), order totals with optional add-on services.
//!
//! ## Features
//! - Quantity-driven tier resolution (inicial / mayorista / distribuidor)
//! - Markup percent <-> sell price reconciliation per market and tier
//! - Order quote aggregation with add-ons and minimum-order gating
//! - Market-tagged persistence rows (no currency-code guessing)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod domain;

use crate::domain::aggregates::{MarketPriceMatrix, MarketTierPrice, PricingSettings, VariantBasePrice};

// =============================================================================
// Persistence Rows
// =============================================================================

/// Singleton settings record; `markets` is the jsonb-encoded
/// market -> {rate, markup_percents} map.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SettingsRow {
    pub id: i32,
    pub markets: serde_json::Value,
    pub labeling_pct: Decimal,
    pub packaging_pct: Decimal,
    pub barcode_fee: Decimal,
    pub photos_fee: Decimal,
    pub min_order: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Supplier price band for one variant, base (CNY) currency.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BaseTierRow {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub tier: String,
    pub min_qty: i32,
    pub unit_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Reconciled sell price for one (variant, market, tier) cell. The market
/// column is authoritative; `currency` is denormalized for display only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MarketTierRow {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub market: String,
    pub tier: String,
    pub percent: Decimal,
    pub price: Decimal,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum PricingServiceError {
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Malformed settings record: {0}")]
    MalformedSettings(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, PricingServiceError>;

// =============================================================================
// Row <-> Domain Conversions
// =============================================================================

impl TryFrom<SettingsRow> for PricingSettings {
    type Error = PricingServiceError;

    fn try_from(row: SettingsRow) -> Result<Self> {
        let markets = serde_json::from_value(row.markets)
            .map_err(|e| PricingServiceError::MalformedSettings(e.to_string()))?;
        Ok(PricingSettings {
            markets,
            labeling_pct: row.labeling_pct,
            packaging_pct: row.packaging_pct,
            barcode_fee: row.barcode_fee,
            photos_fee: row.photos_fee,
            min_order: row.min_order,
        })
    }
}

impl TryFrom<BaseTierRow> for VariantBasePrice {
    type Error = PricingServiceError;

    fn try_from(row: BaseTierRow) -> Result<Self> {
        let tier = row.tier.parse().map_err(|_| PricingServiceError::UnknownTier(row.tier))?;
        Ok(VariantBasePrice { tier, min_qty: row.min_qty.max(1) as u32, unit_price: row.unit_price })
    }
}

impl TryFrom<MarketTierRow> for MarketTierPrice {
    type Error = PricingServiceError;

    fn try_from(row: MarketTierRow) -> Result<Self> {
        let market = row.market.parse().map_err(|_| PricingServiceError::UnknownMarket(row.market))?;
        let tier = row.tier.parse().map_err(|_| PricingServiceError::UnknownTier(row.tier))?;
        Ok(MarketTierPrice { market, tier, percent: row.percent, price: row.price })
    }
}

/// Reassembles the market grid from its persisted rows.
pub fn matrix_from_rows(rows: Vec<MarketTierRow>) -> Result<MarketPriceMatrix> {
    let cells = rows.into_iter().map(MarketTierPrice::try_from).collect::<Result<Vec<_>>>()?;
    Ok(MarketPriceMatrix::from_cells(cells))
}

/// Converts base-tier rows, dropping nothing and preserving store order.
pub fn base_tiers_from_rows(rows: Vec<BaseTierRow>) -> Result<Vec<VariantBasePrice>> {
    rows.into_iter().map(VariantBasePrice::try_from).collect()
}
