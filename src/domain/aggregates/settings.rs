//! Pricing settings (rate & markup table)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::domain::value_objects::{Market, Tier};

/// Per-market configuration: the CNY conversion rate and the default markup
/// percent for each tier, applied when a variant's market prices are first
/// seeded. Editing these never retroactively reprices existing variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketDefaults {
    pub rate: Decimal,
    pub markup_percents: [Decimal; 3],
}

impl Default for MarketDefaults {
    fn default() -> Self {
        let markup = Decimal::new(300, 0);
        Self { rate: Decimal::ONE, markup_percents: [markup, markup, markup] }
    }
}

/// Singleton administrative settings. Absence of a persisted record is not an
/// error; callers fall back to `PricingSettings::default()`. A zero or negative
/// rate is accepted on save but makes reconciler output meaningless, that is
/// the operator's responsibility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    pub markets: HashMap<Market, MarketDefaults>,
    pub labeling_pct: Decimal,
    pub packaging_pct: Decimal,
    pub barcode_fee: Decimal,
    pub photos_fee: Decimal,
    pub min_order: Decimal,
}

impl Default for PricingSettings {
    fn default() -> Self {
        let markets = Market::ALL.iter().map(|m| (*m, MarketDefaults::default())).collect();
        Self {
            markets,
            labeling_pct: Decimal::TWO,
            packaging_pct: Decimal::TWO,
            barcode_fee: Decimal::ONE,
            photos_fee: Decimal::TEN,
            min_order: Decimal::ONE_HUNDRED,
        }
    }
}

impl PricingSettings {
    pub fn rate(&self, market: Market) -> Decimal {
        self.markets.get(&market).map(|d| d.rate).unwrap_or(Decimal::ONE)
    }

    pub fn default_percent(&self, market: Market, tier: Tier) -> Decimal {
        self.markets
            .get(&market)
            .map(|d| d.markup_percents[tier.index()])
            .unwrap_or_else(|| MarketDefaults::default().markup_percents[tier.index()])
    }
}
