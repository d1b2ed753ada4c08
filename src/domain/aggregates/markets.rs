//! Market price reconciliation
//!
//! Keeps markup percent and absolute sell price consistent for every
//! (market, tier) cell of a variant: `price = round2(base * (1 + pct/100) * rate)`.
//! Percents are sticky; base-price edits flow downstream into prices, never
//! upstream into percents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::events::{DomainEvent, PricingEvent};
use crate::domain::value_objects::{round2, Market, Tier};
use super::settings::PricingSettings;
use super::tiers::{base_unit_price, resolve_tier, VariantBasePrice};

/// Sell price for one (market, tier) cell, tagged with the market it belongs
/// to. Two markets may share a currency code, so the tag is authoritative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketTierPrice {
    pub market: Market,
    pub tier: Tier,
    pub percent: Decimal,
    pub price: Decimal,
}

/// Converts a markup percent into an absolute market price.
pub fn price_from_percent(base: Decimal, percent: Decimal, rate: Decimal) -> Decimal {
    round2(base * (Decimal::ONE + percent / Decimal::ONE_HUNDRED) * rate)
}

/// Inverse of `price_from_percent`. A non-positive base or rate yields 0
/// rather than an error, so callers never see NaN or infinity.
pub fn percent_from_price(base: Decimal, price: Decimal, rate: Decimal) -> Decimal {
    if base <= Decimal::ZERO || rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round2((price / (base * rate) - Decimal::ONE) * Decimal::ONE_HUNDRED)
}

/// The full market x tier grid of reconciled prices for one variant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketPriceMatrix {
    cells: Vec<MarketTierPrice>,
}

impl MarketPriceMatrix {
    pub fn from_cells(cells: Vec<MarketTierPrice>) -> Self { Self { cells } }
    pub fn cells(&self) -> &[MarketTierPrice] { &self.cells }
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    pub fn get(&self, market: Market, tier: Tier) -> Option<&MarketTierPrice> {
        self.cells.iter().find(|c| c.market == market && c.tier == tier)
    }

    fn upsert(&mut self, cell: MarketTierPrice) {
        match self.cells.iter_mut().find(|c| c.market == cell.market && c.tier == cell.tier) {
            Some(existing) => *existing = cell,
            None => self.cells.push(cell),
        }
    }
}

/// Per-variant pricing snapshot: optional flat base price, supplier tier
/// bands, and the reconciled market grid.
#[derive(Clone, Debug)]
pub struct VariantPricing {
    variant_id: Uuid,
    flat_price: Option<Decimal>,
    base_tiers: Vec<VariantBasePrice>,
    markets: MarketPriceMatrix,
    events: Vec<DomainEvent>,
}

impl VariantPricing {
    /// Builds the snapshot and reconciles every cell. Cells already present in
    /// `existing` keep their percent (recomputing price from the current base
    /// and rate); missing cells are seeded from the settings defaults.
    pub fn initialize(
        variant_id: Uuid,
        flat_price: Option<Decimal>,
        base_tiers: Vec<VariantBasePrice>,
        existing: MarketPriceMatrix,
        settings: &PricingSettings,
    ) -> Self {
        let mut pricing = Self { variant_id, flat_price, base_tiers, markets: existing, events: vec![] };
        pricing.reconcile_all(settings);
        pricing
    }

    pub fn variant_id(&self) -> Uuid { self.variant_id }
    pub fn base_tiers(&self) -> &[VariantBasePrice] { &self.base_tiers }
    pub fn markets(&self) -> &MarketPriceMatrix { &self.markets }

    pub fn resolve_tier(&self, quantity: u32) -> Tier {
        resolve_tier(&self.base_tiers, quantity)
    }

    /// Sell price for a cell; falls back to the variant's flat price when the
    /// cell is absent, then to zero. Never fails.
    pub fn unit_price(&self, market: Market, tier: Tier) -> Decimal {
        if let Some(cell) = self.markets.get(market, tier) {
            return cell.price;
        }
        self.flat_price.unwrap_or(Decimal::ZERO)
    }

    /// Operator edited the percent: keep it (rounded) and re-derive the price.
    pub fn set_percent(&mut self, market: Market, tier: Tier, percent: Decimal, settings: &PricingSettings) {
        let percent = round2(percent);
        let price = price_from_percent(self.base_for(tier), percent, settings.rate(market));
        self.markets.upsert(MarketTierPrice { market, tier, percent, price });
        self.raise_event(DomainEvent::Pricing(PricingEvent::MarketCellEdited { variant_id: self.variant_id, market, tier }));
    }

    /// Operator edited the price: keep it (rounded) and re-derive the percent.
    pub fn set_price(&mut self, market: Market, tier: Tier, price: Decimal, settings: &PricingSettings) {
        let price = round2(price);
        let percent = percent_from_price(self.base_for(tier), price, settings.rate(market));
        self.markets.upsert(MarketTierPrice { market, tier, percent, price });
        self.raise_event(DomainEvent::Pricing(PricingEvent::MarketCellEdited { variant_id: self.variant_id, market, tier }));
    }

    /// Supplier base prices changed: replace the bands and re-derive every
    /// price from each cell's existing percent. Percents are never touched.
    pub fn apply_base_change(&mut self, new_base_tiers: Vec<VariantBasePrice>, settings: &PricingSettings) {
        self.base_tiers = new_base_tiers;
        self.reconcile_all(settings);
        self.raise_event(DomainEvent::Pricing(PricingEvent::BasePriceChanged { variant_id: self.variant_id }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }

    fn base_for(&self, tier: Tier) -> Decimal {
        base_unit_price(&self.base_tiers, tier)
            .or(self.flat_price)
            .unwrap_or(Decimal::ZERO)
    }

    fn reconcile_all(&mut self, settings: &PricingSettings) {
        let mut cells = Vec::with_capacity(Market::ALL.len() * Tier::ALL.len());
        for market in Market::ALL {
            for tier in Tier::ALL {
                let percent = self
                    .markets
                    .get(market, tier)
                    .map(|c| c.percent)
                    .unwrap_or_else(|| settings.default_percent(market, tier));
                let price = price_from_percent(self.base_for(tier), percent, settings.rate(market));
                cells.push(MarketTierPrice { market, tier, percent, price });
            }
        }
        self.markets = MarketPriceMatrix::from_cells(cells);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use crate::domain::aggregates::settings::MarketDefaults;

    fn settings() -> PricingSettings {
        PricingSettings::default()
    }

    fn one_band(price: Decimal) -> Vec<VariantBasePrice> {
        vec![VariantBasePrice { tier: Tier::Inicial, min_qty: 1, unit_price: price }]
    }

    #[test]
    fn test_percent_price_round_trip() {
        for (base, percent, rate) in [
            (dec!(10), dec!(300), dec!(1)),
            (dec!(7.35), dec!(180), dec!(6.95)),
            (dec!(0.5), dec!(25.5), dec!(550)),
        ] {
            let price = price_from_percent(base, percent, rate);
            let back = percent_from_price(base, price, rate);
            assert!((back - percent).abs() <= dec!(0.01), "base={base} percent={percent} rate={rate} back={back}");
        }
    }

    #[test]
    fn test_zero_safety() {
        assert_eq!(percent_from_price(dec!(0), dec!(50), dec!(1)), dec!(0));
        assert_eq!(percent_from_price(dec!(10), dec!(50), dec!(0)), dec!(0));
        assert_eq!(price_from_percent(dec!(0), dec!(300), dec!(1)), dec!(0));
    }

    #[test]
    fn test_base_change_keeps_percents_sticky() {
        let id = Uuid::new_v4();
        let s = settings();
        let mut pricing = VariantPricing::initialize(id, None, one_band(dec!(10)), MarketPriceMatrix::default(), &s);
        let cell = pricing.markets().get(Market::China, Tier::Inicial).unwrap();
        assert_eq!(cell.percent, dec!(300));
        assert_eq!(cell.price, dec!(40.00));

        pricing.apply_base_change(one_band(dec!(20)), &s);
        let cell = pricing.markets().get(Market::China, Tier::Inicial).unwrap();
        assert_eq!(cell.percent, dec!(300));
        assert_eq!(cell.price, dec!(80.00));
    }

    #[test]
    fn test_initialize_seeds_missing_cells_from_defaults() {
        let mut markets = HashMap::new();
        markets.insert(Market::Colombia, MarketDefaults { rate: dec!(550), markup_percents: [dec!(150), dec!(120), dec!(100)] });
        let s = PricingSettings { markets, ..PricingSettings::default() };

        let pricing = VariantPricing::initialize(Uuid::new_v4(), None, one_band(dec!(2)), MarketPriceMatrix::default(), &s);
        let cell = pricing.markets().get(Market::Colombia, Tier::Inicial).unwrap();
        assert_eq!(cell.percent, dec!(150));
        assert_eq!(cell.price, dec!(2750.00)); // 2 * 2.5 * 550
    }

    #[test]
    fn test_initialize_keeps_existing_percents() {
        let s = settings();
        let existing = MarketPriceMatrix::from_cells(vec![MarketTierPrice {
            market: Market::Argentina,
            tier: Tier::Inicial,
            percent: dec!(120),
            price: dec!(999), // stale on purpose
        }]);
        let pricing = VariantPricing::initialize(Uuid::new_v4(), None, one_band(dec!(10)), existing, &s);
        let cell = pricing.markets().get(Market::Argentina, Tier::Inicial).unwrap();
        assert_eq!(cell.percent, dec!(120));
        assert_eq!(cell.price, dec!(22.00));
    }

    #[test]
    fn test_edit_reconciliation_both_directions() {
        let s = settings();
        let mut pricing = VariantPricing::initialize(Uuid::new_v4(), None, one_band(dec!(10)), MarketPriceMatrix::default(), &s);

        pricing.set_percent(Market::China, Tier::Inicial, dec!(150), &s);
        assert_eq!(pricing.markets().get(Market::China, Tier::Inicial).unwrap().price, dec!(25.00));

        pricing.set_price(Market::China, Tier::Inicial, dec!(30), &s);
        assert_eq!(pricing.markets().get(Market::China, Tier::Inicial).unwrap().percent, dec!(200.00));
        assert_eq!(pricing.take_events().len(), 2);
    }

    #[test]
    fn test_flat_price_fallback() {
        let pricing = VariantPricing {
            variant_id: Uuid::new_v4(),
            flat_price: Some(dec!(12.50)),
            base_tiers: vec![],
            markets: MarketPriceMatrix::default(),
            events: vec![],
        };
        assert_eq!(pricing.unit_price(Market::Argentina, Tier::Mayorista), dec!(12.50));
        let none = VariantPricing { flat_price: None, ..pricing };
        assert_eq!(none.unit_price(Market::Argentina, Tier::Mayorista), dec!(0));
    }
}
