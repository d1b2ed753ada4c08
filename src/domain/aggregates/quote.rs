//! Quote aggregate
//!
//! Ephemeral order view: a set of lines priced under one market and one
//! shared tier. Totals are always recomputed from scratch, never patched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::events::{DomainEvent, QuoteEvent};
use crate::domain::value_objects::{round2, Market, Tier};
use super::markets::VariantPricing;
use super::settings::PricingSettings;

/// Optional per-line services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddOns {
    pub labeling: bool,
    pub barcode: bool,
    pub photos: bool,
    pub packaging: bool,
}

#[derive(Clone, Debug)]
pub struct QuoteLine {
    pub pricing: VariantPricing,
    pub quantity: u32,
    pub add_ons: AddOns,
}

impl QuoteLine {
    /// Cost of the enabled add-ons. Labeling and packaging scale with the
    /// line's product value; barcode and photos are flat per-line fees.
    pub fn add_on_cost(&self, unit_price: Decimal, settings: &PricingSettings) -> Decimal {
        let qty = Decimal::from(self.quantity);
        let mut cost = Decimal::ZERO;
        if self.add_ons.labeling {
            cost += qty * unit_price * settings.labeling_pct / Decimal::ONE_HUNDRED;
        }
        if self.add_ons.packaging {
            cost += qty * unit_price * settings.packaging_pct / Decimal::ONE_HUNDRED;
        }
        if self.add_ons.barcode {
            cost += settings.barcode_fee;
        }
        if self.add_ons.photos {
            cost += settings.photos_fee;
        }
        round2(cost)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuoteTotals {
    pub item_count: u64,
    pub products_subtotal: Decimal,
    pub add_ons_subtotal: Decimal,
    pub grand_total: Decimal,
}

/// Checkout gate: the CTA stays disabled below the minimum order value.
pub fn meets_minimum(grand_total: Decimal, minimum: Decimal) -> bool {
    grand_total >= minimum
}

#[derive(Clone, Debug)]
pub struct Quote {
    market: Market,
    selected_tier: Tier,
    lines: Vec<QuoteLine>,
    events: Vec<DomainEvent>,
}

impl Quote {
    /// Mayorista is the storefront's starting tier.
    pub fn new(market: Market) -> Self {
        Self::with_tier(market, Tier::Mayorista)
    }

    pub fn with_tier(market: Market, tier: Tier) -> Self {
        Self { market, selected_tier: tier, lines: vec![], events: vec![] }
    }

    pub fn market(&self) -> Market { self.market }
    pub fn selected_tier(&self) -> Tier { self.selected_tier }
    pub fn lines(&self) -> &[QuoteLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn add_line(&mut self, pricing: VariantPricing, quantity: u32, add_ons: AddOns) {
        let variant_id = pricing.variant_id();
        self.lines.push(QuoteLine { pricing, quantity, add_ons });
        self.raise_event(DomainEvent::Quote(QuoteEvent::LineAdded { variant_id }));
    }

    /// Quantity edit on one line. The edited line becomes the focused line:
    /// its variant's tier bands are re-resolved and, if the resolved tier
    /// differs, the order-wide tier switches and every line reprices against
    /// it. Edits never trigger transitions from other, untouched lines.
    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> Result<(), QuoteError> {
        let line = self.lines.get_mut(index).ok_or(QuoteError::LineNotFound)?;
        line.quantity = quantity;
        let resolved = line.pricing.resolve_tier(quantity);
        if resolved != self.selected_tier {
            let from = self.selected_tier;
            self.selected_tier = resolved;
            self.raise_event(DomainEvent::Quote(QuoteEvent::TierSwitched { from, to: resolved }));
        }
        Ok(())
    }

    pub fn set_add_ons(&mut self, index: usize, add_ons: AddOns) -> Result<(), QuoteError> {
        let line = self.lines.get_mut(index).ok_or(QuoteError::LineNotFound)?;
        line.add_ons = add_ons;
        Ok(())
    }

    /// Active sell price for a line under the current market and tier.
    pub fn unit_price(&self, line: &QuoteLine) -> Decimal {
        line.pricing.unit_price(self.market, self.selected_tier)
    }

    pub fn line_total(&self, line: &QuoteLine, settings: &PricingSettings) -> Decimal {
        let unit = self.unit_price(line);
        round2(Decimal::from(line.quantity) * unit + line.add_on_cost(unit, settings))
    }

    /// Full recomputation across all lines. `item_count` is the sum of
    /// quantities, not the number of lines.
    pub fn totals(&self, settings: &PricingSettings) -> QuoteTotals {
        let mut totals = QuoteTotals::default();
        for line in &self.lines {
            let unit = self.unit_price(line);
            totals.item_count += u64::from(line.quantity);
            totals.products_subtotal += Decimal::from(line.quantity) * unit;
            totals.add_ons_subtotal += line.add_on_cost(unit, settings);
        }
        totals.products_subtotal = round2(totals.products_subtotal);
        totals.add_ons_subtotal = round2(totals.add_ons_subtotal);
        totals.grand_total = round2(totals.products_subtotal + totals.add_ons_subtotal);
        totals
    }

    pub fn meets_minimum(&self, settings: &PricingSettings) -> bool {
        meets_minimum(self.totals(settings).grand_total, settings.min_order)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone)] pub enum QuoteError { LineNotFound }
impl std::error::Error for QuoteError {}
impl std::fmt::Display for QuoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Line not found") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;
    use crate::domain::aggregates::markets::MarketPriceMatrix;
    use crate::domain::aggregates::tiers::VariantBasePrice;

    // Default settings are rate 1 / markup 300 everywhere, so a base band of
    // 0.50 sells at 2.00, 1.25 at 5.00, and so on.
    fn variant(bands: &[(Tier, u32, Decimal)]) -> VariantPricing {
        let tiers = bands
            .iter()
            .map(|(tier, min_qty, unit_price)| VariantBasePrice { tier: *tier, min_qty: *min_qty, unit_price: *unit_price })
            .collect();
        VariantPricing::initialize(Uuid::new_v4(), None, tiers, MarketPriceMatrix::default(), &PricingSettings::default())
    }

    #[test]
    fn test_line_with_labeling_and_barcode() {
        let settings = PricingSettings::default();
        let mut quote = Quote::with_tier(Market::China, Tier::Inicial);
        quote.add_line(variant(&[(Tier::Inicial, 1, dec!(0.50))]), 100, AddOns::default());
        quote.set_add_ons(0, AddOns { labeling: true, barcode: true, ..AddOns::default() }).unwrap();

        let line = &quote.lines()[0];
        assert_eq!(quote.unit_price(line), dec!(2.00));
        assert_eq!(line.add_on_cost(dec!(2.00), &settings), dec!(5.00)); // 100*2*2% + 1
        assert_eq!(quote.line_total(line, &settings), dec!(205.00));

        let totals = quote.totals(&settings);
        assert_eq!(totals.products_subtotal, dec!(200.00));
        assert_eq!(totals.add_ons_subtotal, dec!(5.00));
        assert_eq!(totals.grand_total, dec!(205.00));
    }

    #[test]
    fn test_two_lines_no_add_ons() {
        let settings = PricingSettings::default();
        let mut quote = Quote::with_tier(Market::China, Tier::Inicial);
        quote.add_line(variant(&[(Tier::Inicial, 1, dec!(1.25))]), 10, AddOns::default());
        quote.add_line(variant(&[(Tier::Inicial, 1, dec!(0.75))]), 20, AddOns::default());

        let totals = quote.totals(&settings);
        assert_eq!(totals.item_count, 30);
        assert_eq!(totals.products_subtotal, dec!(110.00));
        assert_eq!(totals.add_ons_subtotal, dec!(0));
        assert_eq!(totals.grand_total, dec!(110.00));
    }

    #[test]
    fn test_minimum_order_gate() {
        assert!(!meets_minimum(dec!(99.99), dec!(100)));
        assert!(meets_minimum(dec!(100.00), dec!(100)));
    }

    #[test]
    fn test_quantity_edit_switches_tier_and_reprices_all_lines() {
        let settings = PricingSettings::default();
        let bands = [
            (Tier::Inicial, 1, dec!(10)),
            (Tier::Mayorista, 50, dec!(8)),
            (Tier::Distribuidor, 100, dec!(6)),
        ];
        let mut quote = Quote::with_tier(Market::Argentina, Tier::Inicial);
        quote.add_line(variant(&bands), 10, AddOns::default());
        quote.add_line(variant(&bands), 10, AddOns::default());
        assert_eq!(quote.unit_price(&quote.lines()[1]), dec!(40.00));
        quote.take_events();

        quote.set_quantity(0, 75).unwrap();
        assert_eq!(quote.selected_tier(), Tier::Mayorista);
        // Both lines now price at the mayorista cell, including the untouched one.
        assert_eq!(quote.unit_price(&quote.lines()[0]), dec!(32.00));
        assert_eq!(quote.unit_price(&quote.lines()[1]), dec!(32.00));
        assert_eq!(quote.totals(&settings).products_subtotal, dec!(2720.00));
        assert!(matches!(
            quote.take_events().as_slice(),
            [DomainEvent::Quote(QuoteEvent::TierSwitched { from: Tier::Inicial, to: Tier::Mayorista })]
        ));

        // An edit that resolves to the already-selected tier is not a transition.
        quote.set_quantity(1, 60).unwrap();
        assert_eq!(quote.selected_tier(), Tier::Mayorista);
        assert!(quote.take_events().is_empty());
    }

    #[test]
    fn test_set_quantity_on_missing_line() {
        let mut quote = Quote::new(Market::Colombia);
        assert!(quote.set_quantity(3, 5).is_err());
        assert_eq!(quote.selected_tier(), Tier::Mayorista);
    }
}
