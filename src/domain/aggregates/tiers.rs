//! Base-currency tier definitions and tier resolution

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::Tier;

/// One supplier-side price band for a variant, denominated in CNY.
/// `min_qty` must be strictly increasing across inicial < mayorista
/// < distribuidor for a given variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantBasePrice {
    pub tier: Tier,
    pub min_qty: u32,
    pub unit_price: Decimal,
}

/// Picks the highest tier whose minimum quantity is covered by `quantity`.
/// Falls back to `inicial` when nothing qualifies, including when the variant
/// has no tier definitions at all (the flat base price then applies).
pub fn resolve_tier(tiers: &[VariantBasePrice], quantity: u32) -> Tier {
    let mut sorted: Vec<&VariantBasePrice> = tiers.iter().collect();
    sorted.sort_by(|a, b| b.min_qty.cmp(&a.min_qty));
    sorted
        .into_iter()
        .find(|t| t.min_qty <= quantity)
        .map(|t| t.tier)
        .unwrap_or(Tier::Inicial)
}

/// Base unit price for a tier, if the variant defines that band.
pub fn base_unit_price(tiers: &[VariantBasePrice], tier: Tier) -> Option<Decimal> {
    tiers.iter().find(|t| t.tier == tier).map(|t| t.unit_price)
}
