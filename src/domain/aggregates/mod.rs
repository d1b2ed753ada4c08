//! Aggregates module
pub mod markets;
pub mod quote;
pub mod settings;
pub mod tiers;

pub use markets::{percent_from_price, price_from_percent, MarketPriceMatrix, MarketTierPrice, VariantPricing};
pub use quote::{meets_minimum, AddOns, Quote, QuoteError, QuoteLine, QuoteTotals};
pub use settings::{MarketDefaults, PricingSettings};
pub use tiers::{base_unit_price, resolve_tier, VariantBasePrice};
