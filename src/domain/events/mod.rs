//! Domain events
use crate::domain::value_objects::{Market, Tier};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub enum DomainEvent {
    Pricing(PricingEvent),
    Quote(QuoteEvent),
}

#[derive(Clone, Debug)]
pub enum PricingEvent {
    BasePriceChanged { variant_id: Uuid },
    MarketCellEdited { variant_id: Uuid, market: Market, tier: Tier },
}

#[derive(Clone, Debug)]
pub enum QuoteEvent {
    LineAdded { variant_id: Uuid },
    TierSwitched { from: Tier, to: Tier },
}
