//! Value objects for multi-market pricing

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target sales market. Each market sells in its own currency at its own
/// CNY conversion rate. Argentina and China both price in USD, which is why
/// persisted records are tagged with the market itself, never just a currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Argentina,
    Colombia,
    China,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Argentina, Market::Colombia, Market::China];

    pub fn code(&self) -> &'static str {
        match self { Market::Argentina => "argentina", Market::Colombia => "colombia", Market::China => "china" }
    }

    pub fn currency(&self) -> &'static str {
        match self { Market::Argentina => "USD", Market::Colombia => "COP", Market::China => "USD" }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.code()) }
}

impl FromStr for Market {
    type Err = ParseMarketError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "argentina" => Ok(Market::Argentina),
            "colombia" => Ok(Market::Colombia),
            "china" => Ok(Market::China),
            _ => Err(ParseMarketError),
        }
    }
}

#[derive(Debug, Clone)] pub struct ParseMarketError;
impl std::error::Error for ParseMarketError {}
impl fmt::Display for ParseMarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown market") }
}

/// Purchase-volume band. Ordered by minimum quantity: inicial < mayorista
/// < distribuidor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Inicial,
    Mayorista,
    Distribuidor,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Inicial, Tier::Mayorista, Tier::Distribuidor];

    pub fn code(&self) -> &'static str {
        match self { Tier::Inicial => "inicial", Tier::Mayorista => "mayorista", Tier::Distribuidor => "distribuidor" }
    }

    /// Position in the ordered triple, used to index per-tier default markups.
    pub fn index(&self) -> usize {
        match self { Tier::Inicial => 0, Tier::Mayorista => 1, Tier::Distribuidor => 2 }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.code()) }
}

impl FromStr for Tier {
    type Err = ParseTierError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inicial" => Ok(Tier::Inicial),
            "mayorista" => Ok(Tier::Mayorista),
            "distribuidor" => Ok(Tier::Distribuidor),
            _ => Err(ParseTierError),
        }
    }
}

#[derive(Debug, Clone)] pub struct ParseTierError;
impl std::error::Error for ParseTierError {}
impl fmt::Display for ParseTierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown tier") }
}

/// Half-up rounding to 2 decimal places. Applied to every monetary output and
/// to markup percents, so percent -> price -> percent round-trips are stable.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_codes_round_trip() {
        for m in Market::ALL {
            assert_eq!(m.code().parse::<Market>().unwrap(), m);
        }
        assert!("peru".parse::<Market>().is_err());
    }

    #[test]
    fn test_shared_currency_code() {
        assert_eq!(Market::Argentina.currency(), Market::China.currency());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Inicial < Tier::Mayorista);
        assert!(Tier::Mayorista < Tier::Distribuidor);
        assert_eq!(Tier::Distribuidor.index(), 2);
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(1.004)), dec!(1.00));
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
    }
}
