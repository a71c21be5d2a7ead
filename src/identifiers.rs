//! Typed Identifiers
//!
//! Thin string newtypes so identifiers stay distinct types while remaining
//! hashable, comparable, and printable. Empty values are construction errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier; the value must be non-empty.
            pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ValueError::InvalidConstruction {
                        what: stringify!($name),
                        reason: "value cannot be empty".to_string(),
                    });
                }
                Ok(Self(value))
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique identifier for a trader instance.
    TraderId
);
string_id!(
    /// Unique identifier for a strategy.
    StrategyId
);
string_id!(
    /// Unique identifier for a non-trading actor component.
    ActorId
);
string_id!(
    /// Exchange / venue identifier.
    Venue
);
string_id!(
    /// Client-side order identifier (assigned by the strategy's order factory).
    ClientOrderId
);
string_id!(
    /// Venue-side order identifier (assigned by the simulated exchange).
    VenueOrderId
);
string_id!(
    /// Unique identifier for an individual trade/fill.
    TradeId
);
string_id!(
    /// Unique identifier for a position.
    PositionId
);
string_id!(
    /// Unique identifier for an account.
    AccountId
);
string_id!(
    /// Unique identifier for a contingency order list (OCO, OTO, OUO).
    OrderListId
);
string_id!(
    /// Unique identifier for a data/execution client.
    ClientId
);

/// Composite instrument identifier: `{symbol}.{venue}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId {
    pub symbol: String,
    pub venue: Venue,
}

impl InstrumentId {
    pub fn new(symbol: impl Into<String>, venue: Venue) -> Result<Self, ValueError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ValueError::InvalidConstruction {
                what: "InstrumentId",
                reason: "symbol cannot be empty".to_string(),
            });
        }
        Ok(Self { symbol, venue })
    }

    /// Parse from `"SYMBOL.VENUE"` format (venue is the last dot-segment).
    pub fn from_str(value: &str) -> Result<Self, ValueError> {
        match value.rsplit_once('.') {
            Some((symbol, venue)) if !symbol.is_empty() && !venue.is_empty() => {
                Ok(Self {
                    symbol: symbol.to_string(),
                    venue: Venue::new(venue)?,
                })
            }
            _ => Err(ValueError::InvalidConstruction {
                what: "InstrumentId",
                reason: format!("'{value}' (expected 'SYMBOL.VENUE')"),
            }),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.venue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let id = StrategyId::new("SMA-CROSS-01").unwrap();
        assert_eq!(id.as_str(), "SMA-CROSS-01");
        assert_eq!(id.to_string(), "SMA-CROSS-01");
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(TraderId::new("").is_err());
        assert!(TraderId::new("   ").is_err());
    }

    #[test]
    fn test_instrument_id_format() {
        let id = InstrumentId::new("AAPL", Venue::new("SIM").unwrap()).unwrap();
        assert_eq!(id.to_string(), "AAPL.SIM");
    }

    #[test]
    fn test_instrument_id_parse() {
        let id = InstrumentId::from_str("BTCUSDT.BINANCE").unwrap();
        assert_eq!(id.symbol, "BTCUSDT");
        assert_eq!(id.venue.as_str(), "BINANCE");

        // Symbols may themselves contain dots; venue is the last segment.
        let id = InstrumentId::from_str("BRK.B.NYSE").unwrap();
        assert_eq!(id.symbol, "BRK.B");
        assert_eq!(id.venue.as_str(), "NYSE");

        assert!(InstrumentId::from_str("NOVENUE").is_err());
    }
}
