//! Currency Registry
//!
//! Immutable currency descriptors interned in a process-wide registry keyed
//! by code. The standard majors are pre-registered; custom currencies can be
//! added at startup.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::enums::CurrencyKind;
use crate::error::ValueError;

/// Immutable currency descriptor: ISO 4217 code or crypto ticker, the number
/// of decimal places for amounts, and its classification.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub precision: u8,
    pub kind: CurrencyKind,
}

impl Currency {
    pub fn new(code: impl Into<String>, precision: u8, kind: CurrencyKind) -> Self {
        Self {
            code: code.into().to_uppercase(),
            precision,
            kind,
        }
    }

    /// Look up a currency in the process-wide registry.
    pub fn from_code(code: &str) -> Result<Self, ValueError> {
        let code = code.to_uppercase();
        REGISTRY
            .read()
            .get(&code)
            .cloned()
            .ok_or(ValueError::UnknownCurrency(code))
    }

    /// Register (or replace) a currency in the process-wide registry.
    pub fn register(currency: Currency) {
        REGISTRY.write().insert(currency.code.clone(), currency);
    }
}

// Currencies are equal when their codes match; precision and kind are
// attributes of the interned definition, not part of identity.
impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl std::hash::Hash for Currency {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, Currency>> = {
        let mut m = HashMap::new();
        for (code, precision, kind) in [
            ("USD", 2, CurrencyKind::Fiat),
            ("EUR", 2, CurrencyKind::Fiat),
            ("GBP", 2, CurrencyKind::Fiat),
            ("JPY", 0, CurrencyKind::Fiat),
            ("CHF", 2, CurrencyKind::Fiat),
            ("CAD", 2, CurrencyKind::Fiat),
            ("AUD", 2, CurrencyKind::Fiat),
            ("HKD", 2, CurrencyKind::Fiat),
            ("BTC", 8, CurrencyKind::Crypto),
            ("ETH", 8, CurrencyKind::Crypto),
            ("USDT", 2, CurrencyKind::Crypto),
            ("USDC", 2, CurrencyKind::Crypto),
            ("SOL", 8, CurrencyKind::Crypto),
            ("XAU", 3, CurrencyKind::Commodity),
        ] {
            m.insert(code.to_string(), Currency::new(code, precision, kind));
        }
        RwLock::new(m)
    };
}

/// Convenience accessor for the USD definition.
pub fn usd() -> Currency {
    Currency::from_code("USD").expect("USD is pre-registered")
}
