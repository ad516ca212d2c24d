//! Symbol mapping between the venue's compact `BASEQUOTE` wire form and the
//! canonical `BASE-QUOTE[-PERP]` form (spec §8 round-trip property).

use std::collections::HashMap;

use crate::error::{GatewayError, Result};
use crate::model::Category;

/// Precision metadata for one symbol, used by order-builders to format
/// price/quantity strings to the venue's tick/lot size.
#[derive(Debug, Clone, Copy)]
pub struct SymbolPrecision {
    pub price_decimals: u32,
    pub qty_decimals: u32,
}

pub struct SymbolTable {
    native_to_canonical: HashMap<String, String>,
    canonical_to_native: HashMap<String, String>,
    precision: HashMap<String, SymbolPrecision>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut table = Self {
            native_to_canonical: HashMap::new(),
            canonical_to_native: HashMap::new(),
            precision: HashMap::new(),
        };
        // A representative seed set; production deployments extend this from
        // the venue's instrument-info endpoint at startup.
        table.register("BTCUSDT", "BTC-USDT", SymbolPrecision { price_decimals: 1, qty_decimals: 3 });
        table.register("ETHUSDT", "ETH-USDT", SymbolPrecision { price_decimals: 2, qty_decimals: 2 });
        table.register("BTCUSDT-PERP", "BTC-USDT-PERP", SymbolPrecision { price_decimals: 1, qty_decimals: 3 });
        table
    }
}

impl SymbolTable {
    fn register(&mut self, native: &str, canonical: &str, precision: SymbolPrecision) {
        self.native_to_canonical.insert(native.to_string(), canonical.to_string());
        self.canonical_to_native.insert(canonical.to_string(), native.to_string());
        self.precision.insert(canonical.to_string(), precision);
    }

    pub fn to_canonical(&self, native: &str) -> Result<String> {
        self.native_to_canonical
            .get(native)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownSymbol(native.to_string()))
    }

    pub fn to_native(&self, canonical: &str, category: Option<Category>) -> Result<String> {
        // Perpetual category symbols are quoted without the "-PERP" suffix
        // on some endpoints; this table is keyed on the canonical form as
        // registered, so callers pass the exact canonical symbol they hold.
        let _ = category;
        self.canonical_to_native
            .get(canonical)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownSymbol(canonical.to_string()))
    }

    pub fn precision(&self, canonical: &str) -> Option<SymbolPrecision> {
        self.precision.get(canonical).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_registered_symbol() {
        let table = SymbolTable::default();
        for native in ["BTCUSDT", "ETHUSDT", "BTCUSDT-PERP"] {
            let canonical = table.to_canonical(native).unwrap();
            let back = table.to_native(&canonical, None).unwrap();
            assert_eq!(back, native);
        }
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let table = SymbolTable::default();
        assert!(table.to_canonical("DOGEUSDT").is_err());
    }
}
