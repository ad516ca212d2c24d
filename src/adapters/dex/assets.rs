//! DEX asset index resolution (spec §4.10): canonical symbol -> integer
//! asset index, with cached venue metadata refreshed periodically.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Copy)]
pub struct AssetMeta {
    pub asset_index: u32,
    pub sz_decimals: u32,
}

pub struct AssetTable {
    by_symbol: RwLock<HashMap<String, AssetMeta>>,
}

impl Default for AssetTable {
    fn default() -> Self {
        let mut seed = HashMap::new();
        seed.insert("BTC-USDT-PERP".to_string(), AssetMeta { asset_index: 0, sz_decimals: 5 });
        seed.insert("ETH-USDT-PERP".to_string(), AssetMeta { asset_index: 1, sz_decimals: 4 });
        Self {
            by_symbol: RwLock::new(seed),
        }
    }
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, symbol: &str) -> Result<AssetMeta> {
        self.by_symbol
            .read()
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.to_string()))
    }

    /// Overwrites the cached metadata, e.g. after a periodic refresh against
    /// the venue's metadata endpoint.
    pub fn refresh(&self, entries: Vec<(String, AssetMeta)>) {
        let mut table = self.by_symbol.write();
        table.clear();
        table.extend(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_seeded_symbols() {
        let table = AssetTable::new();
        let meta = table.resolve("BTC-USDT-PERP").unwrap();
        assert_eq!(meta.asset_index, 0);
        assert_eq!(meta.sz_decimals, 5);
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let table = AssetTable::new();
        assert!(table.resolve("DOGE-USDT-PERP").is_err());
    }

    #[test]
    fn refresh_replaces_the_whole_table() {
        let table = AssetTable::new();
        table.refresh(vec![("SOL-USDT-PERP".to_string(), AssetMeta { asset_index: 5, sz_decimals: 2 })]);
        assert!(table.resolve("BTC-USDT-PERP").is_err());
        assert_eq!(table.resolve("SOL-USDT-PERP").unwrap().asset_index, 5);
    }
}
