//! Price/size string formatting for the DEX adapter (spec §4.10), delegating
//! the actual canonicalization rules to [`crate::signing::dex`] since the
//! signer must format the exact same way it signs.

use crate::error::Result;
use crate::signing::dex::{format_price, format_size};

pub fn format_order_price(price: &str) -> Result<String> {
    format_price(price)
}

pub fn format_order_size(size: &str, sz_decimals: u32) -> Result<String> {
    format_size(size, sz_decimals)
}
