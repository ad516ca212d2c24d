//! DEX venue error-code -> `reason_code` mapping (spec §4.10), extensible
//! via a `match` with a catch-all `venue_reject` for anything not yet named.

use crate::error::ReasonCode;

pub fn map_error_code(venue_code: &str) -> ReasonCode {
    match venue_code {
        "Tick" => ReasonCode::PriceOutOfBounds,
        "MinTradeNtl" => ReasonCode::MinSize,
        "PerpMargin" => ReasonCode::InsufficientBalance,
        "ReduceOnly" => ReasonCode::RiskBlocked,
        "BadAloPx" => ReasonCode::PostOnlyViolation,
        // Not an error: an IOC that could not cross simply did not fill.
        "IocCancel" => ReasonCode::Ok,
        "MarketOrderNoLiquidity" => ReasonCode::VenueReject,
        _ => ReasonCode::VenueReject,
    }
}
