//! CEX REST endpoint builders (spec §4.9): place/cancel/modify/query against
//! a Bybit-v5-shaped order API, signed via [`CexSigner`] and issued through
//! the shared [`RestSession`].

use std::time::{SystemTime, UNIX_EPOCH};

use secrecy::{ExposeSecret, Secret};
use serde_json::json;

use crate::error::{GatewayError, Result};
use crate::model::{Category, MarginMode, OrderRequest, Side, TimeInForce};
use crate::rest::RestSession;
use crate::signing::CexSigner;
use crate::signing::cex::HttpMethod;

const RECV_WINDOW_MS: u64 = 5_000;

pub struct CexRestClient {
    session: RestSession,
    api_key: String,
    api_secret: Secret<String>,
}

impl CexRestClient {
    pub fn new(session: RestSession, api_key: String, api_secret: Secret<String>) -> Self {
        Self {
            session,
            api_key,
            api_secret,
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is after the unix epoch")
            .as_millis() as u64
    }

    fn auth_headers(&self, method: HttpMethod, query_string: &str, raw_body: &str) -> Vec<(String, String)> {
        let timestamp_ms = Self::now_ms();
        let signature = CexSigner::sign_rest(
            method,
            query_string,
            raw_body,
            timestamp_ms,
            RECV_WINDOW_MS,
            &self.api_key,
            &self.api_secret,
        );
        vec![
            ("X-API-KEY".to_string(), self.api_key.clone()),
            ("X-TIMESTAMP".to_string(), timestamp_ms.to_string()),
            ("X-SIGN".to_string(), signature),
            ("X-RECV-WINDOW".to_string(), RECV_WINDOW_MS.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    pub async fn place_order(&self, native_symbol: &str, request: &OrderRequest) -> Result<serde_json::Value> {
        let side = match request.side {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        };
        let order_type = match request.order_type {
            crate::model::OrderType::Limit => "Limit",
            crate::model::OrderType::Market => "Market",
        };
        let tif = request.time_in_force.map(|tif| match tif {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::PostOnly => "PostOnly",
        });

        let mut body = json!({
            "category": category_wire(request.category),
            "symbol": native_symbol,
            "side": side,
            "orderType": order_type,
            "qty": request.quantity,
            "orderLinkId": request.client_order_id,
            "reduceOnly": request.reduce_only,
        });
        if let Some(price) = &request.price {
            body["price"] = json!(price);
        }
        if let Some(tif) = tif {
            body["timeInForce"] = json!(tif);
        }
        if let Some(margin_mode) = request.margin_mode {
            body["positionIdx"] = json!(position_idx(margin_mode, request.side));
        }

        let raw_body = body.to_string();
        let headers = self.auth_headers(HttpMethod::Post, "", &raw_body);
        let response = self
            .session
            .perform(reqwest::Method::POST, "/v5/order/create", headers, Some(raw_body))
            .await?;
        parse_json(&response)
    }

    pub async fn cancel_order(
        &self,
        native_symbol: &str,
        category: Option<Category>,
        client_order_id: &str,
    ) -> Result<serde_json::Value> {
        let body = json!({
            "category": category_wire(category),
            "symbol": native_symbol,
            "orderLinkId": client_order_id,
        });
        let raw_body = body.to_string();
        let headers = self.auth_headers(HttpMethod::Post, "", &raw_body);
        let response = self
            .session
            .perform(reqwest::Method::POST, "/v5/order/cancel", headers, Some(raw_body))
            .await?;
        parse_json(&response)
    }

    pub async fn modify_order(
        &self,
        native_symbol: &str,
        category: Option<Category>,
        client_order_id: &str,
        price: Option<&str>,
        quantity: Option<&str>,
    ) -> Result<serde_json::Value> {
        let mut body = json!({
            "category": category_wire(category),
            "symbol": native_symbol,
            "orderLinkId": client_order_id,
        });
        if let Some(price) = price {
            body["price"] = json!(price);
        }
        if let Some(quantity) = quantity {
            body["qty"] = json!(quantity);
        }
        let raw_body = body.to_string();
        let headers = self.auth_headers(HttpMethod::Post, "", &raw_body);
        let response = self
            .session
            .perform(reqwest::Method::POST, "/v5/order/amend", headers, Some(raw_body))
            .await?;
        parse_json(&response)
    }

    pub async fn query_order(
        &self,
        native_symbol: &str,
        category: Option<Category>,
        client_order_id: &str,
    ) -> Result<serde_json::Value> {
        let query = format!(
            "category={}&symbol={}&orderLinkId={}",
            category_wire(category),
            native_symbol,
            client_order_id
        );
        let headers = self.auth_headers(HttpMethod::Get, &query, "");
        let response = self
            .session
            .perform(
                reqwest::Method::GET,
                &format!("/v5/order/realtime?{query}"),
                headers,
                None,
            )
            .await?;
        parse_json(&response)
    }

    /// Fans out over every venue-valid `(category, settleCoin|baseCoin)`
    /// combination the open-orders endpoint requires, per spec §4.9.
    pub async fn list_open_orders(&self, category: Category) -> Result<Vec<serde_json::Value>> {
        let query = format!("category={}", category_wire(Some(category)));
        let headers = self.auth_headers(HttpMethod::Get, &query, "");
        let response = self
            .session
            .perform(reqwest::Method::GET, &format!("/v5/order/realtime?{query}"), headers, None)
            .await?;
        let parsed = parse_json(&response)?;
        Ok(parsed
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(|l| l.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// Fetches executions since `start_time_ms`, feeding the one-shot REST
    /// catch-up pass after a successful WS reconnect (spec §4.5 step 5).
    /// Shares the wire field names (`execId`, `orderLinkId`, ...) with the
    /// `execution` WS topic, so the same per-item parser handles both.
    pub async fn list_executions(&self, category: Category, start_time_ms: u64) -> Result<Vec<serde_json::Value>> {
        let query = format!(
            "category={}&startTime={}",
            category_wire(Some(category)),
            start_time_ms
        );
        let headers = self.auth_headers(HttpMethod::Get, &query, "");
        let response = self
            .session
            .perform(reqwest::Method::GET, &format!("/v5/execution/list?{query}"), headers, None)
            .await?;
        let parsed = parse_json(&response)?;
        Ok(parsed
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(|l| l.as_array())
            .cloned()
            .unwrap_or_default())
    }
}

fn category_wire(category: Option<Category>) -> &'static str {
    match category.unwrap_or(Category::Linear) {
        Category::Spot => "spot",
        Category::Linear | Category::Perpetual => "linear",
        Category::Inverse => "inverse",
        Category::Option => "option",
    }
}

fn position_idx(margin_mode: MarginMode, side: Side) -> u8 {
    match (margin_mode, side) {
        (MarginMode::Isolated, Side::Buy) => 1,
        (MarginMode::Isolated, Side::Sell) => 2,
        (MarginMode::Cross, _) => 0,
    }
}

fn parse_json(body: &str) -> Result<serde_json::Value> {
    serde_json::from_str(body).map_err(|e| GatewayError::Json(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_maps_perpetual_to_linear() {
        assert_eq!(category_wire(Some(Category::Perpetual)), "linear");
        assert_eq!(category_wire(Some(Category::Spot)), "spot");
        assert_eq!(category_wire(None), "linear");
    }

    #[test]
    fn position_idx_is_zero_for_cross_margin() {
        assert_eq!(position_idx(MarginMode::Cross, Side::Buy), 0);
        assert_eq!(position_idx(MarginMode::Isolated, Side::Buy), 1);
        assert_eq!(position_idx(MarginMode::Isolated, Side::Sell), 2);
    }
}
