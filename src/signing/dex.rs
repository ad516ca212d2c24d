//! DEX action signer: EIP-712 signatures over a MessagePack-hashed action
//! payload, matching a Hyperliquid-style perpetuals DEX.
//!
//! Grounded directly on the retrieval pack's `HyperLiquidMM` signing module:
//! the action is serialized with `rmp-serde` using abbreviated single-letter
//! keys (matching the venue's Python SDK `OrderWire` shape), the nonce and an
//! optional vault-address marker are appended as raw bytes, the whole buffer
//! is keccak-hashed, and that hash becomes the `connectionId` of a typed
//! `Agent(string source, bytes32 connectionId)` EIP-712 message signed with
//! `ethers-signers`. The JSON body sent over REST/WS must preserve the exact
//! key insertion order the venue's server re-hashes against — `serde_json`'s
//! `Map` preserves insertion order (with the `preserve_order` feature off,
//! the default `BTreeMap`-backed map would re-sort the keys and break
//! signature verification), so this module builds that JSON by hand with
//! `serde_json::Map::insert` in the required order rather than via `json!{}`
//! or a derived `Serialize` impl.

use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use ethers_core::types::transaction::eip712::EIP712Domain;
use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::keccak256;
use ethers_signers::{LocalWallet, Signer};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::error::{GatewayError, Result};

/// `(r, s, v)` EIP-712 signature returned by the DEX signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct Signature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// A single limit order leg of an "order" action.
#[derive(Debug, Clone)]
pub struct OrderLeg {
    pub asset: u32,
    pub is_buy: bool,
    pub limit_px: String,
    pub size: String,
    pub reduce_only: bool,
    pub time_in_force: &'static str,
}

#[derive(Serialize)]
struct OrderWireMsgPack {
    a: u32,
    b: bool,
    p: String,
    s: String,
    r: bool,
    t: OrderTypeWireMsgPack,
}

#[derive(Serialize)]
struct OrderTypeWireMsgPack {
    limit: LimitOrderWireMsgPack,
}

#[derive(Serialize)]
struct LimitOrderWireMsgPack {
    tif: String,
}

#[derive(Serialize)]
struct ActionMsgPack {
    r#type: String,
    orders: Vec<OrderWireMsgPack>,
    grouping: String,
}

/// The canonical "place order" action, prior to signing.
pub struct PlaceOrderAction {
    pub orders: Vec<OrderLeg>,
}

/// Computes `keccak256(msgpack(action) || nonce_be8 || vault_marker)`,
/// matching the venue's `action_hash` exactly (msgpack has no nonce inside
/// it; the nonce is appended as raw big-endian bytes after serialization).
fn compute_action_hash(action: &PlaceOrderAction, nonce: u64, vault_address: Option<&str>) -> [u8; 32] {
    let msgpack_orders: Vec<OrderWireMsgPack> = action
        .orders
        .iter()
        .map(|o| OrderWireMsgPack {
            a: o.asset,
            b: o.is_buy,
            p: o.limit_px.clone(),
            s: o.size.clone(),
            r: o.reduce_only,
            t: OrderTypeWireMsgPack {
                limit: LimitOrderWireMsgPack {
                    tif: o.time_in_force.to_string(),
                },
            },
        })
        .collect();

    let msgpack_action = ActionMsgPack {
        r#type: "order".to_string(),
        orders: msgpack_orders,
        grouping: "na".to_string(),
    };

    let mut buf = Vec::new();
    let mut serializer = rmp_serde::Serializer::new(&mut buf).with_struct_map();
    msgpack_action
        .serialize(&mut serializer)
        .expect("msgpack serialization of a plain struct cannot fail");

    buf.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => buf.push(0x00),
        Some(addr) => {
            buf.push(0x01);
            let clean = addr.strip_prefix("0x").unwrap_or(addr);
            if let Ok(bytes) = hex::decode(clean) {
                buf.extend_from_slice(&bytes);
            }
        }
    }

    keccak256(&buf)
}

fn eip712_agent_digest(action_hash: [u8; 32], source: &str) -> H256 {
    let domain = EIP712Domain {
        name: Some("Exchange".to_string()),
        version: Some("1".to_string()),
        chain_id: Some(U256::from(1337)),
        verifying_contract: Some(Address::zero()),
        salt: None,
    };
    let domain_hash = domain.separator();

    let agent_type_hash = keccak256("Agent(string source,bytes32 connectionId)".as_bytes());
    let source_hash = keccak256(source.as_bytes());

    let mut encoded = Vec::new();
    encoded.extend_from_slice(&agent_type_hash);
    encoded.extend_from_slice(&source_hash);
    encoded.extend_from_slice(&action_hash);
    let struct_hash = keccak256(&encoded);

    let mut payload = Vec::new();
    payload.extend_from_slice(&[0x19, 0x01]);
    payload.extend_from_slice(&domain_hash);
    payload.extend_from_slice(&struct_hash);

    H256::from(keccak256(&payload))
}

/// Builds the JSON action body with the exact key insertion order the venue
/// re-msgpacks to verify the signature (`type, orders, grouping` outer;
/// `a, b, p, s, r, t` per order — note `s` precedes `r`).
fn action_to_json(action: &PlaceOrderAction) -> Value {
    let json_orders: Vec<Value> = action
        .orders
        .iter()
        .map(|o| {
            let mut order_map = Map::new();
            order_map.insert("a".to_string(), Value::from(o.asset));
            order_map.insert("b".to_string(), Value::from(o.is_buy));
            order_map.insert("p".to_string(), Value::from(o.limit_px.clone()));
            order_map.insert("s".to_string(), Value::from(o.size.clone()));
            order_map.insert("r".to_string(), Value::from(o.reduce_only));

            let mut tif_map = Map::new();
            tif_map.insert("tif".to_string(), Value::from(o.time_in_force));
            let mut limit_map = Map::new();
            limit_map.insert("limit".to_string(), Value::Object(tif_map));
            order_map.insert("t".to_string(), Value::Object(limit_map));

            Value::Object(order_map)
        })
        .collect();

    let mut action_map = Map::new();
    action_map.insert("type".to_string(), Value::from("order"));
    action_map.insert("orders".to_string(), Value::Array(json_orders));
    action_map.insert("grouping".to_string(), Value::from("na"));

    Value::Object(action_map)
}

/// Signs an "order" action in-process with a local wallet, matching spec
/// §4.2's EIP-712 requirement. `source` is `"a"` for mainnet, `"b"` for
/// testnet (the venue's phantom-agent convention).
pub fn sign_l1_action(
    private_key: &Secret<String>,
    action: &PlaceOrderAction,
    nonce: u64,
    vault_address: Option<&str>,
    source: &str,
) -> Result<(Signature, Value)> {
    let wallet = LocalWallet::from_str(private_key.expose_secret())
        .map_err(|e| GatewayError::SignFailed(e.to_string()))?;

    let action_hash = compute_action_hash(action, nonce, vault_address);
    let digest = eip712_agent_digest(action_hash, source);

    let sig = wallet
        .sign_hash(digest)
        .map_err(|e| GatewayError::SignFailed(e.to_string()))?;

    let signature = Signature {
        r: format!("0x{:064x}", sig.r),
        s: format!("0x{:064x}", sig.s),
        v: sig.v as u8,
    };

    Ok((signature, action_to_json(action)))
}

/// A "cancel" action: asset id + venue order id pairs.
pub struct CancelOrderAction {
    pub cancels: Vec<(u32, u64)>,
}

#[derive(Serialize)]
struct CancelWireMsgPack {
    a: u32,
    o: u64,
}

#[derive(Serialize)]
struct CancelActionMsgPack {
    r#type: String,
    cancels: Vec<CancelWireMsgPack>,
}

fn compute_cancel_action_hash(action: &CancelOrderAction, nonce: u64) -> [u8; 32] {
    let msgpack_action = CancelActionMsgPack {
        r#type: "cancel".to_string(),
        cancels: action
            .cancels
            .iter()
            .map(|(a, o)| CancelWireMsgPack { a: *a, o: *o })
            .collect(),
    };

    let mut buf = Vec::new();
    let mut serializer = rmp_serde::Serializer::new(&mut buf).with_struct_map();
    msgpack_action
        .serialize(&mut serializer)
        .expect("msgpack serialization of a plain struct cannot fail");

    buf.extend_from_slice(&nonce.to_be_bytes());
    buf.push(0x00);

    keccak256(&buf)
}

fn cancel_action_to_json(action: &CancelOrderAction) -> Value {
    let cancels: Vec<Value> = action
        .cancels
        .iter()
        .map(|(a, o)| {
            let mut m = Map::new();
            m.insert("a".to_string(), Value::from(*a));
            m.insert("o".to_string(), Value::from(*o));
            Value::Object(m)
        })
        .collect();

    let mut action_map = Map::new();
    action_map.insert("type".to_string(), Value::from("cancel"));
    action_map.insert("cancels".to_string(), Value::Array(cancels));
    Value::Object(action_map)
}

/// Signs a "cancel" action, sharing the Agent/EIP-712 envelope with order
/// signing; only the inner action payload (and its msgpack encoding) differs.
pub fn sign_cancel_action(
    private_key: &Secret<String>,
    action: &CancelOrderAction,
    nonce: u64,
    source: &str,
) -> Result<(Signature, Value)> {
    let wallet = LocalWallet::from_str(private_key.expose_secret())
        .map_err(|e| GatewayError::SignFailed(e.to_string()))?;

    let action_hash = compute_cancel_action_hash(action, nonce);
    let digest = eip712_agent_digest(action_hash, source);

    let sig = wallet
        .sign_hash(digest)
        .map_err(|e| GatewayError::SignFailed(e.to_string()))?;

    let signature = Signature {
        r: format!("0x{:064x}", sig.r),
        s: format!("0x{:064x}", sig.s),
        v: sig.v as u8,
    };

    Ok((signature, cancel_action_to_json(action)))
}

// --- Number canonicalization (spec §4.2, §8 property 5) ------------------

/// Trims trailing zeros (and a then-dangling decimal point) from a decimal
/// string: `"65000.0"` -> `"65000"`, `"0.010"` -> `"0.01"`.
pub fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0');
    trimmed.trim_end_matches('.').to_string()
}

/// Formats a price to at most 5 significant figures, per the Open Question
/// resolution in spec §9 (follow the 5-sig-fig rule; surface `Tick` errors
/// verbatim rather than silently clamping further).
pub fn format_price(price: &str) -> Result<String> {
    let decimal = Decimal::from_str(price)
        .map_err(|e| GatewayError::SignFailed(format!("invalid price {price}: {e}")))?;
    let rounded = round_to_sig_figs(decimal, 5);
    Ok(trim_trailing_zeros(&rounded.to_string()))
}

/// Formats a size string to at most `sz_decimals` decimal places.
pub fn format_size(size: &str, sz_decimals: u32) -> Result<String> {
    let decimal = Decimal::from_str(size)
        .map_err(|e| GatewayError::SignFailed(format!("invalid size {size}: {e}")))?;
    let rounded = decimal.round_dp(sz_decimals);
    Ok(trim_trailing_zeros(&rounded.to_string()))
}

fn round_to_sig_figs(value: Decimal, sig_figs: u32) -> Decimal {
    if value.is_zero() {
        return value;
    }
    let magnitude = value.abs().log10().floor().to_i64().unwrap_or(0);
    let decimal_places = (sig_figs as i64 - 1 - magnitude).max(0) as u32;
    value.round_dp(decimal_places)
}

// --- Signer bridge: in-process or out-of-process (spec §4.2, §9) ---------

/// Abstracts over an in-process or subprocess EIP-712 signer, so the Open
/// Question "the signer is permitted to be an out-of-process helper" is
/// satisfied by swapping the implementation, not the call site.
#[async_trait::async_trait]
pub trait SignerBridge: Send + Sync {
    async fn sign_order(
        &self,
        action: &PlaceOrderAction,
        nonce: u64,
        vault_address: Option<&str>,
    ) -> Result<(Signature, Value)>;

    async fn sign_cancel(&self, action: &CancelOrderAction, nonce: u64) -> Result<(Signature, Value)>;
}

/// In-process signer: the default, calling [`sign_l1_action`] directly.
pub struct LocalDexSigner {
    private_key: Secret<String>,
    source: &'static str,
}

impl LocalDexSigner {
    pub fn new(private_key: Secret<String>, use_testnet: bool) -> Self {
        Self {
            private_key,
            source: if use_testnet { "b" } else { "a" },
        }
    }
}

#[async_trait::async_trait]
impl SignerBridge for LocalDexSigner {
    async fn sign_order(
        &self,
        action: &PlaceOrderAction,
        nonce: u64,
        vault_address: Option<&str>,
    ) -> Result<(Signature, Value)> {
        sign_l1_action(&self.private_key, action, nonce, vault_address, self.source)
    }

    async fn sign_cancel(&self, action: &CancelOrderAction, nonce: u64) -> Result<(Signature, Value)> {
        sign_cancel_action(&self.private_key, action, nonce, self.source)
    }
}

/// Out-of-process signer: spawns (and, on exit, respawns) a child process
/// that reads a JSON action request from stdin and writes a JSON
/// `{r, s, v}` response to stdout, enforcing a per-call timeout. The child's
/// own implementation (e.g. a Python signer) is outside this crate's scope
/// per spec §1; this struct only owns the request/response bridge.
pub struct SubprocessDexSigner {
    command: String,
    args: Vec<String>,
    call_timeout: Duration,
}

#[derive(Serialize)]
struct SignerRequest<'a> {
    action: &'a Value,
    nonce: u64,
    vault_address: Option<&'a str>,
}

impl SubprocessDexSigner {
    pub fn new(command: impl Into<String>, args: Vec<String>, call_timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            call_timeout,
        }
    }

    async fn call(&self, action_json: Value, nonce: u64, vault_address: Option<&str>) -> Result<(Signature, Value)> {
        let request = SignerRequest {
            action: &action_json,
            nonce,
            vault_address,
        };
        let request_line = serde_json::to_string(&request)?;

        let call = async {
            let mut child = Command::new(&self.command)
                .args(&self.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .spawn()
                .map_err(|e| GatewayError::SignFailed(format!("failed to spawn signer: {e}")))?;

            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| GatewayError::SignFailed("signer stdin unavailable".to_string()))?;
            stdin
                .write_all(format!("{request_line}\n").as_bytes())
                .await
                .map_err(|e| GatewayError::SignFailed(e.to_string()))?;
            drop(stdin);

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| GatewayError::SignFailed("signer stdout unavailable".to_string()))?;
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .await
                .map_err(|e| GatewayError::SignFailed(e.to_string()))?;

            let signature: Signature = serde_json::from_str(line.trim())
                .map_err(|e| GatewayError::SignFailed(format!("bad signer response: {e}")))?;
            Ok::<_, GatewayError>((signature, action_json))
        };

        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| GatewayError::SignFailed("signer call timed out".to_string()))?
    }
}

#[async_trait::async_trait]
impl SignerBridge for SubprocessDexSigner {
    async fn sign_order(
        &self,
        action: &PlaceOrderAction,
        nonce: u64,
        vault_address: Option<&str>,
    ) -> Result<(Signature, Value)> {
        self.call(action_to_json(action), nonce, vault_address).await
    }

    async fn sign_cancel(&self, action: &CancelOrderAction, nonce: u64) -> Result<(Signature, Value)> {
        self.call(cancel_action_to_json(action), nonce, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_action() -> PlaceOrderAction {
        PlaceOrderAction {
            orders: vec![OrderLeg {
                asset: 0,
                is_buy: true,
                limit_px: "65000".to_string(),
                size: "0.01".to_string(),
                reduce_only: false,
                time_in_force: "Gtc",
            }],
        }
    }

    #[test]
    fn trims_trailing_zeros() {
        assert_eq!(trim_trailing_zeros("65000.0"), "65000");
        assert_eq!(trim_trailing_zeros("0.010"), "0.01");
        assert_eq!(trim_trailing_zeros("0.1"), "0.1");
        assert_eq!(trim_trailing_zeros("100"), "100");
    }

    #[test]
    fn price_is_capped_at_five_significant_figures() {
        let formatted = format_price("65432.123").unwrap();
        // 5 sig figs of 65432.123 -> 65432
        assert_eq!(formatted, "65432");
    }

    #[test]
    fn size_is_capped_at_sz_decimals() {
        let formatted = format_size("0.0100", 2).unwrap();
        assert_eq!(formatted, "0.01");
        let formatted_3dp = format_size("1.23456", 3).unwrap();
        assert_eq!(formatted_3dp, "1.235");
    }

    #[test]
    fn signing_is_deterministic_for_fixed_inputs() {
        let pk = Secret::new(
            "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcd".to_string(),
        );
        let action = sample_action();
        let (sig_a, json_a) = sign_l1_action(&pk, &action, 42, None, "a").unwrap();
        let (sig_b, json_b) = sign_l1_action(&pk, &action, 42, None, "a").unwrap();
        assert_eq!(sig_a, sig_b);
        assert_eq!(json_a, json_b);
    }

    #[test]
    fn action_json_preserves_required_key_order() {
        let action = sample_action();
        let json = action_to_json(&action);
        let obj = json.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["type", "orders", "grouping"]);

        let order = obj["orders"][0].as_object().unwrap();
        let order_keys: Vec<&str> = order.keys().map(String::as_str).collect();
        assert_eq!(order_keys, vec!["a", "b", "p", "s", "r", "t"]);
    }
}
