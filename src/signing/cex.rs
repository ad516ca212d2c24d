//! CEX request signer: HMAC-SHA256 over a byte-exact concatenation of the
//! timestamp, API key, receive window, and (query string or raw body).
//!
//! Grounded in the keyed-HMAC idiom used across the retrieval pack's exchange
//! adapters (e.g. `purefinance-mmb`'s Binance client, which hashes the
//! request payload with `hmac::Hmac<Sha256>` rather than a bare SHA-256
//! digest) rather than the teacher crate's unkeyed checksum, since the CEX
//! here authenticates with a true keyed signature.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Pure HMAC-SHA256 signer for REST and WS auth, matching spec §4.2 exactly.
pub struct CexSigner;

impl CexSigner {
    /// Builds the `sign_payload` for a REST request and returns its hex HMAC.
    ///
    /// `sign_payload = timestamp_ms || api_key || recv_window_ms || tail`
    /// where `tail` is the query string (without a leading `?`) for `GET`
    /// requests, or the raw JSON body for `POST`/`PUT`/`DELETE` requests. An
    /// empty body/query string contributes nothing, so the payload degrades
    /// to exactly `timestamp_ms || api_key || recv_window_ms` (spec §8
    /// boundary case).
    pub fn sign_rest(
        method: HttpMethod,
        query_string: &str,
        raw_body: &str,
        timestamp_ms: u64,
        recv_window_ms: u64,
        api_key: &str,
        api_secret: &Secret<String>,
    ) -> String {
        let tail = match method {
            HttpMethod::Get => query_string.trim_start_matches('?'),
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Delete => raw_body,
        };
        let sign_payload = format!("{timestamp_ms}{api_key}{recv_window_ms}{tail}");
        Self::hmac_hex(api_secret, &sign_payload)
    }

    /// Builds the WS auth signature: `sign_payload = "GET/realtime" || expires_ms`.
    ///
    /// `expires_ms` defaults to `now_ms + 1000` to keep the auth window short
    /// and limit replay, per spec §4.2.
    pub fn sign_ws_auth(now_ms: u64, api_secret: &Secret<String>) -> (u64, String) {
        let expires_ms = now_ms + 1000;
        let sign_payload = format!("GET/realtime{expires_ms}");
        (expires_ms, Self::hmac_hex(api_secret, &sign_payload))
    }

    fn hmac_hex(secret: &Secret<String>, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Secret<String> {
        Secret::new(s.to_string())
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let secret = secret("my-secret");
        let a = CexSigner::sign_rest(
            HttpMethod::Post,
            "",
            r#"{"symbol":"BTCUSDT"}"#,
            1_700_000_000_000,
            5000,
            "key123",
            &secret,
        );
        let b = CexSigner::sign_rest(
            HttpMethod::Post,
            "",
            r#"{"symbol":"BTCUSDT"}"#,
            1_700_000_000_000,
            5000,
            "key123",
            &secret,
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64, "hex-encoded SHA256 digest is 64 chars");
    }

    #[test]
    fn empty_post_body_signs_over_prefix_only() {
        let secret = secret("s");
        let with_empty_body =
            CexSigner::sign_rest(HttpMethod::Post, "", "", 1000, 5000, "key", &secret);

        let mut mac = HmacSha256::new_from_slice(b"s").unwrap();
        mac.update(b"1000key5000");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(with_empty_body, expected);
    }

    #[test]
    fn get_signs_query_string_without_leading_question_mark() {
        let secret = secret("s");
        let with_q_mark =
            CexSigner::sign_rest(HttpMethod::Get, "?symbol=BTCUSDT", "", 1000, 5000, "key", &secret);
        let without_q_mark =
            CexSigner::sign_rest(HttpMethod::Get, "symbol=BTCUSDT", "", 1000, 5000, "key", &secret);
        assert_eq!(with_q_mark, without_q_mark);
    }

    #[test]
    fn ws_auth_uses_get_realtime_prefix_and_short_expiry_window() {
        let secret = secret("s");
        let (expires_ms, sig) = CexSigner::sign_ws_auth(1_700_000_000_000, &secret);
        assert_eq!(expires_ms, 1_700_000_001_000);

        let mut mac = HmacSha256::new_from_slice(b"s").unwrap();
        mac.update(format!("GET/realtime{expires_ms}").as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(sig, expected);
    }
}
