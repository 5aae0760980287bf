use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid key length")]
    InvalidKey,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("No matching signature")]
    Mismatch,
}

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of two hex signatures.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    expected.len() == provided.len() && bool::from(expected.ct_eq(provided))
}

/// Build a `t=<unix>,v1=<hex>` header over `"{t}.{body}"`.
pub fn sign_timestamped(
    secret: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<String, SignatureError> {
    let signature = hmac_sha256_hex(secret, &signed_payload(timestamp, body))?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Verify a `t=<unix>,v1=<hex>[,v1=...]` header as sent by Stripe webhooks.
///
/// Any one `v1` entry matching is enough (Stripe sends several during secret
/// rotation). `tolerance_secs` bounds the distance between `t` and `now`.
pub fn verify_timestamped(
    secret: &str,
    header: &str,
    body: &[u8],
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    let expected = hmac_sha256_hex(secret, &signed_payload(timestamp, body))?;
    if !candidates.iter().any(|c| signatures_match(&expected, c)) {
        return Err(SignatureError::Mismatch);
    }

    if (now - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    Ok(())
}

fn signed_payload(timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut payload = format!("{}.", timestamp).into_bytes();
    payload.extend_from_slice(body);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn signed_header_verifies() {
        let header = sign_timestamped(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify_timestamped(SECRET, &header, BODY, 300, 1_700_000_010),
            Ok(())
        );
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign_timestamped(SECRET, 1_700_000_000, BODY).unwrap();
        let tampered = br#"{"id":"evt_1","type":"payment_intent.payment_failed"}"#;
        assert_eq!(
            verify_timestamped(SECRET, &header, tampered, 300, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let header = sign_timestamped(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify_timestamped(SECRET, &header, BODY, 300, 1_700_000_301),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn any_matching_v1_entry_is_accepted() {
        let good = sign_timestamped(SECRET, 42, BODY).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=42,v1=deadbeef,v0=ignored,v1={}", good_sig);
        assert!(verify_timestamped(SECRET, &header, BODY, 300, 42).is_ok());
    }

    #[test]
    fn header_without_timestamp_is_malformed() {
        assert_eq!(
            verify_timestamped(SECRET, "v1=abc", BODY, 300, 0),
            Err(SignatureError::MalformedHeader)
        );
    }

    #[test]
    fn length_mismatch_never_matches() {
        assert!(!signatures_match("abcd", "abc"));
        assert!(signatures_match("abcd", "abcd"));
    }
}
