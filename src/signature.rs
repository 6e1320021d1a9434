//! HMAC-SHA256 request signing for the notification endpoint.
//!
//! Senders sign the raw request body with the shared `server.secret` and
//! send `X-Indexer-Signature: sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-indexer-signature";

/// Decode a `sha256=<hex>` header value. `None` when malformed.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Header value signing `payload` with `secret`.
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(payload);
            format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
        }
        // HMAC takes keys of any length
        Err(_) => String::new(),
    }
}

/// Constant-time check of `signature_header` against `payload`.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify() {
        let body = br#"{"id":"/obj1"}"#;
        let header = sign(body, b"s3cret");
        assert!(header.starts_with("sha256="));
        assert!(verify_signature(body, &header, b"s3cret"));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let body = b"payload";
        let header = sign(body, b"right");
        assert!(!verify_signature(body, &header, b"wrong"));
    }

    #[test]
    fn test_tampered_body_fails() {
        let header = sign(b"payload", b"key");
        assert!(!verify_signature(b"payload2", &header, b"key"));
    }

    #[test]
    fn test_malformed_headers_fail() {
        assert!(parse_signature_header("abcd").is_none());
        assert!(parse_signature_header("sha1=abcd").is_none());
        assert!(parse_signature_header("sha256=zz").is_none());
        assert!(!verify_signature(b"x", "sha256=zz", b"key"));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let header = sign(b"what do ya want for nothing?", b"Jefe");
        assert_eq!(
            header,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
