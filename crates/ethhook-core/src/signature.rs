//! HMAC-SHA256 signing of outbound webhook bodies, per §6: the header
//! value is `sha256=<hex(HMAC-SHA256(secret, body))>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 of `body` under `secret`, without
/// the `sha256=` prefix (callers that need the header value add it).
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// The full `X-Webhook-Signature` header value for `body` under `secret`.
pub fn signature_header(secret: &[u8], body: &[u8]) -> String {
    format!("sha256={}", sign(secret, body))
}

/// Verifies a hex-encoded HMAC-SHA256 signature in constant time.
pub fn verify(signature_hex: &str, secret: &[u8], body: &[u8]) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let secret = b"a secret at least thirty two bytes long";
        let body = b"{\"hello\":\"world\"}";
        let sig = sign(secret, body);
        assert!(verify(&sig, secret, body));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let secret = b"a secret at least thirty two bytes long";
        let sig = sign(secret, b"original body");
        assert!(!verify(&sig, secret, b"tampered body"));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let body = b"same body";
        let sig = sign(b"secret one, thirty two bytes padded", body);
        assert!(!verify(&sig, b"secret two, thirty two bytes padded", body));
    }

    #[test]
    fn signature_header_has_sha256_prefix() {
        let header = signature_header(b"secret", b"body");
        assert!(header.starts_with("sha256="));
    }
}
