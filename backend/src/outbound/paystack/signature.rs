//! Webhook signature validation.
//!
//! Paystack signs each webhook delivery with HMAC-SHA512 over the raw body
//! using the account secret key, hex-encoded in the
//! `x-paystack-signature` header. The body must be validated before any
//! field of the payload is trusted.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Verify a webhook signature against the raw request body.
///
/// Comparison is delegated to the MAC implementation, which is
/// constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(decoded) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&decoded).is_ok()
}

/// Compute the hex signature for a payload; used by tests and tooling.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // new_from_slice only fails for unusable key lengths, which HMAC does
    // not have.
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SECRET: &str = "sk_test_secret";
    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"ref-1"}}"#;

    #[rstest]
    fn accepts_a_valid_signature() {
        let signature = sign(SECRET, BODY);
        assert!(verify_signature(SECRET, BODY, &signature));
    }

    #[rstest]
    fn rejects_a_tampered_body() {
        let signature = sign(SECRET, BODY);
        assert!(!verify_signature(
            SECRET,
            br#"{"event":"charge.success","data":{"reference":"ref-2"}}"#,
            &signature
        ));
    }

    #[rstest]
    fn rejects_a_signature_from_another_secret() {
        let signature = sign("sk_test_other", BODY);
        assert!(!verify_signature(SECRET, BODY, &signature));
    }

    #[rstest]
    #[case("")]
    #[case("not-hex")]
    #[case("deadbeef")]
    fn rejects_malformed_signatures(#[case] signature: &str) {
        assert!(!verify_signature(SECRET, BODY, signature));
    }
}
