use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const TOKEN_PREFIX: &str = "mlg_";
const SECRET_BYTES: usize = 32;
const VISIBLE_PREFIX_LEN: usize = 8;

/// A freshly minted push/pull token. The raw value is only ever returned here, at
/// creation time — callers persist `hash`/`prefix` and discard `raw`.
pub struct GeneratedToken {
    pub raw: String,
    pub hash: [u8; 32],
    pub prefix: String,
}

/// Generates a new `mlg_`-prefixed token: a 32-byte random secret, URL-safe base64
/// without padding, hashed with SHA-256 for storage.
pub fn generate_token() -> GeneratedToken {
    let mut secret = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret);
    let encoded = URL_SAFE_NO_PAD.encode(secret);
    let raw = format!("{TOKEN_PREFIX}{encoded}");
    let hash = hash_token(&raw);
    let prefix = raw.chars().take(VISIBLE_PREFIX_LEN).collect();
    GeneratedToken { raw, hash, prefix }
}

/// Hashes a presented raw token for comparison against a stored [`hash`](GeneratedToken::hash).
pub fn hash_token(raw: &str) -> [u8; 32] {
    Sha256::digest(raw.as_bytes()).into()
}

type HmacSha256 = Hmac<Sha256>;

/// Verifies an HMAC-SHA256 webhook signature (hex-encoded, optionally prefixed with
/// `sha256=` as GitHub does) over the raw request body, in constant time.
pub fn verify_hmac_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected_bytes) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    computed.ct_eq(&expected_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_has_expected_shape() {
        let t = generate_token();
        assert!(t.raw.starts_with(TOKEN_PREFIX));
        assert_eq!(t.prefix.len(), VISIBLE_PREFIX_LEN);
        assert_eq!(t.hash, hash_token(&t.raw));
    }

    #[test]
    fn two_generated_tokens_differ() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a.raw, b.raw);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn hmac_signature_round_trips() {
        let secret = "shhh";
        let body = b"{\"ref\":\"refs/heads/main\"}";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(verify_hmac_signature(secret, body, &sig));
        assert!(verify_hmac_signature(secret, body, &format!("sha256={sig}")));
    }

    #[test]
    fn hmac_signature_rejects_tampered_body() {
        let secret = "shhh";
        let body = b"original";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(!verify_hmac_signature(secret, b"tampered", &sig));
    }

    #[test]
    fn hmac_signature_rejects_malformed_hex() {
        assert!(!verify_hmac_signature("secret", b"body", "not-hex!"));
    }
}
