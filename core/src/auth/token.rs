//! Signed token issuance and verification (§4.K).
//!
//! Tokens are `base64(payload_json) "." base64(hmac_sha256(payload_json, secret_key))`.
//! There is no JWT library dependency here because the payload and algorithm are fixed
//! and small; a generic JWT stack would be more machinery than this contract needs.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::DmxxError;

type HmacSha256 = Hmac<Sha256>;

/// The signed claims carried by a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub profile_name: String,
    /// Unix timestamp (seconds) after which the token is no longer valid.
    pub expiry: u64,
    pub client_fingerprint: String,
}

/// Signs `claims` with `secret_key`, producing an opaque bearer token string.
pub fn issue_token(claims: &TokenClaims, secret_key: &[u8]) -> Result<String, DmxxError> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| DmxxError::Internal(format!("failed to encode token claims: {e}")))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);

    let mut mac = HmacSha256::new_from_slice(secret_key)
        .map_err(|e| DmxxError::Internal(format!("invalid secret key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{payload_b64}.{signature_b64}"))
}

/// Verifies a token's signature and expiry, returning its claims on success.
///
/// Signature comparison is constant-time via `hmac`'s built-in `verify_slice`, which
/// rejects on a non-constant-time-observable shortcut the same way the password compare
/// in [`crate::auth::whitelist`] does.
pub fn verify_token(token: &str, secret_key: &[u8], now_unix: u64) -> Result<TokenClaims, DmxxError> {
    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or_else(|| DmxxError::AuthFailed("malformed token".to_string()))?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| DmxxError::AuthFailed("malformed token signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret_key)
        .map_err(|e| DmxxError::Internal(format!("invalid secret key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| DmxxError::AuthFailed("token signature mismatch".to_string()))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| DmxxError::AuthFailed("malformed token payload".to_string()))?;
    let claims: TokenClaims = serde_json::from_slice(&payload)
        .map_err(|_| DmxxError::AuthFailed("malformed token claims".to_string()))?;

    if claims.expiry < now_unix {
        return Err(DmxxError::AuthFailed("token expired".to_string()));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> TokenClaims {
        TokenClaims {
            profile_name: "admin".to_string(),
            expiry: 2_000_000_000,
            client_fingerprint: "fp-1".to_string(),
        }
    }

    #[test]
    fn a_token_signed_and_verified_with_the_same_key_round_trips() {
        let token = issue_token(&claims(), b"secret").unwrap();
        let verified = verify_token(&token, b"secret", 1_000).unwrap();
        assert_eq!(verified.profile_name, "admin");
    }

    #[test]
    fn a_token_verified_with_the_wrong_key_is_rejected() {
        let token = issue_token(&claims(), b"secret").unwrap();
        assert!(verify_token(&token, b"other-secret", 1_000).is_err());
    }

    #[test]
    fn an_expired_token_is_rejected() {
        let token = issue_token(&claims(), b"secret").unwrap();
        assert!(verify_token(&token, b"secret", 3_000_000_000).is_err());
    }

    #[test]
    fn a_tampered_payload_is_rejected() {
        let token = issue_token(&claims(), b"secret").unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let tampered = format!("tampered.{sig}");
        assert!(verify_token(&tampered, b"secret", 1_000).is_err());
    }
}
