use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use tracing::debug;

use crate::models::auth::TokenClaims;
use crate::storage::{keys, KeyValueStorage};

/// A token is treated as expired this many seconds before its actual
/// expiry, so requests never race a deadline.
pub const EXPIRY_BUFFER_SECS: i64 = 30;

/// Sole owner of the persisted token strings. Nothing else reads or writes
/// the token keys.
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn access_token(&self) -> Option<String> {
        self.storage.get(keys::ACCESS_TOKEN)
    }

    /// Replaces the access token alone. The stored expiry belongs to the
    /// previous pair, so it is dropped; validity falls back to the new
    /// token's own `exp` claim.
    pub fn set_access_token(&self, token: &str) {
        self.storage.set(keys::ACCESS_TOKEN, token);
        self.storage.remove(keys::TOKEN_EXPIRES_AT);
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(keys::REFRESH_TOKEN)
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.storage.set(keys::REFRESH_TOKEN, token);
    }

    /// Stores a full token pair along with the computed expiry instant.
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str, expires_in: i64) {
        self.storage.set(keys::ACCESS_TOKEN, access_token);
        self.storage.set(keys::REFRESH_TOKEN, refresh_token);
        let expires_at = Utc::now().timestamp() + expires_in;
        self.storage
            .set(keys::TOKEN_EXPIRES_AT, &expires_at.to_string());
        debug!(expires_at, "stored new token pair");
    }

    pub fn clear(&self) {
        self.storage.remove(keys::ACCESS_TOKEN);
        self.storage.remove(keys::REFRESH_TOKEN);
        self.storage.remove(keys::TOKEN_EXPIRES_AT);
    }

    /// True when an access token exists and the current time is still before
    /// its expiry minus [`EXPIRY_BUFFER_SECS`]. Unknown expiry counts as
    /// invalid.
    pub fn is_token_valid(&self) -> bool {
        let Some(token) = self.access_token() else {
            return false;
        };
        let Some(expires_at) = self.expiry_for(&token) else {
            return false;
        };
        Utc::now().timestamp() < expires_at - EXPIRY_BUFFER_SECS
    }

    /// Decoded claims of the current access token, if any.
    pub fn claims(&self) -> Option<TokenClaims> {
        self.access_token()
            .and_then(|token| Self::decode_token(&token))
    }

    /// Unverified decode of a JWT payload: split on `.`, base64url-decode
    /// the middle segment, parse as JSON. Any malformation yields `None`.
    /// Signature verification is the backend's job, never the client's.
    pub fn decode_token(token: &str) -> Option<TokenClaims> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return None;
        }
        let payload = URL_SAFE_NO_PAD
            .decode(segments[1].trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&payload).ok()
    }

    fn expiry_for(&self, token: &str) -> Option<i64> {
        if let Some(raw) = self.storage.get(keys::TOKEN_EXPIRES_AT) {
            if let Ok(expires_at) = raw.parse() {
                return Some(expires_at);
            }
        }
        Self::decode_token(token).map(|claims| claims.exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStorage::default()))
    }

    fn signed_token(exp: i64) -> String {
        let claims = json!({
            "sub": "user-1",
            "email": "a@b.com",
            "roles": ["EMPLOYEE"],
            "exp": exp
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .expect("token should encode")
    }

    #[test]
    fn round_trips_token_pair() {
        let store = store();
        store.set_tokens("access", "refresh", 3600);
        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));

        store.clear();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn token_inside_expiry_buffer_is_invalid() {
        let store = store();
        // expires in 10s: inside the 30s buffer
        store.set_tokens("access", "refresh", 10);
        assert!(!store.is_token_valid());
    }

    #[test]
    fn token_outside_expiry_buffer_is_valid() {
        let store = store();
        store.set_tokens("access", "refresh", 3600);
        assert!(store.is_token_valid());
    }

    #[test]
    fn expired_token_is_invalid() {
        let store = store();
        store.set_tokens("access", "refresh", -60);
        assert!(!store.is_token_valid());
    }

    #[test]
    fn missing_token_is_invalid() {
        assert!(!store().is_token_valid());
    }

    #[test]
    fn validity_falls_back_to_decoded_exp() {
        let store = store();
        let exp = Utc::now().timestamp() + 3600;
        store.set_access_token(&signed_token(exp));
        assert!(store.is_token_valid());

        store.set_access_token(&signed_token(Utc::now().timestamp() + 5));
        assert!(!store.is_token_valid());
    }

    #[test]
    fn replacing_the_access_token_drops_the_old_pair_expiry() {
        let store = store();
        // old pair valid for an hour; new token expires in 5s
        store.set_tokens("access", "refresh", 3600);
        store.set_access_token(&signed_token(Utc::now().timestamp() + 5));
        assert!(!store.is_token_valid());

        // and the other way round: the new token's exp wins over a stale
        // already-expired deadline
        store.set_tokens("access", "refresh", -60);
        store.set_access_token(&signed_token(Utc::now().timestamp() + 3600));
        assert!(store.is_token_valid());
    }

    #[test]
    fn decodes_a_real_jwt_payload() {
        let exp = Utc::now().timestamp() + 3600;
        let claims = TokenStore::decode_token(&signed_token(exp)).expect("claims should decode");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("a@b.com"));
        assert_eq!(claims.roles, vec!["EMPLOYEE".to_string()]);
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn malformed_tokens_decode_to_none() {
        assert!(TokenStore::decode_token("").is_none());
        assert!(TokenStore::decode_token("only-one-segment").is_none());
        assert!(TokenStore::decode_token("two.segments").is_none());
        assert!(TokenStore::decode_token("a.b.c.d").is_none());
        // middle segment is not base64
        assert!(TokenStore::decode_token("aaa.!!!.ccc").is_none());
        // middle segment decodes but is not JSON
        let not_json = URL_SAFE_NO_PAD.encode(b"hello world");
        assert!(TokenStore::decode_token(&format!("aaa.{not_json}.ccc")).is_none());
        // JSON but missing required claims
        let no_exp = URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#);
        assert!(TokenStore::decode_token(&format!("aaa.{no_exp}.ccc")).is_none());
    }
}
