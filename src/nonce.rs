// SPDX-License-Identifier: Apache-2.0
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::instrument;

/// Action name the relay accepts and the form's nonce is bound to
pub const SUBMIT_ACTION: &str = "seqgate_submit_form";

#[derive(Debug, Error)]
pub enum NonceError {
    #[error("Invalid security token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Security token was issued for '{0}'")]
    ActionMismatch(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NonceClaims {
    pub act: String,   // Action the token authorizes
    pub exp: usize,    // Expiration time
    pub iat: usize,    // Issued at time
}

/// Issues and checks short-lived tokens that tie a relay submission
/// to a page this server rendered.
#[derive(Clone)]
pub struct NonceIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn now_secs() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize
}

impl NonceIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issuer with a fresh random secret; its tokens die with the process
    pub fn random(ttl: Duration) -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);
        Self::new(&secret, ttl)
    }

    /// Creates a token for `action`
    #[instrument(skip(self))]
    pub fn issue(&self, action: &str) -> Result<String, NonceError> {
        let now = now_secs();
        let claims = NonceClaims {
            act: action.to_owned(),
            exp: now.saturating_add(usize::try_from(self.ttl.as_secs()).unwrap_or(usize::MAX)),
            iat: now,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Accepts only unexpired tokens signed by this issuer for `action`
    #[instrument(skip(self, token))]
    pub fn verify(&self, action: &str, token: &str) -> Result<(), NonceError> {
        let data = decode::<NonceClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        if data.claims.act != action {
            return Err(NonceError::ActionMismatch(data.claims.act));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"nonce-test-secret";

    fn issuer() -> NonceIssuer {
        NonceIssuer::new(SECRET, Duration::from_secs(3600))
    }

    #[test]
    fn issued_nonce_verifies_for_same_action() {
        let issuer = issuer();
        let token = issuer.issue(SUBMIT_ACTION).unwrap();
        assert!(issuer.verify(SUBMIT_ACTION, &token).is_ok());
    }

    #[test]
    fn nonce_is_bound_to_its_action() {
        let issuer = issuer();
        let token = issuer.issue("other_action").unwrap();
        let err = issuer.verify(SUBMIT_ACTION, &token).unwrap_err();
        assert!(matches!(err, NonceError::ActionMismatch(action) if action == "other_action"));
    }

    #[test]
    fn nonce_from_another_secret_is_rejected() {
        let token = NonceIssuer::random(Duration::from_secs(3600)).issue(SUBMIT_ACTION).unwrap();
        assert!(matches!(issuer().verify(SUBMIT_ACTION, &token), Err(NonceError::Invalid(_))));
    }

    #[test]
    fn expired_nonce_is_rejected() {
        let now = now_secs();
        let claims = NonceClaims {
            act: SUBMIT_ACTION.to_string(),
            exp: now - 7200,
            iat: now - 10800,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
        assert!(matches!(issuer().verify(SUBMIT_ACTION, &token), Err(NonceError::Invalid(_))));
    }

    #[test]
    fn huge_ttl_saturates_instead_of_overflowing() {
        let issuer = NonceIssuer::new(SECRET, Duration::from_secs(u64::MAX));
        let token = issuer.issue(SUBMIT_ACTION).unwrap();
        assert!(issuer.verify(SUBMIT_ACTION, &token).is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(issuer().verify(SUBMIT_ACTION, "not-a-token").is_err());
    }
}
