// storefront/src/services/tokens.rs

//! HS256 JWT bearer tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub sub: Uuid,
  #[serde(default)]
  pub adm: bool,
  pub iat: i64,
  /// Unix seconds.
  pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  validation: Validation,
  ttl: Duration,
}

impl TokenSigner {
  pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_aud = false;
    Self {
      encoding_key: EncodingKey::from_secret(secret.as_ref()),
      decoding_key: DecodingKey::from_secret(secret.as_ref()),
      validation,
      ttl,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn issue(&self, user_id: Uuid, is_admin: bool, now: DateTime<Utc>) -> Result<String> {
    let claims = Claims {
      sub: user_id,
      adm: is_admin,
      iat: now.timestamp(),
      exp: (now + self.ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
      .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
  }

  /// Checks the signature, the algorithm and `exp` against the current time.
  pub fn verify(&self, token: &str) -> Result<Claims> {
    decode::<Claims>(token, &self.decoding_key, &self.validation)
      .map(|data| data.claims)
      .map_err(|e| {
        debug!(error = %e, "Token rejected.");
        AppError::Auth("Invalid or expired session token.".to_string())
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn signer() -> TokenSigner {
    TokenSigner::new("0123456789abcdef0123456789abcdef", Duration::minutes(30))
  }

  #[test]
  fn issued_token_verifies() {
    let user_id = Uuid::new_v4();
    let token = signer().issue(user_id, true, Utc::now()).unwrap();
    let claims = signer().verify(&token).unwrap();
    assert_eq!(claims.sub, user_id);
    assert!(claims.adm);
    assert_eq!(claims.exp - claims.iat, 30 * 60);
  }

  #[test]
  fn expired_token_is_rejected() {
    let issued_at = Utc::now() - Duration::minutes(31);
    let token = signer().issue(Uuid::new_v4(), false, issued_at).unwrap();
    assert!(matches!(signer().verify(&token), Err(AppError::Auth(_))));
  }

  #[test]
  fn tampered_claims_are_rejected() {
    let token = signer().issue(Uuid::new_v4(), false, Utc::now()).unwrap();
    let escalated = TokenSigner::new("another-secret-another-secret-xx", Duration::minutes(30))
      .issue(Uuid::new_v4(), true, Utc::now())
      .unwrap();
    let mut parts: Vec<&str> = token.split('.').collect();
    // Payload from another token, signature from ours.
    parts[1] = escalated.split('.').nth(1).unwrap();
    assert!(signer().verify(&parts.join(".")).is_err());
  }

  #[test]
  fn other_secret_is_rejected() {
    let token = TokenSigner::new("another-secret-another-secret-xx", Duration::minutes(30))
      .issue(Uuid::new_v4(), false, Utc::now())
      .unwrap();
    assert!(signer().verify(&token).is_err());
    assert!(signer().verify("garbage").is_err());
  }
}
