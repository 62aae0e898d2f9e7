//! Token decoding and signature verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("malformed or badly signed token: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// HMAC-SHA256 shared-secret validator.
///
/// Expiry is carried in `expires_at`, not the registered `exp` claim, so the
/// library's own time checks are switched off in favour of [`validate_claims`].
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, Role};
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn mint(secret: &str, expires_in: Duration) -> (String, JwtClaims) {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: PrincipalId::new(),
            roles: vec![Role::STAFF],
            issued_at: now - Duration::seconds(1),
            expires_at: now + expires_in,
            email: Some("reader@example.com".into()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (token, claims)
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let (token, claims) = mint("s3cret", Duration::minutes(5));
        let v = Hs256JwtValidator::new("s3cret");
        assert_eq!(v.validate(&token, Utc::now()).unwrap(), claims);
    }

    #[test]
    fn rejects_wrong_secret() {
        let (token, _) = mint("s3cret", Duration::minutes(5));
        let v = Hs256JwtValidator::new("other");
        assert!(matches!(v.validate(&token, Utc::now()), Err(JwtError::Decode(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let (token, _) = mint("s3cret", Duration::minutes(5));
        let v = Hs256JwtValidator::new("s3cret");
        let later = Utc::now() + Duration::minutes(10);
        assert!(matches!(
            v.validate(&token, later),
            Err(JwtError::Claims(TokenValidationError::Expired))
        ));
    }
}
