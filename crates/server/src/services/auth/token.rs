//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs whose subject is the account email. Expiry is an
//! absolute timestamp checked without leeway.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::AuthError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Issues and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
}

impl TokenSigner {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Sign a token for `subject` that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the key is empty or encoding fails.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, AuthError> {
        let key = self.secret.expose_secret();
        if key.is_empty() {
            return Err(AuthError::Signing("signing key is empty".to_owned()));
        }

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| AuthError::Signing(e.to_string()))?;
        let claims = Claims {
            sub: subject.to_owned(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to encode bearer token");
            AuthError::Signing(e.to_string())
        })
    }

    /// Verify a token and return its subject.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` for any signature, expiry or
    /// format problem.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims.sub)
        .map_err(|e| {
            tracing::debug!(error = %e, "Token validation failed");
            AuthError::Unauthenticated
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(SecretString::from(secret))
    }

    #[test]
    fn test_issue_then_verify_returns_subject() {
        let signer = signer("k9$Fq2!vLm7@Rz4#Tb8^Wn1&Xc5*Hd3%");
        let token = signer
            .issue("user@example.com", Duration::from_secs(60))
            .unwrap();
        assert_eq!(signer.verify(&token).unwrap(), "user@example.com");
    }

    #[test]
    fn test_empty_key_is_a_signing_error() {
        let err = signer("").issue("user@example.com", Duration::from_secs(60));
        assert!(matches!(err, Err(AuthError::Signing(_))));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let token = signer("first-key-Xq8!mZ2@pL5#rT9$wB3%")
            .issue("user@example.com", Duration::from_secs(60))
            .unwrap();
        let err = signer("second-key-Jk4^nV7&cH1*yF6(gD0)").verify(&token);
        assert!(matches!(err, Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = signer("k9$Fq2!vLm7@Rz4#Tb8^Wn1&Xc5*Hd3%");
        let claims = Claims {
            sub: "user@example.com".to_owned(),
            exp: Utc::now().timestamp() - 10,
            iat: Utc::now().timestamp() - 70,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"k9$Fq2!vLm7@Rz4#Tb8^Wn1&Xc5*Hd3%"),
        )
        .unwrap();
        assert!(matches!(signer.verify(&token), Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let signer = signer("k9$Fq2!vLm7@Rz4#Tb8^Wn1&Xc5*Hd3%");
        assert!(matches!(signer.verify("not.a.token"), Err(AuthError::Unauthenticated)));
        assert!(matches!(signer.verify(""), Err(AuthError::Unauthenticated)));
    }
}
