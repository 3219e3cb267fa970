// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use chrono::Duration;
use etwin_data_model::{Clock, Ulid};
use etwin_oauth2_types::scope::Scope;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The claims carried by a grant code.
///
/// This is the wire format of the code: a compact HS256 JWT with exactly
/// these claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantCodeClaims {
    /// Issuer
    pub iss: String,
    /// Subject: the user who granted the authorization
    pub sub: Ulid,
    /// The recipients the code is intended for: the client id, plus the
    /// client key for system clients
    pub aud: Vec<String>,
    /// The granted authorization scopes
    pub scopes: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// The error returned when a grant code fails verification.
#[derive(Debug, Error)]
pub enum VerifyCodeError {
    /// The token is not a JWT we signed.
    #[error("malformed or badly signed grant code")]
    Malformed(#[source] jsonwebtoken::errors::Error),

    /// The token was signed for another issuer.
    #[error("grant code issued by {0:?}")]
    WrongIssuer(String),

    /// The current time is outside the validity window of the code.
    #[error("grant code is not valid at this time")]
    Expired,
}

/// Signs and verifies grant codes.
///
/// Verification is pure CPU work: the expiry is self-contained in the code
/// and enforced here regardless of store availability.
pub struct GrantCodeSigner {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
}

impl GrantCodeSigner {
    /// Create a signer from a shared secret.
    #[must_use]
    pub fn new(issuer: String, secret: &[u8], validity: Duration) -> Self {
        Self {
            issuer,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validity,
        }
    }

    /// How long a signed code stays valid.
    #[must_use]
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign a grant code for the given user, audience and scope.
    ///
    /// # Errors
    ///
    /// Returns an error if JWT serialization fails.
    pub fn sign(
        &self,
        clock: &dyn Clock,
        user_id: Ulid,
        audience: Vec<String>,
        scope: &Scope,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = clock.now();
        let expires_at = now + self.validity;

        let claims = GrantCodeClaims {
            iss: self.issuer.clone(),
            sub: user_id,
            aud: audience,
            scopes: scope.iter().map(|token| token.as_str().to_owned()).collect(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Verify a grant code and return its claims.
    ///
    /// The validity window is checked strictly: `iat <= now < exp`.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyCodeError`] if the signature, issuer or validity
    /// window is wrong.
    pub fn verify(&self, clock: &dyn Clock, code: &str) -> Result<GrantCodeClaims, VerifyCodeError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // The window and audience are checked by hand, strictly and against
        // the resolved client
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token = jsonwebtoken::decode::<GrantCodeClaims>(code, &self.decoding_key, &validation)
            .map_err(VerifyCodeError::Malformed)?;
        let claims = token.claims;

        if claims.iss != self.issuer {
            return Err(VerifyCodeError::WrongIssuer(claims.iss));
        }

        let now = clock.now().timestamp();
        if !(claims.iat <= now && now < claims.exp) {
            return Err(VerifyCodeError::Expired);
        }

        Ok(claims)
    }
}

/// Hex digest of a grant code, used as the key of the store-backed
/// single-use record so the code itself is never persisted.
#[must_use]
pub fn code_digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use etwin_data_model::MockClock;

    use super::*;

    fn signer() -> GrantCodeSigner {
        GrantCodeSigner::new("etwin".to_owned(), b"dev-secret", Duration::minutes(10))
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let clock = MockClock::default();
        let signer = signer();
        let user = Ulid::from_parts(1, 7);

        let code = signer
            .sign(
                &clock,
                user,
                vec!["eternalfest@clients".to_owned()],
                &Scope::from_str("base").unwrap(),
            )
            .unwrap();

        let claims = signer.verify(&clock, &code).unwrap();
        assert_eq!(claims.iss, "etwin");
        assert_eq!(claims.sub, user);
        assert_eq!(claims.scopes, vec!["base".to_owned()]);
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn expired_code_is_rejected() {
        let clock = MockClock::default();
        let signer = signer();

        let code = signer
            .sign(&clock, Ulid::from_parts(1, 7), vec![], &Scope::default())
            .unwrap();

        clock.advance(Duration::minutes(10));
        assert_matches!(signer.verify(&clock, &code), Err(VerifyCodeError::Expired));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let clock = MockClock::default();
        let signer = signer();
        let other = GrantCodeSigner::new("etwin".to_owned(), b"other-secret", Duration::minutes(10));

        let code = other
            .sign(&clock, Ulid::from_parts(1, 7), vec![], &Scope::default())
            .unwrap();
        assert_matches!(signer.verify(&clock, &code), Err(VerifyCodeError::Malformed(_)));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let clock = MockClock::default();
        let signer = signer();
        let other =
            GrantCodeSigner::new("impostor".to_owned(), b"dev-secret", Duration::minutes(10));

        let code = other
            .sign(&clock, Ulid::from_parts(1, 7), vec![], &Scope::default())
            .unwrap();
        assert_matches!(
            signer.verify(&clock, &code),
            Err(VerifyCodeError::WrongIssuer(iss)) if iss == "impostor"
        );
    }

    #[test]
    fn digest_is_stable_and_code_free() {
        let digest = code_digest("some-code");
        assert_eq!(digest, code_digest("some-code"));
        assert_eq!(digest.len(), 64);
        assert!(!digest.contains("some-code"));
    }
}
