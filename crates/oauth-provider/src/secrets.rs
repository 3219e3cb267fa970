// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand_core::RngCore;
use thiserror::Error;

/// The error returned by a [`SecretHasher`].
#[derive(Debug, Error)]
#[error("failed to hash or verify a client secret")]
pub struct SecretHasherError(#[source] argon2::password_hash::Error);

/// Hashes and verifies OAuth client secrets.
///
/// The hashing algorithm itself is a collaborator: the provider service only
/// relies on `verify` not leaking timing information about the stored hash.
pub trait SecretHasher: Send + Sync {
    /// Hash a secret for storage.
    ///
    /// # Errors
    ///
    /// Returns a [`SecretHasherError`] if hashing fails.
    fn hash(
        &self,
        rng: &mut (dyn RngCore + Send),
        secret: &str,
    ) -> Result<String, SecretHasherError>;

    /// Verify a presented secret against a stored hash, in constant time
    /// with respect to the secret.
    ///
    /// # Errors
    ///
    /// Returns a [`SecretHasherError`] if the stored hash cannot be parsed.
    fn verify(&self, secret: &str, hash: &str) -> Result<bool, SecretHasherError>;
}

/// A [`SecretHasher`] backed by Argon2id.
#[derive(Default)]
pub struct Argon2SecretHasher {
    inner: Argon2<'static>,
}

impl SecretHasher for Argon2SecretHasher {
    fn hash(
        &self,
        rng: &mut (dyn RngCore + Send),
        secret: &str,
    ) -> Result<String, SecretHasherError> {
        let mut salt = [0u8; 16];
        rng.fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(SecretHasherError)?;

        let hash = self
            .inner
            .hash_password(secret.as_bytes(), &salt)
            .map_err(SecretHasherError)?;
        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, SecretHasherError> {
        let parsed = PasswordHash::new(hash).map_err(SecretHasherError)?;
        match self.inner.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(SecretHasherError(err)),
        }
    }
}
