// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use etwin_data_model::Clock;

use crate::repository_impl;

/// Whether a grant code was seen for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeUse {
    /// The code was not seen before; the exchange may proceed.
    FirstUse,

    /// The code was already exchanged.
    Replayed,
}

/// An [`OAuth2AuthorizationCodeRepository`] tracks which grant codes were
/// already exchanged.
///
/// Grant codes are stateless JWTs; their signature and expiry are enforced
/// at verification time. Single use however needs a store-backed record,
/// since a short TTL alone cannot prevent replay within the validity
/// window. Only a digest of the code is stored.
#[async_trait]
pub trait OAuth2AuthorizationCodeRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Record the use of a grant code, atomically
    ///
    /// Returns [`CodeUse::FirstUse`] and records the digest if the code was
    /// never exchanged, [`CodeUse::Replayed`] otherwise.
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to generate timestamps
    /// * `code_digest`: A hex digest of the code being exchanged
    /// * `expires_at`: When the code expires; the record is only needed
    ///   until then
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn consume(
        &mut self,
        clock: &dyn Clock,
        code_digest: String,
        expires_at: DateTime<Utc>,
    ) -> Result<CodeUse, Self::Error>;

    /// Drop used-code records whose codes expired before `until`
    ///
    /// Returns the number of records dropped. Replay of an expired code is
    /// already rejected by the expiry check, so these records are dead
    /// weight.
    ///
    /// # Parameters
    ///
    /// * `until`: The cutoff instant
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn cleanup_expired(&mut self, until: DateTime<Utc>) -> Result<usize, Self::Error>;
}

repository_impl!(OAuth2AuthorizationCodeRepository:
    async fn consume(
        &mut self,
        clock: &dyn Clock,
        code_digest: String,
        expires_at: DateTime<Utc>,
    ) -> Result<CodeUse, Self::Error>;

    async fn cleanup_expired(&mut self, until: DateTime<Utc>) -> Result<usize, Self::Error>;
);
