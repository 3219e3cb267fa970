// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Repositories to interact with the ephemeral credentials we hold on
//! remote systems

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use etwin_data_model::{
    Clock, RemoteAccountRef, RemoteOAuthTokens, RemoteServer, RemoteSession, RemoteSessionKey,
    RemoteTokenKey,
};

use crate::repository_impl;

/// A [`RemoteSessionRepository`] helps interacting with [`RemoteSession`]
/// saved in the storage backend.
///
/// Sessions are caches of external truth; touches are last-write-wins and
/// the stored user is advisory.
#[async_trait]
pub trait RemoteSessionRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Create or refresh the session for the given key
    ///
    /// Touching a key with the same user only refreshes `last_used_at`;
    /// touching it with a different user rotates the record.
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to generate timestamps
    /// * `key`: The session key, unique per remote server
    /// * `remote`: The account this session authenticates as
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn touch(
        &mut self,
        clock: &dyn Clock,
        key: RemoteSessionKey,
        remote: RemoteAccountRef,
    ) -> Result<RemoteSession, Self::Error>;

    /// Delete the session for the given key, idempotently
    ///
    /// # Parameters
    ///
    /// * `server`: The remote server the key belongs to
    /// * `key`: The session key to revoke
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn revoke(
        &mut self,
        server: RemoteServer,
        key: &RemoteSessionKey,
    ) -> Result<(), Self::Error>;

    /// Get the last known session for a remote account
    ///
    /// Returns `None` if no session is stored. The external system may have
    /// invalidated the session out of band; callers must treat the result as
    /// advisory.
    ///
    /// # Parameters
    ///
    /// * `remote`: The remote account to look up
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_user(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<Option<RemoteSession>, Self::Error>;
}

repository_impl!(RemoteSessionRepository:
    async fn touch(
        &mut self,
        clock: &dyn Clock,
        key: RemoteSessionKey,
        remote: RemoteAccountRef,
    ) -> Result<RemoteSession, Self::Error>;

    async fn revoke(
        &mut self,
        server: RemoteServer,
        key: &RemoteSessionKey,
    ) -> Result<(), Self::Error>;

    async fn find_by_user(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<Option<RemoteSession>, Self::Error>;
);

/// A [`RemoteTokenRepository`] helps interacting with the OAuth tokens some
/// remote providers hand out ([`RemoteOAuthTokens`]).
#[async_trait]
pub trait RemoteTokenRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Upsert the OAuth token pair for a remote account
    ///
    /// Any prior access or refresh token held for that account is rotated
    /// out; the association between a remote account and its refresh token
    /// is unique.
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to generate timestamps
    /// * `access_token`: The access token key
    /// * `refresh_token`: The refresh token key
    /// * `expires_at`: When the access token expires
    /// * `remote`: The remote account the tokens belong to
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn touch_oauth(
        &mut self,
        clock: &dyn Clock,
        access_token: RemoteTokenKey,
        refresh_token: RemoteTokenKey,
        expires_at: DateTime<Utc>,
        remote: RemoteAccountRef,
    ) -> Result<RemoteOAuthTokens, Self::Error>;

    /// Forget an access token, idempotently
    ///
    /// Independent from refresh-token revocation.
    ///
    /// # Parameters
    ///
    /// * `access_token`: The access token key to revoke
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn revoke_access_token(
        &mut self,
        access_token: &RemoteTokenKey,
    ) -> Result<(), Self::Error>;

    /// Forget a refresh token, idempotently
    ///
    /// # Parameters
    ///
    /// * `refresh_token`: The refresh token key to revoke
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn revoke_refresh_token(
        &mut self,
        refresh_token: &RemoteTokenKey,
    ) -> Result<(), Self::Error>;

    /// Get the token pair held for a remote account
    ///
    /// Returns `None` if no refresh token is held. An expired access token
    /// is filtered out of the pair.
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to evaluate access-token expiry
    /// * `remote`: The remote account to look up
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_user(
        &mut self,
        clock: &dyn Clock,
        remote: &RemoteAccountRef,
    ) -> Result<Option<RemoteOAuthTokens>, Self::Error>;
}

repository_impl!(RemoteTokenRepository:
    async fn touch_oauth(
        &mut self,
        clock: &dyn Clock,
        access_token: RemoteTokenKey,
        refresh_token: RemoteTokenKey,
        expires_at: DateTime<Utc>,
        remote: RemoteAccountRef,
    ) -> Result<RemoteOAuthTokens, Self::Error>;

    async fn revoke_access_token(
        &mut self,
        access_token: &RemoteTokenKey,
    ) -> Result<(), Self::Error>;

    async fn revoke_refresh_token(
        &mut self,
        refresh_token: &RemoteTokenKey,
    ) -> Result<(), Self::Error>;

    async fn find_by_user(
        &mut self,
        clock: &dyn Clock,
        remote: &RemoteAccountRef,
    ) -> Result<Option<RemoteOAuthTokens>, Self::Error>;
);
