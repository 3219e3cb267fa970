// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use etwin_data_model::{Clock, OAuthClient, OAuthClientKey};
use rand_core::RngCore;
use ulid::Ulid;
use url::Url;

use crate::repository_impl;

/// An [`OAuth2ClientRepository`] helps interacting with [`OAuthClient`]
/// saved in the storage backend.
///
/// Client secrets are stored as opaque hashes produced by the caller's
/// secret hasher; this repository never sees plaintext secrets.
#[async_trait]
pub trait OAuth2ClientRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an OAuth client by its ID
    ///
    /// Returns `None` if the client does not exist
    ///
    /// # Parameters
    ///
    /// * `id`: The ID of the client to lookup
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<OAuthClient>, Self::Error>;

    /// Find a system client by its stable key
    ///
    /// Returns `None` if no client holds the key
    ///
    /// # Parameters
    ///
    /// * `key`: The key of the client to find
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_key(
        &mut self,
        key: &OAuthClientKey,
    ) -> Result<Option<OAuthClient>, Self::Error>;

    /// Create or update a platform-provisioned system client, keyed by its
    /// stable key
    ///
    /// The display name, URIs and secret hash are replaced in place; the id
    /// and creation time of an existing client are preserved.
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `key`: The stable key of the client
    /// * `display_name`: Name of the client shown to end users
    /// * `app_uri`: URL of the client application
    /// * `callback_uri`: The registered redirection URI
    /// * `secret_hash`: Hash of the client secret
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn upsert_system(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        key: OAuthClientKey,
        display_name: String,
        app_uri: Url,
        callback_uri: Url,
        secret_hash: String,
    ) -> Result<OAuthClient, Self::Error>;

    /// Register a new external client
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `display_name`: Name of the client shown to end users
    /// * `app_uri`: URL of the client application
    /// * `callback_uri`: The registered redirection URI
    /// * `owner_id`: The user registering the client
    /// * `secret_hash`: Hash of the client secret, for confidential clients
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        display_name: String,
        app_uri: Url,
        callback_uri: Url,
        owner_id: Ulid,
        secret_hash: Option<String>,
    ) -> Result<OAuthClient, Self::Error>;

    /// Get the secret hash of a client
    ///
    /// Returns `None` for public clients, which have no secret
    ///
    /// # Parameters
    ///
    /// * `client`: The client whose secret hash to fetch
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn secret_hash(&mut self, client: &OAuthClient)
    -> Result<Option<String>, Self::Error>;
}

repository_impl!(OAuth2ClientRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<OAuthClient>, Self::Error>;

    async fn find_by_key(
        &mut self,
        key: &OAuthClientKey,
    ) -> Result<Option<OAuthClient>, Self::Error>;

    async fn upsert_system(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        key: OAuthClientKey,
        display_name: String,
        app_uri: Url,
        callback_uri: Url,
        secret_hash: String,
    ) -> Result<OAuthClient, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        display_name: String,
        app_uri: Url,
        callback_uri: Url,
        owner_id: Ulid,
        secret_hash: Option<String>,
    ) -> Result<OAuthClient, Self::Error>;

    async fn secret_hash(
        &mut self,
        client: &OAuthClient,
    ) -> Result<Option<String>, Self::Error>;
);
