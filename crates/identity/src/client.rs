// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use etwin_data_model::{ProfileSnapshot, RemoteAccount, RemoteAccountRef, RemoteServer, RemoteSessionKey};
use thiserror::Error;

/// Credentials for a remote server login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub server: RemoteServer,
    pub username: String,
    pub password: String,
}

/// A freshly created or verified login session on a remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSessionInfo {
    pub key: RemoteSessionKey,
    /// The account the session authenticates as.
    pub account: RemoteAccount,
}

/// The error returned by a [`RemoteClient`].
#[derive(Debug, Error)]
pub enum RemoteClientError {
    /// The remote server rejected the credentials.
    #[error("the remote server rejected the credentials")]
    InvalidCredentials,

    /// The remote account was not found.
    #[error("remote account not found")]
    AccountNotFound,

    /// Transport or scraping failure, surfaced unchanged.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// A client for one remote provider family.
///
/// Implementations own the scraping and HTTP transport; this crate only
/// consumes the contract.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Log in on a remote server, creating a session there.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteClientError`] if the credentials are rejected or
    /// the transport fails.
    async fn create_session(
        &self,
        credentials: &RemoteCredentials,
    ) -> Result<RemoteSessionInfo, RemoteClientError>;

    /// Check whether a stored session key is still live.
    ///
    /// Returns the account it authenticates as, or `None` if the remote
    /// system invalidated the session.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteClientError`] if the transport fails.
    async fn test_session(
        &self,
        server: RemoteServer,
        key: &RemoteSessionKey,
    ) -> Result<Option<RemoteAccount>, RemoteClientError>;

    /// Scrape the public profile of a remote account.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteClientError`] if the account does not exist or the
    /// transport fails.
    async fn fetch_profile(
        &self,
        remote: &RemoteAccountRef,
    ) -> Result<ProfileSnapshot, RemoteClientError>;
}
