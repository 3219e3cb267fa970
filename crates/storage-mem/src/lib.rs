// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! An in-memory implementation of the repositories defined by
//! [`etwin-storage`][`etwin_storage`].
//!
//! Each [`MemRepository`] works on a snapshot of the shared state taken when
//! the transaction starts; committing compares the state version and swaps
//! the whole state in, so two concurrent transactions can never both apply
//! on top of the same snapshot. This is the in-memory analogue of a
//! serializable database transaction: a lost update becomes a
//! [`MemStorageError::WriteConflict`] instead of silent corruption.

#![deny(clippy::future_not_send)]
#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use etwin_data_model::{
    AccessToken, ArchivedRemoteAccount, LinkAction, OAuthClient, OAuthClientKey, RefreshToken,
    RemoteAccountId, RemoteAccountRef, RemoteAccessToken, RemoteRefreshToken, RemoteServer,
    RemoteSession, RemoteSessionKey, RemoteTokenKey, Ulid, User,
};
use thiserror::Error;

mod archive;
mod link;
mod oauth2;
mod remote_session;
mod repository;
mod user;

pub use self::repository::{MemRepository, MemRepositoryFactory};

/// The error type returned by the in-memory backend.
#[derive(Debug, Error)]
pub enum MemStorageError {
    /// A concurrent transaction committed on top of the same snapshot.
    #[error("a concurrent transaction committed first")]
    WriteConflict,

    /// The shared state lock was poisoned by a panicking thread.
    #[error("storage state lock poisoned")]
    Poisoned,
}

/// One link edge, active while `unlinked` is `None`.
#[derive(Debug, Clone)]
pub(crate) struct LinkRecord {
    pub(crate) linked: LinkAction,
    pub(crate) unlinked: Option<LinkAction>,
    pub(crate) user: Ulid,
    pub(crate) remote: RemoteAccountRef,
}

/// The whole backend state. Cloned at transaction start, swapped at commit.
#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    pub(crate) users: HashMap<Ulid, User>,

    /// Every link edge ever created, append-only. Active edges are the ones
    /// with no unlink action; both lookup sides scan this list.
    pub(crate) links: Vec<LinkRecord>,

    pub(crate) remote_sessions: HashMap<(RemoteServer, RemoteSessionKey), RemoteSession>,
    pub(crate) remote_session_by_user: HashMap<(RemoteServer, RemoteAccountId), RemoteSessionKey>,

    pub(crate) remote_access_tokens: HashMap<RemoteTokenKey, RemoteAccessToken>,
    pub(crate) remote_refresh_tokens: HashMap<RemoteTokenKey, RemoteRefreshToken>,
    pub(crate) remote_access_token_by_user: HashMap<(RemoteServer, RemoteAccountId), RemoteTokenKey>,
    pub(crate) remote_refresh_token_by_user:
        HashMap<(RemoteServer, RemoteAccountId), RemoteTokenKey>,

    pub(crate) archive: HashMap<(RemoteServer, RemoteAccountId), ArchivedRemoteAccount>,

    pub(crate) oauth2_clients: HashMap<Ulid, OAuthClient>,
    pub(crate) oauth2_client_by_key: HashMap<OAuthClientKey, Ulid>,
    pub(crate) oauth2_client_secrets: HashMap<Ulid, String>,

    pub(crate) oauth2_access_tokens: HashMap<Ulid, AccessToken>,
    pub(crate) oauth2_access_token_by_token: HashMap<String, Ulid>,
    pub(crate) oauth2_refresh_tokens: HashMap<Ulid, RefreshToken>,
    pub(crate) oauth2_refresh_token_by_token: HashMap<String, Ulid>,

    /// Digests of already-exchanged grant codes, with the code expiry.
    pub(crate) oauth2_used_codes: HashMap<String, DateTime<Utc>>,
}
