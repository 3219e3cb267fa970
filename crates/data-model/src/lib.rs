// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

pub(crate) mod archive;
pub mod clock;
pub(crate) mod link;
pub mod oauth2;
pub(crate) mod remote;
pub(crate) mod remote_session;
pub(crate) mod temporal;
pub(crate) mod tokens;
pub(crate) mod users;

/// Error when an invalid state transition is attempted.
#[derive(Debug, Error)]
#[error("invalid state transition")]
pub struct InvalidTransitionError;

pub use ulid::Ulid;

pub use self::{
    archive::{ArchivedRemoteAccount, ProfileSnapshot, RemoteProfile},
    clock::{Clock, MockClock, SystemClock},
    link::{Link, LinkAction, OldLink, VersionedLink, VersionedLinks},
    oauth2::{
        InvalidOAuthClientKey, InvalidRedirectUriError, OAuthClient, OAuthClientKey, OAuthClientRef,
    },
    remote::{
        InvalidRemoteField, RemoteAccount, RemoteAccountId, RemoteAccountRef, RemoteProvider,
        RemoteServer, RemoteUsername,
    },
    remote_session::{
        RemoteAccessToken, RemoteOAuthTokens, RemoteRefreshToken, RemoteSession, RemoteSessionKey,
        RemoteTokenKey,
    },
    temporal::{Period, Retrieval, StaleObservation, TemporalField},
    tokens::{
        AccessToken, AccessTokenState, RefreshToken, RefreshTokenState, TokenFormatError, TokenType,
    },
    users::{Login, ParseLoginError, User},
};
