// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Ephemeral credentials we hold on remote systems: scraped login sessions,
//! and the OAuth tokens some providers (Twinoid) hand out.
//!
//! These records are caches of external truth. A stored session may have
//! been invalidated out of band at any time, so "last known user" is
//! advisory, not a security boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::RemoteAccountRef;

/// The opaque cookie or key identifying a login session on a remote server.
///
/// The key namespace is per `(provider, server)`; keys are assumed to be
/// potentially knowable by third parties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteSessionKey(pub String);

impl RemoteSessionKey {
    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A live (as far as we know) login session on a remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub key: RemoteSessionKey,
    /// The account this session was last known to authenticate as.
    pub remote: RemoteAccountRef,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// The opaque key of a remote OAuth access or refresh token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteTokenKey(pub String);

impl RemoteTokenKey {
    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An OAuth access token we hold on a remote provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccessToken {
    pub key: RemoteTokenKey,
    pub remote: RemoteAccountRef,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RemoteAccessToken {
    /// Whether the token is expired at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An OAuth refresh token we hold on a remote provider. Refresh tokens do
/// not expire on their own; they are rotated or revoked explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRefreshToken {
    pub key: RemoteTokenKey,
    pub remote: RemoteAccountRef,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// The OAuth tokens held for one remote account. The access token is absent
/// when expired or revoked; the refresh token is the durable credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOAuthTokens {
    pub access_token: Option<RemoteAccessToken>,
    pub refresh_token: RemoteRefreshToken,
}
