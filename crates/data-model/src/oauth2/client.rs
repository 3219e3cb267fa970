// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;
use url::Url;
use uuid::Uuid;

static CLIENT_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]{1,31}@clients$").unwrap());

/// The error returned when a client key does not match the
/// `name@clients` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid oauth client key")]
pub struct InvalidOAuthClientKey;

/// The stable key of a system client, of the form `name@clients`.
///
/// System clients are provisioned by the platform operator and addressed by
/// this key; externally registered clients only have an id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OAuthClientKey(String);

impl OAuthClientKey {
    /// Get the key as a string slice, including the `@clients` suffix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OAuthClientKey {
    type Err = InvalidOAuthClientKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if CLIENT_KEY_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidOAuthClientKey)
        }
    }
}

impl TryFrom<String> for OAuthClientKey {
    type Error = InvalidOAuthClientKey;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OAuthClientKey> for String {
    fn from(key: OAuthClientKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for OAuthClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference to an OAuth client, either by id or by system key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OAuthClientRef {
    Id(Ulid),
    Key(OAuthClientKey),
}

impl FromStr for OAuthClientRef {
    type Err = InvalidOAuthClientKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(key) = s.parse::<OAuthClientKey>() {
            return Ok(OAuthClientRef::Key(key));
        }
        if let Ok(ulid) = Ulid::from_string(s) {
            return Ok(OAuthClientRef::Id(ulid));
        }
        if let Ok(uuid) = Uuid::from_str(s) {
            return Ok(OAuthClientRef::Id(Ulid::from(uuid)));
        }
        Err(InvalidOAuthClientKey)
    }
}

/// A registered OAuth client.
///
/// The client secret is never part of this record; its hash stays inside the
/// provider store and is only reachable through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub id: Ulid,

    /// The stable key, for system clients.
    pub key: Option<OAuthClientKey>,

    /// Name of the client to be presented to the end user.
    pub display_name: String,

    /// URL of the home page of the client application.
    pub app_uri: Url,

    /// The single registered redirection URI of the client.
    pub callback_uri: Url,

    /// The user who registered the client, for external clients.
    pub owner: Option<Ulid>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum InvalidRedirectUriError {
    #[error("redirect_uri does not match the registered callback_uri")]
    Mismatch,
}

impl OAuthClient {
    /// Determine which redirect URI to use for the given request.
    ///
    /// Clients register exactly one callback; a request may repeat it but
    /// never substitute it.
    ///
    /// # Errors
    ///
    /// Returns an error if the given URI differs from the registered one.
    pub fn resolve_redirect_uri<'a>(
        &'a self,
        redirect_uri: Option<&'a Url>,
    ) -> Result<&'a Url, InvalidRedirectUriError> {
        match redirect_uri {
            None => Ok(&self.callback_uri),
            Some(uri) if uri == &self.callback_uri => Ok(uri),
            Some(_) => Err(InvalidRedirectUriError::Mismatch),
        }
    }

    /// The audience values a grant code for this client carries: the id,
    /// plus the key for system clients.
    #[must_use]
    pub fn audience(&self) -> Vec<String> {
        let mut aud = Vec::with_capacity(2);
        aud.push(self.id.to_string());
        if let Some(key) = &self.key {
            aud.push(key.to_string());
        }
        aud
    }

    /// Whether the given audience claim names this client.
    #[must_use]
    pub fn matches_audience(&self, aud: &[String]) -> bool {
        let id = self.id.to_string();
        aud.iter().any(|a| {
            *a == id || self.key.as_ref().is_some_and(|key| a == key.as_str())
        })
    }
}
