// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One legacy account system. Each provider runs one or more regional
/// servers, and accounts are scoped to a server, not to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProvider {
    Dinoparc,
    Hammerfest,
    Twinoid,
}

/// One regional server of a [`RemoteProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RemoteServer {
    #[serde(rename = "dinoparc.com")]
    DinoparcCom,
    #[serde(rename = "en.dinoparc.com")]
    EnDinoparcCom,
    #[serde(rename = "sp.dinoparc.com")]
    SpDinoparcCom,
    #[serde(rename = "hammerfest.fr")]
    HammerfestFr,
    #[serde(rename = "hammerfest.es")]
    HammerfestEs,
    #[serde(rename = "hfest.net")]
    HfestNet,
    #[serde(rename = "twinoid.com")]
    Twinoid,
}

impl RemoteServer {
    /// All known servers, in a stable order.
    pub const ALL: [RemoteServer; 7] = [
        RemoteServer::DinoparcCom,
        RemoteServer::EnDinoparcCom,
        RemoteServer::SpDinoparcCom,
        RemoteServer::HammerfestFr,
        RemoteServer::HammerfestEs,
        RemoteServer::HfestNet,
        RemoteServer::Twinoid,
    ];

    /// The provider family this server belongs to.
    #[must_use]
    pub fn provider(self) -> RemoteProvider {
        match self {
            RemoteServer::DinoparcCom | RemoteServer::EnDinoparcCom | RemoteServer::SpDinoparcCom => {
                RemoteProvider::Dinoparc
            }
            RemoteServer::HammerfestFr | RemoteServer::HammerfestEs | RemoteServer::HfestNet => {
                RemoteProvider::Hammerfest
            }
            RemoteServer::Twinoid => RemoteProvider::Twinoid,
        }
    }

    /// The canonical host name of the server.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteServer::DinoparcCom => "dinoparc.com",
            RemoteServer::EnDinoparcCom => "en.dinoparc.com",
            RemoteServer::SpDinoparcCom => "sp.dinoparc.com",
            RemoteServer::HammerfestFr => "hammerfest.fr",
            RemoteServer::HammerfestEs => "hammerfest.es",
            RemoteServer::HfestNet => "hfest.net",
            RemoteServer::Twinoid => "twinoid.com",
        }
    }
}

impl std::fmt::Display for RemoteServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteServer {
    type Err = InvalidRemoteField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|server| server.as_str() == s)
            .ok_or(InvalidRemoteField::Server)
    }
}

/// Error returned when a remote account field does not match its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidRemoteField {
    /// Unknown remote server name.
    #[error("unknown remote server")]
    Server,

    /// Malformed remote account id.
    #[error("invalid remote account id")]
    AccountId,

    /// Malformed remote username.
    #[error("invalid remote username")]
    Username,
}

static ACCOUNT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-zA-Z_-]{1,32}$").unwrap());

/// The identifier of an account on a remote server, as assigned by the
/// legacy system itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteAccountId(String);

impl RemoteAccountId {
    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RemoteAccountId {
    type Err = InvalidRemoteField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if ACCOUNT_ID_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidRemoteField::AccountId)
        }
    }
}

impl TryFrom<String> for RemoteAccountId {
    type Error = InvalidRemoteField;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RemoteAccountId> for String {
    fn from(id: RemoteAccountId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RemoteAccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{1,32}$").unwrap());

/// The username of an account on a remote server, as scraped from the
/// legacy system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteUsername(String);

impl RemoteUsername {
    /// Get the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RemoteUsername {
    type Err = InvalidRemoteField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if USERNAME_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidRemoteField::Username)
        }
    }
}

impl TryFrom<String> for RemoteUsername {
    type Error = InvalidRemoteField;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RemoteUsername> for String {
    fn from(username: RemoteUsername) -> Self {
        username.0
    }
}

impl std::fmt::Display for RemoteUsername {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one account on one remote server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteAccountRef {
    pub server: RemoteServer,
    pub id: RemoteAccountId,
}

/// A remote account as last seen by a scrape or a login, with its username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub server: RemoteServer,
    pub id: RemoteAccountId,
    pub username: RemoteUsername,
}

impl RemoteAccount {
    /// The identity part of the account.
    #[must_use]
    pub fn account_ref(&self) -> RemoteAccountRef {
        RemoteAccountRef {
            server: self.server,
            id: self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_round_trip() {
        for server in RemoteServer::ALL {
            assert_eq!(server.as_str().parse::<RemoteServer>().unwrap(), server);
        }
        assert_eq!(
            "myhordes.eu".parse::<RemoteServer>(),
            Err(InvalidRemoteField::Server)
        );
    }

    #[test]
    fn provider_families() {
        assert_eq!(RemoteServer::HammerfestFr.provider(), RemoteProvider::Hammerfest);
        assert_eq!(RemoteServer::SpDinoparcCom.provider(), RemoteProvider::Dinoparc);
        assert_eq!(RemoteServer::Twinoid.provider(), RemoteProvider::Twinoid);
    }

    #[test]
    fn account_id_pattern() {
        assert!("123".parse::<RemoteAccountId>().is_ok());
        assert!("".parse::<RemoteAccountId>().is_err());
        assert!("with space".parse::<RemoteAccountId>().is_err());
    }
}
