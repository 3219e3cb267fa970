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
use uuid::Uuid;

use crate::oauth2::OAuthClientKey;

/// A central ("etwin") user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

const USER_SUFFIX: &str = "@users";
const CLIENT_SUFFIX: &str = "@clients";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]{1,31}$").unwrap());

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// The error returned when a login string matches no known form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognized login format")]
pub struct ParseLoginError;

/// A parsed login string, identifying a user or an OAuth client.
///
/// The forms are tried in a fixed priority order: suffixed user login
/// (`…@users`), client login (`…@clients`), email address, bare username,
/// bare UUID. A bare UUID is untyped: it may name a user or a client, and
/// the caller is expected to try both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    UserId(Ulid),
    Username(String),
    Email(String),
    OAuthClientId(Ulid),
    OAuthClientKey(OAuthClientKey),
    Uuid(Uuid),
}

fn parse_id(input: &str) -> Option<Ulid> {
    if let Ok(ulid) = Ulid::from_string(input) {
        return Some(ulid);
    }
    Uuid::from_str(input).ok().map(Ulid::from)
}

impl FromStr for Login {
    type Err = ParseLoginError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some(inner) = input.strip_suffix(USER_SUFFIX) {
            if let Some(id) = parse_id(inner) {
                return Ok(Login::UserId(id));
            }
            if USERNAME_RE.is_match(inner) {
                return Ok(Login::Username(inner.to_owned()));
            }
            return Err(ParseLoginError);
        }

        if let Some(inner) = input.strip_suffix(CLIENT_SUFFIX) {
            if let Some(id) = parse_id(inner) {
                return Ok(Login::OAuthClientId(id));
            }
            // The client key pattern includes the suffix itself
            if let Ok(key) = input.parse::<OAuthClientKey>() {
                return Ok(Login::OAuthClientKey(key));
            }
            return Err(ParseLoginError);
        }

        if EMAIL_RE.is_match(input) {
            return Ok(Login::Email(input.to_owned()));
        }

        if USERNAME_RE.is_match(input) {
            return Ok(Login::Username(input.to_owned()));
        }

        if let Ok(uuid) = Uuid::from_str(input) {
            return Ok(Login::Uuid(uuid));
        }

        Err(ParseLoginError)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn suffixed_user_logins() {
        assert_matches!(
            "demurgos@users".parse(),
            Ok(Login::Username(name)) if name == "demurgos"
        );
        assert_matches!(
            "9f310484-963b-446b-af69-797feec6813f@users".parse(),
            Ok(Login::UserId(_))
        );
        assert_matches!("Not A Name@users".parse::<Login>(), Err(ParseLoginError));
    }

    #[test]
    fn client_logins() {
        assert_matches!(
            "eternalfest@clients".parse(),
            Ok(Login::OAuthClientKey(key)) if key.as_str() == "eternalfest@clients"
        );
        assert_matches!(
            "d19e61a3-83d3-410f-84ec-49aaab841559@clients".parse(),
            Ok(Login::OAuthClientId(_))
        );
    }

    #[test]
    fn email_wins_over_username() {
        assert_matches!(
            "alice@example.com".parse(),
            Ok(Login::Email(email)) if email == "alice@example.com"
        );
        assert_matches!(
            "alice".parse(),
            Ok(Login::Username(name)) if name == "alice"
        );
    }

    #[test]
    fn bare_uuid_is_untyped() {
        assert_matches!(
            "9f310484-963b-446b-af69-797feec6813f".parse(),
            Ok(Login::Uuid(_))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_matches!("".parse::<Login>(), Err(ParseLoginError));
        assert_matches!("Not A Login!".parse::<Login>(), Err(ParseLoginError));
    }
}
