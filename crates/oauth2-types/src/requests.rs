// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Requests and responses of the authorization and token endpoints.
//!
//! These types only describe the wire format; they are (de)serialized by the
//! transport layer sitting in front of the provider service.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as, skip_serializing_none};
use url::Url;

use crate::scope::Scope;

/// The response type requested on the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// The `code` response type, for the authorization-code flow.
    Code,

    /// The `token` response type. Recognised but not supported.
    Token,
}

/// The grant type of a token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// The `authorization_code` grant.
    AuthorizationCode,
}

/// Whether the client asks for offline access (a refresh token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Tokens are only usable while the resource owner is present.
    #[default]
    Online,

    /// The client may refresh tokens without the resource owner present.
    Offline,
}

/// A request on the authorization endpoint.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// The requested response type.
    pub response_type: ResponseType,

    /// The client identifier, either an id or a `…@clients` key.
    pub client_id: String,

    /// The redirection URI; when given it must match the client's registered
    /// callback exactly.
    pub redirect_uri: Option<Url>,

    /// The requested scope.
    pub scope: Option<Scope>,

    /// An opaque value echoed back to the client on the redirect.
    pub state: Option<String>,

    /// Whether the client asks for offline access.
    #[serde(default)]
    pub access_type: AccessType,
}

/// A request on the token endpoint.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    /// The grant type.
    pub grant_type: GrantType,

    /// The authorization code to exchange.
    pub code: String,

    /// The client identifier, either an id or a `…@clients` key.
    pub client_id: String,

    /// The client secret, for confidential clients.
    pub client_secret: Option<String>,

    /// The redirection URI used on the authorization request, if any.
    pub redirect_uri: Option<Url>,
}

/// The type of an issued access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessTokenType {
    /// A bearer token, per [RFC 6750](https://www.rfc-editor.org/rfc/rfc6750).
    Bearer,
}

/// A successful response from the token endpoint.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    /// The issued access token.
    pub access_token: String,

    /// The issued refresh token, for offline-capable grants.
    pub refresh_token: Option<String>,

    /// The type of the issued token.
    pub token_type: AccessTokenType,

    /// The lifetime of the access token, in seconds.
    #[serde_as(as = "DurationSeconds<i64>")]
    pub expires_in: Duration,

    /// The scope bound to the access token.
    pub scope: Scope,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn serialize_access_token_response() {
        let response = AccessTokenResponse {
            access_token: "eat_aaa".to_owned(),
            refresh_token: None,
            token_type: AccessTokenType::Bearer,
            expires_in: Duration::hours(1),
            scope: Scope::from_str("base").unwrap(),
        };

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["token_type"], "Bearer");
        assert_eq!(serialized["expires_in"], 3600);
        assert_eq!(serialized["scope"], "base");
        assert!(serialized.get("refresh_token").is_none());
    }

    #[test]
    fn deserialize_authorization_request() {
        let request: AuthorizationRequest = serde_json::from_value(serde_json::json!({
            "response_type": "code",
            "client_id": "eternalfest@clients",
            "scope": "base",
            "state": "xyz",
        }))
        .unwrap();

        assert_eq!(request.response_type, ResponseType::Code);
        assert_eq!(request.access_type, AccessType::Online);
        assert!(request.redirect_uri.is_none());
    }
}
