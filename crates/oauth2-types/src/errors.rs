// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Error types returned by an authorization server, following [RFC 6749
//! section 5.2] and the authorization-endpoint error codes of section 4.1.2.1.
//!
//! [RFC 6749 section 5.2]: https://www.rfc-editor.org/rfc/rfc6749#section-5.2

use serde::{Deserialize, Serialize};

/// A client error returned by an authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientError {
    /// The error code.
    pub error: ClientErrorCode,

    /// A human-readable description of the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<ClientErrorDescription>,
}

/// A description for a [`ClientError`], either the default one for the code
/// or a dynamically built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClientErrorDescription {
    /// The default description for the error code.
    Static(&'static str),

    /// A description built for this particular error.
    Dynamic(String),
}

impl ClientErrorDescription {
    /// Get the description as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Static(description) => description,
            Self::Dynamic(description) => description,
        }
    }
}

impl ClientError {
    /// Create a new `ClientError` with the given code and description.
    #[must_use]
    pub const fn new(error: ClientErrorCode, description: &'static str) -> Self {
        Self {
            error,
            error_description: Some(ClientErrorDescription::Static(description)),
        }
    }

    /// Replace the description with the given string.
    #[must_use]
    pub fn with_description(mut self, description: String) -> Self {
        self.error_description = Some(ClientErrorDescription::Dynamic(description));
        self
    }
}

impl From<ClientErrorCode> for ClientError {
    fn from(error: ClientErrorCode) -> Self {
        let desc = error.default_description();
        Self::new(error, desc)
    }
}

/// Client error codes defined in [OAuth 2.0].
///
/// [OAuth 2.0]: https://www.rfc-editor.org/rfc/rfc6749
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorCode {
    /// The request is missing a required parameter, includes an invalid
    /// parameter value, includes a parameter more than once, or is otherwise
    /// malformed.
    InvalidRequest,

    /// Client authentication failed (e.g., unknown client, no client
    /// authentication included, or unsupported authentication method).
    InvalidClient,

    /// The provided authorization grant (e.g., authorization code, resource
    /// owner credentials) or refresh token is invalid, expired, revoked, does
    /// not match the redirection URI used in the authorization request, or was
    /// issued to another client.
    InvalidGrant,

    /// The authenticated client is not authorized to use this authorization
    /// grant type.
    UnauthorizedClient,

    /// The resource owner or authorization server denied the request.
    AccessDenied,

    /// The authorization server does not support obtaining an authorization
    /// code using this method.
    UnsupportedResponseType,

    /// The authorization grant type is not supported by the authorization
    /// server.
    UnsupportedGrantType,

    /// The requested scope is invalid, unknown, or malformed.
    InvalidScope,

    /// The authorization server encountered an unexpected condition that
    /// prevented it from fulfilling the request.
    ServerError,

    /// The authorization server is currently unable to handle the request due
    /// to a temporary overloading or maintenance of the server.
    TemporarilyUnavailable,
}

impl ClientErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientErrorCode::InvalidRequest => "invalid_request",
            ClientErrorCode::InvalidClient => "invalid_client",
            ClientErrorCode::InvalidGrant => "invalid_grant",
            ClientErrorCode::UnauthorizedClient => "unauthorized_client",
            ClientErrorCode::AccessDenied => "access_denied",
            ClientErrorCode::UnsupportedResponseType => "unsupported_response_type",
            ClientErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            ClientErrorCode::InvalidScope => "invalid_scope",
            ClientErrorCode::ServerError => "server_error",
            ClientErrorCode::TemporarilyUnavailable => "temporarily_unavailable",
        }
    }

    /// Get the default description for the error code.
    #[must_use]
    pub fn default_description(&self) -> &'static str {
        match self {
            ClientErrorCode::InvalidRequest => "The request is malformed.",
            ClientErrorCode::InvalidClient => "Client authentication failed.",
            ClientErrorCode::InvalidGrant => "The provided grant is invalid.",
            ClientErrorCode::UnauthorizedClient => {
                "The client is not authorized to use this authorization grant type."
            }
            ClientErrorCode::AccessDenied => "The resource owner denied the request.",
            ClientErrorCode::UnsupportedResponseType => {
                "Obtaining an authorization code using this method is not supported."
            }
            ClientErrorCode::UnsupportedGrantType => {
                "This authorization grant type is not supported."
            }
            ClientErrorCode::InvalidScope => "The requested scope is invalid.",
            ClientErrorCode::ServerError => "The authorization server encountered an error.",
            ClientErrorCode::TemporarilyUnavailable => {
                "The authorization server is currently unavailable."
            }
        }
    }
}

impl std::fmt::Display for ClientErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_client_error() {
        let error = ClientError::from(ClientErrorCode::InvalidScope);
        let serialized = serde_json::to_value(&error).unwrap();
        assert_eq!(serialized["error"], "invalid_scope");
        assert_eq!(serialized["error_description"], "The requested scope is invalid.");

        let error = error.with_description("unknown scope: admin".to_owned());
        let serialized = serde_json::to_value(&error).unwrap();
        assert_eq!(serialized["error_description"], "unknown scope: admin");
    }
}
