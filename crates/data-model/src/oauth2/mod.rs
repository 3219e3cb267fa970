// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

mod client;

pub use self::client::{
    InvalidOAuthClientKey, InvalidRedirectUriError, OAuthClient, OAuthClientKey, OAuthClientRef,
};
