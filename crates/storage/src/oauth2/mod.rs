// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Repositories to interact with the platform's own OAuth 2.0 provider
//! entities

mod access_token;
mod authorization_code;
mod client;
mod refresh_token;

pub use self::{
    access_token::OAuth2AccessTokenRepository,
    authorization_code::{CodeUse, OAuth2AuthorizationCodeRepository},
    client::OAuth2ClientRepository,
    refresh_token::OAuth2RefreshTokenRepository,
};
