// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! The platform's own OAuth 2.0 authorization-code provider.
//!
//! Grant codes are stateless signed JWTs with a short lifetime; single use
//! is enforced through a store-backed used-code record, since the lifetime
//! alone cannot stop replay within the validity window. Issued access and
//! refresh tokens are opaque, persisted and revocable.

#![allow(clippy::module_name_repetitions)]

mod code;
mod secrets;
mod service;

pub use self::{
    code::{GrantCodeClaims, GrantCodeSigner, VerifyCodeError, code_digest},
    secrets::{Argon2SecretHasher, SecretHasher, SecretHasherError},
    service::{
        AuthenticateError, Authentication, AuthorizationCodeGrant, AuthorizeError, ExchangeError,
        OAuthProviderService, ProvisionError, RevokeError, SystemClientDefinition,
    },
};
