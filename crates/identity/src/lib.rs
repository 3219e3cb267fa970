// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! The identity and linking façade.
//!
//! This crate combines the link graph, the archive and the session store
//! behind one service, and owns the only code path which talks to the
//! per-provider [`RemoteClient`]s. The stores themselves never reach out to
//! remote systems.

#![allow(clippy::module_name_repetitions)]

mod client;
mod service;

pub use self::{
    client::{RemoteClient, RemoteClientError, RemoteCredentials, RemoteSessionInfo},
    service::{IdentityError, IdentityService, UserAndLinks},
};
