// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! [OAuth 2.0] types used by the Eternaltwin identity-federation core.
//!
//! [OAuth 2.0]: https://oauth.net/2/

#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod errors;
pub mod requests;
pub mod scope;
