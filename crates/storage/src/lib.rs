// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Interactions with the storage backend
//!
//! This crate provides a set of traits that can be implemented to interact
//! with the storage backend. Those traits are called repositories and are
//! grouped by the type of data they manage.
//!
//! Each of those repositories can be accessed via the [`RepositoryAccess`]
//! trait. This trait can be wrapped in a [`BoxRepository`] to allow using it
//! without caring about the underlying storage backend, and without carrying
//! around the generic type parameter.
//!
//! A repository instance is a transaction: mutations only become visible to
//! other repositories once [`RepositoryTransaction::save`] succeeds, and are
//! discarded by [`RepositoryTransaction::cancel`]. Link mutations and
//! grant-code exchange rely on this to stay all-or-nothing.
//!
//! # Defining a new repository
//!
//! To define a new repository, you have to:
//!   1. Define a new (async) repository trait, with the methods you need
//!   2. Write an implementation of this trait for each storage backend you
//!      want (currently only for `etwin-storage-mem`)
//!   3. Make it accessible via the [`RepositoryAccess`] trait
//!
//! The repository trait definition should look like this:
//!
//! ```ignore
//! #[async_trait]
//! pub trait FakeDataRepository: Send + Sync {
//!     /// The error type returned by the repository
//!     type Error;
//!
//!     /// Lookup a [`FakeData`] by its ID
//!     ///
//!     /// Returns `None` if no [`FakeData`] was found
//!     ///
//!     /// # Errors
//!     ///
//!     /// Returns [`Self::Error`] if the underlying repository fails
//!     async fn lookup(&mut self, id: Ulid) -> Result<Option<FakeData>, Self::Error>;
//! }
//!
//! repository_impl!(FakeDataRepository:
//!     async fn lookup(&mut self, id: Ulid) -> Result<Option<FakeData>, Self::Error>;
//! );
//! ```
//!
//! Things to note with the implementation:
//!
//!   1. It defines an associated error type, and all functions are fallible,
//!      and use that error type
//!   2. Lookups return an `Result<Option<T>, Self::Error>`, because 'not
//!      found' errors are usually cases that are handled differently
//!   3. Operations that need to record the current time take a
//!      [`Clock`][`etwin_data_model::Clock`] parameter. Operations that need
//!      to generate new IDs also take a random number generator.
//!   4. All the methods use an `&mut self`. This ensures only one operation
//!      is done at a time on a single repository instance.

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub(crate) mod repository;
mod utils;

pub mod archive;
pub mod link;
pub mod oauth2;
pub mod remote_session;
pub mod user;

pub use self::{
    repository::{
        BoxRepository, BoxRepositoryFactory, Repository, RepositoryAccess, RepositoryError,
        RepositoryFactory, RepositoryTransaction,
    },
    utils::MapErr,
};
