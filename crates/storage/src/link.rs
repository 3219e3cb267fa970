// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Repository to interact with the identity link graph

use async_trait::async_trait;
use etwin_data_model::{Clock, RemoteAccountRef, VersionedLink, VersionedLinks};
use ulid::Ulid;

use crate::repository_impl;

/// The result of a link touch.
///
/// A conflict is part of the normal protocol of the operation, not a backend
/// failure, so it is carried in the `Ok` arm of repository results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TouchLinkOutcome {
    /// The pair is actively linked; idempotent re-touches land here too.
    Linked(VersionedLink),

    /// The remote account is actively linked to a different user. Linked
    /// remote accounts are never stolen.
    Conflict {
        /// The user currently holding the remote account.
        existing_user: Ulid,
    },
}

/// A [`LinkRepository`] helps interacting with [`VersionedLink`] saved in the
/// storage backend.
///
/// Both lookup sides (by remote account and by user) observe the same state;
/// the backend maintains the secondary index.
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Get the link slot for a remote account
    ///
    /// Returns an empty [`VersionedLink`] if the account was never linked
    ///
    /// # Parameters
    ///
    /// * `remote`: The remote account to look up
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn get_by_remote(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<VersionedLink, Self::Error>;

    /// Get every link slot of a user, one per remote server
    ///
    /// # Parameters
    ///
    /// * `user_id`: The user whose slots to return
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn get_for_user(&mut self, user_id: Ulid) -> Result<VersionedLinks, Self::Error>;

    /// Link a remote account to a user, idempotently
    ///
    /// Re-touching an identical active pair is a no-op. If the acting user
    /// already holds a different remote account on the same server, that
    /// link is implicitly unlinked at the current time and superseded. If
    /// the remote account is held by a *different* user, the touch returns
    /// [`TouchLinkOutcome::Conflict`] and nothing changes.
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to generate timestamps
    /// * `remote`: The remote account to link
    /// * `user_id`: The user to link it to
    /// * `actor_id`: The user performing the action
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn touch(
        &mut self,
        clock: &dyn Clock,
        remote: RemoteAccountRef,
        user_id: Ulid,
        actor_id: Ulid,
    ) -> Result<TouchLinkOutcome, Self::Error>;

    /// Unlink a remote account, unconditionally
    ///
    /// Idempotent when the account is already unlinked. The superseded pair
    /// is pushed into the slot history.
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to generate timestamps
    /// * `remote`: The remote account to unlink
    /// * `actor_id`: The user performing the action
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn unlink(
        &mut self,
        clock: &dyn Clock,
        remote: RemoteAccountRef,
        actor_id: Ulid,
    ) -> Result<VersionedLink, Self::Error>;
}

repository_impl!(LinkRepository:
    async fn get_by_remote(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<VersionedLink, Self::Error>;

    async fn get_for_user(&mut self, user_id: Ulid) -> Result<VersionedLinks, Self::Error>;

    async fn touch(
        &mut self,
        clock: &dyn Clock,
        remote: RemoteAccountRef,
        user_id: Ulid,
        actor_id: Ulid,
    ) -> Result<TouchLinkOutcome, Self::Error>;

    async fn unlink(
        &mut self,
        clock: &dyn Clock,
        remote: RemoteAccountRef,
        actor_id: Ulid,
    ) -> Result<VersionedLink, Self::Error>;
);
