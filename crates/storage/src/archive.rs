// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Repository to interact with archived remote accounts and their scraped
//! profile attributes

use async_trait::async_trait;
use etwin_data_model::{
    ArchivedRemoteAccount, Clock, ProfileSnapshot, RemoteAccount, RemoteAccountRef,
    StaleObservation,
};

use crate::repository_impl;

/// The result of merging a profile snapshot into the archive.
///
/// Stale observations are part of the normal protocol of the operation, not
/// a backend failure, so they are carried in the `Ok` arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileMergeOutcome {
    /// The snapshot was merged; the updated account is returned.
    Merged(ArchivedRemoteAccount),

    /// At least one attribute was captured before its latest stored
    /// retrieval. Nothing was merged.
    Stale(StaleObservation),

    /// The account identity was never archived. Touch it first.
    UnknownAccount,
}

/// A [`RemoteArchiveRepository`] helps interacting with
/// [`ArchivedRemoteAccount`] saved in the storage backend
#[async_trait]
pub trait RemoteArchiveRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Record a remote account identity, idempotently
    ///
    /// Creates the archived account on first sight; later touches update the
    /// username and keep the profile untouched.
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to generate timestamps
    /// * `account`: The account as just seen on the remote system
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn touch_account(
        &mut self,
        clock: &dyn Clock,
        account: RemoteAccount,
    ) -> Result<ArchivedRemoteAccount, Self::Error>;

    /// Lookup an archived account
    ///
    /// Returns `None` if the account was never archived
    ///
    /// # Parameters
    ///
    /// * `remote`: The remote account to look up
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<Option<ArchivedRemoteAccount>, Self::Error>;

    /// Merge a scraped profile snapshot into the archived account
    ///
    /// Each present attribute is merged independently per the temporal merge
    /// rules; a snapshot captured before the latest stored retrieval of any
    /// present attribute is rejected as a whole and nothing is merged.
    ///
    /// # Parameters
    ///
    /// * `remote`: The remote account the snapshot belongs to
    /// * `snapshot`: The scraped attribute values with their capture time
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn record_profile(
        &mut self,
        remote: &RemoteAccountRef,
        snapshot: ProfileSnapshot,
    ) -> Result<ProfileMergeOutcome, Self::Error>;
}

repository_impl!(RemoteArchiveRepository:
    async fn touch_account(
        &mut self,
        clock: &dyn Clock,
        account: RemoteAccount,
    ) -> Result<ArchivedRemoteAccount, Self::Error>;

    async fn lookup(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<Option<ArchivedRemoteAccount>, Self::Error>;

    async fn record_profile(
        &mut self,
        remote: &RemoteAccountRef,
        snapshot: ProfileSnapshot,
    ) -> Result<ProfileMergeOutcome, Self::Error>;
);
