// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use etwin_data_model::{
    ArchivedRemoteAccount, Clock, ProfileSnapshot, RemoteAccount, RemoteAccountRef, RemoteProfile,
    TemporalField,
};
use etwin_storage::archive::{ProfileMergeOutcome, RemoteArchiveRepository};

use crate::{MemStorageError, State};

/// An implementation of [`RemoteArchiveRepository`] working on an in-memory
/// state snapshot
pub(crate) struct MemRemoteArchiveRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemRemoteArchiveRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }
}

/// Merge a snapshot into a profile, attribute by attribute.
///
/// The merge is all-or-nothing: it runs on a scratch copy, so a stale
/// attribute in the middle of the snapshot leaves the stored profile
/// untouched.
fn merge_profile(
    profile: &RemoteProfile,
    snapshot: ProfileSnapshot,
) -> Result<RemoteProfile, etwin_data_model::StaleObservation> {
    let mut merged = profile.clone();
    let at = snapshot.captured_at;

    if let Some(coins) = snapshot.coins {
        TemporalField::record(&mut merged.coins, at, coins)?;
    }
    if let Some(items) = snapshot.items {
        TemporalField::record(&mut merged.items, at, items)?;
    }
    if let Some(collection) = snapshot.collection {
        TemporalField::record(&mut merged.collection, at, collection)?;
    }

    Ok(merged)
}

#[async_trait]
impl RemoteArchiveRepository for MemRemoteArchiveRepository<'_> {
    type Error = MemStorageError;

    #[tracing::instrument(
        name = "mem.archive.touch_account",
        skip_all,
        fields(remote.server = %account.server, remote.id = %account.id),
    )]
    async fn touch_account(
        &mut self,
        clock: &dyn Clock,
        account: RemoteAccount,
    ) -> Result<ArchivedRemoteAccount, Self::Error> {
        let key = (account.server, account.id.clone());

        if let Some(archived) = self.state.archive.get_mut(&key) {
            archived.username = account.username;
            return Ok(archived.clone());
        }

        let archived = ArchivedRemoteAccount {
            server: account.server,
            id: account.id,
            username: account.username,
            archived_at: clock.now(),
            profile: RemoteProfile::default(),
        };
        self.state.archive.insert(key, archived.clone());
        Ok(archived)
    }

    async fn lookup(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<Option<ArchivedRemoteAccount>, Self::Error> {
        Ok(self
            .state
            .archive
            .get(&(remote.server, remote.id.clone()))
            .cloned())
    }

    #[tracing::instrument(
        name = "mem.archive.record_profile",
        skip_all,
        fields(remote.server = %remote.server, remote.id = %remote.id),
    )]
    async fn record_profile(
        &mut self,
        remote: &RemoteAccountRef,
        snapshot: ProfileSnapshot,
    ) -> Result<ProfileMergeOutcome, Self::Error> {
        let key = (remote.server, remote.id.clone());
        let Some(archived) = self.state.archive.get_mut(&key) else {
            return Ok(ProfileMergeOutcome::UnknownAccount);
        };

        match merge_profile(&archived.profile, snapshot) {
            Ok(profile) => {
                archived.profile = profile;
                Ok(ProfileMergeOutcome::Merged(archived.clone()))
            }
            Err(stale) => Ok(ProfileMergeOutcome::Stale(stale)),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;
    use etwin_data_model::{MockClock, RemoteServer};

    use super::*;

    fn account(id: &str, username: &str) -> RemoteAccount {
        RemoteAccount {
            server: RemoteServer::DinoparcCom,
            id: id.parse().unwrap(),
            username: username.parse().unwrap(),
        }
    }

    fn snapshot(at: chrono::DateTime<chrono::Utc>, coins: u32) -> ProfileSnapshot {
        ProfileSnapshot {
            captured_at: at,
            coins: Some(coins),
            items: None,
            collection: None,
        }
    }

    #[tokio::test]
    async fn touch_account_is_idempotent_and_updates_username() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteArchiveRepository::new(&mut state);

        let t0 = clock.now();
        let first = repo.touch_account(&clock, account("1", "alice")).await.unwrap();
        assert_eq!(first.archived_at, t0);

        clock.advance(Duration::days(1));
        let second = repo
            .touch_account(&clock, account("1", "alice_renamed"))
            .await
            .unwrap();

        // The identity record is kept; only the username moved
        assert_eq!(second.archived_at, t0);
        assert_eq!(second.username.as_str(), "alice_renamed");
    }

    #[tokio::test]
    async fn profile_merge_follows_temporal_rules() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteArchiveRepository::new(&mut state);

        let account = account("1", "alice");
        let remote = account.account_ref();
        repo.touch_account(&clock, account).await.unwrap();

        let t1 = clock.now();
        clock.advance(Duration::hours(1));
        let t2 = clock.now();
        clock.advance(Duration::hours(1));
        let t3 = clock.now();

        repo.record_profile(&remote, snapshot(t1, 100)).await.unwrap();
        repo.record_profile(&remote, snapshot(t2, 100)).await.unwrap();

        let archived = repo.lookup(&remote).await.unwrap().unwrap();
        let coins = archived.profile.coins.unwrap();
        assert_eq!(coins.period.start, t1);
        assert_eq!(coins.retrieved.latest, t2);
        assert_eq!(coins.value, 100);

        repo.record_profile(&remote, snapshot(t3, 250)).await.unwrap();
        let archived = repo.lookup(&remote).await.unwrap().unwrap();
        let coins = archived.profile.coins.unwrap();
        assert_eq!(coins.period.start, t3);
        assert_eq!(coins.value, 250);
    }

    #[tokio::test]
    async fn stale_snapshot_is_rejected_without_partial_merge() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteArchiveRepository::new(&mut state);

        let account = account("1", "alice");
        let remote = account.account_ref();
        repo.touch_account(&clock, account).await.unwrap();

        let t0 = clock.now();
        clock.advance(Duration::hours(1));
        let t1 = clock.now();

        repo.record_profile(&remote, snapshot(t1, 100)).await.unwrap();

        // An observation older than the latest retrieval is a caller bug
        let outcome = repo
            .record_profile(
                &remote,
                ProfileSnapshot {
                    captured_at: t0,
                    coins: Some(50),
                    items: Some([("carrot".to_owned(), 3)].into()),
                    collection: None,
                },
            )
            .await
            .unwrap();
        assert_matches!(outcome, ProfileMergeOutcome::Stale(_));

        // Neither attribute was merged
        let archived = repo.lookup(&remote).await.unwrap().unwrap();
        assert_eq!(archived.profile.coins.unwrap().value, 100);
        assert!(archived.profile.items.is_none());
    }

    #[tokio::test]
    async fn unknown_account_is_reported() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteArchiveRepository::new(&mut state);

        let remote = RemoteAccountRef {
            server: RemoteServer::DinoparcCom,
            id: "404".parse().unwrap(),
        };
        let outcome = repo
            .record_profile(&remote, snapshot(clock.now(), 1))
            .await
            .unwrap();
        assert_eq!(outcome, ProfileMergeOutcome::UnknownAccount);
    }
}
