// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use std::collections::HashMap;
use std::sync::Arc;

use etwin_data_model::{
    ArchivedRemoteAccount, Clock, RemoteAccount, RemoteAccountRef, RemoteProvider, RemoteServer,
    RemoteSessionKey, StaleObservation, Ulid, User, VersionedLink, VersionedLinks,
};
use etwin_storage::{
    BoxRepository, RepositoryError,
    archive::ProfileMergeOutcome,
    link::TouchLinkOutcome,
};
use rand_core::RngCore;
use thiserror::Error;

use crate::client::{RemoteClient, RemoteClientError, RemoteCredentials};

/// A central user together with their link slots, as returned by the
/// register-or-login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAndLinks {
    pub user: User,
    pub links: VersionedLinks,
}

/// The error returned by the [`IdentityService`].
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The remote server rejected the login credentials.
    #[error("the remote server rejected the credentials")]
    InvalidCredentials,

    /// The remote account is actively linked to a different central user.
    #[error("the remote account is already linked to user {existing_user}")]
    Conflict {
        /// The user currently holding the remote account.
        existing_user: Ulid,
    },

    /// The central user does not exist.
    #[error("user not found")]
    UserNotFound,

    /// No remote client is registered for this provider family.
    #[error("no client registered for provider {0:?}")]
    UnknownProvider(RemoteProvider),

    /// The remote account was never archived; there is no profile to merge
    /// into.
    #[error("remote account was never archived")]
    UnknownRemoteAccount,

    /// A scraped snapshot arrived out of order.
    #[error(transparent)]
    StaleObservation(#[from] StaleObservation),

    /// The remote client failed for another reason; surfaced unchanged.
    #[error(transparent)]
    Remote(RemoteClientError),

    /// The storage backend failed; surfaced unchanged.
    #[error(transparent)]
    Internal(#[from] RepositoryError),
}

impl From<RemoteClientError> for IdentityError {
    fn from(err: RemoteClientError) -> Self {
        match err {
            RemoteClientError::InvalidCredentials => Self::InvalidCredentials,
            other => Self::Remote(other),
        }
    }
}

fn provider_prefix(provider: RemoteProvider) -> &'static str {
    match provider {
        RemoteProvider::Dinoparc => "dparc_",
        RemoteProvider::Hammerfest => "hf_",
        RemoteProvider::Twinoid => "tid_",
    }
}

/// The linked view of users: links remote accounts to central accounts and
/// exposes what is known about them.
///
/// This is the only component holding [`RemoteClient`]s; link and session
/// stores never call out to remote systems.
#[derive(Default)]
pub struct IdentityService {
    clients: HashMap<RemoteProvider, Arc<dyn RemoteClient>>,
}

impl IdentityService {
    /// Create a service with no registered remote clients.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the client for one provider family.
    #[must_use]
    pub fn with_client(mut self, provider: RemoteProvider, client: Arc<dyn RemoteClient>) -> Self {
        self.clients.insert(provider, client);
        self
    }

    fn client(&self, provider: RemoteProvider) -> Result<&dyn RemoteClient, IdentityError> {
        self.clients
            .get(&provider)
            .map(AsRef::as_ref)
            .ok_or(IdentityError::UnknownProvider(provider))
    }

    /// Pick a display name for a user created from a remote account.
    ///
    /// Prefers the remote username, then a provider-prefixed variant, then
    /// the provider-prefixed remote id, skipping names already in use.
    async fn derive_display_name(
        repo: &mut BoxRepository,
        account: &RemoteAccount,
    ) -> Result<String, RepositoryError> {
        let prefix = provider_prefix(account.server.provider());
        let candidates = [
            account.username.as_str().to_owned(),
            format!("{prefix}{}", account.username),
            format!("{prefix}{}", account.id),
        ];
        for candidate in candidates {
            if repo.user().find_by_display_name(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        // Remote ids are unique per server, so this only happens when the
        // same account is re-registered concurrently; the store-level commit
        // will fail that race anyway.
        Ok(format!("{prefix}{}", account.id))
    }

    /// The link slots of a user, one per remote server.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::UserNotFound`] for unknown users.
    pub async fn linked_accounts(
        &self,
        mut repo: BoxRepository,
        user_id: Ulid,
    ) -> Result<VersionedLinks, IdentityError> {
        repo.user()
            .lookup(user_id)
            .await?
            .ok_or(IdentityError::UserNotFound)?;
        Ok(repo.link().get_for_user(user_id).await?)
    }

    /// Link a remote account to an existing user, authenticating against
    /// the remote server first.
    ///
    /// Also archives the account identity and caches the created session.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`]; the store is left untouched on failure.
    #[tracing::instrument(
        skip_all,
        fields(%user_id, server = %credentials.server),
    )]
    pub async fn link_remote(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        actor: &User,
        user_id: Ulid,
        credentials: &RemoteCredentials,
    ) -> Result<VersionedLink, IdentityError> {
        let client = self.client(credentials.server.provider())?;
        let session = client.create_session(credentials).await?;
        let remote = session.account.account_ref();

        repo.user()
            .lookup(user_id)
            .await?
            .ok_or(IdentityError::UserNotFound)?;

        repo.remote_archive()
            .touch_account(clock, session.account.clone())
            .await?;
        repo.remote_session()
            .touch(clock, session.key, remote.clone())
            .await?;

        let slot = match repo.link().touch(clock, remote, user_id, actor.id).await? {
            TouchLinkOutcome::Linked(slot) => slot,
            TouchLinkOutcome::Conflict { existing_user } => {
                return Err(IdentityError::Conflict { existing_user });
            }
        };

        repo.save().await?;
        Ok(slot)
    }

    /// Unlink a remote account. Idempotent when already unlinked.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the store fails.
    #[tracing::instrument(
        skip_all,
        fields(remote.server = %remote.server, remote.id = %remote.id),
    )]
    pub async fn unlink_remote(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        actor: &User,
        remote: RemoteAccountRef,
    ) -> Result<VersionedLink, IdentityError> {
        let slot = repo.link().unlink(clock, remote, actor.id).await?;
        repo.save().await?;
        Ok(slot)
    }

    /// Log a user in through a remote account, creating the central account
    /// and the link on first sight.
    ///
    /// An existing active link wins: the remote account then identifies its
    /// linked user. Otherwise a fresh user is created, named after the
    /// remote account, and linked by themselves.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`]; the store is left untouched on failure.
    #[tracing::instrument(skip_all, fields(server = %credentials.server))]
    pub async fn register_or_login_with_remote(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        credentials: &RemoteCredentials,
    ) -> Result<UserAndLinks, IdentityError> {
        let client = self.client(credentials.server.provider())?;
        let session = client.create_session(credentials).await?;
        let remote = session.account.account_ref();

        let link = repo.link().get_by_remote(&remote).await?;
        let user = if let Some(current) = link.current {
            repo.user()
                .lookup(current.user)
                .await?
                .ok_or(IdentityError::UserNotFound)?
        } else {
            let display_name = Self::derive_display_name(&mut repo, &session.account).await?;
            let user = repo.user().add(rng, clock, display_name).await?;
            repo.remote_archive()
                .touch_account(clock, session.account.clone())
                .await?;
            match repo
                .link()
                .touch(clock, remote.clone(), user.id, user.id)
                .await?
            {
                TouchLinkOutcome::Linked(_) => {}
                TouchLinkOutcome::Conflict { existing_user } => {
                    return Err(IdentityError::Conflict { existing_user });
                }
            }
            tracing::info!(user.id = %user.id, "registered user from remote account");
            user
        };

        repo.remote_session()
            .touch(clock, session.key, remote)
            .await?;

        let links = repo.link().get_for_user(user.id).await?;
        repo.save().await?;

        Ok(UserAndLinks { user, links })
    }

    /// Check a cached remote session against the remote system itself.
    ///
    /// The session store only knows the last state we observed; the remote
    /// system may have invalidated the session out of band. A dead session
    /// is revoked from the store, a live one is refreshed.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the remote client or the store fails.
    #[tracing::instrument(skip_all, fields(%server))]
    pub async fn verify_session(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        server: RemoteServer,
        key: &RemoteSessionKey,
    ) -> Result<Option<RemoteAccount>, IdentityError> {
        let client = self.client(server.provider())?;
        match client.test_session(server, key).await? {
            Some(account) => {
                repo.remote_session()
                    .touch(clock, key.clone(), account.account_ref())
                    .await?;
                repo.save().await?;
                Ok(Some(account))
            }
            None => {
                repo.remote_session().revoke(server, key).await?;
                repo.save().await?;
                Ok(None)
            }
        }
    }

    /// Scrape the profile of a remote account and merge it into the
    /// archive.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::StaleObservation`] for out-of-order
    /// snapshots, surfacing scrape-ordering bugs instead of hiding them.
    #[tracing::instrument(
        skip_all,
        fields(remote.server = %remote.server, remote.id = %remote.id),
    )]
    pub async fn refresh_profile(
        &self,
        mut repo: BoxRepository,
        remote: &RemoteAccountRef,
    ) -> Result<ArchivedRemoteAccount, IdentityError> {
        let client = self.client(remote.server.provider())?;
        let snapshot = client.fetch_profile(remote).await?;

        let outcome = repo.remote_archive().record_profile(remote, snapshot).await?;
        match outcome {
            ProfileMergeOutcome::Merged(account) => {
                repo.save().await?;
                Ok(account)
            }
            ProfileMergeOutcome::Stale(stale) => Err(IdentityError::StaleObservation(stale)),
            ProfileMergeOutcome::UnknownAccount => Err(IdentityError::UnknownRemoteAccount),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::Duration;
    use etwin_data_model::{MockClock, ProfileSnapshot};
    use etwin_storage::RepositoryFactory;
    use etwin_storage_mem::MemRepositoryFactory;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    use super::*;
    use crate::client::RemoteSessionInfo;

    /// A scripted remote system: fixed accounts, live sessions, queued
    /// profile snapshots.
    #[derive(Default)]
    struct FakeRemote {
        /// `(server, username, password)` to account id
        accounts: HashMap<(RemoteServer, String, String), String>,
        sessions: Mutex<HashMap<(RemoteServer, RemoteSessionKey), RemoteAccount>>,
        snapshots: Mutex<Vec<ProfileSnapshot>>,
    }

    impl FakeRemote {
        fn with_account(
            mut self,
            server: RemoteServer,
            username: &str,
            password: &str,
            id: &str,
        ) -> Self {
            self.accounts
                .insert((server, username.to_owned(), password.to_owned()), id.to_owned());
            self
        }

        fn queue_snapshot(&self, snapshot: ProfileSnapshot) {
            self.snapshots.lock().unwrap().push(snapshot);
        }

        fn kill_session(&self, server: RemoteServer, key: &RemoteSessionKey) {
            self.sessions.lock().unwrap().remove(&(server, key.clone()));
        }
    }

    #[async_trait]
    impl RemoteClient for FakeRemote {
        async fn create_session(
            &self,
            credentials: &RemoteCredentials,
        ) -> Result<RemoteSessionInfo, RemoteClientError> {
            let lookup = (
                credentials.server,
                credentials.username.clone(),
                credentials.password.clone(),
            );
            let id = self
                .accounts
                .get(&lookup)
                .ok_or(RemoteClientError::InvalidCredentials)?;
            let key = RemoteSessionKey(format!("session-{id}"));
            let account = RemoteAccount {
                server: credentials.server,
                id: id.parse().unwrap(),
                username: credentials.username.parse().unwrap(),
            };
            self.sessions
                .lock()
                .unwrap()
                .insert((credentials.server, key.clone()), account.clone());
            Ok(RemoteSessionInfo { key, account })
        }

        async fn test_session(
            &self,
            server: RemoteServer,
            key: &RemoteSessionKey,
        ) -> Result<Option<RemoteAccount>, RemoteClientError> {
            Ok(self.sessions.lock().unwrap().get(&(server, key.clone())).cloned())
        }

        async fn fetch_profile(
            &self,
            _remote: &RemoteAccountRef,
        ) -> Result<ProfileSnapshot, RemoteClientError> {
            self.snapshots
                .lock()
                .unwrap()
                .pop()
                .ok_or(RemoteClientError::AccountNotFound)
        }
    }

    fn credentials(username: &str, password: &str) -> RemoteCredentials {
        RemoteCredentials {
            server: RemoteServer::HammerfestFr,
            username: username.to_owned(),
            password: password.to_owned(),
        }
    }

    fn service(remote: Arc<FakeRemote>) -> IdentityService {
        IdentityService::new().with_client(RemoteProvider::Hammerfest, remote)
    }

    #[tokio::test]
    async fn register_then_login_reuses_the_same_user() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = ChaChaRng::seed_from_u64(42);
        let remote = Arc::new(
            FakeRemote::default().with_account(RemoteServer::HammerfestFr, "alice", "pw", "123"),
        );
        let service = service(remote);

        let first = service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "pw"),
            )
            .await
            .unwrap();
        assert_eq!(first.user.display_name, "alice");
        assert!(
            first
                .links
                .get(RemoteServer::HammerfestFr)
                .is_linked_to(first.user.id)
        );

        let second = service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "pw"),
            )
            .await
            .unwrap();
        assert_eq!(second.user.id, first.user.id);

        // Bad credentials never reach the stores
        let err = service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "wrong"),
            )
            .await;
        assert_matches!(err, Err(IdentityError::InvalidCredentials));
    }

    #[tokio::test]
    async fn linking_a_claimed_account_conflicts() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = ChaChaRng::seed_from_u64(42);
        let remote = Arc::new(
            FakeRemote::default().with_account(RemoteServer::HammerfestFr, "alice", "pw", "123"),
        );
        let service = service(remote);

        // Alice registers through her hammerfest account
        let alice = service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "pw"),
            )
            .await
            .unwrap()
            .user;

        // Bob, a separate central user, tries to link the same account
        let mut repo = factory.create().await.unwrap();
        let bob = repo
            .user()
            .add(&mut rng, &clock, "bob".to_owned())
            .await
            .unwrap();
        repo.save().await.unwrap();

        let err = service
            .link_remote(
                factory.create().await.unwrap(),
                &clock,
                &bob,
                bob.id,
                &credentials("alice", "pw"),
            )
            .await;
        assert_matches!(
            err,
            Err(IdentityError::Conflict { existing_user }) if existing_user == alice.id
        );

        // Alice unlinks; the account is free again and keeps its history
        let slot = service
            .unlink_remote(
                factory.create().await.unwrap(),
                &clock,
                &alice,
                RemoteAccountRef {
                    server: RemoteServer::HammerfestFr,
                    id: "123".parse().unwrap(),
                },
            )
            .await
            .unwrap();
        assert!(slot.current.is_none());
        assert_eq!(slot.old.len(), 1);

        service
            .link_remote(
                factory.create().await.unwrap(),
                &clock,
                &bob,
                bob.id,
                &credentials("alice", "pw"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn display_name_collisions_fall_back_to_prefixed_names() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = ChaChaRng::seed_from_u64(42);
        let remote = Arc::new(
            FakeRemote::default().with_account(RemoteServer::HammerfestFr, "alice", "pw", "123"),
        );
        let service = service(remote);

        // A central user already holds the name
        let mut repo = factory.create().await.unwrap();
        repo.user()
            .add(&mut rng, &clock, "alice".to_owned())
            .await
            .unwrap();
        repo.save().await.unwrap();

        let registered = service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "pw"),
            )
            .await
            .unwrap();
        assert_eq!(registered.user.display_name, "hf_alice");
    }

    #[tokio::test]
    async fn refresh_profile_merges_and_surfaces_stale_scrapes() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = ChaChaRng::seed_from_u64(42);
        let remote = Arc::new(
            FakeRemote::default().with_account(RemoteServer::HammerfestFr, "alice", "pw", "123"),
        );
        let service = service(Arc::clone(&remote));

        service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "pw"),
            )
            .await
            .unwrap();

        let account_ref = RemoteAccountRef {
            server: RemoteServer::HammerfestFr,
            id: "123".parse().unwrap(),
        };

        let t0 = clock.now();
        clock.advance(Duration::hours(1));
        let t1 = clock.now();

        remote.queue_snapshot(ProfileSnapshot {
            captured_at: t1,
            coins: Some(500),
            items: None,
            collection: None,
        });
        let archived = service
            .refresh_profile(factory.create().await.unwrap(), &account_ref)
            .await
            .unwrap();
        assert_eq!(archived.profile.coins.as_ref().unwrap().value, 500);

        // A snapshot captured before the previous one is a scrape-ordering
        // bug and is surfaced, not swallowed
        remote.queue_snapshot(ProfileSnapshot {
            captured_at: t0,
            coins: Some(400),
            items: None,
            collection: None,
        });
        let err = service
            .refresh_profile(factory.create().await.unwrap(), &account_ref)
            .await;
        assert_matches!(err, Err(IdentityError::StaleObservation(_)));
    }

    #[tokio::test]
    async fn dead_remote_sessions_are_revoked_from_the_store() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = ChaChaRng::seed_from_u64(42);
        let remote = Arc::new(
            FakeRemote::default().with_account(RemoteServer::HammerfestFr, "alice", "pw", "123"),
        );
        let service = service(Arc::clone(&remote));

        service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "pw"),
            )
            .await
            .unwrap();

        let key = RemoteSessionKey("session-123".to_owned());
        let account_ref = RemoteAccountRef {
            server: RemoteServer::HammerfestFr,
            id: "123".parse().unwrap(),
        };

        // The session is live: it is confirmed and refreshed
        let account = service
            .verify_session(
                factory.create().await.unwrap(),
                &clock,
                RemoteServer::HammerfestFr,
                &key,
            )
            .await
            .unwrap();
        assert!(account.is_some());

        // The remote system invalidates the session out of band; the cached
        // record is only advisory and gets revoked on the next check
        remote.kill_session(RemoteServer::HammerfestFr, &key);
        let account = service
            .verify_session(
                factory.create().await.unwrap(),
                &clock,
                RemoteServer::HammerfestFr,
                &key,
            )
            .await
            .unwrap();
        assert!(account.is_none());

        let mut repo = factory.create().await.unwrap();
        assert!(
            repo.remote_session()
                .find_by_user(&account_ref)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unknown_provider_is_reported() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = ChaChaRng::seed_from_u64(42);
        let service = IdentityService::new();

        let err = service
            .register_or_login_with_remote(
                factory.create().await.unwrap(),
                &mut rng,
                &clock,
                &credentials("alice", "pw"),
            )
            .await;
        assert_matches!(
            err,
            Err(IdentityError::UnknownProvider(RemoteProvider::Hammerfest))
        );
    }
}
