// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use etwin_storage::{
    BoxRepository, BoxRepositoryFactory, MapErr, RepositoryAccess, RepositoryError,
    RepositoryFactory, RepositoryTransaction,
    archive::RemoteArchiveRepository,
    link::LinkRepository,
    oauth2::{
        OAuth2AccessTokenRepository, OAuth2AuthorizationCodeRepository, OAuth2ClientRepository,
        OAuth2RefreshTokenRepository,
    },
    remote_session::{RemoteSessionRepository, RemoteTokenRepository},
    user::UserRepository,
};
use futures_util::future::BoxFuture;

use crate::{
    MemStorageError, State, archive::MemRemoteArchiveRepository, link::MemLinkRepository,
    oauth2::{
        MemOAuth2AccessTokenRepository, MemOAuth2AuthorizationCodeRepository,
        MemOAuth2ClientRepository, MemOAuth2RefreshTokenRepository,
    },
    remote_session::{MemRemoteSessionRepository, MemRemoteTokenRepository},
    user::MemUserRepository,
};

#[derive(Debug, Default)]
struct Shared {
    /// Bumped on every commit; a transaction only commits on the version it
    /// started from.
    version: u64,
    state: State,
}

/// An implementation of the [`RepositoryFactory`] trait backed by shared
/// in-memory state.
#[derive(Clone, Default)]
pub struct MemRepositoryFactory {
    shared: Arc<RwLock<Shared>>,
}

impl MemRepositoryFactory {
    /// Create a new, empty [`MemRepositoryFactory`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Box the factory
    #[must_use]
    pub fn boxed(self) -> BoxRepositoryFactory {
        Box::new(self)
    }

    fn begin(&self) -> Result<MemRepository, MemStorageError> {
        let guard = self.shared.read().map_err(|_| MemStorageError::Poisoned)?;
        Ok(MemRepository {
            shared: Arc::clone(&self.shared),
            version: guard.version,
            state: guard.state.clone(),
        })
    }
}

#[async_trait]
impl RepositoryFactory for MemRepositoryFactory {
    async fn create(&self) -> Result<BoxRepository, RepositoryError> {
        let repo = self.begin().map_err(RepositoryError::from_error)?;
        Ok(repo.boxed())
    }
}

/// An implementation of the [`Repository`][`etwin_storage::Repository`]
/// trait working on a snapshot of the shared in-memory state.
pub struct MemRepository {
    shared: Arc<RwLock<Shared>>,
    version: u64,
    state: State,
}

impl MemRepository {
    /// Transform the repository into a type-erased [`BoxRepository`]
    #[must_use]
    pub fn boxed(self) -> BoxRepository {
        Box::new(MapErr::new(self, RepositoryError::from_error))
    }
}

impl RepositoryTransaction for MemRepository {
    type Error = MemStorageError;

    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        Box::pin(async move {
            let mut guard = self.shared.write().map_err(|_| MemStorageError::Poisoned)?;
            if guard.version != self.version {
                return Err(MemStorageError::WriteConflict);
            }
            guard.version += 1;
            guard.state = self.state;
            Ok(())
        })
    }

    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        // The snapshot is simply dropped.
        Box::pin(async move { Ok(()) })
    }
}

impl RepositoryAccess for MemRepository {
    type Error = MemStorageError;

    fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
        Box::new(MemUserRepository::new(&mut self.state))
    }

    fn link<'c>(&'c mut self) -> Box<dyn LinkRepository<Error = Self::Error> + 'c> {
        Box::new(MemLinkRepository::new(&mut self.state))
    }

    fn remote_session<'c>(
        &'c mut self,
    ) -> Box<dyn RemoteSessionRepository<Error = Self::Error> + 'c> {
        Box::new(MemRemoteSessionRepository::new(&mut self.state))
    }

    fn remote_token<'c>(&'c mut self) -> Box<dyn RemoteTokenRepository<Error = Self::Error> + 'c> {
        Box::new(MemRemoteTokenRepository::new(&mut self.state))
    }

    fn remote_archive<'c>(
        &'c mut self,
    ) -> Box<dyn RemoteArchiveRepository<Error = Self::Error> + 'c> {
        Box::new(MemRemoteArchiveRepository::new(&mut self.state))
    }

    fn oauth2_client<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2ClientRepository<Error = Self::Error> + 'c> {
        Box::new(MemOAuth2ClientRepository::new(&mut self.state))
    }

    fn oauth2_access_token<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2AccessTokenRepository<Error = Self::Error> + 'c> {
        Box::new(MemOAuth2AccessTokenRepository::new(&mut self.state))
    }

    fn oauth2_refresh_token<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2RefreshTokenRepository<Error = Self::Error> + 'c> {
        Box::new(MemOAuth2RefreshTokenRepository::new(&mut self.state))
    }

    fn oauth2_authorization_code<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2AuthorizationCodeRepository<Error = Self::Error> + 'c> {
        Box::new(MemOAuth2AuthorizationCodeRepository::new(&mut self.state))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use etwin_data_model::MockClock;
    use rand::SeedableRng;

    use super::*;

    #[tokio::test]
    async fn concurrent_commits_conflict_instead_of_losing_updates() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(42);

        let mut first = factory.begin().unwrap();
        let mut second = factory.begin().unwrap();

        first
            .user()
            .add(&mut rng, &clock, "alice".to_owned())
            .await
            .unwrap();
        second
            .user()
            .add(&mut rng, &clock, "bob".to_owned())
            .await
            .unwrap();

        Box::new(first).save().await.unwrap();
        assert_matches!(
            Box::new(second).save().await,
            Err(MemStorageError::WriteConflict)
        );

        // Only the first transaction is visible
        let mut check = factory.begin().unwrap();
        assert!(
            check
                .user()
                .find_by_display_name("alice")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            check
                .user()
                .find_by_display_name("bob")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn cancel_discards_mutations() {
        let factory = MemRepositoryFactory::new();
        let clock = MockClock::default();
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(42);

        let mut repo = factory.begin().unwrap();
        repo.user()
            .add(&mut rng, &clock, "alice".to_owned())
            .await
            .unwrap();
        Box::new(repo).cancel().await.unwrap();

        let mut check = factory.begin().unwrap();
        assert!(
            check
                .user()
                .find_by_display_name("alice")
                .await
                .unwrap()
                .is_none()
        );
    }
}
