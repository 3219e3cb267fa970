// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! The [`Repository`] abstraction: a transaction-scoped bundle of
//! repositories

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::{
    MapErr,
    archive::RemoteArchiveRepository,
    link::LinkRepository,
    oauth2::{
        OAuth2AccessTokenRepository, OAuth2AuthorizationCodeRepository, OAuth2ClientRepository,
        OAuth2RefreshTokenRepository,
    },
    remote_session::{RemoteSessionRepository, RemoteTokenRepository},
    user::UserRepository,
};

/// The error type returned by a [`BoxRepository`], erasing the
/// backend-specific error type
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RepositoryError {
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl RepositoryError {
    /// Construct a [`RepositoryError`] out of any error
    pub fn from_error<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
        }
    }
}

/// A [`Repository`] is a [`RepositoryAccess`] with a transaction contract:
/// mutations become visible on [`save`][`RepositoryTransaction::save`] and
/// are discarded on [`cancel`][`RepositoryTransaction::cancel`]
pub trait Repository<E>:
    RepositoryAccess<Error = E> + RepositoryTransaction<Error = E> + Send
{
}

impl<T, E> Repository<E> for T where
    T: RepositoryAccess<Error = E> + RepositoryTransaction<Error = E> + Send
{
}

/// A type-erased [`Repository`]
pub type BoxRepository = Box<dyn Repository<RepositoryError>>;

/// A factory which hands out fresh [`BoxRepository`] instances, each backed
/// by its own transaction
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Start a new transaction and return a repository backed by it
    ///
    /// # Errors
    ///
    /// Returns a [`RepositoryError`] if the transaction could not be started
    async fn create(&self) -> Result<BoxRepository, RepositoryError>;
}

/// A type-erased [`RepositoryFactory`]
pub type BoxRepositoryFactory = Box<dyn RepositoryFactory + 'static>;

/// The transaction contract of a [`Repository`]
pub trait RepositoryTransaction {
    /// The backend-specific error type
    type Error;

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the commit failed, e.g. because a
    /// concurrent transaction touched the same data
    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;

    /// Abort the transaction, discarding every mutation made through it
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the rollback failed
    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;
}

/// Access the various repositories the backend implements.
pub trait RepositoryAccess: Send {
    /// The backend-specific error type used by each repository.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get a [`UserRepository`]
    fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c>;

    /// Get a [`LinkRepository`]
    fn link<'c>(&'c mut self) -> Box<dyn LinkRepository<Error = Self::Error> + 'c>;

    /// Get a [`RemoteSessionRepository`]
    fn remote_session<'c>(
        &'c mut self,
    ) -> Box<dyn RemoteSessionRepository<Error = Self::Error> + 'c>;

    /// Get a [`RemoteTokenRepository`]
    fn remote_token<'c>(&'c mut self) -> Box<dyn RemoteTokenRepository<Error = Self::Error> + 'c>;

    /// Get a [`RemoteArchiveRepository`]
    fn remote_archive<'c>(
        &'c mut self,
    ) -> Box<dyn RemoteArchiveRepository<Error = Self::Error> + 'c>;

    /// Get an [`OAuth2ClientRepository`]
    fn oauth2_client<'c>(&'c mut self) -> Box<dyn OAuth2ClientRepository<Error = Self::Error> + 'c>;

    /// Get an [`OAuth2AccessTokenRepository`]
    fn oauth2_access_token<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2AccessTokenRepository<Error = Self::Error> + 'c>;

    /// Get an [`OAuth2RefreshTokenRepository`]
    fn oauth2_refresh_token<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2RefreshTokenRepository<Error = Self::Error> + 'c>;

    /// Get an [`OAuth2AuthorizationCodeRepository`]
    fn oauth2_authorization_code<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2AuthorizationCodeRepository<Error = Self::Error> + 'c>;
}

// Implementations of the two repository halves for the `MapErr` wrapper,
// so that a whole repository can be type-erased into a `BoxRepository`.

impl<R, F, E> RepositoryAccess for MapErr<R, F>
where
    R: RepositoryAccess,
    F: FnMut(R::Error) -> E + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(self.inner.user(), &mut self.mapper))
    }

    fn link<'c>(&'c mut self) -> Box<dyn LinkRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(self.inner.link(), &mut self.mapper))
    }

    fn remote_session<'c>(
        &'c mut self,
    ) -> Box<dyn RemoteSessionRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(self.inner.remote_session(), &mut self.mapper))
    }

    fn remote_token<'c>(&'c mut self) -> Box<dyn RemoteTokenRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(self.inner.remote_token(), &mut self.mapper))
    }

    fn remote_archive<'c>(
        &'c mut self,
    ) -> Box<dyn RemoteArchiveRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(self.inner.remote_archive(), &mut self.mapper))
    }

    fn oauth2_client<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2ClientRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(self.inner.oauth2_client(), &mut self.mapper))
    }

    fn oauth2_access_token<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2AccessTokenRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(
            self.inner.oauth2_access_token(),
            &mut self.mapper,
        ))
    }

    fn oauth2_refresh_token<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2RefreshTokenRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(
            self.inner.oauth2_refresh_token(),
            &mut self.mapper,
        ))
    }

    fn oauth2_authorization_code<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2AuthorizationCodeRepository<Error = Self::Error> + 'c> {
        Box::new(MapErr::new(
            self.inner.oauth2_authorization_code(),
            &mut self.mapper,
        ))
    }
}

impl<R, F, E> RepositoryTransaction for MapErr<R, F>
where
    R: RepositoryTransaction + Send + 'static,
    F: FnMut(R::Error) -> E + Send + 'static,
{
    type Error = E;

    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        let this = *self;
        let inner = this.inner;
        let mut mapper = this.mapper;
        Box::pin(async move { Box::new(inner).save().await.map_err(&mut mapper) })
    }

    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        let this = *self;
        let inner = this.inner;
        let mut mapper = this.mapper;
        Box::pin(async move { Box::new(inner).cancel().await.map_err(&mut mapper) })
    }
}
