// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use etwin_data_model::{
    Clock, RemoteAccessToken, RemoteAccountRef, RemoteOAuthTokens, RemoteRefreshToken,
    RemoteServer, RemoteSession, RemoteSessionKey, RemoteTokenKey,
};
use etwin_storage::remote_session::{RemoteSessionRepository, RemoteTokenRepository};

use crate::{MemStorageError, State};

/// An implementation of [`RemoteSessionRepository`] working on an in-memory
/// state snapshot
pub(crate) struct MemRemoteSessionRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemRemoteSessionRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl RemoteSessionRepository for MemRemoteSessionRepository<'_> {
    type Error = MemStorageError;

    #[tracing::instrument(
        name = "mem.remote_session.touch",
        skip_all,
        fields(remote.server = %remote.server, remote.id = %remote.id),
    )]
    async fn touch(
        &mut self,
        clock: &dyn Clock,
        key: RemoteSessionKey,
        remote: RemoteAccountRef,
    ) -> Result<RemoteSession, Self::Error> {
        let now = clock.now();
        let server = remote.server;
        let map_key = (server, key.clone());

        if let Some(session) = self.state.remote_sessions.get_mut(&map_key) {
            if session.remote == remote {
                // Same user: only refresh the access time
                session.last_used_at = now;
                return Ok(session.clone());
            }
            // The key now authenticates a different user: rotate the record
            let old_remote = session.remote.clone();
            self.state
                .remote_session_by_user
                .remove(&(server, old_remote.id));
        }

        let session = RemoteSession {
            key: key.clone(),
            remote: remote.clone(),
            created_at: now,
            last_used_at: now,
        };
        // A user logging in again gets a fresh key; the superseded session
        // record is dropped so the by-user index never goes stale
        if let Some(old_key) = self
            .state
            .remote_session_by_user
            .insert((server, remote.id), key.clone())
        {
            self.state.remote_sessions.remove(&(server, old_key));
        }
        self.state.remote_sessions.insert(map_key, session.clone());
        Ok(session)
    }

    #[tracing::instrument(name = "mem.remote_session.revoke", skip_all, fields(%server))]
    async fn revoke(
        &mut self,
        server: RemoteServer,
        key: &RemoteSessionKey,
    ) -> Result<(), Self::Error> {
        if let Some(session) = self.state.remote_sessions.remove(&(server, key.clone())) {
            let user_key = (server, session.remote.id);
            if self.state.remote_session_by_user.get(&user_key) == Some(key) {
                self.state.remote_session_by_user.remove(&user_key);
            }
        }
        Ok(())
    }

    async fn find_by_user(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<Option<RemoteSession>, Self::Error> {
        let Some(key) = self
            .state
            .remote_session_by_user
            .get(&(remote.server, remote.id.clone()))
        else {
            return Ok(None);
        };
        Ok(self
            .state
            .remote_sessions
            .get(&(remote.server, key.clone()))
            .cloned())
    }
}

/// An implementation of [`RemoteTokenRepository`] working on an in-memory
/// state snapshot
pub(crate) struct MemRemoteTokenRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemRemoteTokenRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }

    fn remove_access_token_for_user(&mut self, remote: &RemoteAccountRef) {
        if let Some(old) = self
            .state
            .remote_access_token_by_user
            .remove(&(remote.server, remote.id.clone()))
        {
            self.state.remote_access_tokens.remove(&old);
        }
    }

    fn remove_refresh_token_for_user(&mut self, remote: &RemoteAccountRef) {
        if let Some(old) = self
            .state
            .remote_refresh_token_by_user
            .remove(&(remote.server, remote.id.clone()))
        {
            self.state.remote_refresh_tokens.remove(&old);
        }
    }
}

#[async_trait]
impl RemoteTokenRepository for MemRemoteTokenRepository<'_> {
    type Error = MemStorageError;

    #[tracing::instrument(
        name = "mem.remote_token.touch_oauth",
        skip_all,
        fields(remote.server = %remote.server, remote.id = %remote.id),
    )]
    async fn touch_oauth(
        &mut self,
        clock: &dyn Clock,
        access_token: RemoteTokenKey,
        refresh_token: RemoteTokenKey,
        expires_at: DateTime<Utc>,
        remote: RemoteAccountRef,
    ) -> Result<RemoteOAuthTokens, Self::Error> {
        let now = clock.now();

        // Re-touching rotates out any prior association for this user
        self.remove_access_token_for_user(&remote);
        self.remove_refresh_token_for_user(&remote);

        let access = RemoteAccessToken {
            key: access_token.clone(),
            remote: remote.clone(),
            created_at: now,
            last_used_at: now,
            expires_at,
        };
        let refresh = RemoteRefreshToken {
            key: refresh_token.clone(),
            remote: remote.clone(),
            created_at: now,
            last_used_at: now,
        };

        self.state
            .remote_access_tokens
            .insert(access_token.clone(), access.clone());
        self.state
            .remote_refresh_tokens
            .insert(refresh_token.clone(), refresh.clone());
        self.state
            .remote_access_token_by_user
            .insert((remote.server, remote.id.clone()), access_token);
        self.state
            .remote_refresh_token_by_user
            .insert((remote.server, remote.id), refresh_token);

        Ok(RemoteOAuthTokens {
            access_token: Some(access),
            refresh_token: refresh,
        })
    }

    #[tracing::instrument(name = "mem.remote_token.revoke_access", skip_all)]
    async fn revoke_access_token(
        &mut self,
        access_token: &RemoteTokenKey,
    ) -> Result<(), Self::Error> {
        if let Some(token) = self.state.remote_access_tokens.remove(access_token) {
            self.state
                .remote_access_token_by_user
                .remove(&(token.remote.server, token.remote.id));
        }
        Ok(())
    }

    #[tracing::instrument(name = "mem.remote_token.revoke_refresh", skip_all)]
    async fn revoke_refresh_token(
        &mut self,
        refresh_token: &RemoteTokenKey,
    ) -> Result<(), Self::Error> {
        if let Some(token) = self.state.remote_refresh_tokens.remove(refresh_token) {
            self.state
                .remote_refresh_token_by_user
                .remove(&(token.remote.server, token.remote.id));
        }
        Ok(())
    }

    async fn find_by_user(
        &mut self,
        clock: &dyn Clock,
        remote: &RemoteAccountRef,
    ) -> Result<Option<RemoteOAuthTokens>, Self::Error> {
        let now = clock.now();
        let user_key = (remote.server, remote.id.clone());

        let Some(refresh_key) = self.state.remote_refresh_token_by_user.get(&user_key) else {
            return Ok(None);
        };
        let Some(refresh) = self.state.remote_refresh_tokens.get(refresh_key).cloned() else {
            return Ok(None);
        };

        let access = self
            .state
            .remote_access_token_by_user
            .get(&user_key)
            .and_then(|key| self.state.remote_access_tokens.get(key))
            .filter(|token| !token.is_expired(now))
            .cloned();

        Ok(Some(RemoteOAuthTokens {
            access_token: access,
            refresh_token: refresh,
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use etwin_data_model::{MockClock, RemoteAccountId};

    use super::*;

    fn remote(id: &str) -> RemoteAccountRef {
        RemoteAccountRef {
            server: RemoteServer::HammerfestFr,
            id: id.parse::<RemoteAccountId>().unwrap(),
        }
    }

    #[tokio::test]
    async fn touch_refreshes_same_user_and_rotates_other_user() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteSessionRepository::new(&mut state);

        let key = RemoteSessionKey("cookie-1".to_owned());
        let t0 = clock.now();
        let session = repo.touch(&clock, key.clone(), remote("123")).await.unwrap();
        assert_eq!(session.created_at, t0);

        // Same user again: the creation time is preserved
        clock.advance(Duration::minutes(5));
        let t1 = clock.now();
        let session = repo.touch(&clock, key.clone(), remote("123")).await.unwrap();
        assert_eq!(session.created_at, t0);
        assert_eq!(session.last_used_at, t1);

        // The key now authenticates someone else: fresh record, and the old
        // user no longer resolves to this session
        clock.advance(Duration::minutes(5));
        let t2 = clock.now();
        let session = repo.touch(&clock, key.clone(), remote("456")).await.unwrap();
        assert_eq!(session.created_at, t2);
        assert!(repo.find_by_user(&remote("123")).await.unwrap().is_none());
        assert!(repo.find_by_user(&remote("456")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn user_relogin_rotates_the_stored_session() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteSessionRepository::new(&mut state);

        let first_key = RemoteSessionKey("cookie-1".to_owned());
        let second_key = RemoteSessionKey("cookie-2".to_owned());

        repo.touch(&clock, first_key.clone(), remote("123")).await.unwrap();
        repo.touch(&clock, second_key.clone(), remote("123")).await.unwrap();

        let session = repo.find_by_user(&remote("123")).await.unwrap().unwrap();
        assert_eq!(session.key, second_key);

        // Revoking the superseded key must not clobber the current session
        repo.revoke(RemoteServer::HammerfestFr, &first_key)
            .await
            .unwrap();
        assert!(repo.find_by_user(&remote("123")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteSessionRepository::new(&mut state);

        let key = RemoteSessionKey("cookie-1".to_owned());
        repo.touch(&clock, key.clone(), remote("123")).await.unwrap();

        repo.revoke(RemoteServer::HammerfestFr, &key).await.unwrap();
        repo.revoke(RemoteServer::HammerfestFr, &key).await.unwrap();

        assert!(repo.find_by_user(&remote("123")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oauth_touch_rotates_prior_tokens() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteTokenRepository::new(&mut state);

        let expires = clock.now() + Duration::hours(1);
        repo.touch_oauth(
            &clock,
            RemoteTokenKey("at-1".to_owned()),
            RemoteTokenKey("rt-1".to_owned()),
            expires,
            remote("123"),
        )
        .await
        .unwrap();

        repo.touch_oauth(
            &clock,
            RemoteTokenKey("at-2".to_owned()),
            RemoteTokenKey("rt-2".to_owned()),
            expires,
            remote("123"),
        )
        .await
        .unwrap();

        let tokens = repo
            .find_by_user(&clock, &remote("123"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tokens.refresh_token.key.as_str(), "rt-2");
        assert_eq!(tokens.access_token.unwrap().key.as_str(), "at-2");

        // The rotated-out tokens are gone
        assert!(
            !state
                .remote_access_tokens
                .contains_key(&RemoteTokenKey("at-1".to_owned()))
        );
    }

    #[tokio::test]
    async fn expired_access_token_is_filtered_and_revocations_are_independent() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemRemoteTokenRepository::new(&mut state);

        let expires = clock.now() + Duration::hours(1);
        repo.touch_oauth(
            &clock,
            RemoteTokenKey("at-1".to_owned()),
            RemoteTokenKey("rt-1".to_owned()),
            expires,
            remote("123"),
        )
        .await
        .unwrap();

        clock.advance(Duration::hours(2));
        let tokens = repo
            .find_by_user(&clock, &remote("123"))
            .await
            .unwrap()
            .unwrap();
        assert!(tokens.access_token.is_none());
        assert_eq!(tokens.refresh_token.key.as_str(), "rt-1");

        // Revoking the refresh token leaves nothing behind
        repo.revoke_refresh_token(&RemoteTokenKey("rt-1".to_owned()))
            .await
            .unwrap();
        assert!(repo.find_by_user(&clock, &remote("123")).await.unwrap().is_none());
    }
}
