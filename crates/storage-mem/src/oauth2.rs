// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use etwin_data_model::{
    AccessToken, AccessTokenState, Clock, OAuthClient, OAuthClientKey, RefreshToken,
    RefreshTokenState, User,
};
use etwin_oauth2_types::scope::Scope;
use etwin_storage::oauth2::{
    CodeUse, OAuth2AccessTokenRepository, OAuth2AuthorizationCodeRepository,
    OAuth2ClientRepository, OAuth2RefreshTokenRepository,
};
use rand_core::RngCore;
use ulid::Ulid;
use url::Url;

use crate::{MemStorageError, State};

/// An implementation of [`OAuth2ClientRepository`] working on an in-memory
/// state snapshot
pub(crate) struct MemOAuth2ClientRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemOAuth2ClientRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl OAuth2ClientRepository for MemOAuth2ClientRepository<'_> {
    type Error = MemStorageError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<OAuthClient>, Self::Error> {
        Ok(self.state.oauth2_clients.get(&id).cloned())
    }

    async fn find_by_key(
        &mut self,
        key: &OAuthClientKey,
    ) -> Result<Option<OAuthClient>, Self::Error> {
        let Some(id) = self.state.oauth2_client_by_key.get(key) else {
            return Ok(None);
        };
        Ok(self.state.oauth2_clients.get(id).cloned())
    }

    #[tracing::instrument(name = "mem.oauth2_client.upsert_system", skip_all, fields(%key))]
    async fn upsert_system(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        key: OAuthClientKey,
        display_name: String,
        app_uri: Url,
        callback_uri: Url,
        secret_hash: String,
    ) -> Result<OAuthClient, Self::Error> {
        let existing_id = self.state.oauth2_client_by_key.get(&key).copied();
        if let Some(client) = existing_id.and_then(|id| self.state.oauth2_clients.get_mut(&id)) {
            // Existing system client: replace everything but id and ctime
            client.display_name = display_name;
            client.app_uri = app_uri;
            client.callback_uri = callback_uri;
            let client = client.clone();
            self.state.oauth2_client_secrets.insert(client.id, secret_hash);
            return Ok(client);
        }

        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        let client = OAuthClient {
            id,
            key: Some(key.clone()),
            display_name,
            app_uri,
            callback_uri,
            owner: None,
            created_at,
        };
        self.state.oauth2_clients.insert(id, client.clone());
        self.state.oauth2_client_by_key.insert(key, id);
        self.state.oauth2_client_secrets.insert(id, secret_hash);
        Ok(client)
    }

    #[tracing::instrument(name = "mem.oauth2_client.add", skip_all, fields(client.id))]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        display_name: String,
        app_uri: Url,
        callback_uri: Url,
        owner_id: Ulid,
        secret_hash: Option<String>,
    ) -> Result<OAuthClient, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("client.id", tracing::field::display(id));

        let client = OAuthClient {
            id,
            key: None,
            display_name,
            app_uri,
            callback_uri,
            owner: Some(owner_id),
            created_at,
        };
        self.state.oauth2_clients.insert(id, client.clone());
        if let Some(secret_hash) = secret_hash {
            self.state.oauth2_client_secrets.insert(id, secret_hash);
        }
        Ok(client)
    }

    async fn secret_hash(
        &mut self,
        client: &OAuthClient,
    ) -> Result<Option<String>, Self::Error> {
        Ok(self.state.oauth2_client_secrets.get(&client.id).cloned())
    }
}

/// An implementation of [`OAuth2AccessTokenRepository`] working on an
/// in-memory state snapshot
pub(crate) struct MemOAuth2AccessTokenRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemOAuth2AccessTokenRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl OAuth2AccessTokenRepository for MemOAuth2AccessTokenRepository<'_> {
    type Error = MemStorageError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<AccessToken>, Self::Error> {
        Ok(self.state.oauth2_access_tokens.get(&id).cloned())
    }

    async fn find_by_token(
        &mut self,
        access_token: &str,
    ) -> Result<Option<AccessToken>, Self::Error> {
        let Some(id) = self.state.oauth2_access_token_by_token.get(access_token) else {
            return Ok(None);
        };
        Ok(self.state.oauth2_access_tokens.get(id).cloned())
    }

    #[tracing::instrument(
        name = "mem.oauth2_access_token.add",
        skip_all,
        fields(user.id = %user.id, client.id = %client.id, access_token.id),
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        user: &User,
        client: &OAuthClient,
        scope: Scope,
        access_token: String,
        expires_after: Option<Duration>,
    ) -> Result<AccessToken, Self::Error> {
        let created_at = clock.now();
        let expires_at = expires_after.map(|d| created_at + d);
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("access_token.id", tracing::field::display(id));

        let token = AccessToken {
            id,
            state: AccessTokenState::default(),
            user_id: user.id,
            client_id: client.id,
            scope,
            access_token: access_token.clone(),
            created_at,
            expires_at,
            first_used_at: None,
        };
        self.state.oauth2_access_tokens.insert(id, token.clone());
        self.state
            .oauth2_access_token_by_token
            .insert(access_token, id);
        Ok(token)
    }

    #[tracing::instrument(
        name = "mem.oauth2_access_token.revoke",
        skip_all,
        fields(access_token.id = %access_token.id),
    )]
    async fn revoke(
        &mut self,
        clock: &dyn Clock,
        access_token: AccessToken,
    ) -> Result<AccessToken, Self::Error> {
        let token = AccessToken {
            state: AccessTokenState::Revoked {
                revoked_at: clock.now(),
            },
            ..access_token
        };
        self.state.oauth2_access_tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn mark_used(
        &mut self,
        clock: &dyn Clock,
        access_token: AccessToken,
    ) -> Result<AccessToken, Self::Error> {
        let token = AccessToken {
            first_used_at: access_token.first_used_at.or_else(|| Some(clock.now())),
            ..access_token
        };
        self.state.oauth2_access_tokens.insert(token.id, token.clone());
        Ok(token)
    }
}

/// An implementation of [`OAuth2RefreshTokenRepository`] working on an
/// in-memory state snapshot
pub(crate) struct MemOAuth2RefreshTokenRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemOAuth2RefreshTokenRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl OAuth2RefreshTokenRepository for MemOAuth2RefreshTokenRepository<'_> {
    type Error = MemStorageError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<RefreshToken>, Self::Error> {
        Ok(self.state.oauth2_refresh_tokens.get(&id).cloned())
    }

    async fn find_by_token(
        &mut self,
        refresh_token: &str,
    ) -> Result<Option<RefreshToken>, Self::Error> {
        let Some(id) = self.state.oauth2_refresh_token_by_token.get(refresh_token) else {
            return Ok(None);
        };
        Ok(self.state.oauth2_refresh_tokens.get(id).cloned())
    }

    #[tracing::instrument(
        name = "mem.oauth2_refresh_token.add",
        skip_all,
        fields(user.id = %user.id, client.id = %client.id, refresh_token.id),
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        user: &User,
        client: &OAuthClient,
        scope: Scope,
        refresh_token: String,
        access_token: Option<&AccessToken>,
    ) -> Result<RefreshToken, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("refresh_token.id", tracing::field::display(id));

        let token = RefreshToken {
            id,
            state: RefreshTokenState::default(),
            user_id: user.id,
            client_id: client.id,
            scope,
            refresh_token: refresh_token.clone(),
            access_token_id: access_token.map(|token| token.id),
            created_at,
        };
        self.state.oauth2_refresh_tokens.insert(id, token.clone());
        self.state
            .oauth2_refresh_token_by_token
            .insert(refresh_token, id);
        Ok(token)
    }

    #[tracing::instrument(
        name = "mem.oauth2_refresh_token.revoke",
        skip_all,
        fields(refresh_token.id = %refresh_token.id),
    )]
    async fn revoke(
        &mut self,
        clock: &dyn Clock,
        refresh_token: RefreshToken,
    ) -> Result<RefreshToken, Self::Error> {
        let token = RefreshToken {
            state: RefreshTokenState::Revoked {
                revoked_at: clock.now(),
            },
            ..refresh_token
        };
        self.state
            .oauth2_refresh_tokens
            .insert(token.id, token.clone());
        Ok(token)
    }
}

/// An implementation of [`OAuth2AuthorizationCodeRepository`] working on an
/// in-memory state snapshot
pub(crate) struct MemOAuth2AuthorizationCodeRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemOAuth2AuthorizationCodeRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl OAuth2AuthorizationCodeRepository for MemOAuth2AuthorizationCodeRepository<'_> {
    type Error = MemStorageError;

    #[tracing::instrument(name = "mem.oauth2_authorization_code.consume", skip_all)]
    async fn consume(
        &mut self,
        _clock: &dyn Clock,
        code_digest: String,
        expires_at: DateTime<Utc>,
    ) -> Result<CodeUse, Self::Error> {
        if self.state.oauth2_used_codes.contains_key(&code_digest) {
            return Ok(CodeUse::Replayed);
        }
        self.state.oauth2_used_codes.insert(code_digest, expires_at);
        Ok(CodeUse::FirstUse)
    }

    async fn cleanup_expired(&mut self, until: DateTime<Utc>) -> Result<usize, Self::Error> {
        let before = self.state.oauth2_used_codes.len();
        self.state
            .oauth2_used_codes
            .retain(|_, expires_at| *expires_at >= until);
        Ok(before - self.state.oauth2_used_codes.len())
    }
}

#[cfg(test)]
mod tests {
    use etwin_data_model::MockClock;
    use rand::SeedableRng;
    use std::str::FromStr;

    use super::*;

    fn uris() -> (Url, Url) {
        (
            Url::parse("https://eternalfest.net").unwrap(),
            Url::parse("https://eternalfest.net/oauth/callback").unwrap(),
        )
    }

    #[tokio::test]
    async fn system_client_upsert_preserves_identity() {
        let clock = MockClock::default();
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(42);
        let mut state = State::default();
        let mut repo = MemOAuth2ClientRepository::new(&mut state);

        let key: OAuthClientKey = "eternalfest@clients".parse().unwrap();
        let (app, callback) = uris();

        let first = repo
            .upsert_system(
                &mut rng,
                &clock,
                key.clone(),
                "Eternalfest".to_owned(),
                app.clone(),
                callback.clone(),
                "$hash1".to_owned(),
            )
            .await
            .unwrap();

        let second = repo
            .upsert_system(
                &mut rng,
                &clock,
                key.clone(),
                "Eternalfest (beta)".to_owned(),
                app,
                callback,
                "$hash2".to_owned(),
            )
            .await
            .unwrap();

        // Same identity, rotated display name and secret
        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "Eternalfest (beta)");
        assert_eq!(
            repo.secret_hash(&second).await.unwrap().as_deref(),
            Some("$hash2")
        );
        assert_eq!(repo.find_by_key(&key).await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn token_lifecycle() {
        let clock = MockClock::default();
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(42);
        let mut state = State::default();

        let user = User {
            id: Ulid::from_parts(1, 1),
            display_name: "alice".to_owned(),
            created_at: clock.now(),
        };
        let (app, callback) = uris();
        let client = OAuthClient {
            id: Ulid::from_parts(1, 2),
            key: None,
            display_name: "Client".to_owned(),
            app_uri: app,
            callback_uri: callback,
            owner: None,
            created_at: clock.now(),
        };

        let mut repo = MemOAuth2AccessTokenRepository::new(&mut state);
        let token = repo
            .add(
                &mut rng,
                &clock,
                &user,
                &client,
                Scope::from_str("base").unwrap(),
                "eat_sometoken".to_owned(),
                Some(Duration::hours(1)),
            )
            .await
            .unwrap();

        assert!(token.is_valid(clock.now()));
        let found = repo.find_by_token("eat_sometoken").await.unwrap().unwrap();
        assert_eq!(found, token);

        let revoked = repo.revoke(&clock, token).await.unwrap();
        assert!(!revoked.is_valid(clock.now()));
        // The revocation is persisted
        let found = repo.find_by_token("eat_sometoken").await.unwrap().unwrap();
        assert!(!found.state.is_valid());
    }

    #[tokio::test]
    async fn codes_are_single_use() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = MemOAuth2AuthorizationCodeRepository::new(&mut state);

        let expires_at = clock.now() + Duration::minutes(10);
        assert_eq!(
            repo.consume(&clock, "digest-1".to_owned(), expires_at)
                .await
                .unwrap(),
            CodeUse::FirstUse
        );
        assert_eq!(
            repo.consume(&clock, "digest-1".to_owned(), expires_at)
                .await
                .unwrap(),
            CodeUse::Replayed
        );

        // Cleanup drops the record once the code itself expired
        assert_eq!(
            repo.cleanup_expired(expires_at + Duration::minutes(1))
                .await
                .unwrap(),
            1
        );
    }
}
