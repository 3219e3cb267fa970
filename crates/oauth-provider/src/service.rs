// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use std::sync::Arc;

use chrono::Duration;
use etwin_config::{OAuth2Config, SecretsConfig, SystemClientConfig};
use etwin_data_model::{
    AccessToken, Clock, OAuthClient, OAuthClientKey, OAuthClientRef, TokenFormatError, TokenType,
    User,
};
use etwin_oauth2_types::{
    errors::{ClientError, ClientErrorCode},
    requests::{
        AccessTokenRequest, AccessTokenResponse, AccessTokenType, AccessType,
        AuthorizationRequest, ResponseType,
    },
    scope::{BASE, OFFLINE, Scope, ScopeToken},
};
use etwin_storage::{BoxRepository, RepositoryError, oauth2::CodeUse};
use rand_core::RngCore;
use thiserror::Error;
use url::Url;

use crate::{
    code::{GrantCodeSigner, VerifyCodeError, code_digest},
    secrets::{SecretHasher, SecretHasherError},
};

/// A successfully issued authorization-code grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeGrant {
    /// The signed grant code.
    pub code: String,

    /// The `state` echoed back to the client.
    pub state: Option<String>,

    /// The client callback with `code` and `state` encoded in the query.
    pub redirect_uri: Url,
}

/// The resolved identity behind a presented access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub user: User,
    pub client: OAuthClient,
    pub scope: Scope,
    pub access_token: AccessToken,
}

/// A system client to provision at startup.
#[derive(Debug, Clone)]
pub struct SystemClientDefinition {
    pub key: OAuthClientKey,
    pub display_name: String,
    pub app_uri: Url,
    pub callback_uri: Url,
    pub secret: String,
}

impl From<SystemClientConfig> for SystemClientDefinition {
    fn from(config: SystemClientConfig) -> Self {
        Self {
            key: config.key,
            display_name: config.display_name,
            app_uri: config.app_uri,
            callback_uri: config.callback_uri,
            secret: config.secret,
        }
    }
}

fn is_known_scope(token: &ScopeToken) -> bool {
    *token == BASE || *token == OFFLINE
}

fn error_redirect(callback: &Url, error: &ClientError, state: Option<&str>) -> Url {
    let mut location = callback.clone();
    {
        let mut query = location.query_pairs_mut();
        query.append_pair("error", error.error.as_str());
        if let Some(description) = &error.error_description {
            query.append_pair("error_description", description.as_str());
        }
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    location
}

/// The error returned by [`OAuthProviderService::authorize`].
///
/// The first three variants correspond to queries which may be malicious:
/// the client is not trusted yet, so they are reported on the platform's own
/// surface. Later variants carry the resolved callback, and are reported by
/// redirecting to the client per RFC 6749.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("missing or invalid client_id parameter")]
    InvalidClientId,

    #[error("oauth client not found")]
    ClientNotFound,

    #[error("provided redirect_uri does not match the registered callback_uri")]
    RedirectUriMismatch,

    #[error("no authenticated user")]
    Unauthenticated {
        callback: Box<Url>,
        state: Option<String>,
    },

    #[error("unsupported response_type")]
    UnsupportedResponseType {
        callback: Box<Url>,
        state: Option<String>,
    },

    #[error("unknown scope {scope:?}")]
    InvalidScope {
        scope: String,
        callback: Box<Url>,
        state: Option<String>,
    },

    #[error("failed to sign the grant code")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Internal(#[from] RepositoryError),
}

impl AuthorizeError {
    /// The RFC 6749 error to report for this failure.
    #[must_use]
    pub fn client_error(&self) -> ClientError {
        match self {
            Self::InvalidClientId | Self::ClientNotFound | Self::RedirectUriMismatch => {
                ClientError::from(ClientErrorCode::InvalidRequest)
            }
            Self::Unauthenticated { .. } => ClientError::from(ClientErrorCode::AccessDenied),
            Self::UnsupportedResponseType { .. } => {
                ClientError::from(ClientErrorCode::UnsupportedResponseType)
            }
            Self::InvalidScope { scope, .. } => ClientError::from(ClientErrorCode::InvalidScope)
                .with_description(format!("unknown scope: {scope}")),
            Self::Sign(_) | Self::Internal(_) => ClientError::from(ClientErrorCode::ServerError),
        }
    }

    /// Where to redirect to report this failure, when the callback is
    /// trusted. `None` means the error must be reported directly.
    #[must_use]
    pub fn redirect(&self) -> Option<Url> {
        let (callback, state) = match self {
            Self::Unauthenticated { callback, state }
            | Self::UnsupportedResponseType { callback, state }
            | Self::InvalidScope {
                callback, state, ..
            } => (callback, state),
            _ => return None,
        };
        Some(error_redirect(
            callback,
            &self.client_error(),
            state.as_deref(),
        ))
    }
}

/// The error returned by [`OAuthProviderService::exchange`].
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("malformed grant code")]
    InvalidCode(#[source] VerifyCodeError),

    #[error("grant code is expired")]
    Expired,

    #[error("grant code was already exchanged")]
    Replayed,

    #[error("oauth client not found")]
    ClientNotFound,

    #[error("code audience does not match the authenticated client")]
    WrongClient,

    #[error("provided redirect_uri does not match the registered callback_uri")]
    RedirectUriMismatch,

    #[error("invalid client credentials")]
    InvalidCredentials,

    #[error("the granted user no longer exists")]
    UserNotFound,

    #[error("grant code carries an invalid scope")]
    InvalidScope,

    #[error("failed to verify the client secret")]
    Secret(#[from] SecretHasherError),

    #[error(transparent)]
    Internal(#[from] RepositoryError),
}

impl ExchangeError {
    /// The RFC 6749 error to report for this failure.
    #[must_use]
    pub fn client_error(&self) -> ClientError {
        match self {
            Self::InvalidCode(_) => ClientError::from(ClientErrorCode::InvalidGrant),
            Self::Expired => ClientError::from(ClientErrorCode::InvalidGrant)
                .with_description("The grant code is expired.".to_owned()),
            Self::Replayed => ClientError::from(ClientErrorCode::InvalidGrant)
                .with_description("The grant code was already exchanged.".to_owned()),
            Self::RedirectUriMismatch | Self::UserNotFound => {
                ClientError::from(ClientErrorCode::InvalidGrant)
            }
            Self::ClientNotFound | Self::InvalidCredentials => {
                ClientError::from(ClientErrorCode::InvalidClient)
            }
            Self::WrongClient => ClientError::from(ClientErrorCode::UnauthorizedClient),
            Self::InvalidScope => ClientError::from(ClientErrorCode::InvalidScope),
            Self::Secret(_) | Self::Internal(_) => {
                ClientError::from(ClientErrorCode::ServerError)
            }
        }
    }
}

/// The error returned by [`OAuthProviderService::authenticate`].
#[derive(Debug, Error)]
pub enum AuthenticateError {
    #[error("malformed access token")]
    InvalidToken(#[from] TokenFormatError),

    #[error("access token not found")]
    NotFound,

    #[error("access token is expired or revoked")]
    Expired,

    #[error("the client bound to the token no longer exists")]
    ClientNotFound,

    #[error("the user bound to the token no longer exists")]
    UserNotFound,

    #[error(transparent)]
    Internal(#[from] RepositoryError),
}

/// The error returned by the token-revocation operations.
#[derive(Debug, Error)]
pub enum RevokeError {
    #[error("token not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] RepositoryError),
}

/// The error returned by [`OAuthProviderService::upsert_system_client`].
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to hash the client secret")]
    Secret(#[from] SecretHasherError),

    #[error(transparent)]
    Internal(#[from] RepositoryError),
}

/// The authorization-code provider.
///
/// Every mutating operation runs against one repository transaction and
/// commits it on success; a failed operation leaves the store untouched.
pub struct OAuthProviderService {
    signer: GrantCodeSigner,
    hasher: Arc<dyn SecretHasher>,
    access_token_validity: Duration,
}

impl OAuthProviderService {
    /// Create a new provider service.
    #[must_use]
    pub fn new(
        signer: GrantCodeSigner,
        hasher: Arc<dyn SecretHasher>,
        access_token_validity: Duration,
    ) -> Self {
        Self {
            signer,
            hasher,
            access_token_validity,
        }
    }

    /// Build the provider service out of the application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key cannot be read.
    pub fn from_config(
        oauth2: &OAuth2Config,
        secrets: &SecretsConfig,
        hasher: Arc<dyn SecretHasher>,
    ) -> Result<Self, std::io::Error> {
        let signing_key = secrets.signing_key_bytes()?;
        Ok(Self::new(
            GrantCodeSigner::new(
                oauth2.issuer.clone(),
                &signing_key,
                oauth2.grant_code_ttl(),
            ),
            hasher,
            oauth2.access_token_ttl(),
        ))
    }

    async fn resolve_client(
        repo: &mut BoxRepository,
        client_id: &str,
    ) -> Result<Option<OAuthClient>, RepositoryError> {
        let Ok(client_ref) = client_id.parse::<OAuthClientRef>() else {
            return Ok(None);
        };
        match client_ref {
            OAuthClientRef::Id(id) => repo.oauth2_client().lookup(id).await,
            OAuthClientRef::Key(key) => repo.oauth2_client().find_by_key(&key).await,
        }
    }

    /// Handle an authorization request for the given authenticated user.
    ///
    /// On success the caller redirects the user agent to
    /// [`AuthorizationCodeGrant::redirect_uri`]; on failure it consults
    /// [`AuthorizeError::redirect`] to decide where the error is reported.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthorizeError`] as described on the type.
    #[tracing::instrument(skip_all, fields(client_id = %request.client_id))]
    pub async fn authorize(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        user: Option<&User>,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationCodeGrant, AuthorizeError> {
        // Until the client and its callback are resolved, the query is not
        // trusted enough to redirect anywhere.
        if request.client_id.parse::<OAuthClientRef>().is_err() {
            return Err(AuthorizeError::InvalidClientId);
        }
        let client = Self::resolve_client(&mut repo, &request.client_id)
            .await?
            .ok_or(AuthorizeError::ClientNotFound)?;
        let callback = client
            .resolve_redirect_uri(request.redirect_uri.as_ref())
            .map_err(|_| AuthorizeError::RedirectUriMismatch)?
            .clone();

        // From here on, errors are reported to the client on its callback.
        let state = request.state;

        if request.response_type != ResponseType::Code {
            return Err(AuthorizeError::UnsupportedResponseType {
                callback: Box::new(callback),
                state,
            });
        }

        let mut scope = request.scope.unwrap_or_default();
        if let Some(unknown) = scope.iter().find(|&token| !is_known_scope(token)) {
            return Err(AuthorizeError::InvalidScope {
                scope: unknown.as_str().to_owned(),
                callback: Box::new(callback),
                state,
            });
        }
        scope.insert(BASE);
        if request.access_type == AccessType::Offline {
            scope.insert(OFFLINE);
        }

        let Some(user) = user else {
            return Err(AuthorizeError::Unauthenticated {
                callback: Box::new(callback),
                state,
            });
        };

        let code = self
            .signer
            .sign(clock, user.id, client.audience(), &scope)
            .map_err(AuthorizeError::Sign)?;

        let redirect_uri = {
            let mut redirect_uri = callback;
            {
                let mut query = redirect_uri.query_pairs_mut();
                query.append_pair("code", &code);
                if let Some(state) = &state {
                    query.append_pair("state", state);
                }
            }
            redirect_uri
        };

        tracing::info!(user.id = %user.id, client.id = %client.id, "issued grant code");
        Ok(AuthorizationCodeGrant {
            code,
            state,
            redirect_uri,
        })
    }

    /// Exchange a grant code for an access token, and a refresh token for
    /// offline-capable grants.
    ///
    /// Codes are single use: the first successful exchange records the code
    /// digest, and any further exchange of the same code fails with
    /// [`ExchangeError::Replayed`].
    ///
    /// # Errors
    ///
    /// Returns an [`ExchangeError`]; the store is left untouched on failure.
    #[tracing::instrument(skip_all, fields(client_id = %request.client_id))]
    pub async fn exchange(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        request: AccessTokenRequest,
    ) -> Result<AccessTokenResponse, ExchangeError> {
        let claims = self
            .signer
            .verify(clock, &request.code)
            .map_err(|err| match err {
                VerifyCodeError::Expired => ExchangeError::Expired,
                other => ExchangeError::InvalidCode(other),
            })?;

        let client = Self::resolve_client(&mut repo, &request.client_id)
            .await?
            .ok_or(ExchangeError::ClientNotFound)?;

        if !client.matches_audience(&claims.aud) {
            return Err(ExchangeError::WrongClient);
        }

        if let Some(redirect_uri) = &request.redirect_uri {
            if *redirect_uri != client.callback_uri {
                return Err(ExchangeError::RedirectUriMismatch);
            }
        }

        // Confidential clients must present their secret; the comparison
        // goes through the hasher, which is constant-time
        if let Some(hash) = repo.oauth2_client().secret_hash(&client).await? {
            let Some(secret) = &request.client_secret else {
                return Err(ExchangeError::InvalidCredentials);
            };
            if !self.hasher.verify(secret, &hash)? {
                return Err(ExchangeError::InvalidCredentials);
            }
        }

        // Single-use enforcement. The record only needs to outlive the code
        // itself, so its retention is bounded by the signer validity.
        let digest = code_digest(&request.code);
        let record_expiry = clock.now() + self.signer.validity();
        match repo
            .oauth2_authorization_code()
            .consume(clock, digest, record_expiry)
            .await?
        {
            CodeUse::FirstUse => {}
            CodeUse::Replayed => return Err(ExchangeError::Replayed),
        }

        let mut scope = claims
            .scopes
            .iter()
            .map(|token| token.parse::<ScopeToken>())
            .collect::<Result<Scope, _>>()
            .map_err(|_| ExchangeError::InvalidScope)?;
        scope.insert(BASE);

        let user = repo
            .user()
            .lookup(claims.sub)
            .await?
            .ok_or(ExchangeError::UserNotFound)?;

        let access_token_str = TokenType::AccessToken.generate(rng);
        let access_token = repo
            .oauth2_access_token()
            .add(
                rng,
                clock,
                &user,
                &client,
                scope.clone(),
                access_token_str.clone(),
                Some(self.access_token_validity),
            )
            .await?;

        let refresh_token_str = if scope.contains(&OFFLINE) {
            let refresh_token_str = TokenType::RefreshToken.generate(rng);
            repo.oauth2_refresh_token()
                .add(
                    rng,
                    clock,
                    &user,
                    &client,
                    scope.clone(),
                    refresh_token_str.clone(),
                    Some(&access_token),
                )
                .await?;
            Some(refresh_token_str)
        } else {
            None
        };

        repo.save().await?;

        tracing::info!(user.id = %user.id, client.id = %client.id, "exchanged grant code");
        Ok(AccessTokenResponse {
            access_token: access_token_str,
            refresh_token: refresh_token_str,
            token_type: AccessTokenType::Bearer,
            expires_in: self.access_token_validity,
            scope,
        })
    }

    /// Resolve a presented access token to the identity it carries.
    ///
    /// Records the first use of the token.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthenticateError`] if the token is malformed, unknown,
    /// expired or revoked.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        token: &str,
    ) -> Result<Authentication, AuthenticateError> {
        if TokenType::check(token)? != TokenType::AccessToken {
            return Err(AuthenticateError::NotFound);
        }

        let access_token = repo
            .oauth2_access_token()
            .find_by_token(token)
            .await?
            .ok_or(AuthenticateError::NotFound)?;

        if !access_token.is_valid(clock.now()) {
            return Err(AuthenticateError::Expired);
        }

        let access_token = repo
            .oauth2_access_token()
            .mark_used(clock, access_token)
            .await?;

        let client = repo
            .oauth2_client()
            .lookup(access_token.client_id)
            .await?
            .ok_or(AuthenticateError::ClientNotFound)?;
        let user = repo
            .user()
            .lookup(access_token.user_id)
            .await?
            .ok_or(AuthenticateError::UserNotFound)?;

        repo.save().await?;

        Ok(Authentication {
            user,
            client,
            scope: access_token.scope.clone(),
            access_token,
        })
    }

    /// Revoke an access token. Revoking an already-revoked token is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RevokeError::NotFound`] if no such token exists.
    #[tracing::instrument(skip_all)]
    pub async fn revoke_access_token(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        token: &str,
    ) -> Result<(), RevokeError> {
        let access_token = repo
            .oauth2_access_token()
            .find_by_token(token)
            .await?
            .ok_or(RevokeError::NotFound)?;

        if access_token.state.is_valid() {
            repo.oauth2_access_token().revoke(clock, access_token).await?;
            repo.save().await?;
        }
        Ok(())
    }

    /// Revoke a refresh token. Independent from access-token revocation.
    ///
    /// # Errors
    ///
    /// Returns [`RevokeError::NotFound`] if no such token exists.
    #[tracing::instrument(skip_all)]
    pub async fn revoke_refresh_token(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        token: &str,
    ) -> Result<(), RevokeError> {
        let refresh_token = repo
            .oauth2_refresh_token()
            .find_by_token(token)
            .await?
            .ok_or(RevokeError::NotFound)?;

        if refresh_token.state.is_valid() {
            repo.oauth2_refresh_token()
                .revoke(clock, refresh_token)
                .await?;
            repo.save().await?;
        }
        Ok(())
    }

    /// Provision or refresh a platform system client.
    ///
    /// # Errors
    ///
    /// Returns a [`ProvisionError`] if secret hashing or the store fails.
    #[tracing::instrument(skip_all, fields(client.key = %definition.key))]
    pub async fn upsert_system_client(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        definition: SystemClientDefinition,
    ) -> Result<OAuthClient, ProvisionError> {
        let secret_hash = self.hasher.hash(rng, &definition.secret)?;
        let client = repo
            .oauth2_client()
            .upsert_system(
                rng,
                clock,
                definition.key,
                definition.display_name,
                definition.app_uri,
                definition.callback_uri,
                secret_hash,
            )
            .await?;
        repo.save().await?;
        Ok(client)
    }
}
