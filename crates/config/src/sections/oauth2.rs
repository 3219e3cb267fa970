// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use chrono::Duration;
use figment::Figment;
use serde::Deserialize;

use crate::util::ConfigurationSection;

fn default_issuer() -> String {
    "etwin".to_owned()
}

fn default_grant_code_ttl() -> i64 {
    // 10 minutes, per RFC 6749's "A maximum authorization code lifetime of
    // 10 minutes is RECOMMENDED"
    600
}

fn default_access_token_ttl() -> i64 {
    3600
}

/// OAuth 2.0 provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Config {
    /// The `iss` claim of issued grant codes.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Grant-code lifetime, in seconds.
    #[serde(default = "default_grant_code_ttl")]
    pub grant_code_ttl: i64,

    /// Access-token lifetime, in seconds.
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: i64,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            grant_code_ttl: default_grant_code_ttl(),
            access_token_ttl: default_access_token_ttl(),
        }
    }
}

impl OAuth2Config {
    /// Grant-code lifetime as a [`Duration`].
    #[must_use]
    pub fn grant_code_ttl(&self) -> Duration {
        Duration::seconds(self.grant_code_ttl)
    }

    /// Access-token lifetime as a [`Duration`].
    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl)
    }
}

impl ConfigurationSection for OAuth2Config {
    const PATH: Option<&'static str> = Some("oauth2");

    fn validate(
        &self,
        _figment: &Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        if self.issuer.is_empty() {
            return Err("oauth2.issuer must not be empty".into());
        }
        if self.grant_code_ttl <= 0 {
            return Err("oauth2.grant_code_ttl must be positive".into());
        }
        if self.access_token_ttl <= 0 {
            return Err("oauth2.access_token_ttl must be positive".into());
        }
        Ok(())
    }
}
