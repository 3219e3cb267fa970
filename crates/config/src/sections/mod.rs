// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use figment::Figment;
use serde::Deserialize;

mod clients;
mod oauth2;
mod secrets;

pub use self::{
    clients::{ClientsConfig, SystemClientConfig},
    oauth2::OAuth2Config,
    secrets::{Key, SecretsConfig},
};
use crate::util::ConfigurationSection;

/// The whole application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// OAuth 2.0 provider settings.
    #[serde(default)]
    pub oauth2: OAuth2Config,

    /// Secrets: the grant-code signing key.
    pub secrets: SecretsConfig,

    /// System clients to provision at startup.
    #[serde(default)]
    pub clients: ClientsConfig,
}

impl ConfigurationSection for AppConfig {
    fn validate(
        &self,
        figment: &Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        self.oauth2.validate(figment)?;
        self.secrets.validate(figment)?;
        self.clients.validate(figment)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Jail,
        providers::{Env, Format, Yaml},
    };

    use super::*;

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                  oauth2:
                    issuer: etwin
                    grant_code_ttl: 300
                  secrets:
                    signing_key: '0000111122223333'
                  clients:
                    - key: eternalfest@clients
                      display_name: Eternalfest
                      app_uri: https://eternalfest.net
                      callback_uri: https://eternalfest.net/oauth/callback
                      secret: dev-secret
                ",
            )?;
            jail.set_env("ETWIN_OAUTH2__ACCESS_TOKEN_TTL", "7200");

            let figment = Figment::new()
                .merge(Yaml::file("config.yaml"))
                .merge(Env::prefixed("ETWIN_").split("__"));

            let config = AppConfig::extract(&figment).expect("config should load");
            assert_eq!(config.oauth2.issuer, "etwin");
            assert_eq!(config.oauth2.grant_code_ttl().num_seconds(), 300);
            // The environment overrides the file
            assert_eq!(config.oauth2.access_token_ttl().num_seconds(), 7200);
            assert_eq!(config.clients.0.len(), 1);
            assert_eq!(
                config.secrets.signing_key_bytes().unwrap(),
                b"0000111122223333".to_vec()
            );
            Ok(())
        });
    }
}
