// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use etwin_data_model::OAuthClientKey;
use figment::Figment;
use serde::Deserialize;
use url::Url;

use crate::util::ConfigurationSection;

/// One system client to provision at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemClientConfig {
    /// The stable `name@clients` key of the client.
    pub key: OAuthClientKey,

    /// Name of the client shown to end users.
    pub display_name: String,

    /// URL of the client application.
    pub app_uri: Url,

    /// The registered redirection URI.
    pub callback_uri: Url,

    /// The client secret. Only its hash ever reaches the store.
    pub secret: String,
}

/// System clients to provision at startup. Provisioning is idempotent:
/// re-running it rotates the secret and URIs in place.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ClientsConfig(pub Vec<SystemClientConfig>);

impl ConfigurationSection for ClientsConfig {
    const PATH: Option<&'static str> = Some("clients");

    fn validate(
        &self,
        _figment: &Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        for client in &self.0 {
            if client.secret.is_empty() {
                return Err(
                    format!("clients: {key} has an empty secret", key = client.key).into(),
                );
            }
        }
        Ok(())
    }
}
