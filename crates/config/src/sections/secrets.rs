// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use camino::Utf8PathBuf;
use figment::Figment;
use serde::Deserialize;

use crate::util::ConfigurationSection;

/// Key config option.
///
/// It either holds the key value directly or references a file where the key
/// is stored.
#[derive(Debug, Clone)]
pub enum Key {
    /// The key value, inline.
    Value(String),

    /// A file holding the key.
    File(Utf8PathBuf),
}

/// Key fields as serialized in the configuration file.
#[derive(Deserialize, Clone, Debug)]
struct SecretsConfigRaw {
    signing_key: Option<String>,
    signing_key_file: Option<Utf8PathBuf>,
}

/// Secrets used by the OAuth provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SecretsConfigRaw")]
pub struct SecretsConfig {
    /// The symmetric key signing grant codes.
    pub signing_key: Key,
}

impl TryFrom<SecretsConfigRaw> for SecretsConfig {
    type Error = String;

    fn try_from(raw: SecretsConfigRaw) -> Result<Self, Self::Error> {
        let signing_key = match (raw.signing_key, raw.signing_key_file) {
            (Some(value), None) => Key::Value(value),
            (None, Some(path)) => Key::File(path),
            (None, None) => {
                return Err("Missing `signing_key` or `signing_key_file`".to_owned());
            }
            (Some(_), Some(_)) => {
                return Err(
                    "Cannot specify both `signing_key` and `signing_key_file`".to_owned(),
                );
            }
        };
        Ok(Self { signing_key })
    }
}

impl SecretsConfig {
    /// The raw bytes of the signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file cannot be read.
    pub fn signing_key_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        match &self.signing_key {
            Key::Value(value) => Ok(value.clone().into_bytes()),
            Key::File(path) => std::fs::read(path),
        }
    }
}

impl ConfigurationSection for SecretsConfig {
    const PATH: Option<&'static str> = Some("secrets");

    fn validate(
        &self,
        _figment: &Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        if let Key::Value(value) = &self.signing_key {
            if value.len() < 16 {
                return Err("secrets.signing_key must be at least 16 bytes".into());
            }
        }
        Ok(())
    }
}
