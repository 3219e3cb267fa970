// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

#![deny(missing_docs, rustdoc::missing_crate_level_docs)]
#![allow(clippy::module_name_repetitions)]

//! Application configuration logic

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};

mod sections;
pub(crate) mod util;

pub use self::{
    sections::{AppConfig, ClientsConfig, Key, OAuth2Config, SecretsConfig, SystemClientConfig},
    util::{ConfigurationSection, ConfigurationSectionExt},
};

/// Build the default [`Figment`] for this application: a YAML configuration
/// file overridden by `ETWIN_`-prefixed environment variables.
#[must_use]
pub fn figment(config_file: &str) -> Figment {
    Figment::new()
        .merge(Yaml::file(config_file))
        .merge(Env::prefixed("ETWIN_").split("__"))
}
