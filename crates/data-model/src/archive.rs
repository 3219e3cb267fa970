// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::{RemoteAccountId, RemoteServer, RemoteUsername};
use crate::temporal::TemporalField;

/// Profile attributes scraped from a remote account, one temporal slot per
/// attribute family. A `None` slot means the attribute was never observed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteProfile {
    /// In-game currency balance.
    pub coins: Option<TemporalField<u32>>,

    /// Inventory, as item name to quantity.
    pub items: Option<TemporalField<BTreeMap<String, u32>>>,

    /// Unlocked collection entries.
    pub collection: Option<TemporalField<BTreeSet<String>>>,
}

/// One scraped profile observation, as produced by a remote client. Absent
/// attributes were not part of the scraped page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub captured_at: DateTime<Utc>,
    pub coins: Option<u32>,
    pub items: Option<BTreeMap<String, u32>>,
    pub collection: Option<BTreeSet<String>>,
}

/// A remote account as recorded by the archive, with its merged profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedRemoteAccount {
    pub server: RemoteServer,
    pub id: RemoteAccountId,
    pub username: RemoteUsername,
    /// When the identity was first archived.
    pub archived_at: DateTime<Utc>,
    pub profile: RemoteProfile,
}
