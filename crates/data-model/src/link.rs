// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! The identity graph: which remote account is, or was, bound to which
//! central user. For a given remote account and for a given `(user, server)`
//! slot there is at most one active link at any instant; superseded links are
//! kept in `old`, never deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::remote::{RemoteAccountRef, RemoteServer};

/// Who performed a link or unlink action, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAction {
    pub at: DateTime<Utc>,
    /// The user who performed the action. Implicit unlinks are attributed to
    /// the user whose touch superseded the link.
    pub actor: Ulid,
}

/// An active link between a central user and a remote account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub linked: LinkAction,
    pub user: Ulid,
    pub remote: RemoteAccountRef,
}

impl Link {
    /// Close this link, moving it into history.
    #[must_use]
    pub fn into_old(self, unlinked: LinkAction) -> OldLink {
        OldLink {
            linked: self.linked,
            unlinked,
            user: self.user,
            remote: self.remote,
        }
    }
}

/// A superseded link, with both ends of its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldLink {
    pub linked: LinkAction,
    pub unlinked: LinkAction,
    pub user: Ulid,
    pub remote: RemoteAccountRef,
}

/// The current-plus-historical state of one link slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionedLink {
    pub current: Option<Link>,
    pub old: Vec<OldLink>,
}

impl VersionedLink {
    /// Whether the slot is actively linked to the given user.
    #[must_use]
    pub fn is_linked_to(&self, user: Ulid) -> bool {
        self.current.as_ref().is_some_and(|link| link.user == user)
    }
}

/// The link slots of one central user, one per remote server.
///
/// Every known server has an entry; servers the user never linked hold an
/// empty [`VersionedLink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedLinks(BTreeMap<RemoteServer, VersionedLink>);

impl Default for VersionedLinks {
    fn default() -> Self {
        Self(
            RemoteServer::ALL
                .into_iter()
                .map(|server| (server, VersionedLink::default()))
                .collect(),
        )
    }
}

impl VersionedLinks {
    /// The slot for the given server.
    ///
    /// # Panics
    ///
    /// Never panics: every server has a slot.
    #[must_use]
    pub fn get(&self, server: RemoteServer) -> &VersionedLink {
        self.0.get(&server).expect("every server has a slot")
    }

    /// Replace the slot for the given server.
    pub fn set(&mut self, server: RemoteServer, link: VersionedLink) {
        self.0.insert(server, link);
    }

    /// Iterate over `(server, slot)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (RemoteServer, &VersionedLink)> {
        self.0.iter().map(|(server, link)| (*server, link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_links_has_every_slot() {
        let links = VersionedLinks::default();
        for server in RemoteServer::ALL {
            assert_eq!(links.get(server), &VersionedLink::default());
        }
    }
}
