// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use etwin_data_model::{
    Clock, Link, LinkAction, OldLink, RemoteAccountRef, VersionedLink, VersionedLinks,
};
use etwin_storage::link::{LinkRepository, TouchLinkOutcome};
use ulid::Ulid;

use crate::{LinkRecord, MemStorageError, State};

/// An implementation of [`LinkRepository`] working on an in-memory state
/// snapshot
pub(crate) struct MemLinkRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemLinkRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }

    fn slot_by_remote(&self, remote: &RemoteAccountRef) -> VersionedLink {
        let mut slot = VersionedLink::default();
        // Records are append-only, so iteration order is chronological.
        for record in &self.state.links {
            if record.remote != *remote {
                continue;
            }
            match record.unlinked {
                None => {
                    slot.current = Some(Link {
                        linked: record.linked,
                        user: record.user,
                        remote: record.remote.clone(),
                    });
                }
                Some(unlinked) => slot.old.push(OldLink {
                    linked: record.linked,
                    unlinked,
                    user: record.user,
                    remote: record.remote.clone(),
                }),
            }
        }
        slot
    }

    fn active_index_by_remote(&self, remote: &RemoteAccountRef) -> Option<usize> {
        self.state
            .links
            .iter()
            .position(|record| record.unlinked.is_none() && record.remote == *remote)
    }

    fn active_index_by_user(&self, user_id: Ulid, remote: &RemoteAccountRef) -> Option<usize> {
        self.state.links.iter().position(|record| {
            record.unlinked.is_none()
                && record.user == user_id
                && record.remote.server == remote.server
        })
    }
}

#[async_trait]
impl LinkRepository for MemLinkRepository<'_> {
    type Error = MemStorageError;

    async fn get_by_remote(
        &mut self,
        remote: &RemoteAccountRef,
    ) -> Result<VersionedLink, Self::Error> {
        Ok(self.slot_by_remote(remote))
    }

    async fn get_for_user(&mut self, user_id: Ulid) -> Result<VersionedLinks, Self::Error> {
        let mut links = VersionedLinks::default();
        for record in &self.state.links {
            if record.user != user_id {
                continue;
            }
            let server = record.remote.server;
            let mut slot = links.get(server).clone();
            match record.unlinked {
                None => {
                    slot.current = Some(Link {
                        linked: record.linked,
                        user: record.user,
                        remote: record.remote.clone(),
                    });
                }
                Some(unlinked) => slot.old.push(OldLink {
                    linked: record.linked,
                    unlinked,
                    user: record.user,
                    remote: record.remote.clone(),
                }),
            }
            links.set(server, slot);
        }
        Ok(links)
    }

    #[tracing::instrument(
        name = "mem.link.touch",
        skip_all,
        fields(%user_id, remote.server = %remote.server, remote.id = %remote.id),
    )]
    async fn touch(
        &mut self,
        clock: &dyn Clock,
        remote: RemoteAccountRef,
        user_id: Ulid,
        actor_id: Ulid,
    ) -> Result<TouchLinkOutcome, Self::Error> {
        if let Some(index) = self.active_index_by_remote(&remote) {
            let existing_user = self.state.links[index].user;
            if existing_user == user_id {
                // Identical active pair: idempotent no-op
                return Ok(TouchLinkOutcome::Linked(self.slot_by_remote(&remote)));
            }
            // The remote account belongs to someone else
            return Ok(TouchLinkOutcome::Conflict { existing_user });
        }

        let now = clock.now();

        // The user superseding their own link on this server slot is an
        // implicit unlink, recorded in the slot history.
        if let Some(index) = self.active_index_by_user(user_id, &remote) {
            self.state.links[index].unlinked = Some(LinkAction {
                at: now,
                actor: actor_id,
            });
        }

        self.state.links.push(LinkRecord {
            linked: LinkAction {
                at: now,
                actor: actor_id,
            },
            unlinked: None,
            user: user_id,
            remote: remote.clone(),
        });

        Ok(TouchLinkOutcome::Linked(self.slot_by_remote(&remote)))
    }

    #[tracing::instrument(
        name = "mem.link.unlink",
        skip_all,
        fields(remote.server = %remote.server, remote.id = %remote.id),
    )]
    async fn unlink(
        &mut self,
        clock: &dyn Clock,
        remote: RemoteAccountRef,
        actor_id: Ulid,
    ) -> Result<VersionedLink, Self::Error> {
        if let Some(index) = self.active_index_by_remote(&remote) {
            self.state.links[index].unlinked = Some(LinkAction {
                at: clock.now(),
                actor: actor_id,
            });
        }
        Ok(self.slot_by_remote(&remote))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;
    use etwin_data_model::{MockClock, RemoteServer};
    use rand::{Rng, SeedableRng};

    use super::*;

    fn remote(server: RemoteServer, id: &str) -> RemoteAccountRef {
        RemoteAccountRef {
            server,
            id: id.parse().unwrap(),
        }
    }

    fn repo(state: &mut State) -> MemLinkRepository<'_> {
        MemLinkRepository::new(state)
    }

    #[tokio::test]
    async fn touch_is_idempotent() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = repo(&mut state);

        let alice = Ulid::from_parts(1, 1);
        let hf = remote(RemoteServer::HammerfestFr, "123");

        let first = repo.touch(&clock, hf.clone(), alice, alice).await.unwrap();
        clock.advance(Duration::minutes(5));
        let second = repo.touch(&clock, hf.clone(), alice, alice).await.unwrap();

        assert_eq!(first, second);
        let TouchLinkOutcome::Linked(slot) = second else {
            panic!("expected a link");
        };
        assert!(slot.is_linked_to(alice));
        assert!(slot.old.is_empty());
    }

    #[tokio::test]
    async fn claimed_remote_account_conflicts() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = repo(&mut state);

        let alice = Ulid::from_parts(1, 1);
        let bob = Ulid::from_parts(1, 2);
        let hf = remote(RemoteServer::HammerfestFr, "123");

        repo.touch(&clock, hf.clone(), alice, alice).await.unwrap();
        let outcome = repo.touch(&clock, hf.clone(), bob, bob).await.unwrap();

        assert_matches!(
            outcome,
            TouchLinkOutcome::Conflict { existing_user } if existing_user == alice
        );

        // Nothing changed for the holder
        let slot = repo.get_by_remote(&hf).await.unwrap();
        assert!(slot.is_linked_to(alice));
    }

    #[tokio::test]
    async fn own_slot_is_superseded_with_an_implicit_unlink() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = repo(&mut state);

        let alice = Ulid::from_parts(1, 1);
        let first = remote(RemoteServer::HammerfestFr, "123");
        let second = remote(RemoteServer::HammerfestFr, "456");

        let t0 = clock.now();
        repo.touch(&clock, first.clone(), alice, alice).await.unwrap();

        clock.advance(Duration::minutes(1));
        let t1 = clock.now();
        repo.touch(&clock, second.clone(), alice, alice).await.unwrap();

        // The new account is actively linked
        let slot = repo.get_by_remote(&second).await.unwrap();
        assert!(slot.is_linked_to(alice));

        // The old link was implicitly unlinked at t1 and kept in history
        let old_slot = repo.get_by_remote(&first).await.unwrap();
        assert!(old_slot.current.is_none());
        assert_eq!(old_slot.old.len(), 1);
        assert_eq!(old_slot.old[0].linked.at, t0);
        assert_eq!(old_slot.old[0].unlinked.at, t1);
        assert_eq!(old_slot.old[0].user, alice);

        // The user side sees the same state
        let links = repo.get_for_user(alice).await.unwrap();
        let user_slot = links.get(RemoteServer::HammerfestFr);
        assert_eq!(
            user_slot.current.as_ref().map(|link| &link.remote),
            Some(&second)
        );
        assert_eq!(user_slot.old.len(), 1);

        // The other server slots are untouched
        assert!(links.get(RemoteServer::Twinoid).current.is_none());
    }

    #[tokio::test]
    async fn history_survives_relinking_to_another_user() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = repo(&mut state);

        let alice = Ulid::from_parts(1, 1);
        let bob = Ulid::from_parts(1, 2);
        let hf = remote(RemoteServer::HammerfestFr, "123");

        repo.touch(&clock, hf.clone(), alice, alice).await.unwrap();
        clock.advance(Duration::minutes(1));
        repo.unlink(&clock, hf.clone(), alice).await.unwrap();
        clock.advance(Duration::minutes(1));
        repo.touch(&clock, hf.clone(), bob, bob).await.unwrap();

        let slot = repo.get_by_remote(&hf).await.unwrap();
        assert!(slot.is_linked_to(bob));
        assert_eq!(slot.old.len(), 1);
        assert_eq!(slot.old[0].user, alice);
    }

    #[tokio::test]
    async fn unlink_is_idempotent() {
        let clock = MockClock::default();
        let mut state = State::default();
        let mut repo = repo(&mut state);

        let alice = Ulid::from_parts(1, 1);
        let hf = remote(RemoteServer::HammerfestFr, "123");

        repo.touch(&clock, hf.clone(), alice, alice).await.unwrap();
        let first = repo.unlink(&clock, hf.clone(), alice).await.unwrap();
        let second = repo.unlink(&clock, hf.clone(), alice).await.unwrap();

        assert_eq!(first, second);
        assert!(second.current.is_none());
        assert_eq!(second.old.len(), 1);
    }

    /// Randomly interleave touches and unlinks across users and remote
    /// accounts, checking the exclusivity invariant after every operation.
    #[tokio::test]
    async fn exclusivity_invariant_under_random_interleaving() {
        let clock = MockClock::default();
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(0xe7);
        let mut state = State::default();

        let users: Vec<Ulid> = (0..4).map(|n| Ulid::from_parts(1, n)).collect();
        let remotes: Vec<RemoteAccountRef> = ["11", "22", "33", "44", "55", "66"]
            .iter()
            .map(|id| remote(RemoteServer::HammerfestFr, id))
            .collect();

        for _ in 0..500 {
            clock.advance(Duration::seconds(1));
            let user = users[rng.gen_range(0..users.len())];
            let target = remotes[rng.gen_range(0..remotes.len())].clone();

            {
                let mut repo = MemLinkRepository::new(&mut state);
                if rng.gen_bool(0.7) {
                    repo.touch(&clock, target, user, user).await.unwrap();
                } else {
                    repo.unlink(&clock, target, user).await.unwrap();
                }
            }

            // At most one active link per remote account
            for target in &remotes {
                let active = state
                    .links
                    .iter()
                    .filter(|record| record.unlinked.is_none() && record.remote == *target)
                    .count();
                assert!(active <= 1, "remote account {target:?} has {active} active links");
            }

            // At most one active link per (user, server) slot
            for user in &users {
                let active = state
                    .links
                    .iter()
                    .filter(|record| {
                        record.unlinked.is_none()
                            && record.user == *user
                            && record.remote.server == RemoteServer::HammerfestFr
                    })
                    .count();
                assert!(active <= 1, "user {user} has {active} active links");
            }
        }
    }
}
