// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

use async_trait::async_trait;
use etwin_data_model::{Clock, User};
use etwin_storage::user::UserRepository;
use rand_core::RngCore;
use ulid::Ulid;

use crate::{MemStorageError, State};

/// An implementation of [`UserRepository`] working on an in-memory state
/// snapshot
pub(crate) struct MemUserRepository<'c> {
    state: &'c mut State,
}

impl<'c> MemUserRepository<'c> {
    pub(crate) fn new(state: &'c mut State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl UserRepository for MemUserRepository<'_> {
    type Error = MemStorageError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<User>, Self::Error> {
        Ok(self.state.users.get(&id).cloned())
    }

    async fn find_by_display_name(
        &mut self,
        display_name: &str,
    ) -> Result<Option<User>, Self::Error> {
        Ok(self
            .state
            .users
            .values()
            .find(|user| user.display_name == display_name)
            .cloned())
    }

    #[tracing::instrument(name = "mem.user.add", skip_all, fields(user.id))]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        display_name: String,
    ) -> Result<User, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("user.id", tracing::field::display(id));

        let user = User {
            id,
            display_name,
            created_at,
        };
        self.state.users.insert(id, user.clone());
        Ok(user)
    }
}
