//! Friend/block state for the profile being viewed.
//!
//! The tracker owns the displayed [`RelationshipState`] and publishes it on a
//! watch channel. Mutations are applied optimistically and rolled back on
//! failure; only one mutation per target may be in flight.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::error::{PortalError, Result};
use crate::model::RelationshipStatus;
use crate::notify::Notifier;

/// Remote operations the tracker needs.
#[async_trait]
pub trait RelationshipApi: Send + Sync {
    async fn relationship(&self, target_id: u32) -> Result<RelationshipStatus>;
    async fn add_friend(&self, target_id: u32) -> Result<()>;
    async fn remove_friend(&self, target_id: u32) -> Result<()>;
    async fn block(&self, target_id: u32) -> Result<()>;
    async fn unblock(&self, target_id: u32) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RelationshipAction {
    AddFriend,
    RemoveFriend,
    Block,
    Unblock,
}

impl RelationshipAction {
    /// The state the server is expected to end up in.
    fn apply(self, status: &mut RelationshipStatus) {
        match self {
            RelationshipAction::AddFriend => {
                status.is_friend = true;
                status.is_blocked = false;
                status.is_mutual = status.follows_me;
            }
            RelationshipAction::RemoveFriend => {
                status.is_friend = false;
                status.is_mutual = false;
            }
            RelationshipAction::Block => {
                status.is_blocked = true;
                status.is_friend = false;
                status.is_mutual = false;
            }
            RelationshipAction::Unblock => status.is_blocked = false,
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            RelationshipAction::AddFriend => "Friend added",
            RelationshipAction::RemoveFriend => "Friend removed",
            RelationshipAction::Block => "User blocked",
            RelationshipAction::Unblock => "User unblocked",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipState {
    pub target_id: Option<u32>,
    pub acting_id: Option<u32>,
    pub status: RelationshipStatus,
    pub loading: bool,
    /// The viewer is looking at their own profile.
    pub is_self: bool,
}

pub struct RelationshipTracker {
    api: Arc<dyn RelationshipApi>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<RelationshipState>,
    generation: AtomicU64,
    loaded: Mutex<Option<(u32, Option<u32>)>>,
    in_flight: Mutex<HashSet<u32>>,
}

/// Releases a target's in-flight slot, also when the mutation future is
/// dropped half way.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<u32>>,
    target_id: u32,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.target_id);
        }
    }
}

impl RelationshipTracker {
    pub fn new(api: Arc<dyn RelationshipApi>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _rx) = watch::channel(RelationshipState::default());
        Self {
            api,
            notifier,
            state,
            generation: AtomicU64::new(0),
            loaded: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn state(&self) -> RelationshipState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RelationshipState> {
        self.state.subscribe()
    }

    /// Load the relationship between `acting_id` (the logged-in user, if
    /// any) and `target_id`. Fetches once per identity pair; use
    /// [`Self::reload`] to force a fetch.
    pub async fn load(&self, target_id: u32, acting_id: Option<u32>) -> Result<RelationshipState> {
        let already = self
            .loaded
            .lock()
            .map(|loaded| *loaded == Some((target_id, acting_id)))
            .unwrap_or(false);
        if already {
            return Ok(self.state());
        }
        self.reload(target_id, acting_id).await
    }

    #[instrument(skip(self))]
    pub async fn reload(
        &self,
        target_id: u32,
        acting_id: Option<u32>,
    ) -> Result<RelationshipState> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_loaded(None);

        if acting_id == Some(target_id) {
            self.state.send_replace(RelationshipState {
                target_id: Some(target_id),
                acting_id,
                is_self: true,
                ..RelationshipState::default()
            });
            self.set_loaded(Some((target_id, acting_id)));
            return Ok(self.state());
        }

        self.state.send_replace(RelationshipState {
            target_id: Some(target_id),
            acting_id,
            loading: true,
            ..RelationshipState::default()
        });

        let result = self.api.relationship(target_id).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(target_id, "discarding stale relationship load");
            return Ok(self.state());
        }

        match result {
            Ok(status) => {
                self.state.send_modify(|state| {
                    state.status = status;
                    state.loading = false;
                });
            }
            Err(PortalError::SelfRelationship) => {
                self.state.send_modify(|state| {
                    state.is_self = true;
                    state.loading = false;
                });
            }
            Err(e) => {
                self.state.send_modify(|state| state.loading = false);
                self.notifier.error(&e.user_message());
                return Err(e);
            }
        }
        self.set_loaded(Some((target_id, acting_id)));
        Ok(self.state())
    }

    pub async fn add_friend(&self) -> Result<()> {
        self.mutate(RelationshipAction::AddFriend).await
    }

    pub async fn remove_friend(&self) -> Result<()> {
        self.mutate(RelationshipAction::RemoveFriend).await
    }

    pub async fn block(&self) -> Result<()> {
        self.mutate(RelationshipAction::Block).await
    }

    pub async fn unblock(&self) -> Result<()> {
        self.mutate(RelationshipAction::Unblock).await
    }

    #[instrument(skip(self))]
    async fn mutate(&self, action: RelationshipAction) -> Result<()> {
        let current = self.state();
        let target_id = current.target_id.ok_or(PortalError::NoTarget)?;
        if current.is_self {
            return Err(PortalError::SelfRelationship);
        }
        let _slot = self.claim(target_id)?;
        let generation = self.generation.load(Ordering::SeqCst);
        let previous = current.status;

        self.state.send_modify(|state| action.apply(&mut state.status));

        let result = match action {
            RelationshipAction::AddFriend => self.api.add_friend(target_id).await,
            RelationshipAction::RemoveFriend => self.api.remove_friend(target_id).await,
            RelationshipAction::Block => self.api.block(target_id).await,
            RelationshipAction::Unblock => self.api.unblock(target_id).await,
        };
        let current_target = self.generation.load(Ordering::SeqCst) == generation;

        if let Err(e) = result {
            warn!(target_id, %action, error = %e, "relationship change failed, rolling back");
            if current_target {
                self.state.send_modify(|state| state.status = previous);
            }
            self.notifier.error(&e.user_message());
            return Err(e);
        }

        match self.api.relationship(target_id).await {
            Ok(status) if self.generation.load(Ordering::SeqCst) == generation => {
                self.state.send_modify(|state| state.status = status);
            }
            Ok(_) => debug!(target_id, "target changed, dropping refreshed status"),
            Err(e) => warn!(target_id, error = %e, "could not refresh relationship"),
        }
        self.notifier.success(action.success_message());
        Ok(())
    }

    fn claim(&self, target_id: u32) -> Result<InFlight<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| PortalError::MutationInFlight { target_id })?;
        if !set.insert(target_id) {
            debug!(target_id, "rejecting concurrent relationship change");
            return Err(PortalError::MutationInFlight { target_id });
        }
        Ok(InFlight {
            set: &self.in_flight,
            target_id,
        })
    }

    fn set_loaded(&self, identity: Option<(u32, Option<u32>)>) {
        if let Ok(mut loaded) = self.loaded.lock() {
            *loaded = identity;
        }
    }
}
