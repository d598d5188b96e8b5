//! Tier-transition bookkeeping kept outside the component store.
//!
//! At most one transition may be pending. Responders request one; the game
//! (level loading, fade-out, whatever lives downstream) later resolves or
//! cancels it through the tick loop.

use delve_ecs::entity::EntityId;
use delve_ecs::identity::Tier;
use serde::{Deserialize, Serialize};

/// What the player used to leave the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionVia {
    Stair(EntityId),
    Portal(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransition {
    pub player: EntityId,
    pub from: Tier,
    pub to: Tier,
    pub via: TransitionVia,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionState {
    pending: Option<PendingTransition>,
    /// Deepest tier the player has reached so far.
    highest_tier: Tier,
}

impl TransitionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    /// Record a transition request. Returns `false`, leaving the existing
    /// request untouched, if one is already pending.
    pub fn request(&mut self, transition: PendingTransition) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(transition);
        true
    }

    /// Clear and return the pending transition.
    pub fn take(&mut self) -> Option<PendingTransition> {
        self.pending.take()
    }

    pub fn highest_tier(&self) -> Tier {
        self.highest_tier
    }

    /// Raise the deepest-reached tier. Never lowers it.
    pub fn reach(&mut self, tier: Tier) {
        self.highest_tier = self.highest_tier.max(tier);
    }
}
