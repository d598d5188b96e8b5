//! Publish/subscribe channel between the collision core and its consumers.
//!
//! Responders never call rendering, audio or narrative code directly. They
//! [`emit`](EventBus::emit) a [`GameEvent`]; subscribers registered with
//! [`on`](EventBus::on) run synchronously, in registration order. Every
//! emitted event is also kept in a per-tick log so the tick loop's caller can
//! drain what happened without subscribing.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use delve_ecs::entity::EntityId;
//! use delve_engine::events::{EventBus, EventKind, GameEvent};
//!
//! let mut bus = EventBus::new();
//! let seen = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&seen);
//! let id = bus.on(EventKind::RemovalRequested, move |_| counter.set(counter.get() + 1));
//!
//! bus.emit(GameEvent::RemovalRequested { entity: EntityId::new(3) });
//! assert_eq!(seen.get(), 1);
//!
//! assert!(bus.off(EventKind::RemovalRequested, id));
//! bus.emit(GameEvent::RemovalRequested { entity: EntityId::new(4) });
//! assert_eq!(seen.get(), 1);
//! assert_eq!(bus.drain().len(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use delve_ecs::entity::EntityId;
use delve_ecs::identity::Tier;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// Name of an event, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    MeleeAttack,
    TriggerFired,
    StairLocked,
    TierTransitionRequested,
    PortalTransitionRequested,
    DamageRequested,
    HitEffect,
    RemovalRequested,
    LootPickedUp,
    FountainUsed,
    AggroSpread,
}

/// Something gameplay-relevant that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// The player struck an adjacent monster.
    MeleeAttack { attacker: EntityId, target: EntityId },
    TriggerFired {
        trigger: EntityId,
        activator: EntityId,
        action: String,
    },
    /// The player touched a stair that cannot be used yet.
    StairLocked { player: EntityId, stair: EntityId },
    TierTransitionRequested {
        player: EntityId,
        stair: EntityId,
        from: Tier,
        to: Tier,
    },
    PortalTransitionRequested {
        player: EntityId,
        portal: EntityId,
        destination: Tier,
    },
    /// A projectile struck a hostile target. Damage is computed downstream.
    DamageRequested {
        source: EntityId,
        projectile: EntityId,
        target: EntityId,
        weapon: Option<String>,
    },
    HitEffect {
        projectile: EntityId,
        target: EntityId,
        x: f64,
        y: f64,
    },
    /// The entity was flagged and will be despawned at the end of the tick.
    RemovalRequested { entity: EntityId },
    LootPickedUp {
        player: EntityId,
        loot: EntityId,
        item: String,
    },
    FountainUsed {
        player: EntityId,
        fountain: EntityId,
        charges_left: u32,
    },
    AggroSpread { from: EntityId, to: EntityId },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::MeleeAttack { .. } => EventKind::MeleeAttack,
            GameEvent::TriggerFired { .. } => EventKind::TriggerFired,
            GameEvent::StairLocked { .. } => EventKind::StairLocked,
            GameEvent::TierTransitionRequested { .. } => EventKind::TierTransitionRequested,
            GameEvent::PortalTransitionRequested { .. } => EventKind::PortalTransitionRequested,
            GameEvent::DamageRequested { .. } => EventKind::DamageRequested,
            GameEvent::HitEffect { .. } => EventKind::HitEffect,
            GameEvent::RemovalRequested { .. } => EventKind::RemovalRequested,
            GameEvent::LootPickedUp { .. } => EventKind::LootPickedUp,
            GameEvent::FountainUsed { .. } => EventKind::FountainUsed,
            GameEvent::AggroSpread { .. } => EventKind::AggroSpread,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&GameEvent)>;

#[derive(Default)]
pub struct EventBus {
    handlers: BTreeMap<EventKind, Vec<(HandlerId, Handler)>>,
    next_handler: u64,
    log: Vec<GameEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<EventKind, usize> =
            self.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus")
            .field("handlers", &counts)
            .field("pending", &self.log.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events of `kind`.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&GameEvent) + 'static) -> HandlerId {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Unsubscribe. Returns `false` if `id` was not subscribed to `kind`.
    pub fn off(&mut self, kind: EventKind, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        list.len() != before
    }

    /// Deliver `event` to its subscribers and append it to the log.
    pub fn emit(&mut self, event: GameEvent) {
        tracing::debug!(kind = ?event.kind(), "event emitted");
        if let Some(list) = self.handlers.get_mut(&event.kind()) {
            for (_, handler) in list.iter_mut() {
                handler(&event);
            }
        }
        self.log.push(event);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Events emitted since the last drain, oldest first.
    pub fn pending(&self) -> &[GameEvent] {
        &self.log
    }

    /// Take the event log.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.log)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
