//! Time-driven state: attack cooldowns, transition locks, trigger re-arm.
//!
//! Runs first in every tick across all tiers, so a lock placed on a player who
//! then changes floor still expires on schedule.

use delve_ecs::component::{Attack, ComponentTag, TransitionLock};
use delve_ecs::identity::EntityKind;
use delve_ecs::world::World;
use tracing::debug;

/// Counters from one timer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerReport {
    pub locks_expired: usize,
    pub triggers_rearmed: usize,
}

/// Advance every timer in the world by `dt` seconds.
pub fn advance_timers(world: &mut World, dt: f64) -> TimerReport {
    let mut report = TimerReport::default();

    for id in world.entities_with(&[ComponentTag::Attack], None) {
        if let Some(attack) = world.get_mut::<Attack>(id) {
            attack.remaining = (attack.remaining - dt).max(0.0);
        }
    }

    for id in world.entities_with(&[ComponentTag::TransitionLock], None) {
        let expired = match world.get_mut::<TransitionLock>(id) {
            Some(lock) => {
                lock.remaining -= dt;
                lock.remaining <= 0.0
            }
            None => false,
        };
        if expired {
            world.remove::<TransitionLock>(id);
            report.locks_expired += 1;
            debug!(entity = ?id, "transition lock expired");
        }
    }

    for id in world.entities_with(&[ComponentTag::Kind], None) {
        if let Some(EntityKind::Trigger(state)) = world.kind_mut(id) {
            if state.armed {
                continue;
            }
            state.rearm_in -= dt;
            if state.rearm_in <= 0.0 {
                state.rearm_in = 0.0;
                state.armed = true;
                report.triggers_rearmed += 1;
                debug!(entity = ?id, "trigger re-armed");
            }
        }
    }

    report
}
