//! Stamina & charge state machine (spec.md §4.6). Grounded on
//! `original_source`'s `RobotStaminaUpdater.cpp`: the `NONE -> CHARGING ->
//! FULLY` progression and the regen/charge interpolation arithmetic
//! (`scale = min(1, remainder/duration)`) are carried over verbatim, following
//! the teacher's "small `Component` with an `update(diff)` method" idiom used
//! for its own per-unit timers.

use crate::components::{NotifyFlags, Timer, WorldObjectHeader};
use crate::config::{SimConfig, STAMINA_SYNC_INTERVAL_MS};
use crate::protocol::{StaminaInfo, STAMINA_FLAG_ATTACK, STAMINA_FLAG_CHARGING};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChargeState {
    #[default]
    None,
    Charging,
    Fully,
}

/// Which event the next due sync broadcast should be attributed to:
/// periodic regen/charge progress, or an attack that just landed
/// (`sendSyncStamina(STAMINA_FLAG_ATTACK)` vs the plain periodic sync in
/// `RobotStaminaUpdater.cpp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SyncTrigger {
    #[default]
    Charging,
    Attack,
}

/// Per-robot stamina ledger. `diff_stamina == 0` means "nothing in progress"
/// (neither regenerating nor charging), matching the source's sentinel use
/// of the same field for both purposes.
#[derive(Component, Debug, Clone)]
pub struct StaminaState {
    pub stamina: i32,
    pub max_stamina: i32,
    /// Fraction of max_stamina regenerated per second.
    pub regen_rate: f32,
    pub charge_consumes_stamina: i32,
    pub attack_takes_stamina: i32,
    pub charge_state: ChargeState,
    pub charge_start_stamina: i32,
    pub charged_stamina: i32,
    start_stamina: i32,
    diff_stamina: i32,
    stamina_timer: Timer,
    sync_timer: Timer,
    pub attack_counter: u32,
    pub charge_counter: u32,
    pub consumed_stamina_total: u32,
    sync_trigger: SyncTrigger,
}

impl StaminaState {
    pub fn new(max_stamina: i32, regen_rate: f32, charge_consumes_stamina: i32, attack_takes_stamina: i32) -> Self {
        Self {
            stamina: max_stamina,
            max_stamina,
            regen_rate,
            charge_consumes_stamina,
            attack_takes_stamina,
            charge_state: ChargeState::None,
            charge_start_stamina: 0,
            charged_stamina: 0,
            start_stamina: 0,
            diff_stamina: 0,
            stamina_timer: Timer::default(),
            sync_timer: Timer::with_duration(STAMINA_SYNC_INTERVAL_MS as u64),
            attack_counter: 0,
            charge_counter: 0,
            consumed_stamina_total: 0,
            sync_trigger: SyncTrigger::Charging,
        }
    }

    pub fn can_attack(&self) -> bool {
        match self.charge_state {
            ChargeState::None => self.stamina >= self.attack_takes_stamina,
            ChargeState::Fully => true,
            ChargeState::Charging => false,
        }
    }

    /// Begin a charge-up. No-op if already charging/fully charged.
    pub fn charge(&mut self) {
        if self.charge_state != ChargeState::None {
            return;
        }
        self.stop_regen();
        self.start_stamina = self.stamina;
        self.diff_stamina = -self.start_stamina;
        self.stamina_timer = Timer::with_duration(self.charge_duration_ms(self.start_stamina));
        self.charge_start_stamina = self.start_stamina;
        self.charge_state = ChargeState::Charging;
        self.charge_counter = self.charge_counter.wrapping_add(1);
        self.sync_trigger = SyncTrigger::Charging;
        self.sync_timer.reset();
    }

    fn charge_duration_ms(&self, stamina: i32) -> u64 {
        if self.charge_consumes_stamina <= 0 {
            return 0;
        }
        ((stamina as f32 / self.charge_consumes_stamina as f32) * 1000.0).max(0.0) as u64
    }

    /// Release a charge: stop charging (discarding any in-flight charge
    /// interpolation) and fall back to regen.
    pub fn charge_stop(&mut self) {
        if self.charge_state == ChargeState::None {
            return;
        }
        self.sync_timer.reset();
        self.sync_trigger = SyncTrigger::Charging;
        self.start_regen();
    }

    fn stop_regen(&mut self) {
        if self.diff_stamina <= 0 {
            return;
        }
        self.diff_stamina = 0;
        self.start_stamina = 0;
        self.stamina_timer.reset();
    }

    fn stop_charge_progress(&mut self) {
        if self.charge_state == ChargeState::None {
            return;
        }
        self.charge_start_stamina = 0;
        self.charged_stamina = 0;
        self.charge_state = ChargeState::None;
        self.diff_stamina = 0;
        self.start_stamina = 0;
        self.stamina_timer.reset();
    }

    pub fn start_regen(&mut self) {
        self.stop_charge_progress();
        self.stop_regen();
        if self.stamina >= self.max_stamina {
            return;
        }
        let diff = self.max_stamina - self.stamina;
        let duration = if self.regen_rate > 0.0 && self.max_stamina > 0 {
            ((diff as f32 / (self.regen_rate * self.max_stamina as f32)) * 1000.0) as u64
        } else {
            0
        };
        self.stamina_timer = Timer::with_duration(duration);
        self.diff_stamina = diff;
        self.start_stamina = self.stamina;
    }

    /// Spend stamina on an attack and immediately begin regenerating.
    pub fn deduct_for_attack(&mut self, consumed: i32) {
        if self.charge_state != ChargeState::None {
            self.sync_timer.reset();
        }
        self.stamina = (self.stamina - consumed).max(0);
        self.consumed_stamina_total = self.consumed_stamina_total.saturating_add(consumed.max(0) as u32);
        self.attack_counter = self.attack_counter.wrapping_add(1);
        self.start_regen();
        self.sync_trigger = SyncTrigger::Attack;
    }

    fn remainder_ms(&self) -> u64 {
        self.stamina_timer.duration_ms.saturating_sub(self.stamina_timer.current_ms)
    }

    fn update_stamina(&mut self, diff_ms: u64) {
        self.stamina_timer.update(diff_ms);
        let scale = if self.stamina_timer.duration_ms > 0 {
            (self.remainder_ms() as f32 / self.stamina_timer.duration_ms as f32).min(1.0)
        } else {
            0.0
        };
        let new_stamina = self.start_stamina + (self.diff_stamina as f32 * (1.0 - scale)) as i32;
        self.stamina = new_stamina;
        if self.charge_state == ChargeState::Charging {
            self.charged_stamina = self.start_stamina - new_stamina;
        }
        if self.stamina_timer.passed() {
            if self.charge_state == ChargeState::Charging {
                self.charge_state = ChargeState::Fully;
            }
            self.diff_stamina = 0;
            self.start_stamina = 0;
            self.stamina_timer.reset();
            self.sync_timer.set_passed();
        }
    }

    /// Advance one tick. Returns `Some(extra_flags)` when a sync broadcast is
    /// due this tick (spec.md §4.6: periodic 200ms sync while regenerating or
    /// charging); `extra_flags` is `STAMINA_FLAG_ATTACK` when this sync is
    /// due to an attack deduction rather than plain charge/regen progress,
    /// matching `sendSyncStamina(STAMINA_FLAG_ATTACK)` vs the source's plain
    /// periodic sync call.
    pub fn tick(&mut self, diff_ms: u64) -> Option<u32> {
        if self.diff_stamina == 0 {
            return None;
        }
        if self.charge_state == ChargeState::None {
            self.update_stamina(diff_ms);
            None
        } else {
            let sync_remainder = self.sync_timer.duration_ms.saturating_sub(self.sync_timer.current_ms);
            let elapsed = self.sync_timer.current_ms + diff_ms;
            let update_dt = if elapsed + sync_remainder >= self.sync_timer.duration_ms {
                sync_remainder
            } else {
                diff_ms
            };
            self.update_stamina(update_dt);
            self.sync_timer.update(diff_ms);
            if self.sync_timer.passed() {
                self.sync_timer.reset();
                let extra_flags = match self.sync_trigger {
                    SyncTrigger::Attack => STAMINA_FLAG_ATTACK,
                    SyncTrigger::Charging => 0,
                };
                self.sync_trigger = SyncTrigger::Charging;
                Some(extra_flags)
            } else {
                None
            }
        }
    }

    pub fn to_wire(&self, guid: u32, counter: u32, time_ms: i32) -> StaminaInfo {
        let mut flags = 0;
        if self.charge_state != ChargeState::None {
            flags |= STAMINA_FLAG_CHARGING;
        }
        StaminaInfo {
            guid,
            counter,
            flags,
            stamina: self.stamina,
            max_stamina: self.max_stamina,
            stamina_regen_rate: self.regen_rate,
            charge_start_stamina: self.charge_start_stamina,
            charged_stamina: self.charged_stamina,
            charge_consumes_stamina: self.charge_consumes_stamina,
            charge_counter: self.charge_counter,
            time: time_ms,
            attack_counter: self.attack_counter,
            consumed_stamina_total: self.consumed_stamina_total,
            attack_info_counter: self.attack_counter,
        }
    }
}

/// Pending stamina syncs collected by `stamina_update_system`, flushed by
/// the housekeeping phase (spec.md §2 group 5) alongside the regular delta
/// batches.
#[derive(Resource, Debug, Default)]
pub struct StaminaSyncQueue {
    pub pending: HashMap<Entity, (StaminaInfo, u32)>,
}

pub fn stamina_update_system(
    config: Res<SimConfig>,
    mut queue: ResMut<StaminaSyncQueue>,
    mut units: Query<(Entity, &mut StaminaState, &mut WorldObjectHeader)>,
) {
    let diff_ms = (config.fixed_timestep * 1000.0) as u64;
    for (entity, mut stamina, mut header) in units.iter_mut() {
        if let Some(extra_flags) = stamina.tick(diff_ms) {
            let mut wire = stamina.to_wire(header.guid.raw(), 0, 0);
            wire.flags |= extra_flags;
            queue.pending.insert(entity, (wire, wire.flags));
            header.notify_flags.set(NotifyFlags::VISIBILITY_CHANGED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charging_fully_charges_after_full_duration() {
        let mut s = StaminaState::new(100, 0.1, 50, 10);
        s.charge();
        assert_eq!(s.charge_state, ChargeState::Charging);
        // duration = 100/50*1000 = 2000ms
        s.tick(2000);
        assert_eq!(s.charge_state, ChargeState::Fully);
        assert_eq!(s.stamina, 0);
    }

    #[test]
    fn charge_stop_midway_falls_back_to_regen() {
        let mut s = StaminaState::new(100, 0.1, 50, 10);
        s.charge();
        s.tick(1000); // half the 2000ms duration: stamina ~50
        assert!(s.stamina < 100 && s.stamina > 0);
        s.charge_stop();
        assert_eq!(s.charge_state, ChargeState::None);
        assert!(s.diff_stamina > 0 || s.stamina >= s.max_stamina);
    }

    #[test]
    fn attack_deducts_stamina_then_regenerates_to_max() {
        let mut s = StaminaState::new(100, 0.5, 50, 10);
        assert!(s.can_attack());
        s.deduct_for_attack(10);
        assert_eq!(s.stamina, 90);
        // regen duration for 10/(0.5*100)*1000 = 200ms
        s.tick(200);
        assert_eq!(s.stamina, 100);
    }

    #[test]
    fn cannot_attack_while_charging_unless_fully_charged() {
        let mut s = StaminaState::new(100, 0.1, 100, 10);
        s.charge();
        assert!(!s.can_attack());
        s.tick(1000); // full duration: 100/100*1000 = 1000ms
        assert_eq!(s.charge_state, ChargeState::Fully);
        assert!(s.can_attack());
    }
}
