//! Per-ability cooldown tracking.
//!
//! Cooldowns are informational gates. Entry points check
//! [`Cooldowns::is_ready`] before they even build an action; the arbitrator
//! itself never looks at them.
//!
//! A cooldown goes through three steps:
//! 1. [`consume`](Cooldowns::consume) when the ability's action starts playing
//!    (not ready, no timer yet),
//! 2. [`start`](Cooldowns::start) when the action ends or is cancelled
//!    (schedules a [`TimerEvent::CooldownReady`]),
//! 3. [`on_expire`](Cooldowns::on_expire) when that event fires (ready again).
//!
//! Base durations are never mutated by a start. The E cooldown is shortened
//! for dual-sword wielders by computing the effective duration per use.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CooldownTable;
use crate::timer::{Scheduler, TimerEvent, TimerToken};

/// Abilities that carry a cooldown.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    /// Q skill.
    Q,
    /// E skill (off-hand).
    E,
    /// R skill.
    R,
    /// Dash.
    Dash,
    /// Block.
    Block,
}

impl Ability {
    /// Every ability, in slot order.
    pub const ALL: [Self; 5] = [Self::Q, Self::E, Self::R, Self::Dash, Self::Block];

    /// The three skill slots.
    pub const SKILLS: [Self; 3] = [Self::Q, Self::E, Self::R];

    const fn index(self) -> usize {
        match self {
            Self::Q => 0,
            Self::E => 1,
            Self::R => 2,
            Self::Dash => 3,
            Self::Block => 4,
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Q => write!(f, "SkillQ"),
            Self::E => write!(f, "SkillE"),
            Self::R => write!(f, "SkillR"),
            Self::Dash => write!(f, "Dash"),
            Self::Block => write!(f, "Block"),
        }
    }
}

/// One ability's cooldown slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cooldown {
    base_duration: f32,
    ready: bool,
    #[serde(skip)]
    pending: Option<TimerToken>,
}

impl Cooldown {
    /// Creates a ready cooldown with the given base duration.
    #[must_use]
    pub const fn new(base_duration: f32) -> Self {
        Self {
            base_duration,
            ready: true,
            pending: None,
        }
    }

    /// Configured duration, before any equipment modifier.
    #[must_use]
    pub const fn base_duration(&self) -> f32 {
        self.base_duration
    }

    /// Whether the ability may be used.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Token of the readiness timer, if one is running.
    #[must_use]
    pub const fn pending(&self) -> Option<TimerToken> {
        self.pending
    }
}

/// Cooldown tracker for the five abilities of a combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cooldowns {
    slots: [Cooldown; 5],
    e_divisor_double_sword: f32,
}

impl Cooldowns {
    /// Creates a tracker from configured base durations. Every ability starts
    /// ready.
    #[must_use]
    pub fn new(table: &CooldownTable, e_divisor_double_sword: f32) -> Self {
        Self {
            slots: [
                Cooldown::new(table.q),
                Cooldown::new(table.e),
                Cooldown::new(table.r),
                Cooldown::new(table.dash),
                Cooldown::new(table.block),
            ],
            e_divisor_double_sword,
        }
    }

    /// Returns the slot for an ability.
    #[must_use]
    pub const fn get(&self, ability: Ability) -> &Cooldown {
        &self.slots[ability.index()]
    }

    /// Returns `true` if the ability may be used.
    #[must_use]
    pub const fn is_ready(&self, ability: Ability) -> bool {
        self.slots[ability.index()].ready
    }

    /// Configured base duration of an ability.
    #[must_use]
    pub const fn base_duration(&self, ability: Ability) -> f32 {
        self.slots[ability.index()].base_duration
    }

    /// Duration the next start of `ability` will use.
    ///
    /// Only the E cooldown depends on equipment: it is divided for dual-sword
    /// wielders.
    #[must_use]
    pub fn effective_duration(&self, ability: Ability, double_sword: bool) -> f32 {
        let base = self.base_duration(ability);
        if ability == Ability::E && double_sword && self.e_divisor_double_sword > 0.0 {
            base / self.e_divisor_double_sword
        } else {
            base
        }
    }

    /// Marks the ability used without starting its timer.
    pub fn consume(&mut self, ability: Ability) {
        self.slots[ability.index()].ready = false;
    }

    /// Marks the ability not ready and schedules its readiness.
    ///
    /// Starting a cooldown that is already running replaces its timer.
    /// Returns the duration that was scheduled.
    pub fn start(
        &mut self,
        ability: Ability,
        double_sword: bool,
        timers: &mut Scheduler<TimerEvent>,
    ) -> f32 {
        let duration = self.effective_duration(ability, double_sword);
        let slot = &mut self.slots[ability.index()];
        if let Some(previous) = slot.pending.take() {
            timers.cancel(previous);
        }
        slot.ready = false;
        slot.pending = Some(timers.schedule(f64::from(duration), TimerEvent::CooldownReady(ability)));
        tracing::debug!(%ability, duration, "cooldown started");
        duration
    }

    /// Handles an expired readiness timer.
    ///
    /// Returns `true` if `token` was the live timer and the ability became
    /// ready; a stale token is ignored.
    pub fn on_expire(&mut self, ability: Ability, token: TimerToken) -> bool {
        let slot = &mut self.slots[ability.index()];
        if slot.pending != Some(token) {
            return false;
        }
        slot.pending = None;
        slot.ready = true;
        true
    }

    /// Makes the ability ready now, cancelling its timer.
    pub fn reset(&mut self, ability: Ability, timers: &mut Scheduler<TimerEvent>) {
        let slot = &mut self.slots[ability.index()];
        if let Some(token) = slot.pending.take() {
            timers.cancel(token);
        }
        slot.ready = true;
    }

    /// Makes the ability ready now but leaves its timer running.
    pub fn mark_ready(&mut self, ability: Ability) {
        self.slots[ability.index()].ready = true;
    }

    /// Overwrites readiness flags and base durations from a replicated view.
    pub(crate) fn overwrite(&mut self, ability: Ability, base_duration: f32, ready: bool) {
        let slot = &mut self.slots[ability.index()];
        slot.base_duration = base_duration;
        slot.ready = ready;
    }
}
