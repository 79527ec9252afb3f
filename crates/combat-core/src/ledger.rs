//! Boundary to the per-entity stat and effect ledger.
//!
//! The combat core does not own health, stats or effect stacks. It asks the
//! ledger of an entity (reached through [`World::ledger`](crate::world::World::ledger))
//! to apply effects, buffs and damage, and reads final damage stats back.
//!
//! Damage received is reported the other way: whoever owns the ledger calls
//! [`Combatant::on_damaged`](crate::combatant::Combatant::on_damaged) on the
//! authority.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Handle to an effect applied to a ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(pub u64);

/// Effects the combat core applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Damage guard while blocking.
    Guard {
        /// Seconds the guard protects.
        duration: f32,
    },
    /// Damage-absorbing barrier.
    Barrier {
        /// Who granted it.
        instigator: EntityId,
        /// Absorption amount.
        amount: f32,
    },
    /// Movement speed bonus while stealthed.
    StealthHaste {
        /// Bonus fraction (0.3 = +30%).
        percent: f32,
    },
    /// Movement slow.
    Slow {
        /// Who applied it.
        source: EntityId,
        /// Name of the skill that applied it.
        skill: String,
        /// Slow fraction.
        magnitude: f32,
        /// Seconds it lasts.
        duration: f32,
    },
}

impl Effect {
    /// Name of the guard effect, used to find and remove it.
    pub const GUARD: &'static str = "PlayerGuard";
    /// Name of the stealth haste effect.
    pub const STEALTH_HASTE: &'static str = "StealthHeist";
    /// Name of the barrier effect.
    pub const BARRIER: &'static str = "Barrier";
    /// Name of the slow effect.
    pub const SLOW: &'static str = "Slow";

    /// Name the ledger files this effect under.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Guard { .. } => Self::GUARD,
            Self::Barrier { .. } => Self::BARRIER,
            Self::StealthHaste { .. } => Self::STEALTH_HASTE,
            Self::Slow { .. } => Self::SLOW,
        }
    }
}

/// Fixed buffs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuffKind {
    /// Magic crystal buff granted with a barrier.
    MagicCrystal,
    /// Stronger magic crystal buff granted by magic-wand wielders.
    UpMagicCrystal,
    /// Target takes 10% more damage.
    IncreasedDamageTaken10,
}

/// Damage stat lines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageKind {
    /// Attack damage.
    #[default]
    Ad,
    /// Ability power.
    Ap,
}

impl fmt::Display for DamageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ad => write!(f, "AD"),
            Self::Ap => write!(f, "AP"),
        }
    }
}

/// Source category of damage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttackType {
    /// Basic attack. Triggers on-hit notifications.
    #[default]
    NormalAttack,
    /// Skill damage.
    Skill,
    /// Anything else (traps, environment).
    Other,
}

/// Attributes the core reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Maximum health.
    MaxHealth,
    /// Current health.
    Health,
}

/// Damage delivered to a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Attacker.
    pub instigator: EntityId,
    /// Stat line.
    pub kind: DamageKind,
    /// Final amount.
    pub amount: f32,
    /// Whether the hit knocks back.
    pub knockback: bool,
    /// Source category.
    pub attack_type: AttackType,
    /// Skill name, empty for basic attacks.
    pub skill_name: String,
}

/// Per-entity stat and effect store.
pub trait StatLedger {
    /// Applies an effect and returns its handle.
    fn apply_effect(&mut self, effect: Effect) -> EffectId;

    /// Removes an effect. Returns `false` if it was not present.
    fn remove_effect(&mut self, id: EffectId) -> bool;

    /// Finds an active effect by name.
    fn find_effect_by_name(&self, name: &str) -> Option<EffectId>;

    /// Applies a fixed buff.
    fn apply_buff(&mut self, buff: BuffKind);

    /// Final damage stat after all modifiers.
    fn final_damage(&self, kind: DamageKind) -> f32;

    /// Current value of an attribute.
    fn current_value(&self, attribute: AttributeKind) -> f32;

    /// Delivers damage.
    fn apply_damage(&mut self, event: DamageEvent);
}

/// Removes the first effect filed under `name`, if any.
pub fn remove_effect_by_name(ledger: &mut dyn StatLedger, name: &str) -> bool {
    ledger
        .find_effect_by_name(name)
        .is_some_and(|id| ledger.remove_effect(id))
}
