//! Typed action handlers, equipment and presentation assets.
//!
//! [`Behavior`] is the closed set of handlers a combatant binds into its
//! arbitrator. Each variant knows which lifecycle phases it supports; a
//! request naming an unsupported phase is an invalid action definition.
//!
//! This module also holds the play / cancel / end handlers of the voluntary
//! actions (attack, dash, skills, block). Crowd-control handlers live in
//! `crowd_control`, off-hand skills in `offhand`.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind, HandlerPhase, Priority};
use crate::cooldown::Ability;
use crate::entity::EntityId;
use crate::error::CombatError;
use crate::ledger::{self, Effect};
use crate::net::Notification;
use crate::status::StatusFlags;
use crate::timer::TimerEvent;
use crate::world::World;

use super::offhand::OffhandState;
use super::CombatState;

// =============================================================================
// Behavior
// =============================================================================

/// Handlers a combatant can bind into its current-action slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// Basic attack.
    Attack,
    /// Directional dash.
    Dash,
    /// Q skill.
    SkillQ,
    /// E skill (off-hand).
    SkillE,
    /// R skill.
    SkillR,
    /// Guard stance.
    Block,
    /// Stun.
    Stun,
    /// Small knockback.
    Knockback,
    /// Big knockback.
    BigKnockback,
    /// Death.
    Dead,
}

impl Behavior {
    /// Returns `true` if this behavior has a handler for `phase`.
    ///
    /// Death only plays. Crowd control plays and ends; it is never cancelled
    /// through a handler.
    #[must_use]
    pub const fn supports(self, phase: HandlerPhase) -> bool {
        match self {
            Self::Dead => matches!(phase, HandlerPhase::Play),
            Self::Stun | Self::Knockback | Self::BigKnockback => {
                matches!(phase, HandlerPhase::Play | HandlerPhase::End)
            }
            Self::Attack
            | Self::Dash
            | Self::SkillQ
            | Self::SkillE
            | Self::SkillR
            | Self::Block => true,
        }
    }

    /// Ability whose cooldown this behavior consumes.
    #[must_use]
    pub const fn ability(self) -> Option<Ability> {
        match self {
            Self::Dash => Some(Ability::Dash),
            Self::SkillQ => Some(Ability::Q),
            Self::SkillE => Some(Ability::E),
            Self::SkillR => Some(Ability::R),
            Self::Block => Some(Ability::Block),
            Self::Attack | Self::Stun | Self::Knockback | Self::BigKnockback | Self::Dead => None,
        }
    }

    /// The canonical action for this behavior, owned by `owner`.
    #[must_use]
    pub fn action(self, owner: EntityId) -> Action<Self> {
        let (kind, priority, name) = match self {
            Self::Attack => (ActionKind::Attacking, Priority::ATTACK, "Attack"),
            Self::Dash => (ActionKind::Skill, Priority::DASH, "Dash"),
            Self::SkillQ => (ActionKind::Skill, Priority::SKILL, "SkillQ"),
            Self::SkillE => (ActionKind::Skill, Priority::SKILL, "SkillE"),
            Self::SkillR => (ActionKind::Skill, Priority::SKILL, "SkillR"),
            Self::Block => (ActionKind::Block, Priority::BLOCK, "Block"),
            Self::Stun => (ActionKind::CrowdControl, Priority::CROWD_CONTROL, "Stun"),
            Self::BigKnockback => (ActionKind::CrowdControl, Priority::CROWD_CONTROL, "BigKnockback"),
            Self::Knockback => (ActionKind::SmallKnockback, Priority::KNOCKBACK, "Knockback"),
            Self::Dead => (ActionKind::Dead, Priority::DEAD, "Dead"),
        };
        let action = Action::new(owner, kind, self, priority).named(name);
        if self.supports(HandlerPhase::Cancel) {
            action.with_cancel(self).with_end(self)
        } else if self.supports(HandlerPhase::End) {
            action.with_end(self)
        } else {
            action
        }
    }
}

// =============================================================================
// Input and equipment
// =============================================================================

/// Eight-way dash direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DashDirection {
    /// Forward.
    #[default]
    Front,
    /// Backward.
    Back,
    /// Left.
    Left,
    /// Right.
    Right,
    /// Forward-left.
    FrontLeft,
    /// Forward-right.
    FrontRight,
    /// Backward-left.
    BackLeft,
    /// Backward-right.
    BackRight,
}

impl DashDirection {
    /// Resolves held movement keys. Diagonals win over single keys; no key
    /// dashes forward.
    #[must_use]
    pub const fn from_input(forward: bool, back: bool, left: bool, right: bool) -> Self {
        match (forward, back, left, right) {
            (true, _, true, _) => Self::FrontLeft,
            (true, _, _, true) => Self::FrontRight,
            (_, true, true, _) => Self::BackLeft,
            (_, true, _, true) => Self::BackRight,
            (_, _, true, _) => Self::Left,
            (_, _, _, true) => Self::Right,
            (_, true, _, _) => Self::Back,
            _ => Self::Front,
        }
    }

    /// Slot of this direction in [`MontageSet::dash`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Front => 0,
            Self::Back => 1,
            Self::Left => 2,
            Self::Right => 3,
            Self::FrontLeft => 4,
            Self::FrontRight => 5,
            Self::BackLeft => 6,
            Self::BackRight => 7,
        }
    }
}

/// Which input confirmed an armed skill.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillCommand {
    /// Q key.
    Q,
    /// E key.
    E,
    /// R key.
    R,
    /// Attack button.
    Attack,
}

/// Main-hand weapon.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeaponMode {
    /// Bare hands.
    #[default]
    NoWeapon,
    /// One-handed sword.
    Sword,
    /// Two-handed sword.
    GreatSword,
    /// Dual swords. Shortens the E cooldown and doubles stealth haste.
    DoubleSword,
    /// Bow.
    Bow,
    /// Magic wand. Upgrades the barrier buff.
    MagicWand,
}

/// Off-hand equipment. Selects what the E skill does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubWeaponMode {
    /// Nothing.
    #[default]
    NoWeapon,
    /// Provokes nearby monsters.
    Shield,
    /// Stealth.
    Sword,
    /// Aimed barrier.
    MagicOrb,
    /// Gravity projectile.
    MagicWand,
    /// Dark-orb ground field.
    DarkMagicOrb,
}

/// Equipped weapons.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Loadout {
    /// Main hand.
    pub weapon: WeaponMode,
    /// Off hand.
    pub sub_weapon: SubWeaponMode,
}

impl Loadout {
    /// Returns `true` for dual-sword wielders.
    #[must_use]
    pub fn double_sword(self) -> bool {
        self.weapon == WeaponMode::DoubleSword
    }
}

/// Animation montage names per ability. An empty entry is a missing asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MontageSet {
    /// Attack combo montages; the first one is required to attack.
    pub attack: Vec<String>,
    /// Dash montages, indexed by [`DashDirection::index`].
    pub dash: [Option<String>; 8],
    /// Q skill.
    pub skill_q: Option<String>,
    /// E skill.
    pub skill_e: Option<String>,
    /// R skill.
    pub skill_r: Option<String>,
    /// Guard stance.
    pub block: Option<String>,
    /// Stun loop.
    pub stun: Option<String>,
    /// Small knockback variants.
    pub knockback: Vec<String>,
    /// Big knockback.
    pub big_knockback: Option<String>,
}

impl MontageSet {
    /// Section the dash montages jump to.
    pub const DASH_SECTION: &'static str = "Roll";
    /// Section an armed skill montage jumps to on confirm.
    pub const CONFIRM_SECTION: &'static str = "End";

    /// A set with a montage for every slot, named after the slot.
    #[must_use]
    pub fn complete() -> Self {
        let dash = [
            "Dash_F", "Dash_B", "Dash_L", "Dash_R", "Dash_FL", "Dash_FR", "Dash_BL", "Dash_BR",
        ]
        .map(|name| Some(name.to_string()));
        Self {
            attack: vec!["Attack".to_string()],
            dash,
            skill_q: Some("SkillQ".to_string()),
            skill_e: Some("SkillE".to_string()),
            skill_r: Some("SkillR".to_string()),
            block: Some("Block".to_string()),
            stun: Some("Stun".to_string()),
            knockback: vec!["Knockback_0".to_string(), "Knockback_1".to_string()],
            big_knockback: Some("BigKnockback".to_string()),
        }
    }

    /// Montage for a skill slot.
    #[must_use]
    pub fn skill(&self, ability: Ability) -> Option<&str> {
        match ability {
            Ability::Q => self.skill_q.as_deref(),
            Ability::E => self.skill_e.as_deref(),
            Ability::R => self.skill_r.as_deref(),
            Ability::Dash | Ability::Block => None,
        }
    }

    /// Montage for a dash direction.
    #[must_use]
    pub fn dash(&self, direction: DashDirection) -> Option<&str> {
        self.dash[direction.index()].as_deref()
    }
}

// =============================================================================
// Voluntary action handlers
// =============================================================================

const fn skill_flag(ability: Ability) -> StatusFlags {
    match ability {
        Ability::Q => StatusFlags::SKILL_Q,
        Ability::E => StatusFlags::SKILL_E,
        Ability::R => StatusFlags::SKILL_R,
        Ability::Dash => StatusFlags::DASHING,
        Ability::Block => StatusFlags::BLOCKING,
    }
}

impl CombatState {
    /// Fails the way the matching `play_*` would, without touching state.
    pub(super) fn check_play(&self, behavior: Behavior) -> Result<(), CombatError> {
        match behavior {
            Behavior::Attack if self.montages.attack.is_empty() => Err(CombatError::missing_asset("Attack")),
            Behavior::Dash if self.montages.dash(self.dash_direction).is_none() => {
                Err(CombatError::missing_asset("Dash"))
            }
            Behavior::SkillQ => self.check_skill(Ability::Q),
            Behavior::SkillE => self.check_skill(Ability::E),
            Behavior::SkillR => self.check_skill(Ability::R),
            Behavior::Block if !self.cooldowns.is_ready(Ability::Block) => Err(CombatError::NotReady {
                ability: Ability::Block,
            }),
            _ => Ok(()),
        }
    }

    fn check_skill(&self, ability: Ability) -> Result<(), CombatError> {
        if self.montages.skill(ability).is_none() {
            return Err(CombatError::missing_asset(ability.to_string()));
        }
        Ok(())
    }

    pub(super) fn play_attack(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        let montage = self
            .montages
            .attack
            .first()
            .cloned()
            .ok_or_else(|| CombatError::missing_asset("Attack"))?;
        self.end_stealth(world);
        self.status.insert(StatusFlags::ATTACKING);
        self.combo_count = self.combo_count.saturating_add(1);
        self.outbox.broadcast(Notification::PlayMontage {
            montage,
            rate: self.attack_speed,
        });
        Ok(())
    }

    pub(super) fn play_dash(&mut self) -> Result<(), CombatError> {
        let montage = self
            .montages
            .dash(self.dash_direction)
            .map(str::to_string)
            .ok_or_else(|| CombatError::missing_asset("Dash"))?;
        self.status.insert(StatusFlags::DASHING);
        self.status.remove(StatusFlags::ATTACKING);
        self.cooldowns.consume(Ability::Dash);
        self.outbox.broadcast(Notification::PlayMontage { montage, rate: 1.0 });
        self.outbox.broadcast(Notification::JumpToSection {
            section: MontageSet::DASH_SECTION.to_string(),
        });
        Ok(())
    }

    pub(super) fn play_skill(&mut self, ability: Ability) -> Result<(), CombatError> {
        let montage = self
            .montages
            .skill(ability)
            .map(str::to_string)
            .ok_or_else(|| CombatError::missing_asset(ability.to_string()))?;
        self.cooldowns.consume(ability);
        self.status.insert(skill_flag(ability));
        self.status.remove(StatusFlags::ATTACKING);
        self.outbox.broadcast(Notification::PlayMontage { montage, rate: 1.0 });
        Ok(())
    }

    pub(super) fn play_block(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        if !self.cooldowns.is_ready(Ability::Block) {
            return Err(CombatError::NotReady {
                ability: Ability::Block,
            });
        }
        self.status.remove(StatusFlags::ATTACKING);
        self.status.insert(StatusFlags::BLOCKING);
        self.cooldowns.consume(Ability::Block);

        let guard = Effect::Guard {
            duration: self.config.block.guard_duration,
        };
        if let Some(ledger) = world.ledger(self.id) {
            ledger.apply_effect(guard);
        }

        if let Some(previous) = self.block_timer.take() {
            self.timers.cancel(previous);
        }
        let hold = f64::from(self.config.block.hold);
        self.block_timer = Some(self.timers.schedule(hold, TimerEvent::BlockHoldElapsed));

        if let Some(montage) = self.montages.block.clone() {
            self.outbox.broadcast(Notification::PlayMontage { montage, rate: 1.0 });
        }
        Ok(())
    }

    pub(super) fn finish_attack(&mut self) {
        self.status.remove(StatusFlags::ATTACKING);
    }

    pub(super) fn finish_dash(&mut self) {
        self.status.remove(StatusFlags::DASHING);
        self.start_cooldown(Ability::Dash);
    }

    pub(super) fn finish_skill(&mut self, ability: Ability) {
        self.status.remove(skill_flag(ability));
        self.start_cooldown(ability);
    }

    /// E skill cancel or end: also unwinds an armed off-hand sub-state.
    /// A projectile in flight is only destroyed when the skill is cancelled.
    pub(super) fn finish_skill_e(&mut self, world: &mut dyn World, cancelled: bool) {
        match self.offhand {
            OffhandState::AimingShield { .. } | OffhandState::DarkOrbArmed { .. } => {
                self.disarm(world);
            }
            OffhandState::GravityInFlight { .. } if cancelled => self.disarm(world),
            OffhandState::GravityInFlight { .. } | OffhandState::Idle => {}
        }
        self.finish_skill(Ability::E);
    }

    pub(super) fn finish_block(&mut self, world: &mut dyn World) {
        if let Some(ledger) = world.ledger(self.id) {
            ledger::remove_effect_by_name(ledger, Effect::GUARD);
        }
        self.status.remove(StatusFlags::BLOCKING);
        self.start_cooldown(Ability::Block);
        if let Some(montage) = self.montages.block.clone() {
            self.outbox.broadcast(Notification::StopMontage {
                montage,
                blend_out: 0.0,
            });
        }
        if let Some(token) = self.block_timer.take() {
            self.timers.cancel(token);
        }
    }

    /// Starts a cooldown and tells the owning client's HUD.
    pub(super) fn start_cooldown(&mut self, ability: Ability) {
        let duration = self
            .cooldowns
            .start(ability, self.loadout.double_sword(), &mut self.timers);
        self.outbox
            .owning_client(Notification::CooldownStarted { ability, duration });
    }
}
