//! Network boundary: roles, client commands, outgoing notifications and the
//! replicated snapshot.
//!
//! # Architecture
//!
//! Only the [`NetRole::Authority`] instance of a combatant mutates state.
//! Clients send [`Command`]s, which the authority queues per combatant and
//! re-validates on its next turn. Everything the authority wants the outside
//! to see leaves as an [`Envelope`]: a [`Notification`] tagged with its source
//! combatant and an [`Audience`]. Transport is out of scope; envelopes are
//! plain data.
//!
//! Non-authoritative instances receive [`ReplicatedState`] snapshots and must
//! never write back.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::combat::HitEffect;
use crate::combatant::{Behavior, DashDirection, SkillCommand};
use crate::cooldown::Ability;
use crate::entity::EntityId;

/// Role of one instance of a combatant in the client-server split.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetRole {
    /// The server copy. The only writer.
    #[default]
    Authority,
    /// The owning client's copy.
    AutonomousProxy,
    /// Another client's view of this combatant.
    SimulatedProxy,
}

impl NetRole {
    /// Returns `true` for the authoritative role.
    #[must_use]
    pub const fn is_authority(self) -> bool {
        matches!(self, Self::Authority)
    }
}

impl fmt::Display for NetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authority => write!(f, "authority"),
            Self::AutonomousProxy => write!(f, "autonomous proxy"),
            Self::SimulatedProxy => write!(f, "simulated proxy"),
        }
    }
}

/// Client-to-authority requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Play a voluntary action. Only the canonical action of a behavior is
    /// accepted, and it is re-checked like its dedicated command.
    PlayAction(Action<Behavior>),
    /// Basic attack.
    Attack,
    /// Dash in a direction.
    Dash(DashDirection),
    /// Q skill.
    SkillQ,
    /// E skill.
    SkillE,
    /// R skill.
    SkillR,
    /// Guard stance.
    Block,
    /// Confirm input for an armed skill.
    SkillConfirm(SkillCommand),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayAction(action) => write!(f, "PlayAction({action})"),
            Self::Attack => write!(f, "Attack"),
            Self::Dash(direction) => write!(f, "Dash({direction:?})"),
            Self::SkillQ => write!(f, "SkillQ"),
            Self::SkillE => write!(f, "SkillE"),
            Self::SkillR => write!(f, "SkillR"),
            Self::Block => write!(f, "Block"),
            Self::SkillConfirm(command) => write!(f, "SkillConfirm({command:?})"),
        }
    }
}

/// Who receives a notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    /// Every connected instance (multicast).
    Everyone,
    /// Only the owning client.
    OwningClient,
    /// Server-side listeners (passives, AI).
    Local,
}

/// Fire-and-forget presentation and gameplay signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Play an animation montage.
    PlayMontage {
        /// Montage asset.
        montage: String,
        /// Play rate.
        rate: f32,
    },
    /// Jump the running montage to a section.
    JumpToSection {
        /// Section name.
        section: String,
    },
    /// Stop one montage.
    StopMontage {
        /// Montage asset.
        montage: String,
        /// Blend-out seconds.
        blend_out: f32,
    },
    /// Stop every montage on the character and its attachments.
    StopAllMontages,
    /// Swap to or from stealth materials.
    StealthVisual {
        /// Stealthed.
        active: bool,
    },
    /// Stun montage and particle.
    StunVisual {
        /// Stunned.
        active: bool,
    },
    /// Shock particle.
    ShockVisual {
        /// Shocked.
        active: bool,
    },
    /// Hit effect on a monster.
    HitEffect {
        /// Monster that was hit.
        target: EntityId,
        /// Effect variant.
        effect: HitEffect,
        /// Spawn location.
        location: Vec3,
        /// `location` is relative to the target.
        relative: bool,
    },
    /// HUD cooldown sweep.
    CooldownStarted {
        /// Ability.
        ability: Ability,
        /// Seconds.
        duration: f32,
    },
    /// Crosshair hit feedback.
    CrosshairHitReact,
    /// Highlight (or un-highlight) a character as the barrier target.
    OverlayToggle {
        /// Highlighted character.
        target: EntityId,
        /// Highlight on.
        active: bool,
    },
    /// A basic attack connected.
    NormalAttackHit {
        /// What was hit.
        target: EntityId,
    },
    /// The character entered stealth; monsters tracking it should drop it.
    Stealthed,
    /// Grey out skill icons.
    SkillBan {
        /// Banned.
        banned: bool,
    },
    /// Stun indicator on the HUD.
    StunIndicator {
        /// Stunned.
        active: bool,
    },
    /// Lock or unlock camera look input.
    LookLock {
        /// Locked.
        locked: bool,
    },
}

/// A notification with its source and audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Combatant that produced it.
    pub source: EntityId,
    /// Receivers.
    pub audience: Audience,
    /// Payload.
    pub notification: Notification,
}

/// Collects a combatant's notifications until they are taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbox {
    source: EntityId,
    envelopes: Vec<Envelope>,
}

impl Outbox {
    /// Creates an empty outbox for `source`.
    #[must_use]
    pub const fn new(source: EntityId) -> Self {
        Self {
            source,
            envelopes: Vec::new(),
        }
    }

    /// Queues a notification for everyone.
    pub fn broadcast(&mut self, notification: Notification) {
        self.push(Audience::Everyone, notification);
    }

    /// Queues a notification for the owning client.
    pub fn owning_client(&mut self, notification: Notification) {
        self.push(Audience::OwningClient, notification);
    }

    /// Queues a notification for server-side listeners.
    pub fn local(&mut self, notification: Notification) {
        self.push(Audience::Local, notification);
    }

    /// Queues a notification.
    pub fn push(&mut self, audience: Audience, notification: Notification) {
        self.envelopes.push(Envelope {
            source: self.source,
            audience,
            notification,
        });
    }

    /// Queued envelopes, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// Takes and clears the queued envelopes.
    pub fn take(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.envelopes)
    }
}

/// Replicated view of one cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownView {
    /// Ability.
    pub ability: Ability,
    /// Base duration.
    pub duration: f32,
    /// Readiness.
    pub ready: bool,
}

/// Subset of combatant state sent to non-authoritative instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedState {
    /// Cooldown durations and readiness, in [`Ability::ALL`] order.
    pub cooldowns: Vec<CooldownView>,
    /// Attack animation rate.
    pub attack_speed: f32,
    /// Skill combo counter.
    pub skill_combo_count: u32,
    /// E skill running.
    pub skill_e: bool,
    /// Basic attack running.
    pub attacking: bool,
    /// Aiming a barrier.
    pub aiming_shield: bool,
    /// Current action, `None` when idle.
    pub current_action: Option<Action<Behavior>>,
}
