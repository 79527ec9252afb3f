//! Actions: requests to occupy a character's single "current activity" slot.
//!
//! An [`Action`] names the entity that owns its behavior, a [`ActionKind`] tag,
//! typed handlers for the play / cancel / end phases, and two priority levels:
//!
//! - `action_level`: the priority needed to **start** the action,
//! - `cancel_level`: the priority an incoming action needs to **interrupt** it.
//!
//! Lower numbers are stronger. Both levels are clamped into `[0, ACTION_MAX]`
//! before admission. The idle slot behaves like an action with both levels at
//! [`ACTION_MAX`], so anything can start over it.
//!
//! # Equality
//!
//! Two actions are equal when owner, kind, handlers and both levels match. The
//! `name` label is ignored, so re-requesting "the same" action under another
//! label replays it instead of rebinding.
//!
//! # Example
//!
//! ```
//! use combat_core::action::{Action, ActionKind, Priority};
//! use combat_core::entity::EntityId;
//!
//! let owner = EntityId::new(1);
//! let a = Action::new(owner, ActionKind::Attacking, "swing", Priority::ATTACK).named("combo-1");
//! let b = Action::new(owner, ActionKind::Attacking, "swing", Priority::ATTACK).named("combo-2");
//! assert_eq!(a, b);
//! ```

pub mod arbitrator;

pub use arbitrator::{ActionHost, Admission, Arbitrator, Binding, HandlerPhase};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Lowest priority an action level can hold.
pub const ACTION_MAX: i32 = 100;

/// Clamps a raw level into `[0, ACTION_MAX]`.
#[must_use]
pub const fn clamp_level(level: i32) -> i32 {
    if level < 0 {
        0
    } else if level > ACTION_MAX {
        ACTION_MAX
    } else {
        level
    }
}

/// Category tag of an action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionKind {
    /// Generic action.
    #[default]
    Normal,
    /// Death.
    Dead,
    /// Stun or big knockback.
    CrowdControl,
    /// Small knockback.
    SmallKnockback,
    /// Skill or dash.
    Skill,
    /// Basic attack.
    Attacking,
    /// Guard stance.
    Block,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Dead => write!(f, "Dead"),
            Self::CrowdControl => write!(f, "CrowdControl"),
            Self::SmallKnockback => write!(f, "SmallKnockback"),
            Self::Skill => write!(f, "Skill"),
            Self::Attacking => write!(f, "Attacking"),
            Self::Block => write!(f, "Block"),
        }
    }
}

/// An `(action level, cancel level)` pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Priority {
    /// Priority needed to start.
    pub action: i32,
    /// Priority needed to interrupt once running.
    pub cancel: i32,
}

impl Priority {
    /// Death: starts over anything, interruptible only by another level-0 action.
    pub const DEAD: Self = Self::new(0, 0);
    /// Dash.
    pub const DASH: Self = Self::new(3, 2);
    /// Basic attack.
    pub const ATTACK: Self = Self::new(4, 3);
    /// Q / E / R skills.
    pub const SKILL: Self = Self::new(3, 2);
    /// Block starts fairly easily but yields to almost anything.
    pub const BLOCK: Self = Self::new(3, 5);
    /// Stun and big knockback.
    pub const CROWD_CONTROL: Self = Self::new(0, 1);
    /// Small knockback.
    pub const KNOCKBACK: Self = Self::new(1, 1);
    /// The idle slot.
    pub const IDLE: Self = Self::new(ACTION_MAX, ACTION_MAX);

    /// Creates a priority pair.
    #[must_use]
    pub const fn new(action: i32, cancel: i32) -> Self {
        Self { action, cancel }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Handlers an action runs in each phase of its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handlers<B> {
    /// Runs when the action is admitted (and on every replay).
    pub play: B,
    /// Runs when a stronger action interrupts this one.
    pub cancel: Option<B>,
    /// Runs when the action finishes on its own.
    pub end: Option<B>,
}

impl<B> Handlers<B> {
    /// Handlers with only a play phase.
    #[must_use]
    pub const fn play_only(play: B) -> Self {
        Self {
            play,
            cancel: None,
            end: None,
        }
    }
}

/// A request to occupy the current-activity slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action<B> {
    /// Entity whose behavior the handlers belong to.
    pub owner: EntityId,
    /// Category tag.
    pub kind: ActionKind,
    /// Phase handlers.
    pub handlers: Handlers<B>,
    /// Priority needed to start.
    pub action_level: i32,
    /// Priority needed to interrupt.
    pub cancel_level: i32,
    /// Label for logs. Not part of equality.
    pub name: String,
}

impl<B> Action<B> {
    /// Creates an action with only a play handler. The name defaults to
    /// empty; see [`named`](Self::named).
    #[must_use]
    pub fn new(owner: EntityId, kind: ActionKind, play: B, priority: Priority) -> Self {
        Self {
            owner,
            kind,
            handlers: Handlers::play_only(play),
            action_level: priority.action,
            cancel_level: priority.cancel,
            name: String::new(),
        }
    }

    /// Adds a cancel handler.
    #[must_use]
    pub fn with_cancel(mut self, cancel: B) -> Self {
        self.handlers.cancel = Some(cancel);
        self
    }

    /// Adds an end handler.
    #[must_use]
    pub fn with_end(mut self, end: B) -> Self {
        self.handlers.end = Some(end);
        self
    }

    /// Overrides both priority levels.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.action_level = priority.action;
        self.cancel_level = priority.cancel;
        self
    }

    /// Sets the log label.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the action with both levels clamped into `[0, ACTION_MAX]`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.action_level = clamp_level(self.action_level);
        self.cancel_level = clamp_level(self.cancel_level);
        self
    }

    /// Current `(action, cancel)` levels.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        Priority::new(self.action_level, self.cancel_level)
    }
}

impl<B: PartialEq> PartialEq for Action<B> {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.kind == other.kind
            && self.handlers == other.handlers
            && self.action_level == other.action_level
            && self.cancel_level == other.cancel_level
    }
}

impl<B: Eq> Eq for Action<B> {}

impl<B> fmt::Display for Action<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "<unnamed>" } else { self.name.as_str() };
        write!(
            f,
            "{name} [{}] ({}, {}) owner {}",
            self.kind, self.action_level, self.cancel_level, self.owner
        )
    }
}
