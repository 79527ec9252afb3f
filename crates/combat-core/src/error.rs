//! Error types for action arbitration, combat resolution and configuration.
//!
//! Every rejection in this crate is non-fatal: the caller gets an error value,
//! the character's current action and cooldown state are left untouched, and
//! the user-visible effect is that the input did nothing this frame.

use thiserror::Error;

use crate::cooldown::Ability;
use crate::entity::EntityId;
use crate::net::NetRole;

/// Errors surfaced by the combat core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// A requested action names a handler its owner cannot run.
    #[error("invalid action definition `{name}`: {reason}")]
    InvalidActionDefinition {
        /// Label of the rejected action.
        name: String,
        /// Which handler failed to resolve.
        reason: String,
    },

    /// The requested action level does not beat the current cancel level.
    #[error("priority denied: action level {requested} > current cancel level {current_cancel}")]
    PriorityDenied {
        /// Clamped action level of the request.
        requested: i32,
        /// Cancel level of the action currently occupying the slot.
        current_cancel: i32,
    },

    /// A mutating call arrived on a non-authoritative role.
    #[error("authority violation: mutating call on {role} role")]
    AuthorityViolation {
        /// Role of the instance that received the call.
        role: NetRole,
    },

    /// The ability has no configured presentation asset.
    #[error("missing asset for {ability}")]
    MissingAsset {
        /// Ability whose asset is missing.
        ability: String,
    },

    /// The ability is still cooling down.
    #[error("{ability} is not ready")]
    NotReady {
        /// Ability that was requested.
        ability: Ability,
    },

    /// The request duplicates something that is already running.
    #[error("{what} is already active")]
    AlreadyActive {
        /// What is already running.
        what: &'static str,
    },

    /// A command or directive names a combatant that is not registered.
    #[error("unknown combatant {id}")]
    UnknownCombatant {
        /// The missing combatant.
        id: EntityId,
    },
}

impl CombatError {
    /// Builds a [`CombatError::MissingAsset`] for a named ability.
    #[must_use]
    pub fn missing_asset(ability: impl Into<String>) -> Self {
        Self::MissingAsset {
            ability: ability.into(),
        }
    }
}

/// Errors raised while loading or validating a [`CombatConfig`](crate::config::CombatConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for the config schema.
    #[error("failed to parse combat config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the core cannot run with.
    #[error("invalid combat config field `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
