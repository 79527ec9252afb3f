//! # Combat Core
//!
//! Action arbitration and combat resolution for a networked action-game
//! character.
//!
//! ## Architecture
//!
//! - **Arbitration**: every action a character performs competes for a single
//!   current-action slot by numeric priority ([`action`]).
//! - **Combatant**: the typed behaviors, cooldowns, status flags and off-hand
//!   skills of one character ([`combatant`]).
//! - **Resolution**: damage dispatch, hit queries and crosshair aim over a
//!   [`World`](world::World) boundary ([`combat`]).
//! - **Server**: authoritative host that drains client commands and routes
//!   cross-combatant requests ([`server`]).
//!
//! Only the authoritative instance mutates state. Clients send
//! [`Command`](net::Command)s and receive [`Envelope`](net::Envelope)s and
//! [`ReplicatedState`](net::ReplicatedState) snapshots.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use combat_core::{CombatConfig, CombatServer, Combatant, Command, EntityId, NetRole};
//!
//! let mut server = CombatServer::new();
//! let id = EntityId::new(1);
//! server.join(Combatant::new(id, NetRole::Authority, CombatConfig::default()))?;
//! server.submit(id, Command::Attack)?;
//! let envelopes = server.step(&mut world, 1.0 / 30.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod combat;
pub mod combatant;
pub mod config;
pub mod cooldown;
pub mod entity;
pub mod error;
pub mod ledger;
pub mod net;
pub mod server;
pub mod status;
pub mod timer;
pub mod world;

pub use action::{Action, ActionKind, Arbitrator, Priority, ACTION_MAX};
pub use combatant::{Behavior, Combatant};
pub use config::CombatConfig;
pub use cooldown::Ability;
pub use entity::EntityId;
pub use error::CombatError;
pub use net::{Command, Envelope, NetRole, Notification};
pub use server::CombatServer;
pub use status::StatusFlags;

#[cfg(test)]
mod tests;
