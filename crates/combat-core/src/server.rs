//! Authoritative host for a set of combatants.
//!
//! The `CombatServer` owns every authoritative [`Combatant`] and a FIFO
//! mailbox of client [`Command`]s per combatant. One [`CombatServer::step`]
//! runs three phases:
//!
//! 1. **COMMANDS**: each combatant, in id order, drains its mailbox in
//!    arrival order. A failed command is logged and dropped.
//! 2. **TIME**: each combatant advances its clock by `dt`, firing due timers.
//! 3. **DIRECTIVES**: requests one combatant made of another (ally stealth)
//!    are routed to their targets.
//!
//! Notifications are collected after every phase, so the returned envelopes
//! keep per-combatant order.
//!
//! # Determinism
//!
//! Combatants are stored in a `BTreeMap`, so given the same commands and the
//! same world responses a step produces the same envelopes.
//!
//! # Example
//!
//! ```
//! use combat_core::combatant::Combatant;
//! use combat_core::config::CombatConfig;
//! use combat_core::entity::EntityId;
//! use combat_core::net::{Command, NetRole};
//! use combat_core::server::CombatServer;
//!
//! let mut server = CombatServer::new();
//! let id = EntityId::new(7);
//! server
//!     .join(Combatant::new(id, NetRole::Authority, CombatConfig::default()))
//!     .unwrap();
//! server.submit(id, Command::SkillQ).unwrap();
//! assert_eq!(server.queued(id), Some(1));
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::combatant::{Combatant, Directive};
use crate::entity::EntityId;
use crate::error::CombatError;
use crate::net::{Command, Envelope};
use crate::world::World;

/// A combatant and its command mailbox.
#[derive(Debug)]
struct Seat {
    combatant: Combatant,
    inbox: VecDeque<Command>,
}

/// Authoritative host for combatants.
#[derive(Default)]
pub struct CombatServer {
    seats: BTreeMap<EntityId, Seat>,
}

impl fmt::Debug for CombatServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatServer")
            .field("combatants", &self.seats.keys().collect::<Vec<_>>())
            .field("queued", &self.seats.values().map(|s| s.inbox.len()).sum::<usize>())
            .finish()
    }
}

impl CombatServer {
    /// Creates an empty server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a combatant.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation` if the combatant is a proxy, `AlreadyActive` if
    /// its id is taken.
    pub fn join(&mut self, combatant: Combatant) -> Result<(), CombatError> {
        if !combatant.role().is_authority() {
            return Err(CombatError::AuthorityViolation {
                role: combatant.role(),
            });
        }
        let id = combatant.id();
        if self.seats.contains_key(&id) {
            return Err(CombatError::AlreadyActive { what: "combatant" });
        }
        tracing::debug!(%id, "combatant joined");
        self.seats.insert(
            id,
            Seat {
                combatant,
                inbox: VecDeque::new(),
            },
        );
        Ok(())
    }

    /// Removes a combatant, dropping its queued commands.
    pub fn leave(&mut self, id: EntityId) -> Option<Combatant> {
        let seat = self.seats.remove(&id)?;
        if !seat.inbox.is_empty() {
            tracing::debug!(%id, dropped = seat.inbox.len(), "left with queued commands");
        }
        Some(seat.combatant)
    }

    /// Queues a client command for the next step.
    ///
    /// # Errors
    ///
    /// `UnknownCombatant` if `id` is not registered.
    pub fn submit(&mut self, id: EntityId, command: Command) -> Result<(), CombatError> {
        let seat = self
            .seats
            .get_mut(&id)
            .ok_or(CombatError::UnknownCombatant { id })?;
        seat.inbox.push_back(command);
        Ok(())
    }

    /// A registered combatant.
    #[must_use]
    pub fn combatant(&self, id: EntityId) -> Option<&Combatant> {
        self.seats.get(&id).map(|seat| &seat.combatant)
    }

    /// A registered combatant, mutably. For animation notifies and damage
    /// events that arrive outside the command stream.
    pub fn combatant_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        self.seats.get_mut(&id).map(|seat| &mut seat.combatant)
    }

    /// Commands waiting for `id`.
    #[must_use]
    pub fn queued(&self, id: EntityId) -> Option<usize> {
        self.seats.get(&id).map(|seat| seat.inbox.len())
    }

    /// Registered ids in processing order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.seats.keys().copied()
    }

    /// Number of registered combatants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    /// Returns `true` if no combatant is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Runs one server step and returns every notification it produced.
    pub fn step(&mut self, world: &mut dyn World, dt: f64) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        let mut directives = Vec::new();

        // PHASE 1: COMMANDS
        for (id, seat) in &mut self.seats {
            while let Some(command) = seat.inbox.pop_front() {
                let label = command.to_string();
                if let Err(err) = seat.combatant.handle(world, command) {
                    tracing::debug!(%id, command = %label, error = %err, "command dropped");
                }
            }
            envelopes.extend(seat.combatant.take_notifications());
            directives.extend(seat.combatant.take_directives());
        }

        // PHASE 2: TIME
        for (id, seat) in &mut self.seats {
            if let Err(err) = seat.combatant.advance(world, dt) {
                tracing::warn!(%id, error = %err, "advance failed");
            }
            envelopes.extend(seat.combatant.take_notifications());
            directives.extend(seat.combatant.take_directives());
        }

        // PHASE 3: DIRECTIVES
        for directive in directives {
            self.route(world, directive, &mut envelopes);
        }

        envelopes
    }

    fn route(&mut self, world: &mut dyn World, directive: Directive, envelopes: &mut Vec<Envelope>) {
        match directive {
            Directive::GrantStealth { target } => {
                let Some(seat) = self.seats.get_mut(&target) else {
                    tracing::debug!(%target, "stealth for unknown combatant");
                    return;
                };
                if let Err(err) = seat.combatant.grant_stealth(world) {
                    tracing::warn!(%target, error = %err, "stealth directive failed");
                }
                envelopes.extend(seat.combatant.take_notifications());
            }
        }
    }
}
