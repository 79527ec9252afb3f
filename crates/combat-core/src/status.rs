//! Derived observation state of a character.
//!
//! These flags are written by action handlers as side effects and read by UI,
//! animation and a few internal guards. Arbitration never looks at them; it is
//! driven only by action levels.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Transient status flags of a combatant.
    ///
    /// The off-hand sub-states (`AIMING_SHIELD`, `DARK_ORB_ARMED`,
    /// `GRAVITY_IN_FLIGHT`) are not stored here; they are derived from the
    /// combatant's off-hand state when a full status word is requested.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StatusFlags: u32 {
        /// Dash animation running.
        const DASHING = 1 << 0;
        /// Basic attack running.
        const ATTACKING = 1 << 1;
        /// Q skill running.
        const SKILL_Q = 1 << 2;
        /// E (off-hand) skill running.
        const SKILL_E = 1 << 3;
        /// R skill running.
        const SKILL_R = 1 << 4;
        /// Invisible to monsters, movement speed buffed.
        const STEALTHED = 1 << 5;
        /// Aiming a barrier at an ally.
        const AIMING_SHIELD = 1 << 6;
        /// Dark-orb ground marker following the aim.
        const DARK_ORB_ARMED = 1 << 7;
        /// Gravity projectile in flight.
        const GRAVITY_IN_FLIGHT = 1 << 8;
        /// Guard stance held.
        const BLOCKING = 1 << 9;
        /// Shocked (skills banned).
        const SHOCKED = 1 << 10;
        /// Stunned.
        const STUNNED = 1 << 11;
        /// Small knockback recovery.
        const KNOCKBACKED = 1 << 12;
        /// Big knockback recovery.
        const BIG_KNOCKBACKED = 1 << 13;
        /// Dead.
        const DEAD = 1 << 14;

        /// Flags cleared when a knockback or stun interrupts the character.
        const INTERRUPTIBLE = Self::DASHING.bits()
            | Self::ATTACKING.bits()
            | Self::SKILL_Q.bits()
            | Self::SKILL_E.bits()
            | Self::SKILL_R.bits();

        /// The mutually exclusive off-hand sub-states.
        const OFFHAND = Self::AIMING_SHIELD.bits()
            | Self::DARK_ORB_ARMED.bits()
            | Self::GRAVITY_IN_FLIGHT.bits();
    }
}
