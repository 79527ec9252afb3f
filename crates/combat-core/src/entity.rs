//! Identity and classification of the actors the combat core talks about.
//!
//! The core never owns world actors. It refers to them by [`EntityId`] and asks
//! the [`World`](crate::world::World) collaborator what each one is
//! ([`TargetKind`]) when it has to dispatch on capability.
//!
//! # Example
//!
//! ```
//! use combat_core::entity::{EntityId, TargetKind, MonsterRole};
//!
//! let id = EntityId::new(7);
//! assert_eq!(id.as_u64(), 7);
//!
//! let boss = TargetKind::Monster(MonsterRole::Boss);
//! assert!(boss.is_monster());
//! assert!(boss.is_query_target(false));
//! ```

use std::fmt;

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Unique identifier for a world actor (character, monster, prop, projectile).
///
/// Ordered by numeric value; the server relies on that ordering to process
/// combatants deterministically.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Tier of a monster. Boss-tier monsters resist some debuffs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MonsterRole {
    /// Regular monster.
    #[default]
    Normal,
    /// Stronger regular monster.
    Elite,
    /// Boss-tier monster.
    Boss,
}

/// Capability class of a world actor, as reported by the world.
///
/// Damage resolution and hit filtering dispatch on this.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// A player character.
    Character,
    /// A monster with a stat ledger and hit-effect presentation.
    Monster(MonsterRole),
    /// A skill actor (turret, summon) that carries its own stat ledger.
    SkillActorWithStats,
    /// A simple damageable prop: it only wants to know who hit it.
    Damageable,
    /// A building.
    Building,
    /// Anything else (terrain, decoration).
    Other,
}

impl TargetKind {
    /// Returns `true` for monsters of any role.
    #[must_use]
    pub const fn is_monster(self) -> bool {
        matches!(self, Self::Monster(_))
    }

    /// Returns `true` if a sphere query keeps actors of this kind.
    ///
    /// Characters are only kept when the caller asked for them.
    #[must_use]
    pub const fn is_query_target(self, include_characters: bool) -> bool {
        match self {
            Self::Character => include_characters,
            Self::Monster(_) | Self::Damageable | Self::SkillActorWithStats | Self::Building => {
                true
            }
            Self::Other => false,
        }
    }
}

bitflags! {
    /// Object categories a world overlap query is restricted to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionCategories: u8 {
        /// Monsters.
        const MONSTER = 1 << 0;
        /// Skill objects spawned by players or monsters.
        const SKILL_OBJECT = 1 << 1;
        /// Static level geometry.
        const WORLD_STATIC = 1 << 2;
        /// Movable level geometry (doors, props, buildings).
        const WORLD_DYNAMIC = 1 << 3;
        /// Player characters.
        const CHARACTER = 1 << 4;
    }
}

impl CollisionCategories {
    /// Fixed category set used by combat hit queries.
    pub const HIT_QUERY: Self = Self::MONSTER
        .union(Self::SKILL_OBJECT)
        .union(Self::WORLD_STATIC)
        .union(Self::WORLD_DYNAMIC);
}

/// One result of a world query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Actor that was hit.
    pub actor: EntityId,
    /// Impact point in world space.
    pub point: Vec3,
}

impl Hit {
    /// Creates a hit record.
    #[must_use]
    pub const fn new(actor: EntityId, point: Vec3) -> Self {
        Self { actor, point }
    }
}
