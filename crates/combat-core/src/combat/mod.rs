//! Combat resolution: damage dispatch, hit-query filtering and crosshair aim.
//!
//! These are free functions over the [`World`](crate::world::World) boundary.
//! They hold no state; the combatant calls them from its entry points and
//! skill orchestrators, passing its own outbox for notifications.
//!
//! # Available Operations
//!
//! - [`apply_damage`]: scale the attacker's final stat and deliver it,
//!   dispatching on the target's [`TargetKind`](crate::entity::TargetKind)
//! - [`sphere_query`]: swept-sphere hit query, deduplicated and filtered
//! - [`aim_at_crosshair`]: projectile spawn transform toward the crosshair

mod aim;
mod damage;
mod query;

pub use aim::{aim_at_crosshair, AimSolution, Rotator};
pub use damage::{apply_damage, DamageOutcome, DamageRequest, HitEffect};
pub use query::sphere_query;
