//! Boundary to the game world: spatial queries, actor classification and the
//! handful of actor-side operations skills need.
//!
//! The combat core consumes query results and never reimplements them. Every
//! method is synchronous and called only on the authority.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::entity::{CollisionCategories, EntityId, Hit, TargetKind};
use crate::ledger::StatLedger;

/// Camera and socket placement of a character, used for aiming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPoint {
    /// Camera position.
    pub camera_location: Vec3,
    /// Unit forward vector of the camera.
    pub camera_forward: Vec3,
    /// Position of the skill spawn socket on the character mesh.
    pub socket_location: Vec3,
    /// Unit forward vector of the controller rotation.
    pub control_forward: Vec3,
}

/// World collaborator.
pub trait World {
    /// Sweeps a sphere from `start` to `end` against the given categories.
    ///
    /// Hits are returned in sweep order and may contain the same actor more
    /// than once. Actors in `excluded` are skipped.
    fn sphere_overlap(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        categories: CollisionCategories,
        excluded: &[EntityId],
    ) -> Vec<Hit>;

    /// Casts a visibility ray and returns the first blocking hit.
    fn ray_cast(&self, start: Vec3, end: Vec3, excluded: &[EntityId]) -> Option<Hit>;

    /// Capability class of an actor; [`TargetKind::Other`] if unknown.
    fn target_kind(&self, id: EntityId) -> TargetKind;

    /// World position of an actor.
    fn location(&self, id: EntityId) -> Option<Vec3>;

    /// Camera and socket placement of a character.
    fn view(&self, id: EntityId) -> Option<ViewPoint>;

    /// Stat ledger of an actor, if it has one.
    fn ledger(&mut self, id: EntityId) -> Option<&mut dyn StatLedger>;

    /// Tells a simple damageable actor that `by` hit it.
    fn notify_damaged(&mut self, target: EntityId, by: EntityId);

    /// Makes a monster focus `by` for `seconds`.
    fn provoke(&mut self, monster: EntityId, by: EntityId, seconds: f32);

    /// Spawns a hidden ground marker for a targeting skill.
    fn spawn_marker(&mut self, owner: EntityId) -> Option<EntityId>;

    /// Moves a marker onto a surface point.
    fn move_marker(&mut self, marker: EntityId, location: Vec3);

    /// Starts a marker's area visual.
    fn activate_marker(&mut self, marker: EntityId);

    /// Takes a disabled projectile from the owner's pool and places it.
    fn acquire_projectile(
        &mut self,
        owner: EntityId,
        location: Vec3,
        direction: Vec3,
    ) -> Option<EntityId>;

    /// Launches a projectile.
    fn fire_projectile(&mut self, projectile: EntityId, direction: Vec3, speed: f32);

    /// Destroys a spawned actor (marker or projectile). Unknown ids are ignored.
    fn destroy(&mut self, id: EntityId);
}
