//! Swept-sphere hit query.

use std::collections::HashSet;

use glam::Vec3;

use crate::entity::{CollisionCategories, EntityId, Hit};
use crate::net::{Notification, Outbox};
use crate::world::World;

/// Sweeps a sphere for combat targets.
///
/// The world query is restricted to monsters, skill objects and world geometry,
/// plus characters when `include_characters` is set. `owner` is never hit.
/// Results keep sweep order, hold each actor once, and contain only
/// characters (if requested), monsters, damageables, skill actors with stats
/// and buildings.
///
/// A non-empty result sends crosshair feedback to the owning client.
pub fn sphere_query(
    world: &dyn World,
    owner: EntityId,
    start: Vec3,
    end: Vec3,
    radius: f32,
    include_characters: bool,
    outbox: &mut Outbox,
) -> Vec<Hit> {
    let mut categories = CollisionCategories::HIT_QUERY;
    if include_characters {
        categories |= CollisionCategories::CHARACTER;
    }

    let mut seen = HashSet::new();
    let hits: Vec<Hit> = world
        .sphere_overlap(start, end, radius, categories, &[owner])
        .into_iter()
        .filter(|hit| hit.actor != owner)
        .filter(|hit| world.target_kind(hit.actor).is_query_target(include_characters))
        .filter(|hit| seen.insert(hit.actor))
        .collect();

    if !hits.is_empty() {
        outbox.owning_client(Notification::CrosshairHitReact);
    }
    hits
}
