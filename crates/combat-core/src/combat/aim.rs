//! Projectile spawn transform toward the crosshair.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::AimConfig;
use crate::entity::{EntityId, Hit};
use crate::world::{ViewPoint, World};

/// Pitch and yaw in degrees. X is forward, Z is up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    /// Elevation above the horizontal plane.
    pub pitch: f32,
    /// Heading around the up axis.
    pub yaw: f32,
}

impl Rotator {
    /// Creates a rotator.
    #[must_use]
    pub const fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }

    /// Rotation that points along `direction`. A zero vector gives zero.
    #[must_use]
    pub fn from_direction(direction: Vec3) -> Self {
        if direction.length_squared() <= f32::EPSILON {
            return Self::default();
        }
        let horizontal = direction.x.hypot(direction.y);
        Self {
            pitch: direction.z.atan2(horizontal).to_degrees(),
            yaw: direction.y.atan2(direction.x).to_degrees(),
        }
    }

    /// Unit vector this rotation points along.
    #[must_use]
    pub fn direction(self) -> Vec3 {
        let (sin_p, cos_p) = self.pitch.to_radians().sin_cos();
        let (sin_y, cos_y) = self.yaw.to_radians().sin_cos();
        Vec3::new(cos_p * cos_y, cos_p * sin_y, sin_p)
    }
}

/// Where and in which direction to spawn a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AimSolution {
    /// Spawn location (the skill socket).
    pub location: Vec3,
    /// Spawn rotation.
    pub rotation: Rotator,
    /// Surface the camera ray hit, if the ray was cast.
    pub hit: Option<Hit>,
}

impl AimSolution {
    /// Unit launch direction.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.rotation.direction()
    }
}

/// Computes a spawn transform from the skill socket toward the crosshair.
///
/// The aim point is the end of the camera ray. Gravity-affected projectiles
/// get a fixed upward pitch bias and skip the ray. Otherwise a visibility ray
/// is cast along the camera forward: a hit farther than
/// `min_hit_distance` from the socket becomes the aim point; a nearer hit is
/// replaced by the point `fallback_distance` along the camera ray.
pub fn aim_at_crosshair(
    world: &dyn World,
    owner: EntityId,
    view: &ViewPoint,
    has_gravity: bool,
    config: &AimConfig,
) -> AimSolution {
    let location = view.socket_location;
    let start = view.camera_location;
    let end = start + view.camera_forward * config.trace_distance;
    let mut rotation = Rotator::from_direction(end - location);

    if has_gravity {
        rotation.pitch += config.gravity_pitch_bias;
        return AimSolution {
            location,
            rotation,
            hit: None,
        };
    }

    let hit = world.ray_cast(start, end, &[owner]);
    if let Some(surface) = hit {
        let aim_point = if location.distance(surface.point) > config.min_hit_distance {
            surface.point
        } else {
            start + view.camera_forward * config.fallback_distance
        };
        rotation = Rotator::from_direction(aim_point - location);
    }

    AimSolution {
        location,
        rotation,
        hit,
    }
}
