//! Damage dispatch by target capability.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, TargetKind};
use crate::ledger::{AttackType, DamageEvent, DamageKind};
use crate::net::{Notification, Outbox};
use crate::world::World;

/// Hit effect variant spawned on a monster.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HitEffect {
    /// Regular hit.
    #[default]
    Normal,
    /// Heavy hit.
    Strong,
    /// Skill hit.
    Skill,
}

/// Parameters of one damage application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageRequest {
    /// Actor to damage.
    pub target: EntityId,
    /// Multiplier on the attacker's final AD.
    pub ad_scale: f32,
    /// Multiplier on the attacker's final AP.
    pub ap_scale: f32,
    /// Whether the hit knocks the target back.
    pub knockback: bool,
    /// Which stat line is used. Exactly one scale applies.
    pub damage_kind: DamageKind,
    /// Source category.
    pub attack_type: AttackType,
    /// Skill name, empty for basic attacks.
    pub skill_name: String,
    /// Hit effect variant.
    pub hit_effect: HitEffect,
    /// Impact point; `None` spawns the hit effect at the target's location.
    pub hit_location: Option<Vec3>,
}

impl DamageRequest {
    /// A basic AD hit at full scale.
    #[must_use]
    pub fn new(target: EntityId) -> Self {
        Self {
            target,
            ad_scale: 1.0,
            ap_scale: 1.0,
            knockback: false,
            damage_kind: DamageKind::Ad,
            attack_type: AttackType::NormalAttack,
            skill_name: String::new(),
            hit_effect: HitEffect::Normal,
            hit_location: None,
        }
    }

    /// Sets both scales.
    #[must_use]
    pub fn scales(mut self, ad: f32, ap: f32) -> Self {
        self.ad_scale = ad;
        self.ap_scale = ap;
        self
    }

    /// Sets the stat line.
    #[must_use]
    pub fn kind(mut self, kind: DamageKind) -> Self {
        self.damage_kind = kind;
        self
    }

    /// Marks the hit as skill damage from `skill`.
    #[must_use]
    pub fn skill(mut self, skill: impl Into<String>) -> Self {
        self.attack_type = AttackType::Skill;
        self.skill_name = skill.into();
        self
    }

    /// Sets the source category.
    #[must_use]
    pub fn attack_type(mut self, attack_type: AttackType) -> Self {
        self.attack_type = attack_type;
        self
    }

    /// Sets the knockback flag.
    #[must_use]
    pub fn knockback(mut self, knockback: bool) -> Self {
        self.knockback = knockback;
        self
    }

    /// Sets the hit effect and impact point.
    #[must_use]
    pub fn effect(mut self, effect: HitEffect, location: Option<Vec3>) -> Self {
        self.hit_effect = effect;
        self.hit_location = location;
        self
    }

    /// The scale matching the stat line.
    #[must_use]
    pub const fn scale(&self) -> f32 {
        match self.damage_kind {
            DamageKind::Ad => self.ad_scale,
            DamageKind::Ap => self.ap_scale,
        }
    }
}

/// What [`apply_damage`] did.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DamageOutcome {
    /// Scaled damage was delivered to the target's ledger.
    Applied {
        /// Delivered amount.
        amount: f32,
    },
    /// The target only wanted to know who hit it.
    Forwarded,
    /// Nothing to damage.
    Ignored,
}

/// Resolves one hit from `attacker`.
///
/// A basic-attack hit raises [`Notification::NormalAttackHit`] before the
/// target is even looked at. Then:
///
/// - monsters get a hit effect and scaled damage,
/// - skill actors with stats get scaled damage,
/// - simple damageables are told who hit them, ignoring every scale,
/// - anything else is ignored.
///
/// Damage is `attacker final stat(kind) * scale(kind)`.
pub fn apply_damage(
    attacker: EntityId,
    world: &mut dyn World,
    outbox: &mut Outbox,
    request: &DamageRequest,
) -> DamageOutcome {
    let Some(base) = world
        .ledger(attacker)
        .map(|ledger| ledger.final_damage(request.damage_kind))
    else {
        tracing::warn!(%attacker, "attacker has no stat ledger");
        return DamageOutcome::Ignored;
    };

    let target = request.target;
    if request.attack_type == AttackType::NormalAttack {
        outbox.local(Notification::NormalAttackHit { target });
    }

    match world.target_kind(target) {
        TargetKind::Monster(_) => {
            let target_location = world.location(target).unwrap_or(Vec3::ZERO);
            let (location, relative) = match request.hit_location {
                Some(point) => (point - target_location, true),
                None => (target_location, false),
            };
            outbox.broadcast(Notification::HitEffect {
                target,
                effect: request.hit_effect,
                location,
                relative,
            });
        }
        TargetKind::SkillActorWithStats => {}
        TargetKind::Damageable => {
            world.notify_damaged(target, attacker);
            return DamageOutcome::Forwarded;
        }
        TargetKind::Character | TargetKind::Building | TargetKind::Other => {
            return DamageOutcome::Ignored;
        }
    }

    let amount = base * request.scale();
    let Some(ledger) = world.ledger(target) else {
        tracing::warn!(%target, "damage target has no stat ledger");
        return DamageOutcome::Ignored;
    };
    ledger.apply_damage(DamageEvent {
        instigator: attacker,
        kind: request.damage_kind,
        amount,
        knockback: request.knockback,
        attack_type: request.attack_type,
        skill_name: request.skill_name.clone(),
    });
    tracing::debug!(%attacker, %target, amount, kind = %request.damage_kind, "damage applied");
    DamageOutcome::Applied { amount }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let request = DamageRequest::new(EntityId::new(1));
        assert_eq!(request.damage_kind, DamageKind::Ad);
        assert_eq!(request.attack_type, AttackType::NormalAttack);
        assert!(request.hit_location.is_none());
        assert!(!request.knockback);
    }

    #[test]
    fn scale_follows_kind() {
        let request = DamageRequest::new(EntityId::new(1)).scales(0.5, 2.0);
        assert!((request.scale() - 0.5).abs() < f32::EPSILON);
        let request = request.kind(DamageKind::Ap);
        assert!((request.scale() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn skill_sets_attack_type() {
        let request = DamageRequest::new(EntityId::new(1)).skill("SkillQ");
        assert_eq!(request.attack_type, AttackType::Skill);
        assert_eq!(request.skill_name, "SkillQ");
    }
}
