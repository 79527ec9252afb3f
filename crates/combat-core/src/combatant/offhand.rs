//! Off-hand (E) skills.
//!
//! The E skill does whatever the equipped sub-weapon says. Three sub-weapons
//! arm a follow-up that waits for a confirm input; those armed states are the
//! variants of [`OffhandState`], so at most one is ever active. The aim poll
//! in `Combatant::advance` runs while the state is
//! [`OffhandState::AimingShield`] or [`OffhandState::DarkOrbArmed`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::combat::sphere_query;
use crate::cooldown::Ability;
use crate::entity::{CollisionCategories, EntityId, MonsterRole, TargetKind};
use crate::ledger::{self, AttributeKind, BuffKind, Effect};
use crate::net::Notification;
use crate::status::StatusFlags;
use crate::timer::{TimerEvent, TimerToken};
use crate::world::World;

use super::behavior::{MontageSet, SubWeaponMode, WeaponMode};
use super::CombatState;

/// Armed follow-up of the E skill.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OffhandState {
    /// Nothing armed.
    #[default]
    Idle,
    /// Aiming a barrier; `target` is the highlighted ally, if any.
    AimingShield {
        /// Highlighted character.
        target: Option<EntityId>,
    },
    /// A hidden ground marker follows the aim.
    DarkOrbArmed {
        /// Marker actor.
        marker: EntityId,
    },
    /// A gravity projectile is flying.
    GravityInFlight {
        /// Projectile actor.
        projectile: EntityId,
        /// Lifetime timer.
        token: TimerToken,
    },
}

impl OffhandState {
    /// The status flag this state shows up as.
    #[must_use]
    pub const fn flag(self) -> StatusFlags {
        match self {
            Self::Idle => StatusFlags::empty(),
            Self::AimingShield { .. } => StatusFlags::AIMING_SHIELD,
            Self::DarkOrbArmed { .. } => StatusFlags::DARK_ORB_ARMED,
            Self::GravityInFlight { .. } => StatusFlags::GRAVITY_IN_FLIGHT,
        }
    }

    /// Returns `true` while the aim poll should run.
    #[must_use]
    pub const fn polls_aim(self) -> bool {
        matches!(self, Self::AimingShield { .. } | Self::DarkOrbArmed { .. })
    }
}

/// A confirmed dark-orb field pulsing on the ground.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DarkOrbField {
    /// Marker actor showing the area.
    pub marker: EntityId,
    /// Field center.
    pub center: Vec3,
    /// Pulses left, including the scheduled one.
    pub pulses_left: u32,
    /// Next pulse.
    pub token: TimerToken,
}

/// A request a combatant makes of another combatant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directive {
    /// Put `target` into stealth.
    GrantStealth {
        /// Character to stealth.
        target: EntityId,
    },
}

impl CombatState {
    /// Runs the sub-weapon part of the E skill.
    pub(super) fn sub_weapon_skill(&mut self, world: &mut dyn World) {
        tracing::debug!(owner = %self.id, sub_weapon = ?self.loadout.sub_weapon, "sub-weapon skill");
        match self.loadout.sub_weapon {
            SubWeaponMode::NoWeapon => {}
            SubWeaponMode::Shield => self.shield_provocation(world),
            SubWeaponMode::Sword => self.sword_hiding(world),
            SubWeaponMode::MagicOrb => self.arm_shield(),
            SubWeaponMode::MagicWand => self.gravity_projectile(world),
            SubWeaponMode::DarkMagicOrb => self.arm_dark_orb(world),
        }
    }

    fn shield_provocation(&mut self, world: &mut dyn World) {
        let Some(center) = world.location(self.id) else {
            tracing::warn!(owner = %self.id, "provocation without a location");
            return;
        };
        let shield = &self.config.shield;
        let hits = world.sphere_overlap(
            center,
            center,
            shield.provocation_radius,
            CollisionCategories::MONSTER,
            &[self.id],
        );
        let seconds = shield.provocation_seconds;
        for hit in hits {
            if world.target_kind(hit.actor).is_monster() {
                world.provoke(hit.actor, self.id, seconds);
            }
        }
        self.start_cooldown(Ability::E);
    }

    fn sword_hiding(&mut self, world: &mut dyn World) {
        if !self.status.contains(StatusFlags::STEALTHED) {
            if self.loadout.double_sword() {
                self.set_stealth(world);
            } else if let Some(center) = world.location(self.id) {
                let hits = world.sphere_overlap(
                    center,
                    center,
                    self.config.stealth.ally_search_radius,
                    CollisionCategories::CHARACTER,
                    &[],
                );
                for hit in hits {
                    if world.target_kind(hit.actor) != TargetKind::Character {
                        continue;
                    }
                    if hit.actor == self.id {
                        self.set_stealth(world);
                    } else {
                        self.directives.push(Directive::GrantStealth { target: hit.actor });
                    }
                }
            }
        }
        self.start_cooldown(Ability::E);
    }

    fn arm_shield(&mut self) {
        if self.status.contains(StatusFlags::SKILL_E) {
            self.offhand = OffhandState::AimingShield { target: None };
        }
    }

    /// Fires a pooled gravity projectile along the control forward.
    ///
    /// A shot still in flight is destroyed first, so re-firing replaces it.
    /// Destroying without firing again is the confirm input's job
    /// (`confirm_offhand`).
    fn gravity_projectile(&mut self, world: &mut dyn World) {
        if !self.status.contains(StatusFlags::SKILL_E) {
            return;
        }
        let Some(view) = world.view(self.id) else {
            tracing::warn!(owner = %self.id, "gravity projectile without a view");
            return;
        };
        if let OffhandState::GravityInFlight { .. } = self.offhand {
            self.disarm(world);
        }
        let direction = view.control_forward;
        let Some(projectile) = world.acquire_projectile(self.id, view.socket_location, direction) else {
            tracing::warn!(owner = %self.id, "no pooled gravity projectile");
            return;
        };
        let gravity = &self.config.gravity;
        world.fire_projectile(projectile, direction, gravity.speed);
        let token = self
            .timers
            .schedule(f64::from(gravity.lifetime), TimerEvent::GravityExpired(projectile));
        self.offhand = OffhandState::GravityInFlight { projectile, token };
    }

    fn arm_dark_orb(&mut self, world: &mut dyn World) {
        if !self.status.contains(StatusFlags::SKILL_E) {
            return;
        }
        match world.spawn_marker(self.id) {
            Some(marker) => {
                self.dark_orb_location = None;
                self.offhand = OffhandState::DarkOrbArmed { marker };
            }
            None => tracing::warn!(owner = %self.id, "dark orb marker failed to spawn"),
        }
        self.start_cooldown(Ability::E);
    }

    /// Confirms the armed follow-up. Returns `true` if the E skill is done.
    pub(super) fn confirm_offhand(&mut self, world: &mut dyn World) -> bool {
        match self.offhand {
            OffhandState::Idle => false,
            OffhandState::AimingShield { target } => {
                self.offhand = OffhandState::Idle;
                self.jump_to_confirm_section();
                self.give_shield(world, target);
                true
            }
            OffhandState::DarkOrbArmed { marker } => {
                self.offhand = OffhandState::Idle;
                self.jump_to_confirm_section();
                world.activate_marker(marker);
                self.start_dark_orb_field(world, marker);
                true
            }
            OffhandState::GravityInFlight { .. } => {
                self.disarm(world);
                false
            }
        }
    }

    fn jump_to_confirm_section(&mut self) {
        self.outbox.broadcast(Notification::JumpToSection {
            section: MontageSet::CONFIRM_SECTION.to_string(),
        });
    }

    /// Drops whatever is armed, cleaning up its world objects.
    pub(super) fn disarm(&mut self, world: &mut dyn World) {
        match std::mem::take(&mut self.offhand) {
            OffhandState::Idle => {}
            OffhandState::AimingShield { target } => {
                if let Some(target) = target {
                    self.outbox
                        .owning_client(Notification::OverlayToggle { target, active: false });
                }
            }
            OffhandState::DarkOrbArmed { marker } => world.destroy(marker),
            OffhandState::GravityInFlight { projectile, token } => {
                self.timers.cancel(token);
                world.destroy(projectile);
            }
        }
    }

    /// Gives the barrier and crystal buff to `target`, or to self.
    fn give_shield(&mut self, world: &mut dyn World, target: Option<EntityId>) {
        if let Some(target) = target {
            self.outbox
                .owning_client(Notification::OverlayToggle { target, active: false });
        }
        let recipient = target.unwrap_or(self.id);

        let Some(max_health) = world
            .ledger(self.id)
            .map(|ledger| ledger.current_value(AttributeKind::MaxHealth))
        else {
            tracing::warn!(owner = %self.id, "barrier caster has no stat ledger");
            return;
        };
        let amount = max_health * self.config.shield.barrier_fraction;
        let buff = if self.loadout.weapon == WeaponMode::MagicWand {
            BuffKind::UpMagicCrystal
        } else {
            BuffKind::MagicCrystal
        };

        let Some(ledger) = world.ledger(recipient) else {
            tracing::warn!(owner = %self.id, %recipient, "barrier target has no stat ledger");
            return;
        };
        ledger.apply_effect(Effect::Barrier {
            instigator: self.id,
            amount,
        });
        ledger.apply_buff(buff);
        tracing::debug!(owner = %self.id, %recipient, amount, "barrier given");
    }

    fn start_dark_orb_field(&mut self, world: &mut dyn World, marker: EntityId) {
        if let Some(previous) = self.dark_orb.take() {
            self.timers.cancel(previous.token);
            world.destroy(previous.marker);
        }
        let Some(center) = self.dark_orb_location.take().or_else(|| world.location(marker)) else {
            tracing::warn!(owner = %self.id, "dark orb marker has no location");
            world.destroy(marker);
            return;
        };
        let orb = &self.config.dark_orb;
        let token = self
            .timers
            .schedule(f64::from(orb.tick_interval), TimerEvent::DarkOrbTick);
        self.dark_orb = Some(DarkOrbField {
            marker,
            center,
            pulses_left: orb.tick_count(),
            token,
        });
    }

    /// One pulse of the dark-orb field: slow and weaken every monster in it.
    pub(super) fn dark_orb_pulse(&mut self, world: &mut dyn World, token: TimerToken) {
        let Some(mut field) = self.dark_orb.filter(|field| field.token == token) else {
            return;
        };
        let orb = self.config.dark_orb.clone();
        let hits = sphere_query(
            &*world,
            self.id,
            field.center,
            field.center,
            orb.radius,
            false,
            &mut self.outbox,
        );
        for hit in hits {
            let TargetKind::Monster(role) = world.target_kind(hit.actor) else {
                continue;
            };
            let magnitude = if role == MonsterRole::Boss {
                orb.boss_slow
            } else {
                orb.slow
            };
            let Some(ledger) = world.ledger(hit.actor) else {
                continue;
            };
            ledger.apply_effect(Effect::Slow {
                source: self.id,
                skill: "DarkMagicOrbSkill".to_string(),
                magnitude,
                duration: orb.slow_duration,
            });
            ledger.apply_buff(BuffKind::IncreasedDamageTaken10);
        }

        field.pulses_left = field.pulses_left.saturating_sub(1);
        if field.pulses_left == 0 {
            world.destroy(field.marker);
            self.dark_orb = None;
        } else {
            field.token = self
                .timers
                .schedule(f64::from(orb.tick_interval), TimerEvent::DarkOrbTick);
            self.dark_orb = Some(field);
        }
    }

    pub(super) fn gravity_expired(&mut self, world: &mut dyn World, projectile: EntityId) {
        if let OffhandState::GravityInFlight { projectile: live, .. } = self.offhand {
            if live == projectile {
                self.offhand = OffhandState::Idle;
                world.destroy(projectile);
            }
        }
    }

    /// Tracks the crosshair for the armed follow-up.
    pub(super) fn poll_aim(&mut self, world: &mut dyn World) {
        let Some(view) = world.view(self.id) else {
            return;
        };
        let start = view.camera_location;
        let end = start + view.camera_forward * self.config.aim.poll_distance;

        match self.offhand {
            OffhandState::AimingShield { target } => {
                let found = world
                    .sphere_overlap(
                        start,
                        end,
                        self.config.aim.poll_radius,
                        CollisionCategories::CHARACTER,
                        &[self.id],
                    )
                    .into_iter()
                    .map(|hit| hit.actor)
                    .find(|&actor| {
                        actor != self.id && world.target_kind(actor) == TargetKind::Character
                    });
                if found != target {
                    if let Some(old) = target {
                        self.outbox
                            .owning_client(Notification::OverlayToggle { target: old, active: false });
                    }
                    if let Some(new) = found {
                        self.outbox
                            .owning_client(Notification::OverlayToggle { target: new, active: true });
                    }
                    self.offhand = OffhandState::AimingShield { target: found };
                }
            }
            OffhandState::DarkOrbArmed { marker } => {
                if let Some(hit) = world.ray_cast(start, end, &[self.id]) {
                    world.move_marker(marker, hit.point);
                    self.dark_orb_location = Some(hit.point);
                }
            }
            OffhandState::Idle | OffhandState::GravityInFlight { .. } => {}
        }
    }

    /// Enters stealth, or restarts the stealth window if already in it.
    pub(super) fn set_stealth(&mut self, world: &mut dyn World) {
        if let Some(previous) = self.stealth_timer.take() {
            self.timers.cancel(previous);
        }
        let stealth = &self.config.stealth;
        let duration = f64::from(stealth.duration);

        if !self.status.contains(StatusFlags::STEALTHED) {
            let mut percent = stealth.haste_percent;
            if self.loadout.double_sword() {
                percent *= stealth.double_sword_multiplier;
            }
            if let Some(ledger) = world.ledger(self.id) {
                ledger.apply_effect(Effect::StealthHaste { percent });
            }
            self.status.insert(StatusFlags::STEALTHED);
            self.outbox.broadcast(Notification::StealthVisual { active: true });
            self.outbox.local(Notification::Stealthed);
            tracing::debug!(owner = %self.id, percent, "stealth started");
        }
        self.stealth_timer = Some(self.timers.schedule(duration, TimerEvent::StealthExpired));
    }

    /// Leaves stealth. Does nothing if not stealthed.
    pub(super) fn end_stealth(&mut self, world: &mut dyn World) {
        if !self.status.contains(StatusFlags::STEALTHED) {
            return;
        }
        if let Some(ledger) = world.ledger(self.id) {
            ledger::remove_effect_by_name(ledger, Effect::STEALTH_HASTE);
        }
        if let Some(token) = self.stealth_timer.take() {
            self.timers.cancel(token);
        }
        self.status.remove(StatusFlags::STEALTHED);
        self.outbox.broadcast(Notification::StealthVisual { active: false });
        tracing::debug!(owner = %self.id, "stealth ended");
    }
}
