//! End-to-end scenarios through the public combatant and server API.

use glam::Vec3;

use super::helpers::*;
use crate::action::{Action, ActionKind, Admission, Priority};
use crate::combat::{DamageOutcome, DamageRequest, HitEffect};
use crate::combatant::{Behavior, DashDirection, OffhandState, SkillCommand, SubWeaponMode, WeaponMode};
use crate::config::{CombatConfig, CooldownTable};
use crate::cooldown::Ability;
use crate::entity::{EntityId, Hit, MonsterRole, TargetKind};
use crate::error::CombatError;
use crate::ledger::{AttackType, BuffKind, DamageKind, Effect};
use crate::net::{Audience, Command, NetRole, Notification};
use crate::server::CombatServer;
use crate::status::StatusFlags;

fn current(combatant: &crate::combatant::Combatant) -> Option<Behavior> {
    combatant.current_action().map(|action| action.handlers.play)
}

fn cooling(combatant: &crate::combatant::Combatant, ability: Ability) -> bool {
    !combatant.is_ready(ability) && combatant.cooldowns().get(ability).pending().is_some()
}

// =============================================================================
// Arbitration scenarios
// =============================================================================

mod arbitration_tests {
    use super::*;

    #[test]
    fn attack_interrupts_block() {
        let mut world = world();
        let mut player = player();
        player.block(&mut world).unwrap();
        assert!(player.status().contains(StatusFlags::BLOCKING));
        assert!(world.ledger_of(PLAYER).has_effect(Effect::GUARD));

        player.attack(&mut world).unwrap();
        assert_eq!(current(&player), Some(Behavior::Attack));
        assert!(!player.status().contains(StatusFlags::BLOCKING));
        assert!(player.status().contains(StatusFlags::ATTACKING));
        assert!(!world.ledger_of(PLAYER).has_effect(Effect::GUARD));
        assert!(cooling(&player, Ability::Block));
        assert!(sent(
            &player,
            &Notification::StopMontage {
                montage: "Block".to_string(),
                blend_out: 0.0
            }
        ));
    }

    #[test]
    fn dash_interrupts_attack_on_tie() {
        let mut world = world();
        let mut player = player();
        player.attack(&mut world).unwrap();
        player.dash(&mut world, DashDirection::BackLeft).unwrap();
        assert_eq!(current(&player), Some(Behavior::Dash));
        assert!(player.status().contains(StatusFlags::DASHING));
        assert!(!player.status().contains(StatusFlags::ATTACKING));
        assert!(!player.is_ready(Ability::Dash));
        assert!(sent(
            &player,
            &Notification::PlayMontage {
                montage: "Dash_BL".to_string(),
                rate: 1.0
            }
        ));
    }

    #[test]
    fn block_denied_during_dash() {
        let mut world = world();
        let mut player = player();
        player.dash(&mut world, DashDirection::Front).unwrap();
        let err = player.block(&mut world).unwrap_err();
        assert_eq!(
            err,
            CombatError::PriorityDenied {
                requested: 3,
                current_cancel: 2
            }
        );
        assert_eq!(current(&player), Some(Behavior::Dash));
        assert!(player.is_ready(Ability::Block));
    }

    #[test]
    fn attack_while_attacking_is_rejected() {
        let mut world = world();
        let mut player = player();
        player.attack(&mut world).unwrap();
        assert_eq!(
            player.attack(&mut world),
            Err(CombatError::AlreadyActive { what: "attack" })
        );
        assert_eq!(player.combo_count(), 1);
    }

    #[test]
    fn missing_montage_rejects_before_readiness() {
        let mut world = world();
        let mut player = crate::combatant::Combatant::new(PLAYER, NetRole::Authority, CombatConfig::default());
        assert_eq!(
            player.skill_q(&mut world),
            Err(CombatError::missing_asset("SkillQ"))
        );
        assert!(player.is_idle());
        assert!(player.is_ready(Ability::Q));
    }

    #[test]
    fn skill_on_cooldown_is_not_ready() {
        let mut world = world();
        let mut player = player();
        player.skill_r(&mut world).unwrap();
        player.finish_current_action(&mut world, Behavior::SkillR).unwrap();
        assert_eq!(
            player.skill_r(&mut world),
            Err(CombatError::NotReady { ability: Ability::R })
        );
    }

    #[test]
    fn foreign_action_is_invalid() {
        let mut world = world();
        let mut player = player();
        let foreign = Behavior::Attack.action(EntityId::new(99));
        let err = player.try_play_action(&mut world, foreign).unwrap_err();
        assert!(matches!(err, CombatError::InvalidActionDefinition { .. }));
        assert!(player.is_idle());
    }

    #[test]
    fn unsupported_phase_is_invalid() {
        let mut world = world();
        let mut player = player();
        let action = Action::new(PLAYER, ActionKind::Normal, Behavior::Dead, Priority::SKILL)
            .with_cancel(Behavior::Dead);
        assert!(matches!(
            player.try_play_action(&mut world, action),
            Err(CombatError::InvalidActionDefinition { .. })
        ));
        assert!(!player.status().contains(StatusFlags::DEAD));
    }

    #[test]
    fn unplayable_action_keeps_block_running() {
        let mut world = world();
        let mut player = player();
        player.block(&mut world).unwrap();
        player.set_montage(crate::combatant::MontageSet::default()).unwrap();
        let err = player
            .try_play_action(&mut world, Behavior::SkillQ.action(PLAYER))
            .unwrap_err();
        assert_eq!(err, CombatError::missing_asset("SkillQ"));
        assert_eq!(current(&player), Some(Behavior::Block));
        assert!(player.status().contains(StatusFlags::BLOCKING));
        assert!(!cooling(&player, Ability::Block));
        assert!(player.is_ready(Ability::Q));
        assert!(world.ledger_of(PLAYER).has_effect(Effect::GUARD));
    }

    #[test]
    fn unplayable_dash_keeps_attack_running() {
        let mut world = world();
        let mut player = player();
        player.attack(&mut world).unwrap();
        player.set_montage(crate::combatant::MontageSet::default()).unwrap();
        let err = player
            .try_play_action(&mut world, Behavior::Dash.action(PLAYER))
            .unwrap_err();
        assert_eq!(err, CombatError::missing_asset("Dash"));
        assert_eq!(current(&player), Some(Behavior::Attack));
        assert!(player.status().contains(StatusFlags::ATTACKING));
        assert!(player.is_ready(Ability::Dash));
    }

    #[test]
    fn equal_action_replays() {
        let mut world = world();
        let mut player = player();
        player.knockback(&mut world).unwrap();
        let replay = player
            .try_play_action(&mut world, Behavior::Knockback.action(PLAYER).named("again"))
            .unwrap();
        assert_eq!(replay, Admission::Replayed);
        assert_eq!(player.current_action().unwrap().name, "again");
    }

    #[test]
    fn finish_ignores_stale_notify() {
        let mut world = world();
        let mut player = player();
        player.skill_q(&mut world).unwrap();
        assert_eq!(player.finish_current_action(&mut world, Behavior::SkillR), Ok(false));
        assert_eq!(current(&player), Some(Behavior::SkillQ));
        assert_eq!(player.finish_current_action(&mut world, Behavior::SkillQ), Ok(true));
        assert!(player.is_idle());
        assert!(cooling(&player, Ability::Q));
    }

    #[test]
    fn interrupted_montage_cancels() {
        let mut world = world();
        let mut player = player();
        player.attack(&mut world).unwrap();
        player.montage_interrupted(&mut world, Some("Attack")).unwrap();
        assert!(player.status().contains(StatusFlags::ATTACKING));
        player.montage_interrupted(&mut world, Some("Emote")).unwrap();
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::ATTACKING));

        player.skill_q(&mut world).unwrap();
        player.montage_interrupted(&mut world, None).unwrap();
        assert!(player.is_idle());
        assert!(cooling(&player, Ability::Q));
    }

    #[test]
    fn equipment_needs_a_calm_slot() {
        let mut world = world();
        let mut player = player();
        player.block(&mut world).unwrap();
        assert!(player.can_equip_item());
        player.set_weapon_mode(WeaponMode::Bow).unwrap();

        player.attack(&mut world).unwrap();
        assert_eq!(
            player.set_sub_weapon_mode(SubWeaponMode::Shield),
            Err(CombatError::PriorityDenied {
                requested: 5,
                current_cancel: 3
            })
        );
        assert_eq!(player.loadout().weapon, WeaponMode::Bow);
        assert_eq!(player.loadout().sub_weapon, SubWeaponMode::NoWeapon);
    }
}

// =============================================================================
// Cooldowns and timers
// =============================================================================

mod cooldown_tests {
    use super::*;

    #[test]
    fn cooldown_runs_from_finish() {
        let mut world = world();
        let mut player = player();
        player.skill_q(&mut world).unwrap();
        assert!(!player.is_ready(Ability::Q));
        assert!(player.cooldowns().get(Ability::Q).pending().is_none());

        player.finish_current_action(&mut world, Behavior::SkillQ).unwrap();
        player.advance(&mut world, 4.5).unwrap();
        assert!(!player.is_ready(Ability::Q));
        player.advance(&mut world, 0.5).unwrap();
        assert!(player.is_ready(Ability::Q));
    }

    #[test]
    fn double_sword_shortens_e() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::DoubleSword, SubWeaponMode::NoWeapon);
        player.skill_e(&mut world).unwrap();
        player.finish_current_action(&mut world, Behavior::SkillE).unwrap();

        let expected = CooldownTable::DEFAULT_SKILL / CombatConfig::DEFAULT_E_DIVISOR;
        let started = player
            .pending_notifications()
            .iter()
            .find_map(|envelope| match envelope.notification {
                Notification::CooldownStarted {
                    ability: Ability::E,
                    duration,
                } => Some(duration),
                _ => None,
            })
            .unwrap();
        assert!((started - expected).abs() < 1e-4);
        // base duration is untouched
        assert!((player.cooldowns().base_duration(Ability::E) - CooldownTable::DEFAULT_SKILL).abs() < f32::EPSILON);

        player.advance(&mut world, 1.75).unwrap();
        assert!(player.is_ready(Ability::E));
    }

    #[test]
    fn block_ends_after_hold() {
        let mut world = world();
        let mut player = player();
        player.block(&mut world).unwrap();
        player.advance(&mut world, 0.5).unwrap();
        assert_eq!(current(&player), Some(Behavior::Block));

        player.advance(&mut world, 0.5).unwrap();
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::BLOCKING));
        assert!(cooling(&player, Ability::Block));

        player.advance(&mut world, 1.5).unwrap();
        assert!(player.is_ready(Ability::Block));
    }

    #[test]
    fn cancelled_block_hold_does_not_end_next_action() {
        let mut world = world();
        let mut player = player();
        player.block(&mut world).unwrap();
        player.skill_q(&mut world).unwrap();
        player.advance(&mut world, 1.0).unwrap();
        assert_eq!(current(&player), Some(Behavior::SkillQ));
    }

    #[test]
    fn reset_values_readies_everything() {
        let mut world = world();
        let mut player = player();
        player.skill_q(&mut world).unwrap();
        player.finish_current_action(&mut world, Behavior::SkillQ).unwrap();
        player.dash(&mut world, DashDirection::Front).unwrap();
        player.shock(3.0).unwrap();
        player.add_skill_combo().unwrap();

        player.reset_values().unwrap();
        for ability in Ability::ALL {
            assert!(player.is_ready(ability), "{ability} should be ready");
        }
        assert!(player.cooldowns().get(Ability::Q).pending().is_none());
        assert!(!player.status().intersects(StatusFlags::INTERRUPTIBLE | StatusFlags::SHOCKED));
        assert_eq!(player.skill_combo_count(), 0);
        assert!(sent(&player, &Notification::SkillBan { banned: false }));
    }

    #[test]
    fn attack_combo_resets() {
        let mut world = world();
        let mut player = player();
        player.attack(&mut world).unwrap();
        player.finish_current_action(&mut world, Behavior::Attack).unwrap();
        player.attack(&mut world).unwrap();
        assert_eq!(player.combo_count(), 2);
        player.reset_attack_combo().unwrap();
        assert_eq!(player.combo_count(), 0);
        assert!(sent(
            &player,
            &Notification::StopMontage {
                montage: "Attack".to_string(),
                blend_out: 0.2
            }
        ));
    }
}

// =============================================================================
// Crowd control
// =============================================================================

mod crowd_control_tests {
    use super::*;

    #[test]
    fn stun_interrupts_skill_and_recovers() {
        let mut world = world();
        let mut player = player();
        player.skill_q(&mut world).unwrap();
        player.stun(&mut world, 2.0).unwrap();

        assert_eq!(current(&player), Some(Behavior::Stun));
        assert!(player.status().contains(StatusFlags::STUNNED));
        assert!(!player.status().contains(StatusFlags::SKILL_Q));
        assert!(cooling(&player, Ability::Q));
        assert!(sent(&player, &Notification::StunIndicator { active: true }));
        assert!(matches!(
            player.skill_r(&mut world),
            Err(CombatError::PriorityDenied { .. })
        ));

        player.take_notifications();
        player.advance(&mut world, 2.0).unwrap();
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::STUNNED));
        assert!(sent(&player, &Notification::StunVisual { active: false }));
        assert!(!player.is_ready(Ability::Q));
    }

    #[test]
    fn restun_restarts_timer() {
        let mut world = world();
        let mut player = player();
        player.stun(&mut world, 1.0).unwrap();
        player.advance(&mut world, 0.5).unwrap();
        assert_eq!(
            player.force_play_action(&mut world, Behavior::Stun.action(PLAYER)),
            Ok(Admission::Replayed)
        );
        player.stun(&mut world, 1.0).unwrap();
        player.advance(&mut world, 0.75).unwrap();
        assert!(player.status().contains(StatusFlags::STUNNED));
        player.advance(&mut world, 0.25).unwrap();
        assert!(!player.status().contains(StatusFlags::STUNNED));
    }

    #[test]
    fn stun_breaks_block() {
        let mut world = world();
        let mut player = player();
        player.block(&mut world).unwrap();
        player.stun(&mut world, 1.0).unwrap();
        assert!(!player.status().contains(StatusFlags::BLOCKING));
        assert!(cooling(&player, Ability::Block));
    }

    #[test]
    fn knockback_recovers_and_unlocks_look() {
        let mut world = world();
        let mut player = player();
        player.attack(&mut world).unwrap();
        player.knockback(&mut world).unwrap();
        assert!(player.status().contains(StatusFlags::KNOCKBACKED));
        assert!(!player.status().contains(StatusFlags::ATTACKING));
        assert!(sent(&player, &Notification::StopAllMontages));
        assert!(player.knockback_variant() < 2);

        player.advance(&mut world, 0.5).unwrap();
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::KNOCKBACKED));
        assert!(sent(&player, &Notification::LookLock { locked: false }));
    }

    #[test]
    fn knockback_variant_is_seeded() {
        let mut world = world();
        let mut a = player();
        let mut b = player();
        for _ in 0..5 {
            a.knockback(&mut world).unwrap();
            b.knockback(&mut world).unwrap();
            assert_eq!(a.knockback_variant(), b.knockback_variant());
        }
    }

    #[test]
    fn big_knockback_locks_look() {
        let mut world = world();
        let mut player = player();
        player.big_knockback(&mut world).unwrap();
        assert!(sent(&player, &Notification::LookLock { locked: true }));
        assert!(player.status().contains(StatusFlags::BIG_KNOCKBACKED));
        assert!(player.skill_q(&mut world).is_err());

        player.advance(&mut world, 2.25).unwrap();
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::BIG_KNOCKBACKED));
    }

    #[test]
    fn stun_flags_clear_even_when_replaced() {
        let mut world = world();
        let mut player = player();
        player.stun(&mut world, 1.0).unwrap();
        player.knockback(&mut world).unwrap();
        assert_eq!(current(&player), Some(Behavior::Knockback));
        player.advance(&mut world, 1.0).unwrap();
        assert!(!player.status().contains(StatusFlags::STUNNED));
    }

    #[test]
    fn death_blocks_all_but_respawn() {
        let mut world = world();
        let mut player = player();
        player.skill_q(&mut world).unwrap();
        player.die(&mut world).unwrap();
        assert!(player.status().contains(StatusFlags::DEAD));
        assert!(!player.can_play(1));
        assert_eq!(
            player.skill_r(&mut world),
            Err(CombatError::AlreadyActive { what: "death" })
        );
        assert_eq!(
            player.knockback(&mut world),
            Err(CombatError::AlreadyActive { what: "death" })
        );
        assert_eq!(
            player.stun(&mut world, 1.0),
            Err(CombatError::AlreadyActive { what: "death" })
        );

        player.respawn().unwrap();
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::DEAD));
        assert!(player.is_ready(Ability::Q));
    }
}

// =============================================================================
// Off-hand skills
// =============================================================================

mod offhand_tests {
    use super::*;

    #[test]
    fn double_sword_stealths_self() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::DoubleSword, SubWeaponMode::Sword);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();

        assert!(player.status().contains(StatusFlags::STEALTHED));
        let haste = world.ledger_of(PLAYER).effects_named(Effect::STEALTH_HASTE);
        assert!(matches!(haste.as_slice(), [Effect::StealthHaste { percent }] if (percent - 0.6).abs() < 1e-6));
        assert!(cooling(&player, Ability::E));
        assert!(player
            .pending_notifications()
            .iter()
            .any(|e| e.audience == Audience::Local && e.notification == Notification::Stealthed));
        assert!(player.take_directives().is_empty());
    }

    #[test]
    fn attacking_breaks_stealth() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::DoubleSword, SubWeaponMode::Sword);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        player.finish_current_action(&mut world, Behavior::SkillE).unwrap();

        player.attack(&mut world).unwrap();
        assert!(!player.status().contains(StatusFlags::STEALTHED));
        assert!(!world.ledger_of(PLAYER).has_effect(Effect::STEALTH_HASTE));
        assert!(sent(&player, &Notification::StealthVisual { active: false }));
    }

    #[test]
    fn stealth_expires_and_damage_breaks_it() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::DoubleSword, SubWeaponMode::Sword);
        player.grant_stealth(&mut world).unwrap();
        run_for(&mut player, &mut world, 9.5, 0.5);
        assert!(player.status().contains(StatusFlags::STEALTHED));
        player.advance(&mut world, 0.5).unwrap();
        assert!(!player.status().contains(StatusFlags::STEALTHED));

        let monster = world.spawn_monster(10, Vec3::X * 100.0, MonsterRole::Normal);
        player.grant_stealth(&mut world).unwrap();
        player.on_damaged(&mut world, monster, 0.0, AttackType::NormalAttack).unwrap();
        assert!(player.status().contains(StatusFlags::STEALTHED));
        player.on_damaged(&mut world, monster, 12.0, AttackType::NormalAttack).unwrap();
        assert!(!player.status().contains(StatusFlags::STEALTHED));
    }

    #[test]
    fn second_stealth_restarts_window() {
        let mut world = world();
        let mut player = player();
        player.grant_stealth(&mut world).unwrap();
        player.advance(&mut world, 8.0).unwrap();
        player.grant_stealth(&mut world).unwrap();
        player.advance(&mut world, 8.0).unwrap();
        assert!(player.status().contains(StatusFlags::STEALTHED));
        assert_eq!(world.ledger_of(PLAYER).effects_named(Effect::STEALTH_HASTE).len(), 1);
    }

    #[test]
    fn shield_provokes_nearby_monsters() {
        let mut world = world();
        let near = world.spawn_monster(10, Vec3::new(1000.0, 0.0, 0.0), MonsterRole::Normal);
        world.spawn_monster(11, Vec3::new(2000.0, 0.0, 0.0), MonsterRole::Elite);
        world.spawn_ally(20, Vec3::new(100.0, 0.0, 0.0));

        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::Shield);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        assert_eq!(world.provoked, vec![(near, PLAYER, 3.0)]);
        assert!(cooling(&player, Ability::E));
    }

    #[test]
    fn magic_orb_gives_barrier_to_aimed_ally() {
        let mut world = world();
        let ally = world.spawn_ally(20, Vec3::new(500.0, 0.0, 100.0));
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::MagicOrb);

        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        assert_eq!(player.offhand(), OffhandState::AimingShield { target: None });
        assert!(player.status().contains(StatusFlags::AIMING_SHIELD));

        player.advance(&mut world, 0.1).unwrap();
        assert_eq!(player.offhand(), OffhandState::AimingShield { target: Some(ally) });
        assert!(sent(&player, &Notification::OverlayToggle { target: ally, active: true }));

        player.skill_confirm(&mut world, SkillCommand::E).unwrap();
        assert_eq!(player.offhand(), OffhandState::Idle);
        assert!(player.is_idle());
        assert!(cooling(&player, Ability::E));
        assert!(sent(&player, &Notification::OverlayToggle { target: ally, active: false }));
        assert!(sent(
            &player,
            &Notification::JumpToSection {
                section: "End".to_string()
            }
        ));

        let ledger = world.ledger_of(ally);
        assert_eq!(
            ledger.effects_named(Effect::BARRIER),
            vec![&Effect::Barrier {
                instigator: PLAYER,
                amount: 300.0
            }]
        );
        assert_eq!(ledger.buffs, vec![BuffKind::MagicCrystal]);
        assert!(!world.ledger_of(PLAYER).has_effect(Effect::BARRIER));
    }

    #[test]
    fn magic_orb_without_target_shields_self() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::MagicWand, SubWeaponMode::MagicOrb);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();

        player.skill_confirm(&mut world, SkillCommand::Q).unwrap();
        assert!(player.status().contains(StatusFlags::AIMING_SHIELD));

        player.skill_confirm(&mut world, SkillCommand::Attack).unwrap();
        let ledger = world.ledger_of(PLAYER);
        assert!(ledger.has_effect(Effect::BARRIER));
        assert_eq!(ledger.buffs, vec![BuffKind::UpMagicCrystal]);
    }

    #[test]
    fn magic_orb_needs_running_e() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::MagicOrb);
        player.sub_weapon_skill(&mut world).unwrap();
        assert_eq!(player.offhand(), OffhandState::Idle);
    }

    #[test]
    fn dark_orb_field_slows_monsters() {
        let mut world = world();
        let grunt = world.spawn_monster(10, Vec3::new(800.0, 0.0, 0.0), MonsterRole::Normal);
        let boss = world.spawn_monster(11, Vec3::new(900.0, 0.0, 0.0), MonsterRole::Boss);
        let far = world.spawn_monster(12, Vec3::new(1500.0, 0.0, 0.0), MonsterRole::Normal);
        world.ray = Some(Hit::new(EntityId::new(500), Vec3::new(800.0, 0.0, 0.0)));

        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::DarkMagicOrb);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        let OffhandState::DarkOrbArmed { marker } = player.offhand() else {
            panic!("dark orb should be armed");
        };
        assert!(cooling(&player, Ability::E));

        player.advance(&mut world, 0.1).unwrap();
        assert_eq!(world.moved, vec![(marker, Vec3::new(800.0, 0.0, 0.0))]);

        player.skill_confirm(&mut world, SkillCommand::E).unwrap();
        assert_eq!(world.activated, vec![marker]);
        assert!(player.is_idle());
        assert_eq!(player.dark_orb().map(|field| field.pulses_left), Some(20));

        player.advance(&mut world, 5.0).unwrap();
        assert!(player.dark_orb().is_none());
        assert!(world.destroyed.contains(&marker));

        let slows = world.ledger_of(grunt).effects_named(Effect::SLOW);
        assert_eq!(slows.len(), 20);
        assert!(matches!(slows[0], Effect::Slow { magnitude, duration, .. }
            if (magnitude - 0.3).abs() < 1e-6 && (duration - 0.2).abs() < 1e-6));
        assert_eq!(world.ledger_of(grunt).buffs.len(), 20);
        assert!(world.ledger_of(grunt).buffs.iter().all(|b| *b == BuffKind::IncreasedDamageTaken10));

        let boss_slows = world.ledger_of(boss).effects_named(Effect::SLOW);
        assert!(matches!(boss_slows[0], Effect::Slow { magnitude, .. } if (magnitude - 0.1).abs() < 1e-6));
        assert!(world.ledger_of(far).effects.is_empty());
    }

    #[test]
    fn dark_orb_spawn_failure_still_cools_down() {
        let mut world = world();
        world.fail_spawns = true;
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::DarkMagicOrb);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        assert_eq!(player.offhand(), OffhandState::Idle);
        assert!(cooling(&player, Ability::E));
    }

    #[test]
    fn gravity_projectile_expires() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::MagicWand);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        let OffhandState::GravityInFlight { projectile, .. } = player.offhand() else {
            panic!("projectile should be in flight");
        };
        assert!(player.status().contains(StatusFlags::GRAVITY_IN_FLIGHT));
        assert_eq!(world.fired, vec![(projectile, Vec3::X, 1000.0)]);

        player.advance(&mut world, 1.0).unwrap();
        assert_eq!(player.offhand(), OffhandState::Idle);
        assert_eq!(world.destroyed, vec![projectile]);
    }

    #[test]
    fn gravity_confirm_destroys_early() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::MagicWand);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        player.skill_confirm(&mut world, SkillCommand::E).unwrap();
        assert_eq!(player.offhand(), OffhandState::Idle);
        assert_eq!(world.destroyed.len(), 1);
        assert_eq!(current(&player), Some(Behavior::SkillE));

        player.advance(&mut world, 1.0).unwrap();
        assert_eq!(world.destroyed.len(), 1);
    }

    #[test]
    fn gravity_refire_replaces_projectile() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::MagicWand);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        let OffhandState::GravityInFlight { projectile: first, .. } = player.offhand() else {
            panic!("first projectile should be in flight");
        };

        player.sub_weapon_skill(&mut world).unwrap();
        let OffhandState::GravityInFlight { projectile: second, .. } = player.offhand() else {
            panic!("second projectile should be in flight");
        };
        assert_ne!(first, second);
        assert_eq!(world.destroyed, vec![first]);
        assert_eq!(world.fired.len(), 2);

        player.advance(&mut world, 1.0).unwrap();
        assert_eq!(player.offhand(), OffhandState::Idle);
        assert_eq!(world.destroyed, vec![first, second]);
    }

    #[test]
    fn stun_unwinds_aiming() {
        let mut world = world();
        let ally = world.spawn_ally(20, Vec3::new(500.0, 0.0, 100.0));
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::MagicOrb);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        player.advance(&mut world, 0.1).unwrap();

        player.stun(&mut world, 1.0).unwrap();
        assert_eq!(player.offhand(), OffhandState::Idle);
        assert!(!player.status().contains(StatusFlags::SKILL_E));
        assert!(cooling(&player, Ability::E));
        assert!(sent(&player, &Notification::OverlayToggle { target: ally, active: false }));
        assert!(world.ledger_of(ally).effects.is_empty());
    }

    #[test]
    fn cancel_destroys_armed_marker() {
        let mut world = world();
        let mut player = armed_player(WeaponMode::Sword, SubWeaponMode::DarkMagicOrb);
        player.skill_e(&mut world).unwrap();
        player.sub_weapon_skill(&mut world).unwrap();
        let OffhandState::DarkOrbArmed { marker } = player.offhand() else {
            panic!("dark orb should be armed");
        };
        player.knockback(&mut world).unwrap();
        assert_eq!(world.destroyed, vec![marker]);
        assert_eq!(player.offhand(), OffhandState::Idle);
    }
}

// =============================================================================
// Combat resolution
// =============================================================================

mod resolution_tests {
    use super::*;

    #[test]
    fn monster_takes_scaled_damage() {
        let mut world = world();
        let monster = world.spawn_monster(10, Vec3::new(100.0, 0.0, 0.0), MonsterRole::Normal);
        let mut player = player();

        let request = DamageRequest::new(monster).scales(0.5, 2.0);
        let outcome = player.apply_damage(&mut world, &request).unwrap();
        assert_eq!(outcome, DamageOutcome::Applied { amount: 50.0 });

        let damage = &world.ledger_of(monster).damage;
        assert_eq!(damage.len(), 1);
        assert_eq!(damage[0].instigator, PLAYER);
        assert_eq!(damage[0].attack_type, AttackType::NormalAttack);
        assert!(sent(&player, &Notification::NormalAttackHit { target: monster }));
        assert!(sent(
            &player,
            &Notification::HitEffect {
                target: monster,
                effect: HitEffect::Normal,
                location: Vec3::new(100.0, 0.0, 0.0),
                relative: false
            }
        ));
    }

    #[test]
    fn ap_hit_with_impact_point() {
        let mut world = world();
        let monster = world.spawn_monster(10, Vec3::new(100.0, 0.0, 0.0), MonsterRole::Normal);
        let mut player = player();

        let request = DamageRequest::new(monster)
            .scales(0.5, 2.0)
            .kind(DamageKind::Ap)
            .effect(HitEffect::Strong, Some(Vec3::new(110.0, 0.0, 50.0)));
        let outcome = player.apply_damage(&mut world, &request).unwrap();
        assert_eq!(outcome, DamageOutcome::Applied { amount: 80.0 });
        assert!(sent(
            &player,
            &Notification::HitEffect {
                target: monster,
                effect: HitEffect::Strong,
                location: Vec3::new(10.0, 0.0, 50.0),
                relative: true
            }
        ));
    }

    #[test]
    fn damageable_is_only_notified() {
        let mut world = world();
        let crate_id = EntityId::new(30);
        world.spawn(crate_id, TargetKind::Damageable, Vec3::X * 50.0);
        let mut player = player();

        let outcome = player
            .apply_damage(&mut world, &DamageRequest::new(crate_id).scales(9.0, 9.0))
            .unwrap();
        assert_eq!(outcome, DamageOutcome::Forwarded);
        assert_eq!(world.notified, vec![(crate_id, PLAYER)]);
        assert!(world.ledger_of(crate_id).damage.is_empty());
    }

    #[test]
    fn characters_and_buildings_are_ignored() {
        let mut world = world();
        let ally = world.spawn_ally(20, Vec3::X * 50.0);
        let tower = EntityId::new(40);
        world.spawn(tower, TargetKind::Building, Vec3::X * 80.0);
        let mut player = player();

        for target in [ally, tower] {
            let outcome = player.apply_damage(&mut world, &DamageRequest::new(target)).unwrap();
            assert_eq!(outcome, DamageOutcome::Ignored);
            assert!(world.ledger_of(target).damage.is_empty());
        }
    }

    #[test]
    fn skill_actor_takes_damage_without_effect() {
        let mut world = world();
        let totem = EntityId::new(50);
        world.spawn(totem, TargetKind::SkillActorWithStats, Vec3::X * 50.0);
        let mut player = player();
        let outcome = player
            .apply_skill_damage(&mut world, Ability::R, totem, DamageKind::Ad)
            .unwrap();
        assert_eq!(outcome, DamageOutcome::Applied { amount: 100.0 });
        let event = &world.ledger_of(totem).damage[0];
        assert_eq!(event.attack_type, AttackType::Skill);
        assert_eq!(event.skill_name, "SkillR");
        assert!(!player
            .pending_notifications()
            .iter()
            .any(|e| matches!(e.notification, Notification::HitEffect { .. } | Notification::NormalAttackHit { .. })));
    }

    #[test]
    fn sphere_query_filters_and_dedupes() {
        let mut world = world();
        world.duplicate_hits = true;
        let monster = world.spawn_monster(10, Vec3::new(100.0, 0.0, 0.0), MonsterRole::Normal);
        let ally = world.spawn_ally(20, Vec3::new(200.0, 0.0, 0.0));
        let barrel = EntityId::new(30);
        world.spawn(barrel, TargetKind::Damageable, Vec3::new(300.0, 0.0, 0.0));
        world.spawn(EntityId::new(31), TargetKind::Other, Vec3::new(250.0, 0.0, 0.0));
        let mut player = player();

        let start = Vec3::ZERO;
        let end = Vec3::new(400.0, 0.0, 0.0);
        let hits = player.sphere_query(&world, start, end, 60.0, false).unwrap();
        let actors: Vec<_> = hits.iter().map(|hit| hit.actor).collect();
        assert_eq!(actors, vec![monster, barrel]);
        assert!(sent(&player, &Notification::CrosshairHitReact));

        let hits = player.sphere_query(&world, start, end, 60.0, true).unwrap();
        let actors: Vec<_> = hits.iter().map(|hit| hit.actor).collect();
        assert_eq!(actors, vec![monster, ally, barrel]);
    }

    #[test]
    fn empty_query_sends_no_feedback() {
        let world = world();
        let mut player = player();
        let hits = player
            .sphere_query(&world, Vec3::ZERO, Vec3::X * 100.0, 10.0, true)
            .unwrap();
        assert!(hits.is_empty());
        assert!(player.pending_notifications().is_empty());
    }

    #[test]
    fn aim_prefers_far_hits() {
        let mut world = world();
        let player = player();

        world.ray = Some(Hit::new(EntityId::new(60), Vec3::new(2050.0, 0.0, 2100.0)));
        let far = player.aim_at_crosshair(&world, false).unwrap();
        assert!((far.rotation.pitch - 45.0).abs() < 1e-3);
        assert_eq!(far.location, Vec3::new(50.0, 0.0, 100.0));

        world.ray = Some(Hit::new(EntityId::new(60), Vec3::new(60.0, 0.0, 600.0)));
        let near = player.aim_at_crosshair(&world, false).unwrap();
        assert!(near.rotation.pitch.abs() < 1e-3);
        assert!(near.hit.is_some());

        let lobbed = player.aim_at_crosshair(&world, true).unwrap();
        assert!((lobbed.rotation.pitch - 3.0).abs() < 1e-3);
        assert!(lobbed.hit.is_none());
    }
}

// =============================================================================
// Server
// =============================================================================

mod server_tests {
    use super::*;

    fn server_with(combatants: Vec<crate::combatant::Combatant>) -> CombatServer {
        let mut server = CombatServer::new();
        for combatant in combatants {
            server.join(combatant).unwrap();
        }
        server
    }

    #[test]
    fn play_action_cannot_raise_the_dead() {
        let mut world = world();
        let mut server = server_with(vec![player()]);
        server.combatant_mut(PLAYER).unwrap().die(&mut world).unwrap();

        let mut forged = Behavior::Attack.action(PLAYER);
        forged.action_level = 0;
        server.submit(PLAYER, Command::PlayAction(forged)).unwrap();
        server
            .submit(PLAYER, Command::PlayAction(Behavior::Attack.action(PLAYER)))
            .unwrap();
        server.step(&mut world, 0.0);

        let player = server.combatant(PLAYER).unwrap();
        assert_eq!(current(player), Some(Behavior::Dead));
        assert!(player.status().contains(StatusFlags::DEAD));
        assert!(!player.status().contains(StatusFlags::ATTACKING));
    }

    #[test]
    fn play_action_respects_cooldowns() {
        let mut world = world();
        let mut server = server_with(vec![player()]);
        {
            let player = server.combatant_mut(PLAYER).unwrap();
            player.skill_q(&mut world).unwrap();
            assert_eq!(player.finish_current_action(&mut world, Behavior::SkillQ), Ok(true));
            assert!(!player.is_ready(Ability::Q));
        }

        server
            .submit(PLAYER, Command::PlayAction(Behavior::SkillQ.action(PLAYER)))
            .unwrap();
        server.step(&mut world, 0.0);

        let player = server.combatant(PLAYER).unwrap();
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::SKILL_Q));
        assert!(cooling(player, Ability::Q));
    }

    #[test]
    fn play_action_only_takes_canonical_voluntary_actions() {
        let mut world = world();
        let mut player = player();

        assert!(matches!(
            player.handle(&mut world, Command::PlayAction(Behavior::Stun.action(PLAYER))),
            Err(CombatError::InvalidActionDefinition { .. })
        ));
        let mut strong_block = Behavior::Block.action(PLAYER);
        strong_block.cancel_level = 0;
        assert!(matches!(
            player.handle(&mut world, Command::PlayAction(strong_block)),
            Err(CombatError::InvalidActionDefinition { .. })
        ));
        assert!(player.is_idle());
        assert!(!player.status().contains(StatusFlags::STUNNED));

        player
            .handle(&mut world, Command::PlayAction(Behavior::Attack.action(PLAYER).named("combo")))
            .unwrap();
        assert_eq!(current(&player), Some(Behavior::Attack));
        assert!(player.status().contains(StatusFlags::ATTACKING));
    }

    #[test]
    fn commands_run_in_order_and_failures_drop() {
        init_tracing();
        let mut world = world();
        let mut server = server_with(vec![player()]);
        server.submit(PLAYER, Command::Dash(DashDirection::Front)).unwrap();
        server.submit(PLAYER, Command::Block).unwrap();
        server.submit(PLAYER, Command::SkillConfirm(SkillCommand::E)).unwrap();

        let envelopes = server.step(&mut world, 0.0);
        assert_eq!(server.queued(PLAYER), Some(0));
        let player = server.combatant(PLAYER).unwrap();
        assert_eq!(current(player), Some(Behavior::Dash));
        assert!(player.is_ready(Ability::Block));
        assert_eq!(
            notifications(&envelopes).first(),
            Some(&&Notification::PlayMontage {
                montage: "Dash_F".to_string(),
                rate: 1.0
            })
        );
    }

    #[test]
    fn step_advances_every_clock() {
        let mut world = world();
        let other = EntityId::new(2);
        world.spawn_ally(2, Vec3::X * 5000.0);
        let mut server = server_with(vec![
            player(),
            crate::combatant::Combatant::new(other, NetRole::Authority, CombatConfig::default())
                .with_montages(crate::combatant::MontageSet::complete()),
        ]);
        server.submit(PLAYER, Command::Block).unwrap();
        server.submit(other, Command::Block).unwrap();
        server.step(&mut world, 0.5);
        server.step(&mut world, 0.5);
        for id in [PLAYER, other] {
            let combatant = server.combatant(id).unwrap();
            assert!(combatant.is_idle());
            assert!((combatant.now() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn sword_hiding_stealths_allies_through_the_server() {
        let mut world = world();
        let ally = world.spawn_ally(2, Vec3::new(500.0, 0.0, 100.0));
        world.spawn_ally(3, Vec3::new(5000.0, 0.0, 0.0));
        let mut server = server_with(vec![
            armed_player(WeaponMode::Sword, SubWeaponMode::Sword),
            crate::combatant::Combatant::new(ally, NetRole::Authority, CombatConfig::default()),
            crate::combatant::Combatant::new(EntityId::new(3), NetRole::Authority, CombatConfig::default()),
        ]);

        server.submit(PLAYER, Command::SkillE).unwrap();
        server.step(&mut world, 0.0);
        server
            .combatant_mut(PLAYER)
            .unwrap()
            .sub_weapon_skill(&mut world)
            .unwrap();
        let envelopes = server.step(&mut world, 0.0);

        assert!(server.combatant(PLAYER).unwrap().status().contains(StatusFlags::STEALTHED));
        assert!(server.combatant(ally).unwrap().status().contains(StatusFlags::STEALTHED));
        assert!(!server
            .combatant(EntityId::new(3))
            .unwrap()
            .status()
            .contains(StatusFlags::STEALTHED));
        assert!(envelopes
            .iter()
            .any(|e| e.source == ally && e.notification == Notification::StealthVisual { active: true }));
    }

    #[test]
    fn proxy_follows_authority_snapshots() {
        let mut world = world();
        let mut server = server_with(vec![player()]);
        server.submit(PLAYER, Command::SkillE).unwrap();
        server.step(&mut world, 0.0);

        let snapshot = server.combatant(PLAYER).unwrap().snapshot();
        assert!(snapshot.skill_e);

        let mut proxy = crate::combatant::Combatant::new(PLAYER, NetRole::AutonomousProxy, CombatConfig::default());
        proxy.apply_snapshot(&snapshot).unwrap();
        assert_eq!(current(&proxy), Some(Behavior::SkillE));
        assert!(!proxy.is_ready(Ability::E));
        assert!(matches!(
            proxy.skill_q(&mut world),
            Err(CombatError::AuthorityViolation { .. })
        ));

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: crate::net::ReplicatedState = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
