//! Tunable combat parameters.
//!
//! [`CombatConfig`] groups every number the combat core reads at runtime:
//! cooldown base durations, skill radii and timings, crowd-control recovery
//! times, skill damage ratios, and the RNG seed. `Default` yields the shipped
//! values; JSON documents may override any subset of fields.
//!
//! # Example
//!
//! ```
//! use combat_core::config::CombatConfig;
//!
//! let config = CombatConfig::from_json_str(r#"{ "cooldowns": { "q": 8.0 } }"#).unwrap();
//! assert!((config.cooldowns.q - 8.0).abs() < f32::EPSILON);
//! assert!((config.cooldowns.e - 5.0).abs() < f32::EPSILON);
//! ```

use serde::{Deserialize, Serialize};

use crate::cooldown::Ability;
use crate::error::ConfigError;

/// Base cooldown durations in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownTable {
    /// Q skill.
    pub q: f32,
    /// E skill.
    pub e: f32,
    /// R skill.
    pub r: f32,
    /// Dash.
    pub dash: f32,
    /// Block.
    pub block: f32,
}

impl CooldownTable {
    /// Default Q, E and R duration.
    pub const DEFAULT_SKILL: f32 = 5.0;
    /// Default dash duration.
    pub const DEFAULT_DASH: f32 = 5.0;
    /// Default block duration.
    pub const DEFAULT_BLOCK: f32 = 1.5;

    /// Base duration for one ability.
    #[must_use]
    pub const fn get(&self, ability: Ability) -> f32 {
        match ability {
            Ability::Q => self.q,
            Ability::E => self.e,
            Ability::R => self.r,
            Ability::Dash => self.dash,
            Ability::Block => self.block,
        }
    }
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self {
            q: Self::DEFAULT_SKILL,
            e: Self::DEFAULT_SKILL,
            r: Self::DEFAULT_SKILL,
            dash: Self::DEFAULT_DASH,
            block: Self::DEFAULT_BLOCK,
        }
    }
}

/// Sword off-hand stealth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthConfig {
    /// Seconds a stealth lasts before it expires.
    pub duration: f32,
    /// Movement speed bonus while stealthed (0.3 = +30%).
    pub haste_percent: f32,
    /// Haste multiplier for dual-sword wielders.
    pub double_sword_multiplier: f32,
    /// Radius searched for allies to stealth.
    pub ally_search_radius: f32,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            duration: 10.0,
            haste_percent: 0.3,
            double_sword_multiplier: 2.0,
            ally_search_radius: 1000.0,
        }
    }
}

/// Shield off-hand provocation and magic-orb barrier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Barrier amount as a fraction of the caster's max health.
    pub barrier_fraction: f32,
    /// Radius searched for monsters to provoke.
    pub provocation_radius: f32,
    /// Seconds provoked monsters stay focused on the caster.
    pub provocation_seconds: f32,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            barrier_fraction: 0.3,
            provocation_radius: 1500.0,
            provocation_seconds: 3.0,
        }
    }
}

/// Dark magic orb ground field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DarkOrbConfig {
    /// Seconds between field pulses.
    pub tick_interval: f32,
    /// Total seconds the field pulses for.
    pub duration: f32,
    /// Pulse radius.
    pub radius: f32,
    /// Slow applied to regular monsters.
    pub slow: f32,
    /// Slow applied to boss-tier monsters.
    pub boss_slow: f32,
    /// Seconds each pulse's slow lasts.
    pub slow_duration: f32,
}

impl DarkOrbConfig {
    /// Number of pulses one field fires.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tick_count(&self) -> u32 {
        if self.tick_interval <= 0.0 {
            return 0;
        }
        let ticks = (self.duration / self.tick_interval).round();
        if ticks < 1.0 {
            1
        } else {
            // bounded by validate()
            ticks as u32
        }
    }
}

impl Default for DarkOrbConfig {
    fn default() -> Self {
        Self {
            tick_interval: 0.2,
            duration: 4.0,
            radius: 250.0,
            slow: 0.3,
            boss_slow: 0.1,
            slow_duration: 0.2,
        }
    }
}

/// Gravity projectile of the magic wand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    /// Launch speed.
    pub speed: f32,
    /// Seconds before the projectile is destroyed.
    pub lifetime: f32,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            speed: 1000.0,
            lifetime: 1.0,
        }
    }
}

/// Crosshair aiming and the aim poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimConfig {
    /// Length of the camera ray.
    pub trace_distance: f32,
    /// Surface hits closer than this to the spawn socket are not aimed at.
    pub min_hit_distance: f32,
    /// Distance along the camera ray used when the surface hit is too close.
    pub fallback_distance: f32,
    /// Upward pitch added for gravity-affected projectiles, in degrees.
    pub gravity_pitch_bias: f32,
    /// Length of the per-tick aim poll ray.
    pub poll_distance: f32,
    /// Radius of the ally-targeting sweep during the aim poll.
    pub poll_radius: f32,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            trace_distance: 5000.0,
            min_hit_distance: 1200.0,
            fallback_distance: 2000.0,
            gravity_pitch_bias: 3.0,
            poll_distance: 4000.0,
            poll_radius: 50.0,
        }
    }
}

/// Crowd-control recovery timings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdControlConfig {
    /// Seconds until a small knockback recovers.
    pub knockback_reset: f32,
    /// Seconds until a big knockback recovers.
    pub big_knockback_reset: f32,
    /// Number of small knockback animation variants to choose from.
    pub knockback_variants: u32,
}

impl Default for CrowdControlConfig {
    fn default() -> Self {
        Self {
            knockback_reset: 0.5,
            big_knockback_reset: 2.2,
            knockback_variants: 2,
        }
    }
}

/// Guard stance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    /// Seconds the guard effect protects.
    pub guard_duration: f32,
    /// Seconds the stance is held before it ends on its own.
    pub hold: f32,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            guard_duration: 0.3,
            hold: 1.0,
        }
    }
}

/// AD/AP damage ratio of one skill.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ratio {
    /// Multiplier on the caster's final AD.
    pub ad: f32,
    /// Multiplier on the caster's final AP.
    pub ap: f32,
}

impl Default for Ratio {
    fn default() -> Self {
        Self { ad: 1.0, ap: 1.0 }
    }
}

/// Per-skill damage ratios (`0.5` = half the caster's final stat per hit).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillRatios {
    /// Q skill.
    pub q: Ratio,
    /// E skill.
    pub e: Ratio,
    /// R skill.
    pub r: Ratio,
}

impl SkillRatios {
    /// Ratio of a skill slot. Dash and Block deal no skill damage.
    #[must_use]
    pub const fn get(&self, ability: Ability) -> Option<Ratio> {
        match ability {
            Ability::Q => Some(self.q),
            Ability::E => Some(self.e),
            Ability::R => Some(self.r),
            Ability::Dash | Ability::Block => None,
        }
    }
}

/// Every tunable of a combatant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Cooldown base durations.
    pub cooldowns: CooldownTable,
    /// Stealth.
    pub stealth: StealthConfig,
    /// Provocation and barrier.
    pub shield: ShieldConfig,
    /// Dark-orb field.
    pub dark_orb: DarkOrbConfig,
    /// Gravity projectile.
    pub gravity: GravityConfig,
    /// Crosshair aiming.
    pub aim: AimConfig,
    /// Crowd-control recovery.
    pub crowd_control: CrowdControlConfig,
    /// Guard stance.
    pub block: BlockConfig,
    /// Skill damage ratios.
    pub ratios: SkillRatios,
    /// Attack animation play rate.
    pub attack_speed: f32,
    /// Divisor applied to the E cooldown for dual-sword wielders.
    pub e_cooldown_divisor_double_sword: f32,
    /// Seed of the combatant's RNG (knockback variants).
    pub rng_seed: u64,
}

impl CombatConfig {
    /// Default attack animation rate.
    pub const DEFAULT_ATTACK_SPEED: f32 = 1.0;
    /// Default dual-sword E cooldown divisor.
    pub const DEFAULT_E_DIVISOR: f32 = 3.0;
    /// Default RNG seed.
    pub const DEFAULT_RNG_SEED: u64 = 0x00C0_FFEE;

    /// Parses a JSON document and validates it. Missing fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed JSON, [`ConfigError::Invalid`] for
    /// values that fail [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("cooldowns.q", self.cooldowns.q),
            ("cooldowns.e", self.cooldowns.e),
            ("cooldowns.r", self.cooldowns.r),
            ("cooldowns.dash", self.cooldowns.dash),
            ("cooldowns.block", self.cooldowns.block),
            ("stealth.duration", self.stealth.duration),
            ("shield.provocation_seconds", self.shield.provocation_seconds),
            ("dark_orb.duration", self.dark_orb.duration),
            ("dark_orb.slow_duration", self.dark_orb.slow_duration),
            ("gravity.lifetime", self.gravity.lifetime),
            ("crowd_control.knockback_reset", self.crowd_control.knockback_reset),
            ("crowd_control.big_knockback_reset", self.crowd_control.big_knockback_reset),
            ("block.guard_duration", self.block.guard_duration),
            ("block.hold", self.block.hold),
        ];
        for (field, value) in durations {
            non_negative(field, value)?;
        }

        let fractions = [
            ("shield.barrier_fraction", self.shield.barrier_fraction),
            ("dark_orb.slow", self.dark_orb.slow),
            ("dark_orb.boss_slow", self.dark_orb.boss_slow),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{value} is outside [0, 1]")));
            }
        }

        positive("dark_orb.tick_interval", self.dark_orb.tick_interval)?;
        if self.dark_orb.duration / self.dark_orb.tick_interval > 10_000.0 {
            return Err(invalid(
                "dark_orb.tick_interval",
                "more than 10000 pulses per field".to_string(),
            ));
        }
        positive("attack_speed", self.attack_speed)?;
        positive(
            "e_cooldown_divisor_double_sword",
            self.e_cooldown_divisor_double_sword,
        )?;
        positive("aim.trace_distance", self.aim.trace_distance)?;
        positive("aim.poll_distance", self.aim.poll_distance)?;
        non_negative("aim.poll_radius", self.aim.poll_radius)?;
        non_negative("stealth.haste_percent", self.stealth.haste_percent)?;
        if self.crowd_control.knockback_variants == 0 {
            return Err(invalid(
                "crowd_control.knockback_variants",
                "at least one variant is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            cooldowns: CooldownTable::default(),
            stealth: StealthConfig::default(),
            shield: ShieldConfig::default(),
            dark_orb: DarkOrbConfig::default(),
            gravity: GravityConfig::default(),
            aim: AimConfig::default(),
            crowd_control: CrowdControlConfig::default(),
            block: BlockConfig::default(),
            ratios: SkillRatios::default(),
            attack_speed: Self::DEFAULT_ATTACK_SPEED,
            e_cooldown_divisor_double_sword: Self::DEFAULT_E_DIVISOR,
            rng_seed: Self::DEFAULT_RNG_SEED,
        }
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} must be a finite, non-negative number")))
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} must be a finite, positive number")))
    }
}
