//! The combatant: one character's action slot, cooldowns, status and skills.
//!
//! # Architecture
//!
//! A [`Combatant`] pairs an [`Arbitrator`] with the state its handlers work
//! on. Every entry point builds a typed [`Action`] of [`Behavior`]s and asks
//! the arbitrator for the slot; the arbitrator runs handlers through a
//! short-lived `Dispatch` host that borrows the state and the caller's
//! [`World`]. Delayed work (cooldowns, recoveries, stealth, dark-orb pulses)
//! is scheduled on the combatant's own [`Scheduler`] and dispatched by
//! [`Combatant::advance`].
//!
//! Everything the outside should see is queued in the combatant's
//! [`Outbox`] and drained with [`Combatant::take_notifications`]. Requests
//! aimed at other combatants (ally stealth) are queued as [`Directive`]s.
//!
//! # Entry point checks
//!
//! In order: authority, missing asset, readiness, then arbitration. A failed
//! check changes nothing.
//!
//! # Example
//!
//! ```
//! use combat_core::combatant::Combatant;
//! use combat_core::config::CombatConfig;
//! use combat_core::entity::EntityId;
//! use combat_core::net::NetRole;
//! use combat_core::status::StatusFlags;
//!
//! let combatant = Combatant::new(EntityId::new(1), NetRole::Authority, CombatConfig::default());
//! assert!(combatant.is_idle());
//! assert_eq!(combatant.status(), StatusFlags::empty());
//! assert!(combatant.can_equip_item());
//! ```

mod behavior;
mod crowd_control;
mod offhand;

pub use behavior::{
    Behavior, DashDirection, Loadout, MontageSet, SkillCommand, SubWeaponMode, WeaponMode,
};
pub use offhand::{DarkOrbField, Directive, OffhandState};

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::action::{Action, ActionHost, Admission, Arbitrator, HandlerPhase};
use crate::combat::{self, AimSolution, DamageOutcome, DamageRequest};
use crate::config::{CombatConfig, Ratio};
use crate::cooldown::{Ability, Cooldowns};
use crate::entity::{EntityId, Hit};
use crate::error::CombatError;
use crate::ledger::{AttackType, DamageKind};
use crate::net::{Command, CooldownView, Envelope, NetRole, Notification, Outbox, ReplicatedState};
use crate::status::StatusFlags;
use crate::timer::{Scheduler, TimerEvent, TimerToken};
use crate::world::World;

/// Action level an equipment change needs.
pub const EQUIP_LEVEL: i32 = 5;

/// State the action handlers operate on.
#[derive(Debug)]
struct CombatState {
    id: EntityId,
    config: CombatConfig,
    montages: MontageSet,
    loadout: Loadout,
    cooldowns: Cooldowns,
    timers: Scheduler<TimerEvent>,
    status: StatusFlags,
    offhand: OffhandState,
    dark_orb: Option<DarkOrbField>,
    dark_orb_location: Option<Vec3>,
    dash_direction: DashDirection,
    attack_speed: f32,
    combo_count: u32,
    skill_combo_count: u32,
    stun_duration: f32,
    knockback_variant: u32,
    stealth_timer: Option<TimerToken>,
    stun_timer: Option<TimerToken>,
    shock_timer: Option<TimerToken>,
    knockback_timer: Option<TimerToken>,
    big_knockback_timer: Option<TimerToken>,
    block_timer: Option<TimerToken>,
    rng: ChaCha8Rng,
    outbox: Outbox,
    directives: Vec<Directive>,
}

impl CombatState {
    fn reset_values(&mut self) {
        self.combo_count = 0;
        self.skill_combo_count = 0;
        self.status.remove(
            StatusFlags::INTERRUPTIBLE
                | StatusFlags::BLOCKING
                | StatusFlags::STUNNED
                | StatusFlags::SHOCKED,
        );
        for ability in Ability::SKILLS {
            self.cooldowns.reset(ability, &mut self.timers);
        }
        self.cooldowns.mark_ready(Ability::Dash);
        self.cooldowns.mark_ready(Ability::Block);
        for token in [self.stun_timer.take(), self.shock_timer.take()].into_iter().flatten() {
            self.timers.cancel(token);
        }
        self.outbox.owning_client(Notification::SkillBan { banned: false });
        self.outbox.owning_client(Notification::StunIndicator { active: false });
    }
}

/// Runs [`Behavior`] handlers for the arbitrator.
struct Dispatch<'a, 'w> {
    state: &'a mut CombatState,
    world: &'a mut (dyn World + 'w),
}

impl Dispatch<'_, '_> {
    fn finish(&mut self, handler: Behavior, cancelled: bool) {
        let world = &mut *self.world;
        match handler {
            Behavior::Attack => self.state.finish_attack(),
            Behavior::Dash => self.state.finish_dash(),
            Behavior::SkillQ => self.state.finish_skill(Ability::Q),
            Behavior::SkillE => self.state.finish_skill_e(world, cancelled),
            Behavior::SkillR => self.state.finish_skill(Ability::R),
            Behavior::Block => self.state.finish_block(world),
            Behavior::Stun => self.state.recover_stun(),
            Behavior::Knockback => self.state.recover_knockback(),
            Behavior::BigKnockback => self.state.recover_big_knockback(),
            Behavior::Dead => {}
        }
    }
}

impl ActionHost<Behavior> for Dispatch<'_, '_> {
    fn resolves(&self, owner: EntityId, handler: &Behavior, phase: HandlerPhase) -> bool {
        owner == self.state.id && handler.supports(phase)
    }

    fn check_play(&self, handler: &Behavior) -> Result<(), CombatError> {
        self.state.check_play(*handler)
    }

    fn play(&mut self, handler: &Behavior) -> Result<(), CombatError> {
        let world = &mut *self.world;
        match handler {
            Behavior::Attack => self.state.play_attack(world),
            Behavior::Dash => self.state.play_dash(),
            Behavior::SkillQ => self.state.play_skill(Ability::Q),
            Behavior::SkillE => self.state.play_skill(Ability::E),
            Behavior::SkillR => self.state.play_skill(Ability::R),
            Behavior::Block => self.state.play_block(world),
            Behavior::Stun => {
                self.state.play_stun();
                Ok(())
            }
            Behavior::Knockback => {
                self.state.play_knockback();
                Ok(())
            }
            Behavior::BigKnockback => {
                self.state.play_big_knockback();
                Ok(())
            }
            Behavior::Dead => {
                self.state.play_dead();
                Ok(())
            }
        }
    }

    fn cancel(&mut self, handler: &Behavior) {
        self.finish(*handler, true);
    }

    fn end(&mut self, handler: &Behavior) {
        self.finish(*handler, false);
    }
}

/// One character's combat core.
#[derive(Debug)]
pub struct Combatant {
    role: NetRole,
    arbitrator: Arbitrator<Behavior>,
    state: CombatState,
}

impl Combatant {
    /// Creates an idle combatant with every cooldown ready and no montages.
    ///
    /// The configuration is taken as given; call
    /// [`CombatConfig::validate`] first if it came from outside.
    #[must_use]
    pub fn new(id: EntityId, role: NetRole, config: CombatConfig) -> Self {
        let cooldowns = Cooldowns::new(&config.cooldowns, config.e_cooldown_divisor_double_sword);
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed ^ id.as_u64());
        let attack_speed = config.attack_speed;
        Self {
            role,
            arbitrator: Arbitrator::new(),
            state: CombatState {
                id,
                config,
                montages: MontageSet::default(),
                loadout: Loadout::default(),
                cooldowns,
                timers: Scheduler::new(),
                status: StatusFlags::empty(),
                offhand: OffhandState::Idle,
                dark_orb: None,
                dark_orb_location: None,
                dash_direction: DashDirection::Front,
                attack_speed,
                combo_count: 0,
                skill_combo_count: 0,
                stun_duration: 0.0,
                knockback_variant: 0,
                stealth_timer: None,
                stun_timer: None,
                shock_timer: None,
                knockback_timer: None,
                big_knockback_timer: None,
                block_timer: None,
                rng,
                outbox: Outbox::new(id),
                directives: Vec::new(),
            },
        }
    }

    /// Sets the montages at construction time.
    #[must_use]
    pub fn with_montages(mut self, montages: MontageSet) -> Self {
        self.state.montages = montages;
        self
    }

    /// Sets the equipment at construction time.
    #[must_use]
    pub fn with_loadout(mut self, loadout: Loadout) -> Self {
        self.state.loadout = loadout;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.state.id
    }

    /// Network role of this instance.
    #[must_use]
    pub const fn role(&self) -> NetRole {
        self.role
    }

    /// The action occupying the slot.
    #[must_use]
    pub const fn current_action(&self) -> Option<&Action<Behavior>> {
        self.arbitrator.current()
    }

    /// Returns `true` when no action occupies the slot.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.arbitrator.is_idle()
    }

    /// The arbitrator, for inspection.
    #[must_use]
    pub const fn arbitrator(&self) -> &Arbitrator<Behavior> {
        &self.arbitrator
    }

    /// Returns `true` if an action of `level` would be admitted now.
    #[must_use]
    pub fn can_play(&self, level: i32) -> bool {
        self.arbitrator.can_play(level)
    }

    /// Returns `true` if equipment may be changed now.
    #[must_use]
    pub fn can_equip_item(&self) -> bool {
        self.can_play(EQUIP_LEVEL)
    }

    /// Full status word, including the armed off-hand sub-state.
    #[must_use]
    pub fn status(&self) -> StatusFlags {
        self.state.status | self.state.offhand.flag()
    }

    /// Armed off-hand sub-state.
    #[must_use]
    pub const fn offhand(&self) -> OffhandState {
        self.state.offhand
    }

    /// Running dark-orb field, if any.
    #[must_use]
    pub const fn dark_orb(&self) -> Option<&DarkOrbField> {
        self.state.dark_orb.as_ref()
    }

    /// Cooldown tracker.
    #[must_use]
    pub const fn cooldowns(&self) -> &Cooldowns {
        &self.state.cooldowns
    }

    /// Returns `true` if `ability` is off cooldown.
    #[must_use]
    pub const fn is_ready(&self, ability: Ability) -> bool {
        self.state.cooldowns.is_ready(ability)
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.state.config
    }

    /// Equipped weapons.
    #[must_use]
    pub const fn loadout(&self) -> Loadout {
        self.state.loadout
    }

    /// Montages.
    #[must_use]
    pub const fn montages(&self) -> &MontageSet {
        &self.state.montages
    }

    /// Attack animation rate.
    #[must_use]
    pub const fn attack_speed(&self) -> f32 {
        self.state.attack_speed
    }

    /// Consecutive attacks since the last combo reset.
    #[must_use]
    pub const fn combo_count(&self) -> u32 {
        self.state.combo_count
    }

    /// Skill combo counter.
    #[must_use]
    pub const fn skill_combo_count(&self) -> u32 {
        self.state.skill_combo_count
    }

    /// Variant index of the last small knockback.
    #[must_use]
    pub const fn knockback_variant(&self) -> u32 {
        self.state.knockback_variant
    }

    /// Local clock in seconds.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.state.timers.now()
    }

    /// Pending timers, for inspection.
    #[must_use]
    pub const fn timers(&self) -> &Scheduler<TimerEvent> {
        &self.state.timers
    }

    /// Queued notifications, oldest first.
    #[must_use]
    pub fn pending_notifications(&self) -> &[Envelope] {
        self.state.outbox.pending()
    }

    /// Drains queued notifications.
    pub fn take_notifications(&mut self) -> Vec<Envelope> {
        self.state.outbox.take()
    }

    /// Drains queued requests for other combatants.
    pub fn take_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.state.directives)
    }

    // -------------------------------------------------------------------------
    // Arbitration
    // -------------------------------------------------------------------------

    fn authorize(&self, operation: &'static str) -> Result<(), CombatError> {
        if self.role.is_authority() {
            return Ok(());
        }
        tracing::error!(id = %self.state.id, role = %self.role, operation, "mutating call on non-authoritative role");
        Err(CombatError::AuthorityViolation { role: self.role })
    }

    fn missing_asset(&self, ability: &str) -> CombatError {
        tracing::error!(id = %self.state.id, ability, "missing montage");
        CombatError::missing_asset(ability)
    }

    fn require_ready(&self, ability: Ability) -> Result<(), CombatError> {
        if self.state.cooldowns.is_ready(ability) {
            Ok(())
        } else {
            Err(CombatError::NotReady { ability })
        }
    }

    fn require_alive(&self) -> Result<(), CombatError> {
        if self.state.status.contains(StatusFlags::DEAD) {
            Err(CombatError::AlreadyActive { what: "death" })
        } else {
            Ok(())
        }
    }

    fn play(&mut self, world: &mut dyn World, action: Action<Behavior>) -> Result<Admission, CombatError> {
        let mut host = Dispatch {
            state: &mut self.state,
            world,
        };
        self.arbitrator.try_play(&mut host, action)
    }

    fn force(&mut self, world: &mut dyn World, action: Action<Behavior>) -> Result<Admission, CombatError> {
        let mut host = Dispatch {
            state: &mut self.state,
            world,
        };
        self.arbitrator.force_play(&mut host, action)
    }

    fn cancel_current(&mut self, world: &mut dyn World) -> Option<Action<Behavior>> {
        let mut host = Dispatch {
            state: &mut self.state,
            world,
        };
        self.arbitrator.cancel_current(&mut host)
    }

    fn end_current(&mut self, world: &mut dyn World) -> Option<Action<Behavior>> {
        let mut host = Dispatch {
            state: &mut self.state,
            world,
        };
        self.arbitrator.end_current(&mut host)
    }

    fn is_current(&self, behavior: Behavior) -> bool {
        self.arbitrator.bound_play() == Some(&behavior)
    }

    /// Requests the slot for an arbitrary action.
    ///
    /// Trusted authority-side call: it runs none of the asset, readiness or
    /// alive checks of the entry points. Client requests go through
    /// [`handle`](Self::handle) instead.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation` on proxies, otherwise whatever
    /// [`Arbitrator::try_play`] returns.
    pub fn try_play_action(
        &mut self,
        world: &mut dyn World,
        action: Action<Behavior>,
    ) -> Result<Admission, CombatError> {
        self.authorize("try_play_action")?;
        self.play(world, action)
    }

    /// Plays an action with its action level forced to 0.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation` on proxies, an invalid definition, or a failing
    /// play handler.
    pub fn force_play_action(
        &mut self,
        world: &mut dyn World,
        action: Action<Behavior>,
    ) -> Result<Admission, CombatError> {
        self.authorize("force_play_action")?;
        self.force(world, action)
    }

    /// Executes a client command.
    ///
    /// # Errors
    ///
    /// Whatever the matching entry point returns. A `PlayAction` that is not
    /// the canonical action of a voluntary behavior is an
    /// `InvalidActionDefinition`.
    pub fn handle(&mut self, world: &mut dyn World, command: Command) -> Result<(), CombatError> {
        match command {
            Command::PlayAction(action) => self.play_requested(world, action),
            Command::Attack => self.attack(world),
            Command::Dash(direction) => self.dash(world, direction),
            Command::SkillQ => self.skill_q(world),
            Command::SkillE => self.skill_e(world),
            Command::SkillR => self.skill_r(world),
            Command::Block => self.block(world),
            Command::SkillConfirm(input) => self.skill_confirm(world, input),
        }
    }

    /// Runs a client-built action through the entry point of its play
    /// handler. The client cannot pick levels or handlers.
    fn play_requested(&mut self, world: &mut dyn World, action: Action<Behavior>) -> Result<(), CombatError> {
        self.authorize("play_requested")?;
        let behavior = action.handlers.play;
        if action != behavior.action(self.state.id) {
            return Err(self.rejected_request(action, "differs from the canonical action"));
        }
        match behavior {
            Behavior::Attack => self.attack(world),
            Behavior::Dash => self.dash(world, self.state.dash_direction),
            Behavior::SkillQ => self.skill_q(world),
            Behavior::SkillE => self.skill_e(world),
            Behavior::SkillR => self.skill_r(world),
            Behavior::Block => self.block(world),
            Behavior::Stun | Behavior::Knockback | Behavior::BigKnockback | Behavior::Dead => {
                Err(self.rejected_request(action, "is applied by the authority only"))
            }
        }
    }

    fn rejected_request(&self, action: Action<Behavior>, reason: &str) -> CombatError {
        let reason = format!("requested {:?} {reason}", action.handlers.play);
        tracing::error!(id = %self.state.id, action = %action, %reason, "client action rejected");
        CombatError::InvalidActionDefinition {
            name: action.name,
            reason,
        }
    }

    // -------------------------------------------------------------------------
    // Voluntary actions
    // -------------------------------------------------------------------------

    /// Basic attack.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, `MissingAsset` without an attack montage,
    /// `AlreadyActive` when dead or already attacking, or an arbitration
    /// error.
    pub fn attack(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.authorize("attack")?;
        if self.state.montages.attack.is_empty() {
            return Err(self.missing_asset("Attack"));
        }
        self.require_alive()?;
        if self.state.status.contains(StatusFlags::ATTACKING) {
            return Err(CombatError::AlreadyActive { what: "attack" });
        }
        let action = Behavior::Attack.action(self.state.id);
        self.play(world, action).map(|_| ())
    }

    /// Dash in `direction`.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, `MissingAsset` without a montage for the
    /// direction, `NotReady`, `AlreadyActive` when dead, or an arbitration
    /// error.
    pub fn dash(&mut self, world: &mut dyn World, direction: DashDirection) -> Result<(), CombatError> {
        self.authorize("dash")?;
        if self.state.montages.dash(direction).is_none() {
            return Err(self.missing_asset("Dash"));
        }
        self.require_ready(Ability::Dash)?;
        self.require_alive()?;
        self.state.dash_direction = direction;
        let action = Behavior::Dash.action(self.state.id);
        self.play(world, action).map(|_| ())
    }

    fn skill(&mut self, world: &mut dyn World, ability: Ability, behavior: Behavior) -> Result<(), CombatError> {
        self.authorize("skill")?;
        if self.state.montages.skill(ability).is_none() {
            return Err(self.missing_asset(&ability.to_string()));
        }
        self.require_ready(ability)?;
        self.require_alive()?;
        let action = behavior.action(self.state.id);
        self.play(world, action).map(|_| ())
    }

    /// Q skill.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, `MissingAsset`, `NotReady`, `AlreadyActive` when
    /// dead, or an arbitration error.
    pub fn skill_q(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.skill(world, Ability::Q, Behavior::SkillQ)
    }

    /// E skill. What it does is decided by the sub-weapon when the animation
    /// reaches [`sub_weapon_skill`](Self::sub_weapon_skill).
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, `MissingAsset`, `NotReady`, `AlreadyActive` when
    /// dead, or an arbitration error.
    pub fn skill_e(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.skill(world, Ability::E, Behavior::SkillE)
    }

    /// R skill.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, `MissingAsset`, `NotReady`, `AlreadyActive` when
    /// dead, or an arbitration error.
    pub fn skill_r(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.skill(world, Ability::R, Behavior::SkillR)
    }

    /// Guard stance. Ends on its own after the hold time.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, `NotReady`, `AlreadyActive` when dead, or an
    /// arbitration error.
    pub fn block(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.authorize("block")?;
        self.require_ready(Ability::Block)?;
        self.require_alive()?;
        let action = Behavior::Block.action(self.state.id);
        self.play(world, action).map(|_| ())
    }

    /// Confirm input for an armed E follow-up.
    ///
    /// Only E and attack inputs confirm, and only while the E skill runs.
    /// Other inputs are ignored.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn skill_confirm(&mut self, world: &mut dyn World, input: SkillCommand) -> Result<(), CombatError> {
        self.authorize("skill_confirm")?;
        if !self.state.status.contains(StatusFlags::SKILL_E)
            || !matches!(input, SkillCommand::E | SkillCommand::Attack)
        {
            return Ok(());
        }
        if self.state.confirm_offhand(world) && self.is_current(Behavior::SkillE) {
            self.end_current(world);
        }
        Ok(())
    }

    /// Animation notify during the E skill: runs the sub-weapon effect.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn sub_weapon_skill(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.authorize("sub_weapon_skill")?;
        self.state.sub_weapon_skill(world);
        Ok(())
    }

    /// Puts this combatant into stealth (or restarts the window).
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn grant_stealth(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.authorize("grant_stealth")?;
        self.state.set_stealth(world);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Crowd control
    // -------------------------------------------------------------------------

    /// Stuns for `duration` seconds. Always admitted while alive; a stun
    /// while stunned restarts the timer.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, or `AlreadyActive` when dead.
    pub fn stun(&mut self, world: &mut dyn World, duration: f32) -> Result<(), CombatError> {
        self.authorize("stun")?;
        self.require_alive()?;
        self.state.stun_duration = duration.max(0.0);
        let action = Behavior::Stun.action(self.state.id);
        self.force(world, action).map(|_| ())
    }

    /// Shocks for `duration` seconds. Does not touch the action slot.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn shock(&mut self, duration: f32) -> Result<(), CombatError> {
        self.authorize("shock")?;
        self.state.shock(duration.max(0.0));
        Ok(())
    }

    /// Small knockback.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, `AlreadyActive` when dead, or `PriorityDenied`
    /// under stronger crowd control.
    pub fn knockback(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.authorize("knockback")?;
        self.require_alive()?;
        let action = Behavior::Knockback.action(self.state.id);
        self.play(world, action).map(|_| ())
    }

    /// Big knockback.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, or `AlreadyActive` when dead.
    pub fn big_knockback(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.authorize("big_knockback")?;
        self.require_alive()?;
        let action = Behavior::BigKnockback.action(self.state.id);
        self.play(world, action).map(|_| ())
    }

    /// Death. Takes the slot unconditionally.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn die(&mut self, world: &mut dyn World) -> Result<(), CombatError> {
        self.authorize("die")?;
        let action = Behavior::Dead.action(self.state.id);
        self.force(world, action).map(|_| ())
    }

    /// Leaves death: frees the slot and resets values. Does nothing if alive.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn respawn(&mut self) -> Result<(), CombatError> {
        self.authorize("respawn")?;
        if !self.state.status.contains(StatusFlags::DEAD) {
            return Ok(());
        }
        self.arbitrator.set_default();
        self.state.status.remove(StatusFlags::DEAD);
        self.state.reset_values();
        tracing::debug!(id = %self.state.id, "respawned");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Animation feedback
    // -------------------------------------------------------------------------

    /// Animation end notify. Ends the current action if `behavior` is what it
    /// plays; returns `false` otherwise.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn finish_current_action(&mut self, world: &mut dyn World, behavior: Behavior) -> Result<bool, CombatError> {
        self.authorize("finish_current_action")?;
        if !self.is_current(behavior) {
            return Ok(false);
        }
        self.end_current(world);
        Ok(true)
    }

    /// A montage was interrupted by another one.
    ///
    /// Cancels a running attack unless `montage` is the attack montage
    /// itself, and cancels a running skill.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn montage_interrupted(&mut self, world: &mut dyn World, montage: Option<&str>) -> Result<(), CombatError> {
        self.authorize("montage_interrupted")?;
        let cancel = match self.arbitrator.bound_play() {
            Some(Behavior::Attack) => montage != self.state.montages.attack.first().map(String::as_str),
            Some(Behavior::SkillQ | Behavior::SkillE | Behavior::SkillR) => true,
            _ => false,
        };
        if cancel {
            self.cancel_current(world);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Combat resolution
    // -------------------------------------------------------------------------

    /// The character took damage. Positive damage breaks stealth.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn on_damaged(
        &mut self,
        world: &mut dyn World,
        instigator: EntityId,
        amount: f32,
        attack_type: AttackType,
    ) -> Result<(), CombatError> {
        self.authorize("on_damaged")?;
        tracing::debug!(id = %self.state.id, %instigator, amount, ?attack_type, "damaged");
        if amount > 0.0 {
            self.state.end_stealth(world);
        }
        Ok(())
    }

    /// Deals damage. See [`combat::apply_damage`].
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn apply_damage(&mut self, world: &mut dyn World, request: &DamageRequest) -> Result<DamageOutcome, CombatError> {
        self.authorize("apply_damage")?;
        Ok(combat::apply_damage(self.state.id, world, &mut self.state.outbox, request))
    }

    /// Deals skill damage to `target` using the configured ratio of `ability`.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn apply_skill_damage(
        &mut self,
        world: &mut dyn World,
        ability: Ability,
        target: EntityId,
        kind: DamageKind,
    ) -> Result<DamageOutcome, CombatError> {
        let ratio = self.state.config.ratios.get(ability).unwrap_or_default();
        let request = skill_request(ability, target, ratio).kind(kind);
        self.apply_damage(world, &request)
    }

    /// Swept-sphere hit query. See [`combat::sphere_query`].
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn sphere_query(
        &mut self,
        world: &dyn World,
        start: Vec3,
        end: Vec3,
        radius: f32,
        include_characters: bool,
    ) -> Result<Vec<Hit>, CombatError> {
        self.authorize("sphere_query")?;
        Ok(combat::sphere_query(
            world,
            self.state.id,
            start,
            end,
            radius,
            include_characters,
            &mut self.state.outbox,
        ))
    }

    /// Spawn transform toward the crosshair; `None` without a view.
    #[must_use]
    pub fn aim_at_crosshair(&self, world: &dyn World, has_gravity: bool) -> Option<AimSolution> {
        let view = world.view(self.state.id)?;
        Some(combat::aim_at_crosshair(
            world,
            self.state.id,
            &view,
            has_gravity,
            &self.state.config.aim,
        ))
    }

    // -------------------------------------------------------------------------
    // Equipment and resets
    // -------------------------------------------------------------------------

    fn require_equip(&self) -> Result<(), CombatError> {
        if self.can_equip_item() {
            Ok(())
        } else {
            Err(CombatError::PriorityDenied {
                requested: EQUIP_LEVEL,
                current_cancel: self.arbitrator.cancel_level(),
            })
        }
    }

    /// Changes the main-hand weapon.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, or `PriorityDenied` while busy.
    pub fn set_weapon_mode(&mut self, weapon: WeaponMode) -> Result<(), CombatError> {
        self.authorize("set_weapon_mode")?;
        self.require_equip()?;
        self.state.loadout.weapon = weapon;
        Ok(())
    }

    /// Changes the off-hand weapon.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`, or `PriorityDenied` while busy.
    pub fn set_sub_weapon_mode(&mut self, sub_weapon: SubWeaponMode) -> Result<(), CombatError> {
        self.authorize("set_sub_weapon_mode")?;
        self.require_equip()?;
        self.state.loadout.sub_weapon = sub_weapon;
        Ok(())
    }

    /// Replaces the montages.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn set_montage(&mut self, montages: MontageSet) -> Result<(), CombatError> {
        self.authorize("set_montage")?;
        self.state.montages = montages;
        Ok(())
    }

    /// Zeroes combos, clears action flags and makes every ability ready.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn reset_values(&mut self) -> Result<(), CombatError> {
        self.authorize("reset_values")?;
        self.state.reset_values();
        Ok(())
    }

    /// Stops the attack montage and zeroes the attack combo.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn reset_attack_combo(&mut self) -> Result<(), CombatError> {
        self.authorize("reset_attack_combo")?;
        if let Some(montage) = self.state.montages.attack.first().cloned() {
            self.state.outbox.broadcast(Notification::StopMontage {
                montage,
                blend_out: 0.2,
            });
        }
        self.state.combo_count = 0;
        Ok(())
    }

    /// Advances the skill combo counter.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn add_skill_combo(&mut self) -> Result<(), CombatError> {
        self.authorize("add_skill_combo")?;
        self.state.skill_combo_count = self.state.skill_combo_count.saturating_add(1);
        Ok(())
    }

    /// Zeroes the skill combo counter.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn reset_skill_combo(&mut self) -> Result<(), CombatError> {
        self.authorize("reset_skill_combo")?;
        self.state.skill_combo_count = 0;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    /// Moves the local clock forward by `dt` seconds.
    ///
    /// Runs the aim poll once if an aimed follow-up is armed, then fires every
    /// timer due by the new time in order.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation`.
    pub fn advance(&mut self, world: &mut dyn World, dt: f64) -> Result<(), CombatError> {
        self.authorize("advance")?;
        if self.state.offhand.polls_aim() {
            self.state.poll_aim(world);
        }
        let until = self.state.timers.now() + dt.max(0.0);
        while let Some((token, event)) = self.state.timers.pop_due(until) {
            self.fire(world, token, event);
        }
        self.state.timers.set_now(until);
        Ok(())
    }

    fn fire(&mut self, world: &mut dyn World, token: TimerToken, event: TimerEvent) {
        let state = &mut self.state;
        match event {
            TimerEvent::CooldownReady(ability) => {
                if state.cooldowns.on_expire(ability, token) {
                    tracing::debug!(id = %state.id, %ability, "cooldown ready");
                }
            }
            TimerEvent::StealthExpired => {
                if state.stealth_timer == Some(token) {
                    state.stealth_timer = None;
                    state.end_stealth(world);
                }
            }
            TimerEvent::ShockExpired => {
                if state.shock_timer == Some(token) {
                    state.recover_shock();
                }
            }
            TimerEvent::StunExpired => {
                if state.stun_timer == Some(token) {
                    state.stun_timer = None;
                    self.recover(world, Behavior::Stun);
                }
            }
            TimerEvent::KnockbackRecovered => {
                if state.knockback_timer == Some(token) {
                    state.knockback_timer = None;
                    self.recover(world, Behavior::Knockback);
                }
            }
            TimerEvent::BigKnockbackRecovered => {
                if state.big_knockback_timer == Some(token) {
                    state.big_knockback_timer = None;
                    self.recover(world, Behavior::BigKnockback);
                }
            }
            TimerEvent::BlockHoldElapsed => {
                if state.block_timer == Some(token) {
                    state.block_timer = None;
                    if self.is_current(Behavior::Block) {
                        self.end_current(world);
                    }
                }
            }
            TimerEvent::DarkOrbTick => state.dark_orb_pulse(world, token),
            TimerEvent::GravityExpired(projectile) => state.gravity_expired(world, projectile),
        }
    }

    /// A crowd-control recovery timer ran out.
    fn recover(&mut self, world: &mut dyn World, behavior: Behavior) {
        if self.is_current(behavior) {
            self.end_current(world);
        } else {
            let mut host = Dispatch {
                state: &mut self.state,
                world,
            };
            host.finish(behavior, false);
        }
    }

    // -------------------------------------------------------------------------
    // Replication
    // -------------------------------------------------------------------------

    /// Replicated view of this combatant.
    #[must_use]
    pub fn snapshot(&self) -> ReplicatedState {
        let cooldowns = Ability::ALL
            .iter()
            .map(|&ability| CooldownView {
                ability,
                duration: self.state.cooldowns.base_duration(ability),
                ready: self.state.cooldowns.is_ready(ability),
            })
            .collect();
        let status = self.status();
        ReplicatedState {
            cooldowns,
            attack_speed: self.state.attack_speed,
            skill_combo_count: self.state.skill_combo_count,
            skill_e: status.contains(StatusFlags::SKILL_E),
            attacking: status.contains(StatusFlags::ATTACKING),
            aiming_shield: status.contains(StatusFlags::AIMING_SHIELD),
            current_action: self.arbitrator.current().cloned(),
        }
    }

    /// Overwrites replicated fields from the authority's snapshot.
    ///
    /// # Errors
    ///
    /// `AuthorityViolation` on the authority, which never takes writes.
    pub fn apply_snapshot(&mut self, snapshot: &ReplicatedState) -> Result<(), CombatError> {
        if self.role.is_authority() {
            tracing::error!(id = %self.state.id, "snapshot applied to the authority");
            return Err(CombatError::AuthorityViolation { role: self.role });
        }
        for view in &snapshot.cooldowns {
            self.state
                .cooldowns
                .overwrite(view.ability, view.duration, view.ready);
        }
        self.state.attack_speed = snapshot.attack_speed;
        self.state.skill_combo_count = snapshot.skill_combo_count;
        self.state.status.set(StatusFlags::SKILL_E, snapshot.skill_e);
        self.state.status.set(StatusFlags::ATTACKING, snapshot.attacking);
        self.state
            .status
            .set(StatusFlags::AIMING_SHIELD, snapshot.aiming_shield);
        self.arbitrator.mirror(snapshot.current_action.clone());
        Ok(())
    }
}

fn skill_request(ability: Ability, target: EntityId, ratio: Ratio) -> DamageRequest {
    DamageRequest::new(target)
        .scales(ratio.ad, ratio.ap)
        .skill(ability.to_string())
}
