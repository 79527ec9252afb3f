//! Test doubles and setup helpers.
//!
//! `FakeWorld` answers spatial queries from actor positions and records every
//! side effect a skill asks of the world. `FakeLedger` records effects, buffs
//! and damage.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::action::{ActionHost, HandlerPhase};
use crate::combatant::{Combatant, Loadout, MontageSet, SubWeaponMode, WeaponMode};
use crate::config::CombatConfig;
use crate::entity::{CollisionCategories, EntityId, Hit, MonsterRole, TargetKind};
use crate::error::CombatError;
use crate::ledger::{AttributeKind, BuffKind, DamageEvent, DamageKind, Effect, EffectId, StatLedger};
use crate::net::{Envelope, NetRole, Notification};
use crate::world::{ViewPoint, World};

/// The player every scenario controls.
pub const PLAYER: EntityId = EntityId::new(1);

// =============================================================================
// Ledger
// =============================================================================

/// Stat ledger that records what was applied to it.
#[derive(Debug, Clone)]
pub struct FakeLedger {
    pub effects: BTreeMap<u64, Effect>,
    next_effect: u64,
    pub buffs: Vec<BuffKind>,
    pub damage: Vec<DamageEvent>,
    pub ad: f32,
    pub ap: f32,
    pub max_health: f32,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            effects: BTreeMap::new(),
            next_effect: 1,
            buffs: Vec::new(),
            damage: Vec::new(),
            ad: 100.0,
            ap: 40.0,
            max_health: 1000.0,
        }
    }
}

impl FakeLedger {
    /// Returns `true` if an effect with `name` is active.
    pub fn has_effect(&self, name: &str) -> bool {
        self.effects.values().any(|effect| effect.name() == name)
    }

    /// Every active effect with `name`.
    pub fn effects_named(&self, name: &str) -> Vec<&Effect> {
        self.effects.values().filter(|effect| effect.name() == name).collect()
    }
}

impl StatLedger for FakeLedger {
    fn apply_effect(&mut self, effect: Effect) -> EffectId {
        let id = self.next_effect;
        self.next_effect += 1;
        self.effects.insert(id, effect);
        EffectId(id)
    }

    fn remove_effect(&mut self, id: EffectId) -> bool {
        self.effects.remove(&id.0).is_some()
    }

    fn find_effect_by_name(&self, name: &str) -> Option<EffectId> {
        self.effects
            .iter()
            .find(|(_, effect)| effect.name() == name)
            .map(|(&id, _)| EffectId(id))
    }

    fn apply_buff(&mut self, buff: BuffKind) {
        self.buffs.push(buff);
    }

    fn final_damage(&self, kind: DamageKind) -> f32 {
        match kind {
            DamageKind::Ad => self.ad,
            DamageKind::Ap => self.ap,
        }
    }

    fn current_value(&self, attribute: AttributeKind) -> f32 {
        match attribute {
            AttributeKind::MaxHealth | AttributeKind::Health => self.max_health,
        }
    }

    fn apply_damage(&mut self, event: DamageEvent) {
        self.damage.push(event);
    }
}

// =============================================================================
// World
// =============================================================================

/// One actor in the fake world.
#[derive(Debug, Clone)]
pub struct FakeActor {
    pub kind: TargetKind,
    pub location: Vec3,
    pub ledger: Option<FakeLedger>,
    pub view: Option<ViewPoint>,
}

fn category(kind: TargetKind) -> CollisionCategories {
    match kind {
        TargetKind::Character => CollisionCategories::CHARACTER,
        TargetKind::Monster(_) => CollisionCategories::MONSTER,
        TargetKind::SkillActorWithStats => CollisionCategories::SKILL_OBJECT,
        TargetKind::Damageable | TargetKind::Building | TargetKind::Other => {
            CollisionCategories::WORLD_DYNAMIC
        }
    }
}

fn distance_to_segment(point: Vec3, start: Vec3, end: Vec3) -> (f32, f32) {
    let segment = end - start;
    let length_sq = segment.length_squared();
    let t = if length_sq <= f32::EPSILON {
        0.0
    } else {
        ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0)
    };
    (point.distance(start + segment * t), t)
}

/// Geometry-free world: sweeps test actor positions against the segment.
#[derive(Debug, Default)]
pub struct FakeWorld {
    pub actors: BTreeMap<EntityId, FakeActor>,
    /// Every sweep hit is reported twice, like a multi-shape actor.
    pub duplicate_hits: bool,
    /// Scripted visibility ray result.
    pub ray: Option<Hit>,
    pub notified: Vec<(EntityId, EntityId)>,
    pub provoked: Vec<(EntityId, EntityId, f32)>,
    pub moved: Vec<(EntityId, Vec3)>,
    pub activated: Vec<EntityId>,
    pub fired: Vec<(EntityId, Vec3, f32)>,
    pub destroyed: Vec<EntityId>,
    pub fail_spawns: bool,
    next_spawn: u64,
}

impl FakeWorld {
    /// An empty world.
    pub fn new() -> Self {
        Self {
            next_spawn: 1000,
            ..Self::default()
        }
    }

    /// Adds an actor.
    pub fn spawn(&mut self, id: EntityId, kind: TargetKind, location: Vec3) -> &mut FakeActor {
        self.actors.entry(id).or_insert(FakeActor {
            kind,
            location,
            ledger: Some(FakeLedger::default()),
            view: None,
        })
    }

    /// Adds the player at the origin, looking down +X.
    pub fn spawn_player(&mut self) {
        let actor = self.spawn(PLAYER, TargetKind::Character, Vec3::ZERO);
        actor.view = Some(ViewPoint {
            camera_location: Vec3::new(-300.0, 0.0, 100.0),
            camera_forward: Vec3::X,
            socket_location: Vec3::new(50.0, 0.0, 100.0),
            control_forward: Vec3::X,
        });
    }

    /// Adds a monster.
    pub fn spawn_monster(&mut self, id: u64, location: Vec3, role: MonsterRole) -> EntityId {
        let id = EntityId::new(id);
        self.spawn(id, TargetKind::Monster(role), location);
        id
    }

    /// Adds another character.
    pub fn spawn_ally(&mut self, id: u64, location: Vec3) -> EntityId {
        let id = EntityId::new(id);
        self.spawn(id, TargetKind::Character, location);
        id
    }

    /// The ledger of an actor.
    pub fn ledger_of(&self, id: EntityId) -> &FakeLedger {
        self.actors
            .get(&id)
            .and_then(|actor| actor.ledger.as_ref())
            .expect("actor with a ledger")
    }
}

impl World for FakeWorld {
    fn sphere_overlap(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        categories: CollisionCategories,
        excluded: &[EntityId],
    ) -> Vec<Hit> {
        let mut hits: Vec<(f32, Hit)> = self
            .actors
            .iter()
            .filter(|(id, actor)| !excluded.contains(id) && categories.intersects(category(actor.kind)))
            .filter_map(|(&id, actor)| {
                let (distance, along) = distance_to_segment(actor.location, start, end);
                (distance <= radius).then_some((along, Hit::new(id, actor.location)))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut out = Vec::new();
        for (_, hit) in hits {
            out.push(hit);
            if self.duplicate_hits {
                out.push(hit);
            }
        }
        out
    }

    fn ray_cast(&self, _start: Vec3, _end: Vec3, excluded: &[EntityId]) -> Option<Hit> {
        self.ray.filter(|hit| !excluded.contains(&hit.actor))
    }

    fn target_kind(&self, id: EntityId) -> TargetKind {
        self.actors.get(&id).map_or(TargetKind::Other, |actor| actor.kind)
    }

    fn location(&self, id: EntityId) -> Option<Vec3> {
        self.actors.get(&id).map(|actor| actor.location)
    }

    fn view(&self, id: EntityId) -> Option<ViewPoint> {
        self.actors.get(&id).and_then(|actor| actor.view)
    }

    fn ledger(&mut self, id: EntityId) -> Option<&mut dyn StatLedger> {
        self.actors
            .get_mut(&id)
            .and_then(|actor| actor.ledger.as_mut())
            .map(|ledger| ledger as &mut dyn StatLedger)
    }

    fn notify_damaged(&mut self, target: EntityId, by: EntityId) {
        self.notified.push((target, by));
    }

    fn provoke(&mut self, monster: EntityId, by: EntityId, seconds: f32) {
        self.provoked.push((monster, by, seconds));
    }

    fn spawn_marker(&mut self, _owner: EntityId) -> Option<EntityId> {
        if self.fail_spawns {
            return None;
        }
        self.next_spawn += 1;
        let id = EntityId::new(self.next_spawn);
        self.actors.insert(
            id,
            FakeActor {
                kind: TargetKind::Other,
                location: Vec3::ZERO,
                ledger: None,
                view: None,
            },
        );
        Some(id)
    }

    fn move_marker(&mut self, marker: EntityId, location: Vec3) {
        self.moved.push((marker, location));
        if let Some(actor) = self.actors.get_mut(&marker) {
            actor.location = location;
        }
    }

    fn activate_marker(&mut self, marker: EntityId) {
        self.activated.push(marker);
    }

    fn acquire_projectile(&mut self, _owner: EntityId, location: Vec3, _direction: Vec3) -> Option<EntityId> {
        if self.fail_spawns {
            return None;
        }
        self.next_spawn += 1;
        let id = EntityId::new(self.next_spawn);
        self.actors.insert(
            id,
            FakeActor {
                kind: TargetKind::Other,
                location,
                ledger: None,
                view: None,
            },
        );
        Some(id)
    }

    fn fire_projectile(&mut self, projectile: EntityId, direction: Vec3, speed: f32) {
        self.fired.push((projectile, direction, speed));
    }

    fn destroy(&mut self, id: EntityId) {
        self.destroyed.push(id);
        self.actors.remove(&id);
    }
}

// =============================================================================
// Combatants
// =============================================================================

/// An authoritative player with every montage, using `config`.
pub fn player_with(config: CombatConfig) -> Combatant {
    Combatant::new(PLAYER, NetRole::Authority, config).with_montages(MontageSet::complete())
}

/// An authoritative player with default tuning and every montage.
pub fn player() -> Combatant {
    player_with(CombatConfig::default())
}

/// A player wielding `weapon` and `sub_weapon`.
pub fn armed_player(weapon: WeaponMode, sub_weapon: SubWeaponMode) -> Combatant {
    player().with_loadout(Loadout { weapon, sub_weapon })
}

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A world holding only the player.
pub fn world() -> FakeWorld {
    let mut world = FakeWorld::new();
    world.spawn_player();
    world
}

/// Advances `combatant` in fixed steps.
pub fn run_for(combatant: &mut Combatant, world: &mut FakeWorld, seconds: f64, step: f64) {
    let steps = (seconds / step).round() as u64;
    for _ in 0..steps {
        combatant.advance(world, step).expect("authority advances");
    }
}

/// Notifications, without sources and audiences.
pub fn notifications(envelopes: &[Envelope]) -> Vec<&Notification> {
    envelopes.iter().map(|envelope| &envelope.notification).collect()
}

/// Returns `true` if any queued notification equals `notification`.
pub fn sent(combatant: &Combatant, notification: &Notification) -> bool {
    combatant
        .pending_notifications()
        .iter()
        .any(|envelope| &envelope.notification == notification)
}

// =============================================================================
// Arbitration hosts
// =============================================================================

/// Host that resolves every handler and records invocations.
#[derive(Debug, Default)]
pub struct AcceptAll {
    pub calls: Vec<(HandlerPhase, u8)>,
}

impl ActionHost<u8> for AcceptAll {
    fn resolves(&self, _owner: EntityId, _handler: &u8, _phase: HandlerPhase) -> bool {
        true
    }

    fn play(&mut self, handler: &u8) -> Result<(), CombatError> {
        self.calls.push((HandlerPhase::Play, *handler));
        Ok(())
    }

    fn cancel(&mut self, handler: &u8) {
        self.calls.push((HandlerPhase::Cancel, *handler));
    }

    fn end(&mut self, handler: &u8) {
        self.calls.push((HandlerPhase::End, *handler));
    }
}
