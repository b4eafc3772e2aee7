//! Match orchestration: the fixed per-tick pipeline (index rebuild, timers,
//! autopilot, projectile integration, collision resolution, gameplay
//! consequences) plus spawning, scoring and the event sink.

use crate::autopilot::{self, Pilot};
use crate::collision;
use crate::config;
use crate::grid::Grid;
use crate::path;
use crate::tank::TankState;
use crate::types::{
    CapturePointState, Direction, EntityId, EntityKind, FlagState, GameMode, PickupKind, Point,
    SimEvent, Team, WeaponKind, World,
};
use crate::utils;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use std::cmp::Ordering;
use std::f64::consts::TAU;

/// Per-team points: kills in the deathmatch modes, captures otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scoreboard {
    pub red: u32,
    pub blue: u32,
}

impl Scoreboard {
    fn add(&mut self, team: Team, points: u32) {
        match team {
            Team::Red => self.red += points,
            Team::Blue => self.blue += points,
        }
    }

    pub fn leader(&self) -> Option<Team> {
        match self.red.cmp(&self.blue) {
            Ordering::Greater => Some(Team::Red),
            Ordering::Less => Some(Team::Blue),
            Ordering::Equal => None,
        }
    }
}

pub type EventSink = Box<dyn FnMut(&SimEvent)>;

pub struct Game {
    pub grid: Grid,
    pub world: World,
    pub mode: GameMode,
    pub scores: Scoreboard,
    rng: StdRng,
    sink: Option<EventSink>,
}

impl Game {
    pub fn new(grid: Grid, mode: GameMode, rng: StdRng) -> Self {
        Game {
            grid,
            world: World::new(),
            mode,
            scores: Scoreboard::default(),
            rng,
            sink: None,
        }
    }

    /// Install a hook receiving every event the simulation emits. This is
    /// where a front end would attach sounds, particles or a scoreboard UI.
    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    /// Deploy a tank on a random clear tile. `bot` attaches an autopilot.
    pub fn add_tank(&mut self, team: Team, bot: bool) -> EntityId {
        let idx = self.random_clear_tile();
        let pos = self.grid.tile(idx).center();
        let angle = self.rng.gen_range(0.0..TAU);
        let id = self
            .world
            .spawn(pos, angle, EntityKind::Tank(TankState::new(team, bot)));
        info!("Tank {} ({:?}) deployed at tile {}", id, team, idx);
        id
    }

    pub fn add_pickup(&mut self, kind: PickupKind) -> EntityId {
        let idx = self.rng.gen_range(0..self.grid.tiles().len());
        let pos = self.grid.tile(idx).center();
        self.world.spawn(pos, 0.0, EntityKind::Pickup(kind))
    }

    /// Place the mode's objective objects: flag stands in opposite corners
    /// for capture the flag, a single capture point mid-grid for king of the
    /// hill. Deathmatch variants need nothing.
    pub fn place_objectives(&mut self) {
        match self.mode {
            GameMode::CaptureTheFlag => {
                let red_home = self.grid.tile(self.grid.index_of(0, 0)).center();
                let blue_idx = self.grid.index_of(self.grid.nx - 1, self.grid.ny - 1);
                let blue_home = self.grid.tile(blue_idx).center();
                for (team, home) in [(Team::Red, red_home), (Team::Blue, blue_home)] {
                    self.world.spawn(
                        home,
                        0.0,
                        EntityKind::Flag(FlagState {
                            team,
                            home,
                            carried_by: None,
                        }),
                    );
                }
            }
            GameMode::KingOfTheHill => {
                let idx = self.grid.index_of(self.grid.nx / 2, self.grid.ny / 2);
                let pos = self.grid.tile(idx).center();
                self.world
                    .spawn(pos, 0.0, EntityKind::CapturePoint(CapturePointState { owner: None }));
            }
            GameMode::Deathmatch | GameMode::TeamDeathmatch => {}
        }
    }

    /// Advance the match one tick and return the events it produced (also
    /// forwarded to the sink). The phase order is fixed: stale reads within
    /// a tick observe the index snapshot taken at its start.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        self.world.tick += 1;
        let mut events = Vec::new();

        let oob = self.grid.rebuild_index(&self.world.entities);
        for id in oob {
            warn!("Entity {} left the grid, despawning", id);
            self.world.despawn(id);
            events.push(SimEvent::EntityOutOfBounds { id });
        }

        self.step_timers(&mut events);

        let tanks: Vec<EntityId> = self
            .world
            .alive()
            .filter(|e| e.is_tank())
            .map(|e| e.id)
            .collect();
        for id in tanks {
            autopilot::step(&self.grid, &mut self.world, id, self.mode);
        }

        self.step_projectiles(&mut events);
        collision::projectile_collisions(&self.grid, &mut self.world, &mut events);
        self.resolve_tank_overlaps(&mut events);
        self.update_carried_flags();

        if let Some(sink) = self.sink.as_mut() {
            for event in &events {
                sink(event);
            }
        }
        events
    }

    pub fn winner(&self) -> Option<Team> {
        self.scores.leader()
    }

    fn step_timers(&mut self, events: &mut Vec<SimEvent>) {
        let mut respawns = Vec::new();
        for entity in &mut self.world.entities {
            let id = entity.id;
            let alive = entity.alive;
            if let Some(state) = entity.tank_mut() {
                if alive {
                    state.cooldown = state.cooldown.saturating_sub(1);
                    state.invulnerable = state.invulnerable.saturating_sub(1);
                } else if state.respawn > 0 {
                    state.respawn -= 1;
                    if state.respawn == 0 {
                        respawns.push(id);
                    }
                }
            }
        }
        for id in respawns {
            self.respawn_tank(id, events);
        }
    }

    fn respawn_tank(&mut self, id: EntityId, events: &mut Vec<SimEvent>) {
        let idx = self.random_clear_tile();
        let pos = self.grid.tile(idx).center();
        let angle = self.rng.gen_range(0.0..TAU);
        let entity = self.world.get_mut(id);
        entity.alive = true;
        entity.pos = pos;
        entity.angle = angle;
        if let Some(state) = entity.tank_mut() {
            state.invulnerable = config::SPAWN_PROTECTION_TICKS;
            state.cooldown = 0;
            state.carrying = None;
            if let Some(pilot) = state.pilot.as_mut() {
                *pilot = Pilot::new();
            }
        }
        events.push(SimEvent::TankRespawned { tank: id });
        info!("Tank {} respawned at tile {}", id, idx);
    }

    /// A random tile whose center is not already near a live tank. Tile
    /// centers are always safe against walls, so no clearance test is needed
    /// beyond occupancy.
    fn random_clear_tile(&mut self) -> usize {
        for _ in 0..32 {
            let idx = self.rng.gen_range(0..self.grid.tiles().len());
            let center = self.grid.tile(idx).center();
            let occupied = self
                .world
                .alive()
                .any(|e| e.is_tank() && e.pos.distance(&center) < config::TILE_SIZE);
            if !occupied {
                return idx;
            }
        }
        self.rng.gen_range(0..self.grid.tiles().len())
    }

    fn step_projectiles(&mut self, events: &mut Vec<SimEvent>) {
        let ids: Vec<EntityId> = self
            .world
            .alive()
            .filter(|e| e.projectile().is_some())
            .map(|e| e.id)
            .collect();
        for id in ids {
            self.steer_guided(id);

            let entity = self.world.get_mut(id);
            let prev = entity.pos;
            let angle = entity.angle;
            let (speed, breaker, expired) = match entity.projectile_mut() {
                Some(p) => {
                    p.age += 1;
                    (p.speed, p.breaker, p.age > config::PROJECTILE_LIFETIME_TICKS)
                }
                None => continue,
            };
            if expired {
                self.world.despawn(id);
                events.push(SimEvent::ProjectileExplosion { projectile: id, pos: prev });
                continue;
            }

            self.world.get_mut(id).pos = prev.offset(angle, speed);
            if breaker {
                self.break_walls(id, prev, events);
            } else {
                collision::reflect(&self.grid, self.world.get_mut(id), prev, events);
            }
        }
    }

    /// WallBuster shots demolish the first interior wall they cross and
    /// detonate on it. The grid boundary is indestructible; there they
    /// bounce like any other shot.
    fn break_walls(&mut self, id: EntityId, prev: Point, events: &mut Vec<SimEvent>) {
        let pos = self.world.get(id).pos;
        let Some(prev_idx) = self.grid.tile_at(prev.x, prev.y) else {
            return;
        };
        let crossed = self.grid.walls_between(prev_idx, pos.x, pos.y);
        let Some(dir) = Direction::ALL.into_iter().find(|d| crossed[d.index()]) else {
            return;
        };
        if self.grid.tile(prev_idx).neighbors[dir.index()].is_none() {
            collision::reflect(&self.grid, self.world.get_mut(id), prev, events);
            return;
        }
        self.grid.set_wall(prev_idx, dir, false);
        self.world.despawn(id);
        events.push(SimEvent::WallBroken { tile: prev_idx, dir, pos });
        events.push(SimEvent::ProjectileExplosion { projectile: id, pos });
        info!("Projectile {} demolished the {:?} wall of tile {}", id, dir, prev_idx);
    }

    /// Guided shots re-acquire the nearest enemy tank on a fixed cadence and
    /// steer a bounded amount toward the first leg of the path to it.
    fn steer_guided(&mut self, id: EntityId) {
        let entity = self.world.get(id);
        let Some(p) = entity.projectile() else {
            return;
        };
        if !p.guided {
            return;
        }
        let team = p.team;
        let pos = entity.pos;
        let angle = entity.angle;

        if p.repath > 0 {
            if let Some(p) = self.world.get_mut(id).projectile_mut() {
                p.repath -= 1;
            }
            return;
        }
        if let Some(start) = self.grid.tile_at(pos.x, pos.y) {
            let found = path::path_to_entity(
                &self.grid,
                &self.world,
                start,
                |e| e.is_tank() && e.team() == Some(team.opponent()),
                config::ENEMY_SEARCH_TILES,
            );
            if let Some(goal) = found.as_ref().and_then(|p| p.drive_points().first().copied()) {
                let aim = utils::bearing(pos.x, pos.y, goal.x, goal.y);
                let err = utils::angle_diff(angle, aim)
                    .clamp(-config::GUIDED_TURN_RATE, config::GUIDED_TURN_RATE);
                let entity = self.world.get_mut(id);
                entity.angle = utils::normalize_angle(entity.angle + err);
            }
        }
        if let Some(p) = self.world.get_mut(id).projectile_mut() {
            p.repath = config::GUIDED_REPATH_TICKS;
        }
    }

    fn resolve_tank_overlaps(&mut self, events: &mut Vec<SimEvent>) {
        let tanks: Vec<EntityId> = self
            .world
            .alive()
            .filter(|e| e.is_tank())
            .map(|e| e.id)
            .collect();
        for id in tanks {
            let hits = collision::tank_overlaps(&self.grid, &self.world, id);
            for hit in hits {
                if !self.world.get(id).alive {
                    break;
                }
                self.resolve_hit(id, hit, events);
            }
        }
    }

    fn resolve_hit(&mut self, tank_id: EntityId, other_id: EntityId, events: &mut Vec<SimEvent>) {
        let other = self.world.get(other_id);
        if !other.alive {
            return;
        }
        let pos = other.pos;
        match other.kind.clone() {
            EntityKind::Projectile(p) => {
                // Fresh shots cannot hit their own shooter
                if p.owner == tank_id && p.age < config::PROJECTILE_GRACE_TICKS {
                    return;
                }
                let protected = self
                    .world
                    .get(tank_id)
                    .tank()
                    .is_some_and(|t| t.invulnerable > 0);
                self.world.despawn(other_id);
                events.push(SimEvent::ProjectileExplosion { projectile: other_id, pos });
                if protected {
                    return;
                }
                events.push(SimEvent::TankHit {
                    tank: tank_id,
                    projectile: other_id,
                    shooter: p.owner,
                });
                self.destroy_tank(tank_id, p.owner, events);
            }
            EntityKind::Pickup(kind) => {
                self.world.despawn(other_id);
                self.apply_pickup(tank_id, kind);
                events.push(SimEvent::PickupTaken {
                    tank: tank_id,
                    pickup: other_id,
                    kind,
                });
            }
            EntityKind::Flag(flag) => self.resolve_flag_touch(tank_id, other_id, &flag, events),
            EntityKind::CapturePoint(point) => {
                let Some(my_team) = self.world.get(tank_id).team() else {
                    return;
                };
                if point.owner != Some(my_team) {
                    if let EntityKind::CapturePoint(cp) = &mut self.world.get_mut(other_id).kind {
                        cp.owner = Some(my_team);
                    }
                    self.scores.add(my_team, 1);
                    events.push(SimEvent::PointCaptured { tank: tank_id, team: my_team });
                    info!("Tank {} captured the point for {:?}", tank_id, my_team);
                }
            }
            EntityKind::Tank(_) => {}
        }
    }

    fn resolve_flag_touch(
        &mut self,
        tank_id: EntityId,
        flag_id: EntityId,
        flag: &FlagState,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(my_team) = self.world.get(tank_id).tank().map(|s| s.team) else {
            return;
        };
        if flag.carried_by.is_some() {
            return;
        }
        if flag.team != my_team {
            if let EntityKind::Flag(f) = &mut self.world.get_mut(flag_id).kind {
                f.carried_by = Some(tank_id);
            }
            if let Some(state) = self.world.get_mut(tank_id).tank_mut() {
                state.carrying = Some(flag_id);
            }
            events.push(SimEvent::FlagTaken { tank: tank_id, flag: flag_id });
            info!("Tank {} took the {:?} flag", tank_id, flag.team);
            return;
        }

        let at_home = flag.home.distance(&self.world.get(flag_id).pos) < 1.0;
        if !at_home {
            // Touching our own dropped flag returns it to its stand
            self.world.get_mut(flag_id).pos = flag.home;
            events.push(SimEvent::FlagReturned { flag: flag_id });
        } else if let Some(carried) = self.world.get(tank_id).tank().and_then(|s| s.carrying) {
            // Our stand, their flag in hand: capture
            let enemy_home = match &self.world.get(carried).kind {
                EntityKind::Flag(f) => f.home,
                _ => return,
            };
            self.world.get_mut(carried).pos = enemy_home;
            if let EntityKind::Flag(f) = &mut self.world.get_mut(carried).kind {
                f.carried_by = None;
            }
            if let Some(state) = self.world.get_mut(tank_id).tank_mut() {
                state.carrying = None;
            }
            self.scores.add(my_team, 1);
            events.push(SimEvent::FlagCaptured { tank: tank_id, team: my_team });
            info!("Tank {} captured the flag for {:?}", tank_id, my_team);
        }
    }

    fn destroy_tank(&mut self, id: EntityId, shooter: EntityId, events: &mut Vec<SimEvent>) {
        let (carrying, pos) = {
            let e = self.world.get(id);
            (e.tank().and_then(|s| s.carrying), e.pos)
        };
        if let Some(flag_id) = carrying {
            let flag = self.world.get_mut(flag_id);
            flag.pos = pos;
            if let EntityKind::Flag(f) = &mut flag.kind {
                f.carried_by = None;
            }
            events.push(SimEvent::FlagDropped { tank: id, flag: flag_id });
        }

        self.world.despawn(id);
        if let Some(state) = self.world.get_mut(id).tank_mut() {
            state.respawn = config::RESPAWN_TICKS;
            state.carrying = None;
        }
        if matches!(self.mode, GameMode::Deathmatch | GameMode::TeamDeathmatch) {
            if let Some(team) = self.world.get(shooter).team() {
                self.scores.add(team, 1);
            }
        }
        events.push(SimEvent::TankDestroyed { tank: id, shooter });
        info!("Tank {} destroyed by {}", id, shooter);
    }

    fn apply_pickup(&mut self, id: EntityId, kind: PickupKind) {
        let weapon = match kind {
            PickupKind::WeaponCrate => Some(match self.rng.gen_range(0..3) {
                0 => WeaponKind::Laser,
                1 => WeaponKind::WallBuster,
                _ => WeaponKind::Railgun,
            }),
            _ => None,
        };
        if let Some(state) = self.world.get_mut(id).tank_mut() {
            match kind {
                PickupKind::Repair => state.cooldown = 0,
                PickupKind::Shield => state.invulnerable = config::SPAWN_PROTECTION_TICKS,
                PickupKind::WeaponCrate => {
                    if let Some(w) = weapon {
                        state.weapon = w;
                    }
                }
            }
        }
    }

    /// Carried flags ride along with their carrier.
    fn update_carried_flags(&mut self) {
        let updates: Vec<(EntityId, Point)> = self
            .world
            .alive()
            .filter_map(|e| match &e.kind {
                EntityKind::Flag(f) => f.carried_by.map(|c| (e.id, self.world.get(c).pos)),
                _ => None,
            })
            .collect();
        for (flag, pos) in updates {
            self.world.get_mut(flag).pos = pos;
        }
    }
}
