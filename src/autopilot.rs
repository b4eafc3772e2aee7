//! Weighted autopilot. Each bot periodically scores candidate goals
//! (pickups, the nearest enemy, the mode objective, an escape route while
//! fleeing), commits to the heaviest one as a waypoint path, and steers
//! toward it between decisions. Firing is decided alongside the enemy
//! candidate and executed whenever the weapon is ready and the barrel lines
//! up.

use std::collections::VecDeque;
use std::f64::consts::PI;

use crate::collision;
use crate::config;
use crate::grid::Grid;
use crate::path::{self, WaypointPath};
use crate::tank;
use crate::types::{Entity, EntityId, EntityKind, GameMode, Point, Team, WeaponKind, World};
use crate::utils;

/// Per-tank autopilot state. Lives inside `TankState` and is taken out for
/// the duration of a step so the pilot can read the world it sits in.
#[derive(Debug, Clone, Default)]
pub struct Pilot {
    pub waypoints: VecDeque<Point>,
    pub target: Option<EntityId>,
    pub fire_target: Option<EntityId>,
    pub decide_in: u32,   // Ticks until the next goal re-evaluation
    pub flee_until: u64,  // Absolute tick the flee state expires, 0 when inactive
    pub avoid: Vec<usize>, // Tiles ruled out as escape destinations
}

impl Pilot {
    pub fn new() -> Self {
        Pilot::default()
    }
}

/// Run one tick of autopilot for the given tank. No-op for dead tanks and
/// tanks without a pilot.
pub fn step(grid: &Grid, world: &mut World, id: EntityId, mode: GameMode) {
    let me = world.get(id);
    if !me.alive {
        return;
    }
    let (weapon, cooldown, speed) = match me.tank() {
        Some(s) => (s.weapon, s.cooldown, s.speed),
        None => return,
    };
    let Some(mut pilot) = world.get_mut(id).tank_mut().and_then(|t| t.pilot.take()) else {
        return;
    };
    let tick = world.tick;

    // Flee expires on its timer, or early for sustained-aim weapons once the
    // weapon is ready again. The flee was set when firing, so cooldown zero
    // here means a full recharge happened.
    let sustained_ready = weapon == WeaponKind::Laser && cooldown == 0;
    if pilot.flee_until != 0 && (tick >= pilot.flee_until || sustained_ready) {
        pilot.flee_until = 0;
        pilot.avoid.clear();
        pilot.decide_in = 0;
    }

    // Throttled re-evaluation; faster tanks re-decide more often.
    if pilot.decide_in == 0 {
        evaluate(grid, world, id, mode, &mut pilot);
        pilot.decide_in = ((config::DECIDE_BASE_TICKS / speed.max(0.1)).round() as u32)
            .clamp(config::DECIDE_MIN_TICKS, config::DECIDE_MAX_TICKS);
    } else {
        pilot.decide_in -= 1;
    }

    // With a ready weapon and a justified target, aiming takes the actuators
    // this tick; otherwise keep driving the committed path.
    let mut engaged = false;
    if cooldown == 0 {
        if let Some(tid) = pilot.fire_target {
            let target = world.get(tid);
            if target.alive {
                let me = world.get(id);
                let aim = utils::bearing(me.pos.x, me.pos.y, target.pos.x, target.pos.y);
                let err = utils::angle_diff(me.angle, aim);
                engaged = true;
                if err.abs() > config::AIM_TOLERANCE {
                    tank::turn(grid, world, id, err.signum());
                } else if tank::fire(world, id).is_some() {
                    start_flee(grid, world, id, &mut pilot, tick);
                    pilot.fire_target = None;
                    pilot.decide_in = 0;
                }
            } else {
                pilot.fire_target = None;
            }
        }
    }
    if !engaged {
        follow(grid, world, id, &mut pilot);
    }

    if let Some(state) = world.get_mut(id).tank_mut() {
        state.pilot = Some(pilot);
    }
}

/// Score every candidate goal and commit to the heaviest. Weights drop with
/// path length; ties resolve in evaluation order (pickup, enemy, objective,
/// flee) because the sort is stable.
fn evaluate(grid: &Grid, world: &World, id: EntityId, mode: GameMode, pilot: &mut Pilot) {
    let me = world.get(id);
    let (my_team, weapon, carrying) = match me.tank() {
        Some(s) => (s.team, s.weapon, s.carrying),
        None => return,
    };
    pilot.fire_target = None;
    let Some(start) = grid.tile_at(me.pos.x, me.pos.y) else {
        pilot.waypoints.clear();
        pilot.target = None;
        return;
    };

    let scored =
        |base: f64, path: &WaypointPath| base - path.points.len() as f64 * config::WEIGHT_DISTANCE_PENALTY;
    let mut candidates: Vec<(f64, WaypointPath)> = Vec::new();

    if let Some(path) = path::path_to_entity(
        grid,
        world,
        start,
        |e| matches!(e.kind, EntityKind::Pickup(_)),
        config::PICKUP_SEARCH_TILES,
    ) {
        candidates.push((scored(config::WEIGHT_PICKUP, &path), path));
    }

    if let Some(path) = path::path_to_entity(
        grid,
        world,
        start,
        |e| e.id != id && e.is_tank() && e.team() == Some(my_team.opponent()),
        config::ENEMY_SEARCH_TILES,
    ) {
        if let Some(tid) = path.target {
            if should_fire(grid, me, weapon, world.get(tid)) {
                pilot.fire_target = Some(tid);
            }
        }
        candidates.push((scored(config::WEIGHT_ENEMY, &path), path));
    }

    if let Some(path) = objective_path(grid, world, my_team, carrying, mode, start) {
        candidates.push((scored(config::WEIGHT_OBJECTIVE, &path), path));
    }

    if pilot.flee_until > world.tick {
        let origin = grid.tile(start);
        let (oi, oj) = (origin.i as i64, origin.j as i64);
        let avoid = &pilot.avoid;
        let escape = path::shortest_path_to(
            grid,
            start,
            |t| {
                !avoid.contains(&t.id)
                    && (t.i as i64 - oi).abs() + (t.j as i64 - oj).abs() >= config::FLEE_MIN_TILES
            },
            config::FLEE_SEARCH_TILES,
        );
        if let Some(tiles) = escape {
            let points = tiles.iter().map(|&t| grid.tile(t).center()).collect();
            let path = WaypointPath { points, target: None };
            candidates.push((scored(config::WEIGHT_FLEE, &path), path));
        }
    }

    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
    match candidates.into_iter().next() {
        Some((weight, path)) => {
            crate::debug_pilot!(
                id,
                world.tick,
                "Goal weight {:.1}, {} waypoints, target {:?}",
                weight,
                path.drive_points().len(),
                path.target
            );
            pilot.waypoints = path.drive_points().iter().copied().collect();
            pilot.target = path.target;
        }
        None => {
            pilot.waypoints.clear();
            pilot.target = None;
        }
    }
}

/// Mode objective as a path candidate. Deathmatch variants have none.
fn objective_path(
    grid: &Grid,
    world: &World,
    my_team: Team,
    carrying: Option<EntityId>,
    mode: GameMode,
    start: usize,
) -> Option<WaypointPath> {
    match mode {
        GameMode::CaptureTheFlag => {
            if carrying.is_some() {
                // Carrying the enemy flag: head for our own flag stand.
                let home = world.alive().find_map(|e| match &e.kind {
                    EntityKind::Flag(f) if f.team == my_team => Some(f.home),
                    _ => None,
                })?;
                let goal = grid.tile_at(home.x, home.y)?;
                let tiles = path::shortest_path_to(
                    grid,
                    start,
                    |t| t.id == goal,
                    config::OBJECTIVE_SEARCH_TILES,
                )?;
                let points = tiles.iter().map(|&t| grid.tile(t).center()).collect();
                Some(WaypointPath { points, target: None })
            } else {
                path::path_to_entity(
                    grid,
                    world,
                    start,
                    |e| {
                        matches!(&e.kind, EntityKind::Flag(f)
                            if f.team != my_team && f.carried_by.is_none())
                    },
                    config::OBJECTIVE_SEARCH_TILES,
                )
            }
        }
        GameMode::KingOfTheHill => path::path_to_entity(
            grid,
            world,
            start,
            |e| matches!(&e.kind, EntityKind::CapturePoint(c) if c.owner != Some(my_team)),
            config::OBJECTIVE_SEARCH_TILES,
        ),
        GameMode::Deathmatch | GameMode::TeamDeathmatch => None,
    }
}

/// Per-weapon firing policy. Spawn-protected targets are never worth a shot.
fn should_fire(grid: &Grid, me: &Entity, weapon: WeaponKind, target: &Entity) -> bool {
    if target.tank().is_some_and(|t| t.invulnerable > 0) {
        return false;
    }
    let dist = me.pos.distance(&target.pos);
    match weapon {
        // WallBuster shots punch through walls, so the ray test is moot.
        WeaponKind::Cannon | WeaponKind::WallBuster => dist <= config::CANNON_RANGE,
        WeaponKind::Laser => {
            dist <= config::LASER_RANGE && collision::clear_ray(grid, me.pos, target.pos)
        }
        WeaponKind::Railgun => dist <= config::RAILGUN_RANGE,
    }
}

/// Steer toward the front waypoint: turn the shorter way, drive only while
/// the heading error is inside the tolerance.
fn follow(grid: &Grid, world: &mut World, id: EntityId, pilot: &mut Pilot) {
    let Some(&wp) = pilot.waypoints.front() else {
        return;
    };
    let me = world.get(id);
    if me.pos.distance(&wp) < config::WAYPOINT_REACHED_DIST {
        pilot.waypoints.pop_front();
        return;
    }
    let aim = utils::bearing(me.pos.x, me.pos.y, wp.x, wp.y);
    let err = utils::angle_diff(me.angle, aim);
    if err.abs() > config::TURN_DEADBAND {
        tank::turn(grid, world, id, err.signum());
    }
    if err.abs() < config::AIM_TOLERANCE {
        tank::drive(grid, world, id, 1.0);
    }
}

/// Mark the current tile and the tile behind as no-go and start the flee
/// timer. The next evaluation will weigh an escape route heaviest.
fn start_flee(grid: &Grid, world: &World, id: EntityId, pilot: &mut Pilot, tick: u64) {
    let me = world.get(id);
    pilot.avoid.clear();
    if let Some(cur) = grid.tile_at(me.pos.x, me.pos.y) {
        pilot.avoid.push(cur);
    }
    let behind = me.pos.offset(me.angle + PI, config::TILE_SIZE);
    if let Some(b) = grid.tile_at(behind.x, behind.y) {
        if !pilot.avoid.contains(&b) {
            pilot.avoid.push(b);
        }
    }
    pilot.flee_until = tick + config::FLEE_TICKS as u64;
    crate::debug_pilot!(id, tick, "Fleeing until tick {}, avoiding {:?}", pilot.flee_until, pilot.avoid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tank::TankState;
    use crate::types::{Direction, FlagState, PickupKind};

    fn open_grid(nx: u32, ny: u32) -> Grid {
        Grid::new(nx, ny, config::TILE_SIZE, config::TILE_SIZE)
    }

    fn spawn_bot(world: &mut World, pos: Point, team: Team) -> EntityId {
        world.spawn(pos, 0.0, EntityKind::Tank(TankState::new(team, true)))
    }

    fn pilot_of(world: &World, id: EntityId) -> &Pilot {
        world
            .get(id)
            .tank()
            .and_then(|t| t.pilot.as_ref())
            .expect("bot should have a pilot")
    }

    #[test]
    fn test_pickup_goal_sets_waypoints_and_target() {
        let mut grid = open_grid(3, 3);
        let mut world = World::new();
        let bot = spawn_bot(&mut world, grid.tile(grid.index_of(0, 0)).center(), Team::Red);
        let pickup_pos = grid.tile(grid.index_of(2, 0)).center();
        let pickup = world.spawn(pickup_pos, 0.0, EntityKind::Pickup(PickupKind::Repair));
        grid.rebuild_index(&world.entities);

        step(&grid, &mut world, bot, GameMode::Deathmatch);

        let pilot = pilot_of(&world, bot);
        assert_eq!(pilot.target, Some(pickup));
        assert!(!pilot.waypoints.is_empty());
        // Drive points skip the start tile's own center
        assert_eq!(*pilot.waypoints.back().unwrap(), pickup_pos);
    }

    #[test]
    fn test_enemy_in_range_becomes_fire_target_unless_protected() {
        let mut grid = open_grid(4, 4);
        let mut world = World::new();
        let bot = spawn_bot(&mut world, grid.tile(grid.index_of(0, 0)).center(), Team::Red);
        let enemy = spawn_bot(&mut world, grid.tile(grid.index_of(2, 0)).center(), Team::Blue);
        grid.rebuild_index(&world.entities);

        // Spawn protection suppresses the shot
        step(&grid, &mut world, bot, GameMode::Deathmatch);
        assert_eq!(pilot_of(&world, bot).fire_target, None);

        world.get_mut(enemy).tank_mut().unwrap().invulnerable = 0;
        if let Some(state) = world.get_mut(bot).tank_mut() {
            state.cooldown = 10; // keep the target pending instead of firing
            state.pilot.as_mut().unwrap().decide_in = 0;
        }
        step(&grid, &mut world, bot, GameMode::Deathmatch);
        assert_eq!(pilot_of(&world, bot).fire_target, Some(enemy));
    }

    #[test]
    fn test_laser_needs_a_clear_ray() {
        let mut grid = open_grid(4, 1);
        let mut world = World::new();
        let start = grid.index_of(0, 0);
        let bot = world.spawn(
            grid.tile(start).center(),
            0.0,
            EntityKind::Tank(TankState::new(Team::Red, true).with_weapon(WeaponKind::Laser)),
        );
        let enemy = spawn_bot(&mut world, grid.tile(grid.index_of(2, 0)).center(), Team::Blue);
        world.get_mut(enemy).tank_mut().unwrap().invulnerable = 0;
        grid.set_wall(grid.index_of(1, 0), Direction::Right, true);
        grid.rebuild_index(&world.entities);

        step(&grid, &mut world, bot, GameMode::Deathmatch);
        // Enemy is near but the wall blocks the beam
        let pilot = pilot_of(&world, bot);
        assert_eq!(pilot.fire_target, None);
    }

    #[test]
    fn test_objective_outweighs_pickup() {
        let mut grid = open_grid(5, 5);
        let mut world = World::new();
        let bot = spawn_bot(&mut world, grid.tile(grid.index_of(0, 0)).center(), Team::Red);
        world.spawn(
            grid.tile(grid.index_of(2, 0)).center(),
            0.0,
            EntityKind::Pickup(PickupKind::Shield),
        );
        let flag_pos = grid.tile(grid.index_of(0, 2)).center();
        let flag = world.spawn(
            flag_pos,
            0.0,
            EntityKind::Flag(FlagState {
                team: Team::Blue,
                home: flag_pos,
                carried_by: None,
            }),
        );
        grid.rebuild_index(&world.entities);

        step(&grid, &mut world, bot, GameMode::CaptureTheFlag);

        let pilot = pilot_of(&world, bot);
        assert_eq!(pilot.target, Some(flag), "flag should outweigh the pickup");
    }

    #[test]
    fn test_carrier_heads_for_home_stand() {
        let mut grid = open_grid(5, 5);
        let mut world = World::new();
        let bot = spawn_bot(&mut world, grid.tile(grid.index_of(2, 2)).center(), Team::Red);
        let home = grid.tile(grid.index_of(0, 4)).center();
        world.spawn(
            home,
            0.0,
            EntityKind::Flag(FlagState {
                team: Team::Red,
                home,
                carried_by: None,
            }),
        );
        let enemy_flag_pos = grid.tile(grid.index_of(2, 2)).center();
        let enemy_flag = world.spawn(
            enemy_flag_pos,
            0.0,
            EntityKind::Flag(FlagState {
                team: Team::Blue,
                home: grid.tile(grid.index_of(4, 0)).center(),
                carried_by: Some(bot),
            }),
        );
        world.get_mut(bot).tank_mut().unwrap().carrying = Some(enemy_flag);
        grid.rebuild_index(&world.entities);

        step(&grid, &mut world, bot, GameMode::CaptureTheFlag);

        let pilot = pilot_of(&world, bot);
        assert_eq!(*pilot.waypoints.back().unwrap(), home);
    }

    #[test]
    fn test_firing_starts_flee() {
        let mut grid = open_grid(4, 4);
        let mut world = World::new();
        // Facing the enemy dead on, weapon ready, enemy unprotected
        let bot = spawn_bot(&mut world, grid.tile(grid.index_of(0, 1)).center(), Team::Red);
        let enemy = spawn_bot(&mut world, grid.tile(grid.index_of(3, 1)).center(), Team::Blue);
        world.get_mut(enemy).tank_mut().unwrap().invulnerable = 0;
        grid.rebuild_index(&world.entities);

        step(&grid, &mut world, bot, GameMode::Deathmatch);

        let pilot = pilot_of(&world, bot);
        assert!(pilot.flee_until > 0, "firing should start the flee timer");
        assert!(pilot.avoid.contains(&grid.index_of(0, 1)));
        assert_eq!(world.alive().filter(|e| e.projectile().is_some()).count(), 1);
        assert_eq!(
            world.get(bot).tank().unwrap().cooldown,
            config::WEAPON_COOLDOWN_TICKS
        );
    }

    #[test]
    fn test_flee_expires_on_its_timer() {
        let grid = open_grid(3, 3);
        let mut world = World::new();
        let bot = spawn_bot(&mut world, grid.tile(grid.index_of(1, 1)).center(), Team::Red);
        if let Some(state) = world.get_mut(bot).tank_mut() {
            let pilot = state.pilot.as_mut().unwrap();
            pilot.flee_until = 50;
            pilot.avoid.push(grid.index_of(1, 1));
            pilot.decide_in = 100;
        }

        // One tick short of the deadline: the flee state survives (a Cannon
        // tank with a ready weapon gets no early exit)
        world.tick = 49;
        step(&grid, &mut world, bot, GameMode::Deathmatch);
        let pilot = pilot_of(&world, bot);
        assert_eq!(pilot.flee_until, 50);
        assert!(!pilot.avoid.is_empty());

        // On the deadline it clears
        world.tick = 50;
        step(&grid, &mut world, bot, GameMode::Deathmatch);
        let pilot = pilot_of(&world, bot);
        assert_eq!(pilot.flee_until, 0);
        assert!(pilot.avoid.is_empty());
    }

    #[test]
    fn test_laser_flee_ends_early_when_recharged() {
        let grid = open_grid(3, 3);
        let mut world = World::new();
        let bot = world.spawn(
            grid.tile(grid.index_of(1, 1)).center(),
            0.0,
            EntityKind::Tank(TankState::new(Team::Red, true).with_weapon(WeaponKind::Laser)),
        );
        if let Some(state) = world.get_mut(bot).tank_mut() {
            state.cooldown = 0; // fully recharged
            let pilot = state.pilot.as_mut().unwrap();
            pilot.flee_until = 1000;
            pilot.avoid.push(grid.index_of(1, 1));
            pilot.decide_in = 100;
        }

        step(&grid, &mut world, bot, GameMode::Deathmatch);
        let pilot = pilot_of(&world, bot);
        assert_eq!(pilot.flee_until, 0, "ready sustained-aim weapon ends the flee");
        assert!(pilot.avoid.is_empty());
    }

    #[test]
    fn test_follow_turns_the_shorter_way() {
        let grid = open_grid(3, 3);
        let mut world = World::new();
        let start = Point::new(60.0, 60.0);
        let bot = spawn_bot(&mut world, start, Team::Red);
        if let Some(state) = world.get_mut(bot).tank_mut() {
            let pilot = state.pilot.as_mut().unwrap();
            pilot.decide_in = 100; // keep the manual waypoint
            pilot.waypoints.push_back(Point::new(60.0, 100.0)); // bearing +pi/2
        }
        step(&grid, &mut world, bot, GameMode::Deathmatch);
        assert!(
            utils::angle_diff(0.0, world.get(bot).angle) > 0.0,
            "should turn toward positive bearing"
        );

        // And the other way round
        let bot2 = spawn_bot(&mut world, start, Team::Red);
        if let Some(state) = world.get_mut(bot2).tank_mut() {
            let pilot = state.pilot.as_mut().unwrap();
            pilot.decide_in = 100;
            pilot.waypoints.push_back(Point::new(60.0, 20.0)); // bearing -pi/2
        }
        step(&grid, &mut world, bot2, GameMode::Deathmatch);
        assert!(utils::angle_diff(0.0, world.get(bot2).angle) < 0.0);
    }

    #[test]
    fn test_reached_waypoint_is_popped() {
        let grid = open_grid(3, 3);
        let mut world = World::new();
        let start = Point::new(60.0, 60.0);
        let bot = spawn_bot(&mut world, start, Team::Red);
        if let Some(state) = world.get_mut(bot).tank_mut() {
            let pilot = state.pilot.as_mut().unwrap();
            pilot.decide_in = 100;
            pilot.waypoints.push_back(Point::new(62.0, 60.0)); // already within reach
            pilot.waypoints.push_back(Point::new(100.0, 60.0));
        }
        step(&grid, &mut world, bot, GameMode::Deathmatch);
        assert_eq!(pilot_of(&world, bot).waypoints.len(), 1);
    }
}
