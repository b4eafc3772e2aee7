//! Tank state and actuators. Movement and turning are speculative: apply
//! the change, test against the walls, revert or correct. The same `drive`,
//! `turn` and `fire` entry points serve human input and the autopilot.

use crate::autopilot::Pilot;
use crate::collision::wall_collision;
use crate::config;
use crate::types::{EntityId, EntityKind, ProjectileState, Team, WeaponKind, World};
use crate::grid::Grid;
use crate::utils::normalize_angle;

#[derive(Debug, Clone)]
pub struct TankState {
    pub team: Team,
    pub speed: f64,     // World units per tick at full throttle
    pub turn_rate: f64, // Radians per tick
    pub half_w: f64,
    pub half_h: f64,
    pub weapon: WeaponKind,
    pub cooldown: u32,     // Ticks until the weapon is ready
    pub invulnerable: u32, // Spawn protection, ticks remaining
    pub respawn: u32,      // Ticks until respawn while the entity is dead
    pub carrying: Option<EntityId>, // Carried flag, if any
    pub pilot: Option<Pilot>, // Present on bot-controlled tanks
}

impl TankState {
    pub fn new(team: Team, bot: bool) -> Self {
        TankState {
            team,
            speed: config::TANK_SPEED,
            turn_rate: config::TANK_TURN_RATE,
            half_w: config::TANK_HALF_WIDTH,
            half_h: config::TANK_HALF_HEIGHT,
            weapon: WeaponKind::Cannon,
            cooldown: 0,
            invulnerable: config::SPAWN_PROTECTION_TICKS,
            respawn: 0,
            carrying: None,
            pilot: if bot { Some(Pilot::new()) } else { None },
        }
    }

    pub fn with_weapon(mut self, weapon: WeaponKind) -> Self {
        self.weapon = weapon;
        self
    }
}

/// Translate the tank along its heading: `dir` is +1.0 forward, -1.0
/// reverse. On collision the translation is reverted and a small corrective
/// rotation is tried instead, so a tank pushed into a wall near a corner
/// grinds along it rather than stopping dead.
pub fn drive(grid: &Grid, world: &mut World, id: EntityId, dir: f64) {
    let entity = world.get_mut(id);
    if !entity.alive {
        return;
    }
    let Some(state) = entity.tank() else {
        return;
    };
    let (speed, half_w, half_h) = (state.speed, state.half_w, state.half_h);

    let old_pos = entity.pos;
    entity.pos = old_pos.offset(entity.angle, dir * speed);
    let Some(corner) = wall_collision(grid, entity.pos, entity.angle, half_w, half_h) else {
        return;
    };

    entity.pos = old_pos;
    // Grind: rotate away from the colliding side. Left corners (0, 3) and
    // right corners (1, 2) rotate in opposite senses, flipped in reverse.
    let side = if corner == 0 || corner == 3 { 1.0 } else { -1.0 };
    let old_angle = entity.angle;
    entity.angle = normalize_angle(old_angle + side * dir.signum() * config::GRIND_ROTATION);
    if wall_collision(grid, entity.pos, entity.angle, half_w, half_h).is_some() {
        entity.angle = old_angle;
    }
}

/// Rotate the tank by one tick's worth of turn rate, signed by `dir`.
/// A blocked rotation tries a small nudge along the new heading,
/// then the opposite nudge; if both still collide, rotation and nudge are
/// reverted and the tank is left exactly as it was.
pub fn turn(grid: &Grid, world: &mut World, id: EntityId, dir: f64) {
    let entity = world.get_mut(id);
    if !entity.alive {
        return;
    }
    let Some(state) = entity.tank() else {
        return;
    };
    let (turn_rate, half_w, half_h) = (state.turn_rate, state.half_w, state.half_h);

    let old_angle = entity.angle;
    entity.angle = normalize_angle(old_angle + dir * turn_rate);
    if wall_collision(grid, entity.pos, entity.angle, half_w, half_h).is_none() {
        return;
    }

    let old_pos = entity.pos;
    for nudge in [config::TURN_NUDGE, -config::TURN_NUDGE] {
        entity.pos = old_pos.offset(entity.angle, nudge);
        if wall_collision(grid, entity.pos, entity.angle, half_w, half_h).is_none() {
            return;
        }
    }
    entity.pos = old_pos;
    entity.angle = old_angle;
}

/// Fire the tank's weapon if the cooldown allows. The shot spawns at the
/// barrel tip; WallBuster shots demolish walls, Railgun shots are guided.
/// Returns the projectile id when a shot was spawned.
pub fn fire(world: &mut World, id: EntityId) -> Option<EntityId> {
    let entity = world.get(id);
    if !entity.alive {
        return None;
    }
    let state = entity.tank()?;
    if state.cooldown > 0 {
        return None;
    }
    let team = state.team;
    let weapon = state.weapon;
    let angle = entity.angle;
    let pos = entity.pos.offset(angle, config::MUZZLE_OFFSET);

    let shot = world.spawn(
        pos,
        angle,
        EntityKind::Projectile(ProjectileState {
            owner: id,
            team,
            speed: config::PROJECTILE_SPEED,
            radius: config::PROJECTILE_RADIUS,
            age: 0,
            bounces: 0,
            guided: weapon == WeaponKind::Railgun,
            breaker: weapon == WeaponKind::WallBuster,
            repath: 0,
        }),
    );
    if let Some(state) = world.get_mut(id).tank_mut() {
        state.cooldown = config::WEAPON_COOLDOWN_TICKS;
    }
    crate::debug_tank!(id, world.tick, "Fired {:?} shot {}", weapon, shot);
    Some(shot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Point};
    use assert_approx_eq::assert_approx_eq;

    fn open_grid(nx: u32, ny: u32) -> Grid {
        Grid::new(nx, ny, config::TILE_SIZE, config::TILE_SIZE)
    }

    fn spawn_tank(world: &mut World, pos: Point, angle: f64) -> EntityId {
        world.spawn(pos, angle, EntityKind::Tank(TankState::new(Team::Red, false)))
    }

    #[test]
    fn test_drive_moves_along_heading() {
        let grid = open_grid(3, 3);
        let mut world = World::new();
        let id = spawn_tank(&mut world, Point::new(60.0, 60.0), 0.0);
        drive(&grid, &mut world, id, 1.0);
        assert_approx_eq!(world.get(id).pos.x, 60.0 + config::TANK_SPEED);
        assert_approx_eq!(world.get(id).pos.y, 60.0);
        drive(&grid, &mut world, id, -1.0);
        assert_approx_eq!(world.get(id).pos.x, 60.0);
    }

    #[test]
    fn test_drive_into_wall_reverts_and_grinds() {
        let mut grid = open_grid(3, 3);
        let tile = grid.index_of(1, 1);
        grid.set_wall(tile, Direction::Right, true);
        let wall_x = grid.tile(tile).x + grid.tile(tile).dx;
        let cy = grid.tile(tile).center().y;

        // One tick short of the wall, square on
        let start = Point::new(wall_x - config::TANK_HALF_WIDTH - 1.0, cy);
        let mut world = World::new();
        let id = spawn_tank(&mut world, start, 0.0);
        drive(&grid, &mut world, id, 1.0);

        let tank = world.get(id);
        assert_eq!(tank.pos, start, "translation into the wall must be reverted");
        assert_approx_eq!(
            tank.angle,
            normalize_angle(config::GRIND_ROTATION),
            1e-9
        );
    }

    #[test]
    fn test_blocked_turn_leaves_tank_untouched() {
        // A sealed single tile barely bigger than the tank: any sizeable
        // rotation collides and no nudge can help.
        let mut grid = Grid::new(1, 1, 26.0, 26.0);
        grid.seal_boundary();
        let mut world = World::new();
        let center = grid.tile(0).center();
        let id = spawn_tank(&mut world, center, 0.0);
        if let Some(state) = world.get_mut(id).tank_mut() {
            state.half_w = 10.0;
            state.half_h = 10.0;
            state.turn_rate = std::f64::consts::FRAC_PI_4;
        }

        turn(&grid, &mut world, id, 1.0);
        let tank = world.get(id);
        assert_eq!(tank.pos, center);
        assert_approx_eq!(tank.angle, 0.0);
    }

    #[test]
    fn test_free_turn_applies_rotation() {
        let grid = open_grid(3, 3);
        let mut world = World::new();
        let id = spawn_tank(&mut world, Point::new(60.0, 60.0), 0.0);
        turn(&grid, &mut world, id, 1.0);
        assert_approx_eq!(world.get(id).angle, config::TANK_TURN_RATE);
        turn(&grid, &mut world, id, -1.0);
        assert_approx_eq!(world.get(id).angle, 0.0);
    }

    #[test]
    fn test_fire_respects_cooldown_and_muzzle_offset() {
        let mut world = World::new();
        let id = spawn_tank(&mut world, Point::new(60.0, 60.0), 0.0);
        let shot = fire(&mut world, id).expect("first shot should fire");

        let proj = world.get(shot);
        assert_approx_eq!(proj.pos.x, 60.0 + config::MUZZLE_OFFSET);
        assert_approx_eq!(proj.pos.y, 60.0);
        assert_eq!(proj.projectile().unwrap().owner, id);

        // Cooldown now blocks the next shot
        assert_eq!(fire(&mut world, id), None);
        assert_eq!(
            world.get(id).tank().unwrap().cooldown,
            config::WEAPON_COOLDOWN_TICKS
        );
    }

    #[test]
    fn test_weapon_flags_on_projectiles() {
        let mut world = World::new();
        let buster = world.spawn(
            Point::new(60.0, 60.0),
            0.0,
            EntityKind::Tank(TankState::new(Team::Red, false).with_weapon(WeaponKind::WallBuster)),
        );
        let rail = world.spawn(
            Point::new(200.0, 200.0),
            0.0,
            EntityKind::Tank(TankState::new(Team::Blue, false).with_weapon(WeaponKind::Railgun)),
        );
        let b = fire(&mut world, buster).unwrap();
        let r = fire(&mut world, rail).unwrap();
        assert!(world.get(b).projectile().unwrap().breaker);
        assert!(world.get(r).projectile().unwrap().guided);
    }
}
