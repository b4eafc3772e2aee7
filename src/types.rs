//! Shared core types: world points, entity registry, directions, events.

use crate::tank::TankState;

pub type EntityId = u32;

/// A position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    pub fn distance_sq(&self, other: &Point) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    /// The point reached by travelling `dist` along `angle` (radians from +x).
    pub fn offset(&self, angle: f64, dist: f64) -> Point {
        Point {
            x: self.x + angle.cos() * dist,
            y: self.y + angle.sin() * dist,
        }
    }
}

/// Wall/neighbor direction. The discriminant doubles as the index into
/// `Tile::walls` and `Tile::neighbors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Top = 0,
    Left = 1,
    Bottom = 2,
    Right = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Top,
        Direction::Left,
        Direction::Bottom,
        Direction::Right,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Top => Direction::Bottom,
            Direction::Left => Direction::Right,
            Direction::Bottom => Direction::Top,
            Direction::Right => Direction::Left,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Deathmatch,
    TeamDeathmatch,
    CaptureTheFlag,
    KingOfTheHill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponKind {
    /// Default projectile weapon, plain range gate.
    Cannon,
    /// Line-of-effect weapon, needs a wall-free ray to the target.
    Laser,
    /// Wall-dependent weapon: shots demolish the first wall they cross.
    WallBuster,
    /// Long-range weapon, raw distance test instead of the default gate.
    Railgun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupKind {
    Repair,
    WeaponCrate,
    Shield,
}

#[derive(Debug, Clone)]
pub struct ProjectileState {
    pub owner: EntityId,
    pub team: Team,
    pub speed: f64,
    pub radius: f64,
    pub age: u32, // Ticks since fired
    pub bounces: u32,
    pub guided: bool,
    pub breaker: bool, // WallBuster shots demolish walls instead of bouncing
    pub repath: u32,   // Guided shots: ticks until next target re-acquisition
}

#[derive(Debug, Clone)]
pub struct FlagState {
    pub team: Team,
    pub home: Point,
    pub carried_by: Option<EntityId>,
}

#[derive(Debug, Clone)]
pub struct CapturePointState {
    pub owner: Option<Team>,
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Tank(TankState),
    Projectile(ProjectileState),
    Pickup(PickupKind),
    Flag(FlagState),
    CapturePoint(CapturePointState),
}

/// A simulated object. `id` is the index into `World::entities`; slots are
/// never reused within a match, `alive` marks logical removal.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub pos: Point,
    pub angle: f64, // Heading in radians, measured from +x
    pub alive: bool,
    pub kind: EntityKind,
}

impl Entity {
    pub fn tank(&self) -> Option<&TankState> {
        match &self.kind {
            EntityKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    pub fn tank_mut(&mut self) -> Option<&mut TankState> {
        match &mut self.kind {
            EntityKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    pub fn projectile(&self) -> Option<&ProjectileState> {
        match &self.kind {
            EntityKind::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn projectile_mut(&mut self) -> Option<&mut ProjectileState> {
        match &mut self.kind {
            EntityKind::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_tank(&self) -> bool {
        matches!(self.kind, EntityKind::Tank(_))
    }

    pub fn team(&self) -> Option<Team> {
        match &self.kind {
            EntityKind::Tank(t) => Some(t.team),
            EntityKind::Projectile(p) => Some(p.team),
            EntityKind::Flag(f) => Some(f.team),
            EntityKind::CapturePoint(c) => c.owner,
            EntityKind::Pickup(_) => None,
        }
    }
}

/// Side effects produced by the core. Collision and gameplay code never
/// plays sounds or mutates scores directly; it pushes events and the caller
/// applies them after the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    WallBounce { projectile: EntityId, pos: Point },
    WallBroken { tile: usize, dir: Direction, pos: Point },
    ProjectileExplosion { projectile: EntityId, pos: Point },
    TankHit { tank: EntityId, projectile: EntityId, shooter: EntityId },
    TankDestroyed { tank: EntityId, shooter: EntityId },
    TankRespawned { tank: EntityId },
    PickupTaken { tank: EntityId, pickup: EntityId, kind: PickupKind },
    FlagTaken { tank: EntityId, flag: EntityId },
    FlagDropped { tank: EntityId, flag: EntityId },
    FlagReturned { flag: EntityId },
    FlagCaptured { tank: EntityId, team: Team },
    PointCaptured { tank: EntityId, team: Team },
    EntityOutOfBounds { id: EntityId },
}

/// The authoritative entity list plus the simulation clock. The grid's
/// per-tile index only ever holds ids pointing back into this registry.
#[derive(Debug, Default)]
pub struct World {
    pub entities: Vec<Entity>,
    pub tick: u64,
}

impl World {
    pub fn new() -> Self {
        World::default()
    }

    pub fn spawn(&mut self, pos: Point, angle: f64, kind: EntityKind) -> EntityId {
        let id = self.entities.len() as EntityId;
        self.entities.push(Entity {
            id,
            pos,
            angle,
            alive: true,
            kind,
        });
        id
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id as usize]
    }

    pub fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id as usize]
    }

    pub fn despawn(&mut self, id: EntityId) {
        self.entities[id as usize].alive = false;
    }

    pub fn alive(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_point_distance_and_offset() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_approx_eq!(a.distance(&b), 5.0);
        let c = a.offset(0.0, 10.0);
        assert_approx_eq!(c.x, 10.0);
        assert_approx_eq!(c.y, 0.0);
    }

    #[test]
    fn test_direction_opposites() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::Top.opposite(), Direction::Bottom);
        assert_eq!(Direction::Left.opposite(), Direction::Right);
    }

    #[test]
    fn test_world_spawn_and_despawn() {
        let mut world = World::new();
        let id = world.spawn(Point::new(1.0, 2.0), 0.0, EntityKind::Pickup(PickupKind::Repair));
        assert_eq!(id, 0);
        assert!(world.get(id).alive);
        world.despawn(id);
        assert!(!world.get(id).alive);
        assert_eq!(world.alive().count(), 0);
    }
}
