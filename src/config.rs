//! Configuration constants for the tank maze simulation.

// Grid layout
pub const TILE_SIZE: f64 = 40.0; // Tile edge length in world units
pub const MIN_GRID_DIM: u32 = 6; // Lower bound for randomized grid dimensions
pub const MAX_GRID_DIM: u32 = 14; // Upper bound for randomized grid dimensions
pub const WALL_TOLERANCE: f64 = 0.01; // Fraction of tile size a point must sit past an edge to count as crossing

// Tank physics
pub const TANK_HALF_WIDTH: f64 = 14.0; // Half extent along the heading axis
pub const TANK_HALF_HEIGHT: f64 = 10.0; // Half extent across the heading axis
pub const TANK_SPEED: f64 = 2.0; // World units per tick at full throttle
pub const TANK_TURN_RATE: f64 = 0.08; // Radians per tick
pub const GRIND_ROTATION: f64 = 0.03; // Corrective rotation applied when driving into a wall corner
pub const TURN_NUDGE: f64 = 1.5; // Lateral translation tried when a turn is blocked

// Projectiles
pub const PROJECTILE_SPEED: f64 = 5.0; // World units per tick
pub const PROJECTILE_RADIUS: f64 = 3.0;
pub const PROJECTILE_RADIUS_SCALE: f64 = 0.8; // Damping applied to the summed radii before the overlap test
pub const PROJECTILE_HITBOX_MARGIN: f64 = 1.0; // Extra margin added on top of the scaled radii
pub const PROJECTILE_LIFETIME_TICKS: u32 = 600; // Shots expire rather than bounce forever
pub const PROJECTILE_GRACE_TICKS: u32 = 8; // Ticks during which a shot cannot hit its own shooter
pub const GUIDED_REPATH_TICKS: u32 = 20; // Target re-acquisition cadence for guided shots
pub const GUIDED_TURN_RATE: f64 = 0.12; // Radians per tick a guided shot may steer
pub const MUZZLE_OFFSET: f64 = 16.0; // Barrel tip distance from the tank center

// Weapons
pub const WEAPON_COOLDOWN_TICKS: u32 = 45;
pub const CANNON_RANGE: f64 = 280.0; // Default firing range (world units)
pub const LASER_RANGE: f64 = 320.0;
pub const RAILGUN_RANGE: f64 = 900.0; // Raw-distance test, ignores the default range gate
pub const LASER_RAY_STEP: f64 = 4.0; // Sampling step for the line-of-effect test

// Timers (simulation ticks, never wall clock)
pub const RESPAWN_TICKS: u32 = 180;
pub const SPAWN_PROTECTION_TICKS: u32 = 120;
pub const FLEE_TICKS: u32 = 90;

// Autopilot
pub const DECIDE_BASE_TICKS: f64 = 30.0; // Re-evaluation interval at unit speed
pub const DECIDE_MIN_TICKS: u32 = 5;
pub const DECIDE_MAX_TICKS: u32 = 60;
pub const PICKUP_SEARCH_TILES: usize = 5; // Short search radius for attractive pickups
pub const ENEMY_SEARCH_TILES: usize = 20;
pub const OBJECTIVE_SEARCH_TILES: usize = 30;
pub const FLEE_SEARCH_TILES: usize = 6;
pub const FLEE_MIN_TILES: i64 = 3; // Manhattan tile distance an escape tile must put between us and here
pub const WAYPOINT_REACHED_DIST: f64 = 6.0;
pub const AIM_TOLERANCE: f64 = 0.20; // Max heading error (radians) while still driving forward
pub const TURN_DEADBAND: f64 = 0.02; // Heading error below which the pilot stops adjusting
pub const WEIGHT_PICKUP: f64 = 70.0;
pub const WEIGHT_ENEMY: f64 = 50.0;
pub const WEIGHT_OBJECTIVE: f64 = 90.0;
pub const WEIGHT_FLEE: f64 = 120.0;
pub const WEIGHT_DISTANCE_PENALTY: f64 = 2.0; // Per-tile penalty subtracted from a candidate's base weight

// Match defaults
pub const DEFAULT_MAX_TICKS: u64 = 18_000;
pub const DEFAULT_TANKS: u32 = 4;
pub const DEFAULT_WALL_DENSITY: f64 = 0.22; // Fraction of interior edges given a wall by the demo layout
