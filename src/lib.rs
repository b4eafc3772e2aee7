pub mod autopilot;
pub mod collision;
pub mod config;
pub mod game;
pub mod grid;
pub mod logging;
pub mod path;
pub mod tank;
pub mod types;
pub mod utils;

pub use game::{Game, Scoreboard};
pub use grid::{Grid, LayoutError, Tile};
pub use types::{Entity, EntityId, EntityKind, GameMode, Point, SimEvent, Team, World};
