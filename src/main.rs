use clap::Parser;
use log::{info, warn, LevelFilter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::rc::Rc;

use tankmaze::config;
use tankmaze::game::Game;
use tankmaze::grid::Grid;
use tankmaze::logging;
use tankmaze::types::{Direction, GameMode, PickupKind, SimEvent, Team};

// --- Command Line Arguments ---
#[derive(Parser, Debug)]
#[command(author, version, about = "Headless tank combat in a walled maze", long_about = None)]
struct Args {
    /// Game mode: dm, tdm, ctf, koth
    #[arg(long, default_value = "dm")]
    mode: String,

    /// RNG seed; omit for a random match
    #[arg(long)]
    seed: Option<u64>,

    /// Grid dimensions as COLSxROWS (e.g. 10x8); omit for random dimensions
    #[arg(long)]
    grid: Option<String>,

    /// Maximum number of ticks to simulate
    #[arg(long, default_value_t = config::DEFAULT_MAX_TICKS)]
    ticks: u64,

    /// Number of tanks, alternating between the two teams (minimum 2)
    #[arg(long, default_value_t = config::DEFAULT_TANKS)]
    tanks: u32,

    /// Fraction of interior edges given a wall
    #[arg(long, default_value_t = config::DEFAULT_WALL_DENSITY)]
    wall_density: f64,

    /// Pickups scattered at match start
    #[arg(long, default_value_t = 3)]
    pickups: u32,

    /// Debug filter to limit debug log topics (e.g., "pilot,collision")
    /// Available topics: grid, path, collision, pilot, tank
    #[arg(long)]
    debug_filter: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_mode(s: &str) -> GameMode {
    match s.to_lowercase().as_str() {
        "dm" => GameMode::Deathmatch,
        "tdm" => GameMode::TeamDeathmatch,
        "ctf" => GameMode::CaptureTheFlag,
        "koth" => GameMode::KingOfTheHill,
        other => {
            warn!("Unknown mode '{}', falling back to deathmatch", other);
            GameMode::Deathmatch
        }
    }
}

fn parse_dims(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once('x')?;
    let nx: u32 = a.trim().parse().ok()?;
    let ny: u32 = b.trim().parse().ok()?;
    if nx == 0 || ny == 0 {
        return None;
    }
    Some((nx, ny))
}

/// Scatter interior walls edge by edge. Right/bottom edges only, so each
/// interior edge is considered exactly once; `set_wall` keeps the paired
/// tile symmetric.
fn scatter_walls(grid: &mut Grid, rng: &mut StdRng, density: f64) {
    let mut placed = 0u32;
    for idx in 0..grid.tiles().len() {
        for dir in [Direction::Right, Direction::Bottom] {
            if grid.tile(idx).neighbors[dir.index()].is_some() && rng.gen_bool(density) {
                grid.set_wall(idx, dir, true);
                placed += 1;
            }
        }
    }
    info!("Scattered {} interior walls", placed);
}

fn main() {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    if let Err(e) = logging::init_logger(log_level, args.debug_filter.clone()) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("Match seed: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut grid = match args.grid.as_deref().and_then(parse_dims) {
        Some((nx, ny)) => Grid::new(nx, ny, config::TILE_SIZE, config::TILE_SIZE),
        None => Grid::with_random_dims(&mut rng),
    };
    grid.seal_boundary();
    scatter_walls(&mut grid, &mut rng, args.wall_density.clamp(0.0, 1.0));

    let mode = parse_mode(&args.mode);
    let mut game = Game::new(grid, mode, rng);
    game.place_objectives();

    let tanks = args.tanks.max(2);
    for n in 0..tanks {
        let team = if n % 2 == 0 { Team::Red } else { Team::Blue };
        game.add_tank(team, true);
    }
    let kinds = [PickupKind::Shield, PickupKind::WeaponCrate, PickupKind::Repair];
    for n in 0..args.pickups {
        game.add_pickup(kinds[n as usize % kinds.len()]);
    }

    // The sink is where a front end would hang sounds and particles; the
    // headless build just tallies bounces.
    let bounces = Rc::new(RefCell::new(0u64));
    let counter = Rc::clone(&bounces);
    game.set_event_sink(Box::new(move |event| {
        if matches!(event, SimEvent::WallBounce { .. }) {
            *counter.borrow_mut() += 1;
        }
    }));

    info!("Starting {:?} match: {} tanks, up to {} ticks", mode, tanks, args.ticks);
    for _ in 0..args.ticks {
        game.tick();
    }

    info!(
        "Match over after {} ticks: red {}, blue {}, {} wall bounces",
        args.ticks,
        game.scores.red,
        game.scores.blue,
        bounces.borrow()
    );
    match game.winner() {
        Some(team) => info!("{:?} wins", team),
        None => info!("Draw"),
    }
}
