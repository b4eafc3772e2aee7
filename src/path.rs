//! Recursive shortest-path search over the tile graph. Walls are removed
//! edges; the current partial path doubles as the visited set.

use crate::grid::{Grid, Tile};
use crate::types::{Direction, Entity, EntityId, Point, World};

/// A tile path converted to world-space waypoints (tile centers), with the
/// matched entity appended when the search was for an object.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointPath {
    pub points: Vec<Point>,
    pub target: Option<EntityId>,
}

impl WaypointPath {
    /// The points a follower should actually drive through. A length-1 path
    /// means the goal is in the start tile: go straight to that point. Any
    /// longer path skips the start tile's own center.
    pub fn drive_points(&self) -> &[Point] {
        if self.points.len() <= 1 {
            &self.points
        } else {
            &self.points[1..]
        }
    }
}

/// Depth-first search for the shortest tile path (by tile count) from
/// `start` to any tile satisfying `is_goal`, never longer than `max_len`
/// tiles. Returns `None` when no goal is reachable within the cap; that is
/// a normal outcome, not an error.
///
/// The cap is mandatory: the search is exhaustive and exponential without
/// it. Branch-and-bound keeps it usable in practice; once a full path is
/// known, no sibling branch is explored to an equal or greater length.
pub fn shortest_path_to<F>(grid: &Grid, start: usize, is_goal: F, max_len: usize) -> Option<Vec<usize>>
where
    F: Fn(&Tile) -> bool,
{
    if max_len == 0 {
        return None;
    }
    let mut stack = vec![start];
    let mut best: Option<Vec<usize>> = None;
    search(grid, &is_goal, max_len, start, &mut stack, &mut best);
    if let Some(ref path) = best {
        crate::debug_path!("Found path of {} tiles from tile {}", path.len(), start);
    }
    best
}

fn search<F>(
    grid: &Grid,
    is_goal: &F,
    max_len: usize,
    current: usize,
    stack: &mut Vec<usize>,
    best: &mut Option<Vec<usize>>,
) where
    F: Fn(&Tile) -> bool,
{
    if is_goal(grid.tile(current)) {
        if best.as_ref().is_none_or(|b| stack.len() < b.len()) {
            *best = Some(stack.clone());
        }
        return;
    }

    for dir in Direction::ALL {
        let tile = grid.tile(current);
        if tile.walls[dir.index()] {
            continue;
        }
        let Some(next) = tile.neighbors[dir.index()] else {
            continue;
        };
        if stack.contains(&next) {
            continue;
        }
        // A known full path of length L caps siblings at L - 1 tiles; only a
        // strictly shorter path can replace it. Without one, the caller's
        // hard cap applies.
        let limit = best.as_ref().map_or(max_len, |b| b.len() - 1);
        if stack.len() + 1 > limit {
            continue;
        }
        stack.push(next);
        search(grid, is_goal, max_len, next, stack, best);
        stack.pop();
    }
}

/// Shortest path to the nearest entity satisfying `pred`, as waypoints.
/// The goal test is "does any live entity indexed in this tile match", so
/// the result reflects the spatial index as of the last rebuild.
pub fn path_to_entity<P>(
    grid: &Grid,
    world: &World,
    start: usize,
    pred: P,
    max_len: usize,
) -> Option<WaypointPath>
where
    P: Fn(&Entity) -> bool,
{
    let matches = |id: EntityId| {
        let e = world.get(id);
        e.alive && pred(e)
    };
    let tile_path = shortest_path_to(
        grid,
        start,
        |tile| tile.objs.iter().any(|&id| matches(id)),
        max_len,
    )?;
    let last = *tile_path.last()?;
    let target = grid.tile(last).objs.iter().copied().find(|&id| matches(id));
    let points = tile_path.iter().map(|&idx| grid.tile(idx).center()).collect();
    Some(WaypointPath { points, target })
}
