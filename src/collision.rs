//! Collision resolution over the grid's spatial index: rotated-rectangle
//! corner tests, wall crossing and reflection, radius overlap. Everything
//! here is pure over the grid and entity registry; side effects come back
//! as `SimEvent`s for the caller to apply.

use crate::config;
use crate::grid::Grid;
use crate::types::{Direction, Entity, EntityId, Point, SimEvent, World};
use crate::utils::normalize_angle;
use std::f64::consts::PI;

/// Corners of a rectangle centered at `pos`, rotated by `angle`.
/// Order: front-left, front-right, back-right, back-left relative to the
/// heading ("left" is negative local y).
pub fn rect_corners(pos: Point, angle: f64, half_w: f64, half_h: f64) -> [Point; 4] {
    let (sin, cos) = angle.sin_cos();
    let corner = |dx: f64, dy: f64| {
        Point::new(pos.x + dx * cos - dy * sin, pos.y + dx * sin + dy * cos)
    };
    [
        corner(half_w, -half_h),
        corner(half_w, half_h),
        corner(-half_w, half_h),
        corner(-half_w, -half_h),
    ]
}

/// Point-in-rotated-rectangle via the two-projection test: with adjacent
/// corners A, B and D, M is inside iff 0 < AM.AB < AB.AB and
/// 0 < AM.AD < AD.AD. Strict, so points on the boundary are outside.
pub fn point_in_rect(m: Point, corners: &[Point; 4]) -> bool {
    let (a, b, d) = (corners[0], corners[1], corners[3]);
    let (am_x, am_y) = (m.x - a.x, m.y - a.y);
    let (ab_x, ab_y) = (b.x - a.x, b.y - a.y);
    let (ad_x, ad_y) = (d.x - a.x, d.y - a.y);
    let am_ab = am_x * ab_x + am_y * ab_y;
    let am_ad = am_x * ad_x + am_y * ad_y;
    0.0 < am_ab
        && am_ab < ab_x * ab_x + ab_y * ab_y
        && 0.0 < am_ad
        && am_ad < ad_x * ad_x + ad_y * ad_y
}

/// Test a tank-sized rotated rectangle against the walls around it.
/// Returns the index of the first colliding corner, or `None`.
///
/// Each corner gets two checks: does a wall of the center tile lie between
/// the center and the corner, and, when the corner resolves to a different
/// tile, does that tile have a wall-bearing corner strictly inside the
/// rectangle. The second catches walls that only touch the tank at a tile
/// corner, which the center-to-corner test alone misses.
pub fn wall_collision(
    grid: &Grid,
    pos: Point,
    angle: f64,
    half_w: f64,
    half_h: f64,
) -> Option<usize> {
    // No containing tile (e.g. freshly spawned off-grid): no collision.
    let center_idx = grid.tile_at(pos.x, pos.y)?;
    let corners = rect_corners(pos, angle, half_w, half_h);

    for (k, corner) in corners.iter().enumerate() {
        let crossed = grid.walls_between(center_idx, corner.x, corner.y);
        if crossed.iter().any(|&c| c) {
            return Some(k);
        }
        if let Some(idx) = grid.tile_at(corner.x, corner.y) {
            if idx != center_idx {
                for wall_corner in grid.tile(idx).walled_corners() {
                    if point_in_rect(wall_corner, &corners) {
                        crate::debug_collision!(
                            "Corner straddle hit: tile {} corner inside rect at corner {}",
                            idx,
                            k
                        );
                        return Some(k);
                    }
                }
            }
        }
    }
    None
}

/// Reflect a projectile off any wall it crossed since `prev`. Mutates the
/// projectile's position and heading in place and pushes a bounce event for
/// the caller's sound/VFX hooks. A projectile with no previous tile is left
/// alone.
pub fn reflect(grid: &Grid, projectile: &mut Entity, prev: Point, events: &mut Vec<SimEvent>) {
    let Some(prev_idx) = grid.tile_at(prev.x, prev.y) else {
        return;
    };
    let crossed = grid.walls_between(prev_idx, projectile.pos.x, projectile.pos.y);
    let count = crossed.iter().filter(|&&c| c).count();
    if count == 0 {
        return;
    }

    if count >= 2 {
        // Both walls of a corner crossed at once: reverse outright and snap
        // back to the previous position so the shot cannot tunnel through.
        projectile.angle = normalize_angle(projectile.angle + PI);
        projectile.pos = prev;
    } else if crossed[Direction::Left.index()] || crossed[Direction::Right.index()] {
        // Vertical wall: flip the x component of the heading and reflect
        // the x coordinate about the previous x.
        projectile.angle = normalize_angle(PI - projectile.angle);
        projectile.pos.x = 2.0 * prev.x - projectile.pos.x;
    } else {
        // Horizontal wall: flip the y component and reflect y.
        projectile.angle = normalize_angle(-projectile.angle);
        projectile.pos.y = 2.0 * prev.y - projectile.pos.y;
    }

    crate::debug_collision!(
        "Projectile {} bounced ({} wall(s)) at ({:.1}, {:.1})",
        projectile.id,
        count,
        projectile.pos.x,
        projectile.pos.y
    );
    events.push(SimEvent::WallBounce {
        projectile: projectile.id,
        pos: projectile.pos,
    });
    if let Some(p) = projectile.projectile_mut() {
        p.bounces += 1;
    }
}

/// Resolve projectile-vs-projectile overlaps through the spatial index.
/// Only shots with positive age collide (a shot cannot detonate in the
/// barrel); overlapping pairs both explode, one event per projectile.
pub fn projectile_collisions(grid: &Grid, world: &mut World, events: &mut Vec<SimEvent>) {
    let mut exploded: Vec<(EntityId, EntityId)> = Vec::new();
    for entity in world.alive() {
        let Some(p) = entity.projectile() else {
            continue;
        };
        if p.age == 0 {
            continue;
        }
        let Some(idx) = grid.tile_at(entity.pos.x, entity.pos.y) else {
            continue;
        };
        for &other_id in &grid.tile(idx).objs {
            if other_id <= entity.id {
                continue; // Each pair once
            }
            let other = world.get(other_id);
            if !other.alive {
                continue;
            }
            let Some(q) = other.projectile() else {
                continue;
            };
            if q.age == 0 {
                continue;
            }
            let reach = (p.radius + q.radius) * config::PROJECTILE_RADIUS_SCALE
                + config::PROJECTILE_HITBOX_MARGIN;
            if entity.pos.distance(&other.pos) < reach {
                exploded.push((entity.id, other_id));
            }
        }
    }

    for (a, b) in exploded {
        for id in [a, b] {
            let entity = world.get(id);
            if entity.alive {
                let pos = entity.pos;
                world.despawn(id);
                events.push(SimEvent::ProjectileExplosion { projectile: id, pos });
            }
        }
    }
}

/// Entities overlapped by a tank's rectangle. Candidates are gathered from
/// the tiles under all four corners, not just the center, so a tank
/// straddling a tile boundary still sees everything it touches; candidates
/// are deduplicated before the point-in-rectangle test.
pub fn tank_overlaps(grid: &Grid, world: &World, tank_id: EntityId) -> Vec<EntityId> {
    let tank = world.get(tank_id);
    let Some(state) = tank.tank() else {
        return Vec::new();
    };
    let corners = rect_corners(tank.pos, tank.angle, state.half_w, state.half_h);

    let mut tiles = Vec::with_capacity(4);
    for corner in &corners {
        if let Some(idx) = grid.tile_at(corner.x, corner.y) {
            if !tiles.contains(&idx) {
                tiles.push(idx);
            }
        }
    }

    let mut hits = Vec::new();
    for idx in tiles {
        for &id in &grid.tile(idx).objs {
            if id == tank_id || hits.contains(&id) {
                continue;
            }
            let entity = world.get(id);
            if entity.alive && point_in_rect(entity.pos, &corners) {
                hits.push(id);
            }
        }
    }
    hits
}

/// True when no wall lies on the straight segment between the two points.
/// The segment is sampled at a step well below the tile size and every tile
/// transition is checked against the wall on the shared edge. Used by
/// line-of-effect weapons.
pub fn clear_ray(grid: &Grid, from: Point, to: Point) -> bool {
    let Some(mut cur) = grid.tile_at(from.x, from.y) else {
        return false;
    };
    let dist = from.distance(&to);
    if dist == 0.0 {
        return true;
    }
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let steps = (dist / config::LASER_RAY_STEP).ceil() as usize;
    for s in 1..=steps {
        let p = from.offset(angle, (s as f64 * config::LASER_RAY_STEP).min(dist));
        let Some(next) = grid.tile_at(p.x, p.y) else {
            return false;
        };
        if next == cur {
            continue;
        }
        let a = grid.tile(cur);
        let b = grid.tile(next);
        let di = b.i as i64 - a.i as i64;
        let dj = b.j as i64 - a.j as i64;
        let blocked = (di > 0 && a.walls[Direction::Right.index()])
            || (di < 0 && a.walls[Direction::Left.index()])
            || (dj > 0 && a.walls[Direction::Bottom.index()])
            || (dj < 0 && a.walls[Direction::Top.index()]);
        if blocked {
            return false;
        }
        cur = next;
    }
    true
}
