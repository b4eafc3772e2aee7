//! The walled tile grid: spatial index, wall topology, layout encode/decode.

use crate::config;
use crate::types::{Direction, Entity, EntityId, Point};
use rand::Rng;
use thiserror::Error;

/// Wall layout errors raised while applying a decoded bitmask layout.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("expected {expected} rows, got {got}")]
    RowCount { expected: usize, got: usize },
    #[error("row {row} has {got} tiles, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("mask {mask:#04x} at row {row}, column {col} uses bits above the low four")]
    BadMask { row: usize, col: usize, mask: u8 },
    #[error("asymmetric walls between tiles ({i_a}, {j_a}) and ({i_b}, {j_b})")]
    AsymmetricWalls { i_a: u32, j_a: u32, i_b: u32, j_b: u32 },
}

/// One grid cell. `neighbors` holds indices into `Grid::tiles`, computed
/// once at construction; only `walls` and `objs` change afterwards.
#[derive(Debug, Clone)]
pub struct Tile {
    pub i: u32,
    pub j: u32,
    pub id: usize, // Derived unique id: i * ny + j
    pub x: f64,    // World-space origin (top-left corner)
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub walls: [bool; 4], // Indexed by Direction: top, left, bottom, right
    pub neighbors: [Option<usize>; 4],
    pub objs: Vec<EntityId>, // Derived index, rebuilt every tick; never authoritative
}

impl Tile {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.dx / 2.0, self.y + self.dy / 2.0)
    }

    /// World-space corner points of this tile that touch at least one of its
    /// set walls. Used by the tank corner-straddle collision check.
    pub fn walled_corners(&self) -> Vec<Point> {
        let t = Direction::Top.index();
        let l = Direction::Left.index();
        let b = Direction::Bottom.index();
        let r = Direction::Right.index();
        let mut corners = Vec::new();
        if self.walls[t] || self.walls[l] {
            corners.push(Point::new(self.x, self.y));
        }
        if self.walls[t] || self.walls[r] {
            corners.push(Point::new(self.x + self.dx, self.y));
        }
        if self.walls[b] || self.walls[r] {
            corners.push(Point::new(self.x + self.dx, self.y + self.dy));
        }
        if self.walls[b] || self.walls[l] {
            corners.push(Point::new(self.x, self.y + self.dy));
        }
        corners
    }
}

/// The arena grid. Owns all tiles; owns no entities.
#[derive(Debug)]
pub struct Grid {
    pub nx: u32,
    pub ny: u32,
    pub tile_w: f64,
    pub tile_h: f64,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Build an `nx` by `ny` grid and link neighbor topology. Tile storage
    /// is flat, indexed `i * ny + j`, and its size never changes afterwards.
    pub fn new(nx: u32, ny: u32, tile_w: f64, tile_h: f64) -> Self {
        let mut tiles = Vec::with_capacity((nx * ny) as usize);
        for i in 0..nx {
            for j in 0..ny {
                tiles.push(Tile {
                    i,
                    j,
                    id: (i * ny + j) as usize,
                    x: i as f64 * tile_w,
                    y: j as f64 * tile_h,
                    dx: tile_w,
                    dy: tile_h,
                    walls: [false; 4],
                    neighbors: [None; 4],
                    objs: Vec::new(),
                });
            }
        }

        let mut grid = Grid {
            nx,
            ny,
            tile_w,
            tile_h,
            tiles,
        };
        grid.link_neighbors();
        log::info!("Grid created: {}x{} tiles of {}x{}", nx, ny, tile_w, tile_h);
        grid
    }

    /// Build a grid with dimensions randomized within the configured bounds.
    pub fn with_random_dims<R: Rng>(rng: &mut R) -> Self {
        let nx = rng.gen_range(config::MIN_GRID_DIM..=config::MAX_GRID_DIM);
        let ny = rng.gen_range(config::MIN_GRID_DIM..=config::MAX_GRID_DIM);
        Grid::new(nx, ny, config::TILE_SIZE, config::TILE_SIZE)
    }

    fn link_neighbors(&mut self) {
        for idx in 0..self.tiles.len() {
            let (i, j) = (self.tiles[idx].i, self.tiles[idx].j);
            let mut neighbors = [None; 4];
            if j > 0 {
                neighbors[Direction::Top.index()] = Some(self.index_of(i, j - 1));
            }
            if i > 0 {
                neighbors[Direction::Left.index()] = Some(self.index_of(i - 1, j));
            }
            if j + 1 < self.ny {
                neighbors[Direction::Bottom.index()] = Some(self.index_of(i, j + 1));
            }
            if i + 1 < self.nx {
                neighbors[Direction::Right.index()] = Some(self.index_of(i + 1, j));
            }
            self.tiles[idx].neighbors = neighbors;
        }
    }

    pub fn index_of(&self, i: u32, j: u32) -> usize {
        (i * self.ny + j) as usize
    }

    pub fn tile(&self, idx: usize) -> &Tile {
        &self.tiles[idx]
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Locate the tile containing a world position, by integer division by
    /// the tile size. Returns `None` outside the grid.
    pub fn tile_at(&self, x: f64, y: f64) -> Option<usize> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let i = (x / self.tile_w) as u32;
        let j = (y / self.tile_h) as u32;
        if i >= self.nx || j >= self.ny {
            return None;
        }
        Some(self.index_of(i, j))
    }

    /// Clear every tile's entity index, then re-insert each live entity into
    /// its containing tile. Entities outside the grid are returned to the
    /// caller, whose policy it is to remove them.
    pub fn rebuild_index(&mut self, entities: &[Entity]) -> Vec<EntityId> {
        for tile in &mut self.tiles {
            tile.objs.clear();
        }
        let mut out_of_bounds = Vec::new();
        for entity in entities.iter().filter(|e| e.alive) {
            match self.tile_at(entity.pos.x, entity.pos.y) {
                Some(idx) => self.tiles[idx].objs.push(entity.id),
                None => out_of_bounds.push(entity.id),
            }
        }
        out_of_bounds
    }

    /// Set or clear a wall. The paired wall on the neighbor in the opposite
    /// direction is always updated in the same call, so the symmetry
    /// invariant cannot be broken through this entry point.
    pub fn set_wall(&mut self, idx: usize, dir: Direction, present: bool) {
        self.set_wall_inner(idx, dir, present, true);
    }

    // `propagate` is false only for the neighbor leg of the pair, to stop
    // the recursion after one hop.
    fn set_wall_inner(&mut self, idx: usize, dir: Direction, present: bool, propagate: bool) {
        self.tiles[idx].walls[dir.index()] = present;
        if propagate {
            if let Some(n) = self.tiles[idx].neighbors[dir.index()] {
                self.set_wall_inner(n, dir.opposite(), present, false);
            }
        }
    }

    /// Put a wall on every grid-boundary edge.
    pub fn seal_boundary(&mut self) {
        for idx in 0..self.tiles.len() {
            for dir in Direction::ALL {
                if self.tiles[idx].neighbors[dir.index()].is_none() {
                    self.set_wall(idx, dir, true);
                }
            }
        }
    }

    /// Which of the reference tile's walls lie between the tile and the
    /// given point. A wall counts only when the point sits clearly past that
    /// edge (tolerance derived from the tile size), so a point inside or on
    /// the edge of the tile crosses nothing.
    pub fn walls_between(&self, idx: usize, x: f64, y: f64) -> [bool; 4] {
        let t = &self.tiles[idx];
        let eps_x = t.dx * config::WALL_TOLERANCE;
        let eps_y = t.dy * config::WALL_TOLERANCE;
        let mut crossed = [false; 4];
        crossed[Direction::Top.index()] = t.walls[Direction::Top.index()] && y < t.y - eps_y;
        crossed[Direction::Left.index()] = t.walls[Direction::Left.index()] && x < t.x - eps_x;
        crossed[Direction::Bottom.index()] =
            t.walls[Direction::Bottom.index()] && y > t.y + t.dy + eps_y;
        crossed[Direction::Right.index()] =
            t.walls[Direction::Right.index()] && x > t.x + t.dx + eps_x;
        crossed
    }

    /// Encode the wall layout as one row of 4-bit masks per `j`, bit order
    /// top, left, bottom, right.
    pub fn encode_rows(&self) -> Vec<Vec<u8>> {
        let mut rows = Vec::with_capacity(self.ny as usize);
        for j in 0..self.ny {
            let mut row = Vec::with_capacity(self.nx as usize);
            for i in 0..self.nx {
                let walls = &self.tiles[self.index_of(i, j)].walls;
                let mut mask = 0u8;
                for (bit, &wall) in walls.iter().enumerate() {
                    if wall {
                        mask |= 1 << bit;
                    }
                }
                row.push(mask);
            }
            rows.push(row);
        }
        rows
    }

    /// Apply a decoded bitmask layout, replacing all walls. The layout must
    /// match the grid dimensions and must itself be neighbor-symmetric; an
    /// asymmetric layout is a malformed input, not something to repair.
    pub fn apply_rows(&mut self, rows: &[Vec<u8>]) -> Result<(), LayoutError> {
        if rows.len() != self.ny as usize {
            return Err(LayoutError::RowCount {
                expected: self.ny as usize,
                got: rows.len(),
            });
        }
        for (j, row) in rows.iter().enumerate() {
            if row.len() != self.nx as usize {
                return Err(LayoutError::RowWidth {
                    row: j,
                    expected: self.nx as usize,
                    got: row.len(),
                });
            }
            for (i, &mask) in row.iter().enumerate() {
                if mask & !0x0f != 0 {
                    return Err(LayoutError::BadMask { row: j, col: i, mask });
                }
            }
        }

        for (j, row) in rows.iter().enumerate() {
            for (i, &mask) in row.iter().enumerate() {
                let idx = self.index_of(i as u32, j as u32);
                for bit in 0..4 {
                    self.tiles[idx].walls[bit] = mask & (1 << bit) != 0;
                }
            }
        }
        self.check_symmetry()?;
        crate::debug_grid!("Applied {}x{} wall layout", self.nx, self.ny);
        Ok(())
    }

    fn check_symmetry(&self) -> Result<(), LayoutError> {
        for tile in &self.tiles {
            for dir in Direction::ALL {
                if let Some(n) = tile.neighbors[dir.index()] {
                    let neighbor = &self.tiles[n];
                    if tile.walls[dir.index()] != neighbor.walls[dir.opposite().index()] {
                        return Err(LayoutError::AsymmetricWalls {
                            i_a: tile.i,
                            j_a: tile.j,
                            i_b: neighbor.i,
                            j_b: neighbor.j,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, PickupKind, World};

    fn open_grid(nx: u32, ny: u32) -> Grid {
        Grid::new(nx, ny, config::TILE_SIZE, config::TILE_SIZE)
    }

    #[test]
    fn test_neighbor_linking() {
        let grid = open_grid(3, 3);
        let center = grid.index_of(1, 1);
        let t = grid.tile(center);
        assert_eq!(t.neighbors[Direction::Top.index()], Some(grid.index_of(1, 0)));
        assert_eq!(t.neighbors[Direction::Left.index()], Some(grid.index_of(0, 1)));
        assert_eq!(t.neighbors[Direction::Bottom.index()], Some(grid.index_of(1, 2)));
        assert_eq!(t.neighbors[Direction::Right.index()], Some(grid.index_of(2, 1)));

        // Boundary tile has no neighbor off-grid
        let corner = grid.tile(grid.index_of(0, 0));
        assert_eq!(corner.neighbors[Direction::Top.index()], None);
        assert_eq!(corner.neighbors[Direction::Left.index()], None);
    }

    #[test]
    fn test_tile_at_bounds() {
        let grid = open_grid(3, 3);
        assert_eq!(grid.tile_at(0.0, 0.0), Some(grid.index_of(0, 0)));
        assert_eq!(grid.tile_at(119.9, 119.9), Some(grid.index_of(2, 2)));
        assert_eq!(grid.tile_at(-0.1, 50.0), None);
        assert_eq!(grid.tile_at(50.0, -0.1), None);
        assert_eq!(grid.tile_at(120.0, 50.0), None);
        assert_eq!(grid.tile_at(50.0, 120.0), None);
    }

    #[test]
    fn test_wall_symmetry_on_set_and_clear() {
        let mut grid = open_grid(3, 3);
        let a = grid.index_of(1, 1);
        let b = grid.index_of(2, 1);

        grid.set_wall(a, Direction::Right, true);
        assert!(grid.tile(a).walls[Direction::Right.index()]);
        assert!(grid.tile(b).walls[Direction::Left.index()]);

        grid.set_wall(b, Direction::Left, false);
        assert!(!grid.tile(a).walls[Direction::Right.index()]);
        assert!(!grid.tile(b).walls[Direction::Left.index()]);
    }

    #[test]
    fn test_boundary_wall_has_no_pair() {
        let mut grid = open_grid(2, 2);
        let corner = grid.index_of(0, 0);
        grid.set_wall(corner, Direction::Top, true);
        assert!(grid.tile(corner).walls[Direction::Top.index()]);
    }

    #[test]
    fn test_rebuild_index_populates_and_reports_oob() {
        let mut grid = open_grid(3, 3);
        let mut world = World::new();
        let inside = world.spawn(
            Point::new(60.0, 60.0),
            0.0,
            EntityKind::Pickup(PickupKind::Repair),
        );
        let outside = world.spawn(
            Point::new(500.0, 60.0),
            0.0,
            EntityKind::Pickup(PickupKind::Repair),
        );
        let dead = world.spawn(
            Point::new(60.0, 60.0),
            0.0,
            EntityKind::Pickup(PickupKind::Repair),
        );
        world.despawn(dead);

        let oob = grid.rebuild_index(&world.entities);
        assert_eq!(oob, vec![outside]);
        let idx = grid.tile_at(60.0, 60.0).unwrap();
        assert_eq!(grid.tile(idx).objs, vec![inside]);

        // The index is rebuilt from scratch, not appended to
        let oob = grid.rebuild_index(&world.entities);
        assert_eq!(oob, vec![outside]);
        assert_eq!(grid.tile(idx).objs, vec![inside]);
    }

    #[test]
    fn test_walls_between() {
        let mut grid = open_grid(3, 3);
        let center = grid.index_of(1, 1);
        grid.set_wall(center, Direction::Right, true);

        let t = grid.tile(center);
        let (cx, cy) = (t.center().x, t.center().y);

        // Point inside the tile crosses nothing
        let crossed = grid.walls_between(center, cx, cy);
        assert_eq!(crossed, [false; 4]);

        // Point clearly past the right edge crosses the right wall
        let crossed = grid.walls_between(center, t.x + t.dx + 2.0, cy);
        assert!(crossed[Direction::Right.index()]);
        assert_eq!(crossed.iter().filter(|&&c| c).count(), 1);

        // Past the left edge, but no left wall exists: nothing crossed
        let crossed = grid.walls_between(center, t.x - 2.0, cy);
        assert_eq!(crossed, [false; 4]);
    }

    #[test]
    fn test_layout_round_trip() {
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let mut grid = open_grid(4, 5);
        grid.seal_boundary();
        // Scatter some interior walls
        for idx in 0..grid.tiles().len() {
            for dir in [Direction::Right, Direction::Bottom] {
                if grid.tile(idx).neighbors[dir.index()].is_some() && rng.gen_range(0..3) == 0 {
                    grid.set_wall(idx, dir, true);
                }
            }
        }

        let rows = grid.encode_rows();
        let mut restored = open_grid(4, 5);
        restored.apply_rows(&rows).unwrap();
        for (a, b) in grid.tiles().iter().zip(restored.tiles()) {
            assert_eq!(a.walls, b.walls, "tile ({}, {})", a.i, a.j);
        }
    }

    #[test]
    fn test_apply_rows_rejects_bad_layouts() {
        let mut grid = open_grid(2, 2);
        assert_eq!(
            grid.apply_rows(&[vec![0, 0]]),
            Err(LayoutError::RowCount { expected: 2, got: 1 })
        );
        assert_eq!(
            grid.apply_rows(&[vec![0], vec![0, 0]]),
            Err(LayoutError::RowWidth { row: 0, expected: 2, got: 1 })
        );
        assert!(matches!(
            grid.apply_rows(&[vec![0x10, 0], vec![0, 0]]),
            Err(LayoutError::BadMask { .. })
        ));
        // Right wall on (0, 0) with no matching left wall on (1, 0)
        let asymmetric = vec![vec![0b1000, 0], vec![0, 0]];
        assert!(matches!(
            grid.apply_rows(&asymmetric),
            Err(LayoutError::AsymmetricWalls { .. })
        ));
    }

    #[test]
    fn test_seal_boundary() {
        let mut grid = open_grid(3, 3);
        grid.seal_boundary();
        assert!(grid.tile(grid.index_of(0, 0)).walls[Direction::Top.index()]);
        assert!(grid.tile(grid.index_of(0, 0)).walls[Direction::Left.index()]);
        assert!(grid.tile(grid.index_of(2, 2)).walls[Direction::Bottom.index()]);
        assert!(grid.tile(grid.index_of(2, 2)).walls[Direction::Right.index()]);
        // Interior edges stay open
        assert!(!grid.tile(grid.index_of(1, 1)).walls.iter().any(|&w| w));
    }
}
