//! Tile map and the collision/placement oracle built on it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{MAP_HEIGHT_TILES, MAP_WIDTH_TILES, TILE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Grass,
    TallGrass,
    Clover,
    Path,
    FlowerBed,
    Water,
    Tree,
    Rock,
    /// Everything outside the map.
    Boundary,
}

impl Tile {
    pub fn is_walkable(self) -> bool {
        matches!(
            self,
            Tile::Grass | Tile::TallGrass | Tile::Clover | Tile::Path | Tile::FlowerBed
        )
    }

    /// Paths can be walked on but not planted.
    pub fn is_flower_zone(self) -> bool {
        matches!(
            self,
            Tile::Grass | Tile::TallGrass | Tile::Clover | Tile::FlowerBed
        )
    }

    fn is_grass(self) -> bool {
        matches!(self, Tile::Grass | Tile::TallGrass | Tile::Clover)
    }
}

#[derive(Debug, Clone)]
pub struct TileMap {
    width: usize,
    height: usize,
    tile_size: f32,
    tiles: Vec<Tile>,
}

impl TileMap {
    pub fn filled(width: usize, height: usize, tile_size: f32, tile: Tile) -> Self {
        Self {
            width,
            height,
            tile_size,
            tiles: vec![tile; width * height],
        }
    }

    /// Builds a map from row-major tiles. Returns None if the tile count does
    /// not match the dimensions.
    pub fn from_tiles(width: usize, height: usize, tile_size: f32, tiles: Vec<Tile>) -> Option<Self> {
        if tiles.len() != width * height || tile_size <= 0.0 {
            return None;
        }
        Some(Self {
            width,
            height,
            tile_size,
            tiles,
        })
    }

    /// Generates the garden. The same seed always yields the same map, so
    /// every client sees identical terrain.
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let (w, h) = (MAP_WIDTH_TILES, MAP_HEIGHT_TILES);
        let mut map = Self::filled(w, h, TILE_SIZE, Tile::Grass);

        for row in 0..h {
            for col in 0..w {
                let roll: f32 = rng.gen();
                let tile = if roll < 0.10 {
                    Tile::Clover
                } else if roll < 0.35 {
                    Tile::TallGrass
                } else {
                    Tile::Grass
                };
                map.set(col, row, tile);
            }
        }

        let (mid_col, mid_row) = (w / 2, h / 2);

        // Cross-shaped path, two tiles wide, meeting at the spawn point
        for col in 1..w - 1 {
            map.set(col, mid_row - 1, Tile::Path);
            map.set(col, mid_row, Tile::Path);
        }
        for row in 1..h - 1 {
            map.set(mid_col - 1, row, Tile::Path);
            map.set(mid_col, row, Tile::Path);
        }

        // Pond in the north-west quarter
        let (pond_col, pond_row, rx, ry) = (12.0_f32, 9.0_f32, 5.5_f32, 3.5_f32);
        for row in 0..h {
            for col in 0..w {
                let dx = (col as f32 - pond_col) / rx;
                let dy = (row as f32 - pond_row) / ry;
                if dx * dx + dy * dy <= 1.0 {
                    map.set(col, row, Tile::Water);
                }
            }
        }

        for (col0, row0, cols, rows) in [(40, 7, 7, 4), (8, 27, 6, 4), (42, 27, 8, 5)] {
            for row in row0..row0 + rows {
                for col in col0..col0 + cols {
                    map.set(col, row, Tile::FlowerBed);
                }
            }
        }

        // Scatter obstacles on open grass, away from the spawn and the paths
        for _ in 0..70 {
            let col = rng.gen_range(1..w - 1);
            let row = rng.gen_range(1..h - 1);
            let near_path = col.abs_diff(mid_col) <= 2
                || col.abs_diff(mid_col - 1) <= 2
                || row.abs_diff(mid_row) <= 2
                || row.abs_diff(mid_row - 1) <= 2;
            if near_path || !map.tile(col, row).is_grass() {
                continue;
            }
            let obstacle = if rng.gen_bool(0.6) { Tile::Tree } else { Tile::Rock };
            map.set(col, row, obstacle);
        }

        // Tree line around the edge
        for col in 0..w {
            map.set(col, 0, Tile::Tree);
            map.set(col, h - 1, Tile::Tree);
        }
        for row in 0..h {
            map.set(0, row, Tile::Tree);
            map.set(w - 1, row, Tile::Tree);
        }

        map
    }

    fn set(&mut self, col: usize, row: usize, tile: Tile) {
        if col < self.width && row < self.height {
            self.tiles[row * self.width + col] = tile;
        }
    }

    fn tile(&self, col: usize, row: usize) -> Tile {
        if col < self.width && row < self.height {
            self.tiles[row * self.width + col]
        } else {
            Tile::Boundary
        }
    }

    /// Tile at grid coordinates; anything off the grid is a boundary tile.
    pub fn tile_at(&self, col: i64, row: i64) -> Tile {
        if col < 0 || row < 0 {
            return Tile::Boundary;
        }
        self.tile(col as usize, row as usize)
    }

    /// Tile under a world position.
    pub fn tile_at_world(&self, x: f32, y: f32) -> Tile {
        if !(x >= 0.0 && y >= 0.0 && x < self.pixel_width() && y < self.pixel_height()) {
            return Tile::Boundary;
        }
        let col = (x / self.tile_size) as usize;
        let row = (y / self.tile_size) as usize;
        self.tile(col, row)
    }

    pub fn is_walkable(&self, x: f32, y: f32) -> bool {
        self.tile_at_world(x, y).is_walkable()
    }

    pub fn is_flower_zone(&self, x: f32, y: f32) -> bool {
        self.tile_at_world(x, y).is_flower_zone()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * self.tile_size
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * self.tile_size
    }
}
