//! Viewport that eases toward a focus point, clamped to the world.

/// Fraction of the remaining distance covered per update.
pub const CAMERA_SMOOTHING: f32 = 0.1;
/// Below this the camera snaps onto its target.
pub const SNAP_DISTANCE: f32 = 0.5;

/// Inclusive start and exclusive end of the tile columns/rows in view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub start_col: usize,
    pub end_col: usize,
    pub start_row: usize,
    pub end_row: usize,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    target_x: f32,
    target_y: f32,
    viewport_width: f32,
    viewport_height: f32,
    world_width: f32,
    world_height: f32,
}

impl Camera {
    pub fn new(viewport_width: f32, viewport_height: f32, world_width: f32, world_height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            target_x: 0.0,
            target_y: 0.0,
            viewport_width,
            viewport_height,
            world_width,
            world_height,
        }
    }

    /// Aims the camera so `(focus_x, focus_y)` sits in the middle of the
    /// viewport without showing anything past the world edge.
    pub fn follow(&mut self, focus_x: f32, focus_y: f32) {
        let max_x = (self.world_width - self.viewport_width).max(0.0);
        let max_y = (self.world_height - self.viewport_height).max(0.0);
        self.target_x = (focus_x - self.viewport_width / 2.0).clamp(0.0, max_x);
        self.target_y = (focus_y - self.viewport_height / 2.0).clamp(0.0, max_y);
    }

    pub fn update(&mut self) {
        self.x = Self::ease(self.x, self.target_x);
        self.y = Self::ease(self.y, self.target_y);
    }

    fn ease(current: f32, target: f32) -> f32 {
        let next = current + (target - current) * CAMERA_SMOOTHING;
        if (target - next).abs() < SNAP_DISTANCE {
            target
        } else {
            next
        }
    }

    /// Jumps straight to the target, used on the first frame.
    pub fn snap_to_target(&mut self) {
        self.x = self.target_x;
        self.y = self.target_y;
    }

    pub fn resize(&mut self, viewport_width: f32, viewport_height: f32) {
        self.viewport_width = viewport_width;
        self.viewport_height = viewport_height;
    }

    pub fn target(&self) -> (f32, f32) {
        (self.target_x, self.target_y)
    }

    pub fn world_to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.x, y - self.y)
    }

    pub fn screen_to_world(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.x, y + self.y)
    }

    /// Tiles overlapping the viewport, clamped to the map.
    pub fn visible_tiles(&self, tile_size: f32, map_cols: usize, map_rows: usize) -> TileRange {
        let start_col = (self.x / tile_size).floor().max(0.0) as usize;
        let start_row = (self.y / tile_size).floor().max(0.0) as usize;
        let end_col = ((self.x + self.viewport_width) / tile_size).ceil().max(0.0) as usize;
        let end_row = ((self.y + self.viewport_height) / tile_size).ceil().max(0.0) as usize;

        TileRange {
            start_col: start_col.min(map_cols),
            end_col: end_col.min(map_cols),
            start_row: start_row.min(map_rows),
            end_row: end_row.min(map_rows),
        }
    }
}
