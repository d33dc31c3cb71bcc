use crate::camera::Camera;
use crate::cat::Cat;
use crate::game::{Game, GardenFlower};
use crate::map::Tile;
use crate::player::{Player, PLAYER_SIZE};
use macroquad::prelude::*;
use shared::{CatType, Direction};

const CAT_SIZE: f32 = 20.0;
const FLOWER_RADIUS: f32 = 7.0;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub connected: bool,
    pub player_count: usize,
    pub placing: bool,
    pub cat_name: Option<String>,
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&mut self, game: &Game, connected: bool) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        self.draw_map(game);

        for flower in game.flowers() {
            self.draw_flower(&game.camera, flower);
        }

        for remote in game.remotes() {
            if let Some(cat) = &remote.cat {
                self.draw_cat(&game.camera, cat);
            }
        }
        if let Some(cat) = game.local_cat() {
            self.draw_cat(&game.camera, cat);
        }

        for remote in game.remotes() {
            self.draw_player(&game.camera, &remote.player, Color::from_rgba(255, 68, 68, 255));
        }
        self.draw_player(&game.camera, &game.local, GREEN);

        let ui_config = UiConfig {
            connected,
            player_count: game.player_count(),
            placing: game.is_placing(),
            cat_name: game.local_cat().map(|cat| cat.name.clone()),
        };
        self.draw_ui(ui_config);
    }

    fn tile_color(tile: Tile) -> Color {
        match tile {
            Tile::Grass => Color::from_rgba(104, 170, 76, 255),
            Tile::TallGrass => Color::from_rgba(86, 150, 64, 255),
            Tile::Clover => Color::from_rgba(118, 184, 96, 255),
            Tile::Path => Color::from_rgba(196, 170, 120, 255),
            Tile::FlowerBed => Color::from_rgba(128, 88, 60, 255),
            Tile::Water => Color::from_rgba(64, 128, 200, 255),
            Tile::Tree => Color::from_rgba(34, 96, 44, 255),
            Tile::Rock => Color::from_rgba(128, 128, 128, 255),
            Tile::Boundary => BLACK,
        }
    }

    fn draw_map(&mut self, game: &Game) {
        let map = &game.map;
        let size = map.tile_size();
        let range = game.camera.visible_tiles(size, map.width(), map.height());

        for row in range.start_row..range.end_row {
            for col in range.start_col..range.end_col {
                let tile = map.tile_at(col as i64, row as i64);
                let (sx, sy) = game
                    .camera
                    .world_to_screen(col as f32 * size, row as f32 * size);
                draw_rectangle(sx, sy, size, size, Self::tile_color(tile));

                match tile {
                    Tile::Tree => draw_circle(
                        sx + size / 2.0,
                        sy + size / 2.0,
                        size * 0.4,
                        Color::from_rgba(46, 124, 56, 255),
                    ),
                    Tile::Rock => draw_rectangle_lines(sx + 4.0, sy + 8.0, size - 8.0, size - 12.0, 2.0, DARKGRAY),
                    _ => {}
                }
            }
        }
    }

    /// Image payloads are not decoded; each flower gets a colour derived from
    /// its image data.
    fn draw_flower(&mut self, camera: &Camera, flower: &GardenFlower) {
        let (sx, sy) = camera.world_to_screen(flower.x, flower.y);
        let hash = flower
            .image_data
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        let petal = Color::from_rgba(
            160 + (hash & 0x5f) as u8,
            (hash >> 8 & 0xbf) as u8,
            120 + (hash >> 16 & 0x7f) as u8,
            if flower.is_pending() { 160 } else { 255 },
        );

        draw_line(sx, sy, sx, sy + 10.0, 2.0, DARKGREEN);
        draw_circle(sx, sy, FLOWER_RADIUS, petal);
        draw_circle(sx, sy, FLOWER_RADIUS / 3.0, YELLOW);
    }

    fn cat_color(kind: CatType) -> Color {
        match kind {
            CatType::Orange => ORANGE,
            CatType::Black => Color::from_rgba(30, 30, 30, 255),
            CatType::White => WHITE,
            CatType::Gray => GRAY,
            CatType::Calico => Color::from_rgba(220, 170, 110, 255),
        }
    }

    fn draw_cat(&mut self, camera: &Camera, cat: &Cat) {
        let (sx, sy) = camera.world_to_screen(cat.x, cat.y);
        let (x, y) = (sx + (PLAYER_SIZE - CAT_SIZE) / 2.0, sy + PLAYER_SIZE - CAT_SIZE);
        let color = Self::cat_color(cat.kind);

        if cat.is_awake {
            draw_rectangle(x, y, CAT_SIZE, CAT_SIZE, color);
            // Ears
            draw_triangle(vec2(x, y), vec2(x + 6.0, y), vec2(x + 2.0, y - 5.0), color);
            draw_triangle(
                vec2(x + CAT_SIZE - 6.0, y),
                vec2(x + CAT_SIZE, y),
                vec2(x + CAT_SIZE - 2.0, y - 5.0),
                color,
            );
        } else {
            draw_rectangle(x, y + CAT_SIZE / 2.0, CAT_SIZE, CAT_SIZE / 2.0, color);
            draw_text("z", x + CAT_SIZE, y, 16.0, WHITE);
        }
    }

    fn draw_player(&mut self, camera: &Camera, player: &Player, color: Color) {
        let (sx, sy) = camera.world_to_screen(player.x, player.y);
        let sy = sy + player.bounce;

        draw_rectangle(sx, sy, PLAYER_SIZE, PLAYER_SIZE, color);
        draw_rectangle_lines(sx, sy, PLAYER_SIZE, PLAYER_SIZE, 2.0, WHITE);
        self.draw_facing(sx, sy, player);

        let label = player.nickname.as_str();
        let dims = measure_text(label, None, 14, 1.0);
        draw_text(
            label,
            sx + (PLAYER_SIZE - dims.width) / 2.0,
            sy - 6.0,
            14.0,
            WHITE,
        );
    }

    /// Small marker on the side the player faces; it sways with the walk cycle.
    fn draw_facing(&mut self, sx: f32, sy: f32, player: &Player) {
        let sway = if player.animation_frame() % 2 == 1 { 2.0 } else { 0.0 };
        let half = PLAYER_SIZE / 2.0;
        let (mx, my) = match player.direction {
            Direction::Down => (sx + half - 3.0 + sway, sy + PLAYER_SIZE - 8.0),
            Direction::Up => (sx + half - 3.0 + sway, sy + 2.0),
            Direction::Left => (sx + 2.0, sy + half - 3.0 + sway),
            Direction::Right => (sx + PLAYER_SIZE - 8.0, sy + half - 3.0 + sway),
        };
        draw_rectangle(mx, my, 6.0, 6.0, YELLOW);
    }

    fn draw_ui(&mut self, config: UiConfig) {
        let y_start = 10.0;

        let connection_color = if config.connected { GREEN } else { RED };
        draw_rectangle(10.0, y_start, 8.0, 8.0, connection_color);
        let status = if config.connected { "ONLINE" } else { "OFFLINE" };
        draw_text(status, 22.0, y_start + 8.0, 14.0, WHITE);

        let player_y = y_start + 18.0;
        for i in 0..(config.player_count.min(8)) {
            draw_rectangle(
                10.0 + (i as f32) * 4.0,
                player_y,
                3.0,
                3.0,
                Color::from_rgba(0, 170, 255, 255),
            );
        }
        let player_text = format!("{} in the garden", config.player_count);
        draw_text(&player_text, 45.0, player_y + 4.0, 14.0, WHITE);

        if let Some(name) = &config.cat_name {
            draw_text(&format!("Cat: {}", name), 10.0, player_y + 20.0, 14.0, WHITE);
        }

        let hint = if config.placing {
            "Click grass or a flower bed to plant (F to cancel)"
        } else {
            "WASD move  F plant  C adopt cat  X let cat go  R reconnect"
        };
        draw_text(hint, 10.0, screen_height() - 12.0, 16.0, WHITE);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
