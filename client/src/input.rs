//! Keyboard and mouse sampling with edge detection for one-shot actions

use crate::game::InputState;
use macroquad::prelude::*;

/// One-shot actions triggered this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    pub toggle_placement: bool,
    pub adopt_cat: bool,
    pub abandon_cat: bool,
    pub reconnect: bool,
    /// Screen position of a left click.
    pub click: Option<(f32, f32)>,
}

/// Samples held movement keys and press events for the action keys
pub struct InputManager {
    // Previous frame key states for edge detection
    prev_key_f: bool,
    prev_key_c: bool,
    prev_key_x: bool,
    prev_key_r: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_key_f: false,
            prev_key_c: false,
            prev_key_x: false,
            prev_key_r: false,
        }
    }

    /// Returns this frame's one-shot controls and held movement keys
    pub fn update(&mut self) -> (Controls, InputState) {
        // Movement keys (both WASD and arrow keys)
        let input = InputState {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        };

        let key_f = is_key_down(KeyCode::F);
        let key_c = is_key_down(KeyCode::C);
        let key_x = is_key_down(KeyCode::X);
        let key_r = is_key_down(KeyCode::R);

        let controls = Controls {
            toggle_placement: Self::pressed(key_f, self.prev_key_f),
            adopt_cat: Self::pressed(key_c, self.prev_key_c),
            abandon_cat: Self::pressed(key_x, self.prev_key_x),
            reconnect: Self::pressed(key_r, self.prev_key_r),
            click: is_mouse_button_pressed(MouseButton::Left).then(mouse_position),
        };

        self.prev_key_f = key_f;
        self.prev_key_c = key_c;
        self.prev_key_x = key_x;
        self.prev_key_r = key_r;

        (controls, input)
    }

    /// Key press event: down now, up last frame
    fn pressed(current: bool, previous: bool) -> bool {
        current && !previous
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
