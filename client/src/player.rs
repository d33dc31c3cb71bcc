use crate::map::TileMap;
use shared::{Direction, MoveUpdate, PlayerSnapshot};
use std::collections::VecDeque;
use std::f32::consts::{FRAC_1_SQRT_2, PI};

pub const PLAYER_SIZE: f32 = 32.0;
/// Pixels per frame at full speed.
pub const PLAYER_SPEED: f32 = 3.0;
pub const HISTORY_CAPACITY: usize = 30;
pub const ANIMATION_FRAME_MS: f32 = 150.0;
pub const ANIMATION_FRAMES: usize = 4;
pub const BOUNCE_HEIGHT: f32 = 3.0;
pub const BOUNCE_DECAY: f32 = 0.8;

/// Radians of bounce phase per millisecond of walking.
const BOUNCE_RATE: f32 = 0.012;
/// Exponential damping of each hop, per radian of phase.
const BOUNCE_DAMPING: f32 = 0.35;
/// Horizontal inset of the outer foot points.
const FOOT_INSET: f32 = 4.0;

/// Vertical offset while walking. Every hop is one half period of a sine
/// whose amplitude decays over the hop, so the player lifts quickly and
/// settles softly. Negative is up.
fn walk_bounce(walked_ms: f32) -> f32 {
    let phase = (walked_ms * BOUNCE_RATE) % PI;
    -phase.sin() * (-BOUNCE_DAMPING * phase).exp() * BOUNCE_HEIGHT
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
}

/// Ring of recent positions, newest first. Companions trail their owner by
/// reading an older entry.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    samples: VecDeque<HistorySample>,
    capacity: usize,
}

impl PositionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: HistorySample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_back();
        }
        self.samples.push_front(sample);
    }

    /// Sample `steps` entries back; 0 is the most recent.
    pub fn back(&self, steps: usize) -> Option<&HistorySample> {
        self.samples.get(steps)
    }

    pub fn oldest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub nickname: String,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub is_moving: bool,
    pub vel_x: f32,
    pub vel_y: f32,
    /// Vertical sprite offset while walking, always <= 0.
    pub bounce: f32,
    history: PositionHistory,
    anim_frame: usize,
    anim_timer_ms: f32,
    bounce_time_ms: f32,
}

impl Player {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            x,
            y,
            direction: Direction::Down,
            is_moving: false,
            vel_x: 0.0,
            vel_y: 0.0,
            bounce: 0.0,
            history: PositionHistory::new(HISTORY_CAPACITY),
            anim_frame: 0,
            anim_timer_ms: 0.0,
            bounce_time_ms: 0.0,
        }
    }

    pub fn from_snapshot(snapshot: &PlayerSnapshot) -> Self {
        let mut player = Self::new(
            snapshot.id.clone(),
            snapshot.nickname.clone(),
            snapshot.x,
            snapshot.y,
        );
        player.direction = snapshot.direction;
        player.is_moving = snapshot.is_moving;
        player
    }

    /// Sets the velocity from a raw input axis pair, each in -1..=1.
    /// Diagonals are scaled so speed stays constant in every direction.
    pub fn set_input(&mut self, dx: f32, dy: f32) {
        let (mut vx, mut vy) = (dx.clamp(-1.0, 1.0), dy.clamp(-1.0, 1.0));
        if vx != 0.0 && vy != 0.0 {
            vx *= FRAC_1_SQRT_2;
            vy *= FRAC_1_SQRT_2;
        }
        self.vel_x = vx;
        self.vel_y = vy;
        if let Some(direction) = Direction::from_vector(vx, vy) {
            self.direction = direction;
        }
    }

    /// Advances one frame. With a map, each axis is tried separately so the
    /// player slides along walls. Returns whether the position changed.
    pub fn update(&mut self, dt_ms: f32, map: Option<&TileMap>) -> bool {
        let (old_x, old_y) = (self.x, self.y);

        if self.vel_x != 0.0 || self.vel_y != 0.0 {
            let step_x = self.vel_x * PLAYER_SPEED;
            let step_y = self.vel_y * PLAYER_SPEED;

            match map {
                Some(map) => {
                    if Self::can_stand_at(map, self.x + step_x, self.y) {
                        self.x += step_x;
                    }
                    if Self::can_stand_at(map, self.x, self.y + step_y) {
                        self.y += step_y;
                    }
                }
                None => {
                    self.x += step_x;
                    self.y += step_y;
                }
            }

            self.is_moving = self.x != old_x || self.y != old_y;
        } else if map.is_some() {
            self.is_moving = false;
        }

        let moved = self.x != old_x || self.y != old_y;
        if moved {
            self.record_position();
        }

        self.animate(dt_ms);
        moved
    }

    /// Adopts a state reported over the network verbatim.
    pub fn apply_remote(&mut self, x: f32, y: f32, direction: Direction, is_moving: bool) {
        let moved = x != self.x || y != self.y;
        self.x = x;
        self.y = y;
        self.direction = direction;
        self.is_moving = is_moving;
        if moved {
            self.record_position();
        }
    }

    fn record_position(&mut self) {
        self.history.push(HistorySample {
            x: self.x,
            y: self.y,
            direction: self.direction,
        });
    }

    fn animate(&mut self, dt_ms: f32) {
        if self.is_moving {
            self.anim_timer_ms += dt_ms;
            while self.anim_timer_ms >= ANIMATION_FRAME_MS {
                self.anim_timer_ms -= ANIMATION_FRAME_MS;
                self.anim_frame = (self.anim_frame + 1) % ANIMATION_FRAMES;
            }
            self.bounce_time_ms += dt_ms;
            self.bounce = walk_bounce(self.bounce_time_ms);
        } else {
            self.anim_frame = 0;
            self.anim_timer_ms = 0.0;
            self.bounce_time_ms = 0.0;
            self.bounce *= BOUNCE_DECAY;
            if self.bounce.abs() < 0.01 {
                self.bounce = 0.0;
            }
        }
    }

    /// Probes three points along the bottom edge of the sprite.
    pub fn can_stand_at(map: &TileMap, x: f32, y: f32) -> bool {
        let foot_y = y + PLAYER_SIZE - 1.0;
        [
            x + FOOT_INSET,
            x + PLAYER_SIZE / 2.0,
            x + PLAYER_SIZE - FOOT_INSET,
        ]
        .into_iter()
        .all(|foot_x| map.is_walkable(foot_x, foot_y))
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + PLAYER_SIZE / 2.0, self.y + PLAYER_SIZE / 2.0)
    }

    pub fn history(&self) -> &PositionHistory {
        &self.history
    }

    pub fn animation_frame(&self) -> usize {
        self.anim_frame
    }

    pub fn move_update(&self) -> MoveUpdate {
        MoveUpdate {
            x: self.x,
            y: self.y,
            direction: self.direction,
            is_moving: self.is_moving,
        }
    }
}
