//! Types shared by the garden relay and its clients: the realtime event
//! contract, entity enums that travel on the wire, and world constants.

pub mod flower;
pub mod protocol;

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use flower::{Flower, FlowerPlacement, FlowerRecord, NewFlower};
pub use protocol::{
    CatUpdated, ClientEvent, JoinRequest, MoveUpdate, PlayerMoved, ProtocolError, ServerEvent,
};

pub const TILE_SIZE: f32 = 32.0;
pub const MAP_WIDTH_TILES: usize = 60;
pub const MAP_HEIGHT_TILES: usize = 40;
pub const WORLD_WIDTH: f32 = TILE_SIZE * MAP_WIDTH_TILES as f32;
pub const WORLD_HEIGHT: f32 = TILE_SIZE * MAP_HEIGHT_TILES as f32;

/// Top-left corner of a freshly spawned player, on the central path crossing.
pub const SPAWN_X: f32 = 944.0;
pub const SPAWN_Y: f32 = 608.0;

pub const DEFAULT_NICKNAME: &str = "Guest";
pub const ANONYMOUS_CREATOR: &str = "Anonymous";
pub const MAX_NICKNAME_LEN: usize = 20;

/// Facing direction. Travels as an integer: down=0, left=1, right=2, up=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Direction {
    #[default]
    Down = 0,
    Left = 1,
    Right = 2,
    Up = 3,
}

impl Direction {
    /// Picks the facing for a movement vector in screen space (y grows
    /// downwards). The dominant axis wins and a tie resolves vertically.
    /// Returns None for a zero vector.
    pub fn from_vector(dx: f32, dy: f32) -> Option<Direction> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }

        if dx.abs() > dy.abs() {
            if dx < 0.0 {
                Some(Direction::Left)
            } else {
                Some(Direction::Right)
            }
        } else if dy < 0.0 {
            Some(Direction::Up)
        } else {
            Some(Direction::Down)
        }
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> u8 {
        direction as u8
    }
}

impl TryFrom<u8> for Direction {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Down),
            1 => Ok(Direction::Left),
            2 => Ok(Direction::Right),
            3 => Ok(Direction::Up),
            other => Err(ProtocolError::InvalidDirection(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatType {
    Orange,
    Black,
    White,
    Gray,
    Calico,
}

impl CatType {
    pub const ALL: [CatType; 5] = [
        CatType::Orange,
        CatType::Black,
        CatType::White,
        CatType::Gray,
        CatType::Calico,
    ];

    /// Cycles through the variants, used by the adoption picker.
    pub fn next(self) -> CatType {
        let index = CatType::ALL.iter().position(|t| *t == self).unwrap_or(0);
        CatType::ALL[(index + 1) % CatType::ALL.len()]
    }

    pub fn default_name(self) -> &'static str {
        match self {
            CatType::Orange => "Marmalade",
            CatType::Black => "Shadow",
            CatType::White => "Snowball",
            CatType::Gray => "Smokey",
            CatType::Calico => "Patches",
        }
    }
}

/// Companion description carried by `join`, `cat-update` and snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatInfo {
    #[serde(rename = "type")]
    pub kind: CatType,
    #[serde(default)]
    pub name: String,
}

impl CatInfo {
    pub fn new(kind: CatType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
        .normalized()
    }

    /// Blank names fall back to the breed's default name.
    pub fn normalized(mut self) -> Self {
        let trimmed: String = self.name.trim().chars().take(MAX_NICKNAME_LEN).collect();
        self.name = if trimmed.is_empty() {
            self.kind.default_name().to_string()
        } else {
            trimmed
        };
        self
    }
}

/// Relay-side view of a connected player, as sent in `players-current`
/// and `player-joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: String,
    pub nickname: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub is_moving: bool,
    #[serde(default)]
    pub cat: Option<CatInfo>,
}

impl PlayerSnapshot {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            x,
            y,
            direction: Direction::Down,
            is_moving: false,
            cat: None,
        }
    }
}

/// Trims a display name, caps its length and substitutes the guest label
/// for blank input.
pub fn sanitize_nickname(raw: &str) -> String {
    let trimmed: String = raw.trim().chars().take(MAX_NICKNAME_LEN).collect();
    if trimmed.is_empty() {
        DEFAULT_NICKNAME.to_string()
    } else {
        trimmed
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_dominant_axis() {
        assert_eq!(Direction::from_vector(-1.0, 0.0), Some(Direction::Left));
        assert_eq!(Direction::from_vector(1.0, 0.2), Some(Direction::Right));
        assert_eq!(Direction::from_vector(0.0, -1.0), Some(Direction::Up));
        assert_eq!(Direction::from_vector(0.3, 1.0), Some(Direction::Down));
        assert_eq!(Direction::from_vector(0.0, 0.0), None);
    }

    #[test]
    fn test_direction_tie_resolves_vertically() {
        assert_eq!(Direction::from_vector(1.0, 1.0), Some(Direction::Down));
        assert_eq!(Direction::from_vector(-1.0, 1.0), Some(Direction::Down));
        assert_eq!(Direction::from_vector(1.0, -1.0), Some(Direction::Up));
        assert_eq!(Direction::from_vector(-1.0, -1.0), Some(Direction::Up));
    }

    #[test]
    fn test_direction_wire_format_is_integer() {
        assert_eq!(serde_json::to_string(&Direction::Right).unwrap(), "2");
        let up: Direction = serde_json::from_str("3").unwrap();
        assert_eq!(up, Direction::Up);
        assert!(serde_json::from_str::<Direction>("7").is_err());
    }

    #[test]
    fn test_cat_type_cycles_through_all_variants() {
        let mut kind = CatType::Orange;
        for _ in 0..CatType::ALL.len() {
            kind = kind.next();
        }
        assert_eq!(kind, CatType::Orange);
        assert_eq!(CatType::Black.next(), CatType::White);
    }

    #[test]
    fn test_cat_info_blank_name_uses_default() {
        let cat = CatInfo::new(CatType::Calico, "   ");
        assert_eq!(cat.name, "Patches");

        let json = serde_json::to_string(&cat).unwrap();
        assert!(json.contains("\"type\":\"calico\""));
    }

    #[test]
    fn test_sanitize_nickname() {
        assert_eq!(sanitize_nickname(""), DEFAULT_NICKNAME);
        assert_eq!(sanitize_nickname("  \t "), DEFAULT_NICKNAME);
        assert_eq!(sanitize_nickname("  Rose "), "Rose");
        let long = "x".repeat(64);
        assert_eq!(sanitize_nickname(&long).len(), MAX_NICKNAME_LEN);
    }

    #[test]
    fn test_player_snapshot_uses_camel_case() {
        let mut snapshot = PlayerSnapshot::new("p1", "Ivy", 10.0, 20.0);
        snapshot.is_moving = true;
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["isMoving"], true);
        assert_eq!(json["direction"], 0);
        assert!(json["cat"].is_null());
    }

    #[test]
    fn test_spawn_point_inside_world() {
        assert!(SPAWN_X >= 0.0 && SPAWN_X < WORLD_WIDTH);
        assert!(SPAWN_Y >= 0.0 && SPAWN_Y < WORLD_HEIGHT);
    }

    #[test]
    fn test_get_timestamp_advances() {
        let first = get_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        assert!(get_timestamp() > first);
    }
}
