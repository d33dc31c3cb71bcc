//! Realtime event contract.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`. The
//! event names are the interoperability contract and must not change.
//! Payloads are validated here: missing optional fields get defaults, while
//! anything structurally wrong fails to decode and is dropped by the caller.

use crate::flower::{Flower, FlowerPlacement};
use crate::{sanitize_nickname, CatInfo, Direction, PlayerSnapshot, SPAWN_X, SPAWN_Y};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid direction {0}")]
    InvalidDirection(u8),
}

/// Events sent by a client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Join(JoinRequest),
    Move(MoveUpdate),
    CatUpdate(Option<CatInfo>),
    FlowersRequest,
    FlowerPlace(FlowerPlacement),
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Event name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => "join",
            ClientEvent::Move(_) => "move",
            ClientEvent::CatUpdate(_) => "cat-update",
            ClientEvent::FlowersRequest => "flowers-request",
            ClientEvent::FlowerPlace(_) => "flower-place",
        }
    }
}

/// Events sent by the relay to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    PlayersCurrent(Vec<PlayerSnapshot>),
    PlayerJoined(PlayerSnapshot),
    PlayerLeft(String),
    PlayerMoved(PlayerMoved),
    PlayerCatUpdated(CatUpdated),
    PlayerCount(usize),
    FlowersAll(Vec<Flower>),
    FlowerPlaced(Flower),
}

impl ServerEvent {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::PlayersCurrent(_) => "players-current",
            ServerEvent::PlayerJoined(_) => "player-joined",
            ServerEvent::PlayerLeft(_) => "player-left",
            ServerEvent::PlayerMoved(_) => "player-moved",
            ServerEvent::PlayerCatUpdated(_) => "player-cat-updated",
            ServerEvent::PlayerCount(_) => "player-count",
            ServerEvent::FlowersAll(_) => "flowers-all",
            ServerEvent::FlowerPlaced(_) => "flower-placed",
        }
    }
}

/// Payload of `join`. Nickname and position are optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub cat: Option<CatInfo>,
}

impl JoinRequest {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            nickname: Some(nickname.into()),
            x: Some(x),
            y: Some(y),
            cat: None,
        }
    }

    pub fn with_cat(mut self, cat: Option<CatInfo>) -> Self {
        self.cat = cat;
        self
    }

    /// Builds the registry entry, applying defaults for missing fields.
    pub fn into_snapshot(self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.trim().to_string(),
            nickname: sanitize_nickname(self.nickname.as_deref().unwrap_or_default()),
            x: self.x.unwrap_or(SPAWN_X),
            y: self.y.unwrap_or(SPAWN_Y),
            direction: Direction::Down,
            is_moving: false,
            cat: self.cat.map(CatInfo::normalized),
        }
    }
}

/// Payload of `move`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveUpdate {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub is_moving: bool,
}

/// Payload of `player-moved`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMoved {
    pub id: String,
    pub nickname: String,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub is_moving: bool,
}

/// Payload of `player-cat-updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatUpdated {
    pub player_id: String,
    pub cat: Option<CatInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CatType, DEFAULT_NICKNAME};

    #[test]
    fn test_move_event_wire_shape() {
        let event = ClientEvent::Move(MoveUpdate {
            x: 10.0,
            y: 20.0,
            direction: Direction::Down,
            is_moving: true,
        });
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "move");
        assert_eq!(json["data"]["x"], 10.0);
        assert_eq!(json["data"]["direction"], 0);
        assert_eq!(json["data"]["isMoving"], true);
    }

    #[test]
    fn test_decode_move_from_browser_payload() {
        let event = ClientEvent::from_json(
            r#"{"event":"move","data":{"x":10,"y":20,"direction":0,"isMoving":true}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Move(MoveUpdate {
                x: 10.0,
                y: 20.0,
                direction: Direction::Down,
                is_moving: true,
            })
        );
    }

    #[test]
    fn test_join_defaults_missing_fields() {
        let event = ClientEvent::from_json(r#"{"event":"join","data":{"id":"p1"}}"#).unwrap();
        let ClientEvent::Join(join) = event else {
            panic!("expected join");
        };
        let snapshot = join.into_snapshot();
        assert_eq!(snapshot.id, "p1");
        assert_eq!(snapshot.nickname, DEFAULT_NICKNAME);
        assert_eq!(snapshot.x, SPAWN_X);
        assert_eq!(snapshot.y, SPAWN_Y);
        assert!(snapshot.cat.is_none());
    }

    #[test]
    fn test_join_with_null_nickname_and_cat() {
        let event = ClientEvent::from_json(
            r#"{"event":"join","data":{"id":"p2","nickname":null,"x":1,"y":2,"cat":{"type":"black","name":""}}}"#,
        )
        .unwrap();
        let ClientEvent::Join(join) = event else {
            panic!("expected join");
        };
        let snapshot = join.into_snapshot();
        assert_eq!(snapshot.nickname, DEFAULT_NICKNAME);
        assert_eq!(snapshot.cat, Some(CatInfo::new(CatType::Black, "Shadow")));
    }

    #[test]
    fn test_flower_place_with_null_creator() {
        let event = ClientEvent::from_json(
            r#"{"event":"flower-place","data":{"x":3,"y":4,"imageData":"X","createdBy":null}}"#,
        )
        .unwrap();
        let ClientEvent::FlowerPlace(placement) = event else {
            panic!("expected flower-place");
        };
        assert_eq!(placement.creator(), crate::ANONYMOUS_CREATOR);
    }

    #[test]
    fn test_cat_update_null_payload() {
        let event = ClientEvent::CatUpdate(None);
        let text = event.to_json().unwrap();
        assert_eq!(text, r#"{"event":"cat-update","data":null}"#);
        assert_eq!(ClientEvent::from_json(&text).unwrap(), event);
    }

    #[test]
    fn test_flowers_request_has_no_payload() {
        let text = ClientEvent::FlowersRequest.to_json().unwrap();
        assert_eq!(text, r#"{"event":"flowers-request"}"#);
        assert_eq!(
            ClientEvent::from_json(&text).unwrap(),
            ClientEvent::FlowersRequest
        );
    }

    #[test]
    fn test_server_event_names_match_wire() {
        let events = vec![
            ServerEvent::PlayersCurrent(vec![]),
            ServerEvent::PlayerJoined(PlayerSnapshot::new("a", "A", 0.0, 0.0)),
            ServerEvent::PlayerLeft("a".to_string()),
            ServerEvent::PlayerCount(2),
            ServerEvent::FlowersAll(vec![]),
            ServerEvent::PlayerCatUpdated(CatUpdated {
                player_id: "a".to_string(),
                cat: None,
            }),
        ];

        for event in events {
            let json: serde_json::Value =
                serde_json::from_str(&event.to_json().unwrap()).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }

    #[test]
    fn test_player_cat_updated_uses_player_id_key() {
        let event = ServerEvent::PlayerCatUpdated(CatUpdated {
            player_id: "a".to_string(),
            cat: Some(CatInfo::new(CatType::Gray, "Ash")),
        });
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["data"]["playerId"], "a");
        assert_eq!(json["data"]["cat"]["type"], "gray");
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(ClientEvent::from_json(r#"{"event":"teleport","data":{}}"#).is_err());
        assert!(ClientEvent::from_json("not json").is_err());
        assert!(ClientEvent::from_json(r#"{"event":"move","data":{"x":1}}"#).is_err());
    }

    #[test]
    fn test_invalid_direction_is_rejected() {
        let result = ClientEvent::from_json(
            r#"{"event":"move","data":{"x":1,"y":1,"direction":9,"isMoving":false}}"#,
        );
        assert!(result.is_err());
    }
}
