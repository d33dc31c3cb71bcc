//! Realtime session relay.
//!
//! The relay is a synchronous state machine: the transport feeds it one
//! event at a time per connection and it answers with addressed outgoing
//! events. It never touches sockets, which keeps ordering rules in one place
//! and lets tests drive it directly.

use crate::moderation::{screen, AllowAll, Moderator};
use crate::session::{ConnectionId, SessionRegistry};
use crate::store::{FlowerStore, MemoryStore};
use log::{debug, info, warn};
use shared::{
    CatInfo, CatUpdated, ClientEvent, FlowerPlacement, JoinRequest, MoveUpdate, NewFlower,
    PlayerMoved, ServerEvent,
};
use std::collections::HashSet;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 256 * 1024;

/// Who an outgoing event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    Only(ConnectionId),
    AllExcept(ConnectionId),
    All,
}

impl Recipients {
    pub fn includes(&self, conn: ConnectionId) -> bool {
        match self {
            Recipients::Only(target) => *target == conn,
            Recipients::AllExcept(excluded) => *excluded != conn,
            Recipients::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Recipients,
    pub event: ServerEvent,
}

impl Outgoing {
    fn new(to: Recipients, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Largest accepted `imageData` payload, in bytes.
    pub max_image_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

pub struct Relay {
    config: RelayConfig,
    connections: HashSet<ConnectionId>,
    registry: SessionRegistry,
    /// Connections the transport should close, see [`Relay::take_dropped`].
    dropped: Vec<ConnectionId>,
    store: Box<dyn FlowerStore>,
    moderator: Box<dyn Moderator>,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        store: Box<dyn FlowerStore>,
        moderator: Box<dyn Moderator>,
    ) -> Self {
        Self {
            config,
            connections: HashSet::new(),
            registry: SessionRegistry::new(),
            dropped: Vec::new(),
            store,
            moderator,
        }
    }

    /// Relay with transient storage and no moderation.
    pub fn in_memory() -> Self {
        Self::new(
            RelayConfig::default(),
            Box::new(MemoryStore::default()),
            Box::new(AllowAll),
        )
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Registers a freshly accepted connection. Nothing is broadcast until it
    /// joins.
    pub fn open(&mut self, conn: ConnectionId) {
        self.connections.insert(conn);
        debug!("Connection {} opened ({} open)", conn, self.connections.len());
    }

    /// Handles one inbound event from `conn`.
    pub fn handle(&mut self, conn: ConnectionId, event: ClientEvent) -> Vec<Outgoing> {
        if !self.connections.contains(&conn) {
            warn!("Dropping {} from unknown connection {}", event.name(), conn);
            return Vec::new();
        }

        debug!("Connection {} -> {}", conn, event.name());
        match event {
            ClientEvent::Join(request) => self.handle_join(conn, request),
            ClientEvent::Move(update) => self.handle_move(conn, update),
            ClientEvent::CatUpdate(cat) => self.handle_cat_update(conn, cat),
            ClientEvent::FlowersRequest => vec![Outgoing::new(
                Recipients::Only(conn),
                ServerEvent::FlowersAll(self.store.list_flowers()),
            )],
            ClientEvent::FlowerPlace(placement) => self.handle_flower_place(conn, placement),
        }
    }

    /// Connections that lost their player to a newer join since the last
    /// call. The relay already treats them as closed; the transport should
    /// close their sockets before delivering that join's events.
    pub fn take_dropped(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.dropped)
    }

    /// Tears down `conn`. Closing an unknown or already closed connection
    /// produces nothing.
    pub fn close(&mut self, conn: ConnectionId) -> Vec<Outgoing> {
        if !self.connections.remove(&conn) {
            return Vec::new();
        }

        let mut outgoing = Vec::new();
        if let Some(player) = self.registry.unbind(conn) {
            info!("Player {} ({}) left", player.id, player.nickname);
            outgoing.push(Outgoing::new(
                Recipients::All,
                ServerEvent::PlayerLeft(player.id),
            ));
        }
        outgoing.push(self.count_update());
        outgoing
    }

    fn count_update(&self) -> Outgoing {
        Outgoing::new(
            Recipients::All,
            ServerEvent::PlayerCount(self.connections.len()),
        )
    }

    fn handle_join(&mut self, conn: ConnectionId, request: JoinRequest) -> Vec<Outgoing> {
        let snapshot = request.into_snapshot();
        if snapshot.id.is_empty() {
            warn!("Connection {} tried to join without an id", conn);
            return Vec::new();
        }

        let mut outgoing = Vec::new();
        let outcome = self.registry.bind(conn, snapshot.clone());
        if let Some(old_id) = outcome.replaced_id {
            outgoing.push(Outgoing::new(
                Recipients::AllExcept(conn),
                ServerEvent::PlayerLeft(old_id),
            ));
        }
        if let Some(displaced) = outcome.displaced {
            info!(
                "Dropping connection {}: player {} joined again on {}",
                displaced, snapshot.id, conn
            );
            self.connections.remove(&displaced);
            self.dropped.push(displaced);
        }

        info!(
            "Player {} ({}) joined on connection {}",
            snapshot.id, snapshot.nickname, conn
        );

        outgoing.push(Outgoing::new(
            Recipients::Only(conn),
            ServerEvent::PlayersCurrent(self.registry.snapshot_excluding(&snapshot.id)),
        ));
        outgoing.push(Outgoing::new(
            Recipients::AllExcept(conn),
            ServerEvent::PlayerJoined(snapshot),
        ));
        outgoing.push(self.count_update());
        outgoing
    }

    fn handle_move(&mut self, conn: ConnectionId, update: MoveUpdate) -> Vec<Outgoing> {
        let Some(player) = self.registry.player_for_mut(conn) else {
            debug!("Ignoring move from connection {} before join", conn);
            return Vec::new();
        };

        player.x = update.x;
        player.y = update.y;
        player.direction = update.direction;
        player.is_moving = update.is_moving;

        vec![Outgoing::new(
            Recipients::AllExcept(conn),
            ServerEvent::PlayerMoved(PlayerMoved {
                id: player.id.clone(),
                nickname: player.nickname.clone(),
                x: player.x,
                y: player.y,
                direction: player.direction,
                is_moving: player.is_moving,
            }),
        )]
    }

    fn handle_cat_update(&mut self, conn: ConnectionId, cat: Option<CatInfo>) -> Vec<Outgoing> {
        let Some(player) = self.registry.player_for_mut(conn) else {
            debug!("Ignoring cat-update from connection {} before join", conn);
            return Vec::new();
        };

        player.cat = cat.map(CatInfo::normalized);

        vec![Outgoing::new(
            Recipients::AllExcept(conn),
            ServerEvent::PlayerCatUpdated(CatUpdated {
                player_id: player.id.clone(),
                cat: player.cat.clone(),
            }),
        )]
    }

    fn handle_flower_place(
        &mut self,
        conn: ConnectionId,
        placement: FlowerPlacement,
    ) -> Vec<Outgoing> {
        if !placement.x.is_finite() || !placement.y.is_finite() {
            warn!("Dropping flower with non-finite position from {}", conn);
            return Vec::new();
        }
        if placement.image_data.is_empty() {
            warn!("Dropping flower without image data from {}", conn);
            return Vec::new();
        }
        if placement.image_data.len() > self.config.max_image_bytes {
            warn!(
                "Dropping flower from {}: image is {} bytes (limit {})",
                conn,
                placement.image_data.len(),
                self.config.max_image_bytes
            );
            return Vec::new();
        }

        let new_flower = NewFlower::from(placement);
        if !screen(self.moderator.as_ref(), &new_flower) {
            info!(
                "Flower by {} rejected by moderation",
                new_flower.created_by
            );
            return Vec::new();
        }

        let flower = self.store.create_flower(new_flower);
        info!(
            "Flower {} placed at ({:.0}, {:.0}) by {}",
            flower.id, flower.x, flower.y, flower.created_by
        );

        // The sender gets the echo too: it learns the assigned id from it.
        vec![Outgoing::new(
            Recipients::All,
            ServerEvent::FlowerPlaced(flower),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::NameBlocklist;
    use crate::store::JsonFileStore;
    use shared::{CatType, Direction, PlayerSnapshot};

    fn join(id: &str) -> ClientEvent {
        ClientEvent::Join(JoinRequest::new(id, id.to_uppercase(), 100.0, 100.0))
    }

    fn relay_with(conns: &[ConnectionId]) -> Relay {
        let mut relay = Relay::in_memory();
        for conn in conns {
            relay.open(*conn);
        }
        relay
    }

    /// Events `conn` would receive from `outgoing`.
    fn delivered_to(outgoing: &[Outgoing], conn: ConnectionId) -> Vec<ServerEvent> {
        outgoing
            .iter()
            .filter(|o| o.to.includes(conn))
            .map(|o| o.event.clone())
            .collect()
    }

    fn placement(x: f32, y: f32, by: &str) -> ClientEvent {
        ClientEvent::FlowerPlace(FlowerPlacement::new(x, y, "X", by))
    }

    #[test]
    fn test_join_replies_with_others_then_fans_out() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, join("a"));
        let outgoing = relay.handle(2, join("b"));

        assert_eq!(outgoing.len(), 3);
        match &outgoing[0] {
            Outgoing {
                to: Recipients::Only(2),
                event: ServerEvent::PlayersCurrent(players),
            } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, "a");
            }
            other => panic!("unexpected first event: {:?}", other),
        }
        assert!(matches!(
            &outgoing[1],
            Outgoing { to: Recipients::AllExcept(2), event: ServerEvent::PlayerJoined(p) } if p.id == "b"
        ));
        assert_eq!(
            outgoing[2],
            Outgoing::new(Recipients::All, ServerEvent::PlayerCount(2))
        );
    }

    #[test]
    fn test_players_current_never_contains_joiner() {
        let mut relay = relay_with(&[1]);
        let outgoing = relay.handle(1, join("p1"));

        for event in delivered_to(&outgoing, 1) {
            if let ServerEvent::PlayersCurrent(players) = event {
                assert!(players.iter().all(|p| p.id != "p1"));
            }
        }
    }

    #[test]
    fn test_move_fans_out_without_echo() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, join("a"));
        relay.handle(2, join("b"));

        let outgoing = relay.handle(
            1,
            ClientEvent::Move(MoveUpdate {
                x: 10.0,
                y: 20.0,
                direction: Direction::Down,
                is_moving: true,
            }),
        );

        let to_b = delivered_to(&outgoing, 2);
        assert_eq!(to_b.len(), 1);
        match &to_b[0] {
            ServerEvent::PlayerMoved(moved) => {
                assert_eq!(moved.id, "a");
                assert_eq!(moved.nickname, "A");
                assert_eq!((moved.x, moved.y), (10.0, 20.0));
                assert!(moved.is_moving);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(delivered_to(&outgoing, 1).is_empty());

        let stored = relay.registry().player_for(1).unwrap();
        assert_eq!((stored.x, stored.y), (10.0, 20.0));
    }

    #[test]
    fn test_move_before_join_is_noop() {
        let mut relay = relay_with(&[1]);
        let outgoing = relay.handle(
            1,
            ClientEvent::Move(MoveUpdate {
                x: 1.0,
                y: 1.0,
                direction: Direction::Up,
                is_moving: true,
            }),
        );
        assert!(outgoing.is_empty());
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn test_cat_update_fans_out_and_is_stored() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, join("a"));
        relay.handle(2, join("b"));

        let cat = CatInfo::new(CatType::Orange, "Mango");
        let outgoing = relay.handle(1, ClientEvent::CatUpdate(Some(cat.clone())));

        assert_eq!(
            outgoing,
            vec![Outgoing::new(
                Recipients::AllExcept(1),
                ServerEvent::PlayerCatUpdated(CatUpdated {
                    player_id: "a".to_string(),
                    cat: Some(cat.clone()),
                }),
            )]
        );

        // Late joiners see the cat in their snapshot.
        relay.open(3);
        let outgoing = relay.handle(3, join("c"));
        let ServerEvent::PlayersCurrent(players) = &outgoing[0].event else {
            panic!("expected players-current first");
        };
        let a: &PlayerSnapshot = players.iter().find(|p| p.id == "a").unwrap();
        assert_eq!(a.cat, Some(cat));

        let outgoing = relay.handle(1, ClientEvent::CatUpdate(None));
        assert!(matches!(
            &outgoing[0].event,
            ServerEvent::PlayerCatUpdated(CatUpdated { cat: None, .. })
        ));
    }

    #[test]
    fn test_disconnect_removes_player_and_broadcasts() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, join("a"));
        relay.handle(2, join("b"));

        let outgoing = relay.close(1);
        assert_eq!(
            outgoing,
            vec![
                Outgoing::new(Recipients::All, ServerEvent::PlayerLeft("a".to_string())),
                Outgoing::new(Recipients::All, ServerEvent::PlayerCount(1)),
            ]
        );

        relay.open(3);
        let outgoing = relay.handle(3, join("c"));
        let ServerEvent::PlayersCurrent(players) = &outgoing[0].event else {
            panic!("expected players-current first");
        };
        assert!(players.iter().all(|p| p.id != "a"));

        assert!(relay.close(1).is_empty());
    }

    #[test]
    fn test_disconnect_before_join_only_updates_count() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(2, join("b"));

        let outgoing = relay.close(1);
        assert_eq!(
            outgoing,
            vec![Outgoing::new(Recipients::All, ServerEvent::PlayerCount(1))]
        );
        assert!(relay.registry().contains("b"));
    }

    #[test]
    fn test_displaced_connection_does_not_remove_new_owner() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, join("a"));
        relay.handle(2, join("a"));

        let outgoing = relay.close(1);
        assert!(!outgoing
            .iter()
            .any(|o| matches!(o.event, ServerEvent::PlayerLeft(_))));
        assert!(relay.registry().contains("a"));
    }

    #[test]
    fn test_duplicate_join_drops_older_connection() {
        let mut relay = relay_with(&[1, 2, 3]);
        relay.handle(1, join("a"));
        assert!(relay.take_dropped().is_empty());

        let outgoing = relay.handle(2, join("a"));
        assert_eq!(relay.take_dropped(), vec![1]);
        assert!(relay.take_dropped().is_empty());
        assert_eq!(relay.connection_count(), 2);
        assert_eq!(
            outgoing.last().map(|o| o.event.clone()),
            Some(ServerEvent::PlayerCount(2))
        );

        // The older connection is gone: its events and its close do nothing.
        assert!(relay.handle(1, ClientEvent::FlowersRequest).is_empty());
        assert!(relay.close(1).is_empty());
    }

    #[test]
    fn test_rejoin_with_new_id_announces_leave() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, join("old"));
        let outgoing = relay.handle(1, join("new"));

        assert_eq!(
            outgoing[0],
            Outgoing::new(
                Recipients::AllExcept(1),
                ServerEvent::PlayerLeft("old".to_string())
            )
        );
        assert!(!relay.registry().contains("old"));
    }

    #[test]
    fn test_join_without_id_is_ignored() {
        let mut relay = relay_with(&[1]);
        let outgoing = relay.handle(1, join("   "));
        assert!(outgoing.is_empty());
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn test_flower_place_broadcasts_to_everyone_including_sender() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, join("a"));
        relay.handle(2, join("b"));

        let outgoing = relay.handle(1, placement(5.0, 5.0, "a"));
        for conn in [1, 2] {
            let events = delivered_to(&outgoing, conn);
            assert_eq!(events.len(), 1);
            match &events[0] {
                ServerEvent::FlowerPlaced(flower) => {
                    assert_eq!((flower.x, flower.y), (5.0, 5.0));
                    assert_eq!(flower.created_by, "a");
                    assert!(!flower.id.is_empty());
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_flowers_request_replies_only_to_requester() {
        let mut relay = relay_with(&[1, 2]);
        relay.handle(1, placement(1.0, 2.0, "a"));
        relay.handle(1, placement(3.0, 4.0, "a"));

        let outgoing = relay.handle(2, ClientEvent::FlowersRequest);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].to, Recipients::Only(2));
        let ServerEvent::FlowersAll(flowers) = &outgoing[0].event else {
            panic!("expected flowers-all");
        };
        assert_eq!(flowers.len(), 2);
    }

    #[test]
    fn test_oversized_or_empty_flower_is_dropped() {
        let mut relay = Relay::new(
            RelayConfig { max_image_bytes: 4 },
            Box::new(MemoryStore::default()),
            Box::new(AllowAll),
        );
        relay.open(1);

        let big = ClientEvent::FlowerPlace(FlowerPlacement::new(0.0, 0.0, "too large", "a"));
        assert!(relay.handle(1, big).is_empty());

        let empty = ClientEvent::FlowerPlace(FlowerPlacement::new(0.0, 0.0, "", "a"));
        assert!(relay.handle(1, empty).is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_placement_echoes_before_disk_write() {
        let path = std::env::temp_dir()
            .join(format!("garden-relay-{}.json", uuid::Uuid::new_v4()));
        let mut relay = Relay::new(
            RelayConfig::default(),
            Box::new(JsonFileStore::open(&path, 10)),
            Box::new(AllowAll),
        );
        relay.open(1);
        relay.handle(1, join("a"));

        let outgoing = relay.handle(1, placement(9.0, 9.0, "a"));
        assert!(matches!(
            delivered_to(&outgoing, 1).as_slice(),
            [ServerEvent::FlowerPlaced(f)] if f.x == 9.0
        ));
        // The writer task has not run yet: the echo did not wait on the file.
        assert!(!path.exists());

        let written = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while !path.exists() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(written.is_ok());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_moderation_rejection_drops_flower() {
        let mut relay = Relay::new(
            RelayConfig::default(),
            Box::new(MemoryStore::default()),
            Box::new(NameBlocklist::new(["weed"])),
        );
        relay.open(1);

        assert!(relay.handle(1, placement(1.0, 1.0, "WeedLord")).is_empty());
        assert_eq!(relay.handle(1, placement(1.0, 1.0, "Fern")).len(), 1);
    }

    #[test]
    fn test_events_from_unknown_connection_are_dropped() {
        let mut relay = Relay::in_memory();
        assert!(relay.handle(9, join("ghost")).is_empty());
        assert!(relay.registry().is_empty());
    }
}
