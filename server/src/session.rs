//! Connection-scoped player registry.
//!
//! Holds at most one live entry per player id. Each entry is bound to the
//! connection that joined with it, so a disconnect removes exactly the entry
//! that connection owns and nothing else.

use log::{debug, info};
use shared::PlayerSnapshot;
use std::collections::HashMap;

pub type ConnectionId = u64;

/// Side effects of binding a player to a connection.
#[derive(Debug, Default, PartialEq)]
pub struct BindOutcome {
    /// Id this connection was previously joined under, now removed.
    pub replaced_id: Option<String>,
    /// Another connection that held the same id and lost it.
    pub displaced: Option<ConnectionId>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    players: HashMap<String, PlayerSnapshot>,
    bindings: HashMap<ConnectionId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `snapshot` as the player joined on `conn`.
    pub fn bind(&mut self, conn: ConnectionId, snapshot: PlayerSnapshot) -> BindOutcome {
        let mut outcome = BindOutcome::default();
        let id = snapshot.id.clone();

        if let Some(previous) = self.bindings.get(&conn) {
            if *previous != id {
                let previous = previous.clone();
                self.players.remove(&previous);
                info!("Connection {} rejoined as {} (was {})", conn, id, previous);
                outcome.replaced_id = Some(previous);
            }
        }

        let holder = self
            .bindings
            .iter()
            .find(|(other, bound)| **other != conn && **bound == id)
            .map(|(other, _)| *other);

        if let Some(other) = holder {
            info!("Player {} moved from connection {} to {}", id, other, conn);
            self.bindings.remove(&other);
            outcome.displaced = Some(other);
        }

        self.bindings.insert(conn, id.clone());
        self.players.insert(id, snapshot);
        outcome
    }

    /// Removes the entry bound to `conn`, if any.
    pub fn unbind(&mut self, conn: ConnectionId) -> Option<PlayerSnapshot> {
        let id = self.bindings.remove(&conn)?;
        let removed = self.players.remove(&id);
        debug!("Unbound player {} from connection {}", id, conn);
        removed
    }

    pub fn player_for(&self, conn: ConnectionId) -> Option<&PlayerSnapshot> {
        self.bindings.get(&conn).and_then(|id| self.players.get(id))
    }

    pub fn player_for_mut(&mut self, conn: ConnectionId) -> Option<&mut PlayerSnapshot> {
        let id = self.bindings.get(&conn)?;
        self.players.get_mut(id)
    }

    /// Every registered player except `id`.
    pub fn snapshot_excluding(&self, id: &str) -> Vec<PlayerSnapshot> {
        self.players
            .values()
            .filter(|player| player.id != id)
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
