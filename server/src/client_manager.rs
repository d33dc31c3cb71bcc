//! Connection tracking for the relay server
//!
//! This module owns the transport side of each connected socket:
//! - Outbound queues used to deliver relay events
//! - Liveness tracking and idle-timeout detection
//! - Capacity enforcement
//!
//! Player state lives in the relay; the client manager only knows how to
//! reach a connection and when it was last heard from.

use crate::session::ConnectionId;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// A connected socket and the queue feeding its writer
#[derive(Debug)]
pub struct Client {
    /// Server-assigned connection identifier
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Last time we received any frame from this client
    pub last_seen: Instant,
    sender: mpsc::UnboundedSender<Message>,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            sender,
        }
    }

    /// Marks the client as alive
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues a frame for the writer. Returns false once the writer is gone.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Manages all open connections
///
/// Frames are queued per connection and never block the relay loop; a
/// connection whose writer has gone away simply stops receiving.
pub struct ClientManager {
    /// Open connections indexed by id
    clients: HashMap<ConnectionId, Client>,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
    /// Silence allowed before a connection is dropped; zero disables it
    idle_timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, idle_timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            idle_timeout,
        }
    }

    /// Attempts to register a connection
    ///
    /// Returns false if the server is at capacity or the id is taken.
    pub fn add_client(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> bool {
        if self.clients.len() >= self.max_clients {
            warn!("Refusing connection {} from {}: server full", id, addr);
            return false;
        }
        if self.clients.contains_key(&id) {
            warn!("Connection id {} already registered", id);
            return false;
        }

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        true
    }

    /// Removes a connection, asking its writer to close the socket
    ///
    /// Returns true if the connection was found and removed.
    pub fn remove_client(&mut self, id: &ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(id) {
            client.send(Message::Close(None));
            info!("Client {} ({}) disconnected", client.id, client.addr);
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, id: ConnectionId) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.touch();
        }
    }

    pub fn send_to(&self, id: ConnectionId, message: Message) {
        match self.clients.get(&id) {
            Some(client) => {
                if !client.send(message) {
                    debug!("Writer for client {} is gone", id);
                }
            }
            None => debug!("No client {} to send to", id),
        }
    }

    /// Queues `message` for every client except `exclude`
    pub fn broadcast(&self, message: Message, exclude: Option<ConnectionId>) {
        for (id, client) in &self.clients {
            if Some(*id) == exclude {
                continue;
            }
            if !client.send(message.clone()) {
                debug!("Writer for client {} is gone", id);
            }
        }
    }

    /// Pings every client so live peers answer with a pong
    pub fn ping_all(&self) {
        self.broadcast(Message::Ping(Vec::new()), None);
    }

    /// Finds and removes clients silent for longer than the idle timeout
    ///
    /// Returns the removed ids so the relay can clean up their sessions.
    pub fn check_timeouts(&mut self) -> Vec<ConnectionId> {
        if self.idle_timeout.is_zero() {
            return Vec::new();
        }

        let timed_out: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(self.idle_timeout))
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            info!("Client {} timed out", id);
            self.remove_client(id);
        }

        timed_out
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.clients.keys().copied().collect()
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
