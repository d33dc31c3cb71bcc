//! Server network layer: WebSocket transport around the relay state machine

use crate::client_manager::ClientManager;
use crate::relay::{Outgoing, Recipients, Relay};
use crate::session::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientEvent;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),
    #[error("server already running")]
    AlreadyRunning,
}

/// Messages sent from connection tasks to the main relay loop
#[derive(Debug)]
pub enum ServerMessage {
    ConnectionOpened {
        conn_id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    },
    EventReceived {
        conn_id: ConnectionId,
        event: ClientEvent,
    },
    Heartbeat {
        conn_id: ConnectionId,
    },
    ConnectionClosed {
        conn_id: ConnectionId,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    /// Silence tolerated before a socket is dropped; zero disables it
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            max_clients: 64,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Main server coordinating sockets and the relay
///
/// Connection tasks only decode and encode frames; every relay decision is
/// made on the single loop in [`Server::run`], one event at a time.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    relay: Relay,
    heartbeat: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig, relay: Relay) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        // Ping often enough that a healthy client answers several times per timeout window
        let heartbeat = if config.idle_timeout.is_zero() {
            Duration::from_secs(15)
        } else {
            (config.idle_timeout / 4).max(Duration::from_millis(100))
        };

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_clients, config.idle_timeout),
            relay,
            heartbeat,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts sockets and hands each to its own task
    fn spawn_acceptor(&self, listener: TcpListener) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_conn_id: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let conn_id = next_conn_id;
                        next_conn_id += 1;
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            Self::serve_connection(conn_id, stream, addr, server_tx).await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
                if server_tx.is_closed() {
                    break;
                }
            }
        });
    }

    /// Runs one socket until either side closes it
    async fn serve_connection(
        conn_id: ConnectionId,
        stream: TcpStream,
        addr: SocketAddr,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake with {} failed: {}", addr, e);
                return;
            }
        };

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        if server_tx
            .send(ServerMessage::ConnectionOpened {
                conn_id,
                addr,
                sender: out_tx,
            })
            .is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                incoming = ws_receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => match ClientEvent::from_json(&text) {
                            Ok(event) => {
                                if server_tx.send(ServerMessage::EventReceived { conn_id, event }).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed frame from {}: {}", conn_id, e),
                        },
                        Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                            let _ = server_tx.send(ServerMessage::Heartbeat { conn_id });
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => debug!("Ignoring non-text frame from {}", conn_id),
                        Some(Err(e)) => {
                            debug!("Read error on connection {}: {}", conn_id, e);
                            break;
                        }
                    }
                },
                outgoing = out_rx.recv() => {
                    match outgoing {
                        Some(message) => {
                            let closing = matches!(message, Message::Close(_));
                            if let Err(e) = ws_sender.send(message).await {
                                debug!("Write error on connection {}: {}", conn_id, e);
                                break;
                            }
                            if closing {
                                break;
                            }
                        }
                        // The relay dropped this connection
                        None => break,
                    }
                },
            }
        }

        let _ = server_tx.send(ServerMessage::ConnectionClosed { conn_id });
    }

    /// Serializes relay output and queues it on the addressed connections
    fn deliver(&self, outgoing: Vec<Outgoing>) {
        for Outgoing { to, event } in outgoing {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {}: {}", event.name(), e);
                    continue;
                }
            };
            debug!("Sending {} to {:?}", event.name(), to);

            let message = Message::Text(text);
            match to {
                Recipients::Only(conn_id) => self.clients.send_to(conn_id, message),
                Recipients::AllExcept(conn_id) => self.clients.broadcast(message, Some(conn_id)),
                Recipients::All => self.clients.broadcast(message, None),
            }
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ConnectionOpened {
                conn_id,
                addr,
                sender,
            } => {
                if self.clients.add_client(conn_id, addr, sender.clone()) {
                    self.relay.open(conn_id);
                } else {
                    let _ = sender.send(Message::Close(None));
                }
            }
            ServerMessage::EventReceived { conn_id, event } => {
                self.clients.touch(conn_id);
                let outgoing = self.relay.handle(conn_id, event);
                for dropped in self.relay.take_dropped() {
                    self.clients.remove_client(&dropped);
                }
                self.deliver(outgoing);
            }
            ServerMessage::Heartbeat { conn_id } => {
                self.clients.touch(conn_id);
            }
            ServerMessage::ConnectionClosed { conn_id } => {
                self.clients.remove_client(&conn_id);
                let outgoing = self.relay.close(conn_id);
                self.deliver(outgoing);
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let listener = self.listener.take().ok_or(ServerError::AlreadyRunning)?;
        self.spawn_acceptor(listener);

        let mut heartbeat = interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = heartbeat.tick() => {
                    for conn_id in self.clients.check_timeouts() {
                        let outgoing = self.relay.close(conn_id);
                        self.deliver(outgoing);
                    }
                    self.clients.ping_all();

                    if !self.clients.is_empty() {
                        debug!(
                            "{} connections, {} players",
                            self.clients.len(),
                            self.relay.registry().len()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}
