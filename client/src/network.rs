//! WebSocket adapter between the frame loop and the relay.
//!
//! The socket is driven by two tokio tasks. The reader decodes frames into
//! [`ServerEvent`]s and queues them; the frame loop drains the queue with
//! [`NetworkClient::poll_events`] and hands each event to [`EventHooks`].
//! Outbound events are fire-and-forget and silently dropped while
//! disconnected.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    CatInfo, CatUpdated, ClientEvent, Flower, FlowerPlacement, JoinRequest, MoveUpdate,
    PlayerMoved, PlayerSnapshot, ProtocolError, ServerEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("failed to encode join: {0}")]
    Encode(#[from] ProtocolError),
    #[error("connection closed before join was sent: {0}")]
    Closed(#[source] tungstenite::Error),
}

/// Anything the simulation can hand outbound events to.
///
/// Implementors only provide [`emit`](Self::emit); the named senders are
/// what the simulation calls.
pub trait EventSink {
    fn emit(&self, event: ClientEvent);

    fn send_move(&self, update: MoveUpdate) {
        self.emit(ClientEvent::Move(update));
    }

    fn send_cat(&self, cat: Option<CatInfo>) {
        self.emit(ClientEvent::CatUpdate(cat));
    }

    fn place_flower(&self, placement: FlowerPlacement) {
        self.emit(ClientEvent::FlowerPlace(placement));
    }

    fn request_flowers(&self) {
        self.emit(ClientEvent::FlowersRequest);
    }
}

pub struct NetworkClient {
    outbound: Option<mpsc::UnboundedSender<Message>>,
    inbound: Option<mpsc::UnboundedReceiver<ServerEvent>>,
    connected: Arc<AtomicBool>,
}

impl NetworkClient {
    /// Opens the socket and sends `join`. Resolves as soon as the join frame
    /// is written; the `players-current` reply arrives later through
    /// [`poll_events`](Self::poll_events).
    pub async fn connect(url: &str, join: JoinRequest) -> Result<Self, NetworkError> {
        info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|source| NetworkError::Connect {
                url: url.to_string(),
                source,
            })?;
        let (mut write, mut read) = ws_stream.split();

        let join_text = ClientEvent::Join(join).to_json()?;
        write
            .send(Message::Text(join_text))
            .await
            .map_err(NetworkError::Closed)?;

        let connected = Arc::new(AtomicBool::new(true));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerEvent>();

        let writer_connected = connected.clone();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    error!("Failed to send frame: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_connected.store(false, Ordering::SeqCst);
        });

        let reader_connected = connected.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerEvent::from_json(&text) {
                        Ok(event) => {
                            debug!("Received {}", event.name());
                            if in_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring unreadable frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        error!("Connection error: {}", e);
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
            info!("Disconnected from server");
        });

        info!("Connected to {}", url);

        Ok(Self {
            outbound: Some(out_tx),
            inbound: Some(in_rx),
            connected,
        })
    }

    /// Adapter with no server behind it. Every send is a no-op.
    pub fn offline() -> Self {
        Self {
            outbound: None,
            inbound: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.outbound.is_some() && self.connected.load(Ordering::SeqCst)
    }

    /// Drains every event received since the last call.
    pub fn poll_events(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        if let Some(inbound) = self.inbound.as_mut() {
            while let Ok(event) = inbound.try_recv() {
                events.push(event);
            }
        }
        events
    }

    /// Closes the socket. Further sends are dropped.
    pub fn disconnect(&mut self) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Message::Close(None));
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl EventSink for NetworkClient {
    fn emit(&self, event: ClientEvent) {
        if !self.is_connected() {
            return;
        }
        let Some(outbound) = &self.outbound else {
            return;
        };
        match event.to_json() {
            Ok(text) => {
                debug!("Sending {}", event.name());
                let _ = outbound.send(Message::Text(text));
            }
            Err(e) => warn!("Failed to encode {}: {}", event.name(), e),
        }
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

type Hook<C, T> = Option<Box<dyn FnMut(&mut C, T)>>;

/// One optional callback per server event. Registering a hook replaces the
/// previous one for that event.
pub struct EventHooks<C> {
    players_current: Hook<C, Vec<PlayerSnapshot>>,
    player_joined: Hook<C, PlayerSnapshot>,
    player_left: Hook<C, String>,
    player_moved: Hook<C, PlayerMoved>,
    player_cat_updated: Hook<C, CatUpdated>,
    player_count: Hook<C, usize>,
    flowers_all: Hook<C, Vec<Flower>>,
    flower_placed: Hook<C, Flower>,
}

impl<C> Default for EventHooks<C> {
    fn default() -> Self {
        Self {
            players_current: None,
            player_joined: None,
            player_left: None,
            player_moved: None,
            player_cat_updated: None,
            player_count: None,
            flowers_all: None,
            flower_placed: None,
        }
    }
}

impl<C> EventHooks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_players_current(&mut self, hook: impl FnMut(&mut C, Vec<PlayerSnapshot>) + 'static) {
        self.players_current = Some(Box::new(hook));
    }

    pub fn on_player_joined(&mut self, hook: impl FnMut(&mut C, PlayerSnapshot) + 'static) {
        self.player_joined = Some(Box::new(hook));
    }

    pub fn on_player_left(&mut self, hook: impl FnMut(&mut C, String) + 'static) {
        self.player_left = Some(Box::new(hook));
    }

    pub fn on_player_moved(&mut self, hook: impl FnMut(&mut C, PlayerMoved) + 'static) {
        self.player_moved = Some(Box::new(hook));
    }

    pub fn on_player_cat_updated(&mut self, hook: impl FnMut(&mut C, CatUpdated) + 'static) {
        self.player_cat_updated = Some(Box::new(hook));
    }

    pub fn on_player_count(&mut self, hook: impl FnMut(&mut C, usize) + 'static) {
        self.player_count = Some(Box::new(hook));
    }

    pub fn on_flowers_all(&mut self, hook: impl FnMut(&mut C, Vec<Flower>) + 'static) {
        self.flowers_all = Some(Box::new(hook));
    }

    pub fn on_flower_placed(&mut self, hook: impl FnMut(&mut C, Flower) + 'static) {
        self.flower_placed = Some(Box::new(hook));
    }

    /// Runs the hook registered for `event`. Returns false when none is set.
    pub fn dispatch(&mut self, ctx: &mut C, event: ServerEvent) -> bool {
        fn call<Ctx, T>(hook: &mut Hook<Ctx, T>, ctx: &mut Ctx, payload: T) -> bool {
            match hook {
                Some(hook) => {
                    hook(ctx, payload);
                    true
                }
                None => false,
            }
        }

        match event {
            ServerEvent::PlayersCurrent(players) => call(&mut self.players_current, ctx, players),
            ServerEvent::PlayerJoined(player) => call(&mut self.player_joined, ctx, player),
            ServerEvent::PlayerLeft(id) => call(&mut self.player_left, ctx, id),
            ServerEvent::PlayerMoved(moved) => call(&mut self.player_moved, ctx, moved),
            ServerEvent::PlayerCatUpdated(update) => {
                call(&mut self.player_cat_updated, ctx, update)
            }
            ServerEvent::PlayerCount(count) => call(&mut self.player_count, ctx, count),
            ServerEvent::FlowersAll(flowers) => call(&mut self.flowers_all, ctx, flowers),
            ServerEvent::FlowerPlaced(flower) => call(&mut self.flower_placed, ctx, flower),
        }
    }
}
