use crate::camera::Camera;
use crate::cat::{Cat, CatEvent};
use crate::map::TileMap;
use crate::network::{EventHooks, EventSink};
use crate::player::Player;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    CatInfo, CatType, CatUpdated, Flower, FlowerPlacement, JoinRequest, PlayerMoved,
    PlayerSnapshot,
};
use std::collections::HashMap;

/// How close an echoed flower must land to a pending one to be treated as
/// its confirmation.
const PENDING_MATCH_DISTANCE: f32 = 0.5;

/// Direction keys held this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl InputState {
    pub fn axes(&self) -> (f32, f32) {
        let axis = |neg: bool, pos: bool| (pos as i8 - neg as i8) as f32;
        (axis(self.left, self.right), axis(self.up, self.down))
    }
}

/// A flower as the client knows it. Local placements have no id until the
/// relay echoes them back.
#[derive(Debug, Clone, PartialEq)]
pub struct GardenFlower {
    pub id: Option<String>,
    pub x: f32,
    pub y: f32,
    pub image_data: String,
    pub created_by: String,
}

impl GardenFlower {
    fn pending(placement: &FlowerPlacement) -> Self {
        Self {
            id: None,
            x: placement.x,
            y: placement.y,
            image_data: placement.image_data.clone(),
            created_by: placement.creator(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    fn confirms(&self, flower: &Flower) -> bool {
        self.is_pending()
            && self.created_by == flower.created_by
            && (self.x - flower.x).abs() < PENDING_MATCH_DISTANCE
            && (self.y - flower.y).abs() < PENDING_MATCH_DISTANCE
    }
}

impl From<Flower> for GardenFlower {
    fn from(flower: Flower) -> Self {
        Self {
            id: Some(flower.id),
            x: flower.x,
            y: flower.y,
            image_data: flower.image_data,
            created_by: flower.created_by,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub player: Player,
    pub cat: Option<Cat>,
}

/// What happened during one frame that the shell may want to react to.
#[derive(Debug, Default, PartialEq)]
pub struct FrameEvents {
    pub move_sent: bool,
    /// Owner id and event for every cat that meowed, slept or woke.
    pub cat_events: Vec<(String, CatEvent)>,
}

pub struct Game {
    pub map: TileMap,
    pub camera: Camera,
    pub local: Player,
    local_cat: Option<Cat>,
    remotes: HashMap<String, RemotePlayer>,
    flowers: Vec<GardenFlower>,
    placement: Option<String>,
    player_count: usize,
    was_moving: bool,
    rng: StdRng,
}

impl Game {
    pub fn new(map: TileMap, local: Player, viewport_width: f32, viewport_height: f32, seed: u64) -> Self {
        let mut camera = Camera::new(
            viewport_width,
            viewport_height,
            map.pixel_width(),
            map.pixel_height(),
        );
        let (cx, cy) = local.center();
        camera.follow(cx, cy);
        camera.snap_to_target();

        Self {
            map,
            camera,
            local,
            local_cat: None,
            remotes: HashMap::new(),
            flowers: Vec::new(),
            placement: None,
            player_count: 1,
            was_moving: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn join_request(&self) -> JoinRequest {
        JoinRequest::new(
            self.local.id.clone(),
            self.local.nickname.clone(),
            self.local.x,
            self.local.y,
        )
        .with_cat(self.local_cat.as_ref().map(Cat::info))
    }

    /// Runs one frame of the simulation.
    pub fn update(&mut self, input: &InputState, dt_ms: f32, sink: &dyn EventSink) -> FrameEvents {
        let mut events = FrameEvents::default();

        let (dx, dy) = input.axes();
        self.local.set_input(dx, dy);
        self.local.update(dt_ms, Some(&self.map));

        if self.local.is_moving || self.local.is_moving != self.was_moving {
            sink.send_move(self.local.move_update());
            events.move_sent = true;
        }
        self.was_moving = self.local.is_moving;

        let (cx, cy) = self.local.center();
        self.camera.follow(cx, cy);
        self.camera.update();

        if let Some(cat) = self.local_cat.as_mut() {
            if let Some(event) = cat.update(&self.local, dt_ms, &mut self.rng) {
                events.cat_events.push((self.local.id.clone(), event));
            }
        }

        // Remote positions come from the network and are never collision checked
        for remote in self.remotes.values_mut() {
            remote.player.update(dt_ms, None);
        }

        for remote in self.remotes.values_mut() {
            if let Some(cat) = remote.cat.as_mut() {
                if let Some(event) = cat.update(&remote.player, dt_ms, &mut self.rng) {
                    events.cat_events.push((remote.player.id.clone(), event));
                }
            }
        }

        events
    }

    pub fn arm_placement(&mut self, image_data: impl Into<String>) {
        self.placement = Some(image_data.into());
    }

    pub fn cancel_placement(&mut self) {
        self.placement = None;
    }

    pub fn is_placing(&self) -> bool {
        self.placement.is_some()
    }

    /// Plants the armed flower at a screen position. Clicks outside a flower
    /// zone, or with nothing armed, do nothing.
    pub fn click(&mut self, screen_x: f32, screen_y: f32, sink: &dyn EventSink) -> bool {
        if self.placement.is_none() {
            return false;
        }

        let (x, y) = self.camera.screen_to_world(screen_x, screen_y);
        if !self.map.is_flower_zone(x, y) {
            debug!("Cannot plant at ({:.0}, {:.0})", x, y);
            return false;
        }

        let Some(image_data) = self.placement.take() else {
            return false;
        };
        let placement = FlowerPlacement::new(x, y, image_data, self.local.nickname.as_str());
        self.flowers.push(GardenFlower::pending(&placement));
        sink.place_flower(placement);
        true
    }

    /// Replaces any current companion with a new one at the player's feet.
    pub fn adopt_cat(&mut self, kind: CatType, name: &str, sink: &dyn EventSink) {
        let info = CatInfo::new(kind, name);
        let cat = Cat::new(
            self.local.id.clone(),
            &info,
            self.local.x,
            self.local.y,
            &mut self.rng,
        );
        info!("Adopted {} the {:?} cat", cat.name, kind);
        self.local_cat = Some(cat);
        sink.send_cat(Some(info));
    }

    pub fn abandon_cat(&mut self, sink: &dyn EventSink) {
        if let Some(cat) = self.local_cat.take() {
            info!("{} wandered off", cat.name);
            sink.send_cat(None);
        }
    }

    pub fn local_cat(&self) -> Option<&Cat> {
        self.local_cat.as_ref()
    }

    pub fn remotes(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.remotes.values()
    }

    pub fn remote(&self, id: &str) -> Option<&RemotePlayer> {
        self.remotes.get(id)
    }

    pub fn flowers(&self) -> &[GardenFlower] {
        &self.flowers
    }

    pub fn player_count(&self) -> usize {
        self.player_count
    }

    fn insert_remote(&mut self, snapshot: PlayerSnapshot) {
        let player = Player::from_snapshot(&snapshot);
        let cat = snapshot
            .cat
            .as_ref()
            .map(|info| Cat::new(snapshot.id.clone(), info, snapshot.x, snapshot.y, &mut self.rng));
        self.remotes.insert(snapshot.id, RemotePlayer { player, cat });
    }

    pub fn apply_players_current(&mut self, players: Vec<PlayerSnapshot>) {
        self.remotes.clear();
        for snapshot in players {
            if snapshot.id == self.local.id {
                continue;
            }
            self.insert_remote(snapshot);
        }
        debug!("{} other players in the garden", self.remotes.len());
    }

    pub fn apply_player_joined(&mut self, snapshot: PlayerSnapshot) {
        if snapshot.id == self.local.id {
            return;
        }
        info!("{} joined", snapshot.nickname);
        self.insert_remote(snapshot);
    }

    pub fn apply_player_left(&mut self, id: &str) {
        if let Some(remote) = self.remotes.remove(id) {
            info!("{} left", remote.player.nickname);
        }
    }

    pub fn apply_player_moved(&mut self, moved: PlayerMoved) {
        if moved.id == self.local.id {
            return;
        }
        match self.remotes.get_mut(&moved.id) {
            Some(remote) => {
                remote.player.nickname = moved.nickname;
                remote
                    .player
                    .apply_remote(moved.x, moved.y, moved.direction, moved.is_moving);
            }
            None => {
                // Moved before we saw the join
                let mut snapshot = PlayerSnapshot::new(moved.id, moved.nickname, moved.x, moved.y);
                snapshot.direction = moved.direction;
                snapshot.is_moving = moved.is_moving;
                self.insert_remote(snapshot);
            }
        }
    }

    pub fn apply_player_cat_updated(&mut self, update: CatUpdated) {
        if update.player_id == self.local.id {
            return;
        }
        let Some(remote) = self.remotes.get_mut(&update.player_id) else {
            return;
        };
        match update.cat {
            Some(info) => match remote.cat.as_mut() {
                Some(cat) if cat.kind == info.kind => cat.name = info.normalized().name,
                _ => {
                    remote.cat = Some(Cat::new(
                        update.player_id,
                        &info,
                        remote.player.x,
                        remote.player.y,
                        &mut self.rng,
                    ));
                }
            },
            None => remote.cat = None,
        }
    }

    pub fn apply_player_count(&mut self, count: usize) {
        self.player_count = count;
    }

    /// Replaces the confirmed flowers with the relay's list. Local placements
    /// still waiting for their echo are kept.
    pub fn apply_flowers_all(&mut self, flowers: Vec<Flower>) {
        self.flowers.retain(GardenFlower::is_pending);
        for flower in flowers {
            self.apply_flower_placed(flower);
        }
    }

    pub fn apply_flower_placed(&mut self, flower: Flower) {
        if self
            .flowers
            .iter()
            .any(|known| known.id.as_deref() == Some(flower.id.as_str()))
        {
            return;
        }
        if let Some(pending) = self.flowers.iter_mut().find(|f| f.confirms(&flower)) {
            pending.id = Some(flower.id);
            return;
        }
        self.flowers.push(GardenFlower::from(flower));
    }

    /// Hooks that route every relay event into the matching `apply_*` call.
    pub fn event_hooks() -> EventHooks<Game> {
        let mut hooks = EventHooks::new();
        hooks.on_players_current(|game: &mut Game, players| game.apply_players_current(players));
        hooks.on_player_joined(|game: &mut Game, player| game.apply_player_joined(player));
        hooks.on_player_left(|game: &mut Game, id| game.apply_player_left(&id));
        hooks.on_player_moved(|game: &mut Game, moved| game.apply_player_moved(moved));
        hooks.on_player_cat_updated(|game: &mut Game, update| game.apply_player_cat_updated(update));
        hooks.on_player_count(|game: &mut Game, count| game.apply_player_count(count));
        hooks.on_flowers_all(|game: &mut Game, flowers| game.apply_flowers_all(flowers));
        hooks.on_flower_placed(|game: &mut Game, flower| game.apply_flower_placed(flower));
        hooks
    }
}
