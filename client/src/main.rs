use clap::Parser;
use client::cat::CatEvent;
use client::game::Game;
use client::input::InputManager;
use client::map::TileMap;
use client::network::{EventSink, NetworkClient};
use client::player::Player;
use client::rendering::Renderer;
use log::{debug, info, warn};
use macroquad::prelude::*;
use shared::{sanitize_nickname, CatType, SPAWN_X, SPAWN_Y};
use tokio::runtime::Runtime;

/// Stand-in for a drawn flower until a drawing canvas exists.
const DEFAULT_FLOWER_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Name shown above your head
    #[arg(short = 'n', long, default_value = "Guest")]
    nickname: String,

    /// Player id; random when omitted
    #[arg(long)]
    id: Option<String>,

    /// Seed for the garden layout, must match the other players
    #[arg(long, default_value = "42")]
    map_seed: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Garden".to_owned(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

fn connect(runtime: &Runtime, game: &Game, url: &str) -> NetworkClient {
    match runtime.block_on(NetworkClient::connect(url, game.join_request())) {
        Ok(network) => {
            network.request_flowers();
            network
        }
        Err(e) => {
            warn!("Playing offline: {}", e);
            NetworkClient::offline()
        }
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return;
        }
    };

    let id = args
        .id
        .clone()
        .unwrap_or_else(|| format!("player-{:08x}", ::rand::random::<u32>()));
    let nickname = sanitize_nickname(&args.nickname);

    info!("Starting client as {} ({})", nickname, id);
    info!("Connecting to: {}", args.server);
    info!("Controls: WASD/arrows to move, F to plant, C to adopt a cat, X to let it go");

    let local = Player::new(id, nickname, SPAWN_X, SPAWN_Y);
    let mut game = Game::new(
        TileMap::generate(args.map_seed),
        local,
        screen_width(),
        screen_height(),
        ::rand::random(),
    );

    let mut network = connect(&runtime, &game, &args.server);
    let mut hooks = Game::event_hooks();
    let mut input_manager = InputManager::new();
    let mut renderer = Renderer::new();

    loop {
        let dt_ms = get_frame_time() * 1000.0;

        for event in network.poll_events() {
            hooks.dispatch(&mut game, event);
        }

        let (controls, input) = input_manager.update();

        if controls.reconnect && !network.is_connected() {
            network = connect(&runtime, &game, &args.server);
        }
        if controls.toggle_placement {
            if game.is_placing() {
                game.cancel_placement();
            } else {
                game.arm_placement(DEFAULT_FLOWER_IMAGE);
            }
        }
        if controls.adopt_cat {
            let kind = game
                .local_cat()
                .map(|cat| cat.kind.next())
                .unwrap_or(CatType::Orange);
            game.adopt_cat(kind, "", &network);
        }
        if controls.abandon_cat {
            game.abandon_cat(&network);
        }
        if let Some((x, y)) = controls.click {
            game.click(x, y, &network);
        }

        game.camera.resize(screen_width(), screen_height());
        let events = game.update(&input, dt_ms, &network);
        for (owner, event) in events.cat_events {
            if event == CatEvent::Meow {
                debug!("{}'s cat meows", owner);
            }
        }

        renderer.render(&game, network.is_connected());

        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        next_frame().await;
    }

    network.disconnect();
}
