//! Headless bot that joins a running relay, walks in a circle, plants one
//! flower and prints what it hears back.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::{
    ClientEvent, Direction, FlowerPlacement, JoinRequest, MoveUpdate, ServerEvent, SPAWN_X,
    SPAWN_Y,
};
use std::time::Duration;
use tokio::time::{interval, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
struct Args {
    /// Relay URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Player id to join with
    #[arg(long, default_value = "test-bot")]
    id: String,

    /// Number of steps to walk before leaving
    #[arg(long, default_value = "40")]
    steps: u32,
}

fn print_event(event: &ServerEvent) {
    match event {
        ServerEvent::PlayersCurrent(players) => {
            println!("players-current: {} other players", players.len());
            for p in players {
                println!("  {} ({}) at ({:.0}, {:.0})", p.id, p.nickname, p.x, p.y);
            }
        }
        ServerEvent::PlayerMoved(m) => {
            println!("player-moved: {} -> ({:.0}, {:.0})", m.id, m.x, m.y)
        }
        ServerEvent::FlowerPlaced(f) => {
            println!("flower-placed: {} at ({:.0}, {:.0}) by {}", f.id, f.x, f.y, f.created_by)
        }
        other => println!("{}: {:?}", other.name(), other),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let join = ClientEvent::Join(JoinRequest::new(&args.id, "Bot", SPAWN_X, SPAWN_Y));
    write.send(Message::Text(join.to_json()?)).await?;
    write
        .send(Message::Text(ClientEvent::FlowersRequest.to_json()?))
        .await?;

    let mut ticker = interval(Duration::from_millis(100));
    let radius = 48.0;

    for step in 0..args.steps {
        ticker.tick().await;

        let angle = step as f32 / args.steps as f32 * std::f32::consts::TAU;
        let (dx, dy) = (-angle.sin(), angle.cos());
        let update = MoveUpdate {
            x: SPAWN_X + radius * angle.cos(),
            y: SPAWN_Y + radius * angle.sin(),
            direction: Direction::from_vector(dx, dy).unwrap_or_default(),
            is_moving: step + 1 < args.steps,
        };
        write
            .send(Message::Text(ClientEvent::Move(update).to_json()?))
            .await?;

        if step == args.steps / 2 {
            let flower = ClientEvent::FlowerPlace(FlowerPlacement::new(
                update.x,
                update.y,
                "data:image/png;base64,iVBORw0KGgo=",
                "Bot",
            ));
            write.send(Message::Text(flower.to_json()?)).await?;
        }

        // Drain whatever arrived without stalling the walk
        while let Ok(Some(frame)) = timeout(Duration::from_millis(5), read.next()).await {
            match frame? {
                Message::Text(text) => match ServerEvent::from_json(&text) {
                    Ok(event) => print_event(&event),
                    Err(e) => println!("Unreadable frame: {}", e),
                },
                Message::Close(_) => {
                    println!("Server closed the connection");
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    write.send(Message::Close(None)).await?;
    println!("Test client finished");
    Ok(())
}
