use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

mod constants;
mod delta;
mod error;
mod input;
mod kernel;
mod manager;
mod metrics;
mod net;
mod planet;
mod planet_gen;
mod room;
mod state;
mod time;
mod vector;
mod world;

use manager::RoomManager;
use state::PlayerConfig;

const ROOM_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let server_host = std::env::var("SPACEGAME_SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = std::env::var("SPACEGAME_SERVER_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .expect("SPACEGAME_SERVER_PORT must be a valid port number");
    let world_dir = std::env::var("SPACEGAME_WORLD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("worlds"));

    let manager = RoomManager::new(world_dir, PlayerConfig::default());

    let cleanup_manager = manager.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ROOM_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_manager.prune_disposed_rooms();
        }
    });

    let app = Router::new()
        .route("/", get(|| async { "spacegame room server" }))
        .route("/ws", get(net::ws_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(manager);

    let bind_address = format!("{server_host}:{server_port}");
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .expect("failed to bind to address");

    info!("spacegame room server listening on http://{bind_address}");
    info!("websocket endpoint: ws://{bind_address}/ws?room=<id>");

    axum::serve(listener, app).await.expect("server failed");
}
