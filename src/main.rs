mod error;
mod pairing;
mod proto;
mod rooms;
mod routes;
mod state;

use std::sync::Arc;

use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::{
    error::{bad, AppResult},
    pairing::Matchmaker,
    rooms::RoomDirectory,
    state::Registry,
};

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let registry = Arc::new(Registry::default());
    let matchmaker = Arc::new(Matchmaker::new(registry.clone()));
    let rooms = Arc::new(RoomDirectory::new(registry.clone()));

    let app = Router::new()
        .nest("/ws", routes::router())
        .layer(Extension(registry))
        .layer(Extension(matchmaker))
        .layer(Extension(rooms))
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .map_err(bad)?;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
