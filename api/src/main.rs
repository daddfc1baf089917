use std::{net::SocketAddr, sync::Arc};

use axum::{Router, routing::post};
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
};
use dotenv::dotenv;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod blog;
mod comments;
mod config;
mod contact;
mod error;
mod identity;
mod json;
mod mail;
mod projects;
mod schema;
mod utils;

use config::ServerConfig;
use mail::Mailer;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// A connection checked out of the deadpool pool.
pub type PooledConn = diesel_async::pooled_connection::deadpool::Object<AsyncPgConnection>;

#[derive(Clone)]
pub struct App {
    pub diesel: Pool<AsyncPgConnection>,
    pub config: Arc<ServerConfig>,
    pub mailer: Option<Arc<Mailer>>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::new_from_env();

    let mailer = config
        .mail
        .take()
        .map(|mail| Arc::new(Mailer::new(reqwest::Client::new(), mail)));

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
    let diesel = Pool::builder(manager).max_size(10).build()?;

    let port = config.port;

    let state = App {
        diesel,
        config: Arc::new(config),
        mailer,
    };

    let app = Router::new()
        .nest("/blog", blog::routes::route())
        .nest("/projects", projects::routes::route())
        .merge(comments::routes::route())
        .merge(identity::routes::route())
        .route("/contact", post(contact::contact))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
