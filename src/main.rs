//! Application entrypoint and state wiring.

mod chain;
mod model;
mod routes;
mod storage;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use chain::{new_chain, Chain};
use storage::ChainStore;

/// Shared application state passed to axum handlers. The chain is the single
/// process-wide ledger instance; every mutation goes through its mutex.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Mutex<Chain>>,
    pub store: Arc<ChainStore>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let chain_file = std::env::var("LEDGER_CHAIN_FILE")
        .unwrap_or_else(|_| "data/blockchain.json".to_string());
    let addr: SocketAddr = std::env::var("LEDGER_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()
        .expect("LEDGER_ADDR must be host:port");

    let store = ChainStore::new(&chain_file);
    let chain = new_chain(&store);
    info!(path = %store.path().display(), blocks = chain.len(), "chain ready");

    let state = AppState {
        chain: Arc::new(Mutex::new(chain)),
        store: Arc::new(store),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/", get(routes::list_chain).post(routes::add_checkout))
        .route("/new", post(routes::new_book))
        .route("/validate", get(routes::validate_chain))
        .route("/health", get(routes::health))
        .route("/version", get(routes::version))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener");
    axum::serve(listener, app).await.expect("serve");
}
