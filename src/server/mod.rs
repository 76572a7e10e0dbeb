//! HTTP surface of the ingestion endpoint (feature `server`).
//!
//! | Method  | Path                  | Answer                                   |
//! |---------|-----------------------|------------------------------------------|
//! | POST    | `/`, `/api/records`   | 200 + confirmation, always               |
//! | GET     | `/`                   | service name and version                 |
//! | GET     | `/health`             | `{status, timestamp}`                    |
//! | GET     | `/api/records`        | header-keyed rows, `limit`/`offset`      |
//! | GET     | `/api/records/{id}`   | one row, or 404                          |
//! | OPTIONS | any                   | empty 200                                |
//!
//! Every response carries permissive CORS headers.

pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::{Error, Result};
use crate::ingest::Ingestor;
use crate::store::SheetStore;
use state::AppState;

pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

/// Build the router around an ingestor.
pub fn router<S: SheetStore + 'static>(ingestor: Ingestor<S>) -> Router {
    let state = Arc::new(AppState::new(ingestor));

    Router::new()
        .route(
            "/",
            get(routes::meta::root)
                .post(routes::records::create_record::<S>)
                .options(routes::meta::preflight),
        )
        .route("/health", get(routes::meta::health))
        .route(
            "/api/records",
            get(routes::records::list_records::<S>)
                .post(routes::records::create_record::<S>)
                .options(routes::meta::preflight),
        )
        .route("/api/records/{id}", get(routes::records::get_record::<S>))
        .fallback(routes::meta::fallback)
        .layer(cors())
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

/// Serve `ingestor` on `bind` until Ctrl-C.
pub async fn serve<S: SheetStore + 'static>(bind: &str, ingestor: Ingestor<S>) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| Error::Config(format!("invalid bind address '{}': {}", bind, e)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(ingestor))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
