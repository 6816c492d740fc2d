//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// REST surface over the EngineService, built with Axum. Every handler talks to the service;
// no handler touches engine state directly.
//
// | Component      | Description                                                |
// |----------------|------------------------------------------------------------|
// | AppState       | Shared application state (the engine service)             |
// | Api            | Router assembly and server loop                            |
// | Routes         | Handler functions for API endpoints                        |
// | DTOs           | Request/response payloads                                  |
//--------------------------------------------------------------------------------------------------

mod dto;
mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::domain::services::engine::EngineService;

pub use dto::*;
pub use error::{ApiError, ApiResult};

/// Shared application state accessible by all handlers.
pub struct AppState {
    pub service: Arc<EngineService>,
}

impl AppState {
    pub fn new(service: Arc<EngineService>) -> Self {
        Self { service }
    }
}

/// Builds the application router over a shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        // Order management
        .route("/orders", post(routes::create_order))
        .route("/orders/:id", delete(routes::cancel_order))
        .route("/orders/:id", get(routes::get_order))
        // Market data
        .route("/instruments/:id/book", get(routes::get_order_book))
        .route("/instruments/:id/transactions", get(routes::get_transactions))
        // Registries and maintenance
        .route("/instruments", post(routes::create_instrument))
        .route("/users", post(routes::create_user))
        .route("/users/:id", get(routes::get_account))
        .route("/sweep", post(routes::sweep_expired))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// API server: owns the listen address and the engine service.
pub struct Api {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl Api {
    pub fn new(addr: SocketAddr, service: Arc<EngineService>) -> Self {
        Self {
            addr,
            state: Arc::new(AppState::new(service)),
        }
    }

    /// Starts the API server and runs until shutdown.
    pub async fn serve(self) -> anyhow::Result<()> {
        let app = router(self.state);
        info!("API listening on {}", self.addr);
        let listener = TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
