//! Documentation of a restaurant ordering backend.
//!
//! # General Infrastructure
//! - Single HTTP service consumed by the storefront and the admin dashboard
//! - Order records live behind one narrow store seam; backends swap there
//!   (in-memory for tests and demos, flat JSON file for small deployments)
//!   instead of re-implementing the order rules per database
//! - Carts are client-held; the server only sees them at checkout. The
//!   client clears its cart after the create response, so a crash mid-flight
//!   can leave a stale cart but never a lost order
//!
//! # Endpoints
//! - `GET  /api/health`
//! - `GET  /api/orders` — all orders, newest first
//! - `GET  /api/orders/user/{user_id}` — one user's orders
//! - `POST /api/orders` — checkout payload, returns the persisted order
//! - `PATCH /api/orders/{order_id}/advance` — next status in the fixed flow
//! - `GET  /api/orders/active/count?userId=` — active-order badge count
//!
//! # Money
//! All amounts are integer cents on the wire and in storage. Clients format
//! for display; nothing here ever rounds.
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, patch},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod cart;
pub mod config;
pub mod error;
pub mod models;
pub mod orders;
pub mod routes;
pub mod state;
pub mod store;

use routes::{
    active_count_handler, advance_order_handler, create_order_handler, health_handler,
    list_orders_handler, user_orders_handler,
};
use state::State;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new();

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/orders",
            get(list_orders_handler).post(create_order_handler),
        )
        .route("/api/orders/user/{user_id}", get(user_orders_handler))
        .route(
            "/api/orders/{order_id}/advance",
            patch(advance_order_handler),
        )
        .route("/api/orders/active/count", get(active_count_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
