pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// `RUST_LOG` 未指定時のログフィルタ
///
/// TraceLayer のリクエストログは `tower_http` ターゲットの DEBUG で出力される
pub const DEFAULT_LOG_FILTER: &str = "info,otp_gate=debug,tower_http=debug";

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/otp/request", post(handlers::request_otp))
        .route("/otp/validate", post(handlers::validate_otp))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
