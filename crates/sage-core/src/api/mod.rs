//! HTTP API

pub mod agents;
pub mod error;
pub mod health;
pub mod state;

use axum::Router;

pub use error::ApiError;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(agents::router())
        .with_state(state)
}
