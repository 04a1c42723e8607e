use axum::{Router, routing::get};

pub mod inventory;
pub mod receiving;
pub mod sales;
pub mod system;

/// Router for every endpoint that acts on behalf of an actor.
pub fn router() -> Router {
    Router::new()
        .route("/events/stream", get(system::stream))
        .nest("/inventory", inventory::router())
        .nest("/sales", sales::router())
        .nest("/receiving", receiving::router())
}
