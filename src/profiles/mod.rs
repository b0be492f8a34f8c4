use crate::state::AppState;
use axum::Router;

mod dto;
pub mod github;
pub mod handlers;
pub mod repo;
pub mod repo_types;

pub fn public_router() -> Router<AppState> {
    handlers::public_routes()
}

pub fn private_router() -> Router<AppState> {
    handlers::private_routes()
}
