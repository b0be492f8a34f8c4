use crate::state::AppState;
use axum::Router;

mod avatar;
mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod repo;
pub mod repo_types;

pub fn public_router() -> Router<AppState> {
    handlers::public_routes()
}

pub fn private_router() -> Router<AppState> {
    handlers::private_routes()
}
