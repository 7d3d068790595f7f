use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub(crate) mod extractors;
pub mod google;
mod handlers;
pub mod jwt;
pub mod password;
mod services;
pub(crate) mod session;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
