//! API routes

use crate::api::handlers::{health_check, list_users, AppState};
use crate::api::middleware::shield_middleware;
use crate::auth::handlers::{me, signin, signout, signup};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

/// Build the API routes
///
/// Business routes sit behind the security gate; the health check does not.
pub fn build_api_routes(state: AppState) -> Router {
    let gated_routes = Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", post(signout))
        .route("/auth/me", get(me))
        .route("/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            shield_middleware,
        ));

    let open_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(gated_routes)
        .merge(open_routes)
        .with_state(state)
}
