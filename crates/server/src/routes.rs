//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use hoard_core::protocol::{API_PREFIX, RETRIEVE_PREFIX};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            &format!("{API_PREFIX}/server_details"),
            post(handlers::server_details),
        )
        .route(&format!("{API_PREFIX}/preupload"), post(handlers::preupload))
        .route(
            &format!("{API_PREFIX}/store_inline"),
            post(handlers::store_inline),
        )
        .route(
            &format!("{API_PREFIX}/finalize_gs_upload"),
            post(handlers::finalize_gs_upload),
        )
        .route(
            &format!("{RETRIEVE_PREFIX}/{{namespace}}/{{digest}}"),
            get(handlers::retrieve),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Health stays outside the auth layer for load balancers.
    Router::new()
        .route("/healthz", get(handlers::health_check))
        .merge(api_routes)
        .layer(middleware::map_response(handlers::common::json_charset))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
