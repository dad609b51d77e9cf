//! Application routing
//!
//! This module defines all HTTP routes for the application.

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{check_in, flights, health, passengers};
use crate::middleware::logging::{log_request, REQUEST_ID_HEADER, TRACE_ID_HEADER};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        .route("/liveness", get(health::liveness));

    let flight_routes = Router::new()
        .route("/", get(flights::list_flights).post(flights::create_flight))
        .route(
            "/:id",
            get(flights::get_flight)
                .put(flights::update_flight)
                .delete(flights::delete_flight),
        );

    let passenger_routes = Router::new()
        .route("/", post(passengers::create_passenger))
        .route(
            "/:id",
            get(passengers::get_passenger)
                .put(passengers::update_passenger)
                .delete(passengers::delete_passenger),
        );

    let check_in_routes = Router::new()
        .route("/start", post(check_in::start_check_in))
        .route("/flights/:id", post(check_in::check_in_flight))
        .route("/flights/:id/passengers", post(check_in::queue_passengers))
        .route(
            "/flights/:id/passengers/:passenger_id",
            post(check_in::check_in_passenger),
        );

    Router::new()
        .nest("/flights", flight_routes)
        .nest("/passengers", passenger_routes)
        .nest("/check-in", check_in_routes)
        .merge(health_routes)
        // Last added = outermost, so logging wraps CORS
        .layer(create_cors_layer())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Create CORS layer with permissive settings
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(TRACE_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}
