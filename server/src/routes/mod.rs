use axum::extract::DefaultBodyLimit;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::forms::banner::MAX_BANNER_BYTES;
use crate::handlers::{auth, events, health_check, users};
use crate::session::require_session;
use crate::state::AppState;

/// Room for the multipart framing around a banner at the size limit, so
/// oversized files reach the 5 MB check instead of a bare 413.
const BANNER_BODY_LIMIT: usize = MAX_BANNER_BYTES + 1024 * 1024;

fn dashboard_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/events",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/events/banner",
            post(events::upload_banner)
                .delete(events::remove_banner)
                .layer(DefaultBodyLimit::max(BANNER_BODY_LIMIT)),
        )
        .route(
            "/events/:id",
            get(events::event_details)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/edit", get(events::edit_form))
        .route("/events/:id/end", post(events::end_event))
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::user_details))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

pub fn create_routes(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config.cors_allowed_origins);
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/", get(auth::landing))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .nest("/dashboard", dashboard_routes(state.clone()))
        .with_state(state);

    create_security_headers_layer()
        .apply(router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
