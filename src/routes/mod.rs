pub mod applications;
pub mod health;
pub mod interviews;
pub mod notes;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    auth::require_actor,
    cors::api_cors,
    rate_limit::{rps_middleware, RateLimiter},
};
use crate::AppState;

/// Full HTTP surface. Everything under `/api` requires a bearer token and
/// shares one request budget of `rps` per second.
pub fn router(state: AppState, rps: u32) -> Router {
    let api = Router::new()
        .route("/api/applications", post(applications::submit_application))
        .route(
            "/api/applications/bulk-status",
            post(applications::bulk_transition_status),
        )
        .route("/api/applications/:id", get(applications::get_application))
        .route(
            "/api/applications/:id/status",
            post(applications::transition_status),
        )
        .route(
            "/api/applications/:id/withdraw",
            post(applications::withdraw_application),
        )
        .route(
            "/api/jobs/:job_id/applications",
            get(applications::list_job_applications),
        )
        .route(
            "/api/applications/:id/interviews",
            get(interviews::list_interviews).post(interviews::schedule_interview),
        )
        .route(
            "/api/interviews/:id/reschedule",
            post(interviews::reschedule_interview),
        )
        .route(
            "/api/interviews/:id/complete",
            post(interviews::complete_interview),
        )
        .route("/api/interviews/:id/cancel", post(interviews::cancel_interview))
        .route(
            "/api/applications/:id/notes",
            get(notes::list_notes).post(notes::add_note),
        )
        .route("/api/notes/:id", patch(notes::update_note))
        .route(
            "/api/applications/:id/bookmark",
            put(notes::set_bookmark),
        )
        .route("/api/applications/:id/viewed", post(notes::mark_viewed))
        .route("/api/applications/:id/flags", get(notes::get_flags))
        .layer(from_fn_with_state(state.clone(), require_actor))
        .layer(from_fn_with_state(RateLimiter::new(rps), rps_middleware));

    Router::new()
        .route("/health", get(health::health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(api_cors())
        .with_state(state)
}
