//! Access Router

use axum::{
    Router,
    routing::{get, post},
};
use platform::rate_limit::{FixedWindowStore, RateLimitStore};

use crate::domain::repository::{
    AnalyticsRepository, CodeRepository, RedemptionUnitOfWork, SessionRepository,
    VideoRepository,
};
use crate::infra::postgres::PgAccessRepository;
use crate::presentation::handlers::{self, AccessAppState};

/// Create the Access router with the PostgreSQL repository and in-memory rate limiting
pub fn access_router(state: AccessAppState<PgAccessRepository, FixedWindowStore>) -> Router {
    access_router_generic(state)
}

/// Create a generic Access router for any repository and rate-limit store
pub fn access_router_generic<R, L>(state: AccessAppState<R, L>) -> Router
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    Router::new()
        .route("/csrf", get(handlers::csrf_tokens::<R, L>))
        .route("/redeem", post(handlers::redeem::<R, L>))
        .route("/request-playback", post(handlers::request_playback::<R, L>))
        .route("/logout", post(handlers::logout::<R, L>))
        .route("/session", get(handlers::session_status::<R, L>))
        .route("/videos", get(handlers::video_library::<R, L>))
        .with_state(state)
}
