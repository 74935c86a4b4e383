//! Access (Code Redemption & Playback Gating) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits, access evaluator
//! - `application/` - Use cases and application services
//! - `infra/` - PostgreSQL and in-memory repositories, playback resolvers
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Flow
//! A redemption code is validated and exchanged for a session bound to the
//! client IP. Playback requests are allowed when the session's granted
//! minutes cover the video's required minutes; the resolver registered for
//! the video's integration type then produces an embed or a signed URL.
//!
//! ## Security Model
//! - Every state-changing request carries an action-scoped CSRF proof
//! - Redemption and playback are rate limited per client IP
//! - Session tokens are stored only as SHA-256 digests
//! - Code secure tokens are encrypted at rest
//! - Usage counting and session creation commit together or not at all

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AccessConfig;
pub use error::{AccessError, AccessResult};
pub use infra::memory::InMemoryAccessRepository;
pub use infra::postgres::PgAccessRepository;
pub use presentation::handlers::AccessAppState;
pub use presentation::router::{access_router, access_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod resolvers {
    pub use crate::domain::playback::*;
    pub use crate::infra::resolvers::*;
}
