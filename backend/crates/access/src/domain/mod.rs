//! Domain Layer
//!
//! Contains entities, value objects, repository traits, the access
//! evaluator and the playback resolver interface.

pub mod entity;
pub mod playback;
pub mod repository;
pub mod services;
pub mod value_object;

// Re-exports
pub use entity::{
    analytics_event::AnalyticsEvent, protected_video::ProtectedVideo,
    redemption_code::RedemptionCode, session::Session,
};
pub use playback::{PlaybackDescriptor, PlaybackKind, PlaybackResolver, ResolverRegistry};
pub use repository::{
    AnalyticsRepository, CodeRepository, RedemptionUnitOfWork, SessionRepository,
    VideoRepository,
};
pub use services::can_access;
