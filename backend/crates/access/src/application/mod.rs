//! Application Layer
//!
//! Use cases and application services.

pub mod analytics;
pub mod check_session;
pub mod code_store;
pub mod config;
pub mod housekeeping;
pub mod rate_limiter;
pub mod redeem_code;
pub mod request_guard;
pub mod request_playback;
pub mod session_store;
pub mod sign_out;
pub mod video_library;

// Re-exports
pub use analytics::AuditLog;
pub use check_session::{CheckSessionUseCase, SessionInfoOutput};
pub use code_store::{CodeListing, CodeStore, CodeUpdate, NewCode};
pub use config::{AccessConfig, ProtectedAction};
pub use housekeeping::{HousekeepingReport, HousekeepingUseCase};
pub use rate_limiter::RateLimiter;
pub use redeem_code::{RedeemCodeInput, RedeemCodeOutput, RedeemCodeUseCase};
pub use request_guard::RequestGuard;
pub use request_playback::{RequestPlaybackInput, RequestPlaybackOutput, RequestPlaybackUseCase};
pub use session_store::{IssuedSession, SessionStore};
pub use sign_out::SignOutUseCase;
pub use video_library::{LibraryEntry, VideoLibraryOutput, VideoLibraryUseCase};
