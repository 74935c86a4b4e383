//! Entity Module

pub mod analytics_event;
pub mod protected_video;
pub mod redemption_code;
pub mod session;
