//! Shared Kernel
//!
//! Error vocabulary shared by every backend crate:
//! - [`error::app_error::AppError`] and the [`error::app_error::AppResult`] alias
//! - [`error::kind::ErrorKind`], the HTTP-facing classification
//! - conversions from library errors and RFC 7807 rendering (feature-gated)

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
