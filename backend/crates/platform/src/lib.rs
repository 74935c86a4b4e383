//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (random tokens, SHA-256, HMAC, constant-time compare)
//! - Authenticated encryption for secrets at rest
//! - Injectable clock
//! - Cookie management and client identification
//! - CSRF proofs
//! - Rate limiting infrastructure

pub mod client;
pub mod clock;
pub mod cookie;
pub mod crypto;
pub mod csrf;
pub mod rate_limit;
pub mod secret_box;
