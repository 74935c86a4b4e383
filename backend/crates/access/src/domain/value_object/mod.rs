//! Value Object Module

pub mod code_rejection;
pub mod code_status;
pub mod code_value;
pub mod ip_allow_list;
pub mod session_status;
pub mod session_token;
