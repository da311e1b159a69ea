//! Authentication module: login, register, profile, password change, user listing

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
