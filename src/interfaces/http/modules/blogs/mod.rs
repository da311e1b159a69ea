//! Blog module: posting, public listing, reads, status changes, deletion

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
