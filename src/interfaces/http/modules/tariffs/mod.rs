//! Tariff module: batch creation, upload, reads, updates, deletion, cost

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
