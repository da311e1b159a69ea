//! Domain events

pub mod types;

pub use types::{ActionType, MutationEvent};
