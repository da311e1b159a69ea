//! User aggregate
//!
//! Accounts that may sign in and mutate tariffs.

pub mod model;
pub mod repository;

pub use model::{NewUser, User, UserRole};
pub use repository::UserRepository;
