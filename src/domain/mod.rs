//! Domain layer
//!
//! Entities, value types and repository interfaces. No I/O lives here.

pub mod blog;
pub mod error;
pub mod events;
pub mod tariff;
pub mod user;

pub use blog::{
    BlogFilter, BlogPage, BlogPost, BlogRepository, BlogStatus, NewBlogPost, Tag,
};
pub use error::{DomainError, DomainResult};
pub use events::{ActionType, MutationEvent};
pub use tariff::{
    CachedTariff, NewTariff, Tariff, TariffBatch, TariffPage, TariffPatch, TariffRepository,
};
pub use user::{NewUser, User, UserRepository, UserRole};
