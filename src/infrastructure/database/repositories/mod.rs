//! Database repository implementations

pub mod blog_repository;
pub mod tariff_repository;
pub mod user_repository;

pub use blog_repository::SeaOrmBlogRepository;
pub use tariff_repository::SeaOrmTariffRepository;
pub use user_repository::SeaOrmUserRepository;
