//! Database entities module

pub mod blog;
pub mod blog_tag;
pub mod date_accession;
pub mod tag;
pub mod tariff;
pub mod user;

pub use blog::Entity as Blog;
pub use blog_tag::Entity as BlogTag;
pub use date_accession::Entity as DateAccession;
pub use tag::Entity as Tag;
pub use tariff::Entity as Tariff;
pub use user::Entity as User;
