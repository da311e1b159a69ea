//! Blog aggregate
//!
//! Posts written by registered users, tagged with lowercase labels and
//! either drafted or published.

pub mod model;
pub mod repository;

pub use model::{
    normalize_tags, BlogFilter, BlogPost, BlogStatus, NewBlogPost, Tag, MAX_TAG_LEN,
};
pub use repository::{BlogPage, BlogRepository};
