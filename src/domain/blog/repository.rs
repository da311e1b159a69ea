//! Blog repository interface

use async_trait::async_trait;

use super::model::{BlogFilter, BlogPost, BlogStatus, NewBlogPost};
use crate::domain::DomainResult;

/// One page of published posts, newest first
#[derive(Debug, Clone)]
pub struct BlogPage {
    pub items: Vec<BlogPost>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Insert the post and link its tags, creating missing tags, in one
    /// transaction. Fails with `DomainError::Conflict` on a duplicate title.
    async fn create(&self, post: NewBlogPost) -> DomainResult<BlogPost>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<BlogPost>>;

    /// Only published posts are listed.
    async fn list_published(
        &self,
        filter: &BlogFilter,
        page: u64,
        page_size: u64,
    ) -> DomainResult<BlogPage>;

    /// Returns `None` when no row has this id.
    async fn set_status(&self, id: i32, status: BlogStatus) -> DomainResult<Option<BlogPost>>;

    /// Returns whether a row was removed. Tags stay behind.
    async fn delete(&self, id: i32) -> DomainResult<bool>;
}
