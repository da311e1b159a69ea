//! Blog workflow
//!
//! Ownership rules over the blog store: drafts stay private to their
//! author, only the author changes a post's status, and the author or an
//! admin may delete it.

use std::sync::Arc;

use tracing::info;

use crate::domain::blog::normalize_tags;
use crate::domain::{
    BlogFilter, BlogPage, BlogPost, BlogRepository, BlogStatus, DomainError, DomainResult,
    NewBlogPost,
};

/// Identity of whoever is acting on a post
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    pub user_id: &'a str,
    pub is_admin: bool,
}

/// Outcome of a status change; `changed` is false when the post already
/// had the requested status.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub post: BlogPost,
    pub changed: bool,
}

pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, mut post: NewBlogPost) -> DomainResult<BlogPost> {
        post.title = post.title.trim().to_string();
        if post.title.is_empty() {
            return Err(DomainError::Validation("title must not be blank".into()));
        }
        post.tags = normalize_tags(&post.tags)?;

        let created = self.repo.create(post).await?;
        info!(
            blog_id = created.id,
            author = %created.author_name,
            status = %created.status,
            "Blog created"
        );
        Ok(created)
    }

    async fn existing(&self, id: i32) -> DomainResult<BlogPost> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::blog_not_found(id))
    }

    /// A draft read by anyone but its author is forbidden.
    pub async fn get(&self, id: i32, viewer: Option<&str>) -> DomainResult<BlogPost> {
        let post = self.existing(id).await?;
        if !post.is_visible_to(viewer) {
            return Err(DomainError::Forbidden(
                "this post is a draft and only its author may read it".into(),
            ));
        }
        Ok(post)
    }

    pub async fn list(
        &self,
        filter: BlogFilter,
        page: u64,
        page_size: u64,
    ) -> DomainResult<BlogPage> {
        let filter = BlogFilter {
            tag: filter.tag.map(|t| t.trim().to_lowercase()),
            ..filter
        };
        self.repo.list_published(&filter, page, page_size).await
    }

    pub async fn change_status(
        &self,
        id: i32,
        status: BlogStatus,
        caller: Caller<'_>,
    ) -> DomainResult<StatusChange> {
        let post = self.existing(id).await?;
        if !post.is_authored_by(caller.user_id) {
            return Err(DomainError::Forbidden(
                "only the author may change this post's status".into(),
            ));
        }
        if post.status == status {
            return Ok(StatusChange {
                post,
                changed: false,
            });
        }

        let post = self
            .repo
            .set_status(id, status)
            .await?
            .ok_or_else(|| DomainError::blog_not_found(id))?;
        info!(blog_id = id, status = %status, "Blog status changed");
        Ok(StatusChange {
            post,
            changed: true,
        })
    }

    pub async fn delete(&self, id: i32, caller: Caller<'_>) -> DomainResult<()> {
        let post = self.existing(id).await?;
        if !(caller.is_admin || post.is_authored_by(caller.user_id)) {
            return Err(DomainError::Forbidden(
                "only the author or an admin may delete this post".into(),
            ));
        }
        if !self.repo.delete(id).await? {
            return Err(DomainError::blog_not_found(id));
        }
        info!(blog_id = id, by = caller.user_id, "Blog deleted");
        Ok(())
    }
}
