//! Blog DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::StatusChange;
use crate::domain::{BlogPost, Tag};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBlogRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    #[schema(example = "Caching tariffs with Redis")]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[validate(length(min = 1, max = 500, message = "short_description must be 1-500 characters"))]
    pub short_description: String,
    /// Stored lowercase; duplicates are dropped
    #[serde(default)]
    #[schema(example = json!(["rust", "redis"]))]
    pub tags: Vec<String>,
    /// `draft` or `published`. Default: published
    #[serde(default)]
    #[schema(example = "published")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    pub id: i32,
    #[schema(example = "rust")]
    pub name: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlogResponse {
    pub id: i32,
    pub author_id: String,
    /// Username of the author
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub short_description: String,
    #[schema(example = "published")]
    pub status: String,
    pub tags: Vec<TagResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BlogPost> for BlogResponse {
    fn from(post: BlogPost) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            author_name: post.author_name,
            title: post.title,
            content: post.content,
            short_description: post.short_description,
            status: post.status.to_string(),
            tags: post.tags.into_iter().map(Into::into).collect(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Filters of the published list; pagination is read separately
#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct BlogListQuery {
    /// Only posts by this user id
    pub author_id: Option<String>,
    /// Case-insensitive substring of a tag name
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct StatusQuery {
    /// `draft` or `published`
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusChangeResponse {
    /// False when the post already had the requested status
    pub changed: bool,
    pub message: String,
    pub blog: BlogResponse,
}

impl From<StatusChange> for StatusChangeResponse {
    fn from(change: StatusChange) -> Self {
        let message = if change.changed {
            format!("Status changed to '{}'", change.post.status)
        } else {
            format!("Post already has status '{}'", change.post.status)
        };
        Self {
            changed: change.changed,
            message,
            blog: change.post.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteBlogResponse {
    pub id: i32,
    pub message: String,
}
