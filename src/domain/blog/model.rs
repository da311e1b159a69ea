//! Blog domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};

/// Maximum length of a tag name, in characters
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    Draft,
    #[default]
    Published,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }
}

impl std::str::FromStr for BlogStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BlogStatus::Draft),
            "published" => Ok(BlogStatus::Published),
            other => Err(DomainError::Validation(format!(
                "status must be 'draft' or 'published', got '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlogPost {
    pub id: i32,
    pub author_id: String,
    /// Username of the author at read time
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub short_description: String,
    pub status: BlogStatus,
    /// Sorted by name
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    /// Published posts are public; drafts only reach their author.
    pub fn is_visible_to(&self, viewer: Option<&str>) -> bool {
        match self.status {
            BlogStatus::Published => true,
            BlogStatus::Draft => viewer.is_some_and(|id| self.is_authored_by(id)),
        }
    }
}

/// Post fields supplied on creation; `tags` are normalized by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlogPost {
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub short_description: String,
    pub status: BlogStatus,
    pub tags: Vec<String>,
}

/// Narrowing of the published list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlogFilter {
    pub author_id: Option<String>,
    /// Case-insensitive substring of a tag name
    pub tag: Option<String>,
}

/// Trim, lowercase and deduplicate tag names, dropping blanks.
pub fn normalize_tags(raw: &[String]) -> DomainResult<Vec<String>> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        if name.chars().count() > MAX_TAG_LEN {
            return Err(DomainError::Validation(format!(
                "tag '{}' exceeds {} characters",
                name, MAX_TAG_LEN
            )));
        }
        if !tags.contains(&name) {
            tags.push(name);
        }
    }
    Ok(tags)
}
