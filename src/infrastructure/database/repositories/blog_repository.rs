//! SeaORM implementation of BlogRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::domain::{
    BlogFilter, BlogPage, BlogPost, BlogRepository, BlogStatus, DomainError, DomainResult,
    NewBlogPost, Tag,
};
use crate::infrastructure::database::entities::{blog, blog_tag, tag, user};

// ── Conversion helpers ──────────────────────────────────────────

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

fn parse_status(raw: &str) -> DomainResult<BlogStatus> {
    raw.parse()
        .map_err(|_| DomainError::Storage(format!("unknown blog status '{}'", raw)))
}

/// Attach author names and tags to a set of blog rows, keeping their order.
async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<blog::Model>,
) -> DomainResult<Vec<BlogPost>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let blog_ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    let author_ids: Vec<String> = models.iter().map(|m| m.author_id.clone()).collect();

    let authors: HashMap<String, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids))
        .all(conn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let links = blog_tag::Entity::find()
        .filter(blog_tag::Column::BlogId.is_in(blog_ids))
        .find_also_related(tag::Entity)
        .all(conn)
        .await
        .map_err(db_err)?;
    let mut tags: HashMap<i32, Vec<Tag>> = HashMap::new();
    for (link, row) in links {
        if let Some(row) = row {
            tags.entry(link.blog_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
            });
        }
    }

    models
        .into_iter()
        .map(|m| -> DomainResult<BlogPost> {
            let mut post_tags = tags.remove(&m.id).unwrap_or_default();
            post_tags.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(BlogPost {
                status: parse_status(&m.status)?,
                author_name: authors.get(&m.author_id).cloned().unwrap_or_default(),
                id: m.id,
                author_id: m.author_id,
                title: m.title,
                content: m.content,
                short_description: m.short_description,
                tags: post_tags,
                created_at: m.created_at,
                updated_at: m.updated_at,
            })
        })
        .collect()
}

// ── SeaOrmBlogRepository ────────────────────────────────────────

pub struct SeaOrmBlogRepository {
    db: DatabaseConnection,
}

impl SeaOrmBlogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load(&self, model: blog::Model) -> DomainResult<BlogPost> {
        let id = model.id;
        hydrate(&self.db, vec![model])
            .await?
            .pop()
            .ok_or_else(|| DomainError::blog_not_found(id))
    }
}

#[async_trait]
impl BlogRepository for SeaOrmBlogRepository {
    async fn create(&self, post: NewBlogPost) -> DomainResult<BlogPost> {
        let now = Utc::now();
        let title = post.title.clone();
        let author_id = post.author_id.clone();
        // Rolled back on drop if any step below fails.
        let txn = self.db.begin().await.map_err(db_err)?;

        let model = blog::ActiveModel {
            author_id: Set(post.author_id),
            title: Set(post.title),
            content: Set(post.content),
            short_description: Set(post.short_description),
            status: Set(post.status.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("UNIQUE") || message.contains("duplicate") {
                DomainError::Conflict(format!("Blog titled '{}' already exists", title))
            } else if message.contains("FOREIGN KEY") {
                DomainError::NotFound {
                    entity: "User",
                    field: "id",
                    value: author_id,
                }
            } else {
                db_err(e)
            }
        })?;

        for name in post.tags {
            let existing = tag::Entity::find()
                .filter(tag::Column::Name.eq(name.as_str()))
                .one(&txn)
                .await
                .map_err(db_err)?;
            let tag_id = match existing {
                Some(row) => row.id,
                None => {
                    tag::ActiveModel {
                        name: Set(name),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await
                    .map_err(db_err)?
                    .id
                }
            };

            blog_tag::ActiveModel {
                blog_id: Set(model.id),
                tag_id: Set(tag_id),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;
        }

        let id = model.id;
        let created = hydrate(&txn, vec![model])
            .await?
            .pop()
            .ok_or_else(|| DomainError::blog_not_found(id))?;
        txn.commit().await.map_err(db_err)?;

        info!(
            "Created blog {} by {} with {} tags",
            created.id,
            created.author_id,
            created.tags.len()
        );
        Ok(created)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<BlogPost>> {
        let Some(model) = blog::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        self.load(model).await.map(Some)
    }

    async fn list_published(
        &self,
        filter: &BlogFilter,
        page: u64,
        page_size: u64,
    ) -> DomainResult<BlogPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let mut query =
            blog::Entity::find().filter(blog::Column::Status.eq(BlogStatus::Published.as_str()));
        if let Some(author_id) = &filter.author_id {
            query = query.filter(blog::Column::AuthorId.eq(author_id.as_str()));
        }
        if let Some(needle) = filter
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let needle = needle.to_lowercase();
            let blog_ids: Vec<i32> = blog_tag::Entity::find()
                .select_only()
                .column(blog_tag::Column::BlogId)
                .distinct()
                .inner_join(tag::Entity)
                .filter(tag::Column::Name.contains(needle.as_str()))
                .into_tuple()
                .all(&self.db)
                .await
                .map_err(db_err)?;
            query = query.filter(blog::Column::Id.is_in(blog_ids));
        }

        let paginator = query
            .order_by_desc(blog::Column::CreatedAt)
            .order_by_desc(blog::Column::Id)
            .paginate(&self.db, page_size);
        let total = paginator.num_items().await.map_err(db_err)?;
        let models = paginator.fetch_page(page - 1).await.map_err(db_err)?;

        Ok(BlogPage {
            items: hydrate(&self.db, models).await?,
            total,
            page,
            page_size,
        })
    }

    async fn set_status(&self, id: i32, status: BlogStatus) -> DomainResult<Option<BlogPost>> {
        let Some(existing) = blog::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let mut active: blog::ActiveModel = existing.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await.map_err(db_err)?;

        info!("Blog {} is now {}", id, status);
        self.load(updated).await.map(Some)
    }

    async fn delete(&self, id: i32) -> DomainResult<bool> {
        let txn = self.db.begin().await.map_err(db_err)?;

        blog_tag::Entity::delete_many()
            .filter(blog_tag::Column::BlogId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let result = blog::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        if result.rows_affected > 0 {
            info!("Deleted blog {}", id);
        }
        Ok(result.rows_affected > 0)
    }
}
