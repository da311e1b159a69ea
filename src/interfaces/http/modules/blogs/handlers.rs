//! Blog REST API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use super::dto::{
    BlogListQuery, BlogResponse, CreateBlogRequest, DeleteBlogResponse, StatusChangeResponse,
    StatusQuery,
};
use crate::application::{BlogService, Caller};
use crate::domain::{BlogFilter, BlogStatus, NewBlogPost};
use crate::interfaces::http::common::{
    domain_error, ApiError, ApiResponse, PaginatedResponse, PaginationParams, ValidatedJson,
};
use crate::interfaces::http::middleware::AuthenticatedUser;

#[derive(Clone)]
pub struct BlogHandlerState {
    pub service: Arc<BlogService>,
}

fn caller(user: &AuthenticatedUser) -> Caller<'_> {
    Caller {
        user_id: &user.user_id,
        is_admin: user.is_admin(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/blogs",
    tag = "Blogs",
    security(("bearer_auth" = [])),
    request_body = CreateBlogRequest,
    responses(
        (status = 201, description = "Post created", body = ApiResponse<BlogResponse>),
        (status = 400, description = "Malformed JSON"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Title already taken"),
        (status = 422, description = "Invalid field, tag or status")
    )
)]
pub async fn create_blog(
    State(state): State<BlogHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreateBlogRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BlogResponse>>), ApiError> {
    let status = match request.status.as_deref() {
        Some(raw) => raw.parse::<BlogStatus>().map_err(domain_error)?,
        None => BlogStatus::default(),
    };

    let post = state
        .service
        .create(NewBlogPost {
            author_id: user.user_id,
            title: request.title,
            content: request.content,
            short_description: request.short_description,
            status,
            tags: request.tags,
        })
        .await
        .map_err(domain_error)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(post.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs",
    tag = "Blogs",
    params(PaginationParams, BlogListQuery),
    responses(
        (status = 200, description = "Published posts, newest first", body = ApiResponse<PaginatedResponse<BlogResponse>>),
        (status = 422, description = "Page or page size out of range")
    )
)]
pub async fn list_blogs(
    State(state): State<BlogHandlerState>,
    Query(params): Query<PaginationParams>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<BlogResponse>>>, ApiError> {
    let params = params.checked()?;
    let filter = BlogFilter {
        author_id: query.author_id,
        tag: query.tag,
    };
    let page = state
        .service
        .list(filter, params.page, params.page_size)
        .await
        .map_err(domain_error)?;

    let items = page.items.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        page.total,
        page.page,
        page.page_size,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs/{id}",
    tag = "Blogs",
    params(("id" = i32, Path, description = "Post id")),
    responses(
        (status = 200, description = "The post", body = ApiResponse<BlogResponse>),
        (status = 403, description = "Draft of another user"),
        (status = 404, description = "No such post")
    )
)]
pub async fn get_blog(
    State(state): State<BlogHandlerState>,
    Path(id): Path<i32>,
    user: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<ApiResponse<BlogResponse>>, ApiError> {
    let viewer = user.as_ref().map(|Extension(u)| u.user_id.as_str());
    let post = state.service.get(id, viewer).await.map_err(domain_error)?;
    Ok(Json(ApiResponse::success(post.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/blogs/{id}/status",
    tag = "Blogs",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Post id"), StatusQuery),
    responses(
        (status = 200, description = "Status applied or already in place", body = ApiResponse<StatusChangeResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "No such post"),
        (status = 422, description = "Unknown status")
    )
)]
pub async fn change_blog_status(
    State(state): State<BlogHandlerState>,
    Path(id): Path<i32>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ApiResponse<StatusChangeResponse>>, ApiError> {
    let status = query.status.parse::<BlogStatus>().map_err(domain_error)?;
    let change = state
        .service
        .change_status(id, status, caller(&user))
        .await
        .map_err(domain_error)?;
    Ok(Json(ApiResponse::success(change.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/blogs/{id}",
    tag = "Blogs",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post deleted", body = ApiResponse<DeleteBlogResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is neither the author nor an admin"),
        (status = 404, description = "No such post")
    )
)]
pub async fn delete_blog(
    State(state): State<BlogHandlerState>,
    Path(id): Path<i32>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<DeleteBlogResponse>>, ApiError> {
    state
        .service
        .delete(id, caller(&user))
        .await
        .map_err(domain_error)?;
    Ok(Json(ApiResponse::success(DeleteBlogResponse {
        id,
        message: format!("Post {} deleted", id),
    })))
}
