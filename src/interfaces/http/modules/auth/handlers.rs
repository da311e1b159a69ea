//! Authentication API handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};

use super::dto::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, UserInfo};
use crate::domain::{NewUser, User, UserRepository, UserRole};
use crate::infrastructure::crypto::jwt::{create_token, JwtConfig};
use crate::infrastructure::crypto::password::{hash_password, verify_password};
use crate::interfaces::http::common::{api_error, domain_error, ApiError, ApiResponse, ValidatedJson};
use crate::interfaces::http::middleware::AuthenticatedUser;

#[derive(Clone)]
pub struct AuthHandlerState {
    pub users: Arc<dyn UserRepository>,
    pub jwt_config: JwtConfig,
    pub bcrypt_cost: u32,
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %e, "Authentication failure");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
}

async fn find_login(state: &AuthHandlerState, login: &str) -> Result<Option<User>, ApiError> {
    if let Some(user) = state
        .users
        .find_by_username(login)
        .await
        .map_err(domain_error)?
    {
        return Ok(Some(user));
    }
    state
        .users
        .find_by_email(login)
        .await
        .map_err(domain_error)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthHandlerState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let Some(user) = find_login(&state, &request.username).await? else {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    };

    if !user.is_active {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Account is disabled"));
    }

    let password_valid = verify_password(&request.password, &user.password_hash).unwrap_or(false);
    if !password_valid {
        tracing::info!(username = %request.username, "Rejected login");
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    if let Err(e) = state.users.record_login(&user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to record last login");
    }

    let token = create_token(&user.id, &user.username, user.role.as_str(), &state.jwt_config)
        .map_err(internal)?;

    tracing::info!(username = %user.username, "User logged in");
    Ok(Json(ApiResponse::success(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_config.expires_in_secs(),
        user: user.into(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserInfo>),
        (status = 409, description = "Username or email already exists"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn register(
    State(state): State<AuthHandlerState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>), ApiError> {
    let password_hash = hash_password(&request.password, state.bcrypt_cost).map_err(internal)?;

    let user = state
        .users
        .create(NewUser {
            username: request.username,
            email: request.email,
            password_hash,
            role: UserRole::User,
        })
        .await
        .map_err(domain_error)?;

    tracing::info!(username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user info", body = ApiResponse<UserInfo>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_current_user(
    State(state): State<AuthHandlerState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state
        .users
        .find_by_id(&caller.user_id)
        .await
        .map_err(domain_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/users",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All accounts", body = ApiResponse<Vec<UserInfo>>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn list_users(
    State(state): State<AuthHandlerState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<UserInfo>>>, ApiError> {
    caller.require_admin()?;

    let users = state.users.list().await.map_err(domain_error)?;
    tracing::debug!(admin = %caller.username, count = users.len(), "Listed users");
    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserInfo::from).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/change-password",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Invalid current password"),
        (status = 422, description = "New password too short")
    )
)]
pub async fn change_password(
    State(state): State<AuthHandlerState>,
    Extension(caller): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = state
        .users
        .find_by_id(&caller.user_id)
        .await
        .map_err(domain_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    let password_valid =
        verify_password(&request.current_password, &user.password_hash).unwrap_or(false);
    if !password_valid {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid current password"));
    }

    let new_hash = hash_password(&request.new_password, state.bcrypt_cost).map_err(internal)?;
    state
        .users
        .set_password_hash(&user.id, &new_hash)
        .await
        .map_err(domain_error)?;

    tracing::info!(username = %user.username, "Password changed");
    Ok(Json(ApiResponse::success(())))
}
