//! Tariff REST API handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use super::dto::{
    BatchResponse, CalculateCostRequest, CalculateCostResponse, DeleteBatchResponse,
    DeleteTariffResponse, TariffInput, TariffResponse, UpdateTariffRequest, UpdateTariffResponse,
    UploadForm,
};
use crate::application::{BatchPayload, TariffService};
use crate::interfaces::http::common::{
    api_error, domain_error, invalid_json, ApiError, ApiResponse, PaginatedResponse,
    PaginationParams,
};

/// Multipart field carrying the uploaded document
pub const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct TariffHandlerState {
    pub service: Arc<TariffService>,
}

async fn create_from(
    state: &TariffHandlerState,
    payload: BatchPayload,
) -> Result<(StatusCode, Json<ApiResponse<Vec<BatchResponse>>>), ApiError> {
    let batches = state
        .service
        .create_batches(payload)
        .await
        .map_err(domain_error)?;

    let body = batches.into_iter().map(Into::into).collect();
    Ok((StatusCode::CREATED, Json(ApiResponse::success(body))))
}

#[utoipa::path(
    post,
    path = "/api/v1/tariffs",
    tag = "Tariffs",
    security(("bearer_auth" = [])),
    request_body(
        content = HashMap<String, Vec<TariffInput>>,
        description = "Accession date (YYYY-MM-DD) to tariffs; batches are created in key order"
    ),
    responses(
        (status = 201, description = "Batches created", body = ApiResponse<Vec<BatchResponse>>),
        (status = 400, description = "Malformed JSON"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Invalid date, category or rate"),
        (status = 500, description = "Storage error; earlier date keys stay committed")
    )
)]
pub async fn create_tariffs(
    State(state): State<TariffHandlerState>,
    payload: Result<Json<BatchPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<BatchResponse>>>), ApiError> {
    let Json(payload) = payload.map_err(invalid_json)?;
    create_from(&state, payload).await
}

#[utoipa::path(
    post,
    path = "/api/v1/tariffs/upload",
    tag = "Tariffs",
    security(("bearer_auth" = [])),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Batches created", body = ApiResponse<Vec<BatchResponse>>),
        (status = 400, description = "Missing file or malformed JSON"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Invalid date, category or rate")
    )
)]
pub async fn upload_tariffs(
    State(state): State<TariffHandlerState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Vec<BatchResponse>>>), ApiError> {
    let mut document = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(String::from);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
        tracing::info!(file = ?file_name, size = bytes.len(), "Received tariff upload");
        document = Some(bytes);
        break;
    }

    let Some(bytes) = document else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing multipart field '{}'", UPLOAD_FIELD),
        ));
    };

    let payload = BatchPayload::from_slice(&bytes).map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid JSON in uploaded file: {}", e),
        )
    })?;
    create_from(&state, payload).await
}

#[utoipa::path(
    get,
    path = "/api/v1/tariffs",
    tag = "Tariffs",
    params(PaginationParams),
    responses(
        (status = 200, description = "Tariff page ordered by id", body = ApiResponse<PaginatedResponse<TariffResponse>>),
        (status = 422, description = "Page or page size out of range")
    )
)]
pub async fn list_tariffs(
    State(state): State<TariffHandlerState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<TariffResponse>>>, ApiError> {
    let params = params.checked()?;
    let page = state
        .service
        .list_tariffs(params.page, params.page_size)
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
    path = "/api/v1/tariffs/{id}",
    tag = "Tariffs",
    params(("id" = i32, Path, description = "Tariff ID")),
    responses(
        (status = 200, description = "Tariff details", body = ApiResponse<TariffResponse>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_tariff(
    State(state): State<TariffHandlerState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<TariffResponse>>, ApiError> {
    let tariff = state.service.get_tariff(id).await.map_err(domain_error)?;
    Ok(Json(ApiResponse::success(tariff.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tariffs/{id}",
    tag = "Tariffs",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Tariff ID")),
    request_body = UpdateTariffRequest,
    responses(
        (status = 200, description = "Changed fields", body = ApiResponse<UpdateTariffResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Not found"),
        (status = 422, description = "Empty or invalid update")
    )
)]
pub async fn update_tariff(
    State(state): State<TariffHandlerState>,
    Path(id): Path<i32>,
    body: Result<Json<UpdateTariffRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UpdateTariffResponse>>, ApiError> {
    let Json(request) = body.map_err(invalid_json)?;
    let changed = state
        .service
        .update_tariff(id, request.into())
        .await
        .map_err(domain_error)?;

    Ok(Json(ApiResponse::success(UpdateTariffResponse::new(id, changed))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tariffs/{id}",
    tag = "Tariffs",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Tariff ID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<DeleteTariffResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_tariff(
    State(state): State<TariffHandlerState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeleteTariffResponse>>, ApiError> {
    state.service.delete_tariff(id).await.map_err(domain_error)?;

    Ok(Json(ApiResponse::success(DeleteTariffResponse {
        message: format!("Tariff with ID {} has been deleted.", id),
    })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tariffs/batches/{id}",
    tag = "Tariffs",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch and its tariffs deleted", body = ApiResponse<DeleteBatchResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_batch(
    State(state): State<TariffHandlerState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeleteBatchResponse>>, ApiError> {
    let removed = state.service.delete_batch(id).await.map_err(domain_error)?;

    Ok(Json(ApiResponse::success(DeleteBatchResponse {
        batch_id: id,
        message: format!(
            "Batch with ID {} and {} tariff(s) have been deleted.",
            id,
            removed.len()
        ),
        deleted_tariff_ids: removed,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/tariffs/calculate",
    tag = "Tariffs",
    request_body = CalculateCostRequest,
    responses(
        (status = 200, description = "Insurance cost", body = ApiResponse<CalculateCostResponse>),
        (status = 404, description = "Tariff not found"),
        (status = 422, description = "Negative declared value")
    )
)]
pub async fn calculate_cost(
    State(state): State<TariffHandlerState>,
    body: Result<Json<CalculateCostRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CalculateCostResponse>>, ApiError> {
    let Json(request) = body.map_err(invalid_json)?;
    let quote = state
        .service
        .calculate_cost(request.tariff_id, request.declared_value)
        .await
        .map_err(domain_error)?;

    Ok(Json(ApiResponse::success(quote.into())))
}
