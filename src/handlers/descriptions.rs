use super::common::{created_or_existing, ensure_object_id, JsonBody, ValidatedJson};
use crate::{
    errors::ServiceError,
    object_id::validate_object_id,
    services::{
        batch::{BatchRequest, BatchResponse},
        descriptions::{CreateDescriptionInput, DescriptionChanges, DescriptionFilter, DescriptionView},
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Partial update addressed by id in the body
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchDescriptionRequest {
    #[validate(custom = "validate_object_id")]
    pub id: String,
    #[validate]
    pub updates: DescriptionChanges,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_descriptions)
                .post(create_description)
                .patch(patch_description),
        )
        .route("/batch", post(batch_descriptions))
        .route(
            "/:id",
            get(get_description)
                .put(update_description)
                .delete(delete_description),
        )
        .route("/:id/restore", post(restore_description))
}

#[utoipa::path(
    post,
    path = "/api/v1/descriptions/batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Batch committed; failed operations listed in `errors`", body = BatchResponse),
        (status = 400, description = "Malformed batch", body = crate::errors::ErrorResponse),
        (status = 500, description = "All operations failed", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn batch_descriptions(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<BatchRequest>,
) -> Result<Json<BatchResponse>, ServiceError> {
    let response = state.services.batch.process(request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/descriptions",
    params(DescriptionFilter),
    responses(
        (status = 200, description = "Active descriptions", body = ApiResponse<Vec<DescriptionView>>),
        (status = 400, description = "Invalid filter id", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn list_descriptions(
    State(state): State<AppState>,
    Query(filter): Query<DescriptionFilter>,
) -> ApiResult<Vec<DescriptionView>> {
    let views = state.services.descriptions.list(filter).await?;
    Ok(Json(ApiResponse::success(views)))
}

#[utoipa::path(
    post,
    path = "/api/v1/descriptions",
    request_body = CreateDescriptionInput,
    responses(
        (status = 201, description = "Description created", body = ApiResponse<DescriptionView>),
        (status = 200, description = "Description with the same text already exists", body = ApiResponse<DescriptionView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn create_description(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CreateDescriptionInput>,
) -> Result<Response, ServiceError> {
    let (view, created) = state.services.descriptions.create(input).await?;
    Ok(created_or_existing(view, created))
}

#[utoipa::path(
    get,
    path = "/api/v1/descriptions/{id}",
    params(("id" = String, Path, description = "Description ID")),
    responses(
        (status = 200, description = "Description fetched", body = ApiResponse<DescriptionView>),
        (status = 404, description = "Description not found", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn get_description(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DescriptionView> {
    ensure_object_id(&id, "description")?;
    let view = state.services.descriptions.get(&id).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    put,
    path = "/api/v1/descriptions/{id}",
    params(("id" = String, Path, description = "Description ID")),
    request_body = DescriptionChanges,
    responses(
        (status = 200, description = "Description updated", body = ApiResponse<DescriptionView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Description not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate description text", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn update_description(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(changes): ValidatedJson<DescriptionChanges>,
) -> ApiResult<DescriptionView> {
    ensure_object_id(&id, "description")?;
    let view = state.services.descriptions.update(&id, changes).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/descriptions",
    request_body = PatchDescriptionRequest,
    responses(
        (status = 200, description = "Description updated", body = ApiResponse<DescriptionView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Description not found", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn patch_description(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<PatchDescriptionRequest>,
) -> ApiResult<DescriptionView> {
    let view = state
        .services
        .descriptions
        .update(&request.id, request.updates)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/descriptions/{id}",
    params(("id" = String, Path, description = "Description ID")),
    responses(
        (status = 200, description = "Description and its direct children deactivated", body = ApiResponse<DescriptionView>),
        (status = 404, description = "Description not found", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn delete_description(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DescriptionView> {
    ensure_object_id(&id, "description")?;
    let view = state.services.descriptions.deactivate(&id).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/descriptions/{id}/restore",
    params(("id" = String, Path, description = "Description ID")),
    responses(
        (status = 200, description = "Description reactivated", body = ApiResponse<DescriptionView>),
        (status = 404, description = "Description not found", body = crate::errors::ErrorResponse)
    ),
    tag = "descriptions"
)]
pub async fn restore_description(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DescriptionView> {
    ensure_object_id(&id, "description")?;
    let view = state.services.descriptions.restore(&id).await?;
    Ok(Json(ApiResponse::success(view)))
}
