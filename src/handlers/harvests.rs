use super::common::{created_response, ensure_object_id, ValidatedJson};
use crate::{
    common::DateRangeParams,
    errors::ServiceError,
    services::harvests::{CreateHarvestInput, HarvestView, UpdateHarvestInput},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_harvests).post(create_harvest))
        .route(
            "/:id",
            get(get_harvest).put(update_harvest).delete(delete_harvest),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/harvests",
    params(DateRangeParams),
    responses(
        (status = 200, description = "Harvests, newest first", body = ApiResponse<Vec<HarvestView>>),
        (status = 400, description = "Invalid date", body = crate::errors::ErrorResponse)
    ),
    tag = "harvests"
)]
pub async fn list_harvests(
    State(state): State<AppState>,
    Query(range): Query<DateRangeParams>,
) -> ApiResult<Vec<HarvestView>> {
    let harvests = state.services.harvests.list(range.to_bounds()?).await?;
    Ok(Json(ApiResponse::success(harvests)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvests",
    request_body = CreateHarvestInput,
    responses(
        (status = 201, description = "Harvest recorded", body = ApiResponse<HarvestView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "harvests"
)]
pub async fn create_harvest(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CreateHarvestInput>,
) -> Result<Response, ServiceError> {
    let harvest = state.services.harvests.create(input).await?;
    Ok(created_response(harvest))
}

#[utoipa::path(
    get,
    path = "/api/v1/harvests/{id}",
    params(("id" = String, Path, description = "Harvest ID")),
    responses(
        (status = 200, description = "Harvest fetched", body = ApiResponse<HarvestView>),
        (status = 404, description = "Harvest not found", body = crate::errors::ErrorResponse)
    ),
    tag = "harvests"
)]
pub async fn get_harvest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<HarvestView> {
    ensure_object_id(&id, "harvest")?;
    let harvest = state.services.harvests.get(&id).await?;
    Ok(Json(ApiResponse::success(harvest)))
}

#[utoipa::path(
    put,
    path = "/api/v1/harvests/{id}",
    params(("id" = String, Path, description = "Harvest ID")),
    request_body = UpdateHarvestInput,
    responses(
        (status = 200, description = "Harvest updated", body = ApiResponse<HarvestView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Harvest not found", body = crate::errors::ErrorResponse)
    ),
    tag = "harvests"
)]
pub async fn update_harvest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateHarvestInput>,
) -> ApiResult<HarvestView> {
    ensure_object_id(&id, "harvest")?;
    let harvest = state.services.harvests.update(&id, input).await?;
    Ok(Json(ApiResponse::success(harvest)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/harvests/{id}",
    params(("id" = String, Path, description = "Harvest ID")),
    responses(
        (status = 200, description = "Harvest deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Harvest not found", body = crate::errors::ErrorResponse)
    ),
    tag = "harvests"
)]
pub async fn delete_harvest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ensure_object_id(&id, "harvest")?;
    state.services.harvests.delete(&id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id }))))
}
