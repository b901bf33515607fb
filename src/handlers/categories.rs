use super::common::{created_or_existing, ensure_object_id, ValidatedJson};
use crate::{
    entities::category,
    errors::ServiceError,
    services::categories::{CreateCategoryInput, ReorderCategoriesInput, UpdateCategoryInput},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::{get, post},
    Router,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/reorder", post(reorder_categories))
        .route(
            "/:id",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .route("/:id/restore", post(restore_category))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Active categories in display order", body = ApiResponse<Vec<category::Model>>)
    ),
    tag = "categories"
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<category::Model>> {
    let categories = state.services.categories.list_active().await?;
    Ok(Json(ApiResponse::success(categories)))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CreateCategoryInput,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<category::Model>),
        (status = 200, description = "Category with the same name already exists", body = ApiResponse<category::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CreateCategoryInput>,
) -> Result<Response, ServiceError> {
    let (category, created) = state.services.categories.create(input).await?;
    Ok(created_or_existing(category, created))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = String, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category fetched", body = ApiResponse<category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<category::Model> {
    ensure_object_id(&id, "category")?;
    let category = state.services.categories.get(&id).await?;
    Ok(Json(ApiResponse::success(category)))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    params(("id" = String, Path, description = "Category ID")),
    request_body = UpdateCategoryInput,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name taken by another category", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateCategoryInput>,
) -> ApiResult<category::Model> {
    ensure_object_id(&id, "category")?;
    let category = state.services.categories.update(&id, input).await?;
    Ok(Json(ApiResponse::success(category)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = String, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category and its descriptions deactivated", body = ApiResponse<category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<category::Model> {
    ensure_object_id(&id, "category")?;
    let category = state.services.categories.deactivate(&id).await?;
    Ok(Json(ApiResponse::success(category)))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories/{id}/restore",
    params(("id" = String, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category and its descriptions reactivated", body = ApiResponse<category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn restore_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<category::Model> {
    ensure_object_id(&id, "category")?;
    let category = state.services.categories.restore(&id).await?;
    Ok(Json(ApiResponse::success(category)))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories/reorder",
    request_body = ReorderCategoriesInput,
    responses(
        (status = 200, description = "Categories reordered", body = ApiResponse<Vec<category::Model>>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown category", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn reorder_categories(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<ReorderCategoriesInput>,
) -> ApiResult<Vec<category::Model>> {
    let categories = state.services.categories.reorder(input).await?;
    Ok(Json(ApiResponse::success(categories)))
}
