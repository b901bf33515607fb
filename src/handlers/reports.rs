use crate::{
    common::DateRangeParams, services::reports::HarvestReport, ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HarvestReportQuery {
    /// First day included, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Last day included, `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// Only harvests of this description
    pub description_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/harvests", get(harvest_report))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/harvests",
    params(HarvestReportQuery),
    responses(
        (status = 200, description = "Harvest totals for the range", body = ApiResponse<HarvestReport>),
        (status = 400, description = "Invalid date or description id", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn harvest_report(
    State(state): State<AppState>,
    Query(query): Query<HarvestReportQuery>,
) -> ApiResult<HarvestReport> {
    let bounds = DateRangeParams::new(query.start_date.as_deref(), query.end_date.as_deref())
        .to_bounds()?;
    let report = state
        .services
        .reports
        .harvest_report(bounds, query.description_id.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(report)))
}
