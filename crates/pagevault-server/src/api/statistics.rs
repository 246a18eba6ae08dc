use axum::{
    extract::{Query, State},
    Extension, Json,
};
use pagevault_core::{GlobalStatistics, StatsPeriod, UrlStatistics};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, non_blank, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct StatisticsQuery {
    url: Option<String>,
    period: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum StatisticsResponse {
    Url(UrlStatistics),
    Global(GlobalStatistics),
}

/// GET /api/v1/statistics: Per-URL rollup when `url` is set, else global.
pub(super) async fn get_statistics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<ApiResponse<StatisticsResponse>>, ApiError> {
    let rid = &req_id.0;

    let result = match non_blank(query.url.as_deref()) {
        Some(url) => {
            let period = StatsPeriod::parse(query.period.as_deref());
            state
                .store
                .url_statistics(url, period, state.deadline())
                .await
                .map(StatisticsResponse::Url)
        }
        None => state
            .store
            .global_statistics(state.deadline())
            .await
            .map(StatisticsResponse::Global),
    };
    let data = result.map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
