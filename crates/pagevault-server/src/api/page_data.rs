use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use pagevault_core::{
    HistoryFilters, HistoryPage, IngestReceipt, NewPageSnapshot, PageSnapshot, Pagination,
    MAX_LATEST_LIMIT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    flag, lenient_i64, map_db_error, non_blank, ApiError, ApiResponse, AppState, MAX_PER_PAGE,
};

#[derive(Debug, Deserialize)]
pub(super) struct IngestRequest {
    #[serde(rename = "pageData")]
    page_data: Option<NewPageSnapshot>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PageDataQuery {
    id: Option<String>,
    url: Option<String>,
    all: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    url: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
    source: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    success: Option<String>,
}

/// One snapshot for `?id=` or `?url=`, every recent one for `?url=&all=true`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum PageDataResponse {
    One(Box<PageSnapshot>),
    Many(Vec<PageSnapshot>),
}

#[derive(Debug, Serialize)]
pub(super) struct DeleteResponse {
    id: Uuid,
    deleted: bool,
}

pub(super) fn parse_id(request_id: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::validation(request_id, "id must be a UUID"))
}

/// POST /api/v1/page-data: Ingest one scrape event.
pub(super) async fn create_page_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<IngestReceipt>>), ApiError> {
    let rid = &req_id.0;

    let Json(body) = body.map_err(|e| ApiError::validation(rid, e.body_text()))?;
    let mut snapshot = body
        .page_data
        .ok_or_else(|| ApiError::validation(rid, "pageData is required"))?;

    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    snapshot.apply_defaults(Utc::now(), user_agent);

    let receipt = state
        .store
        .ingest(&snapshot, state.deadline())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(receipt, req_id.0)),
    ))
}

/// GET /api/v1/page-data: Point fetch by id, or latest by URL.
pub(super) async fn get_page_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PageDataQuery>,
) -> Result<Json<ApiResponse<PageDataResponse>>, ApiError> {
    let rid = &req_id.0;

    let data = if let Some(raw_id) = non_blank(query.id.as_deref()) {
        let id = parse_id(rid, raw_id)?;
        let snapshot = state
            .store
            .snapshot_by_id(id, state.deadline())
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
        PageDataResponse::One(Box::new(snapshot))
    } else if let Some(url) = non_blank(query.url.as_deref()) {
        if flag(query.all.as_deref()) {
            let snapshots = state
                .store
                .latest_n_by_url(url, MAX_LATEST_LIMIT, state.deadline())
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
            PageDataResponse::Many(snapshots)
        } else {
            let snapshot = state
                .store
                .latest_by_url(url, state.deadline())
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
            PageDataResponse::One(Box::new(snapshot))
        }
    } else {
        return Err(ApiError::validation(rid, "either id or url is required"));
    };

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// DELETE /api/v1/page-data/{id}: Remove a snapshot and its owned products.
pub(super) async fn delete_page_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &raw_id)?;

    state
        .store
        .delete_snapshot(id, state.deadline())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        DeleteResponse { id, deleted: true },
        req_id.0,
    )))
}

/// GET /api/v1/page-data/history: Paginated scrape history of one URL.
pub(super) async fn page_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<HistoryPage>>, ApiError> {
    let rid = &req_id.0;
    let url = non_blank(query.url.as_deref())
        .ok_or_else(|| ApiError::validation(rid, "url is required"))?;

    let pagination = Pagination::history(
        lenient_i64(query.page.as_deref()),
        lenient_i64(query.per_page.as_deref()),
    )
    .capped(MAX_PER_PAGE);
    let filters = HistoryFilters::from_raw(
        query.source.as_deref(),
        query.date_from.as_deref(),
        query.date_to.as_deref(),
        flag(query.success.as_deref()),
    );

    let page = state
        .store
        .history(url, pagination, &filters, state.deadline())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(page, req_id.0)))
}
