use axum::{
    extract::{Query, State},
    Extension, Json,
};
use pagevault_core::{Pagination, SearchFilters, SearchPage};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{
    flag, lenient_decimal, lenient_i64, map_db_error, non_blank, ApiError, ApiResponse, AppState,
    MAX_PER_PAGE,
};

#[derive(Debug, Deserialize)]
pub(super) struct SearchQuery {
    q: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
    source: Option<String>,
    discount: Option<String>,
}

/// GET /api/v1/search/products: Substring search with price/source filters.
pub(super) async fn search_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<SearchPage>>, ApiError> {
    let rid = &req_id.0;
    let q = non_blank(query.q.as_deref())
        .ok_or_else(|| ApiError::validation(rid, "q is required"))?;

    let pagination = Pagination::search(
        lenient_i64(query.page.as_deref()),
        lenient_i64(query.per_page.as_deref()),
    )
    .capped(MAX_PER_PAGE);
    let filters = SearchFilters::from_raw(
        lenient_decimal(query.min_price.as_deref()),
        lenient_decimal(query.max_price.as_deref()),
        query.source.as_deref(),
        flag(query.discount.as_deref()),
    );

    let page = state
        .store
        .search_products(q, pagination, &filters, state.deadline())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(page, req_id.0)))
}
