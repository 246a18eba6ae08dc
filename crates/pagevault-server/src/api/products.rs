use axum::{
    extract::{Query, State},
    Extension, Json,
};
use pagevault_core::Product;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, non_blank, page_data::parse_id, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    id: Option<String>,
    url: Option<String>,
}

/// GET /api/v1/product: One product by id or canonical URL.
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let rid = &req_id.0;

    let result = if let Some(raw_id) = non_blank(query.id.as_deref()) {
        let id = parse_id(rid, raw_id)?;
        state.store.product_by_id(id, state.deadline()).await
    } else if let Some(url) = non_blank(query.url.as_deref()) {
        state.store.product_by_url(url, state.deadline()).await
    } else {
        return Err(ApiError::validation(rid, "either id or url is required"));
    };
    let product = result.map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(product, req_id.0)))
}
