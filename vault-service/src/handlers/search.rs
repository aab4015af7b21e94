use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::{FileResponse, SearchFiltersResponse, SearchParams, SearchResponse};
use crate::middleware::AuthUser;
use crate::services::search::{size_range_options, DateRange, FileQuery};
use crate::AppState;

pub async fn search_files(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = FileQuery::from_params(&ctx.user_id, &params, Utc::now())?;

    tracing::debug!(user_id = %ctx.user_id, ?query, "Searching files");

    let total = state.files.count(&query).await?;
    let files = state.files.find(&query).await?;
    let total_pages = total.div_ceil(query.limit);

    Ok(Json(SearchResponse {
        files: files.into_iter().map(FileResponse::from).collect(),
        total,
        page: query.page,
        limit: query.limit,
        total_pages,
    }))
}

pub async fn search_filters(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let file_types = state.files.distinct_types(&ctx.user_id).await?;

    Ok(Json(SearchFiltersResponse {
        file_types,
        date_ranges: DateRange::ALL.iter().map(DateRange::as_str).collect(),
        size_ranges: size_range_options(),
    }))
}
