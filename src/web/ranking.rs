//! Ranking handlers.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::data::ranking::{RankingMode, RankingQuery, SortDirection, load_ranking};
use crate::display::FormattedRow;
use crate::state::AppState;
use crate::view::ViewSnapshot;
use crate::web::error::ApiError;
use crate::web::identity::Identity;
use crate::web::routes::{cache, with_cache_control};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RankingParams {
    #[serde(default)]
    pub mode: RankingMode,
    #[serde(default)]
    pub sort: SortDirection,
    #[serde(default)]
    pub search: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RankingPage {
    pub rows: Vec<FormattedRow>,
    /// Row count across all pages.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    /// False when a newer ranking request from the same user superseded this one.
    pub committed: bool,
}

/// Clamp paging parameters and return the `(page, per_page, offset)` to use.
pub fn page_window(page: usize, per_page: usize) -> (usize, usize, usize) {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    (page, per_page, (page - 1).saturating_mul(per_page))
}

/// `GET /api/ranking`
pub async fn get_ranking(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<RankingParams>,
) -> Result<Response, ApiError> {
    let faculty = identity.faculty(&state).await?;
    let query = RankingQuery::new(faculty)
        .mode(params.mode)
        .sort(params.sort)
        .search(params.search);

    let view_state = state.view_for(&identity.user_id);
    let (view, committed) = view_state
        .refresh(load_ranking(
            state.data.as_ref(),
            state.config.schema_layout,
            &query,
            state.config.qualification_threshold,
        ))
        .await;

    let (page, per_page, offset) = page_window(params.page, params.per_page);
    let rows = view
        .rows
        .iter()
        .skip(offset)
        .take(per_page)
        .map(FormattedRow::from)
        .collect();

    Ok(with_cache_control(
        RankingPage {
            rows,
            total: view.total,
            page,
            per_page,
            committed,
        },
        cache::PRIVATE,
    ))
}

/// `GET /api/ranking/state`
pub async fn get_ranking_state(
    State(state): State<AppState>,
    identity: Identity,
) -> Response {
    let snapshot: ViewSnapshot = match state.existing_view(&identity.user_id) {
        Some(view) => view.snapshot(),
        None => crate::view::RankingViewState::new().snapshot(),
    };
    with_cache_control(snapshot, cache::PRIVATE)
}
