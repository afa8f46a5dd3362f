use std::collections::HashMap;

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::fetcher::PortfolioSource;
use crate::portfolio_loader::PortfolioLoader;
use crate::query::{gotchi_filters, FilterSelection, FilterSet, FilteredView, QueryParams};
use crate::state::{CategoryData, RewardState};
use crate::types::{Category, Gotchi, NavEntry, Parcel, SortDir, SortSpec};

pub struct ApiState<S> {
    pub loader: PortfolioLoader<S>,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self { loader: self.loader.clone() }
    }
}

// `:key` is a wallet address on POST and a category everywhere else.
pub fn router<S: PortfolioSource>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/portfolio/nav", get(get_nav::<S>))
        .route("/portfolio/reward", get(get_reward::<S>).post(calculate_reward::<S>))
        .route("/portfolio/:key", get(get_category::<S>).post(load_portfolio::<S>))
        .route("/portfolio/:key/sorting", put(put_sorting::<S>))
        .route("/portfolio/:key/filters", post(post_filters::<S>))
        .route("/portfolio/:key/:parcel_id/details", post(load_parcel_details::<S>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub category: Category,
    pub address: Option<String>,
    pub loading: bool,
    pub count: usize,
    pub sorting: Option<SortSpec>,
    pub items: CategoryData,
    /// Canonical query string of the view, filters included. Gotchis only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterSet>,
}

/// `sort` + optional `dir` (default desc) from the query string.
fn sort_from_query(params: &QueryParams) -> Result<Option<SortSpec>, AppError> {
    let Some(field) = params.first("sort") else {
        return Ok(None);
    };
    let dir = match params.first("dir") {
        Some(d) => d.parse::<SortDir>()?,
        None => SortDir::Desc,
    };
    Ok(Some(SortSpec::new(field, dir)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn load_portfolio<S: PortfolioSource>(
    State(state): State<ApiState<S>>,
    Path(address): Path<String>,
) -> Result<Response, AppError> {
    let address = address.trim().to_string();
    if !is_wallet_address(&address) {
        return Err(AppError::BadRequest(format!("not a wallet address: {address}")));
    }
    // Loads run detached; progress is visible through /portfolio/nav.
    let handle = state.loader.load_portfolio(&address);
    let settled = address.clone();
    tokio::spawn(async move {
        handle.wait().await;
        info!(address = %settled, "portfolio load settled");
    });
    Ok((StatusCode::ACCEPTED, Json(json!({ "address": address }))).into_response())
}

/// `0x` followed by 40 hex digits.
fn is_wallet_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

async fn get_nav<S: PortfolioSource>(State(state): State<ApiState<S>>) -> Json<Vec<NavEntry>> {
    Json(state.loader.nav_summary())
}

async fn get_category<S: PortfolioSource>(
    State(state): State<ApiState<S>>,
    Path(key): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<CategoryResponse>, AppError> {
    let category: Category = key.parse()?;
    let params = QueryParams::parse(raw.as_deref().unwrap_or_default());
    let requested = sort_from_query(&params)?;
    let store = state.loader.store();
    let loading = store.is_loading(category);
    let sorting = requested.clone().or_else(|| store.sorting(category));

    if category == Category::Gotchis {
        let mut view = FilteredView::new(store.gotchis(), gotchi_filters());
        view.load_from_query(&params);
        if let Some(spec) = &requested {
            view.apply_sorting(&spec.field, spec.dir);
        }
        return Ok(Json(gotchi_view_response(&state, view, &params, sorting)));
    }

    let items = match &requested {
        Some(spec) => store.snapshot(category).sorted(Some(spec)),
        None => store.snapshot(category),
    };
    Ok(Json(CategoryResponse {
        category,
        address: store.address(),
        loading,
        count: items.len(),
        sorting,
        items,
        query: None,
        filters: None,
    }))
}

/// Applies filter-panel selections on top of the filters already in the query
/// string. An empty body clears every filter. The response carries the query
/// string to persist.
async fn post_filters<S: PortfolioSource>(
    State(state): State<ApiState<S>>,
    Path(key): Path<String>,
    RawQuery(raw): RawQuery,
    Json(selections): Json<HashMap<String, FilterSelection>>,
) -> Result<Json<CategoryResponse>, AppError> {
    if key.parse::<Category>()? != Category::Gotchis {
        return Err(AppError::NotFound(format!("{key} has no filters")));
    }
    let params = QueryParams::parse(raw.as_deref().unwrap_or_default());
    let requested = sort_from_query(&params)?;
    let store = state.loader.store();
    let sorting = requested.clone().or_else(|| store.sorting(Category::Gotchis));

    let mut view = FilteredView::new(store.gotchis(), gotchi_filters());
    view.load_from_query(&params);
    if let Some(spec) = &requested {
        view.apply_sorting(&spec.field, spec.dir);
    }
    if selections.is_empty() {
        view.reset_filters();
    } else {
        view.apply_filters(&selections);
    }
    Ok(Json(gotchi_view_response(&state, view, &params, sorting)))
}

fn gotchi_view_response<S: PortfolioSource>(
    state: &ApiState<S>,
    view: FilteredView<Gotchi>,
    params: &QueryParams,
    sorting: Option<SortSpec>,
) -> CategoryResponse {
    let store = state.loader.store();
    let query = view.query_params(params).to_query_string();
    let filters = view.filters().clone();
    let items = CategoryData::Gotchis(view.into_items());
    CategoryResponse {
        category: Category::Gotchis,
        address: store.address(),
        loading: store.is_loading(Category::Gotchis),
        count: items.len(),
        sorting,
        items,
        query: Some(query),
        filters: Some(filters),
    }
}

async fn put_sorting<S: PortfolioSource>(
    State(state): State<ApiState<S>>,
    Path(key): Path<String>,
    Json(spec): Json<SortSpec>,
) -> Result<Json<CategoryResponse>, AppError> {
    let category: Category = key.parse()?;
    state.loader.resort(category, spec.clone());
    let store = state.loader.store();
    let items = store.snapshot(category);
    Ok(Json(CategoryResponse {
        category,
        address: store.address(),
        loading: store.is_loading(category),
        count: items.len(),
        sorting: Some(spec),
        items,
        query: None,
        filters: None,
    }))
}

async fn load_parcel_details<S: PortfolioSource>(
    State(state): State<ApiState<S>>,
    Path((key, parcel_id)): Path<(String, String)>,
) -> Result<Json<Parcel>, AppError> {
    if key.parse::<Category>()? != Category::Realm {
        return Err(AppError::NotFound(format!("{key} has no parcel details")));
    }
    state.loader.load_parcel_details(&parcel_id).await?;
    state
        .loader
        .store()
        .realm()
        .into_iter()
        .find(|p| p.id == parcel_id || p.parcel_id == parcel_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("parcel {parcel_id}")))
}

async fn calculate_reward<S: PortfolioSource>(
    State(state): State<ApiState<S>>,
) -> Result<Json<RewardState>, AppError> {
    state.loader.calculate_reward().await?;
    Ok(Json(state.loader.store().reward()))
}

async fn get_reward<S: PortfolioSource>(State(state): State<ApiState<S>>) -> Json<RewardState> {
    Json(state.loader.store().reward())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
