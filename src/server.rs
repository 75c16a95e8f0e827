use crate::config::AppConfig;
use crate::dashboard::{Dashboard, DatasetKind, DateBounds, MapRequest, TableView};
use crate::error::DashboardError;
use crate::processing::TableFilter;
use crate::render::Figure;
use crate::types::AggregationMode;
use anyhow::Result;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub struct AppState {
    pub dashboard: Dashboard,
}

#[derive(Deserialize)]
pub struct MapParams {
    column: String,
    mode: String,
    scale: Option<f64>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct StateParams {
    state: String,
}

#[derive(Deserialize)]
pub struct CityParams {
    state: String,
    city: String,
}

#[derive(Deserialize)]
pub struct RangeParams {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct TableParams {
    dataset: DatasetKind,
    state: Option<String>,
    city: Option<String>,
    region: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl TableParams {
    fn into_filter(self) -> TableFilter {
        let defaults = TableFilter::default();
        TableFilter {
            state: self.state,
            city: self.city,
            region: self.region,
            start: self.start,
            end: self.end,
            offset: self.offset.unwrap_or(defaults.offset),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
    retryable: bool,
}

pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        ApiError(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(DashboardError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retryable = self.0.is_retryable();
        let status = match &self.0 {
            DashboardError::Validation(_) => StatusCode::BAD_REQUEST,
            DashboardError::UnknownState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Translation(_) if retryable => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::Translation(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Io(_) | DashboardError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(%status, error = %self.0, "Request failed");
        let body = ErrorBody {
            error: self.0.to_string(),
            retryable,
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/map", get(map_handler))
        .route("/api/states", get(states_handler))
        .route("/api/cities", get(cities_handler))
        .route("/api/city", get(city_handler))
        .route("/api/regions", get(regions_handler))
        .route("/api/deaths", get(deaths_handler))
        .route("/api/bounds", get(bounds_handler))
        .route("/api/table", get(table_handler))
        .with_state(state)
}

pub async fn start_server(config: AppConfig, dashboard: Dashboard) -> Result<()> {
    let state = Arc::new(AppState { dashboard });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Starting server on http://{}", addr);

    let app = router(state)
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn map_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<MapParams>, QueryRejection>,
) -> Result<Json<Figure>, ApiError> {
    let Query(params) = params?;
    let request = MapRequest {
        column: params.column,
        mode: params.mode.parse::<AggregationMode>()?,
        scale: params.scale,
        start: params.start,
        end: params.end,
    };
    Ok(Json(state.dashboard.map(&request).await?))
}

async fn states_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.dashboard.states()?))
}

async fn cities_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<StateParams>, QueryRejection>,
) -> Result<Json<Vec<String>>, ApiError> {
    let Query(params) = params?;
    Ok(Json(state.dashboard.cities(&params.state)?))
}

async fn city_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<CityParams>, QueryRejection>,
) -> Result<Json<Figure>, ApiError> {
    let Query(params) = params?;
    Ok(Json(state.dashboard.city(&params.state, &params.city)?))
}

async fn regions_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Json<Figure>, ApiError> {
    let Query(params) = params?;
    Ok(Json(state.dashboard.regions(params.start, params.end)?))
}

async fn deaths_handler(State(state): State<Arc<AppState>>) -> Result<Json<Figure>, ApiError> {
    Ok(Json(state.dashboard.deaths()?))
}

async fn bounds_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DateBounds>, ApiError> {
    Ok(Json(state.dashboard.bounds()?))
}

async fn table_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<TableParams>, QueryRejection>,
) -> Result<Json<TableView>, ApiError> {
    let Query(params) = params?;
    let dataset = params.dataset;
    Ok(Json(state.dashboard.table(dataset, &params.into_filter())?))
}
