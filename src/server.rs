use crate::color::{legend, LegendEntry};
use crate::config::{AppConfig, MapConfig};
use crate::district::{SortMode, StyledDistrict};
use crate::score_info::ScoreModal;
use crate::session::{refresh_shared, CountryView, DistrictPanel, FilterOptions, MapSession, RefreshReport, SelectionFocus};
use crate::types::{StageUpdate, UiState};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub config: AppConfig,
    pub session: RwLock<MapSession>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no districts are loaded for the current country")]
    NoDistricts,
    #[error("unknown district: {0}")]
    UnknownDistrict(String),
    #[error("no district at ({lon}, {lat})")]
    NoDistrictAt { lon: f64, lat: f64 },
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NoDistricts => StatusCode::CONFLICT,
            ApiError::UnknownDistrict(_) | ApiError::NoDistrictAt { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
pub struct FiltersResponse {
    options: FilterOptions,
    state: UiState,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    report: RefreshReport,
    countries: CountryView,
    panel: DistrictPanel,
}

#[derive(Deserialize)]
pub struct DistrictsQuery {
    search: Option<String>,
    sort: Option<String>,
}

#[derive(Serialize)]
pub struct DistrictsResponse {
    districts: Vec<StyledDistrict>,
    panel: DistrictPanel,
}

#[derive(Deserialize)]
pub struct SelectRequest {
    id: Option<String>,
    lon: Option<f64>,
    lat: Option<f64>,
}

#[derive(Serialize)]
pub struct SelectResponse {
    focus: SelectionFocus,
    districts: Vec<StyledDistrict>,
    panel: DistrictPanel,
}

pub fn router(state: Arc<AppState>) -> Router {
    let data_service = ServeDir::new(&state.config.data.dir);
    let static_dir = state.config.server.static_dir.clone();

    let app = Router::new()
        .route("/api/filters", get(filters_handler))
        .route("/api/state", post(stage_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/countries", get(countries_handler))
        .route("/api/districts", get(districts_handler))
        .route("/api/select", post(select_handler))
        .route("/api/score-info", get(score_info_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/map", get(map_handler))
        .nest_service("/data", data_service);

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, countries: FeatureCollection) -> Result<()> {
    let mut session = MapSession::new(countries);
    // initial render with default filters
    session.refresh();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = Arc::new(AppState {
        config,
        session: RwLock::new(session),
    });

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn filters_handler(State(state): State<Arc<AppState>>) -> Json<FiltersResponse> {
    let session = state.session.read().await;
    Json(FiltersResponse {
        options: session.filters().clone(),
        state: session.staged().clone(),
    })
}

async fn stage_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<StageUpdate>,
) -> Json<UiState> {
    let mut session = state.session.write().await;
    Json(session.stage(update).clone())
}

async fn refresh_handler(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    let report = refresh_shared(&state.session, &state.config).await;
    let session = state.session.read().await;
    Json(RefreshResponse {
        report,
        countries: session.country_view(),
        panel: session.panel(),
    })
}

async fn countries_handler(State(state): State<Arc<AppState>>) -> Json<CountryView> {
    Json(state.session.read().await.country_view())
}

async fn districts_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DistrictsQuery>,
) -> Result<Json<DistrictsResponse>, ApiError> {
    let sort = params.sort
        .map(|s| s.parse::<SortMode>())
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let mut session = state.session.write().await;
    if let Some(search) = params.search {
        session.set_search(search);
    }
    if let Some(sort) = sort {
        session.set_sort(sort);
    }

    Ok(Json(DistrictsResponse {
        districts: session.district_view(),
        panel: session.panel(),
    }))
}

async fn select_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let mut session = state.session.write().await;
    let layer = session.districts().ok_or(ApiError::NoDistricts)?;

    let focus = match (request.id, request.lon, request.lat) {
        (Some(id), _, _) => {
            if layer.view(&id).is_none() {
                return Err(ApiError::UnknownDistrict(id));
            }
            session.select(&id)
        }
        (None, Some(lon), Some(lat)) => session.select_at(lon, lat)
            .ok_or(ApiError::NoDistrictAt { lon, lat })?,
        _ => return Err(ApiError::BadRequest("expected `id` or `lon` and `lat`".to_string())),
    };

    Ok(Json(SelectResponse {
        focus,
        districts: session.district_view(),
        panel: session.panel(),
    }))
}

async fn score_info_handler(State(state): State<Arc<AppState>>) -> Json<ScoreModal> {
    Json(state.session.read().await.score_modal())
}

async fn legend_handler() -> Json<Vec<LegendEntry>> {
    Json(legend())
}

async fn map_handler(State(state): State<Arc<AppState>>) -> Json<MapConfig> {
    Json(state.config.map.clone())
}
