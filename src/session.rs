//! Per-map interaction state: staged dropdowns, the applied filter, the loaded layers
//! and the district selection.
//!
//! Dropdown changes are only staged; `refresh` applies them. District files are read
//! outside the session lock, so every load carries the sequence number handed out by
//! `refresh` and results for anything but the latest request are dropped.

use crate::config::AppConfig;
use crate::country::{unique_countries, unique_sectors, CountryLayer, StyledCountry};
use crate::data::{fetch_collection, LoadError};
use crate::district::{districts_url, search_and_sort, DistrictLayer, DistrictPopup, SortMode, StyledDistrict, SELECTED_PADDING};
use crate::score_info::{metric_keys, score_modal, ScoreModal};
use crate::types::{StageUpdate, UiState, Viewport};
use geojson::{Feature, FeatureCollection};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const PANEL_HINT: &str = "Select a country to load districts.";

#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub countries: Vec<String>,
    pub sectors: Vec<String>,
    pub metrics: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictRequest {
    pub seq: u64,
    pub country: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    Installed { count: usize },
    Cleared,
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionFocus {
    pub id: String,
    pub viewport: Option<Viewport>,
    pub popup: Option<DistrictPopup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictCard {
    pub id: String,
    pub name: String,
    pub score: String,
    pub raw_value: String,
    pub risk_level: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictPanel {
    pub visible: bool,
    pub count: usize,
    pub subtitle: String,
    pub cards: Vec<DistrictCard>,
}

impl DistrictPanel {
    fn hidden() -> Self {
        Self {
            visible: false,
            count: 0,
            subtitle: PANEL_HINT.to_string(),
            cards: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryView {
    pub viewport: Option<Viewport>,
    pub features: Vec<StyledCountry>,
}

pub struct MapSession {
    countries: Vec<Feature>,
    options: FilterOptions,
    staged: UiState,
    applied: UiState,
    country_layer: CountryLayer,
    districts: Option<DistrictLayer>,
    selected: Option<String>,
    search: String,
    sort: SortMode,
    seq: u64,
}

impl MapSession {
    pub fn new(collection: FeatureCollection) -> Self {
        let countries = collection.features;
        let options = FilterOptions {
            countries: unique_countries(&countries),
            sectors: unique_sectors(&countries),
            metrics: metric_keys(),
        };
        let applied = UiState::default();
        let country_layer = CountryLayer::build(&countries, &applied);

        Self {
            countries,
            options,
            staged: applied.clone(),
            applied,
            country_layer,
            districts: None,
            selected: None,
            search: String::new(),
            sort: SortMode::default(),
            seq: 0,
        }
    }

    pub fn filters(&self) -> &FilterOptions {
        &self.options
    }

    pub fn staged(&self) -> &UiState {
        &self.staged
    }

    pub fn applied(&self) -> &UiState {
        &self.applied
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn districts(&self) -> Option<&DistrictLayer> {
        self.districts.as_ref()
    }

    pub fn country_layer(&self) -> &CountryLayer {
        &self.country_layer
    }

    pub fn stage(&mut self, update: StageUpdate) -> &UiState {
        if let Some(country) = update.country {
            self.staged.country = country;
        }
        if let Some(sector) = update.sector {
            self.staged.sector = sector;
        }
        if let Some(metric) = update.metric {
            self.staged.metric = metric;
        }
        &self.staged
    }

    /// Applies the staged filters. Returns the district file to load, if any.
    pub fn refresh(&mut self) -> Option<DistrictRequest> {
        self.applied = self.staged.clone();
        self.country_layer = CountryLayer::build(&self.countries, &self.applied);
        self.selected = None;
        self.seq += 1;
        info!(state = ?self.applied, features = self.country_layer.features.len(), "Applied filters");

        let Some(country) = self.applied.country.name().map(str::to_string) else {
            self.clear_districts();
            return None;
        };
        Some(DistrictRequest { seq: self.seq, country })
    }

    fn clear_districts(&mut self) {
        self.districts = None;
        self.selected = None;
    }

    pub fn install_districts(&mut self, seq: u64, result: Result<FeatureCollection, LoadError>) -> InstallOutcome {
        if seq != self.seq {
            debug!(seq, latest = self.seq, "Discarding stale district response");
            return InstallOutcome::Stale;
        }

        match result {
            Ok(collection) => {
                let layer = DistrictLayer::build(collection, &self.applied);
                let count = layer.len();
                self.districts = Some(layer);
                self.selected = None;
                info!(count, country = %self.applied.country, "Loaded districts");
                InstallOutcome::Installed { count }
            }
            Err(e) => {
                warn!(error = %e, "No district file found or failed to load");
                self.clear_districts();
                InstallOutcome::Cleared
            }
        }
    }

    /// Exclusive selection shared by card clicks and map clicks.
    pub fn select(&mut self, id: &str) -> SelectionFocus {
        self.selected = Some(id.to_string());
        let layer = self.districts.as_ref();
        SelectionFocus {
            id: id.to_string(),
            viewport: layer.and_then(|l| l.bounds(id)).map(|b| b.pad(SELECTED_PADDING)),
            popup: layer.and_then(|l| l.view(id)).map(DistrictPopup::from),
        }
    }

    /// Map click: selects the district under the coordinate, if any.
    pub fn select_at(&mut self, lon: f64, lat: f64) -> Option<SelectionFocus> {
        let id = self.districts.as_ref()?.id_at(lon, lat)?.to_string();
        Some(self.select(&id))
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.sort = sort;
    }

    pub fn country_view(&self) -> CountryView {
        CountryView {
            viewport: self.country_layer.viewport,
            features: self.country_layer.styled(&self.applied),
        }
    }

    pub fn district_view(&self) -> Vec<StyledDistrict> {
        self.districts.as_ref()
            .map(|l| l.styled(&self.applied, self.selected.as_deref()))
            .unwrap_or_default()
    }

    pub fn panel(&self) -> DistrictPanel {
        let Some(layer) = &self.districts else {
            return DistrictPanel::hidden();
        };

        let cards: Vec<DistrictCard> = search_and_sort(&layer.views, &self.search, self.sort)
            .into_iter()
            .map(|v| DistrictCard {
                id: v.id.clone(),
                name: v.name.clone(),
                score: v.score_text(),
                raw_value: v.raw_text(),
                risk_level: v.risk.clone(),
                active: self.selected.as_deref() == Some(v.id.as_str()),
            })
            .collect();

        DistrictPanel {
            visible: true,
            count: cards.len(),
            subtitle: format!(
                "{} • {} • {}",
                self.applied.country,
                self.applied.sector.label("All sectors"),
                self.applied.metric.replace('_', " ")
            ),
            cards,
        }
    }

    /// Dialog content follows the dropdowns, not the last refresh.
    pub fn score_modal(&self) -> ScoreModal {
        score_modal(&self.staged)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub state: UiState,
    /// Where clients can fetch the raw district file.
    pub district_source: Option<String>,
    pub districts: Option<InstallOutcome>,
}

/// Applies staged filters on a shared session and loads the matching district file.
/// The lock is released while the file is read.
pub async fn refresh_shared(session: &RwLock<MapSession>, config: &AppConfig) -> RefreshReport {
    let request = session.write().await.refresh();

    let (district_source, districts) = match request {
        Some(request) => {
            let path = config.districts_path(&request.country);
            let result = fetch_collection(path).await;
            let outcome = session.write().await.install_districts(request.seq, result);
            (Some(districts_url(&request.country)), Some(outcome))
        }
        None => (None, None),
    };

    let state = session.read().await.applied().clone();
    RefreshReport { state, district_source, districts }
}
