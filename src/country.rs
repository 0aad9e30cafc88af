use crate::color::fill_color;
use crate::index::{collection_bounds, feature_bounds, FeatureIndex};
use crate::metric::{metric_label, resolve_metric};
use crate::properties::{display_value, list_or_na, text_or, NOT_AVAILABLE, UNKNOWN};
use crate::types::{Scope, UiState, Viewport};
use geojson::{Feature, JsonObject};
use serde::Serialize;
use std::collections::BTreeSet;

const ALL_PADDING: f64 = 0.08;
const COUNTRY_PADDING: f64 = 0.10;

/// Expandable "Read More" rows: (label, property key).
const DETAIL_FIELDS: [(&str, &str); 7] = [
    ("Key Industries", "key_industries"),
    ("Climate Risks", "climate_risks"),
    ("Gendered Climate Impact", "gendered_climate_impact"),
    ("Vulnerable Sectors", "vulnerable_sectors"),
    ("Government Initiatives", "government_initiatives"),
    ("International Partners", "international_partners"),
    ("Key Challenges", "key_challenges"),
];

fn props_of(feature: &Feature) -> JsonObject {
    feature.properties.clone().unwrap_or_default()
}

fn country_name(feature: &Feature) -> Option<String> {
    feature.properties.as_ref()?
        .get("name")
        .filter(|v| !v.is_null())
        .map(display_value)
        .filter(|s| !s.is_empty())
}

pub fn unique_countries(features: &[Feature]) -> Vec<String> {
    features.iter()
        .filter_map(country_name)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sectors from `sector`, `sectors[]` and the keys of the nested `metrics` object.
pub fn unique_sectors(features: &[Feature]) -> Vec<String> {
    let mut set = BTreeSet::new();
    for props in features.iter().filter_map(|f| f.properties.as_ref()) {
        if let Some(sector) = props.get("sector").and_then(|v| v.as_str()) {
            if !sector.is_empty() {
                set.insert(sector.to_string());
            }
        }
        if let Some(sectors) = props.get("sectors").and_then(|v| v.as_array()) {
            for s in sectors.iter().filter_map(|s| s.as_str()).filter(|s| !s.is_empty()) {
                set.insert(s.to_string());
            }
        }
        if let Some(metrics) = props.get("metrics").and_then(|v| v.as_object()) {
            set.extend(metrics.keys().cloned());
        }
    }
    set.into_iter().collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryStyle {
    pub color: &'static str,
    pub weight: f64,
    pub fill_color: &'static str,
    pub fill_opacity: f64,
}

pub fn country_style(props: &JsonObject, state: &UiState) -> CountryStyle {
    CountryStyle {
        color: "#555",
        weight: 1.2,
        fill_color: fill_color(props, state),
        fill_opacity: 0.75,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryPopup {
    pub name: String,
    pub sector: String,
    pub metric_label: String,
    pub metric_value: String,
    pub risk_level: String,
    pub details: Vec<DetailRow>,
}

pub fn country_popup(props: &JsonObject, state: &UiState) -> CountryPopup {
    let metric_value = resolve_metric(props, &state.sector, &state.metric)
        .map(display_value)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let mut details = vec![
        DetailRow { label: "Population", value: text_or(props, "population", NOT_AVAILABLE) },
        DetailRow { label: "GDP", value: text_or(props, "gdp", NOT_AVAILABLE) },
    ];
    details.extend(DETAIL_FIELDS.iter().map(|&(label, key)| DetailRow {
        label,
        value: list_or_na(props, key),
    }));

    CountryPopup {
        name: text_or(props, "name", UNKNOWN),
        sector: state.sector.label("All Sectors").to_string(),
        metric_label: metric_label(&state.metric),
        metric_value,
        risk_level: text_or(props, "risk_level", UNKNOWN),
        details,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StyledCountry {
    pub name: Option<String>,
    pub geometry: Option<geojson::Geometry>,
    pub style: CountryStyle,
    pub popup: CountryPopup,
}

/// The rendered country polygons for one applied filter state. Rebuilt wholesale on every refresh.
pub struct CountryLayer {
    pub features: Vec<Feature>,
    pub viewport: Option<Viewport>,
    pub index: FeatureIndex,
}

pub fn filter_countries<'a>(features: &'a [Feature], country: &Scope) -> Vec<&'a Feature> {
    features.iter()
        .filter(|f| match country.name() {
            None => true,
            Some(name) => country_name(f).as_deref() == Some(name),
        })
        .collect()
}

impl CountryLayer {
    pub fn build(all: &[Feature], state: &UiState) -> Self {
        let features: Vec<Feature> = filter_countries(all, &state.country)
            .into_iter()
            .cloned()
            .collect();

        let viewport = match state.country.name() {
            None => collection_bounds(&features).map(|b| b.pad(ALL_PADDING)),
            // last match wins if a name is repeated
            Some(name) => features.iter()
                .filter(|f| country_name(f).as_deref() == Some(name))
                .filter_map(feature_bounds)
                .last()
                .map(|b| b.pad(COUNTRY_PADDING)),
        };

        let index = FeatureIndex::build(&features);
        Self { features, viewport, index }
    }

    pub fn styled(&self, state: &UiState) -> Vec<StyledCountry> {
        self.features.iter().map(|f| {
            let props = props_of(f);
            StyledCountry {
                name: country_name(f),
                geometry: f.geometry.clone(),
                style: country_style(&props, state),
                popup: country_popup(&props, state),
            }
        }).collect()
    }
}
