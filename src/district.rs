use crate::color::{risk_color, RiskLevel, VERY_LOW};
use crate::index::{feature_bounds, to_multipolygon, FeatureIndex};
use crate::metric::resolve_metric;
use crate::properties::{as_number, display_value, first_present, first_truthy, format_count, NOT_AVAILABLE, UNKNOWN};
use crate::types::{UiState, Viewport};
use geo::algorithm::centroid::Centroid;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hasher;

const NAME_FIELDS: [&str; 5] = ["district", "district_name", "name", "ADM2_EN", "ADM2_NAME"];
const ID_FIELDS: [&str; 4] = ["id", "district_id", "ADM2_PCODE", "ADM2_CODE"];
const SCORE_FIELDS: [&str; 3] = ["scaled_score", "score", "scaledScore"];
const RAW_FIELDS: [&str; 3] = ["raw_value", "rawValue", "value"];
const RISK_FIELDS: [&str; 2] = ["risk_level", "riskLevel"];

pub const SELECTED_PADDING: f64 = 0.12;

/// "Côte d'Ivoire" -> "c_te_d_ivoire", "Sao Tome & Principe" -> "sao_tome_and_principe"
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace('&', "and");
    let mut slug = String::with_capacity(lowered.len());
    let mut in_gap = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push('_');
            in_gap = true;
        }
    }
    slug.trim_matches('_').to_string()
}

/// URL the district file is served under.
pub fn districts_url(country: &str) -> String {
    format!("/data/{}_districts.geojson", slugify(country))
}

pub fn district_name(props: &JsonObject) -> String {
    first_truthy(props, &NAME_FIELDS)
        .map(display_value)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Stable identity: an explicit id field, the GeoJSON feature id, the district name,
/// or for nameless districts a key derived from the polygon centroid.
pub fn district_id(feature: &Feature, props: &JsonObject, name: &str) -> String {
    if let Some(id) = first_truthy(props, &ID_FIELDS) {
        return display_value(id);
    }
    if let Some(id) = &feature.id {
        return match id {
            geojson::feature::Id::String(s) => s.clone(),
            geojson::feature::Id::Number(n) => n.to_string(),
        };
    }
    if first_truthy(props, &NAME_FIELDS).is_some() {
        return name.to_string();
    }
    derived_id(feature, name)
}

/// `<slug>-<fnv1a(name, centroid rounded to 1e-6)>`, the same on every reload.
pub fn derived_id(feature: &Feature, name: &str) -> String {
    let mut hasher = FnvHasher::new();
    hasher.write(name.as_bytes());
    if let Some(centroid) = to_multipolygon(feature).and_then(|mp| mp.centroid()) {
        hasher.write_i64((centroid.x() * 1e6).round() as i64);
        hasher.write_i64((centroid.y() * 1e6).round() as i64);
    }
    format!("{}-{:016x}", slugify(name), hasher.finish())
}

/// Deterministic FNV-1a 64-bit hasher; `DefaultHasher` is seeded per process.
struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    fn new() -> Self {
        Self { state: Self::OFFSET_BASIS }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Explicit scaled score, else the currently selected metric if it is numeric.
pub fn district_score(props: &JsonObject, state: &UiState) -> Option<f64> {
    if let Some(direct) = first_present(props, &SCORE_FIELDS).and_then(as_number) {
        return Some(direct);
    }
    resolve_metric(props, &state.sector, &state.metric).and_then(as_number)
}

pub fn district_raw_value(props: &JsonObject) -> Option<Value> {
    first_present(props, &RAW_FIELDS).cloned()
}

pub fn district_risk(props: &JsonObject, score: Option<f64>) -> String {
    if let Some(explicit) = first_truthy(props, &RISK_FIELDS) {
        return display_value(explicit);
    }
    match score {
        Some(n) => RiskLevel::from_score(n).label().to_string(),
        None => UNKNOWN.to_string(),
    }
}

/// Ordinal used by the risk sorts; unrecognised labels rank 0.
pub fn risk_order(risk: &str) -> u8 {
    let r = risk.trim().to_lowercase();
    if r.contains("very low") {
        1
    } else if r.contains("very high") {
        5
    } else if r.contains("low") {
        2
    } else if r.contains("medium") {
        3
    } else if r.contains("high") {
        4
    } else {
        0
    }
}

/// Derived per-feature view shared by the map layer, popups and panel cards.
#[derive(Debug, Clone, Serialize)]
pub struct DistrictView {
    pub id: String,
    pub name: String,
    pub score: Option<f64>,
    pub raw: Option<Value>,
    pub risk: String,
    #[serde(skip)]
    pub feature_index: usize,
}

impl DistrictView {
    pub fn from_feature(feature_index: usize, feature: &Feature, state: &UiState) -> Self {
        let props = feature.properties.clone().unwrap_or_default();
        let name = district_name(&props);
        let id = district_id(feature, &props, &name);
        let score = district_score(&props, state);
        let raw = district_raw_value(&props);
        let risk = district_risk(&props, score);
        Self { id, name, score, raw, risk, feature_index }
    }

    pub fn score_text(&self) -> String {
        self.score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn raw_text(&self) -> String {
        format_count(self.raw.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    NameAsc,
    ScoreAsc,
    ScoreDesc,
    RiskAsc,
    RiskDesc,
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name_asc" => Ok(SortMode::NameAsc),
            "score_asc" => Ok(SortMode::ScoreAsc),
            "score_desc" => Ok(SortMode::ScoreDesc),
            "risk_asc" => Ok(SortMode::RiskAsc),
            "risk_desc" => Ok(SortMode::RiskDesc),
            other => Err(format!("unknown sort mode: {}", other)),
        }
    }
}

impl SortMode {
    fn compare(self, a: &DistrictView, b: &DistrictView) -> Ordering {
        match self {
            SortMode::NameAsc => a.name.to_lowercase().cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
            // missing scores sink to the end in both directions
            SortMode::ScoreAsc => a.score.unwrap_or(f64::INFINITY)
                .total_cmp(&b.score.unwrap_or(f64::INFINITY)),
            SortMode::ScoreDesc => b.score.unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&a.score.unwrap_or(f64::NEG_INFINITY)),
            SortMode::RiskAsc => risk_order(&a.risk).cmp(&risk_order(&b.risk)),
            SortMode::RiskDesc => risk_order(&b.risk).cmp(&risk_order(&a.risk)),
        }
    }
}

/// Case-insensitive substring search on the display name, then a stable sort.
pub fn search_and_sort<'a>(views: &'a [DistrictView], query: &str, sort: SortMode) -> Vec<&'a DistrictView> {
    let q = query.trim().to_lowercase();
    let mut rows: Vec<&DistrictView> = views.iter()
        .filter(|v| v.name.to_lowercase().contains(&q))
        .collect();
    rows.sort_by(|a, b| sort.compare(a, b));
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictStyle {
    pub color: &'static str,
    pub weight: f64,
    pub fill_color: &'static str,
    pub fill_opacity: f64,
}

pub fn district_style(view: &DistrictView, state: &UiState, selected: bool) -> DistrictStyle {
    let fill_color = if state.is_risk_metric() {
        risk_color(&view.risk)
    } else {
        match view.score {
            Some(s) => RiskLevel::from_score(s).color(),
            None => VERY_LOW,
        }
    };

    DistrictStyle {
        color: if selected { "#2563eb" } else { "#6b7280" },
        weight: if selected { 3.0 } else { 1.1 },
        fill_color,
        fill_opacity: if selected { 0.85 } else { 0.65 },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictPopup {
    pub name: String,
    pub scaled_score: String,
    pub raw_value: String,
    pub risk_level: String,
}

impl From<&DistrictView> for DistrictPopup {
    fn from(view: &DistrictView) -> Self {
        Self {
            name: view.name.clone(),
            scaled_score: view.score_text(),
            raw_value: view.raw_text(),
            risk_level: view.risk.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StyledDistrict {
    pub id: String,
    pub geometry: Option<geojson::Geometry>,
    pub style: DistrictStyle,
    pub popup: DistrictPopup,
}

/// One country's districts as rendered: the features, their derived views and the
/// id -> feature lookup used for click-to-select. Replaced wholesale on each load.
pub struct DistrictLayer {
    pub features: Vec<Feature>,
    pub views: Vec<DistrictView>,
    by_id: HashMap<String, usize>,
    index: FeatureIndex,
}

/// Districts identified only by a shared name get derived ids instead, so each
/// one stays selectable.
fn disambiguate_names(views: &mut [DistrictView], features: &[Feature]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in views.iter() {
        *counts.entry(v.id.as_str()).or_default() += 1;
    }
    let shared: Vec<usize> = views.iter().enumerate()
        .filter(|(_, v)| v.id == v.name && counts.get(v.id.as_str()).copied().unwrap_or(0) > 1)
        .map(|(i, _)| i)
        .collect();
    for i in shared {
        let feature = &features[views[i].feature_index];
        views[i].id = derived_id(feature, &views[i].name);
    }
}

impl DistrictLayer {
    pub fn build(collection: FeatureCollection, state: &UiState) -> Self {
        let features = collection.features;
        let mut views: Vec<DistrictView> = features.iter().enumerate()
            .map(|(i, f)| DistrictView::from_feature(i, f, state))
            .collect();
        disambiguate_names(&mut views, &features);
        // remaining duplicate ids resolve to the last feature, as the layer index is overwritten in order
        let by_id = views.iter().enumerate()
            .map(|(i, v)| (v.id.clone(), i))
            .collect();
        let index = FeatureIndex::build(&features);
        Self { features, views, by_id, index }
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn view(&self, id: &str) -> Option<&DistrictView> {
        self.by_id.get(id).map(|&i| &self.views[i])
    }

    pub fn bounds(&self, id: &str) -> Option<Viewport> {
        let view = self.view(id)?;
        feature_bounds(&self.features[view.feature_index])
    }

    /// Position (in `views`) of the district under a coordinate.
    pub fn index_at(&self, lon: f64, lat: f64) -> Option<usize> {
        self.index.locate(lon, lat)
    }

    /// District under a clicked coordinate.
    pub fn id_at(&self, lon: f64, lat: f64) -> Option<&str> {
        let i = self.index_at(lon, lat)?;
        Some(self.views[i].id.as_str())
    }

    pub fn styled(&self, state: &UiState, selected: Option<&str>) -> Vec<StyledDistrict> {
        self.views.iter().map(|v| {
            let is_selected = selected == Some(v.id.as_str());
            StyledDistrict {
                id: v.id.clone(),
                geometry: self.features[v.feature_index].geometry.clone(),
                style: district_style(v, state, is_selected),
                popup: DistrictPopup::from(v),
            }
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{HIGH, MEDIUM, VERY_HIGH};
    use crate::index::tests::square;
    use crate::types::Scope;
    use serde_json::json;

    fn view(name: &str, score: Option<f64>, risk: &str) -> DistrictView {
        DistrictView {
            id: name.to_lowercase(),
            name: name.to_string(),
            score,
            raw: None,
            risk: risk.to_string(),
            feature_index: 0,
        }
    }

    fn names(rows: &[&DistrictView]) -> Vec<String> {
        rows.iter().map(|v| v.name.clone()).collect()
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Kenya"), "kenya");
        assert_eq!(slugify("  Sao Tome & Principe "), "sao_tome_and_principe");
        assert_eq!(slugify("Guinea-Bissau"), "guinea_bissau");
        assert_eq!(slugify("--Congo (DRC)--"), "congo_drc");
        assert_eq!(districts_url("South Sudan"), "/data/south_sudan_districts.geojson");
    }

    #[test]
    fn name_fallback_chain() {
        let p = json!({ "district": "", "ADM2_EN": "Turkana" });
        assert_eq!(district_name(p.as_object().unwrap()), "Turkana");
        assert_eq!(district_name(&JsonObject::new()), "Unknown");
    }

    #[test]
    fn ids_prefer_explicit_fields() {
        let f = square(json!({ "ADM2_PCODE": "KE023", "name": "Turkana" }), 0.0, 0.0, 1.0);
        let props = f.properties.clone().unwrap();
        assert_eq!(district_id(&f, &props, "Turkana"), "KE023");
    }

    #[test]
    fn ids_fall_back_to_the_name() {
        let f = square(json!({ "name": "Nairobi" }), 0.0, 0.0, 1.0);
        let props = f.properties.clone().unwrap();
        assert_eq!(district_id(&f, &props, &district_name(&props)), "Nairobi");

        let mut f = square(json!({ "name": "Nairobi" }), 0.0, 0.0, 1.0);
        f.id = Some(geojson::feature::Id::Number(47.into()));
        assert_eq!(district_id(&f, &props, "Nairobi"), "47");
    }

    #[test]
    fn nameless_ids_are_stable_and_distinguish_geometry() {
        let a = square(json!({ "score": 10 }), 0.0, 0.0, 1.0);
        let b = square(json!({ "score": 10 }), 5.0, 5.0, 1.0);
        let props = a.properties.clone().unwrap();
        let name = district_name(&props);
        let id_a = district_id(&a, &props, &name);
        assert_eq!(id_a, district_id(&a.clone(), &props, &name));
        assert!(id_a.starts_with("unknown-"));
        assert_eq!(id_a.len(), "unknown-".len() + 16);
        assert_ne!(id_a, district_id(&b, &props, &name));
    }

    #[test]
    fn fnv_hasher_matches_reference_vectors() {
        let hash = |bytes: &[u8]| {
            let mut h = FnvHasher::new();
            h.write(bytes);
            h.finish()
        };
        assert_eq!(hash(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(hash(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(hash(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn same_named_districts_stay_selectable() {
        let layer = DistrictLayer::build(FeatureCollection {
            bbox: None,
            features: vec![
                square(json!({ "name": "Central" }), 0.0, 0.0, 1.0),
                square(json!({ "name": "Central" }), 5.0, 5.0, 1.0),
                square(json!({ "name": "Coast" }), 10.0, 10.0, 1.0),
            ],
            foreign_members: None,
        }, &UiState::default());

        assert_eq!(layer.len(), 3);
        assert!(layer.view("Coast").is_some());
        assert!(layer.view("Central").is_none());
        let west = layer.id_at(0.5, 0.5).unwrap().to_string();
        let east = layer.id_at(5.5, 5.5).unwrap().to_string();
        assert!(west.starts_with("central-"));
        assert_ne!(west, east);
        assert_eq!(layer.view(&west).unwrap().name, "Central");
    }

    #[test]
    fn score_prefers_explicit_then_metric() {
        let state = UiState { metric: "vulnerability_score".into(), ..UiState::default() };
        let p = json!({ "scaled_score": null, "score": "61.5", "vulnerability_score": 12 });
        assert_eq!(district_score(p.as_object().unwrap(), &state), Some(61.5));

        let p = json!({ "score": "n/a", "vulnerability_score": 12 });
        assert_eq!(district_score(p.as_object().unwrap(), &state), Some(12.0));

        let p = json!({ "risk_level": "High" });
        assert_eq!(district_score(p.as_object().unwrap(), &UiState::default()), None);
    }

    #[test]
    fn risk_is_explicit_or_derived() {
        let p = json!({ "riskLevel": "Medium" });
        assert_eq!(district_risk(p.as_object().unwrap(), Some(95.0)), "Medium");
        assert_eq!(district_risk(&JsonObject::new(), Some(95.0)), "Very High");
        assert_eq!(district_risk(&JsonObject::new(), Some(5.0)), "Very Low");
        assert_eq!(district_risk(&JsonObject::new(), None), "Unknown");
    }

    #[test]
    fn risk_ordinals() {
        assert_eq!(risk_order("Very Low"), 1);
        assert_eq!(risk_order("low"), 2);
        assert_eq!(risk_order("Medium"), 3);
        assert_eq!(risk_order("HIGH"), 4);
        assert_eq!(risk_order("Very High"), 5);
        assert_eq!(risk_order("Unknown"), 0);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let views = vec![view("Nairobi", None, ""), view("Mombasa", None, ""), view("Nakuru", None, "")];
        assert_eq!(names(&search_and_sort(&views, "  NA ", SortMode::NameAsc)), vec!["Nairobi", "Nakuru"]);
        assert_eq!(search_and_sort(&views, "", SortMode::NameAsc).len(), 3);
        assert!(search_and_sort(&views, "xyz", SortMode::NameAsc).is_empty());
    }

    #[test]
    fn missing_scores_sort_last_both_ways() {
        let views = vec![view("A", Some(10.0), ""), view("B", None, ""), view("C", Some(90.0), "")];
        assert_eq!(names(&search_and_sort(&views, "", SortMode::ScoreDesc)), vec!["C", "A", "B"]);
        assert_eq!(names(&search_and_sort(&views, "", SortMode::ScoreAsc)), vec!["A", "C", "B"]);
    }

    #[test]
    fn risk_sorts_use_ordinals() {
        let views = vec![view("A", None, "High"), view("B", None, "Very Low"), view("C", None, "Very High")];
        assert_eq!(names(&search_and_sort(&views, "", SortMode::RiskDesc)), vec!["C", "A", "B"]);
        assert_eq!(names(&search_and_sort(&views, "", SortMode::RiskAsc)), vec!["B", "A", "C"]);
    }

    #[test]
    fn sort_mode_parsing() {
        assert_eq!("score_desc".parse::<SortMode>(), Ok(SortMode::ScoreDesc));
        assert!("random".parse::<SortMode>().is_err());
        assert_eq!(SortMode::default(), SortMode::NameAsc);
    }

    #[test]
    fn layer_styles_selection_and_metric() {
        let fc = FeatureCollection {
            bbox: None,
            features: vec![
                square(json!({ "id": "d1", "name": "One", "risk_level": "High", "score": 45 }), 0.0, 0.0, 1.0),
                square(json!({ "id": "d2", "name": "Two", "raw_value": 1234567 }), 1.0, 0.0, 1.0),
            ],
            foreign_members: None,
        };
        let mut state = UiState::default();
        let layer = DistrictLayer::build(fc, &state);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.id_at(1.5, 0.5), Some("d2"));
        assert_eq!(layer.view("d2").unwrap().raw_text(), "1,234,567");

        let styled = layer.styled(&state, Some("d1"));
        assert_eq!(styled[0].style.fill_color, HIGH);
        assert_eq!(styled[0].style.color, "#2563eb");
        assert_eq!(styled[0].style.weight, 3.0);
        assert_eq!(styled[1].style.color, "#6b7280");
        assert_eq!(styled[1].popup.scaled_score, "N/A");
        assert_eq!(styled[1].popup.risk_level, "Unknown");

        state.metric = "vulnerability_score".into();
        state.sector = Scope::Only("Water".into());
        let styled = layer.styled(&state, None);
        assert_eq!(styled[0].style.fill_color, MEDIUM);
        assert_eq!(styled[0].popup.scaled_score, "45.0");
        assert_ne!(styled[0].style.fill_color, VERY_HIGH);
    }
}
