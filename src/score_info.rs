use crate::types::UiState;
use serde::Serialize;

/// Baseline/target metadata shown in the score-info dialog.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreInfo {
    pub key: &'static str,
    pub title: &'static str,
    pub scale: &'static str,
    pub baseline_year: Option<u16>,
    pub baseline: Option<f64>,
    pub target_year: Option<u16>,
    pub target: Option<f64>,
    pub notes: &'static str,
}

pub static SCORE_INFO: [ScoreInfo; 3] = [
    ScoreInfo {
        key: "vulnerability_score",
        title: "Vulnerability Score",
        scale: "0–100 (higher = more vulnerable)",
        baseline_year: Some(2020),
        baseline: Some(35.0),
        target_year: Some(2030),
        target: Some(60.0),
        notes: "Update baseline/targets to match your framework.",
    },
    ScoreInfo {
        key: "gender_hotspot_score",
        title: "Gender Hotspot Score",
        scale: "0–100 (higher = more severe hotspot)",
        baseline_year: Some(2020),
        baseline: Some(25.0),
        target_year: Some(2030),
        target: Some(50.0),
        notes: "Replace with agreed thresholds and indicators.",
    },
    ScoreInfo {
        key: "risk_level",
        title: "Risk Level",
        scale: "Categorical: Very Low → Very High",
        baseline_year: Some(2020),
        baseline: None,
        target_year: Some(2030),
        target: None,
        notes: "Risk levels are derived or set from your scoring logic.",
    },
];

static FALLBACK: ScoreInfo = ScoreInfo {
    key: "",
    title: "Score Info",
    scale: "N/A",
    baseline_year: None,
    baseline: None,
    target_year: None,
    target: None,
    notes: "Add baseline/targets here.",
};

pub fn score_info(metric: &str) -> &'static ScoreInfo {
    SCORE_INFO.iter()
        .find(|info| info.key == metric)
        .unwrap_or(&FALLBACK)
}

/// Metric dropdown choices.
pub fn metric_keys() -> Vec<&'static str> {
    SCORE_INFO.iter().map(|info| info.key).collect()
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreModal {
    pub country: String,
    pub sector: String,
    pub metric: &'static str,
    pub scale: &'static str,
    pub baseline_label: String,
    pub baseline: String,
    pub target_label: String,
    pub target: String,
    pub notes: &'static str,
}

pub fn score_modal(state: &UiState) -> ScoreModal {
    let info = score_info(&state.metric);
    ScoreModal {
        country: state.country.to_string(),
        sector: state.sector.label("All sectors").to_string(),
        metric: info.title,
        scale: info.scale,
        baseline_label: format!("Baseline ({})", or_na(info.baseline_year)),
        baseline: or_na(info.baseline),
        target_label: format!("Target ({})", or_na(info.target_year)),
        target: or_na(info.target),
        notes: info.notes,
    }
}
