use crate::metric::resolve_metric;
use crate::properties::as_number;
use crate::types::UiState;
use geojson::JsonObject;
use serde::Serialize;
use serde_json::Value;

pub const VERY_HIGH: &str = "#d73027";
pub const HIGH: &str = "#fc8d59";
pub const MEDIUM: &str = "#fee08b";
pub const LOW: &str = "#d9ef8b";
pub const VERY_LOW: &str = "#1a9850"; // also "unknown"

/// Five-bucket severity scale shared by categorical labels and numeric scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::VeryHigh,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
        RiskLevel::VeryLow,
    ];

    /// Exact (case-sensitive) match on the canonical labels; anything else is the lowest bucket.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Very High" => RiskLevel::VeryHigh,
            "High" => RiskLevel::High,
            "Medium" => RiskLevel::Medium,
            "Low" => RiskLevel::Low,
            _ => RiskLevel::VeryLow,
        }
    }

    /// Thresholds assume a 0-100 score; datasets on another scale must be rescaled by the caller.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::VeryHigh
        } else if score >= 60.0 {
            RiskLevel::High
        } else if score >= 40.0 {
            RiskLevel::Medium
        } else if score >= 20.0 {
            RiskLevel::Low
        } else {
            RiskLevel::VeryLow
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => VERY_HIGH,
            RiskLevel::High => HIGH,
            RiskLevel::Medium => MEDIUM,
            RiskLevel::Low => LOW,
            RiskLevel::VeryLow => VERY_LOW,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Very High",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::VeryLow => "Very Low",
        }
    }
}

pub fn risk_color(label: &str) -> &'static str {
    RiskLevel::from_label(label).color()
}

/// Color for a raw metric value; non-numeric input lands in the lowest bucket.
pub fn numeric_color(value: Option<&Value>) -> &'static str {
    match value.and_then(as_number) {
        Some(n) => RiskLevel::from_score(n).color(),
        None => VERY_LOW,
    }
}

/// Fill for a country polygon under the given filter state.
pub fn fill_color(props: &JsonObject, state: &UiState) -> &'static str {
    let value = resolve_metric(props, &state.sector, &state.metric);
    if state.is_risk_metric() {
        let label = value.and_then(Value::as_str).unwrap_or("");
        risk_color(label)
    } else {
        numeric_color(value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub color: &'static str,
}

pub fn legend() -> Vec<LegendEntry> {
    RiskLevel::ALL.iter()
        .map(|level| LegendEntry {
            label: match level {
                RiskLevel::VeryLow => "Very Low / Unknown",
                other => other.label(),
            },
            color: level.color(),
        })
        .collect()
}

pub fn hex_to_rgb(hex: &str) -> [u8; 3] {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    [channel(0), channel(2), channel(4)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scope;
    use serde_json::json;

    #[test]
    fn categorical_labels_are_case_sensitive() {
        assert_eq!(risk_color("Very High"), VERY_HIGH);
        assert_eq!(risk_color(" High "), HIGH);
        assert_eq!(risk_color("Medium"), MEDIUM);
        assert_eq!(risk_color("Low"), LOW);
        assert_eq!(risk_color("high"), VERY_LOW);
        assert_eq!(risk_color("Very Low"), VERY_LOW);
        assert_eq!(risk_color(""), VERY_LOW);
    }

    #[test]
    fn numeric_thresholds_include_lower_bound() {
        assert_eq!(numeric_color(Some(&json!(80))), VERY_HIGH);
        assert_eq!(numeric_color(Some(&json!(79.99))), HIGH);
        assert_eq!(numeric_color(Some(&json!(60))), HIGH);
        assert_eq!(numeric_color(Some(&json!(40))), MEDIUM);
        assert_eq!(numeric_color(Some(&json!("20"))), LOW);
        assert_eq!(numeric_color(Some(&json!(19.9))), VERY_LOW);
        assert_eq!(numeric_color(Some(&json!("n/a"))), VERY_LOW);
        assert_eq!(numeric_color(None), VERY_LOW);
    }

    #[test]
    fn fill_switches_on_metric_kind() {
        let props = json!({ "risk_level": "High", "vulnerability_score": 85 });
        let props = props.as_object().unwrap();

        let mut state = UiState::default();
        assert_eq!(fill_color(props, &state), HIGH);

        state.metric = "vulnerability_score".into();
        state.sector = Scope::Only("Agriculture".into());
        assert_eq!(fill_color(props, &state), VERY_HIGH);
    }

    #[test]
    fn legend_lists_five_buckets() {
        let entries = legend();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].color, VERY_HIGH);
        assert_eq!(entries[4].label, "Very Low / Unknown");
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(hex_to_rgb("#d73027"), [0xd7, 0x30, 0x27]);
        assert_eq!(hex_to_rgb("zz"), [0, 0, 0]);
    }
}
