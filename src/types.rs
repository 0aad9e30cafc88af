use geo::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel used by the dropdowns for "no filter".
pub const ALL: &str = "__all__";

pub const DEFAULT_METRIC: &str = "risk_level";

/// A dropdown selection: either everything or one named value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    #[default]
    All,
    Only(String),
}

impl Scope {
    pub fn name(&self) -> Option<&str> {
        match self {
            Scope::All => None,
            Scope::Only(name) => Some(name),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Scope::All)
    }

    /// Display label, substituting `all_label` for the unfiltered case.
    pub fn label<'a>(&'a self, all_label: &'a str) -> &'a str {
        self.name().unwrap_or(all_label)
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        if value.is_empty() || value == ALL {
            Scope::All
        } else {
            Scope::Only(value)
        }
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Scope::from(value.to_string())
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::All => ALL.to_string(),
            Scope::Only(name) => name,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or(ALL))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiState {
    pub country: Scope,
    pub sector: Scope,
    pub metric: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            country: Scope::All,
            sector: Scope::All,
            metric: DEFAULT_METRIC.to_string(),
        }
    }
}

impl UiState {
    pub fn is_risk_metric(&self) -> bool {
        self.metric == DEFAULT_METRIC
    }
}

/// Partial update coming from the dropdowns. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageUpdate {
    pub country: Option<Scope>,
    pub sector: Option<Scope>,
    pub metric: Option<String>,
}

/// Geographic bounds in degrees, serialised the way map clients expect them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Viewport {
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            south: rect.min().y,
            west: rect.min().x,
            north: rect.max().y,
            east: rect.max().x,
        }
    }

    /// Grows each side by `ratio` of the span, like a map library's bounds padding.
    pub fn pad(&self, ratio: f64) -> Self {
        let lat_buffer = (self.north - self.south).abs() * ratio;
        let lon_buffer = (self.east - self.west).abs() * ratio;
        Self {
            south: self.south - lat_buffer,
            west: self.west - lon_buffer,
            north: self.north + lat_buffer,
            east: self.east + lon_buffer,
        }
    }

    pub fn union(&self, other: &Viewport) -> Self {
        Self {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }
}
