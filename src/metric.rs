//! Metric lookup across the three property layouts found in the data files:
//!
//! 1. nested per sector: `metrics.Agriculture.vulnerability_score`
//! 2. flat: `vulnerability_score`
//! 3. sector suffix: `vulnerability_score_Agriculture`
//!
//! Strategies are tried in that order and the first non-null hit wins. A flat field
//! therefore shadows a suffixed one even when a sector is selected.

use crate::types::Scope;
use geojson::JsonObject;
use serde_json::Value;

pub struct MetricQuery<'q> {
    pub sector: &'q Scope,
    pub metric: &'q str,
}

pub trait MetricStrategy: Sync {
    fn resolve<'a>(&self, props: &'a JsonObject, query: &MetricQuery<'_>) -> Option<&'a Value>;
}

pub struct NestedSector;
pub struct Flat;
pub struct SectorSuffix;

impl MetricStrategy for NestedSector {
    fn resolve<'a>(&self, props: &'a JsonObject, query: &MetricQuery<'_>) -> Option<&'a Value> {
        let sector = query.sector.name()?;
        props.get("metrics")?
            .get(sector)?
            .get(query.metric)
            .filter(|v| !v.is_null())
    }
}

impl MetricStrategy for Flat {
    fn resolve<'a>(&self, props: &'a JsonObject, query: &MetricQuery<'_>) -> Option<&'a Value> {
        props.get(query.metric).filter(|v| !v.is_null())
    }
}

impl MetricStrategy for SectorSuffix {
    fn resolve<'a>(&self, props: &'a JsonObject, query: &MetricQuery<'_>) -> Option<&'a Value> {
        let sector = query.sector.name()?;
        props.get(&format!("{}_{}", query.metric, sector))
            .filter(|v| !v.is_null())
    }
}

pub static STRATEGIES: [&dyn MetricStrategy; 3] = [&NestedSector, &Flat, &SectorSuffix];

pub fn resolve_metric<'a>(props: &'a JsonObject, sector: &Scope, metric: &str) -> Option<&'a Value> {
    let query = MetricQuery { sector, metric };
    STRATEGIES.iter().find_map(|s| s.resolve(props, &query))
}

/// "vulnerability_score" -> "Vulnerability Score"
pub fn metric_label(metric: &str) -> String {
    let spaced = metric.replace('_', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for c in spaced.chars() {
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}
