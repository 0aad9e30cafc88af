//! Lenient accessors over a feature's properties bag.
//!
//! Feature files come from many hands, so nothing here fails: absent or odd values
//! simply fall through to the next candidate or to a placeholder.

use geojson::JsonObject;
use serde_json::Value;

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNKNOWN: &str = "Unknown";

/// A value that would survive a JavaScript-style `||` chain.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First key whose value is truthy.
pub fn first_truthy<'a>(props: &'a JsonObject, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .find(|v| is_truthy(v))
}

/// First key that is present and not null.
pub fn first_present<'a>(props: &'a JsonObject, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .find(|v| !v.is_null())
}

/// Numeric reading of a value: numbers as-is, numeric strings parsed.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Truthy value as text, else the placeholder.
pub fn text_or(props: &JsonObject, key: &str, placeholder: &str) -> String {
    props.get(key)
        .filter(|v| is_truthy(v))
        .map(display_value)
        .unwrap_or_else(|| placeholder.to_string())
}

/// Array value joined with ", ", else "N/A".
pub fn list_or_na(props: &JsonObject, key: &str) -> String {
    match props.get(key) {
        Some(Value::Array(items)) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// en-US style grouping with at most three fraction digits.
pub fn format_thousands(n: f64) -> String {
    // past 2^53 there is no fraction left and scaling by 1000 would perturb the digits
    let rounded = if n.abs() < 9.0e15 { (n * 1000.0).round() / 1000.0 } else { n };
    let negative = rounded < 0.0;
    let abs = rounded.abs();
    let fraction = format!("{:.3}", abs - abs.trunc());
    let fraction = fraction.trim_start_matches('0').trim_end_matches('0').trim_end_matches('.');

    // {:.0} keeps every integer digit, an integer cast would saturate past u64::MAX
    let digits = format!("{:.0}", abs.trunc());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}{}", if negative { "-" } else { "" }, grouped, fraction)
}

/// Raw-value text used by popups and cards.
pub fn format_count(value: Option<&Value>) -> String {
    value.and_then(as_number)
        .map(format_thousands)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(v: Value) -> JsonObject {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn truthy_chain_skips_empty_and_zero() {
        let p = props(json!({ "district": "", "district_name": 0, "name": "Kisumu" }));
        assert_eq!(first_truthy(&p, &["district", "district_name", "name"]), Some(&json!("Kisumu")));
    }

    #[test]
    fn present_chain_keeps_zero_but_skips_null() {
        let p = props(json!({ "scaled_score": null, "score": 0 }));
        assert_eq!(first_present(&p, &["scaled_score", "score"]), Some(&json!(0)));
        assert_eq!(first_present(&p, &["missing"]), None);
    }

    #[test]
    fn numbers_from_strings() {
        assert_eq!(as_number(&json!(" 42.5 ")), Some(42.5));
        assert_eq!(as_number(&json!("high")), None);
        assert_eq!(as_number(&json!("")), None);
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&json!(7)), Some(7.0));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(1234567.0), "1,234,567");
        assert_eq!(format_thousands(-12345.5), "-12,345.5");
        assert_eq!(format_thousands(1.23456), "1.235");
        assert_eq!(format_thousands(1e20), "100,000,000,000,000,000,000");
        assert_eq!(format_thousands(-2.5e19), "-25,000,000,000,000,000,000");
        assert_eq!(format_count(Some(&json!("n/a"))), "N/A");
        assert_eq!(format_count(None), "N/A");
    }

    #[test]
    fn lists_and_placeholders() {
        let p = props(json!({ "key_industries": ["Tea", "Tourism"], "gdp": "", "population": 5 }));
        assert_eq!(list_or_na(&p, "key_industries"), "Tea, Tourism");
        assert_eq!(list_or_na(&p, "climate_risks"), "N/A");
        assert_eq!(text_or(&p, "gdp", NOT_AVAILABLE), "N/A");
        assert_eq!(text_or(&p, "population", NOT_AVAILABLE), "5");
    }
}
