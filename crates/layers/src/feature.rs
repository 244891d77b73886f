use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use foundation::bounds::Aabb2;
use foundation::ids::FeatureId;
use foundation::time::Time;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Feature attributes keyed by attribute name.
pub type Properties = BTreeMap<String, Value>;

/// A fetched vector feature. Geometry is reduced to its extent; nothing here
/// renders it.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub fid: FeatureId,
    pub properties: Properties,
    pub extent: Option<Aabb2>,
}

impl Feature {
    pub fn new(fid: impl Into<String>, properties: Properties) -> Self {
        Self {
            fid: FeatureId::new(fid),
            properties,
            extent: None,
        }
    }

    pub fn with_extent(mut self, extent: Aabb2) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.properties.get(attr)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    Number,
    Boolean,
    DateTime,
    Geometry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttributeKind,
}

/// Attribute schema reported by a feature service's describe call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub attributes: Vec<AttributeDef>,
}

impl Schema {
    pub fn new(attributes: impl IntoIterator<Item = (&'static str, AttributeKind)>) -> Self {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(name, kind)| AttributeDef {
                    name: name.to_string(),
                    kind,
                })
                .collect(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<AttributeKind> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.kind)
    }

    /// Every attribute except geometry, in schema order.
    pub fn property_names(&self) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|a| a.kind != AttributeKind::Geometry)
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn first_string_attribute(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.kind == AttributeKind::String)
            .map(|a| a.name.as_str())
    }
}

/// Parse an attribute value as a point in time.
///
/// Numbers are epoch milliseconds. Strings may be RFC 3339, a naive
/// `YYYY-MM-DD[ T]HH:MM:SS` (taken as UTC), a plain `YYYY-MM-DD` date or a
/// numeric string. Empty strings and nulls yield `None`.
pub fn parse_time(value: &Value) -> Option<Time> {
    match value {
        Value::Number(n) => n.as_f64().map(Time),
        Value::String(s) => parse_time_str(s.trim()),
        _ => None,
    }
}

fn parse_time_str(s: &str) -> Option<Time> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Time(dt.timestamp_millis() as f64));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Time(dt.and_utc().timestamp_millis() as f64));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d
            .and_hms_opt(0, 0, 0)
            .map(|dt| Time(dt.and_utc().timestamp_millis() as f64));
    }
    s.parse::<f64>().ok().map(Time)
}

/// Coerce a gating attribute to a boolean.
///
/// Accepts booleans, `"true"`/`"false"` (any case) and numbers (non-zero is
/// true). Anything else, including a missing value, is false.
pub fn coerce_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s.parse::<f64>().is_ok_and(|n| n != 0.0)
        }
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeKind, Schema, coerce_flag, parse_time};
    use foundation::time::{DAY_MS, Time};
    use serde_json::json;

    #[test]
    fn parses_common_date_shapes() {
        assert_eq!(parse_time(&json!(1234)), Some(Time(1234.0)));
        assert_eq!(parse_time(&json!("1970-01-02")), Some(Time(DAY_MS)));
        assert_eq!(
            parse_time(&json!("1970-01-02T00:00:00+00:00")),
            Some(Time(DAY_MS))
        );
        assert_eq!(parse_time(&json!("1970-01-01 00:00:01")), Some(Time(1000.0)));
        assert_eq!(parse_time(&json!("")), None);
        assert_eq!(parse_time(&json!(null)), None);
        assert_eq!(parse_time(&json!("yesterday")), None);
    }

    #[test]
    fn flag_coercion() {
        assert!(coerce_flag(Some(&json!(true))));
        assert!(coerce_flag(Some(&json!("TRUE"))));
        assert!(coerce_flag(Some(&json!(1))));
        assert!(!coerce_flag(Some(&json!("false"))));
        assert!(!coerce_flag(Some(&json!(0))));
        assert!(!coerce_flag(None));
    }

    #[test]
    fn projection_skips_geometry() {
        let schema = Schema::new([
            ("the_geom", AttributeKind::Geometry),
            ("start", AttributeKind::DateTime),
            ("name", AttributeKind::String),
        ]);
        assert_eq!(schema.property_names(), vec!["start", "name"]);
        assert_eq!(schema.first_string_attribute(), Some("name"));
    }
}
