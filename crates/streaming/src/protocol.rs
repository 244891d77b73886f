//! Feature-fetch protocol consumed by the synchronization engine.
//!
//! A protocol answers three kinds of request for one feature layer:
//! - `describe`: the attribute schema
//! - `count`: hits only, no features (the gate's pre-check)
//! - `fetch`: full results, projected to a property-name list
//!
//! Transport is the implementor's business (WFS over HTTP, a local store, ...).

use foundation::bounds::Aabb2;
use foundation::future::BoxFuture;
use layers::feature::{Feature, Schema};
use layers::filter::Filter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Whether a query returns matching features or only their number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Hits,
    Results,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureQuery {
    pub result_type: ResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// `[min_x, min_y, max_x, max_y]` in map coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    /// Empty means every attribute.
    #[serde(default)]
    pub property_names: Vec<String>,
}

impl FeatureQuery {
    pub fn hits(filter: Option<Filter>, bbox: Option<Aabb2>) -> Self {
        Self {
            result_type: ResultType::Hits,
            filter,
            bbox: bbox.map(bbox_array),
            property_names: Vec::new(),
        }
    }

    pub fn results(filter: Option<Filter>, bbox: Option<Aabb2>, property_names: Vec<String>) -> Self {
        Self {
            result_type: ResultType::Results,
            filter,
            bbox: bbox.map(bbox_array),
            property_names,
        }
    }

    pub fn bbox(&self) -> Option<Aabb2> {
        self.bbox
            .map(|[x0, y0, x1, y1]| Aabb2::new([x0, y0], [x1, y1]))
    }
}

fn bbox_array(b: Aabb2) -> [f64; 4] {
    [b.min[0], b.min[1], b.max[0], b.max[1]]
}

/// Raw `numberOfFeatures` value of a hits response.
///
/// Services are not trusted to send a number; the gate checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitCount(pub Value);

impl HitCount {
    pub fn new(n: u64) -> Self {
        HitCount(Value::from(n))
    }

    /// The count, if the service sent a non-negative integer (or a string of one).
    pub fn number_of_features(&self) -> Option<u64> {
        match &self.0 {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("transport failed: {message}")]
    Transport { message: String },
    #[error("hit count is not a number: {found}")]
    NonNumericCount { found: String },
    #[error("malformed response: {message}")]
    Decode { message: String },
}

impl ProtocolError {
    pub fn transport(message: impl Into<String>) -> Self {
        ProtocolError::Transport {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Decode {
            message: e.to_string(),
        }
    }
}

/// Feature-fetch protocol for one layer.
///
/// Methods return boxed futures for dyn-compatibility; implementations may
/// hold `Rc` state since the engine is single-threaded.
pub trait FeatureProtocol {
    fn describe(&self) -> BoxFuture<'_, Result<Schema, ProtocolError>>;

    /// Hits-only query (`query.result_type == Hits`).
    fn count(&self, query: FeatureQuery) -> BoxFuture<'_, Result<HitCount, ProtocolError>>;

    /// Full query (`query.result_type == Results`).
    fn fetch(&self, query: FeatureQuery) -> BoxFuture<'_, Result<Vec<Feature>, ProtocolError>>;
}

#[cfg(test)]
mod tests {
    use super::{FeatureQuery, HitCount, ResultType};
    use foundation::bounds::Aabb2;
    use serde_json::json;

    #[test]
    fn hit_count_accepts_only_integers() {
        assert_eq!(HitCount(json!(120)).number_of_features(), Some(120));
        assert_eq!(HitCount(json!("450")).number_of_features(), Some(450));
        assert_eq!(HitCount(json!(12.0)).number_of_features(), Some(12));
        assert_eq!(HitCount(json!(1.5)).number_of_features(), None);
        assert_eq!(HitCount(json!(-3)).number_of_features(), None);
        assert_eq!(HitCount(json!("n/a")).number_of_features(), None);
        assert_eq!(HitCount(json!(null)).number_of_features(), None);
    }

    #[test]
    fn hits_query_wire_shape() {
        let q = FeatureQuery::hits(None, Some(Aabb2::new([0.0, 1.0], [2.0, 3.0])));
        let v = serde_json::to_value(&q).expect("serialize");
        assert_eq!(v["result_type"], "hits");
        assert_eq!(v["bbox"], json!([0.0, 1.0, 2.0, 3.0]));
        assert!(v.get("filter").is_none());
        assert_eq!(q.result_type, ResultType::Hits);
        assert_eq!(q.bbox(), Some(Aabb2::new([0.0, 1.0], [2.0, 3.0])));
    }
}
