use std::cell::{Cell, RefCell};

use layers::feature::{Feature, Schema};
use serde_json::Value;

use foundation::future::BoxFuture;

use crate::protocol::{FeatureProtocol, FeatureQuery, HitCount, ProtocolError};

/// In-memory feature source.
///
/// Evaluates filters and bounding boxes locally. Features without an extent
/// are not spatial and pass any bbox. Useful for preloaded datasets and for
/// driving the engine in tests.
#[derive(Debug, Default)]
pub struct MemoryProtocol {
    schema: Schema,
    features: RefCell<Vec<Feature>>,
    count_override: RefCell<Option<Value>>,
    fail_with: RefCell<Option<String>>,
    count_calls: Cell<usize>,
    fetch_calls: Cell<usize>,
}

impl MemoryProtocol {
    pub fn new(schema: Schema, features: Vec<Feature>) -> Self {
        Self {
            schema,
            features: RefCell::new(features),
            ..Self::default()
        }
    }

    pub fn push(&self, feature: Feature) {
        self.features.borrow_mut().push(feature);
    }

    /// Answer hits queries with `value` instead of counting.
    pub fn set_count_override(&self, value: Option<Value>) {
        *self.count_override.borrow_mut() = value;
    }

    /// Fail every request with a transport error.
    pub fn set_failure(&self, message: Option<&str>) {
        *self.fail_with.borrow_mut() = message.map(str::to_string);
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.get()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.get()
    }

    fn check_failure(&self) -> Result<(), ProtocolError> {
        match self.fail_with.borrow().as_ref() {
            Some(message) => Err(ProtocolError::transport(message.clone())),
            None => Ok(()),
        }
    }

    fn select(&self, query: &FeatureQuery) -> Vec<Feature> {
        let bbox = query.bbox();
        self.features
            .borrow()
            .iter()
            .filter(|f| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(&f.properties))
            })
            .filter(|f| match (bbox, f.extent) {
                (Some(b), Some(extent)) => b.intersects(&extent),
                _ => true,
            })
            .cloned()
            .collect()
    }
}

impl FeatureProtocol for MemoryProtocol {
    fn describe(&self) -> BoxFuture<'_, Result<Schema, ProtocolError>> {
        Box::pin(async move {
            self.check_failure()?;
            Ok(self.schema.clone())
        })
    }

    fn count(&self, query: FeatureQuery) -> BoxFuture<'_, Result<HitCount, ProtocolError>> {
        self.count_calls.set(self.count_calls.get() + 1);
        Box::pin(async move {
            self.check_failure()?;
            if let Some(value) = self.count_override.borrow().clone() {
                return Ok(HitCount(value));
            }
            Ok(HitCount::new(self.select(&query).len() as u64))
        })
    }

    fn fetch(&self, query: FeatureQuery) -> BoxFuture<'_, Result<Vec<Feature>, ProtocolError>> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        Box::pin(async move {
            self.check_failure()?;
            let mut selected = self.select(&query);
            if !query.property_names.is_empty() {
                for f in &mut selected {
                    f.properties
                        .retain(|k, _| query.property_names.iter().any(|p| p == k));
                }
            }
            Ok(selected)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryProtocol;
    use crate::protocol::{FeatureProtocol, FeatureQuery};
    use foundation::bounds::Aabb2;
    use layers::feature::{AttributeKind, Feature, Schema};
    use layers::filter::{CompareOp, Filter};
    use serde_json::json;

    fn source() -> MemoryProtocol {
        let schema = Schema::new([
            ("start", AttributeKind::DateTime),
            ("name", AttributeKind::String),
            ("size", AttributeKind::Number),
        ]);
        let mut features = Vec::new();
        for i in 0..4 {
            let props = [
                ("start".to_string(), json!(i * 10)),
                ("name".to_string(), json!(format!("f{i}"))),
                ("size".to_string(), json!(i)),
            ]
            .into_iter()
            .collect();
            let x = i as f64 * 10.0;
            features.push(
                Feature::new(format!("f.{i}"), props).with_extent(Aabb2::new([x, 0.0], [x + 1.0, 1.0])),
            );
        }
        MemoryProtocol::new(schema, features)
    }

    #[tokio::test]
    async fn count_applies_filter_and_bbox() {
        let src = source();
        let q = FeatureQuery::hits(
            Some(Filter::compare("size", CompareOp::Ge, 1)),
            Some(Aabb2::new([0.0, 0.0], [25.0, 1.0])),
        );
        let hits = src.count(q).await.expect("count");
        assert_eq!(hits.number_of_features(), Some(2));
        assert_eq!(src.count_calls(), 1);
    }

    #[tokio::test]
    async fn fetch_projects_properties() {
        let src = source();
        let q = FeatureQuery::results(None, None, vec!["name".into()]);
        let features = src.fetch(q).await.expect("fetch");
        assert_eq!(features.len(), 4);
        assert!(features.iter().all(|f| f.properties.len() == 1));
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_transport_error() {
        let src = source();
        src.set_failure(Some("connection reset"));
        let err = src.describe().await.expect_err("should fail");
        assert!(err.to_string().contains("connection reset"));
    }
}
