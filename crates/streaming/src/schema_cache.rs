use std::collections::BTreeMap;

use foundation::ids::LayerKey;
use layers::feature::Schema;

/// Per-layer schema and the non-geometry property projection used for full
/// fetches. Computed once when a layer is registered.
#[derive(Debug, Default, Clone)]
pub struct SchemaCache {
    schemas: BTreeMap<LayerKey, Schema>,
    projections: BTreeMap<LayerKey, Vec<String>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: LayerKey, schema: Schema) {
        self.projections.insert(key.clone(), schema.property_names());
        self.schemas.insert(key, schema);
    }

    pub fn schema(&self, key: &LayerKey) -> Option<&Schema> {
        self.schemas.get(key)
    }

    pub fn property_names(&self, key: &LayerKey) -> &[String] {
        self.projections.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remove(&mut self, key: &LayerKey) {
        self.schemas.remove(key);
        self.projections.remove(key);
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaCache;
    use foundation::ids::LayerKey;
    use layers::feature::{AttributeKind, Schema};

    #[test]
    fn projection_follows_schema_and_removal() {
        let mut cache = SchemaCache::new();
        let key = LayerKey::new("wfs", "quakes");
        cache.insert(
            key.clone(),
            Schema::new([("geom", AttributeKind::Geometry), ("mag", AttributeKind::Number)]),
        );
        assert_eq!(cache.property_names(&key), ["mag".to_string()]);
        cache.remove(&key);
        assert!(cache.property_names(&key).is_empty());
        assert!(cache.is_empty());
    }
}
