use std::rc::Rc;

use foundation::bounds::Aabb2;
use foundation::ids::LayerKey;
use layers::attributes::TimeAttributes;
use layers::compose::LayerFilters;
use layers::filter::Filter;
use streaming::protocol::FeatureProtocol;

/// Spatial loading strategy of one layer: fetch a box `ratio` times the
/// viewport and reload once the viewport leaves it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingStrategy {
    active: bool,
    ratio: f64,
    bounds: Option<Aabb2>,
}

impl BoundingStrategy {
    pub fn new(ratio: f64) -> Self {
        Self {
            active: true,
            ratio,
            bounds: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        self.bounds
    }

    /// Inactive strategies are always invalid.
    pub fn invalid(&self, viewport: &Aabb2) -> bool {
        !self.active || self.bounds.is_none_or(|b| !b.contains(viewport))
    }

    pub fn update(&mut self, viewport: Aabb2) {
        self.bounds = Some(viewport.scale(self.ratio));
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// After an overflow or failure: the next viewport change must reload.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// A tracked, time-enabled map layer.
#[derive(Clone)]
pub struct LayerEntry {
    pub key: LayerKey,
    pub attrs: TimeAttributes,
    pub icon: Option<String>,
    pub visible: bool,
    pub annotations: bool,
    pub style: Option<String>,
    pub filters: LayerFilters,
    /// `filters` combined; what the protocol is queried with.
    pub active_filter: Option<Filter>,
    pub protocol: Rc<dyn FeatureProtocol>,
    pub strategy: BoundingStrategy,
}

impl std::fmt::Debug for LayerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerEntry")
            .field("key", &self.key)
            .field("attrs", &self.attrs)
            .field("visible", &self.visible)
            .field("annotations", &self.annotations)
            .field("active_filter", &self.active_filter)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl LayerEntry {
    pub fn recompose(&mut self) {
        self.active_filter = self.filters.compose();
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingStrategy;
    use foundation::bounds::Aabb2;

    #[test]
    fn strategy_reloads_when_viewport_escapes() {
        let view = Aabb2::new([0.0, 0.0], [10.0, 10.0]);
        let mut s = BoundingStrategy::new(2.0);
        assert!(s.invalid(&view));

        s.update(view);
        assert!(!s.invalid(&view));
        assert!(!s.invalid(&Aabb2::new([3.0, 3.0], [13.0, 13.0])));
        assert!(s.invalid(&Aabb2::new([20.0, 20.0], [30.0, 30.0])));

        s.deactivate();
        assert!(s.invalid(&view));
        s.activate();
        assert!(!s.invalid(&view));
    }
}
