use crate::filter::Filter;

/// The three filter sources a tracked layer can carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerFilters {
    /// Derived from the layer's selected style rules.
    pub style: Option<Filter>,
    /// Derived from the playback range.
    pub time: Option<Filter>,
    /// Set by the host (e.g. an attribute query panel).
    pub client: Option<Filter>,
}

impl LayerFilters {
    /// Combined filter in `style, time, client` order.
    pub fn compose(&self) -> Option<Filter> {
        compose([self.style.clone(), self.time.clone(), self.client.clone()])
    }
}

/// Combine optional filters: none present yields `None`, a single one is
/// returned unchanged, several are joined with `And`.
pub fn compose(filters: impl IntoIterator<Item = Option<Filter>>) -> Option<Filter> {
    let mut present: Vec<Filter> = filters.into_iter().flatten().collect();
    match present.len() {
        0 => None,
        1 => present.pop(),
        _ => Some(Filter::And { filters: present }),
    }
}
