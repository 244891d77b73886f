use std::collections::BTreeSet;

use foundation::ids::{EventId, FeatureId, LayerKey};
use foundation::precision::stable_total_cmp_f64;
use foundation::time::{Time, TimeSpan};
use layers::attributes::TimeAttributes;
use layers::feature::{Feature, coerce_flag, parse_time};
use serde_json::Value;
use tracing::{debug, warn};

use crate::event::{EventSpan, FeedEntry, TimelineEvent};

/// How one layer's features become events.
#[derive(Debug, Clone, Copy)]
pub struct Ingest<'a> {
    pub key: &'a LayerKey,
    pub attrs: &'a TimeAttributes,
    pub icon: Option<&'a str>,
    /// Substituted for an empty end on duration layers; normally the
    /// playback range's upper bound.
    pub fallback_end: Option<Time>,
}

/// Append/remove store of timeline events keyed by `(layer key, feature id)`.
///
/// Events can also be hidden from the feed without being evicted.
///
/// Ordering contract:
/// - `events()` is insertion order; `feed()` is ascending start, then id.
#[derive(Debug, Default, Clone)]
pub struct EventIndex {
    next_id: u64,
    events: Vec<TimelineEvent>,
    hidden: BTreeSet<(LayerKey, FeatureId)>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn get(&self, id: EventId) -> Option<&TimelineEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, key: &LayerKey, fid: &FeatureId) -> bool {
        self.events.iter().any(|e| &e.key == key && &e.fid == fid)
    }

    pub fn events_for_key<'a>(&'a self, key: &'a LayerKey) -> impl Iterator<Item = &'a TimelineEvent> {
        self.events.iter().filter(move |e| &e.key == key)
    }

    /// Map features to events and append them.
    ///
    /// Skips features already indexed under the same key, features failing a
    /// duration layer's filter attribute, and features without a parsable
    /// start. Returns the number of events added.
    pub fn add_features(&mut self, ingest: &Ingest<'_>, features: &[Feature]) -> usize {
        let attrs = ingest.attrs;
        let mut added = 0;
        for feature in features {
            if self.contains(ingest.key, &feature.fid) {
                continue;
            }
            if attrs.is_duration()
                && let Some(flag) = &attrs.filter_attr
                && !coerce_flag(feature.get(flag))
            {
                continue;
            }
            let Some(start) = feature.get(&attrs.time_attr).and_then(parse_time) else {
                warn!(layer = %ingest.key, fid = %feature.fid, attr = %attrs.time_attr, "unparsable start time, skipping");
                continue;
            };
            let end = match &attrs.end_time_attr {
                Some(end_attr) => feature
                    .get(end_attr)
                    .and_then(parse_time)
                    .or(ingest.fallback_end),
                None => None,
            };

            let id = EventId(self.next_id);
            self.next_id += 1;
            self.events.push(TimelineEvent {
                id,
                key: ingest.key.clone(),
                fid: feature.fid.clone(),
                span: EventSpan::new(start, end),
                title: title_of(feature, &attrs.title_attr),
                icon: ingest.icon.map(str::to_string),
            });
            added += 1;
        }
        debug!(layer = %ingest.key, added, total = self.events.len(), "indexed features");
        added
    }

    fn remove_where(&mut self, pred: impl Fn(&TimelineEvent) -> bool) -> usize {
        let before = self.events.len();
        self.events.retain(|e| !pred(e));
        before - self.events.len()
    }

    pub fn clear_events_for_key(&mut self, key: &LayerKey) -> usize {
        self.hidden.retain(|(k, _)| k != key);
        self.remove_where(|e| &e.key == key)
    }

    /// Drop the key's events that start outside the visible span, keeping
    /// what is on screen.
    pub fn clear_invisible_events(&mut self, key: &LayerKey, visible: TimeSpan) -> usize {
        self.remove_where(|e| &e.key == key && !visible.contains(e.start()))
    }

    /// Drop the key's events that start within `range` (inclusive).
    pub fn clear_events_for_range(&mut self, key: &LayerKey, range: TimeSpan) -> usize {
        self.remove_where(|e| &e.key == key && range.contains(e.start()))
    }

    pub fn clear_events_for_fid(&mut self, key: &LayerKey, fid: &FeatureId) -> usize {
        self.remove_where(|e| &e.key == key && &e.fid == fid)
    }

    /// Evict everything. Ids keep counting up.
    pub fn clear(&mut self) -> usize {
        let n = self.events.len();
        self.events.clear();
        self.hidden.clear();
        n
    }

    /// Replace the hidden set. Hidden events stay indexed but leave the feed.
    pub fn set_hidden(&mut self, hidden: impl IntoIterator<Item = (LayerKey, FeatureId)>) {
        self.hidden = hidden.into_iter().collect();
    }

    pub fn is_hidden(&self, event: &TimelineEvent) -> bool {
        self.hidden.contains(&(event.key.clone(), event.fid.clone()))
    }

    pub fn visible_events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter().filter(move |e| !self.is_hidden(e))
    }

    /// Visible events in feed order.
    pub fn feed(&self) -> Vec<FeedEntry> {
        let mut visible: Vec<&TimelineEvent> = self.visible_events().collect();
        visible.sort_by(|a, b| {
            stable_total_cmp_f64(a.start().0, b.start().0).then_with(|| a.id.cmp(&b.id))
        });
        visible.into_iter().map(FeedEntry::from).collect()
    }
}

fn title_of(feature: &Feature, attr: &str) -> String {
    match feature.get(attr) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => feature.fid.to_string(),
        Some(Value::String(_)) => feature.fid.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{EventIndex, Ingest};
    use foundation::ids::{FeatureId, LayerKey};
    use foundation::time::{DAY_MS, Time, TimeSpan};
    use layers::attributes::TimeAttributes;
    use layers::feature::{Feature, Properties};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn key(name: &str) -> LayerKey {
        LayerKey::new("wfs", name)
    }

    fn instant_attrs() -> TimeAttributes {
        TimeAttributes {
            time_attr: "start".into(),
            end_time_attr: None,
            filter_attr: None,
            title_attr: "name".into(),
        }
    }

    fn duration_attrs() -> TimeAttributes {
        TimeAttributes {
            end_time_attr: Some("end".into()),
            filter_attr: Some("active".into()),
            ..instant_attrs()
        }
    }

    fn feature(fid: &str, pairs: &[(&str, Value)]) -> Feature {
        let props: Properties = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Feature::new(fid, props)
    }

    fn day_feature(fid: &str, day: f64) -> Feature {
        feature(fid, &[("start", json!(day * DAY_MS)), ("name", json!(fid))])
    }

    fn days(a: f64, b: f64) -> TimeSpan {
        TimeSpan::new(Time::from_days(a), Time::from_days(b))
    }

    fn add(index: &mut EventIndex, k: &LayerKey, attrs: &TimeAttributes, features: &[Feature]) -> usize {
        let ingest = Ingest {
            key: k,
            attrs,
            icon: Some("pin.png"),
            fallback_end: Some(Time::from_days(30.0)),
        };
        index.add_features(&ingest, features)
    }

    #[test]
    fn ids_are_unique_and_never_reused() {
        let mut index = EventIndex::new();
        let k = key("a");
        add(&mut index, &k, &instant_attrs(), &[day_feature("a.1", 1.0), day_feature("a.2", 2.0)]);
        let first: Vec<_> = index.events().iter().map(|e| e.id).collect();
        index.clear();
        add(&mut index, &k, &instant_attrs(), &[day_feature("a.1", 1.0)]);
        assert!(!first.contains(&index.events()[0].id));
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn already_indexed_features_are_skipped() {
        let mut index = EventIndex::new();
        let k = key("a");
        assert_eq!(add(&mut index, &k, &instant_attrs(), &[day_feature("a.1", 1.0)]), 1);
        assert_eq!(add(&mut index, &k, &instant_attrs(), &[day_feature("a.1", 1.0)]), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn duration_layer_gates_on_filter_attribute() {
        let mut index = EventIndex::new();
        let k = key("d");
        let features = [
            feature("d.1", &[("start", json!(0)), ("end", json!(10)), ("active", json!("true"))]),
            feature("d.2", &[("start", json!(0)), ("end", json!(10)), ("active", json!(false))]),
            feature("d.3", &[("start", json!(0)), ("end", json!(10))]),
        ];
        assert_eq!(add(&mut index, &k, &duration_attrs(), &features), 1);
        assert_eq!(index.events()[0].fid, FeatureId::new("d.1"));
        assert!(index.events()[0].duration_event());
    }

    #[test]
    fn missing_end_defaults_to_playback_upper_bound() {
        let mut index = EventIndex::new();
        let k = key("d");
        let mut attrs = duration_attrs();
        attrs.filter_attr = None;
        add(&mut index, &k, &attrs, &[feature("d.1", &[("start", json!(0)), ("end", json!(""))])]);
        assert_eq!(index.events()[0].span.end(), Some(Time::from_days(30.0)));
    }

    #[test]
    fn clear_for_key_is_idempotent() {
        let mut index = EventIndex::new();
        let (a, b) = (key("a"), key("b"));
        add(&mut index, &a, &instant_attrs(), &[day_feature("a.1", 1.0)]);
        add(&mut index, &b, &instant_attrs(), &[day_feature("b.1", 1.0)]);
        assert_eq!(index.clear_events_for_key(&a), 1);
        let after_first = index.events().to_vec();
        assert_eq!(index.clear_events_for_key(&a), 0);
        assert_eq!(index.events(), after_first.as_slice());
    }

    #[test]
    fn range_and_visibility_clears() {
        let mut index = EventIndex::new();
        let k = key("a");
        let features: Vec<_> = (0..10).map(|d| day_feature(&format!("a.{d}"), d as f64)).collect();
        add(&mut index, &k, &instant_attrs(), &features);

        assert_eq!(index.clear_events_for_range(&k, days(0.0, 2.0)), 3);
        assert!(index.events_for_key(&k).all(|e| !days(0.0, 2.0).contains(e.start())));

        assert_eq!(index.clear_invisible_events(&k, days(4.0, 6.0)), 4);
        let left: Vec<_> = index.events().iter().map(|e| e.fid.0.clone()).collect();
        assert_eq!(left, vec!["a.4", "a.5", "a.6"]);

        assert_eq!(index.clear_events_for_fid(&k, &FeatureId::new("a.5")), 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn hidden_events_leave_feed_but_stay_indexed() {
        let mut index = EventIndex::new();
        let k = key("notes");
        add(&mut index, &k, &instant_attrs(), &[day_feature("n.2", 2.0), day_feature("n.1", 1.0)]);
        let feed: Vec<_> = index.feed().into_iter().map(|f| f.fid).collect();
        assert_eq!(feed, vec!["n.1", "n.2"]);

        index.set_hidden([(k.clone(), FeatureId::new("n.1"))]);
        let feed: Vec<_> = index.feed().into_iter().map(|f| f.fid).collect();
        assert_eq!(feed, vec!["n.2"]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn unparsable_start_is_skipped_and_title_falls_back() {
        let mut index = EventIndex::new();
        let k = key("a");
        let features = [
            feature("a.1", &[("start", json!("soon"))]),
            feature("a.2", &[("start", json!(5))]),
        ];
        assert_eq!(add(&mut index, &k, &instant_attrs(), &features), 1);
        assert_eq!(index.events()[0].title, "a.2");
        assert_eq!(index.events()[0].icon.as_deref(), Some("pin.png"));
    }
}
