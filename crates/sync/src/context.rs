use std::collections::{BTreeMap, BTreeSet};

use foundation::bounds::Aabb2;
use foundation::ids::{FeatureId, LayerKey};
use foundation::time::{Time, TimeSpan};
use layers::feature::{Feature, Schema};
use layers::range::{RangeTracker, Record};
use runtime::event_bus::EventBus;
use runtime::generation::GenerationCounter;
use runtime::metrics::{Counter, Metrics};
use streaming::gate::HitCountGate;
use streaming::pipeline::{LayerLoad, PipelineOutcome};
use streaming::schema_cache::SchemaCache;
use timeline::event::TimelineEvent;
use timeline::index::{EventIndex, Ingest};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::entry::LayerEntry;
use crate::error::SyncError;
use crate::load::{Committed, LoadKind, LoadPlan, LoadResult};
use crate::notice::{Notice, Overlay};

/// Per-binding engine state. Dropped on unbind.
#[derive(Debug)]
pub struct SyncContext {
    config: SyncConfig,
    session: u64,
    layers: BTreeMap<LayerKey, LayerEntry>,
    schemas: SchemaCache,
    ranges: RangeTracker,
    index: EventIndex,
    /// Map extents of annotation features, for the off-screen check.
    extents: BTreeMap<(LayerKey, FeatureId), Aabb2>,
    offscreen: BTreeSet<(LayerKey, FeatureId)>,
    generations: GenerationCounter,
    /// Eviction owed since the last accepted commit. Superseded plans fold
    /// into it so dropping their results never drops their eviction.
    pending: Option<LoadKind>,
    viewport: Option<Aabb2>,
    playback_range: Option<TimeSpan>,
    current_time: Option<Time>,
    overlay: Overlay,
    metrics: Metrics,
    notices: EventBus<Notice>,
}

impl SyncContext {
    pub fn new(config: SyncConfig, session: u64) -> Self {
        let mut ranges = RangeTracker::new();
        ranges.set_valid_range(config.valid_span());
        Self {
            config,
            session,
            layers: BTreeMap::new(),
            schemas: SchemaCache::new(),
            ranges,
            index: EventIndex::new(),
            extents: BTreeMap::new(),
            offscreen: BTreeSet::new(),
            generations: GenerationCounter::new(),
            pending: None,
            viewport: None,
            playback_range: None,
            current_time: None,
            overlay: Overlay::None,
            metrics: Metrics::new(),
            notices: EventBus::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerEntry> {
        self.layers.values()
    }

    pub fn layer(&self, key: &LayerKey) -> Option<&LayerEntry> {
        self.layers.get(key)
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    pub fn ranges(&self) -> &RangeTracker {
        &self.ranges
    }

    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    pub fn viewport(&self) -> Option<Aabb2> {
        self.viewport
    }

    pub fn playback_range(&self) -> Option<TimeSpan> {
        self.playback_range
    }

    pub fn current_time(&self) -> Option<Time> {
        self.current_time
    }

    pub fn overlay(&self) -> Overlay {
        self.overlay
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    pub(crate) fn emit(&mut self, notice: Notice) {
        self.notices.emit(notice);
    }

    pub(crate) fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub(crate) fn set_current_time(&mut self, time: Time) {
        self.current_time = Some(time);
    }

    pub(crate) fn set_viewport(&mut self, bbox: Aabb2) {
        self.viewport = Some(bbox);
    }

    pub(crate) fn layer_mut(&mut self, key: &LayerKey) -> Result<&mut LayerEntry, SyncError> {
        self.layers
            .get_mut(key)
            .ok_or_else(|| SyncError::UnknownLayer(key.clone()))
    }

    pub(crate) fn layers_mut(&mut self) -> impl Iterator<Item = &mut LayerEntry> {
        self.layers.values_mut()
    }

    /// Track a layer, deriving its time filter if a playback range is known.
    pub(crate) fn insert_layer(&mut self, mut entry: LayerEntry, schema: Schema) {
        if let Some(range) = self.playback_range {
            entry.filters.time = Some(self.ranges.create_time_filter(
                range,
                &entry.attrs,
                self.config.buffer_fraction,
                Record::Yes,
            ));
        }
        entry.recompose();
        self.schemas.insert(entry.key.clone(), schema);
        self.layers.insert(entry.key.clone(), entry);
    }

    pub(crate) fn remove_layer(&mut self, key: &LayerKey) -> Result<LayerEntry, SyncError> {
        let entry = self
            .layers
            .remove(key)
            .ok_or_else(|| SyncError::UnknownLayer(key.clone()))?;
        self.schemas.remove(key);
        self.clear_layer_events(key);
        Ok(entry)
    }

    pub(crate) fn clear_layer_events(&mut self, key: &LayerKey) -> usize {
        self.extents.retain(|(k, _), _| k != key);
        let evicted = self.index.clear_events_for_key(key);
        self.metrics.inc(Counter::EventsEvicted, evicted as u64);
        evicted
    }

    /// Record a new playback range and re-derive every layer's time filter.
    pub(crate) fn set_playback_range(&mut self, range: TimeSpan) {
        self.playback_range = Some(range);
        let fraction = self.config.buffer_fraction;
        if self.layers.is_empty() {
            self.ranges.advance(range, fraction, Record::Yes);
            return;
        }
        for entry in self.layers.values_mut() {
            entry.filters.time =
                Some(self.ranges.create_time_filter(range, &entry.attrs, fraction, Record::Yes));
            entry.recompose();
        }
    }

    /// Slide the loaded window onto `visible` without recording it as the
    /// playback range. Returns the parts of the old window no longer loaded.
    pub(crate) fn slide_window(&mut self, visible: TimeSpan) -> Vec<TimeSpan> {
        let old = self.ranges.loaded();
        let fraction = self.config.buffer_fraction;
        let window = self.ranges.window(visible, fraction);
        if self.layers.is_empty() {
            self.ranges.advance(visible, fraction, Record::Suppress);
        }
        for entry in self.layers.values_mut() {
            entry.filters.time = Some(self.ranges.create_time_filter(
                visible,
                &entry.attrs,
                fraction,
                Record::Suppress,
            ));
            entry.recompose();
        }
        old.map(|old| old.minus(&window)).unwrap_or_default()
    }

    /// The band needs a slide once its visible span leaves the loaded window.
    pub(crate) fn needs_slide(&self, visible: TimeSpan) -> bool {
        self.ranges
            .loaded()
            .is_some_and(|loaded| !loaded.contains_span(&visible))
    }

    /// Snapshot what a gate → fetch pass needs for every visible layer and
    /// take a new generation.
    pub fn plan_load(&mut self, kind: LoadKind) -> LoadPlan {
        let generation = self.generations.advance();
        let viewport = self.viewport;
        let mut loads = Vec::new();
        for entry in self.layers.values_mut().filter(|e| e.visible) {
            if let Some(view) = viewport
                && entry.strategy.invalid(&view)
            {
                entry.strategy.update(view);
            }
            loads.push(LayerLoad {
                key: entry.key.clone(),
                protocol: entry.protocol.clone(),
                filter: entry.active_filter.clone(),
                count_bbox: viewport,
                fetch_bbox: entry.strategy.bounds().or(viewport),
                property_names: self.schemas.property_names(&entry.key).to_vec(),
            });
        }
        self.pending = Some(match self.pending.take() {
            Some(owed) => owed.absorb(&kind),
            None => kind.clone(),
        });
        debug!(generation = generation.0, layers = loads.len(), ?kind, "planned load");
        LoadPlan {
            session: self.session,
            generation,
            kind,
            gate: HitCountGate::new(self.config.max_features),
            loads,
        }
    }

    /// Apply a finished load. `visible` is the band's span at commit time.
    pub(crate) fn commit(&mut self, result: LoadResult, visible: TimeSpan) -> Committed {
        if result.session != self.session {
            debug!(session = result.session, "dropping load from a previous binding");
            return Committed::Unbound;
        }
        if !self.generations.is_current(result.generation) {
            debug!(
                generation = result.generation.0,
                current = self.generations.current().0,
                "dropping superseded load"
            );
            self.metrics.inc(Counter::StaleLoadDropped, 1);
            return Committed::Stale;
        }

        match result.outcome {
            PipelineOutcome::Loaded { total, features } => {
                self.metrics.inc(Counter::GateAccepted, 1);
                self.metrics.record_hit_total(total);
                self.set_overlay(Overlay::None);
                let eviction = self.take_eviction(&result.kind);
                let (added, evicted) = self.ingest(&eviction, features, visible);
                info!(total, added, evicted, ?eviction, "load committed");
                self.refresh_offscreen();
                self.emit_feed();
                Committed::Loaded { added, evicted }
            }
            PipelineOutcome::Overflow { total, max } => {
                self.metrics.inc(Counter::GateOverflow, 1);
                self.metrics.record_hit_total(total);
                for entry in self.layers.values_mut() {
                    entry.strategy.deactivate();
                }
                let evicted = self.index.clear();
                self.pending = None;
                self.extents.clear();
                self.offscreen.clear();
                self.metrics.inc(Counter::EventsEvicted, evicted as u64);
                self.set_overlay(Overlay::Overflow { count: total, max });
                self.emit_feed();
                Committed::Overflow { total, max }
            }
            PipelineOutcome::Failed { key, error } => {
                warn!(layer = %key, %error, "load failed");
                self.metrics.inc(Counter::GateFailed, 1);
                for entry in self.layers.values_mut() {
                    entry.strategy.deactivate();
                }
                self.set_overlay(Overlay::Error);
                Committed::Failed
            }
        }
    }

    /// The eviction owed by every plan since the last accepted commit. Stale
    /// slices the loaded window has since moved back over are not evicted.
    fn take_eviction(&mut self, committed: &LoadKind) -> LoadKind {
        match self.pending.take().unwrap_or_else(|| committed.clone()) {
            LoadKind::Slide { stale } => match self.ranges.loaded() {
                Some(loaded) => LoadKind::Slide {
                    stale: stale.iter().flat_map(|s| s.minus(&loaded)).collect(),
                },
                None => LoadKind::Slide { stale },
            },
            owed => owed,
        }
    }

    fn ingest(
        &mut self,
        kind: &LoadKind,
        batches: Vec<(LayerKey, Vec<Feature>)>,
        visible: TimeSpan,
    ) -> (usize, usize) {
        let fallback_end = self.playback_range.map(|r| r.end);
        let (mut added, mut evicted) = (0, 0);
        for (key, batch) in batches {
            // Removed or hidden while the load was in flight.
            let Some(entry) = self.layers.get_mut(&key) else {
                continue;
            };
            entry.strategy.activate();
            if !entry.visible {
                continue;
            }

            evicted += match kind {
                LoadKind::Replace => self.index.clear_events_for_key(&key),
                LoadKind::Refresh => self.index.clear_invisible_events(&key, visible),
                LoadKind::Slide { stale } => stale
                    .iter()
                    .map(|span| self.index.clear_events_for_range(&key, *span))
                    .sum(),
            };
            if entry.annotations {
                let indexed = &self.index;
                self.extents
                    .retain(|(k, fid), _| k != &key || indexed.contains(k, fid));
                for feature in &batch {
                    if let Some(extent) = feature.extent {
                        self.extents
                            .insert((key.clone(), feature.fid.clone()), extent);
                    }
                }
            }

            let ingest = Ingest {
                key: &entry.key,
                attrs: &entry.attrs,
                icon: entry.icon.as_deref(),
                fallback_end,
            };
            added += self.index.add_features(&ingest, &batch);
        }
        self.metrics.inc(Counter::EventsAdded, added as u64);
        self.metrics.inc(Counter::EventsEvicted, evicted as u64);
        (added, evicted)
    }

    /// Re-index one feature after an edit.
    pub(crate) fn refresh_feature(
        &mut self,
        key: &LayerKey,
        feature: Feature,
    ) -> Result<usize, SyncError> {
        let fallback_end = self.playback_range.map(|r| r.end);
        let entry = self
            .layers
            .get(key)
            .ok_or_else(|| SyncError::UnknownLayer(key.clone()))?;
        self.index.clear_events_for_fid(key, &feature.fid);
        self.extents.remove(&(key.clone(), feature.fid.clone()));
        if !entry.visible {
            return Ok(0);
        }
        if entry.annotations
            && let Some(extent) = feature.extent
        {
            self.extents.insert((key.clone(), feature.fid.clone()), extent);
        }
        let ingest = Ingest {
            key: &entry.key,
            attrs: &entry.attrs,
            icon: entry.icon.as_deref(),
            fallback_end,
        };
        let added = self.index.add_features(&ingest, std::slice::from_ref(&feature));
        self.refresh_offscreen();
        self.emit_feed();
        Ok(added)
    }

    /// Events of annotation layers that are currently in the feed.
    pub(crate) fn annotation_events(&self) -> impl Iterator<Item = &TimelineEvent> {
        let layers = &self.layers;
        self.index
            .visible_events()
            .filter(move |e| layers.get(&e.key).is_some_and(|l| l.annotations))
    }

    /// Hide annotations whose extent lies outside the viewport. Returns
    /// whether the hidden set changed.
    pub(crate) fn refresh_offscreen(&mut self) -> bool {
        let hidden: BTreeSet<(LayerKey, FeatureId)> = match self.viewport {
            Some(view) => self
                .extents
                .iter()
                .filter(|(_, extent)| !view.intersects(extent))
                .map(|(id, _)| id.clone())
                .collect(),
            None => BTreeSet::new(),
        };
        self.index.set_hidden(hidden.iter().cloned());
        if hidden == self.offscreen {
            return false;
        }
        debug!(hidden = hidden.len(), "off-screen annotations changed");
        self.offscreen = hidden;
        true
    }

    pub(crate) fn emit_feed(&mut self) {
        let events = self.index.visible_events().count();
        self.notices.emit(Notice::FeedUpdated { events });
    }

    pub(crate) fn set_overlay(&mut self, overlay: Overlay) {
        if self.overlay == overlay {
            return;
        }
        self.overlay = overlay;
        let message = match overlay {
            Overlay::None => None,
            Overlay::Overflow { count, max } => Some(self.config.overflow_text(count, max)),
            Overlay::Error => Some(self.config.error_message.clone()),
        };
        self.notices.emit(Notice::OverlayChanged { overlay, message });
    }
}
