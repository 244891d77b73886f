use std::rc::Rc;

use foundation::bounds::Aabb2;
use foundation::ids::{EventId, FeatureId, LayerKey};
use foundation::time::{Time, TimeSpan};
use layers::attributes::{AttributeRequest, resolve_attributes};
use layers::compose::LayerFilters;
use layers::feature::Feature;
use layers::filter::Filter;
use layers::style::{StyleDocument, StyleLookup, style_filter};
use streaming::protocol::FeatureProtocol;
use timeline::band::TimelineBand;
use timeline::event::FeedEntry;
use tracing::{debug, info};

use crate::config::{LayerConfig, SyncConfig};
use crate::context::SyncContext;
use crate::entry::{BoundingStrategy, LayerEntry};
use crate::error::SyncError;
use crate::load::{Committed, LoadKind, LoadPlan, LoadResult};
use crate::notice::Notice;
use crate::playback::{PlaybackBridge, PlaybackClock};
use crate::state::PlaybackState;
use crate::viewport::ViewportBridge;

struct Session<B, C> {
    ctx: SyncContext,
    band: B,
    clock: C,
    playback: PlaybackBridge,
    viewport: ViewportBridge,
}

/// Keeps a timeline band, a playback clock and the map's time-enabled layers
/// in step.
///
/// Operations that need new features return a [`LoadPlan`]. Run it (it
/// borrows nothing from the engine) and hand the result to
/// [`Synchronizer::commit`]; results from superseded plans or from a previous
/// binding are dropped there.
pub struct Synchronizer<B, C> {
    config: SyncConfig,
    sessions: u64,
    session: Option<Session<B, C>>,
}

impl<B: TimelineBand, C: PlaybackClock> Synchronizer<B, C> {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            sessions: 0,
            session: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Attach a band and clock, replacing any previous binding.
    pub fn bind(&mut self, band: B, clock: C) {
        self.unbind();
        self.sessions += 1;
        info!(session = self.sessions, "timeline bound");
        self.session = Some(Session {
            ctx: SyncContext::new(self.config.clone(), self.sessions),
            band,
            clock,
            playback: PlaybackBridge::new(),
            viewport: ViewportBridge::new(),
        });
    }

    /// Detach and drop all engine state. Loads still in flight will be
    /// ignored when committed.
    pub fn unbind(&mut self) -> Option<(B, C)> {
        let session = self.session.take()?;
        info!(
            session = session.ctx.session(),
            layers = session.ctx.layers().count(),
            events = session.ctx.index().len(),
            "timeline unbound"
        );
        Some((session.band, session.clock))
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }

    pub fn context(&self) -> Option<&SyncContext> {
        self.session.as_ref().map(|s| &s.ctx)
    }

    pub fn band(&self) -> Option<&B> {
        self.session.as_ref().map(|s| &s.band)
    }

    pub fn band_mut(&mut self) -> Option<&mut B> {
        self.session.as_mut().map(|s| &mut s.band)
    }

    pub fn clock(&self) -> Option<&C> {
        self.session.as_ref().map(|s| &s.clock)
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.session.as_ref().map(|s| s.playback.state())
    }

    fn session_mut(&mut self) -> Result<&mut Session<B, C>, SyncError> {
        self.session.as_mut().ok_or(SyncError::NotBound)
    }

    /// Describe the layer and start tracking it. Returns `false` when the
    /// layer has no usable time or title attribute.
    pub async fn add_layer(
        &mut self,
        config: LayerConfig,
        protocol: Rc<dyn FeatureProtocol>,
    ) -> Result<bool, SyncError> {
        match self.add_layer_strict(config, protocol).await {
            Ok(()) => Ok(true),
            Err(SyncError::MissingAttribute { key, source }) => {
                debug!(layer = %key, missing = %source, "layer is not time-enabled");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Like [`Synchronizer::add_layer`], but a layer without usable
    /// attributes is an error.
    pub async fn add_layer_strict(
        &mut self,
        config: LayerConfig,
        protocol: Rc<dyn FeatureProtocol>,
    ) -> Result<(), SyncError> {
        self.session_mut()?;
        let key = config.key();
        let schema = protocol.describe().await?;

        let request = AttributeRequest {
            time_attr: config.time_attr.as_deref(),
            end_time_attr: config.end_time_attr.as_deref(),
            filter_attr: config.filter_attr.as_deref(),
            title_attr: config.title_attr.as_deref(),
        };
        let attrs = resolve_attributes(&request, &schema).map_err(|source| {
            SyncError::MissingAttribute {
                key: key.clone(),
                source,
            }
        })?;

        let ratio = self.config.strategy_ratio;
        let session = self.session_mut()?;
        if session.ctx.layer(&key).is_some() {
            session.ctx.remove_layer(&key)?;
        }
        info!(layer = %key, duration = attrs.is_duration(), "tracking layer");
        session.ctx.insert_layer(
            LayerEntry {
                key,
                attrs,
                icon: config.icon,
                visible: config.visible,
                annotations: config.annotations,
                style: config.style,
                filters: LayerFilters::default(),
                active_filter: None,
                protocol,
                strategy: BoundingStrategy::new(ratio),
            },
            schema,
        );
        Ok(())
    }

    /// Stop tracking a layer and evict its events.
    pub fn remove_layer(&mut self, key: &LayerKey) -> Result<(), SyncError> {
        let session = self.session_mut()?;
        session.ctx.remove_layer(key)?;
        info!(layer = %key, "layer removed");
        session.ctx.emit_feed();
        if let Some(time) = session.ctx.current_time() {
            session.playback.refresh_tooltips(&mut session.ctx, time);
        }
        Ok(())
    }

    /// Hiding evicts the layer's events; showing plans a reload.
    pub fn set_layer_visibility(
        &mut self,
        key: &LayerKey,
        visible: bool,
    ) -> Result<Option<LoadPlan>, SyncError> {
        let session = self.session_mut()?;
        let entry = session.ctx.layer_mut(key)?;
        if entry.visible == visible {
            return Ok(None);
        }
        entry.visible = visible;
        if visible {
            return Ok(Some(session.ctx.plan_load(LoadKind::Replace)));
        }
        session.ctx.clear_layer_events(key);
        session.ctx.emit_feed();
        if let Some(time) = session.ctx.current_time() {
            session.playback.refresh_tooltips(&mut session.ctx, time);
        }
        Ok(None)
    }

    pub fn set_client_filter(
        &mut self,
        key: &LayerKey,
        filter: Option<Filter>,
    ) -> Result<Option<LoadPlan>, SyncError> {
        let session = self.session_mut()?;
        let entry = session.ctx.layer_mut(key)?;
        entry.filters.client = filter;
        Self::recomposed(session, key)
    }

    /// Select a named style from `document` and derive the layer's style
    /// filter from its rules.
    pub fn apply_style(
        &mut self,
        key: &LayerKey,
        document: &StyleDocument,
        selected: Option<&str>,
    ) -> Result<Option<LoadPlan>, SyncError> {
        let session = self.session_mut()?;
        let entry = session.ctx.layer_mut(key)?;
        entry.style = selected.map(str::to_string);
        entry.filters.style = style_filter(document, selected);
        debug!(layer = %key, style = ?selected, filtered = entry.filters.style.is_some(), "style applied");
        Self::recomposed(session, key)
    }

    /// Fetch the layer's style document and re-apply its selected style.
    pub async fn refresh_style(
        &mut self,
        key: &LayerKey,
        lookup: &dyn StyleLookup,
    ) -> Result<Option<LoadPlan>, SyncError> {
        let selected = self
            .session_mut()?
            .ctx
            .layer_mut(key)?
            .style
            .clone();
        let document = lookup.styles().await?;
        self.apply_style(key, &document, selected.as_deref())
    }

    fn recomposed(
        session: &mut Session<B, C>,
        key: &LayerKey,
    ) -> Result<Option<LoadPlan>, SyncError> {
        let entry = session.ctx.layer_mut(key)?;
        entry.recompose();
        if !entry.visible {
            return Ok(None);
        }
        Ok(Some(session.ctx.plan_load(LoadKind::Replace)))
    }

    /// Re-index a feature after it was edited on the map.
    pub fn refresh_feature(&mut self, key: &LayerKey, feature: Feature) -> Result<usize, SyncError> {
        let session = self.session_mut()?;
        let added = session.ctx.refresh_feature(key, feature)?;
        if let Some(time) = session.ctx.current_time() {
            session.playback.refresh_tooltips(&mut session.ctx, time);
        }
        Ok(added)
    }

    /// Plan a full reload of every visible layer.
    pub fn reload(&mut self) -> Result<LoadPlan, SyncError> {
        Ok(self.session_mut()?.ctx.plan_load(LoadKind::Replace))
    }

    pub fn on_time_change(&mut self, time: Time) -> Option<LoadPlan> {
        let Some(Session {
            ctx, band, playback, ..
        }) = self.session.as_mut()
        else {
            debug!(time = time.0, "time change while unbound");
            return None;
        };
        playback.on_time_change(ctx, band, time)
    }

    pub fn on_range_modified(&mut self, range: TimeSpan) -> Option<LoadPlan> {
        let Some(Session {
            ctx, band, playback, ..
        }) = self.session.as_mut()
        else {
            debug!(?range, "range change while unbound");
            return None;
        };
        Some(playback.on_range_modified(ctx, band, range))
    }

    pub fn on_band_scroll(&mut self) -> Option<LoadPlan> {
        let Session {
            ctx,
            band,
            clock,
            playback,
            ..
        } = self.session.as_mut()?;
        playback.on_band_scroll(ctx, band, clock)
    }

    pub fn on_viewport_change(&mut self, bbox: Aabb2, self_triggered: bool) -> Option<LoadPlan> {
        let Session {
            ctx,
            playback,
            viewport,
            ..
        } = self.session.as_mut()?;
        let plan = viewport.on_viewport_change(ctx, bbox, self_triggered);
        if !self_triggered && let Some(time) = ctx.current_time() {
            playback.refresh_tooltips(ctx, time);
        }
        plan
    }

    /// A timeline event was clicked: tell the map which feature it is.
    pub fn click(&mut self, id: EventId) -> Option<(LayerKey, FeatureId)> {
        let session = self.session.as_mut()?;
        let event = session.ctx.index().get(id)?;
        let (key, fid) = (event.key.clone(), event.fid.clone());
        session.ctx.emit(Notice::FeatureClicked {
            key: key.clone(),
            fid: fid.clone(),
        });
        Some((key, fid))
    }

    pub fn commit(&mut self, result: LoadResult) -> Committed {
        let Some(session) = self.session.as_mut() else {
            debug!(generation = result.generation().0, "load finished after unbind");
            return Committed::Unbound;
        };
        let visible = session.band.visible_span();
        let committed = session.ctx.commit(result, visible);
        if matches!(committed, Committed::Loaded { .. } | Committed::Overflow { .. })
            && let Some(time) = session.ctx.current_time()
        {
            session.playback.refresh_tooltips(&mut session.ctx, time);
        }
        committed
    }

    /// Run a plan to completion and commit it.
    pub async fn load(&mut self, plan: LoadPlan) -> Committed {
        let result = plan.run().await;
        self.commit(result)
    }

    /// Visible events in display order. Empty while unbound.
    pub fn feed(&self) -> Vec<FeedEntry> {
        self.context().map(|ctx| ctx.index().feed()).unwrap_or_default()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.session
            .as_mut()
            .map(|s| s.ctx.drain_notices())
            .unwrap_or_default()
    }
}
