use std::collections::BTreeSet;

use foundation::ids::{FeatureId, LayerKey};
use foundation::time::{Time, TimeSpan};
use runtime::metrics::Counter;
use timeline::band::TimelineBand;
use timeline::event::EventSpan;
use timeline::zoom::ZoomMatcher;
use tracing::debug;

use crate::context::SyncContext;
use crate::load::{LoadKind, LoadPlan};
use crate::notice::Notice;
use crate::state::PlaybackState;

/// The host's playback clock (time slider, animation control, ...).
pub trait PlaybackClock {
    fn set_time(&mut self, time: Time);
}

/// A clock that only remembers what it was told.
#[derive(Debug, Default, Clone)]
pub struct RecordingClock {
    pub times: Vec<Time>,
}

impl PlaybackClock for RecordingClock {
    fn set_time(&mut self, time: Time) {
        self.times.push(time);
    }
}

/// Couples the playback clock and the timeline band in both directions
/// without letting either side's echo drive the other.
#[derive(Debug, Default)]
pub struct PlaybackBridge {
    state: PlaybackState,
    shown: BTreeSet<(LayerKey, FeatureId)>,
}

impl PlaybackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn shown_tooltips(&self) -> impl Iterator<Item = &(LayerKey, FeatureId)> {
        self.shown.iter()
    }

    /// The clock moved to `time`.
    pub fn on_time_change(
        &mut self,
        ctx: &mut SyncContext,
        band: &mut dyn TimelineBand,
        time: Time,
    ) -> Option<LoadPlan> {
        ctx.set_current_time(time);
        if self.state.is_time_echo(time) {
            debug!(time = time.0, "clock echoed our own push");
            ctx.metrics_mut().inc(Counter::EchoesSuppressed, 1);
        } else {
            self.state = PlaybackState::ExternallyDriven { center: time };
            band.set_center(time);
        }
        band.set_now(time);
        self.refresh_tooltips(ctx, time);
        self.plan_slide(ctx, &*band)
    }

    /// The clock's playback range changed: rebuild time filters, fit the
    /// band's zoom to the range and reload.
    pub fn on_range_modified(
        &mut self,
        ctx: &mut SyncContext,
        band: &mut dyn TimelineBand,
        range: TimeSpan,
    ) -> LoadPlan {
        ctx.set_playback_range(range);

        self.state = PlaybackState::ZoomAdjusting;
        let outcome = ZoomMatcher::new(&ctx.config().zoom_steps).apply(band, range.duration());
        debug!(?outcome, span_ms = range.duration(), "fitted zoom to playback range");
        self.state = PlaybackState::ExternallyDriven {
            center: band.center(),
        };

        if let Some(time) = ctx.current_time() {
            self.refresh_tooltips(ctx, time);
        }
        ctx.plan_load(LoadKind::Refresh)
    }

    /// The band scrolled. Echoes of our own recentering are swallowed; a
    /// user drag pushes the band's center to the clock.
    pub fn on_band_scroll(
        &mut self,
        ctx: &mut SyncContext,
        band: &mut dyn TimelineBand,
        clock: &mut dyn PlaybackClock,
    ) -> Option<LoadPlan> {
        let center = band.center();
        if self.state.is_scroll_echo(center) {
            debug!(center = center.0, state = ?self.state, "ignoring band scroll echo");
            ctx.metrics_mut().inc(Counter::EchoesSuppressed, 1);
            return None;
        }

        self.state = PlaybackState::SelfDriven { pushed: center };
        clock.set_time(center);
        ctx.set_current_time(center);
        ctx.metrics_mut().inc(Counter::ClockPushes, 1);
        ctx.emit(Notice::ClockPushed { time: center });
        self.refresh_tooltips(ctx, center);
        self.plan_slide(ctx, &*band)
    }

    fn plan_slide(&self, ctx: &mut SyncContext, band: &dyn TimelineBand) -> Option<LoadPlan> {
        let visible = band.visible_span();
        if !ctx.needs_slide(visible) {
            return None;
        }
        let stale = ctx.slide_window(visible);
        debug!(stale = stale.len(), "band left the loaded window");
        Some(ctx.plan_load(LoadKind::Slide { stale }))
    }

    /// Show tooltips for annotations active at `time`, hide the rest.
    /// Only changes are emitted.
    pub(crate) fn refresh_tooltips(&mut self, ctx: &mut SyncContext, time: Time) {
        let tolerance = ctx
            .playback_range()
            .map_or(0.0, |r| r.duration() * ctx.config().tooltip_tolerance);
        let active: BTreeSet<(LayerKey, FeatureId)> = ctx
            .annotation_events()
            .filter(|e| is_active(e.span, time, tolerance))
            .map(|e| (e.key.clone(), e.fid.clone()))
            .collect();

        for (key, fid) in self.shown.difference(&active) {
            ctx.emit(Notice::TooltipHidden {
                key: key.clone(),
                fid: fid.clone(),
            });
        }
        for (key, fid) in active.difference(&self.shown) {
            ctx.emit(Notice::TooltipShown {
                key: key.clone(),
                fid: fid.clone(),
            });
        }
        self.shown = active;
    }
}

fn is_active(span: EventSpan, time: Time, tolerance: f64) -> bool {
    match span {
        EventSpan::Duration { start, end } => start.0 <= time.0 && time.0 <= end.0,
        EventSpan::Instant { start } => (time.0 - start.0).abs() <= tolerance,
    }
}
