use foundation::bounds::Aabb2;
use tracing::debug;

use crate::context::SyncContext;
use crate::load::{LoadKind, LoadPlan};

/// Follows the map viewport: reloads layers whose loading strategy no
/// longer covers it and hides annotations that scrolled off-screen.
#[derive(Debug, Default)]
pub struct ViewportBridge {
    ignored: u64,
}

impl ViewportBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Self-triggered changes seen so far.
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn on_viewport_change(
        &mut self,
        ctx: &mut SyncContext,
        bbox: Aabb2,
        self_triggered: bool,
    ) -> Option<LoadPlan> {
        if self_triggered {
            self.ignored += 1;
            debug!(?bbox, "ignoring self-triggered viewport change");
            return None;
        }

        ctx.set_viewport(bbox);
        let mut reload = false;
        for entry in ctx.layers_mut().filter(|e| e.visible) {
            if entry.strategy.invalid(&bbox) {
                debug!(layer = %entry.key, active = entry.strategy.is_active(), "strategy needs reload");
                reload = true;
            }
            entry.recompose();
        }

        if ctx.refresh_offscreen() {
            ctx.emit_feed();
        }
        reload.then(|| ctx.plan_load(LoadKind::Replace))
    }
}
