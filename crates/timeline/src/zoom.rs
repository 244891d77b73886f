use foundation::time::{DAY_MS, HOUR_MS, MINUTE_MS, SECOND_MS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::band::TimelineBand;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
    Decade,
    Century,
}

impl TimeUnit {
    /// Nominal length; months are 30 days and years 365.
    pub fn millis(self) -> f64 {
        match self {
            TimeUnit::Millisecond => 1.0,
            TimeUnit::Second => SECOND_MS,
            TimeUnit::Minute => MINUTE_MS,
            TimeUnit::Hour => HOUR_MS,
            TimeUnit::Day => DAY_MS,
            TimeUnit::Week => 7.0 * DAY_MS,
            TimeUnit::Month => 30.0 * DAY_MS,
            TimeUnit::Year => 365.0 * DAY_MS,
            TimeUnit::Decade => 3_650.0 * DAY_MS,
            TimeUnit::Century => 36_500.0 * DAY_MS,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomStep {
    pub pixels_per_interval: f64,
    pub unit: TimeUnit,
}

impl ZoomStep {
    pub const fn new(pixels_per_interval: f64, unit: TimeUnit) -> Self {
        Self {
            pixels_per_interval,
            unit,
        }
    }
}

/// Zoom table from most zoomed-in to most zoomed-out.
pub fn default_zoom_steps() -> Vec<ZoomStep> {
    use TimeUnit::*;
    vec![
        ZoomStep::new(280.0, Hour),
        ZoomStep::new(140.0, Hour),
        ZoomStep::new(70.0, Hour),
        ZoomStep::new(35.0, Hour),
        ZoomStep::new(400.0, Day),
        ZoomStep::new(200.0, Day),
        ZoomStep::new(100.0, Day),
        ZoomStep::new(50.0, Day),
        ZoomStep::new(400.0, Month),
        ZoomStep::new(200.0, Month),
        ZoomStep::new(100.0, Month),
        ZoomStep::new(50.0, Month),
        ZoomStep::new(400.0, Year),
        ZoomStep::new(200.0, Year),
        ZoomStep::new(100.0, Year),
        ZoomStep::new(50.0, Year),
        ZoomStep::new(400.0, Decade),
        ZoomStep::new(200.0, Decade),
        ZoomStep::new(100.0, Decade),
        ZoomStep::new(50.0, Decade),
    ]
}

/// Pixels per interval that would fit `target_span_ms` into half the band.
pub fn target_pixels(target_span_ms: f64, current_interval_ms: f64, band_width_px: f64) -> f64 {
    let level = target_span_ms / current_interval_ms;
    (band_width_px / 2.0) / level
}

/// Index of the step closest to `pixels`; the first one wins ties.
pub fn closest_step(steps: &[ZoomStep], pixels: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, step) in steps.iter().enumerate() {
        let diff = (step.pixels_per_interval - pixels).abs();
        if best.is_none_or(|(_, d)| diff < d) {
            best = Some((i, diff));
        }
    }
    best.map(|(i, _)| i)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZoomOutcome {
    Unchanged { index: usize },
    Zoomed { from: usize, to: usize },
    /// The band stopped moving before reaching `target`.
    Stuck { at: usize, target: usize },
    /// Empty table, zero-width span, or the band's index is off the table.
    Skipped,
}

/// Fits a time span onto the band by picking and converging to a zoom step.
#[derive(Debug, Clone, Copy)]
pub struct ZoomMatcher<'a> {
    steps: &'a [ZoomStep],
}

impl<'a> ZoomMatcher<'a> {
    pub fn new(steps: &'a [ZoomStep]) -> Self {
        Self { steps }
    }

    pub fn target_index(&self, band: &dyn TimelineBand, target_span_ms: f64) -> Option<usize> {
        let current = self.steps.get(band.zoom_index())?;
        if target_span_ms.is_nan() || target_span_ms <= 0.0 {
            return None;
        }
        let pixels = target_pixels(target_span_ms, current.unit.millis(), band.pixel_width());
        closest_step(self.steps, pixels)
    }

    /// Step the band one zoom level at a time until it sits on the target
    /// index, then repaint. Zooming fires the band's own listeners; callers
    /// hold their re-entrancy state for the duration.
    pub fn apply(&self, band: &mut dyn TimelineBand, target_span_ms: f64) -> ZoomOutcome {
        let Some(target) = self.target_index(band, target_span_ms) else {
            return ZoomOutcome::Skipped;
        };
        let from = band.zoom_index();
        if from == target {
            return ZoomOutcome::Unchanged { index: from };
        }

        for _ in 0..self.steps.len() {
            let at = band.zoom_index();
            if at == target {
                break;
            }
            band.zoom(target < at);
            if band.zoom_index() == at {
                debug!(at, target, "band refused to zoom");
                band.repaint();
                return ZoomOutcome::Stuck { at, target };
            }
        }
        band.repaint();

        let at = band.zoom_index();
        if at == target {
            ZoomOutcome::Zoomed { from, to: target }
        } else {
            ZoomOutcome::Stuck { at, target }
        }
    }
}
