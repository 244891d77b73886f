use foundation::time::{Time, TimeSpan};

use crate::attributes::TimeAttributes;
use crate::filter::Filter;

/// The window a playback range asked for versus the buffered window fetched.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RangeInfo {
    pub original: TimeSpan,
    pub current: TimeSpan,
}

/// Whether building a filter records the window as the new [`RangeInfo`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Record {
    Yes,
    /// Incremental slide: the loaded window moves, the recorded range stays.
    Suppress,
}

/// Pad `range` by `fraction` of its width on both sides.
///
/// Negative or non-finite fractions are treated as zero.
pub fn buffered_window(range: TimeSpan, fraction: f64) -> TimeSpan {
    let fraction = if fraction.is_finite() {
        fraction.max(0.0)
    } else {
        0.0
    };
    let pad = fraction * (range.end.0 - range.start.0);
    TimeSpan::new(Time(range.start.0 - pad), Time(range.end.0 + pad))
}

/// Time comparison filter for `window` on the layer's time attribute.
///
/// With an end attribute, events straddling the window edges are caught by
/// also testing the end attribute.
pub fn time_filter(attrs: &TimeAttributes, window: TimeSpan) -> Filter {
    let on_start = Filter::between(&attrs.time_attr, window.start.0, window.end.0);
    match &attrs.end_time_attr {
        Some(end_attr) => Filter::Or {
            filters: vec![
                on_start,
                Filter::between(end_attr, window.start.0, window.end.0),
            ],
        },
        None => on_start,
    }
}

/// Tracks the overall valid range, the recorded [`RangeInfo`], and the window
/// most recently turned into filters.
#[derive(Debug, Default, Clone)]
pub struct RangeTracker {
    valid: Option<TimeSpan>,
    info: Option<RangeInfo>,
    loaded: Option<TimeSpan>,
}

impl RangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_valid_range(&mut self, valid: Option<TimeSpan>) {
        self.valid = valid;
    }

    pub fn valid_range(&self) -> Option<TimeSpan> {
        self.valid
    }

    pub fn info(&self) -> Option<RangeInfo> {
        self.info
    }

    pub fn loaded(&self) -> Option<TimeSpan> {
        self.loaded
    }

    /// Buffered window for `range`, clamped to the valid range. Never fails.
    pub fn window(&self, range: TimeSpan, fraction: f64) -> TimeSpan {
        let window = buffered_window(range, fraction);
        match &self.valid {
            Some(valid) => window.clamp_to(valid),
            None => window,
        }
    }

    /// Compute the window for `range` and note it as loaded (and, unless
    /// suppressed, as the recorded range).
    pub fn advance(&mut self, range: TimeSpan, fraction: f64, record: Record) -> TimeSpan {
        let window = self.window(range, fraction);
        if record == Record::Yes {
            self.info = Some(RangeInfo {
                original: range,
                current: window,
            });
        }
        self.loaded = Some(window);
        window
    }

    /// Build the time filter for one layer.
    pub fn create_time_filter(
        &mut self,
        range: TimeSpan,
        attrs: &TimeAttributes,
        fraction: f64,
        record: Record,
    ) -> Filter {
        let window = self.advance(range, fraction, record);
        time_filter(attrs, window)
    }

    pub fn clear(&mut self) {
        self.info = None;
        self.loaded = None;
    }
}
