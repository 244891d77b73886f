use foundation::time::{Time, TimeSpan};

use crate::zoom::ZoomStep;

/// The primary band of the timeline visualization.
///
/// Zoom indices address the shared zoom-step table; stepping in moves to a
/// lower index.
pub trait TimelineBand {
    fn pixel_width(&self) -> f64;
    fn zoom_index(&self) -> usize;
    fn zoom(&mut self, step_in: bool);
    fn center(&self) -> Time;
    fn set_center(&mut self, time: Time);
    /// Move the "now" decorator.
    fn set_now(&mut self, time: Time);
    fn visible_span(&self) -> TimeSpan;
    fn repaint(&mut self);
}

/// A band without a display: keeps center, zoom index and pixel width and
/// derives its visible span from the zoom table.
#[derive(Debug, Clone)]
pub struct HeadlessBand {
    steps: Vec<ZoomStep>,
    zoom_index: usize,
    pixel_width: f64,
    center: Time,
    now: Option<Time>,
    repaints: usize,
}

impl HeadlessBand {
    pub fn new(steps: Vec<ZoomStep>, zoom_index: usize, pixel_width: f64, center: Time) -> Self {
        let zoom_index = zoom_index.min(steps.len().saturating_sub(1));
        Self {
            steps,
            zoom_index,
            pixel_width,
            center,
            now: None,
            repaints: 0,
        }
    }

    pub fn now(&self) -> Option<Time> {
        self.now
    }

    pub fn repaints(&self) -> usize {
        self.repaints
    }

    pub fn set_pixel_width(&mut self, px: f64) {
        self.pixel_width = px;
    }
}

impl TimelineBand for HeadlessBand {
    fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    fn zoom_index(&self) -> usize {
        self.zoom_index
    }

    fn zoom(&mut self, step_in: bool) {
        if step_in {
            self.zoom_index = self.zoom_index.saturating_sub(1);
        } else if self.zoom_index + 1 < self.steps.len() {
            self.zoom_index += 1;
        }
    }

    fn center(&self) -> Time {
        self.center
    }

    fn set_center(&mut self, time: Time) {
        self.center = time;
    }

    fn set_now(&mut self, time: Time) {
        self.now = Some(time);
    }

    fn visible_span(&self) -> TimeSpan {
        let Some(step) = self.steps.get(self.zoom_index) else {
            return TimeSpan::instant(self.center);
        };
        let half = self.pixel_width / 2.0 / step.pixels_per_interval * step.unit.millis();
        TimeSpan::new(self.center.offset(-half), self.center.offset(half))
    }

    fn repaint(&mut self) {
        self.repaints += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{HeadlessBand, TimelineBand};
    use crate::zoom::{TimeUnit, ZoomStep};
    use foundation::time::{Time, TimeSpan};

    #[test]
    fn visible_span_follows_zoom_step() {
        let steps = vec![
            ZoomStep::new(100.0, TimeUnit::Day),
            ZoomStep::new(100.0, TimeUnit::Week),
        ];
        let mut band = HeadlessBand::new(steps, 0, 1000.0, Time::from_days(50.0));
        assert_eq!(
            band.visible_span(),
            TimeSpan::new(Time::from_days(45.0), Time::from_days(55.0))
        );
        band.zoom(false);
        assert_eq!(band.zoom_index(), 1);
        band.zoom(false);
        assert_eq!(band.zoom_index(), 1);
        band.zoom(true);
        band.zoom(true);
        assert_eq!(band.zoom_index(), 0);
    }
}
