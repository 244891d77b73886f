/// Time primitives
///
/// All times are milliseconds since the Unix epoch, matching what feature
/// services and playback clocks hand around.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64); // milliseconds

pub const SECOND_MS: f64 = 1_000.0;
pub const MINUTE_MS: f64 = 60.0 * SECOND_MS;
pub const HOUR_MS: f64 = 60.0 * MINUTE_MS;
pub const DAY_MS: f64 = 24.0 * HOUR_MS;

impl Time {
    pub fn from_days(days: f64) -> Self {
        Time(days * DAY_MS)
    }

    pub fn offset(self, ms: f64) -> Self {
        Time(self.0 + ms)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeSpan {
    pub start: Time,
    pub end: Time,
}

impl TimeSpan {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    pub fn forever() -> Self {
        Self {
            start: Time(f64::NEG_INFINITY),
            end: Time(f64::INFINITY),
        }
    }

    pub fn instant(t: Time) -> Self {
        Self { start: t, end: t }
    }

    pub fn duration(&self) -> f64 {
        (self.end.0 - self.start.0).max(0.0)
    }

    pub fn center(&self) -> Time {
        Time(self.start.0 + (self.end.0 - self.start.0) / 2.0)
    }

    /// Endpoints are inclusive.
    pub fn contains(&self, t: Time) -> bool {
        t.0 >= self.start.0 && t.0 <= self.end.0
    }

    pub fn contains_span(&self, other: &TimeSpan) -> bool {
        other.start.0 >= self.start.0 && other.end.0 <= self.end.0
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        !(self.end.0 < other.start.0 || self.start.0 > other.end.0)
    }

    /// Clamp both endpoints into `bounds`.
    pub fn clamp_to(&self, bounds: &TimeSpan) -> Self {
        let start = self.start.0.clamp(bounds.start.0, bounds.end.0);
        let end = self.end.0.clamp(bounds.start.0, bounds.end.0);
        Self::new(Time(start), Time(end))
    }

    /// Portions of `self` not covered by `other`, in ascending order.
    pub fn minus(&self, other: &TimeSpan) -> Vec<TimeSpan> {
        if !self.overlaps(other) {
            return vec![*self];
        }
        let mut out = Vec::new();
        if self.start.0 < other.start.0 {
            out.push(TimeSpan::new(self.start, other.start));
        }
        if self.end.0 > other.end.0 {
            out.push(TimeSpan::new(other.end, self.end));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{DAY_MS, Time, TimeSpan};

    fn span(a: f64, b: f64) -> TimeSpan {
        TimeSpan::new(Time(a), Time(b))
    }

    #[test]
    fn clamp_keeps_spans_inside_bounds() {
        let s = span(-5.0, 25.0).clamp_to(&span(0.0, 20.0));
        assert_eq!(s, span(0.0, 20.0));
    }

    #[test]
    fn minus_yields_uncovered_edges() {
        assert_eq!(span(0.0, 10.0).minus(&span(3.0, 12.0)), vec![span(0.0, 3.0)]);
        assert_eq!(
            span(0.0, 10.0).minus(&span(3.0, 6.0)),
            vec![span(0.0, 3.0), span(6.0, 10.0)]
        );
        assert!(span(0.0, 10.0).minus(&span(-1.0, 11.0)).is_empty());
        assert_eq!(span(0.0, 1.0).minus(&span(5.0, 6.0)), vec![span(0.0, 1.0)]);
    }

    #[test]
    fn days_are_milliseconds() {
        assert_eq!(Time::from_days(2.0).0, 2.0 * DAY_MS);
        assert_eq!(span(0.0, 4.0).center(), Time(2.0));
    }
}
