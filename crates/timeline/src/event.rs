use foundation::ids::{EventId, FeatureId, LayerKey};
use foundation::time::{Time, TimeSpan};
use serde::Serialize;
use tracing::warn;

/// When an event happens, resolved once at ingestion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EventSpan {
    Instant { start: Time },
    Duration { start: Time, end: Time },
}

impl EventSpan {
    /// A missing end, or one equal to the start, is an instant. An end
    /// before the start is swapped with it.
    pub fn new(start: Time, end: Option<Time>) -> Self {
        match end {
            Some(end) if end.0 < start.0 => {
                warn!(start = start.0, end = end.0, "event ends before it starts, swapping");
                EventSpan::Duration {
                    start: end,
                    end: start,
                }
            }
            Some(end) if end != start => EventSpan::Duration { start, end },
            _ => EventSpan::Instant { start },
        }
    }

    pub fn start(&self) -> Time {
        match *self {
            EventSpan::Instant { start } | EventSpan::Duration { start, .. } => start,
        }
    }

    pub fn end(&self) -> Option<Time> {
        match *self {
            EventSpan::Instant { .. } => None,
            EventSpan::Duration { end, .. } => Some(end),
        }
    }

    pub fn is_duration(&self) -> bool {
        matches!(self, EventSpan::Duration { .. })
    }

    pub fn as_time_span(&self) -> TimeSpan {
        match *self {
            EventSpan::Instant { start } => TimeSpan::instant(start),
            EventSpan::Duration { start, end } => TimeSpan::new(start, end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    pub id: EventId,
    pub key: LayerKey,
    pub fid: FeatureId,
    pub span: EventSpan,
    pub title: String,
    pub icon: Option<String>,
}

impl TimelineEvent {
    pub fn duration_event(&self) -> bool {
        self.span.is_duration()
    }

    pub fn start(&self) -> Time {
        self.span.start()
    }
}

/// One entry of the feed handed to the timeline visualization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: u64,
    pub start: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    pub title: String,
    pub duration_event: bool,
    pub key: String,
    pub fid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl From<&TimelineEvent> for FeedEntry {
    fn from(e: &TimelineEvent) -> Self {
        FeedEntry {
            id: e.id.0,
            start: e.span.start().0,
            end: e.span.end().map(|t| t.0),
            title: e.title.clone(),
            duration_event: e.duration_event(),
            key: e.key.to_string(),
            fid: e.fid.to_string(),
            icon: e.icon.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventSpan, FeedEntry, TimelineEvent};
    use foundation::ids::{EventId, FeatureId, LayerKey};
    use foundation::time::Time;

    #[test]
    fn equal_end_is_an_instant() {
        assert!(!EventSpan::new(Time(5.0), Some(Time(5.0))).is_duration());
        assert!(!EventSpan::new(Time(5.0), None).is_duration());
        assert!(EventSpan::new(Time(5.0), Some(Time(6.0))).is_duration());
    }

    #[test]
    fn inverted_end_is_swapped() {
        let span = EventSpan::new(Time(9.0), Some(Time(4.0)));
        assert_eq!(
            span,
            EventSpan::Duration {
                start: Time(4.0),
                end: Time(9.0)
            }
        );
        assert_eq!(span.as_time_span().duration(), 5.0);
    }

    #[test]
    fn feed_entry_is_camel_case() {
        let e = TimelineEvent {
            id: EventId(7),
            key: LayerKey::new("wfs", "storms"),
            fid: FeatureId::new("storms.1"),
            span: EventSpan::new(Time(1.0), Some(Time(2.0))),
            title: "Ana".into(),
            icon: None,
        };
        let v = serde_json::to_value(FeedEntry::from(&e)).expect("serialize");
        assert_eq!(v["durationEvent"], true);
        assert_eq!(v["end"], 2.0);
        assert_eq!(v["key"], "wfs/storms");
        assert!(v.get("icon").is_none());
    }
}
