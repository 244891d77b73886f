use foundation::ids::{FeatureId, LayerKey};
use foundation::time::Time;

/// What the map shows over the layers after a gated load.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    Overflow { count: u64, max: u64 },
    Error,
}

/// Outbound notifications, drained by the host after each operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The timeline feed changed; `events` is the visible event count.
    FeedUpdated { events: usize },
    TooltipShown { key: LayerKey, fid: FeatureId },
    TooltipHidden { key: LayerKey, fid: FeatureId },
    OverlayChanged {
        overlay: Overlay,
        message: Option<String>,
    },
    FeatureClicked { key: LayerKey, fid: FeatureId },
    /// The band was dragged and the clock was told to follow.
    ClockPushed { time: Time },
}
