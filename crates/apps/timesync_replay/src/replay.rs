use std::rc::Rc;

use foundation::bounds::Aabb2;
use foundation::ids::{EventId, LayerKey};
use foundation::time::{Time, TimeSpan};
use layers::feature::parse_time;
use serde::Serialize;
use serde_json::Value;
use streaming::memory::MemoryProtocol;
use sync::config::SyncConfig;
use sync::engine::Synchronizer;
use sync::error::SyncError;
use sync::load::LoadPlan;
use sync::playback::RecordingClock;
use timeline::band::{HeadlessBand, TimelineBand};
use timeline::event::FeedEntry;
use tracing::{info, warn};

use crate::scenario::{Scenario, Step};

type Engine = Synchronizer<HeadlessBand, RecordingClock>;

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub committed: Option<String>,
    pub notices: Vec<String>,
    pub events: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub clock: Vec<f64>,
    pub feed: Vec<FeedEntry>,
}

fn time_of(value: &Value, what: &str) -> Result<Time, SyncError> {
    parse_time(value).ok_or_else(|| SyncError::Config(format!("unparsable {what}: {value}")))
}

async fn settle(engine: &mut Engine, plan: Option<LoadPlan>) -> Option<String> {
    let plan = plan?;
    Some(format!("{:?}", engine.load(plan).await))
}

pub async fn replay(config: SyncConfig, scenario: Scenario) -> Result<Report, SyncError> {
    let center = time_of(&scenario.band.center, "band center")?;
    let mut engine: Engine = Synchronizer::new(config.clone());
    engine.bind(
        HeadlessBand::new(
            config.zoom_steps.clone(),
            scenario.band.zoom_index,
            scenario.band.pixel_width,
            center,
        ),
        RecordingClock::default(),
    );

    for setup in scenario.layers {
        let key = setup.layer.key();
        let protocol = Rc::new(MemoryProtocol::new(
            setup.schema,
            setup.features.into_iter().map(Into::into).collect(),
        ));
        if !engine.add_layer(setup.layer, protocol).await? {
            warn!(layer = %key, "layer has no usable time attribute, skipped");
        }
    }

    let mut report = Report::default();
    let initial = engine.reload()?;
    let committed = settle(&mut engine, Some(initial)).await;
    report.steps.push(step_report(&mut engine, 0, committed));

    for (i, step) in scenario.steps.into_iter().enumerate() {
        let plan = match step {
            Step::Range { start, end } => {
                let range = TimeSpan::new(time_of(&start, "range start")?, time_of(&end, "range end")?);
                engine.on_range_modified(range)
            }
            Step::Time { at } => engine.on_time_change(time_of(&at, "time")?),
            Step::Drag { center } => {
                let center = time_of(&center, "drag center")?;
                if let Some(band) = engine.band_mut() {
                    band.set_center(center);
                }
                engine.on_band_scroll()
            }
            Step::Viewport {
                bbox: [x0, y0, x1, y1],
                self_triggered,
            } => engine.on_viewport_change(Aabb2::new([x0, y0], [x1, y1]), self_triggered),
            Step::Visibility {
                source,
                name,
                visible,
            } => engine.set_layer_visibility(&LayerKey::new(&source, &name), visible)?,
            Step::Click { event } => {
                engine.click(EventId(event));
                None
            }
        };
        let committed = settle(&mut engine, plan).await;
        report.steps.push(step_report(&mut engine, i + 1, committed));
    }

    report.clock = engine
        .clock()
        .map(|c| c.times.iter().map(|t| t.0).collect())
        .unwrap_or_default();
    report.feed = engine.feed();
    info!(steps = report.steps.len(), events = report.feed.len(), "replay finished");
    Ok(report)
}

fn step_report(engine: &mut Engine, step: usize, committed: Option<String>) -> StepReport {
    let notices = engine
        .drain_notices()
        .iter()
        .map(|n| format!("{n:?}"))
        .collect();
    StepReport {
        step,
        committed,
        notices,
        events: engine.feed().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::replay;
    use crate::scenario::Scenario;
    use pretty_assertions::assert_eq;
    use sync::config::SyncConfig;

    const SCENARIO: &str = r#"{
        "band": { "center": "2024-03-05" },
        "layers": [{
            "source": "wfs", "name": "quakes", "time_attr": "when",
            "schema": { "attributes": [
                { "name": "when", "kind": "date_time" },
                { "name": "place", "kind": "string" }
            ]},
            "features": [
                { "fid": "q1", "properties": { "when": "2024-03-02T10:00:00Z", "place": "north" } },
                { "fid": "q2", "properties": { "when": "2024-03-07", "place": "south" } },
                { "fid": "q3", "properties": { "when": "2025-01-01", "place": "far" } }
            ]
        }],
        "steps": [
            { "type": "range", "start": "2024-03-01", "end": "2024-03-10" },
            { "type": "time", "at": "2024-03-04" },
            { "type": "click", "event": 0 }
        ]
    }"#;

    #[tokio::test]
    async fn replays_range_and_clicks() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).expect("scenario");
        let report = replay(SyncConfig::default(), scenario).await.expect("replay");

        assert_eq!(report.steps.len(), 4);
        assert_eq!(report.steps[0].events, 3);
        assert_eq!(report.steps[1].events, 2, "q3 is outside the buffered range");
        let titles: Vec<&str> = report.feed.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["north", "south"]);
        assert!(report.steps[3]
            .notices
            .iter()
            .any(|n| n.starts_with("FeatureClicked")));
        assert!(report.clock.is_empty());
    }
}
