use foundation::bounds::Aabb2;
use layers::feature::{Feature, Properties, Schema};
use serde::Deserialize;
use serde_json::Value;
use sync::config::LayerConfig;

/// A recorded session: layers with their features, then host events.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub band: BandSetup,
    pub layers: Vec<LayerSetup>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BandSetup {
    pub zoom_index: usize,
    pub pixel_width: f64,
    pub center: Value,
}

impl Default for BandSetup {
    fn default() -> Self {
        Self {
            zoom_index: 6,
            pixel_width: 1000.0,
            center: Value::from(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LayerSetup {
    #[serde(flatten)]
    pub layer: LayerConfig,
    pub schema: Schema,
    #[serde(default)]
    pub features: Vec<FeatureRecord>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRecord {
    pub fid: String,
    #[serde(default)]
    pub properties: Properties,
    /// `[min_x, min_y, max_x, max_y]`
    #[serde(default)]
    pub extent: Option<[f64; 4]>,
}

impl From<FeatureRecord> for Feature {
    fn from(r: FeatureRecord) -> Self {
        let feature = Feature::new(r.fid, r.properties);
        match r.extent {
            Some([x0, y0, x1, y1]) => feature.with_extent(Aabb2::new([x0, y0], [x1, y1])),
            None => feature,
        }
    }
}

/// Times are epoch milliseconds or date strings.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Range { start: Value, end: Value },
    Time { at: Value },
    /// The user drags the band to `center`.
    Drag { center: Value },
    Viewport {
        bbox: [f64; 4],
        #[serde(default)]
        self_triggered: bool,
    },
    Visibility {
        source: String,
        name: String,
        visible: bool,
    },
    Click { event: u64 },
}
