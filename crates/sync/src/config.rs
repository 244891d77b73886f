use std::env;

use foundation::ids::LayerKey;
use foundation::time::{Time, TimeSpan};
use serde::{Deserialize, Serialize};
use streaming::gate::DEFAULT_MAX_FEATURES;
use timeline::zoom::{ZoomStep, default_zoom_steps};

use crate::error::SyncError;

/// Engine configuration.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```json
/// { "max_features": 250, "buffer_fraction": 0.5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Hit-count threshold summed over all visible layers.
    pub max_features: u64,
    /// Fraction of the playback range width fetched on each side.
    pub buffer_fraction: f64,
    /// Tooltip tolerance around instantaneous annotations, as a fraction of
    /// the playback range width.
    pub tooltip_tolerance: f64,
    /// Loading-strategy box size relative to the viewport.
    pub strategy_ratio: f64,
    /// Overall valid range in epoch milliseconds; buffered windows never leave it.
    pub valid_range: Option<[f64; 2]>,
    pub zoom_steps: Vec<ZoomStep>,
    /// `{count}` and `{max}` are substituted.
    pub overflow_message: String,
    pub error_message: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_features: DEFAULT_MAX_FEATURES,
            buffer_fraction: 1.0,
            tooltip_tolerance: 0.025,
            strategy_ratio: 1.0,
            valid_range: None,
            zoom_steps: default_zoom_steps(),
            overflow_message: "There are {count} features in the current view, more than the \
                               maximum of {max}. Zoom in or narrow the time range to load them."
                .to_string(),
            error_message: "An error occurred while loading features for the timeline.".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(text: &str) -> Result<Self, SyncError> {
        let config: SyncConfig =
            serde_json::from_str(text).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TIMESYNC_*` environment overrides. Unparsable values keep the
    /// current setting.
    pub fn with_env_overrides(self) -> Result<Self, SyncError> {
        self.with_overrides(|key| env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        fn parsed<T: std::str::FromStr>(v: Option<String>, default: T) -> T {
            v.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        }
        self.max_features = parsed(lookup("TIMESYNC_MAX_FEATURES"), self.max_features);
        self.buffer_fraction = parsed(lookup("TIMESYNC_BUFFER_FRACTION"), self.buffer_fraction);
        self.tooltip_tolerance =
            parsed(lookup("TIMESYNC_TOOLTIP_TOLERANCE"), self.tooltip_tolerance);
        self.strategy_ratio = parsed(lookup("TIMESYNC_STRATEGY_RATIO"), self.strategy_ratio);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_features == 0 {
            return Err(SyncError::Config("max_features must be positive".into()));
        }
        if !self.buffer_fraction.is_finite() || self.buffer_fraction < 0.0 {
            return Err(SyncError::Config(format!(
                "buffer_fraction must be a non-negative number, got {}",
                self.buffer_fraction
            )));
        }
        if !self.tooltip_tolerance.is_finite() || self.tooltip_tolerance < 0.0 {
            return Err(SyncError::Config("tooltip_tolerance must be non-negative".into()));
        }
        if !self.strategy_ratio.is_finite() || self.strategy_ratio < 1.0 {
            return Err(SyncError::Config("strategy_ratio must be at least 1".into()));
        }
        if self.zoom_steps.is_empty() {
            return Err(SyncError::Config("zoom_steps must not be empty".into()));
        }
        if let Some([start, end]) = self.valid_range
            && !(start <= end)
        {
            return Err(SyncError::Config("valid_range must be ascending".into()));
        }
        Ok(())
    }

    pub fn valid_span(&self) -> Option<TimeSpan> {
        self.valid_range
            .map(|[start, end]| TimeSpan::new(Time(start), Time(end)))
    }

    pub fn overflow_text(&self, count: u64, max: u64) -> String {
        self.overflow_message
            .replace("{count}", &count.to_string())
            .replace("{max}", &max.to_string())
    }
}

fn default_true() -> bool {
    true
}

/// A map layer offered for synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub time_attr: Option<String>,
    #[serde(default)]
    pub end_time_attr: Option<String>,
    #[serde(default)]
    pub filter_attr: Option<String>,
    #[serde(default)]
    pub title_attr: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Annotation layers drive map tooltips and can be hidden when off-screen.
    #[serde(default)]
    pub annotations: bool,
    /// Selected named style.
    #[serde(default)]
    pub style: Option<String>,
}

impl LayerConfig {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            time_attr: None,
            end_time_attr: None,
            filter_attr: None,
            title_attr: None,
            icon: None,
            visible: true,
            annotations: false,
            style: None,
        }
    }

    pub fn time(mut self, attr: &str) -> Self {
        self.time_attr = Some(attr.to_string());
        self
    }

    pub fn end_time(mut self, attr: &str) -> Self {
        self.end_time_attr = Some(attr.to_string());
        self
    }

    pub fn filter_attr(mut self, attr: &str) -> Self {
        self.filter_attr = Some(attr.to_string());
        self
    }

    pub fn title(mut self, attr: &str) -> Self {
        self.title_attr = Some(attr.to_string());
        self
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn annotations(mut self) -> Self {
        self.annotations = true;
        self
    }

    pub fn key(&self) -> LayerKey {
        LayerKey::new(&self.source, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerConfig, SyncConfig};
    use std::collections::HashMap;

    #[test]
    fn partial_json_keeps_defaults() {
        let c = SyncConfig::from_json(r#"{"max_features": 250}"#).expect("parse");
        assert_eq!(c.max_features, 250);
        assert_eq!(c.buffer_fraction, 1.0);
        assert!(!c.zoom_steps.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(SyncConfig::from_json(r#"{"buffer_fraction": -1}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"max_features": 0}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"zoom_steps": []}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"valid_range": [10, 0]}"#).is_err());
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            ("TIMESYNC_MAX_FEATURES", "900"),
            ("TIMESYNC_BUFFER_FRACTION", "lots"),
        ]
        .into_iter()
        .collect();
        let c = SyncConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .expect("valid");
        assert_eq!(c.max_features, 900);
        assert_eq!(c.buffer_fraction, 1.0);
    }

    #[test]
    fn overflow_text_interpolates() {
        let c = SyncConfig {
            overflow_message: "{count} > {max}".into(),
            ..SyncConfig::default()
        };
        assert_eq!(c.overflow_text(570, 500), "570 > 500");
    }

    #[test]
    fn layer_config_from_json() {
        let l: LayerConfig = serde_json::from_str(
            r#"{"source":"wfs","name":"quakes","time_attr":"when","annotations":true}"#,
        )
        .expect("parse");
        assert!(l.visible);
        assert!(l.annotations);
        assert_eq!(l.key().as_str(), "wfs/quakes");
    }
}
