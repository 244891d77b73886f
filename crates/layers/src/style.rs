use foundation::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::filter::Filter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Catch-all rule applied to features no other rule matched.
    #[serde(default)]
    pub else_filter: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStyle {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub rules: Vec<StyleRule>,
}

/// Parsed style document for one layer; only its rule filters matter here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleDocument {
    #[serde(default)]
    pub named_styles: Vec<NamedStyle>,
}

impl StyleDocument {
    /// The style named `selected`, else the default style, else the first.
    pub fn pick(&self, selected: Option<&str>) -> Option<&NamedStyle> {
        if let Some(name) = selected
            && let Some(style) = self.named_styles.iter().find(|s| s.name == name)
        {
            return Some(style);
        }
        self.named_styles
            .iter()
            .find(|s| s.is_default)
            .or_else(|| self.named_styles.first())
    }
}

/// Extract the filter a layer's style imposes on its features.
///
/// Rule filters are ORed. A rule without a filter matches everything, and an
/// else-rule makes the style filter unavailable; both yield `None`.
pub fn style_filter(document: &StyleDocument, selected: Option<&str>) -> Option<Filter> {
    let style = document.pick(selected)?;
    if style.rules.iter().any(|r| r.else_filter) {
        debug!(style = %style.name, "style has an else rule, style filter disabled");
        return None;
    }

    let mut filters = Vec::with_capacity(style.rules.len());
    for rule in &style.rules {
        filters.push(rule.filter.clone()?);
    }
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::Or { filters }),
    }
}

#[derive(Debug, Error)]
#[error("style lookup failed: {message}")]
pub struct StyleError {
    pub message: String,
}

/// Style lookup collaborator (e.g. a WMS `GetStyles` client).
pub trait StyleLookup {
    fn styles(&self) -> BoxFuture<'_, Result<StyleDocument, StyleError>>;
}
