use thiserror::Error;

use crate::feature::{AttributeKind, Schema};

/// Attribute mapping from a layer's features to timeline events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAttributes {
    pub time_attr: String,
    pub end_time_attr: Option<String>,
    /// Only consulted for duration layers.
    pub filter_attr: Option<String>,
    pub title_attr: String,
}

impl TimeAttributes {
    pub fn is_duration(&self) -> bool {
        self.end_time_attr.is_some()
    }
}

/// Requested attribute names, before checking them against a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRequest<'a> {
    pub time_attr: Option<&'a str>,
    pub end_time_attr: Option<&'a str>,
    pub filter_attr: Option<&'a str>,
    pub title_attr: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingAttribute {
    #[error("layer has no time attribute")]
    Time,
    #[error("time attribute `{0}` is not in the layer schema")]
    UnknownTime(String),
    #[error("layer has no usable title attribute")]
    Title,
}

/// Resolve requested attribute names against the layer schema.
///
/// The title falls back to the first string attribute. Optional attributes
/// (end time, filter) that the schema doesn't know are dropped rather than
/// failing the layer.
pub fn resolve_attributes(
    request: &AttributeRequest<'_>,
    schema: &Schema,
) -> Result<TimeAttributes, MissingAttribute> {
    let time_attr = request.time_attr.ok_or(MissingAttribute::Time)?;
    if !schema.has(time_attr) {
        return Err(MissingAttribute::UnknownTime(time_attr.to_string()));
    }

    let title_attr = match request.title_attr {
        Some(t) if schema.has(t) => t,
        _ => schema.first_string_attribute().ok_or(MissingAttribute::Title)?,
    };

    let known = |name: Option<&str>| {
        name.filter(|n| schema.kind_of(n).is_some_and(|k| k != AttributeKind::Geometry))
            .map(str::to_string)
    };

    Ok(TimeAttributes {
        time_attr: time_attr.to_string(),
        end_time_attr: known(request.end_time_attr),
        filter_attr: known(request.filter_attr),
        title_attr: title_attr.to_string(),
    })
}
