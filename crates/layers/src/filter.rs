use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feature::{Properties, parse_time};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Logical feature filter, shipped to the feature service and evaluated
/// locally by in-memory sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Compare {
        property: String,
        op: CompareOp,
        value: Value,
    },
    /// Inclusive time window on a date attribute; bounds are epoch milliseconds.
    Between {
        property: String,
        lower: f64,
        upper: f64,
    },
    And {
        filters: Vec<Filter>,
    },
    Or {
        filters: Vec<Filter>,
    },
    Not {
        filter: Box<Filter>,
    },
}

impl Filter {
    pub fn compare(property: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn between(property: impl Into<String>, lower: f64, upper: f64) -> Self {
        Filter::Between {
            property: property.into(),
            lower,
            upper,
        }
    }

    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Filter::Compare {
                property,
                op,
                value,
            } => {
                let Some(actual) = properties.get(property) else {
                    return false;
                };
                match compare_values(actual, value) {
                    Some(ord) => op_allows(*op, ord),
                    // Unordered values only support (in)equality.
                    None => match op {
                        CompareOp::Eq => actual == value,
                        CompareOp::Ne => actual != value,
                        _ => false,
                    },
                }
            }
            Filter::Between {
                property,
                lower,
                upper,
            } => properties
                .get(property)
                .and_then(parse_time)
                .is_some_and(|t| t.0 >= *lower && t.0 <= *upper),
            Filter::And { filters } => filters.iter().all(|f| f.matches(properties)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(properties)),
            Filter::Not { filter } => !filter.matches(properties),
        }
    }
}

fn op_allows(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.trim().parse().ok()?),
        (Value::String(x), Value::Number(y)) => x.trim().parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
