use crate::error::{Result, SkilletError};
use crate::types::RequestContext;
use serde_json::{json, Map, Value};

/// Comparison operators that compile to a range predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOperator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOperator {
    pub fn from_token(token: &str) -> Option<RangeOperator> {
        match token {
            ">" => Some(RangeOperator::Gt),
            ">=" => Some(RangeOperator::Gte),
            "<" => Some(RangeOperator::Lt),
            "<=" => Some(RangeOperator::Lte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOperator::Gt => "gt",
            RangeOperator::Gte => "gte",
            RangeOperator::Lt => "lt",
            RangeOperator::Lte => "lte",
        }
    }
}

/// A compiled filter tree, serialized to the backend DSL with
/// [`FilterNode::to_dsl`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Range {
        field: String,
        operator: RangeOperator,
        value: Value,
    },
    Missing {
        field: String,
    },
    GeoDistance {
        field: String,
        distance: Value,
        lat: f64,
        lon: f64,
    },
    GeoDistanceRange {
        field: String,
        operator: RangeOperator,
        distance: Value,
        lat: f64,
        lon: f64,
    },
    GeoBoundingBox {
        field: String,
        corners: Value,
    },
    /// Pass-through wrapper around the ORM's own nested query fragment.
    Nested(Value),
    Bool {
        must: Vec<FilterNode>,
        must_not: Vec<FilterNode>,
        should: Vec<FilterNode>,
    },
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    /// Raw free-text query expression; lives in the query slot, not the
    /// filter slot, when it surfaces at the top level.
    QueryString(Value),
}

/// Build a term predicate, pluralizing to `terms` for multi-valued lists.
/// A single-element list degrades to a plain term on its only element.
pub fn term(field: &str, value: Value) -> FilterNode {
    match value {
        Value::Array(mut values) => {
            if values.len() == 1 {
                FilterNode::Term {
                    field: field.to_string(),
                    value: values.remove(0),
                }
            } else {
                FilterNode::Terms {
                    field: field.to_string(),
                    values,
                }
            }
        }
        value => FilterNode::Term {
            field: field.to_string(),
            value,
        },
    }
}

/// Build a range predicate; the equality operator degenerates to a term.
pub fn range(field: &str, operator: &str, value: Value) -> Result<FilterNode> {
    if operator == "=" {
        return Ok(term(field, value));
    }
    let operator = RangeOperator::from_token(operator).ok_or_else(|| {
        SkilletError::InvalidCondition(format!(
            "unknown operator '{operator}' for field '{field}'"
        ))
    })?;
    Ok(FilterNode::Range {
        field: field.to_string(),
        operator,
        value,
    })
}

/// Predicate matching documents where the field is absent.
pub fn missing(field: &str) -> FilterNode {
    FilterNode::Missing {
        field: field.to_string(),
    }
}

/// Build a geo predicate. A map value carrying bounding-box corners compiles
/// to `geo_bounding_box`; a scalar distance compiles to `geo_distance` on
/// equality or `geo_distance_range` under a range operator, both centered on
/// the request context's latitude/longitude.
pub fn geo(field: &str, operator: &str, value: Value, context: &RequestContext) -> Result<FilterNode> {
    if let Value::Object(ref corners) = value {
        if corners.contains_key("top_left") || corners.contains_key("bottom_right") {
            return Ok(FilterNode::GeoBoundingBox {
                field: field.to_string(),
                corners: value,
            });
        }
    }

    let (lat, lon) = context.point().ok_or_else(|| {
        SkilletError::InvalidCondition(format!(
            "geo condition on '{field}' requires latitude and longitude"
        ))
    })?;

    if operator == "=" {
        return Ok(FilterNode::GeoDistance {
            field: field.to_string(),
            distance: value,
            lat,
            lon,
        });
    }
    let operator = RangeOperator::from_token(operator).ok_or_else(|| {
        SkilletError::InvalidCondition(format!(
            "unknown operator '{operator}' for geo field '{field}'"
        ))
    })?;
    Ok(FilterNode::GeoDistanceRange {
        field: field.to_string(),
        operator,
        distance: value,
        lat,
        lon,
    })
}

impl FilterNode {
    /// Serialize this node to the backend's filter DSL.
    pub fn to_dsl(&self) -> Value {
        match self {
            FilterNode::Term { field, value } => json!({ "term": { field: value } }),
            FilterNode::Terms { field, values } => json!({ "terms": { field: values } }),
            FilterNode::Range {
                field,
                operator,
                value,
            } => json!({ "range": { field: { operator.as_str(): value } } }),
            FilterNode::Missing { field } => json!({ "missing": { "field": field } }),
            FilterNode::GeoDistance {
                field,
                distance,
                lat,
                lon,
            } => json!({
                "geo_distance": {
                    "distance": distance,
                    field: { "lat": lat, "lon": lon },
                    "unit": "miles",
                    "distance_type": "plane"
                }
            }),
            FilterNode::GeoDistanceRange {
                field,
                operator,
                distance,
                lat,
                lon,
            } => json!({
                "geo_distance_range": {
                    operator.as_str(): distance,
                    field: { "lat": lat, "lon": lon },
                    "unit": "miles",
                    "distance_type": "plane"
                }
            }),
            FilterNode::GeoBoundingBox { field, corners } => {
                json!({ "geo_bounding_box": { field: corners } })
            }
            FilterNode::Nested(fragment) => json!({ "nested": fragment }),
            FilterNode::Bool {
                must,
                must_not,
                should,
            } => {
                let mut slots = Map::new();
                for (key, nodes) in [("must", must), ("must_not", must_not), ("should", should)] {
                    if !nodes.is_empty() {
                        slots.insert(
                            key.to_string(),
                            Value::Array(nodes.iter().map(FilterNode::to_dsl).collect()),
                        );
                    }
                }
                json!({ "bool": slots })
            }
            FilterNode::And(children) => {
                json!({ "and": children.iter().map(FilterNode::to_dsl).collect::<Vec<_>>() })
            }
            FilterNode::Or(children) => {
                json!({ "or": children.iter().map(FilterNode::to_dsl).collect::<Vec<_>>() })
            }
            FilterNode::Not(child) => json!({ "not": child.to_dsl() }),
            FilterNode::QueryString(expr) => match expr {
                Value::Object(_) => json!({ "query_string": expr }),
                other => json!({ "query_string": { "query": other } }),
            },
        }
    }
}
