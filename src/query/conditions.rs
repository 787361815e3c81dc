use crate::error::{Result, SkilletError};
use crate::query::filter::{self, FilterNode};
use crate::schema::SchemaResolver;
use crate::types::{Entity, FieldType, RequestContext};
use indexmap::IndexMap;
use serde_json::Value;

const SUB_OPERATORS: [&str; 3] = ["must", "must_not", "should"];
const COMPARISON_OPERATORS: [&str; 5] = ["=", ">", ">=", "<", "<="];

/// Result of compiling a condition map.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledConditions {
    /// No conditions at all.
    Empty,
    /// A single equality condition on the identity field collapsed to the
    /// literal identity, allowing a direct get-by-id instead of a search.
    Lookup(Value),
    Filter(FilterNode),
    /// Only a raw free-text query expression was present.
    Query(Value),
    QueryAndFilter { query: Value, filter: FilterNode },
}

/// Walks a mapping of field-expressions to values and produces the filter
/// tree and/or raw query expression for one request.
pub struct ConditionParser<'a> {
    resolver: &'a SchemaResolver,
    entity: &'a dyn Entity,
    context: RequestContext,
}

impl<'a> ConditionParser<'a> {
    pub fn new(
        resolver: &'a SchemaResolver,
        entity: &'a dyn Entity,
        context: RequestContext,
    ) -> ConditionParser<'a> {
        ConditionParser {
            resolver,
            entity,
            context,
        }
    }

    /// Compile a full condition map. Multiple top-level filters combine
    /// under an implicit `and`; exactly one passes through unwrapped; a
    /// single identity-equality term collapses to [`CompiledConditions::Lookup`].
    pub fn compile(&self, conditions: &IndexMap<String, Value>) -> Result<CompiledConditions> {
        let mut nodes = Vec::new();
        for (key, value) in conditions {
            if let Some(node) = self.parse_entry(key, value)? {
                nodes.push(node);
            }
        }

        let mut query = None;
        let mut filters = Vec::new();
        for node in nodes {
            match node {
                FilterNode::QueryString(expr) => {
                    if query.is_some() {
                        return Err(SkilletError::InvalidCondition(
                            "multiple query_string conditions in one query".to_string(),
                        ));
                    }
                    query = Some(expr);
                }
                other => filters.push(other),
            }
        }

        let filter = match filters.len() {
            0 => None,
            1 => {
                let only = filters.remove(0);
                if query.is_none() {
                    if let Some(identity) = self.identity_lookup(&only) {
                        return Ok(CompiledConditions::Lookup(identity));
                    }
                }
                Some(only)
            }
            _ => Some(FilterNode::And(filters)),
        };

        Ok(match (query, filter) {
            (None, None) => CompiledConditions::Empty,
            (None, Some(filter)) => CompiledConditions::Filter(filter),
            (Some(query), None) => CompiledConditions::Query(query),
            (Some(query), Some(filter)) => CompiledConditions::QueryAndFilter { query, filter },
        })
    }

    /// Recognize a single equality term on the identity field (bare or
    /// namespace-qualified) and return the literal identity.
    fn identity_lookup(&self, node: &FilterNode) -> Option<Value> {
        let FilterNode::Term { field, value } = node else {
            return None;
        };
        let qualified = format!("{}.{}", self.entity.namespace(), self.entity.identity_field());
        if field == self.entity.identity_field() || *field == qualified {
            Some(value.clone())
        } else {
            None
        }
    }

    /// Parse one `expression => value` entry into a filter node. Returns
    /// `Ok(None)` for entries with nothing to contribute (the original ORM
    /// emits empty placeholders in some list positions).
    fn parse_entry(&self, key: &str, value: &Value) -> Result<Option<FilterNode>> {
        let key = key.trim();

        // A purely numeric key means the value itself is a {field: value}
        // pair coming from a positional condition list.
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            return match value {
                Value::Null => Ok(None),
                Value::Object(pair) => match pair.iter().next() {
                    Some((inner_key, inner_value)) => self.parse_entry(inner_key, inner_value),
                    None => Ok(None),
                },
                _ => Err(SkilletError::InvalidCondition(format!(
                    "positional condition '{key}' must hold a field/value pair"
                ))),
            };
        }

        let (field, operator, sub_operator) = split_expression(key);

        let node = if field.eq_ignore_ascii_case("and")
            || field.eq_ignore_ascii_case("or")
            || field.eq_ignore_ascii_case("not")
            || field.eq_ignore_ascii_case("bool")
        {
            self.parse_combinator(&field, value)?
        } else if field == "query_string" {
            FilterNode::QueryString(value.clone())
        } else {
            match self.parse_predicate(&field, &operator, value)? {
                Some(node) => node,
                None => return Ok(None),
            }
        };

        Ok(Some(match sub_operator {
            Some(slot) => wrap_sub_operator(slot, node),
            None => node,
        }))
    }

    fn parse_combinator(&self, keyword: &str, value: &Value) -> Result<FilterNode> {
        let mut children = Vec::new();
        for (key, value) in collect_conditions(keyword, value)? {
            if let Some(node) = self.parse_entry(&key, &value)? {
                children.push(node);
            }
        }

        let keyword = keyword.to_ascii_lowercase();
        Ok(match keyword.as_str() {
            "and" => FilterNode::And(children),
            "or" => FilterNode::Or(children),
            "not" => {
                let inner = if children.len() == 1 {
                    children.remove(0)
                } else {
                    FilterNode::And(children)
                };
                FilterNode::Not(Box::new(inner))
            }
            _ => group_bool(children),
        })
    }

    fn parse_predicate(
        &self,
        field: &str,
        operator: &str,
        value: &Value,
    ) -> Result<Option<FilterNode>> {
        if value.is_null() {
            return Ok(Some(filter::missing(field)));
        }

        let field_type = self.resolver.type_of(self.entity, field);
        let node = match field_type {
            Some(FieldType::Float) => filter::range(field, operator, coerce_float(value))?,
            Some(FieldType::Integer) => filter::range(field, operator, coerce_integer(value))?,
            Some(FieldType::Date) => filter::range(field, operator, value.clone())?,
            Some(FieldType::String) | Some(FieldType::MultiField) | Some(FieldType::Boolean) => {
                if operator != "=" {
                    return Err(SkilletError::InvalidCondition(format!(
                        "operator '{operator}' is not valid for term field '{field}'"
                    )));
                }
                filter::term(field, value.clone())
            }
            Some(FieldType::GeoPoint) => filter::geo(field, operator, value.clone(), &self.context)?,
            Some(FieldType::Nested) => match value.get("nested") {
                Some(fragment) => FilterNode::Nested(fragment.clone()),
                None => {
                    return Err(SkilletError::InvalidCondition(format!(
                        "condition on nested field '{field}' must carry a 'nested' fragment"
                    )))
                }
            },
            other => {
                return Err(SkilletError::UnsupportedFieldType {
                    field: field.to_string(),
                    field_type: other.map(|t| t.name()).unwrap_or("unknown").to_string(),
                })
            }
        };
        Ok(Some(node))
    }
}

/// Split an expression key into field, comparison operator, and boolean
/// sub-operator. Operator tokens are recognized from a fixed vocabulary at
/// the tail of the expression; unrecognized trailing tokens fold back into
/// the field name ("first name >" sorts out to field "first name").
fn split_expression(key: &str) -> (String, String, Option<&'static str>) {
    let tokens: Vec<&str> = key.split_whitespace().collect();
    if tokens.is_empty() {
        return (String::new(), "=".to_string(), None);
    }

    let mut end = tokens.len();
    let mut sub_operator = None;
    if end > 1 {
        if let Some(slot) = SUB_OPERATORS.iter().find(|s| **s == tokens[end - 1]) {
            sub_operator = Some(*slot);
            end -= 1;
        }
    }

    let mut operator = "=".to_string();
    if end > 1 && COMPARISON_OPERATORS.contains(&tokens[end - 1]) {
        operator = tokens[end - 1].to_string();
        end -= 1;
    }

    (tokens[..end].join(" "), operator, sub_operator)
}

/// Wrap a node under a `must`/`must_not`/`should` slot. The wrapper is a
/// single-slot bool node; sibling wrappers regroup when a `bool` combinator
/// normalizes its children.
fn wrap_sub_operator(slot: &str, node: FilterNode) -> FilterNode {
    let mut must = Vec::new();
    let mut must_not = Vec::new();
    let mut should = Vec::new();
    match slot {
        "must_not" => must_not.push(node),
        "should" => should.push(node),
        _ => must.push(node),
    }
    FilterNode::Bool {
        must,
        must_not,
        should,
    }
}

/// Normalize a bool combinator's children by regrouping same-keyed sibling
/// slots into ordered arrays. Untagged children count as `must`.
fn group_bool(children: Vec<FilterNode>) -> FilterNode {
    let mut must = Vec::new();
    let mut must_not = Vec::new();
    let mut should = Vec::new();
    for child in children {
        match child {
            FilterNode::Bool {
                must: m,
                must_not: mn,
                should: s,
            } => {
                must.extend(m);
                must_not.extend(mn);
                should.extend(s);
            }
            other => must.push(other),
        }
    }
    FilterNode::Bool {
        must,
        must_not,
        should,
    }
}

/// Flatten a combinator's value into (expression, value) pairs. Accepts a
/// condition map directly, or a positional list whose elements each carry
/// one pair.
fn collect_conditions(keyword: &str, value: &Value) -> Result<Vec<(String, Value)>> {
    match value {
        Value::Object(entries) => Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        Value::Array(items) => {
            let mut pairs = Vec::new();
            for item in items {
                let Some(entries) = item.as_object() else {
                    return Err(SkilletError::InvalidCondition(format!(
                        "'{keyword}' list entries must be field/value pairs"
                    )));
                };
                for (k, v) in entries {
                    pairs.push((k.clone(), v.clone()));
                }
            }
            Ok(pairs)
        }
        _ => Err(SkilletError::InvalidCondition(format!(
            "'{keyword}' conditions must be a map or list of conditions"
        ))),
    }
}

/// The original boundary hands numbers through as strings; coerce them so
/// range predicates compare numerically.
fn coerce_float(value: &Value) -> Value {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(coerce_float).collect()),
        other => other.clone(),
    }
}

fn coerce_integer(value: &Value) -> Value {
    match value {
        Value::String(s) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(coerce_integer).collect()),
        other => other.clone(),
    }
}
