use crate::error::Result;
use crate::query::conditions::{CompiledConditions, ConditionParser};
use crate::query::filter::FilterNode;
use crate::query::sort::parse_order;
use crate::schema::SchemaResolver;
use crate::types::{Entity, QueryKind, QuerySpec, RequestContext};
use serde_json::{json, Map, Value};

const DEFAULT_LIMIT: u32 = 10;

/// Which top-level shape the request body takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// No filter and no query expression: a match-all query.
    Query,
    /// A query expression without a filter.
    QueryString,
    /// A filter, optionally combined with a query expression.
    Filtered,
}

/// A fully assembled search request.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub shape: RequestShape,
    /// Raw query expression when the spec carried a `query_string` condition.
    pub query: Option<Value>,
    pub filter: Option<FilterNode>,
    pub size: u32,
    pub from: u32,
    pub sort: Option<Vec<Value>>,
    pub fields: Vec<String>,
    pub facets: Option<Value>,
}

impl CompiledQuery {
    /// The inner query node: `match_all`, a `query_string` expression, or a
    /// `filtered` composition of both.
    pub fn query_node(&self) -> Value {
        let query = match &self.query {
            Some(expr) => FilterNode::QueryString(expr.clone()).to_dsl(),
            None => json!({ "match_all": {} }),
        };
        match self.shape {
            RequestShape::Filtered => {
                let filter = self
                    .filter
                    .as_ref()
                    .map(FilterNode::to_dsl)
                    .unwrap_or(Value::Null);
                json!({ "filtered": { "query": query, "filter": filter } })
            }
            _ => query,
        }
    }

    /// Assemble the request body, dropping empty slots.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query_node());
        body.insert("size".to_string(), json!(self.size));
        body.insert("from".to_string(), json!(self.from));
        if let Some(sort) = &self.sort {
            body.insert("sort".to_string(), json!(sort));
        }
        if !self.fields.is_empty() {
            body.insert("fields".to_string(), json!(self.fields));
        }
        if let Some(facets) = &self.facets {
            body.insert("facets".to_string(), facets.clone());
        }
        Value::Object(body)
    }
}

/// Compilation result. Callers match on the variant instead of sniffing the
/// compiled value's type: an identity-equality condition short-circuits to
/// `Lookup`, and count queries carry only the inner query node for the
/// counting endpoint.
#[derive(Debug, Clone)]
pub enum CompiledRequest {
    Search(CompiledQuery),
    Count(Value),
    Lookup(Value),
}

/// Composes the condition and sort parsers with paging, field selection and
/// facet parameters into one request.
pub struct QueryCompiler<'a> {
    resolver: &'a SchemaResolver,
    entity: &'a dyn Entity,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(resolver: &'a SchemaResolver, entity: &'a dyn Entity) -> QueryCompiler<'a> {
        QueryCompiler { resolver, entity }
    }

    pub fn compile(&self, spec: &QuerySpec) -> Result<CompiledRequest> {
        let context = RequestContext::from_spec(spec);

        let conditions = ConditionParser::new(self.resolver, self.entity, context)
            .compile(&spec.conditions)?;

        let (query, filter) = match conditions {
            CompiledConditions::Lookup(identity) => {
                return Ok(CompiledRequest::Lookup(identity));
            }
            CompiledConditions::Empty => (None, None),
            CompiledConditions::Query(query) => (Some(query), None),
            CompiledConditions::Filter(filter) => (None, Some(filter)),
            CompiledConditions::QueryAndFilter { query, filter } => (Some(query), Some(filter)),
        };

        let shape = if filter.is_some() {
            RequestShape::Filtered
        } else if query.is_some() {
            RequestShape::QueryString
        } else {
            RequestShape::Query
        };

        let size = spec.limit.unwrap_or(DEFAULT_LIMIT);
        let from = if spec.page <= 1 {
            0
        } else {
            (spec.page - 1) * size
        };

        let compiled = CompiledQuery {
            shape,
            query,
            filter,
            size,
            from,
            sort: parse_order(self.resolver, self.entity, &spec.order, &context)?,
            fields: spec.fields.clone(),
            facets: spec.facets.clone(),
        };

        // Count queries bypass size/from/sort entirely; the counting
        // endpoint accepts only the inner query node.
        if spec.kind == QueryKind::Count {
            return Ok(CompiledRequest::Count(compiled.query_node()));
        }

        Ok(CompiledRequest::Search(compiled))
    }
}
