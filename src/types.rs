use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Primary identity of a document within an entity type.
pub type Identity = String;

/// Declared type of a field, as reported by the backend mapping.
///
/// All condition and sort dispatch is a closed match over this enum; there
/// is no runtime introspection fallback beyond [`Entity::declared_field_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    MultiField,
    Integer,
    Float,
    Boolean,
    Date,
    GeoPoint,
    Nested,
    Object,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::MultiField => "multi_field",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::GeoPoint => "geo_point",
            FieldType::Nested => "nested",
            FieldType::Object => "object",
        }
    }

    /// Parse a mapping-reported type name. Integer and float cover the
    /// widened backend aliases (`long`, `short`, `double`).
    pub fn from_mapping(name: &str) -> Option<FieldType> {
        match name {
            "string" => Some(FieldType::String),
            "multi_field" => Some(FieldType::MultiField),
            "integer" | "long" | "short" | "byte" => Some(FieldType::Integer),
            "float" | "double" => Some(FieldType::Float),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "geo_point" => Some(FieldType::GeoPoint),
            "nested" => Some(FieldType::Nested),
            "object" => Some(FieldType::Object),
            _ => None,
        }
    }
}

/// The ORM-side description of one queryable entity.
///
/// Replaces duck-typed model objects: the query compiler asks an `Entity`
/// for its namespace (the alias fields are prefixed with in documents), the
/// backend entity type it is stored under, and the declared type of fields
/// the backend mapping does not know about (computed or virtual fields).
pub trait Entity {
    /// Alias used to namespace this entity's fields inside documents.
    fn namespace(&self) -> &str;

    /// Backend entity type documents are written under.
    fn entity_type(&self) -> &str;

    /// Name of the primary identity field.
    fn identity_field(&self) -> &str {
        "id"
    }

    /// Declared type for fields absent from the backend mapping.
    fn declared_field_type(&self, field: &str) -> Option<FieldType> {
        let _ = field;
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// One ordering entry of a [`QuerySpec`].
#[derive(Debug, Clone)]
pub enum SortSpec {
    Field { field: String, direction: Direction },
    /// Raw sort-script escape hatch; the value passes through untouched.
    Script(Value),
    /// Explicitly no ordering, distinct from an omitted order list.
    Unsorted,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> SortSpec {
        SortSpec::Field {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> SortSpec {
        SortSpec::Field {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    #[default]
    Normal,
    /// Compile only the inner query node, for the counting endpoint.
    Count,
}

/// An ORM-style query description, the inbound boundary of the compiler.
///
/// `page` is 1-based here and translated to a 0-based offset during
/// compilation; `page == 1` maps to offset 0 exactly.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub conditions: IndexMap<String, Value>,
    pub order: Vec<SortSpec>,
    pub limit: Option<u32>,
    pub page: u32,
    pub fields: Vec<String>,
    pub facets: Option<Value>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub kind: QueryKind,
}

impl Default for QuerySpec {
    fn default() -> Self {
        QuerySpec {
            conditions: IndexMap::new(),
            order: Vec::new(),
            limit: None,
            page: 1,
            fields: Vec::new(),
            facets: None,
            latitude: None,
            longitude: None,
            kind: QueryKind::Normal,
        }
    }
}

/// Geo parameters threaded through the condition and sort parsers for the
/// duration of one compilation, instead of being stashed on shared state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl RequestContext {
    pub fn from_spec(spec: &QuerySpec) -> RequestContext {
        RequestContext {
            latitude: spec.latitude,
            longitude: spec.longitude,
        }
    }

    pub fn point(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Raw search response as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: Option<u64>,
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,
    #[serde(default)]
    pub hits: Option<Hits>,
    #[serde(default)]
    pub facets: Option<Value>,
}

impl SearchResponse {
    pub fn total(&self) -> u64 {
        self.hits.as_ref().map(|h| h.total).unwrap_or(0)
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.hits.map(|h| h.hits).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hits {
    pub total: u64,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// One matched document.
#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
    /// Per-field values when the query selected explicit fields.
    #[serde(default)]
    pub fields: Option<Value>,
}
