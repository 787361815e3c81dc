#![allow(dead_code)]

use indexmap::IndexMap;
use serde_json::{json, Value};
use skillet::{Entity, FieldType, SchemaResolver};

/// Entity fixture backed by the mapping below, with one virtual field the
/// backend mapping does not know about.
pub struct Article;

impl Entity for Article {
    fn namespace(&self) -> &str {
        "Article"
    }

    fn entity_type(&self) -> &str {
        "articles"
    }

    fn declared_field_type(&self, field: &str) -> Option<FieldType> {
        match field {
            "virtual_score" | "Article.virtual_score" => Some(FieldType::Float),
            _ => None,
        }
    }
}

pub fn mapping_response() -> Value {
    json!({
        "content": {
            "articles": {
                "properties": {
                    "Article": {
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "slug": { "type": "multi_field" },
                            "rating": { "type": "integer" },
                            "price": { "type": "float" },
                            "active": { "type": "boolean" },
                            "published": { "type": "date", "format": "yyyy-MM-dd HH:mm:ss" },
                            "location": { "type": "geo_point" },
                            "comments": {
                                "type": "nested",
                                "properties": {
                                    "body": { "type": "string" }
                                }
                            },
                            "meta": {
                                "properties": {
                                    "tags": { "type": "string" }
                                }
                            }
                        }
                    },
                    "Author": {
                        "properties": {
                            "name": { "type": "string" }
                        }
                    }
                }
            }
        }
    })
}

pub fn resolver() -> SchemaResolver {
    SchemaResolver::from_mapping_response(&mapping_response())
}

pub fn conditions(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
