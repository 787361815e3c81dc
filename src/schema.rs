use crate::types::{Entity, FieldType};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Leaf field description from the backend mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub field_type: FieldType,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Leaf(FieldMapping),
    Object {
        /// `Object` for plain sub-objects, `Nested` when the mapping
        /// declares the node nested.
        field_type: FieldType,
        children: SchemaTree,
    },
}

/// Recursive field-name → type tree parsed from the backend's reported
/// mapping. Top-level keys are entity namespaces (ORM aliases).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaTree {
    nodes: IndexMap<String, SchemaNode>,
}

impl SchemaTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) {
        self.nodes.insert(name.into(), node);
    }

    /// Parse the full mapping response
    /// (`{collection: {entityType: {properties: {alias: {...}}}}}`) into a
    /// tree keyed by entity namespace.
    pub fn from_mapping_response(mapping: &Value) -> SchemaTree {
        let mut tree = SchemaTree::default();
        let Some(collections) = mapping.as_object() else {
            return tree;
        };
        for entity_types in collections.values() {
            let Some(entity_types) = entity_types.as_object() else {
                continue;
            };
            for type_mapping in entity_types.values() {
                let Some(aliases) = type_mapping.get("properties").and_then(Value::as_object)
                else {
                    continue;
                };
                for (alias, node) in aliases {
                    tree.insert(alias.clone(), Self::parse_node(node));
                }
            }
        }
        tree
    }

    fn parse_node(node: &Value) -> SchemaNode {
        if let Some(properties) = node.get("properties").and_then(Value::as_object) {
            let field_type = match node.get("type").and_then(Value::as_str) {
                Some("nested") => FieldType::Nested,
                _ => FieldType::Object,
            };
            let mut children = SchemaTree::default();
            for (name, child) in properties {
                children.insert(name.clone(), Self::parse_node(child));
            }
            SchemaNode::Object {
                field_type,
                children,
            }
        } else {
            let field_type = node
                .get("type")
                .and_then(Value::as_str)
                .and_then(FieldType::from_mapping)
                .unwrap_or(FieldType::String);
            let format = node
                .get("format")
                .and_then(Value::as_str)
                .map(str::to_string);
            SchemaNode::Leaf(FieldMapping { field_type, format })
        }
    }
}

/// List the entity types a mapping response declares, one level above the
/// per-alias properties.
pub fn entity_types(mapping: &Value) -> Vec<String> {
    let mut sources = Vec::new();
    if let Some(collections) = mapping.as_object() {
        for entity_types in collections.values() {
            if let Some(entity_types) = entity_types.as_object() {
                sources.extend(entity_types.keys().cloned());
            }
        }
    }
    sources
}

/// Resolves declared field types against a cached [`SchemaTree`].
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    tree: SchemaTree,
}

impl SchemaResolver {
    pub fn new(tree: SchemaTree) -> SchemaResolver {
        SchemaResolver { tree }
    }

    pub fn from_mapping_response(mapping: &Value) -> SchemaResolver {
        SchemaResolver::new(SchemaTree::from_mapping_response(mapping))
    }

    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    /// Resolve the declared type of `field` for `entity`.
    ///
    /// Walks dotted path segments, stripping a leading segment equal to the
    /// entity's own namespace, descending through object nodes. A segment
    /// missing from the tree falls back to the entity's own declared-field
    /// introspection, which covers computed fields absent from the backend's
    /// reported mapping.
    pub fn type_of(&self, entity: &dyn Entity, field: &str) -> Option<FieldType> {
        let mut segments: Vec<&str> = field.split('.').collect();

        // A leading segment naming the entity itself, or another namespace
        // known to the tree, selects the subtree to walk.
        let mut namespace = entity.namespace();
        if let Some(first) = segments.first() {
            if *first == entity.namespace() {
                segments.remove(0);
            } else if matches!(self.tree.get(first), Some(SchemaNode::Object { .. })) {
                namespace = *first;
                segments.remove(0);
            }
        }
        if segments.is_empty() {
            return entity.declared_field_type(field);
        }

        let mut current = match self.tree.get(namespace) {
            Some(SchemaNode::Object { children, .. }) => children,
            _ => return entity.declared_field_type(field),
        };

        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            match current.get(segment) {
                Some(SchemaNode::Leaf(mapping)) if i == last => return Some(mapping.field_type),
                Some(SchemaNode::Object { field_type, .. }) if i == last => {
                    return Some(*field_type)
                }
                Some(SchemaNode::Object { children, .. }) => current = children,
                _ => return entity.declared_field_type(field),
            }
        }
        entity.declared_field_type(field)
    }

    /// Describe an entity's own subtree, defaulting the identity field to a
    /// string leaf when the backend mapping does not declare it.
    pub fn describe(&self, entity: &dyn Entity) -> SchemaTree {
        let mut tree = match self.tree.get(entity.namespace()) {
            Some(SchemaNode::Object { children, .. }) => children.clone(),
            _ => SchemaTree::default(),
        };
        if tree.get(entity.identity_field()).is_none() {
            tree.insert(
                entity.identity_field(),
                SchemaNode::Leaf(FieldMapping {
                    field_type: FieldType::String,
                    format: None,
                }),
            );
        }
        tree
    }
}

/// Attributes from relational descriptions with no mapping counterpart.
const DROPPED_ATTRIBUTES: [&str; 6] = ["null", "collate", "length", "default", "key", "charset"];

/// Build a mapping `properties` body from a relational-style description
/// (`{field: {type: ..., ...}}`, recursively for sub-objects).
///
/// `overrides` may supply a complete per-field mapping, replacing the
/// attribute conversion for that field.
pub fn build_mapping(
    description: &Value,
    overrides: Option<&dyn Fn(&str) -> Option<Value>>,
) -> Value {
    let mut properties = Map::new();
    let Some(description) = description.as_object() else {
        return Value::Object(properties);
    };

    for (field, info) in description {
        let Some(info) = info.as_object() else {
            continue;
        };
        let is_nested_description = info.values().next().is_some_and(Value::is_object);
        if is_nested_description {
            let mut node = Map::new();
            node.insert(
                "properties".to_string(),
                build_mapping(&Value::Object(info.clone()), overrides),
            );
            node.insert("type".to_string(), Value::String("object".to_string()));
            properties.insert(field.clone(), Value::Object(node));
            continue;
        }

        if let Some(mapping) = overrides.and_then(|f| f(field)) {
            properties.insert(field.clone(), mapping);
            continue;
        }

        let mut converted = Map::new();
        for (attr, value) in info {
            if let Some(value) = convert_attribute(attr, value) {
                let is_date = attr == "type" && value == Value::String("date".to_string());
                converted.insert(attr.clone(), value);
                if is_date {
                    converted.insert(
                        "format".to_string(),
                        Value::String("yyyy-MM-dd HH:mm:ss".to_string()),
                    );
                }
            }
        }
        properties.insert(field.clone(), Value::Object(converted));
    }

    Value::Object(properties)
}

fn convert_attribute(attr: &str, value: &Value) -> Option<Value> {
    if DROPPED_ATTRIBUTES.contains(&attr) {
        return None;
    }
    if attr == "type" && value == &Value::String("datetime".to_string()) {
        return Some(Value::String("date".to_string()));
    }
    Some(value.clone())
}
