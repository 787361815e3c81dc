use crate::bulk::encode_bulk;
use crate::error::{BulkFailure, Result, SkilletError};
use crate::schema::{build_mapping, SchemaResolver, SchemaTree};
use crate::scroll::ScrollCursor;
use crate::types::{Entity, SearchResponse};
use http::StatusCode;
use indexmap::IndexMap;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use tracing::{debug, warn};
use url::Url;

/// Connection settings for one backend collection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend root, e.g. `http://localhost:9200`.
    pub base_url: String,
    /// Collection (backend index) this client is bound to.
    pub collection: String,
}

enum Payload<'a> {
    None,
    Json(&'a Value),
    /// Newline-delimited JSON for the bulk endpoint.
    Ndjson(String),
}

/// Synchronous HTTP client for one backend collection.
///
/// Every operation is one blocking request/response cycle; there are no
/// internal retries or timeouts. The client caches the collection's mapping
/// tree after the first schema lookup; re-mapping operations invalidate it.
/// Not thread-safe: use one client per thread of work.
#[derive(Debug)]
pub struct BackendClient {
    http: reqwest::blocking::Client,
    base_url: Url,
    collection: String,
    schema_cache: RefCell<Option<SchemaTree>>,
}

impl BackendClient {
    pub fn new(config: ClientConfig) -> Result<BackendClient> {
        if config.collection.is_empty() {
            return Err(SkilletError::Config(
                "a collection is required".to_string(),
            ));
        }
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| SkilletError::Config(format!("invalid base url: {e}")))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(BackendClient {
            http: reqwest::blocking::Client::new(),
            base_url,
            collection: config.collection,
            schema_cache: RefCell::new(None),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Execute a compiled search body against an entity type.
    pub fn search(&self, entity_type: &str, body: &Value) -> Result<SearchResponse> {
        let url = self.endpoint(&[Some(&self.collection), Some(entity_type), Some("_search")])?;
        let value = self.send(Method::GET, url, Payload::Json(body))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Submit an inner query node to the counting endpoint.
    pub fn count(&self, entity_type: &str, query: &Value) -> Result<u64> {
        let url = self.endpoint(&[Some(&self.collection), Some(entity_type), Some("_count")])?;
        let value = self.send(Method::GET, url, Payload::Json(query))?;
        value
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| SkilletError::Json("count missing from response".to_string()))
    }

    /// Fetch a single document by identity.
    pub fn get_document(&self, entity_type: &str, id: &str) -> Result<Value> {
        let url = self.endpoint(&[Some(&self.collection), Some(entity_type), Some(id)])?;
        self.send(Method::GET, url, Payload::None)
    }

    /// Index one document under its identity.
    pub fn index_document(&self, entity_type: &str, id: &str, document: &Value) -> Result<Value> {
        if id.is_empty() {
            return Err(SkilletError::MissingIdentity(entity_type.to_string()));
        }
        let url = self.endpoint(&[Some(&self.collection), Some(entity_type), Some(id)])?;
        self.send(Method::PUT, url, Payload::Json(document))
    }

    /// Delete one document by identity.
    pub fn delete_document(&self, entity_type: &str, id: &str) -> Result<Value> {
        let url = self.endpoint(&[Some(&self.collection), Some(entity_type), Some(id)])?;
        self.send(Method::DELETE, url, Payload::None)
    }

    /// Bulk-write a batch of documents into this client's collection.
    pub fn bulk(&self, entity_type: &str, documents: &IndexMap<String, Value>) -> Result<Value> {
        self.bulk_into(&self.collection, entity_type, documents)
    }

    /// Bulk-write a batch of documents into an arbitrary collection, used by
    /// re-indexing to copy across collections.
    pub fn bulk_into(
        &self,
        collection: &str,
        entity_type: &str,
        documents: &IndexMap<String, Value>,
    ) -> Result<Value> {
        let body = encode_bulk(collection, entity_type, documents)?;
        let url = self.endpoint(&[Some(collection), Some(entity_type), Some("_bulk")])?;
        self.send(Method::POST, url, Payload::Ndjson(body))
    }

    /// Fetch the collection's full mapping.
    pub fn get_mapping(&self) -> Result<Value> {
        let url = self.endpoint(&[Some(&self.collection), Some("_mapping")])?;
        self.send(Method::GET, url, Payload::None)
    }

    /// Put a mapping body for an entity type and invalidate the cached
    /// schema tree.
    pub fn put_mapping(&self, entity_type: &str, mapping: &Value) -> Result<Value> {
        let url = self.endpoint(&[Some(&self.collection), Some(entity_type), Some("_mapping")])?;
        let result = self.send(Method::PUT, url, Payload::Json(mapping));
        self.invalidate_schema();
        result
    }

    /// Map an entity from a relational-style description, with an optional
    /// per-field override callback.
    pub fn map_entity(
        &self,
        entity: &dyn Entity,
        description: &Value,
        overrides: Option<&dyn Fn(&str) -> Option<Value>>,
    ) -> Result<Value> {
        let properties = build_mapping(description, overrides);
        let mut inner = Map::new();
        inner.insert("properties".to_string(), properties);
        let mut mapping = Map::new();
        mapping.insert(entity.entity_type().to_string(), Value::Object(inner));
        self.put_mapping(entity.entity_type(), &Value::Object(mapping))
    }

    /// Check whether an entity type already has a mapping.
    pub fn check_mapping(&self, entity_type: &str) -> Result<bool> {
        let mapping = self.get_mapping()?;
        Ok(mapping
            .get(&self.collection)
            .and_then(|types| types.get(entity_type))
            .is_some())
    }

    /// Drop an entity type and its mapping, invalidating the cached schema.
    pub fn drop_mapping(&self, entity_type: &str) -> Result<Value> {
        let url = self.endpoint(&[Some(&self.collection), Some(entity_type)])?;
        let result = self.send(Method::DELETE, url, Payload::None);
        self.invalidate_schema();
        result
    }

    /// Create a collection, or alias an existing one when `alias` is given.
    pub fn create_collection(&self, name: &str, alias: Option<&str>) -> Result<Value> {
        match alias {
            Some(alias) => {
                let body = json!({ "actions": [{ "add": { "index": name, "alias": alias } }] });
                let url = self.endpoint(&[Some("_aliases")])?;
                self.send(Method::POST, url, Payload::Json(&body))
            }
            None => {
                let url = self.endpoint(&[Some(name)])?;
                self.send(Method::PUT, url, Payload::None)
            }
        }
    }

    pub fn drop_collection(&self, name: &str) -> Result<Value> {
        let url = self.endpoint(&[Some(name)])?;
        self.send(Method::DELETE, url, Payload::None)
    }

    /// A type resolver over the cached schema tree, fetching the mapping on
    /// first use.
    pub fn resolver(&self) -> Result<SchemaResolver> {
        if self.schema_cache.borrow().is_none() {
            let mapping = self.get_mapping()?;
            *self.schema_cache.borrow_mut() = Some(SchemaTree::from_mapping_response(&mapping));
        }
        let cache = self.schema_cache.borrow();
        Ok(SchemaResolver::new(cache.clone().unwrap_or_default()))
    }

    pub fn invalidate_schema(&self) {
        *self.schema_cache.borrow_mut() = None;
    }

    /// Open a scroll over the whole collection and return a cursor that
    /// streams every document across server-side paging windows.
    pub fn scan(&self, page_size: u64, ttl: &str) -> Result<ScrollCursor<'_>> {
        let mut url = self.endpoint(&[Some(&self.collection), Some("_search")])?;
        url.query_pairs_mut()
            .append_pair("search_type", "scan")
            .append_pair("scroll", ttl);
        let body = json!({ "query": { "match_all": {} }, "size": page_size });
        let value = self.send(Method::GET, url, Payload::Json(&body))?;
        let response: SearchResponse = serde_json::from_value(value)?;
        let total = response.total();
        let scroll_id = response.scroll_id.ok_or_else(|| {
            SkilletError::Json("scroll response missing _scroll_id".to_string())
        })?;
        Ok(ScrollCursor::new(self, scroll_id, total, page_size))
    }

    /// Request one scroll page by continuation handle and offset.
    pub(crate) fn scroll_page(
        &self,
        scroll_id: &str,
        from: u64,
        size: u64,
    ) -> Result<SearchResponse> {
        let url = self.endpoint(&[Some(&self.collection), Some("_search")])?;
        let body = json!({ "scroll_id": scroll_id, "from": from, "size": size });
        let value = self.send(Method::GET, url, Payload::Json(&body))?;
        Ok(serde_json::from_value(value)?)
    }

    fn endpoint(&self, segments: &[Option<&str>]) -> Result<Url> {
        let path = segments
            .iter()
            .filter_map(|s| *s)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        self.base_url
            .join(&path)
            .map_err(|e| SkilletError::Http(format!("invalid endpoint '{path}': {e}")))
    }

    fn send(&self, method: Method, url: Url, payload: Payload<'_>) -> Result<Value> {
        let mut request = self.http.request(method.clone(), url.clone());
        request = match payload {
            Payload::None => request,
            Payload::Json(body) => request.json(body),
            Payload::Ndjson(body) => request.body(body),
        };
        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        self.parse_response(&method, &url, status, &text)
    }

    /// Parse and classify a backend response. Errors are typed exactly once
    /// here; callers decide whether to retry.
    fn parse_response(
        &self,
        method: &Method,
        url: &Url,
        status: StatusCode,
        text: &str,
    ) -> Result<Value> {
        if text.is_empty() {
            return Err(SkilletError::Http(format!(
                "empty response from {method} {url}"
            )));
        }
        let body: Value = serde_json::from_str(text)?;

        // Bulk responses report success per item; collapse nothing, surface
        // every failed position.
        if let Some(items) = body.get("items").and_then(Value::as_array) {
            let mut failures = Vec::new();
            for (position, item) in items.iter().enumerate() {
                let Some(index) = item.get("index") else {
                    continue;
                };
                if let Some(error) = index.get("error") {
                    let id = index
                        .get("_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let error = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
                    warn!(position, id = %id, error = %error, "bulk item failed");
                    failures.push(BulkFailure {
                        position,
                        id,
                        error,
                    });
                }
            }
            if !failures.is_empty() {
                return Err(SkilletError::BulkItemError(failures));
            }
        }

        if let Some(error) = body.get("error") {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            let reported = body
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| StatusCode::from_u16(s as u16).ok())
                .unwrap_or(status);
            return Err(SkilletError::from_backend(&self.collection, reported, message));
        }

        if !status.is_success() {
            return Err(SkilletError::from_backend(
                &self.collection,
                status,
                text.to_string(),
            ));
        }

        let took = body.get("took").and_then(Value::as_u64).unwrap_or(0);
        let total = body
            .get("hits")
            .and_then(|h| h.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        debug!(%method, %url, took, total, "backend request");

        Ok(body)
    }
}
