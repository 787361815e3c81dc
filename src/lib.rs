//! # Skillet
//!
//! A translation and batching layer between an ORM-style query model and a
//! document search backend speaking HTTP/JSON. Skillet compiles generic
//! query descriptions into the backend's filtered/boolean query DSL, merges
//! multi-entity saves into single documents flushed through the bulk
//! endpoint, and streams large result sets through server-side scroll
//! windows.
//!
//! ## Compiling a query
//!
//! ```rust,no_run
//! use serde_json::json;
//! use skillet::{CompiledRequest, Entity, FieldType, QueryCompiler, QuerySpec};
//!
//! struct Article;
//!
//! impl Entity for Article {
//!     fn namespace(&self) -> &str { "Article" }
//!     fn entity_type(&self) -> &str { "articles" }
//! }
//!
//! # fn main() -> skillet::Result<()> {
//! let client = skillet::BackendClient::new(skillet::ClientConfig {
//!     base_url: "http://localhost:9200".to_string(),
//!     collection: "content".to_string(),
//! })?;
//!
//! let mut spec = QuerySpec::default();
//! spec.conditions.insert("Article.published >=".to_string(), json!("2011-01-01"));
//! spec.limit = Some(25);
//!
//! let resolver = client.resolver()?;
//! match QueryCompiler::new(&resolver, &Article).compile(&spec)? {
//!     CompiledRequest::Search(query) => {
//!         let results = client.search(Article.entity_type(), &query.body())?;
//!         println!("{} hits", results.total());
//!     }
//!     CompiledRequest::Lookup(id) => {
//!         // Single identity-equality condition: fetch the document directly.
//!         let doc = client.get_document(Article.entity_type(), id.as_str().unwrap())?;
//!         println!("{doc}");
//!     }
//!     CompiledRequest::Count(query) => {
//!         println!("{} total", client.count(Article.entity_type(), &query)?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Batched writes
//!
//! ```rust,no_run
//! use serde_json::json;
//! use skillet::BatchWriter;
//! # use skillet::{Entity};
//! # struct Article;
//! # impl Entity for Article {
//! #     fn namespace(&self) -> &str { "Article" }
//! #     fn entity_type(&self) -> &str { "articles" }
//! # }
//!
//! # fn main() -> skillet::Result<()> {
//! # let client = skillet::BackendClient::new(skillet::ClientConfig {
//! #     base_url: "http://localhost:9200".to_string(),
//! #     collection: "content".to_string(),
//! # })?;
//! let mut writer = BatchWriter::new();
//! writer.begin();
//! writer.save(&client, &Article, json!({"id": "1", "title": "first"}))?;
//! writer.save(&client, &Article, json!({"id": "2", "title": "second"}))?;
//! writer.commit(&client)?; // one bulk request for both documents
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod client;
pub mod error;
pub mod query;
pub mod schema;
pub mod scroll;
pub mod transaction;
pub mod types;

pub use client::{BackendClient, ClientConfig};
pub use error::{BulkFailure, Result, SkilletError};
pub use query::{
    CompiledConditions, CompiledQuery, CompiledRequest, ConditionParser, FilterNode, QueryCompiler,
    RangeOperator, RequestShape,
};
pub use schema::{SchemaNode, SchemaResolver, SchemaTree};
pub use scroll::{reindex, ReindexTarget, ScrollCursor};
pub use transaction::{BatchWriter, TransactionState};
pub use types::{
    Direction, Entity, FieldType, Hit, Identity, QueryKind, QuerySpec, RequestContext,
    SearchResponse, SortSpec,
};
