use crate::client::BackendClient;
use crate::error::{Result, SkilletError};
use crate::types::{Entity, Identity};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Explicit transaction state, threaded through the writer instead of being
/// scattered across instance fields. Merge sequences are testable without a
/// live backend.
#[derive(Debug, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Active(ActiveBatch),
}

/// Accumulated documents for one open transaction. The first merge
/// establishes the entity type; every later merge must target the same type.
#[derive(Debug, Default)]
pub struct ActiveBatch {
    entity_type: Option<String>,
    current_id: Option<Identity>,
    documents: IndexMap<Identity, Value>,
}

/// Accumulates per-identity document fragments across multiple save calls
/// within one logical operation and flushes them as one bulk write.
///
/// A single logical save can touch several related entities that must land
/// in one physical document (a parent and its eagerly-saved children), and
/// batch saves of many entities should use one network round trip; both go
/// through this writer. Not safe for concurrent use: one writer per batch.
#[derive(Debug, Default)]
pub struct BatchWriter {
    state: TransactionState,
}

impl BatchWriter {
    pub fn new() -> BatchWriter {
        BatchWriter::default()
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.state, TransactionState::Active(_))
    }

    /// Reset state and enter a transaction.
    pub fn begin(&mut self) {
        self.state = TransactionState::Active(ActiveBatch::default());
    }

    /// Discard all accumulated state and return to idle.
    pub fn rollback(&mut self) {
        self.state = TransactionState::Idle;
    }

    /// Merge a partial document (`{namespace: fields}`) for `identity` into
    /// the open transaction.
    ///
    /// The first call establishes the transaction's entity type and current
    /// identity. A matching identity deep-merges into the accumulated
    /// document; a new identity starts a fresh document without discarding
    /// prior ones; a different entity type is a programming error.
    pub fn merge_document(
        &mut self,
        entity_type: &str,
        identity: &str,
        partial: Value,
    ) -> Result<()> {
        let TransactionState::Active(batch) = &mut self.state else {
            return Err(SkilletError::TransactionInactive);
        };
        if identity.is_empty() {
            return Err(SkilletError::MissingIdentity(entity_type.to_string()));
        }

        match &batch.entity_type {
            None => batch.entity_type = Some(entity_type.to_string()),
            Some(active) if active != entity_type => {
                return Err(SkilletError::TransactionTypeConflict {
                    active: active.clone(),
                    attempted: entity_type.to_string(),
                });
            }
            Some(_) => {}
        }

        if batch.current_id.as_deref() != Some(identity) {
            batch.current_id = Some(identity.to_string());
        }

        let document = batch
            .documents
            .entry(identity.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        deep_merge(document, partial);
        Ok(())
    }

    /// The accumulated document for the current identity.
    pub fn current_document(&self) -> Option<&Value> {
        let TransactionState::Active(batch) = &self.state else {
            return None;
        };
        batch
            .current_id
            .as_ref()
            .and_then(|id| batch.documents.get(id))
    }

    /// All accumulated documents, keyed by identity in insertion order.
    pub fn documents(&self) -> Option<&IndexMap<Identity, Value>> {
        match &self.state {
            TransactionState::Active(batch) => Some(&batch.documents),
            TransactionState::Idle => None,
        }
    }

    /// Bulk-write every accumulated document and return to idle regardless
    /// of outcome. There is no auto-rollback beyond the state reset: callers
    /// decide whether to retry on failure, and per-item failures surface as
    /// [`SkilletError::BulkItemError`].
    pub fn commit(&mut self, client: &BackendClient) -> Result<Value> {
        let state = std::mem::take(&mut self.state);
        let TransactionState::Active(batch) = state else {
            return Err(SkilletError::TransactionInactive);
        };
        let Some(entity_type) = batch.entity_type else {
            // begin() followed by commit() with nothing merged.
            return Ok(Value::Bool(true));
        };
        client.bulk(&entity_type, &batch.documents)
    }

    /// Save one entity's field map: merge into the open transaction, or
    /// index directly as a single document when no transaction is active.
    /// The identity is read from the fields under the entity's identity
    /// field; a missing or empty identity is a hard error.
    pub fn save(
        &mut self,
        client: &BackendClient,
        entity: &dyn Entity,
        fields: Value,
    ) -> Result<Value> {
        let identity = find_identity(entity, &fields)
            .ok_or_else(|| SkilletError::MissingIdentity(entity.entity_type().to_string()))?;

        let mut partial = Map::new();
        partial.insert(entity.namespace().to_string(), fields);
        let partial = Value::Object(partial);

        if self.in_transaction() {
            self.merge_document(entity.entity_type(), &identity, partial)?;
            return Ok(Value::Bool(true));
        }
        client.index_document(entity.entity_type(), &identity, &partial)
    }
}

fn find_identity(entity: &dyn Entity, fields: &Value) -> Option<String> {
    let id = fields.get(entity.identity_field())?;
    let id = match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Deep union of two documents: object leaves merge recursively, everything
/// else is replaced by the later write.
pub fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}
