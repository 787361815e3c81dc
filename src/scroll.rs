use crate::client::BackendClient;
use crate::error::Result;
use crate::types::Hit;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// A lazy, finite, forward-only stream of documents across server-side
/// paging windows.
///
/// Constructed by [`BackendClient::scan`] from the initial response's total
/// hit count and continuation handle. Each time the in-memory page runs out
/// and pages remain, the cursor issues one more page request carrying the
/// handle and an offset of `pages_consumed * page_size`. Once exhausted it
/// cannot be restarted; open a new scan instead.
pub struct ScrollCursor<'c> {
    client: &'c BackendClient,
    scroll_id: String,
    total: u64,
    page_size: u64,
    pages_consumed: u64,
    buffer: VecDeque<Hit>,
    failed: bool,
}

impl<'c> ScrollCursor<'c> {
    pub(crate) fn new(
        client: &'c BackendClient,
        scroll_id: String,
        total: u64,
        page_size: u64,
    ) -> ScrollCursor<'c> {
        ScrollCursor {
            client,
            scroll_id,
            total,
            page_size,
            pages_consumed: 0,
            buffer: VecDeque::new(),
            failed: false,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }

    pub fn pages_consumed(&self) -> u64 {
        self.pages_consumed
    }
}

impl Iterator for ScrollCursor<'_> {
    type Item = Result<Hit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.buffer.pop_front() {
                return Some(Ok(hit));
            }
            if self.failed || self.pages_consumed >= self.total_pages() {
                return None;
            }
            let from = self.pages_consumed * self.page_size;
            match self
                .client
                .scroll_page(&self.scroll_id, from, self.page_size)
            {
                Ok(response) => {
                    self.pages_consumed += 1;
                    self.buffer.extend(response.into_hits());
                }
                Err(e) => {
                    // The handle is single-use per window; don't re-request.
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Where re-indexed documents land.
#[derive(Debug, Clone)]
pub struct ReindexTarget {
    pub collection: String,
    pub entity_type: String,
}

/// Stream every document from a scroll cursor into a target collection and
/// entity type, keeping identities and optionally applying a transform to
/// each document body.
///
/// Documents are flushed as one bulk write per scroll page, so memory use is
/// bounded by a single page rather than the total result size. Returns the
/// number of documents copied.
pub fn reindex(
    mut cursor: ScrollCursor<'_>,
    target: &ReindexTarget,
    transform: Option<&dyn Fn(Value) -> Value>,
) -> Result<u64> {
    let client = cursor.client;
    let flush_size = cursor.page_size().max(1) as usize;
    let mut batch: IndexMap<String, Value> = IndexMap::new();
    let mut copied = 0u64;

    for hit in cursor.by_ref() {
        let hit = hit?;
        let document = hit.source.unwrap_or_else(|| Value::Object(Map::new()));
        let document = match transform {
            Some(transform) => transform(document),
            None => document,
        };
        batch.insert(hit.id, document);

        if batch.len() >= flush_size {
            client.bulk_into(&target.collection, &target.entity_type, &batch)?;
            copied += batch.len() as u64;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        client.bulk_into(&target.collection, &target.entity_type, &batch)?;
        copied += batch.len() as u64;
    }

    Ok(copied)
}
