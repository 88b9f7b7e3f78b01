//! The bulk indexing pipeline.
//!
//! Two stages: a CPU-bound transform pool turning entities into index
//! actions, and a network-bound submit stage issuing `_bulk` requests.
//! A bounded channel between them provides backpressure; at most
//! `indexer_concurrency` transform tasks and bulk requests are in
//! flight at any time.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;

use crate::entity::Entity;
use crate::error::{BulkFailure, SearchError, SearchResult};
use crate::names::SymbolTable;
use crate::schema::SchemaCatalog;
use crate::search::SearchTransport;
use crate::settings::Settings;

use super::documents::{format_entity, IndexAction};
use super::routing::{index_name, Bucket};

/// Outcome counters for one bulk run. Item failures that were neither
/// version conflicts nor retryable are collected in `failures`.
#[derive(Debug, Default, Clone)]
pub struct BulkStats {
    /// Documents acknowledged by the cluster.
    pub indexed: u64,
    /// Version conflicts, dropped by design under last-writer-wins.
    pub conflicts: u64,
    /// Items re-submitted after a 429 or timeout.
    pub retried: u64,
    /// Item failures surfaced to the caller.
    pub failures: Vec<BulkFailure>,
}

impl BulkStats {
    fn merge(&mut self, other: BulkStats) {
        self.indexed += other.indexed;
        self.conflicts += other.conflicts;
        self.retried += other.retried;
        self.failures.extend(other.failures);
    }
}

/// Streams entities into the cluster in bulk.
pub struct Indexer {
    settings: Settings,
    transport: Arc<dyn SearchTransport>,
}

impl Indexer {
    /// Builds an indexer over an injected transport.
    pub fn new(settings: Settings, transport: Arc<dyn SearchTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Transforms and indexes entities for one dataset. Entities with
    /// abstract schemata are skipped; schema errors abort the run before
    /// any request is sent.
    pub async fn index_entities<I>(
        &self,
        catalog: &SchemaCatalog,
        symbols: &SymbolTable,
        dataset: &str,
        entities: I,
    ) -> SearchResult<BulkStats>
    where
        I: IntoIterator<Item = Entity>,
    {
        let chunk_size = self.settings.indexer_chunk_size.max(1);
        let concurrency = self.settings.indexer_concurrency.max(1);

        let mut batches: Vec<Vec<Entity>> = Vec::new();
        let mut current = Vec::with_capacity(chunk_size);
        for entity in entities {
            current.push(entity);
            if current.len() >= chunk_size {
                batches.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }

        let (tx, rx) = mpsc::channel::<IndexAction>(chunk_size * 2);
        let submit = self.submit_stream(rx);

        let produce = async {
            let mut transformed = futures::stream::iter(batches.into_iter().map(|batch| {
                let settings = self.settings.clone();
                let catalog = catalog.clone();
                let symbols = symbols.clone();
                let dataset = dataset.to_string();
                tokio::task::spawn_blocking(move || -> SearchResult<Vec<IndexAction>> {
                    let mut actions = Vec::with_capacity(batch.len());
                    for entity in &batch {
                        if let Some(action) =
                            format_entity(&settings, &catalog, &symbols, &dataset, entity)?
                        {
                            actions.push(action);
                        }
                    }
                    Ok(actions)
                })
            }))
            .buffer_unordered(concurrency);

            while let Some(joined) = transformed.next().await {
                let actions = joined.map_err(|e| SearchError::Transport {
                    message: format!("transform task failed: {}", e),
                    attempts: 0,
                })??;
                for action in actions {
                    // Blocks when the submit stage falls behind.
                    if tx.send(action).await.is_err() {
                        break;
                    }
                }
            }
            drop(tx);
            Ok::<(), SearchError>(())
        };

        let (stats, produced) = tokio::join!(submit, produce);
        produced?;
        let stats = stats?;
        tracing::info!(
            dataset,
            indexed = stats.indexed,
            conflicts = stats.conflicts,
            retried = stats.retried,
            failed = stats.failures.len(),
            "bulk indexing completed"
        );
        Ok(stats)
    }

    /// Indexes pre-built actions.
    pub async fn index_actions<I>(&self, actions: I) -> SearchResult<BulkStats>
    where
        I: IntoIterator<Item = IndexAction>,
    {
        let chunk_size = self.settings.indexer_chunk_size.max(1);
        let (tx, rx) = mpsc::channel::<IndexAction>(chunk_size * 2);
        let submit = self.submit_stream(rx);
        let produce = async {
            for action in actions {
                if tx.send(action).await.is_err() {
                    break;
                }
            }
            drop(tx);
        };
        let (stats, ()) = tokio::join!(submit, produce);
        stats
    }

    /// Consumes the channel, chunking by document count and byte size,
    /// with at most `indexer_concurrency` bulk requests in flight.
    async fn submit_stream(&self, rx: mpsc::Receiver<IndexAction>) -> SearchResult<BulkStats> {
        let chunk_size = self.settings.indexer_chunk_size.max(1);
        let max_bytes = self.settings.indexer_max_chunk_bytes.max(1);
        let concurrency = self.settings.indexer_concurrency.max(1);

        let chunks = futures::stream::unfold((rx, false), move |(mut rx, done)| async move {
            if done {
                return None;
            }
            let mut chunk: Vec<IndexAction> = Vec::new();
            let mut bytes = 0usize;
            while let Some(action) = rx.recv().await {
                bytes += action.approx_bytes();
                chunk.push(action);
                if chunk.len() >= chunk_size || bytes >= max_bytes {
                    return Some((chunk, (rx, false)));
                }
            }
            if chunk.is_empty() {
                None
            } else {
                Some((chunk, (rx, true)))
            }
        });

        let mut results = Box::pin(
            chunks
                .map(|chunk| self.submit_chunk(chunk))
                .buffer_unordered(concurrency),
        );

        let mut stats = BulkStats::default();
        while let Some(outcome) = results.next().await {
            stats.merge(outcome?);
        }
        Ok(stats)
    }

    /// Submits one chunk, triaging per-item outcomes: version conflicts
    /// are dropped, 429s and timeouts retried with exponential backoff,
    /// anything else collected for the caller. Item errors never halt
    /// the pipeline.
    async fn submit_chunk(&self, chunk: Vec<IndexAction>) -> SearchResult<BulkStats> {
        let mut stats = BulkStats::default();
        let mut pending = chunk;
        let mut attempt = 0u32;

        while !pending.is_empty() {
            let mut lines = Vec::with_capacity(pending.len() * 2);
            for action in &pending {
                lines.push(action.meta());
                lines.push(action.source.clone());
            }
            let response = self.transport.bulk(lines).await?;

            let mut retry: Vec<IndexAction> = Vec::new();
            let items = response["items"].as_array().cloned().unwrap_or_default();
            for (item, action) in items.iter().zip(pending.iter()) {
                let info = &item["index"];
                let status = info["status"].as_u64().unwrap_or(200) as u16;
                if status < 300 {
                    stats.indexed += 1;
                    continue;
                }
                let error_type = info["error"]["type"].as_str().unwrap_or("unknown");
                if error_type == "version_conflict_engine_exception" {
                    stats.conflicts += 1;
                } else if status == 429 || error_type.contains("timeout") {
                    retry.push(action.clone());
                } else {
                    stats.failures.push(BulkFailure {
                        id: action.id.clone(),
                        status,
                        error_type: error_type.to_string(),
                        reason: info["error"]["reason"]
                            .as_str()
                            .unwrap_or("bulk item rejected")
                            .to_string(),
                    });
                }
            }
            if items.len() < pending.len() {
                tracing::warn!(
                    expected = pending.len(),
                    received = items.len(),
                    "short bulk response"
                );
            }

            if retry.is_empty() {
                break;
            }
            attempt += 1;
            if attempt > self.settings.max_retries {
                for action in retry {
                    stats.failures.push(BulkFailure {
                        id: action.id,
                        status: 429,
                        error_type: "rejected".to_string(),
                        reason: "retry budget exhausted".to_string(),
                    });
                }
                break;
            }
            stats.retried += retry.len() as u64;
            let backoff = Duration::from_millis(500 * 2u64.pow(attempt.min(6)));
            tracing::debug!(
                attempt,
                items = retry.len(),
                backoff_ms = backoff.as_millis() as u64,
                "retrying rejected bulk items"
            );
            tokio::time::sleep(backoff).await;
            pending = retry;
        }
        Ok(stats)
    }

    /// All configured read indices across every bucket.
    fn all_indices(&self) -> String {
        let mut names = Vec::new();
        for bucket in Bucket::all() {
            for version in &self.settings.index_read {
                names.push(index_name(&self.settings, bucket, version));
            }
        }
        names.join(",")
    }

    /// Disables refresh for a heavy load; pair with
    /// [`Indexer::restore_refresh`].
    pub async fn disable_refresh(&self) -> SearchResult<()> {
        let body = json!({"index": {"refresh_interval": "-1"}});
        self.transport.put_settings(&self.all_indices(), &body).await
    }

    /// Restores the configured refresh interval.
    pub async fn restore_refresh(&self) -> SearchResult<()> {
        let body = json!({
            "index": {"refresh_interval": self.settings.index_refresh_interval}
        });
        self.transport.put_settings(&self.all_indices(), &body).await
    }

    /// Deletes every document of a dataset across all buckets.
    pub async fn delete_dataset(&self, dataset: &str) -> SearchResult<u64> {
        let body = json!({"query": {"term": {"dataset": dataset}}});
        let response = self
            .transport
            .delete_by_query(&self.all_indices(), &body)
            .await?;
        Ok(response["deleted"].as_u64().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    /// Replays canned bulk responses and records submitted lines.
    struct FakeTransport {
        bulk_requests: Mutex<Vec<Vec<Value>>>,
        responses: Mutex<Vec<Value>>,
    }

    impl FakeTransport {
        fn new(responses: Vec<Value>) -> Self {
            Self {
                bulk_requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            }
        }

        fn ok_response(count: usize) -> Value {
            let items: Vec<Value> = (0..count)
                .map(|_| json!({"index": {"status": 201}}))
                .collect();
            json!({"errors": false, "items": items})
        }
    }

    #[async_trait]
    impl SearchTransport for FakeTransport {
        async fn search(
            &self,
            _indices: &str,
            _routing: Option<&str>,
            _body: &Value,
        ) -> SearchResult<Value> {
            Ok(json!({}))
        }

        async fn count(&self, _indices: &str, _body: &Value) -> SearchResult<u64> {
            Ok(0)
        }

        async fn bulk(&self, lines: Vec<Value>) -> SearchResult<Value> {
            let count = lines.len() / 2;
            self.bulk_requests.lock().push(lines);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(Self::ok_response(count))
            } else {
                Ok(responses.remove(0))
            }
        }

        async fn delete_by_query(&self, _indices: &str, _body: &Value) -> SearchResult<Value> {
            Ok(json!({"deleted": 3}))
        }

        async fn put_settings(&self, _indices: &str, _body: &Value) -> SearchResult<()> {
            Ok(())
        }
    }

    fn entity(id: &str) -> Entity {
        Entity::new(id, "Person").with_property("name", ["Jane Doe"])
    }

    fn fixtures() -> (Settings, SchemaCatalog, SymbolTable) {
        let mut settings = Settings::from_env();
        settings.indexer_chunk_size = 2;
        settings.indexer_concurrency = 2;
        (settings, SchemaCatalog::default_model(), SymbolTable::new())
    }

    #[tokio::test]
    async fn test_index_entities_chunks() {
        let (settings, catalog, symbols) = fixtures();
        let transport = Arc::new(FakeTransport::new(vec![]));
        let indexer = Indexer::new(settings, transport.clone());

        let entities: Vec<Entity> = (0..5).map(|i| entity(&format!("p{}", i))).collect();
        let stats = indexer
            .index_entities(&catalog, &symbols, "test_ds", entities)
            .await
            .unwrap();
        assert_eq!(stats.indexed, 5);
        assert!(stats.failures.is_empty());

        // Five documents in chunks of two mean three bulk requests.
        let requests = transport.bulk_requests.lock();
        assert_eq!(requests.len(), 3);
        // Alternating meta and source lines.
        let meta = &requests.iter().flatten().next().unwrap()["index"];
        assert_eq!(meta["_index"], "openaleph-entity-things-v1");
        assert_eq!(meta["routing"], "test_ds");
    }

    #[tokio::test]
    async fn test_version_conflicts_dropped() {
        let (mut settings, catalog, symbols) = fixtures();
        settings.indexer_chunk_size = 10;
        let response = json!({"errors": true, "items": [
            {"index": {"status": 201}},
            {"index": {"status": 409, "error": {"type": "version_conflict_engine_exception", "reason": "conflict"}}},
        ]});
        let transport = Arc::new(FakeTransport::new(vec![response]));
        let indexer = Indexer::new(settings, transport);

        let stats = indexer
            .index_entities(&catalog, &symbols, "test_ds", vec![entity("a"), entity("b")])
            .await
            .unwrap();
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.conflicts, 1);
        assert!(stats.failures.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_items_retried() {
        let (mut settings, catalog, symbols) = fixtures();
        settings.indexer_chunk_size = 10;
        let first = json!({"errors": true, "items": [
            {"index": {"status": 201}},
            {"index": {"status": 429, "error": {"type": "es_rejected_execution_exception", "reason": "queue full"}}},
        ]});
        let transport = Arc::new(FakeTransport::new(vec![first]));
        let indexer = Indexer::new(settings, transport.clone());

        let stats = indexer
            .index_entities(&catalog, &symbols, "test_ds", vec![entity("a"), entity("b")])
            .await
            .unwrap();
        // The rejected item is retried and succeeds on the second pass.
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.retried, 1);
        assert_eq!(transport.bulk_requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_items_surface() {
        let (mut settings, catalog, symbols) = fixtures();
        settings.indexer_chunk_size = 10;
        let response = json!({"errors": true, "items": [
            {"index": {"status": 400, "error": {"type": "mapper_parsing_exception", "reason": "bad field"}}},
            {"index": {"status": 201}},
        ]});
        let transport = Arc::new(FakeTransport::new(vec![response]));
        let indexer = Indexer::new(settings, transport);

        let stats = indexer
            .index_entities(&catalog, &symbols, "test_ds", vec![entity("a"), entity("b")])
            .await
            .unwrap();
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.failures[0].error_type, "mapper_parsing_exception");
    }

    #[tokio::test]
    async fn test_delete_dataset() {
        let (settings, _, _) = fixtures();
        let transport = Arc::new(FakeTransport::new(vec![]));
        let indexer = Indexer::new(settings, transport);
        assert_eq!(indexer.delete_dataset("test_ds").await.unwrap(), 3);
    }
}
