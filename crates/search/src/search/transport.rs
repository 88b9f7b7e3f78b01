//! The cluster transport seam.
//!
//! The core produces request bodies; this trait is the only place they
//! cross the wire. Production uses [`EsTransport`] over the official
//! client; tests inject recording fakes.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::IndicesPutSettingsParts;
use elasticsearch::{CountParts, DeleteByQueryParts, Elasticsearch, SearchParts};
use serde_json::Value;

use crate::error::{SearchError, SearchResult};
use crate::settings::Settings;

/// Posts JSON bodies to an Elasticsearch-compatible cluster.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// `POST /{indices}/_search?routing=<k>`; the response is returned
    /// unchanged.
    async fn search(
        &self,
        indices: &str,
        routing: Option<&str>,
        body: &Value,
    ) -> SearchResult<Value>;

    /// `POST /{indices}/_count` with a query body.
    async fn count(&self, indices: &str, body: &Value) -> SearchResult<u64>;

    /// `POST /_bulk` with alternating action/source lines.
    async fn bulk(&self, lines: Vec<Value>) -> SearchResult<Value>;

    /// `POST /{indices}/_delete_by_query`.
    async fn delete_by_query(&self, indices: &str, body: &Value) -> SearchResult<Value>;

    /// `PUT /{indices}/_settings`, used to toggle the refresh interval
    /// around bulk loads.
    async fn put_settings(&self, indices: &str, body: &Value) -> SearchResult<()>;
}

/// Transport over the official Elasticsearch client, with retry and
/// backoff for transient failures.
pub struct EsTransport {
    client: Elasticsearch,
    max_retries: u32,
}

impl EsTransport {
    /// Builds a transport from settings. Connects to the first configured
    /// node (single-node connection pool).
    pub fn connect(settings: &Settings) -> SearchResult<Self> {
        let nodes = settings.nodes();
        let url = nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());
        let parsed: elasticsearch::http::Url =
            url.parse().map_err(|e| SearchError::Transport {
                message: format!("invalid cluster URL `{}`: {}", url, e),
                attempts: 0,
            })?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool)
            .timeout(Duration::from_secs(settings.timeout))
            .build()
            .map_err(|e| SearchError::Transport {
                message: format!("failed to build transport: {}", e),
                attempts: 0,
            })?;
        tracing::info!(nodes = ?nodes, "connected to Elasticsearch");
        Ok(Self {
            client: Elasticsearch::new(transport),
            max_retries: settings.max_retries,
        })
    }

    /// Runs a request, retrying connection errors, 429 and 5xx with
    /// exponential backoff. Other 4xx responses surface immediately,
    /// carrying the request body for diagnosis.
    async fn with_retry<F, Fut>(&self, request: Option<&Value>, send: F) -> SearchResult<Value>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Response, elasticsearch::Error>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = send().await;
            match outcome {
                Ok(response) => {
                    let status = response.status_code().as_u16();
                    if response.status_code().is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            SearchError::Transport {
                                message: format!("failed to decode response: {}", e),
                                attempts: attempt,
                            }
                        });
                    }
                    let body = response.json::<Value>().await.unwrap_or(Value::Null);
                    if status == 429 || status >= 500 {
                        if attempt > self.max_retries {
                            return Err(SearchError::Transport {
                                message: format!("cluster returned status {}", status),
                                attempts: attempt,
                            });
                        }
                    } else {
                        let reason = body["error"]["reason"]
                            .as_str()
                            .unwrap_or("request rejected")
                            .to_string();
                        return Err(SearchError::Cluster {
                            status,
                            reason,
                            body: Some(body),
                            request: request.cloned(),
                        });
                    }
                }
                Err(e) => {
                    if attempt > self.max_retries {
                        return Err(SearchError::Transport {
                            message: e.to_string(),
                            attempts: attempt,
                        });
                    }
                }
            }
            let backoff = Duration::from_millis(250 * 2u64.pow(attempt.min(6)));
            tracing::debug!(attempt, backoff_ms = backoff.as_millis() as u64, "retrying request");
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait]
impl SearchTransport for EsTransport {
    async fn search(
        &self,
        indices: &str,
        routing: Option<&str>,
        body: &Value,
    ) -> SearchResult<Value> {
        let index_list: Vec<&str> = indices.split(',').collect();
        let routing_list: Vec<&str> = routing.into_iter().collect();
        self.with_retry(Some(body), || {
            let mut request = self
                .client
                .search(SearchParts::Index(&index_list))
                .body(body.clone())
                .ignore_unavailable(true);
            if !routing_list.is_empty() {
                request = request.routing(&routing_list);
            }
            request.send()
        })
        .await
    }

    async fn count(&self, indices: &str, body: &Value) -> SearchResult<u64> {
        let index_list: Vec<&str> = indices.split(',').collect();
        let response = self
            .with_retry(Some(body), || {
                self.client
                    .count(CountParts::Index(&index_list))
                    .body(body.clone())
                    .ignore_unavailable(true)
                    .send()
            })
            .await?;
        Ok(response["count"].as_u64().unwrap_or(0))
    }

    async fn bulk(&self, lines: Vec<Value>) -> SearchResult<Value> {
        self.with_retry(None, || {
            let body: Vec<JsonBody<Value>> =
                lines.iter().cloned().map(JsonBody::new).collect();
            self.client
                .bulk(elasticsearch::BulkParts::None)
                .body(body)
                .send()
        })
        .await
    }

    async fn delete_by_query(&self, indices: &str, body: &Value) -> SearchResult<Value> {
        let index_list: Vec<&str> = indices.split(',').collect();
        self.with_retry(Some(body), || {
            self.client
                .delete_by_query(DeleteByQueryParts::Index(&index_list))
                .body(body.clone())
                .conflicts(elasticsearch::params::Conflicts::Proceed)
                .send()
        })
        .await
    }

    async fn put_settings(&self, indices: &str, body: &Value) -> SearchResult<()> {
        let index_list: Vec<&str> = indices.split(',').collect();
        let indices_api = self.client.indices();
        self.with_retry(Some(body), || {
            indices_api
                .put_settings(IndicesPutSettingsParts::Index(&index_list))
                .body(body.clone())
                .send()
        })
        .await?;
        Ok(())
    }
}
