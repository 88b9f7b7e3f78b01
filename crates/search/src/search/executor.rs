//! Query execution.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{SearchError, SearchResult};
use crate::parse::{QueryParams, SearchAuth, SearchQueryParser};
use crate::query::{EntitiesQuery, QueryBuilder};
use crate::schema::SchemaCatalog;
use crate::settings::Settings;

use super::transport::{EsTransport, SearchTransport};

/// Executes query builders against the cluster through an injected
/// transport. Stateless per request; the only shared state is the
/// configuration and the transport handle.
pub struct Executor {
    settings: Settings,
    transport: Arc<dyn SearchTransport>,
}

impl Executor {
    /// Builds an executor over an injected transport.
    pub fn new(settings: Settings, transport: Arc<dyn SearchTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Builds an executor connected to the configured cluster.
    pub fn connect(settings: Settings) -> SearchResult<Self> {
        let transport = Arc::new(EsTransport::connect(&settings)?);
        Ok(Self::new(settings, transport))
    }

    /// The bound configuration.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn SearchTransport> {
        &self.transport
    }

    /// Runs one query: resolves indices and routing, builds the body,
    /// performs a single round-trip and returns the raw response, only
    /// optionally dehydrated.
    pub async fn search(&self, query: &dyn QueryBuilder) -> SearchResult<Value> {
        let parser = query.parser();
        let index = query.index()?;

        // The random sampler needs the foreground document count before
        // the real request can be built.
        let wants_significance =
            !parser.significant.is_empty() || parser.significant_text.is_some();
        let foreground = if self.settings.significant_terms_random_sampler && wants_significance
        {
            let probe = query.body_with_foreground(None)?;
            let count_body = serde_json::json!({"query": probe["query"]});
            Some(self.transport.count(&index, &count_body).await?)
        } else {
            None
        };

        let body = query.body_with_foreground(foreground)?;
        let routing = parser.routing_key(&self.settings.search_auth_field);
        tracing::debug!(%index, routing = ?routing, "executing search");
        let mut response = self
            .transport
            .search(&index, routing.as_deref(), &body)
            .await?;

        if parser.dehydrate {
            dehydrate(&mut response);
        }
        Ok(response)
    }

    /// High-level helper: searches with a `query_string` plus optional
    /// extra args in URL query-string form. Highlighting defaults on.
    pub async fn search_query_string(
        &self,
        catalog: &SchemaCatalog,
        q: &str,
        args: Option<&str>,
        auth: Option<SearchAuth>,
    ) -> SearchResult<Value> {
        let mut params = QueryParams::from_query_string(args.unwrap_or(""));
        if params.get("q").is_some() {
            return Err(SearchError::parameter("q", "args must not contain `q`"));
        }
        let mut pairs: Vec<(String, String)> = vec![("q".to_string(), q.to_string())];
        if params.get("highlight").is_none() {
            pairs.push(("highlight".to_string(), "true".to_string()));
        }
        pairs.extend(params.pairs().iter().cloned());
        params = QueryParams::new(pairs);
        let parser = SearchQueryParser::parse(&params, auth)?;
        let query = EntitiesQuery::new(&self.settings, catalog, &parser);
        self.search(&query).await
    }
}

/// Strips `_source.properties` from every hit, leaving the lightweight
/// metadata view.
fn dehydrate(response: &mut Value) {
    let Some(hits) = response["hits"]["hits"].as_array_mut() else {
        return;
    };
    for hit in hits {
        if let Some(source) = hit.get_mut("_source").and_then(Value::as_object_mut) {
            source.remove("properties");
        }
    }
}
