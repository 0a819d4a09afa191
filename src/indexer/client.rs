//! The Indexed Query Client (Component A, §4.A). A paginated, optionally
//! block-pinned HTTP client over the indexed read model's GraphQL-shaped JSON
//! POST protocol.
//!
//! Grounded on the teacher's `src/external_rpc.rs` `RpcClient`: one shared,
//! pre-configured `reqwest::Client`, a small typed request/response pair, and
//! errors that name what step of the call failed.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

use super::types::{page_variables, reassemble, BlockPin, GraphQlRequest, GraphQlResponse, PAGE_SIZE};

/// Capability set consumed by the rest of the crate. A trait object so tests
/// can inject fakes (§9 "Polymorphic client interfaces").
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn execute_query(&self, query: &str, variables: Value) -> Result<Value>;

    async fn execute_query_at_block(
        &self,
        query: &str,
        variables: Value,
        block: u64,
    ) -> Result<Value>;

    async fn execute_paginated_query(
        &self,
        query_template: &str,
        variables: Value,
        entity_field: &str,
    ) -> Result<Value>;

    async fn execute_paginated_query_at_block(
        &self,
        query_template: &str,
        variables: Value,
        entity_field: &str,
        block: u64,
    ) -> Result<Value>;

    async fn health_check(&self) -> Result<bool>;

    /// Typed-decode convenience built on top of `execute_query`.
    async fn execute_query_typed<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T>
    where
        Self: Sized,
    {
        let value = self.execute_query(query, variables).await?;
        serde_json::from_value(value)
            .map_err(|e| OrchestratorError::QueryDecodeError(format!("decoding response: {e}")))
    }
}

/// Real implementation backed by `reqwest`.
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GraphQlClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OrchestratorError::ConfigError(format!("building indexer HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    async fn post(&self, request: &GraphQlRequest) -> Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| OrchestratorError::QueryTransportError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::QueryTransportError(format!(
                "indexer returned HTTP {}",
                response.status()
            )));
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::QueryDecodeError(format!("decoding envelope: {e}")))?;

        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(OrchestratorError::QueryResponseError(joined));
        }

        body.data
            .ok_or_else(|| OrchestratorError::QueryDecodeError("missing data field".to_string()))
    }

    async fn paginated(
        &self,
        query_template: &str,
        variables: Value,
        entity_field: &str,
        block: Option<u64>,
    ) -> Result<Value> {
        let mut rows: Vec<Value> = Vec::new();
        let mut skip = 0u64;

        loop {
            let page_vars = page_variables(&variables, PAGE_SIZE, skip);
            let request = GraphQlRequest {
                query: query_template.to_string(),
                variables: page_vars,
                block: block.map(|number| BlockPin { number }),
            };

            let data = self.post(&request).await.map_err(|e| {
                annotate_pagination_error(e, entity_field, skip, block)
            })?;

            let page_rows = data
                .get(entity_field)
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| {
                    OrchestratorError::QueryDecodeError(format!(
                        "entity `{entity_field}` missing or not an array at skip={skip}"
                    ))
                })?;

            let page_len = page_rows.len() as u64;
            rows.extend(page_rows);

            if page_len == 0 || page_len < PAGE_SIZE {
                break;
            }
            skip += PAGE_SIZE;
        }

        Ok(reassemble(entity_field, rows))
    }
}

fn annotate_pagination_error(
    err: OrchestratorError,
    entity_field: &str,
    skip: u64,
    block: Option<u64>,
) -> OrchestratorError {
    let block_note = block
        .map(|b| format!(", block={b}"))
        .unwrap_or_default();
    match err {
        OrchestratorError::QueryDecodeError(msg) => OrchestratorError::QueryDecodeError(format!(
            "{msg} (entity=`{entity_field}`, skip={skip}{block_note})"
        )),
        other => other,
    }
}

#[async_trait]
impl QueryClient for GraphQlClient {
    async fn execute_query(&self, query: &str, variables: Value) -> Result<Value> {
        self.post(&GraphQlRequest {
            query: query.to_string(),
            variables,
            block: None,
        })
        .await
    }

    async fn execute_query_at_block(
        &self,
        query: &str,
        variables: Value,
        block: u64,
    ) -> Result<Value> {
        self.post(&GraphQlRequest {
            query: query.to_string(),
            variables,
            block: Some(BlockPin { number: block }),
        })
        .await
    }

    async fn execute_paginated_query(
        &self,
        query_template: &str,
        variables: Value,
        entity_field: &str,
    ) -> Result<Value> {
        self.paginated(query_template, variables, entity_field, None).await
    }

    async fn execute_paginated_query_at_block(
        &self,
        query_template: &str,
        variables: Value,
        entity_field: &str,
        block: u64,
    ) -> Result<Value> {
        self.paginated(query_template, variables, entity_field, Some(block))
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        let data = self
            .execute_query(super::queries::INTROSPECTION_QUERY, serde_json::json!({}))
            .await?;
        let root_name = data
            .get("__schema")
            .and_then(|s| s.get("queryType"))
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str);
        Ok(root_name == Some("Query"))
    }
}
