use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::ExecutorConfig, error::TransportError};

/// Executes one GraphQL query with variables against the account service.
///
/// Returns the `data` member of the response.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, TransportError> {
        (**self).execute(query, variables).await
    }
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, TransportError> {
        (**self).execute(query, variables).await
    }
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

/// See https://spec.graphql.org/October2021/#sec-Response-Format
#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// [`QueryExecutor`] speaking to the NerdGraph HTTP endpoint.
#[derive(Debug, Clone)]
pub struct NerdGraphClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl NerdGraphClient {
    pub fn new(config: &ExecutorConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("nrms/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::new(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryExecutor for NerdGraphClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("API-Key", &self.api_key)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(|e| TransportError::new(format!("sending request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::new(format!(
                "{} returned {status}: {}",
                self.endpoint,
                body.trim()
            )));
        }

        let body = response
            .json::<GraphQlResponse>()
            .await
            .map_err(|e| TransportError::new(format!("parsing response: {e}")))?;
        into_data(body)
    }
}

fn into_data(body: GraphQlResponse) -> Result<Value, TransportError> {
    if !body.errors.is_empty() {
        let messages = body
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>();
        return Err(TransportError::new(messages.join("; ")));
    }
    body.data
        .ok_or_else(|| TransportError::new("response has neither data nor errors"))
}
