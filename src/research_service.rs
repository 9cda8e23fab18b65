use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub rag: String,
    pub agent: String,
}

/// Any failed round trip to the research backend.
#[derive(Debug, Error)]
pub enum RequestFailed {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(StatusCode),
    #[error("malformed response payload: {0}")]
    MalformedPayload(String),
}

/// Backend that answers a research query with a RAG and an agent answer.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    async fn query(&self, query: &str) -> Result<QueryResponse, RequestFailed>;
}

#[derive(Debug, Clone)]
pub struct ResearchServiceClient {
    client: Client,
    endpoint: String,
}

impl ResearchServiceClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ResearchBackend for ResearchServiceClient {
    async fn query(&self, query: &str) -> Result<QueryResponse, RequestFailed> {
        let request = QueryRequest {
            query: query.to_string(),
        };

        debug!("POST {} ({} chars)", self.endpoint, request.query.len());
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RequestFailed::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestFailed::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RequestFailed::Transport(e.to_string()))?;
        serde_json::from_slice::<QueryResponse>(&body)
            .map_err(|e| RequestFailed::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_has_only_query_field() {
        let body = serde_json::to_value(QueryRequest {
            query: String::new(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "query": "" }));
    }

    #[test]
    fn response_requires_both_string_fields() {
        let ok: QueryResponse =
            serde_json::from_str(r#"{"rag": "Summary X", "agent": "Plan Y", "extra": 1}"#).unwrap();
        assert_eq!(ok.rag, "Summary X");
        assert_eq!(ok.agent, "Plan Y");

        assert!(serde_json::from_str::<QueryResponse>(r#"{"rag": "only"}"#).is_err());
        assert!(serde_json::from_str::<QueryResponse>(r#"{"rag": 1, "agent": "x"}"#).is_err());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_failure() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let endpoint = format!("http://127.0.0.1:{}/query", port);
        let client = ResearchServiceClient::new(endpoint.clone());
        assert_eq!(client.endpoint(), endpoint);
        let err = client.query("transformer scaling laws").await.unwrap_err();
        assert!(matches!(err, RequestFailed::Transport(_)));
    }
}
