use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{BackendError, HostingBackend, HostingReply};
use crate::models::GameyeMatchRecord;

/// Gameye hosting API client
///
/// Only transports requests; interpreting allocation status codes is left to
/// the provisioning driver.
pub struct GameyeClient {
    base_url: String,
    token: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct QueryMatchesResponse {
    #[serde(rename = "match", alias = "Match", default)]
    matches: Vec<GameyeMatchRecord>,
}

impl GameyeClient {
    /// Create a new Gameye client
    pub fn new(base_url: String, token: String) -> Result<Self, BackendError> {
        // No client-wide timeout: start-match sets its own, listing calls use the default below.
        let client = Client::builder().build()?;

        Ok(Self { base_url, token, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl HostingBackend for GameyeClient {
    async fn start_match(&self, body: &str, timeout: Duration) -> Result<HostingReply, BackendError> {
        tracing::debug!("Gameye start-match body: {}", body);

        let response = self
            .client
            .post(self.url("command/start-match"))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!("Gameye start-match replied {}: {}", status, body);

        Ok(HostingReply { status, body })
    }

    async fn query_matches(&self) -> Result<Vec<GameyeMatchRecord>, BackendError> {
        let response = self
            .client
            .get(self.url("query/match"))
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: QueryMatchesResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse match listing: {}", e)))?;

        tracing::debug!("Gameye lists {} matches", parsed.matches.len());

        Ok(parsed.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_match_passes_status_through() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"matchKey":"m-1"}"#;
        let mock = server
            .mock("POST", "/command/start-match")
            .match_header("authorization", "Bearer secret-token")
            .match_header("content-type", "application/json")
            .match_body(body)
            .with_status(409)
            .with_body("conflict")
            .create_async()
            .await;

        let client = GameyeClient::new(server.url(), "secret-token".to_string()).unwrap();
        let reply = client.start_match(body, Duration::from_secs(5)).await.unwrap();

        assert_eq!(reply.status, 409);
        assert_eq!(reply.body, "conflict");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_matches_parses_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query/match")
            .with_body(
                r#"{"match":[
                    {"id":"m-1","image":"game","location":"china-east","host":"10.0.0.1","created":1600000000,"port":{"game":7777}},
                    {"id":"m-2","image":"game","location":"china-north","host":"10.0.0.2","created":1600000001,"port":{"game":7778}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = GameyeClient::new(server.url(), "t".to_string()).unwrap();
        let matches = client.query_matches().await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].id, "m-2");
        assert_eq!(matches[1].port.game, 7778);
    }

    #[tokio::test]
    async fn test_query_matches_rejects_garbage() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query/match")
            .with_body("not json")
            .create_async()
            .await;

        let client = GameyeClient::new(server.url(), "t".to_string()).unwrap();
        let result = client.query_matches().await;

        assert!(matches!(result, Err(BackendError::InvalidResponse(_))));
    }
}
