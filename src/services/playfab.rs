use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;

use super::{BackendError, MatchmakingBackend};
use crate::models::{Match, MatchmakingTicket, PlayerRef, TicketStatus};

const PLAYER_ENTITY_TYPE: &str = "title_player_account";

/// Title-level entity token used for every matchmaking call
#[derive(Debug, Clone)]
pub struct EntityCredential {
    pub token: String,
    pub entity_id: String,
    pub entity_type: String,
}

/// PlayFab Multiplayer matchmaking client
///
/// Holds the title entity credential. The credential is acquired once at
/// start-up via [`PlayFabClient::authenticate`]; a call rejected with 401
/// re-acquires it once and is repeated once.
pub struct PlayFabClient {
    base_url: String,
    secret_key: String,
    client: Client,
    credential: RwLock<Option<EntityCredential>>,
}

/// Standard PlayFab reply envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct EntityKey {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Type", default)]
    entity_type: String,
}

#[derive(Debug, Deserialize)]
struct EntityTokenData {
    #[serde(rename = "EntityToken")]
    entity_token: String,
    #[serde(rename = "Entity")]
    entity: EntityKey,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    #[serde(rename = "Status")]
    status: TicketStatus,
    #[serde(rename = "MatchId", default)]
    match_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberData {
    #[serde(rename = "Entity")]
    entity: EntityKey,
    #[serde(rename = "Attributes", default)]
    attributes: Option<MemberAttributes>,
}

#[derive(Debug, Deserialize)]
struct MemberAttributes {
    #[serde(rename = "DataObject", default)]
    data_object: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MatchData {
    #[serde(rename = "MatchId")]
    match_id: String,
    #[serde(rename = "Members", default)]
    members: Vec<MemberData>,
    #[serde(rename = "RegionPreferences", default)]
    region_preferences: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedTicketData {
    #[serde(rename = "TicketId")]
    ticket_id: String,
}

#[derive(Debug, Serialize)]
struct GetTicketBody<'a> {
    #[serde(rename = "TicketId")]
    ticket_id: &'a str,
    #[serde(rename = "QueueName")]
    queue_name: &'a str,
    #[serde(rename = "EscapeObject")]
    escape_object: bool,
}

#[derive(Debug, Serialize)]
struct GetMatchBody<'a> {
    #[serde(rename = "MatchId")]
    match_id: &'a str,
    #[serde(rename = "QueueName")]
    queue_name: &'a str,
    #[serde(rename = "EscapeObject")]
    escape_object: bool,
    #[serde(rename = "ReturnMemberAttributes")]
    return_member_attributes: bool,
}

impl PlayFabClient {
    /// Create a new PlayFab client
    ///
    /// `base_url` is the title endpoint, usually `https://{titleId}.playfabapi.com`.
    pub fn new(base_url: String, secret_key: String) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            base_url,
            secret_key,
            client,
            credential: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Acquire a title entity token and store it for later calls
    pub async fn authenticate(&self) -> Result<EntityCredential, BackendError> {
        let response = self
            .client
            .post(self.url("Authentication/GetEntityToken"))
            .header("X-SecretKey", &self.secret_key)
            .json(&json!({}))
            .send()
            .await?;

        let data: EntityTokenData = read_envelope(response).await?;

        if data.entity.id.is_empty() {
            return Err(BackendError::InvalidResponse("entity id should be defined".into()));
        }
        if data.entity.entity_type.is_empty() {
            return Err(BackendError::InvalidResponse("entity type should be defined".into()));
        }

        let credential = EntityCredential {
            token: data.entity_token,
            entity_id: data.entity.id,
            entity_type: data.entity.entity_type,
        };

        tracing::info!(
            "Acquired PlayFab entity token for {} {}",
            credential.entity_type,
            credential.entity_id
        );

        *self.credential.write().await = Some(credential.clone());
        Ok(credential)
    }

    async fn entity_token(&self) -> Result<String, BackendError> {
        if let Some(credential) = self.credential.read().await.as_ref() {
            return Ok(credential.token.clone());
        }
        Ok(self.authenticate().await?.token)
    }

    async fn post_entity<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let token = self.entity_token().await?;
        match self.post_once(path, body, &token).await {
            Err(BackendError::Unauthorized) => {
                tracing::warn!("PlayFab rejected the entity token on {}, re-acquiring", path);
                let token = self.authenticate().await?.token;
                self.post_once(path, body, &token).await
            }
            other => other,
        }
    }

    async fn post_once<B, T>(&self, path: &str, body: &B, token: &str) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!("PlayFab request {}", path);

        let response = self
            .client
            .post(self.url(path))
            .header("X-EntityToken", token)
            .json(body)
            .send()
            .await?;

        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }

    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("errorMessage").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        return Err(BackendError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(&body)
        .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse PlayFab reply: {}", e)))?;

    Ok(envelope.data)
}

#[async_trait]
impl MatchmakingBackend for PlayFabClient {
    async fn create_ticket(
        &self,
        title_account_id: &str,
        queue: &str,
        give_up_after_seconds: u32,
        data_object: Value,
    ) -> Result<String, BackendError> {
        let body = json!({
            "Members": [{
                "Attributes": { "DataObject": data_object },
                "Entity": { "Id": title_account_id, "Type": PLAYER_ENTITY_TYPE },
            }],
            "GiveUpAfterSeconds": give_up_after_seconds,
            "QueueName": queue,
        });

        let data: CreatedTicketData = self.post_entity("Match/CreateServerMatchmakingTicket", &body).await?;

        tracing::info!("Created matchmaking ticket {} in queue {}", data.ticket_id, queue);
        Ok(data.ticket_id)
    }

    async fn get_ticket(&self, ticket_id: &str, queue: &str) -> Result<MatchmakingTicket, BackendError> {
        let body = GetTicketBody {
            ticket_id,
            queue_name: queue,
            escape_object: false,
        };

        let data: TicketData = self.post_entity("Match/GetMatchmakingTicket", &body).await?;

        Ok(MatchmakingTicket {
            id: ticket_id.to_string(),
            queue: queue.to_string(),
            status: data.status,
            match_id: data.match_id.filter(|id| !id.is_empty()),
        })
    }

    async fn get_match(
        &self,
        match_id: &str,
        queue: &str,
        return_member_attributes: bool,
    ) -> Result<Match, BackendError> {
        let body = GetMatchBody {
            match_id,
            queue_name: queue,
            escape_object: false,
            return_member_attributes,
        };

        let data: MatchData = self.post_entity("Match/GetMatch", &body).await?;

        let members = data
            .members
            .into_iter()
            .map(|m| PlayerRef {
                entity_id: m.entity.id,
                entity_type: m.entity.entity_type,
                attributes: m.attributes.and_then(|a| a.data_object),
            })
            .collect();

        Ok(Match {
            match_id: data.match_id,
            queue_name: queue.to_string(),
            members,
            region_preferences: data.region_preferences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const TOKEN_REPLY: &str =
        r#"{"code":200,"status":"OK","data":{"EntityToken":"tok-1","Entity":{"Id":"TITLE","Type":"title"}}}"#;

    #[tokio::test]
    async fn test_get_match_parses_members_and_regions() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/Authentication/GetEntityToken")
            .match_header("X-SecretKey", "secret")
            .with_body(TOKEN_REPLY)
            .create_async()
            .await;
        let get_match = server
            .mock("POST", "/Match/GetMatch")
            .match_header("X-EntityToken", "tok-1")
            .match_body(Matcher::PartialJson(json!({
                "MatchId": "m-1",
                "QueueName": "ranked",
                "ReturnMemberAttributes": true
            })))
            .with_body(
                r#"{"code":200,"status":"OK","data":{"MatchId":"m-1","Members":[
                    {"Entity":{"Id":"P1","Type":"title_player_account"},"Attributes":{"DataObject":{"Skill":3}}},
                    {"Entity":{"Id":"P2","Type":"title_player_account"}}
                ],"RegionPreferences":["ChinaEast2","ChinaNorth2"]}}"#,
            )
            .create_async()
            .await;

        let client = PlayFabClient::new(server.url(), "secret".to_string()).unwrap();
        let found = client.get_match("m-1", "ranked", true).await.unwrap();

        assert_eq!(found.match_id, "m-1");
        assert_eq!(found.queue_name, "ranked");
        assert_eq!(found.members.len(), 2);
        assert_eq!(found.members[0].attributes, Some(json!({"Skill": 3})));
        assert_eq!(found.members[1].attributes, None);
        assert_eq!(found.region_preferences, vec!["ChinaEast2", "ChinaNorth2"]);

        token.assert_async().await;
        get_match.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_reacquires_token_once() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/Authentication/GetEntityToken")
            .with_body(TOKEN_REPLY)
            .expect(2)
            .create_async()
            .await;
        let rejected = server
            .mock("POST", "/Match/GetMatchmakingTicket")
            .with_status(401)
            .with_body(r#"{"code":401,"status":"Unauthorized","errorMessage":"expired"}"#)
            .expect(2)
            .create_async()
            .await;

        let client = PlayFabClient::new(server.url(), "secret".to_string()).unwrap();
        let result = client.get_ticket("t-1", "ranked").await;

        assert!(matches!(result, Err(BackendError::Unauthorized)));
        token.assert_async().await;
        rejected.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_ticket_reads_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Authentication/GetEntityToken")
            .with_body(TOKEN_REPLY)
            .create_async()
            .await;
        server
            .mock("POST", "/Match/GetMatchmakingTicket")
            .with_body(r#"{"code":200,"status":"OK","data":{"Status":"Matched","MatchId":"m-9"}}"#)
            .create_async()
            .await;

        let client = PlayFabClient::new(server.url(), "secret".to_string()).unwrap();
        let ticket = client.get_ticket("t-1", "ranked").await.unwrap();

        assert_eq!(ticket.status, TicketStatus::Matched);
        assert_eq!(ticket.match_id.as_deref(), Some("m-9"));
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Authentication/GetEntityToken")
            .with_body(TOKEN_REPLY)
            .create_async()
            .await;
        server
            .mock("POST", "/Match/GetMatch")
            .with_status(400)
            .with_body(r#"{"code":400,"status":"BadRequest","errorMessage":"MatchNotFound"}"#)
            .create_async()
            .await;

        let client = PlayFabClient::new(server.url(), "secret".to_string()).unwrap();
        let err = client.get_match("missing", "ranked", true).await.unwrap_err();

        match err {
            BackendError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "MatchNotFound");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
