use serde::{Deserialize, Serialize};

/// Matchmaking region identifier (e.g. `ChinaEast2`)
pub type RegionId = String;

/// Hosting provider location identifier (e.g. `china-east`)
pub type LocationId = String;

/// Lifecycle status of a matchmaking ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Created,
    WaitingForPlayers,
    WaitingForMatch,
    Matched,
    Canceled,
    TimedOut,
}

impl TicketStatus {
    /// Whether the matchmaking backend will never change this status again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Matched | TicketStatus::Canceled | TicketStatus::TimedOut)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TicketStatus::Created => "Created",
            TicketStatus::WaitingForPlayers => "WaitingForPlayers",
            TicketStatus::WaitingForMatch => "WaitingForMatch",
            TicketStatus::Matched => "Matched",
            TicketStatus::Canceled => "Canceled",
            TicketStatus::TimedOut => "TimedOut",
        };
        f.write_str(name)
    }
}

/// Snapshot of a matchmaking ticket as seen by one status read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmakingTicket {
    pub id: String,
    pub queue: String,
    pub status: TicketStatus,
    pub match_id: Option<String>,
}

/// A player taking part in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub entity_id: String,
    pub entity_type: String,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

/// Fully resolved match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub queue_name: String,
    pub members: Vec<PlayerRef>,
    pub region_preferences: Vec<RegionId>,
}

/// Free-form configuration Gameye hands to the started game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(rename = "MatchmakingType")]
    pub matchmaking_type: u32,
    #[serde(rename = "MatchId")]
    pub match_id: String,
    #[serde(rename = "QueueName")]
    pub queue_name: String,
}

/// Body of a Gameye `command/start-match` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub match_key: String,
    pub game_key: String,
    pub location_keys: Vec<LocationId>,
    pub template_key: String,
    pub config: MatchConfig,
}

impl ProvisioningRequest {
    /// Serialize into the exact body Gameye accepts.
    ///
    /// Gameye rejects bodies carrying whitespace between JSON tokens, so the
    /// encoder output is passed through [`strip_json_whitespace`] before it
    /// goes on the wire.
    pub fn to_wire_body(&self) -> Result<String, serde_json::Error> {
        let encoded = serde_json::to_string(self)?;
        Ok(strip_json_whitespace(&encoded))
    }
}

/// Remove every whitespace character that sits outside a JSON string literal.
pub fn strip_json_whitespace(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
        } else if !c.is_whitespace() {
            out.push(c);
        }
    }

    out
}

/// Port block of a Gameye match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    #[serde(alias = "Game")]
    pub game: u16,
}

/// Gameye's view of a running match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameyeMatchRecord {
    #[serde(default, alias = "Id")]
    pub id: String,
    #[serde(default, alias = "Image")]
    pub image: String,
    #[serde(alias = "Location")]
    pub location: String,
    #[serde(alias = "Host")]
    pub host: String,
    #[serde(default, alias = "Created")]
    pub created: i64,
    #[serde(alias = "Port")]
    pub port: PortInfo,
}

/// Connection details of an allocated game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedServer {
    pub location: String,
    pub host: String,
    #[serde(rename = "gamePort")]
    pub game_port: u16,
    pub created: i64,
}

impl From<GameyeMatchRecord> for AllocatedServer {
    fn from(record: GameyeMatchRecord) -> Self {
        Self {
            location: record.location,
            host: record.host,
            game_port: record.port.game,
            created: record.created,
        }
    }
}

/// Result of one provisioning attempt.
///
/// `Conflict` and `Unavailable` double as the classification of a raw
/// allocation reply; the provisioning driver resolves `Conflict` through the
/// match query and never hands it back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProvisioningOutcome {
    Allocated(AllocatedServer),
    Conflict,
    Unavailable,
    Failed { reason: String },
}

/// Match-found notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFoundSignal {
    #[serde(rename = "MatchId")]
    pub match_id: String,
    #[serde(rename = "QueueName")]
    pub queue_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ProvisioningRequest {
        ProvisioningRequest {
            match_key: "m-1".to_string(),
            game_key: "my-game".to_string(),
            location_keys: vec!["china-east".to_string(), "china-north".to_string()],
            template_key: "default".to_string(),
            config: MatchConfig {
                matchmaking_type: 4,
                match_id: "m-1".to_string(),
                queue_name: "ranked".to_string(),
            },
        }
    }

    #[test]
    fn test_wire_body_field_names() {
        let body = sample_request().to_wire_body().unwrap();
        assert_eq!(
            body,
            r#"{"matchKey":"m-1","gameKey":"my-game","locationKeys":["china-east","china-north"],"templateKey":"default","config":{"MatchmakingType":4,"MatchId":"m-1","QueueName":"ranked"}}"#
        );
    }

    #[test]
    fn test_strip_whitespace_keeps_string_contents() {
        let pretty = "{\n\t\"a\": \"x y\",\n  \"b\": [1, 2],\r\n \"c\": \"q\\\" z\"\n}";
        assert_eq!(strip_json_whitespace(pretty), r#"{"a":"x y","b":[1,2],"c":"q\" z"}"#);
    }

    #[test]
    fn test_match_record_accepts_minimal_body() {
        let record: GameyeMatchRecord =
            serde_json::from_str(r#"{"location":"eu-west","host":"h1","port":{"game":7777}}"#).unwrap();
        assert_eq!(record.id, "");
        assert_eq!(record.port.game, 7777);

        let server = AllocatedServer::from(record);
        assert_eq!(server.location, "eu-west");
        assert_eq!(server.game_port, 7777);
    }

    #[test]
    fn test_match_record_requires_host() {
        let parsed = serde_json::from_str::<GameyeMatchRecord>(r#"{"location":"eu-west","port":{"game":1}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_ticket_status_terminal() {
        assert!(TicketStatus::Matched.is_terminal());
        assert!(TicketStatus::Canceled.is_terminal());
        assert!(TicketStatus::TimedOut.is_terminal());
        assert!(!TicketStatus::WaitingForMatch.is_terminal());
        assert_eq!(
            serde_json::from_str::<TicketStatus>("\"WaitingForPlayers\"").unwrap(),
            TicketStatus::WaitingForPlayers
        );
    }
}
