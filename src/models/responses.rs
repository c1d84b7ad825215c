use serde::{Deserialize, Serialize};
use crate::models::domain::MatchFoundSignal;

/// Acknowledgement for a created ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCreatedResponse {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "TicketId")]
    pub ticket_id: String,
}

/// Acknowledgement for a match-found notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFoundResponse {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "MatchInfo")]
    pub match_info: MatchFoundSignal,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub in_flight_flows: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn bad_request() -> Self {
        Self { status: "BadRequest".to_string(), message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "Error".to_string(), message: Some(message.into()) }
    }
}
