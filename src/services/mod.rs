// Service exports
pub mod gameye;
pub mod playfab;

pub use gameye::GameyeClient;
pub use playfab::{EntityCredential, PlayFabClient};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{GameyeMatchRecord, Match, MatchmakingTicket};

/// Errors that can occur when talking to either backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unauthorized: credential rejected")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Raw reply of a hosting allocation call.
///
/// The status is deliberately left uninterpreted; the provisioning driver
/// owns the meaning of 200/409/503.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingReply {
    pub status: u16,
    pub body: String,
}

/// Matchmaking backend operations used by the bridge
#[async_trait]
pub trait MatchmakingBackend: Send + Sync {
    /// Create a server-side ticket for a single title player, returning its id
    async fn create_ticket(
        &self,
        title_account_id: &str,
        queue: &str,
        give_up_after_seconds: u32,
        data_object: serde_json::Value,
    ) -> Result<String, BackendError>;

    async fn get_ticket(&self, ticket_id: &str, queue: &str) -> Result<MatchmakingTicket, BackendError>;

    async fn get_match(
        &self,
        match_id: &str,
        queue: &str,
        return_member_attributes: bool,
    ) -> Result<Match, BackendError>;
}

/// Hosting backend operations used by the bridge
#[async_trait]
pub trait HostingBackend: Send + Sync {
    /// Post an already-encoded start-match body
    async fn start_match(&self, body: &str, timeout: Duration) -> Result<HostingReply, BackendError>;

    async fn query_matches(&self) -> Result<Vec<GameyeMatchRecord>, BackendError>;
}
