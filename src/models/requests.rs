use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::MatchFoundSignal;

/// Request to create a single-player matchmaking ticket
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[serde(rename = "DataObject", default)]
    pub data_object: serde_json::Value,
    #[validate(length(min = 1))]
    #[serde(rename = "TitleAccountId", default)]
    pub title_account_id: String,
    #[validate(length(min = 1))]
    #[serde(rename = "QueueName", default)]
    pub queue_name: String,
    #[serde(rename = "GiveUpAfterSeconds", default)]
    pub give_up_after_seconds: u32,
}

impl CreateTicketRequest {
    /// Seconds the backend keeps looking for a match, 300 when unset
    pub fn give_up_after(&self) -> u32 {
        if self.give_up_after_seconds == 0 {
            default_give_up_after()
        } else {
            self.give_up_after_seconds
        }
    }
}

fn default_give_up_after() -> u32 {
    300
}

/// Match-found notification posted by the matchmaking side
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchFoundRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "MatchId", default)]
    pub match_id: String,
    #[validate(length(min = 1))]
    #[serde(rename = "QueueName", default)]
    pub queue_name: String,
}

impl From<MatchFoundRequest> for MatchFoundSignal {
    fn from(req: MatchFoundRequest) -> Self {
        MatchFoundSignal {
            match_id: req.match_id,
            queue_name: req.queue_name,
        }
    }
}
