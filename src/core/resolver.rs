use std::sync::Arc;

use super::error::FlowError;
use crate::models::Match;
use crate::services::MatchmakingBackend;

/// Fetches full match details once a match is known
pub struct MatchResolver {
    matchmaking: Arc<dyn MatchmakingBackend>,
}

impl MatchResolver {
    pub fn new(matchmaking: Arc<dyn MatchmakingBackend>) -> Self {
        Self { matchmaking }
    }

    /// Single request, no retry
    pub async fn resolve(&self, match_id: &str, queue: &str) -> Result<Match, FlowError> {
        let resolved = self
            .matchmaking
            .get_match(match_id, queue, true)
            .await
            .map_err(|e| FlowError::Resolution {
                match_id: match_id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            "Resolved match {}: {} members, region preferences {:?}",
            match_id,
            resolved.members.len(),
            resolved.region_preferences
        );

        Ok(resolved)
    }
}
