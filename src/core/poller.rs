use std::sync::Arc;
use std::time::Duration;

use super::error::FlowError;
use super::supervisor::ShutdownSignal;
use crate::models::TicketStatus;
use crate::services::MatchmakingBackend;

/// How a polled ticket ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Matched { match_id: String },
    /// Ticket reached `Canceled` or `TimedOut`
    Closed(TicketStatus),
    /// Attempt budget spent before a terminal status
    Exhausted { attempts: u32 },
}

/// Polls a matchmaking ticket at a fixed interval.
///
/// PlayFab allows at most 10 ticket reads per minute, hence the 6 second
/// default interval.
pub struct TicketPoller {
    matchmaking: Arc<dyn MatchmakingBackend>,
    interval: Duration,
    max_attempts: u32,
}

impl TicketPoller {
    pub fn new(matchmaking: Arc<dyn MatchmakingBackend>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            matchmaking,
            interval,
            max_attempts,
        }
    }

    /// Poll until the ticket is terminal or the budget is spent.
    ///
    /// The first read happens one interval after the call. A failed read ends
    /// polling immediately.
    pub async fn poll(
        &self,
        ticket_id: &str,
        queue: &str,
        shutdown: &ShutdownSignal,
    ) -> Result<PollOutcome, FlowError> {
        for attempt in 1..=self.max_attempts {
            shutdown.sleep(self.interval).await?;

            let ticket = self.matchmaking.get_ticket(ticket_id, queue).await?;
            tracing::debug!(
                "Ticket {} status {} (poll {}/{})",
                ticket_id,
                ticket.status,
                attempt,
                self.max_attempts
            );

            match ticket.status {
                TicketStatus::Matched => {
                    let match_id = ticket.match_id.ok_or_else(|| {
                        FlowError::MalformedResponse(format!("ticket {} matched without a match id", ticket_id))
                    })?;
                    tracing::info!("Ticket {} matched into {}", ticket_id, match_id);
                    return Ok(PollOutcome::Matched { match_id });
                }
                TicketStatus::Canceled | TicketStatus::TimedOut => {
                    tracing::info!("Ticket {} closed with status {}", ticket_id, ticket.status);
                    return Ok(PollOutcome::Closed(ticket.status));
                }
                _ => {}
            }
        }

        tracing::warn!("Ticket {} not terminal after {} polls", ticket_id, self.max_attempts);
        Ok(PollOutcome::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
