use std::sync::Arc;
use std::time::Duration;

use super::error::FlowError;
use super::supervisor::ShutdownSignal;
use crate::models::{AllocatedServer, GameyeMatchRecord, ProvisioningOutcome, ProvisioningRequest};
use crate::services::{BackendError, HostingBackend, HostingReply};

const STATUS_OK: u16 = 200;
const STATUS_CONFLICT: u16 = 409;
const STATUS_UNAVAILABLE: u16 = 503;

/// Interpret a raw start-match reply.
///
/// A 200 whose body does not parse cannot confirm the allocation, so it is
/// classified as `Failed` and left for the match query to settle.
pub fn classify_reply(reply: &HostingReply) -> ProvisioningOutcome {
    match reply.status {
        STATUS_OK => match serde_json::from_str::<GameyeMatchRecord>(&reply.body) {
            Ok(record) => ProvisioningOutcome::Allocated(record.into()),
            Err(e) => ProvisioningOutcome::Failed {
                reason: format!("unreadable start-match reply: {}", e),
            },
        },
        STATUS_CONFLICT => ProvisioningOutcome::Conflict,
        STATUS_UNAVAILABLE => ProvisioningOutcome::Unavailable,
        other => ProvisioningOutcome::Failed {
            reason: format!("start-match returned {}", other),
        },
    }
}

/// Recovers an allocation by polling Gameye's match listing
pub struct MatchQueryFallback {
    hosting: Arc<dyn HostingBackend>,
    interval: Duration,
    max_attempts: u32,
}

impl MatchQueryFallback {
    pub fn new(hosting: Arc<dyn HostingBackend>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            hosting,
            interval,
            max_attempts,
        }
    }

    /// Look for a running match whose id equals `match_key`.
    ///
    /// A failed or unreadable listing uses up an attempt like an empty one.
    pub async fn recover(
        &self,
        match_key: &str,
        shutdown: &ShutdownSignal,
    ) -> Result<Option<AllocatedServer>, FlowError> {
        for attempt in 1..=self.max_attempts {
            shutdown.sleep(self.interval).await?;

            let listing = tokio::select! {
                _ = shutdown.cancelled() => return Err(FlowError::Cancelled),
                listing = self.hosting.query_matches() => listing,
            };

            match listing {
                Ok(records) => {
                    if let Some(record) = records.into_iter().find(|r| r.id == match_key) {
                        tracing::info!("Found Gameye match {} on query {}", match_key, attempt);
                        return Ok(Some(record.into()));
                    }
                }
                Err(e) => {
                    tracing::warn!("Gameye match query {}/{} failed: {}", attempt, self.max_attempts, e);
                }
            }
        }

        tracing::warn!(
            "Gameye match {} not found after {} queries",
            match_key,
            self.max_attempts
        );
        Ok(None)
    }
}

/// Drives one allocation request to a definitive outcome
pub struct ProvisioningDriver {
    hosting: Arc<dyn HostingBackend>,
    start_timeout: Duration,
    fallback: MatchQueryFallback,
}

impl ProvisioningDriver {
    pub fn new(hosting: Arc<dyn HostingBackend>, start_timeout: Duration, fallback: MatchQueryFallback) -> Self {
        Self {
            hosting,
            start_timeout,
            fallback,
        }
    }

    /// Request a server for `request`.
    ///
    /// - 200: allocated.
    /// - 409: already requested; never re-sent, recovered through the match query.
    /// - 503: re-sent once; a second miss goes to the match query.
    /// - anything else: match query before giving up.
    ///
    /// A transport error on the first request ends the flow.
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
        shutdown: &ShutdownSignal,
    ) -> Result<ProvisioningOutcome, FlowError> {
        let body = request.to_wire_body()?;
        let match_key = request.match_key.as_str();

        let reply = self.start_match(&body, shutdown).await??;

        match classify_reply(&reply) {
            ProvisioningOutcome::Allocated(server) => Ok(ProvisioningOutcome::Allocated(server)),
            ProvisioningOutcome::Conflict => {
                tracing::info!("Match {} was already requested, querying Gameye", match_key);
                self.recover_or(match_key, ProvisioningOutcome::Unavailable, shutdown).await
            }
            ProvisioningOutcome::Unavailable => {
                tracing::warn!("Gameye unavailable for match {}, retrying start-match once", match_key);
                let otherwise = match self.start_match(&body, shutdown).await? {
                    Ok(retry) => match classify_reply(&retry) {
                        ProvisioningOutcome::Allocated(server) => return Ok(ProvisioningOutcome::Allocated(server)),
                        // An unreadable 200 keeps its reason if the query finds nothing
                        failed @ ProvisioningOutcome::Failed { .. } => {
                            tracing::warn!("Start-match retry for {} failed: {:?}", match_key, failed);
                            failed
                        }
                        other => {
                            tracing::warn!("Start-match retry for {} did not allocate: {:?}", match_key, other);
                            ProvisioningOutcome::Unavailable
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Start-match retry for {} failed: {}", match_key, e);
                        ProvisioningOutcome::Unavailable
                    }
                };
                self.recover_or(match_key, otherwise, shutdown).await
            }
            failed @ ProvisioningOutcome::Failed { .. } => {
                tracing::warn!("Start-match for {} failed: {:?}, querying Gameye", match_key, failed);
                self.recover_or(match_key, failed, shutdown).await
            }
        }
    }

    /// One start-match call, abandoned as soon as shutdown begins
    async fn start_match(
        &self,
        body: &str,
        shutdown: &ShutdownSignal,
    ) -> Result<Result<HostingReply, BackendError>, FlowError> {
        tokio::select! {
            _ = shutdown.cancelled() => Err(FlowError::Cancelled),
            reply = self.hosting.start_match(body, self.start_timeout) => Ok(reply),
        }
    }

    async fn recover_or(
        &self,
        match_key: &str,
        otherwise: ProvisioningOutcome,
        shutdown: &ShutdownSignal,
    ) -> Result<ProvisioningOutcome, FlowError> {
        Ok(match self.fallback.recover(match_key, shutdown).await? {
            Some(server) => ProvisioningOutcome::Allocated(server),
            None => otherwise,
        })
    }
}
