use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::{AllocatedServer, ProvisioningOutcome, TicketStatus};

/// Stage of an orchestration flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PollTicket,
    ResolveMatch,
    MapRegions,
    Provision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Terminal outcome of one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowOutcome {
    Allocated(AllocatedServer),
    /// Allocation could not be confirmed within the match query budget
    Unavailable,
    /// Ticket never reached a terminal status within the polling budget
    Timeout,
    /// Ticket ended without a match
    NotMatched { status: TicketStatus },
    Failed { reason: String },
}

impl FlowOutcome {
    pub fn is_allocated(&self) -> bool {
        matches!(self, FlowOutcome::Allocated(_))
    }
}

impl From<ProvisioningOutcome> for FlowOutcome {
    fn from(outcome: ProvisioningOutcome) -> Self {
        match outcome {
            ProvisioningOutcome::Allocated(server) => FlowOutcome::Allocated(server),
            ProvisioningOutcome::Conflict | ProvisioningOutcome::Unavailable => FlowOutcome::Unavailable,
            ProvisioningOutcome::Failed { reason } => FlowOutcome::Failed { reason },
        }
    }
}

/// Structured record emitted once per flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow_id: Uuid,
    pub ticket_id: Option<String>,
    pub match_id: Option<String>,
    pub queue_name: String,
    pub started_at: DateTime<Utc>,
    pub outcome: FlowOutcome,
    pub stages: Vec<StageTiming>,
}

impl FlowReport {
    pub fn total_ms(&self) -> u64 {
        self.stages.iter().map(|s| s.elapsed_ms).sum()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Collects stage timings while a flow runs
#[derive(Debug)]
pub(crate) struct Timeline {
    flow_id: Uuid,
    started_at: DateTime<Utc>,
    ticket_id: Option<String>,
    match_id: Option<String>,
    queue_name: String,
    stages: Vec<StageTiming>,
}

impl Timeline {
    pub(crate) fn new(ticket_id: Option<String>, match_id: Option<String>, queue_name: String) -> Self {
        Self {
            flow_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ticket_id,
            match_id,
            queue_name,
            stages: Vec::new(),
        }
    }

    pub(crate) fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub(crate) fn set_match_id(&mut self, match_id: &str) {
        self.match_id = Some(match_id.to_string());
    }

    pub(crate) fn record(&mut self, stage: Stage, since: Instant) {
        self.stages.push(StageTiming {
            stage,
            elapsed_ms: since.elapsed().as_millis() as u64,
        });
    }

    pub(crate) fn report(&self, outcome: FlowOutcome) -> FlowReport {
        FlowReport {
            flow_id: self.flow_id,
            ticket_id: self.ticket_id.clone(),
            match_id: self.match_id.clone(),
            queue_name: self.queue_name.clone(),
            started_at: self.started_at,
            outcome,
            stages: self.stages.clone(),
        }
    }
}

/// Destination of flow reports
pub trait OutcomeReporter: Send + Sync {
    fn report(&self, report: &FlowReport);
}

/// Writes each report as one structured log record
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl OutcomeReporter for TracingReporter {
    fn report(&self, report: &FlowReport) {
        let stages = serde_json::to_string(&report.stages).unwrap_or_default();
        let match_id = report.match_id.as_deref().unwrap_or("-");

        match &report.outcome {
            FlowOutcome::Allocated(server) => tracing::info!(
                flow_id = %report.flow_id,
                match_id,
                queue = %report.queue_name,
                location = %server.location,
                host = %server.host,
                game_port = server.game_port,
                total_ms = report.total_ms(),
                stages = %stages,
                "Gameye server allocated"
            ),
            outcome => tracing::warn!(
                flow_id = %report.flow_id,
                match_id,
                ticket_id = report.ticket_id.as_deref().unwrap_or("-"),
                queue = %report.queue_name,
                outcome = ?outcome,
                total_ms = report.total_ms(),
                stages = %stages,
                "Flow ended without a server"
            ),
        }
    }
}
