use std::sync::Arc;

use tokio::time::Instant;
use uuid::Uuid;

use super::error::FlowError;
use super::poller::{PollOutcome, TicketPoller};
use super::provisioner::{MatchQueryFallback, ProvisioningDriver};
use super::regions::RegionMapper;
use super::report::{FlowOutcome, FlowReport, OutcomeReporter, Stage, Timeline};
use super::resolver::MatchResolver;
use super::supervisor::ShutdownSignal;
use crate::config::Settings;
use crate::models::{LocationId, Match, MatchConfig, MatchFoundSignal, ProvisioningRequest};
use crate::services::{HostingBackend, MatchmakingBackend};

/// Per-title constants copied into every provisioning request
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub game_key: String,
    pub template_key: String,
    pub matchmaking_type: u32,
}

impl RequestTemplate {
    /// Build the start-match request for a resolved match
    pub fn build(&self, resolved: &Match, location_keys: Vec<LocationId>) -> ProvisioningRequest {
        ProvisioningRequest {
            match_key: resolved.match_id.clone(),
            game_key: self.game_key.clone(),
            location_keys,
            template_key: self.template_key.clone(),
            config: MatchConfig {
                matchmaking_type: self.matchmaking_type,
                match_id: resolved.match_id.clone(),
                queue_name: resolved.queue_name.clone(),
            },
        }
    }
}

/// End-to-end flow: ticket → match → server.
///
/// # Pipeline Stages
/// 1. Ticket polling (ticket-driven flows only)
/// 2. Match resolution
/// 3. Region mapping
/// 4. Provisioning
///
/// Every call reports exactly one [`FlowReport`]. Nothing is retried here;
/// retries live in the [`ProvisioningDriver`].
pub struct Orchestrator {
    poller: TicketPoller,
    resolver: MatchResolver,
    mapper: RegionMapper,
    driver: ProvisioningDriver,
    template: RequestTemplate,
    reporter: Arc<dyn OutcomeReporter>,
}

impl Orchestrator {
    pub fn new(
        poller: TicketPoller,
        resolver: MatchResolver,
        mapper: RegionMapper,
        driver: ProvisioningDriver,
        template: RequestTemplate,
        reporter: Arc<dyn OutcomeReporter>,
    ) -> Self {
        Self {
            poller,
            resolver,
            mapper,
            driver,
            template,
            reporter,
        }
    }

    /// Wire an orchestrator from configuration
    pub fn from_settings(
        settings: &Settings,
        matchmaking: Arc<dyn MatchmakingBackend>,
        hosting: Arc<dyn HostingBackend>,
        reporter: Arc<dyn OutcomeReporter>,
    ) -> Self {
        let poller = TicketPoller::new(
            matchmaking.clone(),
            settings.matchmaking.poll_interval(),
            settings.matchmaking.max_poll_attempts,
        );
        let fallback = MatchQueryFallback::new(
            hosting.clone(),
            settings.provisioning.query_interval(),
            settings.provisioning.query_max_attempts,
        );
        let driver = ProvisioningDriver::new(hosting, settings.provisioning.start_match_timeout(), fallback);
        let template = RequestTemplate {
            game_key: settings.gameye.game_key.clone(),
            template_key: settings.gameye.template_key.clone(),
            matchmaking_type: settings.provisioning.matchmaking_type,
        };

        Self::new(
            poller,
            MatchResolver::new(matchmaking),
            RegionMapper::with_overrides(settings.regions.pairs()),
            driver,
            template,
            reporter,
        )
    }

    /// Provision a server for a match the matchmaking backend reported
    pub async fn handle_match_found(&self, signal: MatchFoundSignal, shutdown: &ShutdownSignal) -> FlowReport {
        let mut pending = PendingReport::new(
            self.reporter.as_ref(),
            Timeline::new(None, Some(signal.match_id.clone()), signal.queue_name.clone()),
        );
        tracing::info!(
            "Flow {} started for match {} in queue {}",
            pending.flow_id(),
            signal.match_id,
            signal.queue_name
        );

        let result = self
            .provision_match(&signal.match_id, &signal.queue_name, shutdown, pending.timeline())
            .await;

        pending.finish(result)
    }

    /// Follow a ticket until it is matched, then provision its match
    pub async fn handle_ticket(&self, ticket_id: &str, queue: &str, shutdown: &ShutdownSignal) -> FlowReport {
        let mut pending = PendingReport::new(
            self.reporter.as_ref(),
            Timeline::new(Some(ticket_id.to_string()), None, queue.to_string()),
        );
        tracing::info!("Flow {} following ticket {}", pending.flow_id(), ticket_id);

        let result = self.follow_ticket(ticket_id, queue, shutdown, pending.timeline()).await;

        pending.finish(result)
    }

    async fn follow_ticket(
        &self,
        ticket_id: &str,
        queue: &str,
        shutdown: &ShutdownSignal,
        timeline: &mut Timeline,
    ) -> Result<FlowOutcome, FlowError> {
        let started = Instant::now();
        let polled = self.poller.poll(ticket_id, queue, shutdown).await;
        timeline.record(Stage::PollTicket, started);

        match polled? {
            PollOutcome::Matched { match_id } => {
                timeline.set_match_id(&match_id);
                self.provision_match(&match_id, queue, shutdown, timeline).await
            }
            PollOutcome::Closed(status) => Ok(FlowOutcome::NotMatched { status }),
            PollOutcome::Exhausted { .. } => Ok(FlowOutcome::Timeout),
        }
    }

    async fn provision_match(
        &self,
        match_id: &str,
        queue: &str,
        shutdown: &ShutdownSignal,
        timeline: &mut Timeline,
    ) -> Result<FlowOutcome, FlowError> {
        let started = Instant::now();
        let resolved = self.resolver.resolve(match_id, queue).await;
        timeline.record(Stage::ResolveMatch, started);
        let resolved = resolved?;

        let started = Instant::now();
        let locations = self.mapper.map(&resolved.region_preferences);
        timeline.record(Stage::MapRegions, started);
        if locations.is_empty() {
            tracing::info!("No Gameye location for match {}, leaving placement to Gameye", match_id);
        }

        let request = self.template.build(&resolved, locations);

        let started = Instant::now();
        let outcome = self.driver.provision(&request, shutdown).await;
        timeline.record(Stage::Provision, started);

        Ok(outcome?.into())
    }

}

/// Report of a running flow.
///
/// A flow dropped before [`PendingReport::finish`] (aborted at the end of the
/// shutdown grace period) still reports once, as `Failed`.
struct PendingReport<'a> {
    reporter: &'a dyn OutcomeReporter,
    timeline: Timeline,
    reported: bool,
}

impl<'a> PendingReport<'a> {
    fn new(reporter: &'a dyn OutcomeReporter, timeline: Timeline) -> Self {
        Self {
            reporter,
            timeline,
            reported: false,
        }
    }

    fn flow_id(&self) -> Uuid {
        self.timeline.flow_id()
    }

    fn timeline(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    fn finish(mut self, result: Result<FlowOutcome, FlowError>) -> FlowReport {
        let outcome = result.unwrap_or_else(|e| {
            tracing::error!("Flow {} failed: {}", self.flow_id(), e);
            FlowOutcome::Failed { reason: e.to_string() }
        });

        self.emit(outcome)
    }

    fn emit(&mut self, outcome: FlowOutcome) -> FlowReport {
        let report = self.timeline.report(outcome);
        self.reported = true;
        self.reporter.report(&report);
        report
    }
}

impl Drop for PendingReport<'_> {
    fn drop(&mut self) {
        if !self.reported {
            tracing::warn!("Flow {} aborted before finishing", self.flow_id());
            self.emit(FlowOutcome::Failed {
                reason: FlowError::Aborted.to_string(),
            });
        }
    }
}
