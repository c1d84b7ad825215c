//! In-memory backends and reporters for tests.
//!
//! Each fake records the calls it receives so tests can assert on call counts
//! and timing without network access.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::{FlowReport, OutcomeReporter};
use crate::models::{GameyeMatchRecord, Match, MatchmakingTicket, TicketStatus};
use crate::services::{BackendError, HostingBackend, HostingReply, MatchmakingBackend};

/// A genuine `reqwest` transport error, produced without touching the network
pub fn transport_error() -> BackendError {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .expect_err("relative URL must not build");
    BackendError::Request(err)
}

fn api_error(status: u16) -> BackendError {
    BackendError::Api {
        status,
        message: "scripted failure".to_string(),
    }
}

#[derive(Debug, Default)]
struct MatchmakingState {
    statuses: VecDeque<TicketStatus>,
    last_status: Option<TicketStatus>,
    ticket_match_id: Option<String>,
    fail_ticket_reads: bool,
    hang_match_reads: bool,
    ticket_reads: Vec<Instant>,
    matches: Vec<Match>,
    match_reads: u32,
    created_tickets: Vec<(String, String)>,
}

/// Scriptable matchmaking backend
#[derive(Debug, Default)]
pub struct FakeMatchmaking {
    state: Mutex<MatchmakingState>,
}

impl FakeMatchmaking {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MatchmakingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Statuses returned by successive ticket reads; the last one repeats
    pub fn script_ticket(&self, statuses: &[TicketStatus]) {
        self.state().statuses = statuses.iter().copied().collect();
    }

    pub fn set_ticket_match_id(&self, match_id: &str) {
        self.state().ticket_match_id = Some(match_id.to_string());
    }

    pub fn fail_ticket_reads(&self) {
        self.state().fail_ticket_reads = true;
    }

    /// Make every later `get_match` call wait forever
    pub fn hang_match_reads(&self) {
        self.state().hang_match_reads = true;
    }

    /// Make `get_match` return this match for its id
    pub fn add_match(&self, found: Match) {
        self.state().matches.push(found);
    }

    pub fn ticket_reads(&self) -> usize {
        self.state().ticket_reads.len()
    }

    pub fn ticket_read_times(&self) -> Vec<Instant> {
        self.state().ticket_reads.clone()
    }

    pub fn match_reads(&self) -> u32 {
        self.state().match_reads
    }

    /// `(title_account_id, queue)` of every created ticket
    pub fn created_tickets(&self) -> Vec<(String, String)> {
        self.state().created_tickets.clone()
    }
}

#[async_trait]
impl MatchmakingBackend for FakeMatchmaking {
    async fn create_ticket(
        &self,
        title_account_id: &str,
        queue: &str,
        _give_up_after_seconds: u32,
        _data_object: serde_json::Value,
    ) -> Result<String, BackendError> {
        let mut state = self.state();
        state
            .created_tickets
            .push((title_account_id.to_string(), queue.to_string()));
        Ok(format!("ticket-{}", state.created_tickets.len()))
    }

    async fn get_ticket(&self, ticket_id: &str, queue: &str) -> Result<MatchmakingTicket, BackendError> {
        let mut state = self.state();
        state.ticket_reads.push(Instant::now());

        if state.fail_ticket_reads {
            return Err(api_error(500));
        }

        let status = match state.statuses.pop_front() {
            Some(status) => {
                state.last_status = Some(status);
                status
            }
            None => state.last_status.unwrap_or(TicketStatus::WaitingForMatch),
        };

        let match_id = if status == TicketStatus::Matched {
            state.ticket_match_id.clone()
        } else {
            None
        };

        Ok(MatchmakingTicket {
            id: ticket_id.to_string(),
            queue: queue.to_string(),
            status,
            match_id,
        })
    }

    async fn get_match(
        &self,
        match_id: &str,
        _queue: &str,
        _return_member_attributes: bool,
    ) -> Result<Match, BackendError> {
        let found = {
            let mut state = self.state();
            state.match_reads += 1;
            if state.hang_match_reads {
                None
            } else {
                Some(state.matches.iter().find(|m| m.match_id == match_id).cloned())
            }
        };

        match found {
            Some(found) => found.ok_or_else(|| api_error(404)),
            None => std::future::pending().await,
        }
    }
}

/// Scripted reply of a start-match call
#[derive(Debug, Clone)]
pub enum StartReply {
    Status(u16, String),
    TransportError,
    /// Never answers
    Hang,
}

/// Scripted reply of a match listing call
#[derive(Debug, Clone)]
pub enum ListingReply {
    Records(Vec<GameyeMatchRecord>),
    Fail,
}

#[derive(Debug, Default)]
struct HostingState {
    start_replies: VecDeque<StartReply>,
    listings: VecDeque<ListingReply>,
    start_bodies: Vec<String>,
    start_timeouts: Vec<Duration>,
    query_calls: usize,
}

/// Scriptable hosting backend.
///
/// Unscripted start-match calls answer 500; unscripted listings are empty.
#[derive(Debug, Default)]
pub struct ScriptedHosting {
    state: Mutex<HostingState>,
}

impl ScriptedHosting {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HostingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn script_start(&self, replies: Vec<StartReply>) {
        self.state().start_replies = replies.into();
    }

    pub fn script_listings(&self, listings: Vec<ListingReply>) {
        self.state().listings = listings.into();
    }

    pub fn start_calls(&self) -> usize {
        self.state().start_bodies.len()
    }

    pub fn start_bodies(&self) -> Vec<String> {
        self.state().start_bodies.clone()
    }

    pub fn start_timeouts(&self) -> Vec<Duration> {
        self.state().start_timeouts.clone()
    }

    pub fn query_calls(&self) -> usize {
        self.state().query_calls
    }
}

#[async_trait]
impl HostingBackend for ScriptedHosting {
    async fn start_match(&self, body: &str, timeout: Duration) -> Result<HostingReply, BackendError> {
        let reply = {
            let mut state = self.state();
            state.start_bodies.push(body.to_string());
            state.start_timeouts.push(timeout);
            state.start_replies.pop_front()
        };

        match reply {
            Some(StartReply::Status(status, body)) => Ok(HostingReply { status, body }),
            Some(StartReply::TransportError) => Err(transport_error()),
            Some(StartReply::Hang) => std::future::pending().await,
            None => Ok(HostingReply {
                status: 500,
                body: "unscripted".to_string(),
            }),
        }
    }

    async fn query_matches(&self) -> Result<Vec<GameyeMatchRecord>, BackendError> {
        let mut state = self.state();
        state.query_calls += 1;
        match state.listings.pop_front() {
            Some(ListingReply::Records(records)) => Ok(records),
            Some(ListingReply::Fail) => Err(api_error(502)),
            None => Ok(Vec::new()),
        }
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<FlowReport>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<FlowReport> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl OutcomeReporter for CollectingReporter {
    fn report(&self, report: &FlowReport) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report.clone());
    }
}
