// Orchestration core exports
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod provisioner;
pub mod regions;
pub mod report;
pub mod resolver;
pub mod supervisor;

pub use error::FlowError;
pub use orchestrator::{Orchestrator, RequestTemplate};
pub use poller::{PollOutcome, TicketPoller};
pub use provisioner::{classify_reply, MatchQueryFallback, ProvisioningDriver};
pub use regions::RegionMapper;
pub use report::{FlowOutcome, FlowReport, OutcomeReporter, Stage, StageTiming, TracingReporter};
pub use resolver::MatchResolver;
pub use supervisor::{FlowSupervisor, ShutdownSignal, SupervisorError};
