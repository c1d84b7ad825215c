// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AllocatedServer, GameyeMatchRecord, LocationId, Match, MatchConfig, MatchFoundSignal, MatchmakingTicket,
    PlayerRef, PortInfo, ProvisioningOutcome, ProvisioningRequest, RegionId, TicketStatus,
};
pub use requests::{CreateTicketRequest, MatchFoundRequest};
pub use responses::{ErrorResponse, HealthResponse, MatchFoundResponse, TicketCreatedResponse};
