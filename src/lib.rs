//! Matchbridge - bridges PlayFab matchmaking to Gameye server provisioning
//!
//! Once a match is found, the bridge resolves the match, translates its
//! region preferences into Gameye locations and drives a start-match request
//! through Gameye's conflict and unavailability replies to a definitive
//! outcome.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use core::{FlowOutcome, FlowReport, FlowSupervisor, Orchestrator, RegionMapper, ShutdownSignal};
pub use models::{Match, MatchFoundSignal, ProvisioningOutcome, ProvisioningRequest};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let mapper = RegionMapper::default();
        assert_eq!(mapper.map(&["ChinaEast2".to_string()]), vec!["china-east"]);
    }
}
