use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub playfab: PlayFabSettings,
    pub gameye: GameyeSettings,
    #[serde(default)]
    pub matchmaking: MatchmakingSettings,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
    #[serde(default)]
    pub regions: RegionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
    /// How long shutdown waits for in-flight flows before aborting them
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 9000 }
fn default_shutdown_grace_secs() -> u64 { 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct PlayFabSettings {
    pub title_id: String,
    pub secret_key: String,
    /// Overrides `https://{title_id}.playfabapi.com`
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameyeSettings {
    pub endpoint: String,
    pub token: String,
    pub game_key: String,
    pub template_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchmakingSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Poll newly created tickets and provision their match without waiting
    /// for a match-found notification
    #[serde(default)]
    pub follow_tickets: bool,
}

impl MatchmakingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
            follow_tickets: false,
        }
    }
}

// PlayFab allows 10 ticket reads per minute
fn default_poll_interval_secs() -> u64 { 6 }
// Covers the 300 second default give-up time
fn default_max_poll_attempts() -> u32 { 50 }

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningSettings {
    #[serde(default = "default_start_match_timeout_secs")]
    pub start_match_timeout_secs: u64,
    #[serde(default = "default_query_interval_secs")]
    pub query_interval_secs: u64,
    #[serde(default = "default_query_max_attempts")]
    pub query_max_attempts: u32,
    #[serde(default = "default_matchmaking_type")]
    pub matchmaking_type: u32,
}

impl ProvisioningSettings {
    pub fn start_match_timeout(&self) -> Duration {
        Duration::from_secs(self.start_match_timeout_secs)
    }

    pub fn query_interval(&self) -> Duration {
        Duration::from_secs(self.query_interval_secs)
    }
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            start_match_timeout_secs: default_start_match_timeout_secs(),
            query_interval_secs: default_query_interval_secs(),
            query_max_attempts: default_query_max_attempts(),
            matchmaking_type: default_matchmaking_type(),
        }
    }
}

// Gameye may take up to 50 seconds to start a server
fn default_start_match_timeout_secs() -> u64 { 50 }
fn default_query_interval_secs() -> u64 { 3 }
fn default_query_max_attempts() -> u32 { 10 }
fn default_matchmaking_type() -> u32 { 4 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionSettings {
    /// Extra or replacement region → location entries
    #[serde(default)]
    pub mappings: Vec<RegionMapping>,
}

impl RegionSettings {
    pub fn pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.mappings.iter().map(|m| (m.region.clone(), m.location.clone()))
    }
}

/// One region → location entry; an empty location disables a built-in region.
///
/// Kept as a list rather than a table so region names keep their case.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionMapping {
    pub region: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with MATCHBRIDGE_)
    /// 5. `PLAYFAB_SECRET_KEY` and `GAMEYE_TOKEN` for the two secrets
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., MATCHBRIDGE__GAMEYE__ENDPOINT -> gameye.endpoint
            .add_source(environment())
            .build()?;

        apply_secret_overrides(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    /// PlayFab endpoint, derived from the title id unless configured
    pub fn playfab_endpoint(&self) -> String {
        self.playfab
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.playfabapi.com", self.playfab.title_id))
    }
}

fn environment() -> Environment {
    Environment::with_prefix("MATCHBRIDGE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Secrets usually arrive through their conventional variable names rather
/// than the prefixed form
fn apply_secret_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(secret_key) = env::var("PLAYFAB_SECRET_KEY") {
        builder = builder.set_override("playfab.secret_key", secret_key)?;
    }
    if let Ok(token) = env::var("GAMEYE_TOKEN") {
        builder = builder.set_override("gameye.token", token)?;
    }

    builder.build()
}
