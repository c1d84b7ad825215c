use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use matchbridge::config::Settings;
use matchbridge::core::{FlowSupervisor, Orchestrator, TracingReporter};
use matchbridge::routes::{self, AppState};
use matchbridge::services::{GameyeClient, PlayFabClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, format: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting Matchbridge...");

    let playfab = Arc::new(
        PlayFabClient::new(settings.playfab_endpoint(), settings.playfab.secret_key.clone())
            .map_err(|e| startup_error("Failed to create PlayFab client", e))?,
    );

    // The title entity token is needed before any matchmaking call
    playfab
        .authenticate()
        .await
        .map_err(|e| startup_error("Failed to acquire PlayFab entity token", e))?;

    let gameye = Arc::new(
        GameyeClient::new(settings.gameye.endpoint.clone(), settings.gameye.token.clone())
            .map_err(|e| startup_error("Failed to create Gameye client", e))?,
    );

    info!("Backend clients initialized");

    let orchestrator = Arc::new(Orchestrator::from_settings(
        &settings,
        playfab.clone(),
        gameye,
        Arc::new(TracingReporter),
    ));
    // Flows run on the main runtime; HTTP worker runtimes stop with the server
    let supervisor = Arc::new(FlowSupervisor::with_runtime(tokio::runtime::Handle::current()));

    let app_state = AppState {
        matchmaking: playfab,
        orchestrator,
        supervisor: supervisor.clone(),
        follow_tickets: settings.matchmaking.follow_tickets,
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await?;

    let aborted = supervisor
        .shutdown(Duration::from_secs(settings.server.shutdown_grace_secs))
        .await;
    info!("Matchbridge stopped ({} flows aborted)", aborted);

    Ok(())
}
