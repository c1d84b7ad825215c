use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::{FlowSupervisor, Orchestrator};
use crate::models::{
    CreateTicketRequest, ErrorResponse, HealthResponse, MatchFoundRequest, MatchFoundResponse, MatchFoundSignal,
    TicketCreatedResponse,
};
use crate::services::MatchmakingBackend;

/// Application state shared across all handlers
///
/// Built once at start-up; flows only ever read from it.
#[derive(Clone)]
pub struct AppState {
    pub matchmaking: Arc<dyn MatchmakingBackend>,
    pub orchestrator: Arc<Orchestrator>,
    pub supervisor: Arc<FlowSupervisor>,
    pub follow_tickets: bool,
}

/// Configure the matchmaking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/CreateSinglePlayerTicket", web::post().to(create_ticket))
        .route("/matchfound", web::post().to(match_found));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let status = if state.supervisor.is_shutting_down() { "shutting_down" } else { "healthy" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        in_flight_flows: state.supervisor.in_flight(),
        timestamp: chrono::Utc::now(),
    })
}

/// Create a single-player ticket
///
/// POST /CreateSinglePlayerTicket
///
/// Request body:
/// ```json
/// {
///   "DataObject": { "Latency": [{ "region": "ChinaEast2", "latency": 70 }] },
///   "TitleAccountId": "string",
///   "QueueName": "string",
///   "GiveUpAfterSeconds": 300
/// }
/// ```
async fn create_ticket(state: web::Data<AppState>, req: web::Json<CreateTicketRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for ticket request: {}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request());
    }

    let req = req.into_inner();
    let give_up_after = req.give_up_after();

    let ticket_id = match state
        .matchmaking
        .create_ticket(&req.title_account_id, &req.queue_name, give_up_after, req.data_object)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Failed to create ticket for {}: {}", req.title_account_id, e);
            return HttpResponse::BadGateway().json(ErrorResponse::error(e.to_string()));
        }
    };

    if state.follow_tickets {
        let orchestrator = state.orchestrator.clone();
        let shutdown = state.supervisor.signal();
        let flow_ticket = ticket_id.clone();
        let queue = req.queue_name.clone();

        let spawned = state.supervisor.spawn(&format!("ticket {}", ticket_id), async move {
            orchestrator.handle_ticket(&flow_ticket, &queue, &shutdown).await;
        });
        if let Err(e) = spawned {
            tracing::warn!("Not following ticket {}: {}", ticket_id, e);
        }
    }

    HttpResponse::Ok().json(TicketCreatedResponse {
        status: "OK".to_string(),
        ticket_id,
    })
}

/// Match-found notification
///
/// POST /matchfound
///
/// Acknowledges immediately; provisioning runs as a detached flow.
async fn match_found(state: web::Data<AppState>, req: web::Json<MatchFoundRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match-found request: {}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request());
    }

    let signal = MatchFoundSignal::from(req.into_inner());
    let orchestrator = state.orchestrator.clone();
    let shutdown = state.supervisor.signal();
    let flow_signal = signal.clone();

    let spawned = state.supervisor.spawn(&format!("match {}", signal.match_id), async move {
        orchestrator.handle_match_found(flow_signal, &shutdown).await;
    });

    if let Err(e) = spawned {
        tracing::warn!("Rejected match {}: {}", signal.match_id, e);
        return HttpResponse::ServiceUnavailable().json(ErrorResponse::error(e.to_string()));
    }

    tracing::info!("Accepted match {} in queue {}", signal.match_id, signal.queue_name);

    HttpResponse::Ok().json(MatchFoundResponse {
        status: "OK".to_string(),
        match_info: signal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        MatchQueryFallback, MatchResolver, ProvisioningDriver, RegionMapper, RequestTemplate, TicketPoller,
    };
    use crate::models::Match;
    use crate::routes::{configure_routes, handle_json_payload_error};
    use crate::testing::{CollectingReporter, FakeMatchmaking, ScriptedHosting, StartReply};
    use actix_web::{test, App};
    use std::time::Duration;

    fn state(matchmaking: Arc<FakeMatchmaking>, hosting: Arc<ScriptedHosting>, reporter: Arc<CollectingReporter>) -> AppState {
        let orchestrator = Orchestrator::new(
            TicketPoller::new(matchmaking.clone(), Duration::from_millis(5), 3),
            MatchResolver::new(matchmaking.clone()),
            RegionMapper::new(),
            ProvisioningDriver::new(
                hosting.clone(),
                Duration::from_secs(1),
                MatchQueryFallback::new(hosting, Duration::from_millis(5), 2),
            ),
            RequestTemplate {
                game_key: "game".to_string(),
                template_key: "tpl".to_string(),
                matchmaking_type: 4,
            },
            reporter,
        );

        AppState {
            matchmaking,
            orchestrator: Arc::new(orchestrator),
            supervisor: Arc::new(FlowSupervisor::new()),
            follow_tickets: false,
        }
    }

    #[actix_web::test]
    async fn test_match_found_acknowledges_and_runs_flow() {
        let matchmaking = Arc::new(FakeMatchmaking::new());
        matchmaking.add_match(Match {
            match_id: "m-1".to_string(),
            queue_name: "ranked".to_string(),
            members: vec![],
            region_preferences: vec!["ChinaEast2".to_string()],
        });
        let hosting = Arc::new(ScriptedHosting::new());
        hosting.script_start(vec![StartReply::Status(
            200,
            r#"{"location":"china-east","host":"h1","port":{"game":7777}}"#.to_string(),
        )]);
        let reporter = Arc::new(CollectingReporter::new());
        let app_state = state(matchmaking, hosting, reporter.clone());
        let supervisor = app_state.supervisor.clone();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matchfound")
            .set_json(serde_json::json!({"MatchId": "m-1", "QueueName": "ranked"}))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp["Status"], "OK");
        assert_eq!(resp["MatchInfo"]["MatchId"], "m-1");

        supervisor.shutdown(Duration::from_secs(5)).await;
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].outcome.is_allocated());
    }

    #[actix_web::test]
    async fn test_match_found_rejects_bad_bodies() {
        let app_state = state(
            Arc::new(FakeMatchmaking::new()),
            Arc::new(ScriptedHosting::new()),
            Arc::new(CollectingReporter::new()),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matchfound")
            .set_json(serde_json::json!({"MatchId": "", "QueueName": "ranked"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let req = test::TestRequest::post()
            .uri("/matchfound")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["Status"], "BadRequest");
    }

    #[actix_web::test]
    async fn test_match_found_refused_during_shutdown() {
        let app_state = state(
            Arc::new(FakeMatchmaking::new()),
            Arc::new(ScriptedHosting::new()),
            Arc::new(CollectingReporter::new()),
        );
        app_state.supervisor.shutdown(Duration::from_millis(1)).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matchfound")
            .set_json(serde_json::json!({"MatchId": "m-1", "QueueName": "ranked"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
    }

    #[actix_web::test]
    async fn test_create_ticket_follows_when_enabled() {
        let matchmaking = Arc::new(FakeMatchmaking::new());
        matchmaking.script_ticket(&[crate::models::TicketStatus::Canceled]);
        let reporter = Arc::new(CollectingReporter::new());
        let mut app_state = state(matchmaking.clone(), Arc::new(ScriptedHosting::new()), reporter.clone());
        app_state.follow_tickets = true;
        let supervisor = app_state.supervisor.clone();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/CreateSinglePlayerTicket")
            .set_json(serde_json::json!({
                "DataObject": {"Latency": [{"region": "ChinaEast2", "latency": 70}]},
                "TitleAccountId": "3A19654FEB889FE4",
                "QueueName": "ranked"
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp["Status"], "OK");
        assert_eq!(resp["TicketId"], "ticket-1");
        assert_eq!(
            matchmaking.created_tickets(),
            vec![("3A19654FEB889FE4".to_string(), "ranked".to_string())]
        );

        supervisor.shutdown(Duration::from_secs(5)).await;
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].ticket_id.as_deref(), Some("ticket-1"));
    }

    #[actix_web::test]
    async fn test_health_reports_version() {
        let app_state = state(
            Arc::new(FakeMatchmaking::new()),
            Arc::new(ScriptedHosting::new()),
            Arc::new(CollectingReporter::new()),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp["status"], "healthy");
        assert_eq!(resp["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(resp["in_flight_flows"], 0);
    }
}
