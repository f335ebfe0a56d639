//! Documentation of a phone-verified community poll.
//!
//!
//!
//! # General Infrastructure
//! - Static frontend is hosted separately and calls this server over CORS
//! - Questions and votes are kept in a spreadsheet so organizers can read them directly
//! - SMS codes are sent and checked by Twilio Verify
//! - Spreadsheet is optional, without it everything lives in memory for the life of the process
//!
//!
//!
//! # Endpoints
//!
//! | Method & Path | Body | Response |
//! |---|---|---|
//! | GET /api/questions | | list of questions |
//! | POST /api/questions | question | `{success}` |
//! | POST /api/questions/update | list of questions | `{success}` |
//! | POST /api/vote, /save-vote | `{phoneNumber, answers}` | `{success}` or `{error}` |
//! | GET /api/results | | per question `{question, for, against}` |
//! | GET /api/results/csv | | `text/csv` attachment |
//! | POST /send-sms | `{to}` | provider verification or `{error, code}` |
//! | POST /verify-sms | `{to, code}` | provider check or `{error, code}` |
//!
//!
//!
//! # Notes
//!
//! ## Split sources
//! Votes always go to the in-process list and, when possible, to the spreadsheet.
//! Results read the spreadsheet when it answers, the in-process list otherwise.
//! The two are not merged. A vote saved only in memory during a spreadsheet
//! outage disappears from results once the spreadsheet is back, though it is
//! still in memory until the process exits.
//!
//!
//!
//! # Setup
//!
//! Run locally with in-memory storage.
//! ```sh
//! RUST_LOG=info cargo run -p poll
//! ```
//!
//! Secrets are read from the environment or `/run/secrets/<NAME>`.
//! ```sh
//! SPREADSHEET_ID=... GOOGLE_CREDENTIALS="$(cat service-account.json)" cargo run -p poll
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod questions;
pub mod results;
pub mod routes;
pub mod sheets;
pub mod state;
pub mod user;
pub mod utils;
pub mod verification;
pub mod votes;

#[cfg(test)]
mod fake;

use routes::{
    add_question_handler, questions_handler, results_csv_handler, results_handler,
    send_sms_handler, update_questions_handler, verify_sms_handler, vote_handler,
};
use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await;

    info!("Starting server...");

    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/api/questions",
            get(questions_handler).post(add_question_handler),
        )
        .route("/api/questions/update", post(update_questions_handler))
        .route("/api/vote", post(vote_handler))
        .route("/save-vote", post(vote_handler))
        .route("/api/results", get(results_handler))
        .route("/api/results/csv", get(results_csv_handler))
        .route("/send-sms", post(send_sms_handler))
        .route("/verify-sms", post(verify_sms_handler))
        .layer(cors)
        .with_state(state)
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return AllowOrigin::any();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin
                .parse()
                .map_err(|e| warn!("Ignoring invalid origin {origin}: {e}"))
                .ok()
        })
        .collect();

    AllowOrigin::list(origins)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header::CONTENT_DISPOSITION},
        response::Response,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        database::Storage,
        fake::{FakeStorage, FakeVerifier},
        models::{AGAINST, FOR, Question, ResultTally, default_questions},
        verification::Verifier,
    };

    fn config() -> Config {
        Config {
            port: 0,
            allowed_origins: vec!["*".to_string()],
            country_code: "972".to_string(),
            spreadsheet_id: None,
            google_credentials: None,
            questions_sheet: "questions".to_string(),
            votes_sheet: "votes".to_string(),
            sheets_url: "http://127.0.0.1:1".to_string(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_service_sid: None,
            verify_url: "http://127.0.0.1:1".to_string(),
        }
    }

    async fn app(
        storage: Option<Arc<dyn Storage>>,
        verifier: Option<Arc<dyn Verifier>>,
    ) -> Router {
        router(State::from_parts(config(), storage, verifier).await)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let request = Request::builder().method(method).uri(uri);

        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn questions_fall_back_to_defaults() {
        let storage: Arc<dyn Storage> = Arc::new(FakeStorage::unavailable());
        let app = app(Some(storage), None).await;

        let response = send(&app, "GET", "/api/questions", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let questions: Vec<Question> = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(questions, default_questions());
    }

    #[tokio::test]
    async fn votes_are_tallied() {
        let storage: Arc<dyn Storage> = Arc::new(FakeStorage::with_questions(vec![
            Question::new("Q1"),
            Question::new("Q2"),
        ]));
        let app = app(Some(storage), None).await;

        let response = send(
            &app,
            "POST",
            "/api/vote",
            Some(json!({ "phoneNumber": "A", "answers": [FOR, AGAINST] })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "success": true }));

        let response = send(
            &app,
            "POST",
            "/save-vote",
            Some(json!({ "phoneNumber": "B", "answers": [FOR, FOR] })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "GET", "/api/results", None).await;
        let body = json_body(response).await;
        assert_eq!(
            body,
            json!([
                { "question": "Q1", "for": 2, "against": 0 },
                { "question": "Q2", "for": 1, "against": 1 },
            ])
        );

        let again = json_body(send(&app, "GET", "/api/results", None).await).await;
        assert_eq!(body, again);
    }

    #[tokio::test]
    async fn vote_without_phone_is_rejected() {
        let storage = Arc::new(FakeStorage::default());
        let app = app(Some(storage.clone()), None).await;

        let response = send(
            &app,
            "POST",
            "/api/vote",
            Some(json!({ "phoneNumber": "", "answers": [FOR] })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
        assert!(storage.ballots.lock().await.is_empty());

        let results = json_body(send(&app, "GET", "/api/results", None).await).await;
        let results: Vec<ResultTally> = serde_json::from_value(results).unwrap();
        assert!(results.iter().all(|r| r.for_count == 0 && r.against_count == 0));
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let app = app(None, None).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/vote")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn results_survive_storage_outage() {
        let storage = Arc::new(FakeStorage::with_questions(vec![Question::new("Q1")]));
        let app = app(Some(storage.clone()), None).await;
        storage.set_down(true);

        let response = send(
            &app,
            "POST",
            "/api/vote",
            Some(json!({ "phoneNumber": "A", "answers": [AGAINST] })),
        )
        .await;
        assert_eq!(json_body(response).await, json!({ "success": true }));

        let body = json_body(send(&app, "GET", "/api/results", None).await).await;
        assert_eq!(body, json!([{ "question": "Q1", "for": 0, "against": 1 }]));
    }

    #[tokio::test]
    async fn results_download_as_csv() {
        let app = app(None, None).await;

        send(
            &app,
            "POST",
            "/api/vote",
            Some(json!({ "phoneNumber": "0501234567", "answers": [FOR] })),
        )
        .await;

        let response = send(&app, "GET", "/api/results/csv", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert!(
            response.headers()[CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("voting-results.csv")
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let csv = String::from_utf8(bytes.to_vec()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "phoneNumber,timestamp,question_1,answer_1,question_2,answer_2"
        );
        assert!(lines[1].starts_with("0501234567,"));
    }

    #[tokio::test]
    async fn empty_csv_names_every_active_question() {
        let app = app(None, None).await;

        let response = send(&app, "GET", "/api/results/csv", None).await;
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            "phoneNumber,timestamp,question_1,answer_1,question_2,answer_2\n"
        );
    }

    #[tokio::test]
    async fn questions_can_be_added_and_replaced() {
        let app = app(None, None).await;

        let response = send(
            &app,
            "POST",
            "/api/questions",
            Some(json!({ "question": "?Build a bike lane", "description": "", "active": true })),
        )
        .await;
        assert_eq!(json_body(response).await, json!({ "success": true }));

        let questions = json_body(send(&app, "GET", "/api/questions", None).await).await;
        assert_eq!(questions[2]["question"], "Build a bike lane?");

        let response = send(
            &app,
            "POST",
            "/api/questions/update",
            Some(json!([{ "question": "Only one", "description": "", "active": true }])),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let results = json_body(send(&app, "GET", "/api/results", None).await).await;
        assert_eq!(results, json!([{ "question": "Only one", "for": 0, "against": 0 }]));
    }

    #[tokio::test]
    async fn send_sms_normalizes_number() {
        let verifier = Arc::new(FakeVerifier::default());
        let app = app(None, Some(verifier.clone())).await;

        let response = send(&app, "POST", "/send-sms", Some(json!({ "to": "0501234567" }))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "pending");
        assert_eq!(verifier.sent.lock().await.as_slice(), ["+972501234567"]);
    }

    #[tokio::test]
    async fn verify_sms_reports_provider_errors() {
        let verifier: Arc<dyn Verifier> = Arc::new(FakeVerifier {
            failure: Some((20404, "The requested resource was not found".to_string())),
            ..Default::default()
        });
        let app = app(None, Some(verifier)).await;

        let response = send(
            &app,
            "POST",
            "/verify-sms",
            Some(json!({ "to": "+972501234567", "code": "123456" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "The requested resource was not found", "code": 20404 })
        );
    }

    #[tokio::test]
    async fn verify_sms_requires_fields() {
        let verifier: Arc<dyn Verifier> = Arc::new(FakeVerifier::default());
        let app = app(None, Some(verifier)).await;

        let response = send(&app, "POST", "/verify-sms", Some(json!({ "to": "0501234567" }))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
