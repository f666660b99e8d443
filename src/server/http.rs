//! HTTP server implementation
//!
//! hyper http1 accept loop with one spawned task per connection. Every
//! request passes the rate limiter before reaching a handler (health and
//! version probes excepted), and every limited response carries the
//! X-RateLimit-* headers computed by that single check.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::catalog::{StaticCatalog, TaskSource};
use crate::config::Args;
use crate::quality::QualityValidator;
use crate::ratelimit::{RateDecision, RateLimiter, RuleTable};
use crate::routes;
use crate::selector::{SelectorConfig, TaskSelector};
use crate::session::SessionService;
use crate::store::{spawn_sweep_task, MemoryStore, StateStore};
use crate::submission::SubmissionRecorder;
use crate::types::{GateError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Concrete handle kept for stats; services hold it as `dyn StateStore`
    pub store: Arc<MemoryStore>,
    pub limiter: RateLimiter,
    pub sessions: SessionService,
    pub selector: TaskSelector,
    pub validator: QualityValidator,
    pub recorder: SubmissionRecorder,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args) -> Result<Self> {
        let table = RuleTable::from_config(&args.rate).map_err(GateError::InvalidConfig)?;

        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn StateStore> = Arc::clone(&store) as Arc<dyn StateStore>;
        let catalog: Arc<dyn TaskSource> = Arc::new(StaticCatalog::with_samples());

        let limiter = RateLimiter::new(Arc::clone(&shared), table);
        let sessions = SessionService::new(Arc::clone(&shared), args.session_ttl());
        let selector = TaskSelector::new(
            Arc::clone(&shared),
            catalog,
            SelectorConfig {
                platform_max_complexity: args.platform_max_complexity,
                assignment_ttl: args.assignment_ttl(),
                lease_ttl: args.lease_ttl(),
                batch_ttl: args.batch_ttl(),
            },
        );
        let validator = QualityValidator::new(Arc::clone(&shared), args.audit_ttl());
        let recorder = SubmissionRecorder::new(shared, args.audit_ttl());

        Ok(Self {
            args,
            store,
            limiter,
            sessions,
            selector,
            validator,
            recorder,
            started_at: Instant::now(),
        })
    }
}

/// Run the gateway until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Labelgate listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    spawn_sweep_task(
        Arc::clone(&state.store),
        Duration::from_secs(state.args.store_sweep_interval_seconds),
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = routes::parse_query_params(req.uri().query().unwrap_or(""));

    debug!("[{}] {} {}", addr, method, path);

    // Probes and preflight bypass the limiter
    match (&method, path.as_str()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            return Ok(routes::health::handle(&state));
        }
        (&Method::GET, "/version") => {
            return Ok(routes::health::version());
        }
        (&Method::OPTIONS, _) => {
            return Ok(preflight_response());
        }
        _ => {}
    }

    // Caller identity for rate limiting; publisher/session ids inside the
    // request are pre-validated upstream and trusted here
    let caller_id = req
        .headers()
        .get("X-Publisher-ID")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();

    let decision = state.limiter.check(&caller_id, &path).await;
    if !decision.allowed {
        let mut response = rate_limited_response(&decision);
        apply_rate_headers(&mut response, &decision);
        return Ok(response);
    }

    let mut response = match (method, path.as_str()) {
        (Method::GET, "/status") => routes::status::handle(&state),
        (Method::GET, "/v1/tasks/next") => routes::tasks::next_task(&state, &query).await,
        (Method::GET, "/v1/tasks/batch") => routes::tasks::batch_tasks(&state, &query).await,
        (Method::POST, p) if p.starts_with("/v1/tasks/") && p.ends_with("/submit") => {
            let task_id = p
                .strip_prefix("/v1/tasks/")
                .and_then(|rest| rest.strip_suffix("/submit"))
                .unwrap_or("")
                .to_string();
            let body = req.collect().await?.to_bytes();
            routes::tasks::submit_task(&state, &task_id, body).await
        }
        (Method::POST, "/v1/users/sessions") => {
            let body = req.collect().await?.to_bytes();
            routes::sessions::init_session(&state, body).await
        }
        (Method::PATCH, p)
            if p.starts_with("/v1/users/sessions/") && p.ends_with("/profile") =>
        {
            let session_id = p
                .strip_prefix("/v1/users/sessions/")
                .and_then(|rest| rest.strip_suffix("/profile"))
                .unwrap_or("")
                .to_string();
            let body = req.collect().await?.to_bytes();
            routes::sessions::update_profile(&state, &session_id, body).await
        }
        _ => routes::error_response(StatusCode::NOT_FOUND, "not_found", "Unknown route"),
    };

    apply_rate_headers(&mut response, &decision);
    Ok(response)
}

/// 429 with the structured error the widget understands
fn rate_limited_response(decision: &RateDecision) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(&json!({
        "error": {
            "code": "rate_limit_exceeded",
            "message": format!(
                "Rate limit exceeded. Try again in {} seconds.",
                decision.reset_seconds
            ),
            "details": {
                "limit": decision.limit,
                "window_seconds": decision.window_seconds,
                "reset_at": decision.reset_seconds,
            },
        }
    }))
    .unwrap_or_default();

    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn apply_rate_headers(response: &mut Response<Full<Bytes>>, decision: &RateDecision) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_seconds));
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, X-Publisher-ID, X-Session-ID",
        )
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_app_state_builds_from_default_config() {
        let args = Args::parse_from(["labelgate"]);
        assert!(AppState::new(args).is_ok());
    }

    #[test]
    fn test_app_state_rejects_bad_quota() {
        let mut args = Args::parse_from(["labelgate"]);
        args.rate.tasks = "broken".to_string();
        assert!(matches!(
            AppState::new(args),
            Err(GateError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_response_shape() {
        let decision = RateDecision {
            allowed: false,
            limit: 30,
            remaining: 0,
            reset_seconds: 60,
            window_seconds: 60,
        };
        let mut response = rate_limited_response(&decision);
        apply_rate_headers(&mut response, &decision);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["X-RateLimit-Limit"], "30");
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "0");
        assert_eq!(response.headers()["X-RateLimit-Reset"], "60");
    }
}
