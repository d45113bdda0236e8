//! HTTP surface of the survey form.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn, Instrument};

use crate::error::Result;
use crate::form::{render_page, FormCollector, PageView, SubmissionState};
use crate::submission::FormInput;

/// Shared state of the web handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    collector: Arc<FormCollector>,
    title: Arc<str>,
    request_seq: Arc<AtomicU64>,
}

impl AppState {
    /// Create handler state around a form collector.
    #[must_use]
    pub fn new(collector: FormCollector, title: impl Into<Arc<str>>) -> Self {
        Self {
            collector: Arc::new(collector),
            title: title.into(),
            request_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_request_id(&self) -> String {
        format!("req-{:06}", self.request_seq.fetch_add(1, Ordering::Relaxed))
    }
}

/// Query string of the form page.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Show the answers table when set to `1`, `true` or `on`.
    #[serde(default)]
    pub show: Option<String>,
}

impl PageQuery {
    fn show_answers(&self) -> bool {
        matches!(self.show.as_deref(), Some("1" | "true" | "on"))
    }
}

/// Build the router serving the form.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(form_handler).post(submit_handler))
        .route("/answers.csv", get(csv_handler))
        .route("/healthz", get(healthz_handler))
        .layer(from_fn_with_state(state.clone(), request_tracing_middleware))
        .with_state(state)
}

/// Serve the form on `listener` until the process is stopped.
///
/// # Errors
///
/// Returns an error if the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Serving survey form on http://{addr}");
    }
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn request_tracing_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = state.next_request_id();
    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %request.method(),
        route = %request.uri().path(),
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        info!(
            status = response.status().as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Request finished"
        );
    });
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

async fn page(
    state: &AppState,
    submission: &SubmissionState,
    input: &FormInput,
    query: &PageQuery,
) -> String {
    let answers = if query.show_answers() {
        Some(state.collector.list().await.map_err(|e| e.to_string()))
    } else {
        None
    };
    render_page(&PageView {
        title: &state.title,
        state: submission,
        input,
        answers: answers.as_ref().map(|r| r.as_ref().map_err(String::as_str)),
    })
}

async fn form_handler(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Html<String> {
    Html(page(&state, &SubmissionState::default(), &FormInput::default(), &query).await)
}

async fn submit_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Form(input): Form<FormInput>,
) -> (StatusCode, Html<String>) {
    let outcome = state.collector.handle(input.clone()).await;
    let status = match &outcome {
        SubmissionState::Succeeded { .. } | SubmissionState::Submitting => StatusCode::OK,
        SubmissionState::Collecting { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionState::Failed { reason } => {
            warn!(%reason, "Submission failed");
            StatusCode::BAD_GATEWAY
        }
    };
    (status, Html(page(&state, &outcome, &input, &query).await))
}

async fn csv_handler(State(state): State<AppState>) -> Response {
    let csv = state
        .collector
        .list()
        .await
        .and_then(|table| table.to_csv());
    match csv {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Could not fetch answers");
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}
