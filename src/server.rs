//! Web form and JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | The question form |
//! | `POST` | `/` | Submit the form (`question` field), render the answer |
//! | `POST` | `/api/ask` | `{"question": "..."}` → answer and sources as JSON |
//! | `GET`  | `/health` | Status, version and index summary |
//!
//! # Error Contract
//!
//! JSON errors use one envelope:
//!
//! ```json
//! { "error": { "code": "no_context", "message": "no relevant context found in the document" } }
//! ```
//!
//! Codes: `bad_request` (400), `no_context` (404), `embedding_failed` (502),
//! `generation_unavailable` (502), `generation_rejected` (502),
//! `generation_failed` (502). The form renders the same message in an error
//! region with the same status.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{Config, UiConfig};
use crate::error::AskError;
use crate::generation::GenerationError;
use crate::knowledge::KnowledgeBase;
use crate::models::Answer;
use crate::wrap::wrap_text;

/// Shared state for all handlers. Both parts are read-only.
#[derive(Clone)]
pub struct AppState {
    pub kb: Arc<KnowledgeBase>,
    pub ui: Arc<UiConfig>,
}

/// Builds the router. Split from [`run_server`] so tests can drive it directly.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_form).post(handle_submit))
        .route("/api/ask", post(handle_api_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serves `kb` on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config, kb: Arc<KnowledgeBase>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        kb,
        ui: Arc::new(config.ui.clone()),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server started");
    println!("askpdf listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AskError> for AppError {
    fn from(err: AskError) -> Self {
        let (status, code) = classify(&err);
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

/// Maps a question failure onto an HTTP status and a stable error code.
fn classify(err: &AskError) -> (StatusCode, &'static str) {
    match err {
        AskError::EmptyQuestion => (StatusCode::BAD_REQUEST, "bad_request"),
        AskError::NoContext => (StatusCode::NOT_FOUND, "no_context"),
        AskError::QueryEmbedding(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
        AskError::Generation(GenerationError::Unavailable(_)) => {
            (StatusCode::BAD_GATEWAY, "generation_unavailable")
        }
        AskError::Generation(GenerationError::Rejected { .. }) => {
            (StatusCode::BAD_GATEWAY, "generation_rejected")
        }
        AskError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    document: String,
    fingerprint: String,
    pages: usize,
    fragments: usize,
    embedding_model: String,
    generation_model: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        document: state.kb.document().to_string(),
        fingerprint: state.kb.fingerprint().to_string(),
        pages: state.kb.pages(),
        fragments: state.kb.len(),
        embedding_model: state.kb.embedding_model().to_string(),
        generation_model: state.kb.generation_model().to_string(),
    })
}

// ============ POST /api/ask ============

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
}

async fn handle_api_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    state.kb.ask(&req.question).await.map(Json).map_err(|e| {
        if !matches!(e, AskError::EmptyQuestion) {
            tracing::error!(error = %e, "question failed");
        }
        AppError::from(e)
    })
}

// ============ GET / and POST / ============

#[derive(Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub question: String,
}

async fn handle_form(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.ui, "", Outcome::Nothing))
}

async fn handle_submit(State(state): State<AppState>, Form(form): Form<AskForm>) -> Response {
    // Empty input is ignored: same page as GET, no provider calls.
    if form.question.trim().is_empty() {
        return Html(render_page(&state.ui, "", Outcome::Nothing)).into_response();
    }

    match state.kb.ask(&form.question).await {
        Ok(answer) => {
            Html(render_page(&state.ui, &form.question, Outcome::Answered(&answer))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "question failed");
            let (status, _) = classify(&e);
            let page = render_page(&state.ui, &form.question, Outcome::Failed(&e));
            (status, Html(page)).into_response()
        }
    }
}

enum Outcome<'a> {
    Nothing,
    Answered(&'a Answer),
    Failed(&'a AskError),
}

const STYLE: &str = r#"<style>
.centered { text-align: center; }
body { font-family: sans-serif; max-width: 52rem; margin: 2rem auto; padding: 0 1rem; }
.chatbox-container { display: flex; align-items: center; border: 2px solid #4CAF50; border-radius: 5px; padding: 5px; margin-top: 10px; }
.chatbox-input { flex: 1; border: none; padding: 10px; border-radius: 5px; }
.chatbox-send { background-color: #4CAF50; border: none; color: white; padding: 10px; border-radius: 5px; cursor: pointer; }
.chatbox-send:hover { background-color: #45a049; }
.response { border: 2px solid #4CAF50; padding: 10px; border-radius: 5px; margin-top: 10px; background-color: #f1f1f1; }
.response strong { white-space: pre-wrap; }
.error { border: 2px solid #d9534f; padding: 10px; border-radius: 5px; margin-top: 10px; background-color: #fbeaea; }
.sources { color: #555; font-size: 0.9em; }
</style>"#;

fn render_page(ui: &UiConfig, question: &str, outcome: Outcome<'_>) -> String {
    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>{STYLE}</head><body>\n\
         <h1 class=\"centered\">{title}</h1>\n\
         <p class=\"centered\">{subtitle}</p>\n\
         <form method=\"post\" action=\"/\"><div class=\"chatbox-container\">\
         <input class=\"chatbox-input\" type=\"text\" name=\"question\" value=\"{value}\" \
         placeholder=\"Type your question here...\" autofocus>\
         <button class=\"chatbox-send\" type=\"submit\">Send</button></div></form>\n",
        title = encode_text(&ui.title),
        subtitle = encode_text(&ui.subtitle),
        value = encode_double_quoted_attribute(question),
    );

    match outcome {
        Outcome::Nothing => {}
        Outcome::Answered(answer) => {
            let pages: Vec<String> = answer
                .sources
                .iter()
                .map(|s| format!("p. {}", s.fragment.page + 1))
                .collect();
            html.push_str(&format!(
                "<p>You asked: {}</p>\n<p>Response:</p>\n\
                 <div class=\"response\"><strong>{}</strong></div>\n\
                 <p class=\"sources\">Sources: {}</p>\n",
                encode_text(&answer.question),
                encode_text(&wrap_text(&answer.answer, ui.wrap_width)),
                pages.join(", "),
            ));
        }
        Outcome::Failed(err) => {
            html.push_str(&format!(
                "<p>You asked: {}</p>\n<div class=\"error\">{}</div>\n",
                encode_text(question),
                encode_text(&err.to_string()),
            ));
        }
    }

    html.push_str("</body></html>\n");
    html
}
