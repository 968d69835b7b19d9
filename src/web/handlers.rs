//! Route handlers.
//!
//! JSON routes that need a signed-in user answer 401 before looking at the
//! body. Bodies are parsed leniently: anything that is not the expected
//! object counts as an empty request.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, CallbackParams};
use crate::orchestrator::{OrchestratorError, FRAMEWORK};
use crate::rag::persona::Persona;
use crate::search::SearchResult;
use crate::status;

use super::session::append_set_cookie;
use super::AppState;

/// Prompt used by `/test_rag` when none is given.
pub const DEFAULT_TEST_PROMPT: &str = "What is Azure?";

/// Documents fetched by the `/test_rag` raw search.
const TEST_RAG_TOP: usize = 3;

/// Strings that mark a document as mentioning the chief executive.
const CEO_MARKERS: [&str; 2] = ["CEO", "Jordan Ellis"];

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct PromptRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    persona: Option<String>,
}

impl PromptRequest {
    fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// The prompt, if present and non-empty.
    fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.is_empty())
    }

    fn persona(&self) -> Persona {
        Persona::parse(self.persona.as_deref())
    }

    fn is_chat(&self) -> bool {
        self.mode.as_deref() == Some("chat")
    }
}

#[derive(Debug, Default, Deserialize)]
struct TestRagRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    debug_search: bool,
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// 302 redirect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_owned())]).into_response()
}

fn render(page: Result<String, handlebars::RenderError>) -> Response {
    match page {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!(error = %e, "page render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "page render failed").into_response()
        }
    }
}

fn not_authenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Not authenticated" })),
    )
        .into_response()
}

fn no_prompt() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "No prompt provided" })),
    )
        .into_response()
}

fn orchestrator_unavailable(error: &OrchestratorError, action: &str) -> Response {
    match error {
        OrchestratorError::Disabled => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "Semantic Kernel service not available",
                "response": "Semantic Kernel is not configured or installed. Please check your installation.",
                "status": "error",
                "framework": FRAMEWORK,
            })),
        )
            .into_response(),
        OrchestratorError::Init(_) => {
            warn!(error = %error, "orchestrator unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": format!("Semantic Kernel processing error: {error}"),
                    "response": format!("Error processing {action} with Semantic Kernel: {error}"),
                    "status": "error",
                    "framework": FRAMEWORK,
                })),
            )
                .into_response()
        }
    }
}

async fn is_signed_in(state: &AppState, headers: &HeaderMap) -> bool {
    state.sessions.user(headers).await.is_some()
}

// ---------------------------------------------------------------------------
// Pages and sign-in
// ---------------------------------------------------------------------------

/// `GET /`: chat page, or a redirect to sign-in.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.sessions.user(&headers).await {
        Some(user) => render(state.pages.index(&user)),
        None => found("/login"),
    }
}

/// `GET /login`: start a sign-in and show the provider link.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, created) = state.sessions.get_or_create(&headers).await;

    let mut response = match state.identity.build_auth_code_flow() {
        Ok(flow) => {
            let auth_uri = flow.auth_uri.clone();
            state.sessions.set_flow(id, flow).await;
            render(state.pages.login(&auth_uri))
        }
        Err(e) => {
            warn!(error = %e, "cannot start sign-in");
            render(state.pages.auth_error(&e.title(), &e.description()))
        }
    };
    if created {
        append_set_cookie(response.headers_mut(), state.sessions.set_cookie(id));
    }
    response
}

/// `GET /getAToken`: provider callback.
pub async fn authorized(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(id) = state.sessions.session_id(&headers) else {
        return auth_failure(&state, &AuthError::NoFlow);
    };
    let Some(flow) = state.sessions.take_flow(id).await else {
        return auth_failure(&state, &AuthError::NoFlow);
    };

    match state.identity.complete_auth_code_flow(&flow, &params).await {
        Ok(user) => {
            info!(oid = %user.oid, "user signed in");
            let signed_in = state.sessions.promote(id, user).await;
            let mut response = found("/");
            append_set_cookie(response.headers_mut(), state.sessions.set_cookie(signed_in));
            response
        }
        Err(e) => auth_failure(&state, &e),
    }
}

fn auth_failure(state: &AppState, error: &AuthError) -> Response {
    warn!(error = %error, "sign-in failed");
    render(state.pages.auth_error(&error.title(), &error.description()))
}

/// `GET /logout`: forget the session and return to sign-in.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = state.sessions.session_id(&headers) {
        state.sessions.remove(id).await;
    }
    let mut response = found("/login");
    append_set_cookie(response.headers_mut(), state.sessions.clear_cookie());
    response
}

// ---------------------------------------------------------------------------
// Direct pipeline
// ---------------------------------------------------------------------------

/// `POST /process_prompt`: chat or search depending on `mode`.
pub async fn process_prompt(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_signed_in(&state, &headers).await {
        return not_authenticated();
    }
    let request = PromptRequest::parse(&body);
    let Some(prompt) = request.prompt() else {
        return no_prompt();
    };
    debug!(chat = request.is_chat(), "process_prompt");

    if request.is_chat() {
        let result = state.pipeline.process_chat(prompt, request.persona()).await;
        Json(json!({
            "response": result.response,
            "status": result.status,
            "query": result.query,
            "mode": "chat",
            "persona": result.persona,
            "chat_result": result.chat_result,
        }))
        .into_response()
    } else {
        let result = state.pipeline.process_search(prompt).await;
        Json(json!({
            "response": result.response,
            "status": result.status,
            "query": result.query,
            "mode": "search",
            "search_results": result.search_results,
        }))
        .into_response()
    }
}

/// `POST /process_chat`.
pub async fn process_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_signed_in(&state, &headers).await {
        return not_authenticated();
    }
    let request = PromptRequest::parse(&body);
    let Some(prompt) = request.prompt() else {
        return no_prompt();
    };

    let result = state.pipeline.process_chat(prompt, request.persona()).await;
    Json(result).into_response()
}

/// `POST /process_search`.
pub async fn process_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_signed_in(&state, &headers).await {
        return not_authenticated();
    }
    let request = PromptRequest::parse(&body);
    let Some(prompt) = request.prompt() else {
        return no_prompt();
    };

    let result = state.pipeline.process_search(prompt).await;
    Json(result).into_response()
}

// ---------------------------------------------------------------------------
// Orchestrated pipeline
// ---------------------------------------------------------------------------

/// `POST /process_sk_chat`.
pub async fn process_sk_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_signed_in(&state, &headers).await {
        return not_authenticated();
    }
    let request = PromptRequest::parse(&body);
    let Some(prompt) = request.prompt() else {
        return no_prompt();
    };

    match state.orchestrator.process_chat(prompt, request.persona()).await {
        Ok(result) => Json(json!({
            "response": result.response,
            "status": result.status,
            "query": result.query,
            "persona": result.persona,
            "framework": result.framework,
            "context_found": result.context_found,
            "context_documents": result.context_documents,
            "sk_result": result,
        }))
        .into_response(),
        Err(e) => orchestrator_unavailable(&e, "request"),
    }
}

/// `POST /process_sk_search`.
pub async fn process_sk_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_signed_in(&state, &headers).await {
        return not_authenticated();
    }
    let request = PromptRequest::parse(&body);
    let Some(prompt) = request.prompt() else {
        return no_prompt();
    };

    match state.orchestrator.process_search(prompt).await {
        Ok(result) => Json(json!({
            "response": result.response,
            "status": result.status,
            "query": result.query,
            "framework": result.framework,
            "results_count": result.results_count,
            "sk_result": result,
        }))
        .into_response(),
        Err(e) => orchestrator_unavailable(&e, "search"),
    }
}

// ---------------------------------------------------------------------------
// Status and diagnostics
// ---------------------------------------------------------------------------

/// `GET /ai_status`.
pub async fn ai_status(State(state): State<AppState>) -> Response {
    let report = status::collect(&state.config, state.search.as_deref(), &state.orchestrator).await;
    Json(report).into_response()
}

/// `GET /test`: liveness plus what the caller's session holds.
pub async fn test_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let data = match state.sessions.session_id(&headers) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    let user_in_session = data.as_ref().is_some_and(|d| d.user.is_some());
    let session_keys = data.as_ref().map(|d| d.keys()).unwrap_or_default();
    Json(json!({
        "status": "ok",
        "message": "ragcall is running",
        "user_in_session": user_in_session,
        "session_keys": session_keys,
    }))
    .into_response()
}

/// `GET /test_rag`: usage hint.
pub async fn test_rag_info() -> Response {
    Json(json!({
        "message": "RAG Test Endpoint",
        "instructions": "Send POST request with {'prompt': 'your question'} to test RAG functionality",
    }))
    .into_response()
}

/// `POST /test_rag`: run the direct chat pipeline, or with `debug_search`
/// return raw search results annotated with CEO mentions.
pub async fn test_rag(State(state): State<AppState>, body: Bytes) -> Response {
    let request: TestRagRequest = serde_json::from_slice(&body).unwrap_or_default();
    let prompt = request
        .prompt
        .unwrap_or_else(|| DEFAULT_TEST_PROMPT.to_owned());
    if state.config.rag_debug() {
        debug!(prompt_len = prompt.len(), debug_search = request.debug_search, "test_rag");
    }

    if request.debug_search {
        let mut outcome = state.pipeline.raw_search(&prompt, TEST_RAG_TOP).await;
        if let Some(documents) = outcome.documents_mut() {
            documents.iter_mut().for_each(annotate_ceo_mentions);
        }
        return Json(json!({
            "test_endpoint": "test_rag_debug_search",
            "prompt": prompt,
            "search_results": outcome,
            "timestamp": Uuid::new_v4().to_string(),
        }))
        .into_response();
    }

    let result = state.pipeline.process_chat(&prompt, Persona::default()).await;
    Json(json!({
        "test_endpoint": "test_rag",
        "prompt": prompt,
        "rag_response": result,
        "timestamp": Uuid::new_v4().to_string(),
    }))
    .into_response()
}

/// Add `has_ceo_info`, `content_length` and (when relevant) `ceo_mentions`
/// to a raw search document.
pub fn annotate_ceo_mentions(document: &mut SearchResult) {
    let content = match document.fields.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let mentions = |line: &str| CEO_MARKERS.iter().any(|m| line.contains(m));
    let has_ceo_info = mentions(&content);

    document
        .fields
        .insert("has_ceo_info".to_owned(), Value::Bool(has_ceo_info));
    document.fields.insert(
        "content_length".to_owned(),
        Value::from(content.chars().count()),
    );
    if has_ceo_info {
        let lines: Vec<Value> = content
            .split('\n')
            .enumerate()
            .filter(|(_, line)| mentions(line))
            .map(|(j, line)| Value::String(format!("Line {j}: {}", line.trim())))
            .collect();
        document
            .fields
            .insert("ceo_mentions".to_owned(), Value::Array(lines));
    }
}

/// `GET /auth_error_test`: preview of the sign-in failure page.
pub async fn auth_error_test(State(state): State<AppState>) -> Response {
    render(state.pages.auth_error(
        "Test Error",
        "This is a test of the authentication error page. This page would normally be shown when there's an issue with Azure AD authentication.",
    ))
}
