use crate::agent::AgencyAgent;
use crate::cli::Args;
use crate::models::api::{
    ChatRequest,
    ChatResponse,
    ErrorResponse,
    ResumeRequest,
    ResumeResponse,
    StatusResponse,
};
use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use axum::{
    routing::{ delete, get, post },
    Router,
    Json,
    extract::{ Path, State },
    response::sse::{ Event, KeepAlive, Sse },
    response::IntoResponse,
    http::StatusCode,
};
use futures::StreamExt;
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    system: String,
}

#[derive(Serialize)]
struct StreamMeta {
    session_id: i64,
    department: crate::router::Department,
}

#[derive(Serialize)]
struct StreamDelta<'a> {
    delta: &'a str,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<RwLock<AgencyAgent>>,
    args: Args,
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<RwLock<AgencyAgent>>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app_state = AppState { agent, args };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/resume", post(resume_handler))
        .route("/api/sessions", get(list_sessions_handler))
        .route("/api/sessions/{id}/messages", get(session_messages_handler))
        .route("/api/sessions/{id}", delete(delete_session_handler))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .layer(cors)
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn internal_error(e: impl std::fmt::Display) -> axum::response::Response {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: e.to_string() }),
    ).into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let agent = state.agent.read().await;
    Json(HealthResponse { status: "ok", system: agent.system_name().to_string() })
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>
) -> axum::response::Response {
    let agent = state.agent.read().await;
    let dataset = req.dataset_path.as_ref().map(PathBuf::from);

    match agent.process_message(req.session_id, &req.message, dataset.as_deref()).await {
        Ok(turn) =>
            Json(ChatResponse {
                session_id: turn.session_id,
                department: turn.department,
                content: turn.content,
            }).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Server-sent events: one `meta` event carrying the session id and routed
/// department, then `delta` events with JSON-encoded token chunks.
async fn chat_stream_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>
) -> axum::response::Response {
    let agent = state.agent.read().await;
    let dataset = req.dataset_path.as_ref().map(PathBuf::from);

    let (session_id, department, tokens) = match
        agent.process_message_stream(req.session_id, &req.message, dataset.as_deref()).await
    {
        Ok(parts) => parts,
        Err(e) => {
            return internal_error(e);
        }
    };

    let meta = StreamMeta { session_id, department };
    let meta_event = Event::default()
        .event("meta")
        .data(serde_json::to_string(&meta).unwrap_or_default());

    let events = futures::stream
        ::once(async move { Ok::<_, Infallible>(meta_event) })
        .chain(
            tokens.map(|item| {
                let event = match item {
                    Ok(chunk) =>
                        Event::default()
                            .event("delta")
                            .data(
                                serde_json
                                    ::to_string(&(StreamDelta { delta: &chunk }))
                                    .unwrap_or_default()
                            ),
                    Err(e) => Event::default().event("error").data(e.to_string()),
                };
                Ok::<_, Infallible>(event)
            })
        );

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

async fn resume_handler(
    State(state): State<AppState>,
    Json(req): Json<ResumeRequest>
) -> impl IntoResponse {
    let agent = state.agent.read().await;
    let content = agent.optimize_resume(&req.resume_text, &req.job_description).await;
    Json(ResumeResponse { content })
}

async fn list_sessions_handler(State(state): State<AppState>) -> axum::response::Response {
    let history = state.agent.read().await.history();
    match history.list_sessions().await {
        Ok(sessions) => Json(sessions).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn session_messages_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> axum::response::Response {
    let history = state.agent.read().await.history();
    match history.get_conversation(id, 0).await {
        Ok(conversation) => Json(conversation.messages).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> axum::response::Response {
    let history = state.agent.read().await.history();
    match history.delete_session(id).await {
        Ok(()) =>
            Json(StatusResponse {
                success: true,
                message: format!("Session {} deleted", id),
            }).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn reload_prompts_handler(State(state): State<AppState>) -> axum::response::Response {
    let mut agent = state.agent.write().await;
    match agent.reload_prompts_if_changed(&state.args) {
        Ok(true) =>
            Json(StatusResponse {
                success: true,
                message: "Prompts reloaded".into(),
            }).into_response(),
        Ok(false) =>
            Json(StatusResponse {
                success: true,
                message: "Prompts unchanged".into(),
            }).into_response(),
        Err(e) =>
            (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse { success: false, message: format!("Reload error: {}", e) }),
            ).into_response(),
    }
}
