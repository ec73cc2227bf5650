//! HTTP handlers
//!
//! The debate endpoint funnels every outcome - validation failure, client
//! resolution failure, or a full orchestrated debate - through one event
//! channel, so the SSE response always has the same shape: a sequence of
//! JSON events ending with `done` or `error`.

use axum::{
    extract::{Query, State},
    response::{
        Json,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::Stream;
use serde_json::{Value, json};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::warn;

use super::types::{DebateRequest, HistoryQuery};
use crate::debate::orchestrator::{DebateClients, DebateParams, run_debate};
use crate::debate::{events::DebateEvent, validate_topic};
use crate::provider::registry::{ResolveError, detect_available_providers, resolve_role_client};
use crate::state::AppState;

/// Events buffered between the orchestrator and a slow SSE consumer.
const STREAM_CHANNEL_CAPACITY: usize = 256;

/// `GET /api/models` - provider registry, key availability, defaults.
pub async fn models_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "providers": detect_available_providers(),
        "defaults": {
            "pro": state.config.pro_model,
            "con": state.config.con_model,
            "judge": state.config.judge_model,
        },
        "features": {
            "web_search": state.search.is_some(),
        },
    }))
}

/// `GET /health` - liveness plus the active model configuration.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
        "pro_model": state.config.pro_model,
        "con_model": state.config.con_model,
        "judge_model": state.config.judge_model,
        "web_search": state.search.is_some(),
    }))
}

/// `GET /history` - stored turns for a session.
pub async fn history_get_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let history = state.store.fetch(&query.user_id, &query.session_id).await;
    Json(json!({ "history": history }))
}

/// `POST /history` - same as GET, body-carried query.
pub async fn history_post_handler(
    State(state): State<AppState>,
    Json(query): Json<HistoryQuery>,
) -> Json<Value> {
    let history = state.store.fetch(&query.user_id, &query.session_id).await;
    Json(json!({ "history": history }))
}

/// `POST /debate/stream` - run a debate, streaming every event as SSE.
pub async fn debate_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<DebateRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<DebateEvent>(STREAM_CHANNEL_CAPACITY);

    if !validate_topic(&request.topic) {
        let _ = tx
            .send(DebateEvent::Error {
                message: "invalid_topic".to_string(),
            })
            .await;
    } else {
        match resolve_debate_clients(&state, &request) {
            Ok(clients) => {
                let params = DebateParams {
                    user_id: request.user_id,
                    session_id: request.session_id,
                    topic: request.topic,
                };
                tokio::spawn(run_debate(
                    state.store.clone(),
                    state.search.clone(),
                    params,
                    clients,
                    tx,
                ));
            }
            Err(e) => {
                warn!(error = %e, "client resolution failed");
                let _ = tx
                    .send(DebateEvent::Error {
                        message: format!("Model init failed: {e}"),
                    })
                    .await;
            }
        }
    }

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(data));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Resolve all three role clients before round one; any failure aborts
/// the debate before streaming starts.
fn resolve_debate_clients(
    state: &AppState,
    request: &DebateRequest,
) -> Result<DebateClients, ResolveError> {
    Ok(DebateClients {
        pro: resolve_role_client(request.pro_model.as_deref(), &state.config.pro_model)?,
        con: resolve_role_client(request.con_model.as_deref(), &state.config.con_model)?,
        judge: resolve_role_client(request.judge_model.as_deref(), &state.config.judge_model)?,
    })
}
