//! Debate orchestration
//!
//! Sequences the whole debate over one event channel: init, then four
//! phases of Pro-then-Con turns, then the judgement, then done. Each
//! completed turn is appended to the transcript and persisted before the
//! next turn starts; a single failed turn aborts everything that remains.
//! A closed event channel means the client disconnected - the loop stops
//! without issuing further upstream calls.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::events::{DebateEvent, DebateModels, RoundEvent};
use super::round::{
    RoundExecution, execute_debate_round, execute_judge_round, execute_round_with_tools,
};
use super::{
    DEBATE_PHASES, DebatePhase, Position, TranscriptEntry, phase_title, phase_value,
    position_value, validate_topic,
};
use crate::provider::ClientHandle;
use crate::search::SearchProvider;
use crate::storage::DebateStore;

/// Identity of one debate invocation.
#[derive(Debug, Clone)]
pub struct DebateParams {
    pub user_id: String,
    pub session_id: String,
    pub topic: String,
}

/// The three resolved role clients, fixed for the invocation.
#[derive(Clone)]
pub struct DebateClients {
    pub pro: ClientHandle,
    pub con: ClientHandle,
    pub judge: ClientHandle,
}

/// Run one full debate, emitting ordered [`DebateEvent`]s into `tx`.
///
/// The caller is expected to have validated the topic and resolved the
/// clients already; the topic check is repeated here so the orchestrator
/// never reaches a model with a bad topic regardless of entry point.
pub async fn run_debate(
    store: DebateStore,
    search: Option<Arc<dyn SearchProvider>>,
    params: DebateParams,
    clients: DebateClients,
    tx: mpsc::Sender<DebateEvent>,
) {
    if !validate_topic(&params.topic) {
        let _ = tx
            .send(DebateEvent::Error {
                message: "invalid_topic".to_string(),
            })
            .await;
        return;
    }

    let debate_id = Uuid::new_v4().to_string();
    info!(
        debate_id = %debate_id,
        user_id = %params.user_id,
        session_id = %params.session_id,
        pro = %clients.pro.model_id,
        con = %clients.con.model_id,
        judge = %clients.judge.model_id,
        "debate started"
    );

    let init = DebateEvent::Init {
        phase: "init".to_string(),
        message: "Debate started".to_string(),
        models: DebateModels {
            pro: clients.pro.model_id.clone(),
            con: clients.con.model_id.clone(),
            judge: clients.judge.model_id.clone(),
        },
    };
    if tx.send(init).await.is_err() {
        return;
    }

    let mut transcript: Vec<TranscriptEntry> = Vec::new();

    // Four side-vs-side phases; Pro always completes before Con starts.
    for phase in DEBATE_PHASES {
        for (side, handle) in [
            (Position::Pro, &clients.pro),
            (Position::Con, &clients.con),
        ] {
            let start = DebateEvent::PhaseStart {
                phase: phase_value(phase).to_string(),
                side: position_value(side).to_string(),
                title: phase_title(phase).to_string(),
                provider: handle.provider.clone(),
                model: handle.model_id.clone(),
            };
            if tx.send(start).await.is_err() {
                return;
            }

            let run = match &search {
                Some(search) => execute_round_with_tools(
                    handle.clone(),
                    side,
                    phase,
                    params.topic.clone(),
                    transcript.clone(),
                    search.clone(),
                ),
                None => execute_debate_round(
                    handle.clone(),
                    side,
                    phase,
                    params.topic.clone(),
                    transcript.clone(),
                ),
            };

            let Some(content) = relay_round(run, side, phase, &handle.model_id, &tx).await
            else {
                // Failed or disconnected: the whole debate stops here.
                return;
            };

            transcript.push(TranscriptEntry {
                position: side,
                phase,
                content: content.clone(),
                model_id: handle.model_id.clone(),
            });
            store
                .append(
                    &params.user_id,
                    &params.session_id,
                    side,
                    phase,
                    &handle.model_id,
                    &content,
                )
                .await;

            let done = DebateEvent::PhaseDone {
                phase: phase_value(phase).to_string(),
                side: position_value(side).to_string(),
                model: handle.model_id.clone(),
            };
            if tx.send(done).await.is_err() {
                return;
            }
        }
    }

    // Judgement sees the complete transcript.
    let judge = &clients.judge;
    let start = DebateEvent::PhaseStart {
        phase: phase_value(DebatePhase::Judgement).to_string(),
        side: position_value(Position::Judge).to_string(),
        title: phase_title(DebatePhase::Judgement).to_string(),
        provider: judge.provider.clone(),
        model: judge.model_id.clone(),
    };
    if tx.send(start).await.is_err() {
        return;
    }

    let run = execute_judge_round(judge.clone(), params.topic.clone(), transcript.clone());
    let Some(content) = relay_round(
        run,
        Position::Judge,
        DebatePhase::Judgement,
        &judge.model_id,
        &tx,
    )
    .await
    else {
        return;
    };

    transcript.push(TranscriptEntry {
        position: Position::Judge,
        phase: DebatePhase::Judgement,
        content: content.clone(),
        model_id: judge.model_id.clone(),
    });
    store
        .append(
            &params.user_id,
            &params.session_id,
            Position::Judge,
            DebatePhase::Judgement,
            &judge.model_id,
            &content,
        )
        .await;

    let done = DebateEvent::PhaseDone {
        phase: phase_value(DebatePhase::Judgement).to_string(),
        side: position_value(Position::Judge).to_string(),
        model: judge.model_id.clone(),
    };
    if tx.send(done).await.is_err() {
        return;
    }

    let _ = tx.send(DebateEvent::Done).await;
    info!(debate_id = %debate_id, turns = transcript.len(), "debate complete");
}

/// Relay one round's events to the output channel, tagging each with
/// side/phase/model. Resolves to the turn's content, or `None` when the
/// round failed (error already relayed) or the client went away.
async fn relay_round(
    mut run: RoundExecution,
    side: Position,
    phase: DebatePhase,
    model: &str,
    tx: &mpsc::Sender<DebateEvent>,
) -> Option<String> {
    let mut failed = false;

    while let Some(event) = run.events.recv().await {
        let is_error = matches!(event, RoundEvent::Error { .. });
        if tx
            .send(DebateEvent::tagged(side, phase, model, event))
            .await
            .is_err()
        {
            run.outcome.abort();
            return None;
        }
        if is_error {
            failed = true;
        }
    }

    let outcome = run.outcome.await;
    if failed {
        return None;
    }

    match outcome {
        Ok(Some(content)) => Some(content),
        Ok(None) => None,
        Err(e) => {
            warn!(model, error = %e, "round task did not complete");
            let _ = tx
                .send(DebateEvent::Error {
                    message: "internal round failure".to_string(),
                })
                .await;
            None
        }
    }
}
