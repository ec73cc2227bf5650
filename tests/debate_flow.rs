//! Orchestrator integration tests
//!
//! Drive full debates against scripted chat clients and a scripted search
//! provider, with an in-memory SQLite store, and assert on the ordered
//! event stream the transport would see.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use rostrum::debate::events::DebateEvent;
use rostrum::debate::orchestrator::{DebateClients, DebateParams, run_debate};
use rostrum::provider::{
    ChatClient, ChatRequest, ChatResponse, ClientHandle, ToolCall, UpstreamEvent, Usage,
};
use rostrum::search::{SearchProvider, SearchResult};
use rostrum::storage::DebateStore;

// ============================================================================
// Scripted collaborators
// ============================================================================

/// What a scripted client streams on every `stream` call.
#[derive(Clone)]
enum StreamScript {
    /// Deltas, then a usage frame, then clean end-of-stream.
    Text(Vec<&'static str>),
    /// Deltas, then a typed stream error.
    ErrorAfter(Vec<&'static str>, &'static str),
}

/// Scripted chat client: fixed probe response, fixed stream script.
struct ScriptedClient {
    probe: ChatResponse,
    script: StreamScript,
}

impl ScriptedClient {
    fn text(deltas: Vec<&'static str>) -> Self {
        Self {
            probe: ChatResponse {
                content: String::new(),
                tool_calls: Vec::new(),
                usage: None,
            },
            script: StreamScript::Text(deltas),
        }
    }

    fn with_probe(mut self, probe: ChatResponse) -> Self {
        self.probe = probe;
        self
    }
}

fn usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 20,
        total_tokens: 30,
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn execute(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Ok(self.probe.clone())
    }

    async fn stream(&self, _request: ChatRequest) -> Result<mpsc::Receiver<UpstreamEvent>> {
        let (tx, rx) = mpsc::channel(16);
        let script = self.script.clone();
        tokio::spawn(async move {
            match script {
                StreamScript::Text(deltas) => {
                    for delta in deltas {
                        if tx
                            .send(UpstreamEvent::ContentDelta(delta.to_string()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    let _ = tx.send(UpstreamEvent::Metadata(usage())).await;
                }
                StreamScript::ErrorAfter(deltas, message) => {
                    for delta in deltas {
                        if tx
                            .send(UpstreamEvent::ContentDelta(delta.to_string()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    let _ = tx
                        .send(UpstreamEvent::StreamError(message.to_string()))
                        .await;
                }
            }
        });
        Ok(rx)
    }
}

/// Probe response that requests one `web_search` call.
fn search_probe(query: &str) -> ChatResponse {
    ChatResponse {
        content: String::new(),
        tool_calls: vec![ToolCall {
            call_id: "call-1".to_string(),
            name: "web_search".to_string(),
            arguments: format!(r#"{{"query": "{query}"}}"#),
        }],
        usage: None,
    }
}

struct WorkingSearch;

#[async_trait]
impl SearchProvider for WorkingSearch {
    async fn search(&self, query: &str) -> Result<SearchResult> {
        Ok(SearchResult {
            query: query.to_string(),
            results: format!("Direct Answer: evidence for {query}"),
        })
    }
}

struct FailingSearch;

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(&self, _query: &str) -> Result<SearchResult> {
        anyhow::bail!("search backend unreachable")
    }
}

// ============================================================================
// Harness
// ============================================================================

fn handle(model_id: &str, client: ScriptedClient) -> ClientHandle {
    ClientHandle {
        provider: "scripted".to_string(),
        model_id: model_id.to_string(),
        client: Arc::new(client),
    }
}

async fn memory_store() -> DebateStore {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = DebateStore::new(pool);
    store.init().await.unwrap();
    store
}

fn params(topic: &str) -> DebateParams {
    DebateParams {
        user_id: "u1".to_string(),
        session_id: "s1".to_string(),
        topic: topic.to_string(),
    }
}

async fn run_and_collect(
    store: DebateStore,
    search: Option<Arc<dyn SearchProvider>>,
    params: DebateParams,
    clients: DebateClients,
) -> Vec<DebateEvent> {
    let (tx, mut rx) = mpsc::channel(4096);
    run_debate(store, search, params, clients, tx).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn phase_starts(events: &[DebateEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            DebateEvent::PhaseStart { phase, side, .. } => Some((phase.clone(), side.clone())),
            _ => None,
        })
        .collect()
}

fn count_matching(events: &[DebateEvent], predicate: impl Fn(&DebateEvent) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_debate_visits_phases_in_order() {
    let store = memory_store().await;
    let clients = DebateClients {
        pro: handle("test/pro-model", ScriptedClient::text(vec!["Hello ", "world"])),
        con: handle("test/con-model", ScriptedClient::text(vec!["Counter ", "point"])),
        judge: handle("test/judge-model", ScriptedClient::text(vec!["Winner: Pro"])),
    };

    let events = run_and_collect(store.clone(), None, params("motion"), clients).await;

    // Opens with init, closes with done.
    assert!(matches!(events.first(), Some(DebateEvent::Init { .. })));
    assert!(matches!(events.last(), Some(DebateEvent::Done)));

    // Phases in fixed order, Pro before Con, judgement last.
    let starts = phase_starts(&events);
    let expected: Vec<(String, String)> = [
        ("opening", "pro"),
        ("opening", "con"),
        ("rebuttal", "pro"),
        ("rebuttal", "con"),
        ("defense", "pro"),
        ("defense", "con"),
        ("closing", "pro"),
        ("closing", "con"),
        ("judgement", "judge"),
    ]
    .iter()
    .map(|(p, s)| (p.to_string(), s.to_string()))
    .collect();
    assert_eq!(starts, expected);

    // Exactly one phase_done per completed turn, no errors, no searches.
    assert_eq!(
        count_matching(&events, |e| matches!(e, DebateEvent::PhaseDone { .. })),
        9
    );
    assert_eq!(
        count_matching(&events, |e| matches!(e, DebateEvent::Error { .. })),
        0
    );
    assert_eq!(
        count_matching(&events, |e| matches!(e, DebateEvent::Search { .. })),
        0
    );

    // Usage frames are relayed and tagged.
    assert!(events.iter().any(|e| matches!(
        e,
        DebateEvent::Usage { side, .. } if side == "pro"
    )));

    // Every turn was persisted in order; deltas were folded into content.
    let rows = store.fetch("u1", "s1").await;
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[0].role, "pro");
    assert_eq!(rows[0].content, "Hello world");
    assert_eq!(rows[1].role, "con");
    assert_eq!(rows[1].content, "Counter point");
    assert_eq!(rows[8].role, "judge");
    assert_eq!(rows[8].phase, "judgement");
    assert_eq!(rows[8].content, "Winner: Pro");
}

#[tokio::test]
async fn test_empty_topic_rejected_before_any_event() {
    let store = memory_store().await;
    let clients = DebateClients {
        pro: handle("test/pro", ScriptedClient::text(vec!["x"])),
        con: handle("test/con", ScriptedClient::text(vec!["x"])),
        judge: handle("test/judge", ScriptedClient::text(vec!["x"])),
    };

    let events = run_and_collect(store.clone(), None, params(""), clients).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        DebateEvent::Error { message } if message == "invalid_topic"
    ));
    assert!(store.fetch("u1", "s1").await.is_empty());
}

#[tokio::test]
async fn test_overlong_topic_rejected() {
    let store = memory_store().await;
    let clients = DebateClients {
        pro: handle("test/pro", ScriptedClient::text(vec!["x"])),
        con: handle("test/con", ScriptedClient::text(vec!["x"])),
        judge: handle("test/judge", ScriptedClient::text(vec!["x"])),
    };

    let topic = "x".repeat(2001);
    let events = run_and_collect(store, None, params(&topic), clients).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        DebateEvent::Error { message } if message == "invalid_topic"
    ));
}

#[tokio::test]
async fn test_stream_error_aborts_remaining_debate() {
    let store = memory_store().await;
    let clients = DebateClients {
        pro: handle("test/pro", ScriptedClient::text(vec!["Pro opening"])),
        con: handle(
            "test/con",
            ScriptedClient {
                probe: ChatResponse {
                    content: String::new(),
                    tool_calls: Vec::new(),
                    usage: None,
                },
                script: StreamScript::ErrorAfter(vec!["partial "], "upstream exploded"),
            },
        ),
        judge: handle("test/judge", ScriptedClient::text(vec!["never reached"])),
    };

    let events = run_and_collect(store.clone(), None, params("motion"), clients).await;

    // Exactly one terminal error, and it is the last event.
    assert_eq!(
        count_matching(&events, |e| matches!(e, DebateEvent::Error { .. })),
        1
    );
    assert!(matches!(
        events.last(),
        Some(DebateEvent::Error { message }) if message == "upstream exploded"
    ));
    assert!(!events.iter().any(|e| matches!(e, DebateEvent::Done)));

    // Con's opening never started a later phase.
    let starts = phase_starts(&events);
    assert_eq!(
        starts,
        vec![
            ("opening".to_string(), "pro".to_string()),
            ("opening".to_string(), "con".to_string()),
        ]
    );

    // The partial delta was relayed, but the failed turn was not
    // persisted; Pro's completed turn was.
    assert!(events.iter().any(|e| matches!(
        e,
        DebateEvent::Delta { side, content, .. } if side == "con" && content == "partial "
    )));
    let rows = store.fetch("u1", "s1").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role, "pro");
}

#[tokio::test]
async fn test_search_failure_degrades_without_aborting() {
    let store = memory_store().await;
    let clients = DebateClients {
        pro: handle(
            "test/pro",
            ScriptedClient::text(vec!["evidence-backed claim"]).with_probe(search_probe("X")),
        ),
        con: handle(
            "test/con",
            ScriptedClient::text(vec!["counter"]).with_probe(search_probe("X")),
        ),
        judge: handle("test/judge", ScriptedClient::text(vec!["Winner: Con"])),
    };

    let events = run_and_collect(
        store.clone(),
        Some(Arc::new(FailingSearch)),
        params("motion"),
        clients,
    )
    .await;

    // Debate still completes.
    assert!(matches!(events.last(), Some(DebateEvent::Done)));

    // One search event per side turn (4 phases x 2 sides; the judge never
    // searches), each carrying the degraded failure digest.
    let searches: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DebateEvent::Search { query, results, .. } => Some((query.clone(), results.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(searches.len(), 8);
    for (query, results) in searches {
        assert_eq!(query, "X");
        assert!(results.contains("Search failed"));
    }

    // Rounds still produced non-empty content.
    let rows = store.fetch("u1", "s1").await;
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[0].content, "evidence-backed claim");
}

#[tokio::test]
async fn test_search_events_precede_stream_deltas_within_turn() {
    let store = memory_store().await;
    let clients = DebateClients {
        pro: handle(
            "test/pro",
            ScriptedClient::text(vec!["with findings"]).with_probe(search_probe("solar")),
        ),
        con: handle("test/con", ScriptedClient::text(vec!["plain"])),
        judge: handle("test/judge", ScriptedClient::text(vec!["Winner: Pro"])),
    };

    let events = run_and_collect(
        store,
        Some(Arc::new(WorkingSearch)),
        params("motion"),
        clients,
    )
    .await;

    // Within Pro's opening, the search event comes before any delta.
    let search_pos = events
        .iter()
        .position(|e| matches!(e, DebateEvent::Search { side, .. } if side == "pro"))
        .expect("pro search event");
    let delta_pos = events
        .iter()
        .position(|e| matches!(e, DebateEvent::Delta { side, .. } if side == "pro"))
        .expect("pro delta event");
    assert!(search_pos < delta_pos);
}

#[tokio::test]
async fn test_probe_direct_answer_skips_streaming() {
    let store = memory_store().await;
    let direct = ChatResponse {
        content: "direct answer, no search needed".to_string(),
        tool_calls: Vec::new(),
        usage: Some(usage()),
    };
    let clients = DebateClients {
        pro: handle(
            "test/pro",
            ScriptedClient::text(vec!["stream not used"]).with_probe(direct),
        ),
        con: handle(
            "test/con",
            ScriptedClient::text(vec!["streamed"]).with_probe(ChatResponse {
                content: "con direct".to_string(),
                tool_calls: Vec::new(),
                usage: None,
            }),
        ),
        judge: handle("test/judge", ScriptedClient::text(vec!["Winner: Pro"])),
    };

    let events = run_and_collect(
        store.clone(),
        Some(Arc::new(WorkingSearch)),
        params("motion"),
        clients,
    )
    .await;

    assert!(matches!(events.last(), Some(DebateEvent::Done)));
    assert_eq!(
        count_matching(&events, |e| matches!(e, DebateEvent::Search { .. })),
        0
    );

    // Pro's turns produced exactly the probe content as one delta each.
    let pro_deltas: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DebateEvent::Delta { side, content, .. } if side == "pro" => Some(content.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(pro_deltas.len(), 4);
    assert!(pro_deltas.iter().all(|c| c == "direct answer, no search needed"));

    let rows = store.fetch("u1", "s1").await;
    assert_eq!(rows[0].content, "direct answer, no search needed");
}

#[tokio::test]
async fn test_search_disabled_never_probes() {
    let store = memory_store().await;
    // Probe would request a search, but with search disabled the plain
    // streaming path never issues the probe.
    let clients = DebateClients {
        pro: handle(
            "test/pro",
            ScriptedClient::text(vec!["streamed pro"]).with_probe(search_probe("X")),
        ),
        con: handle(
            "test/con",
            ScriptedClient::text(vec!["streamed con"]).with_probe(search_probe("X")),
        ),
        judge: handle("test/judge", ScriptedClient::text(vec!["Winner: Con"])),
    };

    let events = run_and_collect(store.clone(), None, params("motion"), clients).await;

    assert!(matches!(events.last(), Some(DebateEvent::Done)));
    assert_eq!(
        count_matching(&events, |e| matches!(e, DebateEvent::Search { .. })),
        0
    );
    let rows = store.fetch("u1", "s1").await;
    assert_eq!(rows[0].content, "streamed pro");
}
