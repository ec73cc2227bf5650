//! Prompt assembly for side and judge turns
//!
//! A side prompt is: system message (stance + phase goal + output
//! contract, plus a tool-usage note in tool mode), an optional user
//! message carrying the budget-compressed history, an optional user
//! message carrying injected search findings, and a final user message
//! requesting this phase's output. The judge sees the full count-capped
//! transcript and must produce a machine-parseable winner marker.

use super::compress::compress_for_role;
use super::{
    DebatePhase, Position, TRANSCRIPT_MAX_ENTRIES, TranscriptEntry, phase_title, position_label,
};
use crate::provider::Message;

/// Notice prefixed to the history block when older turns were dropped.
const TRUNCATION_NOTICE: &str = "(Earlier turns were omitted to fit the context budget.)";

fn stance_for(side: Position) -> &'static str {
    match side {
        Position::Pro => "You are the Pro side: you argue FOR the motion.",
        Position::Con => "You are the Con side: you argue AGAINST the motion.",
        Position::Judge => "",
    }
}

fn phase_goal(phase: DebatePhase) -> &'static str {
    match phase {
        DebatePhase::Opening => "Opening statement: lay out your stance and core arguments.",
        DebatePhase::Rebuttal => {
            "Rebuttal: refute the opposing side's arguments point by point and add supporting evidence."
        }
        DebatePhase::Defense => {
            "Defense: answer the opposing side's rebuttals and reinforce your own case."
        }
        DebatePhase::Closing => "Closing statement: summarize your key arguments and drive home your conclusion.",
        DebatePhase::Judgement => "",
    }
}

/// Render transcript entries as a history block.
fn format_history(entries: &[TranscriptEntry]) -> String {
    let mut history = String::new();
    for entry in entries {
        history.push_str(&format!(
            "[{} - {} - {}]\n{}\n\n",
            position_label(entry.position),
            phase_title(entry.phase),
            entry.model_id,
            entry.content,
        ));
    }
    history
}

/// Take the most recent `TRANSCRIPT_MAX_ENTRIES`, preserving order.
fn count_capped(entries: &[TranscriptEntry]) -> &[TranscriptEntry] {
    let start = entries.len().saturating_sub(TRANSCRIPT_MAX_ENTRIES);
    &entries[start..]
}

fn build_side_messages(
    side: Position,
    phase: DebatePhase,
    topic: &str,
    transcript: &[TranscriptEntry],
    tools: bool,
    search_context: Option<&str>,
) -> Vec<Message> {
    let compressed = compress_for_role(transcript, side);
    let entries = count_capped(&compressed.entries);
    let capped = entries.len() < compressed.entries.len();

    let mut system = format!(
        "{}\nMotion: {}\nCurrent phase: {}\n\
         Requirements:\n\
         - Write in Markdown.\n\
         - Include a `## Reasoning` section (concise bullet points) and a `## Final Position` section (this round's conclusion).\n\
         - Be sharp and concise; aim for 120-220 words; do not repeat yourself.\n",
        stance_for(side),
        topic,
        phase_goal(phase),
    );
    if tools {
        system.push_str(
            "- You may call the `web_search` tool when a factual claim needs support. \
             Blend any findings naturally into your argument; never narrate the search itself.\n",
        );
    }

    let mut messages = vec![Message::system(system)];

    if !entries.is_empty() {
        let mut block = String::new();
        if compressed.dropped || capped {
            block.push_str(TRUNCATION_NOTICE);
            block.push('\n');
        }
        block.push_str("Debate so far:\n");
        block.push_str(&format_history(entries));
        messages.push(Message::user(block));
    }

    if tools && let Some(context) = search_context.filter(|c| !c.is_empty()) {
        messages.push(Message::user(format!("Search findings:\n{context}")));
    }

    messages.push(Message::user(format!(
        "Deliver your {} now.",
        phase_title(phase)
    )));

    messages
}

/// Prompt for a side turn without tool calling.
pub fn build_side_prompt(
    side: Position,
    phase: DebatePhase,
    topic: &str,
    transcript: &[TranscriptEntry],
) -> Vec<Message> {
    build_side_messages(side, phase, topic, transcript, false, None)
}

/// Prompt for a side turn in tool mode, optionally with search findings
/// injected after a resolved probe.
pub fn build_side_prompt_with_tools(
    side: Position,
    phase: DebatePhase,
    topic: &str,
    transcript: &[TranscriptEntry],
    search_context: Option<&str>,
) -> Vec<Message> {
    build_side_messages(side, phase, topic, transcript, true, search_context)
}

/// Prompt for the judgement turn. Uses the full count-capped transcript
/// rather than per-role token compression.
pub fn build_judge_prompt(topic: &str, transcript: &[TranscriptEntry]) -> Vec<Message> {
    let entries = count_capped(transcript);

    let system = format!(
        "You are a neutral judge ruling on a completed debate.\n\
         Motion: {topic}\n\
         Requirements:\n\
         - Write in Markdown.\n\
         - Include a `## Reasoning` section (clear, well-ordered) and a `## Verdict` section.\n\
         - In the verdict, name the winner with exactly `Winner: Pro` or `Winner: Con`.\n\
         - Be concise and objective; do not restate the transcript.\n",
    );

    vec![
        Message::system(system),
        Message::user(format!(
            "Full debate transcript:\n{}",
            format_history(entries)
        )),
    ]
}
