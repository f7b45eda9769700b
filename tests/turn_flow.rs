//! End-to-end conversation scenarios against the in-memory store and a
//! scripted backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scripture_companion::codec::{decode_history, decode_plan, decode_profile};
use scripture_companion::config::CompanionConfig;
use scripture_companion::error::LlmError;
use scripture_companion::llm::LlmProvider;
use scripture_companion::session::TurnEngine;
use scripture_companion::store::{documents, MemoryStore, RootId};

struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::RequestFailed {
                provider: "scripted".into(),
                reason: "script exhausted".into(),
            })
    }
}

fn plan_lines(count: u32) -> String {
    (1..=count)
        .map(|d| format!("Day {d}: Passage {d} | theme {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn small_config() -> CompanionConfig {
    CompanionConfig {
        plan_horizon_days: 5,
        extend_lookahead_days: 2,
        extend_chunk_days: 3,
        history_window: 8,
        llm_timeout: Duration::from_secs(5),
    }
}

const ONBOARDING_ANSWERS: [&str; 5] = ["English", "ESV", "Reformed", "casual", "1 chapter/day"];

/// Run the link + interview sequence up to (but not including) the final
/// ordering answer.
async fn onboard_until_ordering(engine: &TurnEngine, chat: &str) {
    engine.handle_turn(chat, "/start").await;
    engine.handle_turn(chat, "folder-1").await;
    for answer in ONBOARDING_ANSWERS {
        engine.handle_turn(chat, answer).await;
    }
}

#[tokio::test]
async fn new_user_walks_from_link_to_discussion() {
    let store = Arc::new(MemoryStore::new());
    let llm = ScriptedLlm::new([
        plan_lines(5),
        "In the beginning God created...".to_string(),
        "What struck you about creation?".to_string(),
        "Good question. Light precedes the sun in the order of the days.".to_string(),
    ]);
    let engine = TurnEngine::new(store.clone(), llm, small_config());

    // A brand-new user is asked for a storage link first.
    let reply = engine.handle_turn("tg:1", "/start").await;
    assert!(reply.contains("folder"));

    // Linking an empty root starts the interview with the language question.
    let reply = engine.handle_turn("tg:1", "folder-1").await;
    assert!(reply.to_lowercase().contains("language"));

    for answer in ONBOARDING_ANSWERS {
        engine.handle_turn("tg:1", answer).await;
    }
    let reply = engine.handle_turn("tg:1", "canonical").await;
    assert!(reply.contains("5-day reading plan"));

    let root = RootId::new("folder-1");
    let docs = store.snapshot(&root);
    let profile = decode_profile(&docs[documents::PROFILE]);
    assert!(profile.onboarding_complete);
    assert_eq!(profile.current_day, 0);
    assert_eq!(profile.translation, "ESV");

    let plan = decode_plan(&docs[documents::PLAN]);
    assert_eq!(plan.len(), 5);
    assert!(plan.validate().is_ok());

    // Reading presents Day 1 without advancing progress.
    let reply = engine.handle_turn("tg:1", "read").await;
    assert!(reply.contains("Day 1: Passage 1"));
    assert!(reply.contains("In the beginning"));
    let profile = decode_profile(&store.snapshot(&root)[documents::PROFILE]);
    assert_eq!(profile.current_day, 0);

    // Done advances and opens discussion.
    let reply = engine.handle_turn("tg:1", "done").await;
    assert_eq!(reply, "What struck you about creation?");
    let profile = decode_profile(&store.snapshot(&root)[documents::PROFILE]);
    assert_eq!(profile.current_day, 1);

    // Free text is discussed in context.
    let reply = engine.handle_turn("tg:1", "Why is light created first?").await;
    assert!(reply.contains("Light precedes the sun"));

    let history = decode_history(&store.snapshot(&root)[documents::HISTORY]);
    assert!(history.len() >= 4);
}

#[tokio::test]
async fn done_inside_lookahead_margin_extends_contiguously() {
    let store = Arc::new(MemoryStore::new());
    // Initial 5-day plan; openers for days 1 and 2; the third `done`
    // lands inside the 2-day lookahead, so an extension request comes
    // before its opener.
    let llm = ScriptedLlm::new([
        plan_lines(5),
        "Opener for day 1".to_string(),
        "Opener for day 2".to_string(),
        "Day 1: Extension A\nDay 2: Extension B\nDay 3: Extension C".to_string(),
        "Opener for day 3".to_string(),
    ]);
    let engine = TurnEngine::new(store.clone(), llm, small_config());

    onboard_until_ordering(&engine, "tg:2").await;
    engine.handle_turn("tg:2", "canonical").await;

    engine.handle_turn("tg:2", "done").await;
    engine.handle_turn("tg:2", "done").await;
    let reply = engine.handle_turn("tg:2", "done").await;
    assert_eq!(reply, "Opener for day 3");

    let root = RootId::new("folder-1");
    let docs = store.snapshot(&root);
    let profile = decode_profile(&docs[documents::PROFILE]);
    assert_eq!(profile.current_day, 3);

    // The plan grew by one chunk and stayed contiguous, with the
    // original entries untouched.
    let plan = decode_plan(&docs[documents::PLAN]);
    assert_eq!(plan.len(), 8);
    assert!(plan.validate().is_ok());
    assert_eq!(plan.entry_for(5).unwrap().reference, "Passage 5");
    assert_eq!(plan.entry_for(6).unwrap().reference, "Extension A");
    assert_eq!(plan.entry_for(8).unwrap().reference, "Extension C");
}

#[tokio::test]
async fn store_failure_leaves_documents_byte_identical() {
    let store = Arc::new(MemoryStore::new());
    let llm = ScriptedLlm::new([
        plan_lines(5),
        "Opener".to_string(),
        "never reached".to_string(),
    ]);
    let engine = TurnEngine::new(store.clone(), llm, small_config());

    onboard_until_ordering(&engine, "tg:3").await;
    engine.handle_turn("tg:3", "canonical").await;
    engine.handle_turn("tg:3", "done").await;

    let root = RootId::new("folder-1");
    let before = store.snapshot(&root);

    store.set_fail_reads(true);
    let reply = engine.handle_turn("tg:3", "tell me more").await;
    assert!(reply.contains("can't reach"));
    store.set_fail_reads(false);

    assert_eq!(store.snapshot(&root), before);
}

#[tokio::test]
async fn progress_is_monotone_and_history_append_only() {
    let store = Arc::new(MemoryStore::new());
    let llm = ScriptedLlm::new([
        plan_lines(5),
        "Opener 1".to_string(),
        "A thought about day 1".to_string(),
        "Opener 2".to_string(),
    ]);
    let engine = TurnEngine::new(store.clone(), llm, small_config());

    onboard_until_ordering(&engine, "tg:4").await;
    engine.handle_turn("tg:4", "canonical").await;

    let root = RootId::new("folder-1");

    engine.handle_turn("tg:4", "done").await;
    let after_first = store.snapshot(&root);
    let day_after_first = decode_profile(&after_first[documents::PROFILE]).current_day;

    engine.handle_turn("tg:4", "what a passage").await;
    engine.handle_turn("tg:4", "done").await;

    let docs = store.snapshot(&root);
    let profile = decode_profile(&docs[documents::PROFILE]);
    assert!(profile.current_day >= day_after_first);
    assert_eq!(profile.current_day, 2);

    // Earlier history is a prefix of later history.
    let earlier = decode_history(&after_first[documents::HISTORY]);
    let later = decode_history(&docs[documents::HISTORY]);
    assert!(later.len() > earlier.len());
    assert_eq!(&later.turns()[..earlier.len()], earlier.turns());
}

#[tokio::test]
async fn relinking_after_restart_resumes_where_left_off() {
    let store = Arc::new(MemoryStore::new());
    let llm = ScriptedLlm::new([plan_lines(5), "Opener".to_string()]);
    let engine = TurnEngine::new(store.clone(), llm, small_config());

    onboard_until_ordering(&engine, "tg:5").await;
    engine.handle_turn("tg:5", "canonical").await;
    engine.handle_turn("tg:5", "done").await;

    // A new engine on the same store models a process restart: the
    // ephemeral session cache is gone, the documents are not.
    let engine = TurnEngine::new(
        store.clone(),
        ScriptedLlm::new(std::iter::empty::<&str>()),
        small_config(),
    );
    let reply = engine.handle_turn("tg:5", "folder-1").await;
    assert!(reply.contains("Welcome back"));
    assert!(reply.contains("1 day"));
}
