//! The turn engine: one incoming message in, one reply out.
//!
//! Durable state is re-read from the store at the start of every turn
//! and written back only after all fallible work (store reads, backend
//! calls) has succeeded, so a failed turn leaves the documents exactly
//! as they were. Taxonomy errors never escape `handle_turn`; they are
//! converted into user-facing replies at that boundary.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::codec::{
    decode_history, decode_plan, decode_profile, encode_history, encode_plan, encode_profile,
};
use crate::config::CompanionConfig;
use crate::context::build_prompt_context;
use crate::error::{Error, LlmError, Result, StoreError};
use crate::llm::{complete_with_timeout, LlmProvider};
use crate::model::{ChatHistory, ReadingPlan, Turn, UserProfile};
use crate::plan::PlanGenerator;
use crate::session::prompts;
use crate::session::state::{apply_answer, OnboardingStep, SessionState};
use crate::store::{documents, ContextStore, RootId};

/// Per-chat ephemeral state. Losing this on restart is harmless: the
/// user re-links their folder and everything else derives from the
/// stored documents.
#[derive(Debug, Clone, Default)]
struct ChatSession {
    root: Option<RootId>,
    /// Day presented via `read` and not yet marked done.
    open_reading: Option<u32>,
}

/// Commands understood on every channel. Bare words work too, since not
/// every transport has slash-command affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Read,
    Done,
    Help,
    Text,
}

impl Command {
    fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "/start" => Self::Start,
            "/read" | "read" => Self::Read,
            "/done" | "done" => Self::Done,
            "/help" | "help" => Self::Help,
            _ => Self::Text,
        }
    }
}

/// The conversation state machine shared by all channels.
pub struct TurnEngine {
    store: Arc<dyn ContextStore>,
    llm: Arc<dyn LlmProvider>,
    plans: PlanGenerator,
    config: CompanionConfig,
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl TurnEngine {
    pub fn new(
        store: Arc<dyn ContextStore>,
        llm: Arc<dyn LlmProvider>,
        config: CompanionConfig,
    ) -> Self {
        let plans = PlanGenerator::new(llm.clone(), config.clone());
        Self {
            store,
            llm,
            plans,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Handle one message and always produce a reply. No taxonomy error
    /// escapes: failures become apologetic user-facing text while the
    /// durable documents stay untouched.
    pub async fn handle_turn(&self, chat_id: &str, text: &str) -> String {
        match self.run_turn(chat_id, text).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(chat_id, error = %err, "turn failed");
                reply_for_error(&err)
            }
        }
    }

    async fn run_turn(&self, chat_id: &str, text: &str) -> Result<String> {
        let text = text.trim();
        let command = Command::parse(text);
        tracing::debug!(chat_id, ?command, "handling turn");

        let session = self.session(chat_id).await;
        let Some(root) = session.root.clone() else {
            return self.link_turn(chat_id, text, command).await;
        };

        let profile = self.load_profile(&root).await?;

        match command {
            Command::Help => Ok(prompts::help()),
            Command::Start => {
                if profile.onboarding_complete {
                    Ok(prompts::welcome_back(&profile))
                } else {
                    Ok(prompts::onboarding_question(current_step(&profile)))
                }
            }
            Command::Read => self.read_turn(chat_id, &root, &profile).await,
            Command::Done => self.done_turn(chat_id, &root, profile).await,
            Command::Text => {
                if profile.onboarding_complete {
                    self.discussion_turn(chat_id, &root, profile, text, session.open_reading)
                        .await
                } else {
                    self.onboarding_turn(&root, profile, text).await
                }
            }
        }
    }

    /// No root linked yet: anything that isn't a command is tried as a
    /// root candidate.
    async fn link_turn(&self, chat_id: &str, text: &str, command: Command) -> Result<String> {
        match command {
            Command::Help => return Ok(prompts::help()),
            Command::Text if !text.is_empty() => {}
            _ => return Ok(prompts::welcome()),
        }

        let root = self.store.ensure_root(text).await?;
        tracing::info!(chat_id, root = %root, "storage root linked");
        self.with_session(chat_id, |s| s.root = Some(root.clone()))
            .await;

        let profile = self.load_profile(&root).await?;
        if profile.onboarding_complete {
            Ok(prompts::welcome_back(&profile))
        } else {
            Ok(format!(
                "Folder linked.\n\n{}",
                prompts::onboarding_question(current_step(&profile))
            ))
        }
    }

    /// One interview answer. The final answer triggers plan generation;
    /// the profile is only persisted once the plan exists, so a failed
    /// generation re-asks the same question.
    async fn onboarding_turn(
        &self,
        root: &RootId,
        mut profile: UserProfile,
        text: &str,
    ) -> Result<String> {
        let step = current_step(&profile);
        if let Err(err) = apply_answer(&mut profile, step, text) {
            return Ok(format!("{err}\n\n{}", prompts::onboarding_question(step)));
        }

        match OnboardingStep::derive_from(&profile) {
            Some(next) => {
                self.put_profile(root, &profile).await?;
                Ok(prompts::onboarding_question(next))
            }
            None => {
                let plan = self.plans.generate_initial(&profile).await?;
                profile.onboarding_complete = true;
                profile.current_day = 0;
                self.put_plan(root, &plan).await?;
                self.put_profile(root, &profile).await?;
                tracing::info!(days = plan.len(), "onboarding complete, plan generated");
                Ok(prompts::plan_ready(&plan))
            }
        }
    }

    /// Present the next day's reading without advancing progress.
    async fn read_turn(
        &self,
        chat_id: &str,
        root: &RootId,
        profile: &UserProfile,
    ) -> Result<String> {
        if !profile.onboarding_complete {
            return Ok(prompts::onboarding_question(current_step(profile)));
        }

        let plan = self.load_plan(root).await?;
        let day = profile.current_day + 1;
        let Some(entry) = plan.entry_for(day).cloned() else {
            return Ok(prompts::nothing_to_read());
        };
        let mut history = self.load_history(root).await?;

        let passage = complete_with_timeout(
            self.llm.as_ref(),
            &prompts::passage_prompt(&entry, profile),
            self.config.llm_timeout,
        )
        .await
        .map_err(Error::Llm)?;

        let presentation = prompts::reading_presentation(&entry, &passage);
        history.append(Turn::user("read").with_day(day));
        history.append(Turn::agent(&presentation).with_day(day));
        self.put_history(root, &history).await?;

        self.with_session(chat_id, |s| s.open_reading = Some(day))
            .await;
        Ok(presentation)
    }

    /// Mark the next day completed, extending the plan first when the
    /// remaining runway is inside the lookahead margin.
    async fn done_turn(
        &self,
        chat_id: &str,
        root: &RootId,
        mut profile: UserProfile,
    ) -> Result<String> {
        if !profile.onboarding_complete {
            return Ok(prompts::onboarding_question(current_step(&profile)));
        }

        let mut plan = self.load_plan(root).await?;
        let mut history = self.load_history(root).await?;

        let target = profile.current_day + 1;
        let mut plan_changed = false;
        if plan.len() < target || self.plans.needs_extension(target, &plan) {
            let appended = self.plans.extend(&profile, &plan, target).await?;
            tracing::info!(
                from = plan.last_day() + 1,
                count = appended.len(),
                "plan extended"
            );
            plan.append(appended)?;
            plan_changed = true;
        }

        if !profile.complete_day(plan.len()) {
            return Ok(prompts::nothing_to_read());
        }
        let day = profile.current_day;
        let Some(entry) = plan.entry_for(day).cloned() else {
            return Ok(prompts::nothing_to_read());
        };

        let context = build_prompt_context(
            &profile,
            history.recent(self.config.history_window),
            Some(&entry),
            self.config.history_window,
        );
        let opener = complete_with_timeout(
            self.llm.as_ref(),
            &prompts::opener_prompt(&context, &entry),
            self.config.llm_timeout,
        )
        .await
        .map_err(Error::Llm)?;

        history.append(Turn::user("done").with_day(day));
        history.append(Turn::agent(&opener).with_day(day));

        if plan_changed {
            self.put_plan(root, &plan).await?;
        }
        self.put_profile(root, &profile).await?;
        self.put_history(root, &history).await?;

        self.with_session(chat_id, |s| s.open_reading = None).await;
        Ok(opener)
    }

    /// Open-ended discussion grounded in the profile, the recent turns,
    /// and whichever reading is currently active.
    async fn discussion_turn(
        &self,
        _chat_id: &str,
        root: &RootId,
        mut profile: UserProfile,
        text: &str,
        open_reading: Option<u32>,
    ) -> Result<String> {
        let plan = self.load_plan(root).await?;
        let mut history = self.load_history(root).await?;

        let active_day = match SessionState::derive(true, &profile, open_reading) {
            SessionState::InReading { day } => Some(day),
            SessionState::InDiscussion => Some(profile.current_day),
            _ => None,
        };
        let entry = active_day.and_then(|d| plan.entry_for(d));

        let context = build_prompt_context(
            &profile,
            history.recent(self.config.history_window),
            entry,
            self.config.history_window,
        );
        let reply = complete_with_timeout(
            self.llm.as_ref(),
            &prompts::discussion_prompt(&context, text),
            self.config.llm_timeout,
        )
        .await
        .map_err(Error::Llm)?;

        let (visible, facts) = prompts::parse_learned(&reply);
        let profile_changed = !facts.is_empty();
        for (key, value) in facts {
            tracing::debug!(key, "learned fact recorded");
            profile.attributes.insert(key, value);
        }

        let mut user_turn = Turn::user(text);
        let mut agent_turn = Turn::agent(&visible);
        if let Some(day) = active_day {
            user_turn = user_turn.with_day(day);
            agent_turn = agent_turn.with_day(day);
        }
        history.append(user_turn);
        history.append(agent_turn);

        if profile_changed {
            self.put_profile(root, &profile).await?;
        }
        self.put_history(root, &history).await?;

        if visible.is_empty() {
            Ok("Noted.".to_string())
        } else {
            Ok(visible)
        }
    }

    // ── Session cache ───────────────────────────────────────────────

    async fn session(&self, chat_id: &str) -> ChatSession {
        self.sessions
            .read()
            .await
            .get(chat_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn with_session(&self, chat_id: &str, update: impl FnOnce(&mut ChatSession)) {
        let mut sessions = self.sessions.write().await;
        update(sessions.entry(chat_id.to_string()).or_default());
    }

    // ── Document IO ─────────────────────────────────────────────────

    async fn load_profile(&self, root: &RootId) -> Result<UserProfile> {
        Ok(self
            .store
            .get(root, documents::PROFILE)
            .await?
            .map(|text| decode_profile(&text))
            .unwrap_or_default())
    }

    async fn load_plan(&self, root: &RootId) -> Result<ReadingPlan> {
        Ok(self
            .store
            .get(root, documents::PLAN)
            .await?
            .map(|text| decode_plan(&text))
            .unwrap_or_default())
    }

    async fn load_history(&self, root: &RootId) -> Result<ChatHistory> {
        Ok(self
            .store
            .get(root, documents::HISTORY)
            .await?
            .map(|text| decode_history(&text))
            .unwrap_or_default())
    }

    async fn put_profile(&self, root: &RootId, profile: &UserProfile) -> Result<()> {
        Ok(self
            .store
            .put(root, documents::PROFILE, &encode_profile(profile))
            .await?)
    }

    async fn put_plan(&self, root: &RootId, plan: &ReadingPlan) -> Result<()> {
        Ok(self.store.put(root, documents::PLAN, &encode_plan(plan)).await?)
    }

    async fn put_history(&self, root: &RootId, history: &ChatHistory) -> Result<()> {
        Ok(self
            .store
            .put(root, documents::HISTORY, &encode_history(history))
            .await?)
    }
}

fn current_step(profile: &UserProfile) -> OnboardingStep {
    OnboardingStep::derive_from(profile).unwrap_or(OnboardingStep::Ordering)
}

/// Map a taxonomy error onto the reply the user sees.
fn reply_for_error(err: &Error) -> String {
    match err {
        Error::Store(StoreError::RootInvalid { reason, .. }) => prompts::link_invalid(reason),
        Error::Store(_) => prompts::state_unavailable(),
        Error::Llm(LlmError::Timeout { .. }) => prompts::backend_timeout(),
        Error::Llm(_) => prompts::backend_failed(),
        Error::Plan(crate::error::PlanError::Llm(LlmError::Timeout { .. })) => {
            prompts::backend_timeout()
        }
        Error::Plan(_) => prompts::plan_failed(),
        _ => prompts::backend_failed(),
    }
}
