//! Reading plan generation and extension.
//!
//! Content synthesis is delegated to the generative backend under a
//! structured prompt contract; day numbering, plan length, and extension
//! triggers are owned here. The backend is an untrusted oracle: its day
//! numbers are discarded and every response is re-numbered and validated
//! before acceptance.

use std::sync::Arc;

use crate::codec::parse_plan_lines;
use crate::config::CompanionConfig;
use crate::error::PlanError;
use crate::llm::{complete_with_timeout, LlmProvider};
use crate::model::{DayEntry, ReadingPlan, UserProfile};

/// Appended to the retry prompt when the first response did not parse.
const STRICT_FORMAT: &str = "\nIMPORTANT: Respond with ONLY the plan lines, one per line, \
     in exactly this format and nothing else:\nDay 1: Book Chapter-Chapter | short theme";

/// Generates and extends day-indexed reading plans.
pub struct PlanGenerator {
    llm: Arc<dyn LlmProvider>,
    config: CompanionConfig,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: CompanionConfig) -> Self {
        Self { llm, config }
    }

    /// Whether the plan needs extending for a user at `current_day`.
    pub fn needs_extension(&self, current_day: u32, plan: &ReadingPlan) -> bool {
        plan.len().saturating_sub(current_day) <= self.config.extend_lookahead_days
    }

    /// Generate the initial plan covering the configured horizon.
    pub async fn generate_initial(
        &self,
        profile: &UserProfile,
    ) -> Result<ReadingPlan, PlanError> {
        let horizon = self.config.plan_horizon_days;
        let prompt = initial_plan_prompt(profile, horizon);
        let mut entries = self.request_entries(&prompt, 1).await?;
        entries.truncate(horizon as usize);
        Ok(ReadingPlan::renumbered(entries))
    }

    /// Request the delta entries continuing an existing plan so that it
    /// covers at least `target_day`. Returned entries are numbered to
    /// continue contiguously from the plan's last day.
    pub async fn extend(
        &self,
        profile: &UserProfile,
        plan: &ReadingPlan,
        target_day: u32,
    ) -> Result<Vec<DayEntry>, PlanError> {
        let needed = target_day.saturating_sub(plan.len());
        let count = needed.max(self.config.extend_chunk_days);
        let start = plan.last_day() + 1;

        let prompt = extend_plan_prompt(profile, plan, start, count);
        let mut entries = self.request_entries(&prompt, needed.max(1) as usize).await?;
        entries.truncate(count as usize);

        // Renumber to continue from the stored plan, ignoring whatever
        // the backend wrote.
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| DayEntry {
                day: start + i as u32,
                ..e
            })
            .collect())
    }

    /// One backend request, with a single stricter-format retry if the
    /// response yields fewer than `min_entries` parseable day lines.
    async fn request_entries(
        &self,
        prompt: &str,
        min_entries: usize,
    ) -> Result<Vec<DayEntry>, PlanError> {
        let text =
            complete_with_timeout(self.llm.as_ref(), prompt, self.config.llm_timeout).await?;
        let entries = parse_plan_lines(&text);
        if entries.len() >= min_entries {
            return Ok(entries);
        }

        tracing::warn!(
            parsed = entries.len(),
            needed = min_entries,
            "plan response did not parse, retrying with strict format"
        );
        let strict = format!("{prompt}{STRICT_FORMAT}");
        let text =
            complete_with_timeout(self.llm.as_ref(), &strict, self.config.llm_timeout).await?;
        let entries = parse_plan_lines(&text);
        if entries.is_empty() {
            return Err(PlanError::Empty);
        }
        if entries.len() < min_entries {
            return Err(PlanError::Unparseable {
                reason: format!(
                    "backend returned {} entries, needed {min_entries}",
                    entries.len()
                ),
            });
        }
        Ok(entries)
    }
}

fn profile_preferences(profile: &UserProfile) -> String {
    format!(
        "Translation: {}\nReading order: {}\nPacing: {}\nTheological background: {}",
        profile.translation,
        profile.ordering(),
        profile.pacing,
        profile.theology,
    )
}

fn initial_plan_prompt(profile: &UserProfile, horizon: u32) -> String {
    format!(
        "Create a personalized daily Bible reading plan for the first {horizon} days.\n\
         Reader preferences:\n{}\n\n\
         Output one line per day in the format:\n\
         Day N: Book Chapter-Chapter | short theme",
        profile_preferences(profile),
    )
}

fn extend_plan_prompt(
    profile: &UserProfile,
    plan: &ReadingPlan,
    start: u32,
    count: u32,
) -> String {
    let recent: String = plan
        .tail(5)
        .iter()
        .map(|e| match &e.theme {
            Some(theme) => format!("Day {}: {} | {theme}", e.day, e.reference),
            None => format!("Day {}: {}", e.day, e.reference),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Continue this daily Bible reading plan for {count} more days, \
         from Day {start} to Day {}.\n\
         Keep the ordering and themes consistent with the most recent days:\n{recent}\n\n\
         Reader preferences:\n{}\n\n\
         Output ONLY the new days, one line per day, in the format:\n\
         Day N: Book Chapter-Chapter | short theme",
        start + count - 1,
        profile_preferences(profile),
    )
}
