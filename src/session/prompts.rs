//! User-facing message text and backend prompt builders.
//!
//! All wording lives here so the engine stays pure transition logic.
//! Also home to the learned-fact marker parser: the discussion prompt
//! asks the backend to tag durable facts about the reader with
//! `[LEARNED: key = value]` lines, which are stripped from the visible
//! reply and folded into the profile attribute bag.

use std::sync::LazyLock;

use regex::Regex;

use crate::codec::PROFILE_KEYS;
use crate::model::{DayEntry, PlanOrdering, ReadingPlan, ReadingStyle, UserProfile};
use crate::session::state::OnboardingStep;

// ── User-facing text ────────────────────────────────────────────────

pub fn welcome() -> String {
    "Welcome! I'm your Bible reading companion. I keep your reading plan and \
     our conversation in a storage folder you own.\n\n\
     To get started, share the ID of a folder you've given me access to."
        .to_string()
}

pub fn link_invalid(reason: &str) -> String {
    format!(
        "I couldn't use that folder ({reason}). Please check that the folder \
         exists and is shared with me, then send its ID again."
    )
}

pub fn welcome_back(profile: &UserProfile) -> String {
    if profile.current_day == 0 {
        "Welcome back! Your reading plan is ready. Say 'read' when you'd like \
         today's passage."
            .to_string()
    } else {
        format!(
            "Welcome back! You're {} day{} into your plan. Say 'read' for the \
             next passage, or just keep talking.",
            profile.current_day,
            if profile.current_day == 1 { "" } else { "s" },
        )
    }
}

pub fn onboarding_question(step: OnboardingStep) -> String {
    match step {
        OnboardingStep::Language => {
            "First, a few questions so I can tailor things to you.\n\
             What language would you like to read in? (You can name a second \
             one after a comma.)"
                .to_string()
        }
        OnboardingStep::Translation => {
            "Which Bible translation do you prefer? (Extras after a comma are \
             kept for comparison.)"
                .to_string()
        }
        OnboardingStep::Theology => {
            "How would you describe your theological background or tradition?".to_string()
        }
        OnboardingStep::Style => format!(
            "What discussion style suits you: {}?",
            ReadingStyle::OPTIONS.join(", ")
        ),
        OnboardingStep::Pacing => {
            "How much would you like to read each day? (e.g. '1 chapter/day')".to_string()
        }
        OnboardingStep::Ordering => format!(
            "Last one: should the plan follow {} order?",
            PlanOrdering::OPTIONS.join(" or ")
        ),
    }
}

pub fn plan_ready(plan: &ReadingPlan) -> String {
    let preview: String = plan
        .entries()
        .iter()
        .take(5)
        .map(|e| match &e.theme {
            Some(theme) => format!("Day {}: {} ({theme})", e.day, e.reference),
            None => format!("Day {}: {}", e.day, e.reference),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Your {}-day reading plan is ready. Here's how it starts:\n\n{preview}\n\n\
         Say 'read' whenever you'd like to begin Day 1.",
        plan.len(),
    )
}

pub fn reading_presentation(entry: &DayEntry, passage: &str) -> String {
    let theme = entry
        .theme
        .as_deref()
        .map(|t| format!(" — {t}"))
        .unwrap_or_default();
    format!(
        "Day {}: {}{theme}\n\n{passage}\n\nSay 'done' when you've finished reading.",
        entry.day, entry.reference,
    )
}

pub fn plan_failed() -> String {
    "I couldn't build your reading plan just now. Let's try that last answer \
     again in a moment."
        .to_string()
}

pub fn state_unavailable() -> String {
    "I can't reach your saved reading state right now. Nothing was changed; \
     please try again shortly."
        .to_string()
}

pub fn backend_failed() -> String {
    "I had trouble thinking that through. Nothing was changed; please try \
     again."
        .to_string()
}

pub fn backend_timeout() -> String {
    "That took longer than I allow myself, so I stopped rather than keep you \
     waiting. Please try again."
        .to_string()
}

pub fn nothing_to_read() -> String {
    "There's nothing left in your plan to read right now.".to_string()
}

pub fn help() -> String {
    "Here's what I understand:\n\
     /start - introduce ourselves or pick up where we left off\n\
     read - show today's passage\n\
     done - mark today's reading finished and talk about it\n\
     /help - this message\n\
     Anything else is conversation. Ask me about what you've read."
        .to_string()
}

// ── Backend prompts ─────────────────────────────────────────────────

pub fn passage_prompt(entry: &DayEntry, profile: &UserProfile) -> String {
    format!(
        "Quote the full text of {} in the {} translation, in {}. \
         Output only the passage text with verse numbers, no commentary.",
        entry.reference, profile.translation, profile.language,
    )
}

pub fn opener_prompt(context: &str, entry: &DayEntry) -> String {
    format!(
        "{context}\n\n\
         The reader has just finished reading {}. In their preferred style, \
         offer one or two sentences of reflection and a single open question \
         to start a discussion about the passage.",
        entry.reference,
    )
}

pub fn discussion_prompt(context: &str, user_text: &str) -> String {
    format!(
        "{context}\n\n\
         You are a thoughtful Bible reading companion. Answer in the reader's \
         language and preferred style, grounded in the current reading where \
         relevant.\n\
         If the reader reveals a lasting fact about themselves worth \
         remembering, add a final line exactly of the form \
         [LEARNED: key = value] (snake_case key); otherwise add nothing.\n\n\
         Reader says: {user_text}"
    )
}

// ── Learned-fact markers ────────────────────────────────────────────

static LEARNED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\[LEARNED:\s*([^=\]]+?)\s*=\s*([^\]]*?)\s*\]\s*$").expect("valid regex")
});

/// Split a backend reply into the user-visible text and any learned
/// facts tagged on their own lines.
///
/// Keys that collide with a profile schema field are dropped: the
/// interview owns those fields, and a bag entry under the same name
/// would silently vanish on the next encode.
pub fn parse_learned(reply: &str) -> (String, Vec<(String, String)>) {
    let mut facts = Vec::new();
    let mut visible = Vec::new();

    for line in reply.lines() {
        if let Some(caps) = LEARNED_LINE.captures(line) {
            let key = caps[1].trim().to_lowercase().replace(' ', "_");
            if PROFILE_KEYS.contains(&key.as_str()) {
                tracing::debug!(key, "learned fact collides with a profile field, dropped");
                continue;
            }
            let value = caps[2].trim().to_string();
            if !key.is_empty() && !value.is_empty() {
                facts.push((key, value));
            }
        } else {
            visible.push(line);
        }
    }

    (visible.join("\n").trim().to_string(), facts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learned_markers_are_stripped_and_collected() {
        let reply = "Great question about Romans.\n\
                     [LEARNED: favorite_book = Romans]\n\
                     Let's look at chapter 8.";
        let (visible, facts) = parse_learned(reply);
        assert_eq!(visible, "Great question about Romans.\nLet's look at chapter 8.");
        assert_eq!(facts, vec![("favorite_book".to_string(), "Romans".to_string())]);
    }

    #[test]
    fn reply_without_markers_passes_through() {
        let (visible, facts) = parse_learned("Just a normal reply.");
        assert_eq!(visible, "Just a normal reply.");
        assert!(facts.is_empty());
    }

    #[test]
    fn marker_keys_normalized_to_snake_case() {
        let (_, facts) = parse_learned("[learned: Favorite Book = Psalms]");
        assert_eq!(facts, vec![("favorite_book".to_string(), "Psalms".to_string())]);
    }

    #[test]
    fn marker_keys_colliding_with_profile_fields_dropped() {
        let reply = "Sure.\n\
                     [LEARNED: language = Klingon]\n\
                     [LEARNED: favorite_book = Romans]";
        let (visible, facts) = parse_learned(reply);
        assert_eq!(visible, "Sure.");
        assert_eq!(facts, vec![("favorite_book".to_string(), "Romans".to_string())]);
    }

    #[test]
    fn empty_marker_values_ignored() {
        let (visible, facts) = parse_learned("Reply text\n[LEARNED: key = ]");
        assert_eq!(visible, "Reply text");
        assert!(facts.is_empty());
    }

    #[test]
    fn each_step_has_a_question() {
        for step in [
            OnboardingStep::Language,
            OnboardingStep::Translation,
            OnboardingStep::Theology,
            OnboardingStep::Style,
            OnboardingStep::Pacing,
            OnboardingStep::Ordering,
        ] {
            assert!(!onboarding_question(step).is_empty());
        }
    }

    #[test]
    fn style_question_lists_all_options() {
        let question = onboarding_question(OnboardingStep::Style);
        for option in ReadingStyle::OPTIONS {
            assert!(question.contains(option), "missing option {option}");
        }
    }
}
