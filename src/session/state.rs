//! Session state derivation.
//!
//! Nothing here is persisted. The state is recomputed at the start of
//! every turn from the durable profile plus a small per-chat cache (the
//! linked root and any reading presented but not yet completed), so a
//! process restart can never strand a user in a stale state.

use crate::error::SessionError;
use crate::model::{PlanOrdering, ReadingStyle, UserProfile};

/// Onboarding interview sub-steps, in interview order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStep {
    Language,
    Translation,
    Theology,
    Style,
    Pacing,
    Ordering,
}

impl OnboardingStep {
    /// The first profile field still unanswered, or `None` when the
    /// interview has covered everything.
    ///
    /// Each answer is persisted as soon as it validates, so the current
    /// sub-step is always recoverable from the stored profile alone.
    pub fn derive_from(profile: &UserProfile) -> Option<Self> {
        if profile.language.is_empty() {
            Some(Self::Language)
        } else if profile.translation.is_empty() {
            Some(Self::Translation)
        } else if profile.theology.is_empty() {
            Some(Self::Theology)
        } else if profile.style.is_none() {
            Some(Self::Style)
        } else if profile.pacing.is_empty() {
            Some(Self::Pacing)
        } else if profile.ordering.is_none() {
            Some(Self::Ordering)
        } else {
            None
        }
    }
}

/// Validate one interview answer and write it into the profile.
///
/// Enumerated fields reject input outside their option set; free-text
/// fields reject empty input. On error the profile is unchanged and the
/// caller re-prompts the same sub-step.
pub fn apply_answer(
    profile: &mut UserProfile,
    step: OnboardingStep,
    input: &str,
) -> Result<(), SessionError> {
    let input = input.trim();

    match step {
        OnboardingStep::Language => {
            let (primary, secondary) = split_primary(input);
            if primary.is_empty() {
                return Err(empty("language"));
            }
            profile.language = primary;
            profile.secondary_language = secondary.into_iter().next();
        }
        OnboardingStep::Translation => {
            let (primary, secondary) = split_primary(input);
            if primary.is_empty() {
                return Err(empty("translation"));
            }
            profile.translation = primary;
            profile.secondary_translations = secondary;
        }
        OnboardingStep::Theology => {
            if input.is_empty() {
                return Err(empty("theological background"));
            }
            profile.theology = input.to_string();
        }
        OnboardingStep::Style => {
            profile.style = Some(ReadingStyle::parse(input).ok_or_else(|| {
                options_error("style", ReadingStyle::OPTIONS)
            })?);
        }
        OnboardingStep::Pacing => {
            if input.is_empty() {
                return Err(empty("pacing"));
            }
            profile.pacing = input.to_string();
        }
        OnboardingStep::Ordering => {
            profile.ordering = Some(PlanOrdering::parse(input).ok_or_else(|| {
                options_error("reading order", PlanOrdering::OPTIONS)
            })?);
        }
    }
    Ok(())
}

/// Split "English, Spanish" style answers into a primary value and any
/// comma-separated extras.
fn split_primary(input: &str) -> (String, Vec<String>) {
    let mut parts = input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let primary = parts.next().unwrap_or_default();
    (primary, parts.collect())
}

fn empty(field: &str) -> SessionError {
    SessionError::Validation {
        field: field.to_string(),
        message: "please give a non-empty answer".to_string(),
    }
}

fn options_error(field: &str, options: &[&str]) -> SessionError {
    SessionError::Validation {
        field: field.to_string(),
        message: format!("please answer one of: {}", options.join(", ")),
    }
}

/// The conversation state for one chat, derived fresh each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No storage root linked yet; the next message is treated as a
    /// root candidate.
    AwaitingLink,
    Onboarding(OnboardingStep),
    /// Onboarded with a plan, no day completed yet.
    Ready,
    /// A reading was presented this session and not yet marked done.
    InReading { day: u32 },
    InDiscussion,
}

impl SessionState {
    pub fn derive(
        root_linked: bool,
        profile: &UserProfile,
        open_reading: Option<u32>,
    ) -> Self {
        if !root_linked {
            return Self::AwaitingLink;
        }
        if !profile.onboarding_complete {
            // A fully answered profile with the flag still unset means the
            // final answer's plan generation failed; re-ask the last step.
            return Self::Onboarding(
                OnboardingStep::derive_from(profile).unwrap_or(OnboardingStep::Ordering),
            );
        }
        if let Some(day) = open_reading {
            return Self::InReading { day };
        }
        if profile.current_day == 0 {
            Self::Ready
        } else {
            Self::InDiscussion
        }
    }
}
