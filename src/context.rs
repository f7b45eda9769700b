//! Context assembler — builds the bounded prompt context for discussion.
//!
//! Pure assembly: no backend calls. Output size is independent of total
//! history length because only the most recent `window` turns are used.

use crate::model::{DayEntry, Role, Turn, UserProfile};

/// Concatenate the profile summary, the most recent `window` turns
/// (oldest first), and the active day's reading reference.
pub fn build_prompt_context(
    profile: &UserProfile,
    turns: &[Turn],
    current_entry: Option<&DayEntry>,
    window: usize,
) -> String {
    let mut parts = vec![profile_summary(profile)];

    if let Some(entry) = current_entry {
        let theme = entry
            .theme
            .as_deref()
            .map(|t| format!(" ({t})"))
            .unwrap_or_default();
        parts.push(format!(
            "Current reading: Day {}: {}{theme}",
            entry.day, entry.reference
        ));
    }

    let start = turns.len().saturating_sub(window);
    let recent = &turns[start..];
    if !recent.is_empty() {
        let transcript: String = recent
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Agent => "Companion",
                };
                format!("{speaker}: {}", turn.text)
            })
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("Recent conversation:\n{transcript}"));
    }

    parts.join("\n\n")
}

/// Profile summary in stable field order: language, translation,
/// theology, style, pacing.
fn profile_summary(profile: &UserProfile) -> String {
    let mut lines = vec!["Reader profile:".to_string()];
    if !profile.language.is_empty() {
        let mut language = profile.language.clone();
        if let Some(ref secondary) = profile.secondary_language {
            language.push_str(&format!(" (also {secondary})"));
        }
        lines.push(format!("- Language: {language}"));
    }
    if !profile.translation.is_empty() {
        lines.push(format!("- Translation: {}", profile.translation));
    }
    if !profile.theology.is_empty() {
        lines.push(format!("- Theological background: {}", profile.theology));
    }
    lines.push(format!("- Style: {}", profile.style()));
    if !profile.pacing.is_empty() {
        lines.push(format!("- Pacing: {}", profile.pacing));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            language: "English".into(),
            translation: "ESV".into(),
            theology: "Lutheran".into(),
            pacing: "1 chapter/day".into(),
            onboarding_complete: true,
            ..UserProfile::default()
        }
    }

    fn turns(n: usize) -> Vec<Turn> {
        (0..n).map(|i| Turn::user(format!("turn {i}"))).collect()
    }

    fn entry() -> DayEntry {
        DayEntry {
            day: 4,
            reference: "Exodus 3".into(),
            theme: Some("The burning bush".into()),
        }
    }

    fn count_transcript_lines(context: &str) -> usize {
        context
            .lines()
            .filter(|l| l.starts_with("User:") || l.starts_with("Companion:"))
            .count()
    }

    #[test]
    fn includes_profile_reading_and_turns() {
        let history = turns(3);
        let context = build_prompt_context(&profile(), &history, Some(&entry()), 5);
        assert!(context.contains("- Language: English"));
        assert!(context.contains("- Translation: ESV"));
        assert!(context.contains("Day 4: Exodus 3 (The burning bush)"));
        assert!(context.contains("User: turn 2"));
    }

    #[test]
    fn window_bounds_output_for_any_history_length() {
        const K: usize = 8;
        for total in [0, K - 1, K, 1000] {
            let history = turns(total);
            let context = build_prompt_context(&profile(), &history, None, K);
            assert!(
                count_transcript_lines(&context) <= K,
                "history of {total} produced more than {K} turns"
            );
        }
    }

    #[test]
    fn window_keeps_most_recent_oldest_first() {
        let history = turns(10);
        let context = build_prompt_context(&profile(), &history, None, 3);
        assert!(!context.contains("turn 6"));
        let pos7 = context.find("turn 7").unwrap();
        let pos9 = context.find("turn 9").unwrap();
        assert!(pos7 < pos9);
    }

    #[test]
    fn output_size_independent_of_history_length() {
        let small = build_prompt_context(&profile(), &turns(8), None, 8);
        let large = build_prompt_context(&profile(), &turns(1000), None, 8);
        // Same turn-count window; sizes differ only by turn numbering width.
        assert_eq!(
            count_transcript_lines(&small),
            count_transcript_lines(&large)
        );
    }

    #[test]
    fn empty_history_omits_transcript_section() {
        let context = build_prompt_context(&profile(), &[], Some(&entry()), 8);
        assert!(!context.contains("Recent conversation"));
        assert!(context.contains("Current reading"));
    }

    #[test]
    fn profile_summary_stable_field_order() {
        let context = build_prompt_context(&profile(), &[], None, 8);
        let language = context.find("- Language").unwrap();
        let translation = context.find("- Translation").unwrap();
        let theology = context.find("- Theological").unwrap();
        let style = context.find("- Style").unwrap();
        let pacing = context.find("- Pacing").unwrap();
        assert!(language < translation && translation < theology);
        assert!(theology < style && style < pacing);
    }
}
