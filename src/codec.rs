//! Document codec: structured header + free-form body text files.
//!
//! Each persisted document opens with a `---` fenced key/value header
//! followed by a human-readable body. Decoding is tolerant: unknown header
//! keys are preserved in the profile attribute bag, missing keys fall back
//! to documented defaults, malformed lines are skipped. Encoding is
//! canonical: a fixed key order per document kind, so decode-then-encode
//! is byte-identical and a no-op turn rewrites an identical file.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::{
    ChatHistory, DayEntry, PlanOrdering, ReadingPlan, ReadingStyle, Role, Turn, UserProfile,
};

/// Generic header/body document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub header: Vec<(String, String)>,
    pub body: String,
}

impl Document {
    /// Parse a document. Never fails: text without a header fence is
    /// treated as all body.
    pub fn parse(text: &str) -> Self {
        let mut lines = text.lines();
        if lines.next() != Some("---") {
            return Self {
                header: Vec::new(),
                body: text.trim().to_string(),
            };
        }

        let mut header = Vec::new();
        for line in lines.by_ref() {
            if line == "---" {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                header.push((key.trim().to_string(), value.trim().to_string()));
            }
            // Lines without a colon are skipped rather than rejected.
        }

        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        Self { header, body }
    }

    /// Render canonically: fenced header, blank separator, body, trailing
    /// newline.
    pub fn render(&self) -> String {
        let mut out = String::from("---\n");
        for (key, value) in &self.header {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str("---\n");
        if !self.body.is_empty() {
            out.push('\n');
            out.push_str(&self.body);
            out.push('\n');
        }
        out
    }
}

// ── Profile ─────────────────────────────────────────────────────────

/// Header keys owned by the profile schema. Attribute-bag entries with
/// these names are not re-encoded (they would shadow the real field).
pub const PROFILE_KEYS: &[&str] = &[
    "language",
    "secondary_language",
    "translation",
    "secondary_translations",
    "theology",
    "style",
    "pacing",
    "ordering",
    "current_day",
    "onboarding_complete",
];

pub fn encode_profile(profile: &UserProfile) -> String {
    let mut header = Vec::new();
    if !profile.language.is_empty() {
        header.push(("language".into(), profile.language.clone()));
    }
    if let Some(ref lang) = profile.secondary_language {
        header.push(("secondary_language".into(), lang.clone()));
    }
    if !profile.translation.is_empty() {
        header.push(("translation".into(), profile.translation.clone()));
    }
    if !profile.secondary_translations.is_empty() {
        header.push((
            "secondary_translations".into(),
            profile.secondary_translations.join(", "),
        ));
    }
    if !profile.theology.is_empty() {
        header.push(("theology".into(), profile.theology.clone()));
    }
    if let Some(style) = profile.style {
        header.push(("style".into(), style.as_str().into()));
    }
    if !profile.pacing.is_empty() {
        header.push(("pacing".into(), profile.pacing.clone()));
    }
    if let Some(ordering) = profile.ordering {
        header.push(("ordering".into(), ordering.as_str().into()));
    }
    header.push(("current_day".into(), profile.current_day.to_string()));
    header.push((
        "onboarding_complete".into(),
        profile.onboarding_complete.to_string(),
    ));
    for (key, value) in &profile.attributes {
        if !PROFILE_KEYS.contains(&key.as_str()) {
            header.push((key.clone(), value.clone()));
        }
    }

    Document {
        header,
        body: String::new(),
    }
    .render()
}

pub fn decode_profile(text: &str) -> UserProfile {
    let doc = Document::parse(text);
    let mut profile = UserProfile::default();

    for (key, value) in &doc.header {
        match key.as_str() {
            "language" => profile.language = value.clone(),
            "secondary_language" => profile.secondary_language = Some(value.clone()),
            "translation" => profile.translation = value.clone(),
            "secondary_translations" => {
                profile.secondary_translations = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "theology" => profile.theology = value.clone(),
            "style" => profile.style = ReadingStyle::parse(value),
            "pacing" => profile.pacing = value.clone(),
            "ordering" => profile.ordering = PlanOrdering::parse(value),
            "current_day" => profile.current_day = value.parse().unwrap_or(0),
            "onboarding_complete" => {
                profile.onboarding_complete = value.parse().unwrap_or(false)
            }
            // Forward-compatible: unknown keys survive in the bag.
            _ => {
                profile.attributes.insert(key.clone(), value.clone());
            }
        }
    }

    profile
}

// ── Reading plan ────────────────────────────────────────────────────

static DAY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*]\s*)?Day\s+(\d+)\s*[:.]\s*(.+)$").expect("valid regex")
});

pub fn encode_plan(plan: &ReadingPlan) -> String {
    let mut body = String::new();
    for entry in plan.entries() {
        body.push_str(&format!("Day {}: {}", entry.day, entry.reference));
        if let Some(ref theme) = entry.theme {
            body.push_str(&format!(" | {theme}"));
        }
        body.push('\n');
    }

    Document {
        header: vec![("days".into(), plan.len().to_string())],
        body: body.trim_end().to_string(),
    }
    .render()
}

/// Parse plan body lines into entries. Day numbers are taken as written.
pub fn parse_plan_lines(text: &str) -> Vec<DayEntry> {
    text.lines()
        .filter_map(|line| {
            let caps = DAY_LINE.captures(line)?;
            let day: u32 = caps[1].parse().ok()?;
            let rest = caps[2].trim();
            let (reference, theme) = match rest.split_once(" | ") {
                Some((r, t)) => (r.trim().to_string(), Some(t.trim().to_string())),
                None => (rest.to_string(), None),
            };
            if reference.is_empty() {
                return None;
            }
            Some(DayEntry {
                day,
                reference,
                theme,
            })
        })
        .collect()
}

pub fn decode_plan(text: &str) -> ReadingPlan {
    let doc = Document::parse(text);
    let entries = parse_plan_lines(&doc.body);
    // A hand-edited file may have lost contiguity; renumber rather than
    // failing the turn.
    match ReadingPlan::new(entries.clone()) {
        Ok(plan) => plan,
        Err(_) => {
            tracing::warn!("stored plan days not contiguous, renumbering");
            ReadingPlan::renumbered(entries)
        }
    }
}

// ── Chat history ────────────────────────────────────────────────────

static TURN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([^\]]+)\] (user|agent)(?:\((\d+)\))?: (.*)$").expect("valid regex")
});

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub fn encode_history(history: &ChatHistory) -> String {
    let mut body = String::new();
    for turn in history.turns() {
        let ts = turn.timestamp.format("%Y-%m-%dT%H:%M:%SZ");
        let tag = match turn.day {
            Some(day) => format!("{}({})", turn.role.as_str(), day),
            None => turn.role.as_str().to_string(),
        };
        body.push_str(&format!("[{ts}] {tag}: {}\n", escape_text(&turn.text)));
    }

    Document {
        header: vec![("turns".into(), history.len().to_string())],
        body: body.trim_end().to_string(),
    }
    .render()
}

pub fn decode_history(text: &str) -> ChatHistory {
    let doc = Document::parse(text);
    let turns = doc
        .body
        .lines()
        .filter_map(|line| {
            let caps = TURN_LINE.captures(line)?;
            let timestamp = DateTime::parse_from_rfc3339(&caps[1])
                .ok()?
                .with_timezone(&Utc);
            let role = Role::parse(&caps[2])?;
            let day = caps.get(3).and_then(|m| m.as_str().parse().ok());
            Some(Turn {
                role,
                text: unescape_text(&caps[4]),
                timestamp,
                day,
            })
        })
        .collect();
    ChatHistory::new(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_profile() -> UserProfile {
        UserProfile {
            language: "English".into(),
            secondary_language: Some("Spanish".into()),
            translation: "ESV".into(),
            secondary_translations: vec!["NIV".into(), "KJV".into()],
            theology: "Reformed".into(),
            style: Some(ReadingStyle::Academic),
            pacing: "1 chapter/day".into(),
            ordering: Some(PlanOrdering::Chronological),
            current_day: 7,
            onboarding_complete: true,
            attributes: BTreeMap::from([
                ("favorite_book".into(), "Romans".into()),
                ("struggles_with".into(), "Leviticus".into()),
            ]),
        }
    }

    fn sample_plan() -> ReadingPlan {
        ReadingPlan::new(vec![
            DayEntry {
                day: 1,
                reference: "Genesis 1-2".into(),
                theme: Some("Creation".into()),
            },
            DayEntry {
                day: 2,
                reference: "Genesis 3-4".into(),
                theme: None,
            },
        ])
        .unwrap()
    }

    fn sample_history() -> ChatHistory {
        let mut history = ChatHistory::default();
        history.append(Turn::user("What does this passage mean?"));
        history.append(Turn::agent("Let's look at the context.\nVerse 3 says...").with_day(2));
        history
    }

    // Encode, decode, re-encode: the two encodings must be byte-identical.
    #[test]
    fn profile_encoding_is_idempotent() {
        let first = encode_profile(&sample_profile());
        let second = encode_profile(&decode_profile(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn plan_encoding_is_idempotent() {
        let first = encode_plan(&sample_plan());
        let second = encode_plan(&decode_plan(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn history_encoding_is_idempotent() {
        let first = encode_history(&sample_history());
        let second = encode_history(&decode_history(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn profile_roundtrip_preserves_all_fields() {
        let profile = sample_profile();
        let decoded = decode_profile(&encode_profile(&profile));
        assert_eq!(decoded, profile);
    }

    #[test]
    fn unknown_header_keys_land_in_attribute_bag() {
        let text = "---\nlanguage: English\nfuture_field: future value\ncurrent_day: 2\nonboarding_complete: false\n---\n";
        let profile = decode_profile(text);
        assert_eq!(profile.language, "English");
        assert_eq!(
            profile.attributes.get("future_field").map(String::as_str),
            Some("future value")
        );
        // And it survives a re-encode.
        let again = decode_profile(&encode_profile(&profile));
        assert_eq!(
            again.attributes.get("future_field").map(String::as_str),
            Some("future value")
        );
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let profile = decode_profile("---\nlanguage: German\n---\n");
        assert_eq!(profile.current_day, 0);
        assert_eq!(profile.ordering(), PlanOrdering::Canonical);
        assert_eq!(profile.style(), ReadingStyle::Devotional);
        assert!(!profile.onboarding_complete);
    }

    #[test]
    fn empty_or_fenceless_text_decodes_to_blank_profile() {
        assert!(decode_profile("").is_blank());
        assert!(decode_profile("just some notes").is_blank());
    }

    #[test]
    fn malformed_numeric_values_are_tolerated() {
        let profile = decode_profile("---\ncurrent_day: soon\nonboarding_complete: maybe\n---\n");
        assert_eq!(profile.current_day, 0);
        assert!(!profile.onboarding_complete);
    }

    #[test]
    fn plan_roundtrip_preserves_entries_and_themes() {
        let plan = sample_plan();
        let decoded = decode_plan(&encode_plan(&plan));
        assert_eq!(decoded, plan);
    }

    #[test]
    fn plan_lines_parse_markdown_list_variants() {
        let entries = parse_plan_lines(
            "Here is your plan:\n- Day 1: Genesis 1-2 | Creation\n* day 2. Genesis 3\nDay 3: Genesis 4\nnot a day line",
        );
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].reference, "Genesis 1-2");
        assert_eq!(entries[0].theme.as_deref(), Some("Creation"));
        assert_eq!(entries[1].reference, "Genesis 3");
        assert_eq!(entries[2].day, 3);
    }

    #[test]
    fn hand_edited_noncontiguous_plan_is_renumbered() {
        let text = "---\ndays: 3\n---\n\nDay 1: a\nDay 5: b\nDay 9: c\n";
        let plan = decode_plan(text);
        assert!(plan.validate().is_ok());
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.entry_for(2).map(|e| e.reference.as_str()), Some("b"));
    }

    #[test]
    fn history_roundtrip_preserves_turns() {
        let history = sample_history();
        let decoded = decode_history(&encode_history(&history));
        assert_eq!(decoded, history);
    }

    #[test]
    fn multiline_turn_text_is_escaped() {
        let mut history = ChatHistory::default();
        history.append(Turn::agent("line one\nline two\\with backslash"));
        let encoded = encode_history(&history);
        // One body line per turn even with embedded newlines.
        let body_lines = encoded.lines().filter(|l| l.starts_with('[')).count();
        assert_eq!(body_lines, 1);
        let decoded = decode_history(&encoded);
        assert_eq!(decoded.turns()[0].text, "line one\nline two\\with backslash");
    }

    #[test]
    fn malformed_history_lines_are_skipped() {
        let text = "---\nturns: 2\n---\n\n[2026-01-01T10:00:00Z] user: hello\ngarbage line\n[bad-ts] agent: hi\n";
        let history = decode_history(text);
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].text, "hello");
    }

    #[test]
    fn empty_documents_render_and_reparse() {
        let plan = decode_plan("");
        assert!(plan.is_empty());
        let rendered = encode_plan(&plan);
        assert_eq!(encode_plan(&decode_plan(&rendered)), rendered);

        let history = decode_history("");
        assert!(history.is_empty());
    }
}
