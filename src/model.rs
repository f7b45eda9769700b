//! Persisted data model: user profile, reading plan, chat history.
//!
//! These records are the durable state of a user. Session state is never
//! stored; it is derived from these fields at the start of every turn
//! (see `session::state`).

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};

use crate::error::PlanError;

/// How the user prefers discussion to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingStyle {
    Formal,
    Casual,
    Academic,
    Devotional,
}

impl ReadingStyle {
    pub const OPTIONS: &[&str] = &["formal", "casual", "academic", "devotional"];

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "formal" => Some(Self::Formal),
            "casual" => Some(Self::Casual),
            "academic" => Some(Self::Academic),
            "devotional" => Some(Self::Devotional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Casual => "casual",
            Self::Academic => "academic",
            Self::Devotional => "devotional",
        }
    }
}

impl Default for ReadingStyle {
    fn default() -> Self {
        Self::Devotional
    }
}

impl std::fmt::Display for ReadingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order in which the plan walks the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOrdering {
    Canonical,
    Chronological,
}

impl PlanOrdering {
    pub const OPTIONS: &[&str] = &["canonical", "chronological"];

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "canonical" => Some(Self::Canonical),
            "chronological" => Some(Self::Chronological),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::Chronological => "chronological",
        }
    }
}

impl Default for PlanOrdering {
    fn default() -> Self {
        Self::Canonical
    }
}

impl std::fmt::Display for PlanOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User profile built during onboarding and mutated as reading progresses.
///
/// Option / empty-string fields double as "not yet answered" markers for
/// deriving the current onboarding sub-step. Accessors apply the documented
/// defaults so readers never see the unset form.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub language: String,
    pub secondary_language: Option<String>,
    pub translation: String,
    pub secondary_translations: Vec<String>,
    pub theology: String,
    pub style: Option<ReadingStyle>,
    pub pacing: String,
    pub ordering: Option<PlanOrdering>,
    /// Last completed day. Never decreases; never exceeds the plan length.
    pub current_day: u32,
    pub onboarding_complete: bool,
    /// Open-ended attributes learned during discussion, plus any unknown
    /// header keys preserved by the tolerant decoder.
    pub attributes: BTreeMap<String, String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            language: String::new(),
            secondary_language: None,
            translation: String::new(),
            secondary_translations: Vec::new(),
            theology: String::new(),
            style: None,
            pacing: String::new(),
            ordering: None,
            current_day: 0,
            onboarding_complete: false,
            attributes: BTreeMap::new(),
        }
    }
}

impl UserProfile {
    /// Style with the documented default applied.
    pub fn style(&self) -> ReadingStyle {
        self.style.unwrap_or_default()
    }

    /// Ordering with the documented default applied.
    pub fn ordering(&self) -> PlanOrdering {
        self.ordering.unwrap_or_default()
    }

    /// Whether this profile has ever been written to (a decoded empty
    /// placeholder file yields a blank profile).
    pub fn is_blank(&self) -> bool {
        self.language.is_empty() && !self.onboarding_complete
    }

    /// Mark one more day as completed. Refuses to move past the plan end,
    /// keeping `current_day <= plan_len` invariant intact.
    pub fn complete_day(&mut self, plan_len: u32) -> bool {
        if self.current_day >= plan_len {
            return false;
        }
        self.current_day += 1;
        true
    }
}

/// One scheduled reading assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEntry {
    pub day: u32,
    pub reference: String,
    pub theme: Option<String>,
}

/// Day-indexed reading schedule. Days are contiguous starting at 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingPlan {
    entries: Vec<DayEntry>,
}

impl ReadingPlan {
    /// Build a plan from entries, validating contiguity from day 1.
    pub fn new(entries: Vec<DayEntry>) -> Result<Self, PlanError> {
        let plan = Self { entries };
        plan.validate()?;
        Ok(plan)
    }

    /// Build a plan from entries whose day numbers are not trusted,
    /// renumbering them 1..=len.
    pub fn renumbered(entries: Vec<DayEntry>) -> Self {
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| DayEntry {
                day: i as u32 + 1,
                ..e
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DayEntry] {
        &self.entries
    }

    pub fn last_day(&self) -> u32 {
        self.entries.last().map(|e| e.day).unwrap_or(0)
    }

    pub fn entry_for(&self, day: u32) -> Option<&DayEntry> {
        if day == 0 {
            return None;
        }
        self.entries.get(day as usize - 1)
    }

    /// The final `n` entries, used as continuity context for extensions.
    pub fn tail(&self, n: usize) -> &[DayEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Append entries continuing from the current last day. Past entries
    /// are never rewritten. The appended days must continue contiguously.
    pub fn append(&mut self, entries: Vec<DayEntry>) -> Result<(), PlanError> {
        let mut expected = self.last_day() + 1;
        for entry in &entries {
            if entry.day != expected {
                return Err(PlanError::NonContiguous {
                    expected,
                    got: entry.day,
                });
            }
            expected += 1;
        }
        self.entries.extend(entries);
        Ok(())
    }

    /// Check the contiguity invariant: days are exactly 1..=len.
    pub fn validate(&self) -> Result<(), PlanError> {
        for (i, entry) in self.entries.iter().enumerate() {
            let expected = i as u32 + 1;
            if entry.day != expected {
                return Err(PlanError::NonContiguous {
                    expected,
                    got: entry.day,
                });
            }
        }
        Ok(())
    }
}

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "user" => Some(Self::User),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Day the turn refers to, when it is part of a reading cycle.
    pub day: Option<u32>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>, day: Option<u32>) -> Self {
        // Second precision: the history codec stores whole seconds, and
        // turns must survive a decode/encode cycle unchanged.
        let now = Utc::now();
        let timestamp = now
            .with_nanosecond(0)
            .unwrap_or(now);
        Self {
            role,
            text: text.into(),
            timestamp,
            day,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, None)
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, text, None)
    }

    pub fn with_day(mut self, day: u32) -> Self {
        self.day = Some(day);
        self
    }
}

/// Append-only conversation log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatHistory {
    turns: Vec<Turn>,
}

impl ChatHistory {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Append a turn. This is the only mutation: past turns are never
    /// edited or removed.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The most recent `k` turns, oldest first.
    pub fn recent(&self, k: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(k);
        &self.turns[start..]
    }
}
