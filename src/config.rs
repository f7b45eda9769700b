//! Configuration types.

use std::time::Duration;

/// Companion configuration.
///
/// Every knob has a documented default; `from_env` overrides from
/// `COMPANION_*` environment variables where set.
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Number of days covered by the initially generated plan.
    pub plan_horizon_days: u32,
    /// Remaining-days threshold that triggers automatic plan extension.
    pub extend_lookahead_days: u32,
    /// Number of days requested per extension.
    pub extend_chunk_days: u32,
    /// Most-recent turns supplied as discussion context.
    pub history_window: usize,
    /// Time budget for a single generative backend call.
    pub llm_timeout: Duration,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            plan_horizon_days: 30,
            extend_lookahead_days: 3,
            extend_chunk_days: 7,
            history_window: 8,
            llm_timeout: Duration::from_secs(60),
        }
    }
}

impl CompanionConfig {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            plan_horizon_days: env_parse("COMPANION_PLAN_HORIZON", defaults.plan_horizon_days),
            extend_lookahead_days: env_parse(
                "COMPANION_EXTEND_LOOKAHEAD",
                defaults.extend_lookahead_days,
            ),
            extend_chunk_days: env_parse("COMPANION_EXTEND_CHUNK", defaults.extend_chunk_days),
            history_window: env_parse("COMPANION_HISTORY_WINDOW", defaults.history_window),
            llm_timeout: Duration::from_secs(env_parse(
                "COMPANION_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
