//! Conversation session layer: state derivation, message text, and the
//! turn engine.

pub mod engine;
pub mod prompts;
pub mod state;

pub use engine::TurnEngine;
pub use state::{OnboardingStep, SessionState};
