//! Terminal answer payload and turn outcome types.

use serde::{Deserialize, Serialize};

/// Answer text recorded when a turn ends without a terminal tool call.
pub const NO_ANSWER_PLACEHOLDER: &str = "No answer found";

/// The structured payload of the terminal tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// The answer shown to the user
    pub answer: String,

    /// Names of the tools used to produce the answer
    #[serde(default)]
    pub tools_used: Vec<String>,
}

impl FinalAnswer {
    pub fn new(answer: impl Into<String>, tools_used: Vec<String>) -> Self {
        Self {
            answer: answer.into(),
            tools_used,
        }
    }

    /// The answer used when no terminal tool was reached.
    pub fn placeholder() -> Self {
        Self::new(NO_ANSWER_PLACEHOLDER, Vec::new())
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The terminal tool was invoked
    Terminated,
    /// The iteration limit was reached first
    Exhausted,
    /// The caller cancelled the turn
    Cancelled,
}

impl std::fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnOutcome::Terminated => "terminated",
            TurnOutcome::Exhausted => "exhausted",
            TurnOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_used_defaults_to_empty() {
        let answer: FinalAnswer = serde_json::from_str(r#"{"answer": "42"}"#).unwrap();
        assert_eq!(answer.answer, "42");
        assert!(answer.tools_used.is_empty());
    }

    #[test]
    fn placeholder_answer() {
        let answer = FinalAnswer::placeholder();
        assert_eq!(answer.answer, NO_ANSWER_PLACEHOLDER);
        assert!(answer.tools_used.is_empty());
    }

    #[test]
    fn outcome_display() {
        assert_eq!(TurnOutcome::Exhausted.to_string(), "exhausted");
    }
}
