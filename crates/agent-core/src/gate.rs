//! Interaction Gate
//!
//! Pauses the review flow on model text that reads like a yes/no question and
//! waits for an external answer. Detection is a keyword heuristic and is
//! pluggable through [`QuestionDetector`]; treat it as fuzzy.

use async_trait::async_trait;
use std::sync::Arc;

/// Decides whether model text is asking the user to confirm something
pub trait QuestionDetector: Send + Sync {
    fn is_question(&self, text: &str) -> bool;
}

/// External yes/no capability supplied by the host
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn ask_yes_no(&self, question: &str) -> bool;
}

const DEFAULT_PHRASES: &[&str] = &[
    "would you like",
    "do you want",
    "shall i",
    "should i",
    "may i",
    "(yes/no)",
    "(y/n)",
    "yes or no",
];

const QUESTION_TOPICS: &[&str] = &["apply", "fix", "proceed", "change", "continue", "update"];

/// Phrase list heuristic
#[derive(Clone, Debug)]
pub struct KeywordDetector {
    phrases: Vec<String>,
}

impl Default for KeywordDetector {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_PHRASES.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

impl KeywordDetector {
    pub fn with_phrases(phrases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            phrases: phrases.into_iter().map(|p| p.into().to_lowercase()).collect(),
        }
    }
}

impl QuestionDetector for KeywordDetector {
    fn is_question(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if self.phrases.iter().any(|p| lower.contains(p.as_str())) {
            return true;
        }
        lower.trim_end().ends_with('?') && QUESTION_TOPICS.iter().any(|t| lower.contains(t))
    }
}

/// Cooperative confirmation boundary for the review flow
pub struct InteractionGate {
    detector: Arc<dyn QuestionDetector>,
    confirmer: Arc<dyn Confirmer>,
}

impl InteractionGate {
    pub fn new(confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            detector: Arc::new(KeywordDetector::default()),
            confirmer,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn QuestionDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn looks_like_question(&self, text: &str) -> bool {
        self.detector.is_question(text)
    }

    /// Ask the host and wait for the answer
    pub async fn confirm(&self, question: &str) -> bool {
        tracing::info!("Awaiting confirmation");
        let answer = self.confirmer.ask_yes_no(question).await;
        tracing::info!(approved = answer, "Confirmation received");
        answer
    }
}

/// Confirmer with a fixed answer
#[derive(Clone, Copy, Debug)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirmer for FixedAnswer {
    async fn ask_yes_no(&self, _question: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Heuristic boundary: these pin current behaviour, not a precise contract.
    #[test]
    fn test_keyword_detector_known_cases() {
        let detector = KeywordDetector::default();
        assert!(detector.is_question("I found an off-by-one error. Would you like me to fix it?"));
        assert!(detector.is_question("Apply this change? (yes/no)"));
        assert!(detector.is_question("Shall I proceed"));
        assert!(detector.is_question("Ready to apply the fix?"));
        assert!(!detector.is_question("The file looks correct."));
        assert!(!detector.is_question("What does this function return?"));
    }

    #[test]
    fn test_custom_phrases() {
        let detector = KeywordDetector::with_phrases(["OK to go"]);
        assert!(detector.is_question("ok to go ahead"));
        assert!(!detector.is_question("would you like tea"));
    }

    struct Never;

    impl QuestionDetector for Never {
        fn is_question(&self, _text: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_gate_relays_answer_and_swaps_detector() {
        let gate = InteractionGate::new(Arc::new(FixedAnswer(true)));
        assert!(gate.confirm("Apply?").await);
        assert!(!InteractionGate::new(Arc::new(FixedAnswer(false))).confirm("Apply?").await);

        let gate = gate.with_detector(Arc::new(Never));
        assert!(!gate.looks_like_question("Would you like me to fix it?"));
    }
}
