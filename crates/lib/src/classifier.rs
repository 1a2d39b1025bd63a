//! # Intent Classification
//!
//! Decides, once per turn, which branch of the pipeline an utterance takes. The AI
//! provider is asked for a JSON verdict; when its reply cannot be used, a keyword
//! heuristic decides instead. Classification never touches the tools.

use crate::{
    errors::AgentError,
    prompts::{
        vocabulary::{DISCOVERY_MARKERS, SMALL_TALK},
        AgentTask,
    },
    types::Intent,
};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

const CLARIFY_EMPTY: &str = "What would you like to know about the data?";

#[derive(Deserialize, Debug, Default)]
struct RawIntent {
    #[serde(default)]
    intent: String,
    #[serde(default)]
    search_query: String,
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    task: AgentTask,
}

impl IntentClassifier {
    pub fn new(task: AgentTask) -> Self {
        Self { task }
    }

    /// Classifies `utterance` in the light of the conversation `history`.
    pub async fn classify(&self, utterance: &str, history: &str) -> Result<Intent, AgentError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Ok(Intent::NeedsClarification {
                question: CLARIFY_EMPTY.to_string(),
            });
        }

        let user_prompt = self
            .task
            .user_prompt
            .replace("{history}", history_or_none(history))
            .replace("{utterance}", utterance);

        debug!(system_prompt = %self.task.system_prompt, user_prompt = %user_prompt, "--> Sending prompts for intent classification");
        let response = self
            .task
            .provider
            .generate(&self.task.system_prompt, &user_prompt)
            .await?;
        debug!("<-- Intent classification response: {}", response);

        let intent = match parse_intent(&response, utterance)? {
            Some(intent) => intent,
            None => {
                warn!("Unusable classifier response; falling back to keyword heuristics.");
                heuristic_intent(utterance)
            }
        };
        info!(?intent, "Classified turn intent");
        Ok(intent)
    }
}

pub(crate) fn history_or_none(history: &str) -> &str {
    if history.trim().is_empty() {
        "(none)"
    } else {
        history
    }
}

/// Extracts the JSON verdict from a classifier reply. `Ok(None)` means the reply
/// held no recognisable intent.
fn parse_intent(response: &str, utterance: &str) -> Result<Option<Intent>, AgentError> {
    let re = Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```|(\{[\s\S]*\})")?;
    let json = match re.captures(response) {
        Some(caps) => caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default(),
        None => return Ok(None),
    };
    let raw: RawIntent = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "Classifier JSON did not parse");
            return Ok(None);
        }
    };

    let or_utterance = |s: String| {
        if s.trim().is_empty() {
            utterance.to_string()
        } else {
            s.trim().to_string()
        }
    };

    let intent = match raw.intent.trim().to_lowercase().as_str() {
        "direct_answer" => Intent::DirectAnswer {
            answer: Some(raw.answer.trim().to_string()).filter(|a| !a.is_empty()),
        },
        "discovery_only" => Intent::DiscoveryOnly {
            search_query: or_utterance(raw.search_query),
        },
        "full_pipeline" => Intent::FullPipeline {
            search_query: or_utterance(raw.search_query),
            question: or_utterance(raw.question),
        },
        "needs_clarification" => Intent::NeedsClarification {
            question: if raw.question.trim().is_empty() {
                CLARIFY_EMPTY.to_string()
            } else {
                raw.question.trim().to_string()
            },
        },
        _ => return Ok(None),
    };
    Ok(Some(intent))
}

/// Keyword fallback used when the AI provider's verdict is unusable.
pub fn heuristic_intent(utterance: &str) -> Intent {
    let lowered = utterance.trim().to_lowercase();
    let bare = lowered.trim_end_matches(['!', '.', '?', ' ']);

    if DISCOVERY_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Intent::DiscoveryOnly {
            search_query: utterance.trim().to_string(),
        };
    }
    if SMALL_TALK.contains(&bare) {
        return Intent::DirectAnswer { answer: None };
    }
    if bare.split_whitespace().count() < 2 {
        return Intent::NeedsClarification {
            question: format!(
                "Could you tell me more about what you want to know about \"{}\"?",
                utterance.trim()
            ),
        };
    }
    Intent::FullPipeline {
        search_query: utterance.trim().to_string(),
        question: utterance.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_verdict() {
        let reply = "```json\n{\"intent\": \"full_pipeline\", \"search_query\": \"orders revenue\", \"question\": \"top customers by revenue\", \"answer\": \"\"}\n```";
        let intent = parse_intent(reply, "who are our top customers?").unwrap();
        assert_eq!(
            intent,
            Some(Intent::FullPipeline {
                search_query: "orders revenue".to_string(),
                question: "top customers by revenue".to_string(),
            })
        );
    }

    #[test]
    fn empty_fields_fall_back_to_the_utterance() {
        let reply = r#"{"intent": "discovery_only", "search_query": ""}"#;
        let intent = parse_intent(reply, "what tables about customers?").unwrap();
        assert_eq!(
            intent,
            Some(Intent::DiscoveryOnly {
                search_query: "what tables about customers?".to_string()
            })
        );
    }

    #[test]
    fn unknown_intent_is_unusable() {
        assert_eq!(parse_intent(r#"{"intent": "dance"}"#, "x").unwrap(), None);
        assert_eq!(parse_intent("no json here", "x").unwrap(), None);
    }

    #[test]
    fn heuristics_cover_each_branch() {
        assert!(matches!(
            heuristic_intent("What tables do we have related to customers?"),
            Intent::DiscoveryOnly { .. }
        ));
        assert!(matches!(
            heuristic_intent("אילו טבלאות יש על לקוחות?"),
            Intent::DiscoveryOnly { .. }
        ));
        assert_eq!(
            heuristic_intent("Thanks!"),
            Intent::DirectAnswer { answer: None }
        );
        assert!(matches!(
            heuristic_intent("revenue"),
            Intent::NeedsClarification { .. }
        ));
        assert!(matches!(
            heuristic_intent("top customers by revenue"),
            Intent::FullPipeline { .. }
        ));
    }

    #[test]
    fn heuristic_branch_does_not_depend_on_the_language() {
        let pairs = [
            ("Thanks", "תודה"),
            ("which tables cover customers?", "אילו טבלאות יש על לקוחות?"),
        ];
        for (english, hebrew) in pairs {
            assert_eq!(
                std::mem::discriminant(&heuristic_intent(english)),
                std::mem::discriminant(&heuristic_intent(hebrew)),
                "{english} / {hebrew}"
            );
        }
    }
}
