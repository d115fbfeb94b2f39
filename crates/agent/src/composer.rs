use std::sync::Arc;

use tracing::warn;

use clinichat_core::messages;

use crate::llm::CompletionClient;
use crate::state::{Decision, TurnState};
use crate::tool::{FailureKind, QueryResult};

const SUMMARY_PROMPT_ROWS: usize = 50;

/// Produces the final Hebrew reply for a turn.
///
/// The completion capability is consulted for exactly one branch: summarizing
/// a non-empty data result. Every other branch returns canned text or the
/// router's own words, so a broken completion capability can degrade the
/// experience but never block an answer.
pub struct ResponseComposer {
    completion: Arc<dyn CompletionClient>,
    system_prompt: Arc<str>,
}

impl ResponseComposer {
    pub fn new(completion: Arc<dyn CompletionClient>, system_prompt: Arc<str>) -> Self {
        Self { completion, system_prompt }
    }

    pub async fn compose(&self, turn: &TurnState) -> String {
        if messages::is_greeting(&turn.user_input) {
            return messages::GREETING_REPLY.to_string();
        }

        match &turn.observation {
            None => match &turn.decision {
                // The router's direct reply is final; no restyling pass.
                Decision::Respond(text) if !text.trim().is_empty() => text.clone(),
                _ => messages::HOW_CAN_I_HELP.to_string(),
            },
            Some(QueryResult::Rows { count: 0, .. }) => messages::NO_DATA_FOUND.to_string(),
            Some(result @ QueryResult::Rows { .. }) => self.summarize_rows(turn, result).await,
            Some(QueryResult::Failure { kind: FailureKind::Authorization, .. }) => {
                messages::PRIVACY_APOLOGY.to_string()
            }
            Some(QueryResult::Failure { .. }) => messages::GENERIC_APOLOGY.to_string(),
        }
    }

    async fn summarize_rows(&self, turn: &TurnState, result: &QueryResult) -> String {
        let prompt = self.summary_prompt(turn, result);

        match self.completion.complete(&prompt).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => messages::GENERIC_APOLOGY.to_string(),
            Err(error) => {
                warn!(
                    event_name = "agent.composer.summary_failed",
                    error = %error,
                    "summary completion failed"
                );
                messages::GENERIC_APOLOGY.to_string()
            }
        }
    }

    fn summary_prompt(&self, turn: &TurnState, result: &QueryResult) -> String {
        let system_prompt = &self.system_prompt;
        let user_input = &turn.user_input;
        let rendered = result.render_compact(SUMMARY_PROMPT_ROWS);

        format!(
            "{system_prompt}\n\
\n\
שאלת המשתמש: {user_input}\n\
תוצאות השאילתה:\n{rendered}\n\
\n\
Instructions:\n\
- Respond in Hebrew, friendly and professional.\n\
- Summarize the appointment information that answers the question: dates, \
types, status, and site details when relevant.\n\
- Discuss only the data above; it belongs to the asking user.\n\
\n\
Provide your response in Hebrew:"
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use clinichat_core::messages;

    use crate::llm::{CompletionClient, CompletionError};
    use crate::state::{Decision, TurnState};
    use crate::tool::{FailureKind, QueryResult};

    use super::ResponseComposer;

    struct ScriptedCompletion {
        output: Result<&'static str, CompletionError>,
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            self.output.clone().map(str::to_string)
        }
    }

    struct PanickyCompletion;

    #[async_trait]
    impl CompletionClient for PanickyCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            panic!("composer must not consult the completion capability here");
        }
    }

    fn composer_with(output: Result<&'static str, CompletionError>) -> ResponseComposer {
        ResponseComposer::new(
            Arc::new(ScriptedCompletion { output }),
            Arc::from("אתה העוזר של המרפאה."),
        )
    }

    fn silent_composer() -> ResponseComposer {
        ResponseComposer::new(Arc::new(PanickyCompletion), Arc::from("system"))
    }

    fn two_row_result() -> QueryResult {
        QueryResult::rows(
            vec!["appoitment_type".to_string(), "appointment_status".to_string()],
            vec![
                vec!["בדיקת דם".to_string(), "completed".to_string()],
                vec!["אורתופדיה".to_string(), "confirmed".to_string()],
            ],
        )
    }

    #[tokio::test]
    async fn greetings_bypass_the_completion_capability() {
        let composer = silent_composer();
        let turn = TurnState::new("12345", "שלום", 3);

        assert_eq!(composer.compose(&turn).await, messages::GREETING_REPLY);
    }

    #[tokio::test]
    async fn direct_router_reply_is_returned_as_is() {
        let composer = silent_composer();
        let mut turn = TurnState::new("12345", "מה שעות הפתיחה?", 3);
        turn.decision = Decision::Respond("המרפאה פתוחה בין 8:00 ל-20:00.".to_string());

        assert_eq!(composer.compose(&turn).await, "המרפאה פתוחה בין 8:00 ל-20:00.");
    }

    #[tokio::test]
    async fn empty_rows_map_to_the_no_data_message_without_completion() {
        let composer = silent_composer();
        let mut turn = TurnState::new("12345", "מה התורים שלי?", 3);
        turn.decision = Decision::Respond(String::new());
        turn.observation = Some(QueryResult::rows(Vec::new(), Vec::new()));

        assert_eq!(composer.compose(&turn).await, messages::NO_DATA_FOUND);
    }

    #[tokio::test]
    async fn populated_rows_are_summarized_via_completion() {
        let composer = composer_with(Ok("יש לך 2 תורים: בדיקת דם ואורתופדיה."));
        let mut turn = TurnState::new("12345", "מה התורים שלי?", 3);
        turn.decision = Decision::Respond(String::new());
        turn.observation = Some(two_row_result());

        let answer = composer.compose(&turn).await;
        assert!(answer.contains("2"));
    }

    #[tokio::test]
    async fn summary_completion_failure_degrades_to_generic_apology() {
        let composer = composer_with(Err(CompletionError::Timeout(30)));
        let mut turn = TurnState::new("12345", "מה התורים שלי?", 3);
        turn.observation = Some(two_row_result());

        assert_eq!(composer.compose(&turn).await, messages::GENERIC_APOLOGY);
    }

    #[tokio::test]
    async fn authorization_failures_get_the_privacy_apology() {
        let composer = silent_composer();
        let mut turn = TurnState::new("12345", "מה התורים של 99999?", 3);
        turn.observation = Some(QueryResult::failure(
            FailureKind::Authorization,
            "statement is not scoped to the calling subject",
        ));

        let answer = composer.compose(&turn).await;
        assert_eq!(answer, messages::PRIVACY_APOLOGY);
        assert!(!answer.contains("99999"));
        assert!(!answer.contains("MissingScopePredicate"));
    }

    #[tokio::test]
    async fn tool_failures_get_the_generic_apology() {
        let composer = silent_composer();
        let mut turn = TurnState::new("12345", "מה התורים שלי?", 3);
        turn.observation =
            Some(QueryResult::failure(FailureKind::Timeout, "query timed out after 60 seconds"));

        let answer = composer.compose(&turn).await;
        assert_eq!(answer, messages::GENERIC_APOLOGY);
        assert!(!answer.contains("60"));
    }

    #[tokio::test]
    async fn undecided_turn_falls_back_to_how_can_i_help() {
        let composer = silent_composer();
        let turn = TurnState::new("12345", "...", 3);

        assert_eq!(composer.compose(&turn).await, messages::HOW_CAN_I_HELP);
    }

    #[tokio::test]
    async fn summary_prompt_includes_question_and_rendered_rows() {
        let composer = composer_with(Ok("ok"));
        let mut turn = TurnState::new("12345", "מה התורים שלי?", 3);
        let result = two_row_result();
        turn.observation = Some(result.clone());

        let prompt = composer.summary_prompt(&turn, &result);
        assert!(prompt.contains("מה התורים שלי?"));
        assert!(prompt.contains("בדיקת דם"));
        assert!(prompt.contains("אתה העוזר של המרפאה."));
    }
}
