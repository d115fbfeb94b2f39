use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use clinichat_core::{messages, schema};

use crate::llm::CompletionClient;
use crate::runtime::TurnRouter;
use crate::state::{Decision, TurnState};

/// Sentinel the completion output uses to request a data lookup. Any other
/// action value is treated as a direct reply.
pub const QUERY_ACTION: &str = "appointments_query";

const OBSERVATION_PROMPT_ROWS: usize = 20;

/// Classifies one turn as direct conversation or a scoped read-only query.
///
/// The completion capability sees the table schema and exactly two outcomes;
/// its output is parsed with [`parse_completion`] and any deviation falls back
/// to a direct reply. The router never defaults to the query path.
pub struct IntentRouter {
    completion: Arc<dyn CompletionClient>,
}

impl IntentRouter {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    fn routing_prompt(&self, turn: &TurnState) -> String {
        let schema_block = schema::prompt_block();
        let subject_id = &turn.subject_id;
        let user_input = &turn.user_input;

        let observation_block = match &turn.observation {
            Some(observation) => format!(
                "\nDATA ALREADY RETRIEVED (answer from this, do not query again):\n{}\n",
                observation.render_compact(OBSERVATION_PROMPT_ROWS)
            ),
            None => String::new(),
        };

        format!(
            "You are the routing step of a medical assistant for a hospital network. \
Decide how to handle the user's message.\n\
\n\
User message: {user_input}\n\
Subject ID: {subject_id}\n\
{observation_block}\
\n\
ROUTING DECISION - choose exactly one action:\n\
\n\
1. Direct reply - use action `final_answer` for:\n\
   - Greetings and small talk (שלום, היי, איך שלומך)\n\
   - General questions about the hospital\n\
   - Anything that needs no database lookup\n\
\n\
2. Data lookup - use action `{QUERY_ACTION}` for:\n\
   - Questions about the user's appointments (תורים, פגישות)\n\
   - Appointment dates, types, or status\n\
   - Directions to a specific facility (use the site_instructions column)\n\
\n\
DATABASE INFO (only when a lookup is needed):\n\
{schema_block}\
- Write a single read-only SELECT statement.\n\
- MANDATORY: the statement MUST include \"WHERE subject_id = '{subject_id}'\".\n\
\n\
RESPONSE FORMAT (exactly these labeled lines):\n\
Thought: [does this need a database lookup or a direct reply?]\n\
Action: [{QUERY_ACTION} or final_answer]\n\
Action Input: [the SELECT statement, or the Hebrew reply text]\n"
        )
    }
}

#[async_trait]
impl TurnRouter for IntentRouter {
    async fn route(&self, mut turn: TurnState) -> TurnState {
        if turn.at_iteration_limit() {
            turn.decision = Decision::Respond(messages::ITERATION_LIMIT_REACHED.to_string());
            return turn;
        }

        let prompt = self.routing_prompt(&turn);
        turn.decision = match self.completion.complete(&prompt).await {
            Ok(output) => {
                let decision = decision_from_completion(&output);
                let kind = match &decision {
                    Decision::Query(_) => "query",
                    _ => "respond",
                };
                info!(
                    event_name = "agent.router.decision",
                    iteration = turn.iteration,
                    kind,
                    "turn routed"
                );
                decision
            }
            Err(error) => {
                // Fail closed: an unreachable or misbehaving completion
                // capability can only produce a direct apology, never a query.
                warn!(
                    event_name = "agent.router.completion_failed",
                    iteration = turn.iteration,
                    error = %error,
                    "routing completion failed"
                );
                Decision::Respond(messages::GENERIC_APOLOGY.to_string())
            }
        };
        turn.iteration += 1;

        turn
    }
}

/// Parsed labeled segments of a completion output.
///
/// Grammar: up to three optional labeled lines, first occurrence wins:
/// `Thought: ...`, `Action: ...`, `Action Input: ...`. Everything else is
/// ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCompletion {
    pub thought: Option<String>,
    pub action: Option<String>,
    pub payload: Option<String>,
}

pub fn parse_completion(output: &str) -> ParsedCompletion {
    let mut parsed = ParsedCompletion::default();

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = labeled_value(line, "Thought:") {
            parsed.thought.get_or_insert(rest);
        } else if let Some(rest) = labeled_value(line, "Action Input:") {
            parsed.payload.get_or_insert(rest);
        } else if let Some(rest) = labeled_value(line, "Action:") {
            parsed.action.get_or_insert(rest);
        }
    }

    parsed
}

fn labeled_value(line: &str, label: &str) -> Option<String> {
    line.strip_prefix(label).map(|rest| rest.trim().to_string()).filter(|rest| !rest.is_empty())
}

/// Maps a raw completion output to a decision.
///
/// Only the exact query sentinel selects the query path. A missing action line
/// degrades to a direct reply built from the payload, then from the raw
/// output, then from the generic apology.
fn decision_from_completion(output: &str) -> Decision {
    let parsed = parse_completion(output);

    let is_query = parsed
        .action
        .as_deref()
        .map(|action| action.eq_ignore_ascii_case(QUERY_ACTION))
        .unwrap_or(false);

    if is_query {
        return match parsed.payload {
            Some(statement) => Decision::Query(statement),
            // A query action without a statement cannot be executed safely.
            None => Decision::Respond(messages::GENERIC_APOLOGY.to_string()),
        };
    }

    let fallback_text = parsed
        .payload
        .or_else(|| {
            let trimmed = output.trim();
            (!trimmed.is_empty() && parse_completion(output) == ParsedCompletion::default())
                .then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| messages::GENERIC_APOLOGY.to_string());

    Decision::Respond(fallback_text)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use clinichat_core::messages;

    use crate::llm::{CompletionClient, CompletionError};
    use crate::runtime::TurnRouter;
    use crate::state::{Decision, TurnState};

    use super::{decision_from_completion, parse_completion, IntentRouter};

    struct ScriptedCompletion {
        output: Result<&'static str, CompletionError>,
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            self.output.clone().map(str::to_string)
        }
    }

    fn router_with(output: Result<&'static str, CompletionError>) -> IntentRouter {
        IntentRouter::new(Arc::new(ScriptedCompletion { output }))
    }

    #[test]
    fn parses_all_three_labeled_lines() {
        let parsed = parse_completion(
            "Thought: the user asks about appointments\n\
             Action: appointments_query\n\
             Action Input: SELECT * FROM appointments WHERE subject_id = '12345'",
        );
        assert_eq!(parsed.thought.as_deref(), Some("the user asks about appointments"));
        assert_eq!(parsed.action.as_deref(), Some("appointments_query"));
        assert!(parsed.payload.as_deref().unwrap_or_default().starts_with("SELECT"));
    }

    #[test]
    fn first_occurrence_of_a_label_wins() {
        let parsed = parse_completion("Action: final_answer\nAction: appointments_query");
        assert_eq!(parsed.action.as_deref(), Some("final_answer"));
    }

    #[test]
    fn query_sentinel_selects_the_query_path() {
        let decision = decision_from_completion(
            "Action: appointments_query\n\
             Action Input: SELECT COUNT(*) FROM appointments WHERE subject_id = '12345'",
        );
        assert!(matches!(decision, Decision::Query(statement) if statement.contains("COUNT")));
    }

    #[test]
    fn non_sentinel_actions_respond_with_the_payload() {
        let decision = decision_from_completion(
            "Thought: greeting\nAction: final_answer\nAction Input: שלום! איך אפשר לעזור?",
        );
        assert_eq!(decision, Decision::Respond("שלום! איך אפשר לעזור?".to_string()));
    }

    #[test]
    fn missing_action_line_degrades_to_respond() {
        let decision = decision_from_completion("Action Input: אפשר לקבוע תור בטלפון.");
        assert_eq!(decision, Decision::Respond("אפשר לקבוע תור בטלפון.".to_string()));
    }

    #[test]
    fn unlabeled_output_is_used_verbatim_as_a_reply() {
        let decision = decision_from_completion("אני כאן לעזור לך בכל שאלה.");
        assert_eq!(decision, Decision::Respond("אני כאן לעזור לך בכל שאלה.".to_string()));
    }

    #[test]
    fn query_action_without_a_statement_falls_back_to_apology() {
        let decision = decision_from_completion("Action: appointments_query");
        assert_eq!(decision, Decision::Respond(messages::GENERIC_APOLOGY.to_string()));
    }

    #[test]
    fn empty_output_falls_back_to_apology() {
        let decision = decision_from_completion("   \n  ");
        assert_eq!(decision, Decision::Respond(messages::GENERIC_APOLOGY.to_string()));
    }

    #[tokio::test]
    async fn completion_failure_fails_closed_to_respond() {
        let router =
            router_with(Err(CompletionError::Invocation("boom".to_string())));
        let turn = router.route(TurnState::new("12345", "מה התורים שלי?", 3)).await;

        assert_eq!(turn.decision, Decision::Respond(messages::GENERIC_APOLOGY.to_string()));
        assert_eq!(turn.iteration, 1);
    }

    #[tokio::test]
    async fn iteration_limit_forces_a_localized_respond_without_invocation() {
        let router = router_with(Ok("Action: appointments_query\nAction Input: SELECT 1"));
        let mut turn = TurnState::new("12345", "מה התורים שלי?", 3);
        turn.iteration = 3;

        let routed = router.route(turn).await;
        assert_eq!(
            routed.decision,
            Decision::Respond(messages::ITERATION_LIMIT_REACHED.to_string())
        );
        assert_eq!(routed.iteration, 3, "forced termination must not burn an iteration");
    }

    #[tokio::test]
    async fn prompt_mentions_schema_subject_and_observation() {
        let router = router_with(Ok("Action: final_answer\nAction Input: בסדר"));
        let mut turn = TurnState::new("12345", "כמה תורים יש לי?", 3);
        turn.observation = Some(crate::tool::QueryResult::rows(
            vec!["total".to_string()],
            vec![vec!["2".to_string()]],
        ));

        let prompt = router.routing_prompt(&turn);
        assert!(prompt.contains("subject_id = '12345'"));
        assert!(prompt.contains("appoitment_type"));
        assert!(prompt.contains("DATA ALREADY RETRIEVED"));
    }
}
