use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use clinichat_core::messages;

use crate::authorizer::QueryAuthorizer;
use crate::composer::ResponseComposer;
use crate::state::{Decision, TurnState};
use crate::tool::{FailureKind, QueryResult, QueryTool};

/// One routing pass over a turn. Implementations must set `decision` and keep
/// `iteration` honest; [`AgentRuntime`] independently enforces the bound.
#[async_trait]
pub trait TurnRouter: Send + Sync {
    async fn route(&self, turn: TurnState) -> TurnState;
}

/// Orchestrates one turn through Routing, Executing, and Composing.
///
/// The loop re-enters Routing after a successful data observation so the
/// router can finish with the data in hand; a failed observation goes straight
/// to Composing (no in-turn retry). `max_iterations` caps Routing entries and
/// forces a direct reply at the bound, so the turn always terminates with a
/// composed answer and nothing propagates to the caller.
pub struct AgentRuntime {
    router: Arc<dyn TurnRouter>,
    authorizer: QueryAuthorizer,
    tool: QueryTool,
    composer: ResponseComposer,
    max_iterations: u32,
}

impl AgentRuntime {
    pub fn new(
        router: Arc<dyn TurnRouter>,
        authorizer: QueryAuthorizer,
        tool: QueryTool,
        composer: ResponseComposer,
        max_iterations: u32,
    ) -> Self {
        Self { router, authorizer, tool, composer, max_iterations }
    }

    pub async fn handle_turn(&self, subject_id: &str, user_input: &str) -> TurnState {
        let mut turn = TurnState::new(subject_id, user_input, self.max_iterations);

        if messages::is_greeting(&turn.user_input) {
            // Greetings skip the reasoning loop entirely; the composer owns
            // the canned reply and no collaborator is consulted.
            turn.decision = Decision::Respond(String::new());
            turn.final_answer = self.composer.compose(&turn).await;
            return turn;
        }

        let mut routing_entries = 0u32;
        loop {
            if turn.at_iteration_limit() || routing_entries >= turn.max_iterations {
                turn.decision = Decision::Respond(messages::ITERATION_LIMIT_REACHED.to_string());
                info!(
                    event_name = "agent.loop.iteration_bound",
                    iteration = turn.iteration,
                    "forcing direct reply at the iteration bound"
                );
                break;
            }
            routing_entries += 1;

            turn = self.router.route(turn).await;

            match turn.decision.clone() {
                Decision::Respond(_) => break,
                Decision::Unset => {
                    // A router that fails to decide is treated like a failed
                    // completion: reply safely, never query.
                    warn!(
                        event_name = "agent.loop.undecided_turn",
                        iteration = turn.iteration,
                        "router returned without a decision"
                    );
                    turn.decision = Decision::Respond(messages::GENERIC_APOLOGY.to_string());
                    break;
                }
                Decision::Query(statement) => {
                    let observation = self.execute_guarded(&statement, &turn.subject_id).await;
                    let failed = observation.is_failure();
                    turn.observation = Some(observation);
                    if failed {
                        break;
                    }
                }
            }
        }

        turn.final_answer = self.composer.compose(&turn).await;
        turn
    }

    async fn execute_guarded(&self, statement: &str, subject_id: &str) -> QueryResult {
        match self.authorizer.authorize(statement, subject_id) {
            Ok(query) => self.tool.execute(&query).await,
            Err(error) => {
                warn!(
                    event_name = "agent.loop.query_rejected",
                    error = %error,
                    "generated statement failed authorization"
                );
                QueryResult::failure(FailureKind::Authorization, error.to_string())
            }
        }
    }
}
