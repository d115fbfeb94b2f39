//! Conversational routing runtime for the appointment assistant.
//!
//! This crate is the decision core of the system:
//! - **Intent routing** (`router`) - classify a turn as direct conversation or
//!   a read-only data lookup
//! - **Query authorization** (`authorizer`) - constrain every generated
//!   statement to the subject's own rows in the one allowed table
//! - **Tool execution** (`tool`) - run authorized statements with a bounded
//!   timeout, returning failures as values
//! - **Response composition** (`composer`) - produce the final Hebrew reply
//! - **Turn orchestration** (`runtime`) - the bounded state machine tying the
//!   nodes together
//!
//! # Safety Principle
//!
//! The completion capability is strictly a translator. A statement it proposes
//! executes only after the authorizer has pinned it to the configured table and
//! to the authenticated subject; authorization failures never reach the data
//! source and never surface internal detail to the end user.

pub mod authorizer;
pub mod composer;
pub mod llm;
pub mod router;
pub mod runtime;
pub mod state;
pub mod tool;

pub use authorizer::{AuthorizationError, AuthorizedQuery, QueryAuthorizer};
pub use composer::ResponseComposer;
pub use llm::{CompletionClient, CompletionError, HttpCompletionClient};
pub use router::IntentRouter;
pub use runtime::{AgentRuntime, TurnRouter};
pub use state::{Decision, TurnState};
pub use tool::{FailureKind, QueryResult, QueryTool};
