use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use clinichat_core::datasource::{Connector, ConnectorError};

use crate::authorizer::AuthorizedQuery;

const STATEMENT_PREVIEW_CHARS: usize = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Authorization,
    Timeout,
    Connector,
}

/// Outcome of one tool invocation. All failures are values; the tool never
/// raises to its caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryResult {
    Rows { columns: Vec<String>, rows: Vec<Vec<String>>, count: usize },
    Failure { kind: FailureKind, message: String },
}

impl QueryResult {
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let count = rows.len();
        Self::Rows { columns, rows, count }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure { kind, message: message.into() }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Compact text rendering for completion prompts: a header line, the
    /// column names, and up to `max_rows` pipe-separated rows.
    pub fn render_compact(&self, max_rows: usize) -> String {
        match self {
            Self::Failure { .. } => "query failed".to_string(),
            Self::Rows { columns, rows, count } => {
                if *count == 0 {
                    return "no records found".to_string();
                }
                let mut rendered = format!("{count} records\n{}\n", columns.join(" | "));
                for row in rows.iter().take(max_rows) {
                    rendered.push_str(&row.join(" | "));
                    rendered.push('\n');
                }
                if *count > max_rows {
                    rendered.push_str(&format!("... ({} more rows omitted)\n", count - max_rows));
                }
                rendered
            }
        }
    }
}

/// Executes authorized statements against the data-source connector with a
/// bounded timeout.
pub struct QueryTool {
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl QueryTool {
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    pub async fn execute(&self, query: &AuthorizedQuery) -> QueryResult {
        let preview = statement_preview(query.text());

        let outcome = tokio::time::timeout(self.timeout, self.connector.run(query.text())).await;

        match outcome {
            Err(_) => {
                warn!(
                    event_name = "agent.tool.query_timeout",
                    statement_preview = %preview,
                    timeout_secs = self.timeout.as_secs(),
                    "query execution timed out"
                );
                QueryResult::failure(
                    FailureKind::Timeout,
                    format!("query timed out after {} seconds", self.timeout.as_secs()),
                )
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "agent.tool.query_failed",
                    statement_preview = %preview,
                    error = %error,
                    "query execution failed"
                );
                let kind = match error {
                    ConnectorError::Unavailable(_) | ConnectorError::Query(_) => {
                        FailureKind::Connector
                    }
                };
                QueryResult::failure(kind, error.to_string())
            }
            Ok(Ok(page)) => {
                // Row contents stay out of the log; the preview and the count
                // are enough to trace a turn.
                info!(
                    event_name = "agent.tool.query_executed",
                    statement_preview = %preview,
                    row_count = page.row_count(),
                    "query executed"
                );
                QueryResult::rows(page.columns, page.rows)
            }
        }
    }
}

fn statement_preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= STATEMENT_PREVIEW_CHARS {
        return collapsed;
    }
    let truncated = collapsed.chars().take(STATEMENT_PREVIEW_CHARS).collect::<String>();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use clinichat_core::datasource::{Connector, ConnectorError, TabularPage};

    use crate::authorizer::QueryAuthorizer;

    use super::{statement_preview, FailureKind, QueryResult, QueryTool};

    struct FixedConnector {
        page: TabularPage,
    }

    #[async_trait]
    impl Connector for FixedConnector {
        async fn run(&self, _statement: &str) -> Result<TabularPage, ConnectorError> {
            Ok(self.page.clone())
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        async fn run(&self, _statement: &str) -> Result<TabularPage, ConnectorError> {
            Err(ConnectorError::Unavailable("connection refused".to_string()))
        }
    }

    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        async fn run(&self, _statement: &str) -> Result<TabularPage, ConnectorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(TabularPage::default())
        }
    }

    fn authorized_query() -> crate::authorizer::AuthorizedQuery {
        QueryAuthorizer::new()
            .authorize(
                "SELECT appoitment_type FROM appointments WHERE subject_id = '12345'",
                "12345",
            )
            .expect("fixture statement should authorize")
    }

    #[tokio::test]
    async fn rows_carry_a_consistent_count() {
        let page = TabularPage {
            columns: vec!["appoitment_type".to_string()],
            rows: vec![vec!["בדיקת דם".to_string()], vec!["אורתופדיה".to_string()]],
        };
        let tool =
            QueryTool::new(Arc::new(FixedConnector { page }), Duration::from_secs(60));

        let result = tool.execute(&authorized_query()).await;
        match result {
            QueryResult::Rows { rows, count, .. } => {
                assert_eq!(count, 2);
                assert_eq!(count, rows.len());
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_result_is_rows_not_failure() {
        let tool = QueryTool::new(
            Arc::new(FixedConnector { page: TabularPage::default() }),
            Duration::from_secs(60),
        );

        let result = tool.execute(&authorized_query()).await;
        assert_eq!(result, QueryResult::rows(Vec::new(), Vec::new()));
        assert!(!result.is_failure());
    }

    #[tokio::test]
    async fn connector_errors_become_failure_values() {
        let tool = QueryTool::new(Arc::new(FailingConnector), Duration::from_secs(60));

        let result = tool.execute(&authorized_query()).await;
        match result {
            QueryResult::Failure { kind, .. } => assert_eq!(kind, FailureKind::Connector),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_connectors_hit_the_timeout() {
        let tool = QueryTool::new(Arc::new(HangingConnector), Duration::from_secs(60));

        let result = tool.execute(&authorized_query()).await;
        match result {
            QueryResult::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Timeout);
                assert!(message.contains("60"));
            }
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[test]
    fn preview_truncates_and_collapses_whitespace() {
        let long = format!("SELECT   *\nFROM appointments WHERE subject_id = '{}'", "x".repeat(200));
        let preview = statement_preview(&long);
        assert!(preview.chars().count() <= 83);
        assert!(preview.ends_with("..."));
        assert!(!preview.contains('\n'));

        assert_eq!(statement_preview("SELECT 1"), "SELECT 1");
    }
}
