use async_trait::async_trait;
use thiserror::Error;

/// One page of tabular results from the data source.
///
/// Invariant: every row has exactly `columns.len()` cells. An empty result is
/// a page with no columns and no rows, not an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TabularPage {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularPage {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Read-only data-source collaborator.
///
/// Implementations acquire their connection per call and release it before
/// returning; callers own timeouts.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn run(&self, statement: &str) -> Result<TabularPage, ConnectorError>;
}
