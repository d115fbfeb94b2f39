use thiserror::Error;

use clinichat_core::schema::{SOURCE_TABLE, SUBJECT_COLUMN};

/// Mutating keywords that disqualify a statement outright.
/// Matched case-insensitively on whole words.
pub const DENYLIST: &[&str] =
    &["drop", "delete", "truncate", "alter", "create", "insert", "update"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("subject identifier is missing or malformed")]
    InvalidSubjectId,
    #[error("statement contains a forbidden operation")]
    ForbiddenOperation,
    #[error("statement references an unauthorized source")]
    UnauthorizedSource,
    #[error("statement is not scoped to the calling subject")]
    MissingScopePredicate,
}

/// A statement that passed authorization. Constructed only here; immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedQuery {
    text: String,
    source_table: &'static str,
}

impl AuthorizedQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_table(&self) -> &'static str {
        self.source_table
    }
}

/// Pure validation gate in front of the query tool.
///
/// A statement executes only if it is read-only, touches nothing but the
/// configured appointments table, and demonstrably scopes to the calling
/// subject. Anything else fails closed before reaching the data source.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryAuthorizer;

impl QueryAuthorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn authorize(
        &self,
        raw_statement: &str,
        subject_id: &str,
    ) -> Result<AuthorizedQuery, AuthorizationError> {
        if !is_valid_subject_id(subject_id) {
            return Err(AuthorizationError::InvalidSubjectId);
        }

        let statement = raw_statement.trim();
        if statement.is_empty() {
            return Err(AuthorizationError::MissingScopePredicate);
        }

        let tokens = tokenize(statement);
        if tokens.iter().any(|token| is_denied_keyword(token)) {
            return Err(AuthorizationError::ForbiddenOperation);
        }

        for table in referenced_tables(&tokens) {
            if !table.eq_ignore_ascii_case(SOURCE_TABLE) {
                return Err(AuthorizationError::UnauthorizedSource);
            }
        }

        if !has_scope_predicate(statement, subject_id) {
            return Err(AuthorizationError::MissingScopePredicate);
        }

        Ok(AuthorizedQuery { text: statement.to_string(), source_table: SOURCE_TABLE })
    }
}

/// Subject ids are opaque but must stay in a safe alphabet: alphanumerics
/// plus `.`, `-`, `_`. Anything else could smuggle quoting into a predicate.
pub fn is_valid_subject_id(subject_id: &str) -> bool {
    !subject_id.is_empty()
        && subject_id.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'))
}

fn tokenize(statement: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in statement.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn is_denied_keyword(token: &str) -> bool {
    DENYLIST.contains(&token)
}

/// Table names are the tokens immediately following FROM or JOIN.
fn referenced_tables(tokens: &[String]) -> Vec<&str> {
    let mut tables = Vec::new();
    for window in tokens.windows(2) {
        if let [keyword, name] = window {
            if keyword == "from" || keyword == "join" {
                tables.push(name.as_str());
            }
        }
    }
    tables
}

/// The anti-leakage invariant: the exact equality predicate
/// `subject_id = '<value>'` must appear textually. Whitespace runs are
/// collapsed before matching so formatting differences do not defeat it.
fn has_scope_predicate(statement: &str, subject_id: &str) -> bool {
    let normalized = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    let predicate = format!("{SUBJECT_COLUMN} = '{subject_id}'");
    normalized.contains(&predicate)
}
