//! Query input, result and error types.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A natural-language query. Never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Create a query, rejecting empty or whitespace-only text.
    pub fn new(text: impl Into<String>) -> Result<Self, QueryError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QueryError::InvalidQuery);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a successful query run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The query as submitted.
    pub query: String,
    /// Full response text as reported by the backend at completion.
    pub response: String,
    /// Follow-up suggestions, when a backend provides them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    /// When the response completed.
    pub timestamp: DateTime<Local>,
}

/// Errors surfaced by a query run. All are fatal to the current query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query must not be empty")]
    InvalidQuery,

    /// The terminal could not be written while connecting or preparing.
    #[error("Failed to write to the terminal before streaming started")]
    Preflight(#[source] std::io::Error),

    /// The backend call failed after the status line was handed over to streaming.
    #[error("Error processing query: {0:#}")]
    Stream(anyhow::Error),
}
