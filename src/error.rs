use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Nl2SqlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema introspection error: {0}")]
    Introspection(String),

    #[error("Query cannot be empty")]
    EmptyQuestion,

    #[error("Error generating SQL: {message}")]
    Translation { message: String, retryable: bool },

    #[error("Could not generate SQL from query")]
    EmptyGeneration,

    #[error("Generated query is not a SELECT statement: {0}")]
    NotSelect(String),

    #[error("Generated query contains more than one statement")]
    MultipleStatements,

    #[error("Database error: {0}")]
    Execution(String),

    #[error("Query timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Nl2SqlError {
    pub fn translation(message: impl Into<String>) -> Self {
        Nl2SqlError::Translation {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable_translation(message: impl Into<String>) -> Self {
        Nl2SqlError::Translation {
            message: message.into(),
            retryable: true,
        }
    }

    /// Whether a retry at the translation boundary may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Nl2SqlError::Translation { retryable: true, .. })
    }

    /// HTTP status surfaced to API clients.
    pub fn status_code(&self) -> u16 {
        match self {
            Nl2SqlError::EmptyQuestion
            | Nl2SqlError::EmptyGeneration
            | Nl2SqlError::NotSelect(_)
            | Nl2SqlError::MultipleStatements => 400,
            Nl2SqlError::Timeout(_) => 504,
            _ => 500,
        }
    }
}

impl From<sqlx::Error> for Nl2SqlError {
    fn from(err: sqlx::Error) -> Self {
        Nl2SqlError::Execution(err.to_string())
    }
}

impl From<reqwest::Error> for Nl2SqlError {
    fn from(err: reqwest::Error) -> Self {
        let retryable = err.is_timeout() || err.is_connect();
        Nl2SqlError::Translation {
            message: format!("LLM API call failed: {}", err),
            retryable,
        }
    }
}

pub type Result<T> = std::result::Result<T, Nl2SqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        assert_eq!(Nl2SqlError::EmptyQuestion.status_code(), 400);
        assert_eq!(Nl2SqlError::NotSelect("DELETE".into()).status_code(), 400);
        assert_eq!(Nl2SqlError::MultipleStatements.status_code(), 400);
        assert_eq!(Nl2SqlError::EmptyGeneration.status_code(), 400);
    }

    #[test]
    fn test_upstream_errors_map_to_server_error() {
        assert_eq!(Nl2SqlError::Execution("connection refused".into()).status_code(), 500);
        assert_eq!(Nl2SqlError::translation("rate limited").status_code(), 500);
        assert_eq!(Nl2SqlError::Timeout(Duration::from_secs(30)).status_code(), 504);
    }

    #[test]
    fn test_retryable_flag() {
        assert!(Nl2SqlError::retryable_translation("503").is_retryable());
        assert!(!Nl2SqlError::translation("401").is_retryable());
        assert!(!Nl2SqlError::Execution("boom".into()).is_retryable());
    }

    #[test]
    fn test_database_message_is_prefixed() {
        let err = Nl2SqlError::Execution("relation \"Foo\" does not exist".into());
        assert!(err.to_string().starts_with("Database error:"));
    }
}
