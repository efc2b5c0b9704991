use thiserror::Error;
pub use weave_api::{WeaveError, WeaveResult};

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
    #[error("invalid pattern '{pattern}': {reason}")]
    Invalid { pattern: String, reason: String },
    #[error("regex compilation failed: {0}")]
    Regex(#[from] regex::Error),
}

impl PatternError {
    pub fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        PatternError::Invalid {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("malformed expression '{expression}' at {position}: {reason}")]
    Syntax {
        expression: String,
        position: usize,
        reason: String,
    },
    #[error("identifier '{0}' is not bound to a pointcut definition")]
    Unbound(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<PatternError> for WeaveError {
    fn from(err: PatternError) -> Self {
        WeaveError::Definition(err.to_string())
    }
}

impl From<ExpressionError> for WeaveError {
    fn from(err: ExpressionError) -> Self {
        match err {
            ExpressionError::Syntax { .. } => WeaveError::Definition(err.to_string()),
            ExpressionError::Unbound(_) => WeaveError::wrap("evaluating pointcut expression", err),
        }
    }
}

impl From<ConfigError> for WeaveError {
    fn from(err: ConfigError) -> Self {
        WeaveError::Definition(err.to_string())
    }
}

pub type Result<T> = WeaveResult<T>;
