use crate::models::Throwable;

/// Errors surfaced by join point dispatch.
///
/// `Thrown` carries exceptions raised by advice or by the intercepted
/// operation and is part of normal control flow. Every other variant means the
/// framework itself is misconfigured or failed unexpectedly.
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    #[error("{0}")]
    Thrown(Throwable),
    #[error("definition error: {0}")]
    Definition(String),
    #[error("runtime error while {context}: {source}")]
    WrappedRuntime {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("target instance of {0} is no longer reachable")]
    TargetCollected(String),
}

impl WeaveError {
    pub fn definition(message: impl Into<String>) -> Self {
        WeaveError::Definition(message.into())
    }

    pub fn wrap(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        WeaveError::WrappedRuntime {
            context: context.into(),
            source: source.into(),
        }
    }

    /// True when the error originates in the dispatch machinery rather than in
    /// user advice or the advised operation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WeaveError::Thrown(_))
    }

    pub fn thrown(&self) -> Option<&Throwable> {
        match self {
            WeaveError::Thrown(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Throwable> for WeaveError {
    fn from(value: Throwable) -> Self {
        WeaveError::Thrown(value)
    }
}

pub type WeaveResult<T> = std::result::Result<T, WeaveError>;
