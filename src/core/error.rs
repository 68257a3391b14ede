use std::error::Error as StdError;
use thiserror::Error;

pub type GovernorResult<T> = Result<T, GovernorError>;

#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("pacer driver '{name}' is no longer running")]
    PacerStopped { name: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl GovernorError {
    pub fn pacer_stopped(name: impl Into<String>) -> Self {
        Self::PacerStopped { name: name.into() }
    }

    pub fn with_context(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        GovernorError::Context {
            context: context.into(),
            source: source.into().into(),
        }
    }
}
