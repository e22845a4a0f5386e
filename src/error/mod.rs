use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("pipeline error: {context}")]
    Pipeline { context: &'static str },

    #[error("upstream failure: {message}")]
    Upstream { message: String },

    #[error("invalid demand: request({requested}) must be positive")]
    InvalidDemand { requested: u64 },

    #[error("stage `{stage}` exhausted retries after {attempts} attempts: {source}")]
    RetryExhausted {
        stage: &'static str,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn pipeline(context: &'static str) -> Self {
        Self::Pipeline { context }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn invalid_demand(requested: u64) -> Self {
        Self::InvalidDemand { requested }
    }

    pub fn retry_exhausted(stage: &'static str, attempts: u32, source: Error) -> Self {
        Self::RetryExhausted {
            stage,
            attempts,
            source: Box::new(source),
        }
    }

    pub fn stage_source(stage: &'static str, source: Error) -> Self {
        Self::Stage {
            stage,
            source: Box::new(source),
        }
    }
}
