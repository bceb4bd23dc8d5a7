pub mod codegen;
pub mod intent;
pub mod jobs;
pub mod orchestrator;
pub mod prompts;
pub mod router;
pub mod shape;

/// Failure taxonomy for the generation pipeline. HTTP mapping lives in the
/// API layer; persistence failures on the generate path are swallowed
/// before they become one of these.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("{0}")]
    InvalidArgument(&'static str),
    #[error("model not found")]
    NotFound,
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("generation pipeline produced no output")]
    GenerationFailed,
    #[error("database error: {0}")]
    Db(String),
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        GenError::Upstream(e.to_string())
    }
}
