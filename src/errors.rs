use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("{0} is not set")]
    MissingSetting(&'static str),

    #[error("Neo4j error: {0}")]
    Neo4j(String),

    #[error("vector index '{0}' does not exist in the database")]
    IndexNotFound(String),

    #[error(
        "embedding dimension {actual} does not match index '{index}' dimension {expected}"
    )]
    DimensionMismatch {
        index: String,
        expected: usize,
        actual: usize,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Question cannot be empty")]
    EmptyQuestion,
}

impl From<neo4rs::Error> for QaError {
    fn from(e: neo4rs::Error) -> Self {
        QaError::Neo4j(e.to_string())
    }
}

pub type QaResult<T> = Result<T, QaError>;
