use thiserror::Error;

/**
 * \brief SDK 统一错误类型。
 */
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid duration string: {0:?}")]
    InvalidDuration(String),

    #[error("nlp backend error: {0}")]
    Nlp(String),

    #[error("unknown category label: {0}")]
    UnknownCategory(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
