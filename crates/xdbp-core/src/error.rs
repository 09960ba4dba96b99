use thiserror::Error;

pub type XdbpResult<T> = Result<T, XdbpError>;

#[derive(Debug, Error)]
pub enum XdbpError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
