use thiserror::Error;

pub type PipeResult<T> = Result<T, PipeError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipeError {
    #[error("closed pipe")]
    Closed,
}
