use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid time of day: {0} (expected HH:MM)")]
    InvalidTime(String),

    #[error("Invalid date key: {0} (expected YYYY-MM-DD)")]
    InvalidDateKey(String),
}
