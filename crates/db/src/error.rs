use ses_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to determine state directory")]
    NoStateDir,

    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Sqlx(_) => ErrorKind::Storage,
            StoreError::NoStateDir => ErrorKind::Configuration,
            StoreError::CreateDir(_) => ErrorKind::Storage,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
