use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeystoreError {
    #[error("key object not found")]
    NotFound,
    #[error("keystore io error: {0}")]
    Io(String),
}
