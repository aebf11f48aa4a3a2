use thiserror::Error;

/// The SHE command error codes a handler can return. `GeneralError` is also
/// the catch-all the dispatcher normalizes any other failure into, mirroring
/// the original dispatcher's final `if` that collapses every return code
/// outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SheError {
    #[error("sequence error")]
    SequenceError,
    #[error("key not available")]
    KeyNotAvailable,
    #[error("key invalid")]
    KeyInvalid,
    #[error("key empty")]
    KeyEmpty,
    #[error("no secure boot configured")]
    NoSecureBoot,
    #[error("key is write protected")]
    WriteProtected,
    #[error("key update error")]
    KeyUpdateError,
    #[error("rng not seeded")]
    RngSeed,
    #[error("debugging not permitted")]
    NoDebugging,
    #[error("busy")]
    Busy,
    #[error("memory failure")]
    MemoryFailure,
    #[error("general error")]
    GeneralError,
    #[error("invalid arguments")]
    BadArgs,
}

impl SheError {
    /// Collapse any error outside the named SHE error-code set to
    /// `GeneralError`, the same normalization the dispatcher performs before
    /// writing `rc` back to the caller.
    pub(crate) fn normalize(self) -> Self {
        match self {
            Self::BadArgs => Self::GeneralError,
            other => other,
        }
    }
}
