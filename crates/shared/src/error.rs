use thiserror::Error;

/// Failure taxonomy for every mutating operation the console issues.
///
/// `Validation` means the request was rejected locally and never sent.
/// `RemoteRejected` carries a non-success HTTP status plus the message
/// derived from the server's error body. `Transport` covers network and
/// body-decoding failures where no server verdict exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("{0}")]
    Validation(String),
    #[error("server rejected the request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },
    #[error("could not reach the server: {0}")]
    Transport(String),
}

impl OperationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// True when the request was stopped before any network traffic.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
