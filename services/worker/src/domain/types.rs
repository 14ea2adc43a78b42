/// How one queue delivery was resolved. Drives the consumer's ack decision:
/// everything except `RetryLater` and `SkippedLockHeld` deletes the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Terminal outcome recorded (authorized, denied, voided, or dropped).
    Completed,
    /// Another worker holds the lock; leave the message for redelivery.
    SkippedLockHeld,
    /// A void arrived before processing; the request expired unprocessed.
    SkippedVoidDetected,
    /// Duplicate delivery after a terminal event; discarded without effect.
    SkippedAlreadyTerminal,
    /// Retryable failure recorded; the queue's visibility timeout redelivers.
    RetryLater,
    /// Non-retryable failure recorded; read model is FAILED.
    TerminalFailure,
}

/// Terminal-vs-retryable classification of a token decrypt failure.
#[derive(Debug, thiserror::Error)]
pub enum TokenDecryptError {
    #[error("token not found")]
    NotFound,
    #[error("token expired")]
    Expired,
    #[error("decrypt forbidden")]
    Forbidden,
    /// Token service unreachable or overloaded; retryable.
    #[error("token service unavailable: {0}")]
    Unavailable(String),
}

impl TokenDecryptError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound => "TOKEN_NOT_FOUND",
            Self::Expired => "TOKEN_EXPIRED",
            Self::Forbidden => "TOKEN_FORBIDDEN",
            Self::Unavailable(_) => "TOKEN_SERVICE_UNAVAILABLE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
