use alloy_primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Head subscription closed")]
    SubscriptionClosed,

    #[error("Event decode error: {0}")]
    EventDecode(String),

    #[error("Pool not found: {0}")]
    PoolNotFound(Address),

    #[error("Quote error: {0}")]
    Quote(String),

    #[error("Submission rejected: {0}")]
    Submission(String),

    #[error("Gas cost exceeds profit")]
    GasTooHigh,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Whether the error should restart the run loop (re-bootstrap and
    /// re-subscribe) instead of aborting the process. Only connection resets
    /// and i/o timeouts on the head subscription qualify; everything else is
    /// fatal unless caught at a narrower boundary.
    pub fn is_recoverable(&self) -> bool {
        match self {
            BotError::SubscriptionClosed => true,
            BotError::WebSocket(msg) | BotError::Rpc(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("connection reset")
                    || msg.contains("i/o timeout")
                    || msg.contains("timed out")
                    || msg.contains("broken pipe")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_reset_is_recoverable() {
        let err = BotError::WebSocket("read: connection reset by peer".into());
        assert!(err.is_recoverable());
        let err = BotError::WebSocket("i/o timeout".into());
        assert!(err.is_recoverable());
    }

    #[test]
    fn other_errors_are_fatal() {
        assert!(!BotError::MissingEnvVar("RPC_URL".into()).is_recoverable());
        assert!(!BotError::Rpc("invalid argument".into()).is_recoverable());
        assert!(!BotError::GasTooHigh.is_recoverable());
    }
}
