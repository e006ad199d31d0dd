use thiserror::Error;

use super::message::RpcFailure;

#[derive(Error, Debug)]
pub enum KrpcError {
    #[error("Message too large: declared count {declared} exceeds bound {max}")]
    DecodeBoundsExceeded { declared: usize, max: usize },

    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("Encode inconsistency: {0}")]
    EncodeInconsistency(String),

    #[error("Message truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Not initialized")]
    NotInitialized,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Call rejected: {0}")]
    Rejected(RpcFailure),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KrpcError {
    /// Whether the error came out of the wire codec (as opposed to the
    /// transport or lifecycle layers).
    pub fn is_codec_error(&self) -> bool {
        matches!(
            self,
            KrpcError::DecodeBoundsExceeded { .. }
                | KrpcError::AllocationFailure(_)
                | KrpcError::EncodeInconsistency(_)
                | KrpcError::Truncated { .. }
        )
    }
}

impl From<std::collections::TryReserveError> for KrpcError {
    fn from(err: std::collections::TryReserveError) -> Self {
        KrpcError::AllocationFailure(err.to_string())
    }
}

impl From<std::net::AddrParseError> for KrpcError {
    fn from(err: std::net::AddrParseError) -> Self {
        KrpcError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KrpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_errors() {
        assert!(KrpcError::DecodeBoundsExceeded { declared: 65, max: 64 }.is_codec_error());
        assert!(KrpcError::Truncated { needed: 4, remaining: 0 }.is_codec_error());
        assert!(!KrpcError::NotInitialized.is_codec_error());
        assert!(!KrpcError::Rejected(RpcFailure::SystemError).is_codec_error());
    }

    #[test]
    fn test_try_reserve_maps_to_allocation_failure() {
        let err: KrpcError = Vec::<u64>::new().try_reserve(usize::MAX).unwrap_err().into();
        assert!(matches!(err, KrpcError::AllocationFailure(_)));
    }

    #[test]
    fn test_display() {
        let err = KrpcError::Rejected(RpcFailure::ProgMismatch { low: 1, high: 1 });
        assert_eq!(
            err.to_string(),
            "Call rejected: program version mismatch (supported 1..=1)"
        );
        let err: KrpcError = "not an address".parse::<std::net::IpAddr>().unwrap_err().into();
        assert!(matches!(err, KrpcError::Config(_)));
    }
}
