use std::time::Duration;

use thiserror::Error;

/// Failure reading rows from the remote inventory source.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("inventory source rejected credentials: {0}")]
    Unauthorized(String),
    #[error("inventory range not found: {0}")]
    RangeNotFound(String),
    #[error("inventory source returned status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("inventory source transport failure: {0}")]
    Transport(String),
    #[error("inventory source response could not be decoded: {0}")]
    Decode(String),
    #[error("inventory fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Stable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::RangeNotFound(_) => "range_not_found",
            Self::Status { .. } => "status",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Timeout(_) => "timeout",
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized(_) | Self::RangeNotFound(_) | Self::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::errors::FetchError;

    #[test]
    fn server_side_and_network_failures_are_transient() {
        assert!(FetchError::Transport("connection reset".to_owned()).is_transient());
        assert!(FetchError::Timeout(Duration::from_secs(10)).is_transient());
        assert!(FetchError::Status { status: 503, detail: "unavailable".to_owned() }
            .is_transient());
        assert!(FetchError::Status { status: 429, detail: "quota".to_owned() }.is_transient());
    }

    #[test]
    fn configuration_failures_are_not_transient() {
        assert!(!FetchError::Unauthorized("bad key".to_owned()).is_transient());
        assert!(!FetchError::RangeNotFound("Sheet9!A:C".to_owned()).is_transient());
        assert!(!FetchError::Status { status: 400, detail: "bad".to_owned() }.is_transient());
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(FetchError::Decode("eof".to_owned()).kind(), "decode");
        assert_eq!(FetchError::Timeout(Duration::from_secs(1)).kind(), "timeout");
    }
}
