use thiserror::Error;

use crate::http::RawResponse;

/// Coarse classification of a rejected status, mirroring the categories an
/// HTTP-client style transport attaches to its errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    /// 4xx
    BadRequest,
    /// Everything else that failed validation
    BadResponse,
}

impl StatusCategory {
    pub fn from_status(status: u16) -> Self {
        if (400..500).contains(&status) {
            Self::BadRequest
        } else {
            Self::BadResponse
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "ERR_BAD_REQUEST",
            Self::BadResponse => "ERR_BAD_RESPONSE",
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request aborted")]
    Aborted,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed with status code {status}")]
    BadStatus {
        status: u16,
        category: StatusCategory,
        response: Box<RawResponse>,
    },

    #[error("Response stream unavailable: {0}")]
    StreamUnavailable(String),
}

impl BridgeError {
    /// Builds a `BadStatus` error, deriving the category from the status.
    pub fn bad_status(response: RawResponse) -> Self {
        Self::BadStatus {
            status: response.status,
            category: StatusCategory::from_status(response.status),
            response: Box::new(response),
        }
    }

    /// True for errors raised because the request was cancelled or ran out
    /// of time.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted | Self::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
