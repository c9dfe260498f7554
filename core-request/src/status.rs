//! Status-message table shared by the status and business checks.

use crate::error::ErrorCode;

/// Human-readable message for an HTTP status, a synthetic client code, or a
/// string error code.
pub fn status_message(code: &ErrorCode) -> Option<&'static str> {
    let message = match code {
        ErrorCode::Numeric(20) => "Request timed out, please check your network.",
        ErrorCode::Numeric(200) => "The server returned the requested data.",
        ErrorCode::Numeric(201) => "Data created or updated.",
        ErrorCode::Numeric(202) => "The request has been queued for background processing.",
        ErrorCode::Numeric(204) => "Data deleted.",
        ErrorCode::Numeric(400) => "The request was malformed and the server could not process it.",
        ErrorCode::Numeric(401) => "Not authorized (invalid token, username or password).",
        ErrorCode::Numeric(403) => "Authenticated, but access is forbidden.",
        ErrorCode::Numeric(404) => "The requested endpoint does not exist.",
        ErrorCode::Numeric(406) => "The requested format is not available.",
        ErrorCode::Numeric(410) => "The requested resource was permanently deleted.",
        ErrorCode::Numeric(415) => "Unsupported request method or media type.",
        ErrorCode::Numeric(422) => "A validation error occurred while creating an object.",
        ErrorCode::Numeric(500) => "Internal server error, please check the server.",
        ErrorCode::Numeric(502) => "Bad gateway.",
        ErrorCode::Numeric(503) => "Service unavailable, the server is overloaded or under maintenance.",
        ErrorCode::Numeric(504) => "The service timed out, please try again later.",
        ErrorCode::Transitional | ErrorCode::Network => "Network error, please check your network.",
        ErrorCode::Canceled => "Request timed out, please try again later.",
        _ => return None,
    };
    Some(message)
}

/// Convenience lookup for a numeric HTTP status.
pub fn http_status_message(status: u16) -> Option<&'static str> {
    status_message(&ErrorCode::Numeric(i64::from(status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_known_codes() {
        for status in [200, 201, 202, 204, 400, 401, 403, 404, 406, 410, 415, 422, 500, 502, 503, 504] {
            assert!(http_status_message(status).is_some(), "missing {status}");
        }
        assert!(status_message(&ErrorCode::TIMEOUT).is_some());
        assert!(status_message(&ErrorCode::Transitional).is_some());
        assert!(status_message(&ErrorCode::Canceled).is_some());
    }

    #[test]
    fn test_unknown_codes_have_no_message() {
        assert_eq!(http_status_message(418), None);
        assert_eq!(status_message(&ErrorCode::InvalidUrl), None);
    }
}
