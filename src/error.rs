use thiserror::Error;

/// Error taxonomy shared by the whole pipeline. Everything that crosses a
/// module boundary is normalized into an [`ApiError`] carrying one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    Http,
    Validation,
    Authentication,
    Authorization,
    NotFound,
    RateLimited,
    Business,
    Runtime,
    Unknown,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    /// HTTP status code, when the error originated from a response.
    pub status: Option<u16>,
    pub message: String,
    /// Set once a user-facing notification has been emitted for this error,
    /// so downstream layers do not notify a second time.
    pub notified: bool,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ApiError {
    fn new(kind: ErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            notified: false,
            source: None,
        }
    }

    pub fn network(source: reqwest::Error) -> Self {
        let mut err = Self::new(ErrorKind::Network, None, "Network request failed");
        err.source = Some(Box::new(source));
        err
    }

    pub fn timeout(source: reqwest::Error) -> Self {
        let mut err = Self::new(ErrorKind::Timeout, None, "Request timed out");
        err.source = Some(Box::new(source));
        err
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, Some(401), message)
    }

    pub fn business(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Business, None, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, None, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, None, message)
    }

    /// Classifies a transport-level failure from the HTTP client.
    pub fn from_transport(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(source)
        } else {
            Self::network(source)
        }
    }

    /// Classifies a non-success HTTP status. The server message, when the
    /// response envelope carried one, wins over the canned default.
    pub fn from_status(status: u16, server_message: Option<String>) -> Self {
        let (kind, default) = match status {
            400 => (ErrorKind::Validation, "Invalid request"),
            401 => (ErrorKind::Authentication, "Authentication required"),
            403 => (ErrorKind::Authorization, "Access denied"),
            404 => (ErrorKind::NotFound, "Resource not found"),
            422 => (ErrorKind::Validation, "Validation failed"),
            429 => (ErrorKind::RateLimited, "Too many requests"),
            500 | 502 | 503 | 504 => (ErrorKind::Http, "The server encountered an error"),
            _ => (ErrorKind::Unknown, "Unexpected response from server"),
        };
        let message = server_message.unwrap_or_else(|| default.to_string());
        Self::new(kind, Some(status), message)
    }

    /// Transport failures and 5xx responses may be reissued; 4xx never.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Network | ErrorKind::Timeout => true,
            ErrorKind::Http => self.status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }

    pub fn mark_notified(&mut self) {
        self.notified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_taxonomy() {
        let cases = [
            (400, ErrorKind::Validation),
            (401, ErrorKind::Authentication),
            (403, ErrorKind::Authorization),
            (404, ErrorKind::NotFound),
            (422, ErrorKind::Validation),
            (429, ErrorKind::RateLimited),
            (500, ErrorKind::Http),
            (502, ErrorKind::Http),
            (503, ErrorKind::Http),
            (504, ErrorKind::Http),
            (418, ErrorKind::Unknown),
        ];
        for (status, expected) in cases {
            let err = ApiError::from_status(status, None);
            assert_eq!(err.kind, expected, "status {status}");
            assert_eq!(err.status, Some(status));
        }
    }

    #[test]
    fn server_message_overrides_default() {
        let err = ApiError::from_status(422, Some("email is already taken".into()));
        assert_eq!(err.message, "email is already taken");
    }

    #[test]
    fn only_transport_and_5xx_are_retryable() {
        assert!(ApiError::from_status(500, None).is_retryable());
        assert!(ApiError::from_status(503, None).is_retryable());
        assert!(!ApiError::from_status(400, None).is_retryable());
        assert!(!ApiError::from_status(401, None).is_retryable());
        assert!(!ApiError::from_status(429, None).is_retryable());
        assert!(!ApiError::business("duplicate entry").is_retryable());
    }

    #[test]
    fn notified_flag_starts_clear() {
        let mut err = ApiError::from_status(500, None);
        assert!(!err.notified);
        err.mark_notified();
        assert!(err.notified);
    }
}
