use std::error::Error;
use std::sync::Arc;

use tracing::error;

use crate::error::{ApiError, ErrorKind};
use crate::notify::{routes, Navigator, Notifier, Severity};

/// Last-resort handler for errors that escaped the pipeline. Classified
/// API errors pass through with their own kind; anything else is bucketed
/// by message keywords so the user still gets a sensible notification.
pub struct FallbackHandler {
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl FallbackHandler {
    pub fn new(notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Self {
        Self { notifier, navigator }
    }

    pub fn handle(&self, err: &(dyn Error + 'static)) {
        let (kind, message) = match err.downcast_ref::<ApiError>() {
            Some(api_err) => {
                if api_err.notified {
                    // the pipeline already told the user; just log
                    error!(kind = ?api_err.kind, "unhandled error (already notified): {}", api_err.message);
                    return;
                }
                (api_err.kind, api_err.message.clone())
            }
            None => {
                let message = err.to_string();
                (Self::classify(&message), message)
            }
        };

        error!(?kind, "unhandled error: {message}");

        match kind {
            ErrorKind::Network | ErrorKind::Timeout => {
                self.notifier.notify(
                    Severity::Warning,
                    "Connection problem. Check your network and try again.",
                );
            }
            ErrorKind::Authentication => {
                self.notifier
                    .notify(Severity::Critical, "Your session has expired. Please sign in again.");
                self.navigator.navigate(routes::LOGIN);
            }
            ErrorKind::Runtime => {
                self.notifier
                    .notify(Severity::Critical, "Something went wrong. Please reload and retry.");
            }
            _ => {
                self.notifier.notify(Severity::Error, &message);
            }
        }
    }

    /// Keyword bucketing for errors that never went through the pipeline.
    fn classify(message: &str) -> ErrorKind {
        let lower = message.to_lowercase();
        if ["network", "connection", "dns", "timeout"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            ErrorKind::Network
        } else if ["unauthorized", "token", "session"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            ErrorKind::Authentication
        } else if ["reference", "type", "syntax", "parse"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            ErrorKind::Runtime
        } else {
            ErrorKind::Unknown
        }
    }
}
