use std::sync::Mutex;

use tracing::{debug, error, info, warn};

/// Navigation targets the pipeline and guards redirect to.
pub mod routes {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const ACCESS_DENIED: &str = "/access-denied";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// User-facing notification sink. The host application decides rendering;
/// the pipeline only decides what is worth telling the user about.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Default sink: forwards notifications to the log stream.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(target: "hrm_client::notify", "{message}"),
            Severity::Warning => warn!(target: "hrm_client::notify", "{message}"),
            Severity::Error | Severity::Critical => {
                error!(target: "hrm_client::notify", "{message}")
            }
        }
    }
}

/// Navigation sink. The host wires this to whatever owns the view state.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, path: &str) {
        debug!(target: "hrm_client::notify", %path, "navigation requested");
    }
}

/// Recording double for tests and headless hosts.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(Severity, String)> {
        self.events.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.events
            .lock()
            .expect("notifier lock")
            .push((severity, message.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().expect("navigator lock").clone()
    }

    pub fn last_visit(&self) -> Option<String> {
        self.visits.lock().expect("navigator lock").last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.visits
            .lock()
            .expect("navigator lock")
            .push(path.to_string());
    }
}
