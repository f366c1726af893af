//! One-way sinks the session layer uses to move the user and to surface messages.
//!
//! Nothing here reads navigation state back; the caller decides how a route
//! becomes a page (an HTTP redirect in the front end, a recorded value in tests).

use std::sync::Mutex;

use crate::models::RouteTarget;

/// A user-visible error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
}

impl Toast {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait Navigator: Send + Sync {
    fn route_to(&self, target: RouteTarget);
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Navigator that remembers every route it was asked to take.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<RouteTarget>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<RouteTarget> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// The most recent route, which is the one a page transition should follow.
    pub fn last(&self) -> Option<RouteTarget> {
        self.routes.lock().ok().and_then(|r| r.last().copied())
    }
}

impl Navigator for RecordingNavigator {
    fn route_to(&self, target: RouteTarget) {
        tracing::debug!(route = %target.path(), "route requested");
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(target);
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.toasts.lock().map(|t| t.len()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }
}
