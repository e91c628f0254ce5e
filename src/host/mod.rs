//! Embedded browser host.
//!
//! The session never reaches into a browser's internals. It asks the host to
//! navigate, and the host reports the outcome asynchronously as
//! [`HostEvent`]s over an unbounded channel. Implementations own their own
//! history stack and apply the mobile stylesheet to pages that finish loading.

pub mod history;
pub mod http;
pub mod styles;

use tokio::sync::mpsc;

use crate::state_machine::connection_sm::ConnectionEvent;

// ---------------------------------------------------------------------------
// Shared types used across submodules
// ---------------------------------------------------------------------------

/// Lifecycle notifications emitted by a browser host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Navigation to `url` began.
    LoadStarted { url: String },
    /// `url` finished loading and the page is on screen.
    LoadFinished { url: String },
    /// A request failed. `main_frame` is false for sub-resources.
    LoadFailed {
        url: String,
        main_frame: bool,
        description: String,
    },
}

impl HostEvent {
    pub fn url(&self) -> &str {
        match self {
            HostEvent::LoadStarted { url }
            | HostEvent::LoadFinished { url }
            | HostEvent::LoadFailed { url, .. } => url,
        }
    }
}

impl From<HostEvent> for ConnectionEvent {
    fn from(event: HostEvent) -> Self {
        match event {
            HostEvent::LoadStarted { .. } => ConnectionEvent::LoadStarted,
            HostEvent::LoadFinished { .. } => ConnectionEvent::LoadFinished,
            HostEvent::LoadFailed {
                main_frame,
                description,
                ..
            } => ConnectionEvent::LoadFailed {
                main_frame,
                description,
            },
        }
    }
}

pub type HostEventSender = mpsc::UnboundedSender<HostEvent>;
pub type HostEventReceiver = mpsc::UnboundedReceiver<HostEvent>;

/// Create the channel a host reports its lifecycle events on.
pub fn event_channel() -> (HostEventSender, HostEventReceiver) {
    mpsc::unbounded_channel()
}

/// A web-rendering surface the session can drive.
pub trait BrowserHost {
    /// Begin navigating to `url`. Does nothing when `url` is empty.
    fn load_url(&mut self, url: &str);

    fn can_go_back(&self) -> bool;

    fn can_go_forward(&self) -> bool;

    fn go_back(&mut self);

    fn go_forward(&mut self);

    /// Load the current history entry again.
    fn reload(&mut self);
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use history::History;
pub use http::{DEFAULT_MAX_PAGE_BYTES, HttpHost, HttpHostConfig, Page};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_url_and_maps_to_connection_event() {
        let event = HostEvent::LoadFailed {
            url: "http://h/lab".into(),
            main_frame: true,
            description: "refused".into(),
        };
        assert_eq!(event.url(), "http://h/lab");
        assert!(matches!(
            ConnectionEvent::from(event),
            ConnectionEvent::LoadFailed { main_frame: true, ref description } if description == "refused"
        ));
        assert_eq!(
            HostEvent::LoadStarted { url: "http://h".into() }.url(),
            "http://h"
        );
    }
}
