//! Connection state machine.
//!
//! Hierarchy:
//! ```text
//! Session (superstate: connect, disconnect)
//!     ├── Disconnected
//!     ├── Connecting { url }   ──load finished──▶ Connected { url }
//!     ├── Connected { url }    ──main-frame failure──▶ Error { url, message }
//!     └── Error { url, message } ──load finished──▶ Connected { url }
//! ```
//!
//! The target URL is state-local, so a URL exists exactly when the machine is
//! not `Disconnected`. Browser lifecycle events that do not apply to the
//! current state are swallowed by the superstate.

use statig::prelude::*;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Public state view
// ---------------------------------------------------------------------------

/// Externally visible connection status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No active session.
    #[default]
    Disconnected,
    /// Navigation requested, not yet confirmed loaded.
    Connecting,
    /// The browser surface finished loading the target URL.
    Connected,
    /// The last main-frame navigation failed.
    Error(String),
}

impl ConnectionState {
    /// Short status label, as shown in the top bar.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Not Connected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Error(_) => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events dispatched to the connection state machine.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// User asked to connect to `url`.
    Connect { url: String },
    /// User asked to disconnect.
    Disconnect,
    /// Browser began loading a page.
    LoadStarted,
    /// Browser finished loading a page.
    LoadFinished,
    /// Browser failed to load a resource.
    LoadFailed { main_frame: bool, description: String },
    /// Force a specific state, keeping the current URL.
    Force(ConnectionState),
}

// ---------------------------------------------------------------------------
// Shared storage
// ---------------------------------------------------------------------------

/// Shared storage for the connection state machine.
///
/// All per-connection data lives in the states themselves.
#[derive(Debug, Default)]
pub struct ConnectionMachine;

impl ConnectionMachine {
    /// Map a machine state onto the public view.
    pub fn view(state: &State) -> ConnectionState {
        match state {
            State::Disconnected {} => ConnectionState::Disconnected,
            State::Connecting { .. } => ConnectionState::Connecting,
            State::Connected { .. } => ConnectionState::Connected,
            State::Error { message, .. } => ConnectionState::Error(message.clone()),
        }
    }

    /// URL the session is pointed at; empty when disconnected.
    pub fn current_url(state: &State) -> &str {
        match state {
            State::Disconnected {} => "",
            State::Connecting { url } | State::Connected { url } | State::Error { url, .. } => url,
        }
    }

    fn forced(target: &ConnectionState, url: &str) -> State {
        match target {
            ConnectionState::Disconnected => State::disconnected(),
            ConnectionState::Connecting => State::connecting(url.to_string()),
            ConnectionState::Connected => State::connected(url.to_string()),
            ConnectionState::Error(message) => State::error(url.to_string(), message.clone()),
        }
    }

    fn transition(&self, next: State) -> Outcome<State> {
        info!(target: "session", state = ?next, "Connection state change");
        Transition(next)
    }
}

// ---------------------------------------------------------------------------
// State machine implementation
// ---------------------------------------------------------------------------

#[state_machine(
    initial = "State::disconnected()",
    state(derive(Debug, Clone, PartialEq, Eq))
)]
impl ConnectionMachine {
    /// Handles the user actions that apply from any state.
    #[superstate]
    fn session(&mut self, event: &ConnectionEvent) -> Outcome<State> {
        match event {
            ConnectionEvent::Connect { url } if !url.is_empty() => {
                self.transition(State::connecting(url.clone()))
            }
            ConnectionEvent::Connect { .. } => {
                debug!(target: "session", "Ignoring connect with empty URL");
                Handled
            }
            ConnectionEvent::Disconnect => self.transition(State::disconnected()),
            other => {
                debug!(target: "session", event = ?other, "Event ignored in current state");
                Handled
            }
        }
    }

    /// No session. Late browser events from an abandoned load land here and
    /// are ignored.
    #[state(superstate = "session")]
    fn disconnected(&mut self, event: &ConnectionEvent) -> Outcome<State> {
        match event {
            ConnectionEvent::Disconnect => Handled,
            // A forced state without a URL would break the URL invariant.
            ConnectionEvent::Force(_) => Handled,
            _ => Super,
        }
    }

    /// Waiting for the browser to report the outcome of loading `url`.
    #[state(superstate = "session")]
    fn connecting(&mut self, event: &ConnectionEvent, url: &String) -> Outcome<State> {
        match event {
            ConnectionEvent::LoadStarted => Handled,
            ConnectionEvent::LoadFinished => self.transition(State::connected(url.clone())),
            ConnectionEvent::LoadFailed {
                main_frame: true,
                description,
            } => self.transition(State::error(url.clone(), description.clone())),
            ConnectionEvent::LoadFailed { .. } => Handled,
            ConnectionEvent::Force(target) => self.transition(Self::forced(target, url)),
            _ => Super,
        }
    }

    /// `url` is loaded and displayed.
    #[state(superstate = "session")]
    fn connected(&mut self, event: &ConnectionEvent, url: &String) -> Outcome<State> {
        match event {
            // In-page navigation and reloads keep the session connected.
            ConnectionEvent::LoadStarted | ConnectionEvent::LoadFinished => Handled,
            ConnectionEvent::LoadFailed {
                main_frame: true,
                description,
            } => self.transition(State::error(url.clone(), description.clone())),
            ConnectionEvent::LoadFailed { .. } => Handled,
            ConnectionEvent::Force(target) => self.transition(Self::forced(target, url)),
            _ => Super,
        }
    }

    /// Loading `url` failed with `message`. A later main-frame failure
    /// replaces the message.
    #[state(superstate = "session")]
    fn error(&mut self, event: &ConnectionEvent, url: &String, message: &String) -> Outcome<State> {
        match event {
            ConnectionEvent::LoadFinished => self.transition(State::connected(url.clone())),
            ConnectionEvent::LoadFailed {
                main_frame: true,
                description,
            } if description != message => {
                self.transition(State::error(url.clone(), description.clone()))
            }
            ConnectionEvent::LoadStarted | ConnectionEvent::LoadFailed { .. } => Handled,
            ConnectionEvent::Force(target) => self.transition(Self::forced(target, url)),
            _ => Super,
        }
    }
}
