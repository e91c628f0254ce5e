//! The connection controller.
//!
//! A `Session` is the single owner of the connection state machine, the
//! browser host and the settings store. User actions arrive as method calls,
//! browser lifecycle events arrive through [`Session::handle_host_event`], and
//! everything observable is published on `watch` channels:
//!
//! - [`ConnectionSnapshot`]: connection state plus the current URL
//! - fullscreen flag
//! - settings (via the store)

use statig::blocking::StateMachine;
use statig::prelude::*;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::SettingsError;
use crate::host::{BrowserHost, HostEvent};
use crate::settings::{Settings, SettingsStore};
use crate::state_machine::connection_sm::{ConnectionEvent, ConnectionMachine, ConnectionState};
use crate::urls::Interface;

/// Connection state together with the URL it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// Empty exactly when `state` is `Disconnected`.
    pub current_url: String,
}

pub struct Session<H: BrowserHost> {
    machine: StateMachine<ConnectionMachine>,
    host: H,
    settings: SettingsStore,
    snapshot: watch::Sender<ConnectionSnapshot>,
    fullscreen: watch::Sender<bool>,
}

impl<H: BrowserHost> Session<H> {
    pub fn new(host: H, settings: SettingsStore) -> Self {
        let (snapshot, _rx) = watch::channel(ConnectionSnapshot::default());
        let (fullscreen, _rx) = watch::channel(false);
        Self {
            machine: ConnectionMachine::default().state_machine(),
            host,
            settings,
            snapshot,
            fullscreen,
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        ConnectionMachine::view(self.machine.state())
    }

    pub fn current_url(&self) -> &str {
        ConnectionMachine::current_url(self.machine.state())
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn is_fullscreen(&self) -> bool {
        *self.fullscreen.borrow()
    }

    pub fn subscribe_fullscreen(&self) -> watch::Receiver<bool> {
        self.fullscreen.subscribe()
    }

    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn settings_store_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    // -----------------------------------------------------------------------
    // URLs
    // -----------------------------------------------------------------------

    pub fn base_url(&self) -> String {
        self.settings.current().url_for(Interface::Root)
    }

    pub fn lab_url(&self) -> String {
        self.settings.current().url_for(Interface::Lab)
    }

    pub fn notebook_url(&self) -> String {
        self.settings.current().url_for(Interface::Notebook)
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    /// Connect to the server root. Returns immediately; the outcome arrives
    /// later as host events.
    pub fn connect(&mut self) {
        self.connect_to(Interface::Root);
    }

    /// Connect to a specific Jupyter front-end.
    pub fn connect_to(&mut self, interface: Interface) {
        let url = self.settings.current().url_for(interface);
        if url.is_empty() {
            warn!(target: "session", "No server URL configured; not connecting");
            return;
        }
        info!(target: "session", url = %url, interface = interface.label(), "Connecting");
        self.dispatch(ConnectionEvent::Connect { url: url.clone() });
        self.host.load_url(&url);
    }

    /// Open JupyterLab: pre-set `Connecting`, then navigate to `/lab`.
    pub fn open_lab(&mut self) {
        self.set_connection_state(ConnectionState::Connecting);
        self.connect_to(Interface::Lab);
    }

    /// Open the classic notebook tree: pre-set `Connecting`, then navigate
    /// to `/tree`.
    pub fn open_notebook(&mut self) {
        self.set_connection_state(ConnectionState::Connecting);
        self.connect_to(Interface::Notebook);
    }

    /// Reset to `Disconnected`. An in-flight load is not cancelled; its late
    /// events are ignored.
    pub fn disconnect(&mut self) {
        info!(target: "session", "Disconnecting");
        self.dispatch(ConnectionEvent::Disconnect);
    }

    /// Force `state`, keeping the current URL. Ignored while disconnected
    /// unless `state` is `Disconnected`, since there is no URL to keep.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.dispatch(ConnectionEvent::Force(state));
    }

    /// Flip the fullscreen flag and return the new value.
    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen.send_modify(|on| *on = !*on);
        let on = self.is_fullscreen();
        debug!(target: "session", fullscreen = on, "Fullscreen toggled");
        on
    }

    /// Persist a new server URL. On failure the previous value stays active.
    pub async fn update_server_url(&self, url: &str) -> Result<(), SettingsError> {
        self.settings.save_server_url(url).await.inspect_err(|e| {
            warn!(target: "session", "Failed to save server URL: {e}");
        })
    }

    /// Persist a new token. On failure the previous value stays active.
    pub async fn update_token(&self, token: &str) -> Result<(), SettingsError> {
        self.settings.save_token(token).await.inspect_err(|e| {
            warn!(target: "session", "Failed to save token: {e}");
        })
    }

    // -----------------------------------------------------------------------
    // Browser
    // -----------------------------------------------------------------------

    /// Feed a lifecycle event reported by the browser host.
    pub fn handle_host_event(&mut self, event: HostEvent) {
        debug!(target: "session", url = %event.url(), ?event, "Host event");
        self.dispatch(event.into());
    }

    pub fn can_go_back(&self) -> bool {
        self.host.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.host.can_go_forward()
    }

    pub fn go_back(&mut self) {
        self.host.go_back();
    }

    pub fn go_forward(&mut self) {
        self.host.go_forward();
    }

    pub fn reload(&mut self) {
        self.host.reload();
    }

    fn dispatch(&mut self, event: ConnectionEvent) {
        self.machine.handle(&event);
        let next = ConnectionSnapshot {
            state: self.state(),
            current_url: self.current_url().to_string(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
