//! jupyter-mobile: a thin client for a remote Jupyter server.
//!
//! The client keeps three pieces of local state: the persisted server
//! settings, the connection state driven by browser lifecycle events, and a
//! fullscreen flag. The browser itself sits behind the [`host::BrowserHost`]
//! trait; [`host::HttpHost`] is a headless implementation built on `reqwest`.

pub mod error;
pub mod host;
pub mod logging;
pub mod paths;
pub mod session;
pub mod settings;
pub mod shell;
pub mod state_machine;
pub mod urls;

pub use error::SettingsError;
pub use session::{ConnectionSnapshot, Session};
pub use settings::{DEFAULT_SERVER_URL, Settings, SettingsStore};
pub use state_machine::connection_sm::ConnectionState;
pub use urls::{Interface, build_base_url, build_lab_url, build_notebook_url};
