//! Interactive command shell for driving a session from a terminal.
//!
//! Commands: connect, retry, disconnect, lab, notebook, back, forward,
//! reload, fullscreen, status, urls, settings, set-url, set-token, page,
//! help, quit.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::host::{BrowserHost, HostEventReceiver, Page};
use crate::session::{ConnectionSnapshot, Session};
use crate::state_machine::connection_sm::ConnectionState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Output line styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Info,
    Success,
    Error,
    Value,
}

pub struct Shell<H: BrowserHost> {
    session: Session<H>,
    page: Option<watch::Receiver<Option<Page>>>,
    output: Vec<(String, OutputKind)>,
    running: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl<H: BrowserHost> Shell<H> {
    pub fn new(session: Session<H>, page: Option<watch::Receiver<Option<Page>>>) -> Self {
        Self {
            session,
            page,
            output: vec![("Jupyter Mobile: type `help` for commands".into(), OutputKind::Info)],
            running: true,
        }
    }

    pub fn session(&self) -> &Session<H> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<H> {
        &mut self.session
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Take all output produced since the last call.
    pub fn drain_output(&mut self) -> Vec<(String, OutputKind)> {
        std::mem::take(&mut self.output)
    }

    /// Run one command line.
    pub async fn execute(&mut self, line: &str) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return;
        }

        match parts[0] {
            "help" | "?" => self.cmd_help(),
            "quit" | "exit" => self.running = false,
            "status" => self.push_status(),
            "connect" | "retry" => {
                self.session.connect();
                self.push_status();
            }
            "disconnect" => {
                self.session.disconnect();
                self.push_status();
            }
            "lab" => {
                self.session.open_lab();
                self.push_status();
            }
            "notebook" => {
                self.session.open_notebook();
                self.push_status();
            }
            "back" => {
                if self.session.can_go_back() {
                    self.session.go_back();
                } else {
                    self.push_error("Nothing to go back to");
                }
            }
            "forward" => {
                if self.session.can_go_forward() {
                    self.session.go_forward();
                } else {
                    self.push_error("Nothing to go forward to");
                }
            }
            "reload" => self.session.reload(),
            "fullscreen" => {
                let on = self.session.toggle_fullscreen();
                self.push(format!("Fullscreen {}", if on { "on" } else { "off" }), OutputKind::Info);
            }
            "urls" => self.cmd_urls(),
            "settings" => self.cmd_settings(),
            "set-url" => {
                if parts.len() < 2 {
                    self.push_error("Usage: set-url <url>");
                } else {
                    self.cmd_set_url(parts[1]).await;
                }
            }
            "set-token" => self.cmd_set_token(parts.get(1).copied().unwrap_or("")).await,
            "page" => self.cmd_page(),
            other => self.push_error(&format!("Unknown command: {other} (try `help`)")),
        }
    }

    /// Feed a browser event and report the resulting state when it changed.
    pub fn on_host_event(&mut self, event: crate::host::HostEvent) {
        let before = self.session.snapshot();
        self.session.handle_host_event(event);
        if self.session.snapshot() != before {
            self.push_status();
        }
    }

    /// Render the status block for the current connection state.
    pub fn push_status(&mut self) {
        let ConnectionSnapshot { state, current_url } = self.session.snapshot();
        let kind = match state {
            ConnectionState::Connected => OutputKind::Success,
            ConnectionState::Error(_) => OutputKind::Error,
            _ => OutputKind::Info,
        };
        self.push(format!("[{}]", state.label()), kind);
        match state {
            ConnectionState::Disconnected => {
                self.push("Connect to your Jupyter server to get started (`connect`)".into(), OutputKind::Value);
            }
            ConnectionState::Connecting => {
                self.push(format!("Connecting to Jupyter at {current_url}"), OutputKind::Value);
            }
            ConnectionState::Connected => {
                self.push(format!("Showing {current_url}"), OutputKind::Value);
            }
            ConnectionState::Error(message) => {
                self.push(format!("Connection Failed: {message}"), OutputKind::Error);
                self.push("Type `retry` to try again or `settings` to review the server".into(), OutputKind::Value);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn cmd_help(&mut self) {
        let lines = [
            ("connect | retry", "Connect to the configured server"),
            ("disconnect", "Drop the current session"),
            ("lab", "Open JupyterLab (/lab)"),
            ("notebook", "Open the notebook tree (/tree)"),
            ("back | forward | reload", "Browser history navigation"),
            ("fullscreen", "Toggle fullscreen"),
            ("status", "Show connection status"),
            ("urls", "Show root, lab and notebook URLs"),
            ("settings", "Show saved settings"),
            ("set-url <url>", "Save the server URL"),
            ("set-token [token]", "Save the token (empty clears it)"),
            ("page", "Describe the loaded page"),
            ("quit", "Leave the shell"),
        ];
        self.push("Commands:".into(), OutputKind::Info);
        for (cmd, desc) in lines {
            self.push(format!("  {:<26} {}", cmd, desc), OutputKind::Value);
        }
    }

    fn cmd_urls(&mut self) {
        let urls = [
            ("root", self.session.base_url()),
            ("lab", self.session.lab_url()),
            ("notebook", self.session.notebook_url()),
        ];
        for (name, url) in urls {
            self.push(format!("{name:<9} {url}"), OutputKind::Value);
        }
    }

    fn cmd_settings(&mut self) {
        let settings = self.session.settings();
        let path = self.session.settings_store().path().display().to_string();
        self.push(format!("file       {path}"), OutputKind::Info);
        self.push(format!("server_url {}", settings.server_url), OutputKind::Value);
        self.push(format!("token      {}", mask_token(&settings.token)), OutputKind::Value);
    }

    async fn cmd_set_url(&mut self, url: &str) {
        match self.session.update_server_url(url).await {
            Ok(()) => self.push(format!("Server URL saved: {url}"), OutputKind::Success),
            Err(e) => self.push_error(&format!("Could not save server URL: {e}")),
        }
    }

    async fn cmd_set_token(&mut self, token: &str) {
        match self.session.update_token(token).await {
            Ok(()) if token.is_empty() => self.push("Token cleared".into(), OutputKind::Success),
            Ok(()) => self.push("Token saved".into(), OutputKind::Success),
            Err(e) => self.push_error(&format!("Could not save token: {e}")),
        }
    }

    fn cmd_page(&mut self) {
        let page = self.page.as_ref().and_then(|rx| rx.borrow().clone());
        match page {
            Some(page) => {
                let title = page.title().unwrap_or("(untitled)").to_string();
                self.push(format!("{title}  [{}]", page.status), OutputKind::Value);
                self.push(
                    format!(
                        "{}  {} bytes, fetched {}",
                        page.url,
                        page.html.len(),
                        page.fetched_at.format("%H:%M:%S")
                    ),
                    OutputKind::Info,
                );
            }
            None => self.push("No page loaded".into(), OutputKind::Info),
        }
    }

    // -----------------------------------------------------------------------
    // Output helpers
    // -----------------------------------------------------------------------

    fn push(&mut self, line: String, kind: OutputKind) {
        self.output.push((line, kind));
    }

    fn push_error(&mut self, msg: &str) {
        self.output.push((msg.to_string(), OutputKind::Error));
    }
}

/// Show whether a token is set without echoing it.
fn mask_token(token: &str) -> String {
    if token.is_empty() {
        "(none)".into()
    } else {
        let tail: String = token.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("****{tail} ({} chars)", token.chars().count())
    }
}

// ---------------------------------------------------------------------------
// Terminal loop
// ---------------------------------------------------------------------------

/// Read commands from stdin and browser events from `events` until `quit`
/// or end of input.
pub async fn run<H: BrowserHost>(shell: &mut Shell<H>, mut events: HostEventReceiver) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut settings_rx = shell.session.settings_store().load();
    settings_rx.mark_unchanged();

    print_output(shell);
    while shell.is_running() {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        debug!(target: "shell", command = %line.trim(), "Command");
                        shell.execute(&line).await;
                    }
                    None => break,
                }
            }

            Some(event) = events.recv() => {
                shell.on_host_event(event);
            }

            Ok(()) = settings_rx.changed() => {
                let settings = settings_rx.borrow_and_update().clone();
                info!(target: "shell", server_url = %settings.server_url, "Settings changed");
                shell.push(format!("Settings updated: server_url = {}", settings.server_url), OutputKind::Info);
            }
        }
        print_output(shell);
    }
    Ok(())
}

fn print_output<H: BrowserHost>(shell: &mut Shell<H>) {
    for (line, kind) in shell.drain_output() {
        match kind {
            OutputKind::Error => eprintln!("! {line}"),
            OutputKind::Success => println!("+ {line}"),
            OutputKind::Value => println!("  {line}"),
            OutputKind::Info => println!("{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostEvent;
    use crate::settings::SettingsStore;

    #[derive(Default)]
    struct NullHost {
        loads: Vec<String>,
    }

    impl BrowserHost for NullHost {
        fn load_url(&mut self, url: &str) {
            self.loads.push(url.to_string());
        }
        fn can_go_back(&self) -> bool {
            false
        }
        fn can_go_forward(&self) -> bool {
            false
        }
        fn go_back(&mut self) {}
        fn go_forward(&mut self) {}
        fn reload(&mut self) {}
    }

    async fn shell(dir: &tempfile::TempDir) -> Shell<NullHost> {
        let store = SettingsStore::open(dir.path().join("settings.toml"))
            .await
            .unwrap();
        let mut shell = Shell::new(Session::new(NullHost::default(), store), None);
        shell.drain_output();
        shell
    }

    fn text(output: &[(String, OutputKind)]) -> String {
        output
            .iter()
            .map(|(line, _)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;
        shell.execute("help").await;
        let out = text(&shell.drain_output());
        assert!(out.contains("set-url"));
        assert!(out.contains("notebook"));
    }

    #[tokio::test]
    async fn set_url_and_token_update_urls() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;
        shell.execute("set-url http://10.0.2.2:8888/").await;
        shell.execute("set-token xyz").await;
        shell.drain_output();

        shell.execute("urls").await;
        let out = text(&shell.drain_output());
        assert!(out.contains("http://10.0.2.2:8888?token=xyz"));
        assert!(out.contains("http://10.0.2.2:8888/lab?token=xyz"));
        assert!(out.contains("http://10.0.2.2:8888/tree?token=xyz"));
    }

    #[tokio::test]
    async fn settings_masks_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;
        shell.execute("set-token supersecret").await;
        shell.execute("settings").await;
        let out = text(&shell.drain_output());
        assert!(!out.contains("supersecret"));
        assert!(out.contains("****cret (11 chars)"));

        shell.execute("set-token").await;
        assert_eq!(shell.session().settings().token, "");
    }

    #[tokio::test]
    async fn connect_and_failure_render_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;
        shell.execute("connect").await;
        assert_eq!(shell.session().state(), ConnectionState::Connecting);

        shell.on_host_event(HostEvent::LoadFailed {
            url: "http://localhost:8888".into(),
            main_frame: true,
            description: "Could not connect to server".into(),
        });
        let output = shell.drain_output();
        assert!(output.iter().any(|(l, k)| *k == OutputKind::Error
            && l == "Connection Failed: Could not connect to server"));

        shell.execute("retry").await;
        assert_eq!(shell.session().host().loads.len(), 2);
    }

    #[tokio::test]
    async fn user_actions_report_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;

        shell.execute("connect").await;
        let out = text(&shell.drain_output());
        assert!(out.contains("[Connecting...]"));
        assert!(out.contains("Connecting to Jupyter at http://localhost:8888"));

        shell.execute("lab").await;
        assert!(text(&shell.drain_output()).contains("Connecting to Jupyter at http://localhost:8888/lab"));

        shell.execute("notebook").await;
        assert!(text(&shell.drain_output()).contains("Connecting to Jupyter at http://localhost:8888/tree"));

        shell.execute("disconnect").await;
        assert!(text(&shell.drain_output()).contains("[Not Connected]"));
    }

    #[tokio::test]
    async fn unchanged_state_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;
        shell.on_host_event(HostEvent::LoadFinished {
            url: "http://stale".into(),
        });
        assert!(shell.drain_output().is_empty());
    }

    #[tokio::test]
    async fn unknown_and_usage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;
        shell.execute("frobnicate").await;
        shell.execute("set-url").await;
        shell.execute("back").await;
        let output = shell.drain_output();
        assert_eq!(output.len(), 3);
        assert!(output.iter().all(|(_, k)| *k == OutputKind::Error));
    }

    #[tokio::test]
    async fn quit_stops_and_fullscreen_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell(&dir).await;
        shell.execute("fullscreen").await;
        assert!(shell.session().is_fullscreen());
        shell.execute("page").await;
        assert!(text(&shell.drain_output()).contains("No page loaded"));
        shell.execute("quit").await;
        assert!(!shell.is_running());
    }

    #[test]
    fn mask_short_and_empty_tokens() {
        assert_eq!(mask_token(""), "(none)");
        assert_eq!(mask_token("ab"), "****ab (2 chars)");
    }
}
