//! jupyter-mobile: thin client for a remote Jupyter server.
//!
//! Keeps the server address and token in `settings.toml`, builds the Lab and
//! Notebook URLs from them, and drives a headless browser host from an
//! interactive shell.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use jupyter_mobile::host::{self, HttpHost, HttpHostConfig};
use jupyter_mobile::paths::AppPaths;
use jupyter_mobile::shell::{self, Shell};
use jupyter_mobile::{Session, SettingsStore, logging};

/// Jupyter Mobile
#[derive(Parser, Debug)]
#[command(name = "jupyter-mobile", version, about = "Thin client for a remote Jupyter server")]
struct Args {
    /// Directory holding settings.toml (default: ~/.config/jupyter-mobile)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Give up on a page load after this many seconds (default: wait forever)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Connect as soon as the shell starts
    #[arg(short, long)]
    connect: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive shell (default)
    Shell,
    /// Print the root, lab and notebook URLs
    Urls,
    /// Print the saved settings
    Config,
    /// Save the server URL
    SetUrl { url: String },
    /// Save the auth token; omit to clear it
    SetToken { token: Option<String> },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut paths = AppPaths::resolve().context("could not resolve home directory (is HOME set?)")?;
    if let Some(dir) = args.config_dir.clone() {
        paths = paths.with_config_dir(dir);
    }
    let _log_guard = logging::init(Some(&paths.logs));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create Tokio runtime")?;

    let result = runtime.block_on(run(args, paths));

    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run(args: Args, paths: AppPaths) -> Result<()> {
    let settings_path = paths.settings_file();
    let store = SettingsStore::open(&settings_path)
        .await
        .with_context(|| format!("failed to load {}", settings_path.display()))?;

    match args.command.unwrap_or(Command::Shell) {
        Command::Urls => {
            let settings = store.current();
            println!("root      {}", jupyter_mobile::build_base_url(&settings.server_url, &settings.token));
            println!("lab       {}", jupyter_mobile::build_lab_url(&settings.server_url, &settings.token));
            println!("notebook  {}", jupyter_mobile::build_notebook_url(&settings.server_url, &settings.token));
        }
        Command::Config => {
            let settings = store.current();
            println!("file        {}", store.path().display());
            println!("server_url  {}", settings.server_url);
            println!("token       {}", if settings.token.is_empty() { "(none)" } else { "(set)" });
        }
        Command::SetUrl { url } => {
            store.save_server_url(&url).await.context("failed to save server URL")?;
            println!("Server URL saved: {url}");
        }
        Command::SetToken { token } => {
            let token = token.unwrap_or_default();
            store.save_token(&token).await.context("failed to save token")?;
            println!("{}", if token.is_empty() { "Token cleared" } else { "Token saved" });
        }
        Command::Shell => run_shell(store, paths, args.timeout_secs, args.connect).await?,
    }

    Ok(())
}

async fn run_shell(
    store: SettingsStore,
    paths: AppPaths,
    timeout_secs: Option<u64>,
    connect: bool,
) -> Result<()> {
    if let Err(e) = paths.ensure() {
        warn!("Could not create application directories: {e}");
    }

    let (events_tx, events_rx) = host::event_channel();
    let config = HttpHostConfig {
        timeout: timeout_secs.map(Duration::from_secs),
        ..Default::default()
    };
    let browser = HttpHost::new(config, tokio::runtime::Handle::current(), events_tx)
        .context("failed to build HTTP client")?;
    let page = browser.page();

    let mut session = Session::new(browser, store);
    if let Err(e) = session.settings_store_mut().watch_external() {
        warn!("External settings edits will not be picked up: {e}");
    }

    let mut shell = Shell::new(session, Some(page));
    if connect {
        shell.session_mut().connect();
    }
    shell.push_status();

    shell::run(&mut shell, events_rx).await.context("shell I/O failed")
}
