//! Headless browser host backed by `reqwest`.
//!
//! Each navigation fetches the main document on the Tokio runtime and reports
//! `LoadStarted`, then `LoadFinished` or `LoadFailed`, on the host event
//! channel. Finished documents get the mobile stylesheet injected and are
//! published as the current [`Page`].
//!
//! Like an embedded browser, only transport failures (bad URL, DNS, refused
//! connection, TLS, timeout) fail the main frame. An HTTP error status still
//! finishes the load and shows the server's error page.
//!
//! A newer navigation supersedes older ones: events from superseded loads are
//! dropped. Loads are never cancelled, they simply finish unobserved.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::history::History;
use super::styles::inject_mobile_styles;
use super::{BrowserHost, HostEvent, HostEventSender};

/// Tunables for [`HttpHost`].
#[derive(Debug, Clone)]
pub struct HttpHostConfig {
    /// Per-load timeout. `None` waits indefinitely, like the platform browser.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    /// Honour `HTTP_PROXY` and friends.
    pub system_proxy: bool,
    /// Largest main document accepted; bigger bodies fail the load.
    pub max_page_bytes: usize,
}

pub const DEFAULT_MAX_PAGE_BYTES: usize = 16 * 1024 * 1024;

impl Default for HttpHostConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("jupyter-mobile/{}", env!("CARGO_PKG_VERSION")),
            system_proxy: true,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
        }
    }
}

/// The document currently shown by the host.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    /// HTML with the mobile stylesheet applied.
    pub html: String,
    pub status: u16,
    pub fetched_at: DateTime<Utc>,
}

impl Page {
    /// Contents of the first `<title>` element, if any.
    pub fn title(&self) -> Option<&str> {
        let lower = self.html.to_ascii_lowercase();
        let open = lower.find("<title")?;
        let start = open + lower[open..].find('>')? + 1;
        let end = start + lower[start..].find("</title")?;
        Some(self.html[start..end].trim())
    }
}

pub struct HttpHost {
    client: reqwest::Client,
    runtime: Handle,
    events: HostEventSender,
    history: History,
    generation: Arc<AtomicU64>,
    page: Arc<watch::Sender<Option<Page>>>,
    max_page_bytes: usize,
}

impl HttpHost {
    pub fn new(
        config: HttpHostConfig,
        runtime: Handle,
        events: HostEventSender,
    ) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let (page, _rx) = watch::channel(None);
        Ok(Self {
            client: builder.build()?,
            runtime,
            events,
            history: History::new(),
            generation: Arc::new(AtomicU64::new(0)),
            page: Arc::new(page),
            max_page_bytes: config.max_page_bytes,
        })
    }

    /// Subscribe to the rendered page.
    pub fn page(&self) -> watch::Receiver<Option<Page>> {
        self.page.subscribe()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn navigate(&self, url: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(target: "host", url = %url, generation, "Navigating");
        let load = Load {
            url: url.to_string(),
            generation,
            latest: Arc::clone(&self.generation),
            client: self.client.clone(),
            events: self.events.clone(),
            page: Arc::clone(&self.page),
            max_bytes: self.max_page_bytes,
        };
        self.runtime.spawn(load.run());
    }
}

impl BrowserHost for HttpHost {
    fn load_url(&mut self, url: &str) {
        if url.is_empty() {
            return;
        }
        self.history.visit(url);
        self.navigate(url);
    }

    fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    fn go_back(&mut self) {
        if let Some(url) = self.history.back().map(str::to_string) {
            self.navigate(&url);
        }
    }

    fn go_forward(&mut self) {
        if let Some(url) = self.history.forward().map(str::to_string) {
            self.navigate(&url);
        }
    }

    fn reload(&mut self) {
        if let Some(url) = self.history.current().map(str::to_string) {
            self.navigate(&url);
        }
    }
}

// ---------------------------------------------------------------------------
// A single in-flight navigation
// ---------------------------------------------------------------------------

struct Load {
    url: String,
    generation: u64,
    latest: Arc<AtomicU64>,
    client: reqwest::Client,
    events: HostEventSender,
    page: Arc<watch::Sender<Option<Page>>>,
    max_bytes: usize,
}

impl Load {
    fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    fn emit(&self, event: HostEvent) {
        if !self.is_current() {
            debug!(target: "host", url = %self.url, generation = self.generation, "Dropping event from superseded load");
            return;
        }
        // Receiver gone means the session shut down.
        let _ = self.events.send(event);
    }

    async fn run(self) {
        self.emit(HostEvent::LoadStarted {
            url: self.url.clone(),
        });

        match fetch(&self.client, &self.url, self.max_bytes).await {
            Ok((status, body)) => {
                if !self.is_current() {
                    debug!(target: "host", url = %self.url, "Discarding superseded page");
                    return;
                }
                if !status.is_success() {
                    warn!(target: "host", url = %self.url, %status, "Server answered with an error page");
                }
                self.page.send_replace(Some(Page {
                    url: self.url.clone(),
                    html: inject_mobile_styles(&body),
                    status: status.as_u16(),
                    fetched_at: Utc::now(),
                }));
                info!(target: "host", url = %self.url, %status, "Page loaded");
                self.emit(HostEvent::LoadFinished {
                    url: self.url.clone(),
                });
            }
            Err(description) => {
                warn!(target: "host", url = %self.url, "Load failed: {}", description);
                self.emit(HostEvent::LoadFailed {
                    url: self.url.clone(),
                    main_frame: true,
                    description,
                });
            }
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Result<(StatusCode, String), String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid URL '{url}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("Unsupported URL scheme '{other}'")),
    }

    let mut response = client.get(parsed).send().await.map_err(describe)?;
    let status = response.status();
    let too_large = || format!("Page exceeds {max_bytes} bytes");
    if response.content_length().is_some_and(|len| len > max_bytes as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(describe)? {
        if body.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

fn describe(err: reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Connection timed out: {err}")
    } else if err.is_connect() {
        format!("Could not connect to server: {err}")
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostEventReceiver, event_channel};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` with `status_line` to every connection; returns the base URL.
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = sock.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(response.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn host() -> (HttpHost, HostEventReceiver) {
        host_with_limit(DEFAULT_MAX_PAGE_BYTES)
    }

    fn host_with_limit(max_page_bytes: usize) -> (HttpHost, HostEventReceiver) {
        let (tx, rx) = event_channel();
        let host = HttpHost::new(
            HttpHostConfig {
                timeout: Some(Duration::from_secs(10)),
                system_proxy: false,
                max_page_bytes,
                ..Default::default()
            },
            Handle::current(),
            tx,
        )
        .unwrap();
        (host, rx)
    }

    async fn next(rx: &mut HostEventReceiver) -> HostEvent {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("host event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn successful_load_reports_and_styles_page() {
        let base = serve(
            "200 OK",
            "<html><head><title>JupyterLab</title></head><body></body></html>",
        )
        .await;
        let (mut host, mut rx) = host();
        let pages = host.page();
        let url = format!("{base}/lab?token=abc");

        host.load_url(&url);

        assert_eq!(next(&mut rx).await, HostEvent::LoadStarted { url: url.clone() });
        assert_eq!(next(&mut rx).await, HostEvent::LoadFinished { url: url.clone() });

        let page = pages.borrow().clone().expect("page published");
        assert_eq!(page.url, url);
        assert_eq!(page.status, 200);
        assert_eq!(page.title(), Some("JupyterLab"));
        assert!(page.html.contains("min-height: 44px"));
    }

    #[tokio::test]
    async fn http_error_status_still_finishes() {
        let base = serve("403 Forbidden", "<html><head></head>denied</html>").await;
        let (mut host, mut rx) = host();
        host.load_url(&base);

        assert!(matches!(next(&mut rx).await, HostEvent::LoadStarted { .. }));
        assert!(matches!(next(&mut rx).await, HostEvent::LoadFinished { .. }));
        assert_eq!(host.page().borrow().as_ref().map(|p| p.status), Some(403));
    }

    #[tokio::test]
    async fn refused_connection_fails_main_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (mut host, mut rx) = host();
        host.load_url(&format!("http://{addr}"));

        assert!(matches!(next(&mut rx).await, HostEvent::LoadStarted { .. }));
        match next(&mut rx).await {
            HostEvent::LoadFailed {
                main_frame,
                description,
                ..
            } => {
                assert!(main_frame);
                assert!(!description.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_page_fails_main_frame() {
        let base = serve("200 OK", "<html><head></head><body>far too long</body></html>").await;
        let (mut host, mut rx) = host_with_limit(16);
        host.load_url(&base);

        assert!(matches!(next(&mut rx).await, HostEvent::LoadStarted { .. }));
        match next(&mut rx).await {
            HostEvent::LoadFailed {
                main_frame,
                description,
                ..
            } => {
                assert!(main_frame);
                assert_eq!(description, "Page exceeds 16 bytes");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(host.page().borrow().is_none());
    }

    #[tokio::test]
    async fn malformed_url_fails_main_frame() {
        let (mut host, mut rx) = host();
        host.load_url("not a url");

        assert!(matches!(next(&mut rx).await, HostEvent::LoadStarted { .. }));
        match next(&mut rx).await {
            HostEvent::LoadFailed { description, .. } => {
                assert!(description.starts_with("Invalid URL"), "{description}")
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_url_is_a_no_op() {
        let (mut host, mut rx) = host();
        host.load_url("");
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(host.history().is_empty());
    }

    #[tokio::test]
    async fn superseded_load_is_silent() {
        let base = serve("200 OK", "<head></head>").await;
        let (mut host, mut rx) = host();
        let first = format!("{base}/tree");
        let second = format!("{base}/lab");

        host.load_url(&first);
        host.load_url(&second);

        assert_eq!(next(&mut rx).await, HostEvent::LoadStarted { url: second.clone() });
        assert_eq!(next(&mut rx).await, HostEvent::LoadFinished { url: second.clone() });
        assert!(rx.try_recv().is_err());
        assert_eq!(host.page().borrow().as_ref().map(|p| p.url.clone()), Some(second));
    }

    #[tokio::test]
    async fn back_forward_and_reload_navigate_history() {
        let base = serve("200 OK", "<head></head>").await;
        let (mut host, mut rx) = host();
        let a = format!("{base}/a");
        let b = format!("{base}/b");

        host.load_url(&a);
        next(&mut rx).await;
        next(&mut rx).await;
        host.load_url(&b);
        next(&mut rx).await;
        next(&mut rx).await;

        assert!(host.can_go_back());
        host.go_back();
        assert_eq!(next(&mut rx).await, HostEvent::LoadStarted { url: a.clone() });
        next(&mut rx).await;
        assert!(host.can_go_forward());

        host.go_forward();
        assert_eq!(next(&mut rx).await, HostEvent::LoadStarted { url: b.clone() });
        next(&mut rx).await;

        host.reload();
        assert_eq!(next(&mut rx).await, HostEvent::LoadStarted { url: b });
    }

    #[test]
    fn title_is_extracted_case_insensitively() {
        let page = Page {
            url: "http://h".into(),
            html: "<HEAD><Title> Home </TITLE></HEAD>".into(),
            status: 200,
            fetched_at: Utc::now(),
        };
        assert_eq!(page.title(), Some("Home"));
    }
}
