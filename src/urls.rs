//! Connection URL construction.
//!
//! Every URL is derived from the configured server address and the optional
//! token: trailing slashes are stripped from the server address, an interface
//! path (`/lab`, `/tree`) may follow, and a non-empty token is appended as
//! `?token=<token>`. The token is interpolated verbatim, without percent
//! encoding.

use crate::settings::Settings;

/// Which Jupyter front-end a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interface {
    /// Server root; the server picks its default UI.
    #[default]
    Root,
    /// JupyterLab (`/lab`).
    Lab,
    /// Classic notebook tree (`/tree`).
    Notebook,
}

impl Interface {
    pub fn path(self) -> &'static str {
        match self {
            Interface::Root => "",
            Interface::Lab => "/lab",
            Interface::Notebook => "/tree",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Interface::Root => "root",
            Interface::Lab => "lab",
            Interface::Notebook => "notebook",
        }
    }
}

/// Build the URL for `interface` on `server_url`, authenticated with `token`.
pub fn build_url(server_url: &str, token: &str, interface: Interface) -> String {
    let base = server_url.trim_end_matches('/');
    let mut url = String::with_capacity(base.len() + interface.path().len() + token.len() + 7);
    url.push_str(base);
    url.push_str(interface.path());
    if !token.is_empty() {
        url.push_str("?token=");
        url.push_str(token);
    }
    url
}

pub fn build_base_url(server_url: &str, token: &str) -> String {
    build_url(server_url, token, Interface::Root)
}

pub fn build_lab_url(server_url: &str, token: &str) -> String {
    build_url(server_url, token, Interface::Lab)
}

pub fn build_notebook_url(server_url: &str, token: &str) -> String {
    build_url(server_url, token, Interface::Notebook)
}

impl Settings {
    /// URL for `interface` using these settings.
    pub fn url_for(&self, interface: Interface) -> String {
        build_url(&self.server_url, &self.token, interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(
            build_base_url("http://host:8888/", "abc"),
            "http://host:8888?token=abc"
        );
        assert_eq!(build_base_url("http://host:8888///", ""), "http://host:8888");
    }

    #[test]
    fn empty_token_adds_no_query() {
        for url in ["http://localhost:8888", "https://hub.example.org/user/x/", ""] {
            assert!(!build_base_url(url, "").contains("?token="));
            assert!(!build_lab_url(url, "").contains("?token="));
        }
    }

    #[test]
    fn variants_insert_path_before_query() {
        let cases = [
            ("http://10.0.2.2:8888", "xyz"),
            ("http://10.0.2.2:8888/", ""),
            ("https://example.org/jupyter/", "t0k"),
        ];
        for (server, token) in cases {
            let base = build_base_url(server, token);
            let (head, query) = match base.find("?token=") {
                Some(i) => base.split_at(i),
                None => (base.as_str(), ""),
            };
            assert_eq!(build_lab_url(server, token), format!("{head}/lab{query}"));
            assert_eq!(build_notebook_url(server, token), format!("{head}/tree{query}"));
        }
    }

    #[test]
    fn token_is_not_encoded() {
        assert_eq!(
            build_base_url("http://h", "a b&c"),
            "http://h?token=a b&c"
        );
    }

    #[test]
    fn settings_url_for_matches_builders() {
        let settings = Settings {
            server_url: "http://h:1/".into(),
            token: "t".into(),
        };
        assert_eq!(settings.url_for(Interface::Root), "http://h:1?token=t");
        assert_eq!(settings.url_for(Interface::Lab), "http://h:1/lab?token=t");
        assert_eq!(settings.url_for(Interface::Notebook), "http://h:1/tree?token=t");
    }
}
