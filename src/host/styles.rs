//! Mobile readability overrides applied to loaded Jupyter pages.
//!
//! Larger touch targets, compact notebook padding, readable code fonts and a
//! viewport meta tag for pages that lack one. Purely presentational.

/// Stylesheet inserted into every finished page.
pub const MOBILE_CSS: &str = r#"
body {
    -webkit-text-size-adjust: 100%;
    touch-action: manipulation;
}
#header, .header {
    position: sticky !important;
    top: 0 !important;
    z-index: 1000 !important;
}
.container {
    max-width: 100% !important;
    padding: 8px !important;
}
.cell {
    margin: 8px 0 !important;
}
.CodeMirror {
    font-size: 14px !important;
    line-height: 1.4 !important;
}
.jp-Notebook {
    padding: 8px !important;
}
.jp-Cell {
    margin: 8px 0 !important;
}
.jp-CodeCell {
    font-size: 14px !important;
}
button, .btn {
    min-height: 44px !important;
    min-width: 44px !important;
    padding: 8px 12px !important;
}
input, select, textarea {
    font-size: 16px !important;
    padding: 8px !important;
}
.toolbar {
    flex-wrap: wrap !important;
}
"#;

pub const VIEWPORT_META: &str = r#"<meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=5.0, user-scalable=yes">"#;

const STYLE_MARKER: &str = "data-jupyter-mobile";

/// Insert the mobile stylesheet, plus a viewport meta tag when the page has
/// none, at the end of `<head>`.
///
/// Pages without a `<head>` get the additions prepended. Applying this twice
/// is a no-op.
pub fn inject_mobile_styles(html: &str) -> String {
    if html.contains(STYLE_MARKER) {
        return html.to_string();
    }

    let mut addition = format!("<style {STYLE_MARKER}>{MOBILE_CSS}</style>");
    if !has_viewport_meta(html) {
        addition.push_str(VIEWPORT_META);
    }

    match find_ascii_ci(html, "</head>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + addition.len());
            out.push_str(&html[..at]);
            out.push_str(&addition);
            out.push_str(&html[at..]);
            out
        }
        None => addition + html,
    }
}

fn has_viewport_meta(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    lower.match_indices("<meta").any(|(start, _)| {
        let tag_end = lower[start..].find('>').map_or(lower.len(), |e| start + e);
        let tag = &lower[start..tag_end];
        tag.contains("name=\"viewport\"") || tag.contains("name='viewport'") || tag.contains("name=viewport")
    })
}

/// Byte offset of the first ASCII-case-insensitive match of `needle`.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}
