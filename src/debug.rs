//! Debug-mode page instrumentation: the debugger script injected into
//! `<head>` and the analytics-close script injected before `</body>`.

use std::collections::HashMap;

pub fn debugger_head_html(debugger_link: &str, fragments: &HashMap<String, String>) -> String {
    let fragments_json = serde_json::to_string(fragments).unwrap_or_else(|_| "{}".to_string());
    format!(
        "<script src=\"{debugger_link}\"></script><script>PuzzleJs.fragments.set({fragments_json})</script>"
    )
}

pub const ANALYTICS_CLOSE_SCRIPT: &str =
    "<script>PuzzleJs.analytics.end(); PuzzleJs.variables.end();</script>";

/// Inserts `snippet` immediately before the literal `</head>` close tag, if
/// present.
pub fn insert_before_head_close(html: &str, snippet: &str) -> String {
    match html.find("</head>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..pos]);
            out.push_str(snippet);
            out.push_str(&html[pos..]);
            out
        }
        None => html.to_string(),
    }
}

/// Inserts `snippet` immediately before the literal `</body>` close tag, if
/// present.
pub fn insert_before_body_close(html: &str, snippet: &str) -> String {
    match html.find("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..pos]);
            out.push_str(snippet);
            out.push_str(&html[pos..]);
            out
        }
        None => html.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_before_closing_tags() {
        let html = "<html><head></head><body>hi</body></html>";
        let with_debugger = insert_before_head_close(html, "<script>x</script>");
        assert!(with_debugger.contains("<script>x</script></head>"));
        let with_analytics = insert_before_body_close(&with_debugger, ANALYTICS_CLOSE_SCRIPT);
        assert!(with_analytics.ends_with("</body></html>"));
        assert!(with_analytics.contains(ANALYTICS_CLOSE_SCRIPT));
    }
}
