//! HTML parse + manipulation facade over the template document, built on
//! `kuchiki` the same way `fragments.rs::replace_selector_inner_html` used it
//! for one-shot selector replacement — generalized here into a full rewrite
//! pass (sentinel injection, asset insertion, serialization).

use kuchiki::NodeRef;
use kuchiki::traits::*;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("selector {0} is invalid")]
    BadSelector(String),
}

/// Tags whose serialization must never collapse to a self-closing form.
const SELF_CLOSING: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

pub struct DomDocument {
    pub root: NodeRef,
}

impl DomDocument {
    /// Parses an HTML fragment (the `<template>` region's inner HTML) with
    /// HTML5 semantics into a full document, so `<head>`/`<body>` always
    /// exist regardless of what the fragment itself declared.
    pub fn parse(fragment_html: &str) -> Self {
        let root = kuchiki::parse_html().one(fragment_html);
        Self { root }
    }

    pub fn head(&self) -> Option<NodeRef> {
        self.root.select_first("head").ok().map(|n| n.as_node().clone())
    }

    pub fn body(&self) -> Option<NodeRef> {
        self.root.select_first("body").ok().map(|n| n.as_node().clone())
    }

    pub fn select(&self, selector: &str) -> Result<Vec<NodeRef>, DomError> {
        let nodes = self
            .root
            .select(selector)
            .map_err(|_| DomError::BadSelector(selector.to_string()))?;
        Ok(nodes.map(|n| n.as_node().clone()).collect())
    }

    /// Appends raw HTML as the last child of `parent`.
    pub fn append_html(parent: &NodeRef, html: &str) {
        if html.is_empty() {
            return;
        }
        let wrapper = wrap_and_parse(html);
        for child in wrapper.children() {
            parent.append(child);
        }
    }

    /// Prepends raw HTML as the first child of `parent`.
    pub fn prepend_html(parent: &NodeRef, html: &str) {
        if html.is_empty() {
            return;
        }
        let wrapper = wrap_and_parse(html);
        let children: Vec<_> = wrapper.children().collect();
        match parent.first_child() {
            Some(first) => {
                for child in children {
                    first.insert_before(child);
                }
            }
            None => {
                for child in children {
                    parent.append(child);
                }
            }
        }
    }

    /// Inserts raw HTML immediately before `node`.
    pub fn insert_html_before(node: &NodeRef, html: &str) {
        if html.is_empty() {
            return;
        }
        let wrapper = wrap_and_parse(html);
        for child in wrapper.children() {
            node.insert_before(child);
        }
    }

    /// Inserts raw HTML immediately after `node`.
    pub fn insert_html_after(node: &NodeRef, html: &str) {
        if html.is_empty() {
            return;
        }
        let wrapper = wrap_and_parse(html);
        for child in wrapper.children().rev() {
            node.insert_after(child);
        }
    }

    /// Replaces `node` in place with the parsed contents of `html`.
    pub fn replace_with_html(node: &NodeRef, html: &str) {
        let wrapper = wrap_and_parse(html);
        let children: Vec<_> = wrapper.children().collect();
        for child in children {
            node.insert_before(child);
        }
        node.detach();
    }

    /// Any element not in the self-closing set with empty text content gets a
    /// single space, so serializers don't collapse `<div></div>` into `<div/>`.
    pub fn normalize_empty_tags(&self) {
        if let Ok(matches) = self.root.select("*") {
            for css_match in matches {
                let node = css_match.as_node();
                let tag_name = css_match.name.local.to_string();
                if SELF_CLOSING.contains(&tag_name.as_str()) {
                    continue;
                }
                if node.children().next().is_none() {
                    node.append(NodeRef::new_text(" "));
                }
            }
        }
    }

    /// Serializes the document and collapses inter-tag indentation
    /// whitespace (runs spanning a newline) down to nothing.
    pub fn serialize(&self) -> String {
        let raw = self.root.to_string();
        collapse_whitespace(&raw)
    }
}

fn wrap_and_parse(html: &str) -> NodeRef {
    let wrapped = format!("<div id=\"__dom_view_wrapper\">{html}</div>");
    let doc = kuchiki::parse_html().one(wrapped);
    doc.select_first("#__dom_view_wrapper")
        .expect("wrapper div always present")
        .as_node()
        .clone()
}

/// Collapses pretty-printed indentation between tags (a whitespace run that
/// spans at least one newline) but leaves a lone inline space alone, so the
/// single space `normalize_empty_tags` inserts into an otherwise-empty
/// element (`<div id="x"> </div>`) survives serialization instead of being
/// eaten back down to `<div id="x"></div>`.
fn collapse_whitespace(html: &str) -> String {
    let re = Regex::new(r">[ \t]*\n\s*<").expect("valid regex");
    re.replace_all(html, "><").to_string()
}

/// Extracts the mandatory `<template>` region and the optional sibling
/// `<script>` region from the raw template source.
///
/// The source is not itself a valid standalone HTML document (the outer
/// `<template>...</template>` wrapper is a source-level convention, not part
/// of the page), so a regex split is used rather than feeding the whole
/// thing through the DOM parser.
pub fn split_template_source(raw: &str) -> Option<(String, Option<String>)> {
    let template_re = Regex::new(r"(?s)<template[^>]*>(.*)</template>").expect("valid regex");
    let caps = template_re.captures(raw)?;
    let template_html = caps.get(1)?.as_str().to_string();

    let remainder = format!(
        "{}{}",
        &raw[..caps.get(0).unwrap().start()],
        &raw[caps.get(0).unwrap().end()..]
    );
    let script_re = Regex::new(r"(?s)<script[^>]*>(.*)</script>").expect("valid regex");
    let script = script_re
        .captures(&remainder)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    Some((template_html, script))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_template_and_script() {
        let raw = r#"<template><div>hi</div></template><script>export default {}</script>"#;
        let (template, script) = split_template_source(raw).unwrap();
        assert_eq!(template, "<div>hi</div>");
        assert_eq!(script.unwrap().trim(), "export default {}");
    }

    #[test]
    fn missing_template_returns_none() {
        assert!(split_template_source("<div>no template here</div>").is_none());
    }

    #[test]
    fn normalizes_empty_tags() {
        let doc = DomDocument::parse("<div id=\"x\"></div>");
        doc.normalize_empty_tags();
        let serialized = doc.serialize();
        assert!(serialized.contains("<div id=\"x\"> </div>"));
    }

    #[test]
    fn collapse_whitespace_still_eats_pretty_printed_indentation() {
        let collapsed = collapse_whitespace("<body>\n  <h1>hi</h1>\n</body>");
        assert_eq!(collapsed, "<body><h1>hi</h1></body>");
    }

    #[test]
    fn collapse_whitespace_leaves_a_lone_inline_space_untouched() {
        let collapsed = collapse_whitespace("<div id=\"x\"> </div>");
        assert_eq!(collapsed, "<div id=\"x\"> </div>");
    }
}
