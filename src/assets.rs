//! Asset Planner and Dependency Injector: classify JS/CSS assets by
//! injection location and type, render the markup for head/body-start
//! assets, and hand back per-fragment content-start/content-end/body-end
//! lists for the compiler and chunk streamer to place.

use std::collections::HashSet;

use kuchiki::NodeRef;

use crate::dom::DomDocument;
use crate::model::{
    AssetDescriptor, AssetKind, AssetLocation, AssetSpec, DependencySpec, ExecuteType, InjectType,
};

pub fn parse_asset(spec: &AssetSpec) -> AssetDescriptor {
    let location = match spec.location.as_str() {
        "head" => Some(AssetLocation::Head),
        "body-start" => Some(AssetLocation::BodyStart),
        "content-start" => Some(AssetLocation::ContentStart),
        "content-end" => Some(AssetLocation::ContentEnd),
        "body-end" => Some(AssetLocation::BodyEnd),
        _ => None,
    };
    let inject_type = match spec.inject_type.as_str() {
        "external" => Ok(InjectType::External),
        "inline" => Ok(InjectType::Inline),
        other => Err(other.to_string()),
    };
    let kind = match spec.kind.as_str() {
        "css" | "style" => AssetKind::Style,
        _ => AssetKind::Script,
    };
    let execute_type = match spec.execute_type.as_deref() {
        Some("async") => ExecuteType::Async,
        Some("defer") => ExecuteType::Defer,
        _ => ExecuteType::Sync,
    };
    AssetDescriptor {
        name: spec.name.clone(),
        location,
        kind,
        inject_type,
        link: spec.link.clone(),
        content: spec.content.clone(),
        execute_type,
    }
}

/// Renders the `<script>` markup for one asset, or an HTML comment error
/// marker when the inject type couldn't be classified.
pub fn render_asset_html(asset: &AssetDescriptor) -> String {
    let inject_type = match &asset.inject_type {
        Ok(t) => t,
        Err(raw) => return render_unknown_inject_marker(&asset.name, raw),
    };
    let exec_attr = match asset.execute_type {
        ExecuteType::Sync => "",
        ExecuteType::Async => " async",
        ExecuteType::Defer => " defer",
    };
    match inject_type {
        InjectType::External => {
            let link = asset.link.as_deref().unwrap_or_default();
            format!(
                "<script puzzle-dependency=\"{}\" src=\"{}\" type=\"text/javascript\"{}> </script>",
                asset.name, link, exec_attr
            )
        }
        InjectType::Inline => {
            let content = asset.content.as_deref().unwrap_or_default();
            format!(
                "<script puzzle-dependency=\"{}\" type=\"text/javascript\">{}</script>",
                asset.name, content
            )
        }
    }
}

pub fn render_unknown_inject_marker(asset_name: &str, raw_inject_type: &str) -> String {
    format!("<!-- UNKNOWN_INJECT_TYPE: asset={asset_name} injectType={raw_inject_type} -->")
}

/// Splits a fragment's assets into the five location buckets, rendering
/// head/body-start markup immediately and leaving content-start/content-end/
/// body-end as ordered HTML strings for the caller to place.
pub struct PlannedAssets {
    pub head_html: String,
    pub body_start_html: String,
    pub content_start_html: String,
    pub content_end_html: String,
    pub body_end_html: String,
}

pub fn plan_assets(assets: &[AssetDescriptor]) -> PlannedAssets {
    let mut planned = PlannedAssets {
        head_html: String::new(),
        body_start_html: String::new(),
        content_start_html: String::new(),
        content_end_html: String::new(),
        body_end_html: String::new(),
    };
    for asset in assets {
        if asset.kind != AssetKind::Script {
            continue;
        }
        // An unrecognized location has no marker named in spec §7; it is
        // simply dropped. Unknown injectType is handled inside
        // `render_asset_html` regardless of which bucket the asset lands in.
        match asset.location {
            Some(AssetLocation::Head) => planned.head_html.push_str(&render_asset_html(asset)),
            Some(AssetLocation::BodyStart) => {
                planned.body_start_html.push_str(&render_asset_html(asset))
            }
            Some(AssetLocation::ContentStart) => planned
                .content_start_html
                .push_str(&render_asset_html(asset)),
            Some(AssetLocation::ContentEnd) => {
                planned.content_end_html.push_str(&render_asset_html(asset))
            }
            Some(AssetLocation::BodyEnd) => {
                planned.body_end_html.push_str(&render_asset_html(asset))
            }
            None => {}
        }
    }
    planned
}

/// Appends a fragment's head/body-start asset markup directly into the DOM.
pub fn apply_head_and_body_start(document: &DomDocument, planned: &PlannedAssets) {
    if let Some(head) = document.head() {
        DomDocument::append_html(&head, &planned.head_html);
    }
    if let Some(body) = document.body() {
        DomDocument::prepend_html(&body, &planned.body_start_html);
    }
}

/// Deduplicates and appends shared dependencies into `<head>`, tracked across
/// the whole compile via `seen`.
pub struct DependencyInjector<'a> {
    seen: &'a mut HashSet<String>,
}

impl<'a> DependencyInjector<'a> {
    pub fn new(seen: &'a mut HashSet<String>) -> Self {
        Self { seen }
    }

    pub fn inject(&mut self, head: &NodeRef, dependencies: &[DependencySpec]) {
        for dep in dependencies {
            if !self.seen.insert(dep.name.clone()) {
                continue;
            }
            let html = format!(
                "<script puzzle-dependency=\"{}\" src=\"{}\" type=\"text/javascript\"> </script>",
                dep.name, dep.link
            );
            DomDocument::append_html(head, &html);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetSpec;

    fn spec(location: &str, inject_type: &str) -> AssetSpec {
        AssetSpec {
            name: "a".into(),
            location: location.into(),
            kind: "js".into(),
            inject_type: inject_type.into(),
            link: Some("/a.js".into()),
            content: None,
            execute_type: None,
        }
    }

    #[test]
    fn renders_external_script_with_exec_attr() {
        let mut d = parse_asset(&spec("head", "external"));
        d.execute_type = ExecuteType::Async;
        let html = render_asset_html(&d);
        assert_eq!(
            html,
            "<script puzzle-dependency=\"a\" src=\"/a.js\" type=\"text/javascript\" async> </script>"
        );
    }

    #[test]
    fn unknown_location_is_silently_dropped() {
        let d = parse_asset(&spec("nowhere", "external"));
        let planned = plan_assets(&[d]);
        assert!(planned.head_html.is_empty());
        assert!(planned.body_start_html.is_empty());
        assert!(planned.content_start_html.is_empty());
        assert!(planned.content_end_html.is_empty());
        assert!(planned.body_end_html.is_empty());
    }

    #[test]
    fn unknown_inject_type_becomes_comment_marker() {
        let d = parse_asset(&spec("head", "iframe"));
        let planned = plan_assets(&[d]);
        assert!(planned.head_html.contains("UNKNOWN_INJECT_TYPE"));
        assert!(planned.head_html.contains("injectType=iframe"));
    }

    #[test]
    fn dependency_injector_dedups_by_name() {
        let mut seen = HashSet::new();
        let mut injector = DependencyInjector::new(&mut seen);
        let deps = vec![DependencySpec {
            name: "shared".into(),
            link: "/shared.js".into(),
        }];
        let doc = DomDocument::parse("<div></div>");
        let head = doc.head().unwrap();
        injector.inject(&head, &deps);
        injector.inject(&head, &deps);
        let serialized = doc.serialize();
        assert_eq!(serialized.matches("puzzle-dependency=\"shared\"").count(), 1);
    }
}
