//! Template Compiler / Planner. Parses the template, classifies every
//! fragment occurrence, rewrites the DOM into sentinel placeholders, and
//! assembles the ordered plan of replacements and asset injections that the
//! streaming request handler drives at request time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use kuchiki::NodeRef;
use thiserror::Error;
use tracing::warn;

use crate::assets::{self, DependencyInjector, PlannedAssets};
use crate::dom::DomDocument;
use crate::gateway::GatewayClient;
use crate::model::{
    AssetDescriptor, AssetKind, FragmentClass, FragmentDescriptor, FragmentOccurrence,
    GatewayFragmentConfig, ReplaceItem, ReplaceItemType, ReplaceSet,
};
use crate::sentinel;
use crate::stylesheet::{self, StylesheetBundle, StylesheetBundler};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("TEMPLATE_NOT_FOUND")]
    TemplateNotFound,
    #[error("MULTIPLE_PRIMARY_FRAGMENTS: {0} and {1} both claim primary")]
    MultiplePrimaryFragments(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    NoChunked,
    Chunked,
}

#[derive(Debug, Clone)]
pub struct WaitedFragmentPlan {
    pub descriptor: FragmentDescriptor,
    pub replace_set: ReplaceSet,
}

#[derive(Debug, Clone)]
pub struct ChunkedFragmentPlan {
    pub descriptor: FragmentDescriptor,
    pub replace_set: ReplaceSet,
    pub content_start_html: String,
    pub content_end_html: String,
}

#[derive(Debug)]
pub struct CompiledTemplate {
    pub name: String,
    pub mode: CompileMode,
    shell_with_sentinels: String,
    pub waited: Vec<WaitedFragmentPlan>,
    pub chunked: Vec<ChunkedFragmentPlan>,
    pub primary_fragment: Option<String>,
    pub stylesheet: Option<StylesheetBundle>,
    pub default_timeout: Duration,
    pub body_end_html: String,
}

impl CompiledTemplate {
    /// The static, pre-substitution first-flush string with sentinels
    /// intact. Compiled once, reused by every request.
    pub fn shell(&self) -> &str {
        &self.shell_with_sentinels
    }
}

pub struct TemplateCompiler {
    gateway: Arc<dyn GatewayClient>,
    minifier: Arc<dyn stylesheet::CssMinifier>,
    gateway_bases: HashMap<String, String>,
    default_timeout: Duration,
}

struct Registry {
    order: Vec<String>,
    map: HashMap<String, FragmentDescriptor>,
    primary: Option<String>,
}

impl Registry {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            map: HashMap::new(),
            primary: None,
        }
    }

    fn get_or_insert(&mut self, name: &str, from: &str, fragment_url: String) -> &mut FragmentDescriptor {
        if !self.map.contains_key(name) {
            self.order.push(name.to_string());
            self.map.insert(
                name.to_string(),
                FragmentDescriptor {
                    name: name.to_string(),
                    from: from.to_string(),
                    config: None,
                    primary: false,
                    should_wait: false,
                    fragment_url,
                },
            );
        }
        self.map.get_mut(name).unwrap()
    }
}

struct WalkedOccurrence {
    node: NodeRef,
    occurrence: FragmentOccurrence,
}

impl TemplateCompiler {
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        minifier: Arc<dyn stylesheet::CssMinifier>,
        gateway_bases: HashMap<String, String>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            minifier,
            gateway_bases,
            default_timeout,
        }
    }

    fn fragment_url(&self, from: &str, name: &str) -> String {
        match self.gateway_bases.get(from) {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), name),
            None => format!("http://{from}/{name}"),
        }
    }

    pub async fn compile(
        &self,
        template_name: &str,
        raw_source: &str,
    ) -> Result<CompiledTemplate, CompileError> {
        let (template_html, _script) =
            crate::dom::split_template_source(raw_source).ok_or(CompileError::TemplateNotFound)?;
        let document = DomDocument::parse(&template_html);

        let occurrences = self.walk_occurrences(&document)?;
        if occurrences.is_empty() {
            document.normalize_empty_tags();
            return Ok(CompiledTemplate {
                name: template_name.to_string(),
                mode: CompileMode::NoChunked,
                shell_with_sentinels: document.serialize(),
                waited: Vec::new(),
                chunked: Vec::new(),
                primary_fragment: None,
                stylesheet: None,
                default_timeout: self.default_timeout,
                body_end_html: String::new(),
            });
        }

        let mut registry = self.build_registry(&occurrences)?;
        self.attach_configs(&mut registry).await;

        let mut waited = Vec::new();
        let mut chunked = Vec::new();
        let mut any_chunked_head_script_injected = false;
        let mut dependency_seen: HashSet<String> = HashSet::new();
        let mut css_chunks: Vec<(String, String)> = Vec::new();
        let mut body_end_html = String::new();

        let occurrence_counts = count_occurrences(&occurrences);
        let mut occurrence_index: HashMap<String, usize> = HashMap::new();

        for walked in &occurrences {
            let occ = &walked.occurrence;
            let descriptor = registry.map.get(&occ.name).expect("descriptor present");
            let class = descriptor.classify();
            let idx = occurrence_index.entry(occ.name.clone()).or_insert(0);
            let is_first = *idx == 0;
            let is_last = *idx + 1 == *occurrence_counts.get(&occ.name).unwrap_or(&1);
            *idx += 1;

            match class {
                FragmentClass::Waited => {
                    let replace_set = self.rewrite_waited(&document, walked, descriptor, is_first, is_last);
                    if is_first {
                        waited.push(WaitedFragmentPlan {
                            descriptor: descriptor.clone(),
                            replace_set,
                        });
                    } else if let Some(plan) = waited.iter_mut().find(|p| p.descriptor.name == occ.name) {
                        plan.replace_set.replace_items.extend(
                            self.waited_items_for(occ, false),
                        );
                    }
                }
                FragmentClass::Chunked => {
                    if !any_chunked_head_script_injected {
                        if let Some(head) = document.head() {
                            DomDocument::append_html(&head, content_replace_script());
                        }
                        any_chunked_head_script_injected = true;
                    }
                    let (replace_item, fragment_attrs) =
                        self.rewrite_chunked(&document, walked, descriptor).await;
                    match chunked.iter_mut().find(|p: &&mut ChunkedFragmentPlan| p.descriptor.name == occ.name) {
                        Some(plan) => {
                            plan.replace_set.replace_items.push(replace_item);
                            if let Some(attrs) = fragment_attrs {
                                plan.replace_set.fragment_attributes = attrs;
                            }
                        }
                        None => {
                            let mut replace_set = ReplaceSet::for_fragment(&occ.name);
                            replace_set.replace_items.push(replace_item);
                            if let Some(attrs) = fragment_attrs {
                                replace_set.fragment_attributes = attrs;
                            }
                            let planned = descriptor
                                .config
                                .as_ref()
                                .map(|cfg| {
                                    let parsed: Vec<AssetDescriptor> =
                                        cfg.assets.iter().map(assets::parse_asset).collect();
                                    assets::plan_assets(&parsed)
                                })
                                .unwrap_or_else(empty_planned_assets);
                            chunked.push(ChunkedFragmentPlan {
                                descriptor: descriptor.clone(),
                                replace_set,
                                content_start_html: planned.content_start_html,
                                content_end_html: planned.content_end_html,
                            });
                        }
                    }
                }
                FragmentClass::Static => {
                    self.rewrite_static(walked, descriptor).await;
                }
                FragmentClass::Unfetched => {
                    self.rewrite_unfetched(walked);
                }
            }
        }

        // Head/body-start assets + dependency dedup + CSS bundling, in
        // descriptor insertion order. A fragment with no config is skipped
        // (spec.md's open question (i) resolves the source's early-return as
        // "skip this fragment", not "abort the whole step").
        if let Some(head) = document.head() {
            for name in &registry.order {
                let descriptor = registry.map.get(name).expect("present");
                let Some(cfg) = &descriptor.config else {
                    continue;
                };
                let parsed: Vec<AssetDescriptor> = cfg.assets.iter().map(assets::parse_asset).collect();
                let planned = assets::plan_assets(&parsed);
                assets::apply_head_and_body_start(&document, &planned);
                body_end_html.push_str(&planned.body_end_html);

                let mut injector = DependencyInjector::new(&mut dependency_seen);
                injector.inject(&head, &cfg.dependencies);

                for asset in &parsed {
                    if asset.kind == AssetKind::Style {
                        let body = self.resolve_asset_body(&descriptor.fragment_url, asset).await;
                        css_chunks.push((name.clone(), body));
                    }
                }
            }

            let bundler = StylesheetBundler::new(self.minifier.clone());
            match bundler.bundle(template_name, &css_chunks) {
                Ok(Some(bundle)) => {
                    DomDocument::append_html(&head, &stylesheet::link_tag(&bundle));
                    document.normalize_empty_tags();
                    let mode = if chunked.is_empty() {
                        CompileMode::NoChunked
                    } else {
                        CompileMode::Chunked
                    };
                    return Ok(CompiledTemplate {
                        name: template_name.to_string(),
                        mode,
                        shell_with_sentinels: document.serialize(),
                        waited,
                        chunked,
                        primary_fragment: registry.primary.clone(),
                        stylesheet: Some(bundle),
                        default_timeout: self.default_timeout,
                        body_end_html: body_end_html.clone(),
                    });
                }
                Ok(None) => {}
                Err(err) => warn!(?err, "stylesheet bundling failed; continuing without one"),
            }
        }

        document.normalize_empty_tags();
        let mode = if chunked.is_empty() {
            CompileMode::NoChunked
        } else {
            CompileMode::Chunked
        };
        Ok(CompiledTemplate {
            name: template_name.to_string(),
            mode,
            shell_with_sentinels: document.serialize(),
            waited,
            chunked,
            primary_fragment: registry.primary,
            stylesheet: None,
            default_timeout: self.default_timeout,
            body_end_html,
        })
    }

    fn walk_occurrences(&self, document: &DomDocument) -> Result<Vec<WalkedOccurrence>, CompileError> {
        let nodes = document.select("fragment").unwrap_or_default();
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            let element = node.as_element().expect("selected by tag name").clone();
            let attrs = element.attributes.borrow();
            let name = attrs.get("name").unwrap_or_default().to_string();
            let from = attrs.get("from").unwrap_or_default().to_string();
            let partial = attrs.get("partial").unwrap_or("main").to_string();
            let primary = attrs.get("primary").is_some();
            let should_wait_attr = attrs.get("shouldwait").is_some();
            let in_head = node
                .parent()
                .and_then(|p| p.as_element().map(|e| e.name.local.as_ref() == "head"))
                .unwrap_or(false);
            let attributes: HashMap<String, String> = attrs
                .map
                .iter()
                .map(|(k, v)| (k.local.as_ref().to_string(), v.value.clone()))
                .collect();
            drop(attrs);
            out.push(WalkedOccurrence {
                node,
                occurrence: FragmentOccurrence {
                    name,
                    from,
                    partial,
                    primary,
                    should_wait: should_wait_attr || in_head,
                    in_head,
                    attributes,
                },
            });
        }
        Ok(out)
    }

    fn build_registry(&self, occurrences: &[WalkedOccurrence]) -> Result<Registry, CompileError> {
        let mut registry = Registry::new();
        for walked in occurrences {
            let occ = &walked.occurrence;
            let url = self.fragment_url(&occ.from, &occ.name);
            let descriptor = registry.get_or_insert(&occ.name, &occ.from, url);
            if occ.should_wait {
                descriptor.should_wait = true;
            }
            if occ.primary {
                if let Some(existing) = &registry.primary {
                    if existing != &occ.name {
                        return Err(CompileError::MultiplePrimaryFragments(
                            existing.clone(),
                            occ.name.clone(),
                        ));
                    }
                } else {
                    registry.primary = Some(occ.name.clone());
                }
                let descriptor = registry.map.get_mut(&occ.name).unwrap();
                descriptor.primary = true;
                descriptor.should_wait = true;
            }
        }
        Ok(registry)
    }

    async fn attach_configs(&self, registry: &mut Registry) {
        for name in registry.order.clone() {
            let descriptor = registry.map.get(&name).unwrap();
            let config: Option<GatewayFragmentConfig> = self
                .gateway
                .fetch_fragment_config(&descriptor.fragment_url, &name)
                .await;
            registry.map.get_mut(&name).unwrap().config = config;
        }
    }

    fn waited_items_for(&self, occ: &FragmentOccurrence, is_first: bool) -> Vec<ReplaceItem> {
        let mut items = Vec::new();
        if is_first {
            items.push(ReplaceItem {
                item_type: ReplaceItemType::ModelScript,
                key: sentinel::model_key(&occ.name),
                partial: occ.partial.clone(),
            });
        }
        items.push(ReplaceItem {
            item_type: ReplaceItemType::Content,
            key: sentinel::waited_key(&occ.name, &occ.from, &occ.partial),
            partial: occ.partial.clone(),
        });
        items
    }

    fn rewrite_waited(
        &self,
        document: &DomDocument,
        walked: &WalkedOccurrence,
        descriptor: &FragmentDescriptor,
        is_first: bool,
        is_last: bool,
    ) -> ReplaceSet {
        let occ = &walked.occurrence;
        let content_key = sentinel::waited_key(&occ.name, &occ.from, &occ.partial);
        let sentinel_text = if is_first {
            format!("{}{}", sentinel::model_key(&occ.name), content_key)
        } else {
            content_key.clone()
        };

        let inner_html = if occ.in_head {
            sentinel_text.clone()
        } else {
            format!(
                "<div id=\"{}\" puzzle-fragment=\"{}\" puzzle-gateway=\"{}\" fragment-partial=\"{}\">{}</div>",
                occ.name, occ.name, occ.from, occ.partial, sentinel_text
            )
        };

        if is_first {
            if let Some(cfg) = &descriptor.config {
                let parsed: Vec<AssetDescriptor> = cfg.assets.iter().map(assets::parse_asset).collect();
                let planned = assets::plan_assets(&parsed);
                DomDocument::insert_html_before(&walked.node, &planned.content_start_html);
            }
        }

        DomDocument::replace_with_html(&walked.node, &inner_html);

        if is_last {
            if let Some(cfg) = &descriptor.config {
                let parsed: Vec<AssetDescriptor> = cfg.assets.iter().map(assets::parse_asset).collect();
                let planned = assets::plan_assets(&parsed);
                // the node is detached; anchor content-end after the last
                // sibling we just inserted by re-selecting the container.
                if let Some(container) = document
                    .select(&format!("#{}", occ.name))
                    .ok()
                    .and_then(|v| v.into_iter().last())
                {
                    DomDocument::insert_html_after(&container, &planned.content_end_html);
                } else if let Some(body) = document.body() {
                    DomDocument::append_html(&body, &planned.content_end_html);
                }
            }
        }

        let mut replace_set = ReplaceSet::for_fragment(&occ.name);
        replace_set.replace_items = self.waited_items_for(occ, is_first);
        replace_set.fragment_attributes = occ.forwarded_attributes();
        replace_set
    }

    async fn rewrite_chunked(
        &self,
        document: &DomDocument,
        walked: &WalkedOccurrence,
        descriptor: &FragmentDescriptor,
    ) -> (ReplaceItem, Option<HashMap<String, String>>) {
        let occ = &walked.occurrence;
        let chunk_key = sentinel::chunked_key(&occ.name, &occ.partial);
        let wants_placeholder = occ.partial == "main"
            && descriptor
                .config
                .as_ref()
                .map(|c| c.render.placeholder)
                .unwrap_or(false);

        let placeholder_attr = if wants_placeholder {
            format!(
                " puzzle-placeholder=\"{}\"",
                sentinel::placeholder_key(&occ.name, &occ.partial)
            )
        } else {
            String::new()
        };

        let container_html = format!(
            "<div id=\"{}\" puzzle-fragment=\"{}\" puzzle-gateway=\"{}\" fragment-partial=\"{}\" puzzle-chunk=\"{}\"{}></div>",
            occ.name, occ.name, occ.from, occ.partial, chunk_key, placeholder_attr
        );
        DomDocument::replace_with_html(&walked.node, &container_html);

        if wants_placeholder {
            let placeholder_html = self
                .gateway
                .fetch_placeholder(&descriptor.fragment_url, self.timeout_for(descriptor))
                .await;
            if let Ok(nodes) = document.select(&format!(
                "[puzzle-chunk=\"{chunk_key}\"]"
            )) {
                if let Some(container) = nodes.into_iter().last() {
                    DomDocument::append_html(&container, &placeholder_html);
                }
            }
        }

        let replace_item = ReplaceItem {
            item_type: ReplaceItemType::ChunkedContent,
            key: chunk_key,
            partial: occ.partial.clone(),
        };
        let fragment_attrs = if occ.partial == "main" {
            Some(occ.forwarded_attributes())
        } else {
            None
        };
        (replace_item, fragment_attrs)
    }

    async fn rewrite_static(&self, walked: &WalkedOccurrence, descriptor: &FragmentDescriptor) {
        let occ = &walked.occurrence;
        let attrs = occ.forwarded_attributes();
        let timeout = self.timeout_for(descriptor);
        let render_url = descriptor
            .config
            .as_ref()
            .map(|c| c.render.url.clone())
            .unwrap_or_default();
        let response = self
            .gateway
            .fetch_render(&descriptor.fragment_url, &render_url, &attrs, timeout)
            .await
            .unwrap_or_else(|err| {
                warn!(?err, fragment = %occ.name, "static fragment fetch failed");
                crate::model::GatewayRenderResponse::failed()
            });
        let content = response
            .html
            .get(&occ.partial)
            .cloned()
            .unwrap_or_else(|| sentinel::CONTENT_NOT_FOUND_ERROR.to_string());

        let mut html = format!(
            "<div id=\"{}\" puzzle-fragment=\"{}\" puzzle-gateway=\"{}\" fragment-partial=\"{}\">{}</div>",
            occ.name, occ.name, occ.from, occ.partial, content
        );
        if let Some(cfg) = &descriptor.config {
            let parsed: Vec<AssetDescriptor> = cfg.assets.iter().map(assets::parse_asset).collect();
            for asset in parsed.iter().filter(|a| a.kind == AssetKind::Script) {
                html.push_str(&assets::render_asset_html(asset));
            }
        }
        DomDocument::replace_with_html(&walked.node, &html);
    }

    fn rewrite_unfetched(&self, walked: &WalkedOccurrence) {
        let occ = &walked.occurrence;
        let html = format!(
            "<div puzzle-fragment=\"{}\" puzzle-gateway=\"{}\">{}</div>",
            occ.name,
            occ.from,
            sentinel::CONTENT_NOT_FOUND_ERROR
        );
        DomDocument::replace_with_html(&walked.node, &html);
    }

    fn timeout_for(&self, descriptor: &FragmentDescriptor) -> Duration {
        descriptor
            .config
            .as_ref()
            .and_then(|c| c.render.timeout)
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }

    async fn resolve_asset_body(&self, fragment_url: &str, asset: &AssetDescriptor) -> String {
        if let Some(content) = &asset.content {
            return content.clone();
        }
        let Some(link) = &asset.link else {
            return String::new();
        };
        let file_name = link.rsplit('/').next().unwrap_or(link);
        self.gateway
            .fetch_static(fragment_url, file_name, self.default_timeout)
            .await
            .unwrap_or_default()
    }
}

fn count_occurrences(occurrences: &[WalkedOccurrence]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for walked in occurrences {
        *counts.entry(walked.occurrence.name.clone()).or_insert(0) += 1;
    }
    counts
}

fn empty_planned_assets() -> PlannedAssets {
    PlannedAssets {
        head_html: String::new(),
        body_start_html: String::new(),
        content_start_html: String::new(),
        content_end_html: String::new(),
        body_end_html: String::new(),
    }
}

/// Injected once into `<head>` the first time any chunked fragment is seen.
/// Moves a completed chunk's content into its placeholder container.
fn content_replace_script() -> &'static str {
    "<script>function $p(target,source){var t=document.querySelector(target);var s=document.querySelector(source);if(!t||!s)return;t.innerHTML=s.innerHTML;s.parentNode.removeChild(s);}</script>"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::stub::StubGatewayClient;
    use crate::model::RenderConfig;
    use crate::stylesheet::{CssMinifier, StylesheetError};

    struct NoopMinifier;
    impl CssMinifier for NoopMinifier {
        fn minify(&self, css: &str) -> Result<String, StylesheetError> {
            Ok(css.to_string())
        }
    }

    fn compiler(gateway: StubGatewayClient) -> TemplateCompiler {
        TemplateCompiler::new(
            Arc::new(gateway),
            Arc::new(NoopMinifier),
            HashMap::new(),
            Duration::from_secs(5),
        )
    }

    fn wrap(body: &str) -> String {
        format!("<template><html><head></head><body>{body}</body></html></template>")
    }

    #[tokio::test]
    async fn template_without_fragments_passes_through_unchanged() {
        let gateway = StubGatewayClient::default();
        let compiler = compiler(gateway);
        let compiled = compiler
            .compile("home", &wrap("<h1>hello</h1>"))
            .await
            .unwrap();
        assert_eq!(compiled.mode, CompileMode::NoChunked);
        assert!(compiled.waited.is_empty());
        assert!(compiled.chunked.is_empty());
        assert!(compiled.shell().contains("<h1>hello</h1>"));
    }

    #[tokio::test]
    async fn unfetched_fragment_renders_content_not_found() {
        let gateway = StubGatewayClient::default();
        let compiler = compiler(gateway);
        let source = wrap(r#"<fragment name="missing" from="gw"></fragment>"#);
        let compiled = compiler.compile("home", &source).await.unwrap();
        assert!(compiled.shell().contains(sentinel::CONTENT_NOT_FOUND_ERROR));
        assert!(compiled.waited.is_empty());
        assert!(compiled.chunked.is_empty());
    }

    #[tokio::test]
    async fn primary_fragment_without_should_wait_is_waited_and_tracked() {
        let gateway = StubGatewayClient::default();
        gateway.configs.lock().await.insert(
            "http://gw/main".to_string(),
            GatewayFragmentConfig {
                assets: Vec::new(),
                dependencies: Vec::new(),
                render: RenderConfig {
                    url: "/render".to_string(),
                    placeholder: false,
                    is_static: false,
                    self_replace: false,
                    timeout: None,
                },
            },
        );
        let compiler = compiler(gateway);
        let source = wrap(r#"<fragment name="main" from="gw" primary></fragment>"#);
        let compiled = compiler.compile("home", &source).await.unwrap();
        assert_eq!(compiled.primary_fragment.as_deref(), Some("main"));
        assert_eq!(compiled.waited.len(), 1);
        assert!(compiled.chunked.is_empty());
        assert!(compiled.shell().contains("{fragment|main_gw_main}"));
        assert!(compiled.shell().contains("{fragment|main_pageModel}"));
    }

    #[tokio::test]
    async fn non_waiting_non_static_fragment_is_chunked() {
        let gateway = StubGatewayClient::default();
        gateway.configs.lock().await.insert(
            "http://gw/widget".to_string(),
            GatewayFragmentConfig {
                assets: Vec::new(),
                dependencies: Vec::new(),
                render: RenderConfig {
                    url: "/render".to_string(),
                    placeholder: false,
                    is_static: false,
                    self_replace: false,
                    timeout: None,
                },
            },
        );
        let compiler = compiler(gateway);
        let source = wrap(r#"<fragment name="widget" from="gw"></fragment>"#);
        let compiled = compiler.compile("home", &source).await.unwrap();
        assert_eq!(compiled.mode, CompileMode::Chunked);
        assert_eq!(compiled.chunked.len(), 1);
        assert!(compiled.shell().contains("puzzle-chunk=\"widget_main\""));
    }

    #[tokio::test]
    async fn static_render_config_fetches_html_inline() {
        let gateway = StubGatewayClient::default();
        gateway.configs.lock().await.insert(
            "http://gw/footer".to_string(),
            GatewayFragmentConfig {
                assets: Vec::new(),
                dependencies: Vec::new(),
                render: RenderConfig {
                    url: "/render".to_string(),
                    placeholder: false,
                    is_static: true,
                    self_replace: false,
                    timeout: None,
                },
            },
        );
        gateway.renders.lock().await.insert(
            "http://gw/footer".to_string(),
            crate::model::GatewayRenderResponse {
                status: 200,
                headers: Vec::new(),
                html: HashMap::from([("main".to_string(), "<p>footer</p>".to_string())]),
                model: None,
            },
        );
        let compiler = compiler(gateway);
        let source = wrap(r#"<fragment name="footer" from="gw"></fragment>"#);
        let compiled = compiler.compile("home", &source).await.unwrap();
        assert!(compiled.shell().contains("<p>footer</p>"));
        assert!(compiled.waited.is_empty());
        assert!(compiled.chunked.is_empty());
    }

    #[tokio::test]
    async fn two_primary_fragments_is_rejected() {
        let gateway = StubGatewayClient::default();
        let compiler = compiler(gateway);
        let source = wrap(
            r#"<fragment name="a" from="gw" primary></fragment><fragment name="b" from="gw" primary></fragment>"#,
        );
        let err = compiler.compile("home", &source).await.unwrap_err();
        assert!(matches!(err, CompileError::MultiplePrimaryFragments(_, _)));
    }
}
