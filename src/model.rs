use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved `<fragment>` attributes that are never forwarded to the upstream gateway.
pub const RESERVED_ATTRIBUTES: &[&str] = &["from", "name", "partial", "primary", "shouldwait"];

/// A single `<fragment>` element found while walking the template.
#[derive(Debug, Clone)]
pub struct FragmentOccurrence {
    pub name: String,
    pub from: String,
    pub partial: String,
    pub primary: bool,
    pub should_wait: bool,
    pub in_head: bool,
    pub attributes: HashMap<String, String>,
}

impl FragmentOccurrence {
    /// Attributes forwarded as query parameters to the upstream, i.e. everything
    /// except the reserved set.
    pub fn forwarded_attributes(&self) -> HashMap<String, String> {
        self.attributes
            .iter()
            .filter(|(k, _)| !RESERVED_ATTRIBUTES.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetLocation {
    Head,
    BodyStart,
    ContentStart,
    ContentEnd,
    BodyEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectType {
    External,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteType {
    Sync,
    Async,
    Defer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Script,
    Style,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetSpec {
    pub name: String,
    pub location: String,
    #[serde(rename = "type", default = "default_asset_kind")]
    pub kind: String,
    #[serde(rename = "injectType")]
    pub inject_type: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "executeType", default)]
    pub execute_type: Option<String>,
}

fn default_asset_kind() -> String {
    "js".to_string()
}

/// A parsed, planner-ready asset descriptor.
///
/// `location` is the full spec-named taxonomy (head/body-start/content-start/
/// content-end/body-end); an unrecognized location has no error marker named
/// in spec §7 and is simply dropped (`None`). `inject_type` is the one field
/// spec §7's `UNKNOWN_INJECT_TYPE` taxonomy entry actually names, so an
/// unrecognized value is carried as `Err` for the renderer to turn into the
/// HTML comment marker.
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    pub name: String,
    pub location: Option<AssetLocation>,
    pub kind: AssetKind,
    pub inject_type: Result<InjectType, String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub execute_type: ExecuteType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencySpec {
    pub name: String,
    pub link: String,
}

/// Fetched from the upstream gateway. Drives fragment classification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    pub url: String,
    #[serde(default)]
    pub placeholder: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "selfReplace")]
    pub self_replace: bool,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayFragmentConfig {
    #[serde(default)]
    pub assets: Vec<AssetSpec>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    pub render: RenderConfig,
}

/// In-memory record of a declared fragment, joined with gateway config once available.
#[derive(Debug, Clone)]
pub struct FragmentDescriptor {
    pub name: String,
    pub from: String,
    pub config: Option<GatewayFragmentConfig>,
    pub primary: bool,
    pub should_wait: bool,
    pub fragment_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentClass {
    Waited,
    Chunked,
    Static,
    Unfetched,
}

impl FragmentDescriptor {
    pub fn classify(&self) -> FragmentClass {
        match &self.config {
            None => FragmentClass::Unfetched,
            Some(cfg) if self.should_wait => {
                if cfg.render.is_static {
                    FragmentClass::Static
                } else {
                    FragmentClass::Waited
                }
            }
            Some(cfg) if cfg.render.is_static => FragmentClass::Static,
            Some(_) => FragmentClass::Chunked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceItemType {
    Content,
    ChunkedContent,
    Placeholder,
    ModelScript,
}

#[derive(Debug, Clone)]
pub struct ReplaceItem {
    pub item_type: ReplaceItemType,
    pub key: String,
    pub partial: String,
}

/// Built once at compile time and reused across every request.
#[derive(Debug, Clone, Default)]
pub struct ReplaceSet {
    pub fragment: String,
    pub replace_items: Vec<ReplaceItem>,
    pub fragment_attributes: HashMap<String, String>,
}

impl ReplaceSet {
    pub fn for_fragment(name: &str) -> Self {
        Self {
            fragment: name.to_string(),
            ..Default::default()
        }
    }
}

/// The upstream's response to a `render` fetch.
#[derive(Debug, Clone, Default)]
pub struct GatewayRenderResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub html: HashMap<String, String>,
    pub model: Option<serde_json::Map<String, serde_json::Value>>,
}

impl GatewayRenderResponse {
    /// The canned failure payload the concurrency model requires: timeouts and
    /// transport errors are never propagated, they degrade to this.
    pub fn failed() -> Self {
        Self {
            status: 500,
            headers: Vec::new(),
            html: HashMap::new(),
            model: None,
        }
    }
}
