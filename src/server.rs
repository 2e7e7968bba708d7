//! Axum wiring: template routing, the in-process static stylesheet router,
//! and the server bootstrap.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::compiler::{CompiledTemplate, TemplateCompiler};
use crate::config::AppConfig;
use crate::gateway::GatewayClient;
use crate::handler::{self, DebugOptions};
use crate::hooks::{PageHooksRegistry, RequestMeta};
use crate::stylesheet::StylesheetBundle;

pub struct AppState {
    pub config: AppConfig,
    pub gateway: Arc<dyn GatewayClient>,
    pub hooks: PageHooksRegistry,
    pub templates: HashMap<String, CompiledTemplate>,
    pub stylesheets: HashMap<String, StylesheetBundle>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn GatewayClient>,
        hooks: PageHooksRegistry,
        templates: HashMap<String, CompiledTemplate>,
    ) -> Self {
        let stylesheets = templates
            .iter()
            .filter_map(|(name, template)| {
                template.stylesheet.clone().map(|bundle| (name.clone(), bundle))
            })
            .collect();
        Self {
            config,
            gateway,
            hooks,
            templates,
            stylesheets,
        }
    }
}

/// Compiles every `*.html` template under `template_root`, keyed by file stem.
pub async fn compile_templates(
    compiler: &TemplateCompiler,
    template_root: &FsPath,
) -> anyhow::Result<HashMap<String, CompiledTemplate>> {
    let mut out = HashMap::new();
    let mut entries = tokio::fs::read_dir(template_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let raw = tokio::fs::read_to_string(&path).await?;
        match compiler.compile(&name, &raw).await {
            Ok(compiled) => {
                tracing::info!(template = %name, mode = ?compiled.mode, "compiled template");
                out.insert(name, compiled);
            }
            Err(err) => {
                tracing::error!(template = %name, %err, "failed to compile template");
            }
        }
    }
    Ok(out)
}

pub fn router(state: Arc<AppState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    let mut app = Router::new()
        .route("/static/{file}", get(serve_stylesheet))
        .route("/", get(dispatch))
        .route("/{*path}", get(dispatch))
        .layer(middleware);

    if state.config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(state)
}

async fn dispatch(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let path = uri.path();
    let name = template_name_for_path(path);
    let Some(template) = state.templates.get(&name) else {
        return (StatusCode::NOT_FOUND, "template not found").into_response();
    };
    let hooks = state.hooks.resolve(&name);
    let debug_options = DebugOptions {
        enabled: state.config.debug,
        debugger_link: state.config.debugger_link.clone(),
    };
    let meta = RequestMeta {
        path: path.to_string(),
        method: "GET".to_string(),
    };
    handler::handle(template, state.gateway.clone(), hooks, &debug_options, meta).await
}

fn template_name_for_path(path: &str) -> String {
    if path == "/" {
        "index".to_string()
    } else {
        path.trim_start_matches('/').to_string()
    }
}

async fn serve_stylesheet(State(state): State<Arc<AppState>>, Path(file): Path<String>) -> Response {
    let Some(template_name) = file.strip_suffix(".min.css") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(bundle) = state.stylesheets.get(template_name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut response = Response::new(axum::body::Body::from(bundle.content.clone()));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));
    let cache_value = format!("public, max-age={}", state.config.static_cache_max_age);
    if let Ok(value) = HeaderValue::from_str(&cache_value) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

pub async fn run(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_maps_to_index_template() {
        assert_eq!(template_name_for_path("/"), "index");
    }

    #[test]
    fn nested_path_maps_to_its_own_name() {
        assert_eq!(template_name_for_path("/pricing"), "pricing");
    }

    #[tokio::test]
    async fn compile_templates_loads_every_html_file_in_directory() {
        use crate::gateway::ReqwestGatewayClient;
        use crate::stylesheet::LightningCssMinifier;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.html"),
            "<template><html><head></head><body><h1>hi</h1></body></html></template>",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let compiler = TemplateCompiler::new(
            Arc::new(ReqwestGatewayClient::new()),
            Arc::new(LightningCssMinifier),
            HashMap::new(),
            std::time::Duration::from_secs(5),
        );
        let templates = compile_templates(&compiler, dir.path()).await.unwrap();
        assert_eq!(templates.len(), 1);
        assert!(templates.contains_key("index"));
    }
}
