//! Chunk Streamer: fires one fetch per chunked fragment, and as each
//! completes renders it into an HTML chunk containing content + a
//! client-side move script, in fetch-completion order rather than
//! declaration order.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{Stream, unfold};

use crate::compiler::ChunkedFragmentPlan;
use crate::gateway::GatewayClient;
use crate::handler::waited::render_model_script;
use crate::hooks::PageHooks;
use crate::model::{GatewayRenderResponse, ReplaceItemType};
use crate::sentinel::CONTENT_NOT_FOUND_ERROR;

const DEBUG_CHUNK_OPEN: &str = "<!-- puzzle-chunk-start -->";
const DEBUG_CHUNK_CLOSE: &str = "<!-- puzzle-chunk-end -->";

/// Fires one fetch per chunked fragment as `tokio::spawn`ed tasks — started
/// immediately, not lazily on first poll — and returns a stream yielding
/// each rendered chunk as its fetch completes. Since the fetches race each
/// other to push onto the same channel, the stream's order is naturally
/// fetch-completion order rather than declaration order, and the spawned
/// tasks run concurrently with whatever the caller awaits next (namely the
/// waited-fragment resolver), rather than only starting once something
/// polls this stream. Each yielded chunk has already been passed through
/// `hooks.on_chunk`.
pub fn stream(
    gateway: Arc<dyn GatewayClient>,
    plans: Vec<ChunkedFragmentPlan>,
    default_timeout: Duration,
    debug: bool,
    hooks: Arc<dyn PageHooks>,
) -> Pin<Box<dyn Stream<Item = String> + Send>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    for plan in plans {
        let gateway = gateway.clone();
        let hooks = hooks.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = fetch_one(&gateway, &plan, default_timeout).await;
            let html = render_chunk(&plan, &response, debug);
            hooks.on_chunk(&html).await;
            let _ = tx.send(html);
        });
    }
    drop(tx);

    Box::pin(unfold(rx, |mut rx| async move {
        rx.recv().await.map(|html| (html, rx))
    }))
}

async fn fetch_one(
    gateway: &Arc<dyn GatewayClient>,
    plan: &ChunkedFragmentPlan,
    default_timeout: Duration,
) -> GatewayRenderResponse {
    let Some(cfg) = &plan.descriptor.config else {
        return GatewayRenderResponse::failed();
    };
    let timeout = cfg
        .render
        .timeout
        .map(Duration::from_millis)
        .unwrap_or(default_timeout);
    gateway
        .fetch_render(
            &plan.descriptor.fragment_url,
            &cfg.render.url,
            &plan.replace_set.fragment_attributes,
            timeout,
        )
        .await
        .unwrap_or_else(|_| GatewayRenderResponse::failed())
}

fn render_chunk(plan: &ChunkedFragmentPlan, response: &GatewayRenderResponse, debug: bool) -> String {
    let mut out = String::new();
    if debug {
        out.push_str(DEBUG_CHUNK_OPEN);
    }
    out.push_str(&render_model_script(response));
    out.push_str(&plan.content_start_html);

    let self_replace = plan
        .descriptor
        .config
        .as_ref()
        .map(|c| c.render.self_replace)
        .unwrap_or(false);

    for item in &plan.replace_set.replace_items {
        if item.item_type != ReplaceItemType::ChunkedContent {
            continue;
        }
        let content = response
            .html
            .get(&item.partial)
            .cloned()
            .unwrap_or_else(|| CONTENT_NOT_FOUND_ERROR.to_string());
        let key = &item.key;
        out.push_str(&format!(
            "<div style=\"display: none;\" puzzle-fragment=\"{}\" puzzle-chunk-key=\"{}\">{}</div>",
            plan.descriptor.name, key, content
        ));
        let omit_mover = item.partial == "main" && self_replace;
        if !omit_mover {
            out.push_str(&format!(
                "<script>$p('[puzzle-chunk=\"{key}\"]','[puzzle-chunk-key=\"{key}\"]');</script>"
            ));
        }
    }

    out.push_str(&plan.content_end_html);
    if debug {
        out.push_str(DEBUG_CHUNK_CLOSE);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::stub::StubGatewayClient;
    use crate::hooks::DefaultPageHooks;
    use crate::model::{FragmentDescriptor, GatewayFragmentConfig, RenderConfig, ReplaceItem, ReplaceSet};
    use futures::stream::StreamExt;
    use std::collections::HashMap;

    fn plan(name: &str, self_replace: bool) -> ChunkedFragmentPlan {
        let mut replace_set = ReplaceSet::for_fragment(name);
        replace_set.replace_items.push(ReplaceItem {
            item_type: ReplaceItemType::ChunkedContent,
            key: format!("{name}_main"),
            partial: "main".to_string(),
        });
        ChunkedFragmentPlan {
            descriptor: FragmentDescriptor {
                name: name.to_string(),
                from: "gw".to_string(),
                config: Some(GatewayFragmentConfig {
                    assets: Vec::new(),
                    dependencies: Vec::new(),
                    render: RenderConfig {
                        url: "/render".to_string(),
                        placeholder: false,
                        is_static: false,
                        self_replace,
                        timeout: None,
                    },
                }),
                primary: false,
                should_wait: false,
                fragment_url: format!("http://gw/{name}"),
            },
            replace_set,
            content_start_html: String::new(),
            content_end_html: String::new(),
        }
    }

    #[tokio::test]
    async fn self_replace_main_omits_mover_script() {
        let stub = StubGatewayClient::default();
        stub.renders.lock().await.insert(
            "http://gw/widget".to_string(),
            GatewayRenderResponse {
                status: 200,
                headers: Vec::new(),
                html: HashMap::from([("main".to_string(), "<p>hi</p>".to_string())]),
                model: None,
            },
        );
        let gateway: Arc<dyn GatewayClient> = Arc::new(stub);
        let plans = vec![plan("widget", true)];
        let mut stream = stream(
            gateway,
            plans,
            Duration::from_secs(1),
            false,
            Arc::new(DefaultPageHooks),
        );
        let chunk = stream.next().await.unwrap();
        assert!(chunk.contains("<p>hi</p>"));
        assert!(!chunk.contains("$p("));
    }

    #[tokio::test]
    async fn non_self_replace_emits_mover_script() {
        let stub = StubGatewayClient::default();
        stub.renders.lock().await.insert(
            "http://gw/widget".to_string(),
            GatewayRenderResponse {
                status: 200,
                headers: Vec::new(),
                html: HashMap::from([("main".to_string(), "<p>hi</p>".to_string())]),
                model: None,
            },
        );
        let gateway: Arc<dyn GatewayClient> = Arc::new(stub);
        let plans = vec![plan("widget", false)];
        let mut stream = stream(
            gateway,
            plans,
            Duration::from_secs(1),
            false,
            Arc::new(DefaultPageHooks),
        );
        let chunk = stream.next().await.unwrap();
        assert!(chunk.contains("$p('[puzzle-chunk=\"widget_main\"]'"));
    }

    #[tokio::test]
    async fn failed_fetch_renders_content_not_found() {
        let gateway: Arc<dyn GatewayClient> = Arc::new(StubGatewayClient::default());
        let plans = vec![plan("widget", false)];
        let mut stream = stream(
            gateway,
            plans,
            Duration::from_secs(1),
            false,
            Arc::new(DefaultPageHooks),
        );
        let chunk = stream.next().await.unwrap();
        assert!(chunk.contains(CONTENT_NOT_FOUND_ERROR));
    }
}
