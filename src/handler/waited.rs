//! Waited-Replacement Resolver: fetches every waited fragment in parallel,
//! substitutes sentinels in the precompiled shell, and derives the response
//! status/headers from the primary fragment's upstream response.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::compiler::WaitedFragmentPlan;
use crate::gateway::GatewayClient;
use crate::model::{GatewayRenderResponse, ReplaceItemType};
use crate::sentinel::{self, CONTENT_NOT_FOUND_ERROR};

pub struct WaitedResolution {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

pub async fn resolve(
    gateway: &Arc<dyn GatewayClient>,
    shell: &str,
    plans: &[WaitedFragmentPlan],
    primary_fragment: Option<&str>,
    default_timeout: Duration,
) -> WaitedResolution {
    let responses = join_all(
        plans
            .iter()
            .map(|plan| fetch_one(gateway, plan, default_timeout)),
    )
    .await;

    let mut status = 200u16;
    let mut headers = Vec::new();
    let mut body = shell.to_string();

    for (plan, response) in plans.iter().zip(responses.iter()) {
        if Some(plan.descriptor.name.as_str()) == primary_fragment {
            status = response.status;
            headers = response.headers.clone();
        }
        body = apply_replace_items(body, plan, response);
    }

    WaitedResolution {
        status,
        headers,
        body,
    }
}

async fn fetch_one(
    gateway: &Arc<dyn GatewayClient>,
    plan: &WaitedFragmentPlan,
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

fn apply_replace_items(
    mut body: String,
    plan: &WaitedFragmentPlan,
    response: &GatewayRenderResponse,
) -> String {
    for item in &plan.replace_set.replace_items {
        let value = match item.item_type {
            ReplaceItemType::ModelScript => render_model_script(response),
            ReplaceItemType::Content => response
                .html
                .get(&item.partial)
                .cloned()
                .unwrap_or_else(|| CONTENT_NOT_FOUND_ERROR.to_string()),
            ReplaceItemType::ChunkedContent | ReplaceItemType::Placeholder => continue,
        };
        body = sentinel::substitute(&body, &item.key, &value);
    }
    body
}

/// `window['{k}']=window['{k}']||{json};` per model key, emitted once per
/// fragment when its response carries a model.
pub fn render_model_script(response: &GatewayRenderResponse) -> String {
    let Some(model) = &response.model else {
        return String::new();
    };
    if model.is_empty() {
        return String::new();
    }
    let mut script = String::from("<script>");
    for (key, value) in model {
        let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
        script.push_str(&format!("window['{key}']=window['{key}']||{json};"));
    }
    script.push_str("</script>");
    script
}
