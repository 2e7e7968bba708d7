//! Streaming Request Handler: selects Mode A (no chunked fragments) or Mode
//! B (chunked) at request time based on the template's compiled mode, drives
//! the Waited-Replacement Resolver and Chunk Streamer, and applies debug-mode
//! instrumentation.

pub mod chunked;
pub mod waited;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use crate::compiler::{CompiledTemplate, CompileMode};
use crate::debug;
use crate::gateway::GatewayClient;
use crate::hooks::{PageHooks, RequestMeta};

#[derive(Debug, Clone)]
pub struct DebugOptions {
    pub enabled: bool,
    pub debugger_link: String,
}

pub async fn handle(
    template: &CompiledTemplate,
    gateway: Arc<dyn GatewayClient>,
    hooks: Arc<dyn PageHooks>,
    debug_options: &DebugOptions,
    meta: RequestMeta,
) -> Response {
    hooks.on_request(&meta).await;

    let response = match template.mode {
        CompileMode::NoChunked => mode_a(template, &gateway, debug_options).await,
        CompileMode::Chunked => mode_b(template, gateway, hooks.clone(), debug_options).await,
    };

    hooks.on_response_end().await;
    response
}

async fn mode_a(
    template: &CompiledTemplate,
    gateway: &Arc<dyn GatewayClient>,
    debug_options: &DebugOptions,
) -> Response {
    let resolution = waited::resolve(
        gateway,
        template.shell(),
        &template.waited,
        template.primary_fragment.as_deref(),
        template.default_timeout,
    )
    .await;

    if resolution.status == 301 {
        return response_with_headers(StatusCode::MOVED_PERMANENTLY, &resolution.headers, Body::empty());
    }

    let mut body = resolution.body;
    if debug_options.enabled {
        body = debug::insert_before_head_close(
            &body,
            &debug::debugger_head_html(&debug_options.debugger_link, &fragment_debug_map(template)),
        );
        body = debug::insert_before_body_close(&body, debug::ANALYTICS_CLOSE_SCRIPT);
    }

    let status = StatusCode::from_u16(resolution.status).unwrap_or(StatusCode::OK);
    response_with_headers(status, &resolution.headers, Body::from(body))
}

async fn mode_b(
    template: &CompiledTemplate,
    gateway: Arc<dyn GatewayClient>,
    hooks: Arc<dyn PageHooks>,
    debug_options: &DebugOptions,
) -> Response {
    let stripped = strip_body_close(template.shell());

    // `chunked::stream` spawns one task per chunked fragment immediately —
    // not lazily on first poll — so building it before awaiting the waited
    // resolver fires both sides of spec §4.2 step 4's "N chunked fetches + 1
    // waited-batch resolver" in parallel instead of serializing them.
    let chunk_stream = chunked::stream(
        gateway.clone(),
        template.chunked.clone(),
        template.default_timeout,
        debug_options.enabled,
        hooks,
    );

    let resolution = waited::resolve(
        &gateway,
        &stripped,
        &template.waited,
        template.primary_fragment.as_deref(),
        template.default_timeout,
    )
    .await;

    if resolution.status == 301 {
        return response_with_headers(StatusCode::MOVED_PERMANENTLY, &resolution.headers, Body::empty());
    }

    let mut first_flush = resolution.body;
    if debug_options.enabled {
        first_flush = debug::insert_before_head_close(
            &first_flush,
            &debug::debugger_head_html(&debug_options.debugger_link, &fragment_debug_map(template)),
        );
    }

    let body_end = template.body_end_html.clone();
    let analytics = if debug_options.enabled {
        debug::ANALYTICS_CLOSE_SCRIPT.to_string()
    } else {
        String::new()
    };

    let head_item = stream::once(async move { first_flush });
    let tail_item = stream::once(async move { format!("{body_end}{analytics}</body></html>") });
    let body_stream = head_item
        .chain(chunk_stream)
        .chain(tail_item)
        .map(|s| Ok::<_, std::convert::Infallible>(Bytes::from(s)));

    let mut response = Response::new(Body::from_stream(body_stream));
    *response.status_mut() = StatusCode::from_u16(resolution.status).unwrap_or(StatusCode::OK);
    apply_headers(response.headers_mut(), &resolution.headers);
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=UTF-8"),
    );
    response
}

fn fragment_debug_map(template: &CompiledTemplate) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for plan in &template.waited {
        map.insert(plan.descriptor.name.clone(), plan.descriptor.from.clone());
    }
    for plan in &template.chunked {
        map.insert(plan.descriptor.name.clone(), plan.descriptor.from.clone());
    }
    map
}

/// Mode B's first flush is the shell minus its trailing `</body></html>`,
/// which is re-appended only after every chunked fetch completes.
fn strip_body_close(shell: &str) -> String {
    match shell.rfind("</body></html>") {
        Some(pos) => shell[..pos].to_string(),
        None => shell.to_string(),
    }
}

fn response_with_headers(status: StatusCode, headers: &[(String, String)], body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    apply_headers(response.headers_mut(), headers);
    response
}

fn apply_headers(map: &mut HeaderMap, headers: &[(String, String)]) {
    for (k, v) in headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(k.as_str()),
            HeaderValue::try_from(v.as_str()),
        ) {
            map.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_body_close() {
        let shell = "<html><body>hi</body></html>";
        assert_eq!(strip_body_close(shell), "<html><body>hi");
    }

    #[test]
    fn missing_body_close_is_left_untouched() {
        let shell = "<html><body>hi";
        assert_eq!(strip_body_close(shell), shell);
    }
}
