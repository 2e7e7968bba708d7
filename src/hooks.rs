//! Page Hooks: lifecycle callbacks that in the source were obtained by
//! evaluating a template-embedded script block. Per spec.md's design notes
//! this is re-architected as a statically loaded adapter — a trait object
//! resolved by template name — rather than executing template-embedded code.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub path: String,
    pub method: String,
}

#[async_trait]
pub trait PageHooks: Send + Sync {
    async fn on_create(&self) {}
    async fn on_request(&self, _req: &RequestMeta) {}
    async fn on_chunk(&self, _html: &str) {}
    async fn on_response_end(&self) {}
}

/// The base class the source rebinds a template's script export onto,
/// supplying no-op defaults for any hook the template doesn't implement.
#[derive(Default)]
pub struct DefaultPageHooks;

#[async_trait]
impl PageHooks for DefaultPageHooks {}

/// Resolves a template name to its hooks implementation. Templates without a
/// registered adapter fall back to `DefaultPageHooks`.
#[derive(Default, Clone)]
pub struct PageHooksRegistry {
    adapters: HashMap<String, Arc<dyn PageHooks>>,
}

impl PageHooksRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template's hooks adapter, invoking `on_create` once —
    /// the equivalent of the source instantiating the page class the first
    /// time its script export is evaluated.
    pub async fn register(&mut self, template_name: &str, hooks: Arc<dyn PageHooks>) {
        hooks.on_create().await;
        self.adapters.insert(template_name.to_string(), hooks);
    }

    pub fn resolve(&self, template_name: &str) -> Arc<dyn PageHooks> {
        self.adapters
            .get(template_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultPageHooks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHooks {
        created: std::sync::atomic::AtomicUsize,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl PageHooks for CountingHooks {
        async fn on_create(&self) {
            self.created.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        async fn on_request(&self, _req: &RequestMeta) {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn unregistered_template_gets_default_noop_hooks() {
        let registry = PageHooksRegistry::new();
        let hooks = registry.resolve("missing");
        hooks.on_request(&RequestMeta::default()).await;
    }

    #[tokio::test]
    async fn registered_template_resolves_custom_hooks() {
        let mut registry = PageHooksRegistry::new();
        let counting = Arc::new(CountingHooks {
            created: std::sync::atomic::AtomicUsize::new(0),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        registry.register("home", counting.clone()).await;
        let hooks = registry.resolve("home");
        hooks.on_request(&RequestMeta::default()).await;
        assert_eq!(counting.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn register_invokes_on_create_once() {
        let mut registry = PageHooksRegistry::new();
        let counting = Arc::new(CountingHooks {
            created: std::sync::atomic::AtomicUsize::new(0),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        registry.register("home", counting.clone()).await;
        assert_eq!(counting.created.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
