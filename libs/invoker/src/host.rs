//! Host application surface
//!
//! The invoker never owns the objects it exposes. Services come from the
//! host's [`ServiceContainer`]s and product-level operations go through
//! [`Application`].

use crate::object::Object;
use dashmap::DashMap;
use driver_types::ProductVersion;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Lookup of service instances by registered type name
pub trait ServiceContainer: Send + Sync {
    fn service(&self, type_name: &str) -> Option<Object>;
}

/// The driven application
pub trait Application: ServiceContainer {
    fn product_version(&self) -> ProductVersion;

    fn is_initialized(&self) -> bool;

    /// Ask the application to shut down
    fn exit(&self);

    fn take_screenshot(&self, out_folder: Option<&str>);
}

/// Concurrent type name → service instance map
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Object>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_name: impl Into<String>, service: Object) {
        self.services.insert(type_name.into(), service);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceContainer for ServiceRegistry {
    fn service(&self, type_name: &str) -> Option<Object> {
        self.services.get(type_name).map(|entry| entry.value().clone())
    }
}

pub type ScreenshotAction = Arc<dyn Fn(Option<&str>) + Send + Sync>;
pub type ExitHook = Arc<dyn Fn() + Send + Sync>;

/// In-process [`Application`] for embedding and tests
pub struct StandaloneApplication {
    version: ProductVersion,
    initialized: AtomicBool,
    exit_requested: AtomicBool,
    services: ServiceRegistry,
    screenshot: ScreenshotAction,
    on_exit: ExitHook,
}

impl StandaloneApplication {
    pub fn new(version: ProductVersion) -> Self {
        Self {
            version,
            initialized: AtomicBool::new(false),
            exit_requested: AtomicBool::new(false),
            services: ServiceRegistry::new(),
            screenshot: Arc::new(|out_folder: Option<&str>| {
                info!(out_folder = ?out_folder, "Screenshot requested");
            }),
            on_exit: Arc::new(|| {}),
        }
    }

    pub fn with_screenshot_action(mut self, action: ScreenshotAction) -> Self {
        self.screenshot = action;
        self
    }

    pub fn with_exit_hook(mut self, hook: ExitHook) -> Self {
        self.on_exit = hook;
        self
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::SeqCst)
    }
}

impl ServiceContainer for StandaloneApplication {
    fn service(&self, type_name: &str) -> Option<Object> {
        self.services.service(type_name)
    }
}

impl Application for StandaloneApplication {
    fn product_version(&self) -> ProductVersion {
        self.version.clone()
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn exit(&self) {
        if !self.exit_requested.swap(true, Ordering::SeqCst) {
            info!("Application exit requested");
            (self.on_exit)();
        }
    }

    fn take_screenshot(&self, out_folder: Option<&str>) {
        (self.screenshot)(out_folder);
    }
}

impl std::fmt::Debug for StandaloneApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandaloneApplication")
            .field("version", &self.version)
            .field("initialized", &self.is_initialized())
            .field("services", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_types::Value;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_service_lookup() {
        let app = StandaloneApplication::new(ProductVersion::default());
        app.services().register("demo.Index", Object::from(Value::Int(1)));
        assert!(app.service("demo.Index").is_some());
        assert!(app.service("demo.Missing").is_none());
    }

    #[test]
    fn test_exit_hook_runs_once() {
        let exits = Arc::new(AtomicUsize::new(0));
        let counter = exits.clone();
        let app = StandaloneApplication::new(ProductVersion::default()).with_exit_hook(Arc::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));
        app.exit();
        app.exit();
        assert!(app.exit_requested());
        assert_eq!(exits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_screenshot_action_receives_folder() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let app = StandaloneApplication::new(ProductVersion::default()).with_screenshot_action(
            Arc::new(move |folder: Option<&str>| sink.lock().push(folder.map(str::to_string))),
        );
        app.take_screenshot(Some("/tmp/shots"));
        app.take_screenshot(None);
        assert_eq!(*seen.lock(), vec![Some("/tmp/shots".to_string()), None]);
    }

    #[test]
    fn test_initialization_flag() {
        let app = StandaloneApplication::new(ProductVersion::default());
        assert!(!app.is_initialized());
        app.mark_initialized();
        assert!(app.is_initialized());
    }
}
