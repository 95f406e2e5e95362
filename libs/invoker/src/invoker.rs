//! Dispatcher
//!
//! [`Invoker::invoke`] drives one call through argument resolution, instance
//! lookup, overload resolution, execution and result shaping. The invoker is
//! `Send + Sync`; concurrent calls share nothing but the handle tables and the
//! host lock.

use crate::error::{InvokerError, Result};
use crate::execution::{
    ApplicationLock, ExecutionContext, ProcessLock, Tracer, TracerFactory, TracingTracer,
    UiDispatcher, UiExecutor,
};
use crate::host::{Application, StandaloneApplication};
use crate::modules::{ModuleResolver, PluginModules};
use crate::object::Object;
use crate::registry::{Signature, TypeRegistry};
use crate::resolver::{self, CallTarget};
use crate::session::ReferenceStore;
use crate::shaping;
use crate::DEFAULT_REF_ID_PREFIX;
use driver_types::{Argument, Call, CallKind, CallResult, OnDispatcher, ProductVersion, Ref};
use std::sync::Arc;
use tracing::{debug, error};

/// Default capacity of the UI executor queue
pub const DEFAULT_UI_QUEUE_CAPACITY: usize = 64;

pub struct Invoker {
    store: ReferenceStore,
    modules: Arc<dyn ModuleResolver>,
    application: Arc<dyn Application>,
    execution: ExecutionContext,
}

impl Invoker {
    /// Builder over a root registry with no plugins
    pub fn builder(registry: TypeRegistry) -> InvokerBuilder {
        InvokerBuilder::new(Arc::new(PluginModules::new(Arc::new(registry))))
    }

    /// Builder over a custom namespace resolver
    pub fn with_modules(modules: Arc<dyn ModuleResolver>) -> InvokerBuilder {
        InvokerBuilder::new(modules)
    }

    /// Execute one call and shape its result
    pub fn invoke(&self, call: &Call) -> Result<CallResult> {
        let span = tracing::debug_span!(
            "invoke",
            session_id = call.session_id,
            kind = call.kind_name(),
            type_name = %call.type_name
        );
        let _entered = span.enter();
        debug!("{}", call);

        if !self.store.has_session(call.session_id) {
            return Err(InvokerError::session_not_found(call.session_id));
        }

        let args = self.resolve_args(call)?;
        let (registry, descriptor) = self
            .modules
            .resolve_type(call.plugin_id.as_deref(), &call.type_name)?;

        match &call.kind {
            CallKind::NewInstance => {
                let constructor = resolver::resolve_constructor(&registry, &descriptor, &args)?.clone();
                let target = constructor.signature();
                resolver::ensure_compatible(&registry, &target, &constructor, &args)?;

                // Constructors ignore thread affinity
                let object = self.execution.run(
                    &target,
                    call.lock_semantics,
                    OnDispatcher::Default,
                    call.timed_span.as_deref(),
                    move || constructor.construct(&args),
                )?;
                shaping::shape(&self.store, &registry, call.session_id, object, None)
            }
            _ => {
                let method_name = call.method_name.as_deref().ok_or_else(|| {
                    InvokerError::resolution(format!(
                        "Method name is required for {} calls",
                        call.kind_name()
                    ))
                })?;
                let target = resolver::resolve_method(&registry, &descriptor, method_name, &args)?;
                let receiver = self
                    .find_instance(call, &registry, &target)
                    .inspect_err(|e| {
                        error!(call = %call, error = %e, "Unable to get instance for call");
                    })?;

                let description = target.describe();
                resolver::ensure_compatible(&registry, &description, &target.method, &args)?;

                let method = target.method;
                let returns = method.returns().clone();
                let object = self.execution.run(
                    &description,
                    call.lock_semantics,
                    call.dispatcher,
                    call.timed_span.as_deref(),
                    move || method.invoke(receiver.as_ref(), &args),
                )?;
                shaping::shape(&self.store, &registry, call.session_id, object, Some(&returns))
            }
        }
    }

    fn resolve_args(&self, call: &Call) -> Result<Vec<Object>> {
        call.args
            .iter()
            .map(|arg| match arg {
                Argument::Value { value } => Ok(Object::from(value.clone())),
                Argument::Handle { handle } => self.store.find_reference(call.session_id, &handle.id),
            })
            .collect()
    }

    /// Receiver for a method call; `None` for utility calls
    fn find_instance(
        &self,
        call: &Call,
        registry: &TypeRegistry,
        target: &CallTarget,
    ) -> Result<Option<Object>> {
        match &call.kind {
            CallKind::Service {
                scope,
                service_interface,
            } => {
                let service_type = match service_interface {
                    Some(interface) => registry
                        .find_service_interface(&call.type_name, interface)
                        .ok_or_else(|| {
                            InvokerError::resolution(format!(
                                "Type {} does not implement service interface {}",
                                call.type_name, interface
                            ))
                        })?,
                    None => call.type_name.clone(),
                };

                let scoped = match scope {
                    Some(scope) => {
                        let scope_object = self.store.find_reference(call.session_id, &scope.id)?;
                        scope_object
                            .as_instance()
                            .and_then(|instance| instance.services().map(|s| s.service(&service_type)))
                    }
                    None => None,
                };

                let service = match scoped {
                    Some(found) => found,
                    None => self.application.service(&service_type),
                };
                service
                    .map(Some)
                    .ok_or_else(|| InvokerError::resolution(format!("No service {} registered", service_type)))
            }
            CallKind::Ref { target: handle } => {
                let receiver = self.store.find_reference(call.session_id, &handle.id)?;
                if let Some(actual) = receiver.runtime_type() {
                    if !registry.is_assignable(actual, &call.type_name) {
                        return Err(InvokerError::argument_type_mismatch(
                            format!("receiver of {}", target.describe()),
                            vec![call.type_name.clone()],
                            vec![actual.to_string()],
                        ));
                    }
                }
                Ok(Some(receiver))
            }
            CallKind::Utility => {
                if !target.method.is_static() {
                    return Err(InvokerError::resolution(format!(
                        "Method {} is not static",
                        target.describe()
                    )));
                }
                Ok(None)
            }
            CallKind::NewInstance => Ok(None),
        }
    }

    pub fn new_session(&self) -> u32 {
        self.store.new_session()
    }

    pub fn new_session_with_id(&self, session_id: u32) -> Result<()> {
        self.store.new_session_with_id(session_id)
    }

    pub fn cleanup(&self, session_id: u32) {
        self.store.cleanup(session_id)
    }

    pub fn put_reference(&self, session_id: u32, object: Object) -> Result<Ref> {
        self.store.put_reference(session_id, object)
    }

    pub fn put_adhoc_reference(&self, object: Object) -> Result<Ref> {
        self.store.put_adhoc_reference(object)
    }

    pub fn find_reference(&self, session_id: u32, id: &str) -> Result<Object> {
        self.store.find_reference(session_id, id)
    }

    pub fn store(&self) -> &ReferenceStore {
        &self.store
    }

    pub fn execution(&self) -> &ExecutionContext {
        &self.execution
    }

    pub fn product_version(&self) -> ProductVersion {
        self.application.product_version()
    }

    pub fn is_application_initialized(&self) -> bool {
        self.application.is_initialized()
    }

    pub fn exit(&self) {
        self.application.exit()
    }

    pub fn take_screenshot(&self, out_folder: Option<&str>) {
        self.application.take_screenshot(out_folder)
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("store", &self.store)
            .field("execution", &self.execution)
            .finish()
    }
}

pub struct InvokerBuilder {
    modules: Arc<dyn ModuleResolver>,
    application: Option<Arc<dyn Application>>,
    lock: Option<Arc<dyn ApplicationLock>>,
    ui: Option<Arc<dyn UiDispatcher>>,
    tracer_factory: Option<TracerFactory>,
    ref_id_prefix: String,
    ui_queue_capacity: usize,
}

impl InvokerBuilder {
    fn new(modules: Arc<dyn ModuleResolver>) -> Self {
        Self {
            modules,
            application: None,
            lock: None,
            ui: None,
            tracer_factory: None,
            ref_id_prefix: DEFAULT_REF_ID_PREFIX.to_string(),
            ui_queue_capacity: DEFAULT_UI_QUEUE_CAPACITY,
        }
    }

    pub fn application(mut self, application: Arc<dyn Application>) -> Self {
        self.application = Some(application);
        self
    }

    pub fn lock(mut self, lock: Arc<dyn ApplicationLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn ui_dispatcher(mut self, ui: Arc<dyn UiDispatcher>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Tracer supplier, called once on the first timed call
    pub fn tracer<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Tracer> + Send + Sync + 'static,
    {
        self.tracer_factory = Some(Arc::new(factory));
        self
    }

    pub fn ref_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ref_id_prefix = prefix.into();
        self
    }

    pub fn ui_queue_capacity(mut self, capacity: usize) -> Self {
        self.ui_queue_capacity = capacity;
        self
    }

    /// Fails only when the default UI thread cannot be spawned
    pub fn build(self) -> std::io::Result<Invoker> {
        let ui: Arc<dyn UiDispatcher> = match self.ui {
            Some(ui) => ui,
            None => Arc::new(UiExecutor::start(self.ui_queue_capacity)?),
        };
        let tracer_factory = self
            .tracer_factory
            .unwrap_or_else(|| Arc::new(|| Arc::new(TracingTracer::current()) as Arc<dyn Tracer>));
        let execution = ExecutionContext::new(
            self.lock.unwrap_or_else(|| Arc::new(ProcessLock::new())),
            ui,
            tracer_factory,
        );
        let application = self
            .application
            .unwrap_or_else(|| Arc::new(StandaloneApplication::new(ProductVersion::default())));

        debug!(ref_id_prefix = %self.ref_id_prefix, "Invoker ready");
        Ok(Invoker {
            store: ReferenceStore::new(self.ref_id_prefix),
            modules: self.modules,
            application,
            execution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::RemoteObject;
    use crate::registry::TypeDescriptor;
    use driver_types::Value;

    #[derive(Debug)]
    struct Counter(i64);

    impl RemoteObject for Counter {
        fn type_name(&self) -> &str {
            "demo.Counter"
        }
    }

    fn invoker() -> Invoker {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::builder("demo.Counter")
                .constructor(&["int"], |args| {
                    Ok(Object::instance(Counter(args[0].as_value().map_or(Ok(0), Value::as_int)?)))
                })
                .method("get", &[], "int", |this, _| {
                    let counter = this
                        .downcast_ref::<Counter>()
                        .ok_or_else(|| crate::CallFault::illegal_state("not a counter"))?;
                    Ok(Object::from(Value::Int(counter.0)))
                })
                .static_method("zero", &[], "int", |_| Ok(Object::from(Value::Int(0))))
                .build(),
        );
        Invoker::builder(registry).ref_id_prefix("c-").build().unwrap()
    }

    #[test]
    fn test_construct_then_call_by_handle() {
        let invoker = invoker();
        let session = invoker.new_session();
        let created = invoker
            .invoke(&Call::new_instance(session, "demo.Counter").arg(Value::Int(5)))
            .unwrap();
        let handle = created.as_handle().unwrap().clone();
        assert!(handle.id.starts_with("c-"));

        let result = invoker
            .invoke(&Call::on_ref(session, handle, "demo.Counter", "get"))
            .unwrap();
        assert_eq!(result, CallResult::value(Value::Int(5)));
    }

    #[test]
    fn test_utility_requires_static_method() {
        let invoker = invoker();
        let session = invoker.new_session();
        let ok = invoker.invoke(&Call::utility(session, "demo.Counter", "zero")).unwrap();
        assert_eq!(ok, CallResult::value(Value::Int(0)));

        let err = invoker
            .invoke(&Call::utility(session, "demo.Counter", "get"))
            .unwrap_err();
        assert_eq!(err.category(), "resolution");
    }

    #[test]
    fn test_unknown_session_is_rejected() {
        let invoker = invoker();
        let err = invoker
            .invoke(&Call::utility(77, "demo.Counter", "zero"))
            .unwrap_err();
        assert!(matches!(err, InvokerError::SessionNotFound { session_id: 77 }));
    }

    #[test]
    fn test_missing_service() {
        let invoker = invoker();
        let session = invoker.new_session();
        let err = invoker
            .invoke(&Call::service(session, "demo.Counter", "get"))
            .unwrap_err();
        assert_eq!(err.to_string(), "No service demo.Counter registered");
    }
}
