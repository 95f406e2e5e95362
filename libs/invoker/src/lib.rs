//! # Remote Driver Invoker
//!
//! In-process dispatcher for calls issued by an external test controller. The
//! controller names types and methods; the invoker resolves them against a
//! [`TypeRegistry`], executes them under the requested lock and thread
//! affinity, and hands back either data or opaque handles to live objects.
//!
//! ## Architecture
//!
//! ```text
//!   Call ──▶ Invoker::invoke
//!              │
//!              ├─▶ ReferenceStore     handle args → live objects
//!              ├─▶ instance lookup    constructor | service | handle | none
//!              ├─▶ resolver           arity → compatibility scan → first fallback
//!              ├─▶ ExecutionContext   lock mode, UI rendezvous, timed span
//!              └─▶ shaping            Value | Handle | HandleList
//! ```
//!
//! ## Handle Lifetimes
//!
//! Every session owns a strong table; the global session (id 0) mirrors every
//! handle weakly. A handle stays resolvable while its session lives, and after
//! that only for as long as something else keeps the object alive:
//!
//! ```text
//!   put_reference(s, obj)  ──▶  session s: id → Arc<obj>
//!                          └─▶  global  : id → Weak<obj>
//!   cleanup(s)             ──▶  drop session s, sweep dead global entries
//! ```
//!
//! ## Example
//!
//! ```rust
//! use driver_invoker::{Invoker, TypeRegistry, TypeDescriptor, Object};
//! use driver_types::{Call, CallResult, Value};
//!
//! let registry = TypeRegistry::new();
//! registry.register(
//!     TypeDescriptor::builder("demo.Strings")
//!         .static_method("upper", &["string"], "string", |args| {
//!             let text = args[0].as_value().map_or(Ok(""), Value::as_str)?;
//!             Ok(Object::from(Value::from(text.to_uppercase())))
//!         })
//!         .build(),
//! );
//!
//! let invoker = Invoker::builder(registry).build().unwrap();
//! let session = invoker.new_session();
//! let result = invoker
//!     .invoke(&Call::utility(session, "demo.Strings", "upper").arg(Value::from("abc")))
//!     .unwrap();
//! assert_eq!(result, CallResult::value(Value::from("ABC")));
//! ```

pub mod error;
pub mod execution;
pub mod host;
pub mod invoker;
pub mod modules;
pub mod object;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod shaping;

pub use error::{CallFault, InvokerError, Result};
pub use execution::{
    ApplicationLock, ExecutionContext, LockGuard, ProcessLock, Tracer, TracingTracer,
    UiDispatcher, UiExecutor,
};
pub use host::{Application, ServiceContainer, ServiceRegistry, StandaloneApplication};
pub use invoker::{Invoker, InvokerBuilder};
pub use modules::{ModuleResolver, PluginModules};
pub use object::{AsAny, Delegate, Object, ObjectList, RemoteObject};
pub use registry::{
    ConstructorDescriptor, MethodDescriptor, ReturnType, Signature, TypeBuilder, TypeDescriptor,
    TypeRegistry,
};
pub use resolver::CallTarget;
pub use session::ReferenceStore;

/// Default prefix of issued handle ids
pub const DEFAULT_REF_ID_PREFIX: &str = "ref-";

/// Root type every registered type is assignable to
pub const ROOT_TYPE: &str = "any";
