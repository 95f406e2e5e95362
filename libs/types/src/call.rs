//! Call descriptors
//!
//! A [`Call`] is the unit of work sent by the controller. The [`CallKind`]
//! decides where the receiver comes from:
//!
//! | Kind          | Receiver                                        |
//! |---------------|-------------------------------------------------|
//! | `NewInstance` | none, a constructor of `type_name` runs         |
//! | `Service`     | service of `type_name` from the host container  |
//! | `Ref`         | object behind a previously issued handle        |
//! | `Utility`     | none, a static method of `type_name` runs       |

use crate::{Ref, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lock discipline requested for the call body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockSemantics {
    #[default]
    NoLock,
    ReadAction,
    WriteAction,
}

/// Thread the call body must run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDispatcher {
    /// Caller's own thread
    #[default]
    Default,
    /// UI (event dispatch) thread, synchronous rendezvous
    Edt,
    /// Background IO pool; not supported by the invoker
    Io,
}

/// A call argument: literal data or a handle to resolve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "arg", rename_all = "snake_case")]
pub enum Argument {
    Value { value: Value },
    Handle { handle: Ref },
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value { value }
    }
}

impl From<Ref> for Argument {
    fn from(handle: Ref) -> Self {
        Argument::Handle { handle }
    }
}

impl From<&Ref> for Argument {
    fn from(handle: &Ref) -> Self {
        Argument::Handle {
            handle: handle.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum CallKind {
    NewInstance,
    Service {
        /// Handle of the object whose own container should be asked first
        #[serde(default)]
        scope: Option<Ref>,
        /// Supertype name the service is registered under
        #[serde(default)]
        service_interface: Option<String>,
    },
    Ref {
        target: Ref,
    },
    Utility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub session_id: u32,
    pub kind: CallKind,
    pub type_name: String,
    /// Plugin namespace, `primary` or `primary/module`
    #[serde(default)]
    pub plugin_id: Option<String>,
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub lock_semantics: LockSemantics,
    #[serde(default)]
    pub dispatcher: OnDispatcher,
    #[serde(default)]
    pub timed_span: Option<String>,
}

impl Call {
    fn with_kind(session_id: u32, kind: CallKind, type_name: impl Into<String>) -> Self {
        Self {
            session_id,
            kind,
            type_name: type_name.into(),
            plugin_id: None,
            method_name: None,
            args: Vec::new(),
            lock_semantics: LockSemantics::NoLock,
            dispatcher: OnDispatcher::Default,
            timed_span: None,
        }
    }

    pub fn new_instance(session_id: u32, type_name: impl Into<String>) -> Self {
        Self::with_kind(session_id, CallKind::NewInstance, type_name)
    }

    pub fn service(
        session_id: u32,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        let mut call = Self::with_kind(
            session_id,
            CallKind::Service {
                scope: None,
                service_interface: None,
            },
            type_name,
        );
        call.method_name = Some(method_name.into());
        call
    }

    pub fn on_ref(
        session_id: u32,
        target: Ref,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        let mut call = Self::with_kind(session_id, CallKind::Ref { target }, type_name);
        call.method_name = Some(method_name.into());
        call
    }

    pub fn utility(
        session_id: u32,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        let mut call = Self::with_kind(session_id, CallKind::Utility, type_name);
        call.method_name = Some(method_name.into());
        call
    }

    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn lock(mut self, lock_semantics: LockSemantics) -> Self {
        self.lock_semantics = lock_semantics;
        self
    }

    pub fn dispatch_on(mut self, dispatcher: OnDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn in_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    pub fn timed(mut self, span_name: impl Into<String>) -> Self {
        self.timed_span = Some(span_name.into());
        self
    }

    /// Service scope handle; no-op for other call kinds
    pub fn scoped_to(mut self, scope_ref: Ref) -> Self {
        if let CallKind::Service { scope, .. } = &mut self.kind {
            *scope = Some(scope_ref);
        }
        self
    }

    /// Service interface narrowing; no-op for other call kinds
    pub fn narrowed_to(mut self, interface: impl Into<String>) -> Self {
        if let CallKind::Service {
            service_interface, ..
        } = &mut self.kind
        {
            *service_interface = Some(interface.into());
        }
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            CallKind::NewInstance => "new_instance",
            CallKind::Service { .. } => "service",
            CallKind::Ref { .. } => "ref",
            CallKind::Utility => "utility",
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Call[{}](session={}, type={}",
            self.kind_name(),
            self.session_id,
            self.type_name
        )?;
        if let Some(method) = &self.method_name {
            write!(f, ", method={}", method)?;
        }
        if let Some(plugin) = &self.plugin_id {
            write!(f, ", plugin={}", plugin)?;
        }
        if let CallKind::Ref { target } = &self.kind {
            write!(f, ", target={}", target.id)?;
        }
        write!(f, ", args={})", self.args.len())
    }
}
