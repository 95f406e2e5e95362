//! Demo object graph served by the host
//!
//! A workspace service holding text buffers, a pass-by-value caret position
//! and a clock utility. Enough surface for a controller to exercise every call
//! kind, lock mode and result shape over the socket.

use anyhow::{Context, Result};
use driver_config::DriverConfig;
use driver_invoker::{
    CallFault, Invoker, Object, RemoteObject, ReturnType, StandaloneApplication, TypeDescriptor,
    TypeRegistry,
};
use driver_types::Value;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub const BUFFER: &str = "host.Buffer";
pub const POSITION: &str = "host.Position";
pub const WORKSPACE: &str = "host.Workspace";
pub const CLOCK: &str = "host.Clock";

#[derive(Debug)]
pub struct Buffer {
    text: RwLock<String>,
}

impl Buffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
        }
    }

    pub fn text(&self) -> String {
        self.text.read().clone()
    }

    /// Caret at the end of the text
    fn caret(&self) -> Position {
        let text = self.text.read();
        let line = text.matches('\n').count() as i64;
        let column = text.rsplit('\n').next().map_or(0, |last| last.chars().count()) as i64;
        Position { line, column }
    }
}

impl RemoteObject for Buffer {
    fn type_name(&self) -> &str {
        BUFFER
    }

    fn debug_text(&self) -> String {
        format!("Buffer({} chars)", self.text.read().chars().count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: i64,
    pub column: i64,
}

impl RemoteObject for Position {
    fn type_name(&self) -> &str {
        POSITION
    }

    fn to_value(&self) -> Option<Value> {
        let mut fields = BTreeMap::new();
        fields.insert("line".to_string(), Value::Int(self.line));
        fields.insert("column".to_string(), Value::Int(self.column));
        Some(Value::Record {
            type_name: POSITION.to_string(),
            fields,
        })
    }
}

#[derive(Debug)]
pub struct Workspace {
    name: String,
    buffers: Mutex<Vec<Object>>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffers: Mutex::new(Vec::new()),
        }
    }
}

impl RemoteObject for Workspace {
    fn type_name(&self) -> &str {
        WORKSPACE
    }
}

fn this<'a, T: std::any::Any>(receiver: &'a Object) -> std::result::Result<&'a T, CallFault> {
    receiver
        .downcast_ref::<T>()
        .ok_or_else(|| CallFault::illegal_argument(format!("unexpected receiver {}", receiver.type_label())))
}

fn string_arg(args: &[Object], index: usize) -> std::result::Result<String, CallFault> {
    match args.get(index).and_then(Object::as_value) {
        Some(value) => Ok(value.as_str()?.to_string()),
        None => Err(CallFault::illegal_argument(format!("argument {} is not a string", index))),
    }
}

fn text(value: impl Into<String>) -> Object {
    Object::from(Value::Str(value.into()))
}

pub fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    let started = Instant::now();

    registry.register(
        TypeDescriptor::builder(BUFFER)
            .constructor(&[], |_| Ok(Object::instance(Buffer::new(""))))
            .constructor(&["string"], |args| Ok(Object::instance(Buffer::new(string_arg(args, 0)?))))
            .method("text", &[], "string", |receiver, _| Ok(text(this::<Buffer>(receiver)?.text())))
            .method("length", &[], "int", |receiver, _| {
                let length = this::<Buffer>(receiver)?.text.read().chars().count();
                Ok(Object::from(Value::Int(length as i64)))
            })
            .method("append", &["string"], "null", |receiver, args| {
                this::<Buffer>(receiver)?.text.write().push_str(&string_arg(args, 0)?);
                Ok(Object::Null)
            })
            .method("lines", &[], ReturnType::sequence("list", "string"), |receiver, _| {
                let lines = this::<Buffer>(receiver)?.text().lines().map(text).collect();
                Ok(Object::list("list", "string", lines))
            })
            .method("caret", &[], POSITION, |receiver, _| {
                Ok(Object::instance(this::<Buffer>(receiver)?.caret()))
            })
            .build(),
    );

    registry.register(TypeDescriptor::builder(POSITION).pass_by_value().build());

    registry.register(
        TypeDescriptor::builder(WORKSPACE)
            .method("name", &[], "string", |receiver, _| {
                Ok(text(this::<Workspace>(receiver)?.name.clone()))
            })
            .method("open", &["string"], BUFFER, |receiver, args| {
                let buffer = Object::instance(Buffer::new(string_arg(args, 0)?));
                this::<Workspace>(receiver)?.buffers.lock().push(buffer.clone());
                Ok(buffer)
            })
            .method("buffers", &[], ReturnType::sequence("list", BUFFER), |receiver, _| {
                let buffers = this::<Workspace>(receiver)?.buffers.lock().clone();
                Ok(Object::list("list", BUFFER, buffers))
            })
            .method("close_all", &[], "int", |receiver, _| {
                let closed = std::mem::take(&mut *this::<Workspace>(receiver)?.buffers.lock());
                Ok(Object::from(Value::Int(closed.len() as i64)))
            })
            .build(),
    );

    registry.register(
        TypeDescriptor::builder(CLOCK)
            .static_method("uptime_millis", &[], "int", move |_| {
                Ok(Object::from(Value::Int(started.elapsed().as_millis() as i64)))
            })
            .static_method("thread_name", &[], "string", |_| {
                Ok(text(std::thread::current().name().unwrap_or("unnamed")))
            })
            .build(),
    );

    registry
}

/// Register the demo services and mark the application ready
pub fn install(application: StandaloneApplication) -> Arc<StandaloneApplication> {
    application
        .services()
        .register(WORKSPACE, Object::instance(Workspace::new("default")));
    application.mark_initialized();
    Arc::new(application)
}

/// Build an invoker over the demo graph with the configured invoker settings
pub fn build_invoker(config: &DriverConfig, application: Arc<StandaloneApplication>) -> Result<Invoker> {
    Invoker::builder(registry())
        .application(application)
        .ref_id_prefix(config.invoker.ref_id_prefix.clone())
        .ui_queue_capacity(config.invoker.ui_queue_capacity)
        .build()
        .context("Failed to start the UI executor")
}

pub fn demo_invoker(config: DriverConfig) -> Result<(Invoker, Arc<StandaloneApplication>)> {
    let application = install(StandaloneApplication::new(config.product.version()));
    let invoker = build_invoker(&config, application.clone())?;
    Ok((invoker, application))
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_types::{Call, CallResult, LockSemantics, OnDispatcher};

    #[test]
    fn test_caret_tracks_last_line() {
        assert_eq!(Buffer::new("").caret(), Position { line: 0, column: 0 });
        assert_eq!(Buffer::new("ab\ncde").caret(), Position { line: 1, column: 3 });
        assert_eq!(Buffer::new("ab\n").caret(), Position { line: 1, column: 0 });
    }

    #[test]
    fn test_workspace_buffers_are_handles() {
        let (invoker, _) = demo_invoker(DriverConfig::default()).unwrap();
        let session = invoker.new_session();

        let opened = invoker
            .invoke(&Call::service(session, WORKSPACE, "open").arg(Value::from("fn main() {}")))
            .unwrap();
        let handle = opened.as_handle().cloned().expect("buffer handle");
        assert!(handle.id.starts_with("ref-"));

        let listed = invoker
            .invoke(&Call::service(session, WORKSPACE, "buffers").lock(LockSemantics::ReadAction))
            .unwrap();
        let list = listed.as_handle_list().expect("handle list");
        assert_eq!(list.len(), 1);
        assert_eq!(list.items[0].identity_hash, handle.identity_hash);

        let caret = invoker
            .invoke(&Call::on_ref(session, handle, BUFFER, "caret"))
            .unwrap();
        assert!(matches!(caret, CallResult::Value { value: Value::Record { .. } }));
    }

    #[test]
    fn test_clock_runs_on_ui_thread_when_asked() {
        let (invoker, _) = demo_invoker(DriverConfig::default()).unwrap();
        let session = invoker.new_session();
        let name = invoker
            .invoke(&Call::utility(session, CLOCK, "thread_name").dispatch_on(OnDispatcher::Edt))
            .unwrap();
        assert_eq!(name, CallResult::value(Value::from("driver-ui")));
    }

    #[test]
    fn test_configured_prefix_applies() {
        let mut config = DriverConfig::default();
        config.invoker.ref_id_prefix = "host-".to_string();
        let (invoker, _) = demo_invoker(config).unwrap();
        let session = invoker.new_session();
        let created = invoker.invoke(&Call::new_instance(session, BUFFER)).unwrap();
        assert!(created.as_handle().unwrap().id.starts_with("host-"));
    }
}
