//! Shared fixtures: a small editor-like object graph
#![allow(dead_code)]

use driver_invoker::{
    CallFault, Invoker, Object, RemoteObject, ReturnType, ServiceContainer, ServiceRegistry,
    StandaloneApplication, TypeDescriptor, TypeRegistry,
};
use driver_types::{ProductVersion, Value};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DOCUMENT: &str = "demo.Document";
pub const PROJECT: &str = "demo.Project";
pub const INDEX: &str = "demo.ProjectIndex";
pub const SERVICE: &str = "demo.Service";
pub const POINT: &str = "demo.Point";
pub const FORMATTER: &str = "demo.Formatter";
pub const THREADS: &str = "demo.Threads";

#[derive(Debug)]
pub struct Document {
    text: Mutex<String>,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }
}

impl RemoteObject for Document {
    fn type_name(&self) -> &str {
        DOCUMENT
    }
}

#[derive(Debug)]
pub struct Index {
    owner: String,
    files: Vec<String>,
}

impl RemoteObject for Index {
    fn type_name(&self) -> &str {
        INDEX
    }
}

#[derive(Debug)]
pub struct Project {
    name: String,
    services: ServiceRegistry,
}

impl Project {
    pub fn new(name: &str, files: &[&str]) -> Self {
        let services = ServiceRegistry::new();
        services.register(
            INDEX,
            Object::instance(Index {
                owner: name.to_string(),
                files: files.iter().map(|f| f.to_string()).collect(),
            }),
        );
        Self {
            name: name.to_string(),
            services,
        }
    }
}

impl RemoteObject for Project {
    fn type_name(&self) -> &str {
        PROJECT
    }

    fn services(&self) -> Option<&dyn ServiceContainer> {
        Some(&self.services)
    }
}

#[derive(Debug)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl RemoteObject for Point {
    fn type_name(&self) -> &str {
        POINT
    }

    fn to_value(&self) -> Option<Value> {
        let mut fields = BTreeMap::new();
        fields.insert("x".to_string(), Value::Int(self.x));
        fields.insert("y".to_string(), Value::Int(self.y));
        Some(Value::Record {
            type_name: POINT.to_string(),
            fields,
        })
    }
}

fn this<'a, T: std::any::Any>(receiver: &'a Object) -> Result<&'a T, CallFault> {
    receiver
        .downcast_ref::<T>()
        .ok_or_else(|| CallFault::illegal_argument(format!("unexpected receiver {}", receiver.type_label())))
}

fn string_arg(args: &[Object], index: usize) -> Result<String, CallFault> {
    match args.get(index).and_then(Object::as_value) {
        Some(value) => Ok(value.as_str()?.to_string()),
        None => Err(CallFault::illegal_argument(format!("argument {} is not a string", index))),
    }
}

fn text(value: impl Into<String>) -> Object {
    Object::from(Value::Str(value.into()))
}

pub fn demo_registry() -> TypeRegistry {
    let registry = TypeRegistry::new();

    registry.register(
        TypeDescriptor::builder(DOCUMENT)
            .constructor(&[], |_| Ok(Object::instance(Document::new(""))))
            .constructor(&["string"], |args| Ok(Object::instance(Document::new(&string_arg(args, 0)?))))
            .method("text", &[], "string", |receiver, _| Ok(text(this::<Document>(receiver)?.text())))
            .method("append", &["string"], "null", |receiver, args| {
                this::<Document>(receiver)?.text.lock().push_str(&string_arg(args, 0)?);
                Ok(Object::Null)
            })
            .method("lines", &[], ReturnType::sequence("list", "string"), |receiver, _| {
                let lines = this::<Document>(receiver)?
                    .text()
                    .lines()
                    .map(text)
                    .collect();
                Ok(Object::list("list", "string", lines))
            })
            .method("split", &[], ReturnType::sequence("list", DOCUMENT), |receiver, _| {
                let parts = this::<Document>(receiver)?
                    .text()
                    .split(' ')
                    .map(|part| Object::instance(Document::new(part)))
                    .collect();
                Ok(Object::list("list", DOCUMENT, parts))
            })
            .method("cursor", &[], POINT, |receiver, _| {
                let len = this::<Document>(receiver)?.text().len() as i64;
                Ok(Object::instance(Point { x: len, y: 0 }))
            })
            .method("close", &[], "null", |_, _| Err(CallFault::illegal_state("document is read-only")))
            .build(),
    );

    registry.register(TypeDescriptor::builder(POINT).pass_by_value().build());

    registry.register(
        TypeDescriptor::builder(SERVICE)
            .method("describe", &[], "string", |receiver, _| Ok(text(receiver.debug_text())))
            .build(),
    );

    registry.register(
        TypeDescriptor::builder(INDEX)
            .extends(SERVICE)
            .method("owner", &[], "string", |receiver, _| Ok(text(this::<Index>(receiver)?.owner.clone())))
            .method("files", &[], ReturnType::sequence("list", "string"), |receiver, _| {
                let files = this::<Index>(receiver)?.files.iter().map(|f| text(f.clone())).collect();
                Ok(Object::list("list", "string", files))
            })
            .build(),
    );

    registry.register(
        TypeDescriptor::builder(PROJECT)
            .method("name", &[], "string", |receiver, _| Ok(text(this::<Project>(receiver)?.name.clone())))
            .build(),
    );

    registry.register(
        TypeDescriptor::builder(FORMATTER)
            .static_method("format", &["int"], "string", |_| Ok(text("int")))
            .static_method("format", &["float"], "string", |_| Ok(text("float")))
            .static_method("format", &[DOCUMENT], "string", |_| Ok(text("document")))
            .static_method("format", &[SERVICE], "string", |_| Ok(text("service")))
            .static_method("format", &[INDEX], "string", |_| Ok(text("index")))
            .static_method("format", &["any"], "string", |_| Ok(text("any")))
            .static_method("format", &["string", "int"], "string", |_| Ok(text("string,int")))
            .static_method("pad", &["string"], "string", |args| Ok(text(format!("[{}]", string_arg(args, 0)?))))
            .static_method("names", &[], "list", |_| {
                Ok(Object::list("list", "any", vec![text("a"), text("b")]))
            })
            .build(),
    );

    registry.register(
        TypeDescriptor::builder(THREADS)
            .static_method("current", &[], "string", |_| {
                Ok(text(std::thread::current().name().unwrap_or("unnamed")))
            })
            .static_method("crash", &[], "null", |_| panic!("body panicked"))
            .build(),
    );

    registry
}

/// Application with one project and an application-level index
pub fn demo_application() -> Arc<StandaloneApplication> {
    let application = StandaloneApplication::new(ProductVersion {
        product_code: "DEMO".to_string(),
        is_snapshot: false,
        baseline_version: 242,
        build_number: "DEMO-242.1".to_string(),
    });
    application
        .services()
        .register(PROJECT, Object::instance(Project::new("sample", &["a.rs", "b.rs"])));
    application.services().register(
        INDEX,
        Object::instance(Index {
            owner: "application".to_string(),
            files: Vec::new(),
        }),
    );
    application.mark_initialized();
    Arc::new(application)
}

pub fn demo_invoker() -> (Invoker, Arc<StandaloneApplication>) {
    let application = demo_application();
    let invoker = Invoker::builder(demo_registry())
        .application(application.clone())
        .build()
        .expect("invoker");
    (invoker, application)
}
