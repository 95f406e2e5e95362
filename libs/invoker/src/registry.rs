//! Type Registry
//!
//! Explicit catalogue of the types the controller may name. Each
//! [`TypeDescriptor`] carries its supertypes, its constructors and its
//! methods, all in declaration order; overload resolution depends on that
//! order.

use crate::error::CallFault;
use crate::object::Object;
use crate::ROOT_TYPE;
use dashmap::DashMap;
use driver_types::value::type_names;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Result of running a constructor or method body
pub type BodyResult = std::result::Result<Object, CallFault>;

/// Method body: optional receiver plus positional arguments
pub type MethodBody = Arc<dyn Fn(Option<&Object>, &[Object]) -> BodyResult + Send + Sync>;

/// Constructor body: positional arguments
pub type ConstructorBody = Arc<dyn Fn(&[Object]) -> BodyResult + Send + Sync>;

/// Declared return type of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Single(String),
    /// Collection or array with a declared element type
    Sequence { container: String, element: String },
}

impl ReturnType {
    pub fn single(type_name: impl Into<String>) -> Self {
        ReturnType::Single(type_name.into())
    }

    pub fn sequence(container: impl Into<String>, element: impl Into<String>) -> Self {
        ReturnType::Sequence {
            container: container.into(),
            element: element.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ReturnType::Single(name) => name,
            ReturnType::Sequence { container, .. } => container,
        }
    }
}

impl From<&str> for ReturnType {
    fn from(type_name: &str) -> Self {
        ReturnType::Single(type_name.to_string())
    }
}

/// Anything with a positional parameter list that can take part in overload
/// resolution
pub trait Signature {
    fn params(&self) -> &[String];

    /// Human-readable form used in diagnostics
    fn signature(&self) -> String;

    fn arity(&self) -> usize {
        self.params().len()
    }
}

fn render_signature(name: &str, params: &[String]) -> String {
    format!("{}({})", name, params.join(", "))
}

fn owned_params(params: &[&str]) -> Vec<String> {
    params.iter().map(|p| p.to_string()).collect()
}

#[derive(Clone)]
pub struct ConstructorDescriptor {
    declaring_type: String,
    params: Vec<String>,
    body: ConstructorBody,
}

impl ConstructorDescriptor {
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn construct(&self, args: &[Object]) -> BodyResult {
        (self.body)(args)
    }
}

impl Signature for ConstructorDescriptor {
    fn params(&self) -> &[String] {
        &self.params
    }

    fn signature(&self) -> String {
        render_signature(&self.declaring_type, &self.params)
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstructorDescriptor({})", self.signature())
    }
}

#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    declaring_type: String,
    params: Vec<String>,
    returns: ReturnType,
    is_static: bool,
    body: MethodBody,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn returns(&self) -> &ReturnType {
        &self.returns
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn invoke(&self, receiver: Option<&Object>, args: &[Object]) -> BodyResult {
        (self.body)(receiver, args)
    }
}

impl Signature for MethodDescriptor {
    fn params(&self) -> &[String] {
        &self.params
    }

    fn signature(&self) -> String {
        render_signature(&self.name, &self.params)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MethodDescriptor({}.{}{})",
            self.declaring_type,
            self.signature(),
            if self.is_static { " static" } else { "" }
        )
    }
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    supertypes: Vec<String>,
    pass_by_value: bool,
    constructors: Vec<ConstructorDescriptor>,
    methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    pub fn builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct supertypes in declaration order
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// Instances of this type cross the boundary as data
    pub fn is_pass_by_value(&self) -> bool {
        self.pass_by_value
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// Methods declared on this type only
    pub fn declared_methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }
}

/// Fluent construction of a [`TypeDescriptor`]
pub struct TypeBuilder {
    descriptor: TypeDescriptor,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: TypeDescriptor {
                name: name.into(),
                supertypes: Vec::new(),
                pass_by_value: false,
                constructors: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.descriptor.supertypes.push(supertype.into());
        self
    }

    pub fn pass_by_value(mut self) -> Self {
        self.descriptor.pass_by_value = true;
        self
    }

    pub fn constructor<F>(mut self, params: &[&str], body: F) -> Self
    where
        F: Fn(&[Object]) -> BodyResult + Send + Sync + 'static,
    {
        self.descriptor.constructors.push(ConstructorDescriptor {
            declaring_type: self.descriptor.name.clone(),
            params: owned_params(params),
            body: Arc::new(body),
        });
        self
    }

    /// Instance method; the body receives the receiver object
    pub fn method<F>(
        mut self,
        name: &str,
        params: &[&str],
        returns: impl Into<ReturnType>,
        body: F,
    ) -> Self
    where
        F: Fn(&Object, &[Object]) -> BodyResult + Send + Sync + 'static,
    {
        let body: MethodBody = Arc::new(move |receiver: Option<&Object>, args: &[Object]| {
            match receiver {
                Some(receiver) => body(receiver, args),
                None => Err(CallFault::illegal_state("instance method called without receiver")),
            }
        });
        self.push_method(name, params, returns.into(), false, body);
        self
    }

    /// Static method; runs without a receiver
    pub fn static_method<F>(
        mut self,
        name: &str,
        params: &[&str],
        returns: impl Into<ReturnType>,
        body: F,
    ) -> Self
    where
        F: Fn(&[Object]) -> BodyResult + Send + Sync + 'static,
    {
        let body: MethodBody = Arc::new(move |_: Option<&Object>, args: &[Object]| body(args));
        self.push_method(name, params, returns.into(), true, body);
        self
    }

    fn push_method(
        &mut self,
        name: &str,
        params: &[&str],
        returns: ReturnType,
        is_static: bool,
        body: MethodBody,
    ) {
        self.descriptor.methods.push(MethodDescriptor {
            name: name.to_string(),
            declaring_type: self.descriptor.name.clone(),
            params: owned_params(params),
            returns,
            is_static,
            body,
        });
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

/// Concurrent name → descriptor catalogue
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: DashMap<String, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous descriptor with the same name
    pub fn register(&self, descriptor: TypeDescriptor) {
        tracing::debug!(type_name = %descriptor.name, "Registering type");
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.get(type_name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether a value of runtime type `from` may be passed where `to` is declared
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        if from == to || to == ROOT_TYPE {
            return true;
        }
        if from == type_names::INT && to == type_names::FLOAT {
            return true;
        }
        self.supertype_closure(from).iter().any(|name| name == to)
    }

    /// Builtin value types and registered types flagged pass-by-value
    pub fn is_pass_by_value(&self, type_name: &str) -> bool {
        type_names::ALL.contains(&type_name)
            || self
                .get(type_name)
                .map(|descriptor| descriptor.is_pass_by_value())
                .unwrap_or(false)
    }

    /// Methods named `name` visible on `type_name`: own methods first, then
    /// inherited ones in breadth-first supertype declaration order
    pub fn methods_named(&self, type_name: &str, name: &str) -> Vec<MethodDescriptor> {
        let mut found = Vec::new();
        for descriptor in self.type_chain(type_name) {
            found.extend(
                descriptor
                    .declared_methods()
                    .iter()
                    .filter(|method| method.name() == name)
                    .cloned(),
            );
        }
        found
    }

    /// First type on the supertype walk of `type_name` (itself included) whose
    /// name is `interface`
    ///
    /// Walks each declared supertype's own hierarchy depth-first, in
    /// declaration order.
    pub fn find_service_interface(&self, type_name: &str, interface: &str) -> Option<String> {
        let mut visited = HashSet::new();
        self.find_interface_recursive(type_name, interface, &mut visited)
    }

    fn find_interface_recursive(
        &self,
        type_name: &str,
        interface: &str,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        if !visited.insert(type_name.to_string()) {
            return None;
        }
        if type_name == interface {
            return Some(type_name.to_string());
        }
        let descriptor = self.get(type_name)?;
        descriptor
            .supertypes()
            .iter()
            .find_map(|supertype| self.find_interface_recursive(supertype, interface, visited))
    }

    /// Descriptors of `type_name` and all its registered supertypes, breadth-first
    fn type_chain(&self, type_name: &str) -> Vec<Arc<TypeDescriptor>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([type_name.to_string()]);
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(descriptor) = self.get(&name) {
                queue.extend(descriptor.supertypes().iter().cloned());
                chain.push(descriptor);
            }
        }
        chain
    }

    /// Names of every supertype reachable from `type_name`, itself excluded
    fn supertype_closure(&self, type_name: &str) -> Vec<String> {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([type_name.to_string()]);
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(descriptor) = self.get(&name) {
                for supertype in descriptor.supertypes() {
                    names.push(supertype.clone());
                    queue.push_back(supertype.clone());
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_types::Value;

    fn hierarchy() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::builder("demo.Disposable")
                .method("dispose", &[], "null", |_, _| Ok(Object::Null))
                .build(),
        );
        registry.register(
            TypeDescriptor::builder("demo.Service")
                .extends("demo.Disposable")
                .method("name", &[], "string", |_, _| Ok(Object::from(Value::from("service"))))
                .build(),
        );
        registry.register(
            TypeDescriptor::builder("demo.Index")
                .extends("demo.Service")
                .method("name", &["int"], "string", |_, _| Ok(Object::from(Value::from("index"))))
                .build(),
        );
        registry
    }

    #[test]
    fn test_assignability_rules() {
        let registry = hierarchy();
        assert!(registry.is_assignable("demo.Index", "demo.Index"));
        assert!(registry.is_assignable("demo.Index", "demo.Service"));
        assert!(registry.is_assignable("demo.Index", "demo.Disposable"));
        assert!(registry.is_assignable("demo.Index", "any"));
        assert!(registry.is_assignable("int", "float"));
        assert!(!registry.is_assignable("float", "int"));
        assert!(!registry.is_assignable("demo.Service", "demo.Index"));
        assert!(!registry.is_assignable("string", "demo.Service"));
    }

    #[test]
    fn test_inherited_methods_follow_own_methods() {
        let registry = hierarchy();
        let methods = registry.methods_named("demo.Index", "name");
        let owners: Vec<_> = methods.iter().map(|m| m.declaring_type().to_string()).collect();
        assert_eq!(owners, vec!["demo.Index", "demo.Service"]);
        assert_eq!(registry.methods_named("demo.Index", "dispose").len(), 1);
        assert!(registry.methods_named("demo.Index", "missing").is_empty());
    }

    #[test]
    fn test_find_service_interface_walks_supertypes() {
        let registry = hierarchy();
        assert_eq!(
            registry.find_service_interface("demo.Index", "demo.Disposable"),
            Some("demo.Disposable".to_string())
        );
        assert_eq!(registry.find_service_interface("demo.Index", "demo.Other"), None);
    }

    #[test]
    fn test_pass_by_value_types() {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::builder("demo.Point").pass_by_value().build());
        assert!(registry.is_pass_by_value("string"));
        assert!(registry.is_pass_by_value("demo.Point"));
        assert!(!registry.is_pass_by_value("demo.Unknown"));
    }

    #[test]
    fn test_instance_method_without_receiver_faults() {
        let descriptor = TypeDescriptor::builder("demo.Counter")
            .method("get", &[], "int", |_, _| Ok(Object::from(Value::Int(1))))
            .build();
        let method = &descriptor.declared_methods()[0];
        let fault = method.invoke(None, &[]).unwrap_err();
        assert_eq!(fault.kind, "IllegalState");
        assert_eq!(method.signature(), "get()");
    }
}
