//! Live Object Model
//!
//! Objects reachable through the invoker are either pass-by-value data
//! ([`Object::Value`]), shared instances implementing [`RemoteObject`], or
//! lists of objects. Instances and lists are reference counted; the reference
//! tables hold them strongly (`Arc`) or weakly (`Weak`).

use crate::host::ServiceContainer;
use driver_types::value::type_names;
use driver_types::{Ref, Value};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Access to `Any` for downcasting trait objects
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An object that can be exposed to the controller
///
/// `type_name` must match a type registered in the [`TypeRegistry`](crate::TypeRegistry)
/// for the object to be usable as a receiver or as a typed argument.
pub trait RemoteObject: AsAny + Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    fn debug_text(&self) -> String {
        format!("{:?}", self)
    }

    /// Field-wise copy for types whitelisted as pass-by-value
    fn to_value(&self) -> Option<Value> {
        None
    }

    /// Wrapper behavior applied before the object is stored
    fn delegate(&self) -> Option<Delegate> {
        None
    }

    /// Objects acting as a service scope expose their own container
    fn services(&self) -> Option<&dyn ServiceContainer> {
        None
    }
}

/// Wrappers recognized when an object crosses the boundary
#[derive(Debug, Clone)]
pub enum Delegate {
    /// Store the wrapped object instead of the wrapper
    Local(Object),
    /// The object already has a handle on the controller side; reuse it verbatim
    Remote(Ref),
}

/// Ordered collection crossing the boundary as a container handle plus one
/// handle per element
#[derive(Debug)]
pub struct ObjectList {
    type_name: String,
    element_type: String,
    items: Vec<Object>,
}

impl ObjectList {
    pub fn new(type_name: impl Into<String>, element_type: impl Into<String>, items: Vec<Object>) -> Self {
        Self {
            type_name: type_name.into(),
            element_type: element_type.into(),
            items,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn items(&self) -> &[Object] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A live value inside the driven process
#[derive(Clone)]
pub enum Object {
    Null,
    Value(Value),
    Instance(Arc<dyn RemoteObject>),
    List(Arc<ObjectList>),
}

impl Object {
    pub fn instance<T: RemoteObject + 'static>(object: T) -> Self {
        Object::Instance(Arc::new(object))
    }

    pub fn list(type_name: impl Into<String>, element_type: impl Into<String>, items: Vec<Object>) -> Self {
        Object::List(Arc::new(ObjectList::new(type_name, element_type, items)))
    }

    /// Runtime type name; `None` for null, which is compatible with any parameter
    pub fn runtime_type(&self) -> Option<&str> {
        match self {
            Object::Null => None,
            Object::Value(Value::Null) => None,
            Object::Value(value) => Some(value.type_name()),
            Object::Instance(instance) => Some(instance.type_name()),
            Object::List(list) => Some(list.type_name()),
        }
    }

    /// Runtime type name for diagnostics, `null` included
    pub fn type_label(&self) -> &str {
        self.runtime_type().unwrap_or(type_names::NULL)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null | Object::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Object::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ObjectList> {
        match self {
            Object::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Arc<dyn RemoteObject>> {
        match self {
            Object::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Borrow the concrete type behind an instance
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        let instance: &dyn RemoteObject = self.as_instance()?.as_ref();
        instance.as_any().downcast_ref::<T>()
    }

    /// Identity of the underlying allocation; values have none
    pub fn identity_hash(&self) -> u64 {
        match self {
            Object::Null | Object::Value(_) => 0,
            Object::Instance(instance) => Arc::as_ptr(instance) as *const () as usize as u64,
            Object::List(list) => Arc::as_ptr(list) as usize as u64,
        }
    }

    /// True when both sides are the same allocation (instances, lists) or
    /// equal data (values)
    pub fn same_object(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Instance(a), Object::Instance(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Object::List(a), Object::List(b)) => Arc::ptr_eq(a, b),
            (Object::Value(a), Object::Value(b)) => a == b,
            (a, b) => a.is_null() && b.is_null(),
        }
    }

    pub fn debug_text(&self) -> String {
        match self {
            Object::Null => type_names::NULL.to_string(),
            Object::Value(value) => value.to_string(),
            Object::Instance(instance) => instance.debug_text(),
            Object::List(list) => format!("{}[{}]", list.type_name(), list.len()),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "Null"),
            Object::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Object::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            Object::List(list) => f.debug_tuple("List").field(list).finish(),
        }
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Object::Null,
            value => Object::Value(value),
        }
    }
}

impl<T: RemoteObject + 'static> From<Arc<T>> for Object {
    fn from(instance: Arc<T>) -> Self {
        Object::Instance(instance)
    }
}

/// What a reference table actually holds
#[derive(Clone)]
pub(crate) enum Referent {
    Instance(Arc<dyn RemoteObject>),
    List(Arc<ObjectList>),
    Value(Arc<Value>),
}

impl Referent {
    pub(crate) fn from_object(object: Object) -> Self {
        match object {
            Object::Null => Referent::Value(Arc::new(Value::Null)),
            Object::Value(value) => Referent::Value(Arc::new(value)),
            Object::Instance(instance) => Referent::Instance(instance),
            Object::List(list) => Referent::List(list),
        }
    }

    pub(crate) fn to_object(&self) -> Object {
        match self {
            Referent::Instance(instance) => Object::Instance(Arc::clone(instance)),
            Referent::List(list) => Object::List(Arc::clone(list)),
            Referent::Value(value) => Object::from(value.as_ref().clone()),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakReferent {
        match self {
            Referent::Instance(instance) => WeakReferent::Instance(Arc::downgrade(instance)),
            Referent::List(list) => WeakReferent::List(Arc::downgrade(list)),
            Referent::Value(value) => WeakReferent::Value(Arc::downgrade(value)),
        }
    }

    /// Builds the outward handle for this referent under `id`
    pub(crate) fn make_ref(&self, id: String) -> Ref {
        match self {
            Referent::Instance(instance) => Ref::new(
                id,
                instance.type_name(),
                Arc::as_ptr(instance) as *const () as usize as u64,
                instance.debug_text(),
            ),
            Referent::List(list) => Ref::new(
                id,
                list.type_name(),
                Arc::as_ptr(list) as usize as u64,
                format!("{}[{}]", list.type_name(), list.len()),
            ),
            Referent::Value(value) => Ref::new(
                id,
                value.type_name(),
                Arc::as_ptr(value) as usize as u64,
                value.to_string(),
            ),
        }
    }
}

/// Weak mirror kept in the global table
pub(crate) enum WeakReferent {
    Instance(Weak<dyn RemoteObject>),
    List(Weak<ObjectList>),
    Value(Weak<Value>),
}

impl WeakReferent {
    pub(crate) fn upgrade(&self) -> Option<Referent> {
        match self {
            WeakReferent::Instance(weak) => weak.upgrade().map(Referent::Instance),
            WeakReferent::List(weak) => weak.upgrade().map(Referent::List),
            WeakReferent::Value(weak) => weak.upgrade().map(Referent::Value),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        match self {
            WeakReferent::Instance(weak) => weak.strong_count() > 0,
            WeakReferent::List(weak) => weak.strong_count() > 0,
            WeakReferent::Value(weak) => weak.strong_count() > 0,
        }
    }
}
