//! Result shaping: decide what crosses the boundary by value and what as handles

use crate::error::Result;
use crate::object::Object;
use crate::registry::{ReturnType, TypeRegistry};
use crate::session::ReferenceStore;
use driver_types::{CallResult, RefList, Value};

/// Copy of `object` if it may cross by value
pub fn to_data(registry: &TypeRegistry, object: &Object) -> Option<Value> {
    match object {
        Object::Null => Some(Value::Null),
        Object::Value(value) => Some(value.clone()),
        Object::Instance(instance) if registry.is_pass_by_value(instance.type_name()) => {
            instance.to_value()
        }
        Object::Instance(_) | Object::List(_) => None,
    }
}

fn declared_value_sequence(registry: &TypeRegistry, declared: Option<&ReturnType>) -> bool {
    matches!(
        declared,
        Some(ReturnType::Sequence { element, .. }) if registry.is_pass_by_value(element)
    )
}

/// Shape a raw call result for session `session_id`
///
/// `declared` is the method's declared return type; constructor results pass
/// `None` and are shaped by runtime value only.
pub fn shape(
    store: &ReferenceStore,
    registry: &TypeRegistry,
    session_id: u32,
    object: Object,
    declared: Option<&ReturnType>,
) -> Result<CallResult> {
    if declared_value_sequence(registry, declared) {
        if let Object::List(list) = &object {
            let items: Option<Vec<Value>> =
                list.items().iter().map(|item| to_data(registry, item)).collect();
            if let Some(items) = items {
                return Ok(CallResult::value(Value::Array(items)));
            }
        }
    }

    if let Some(value) = to_data(registry, &object) {
        return Ok(CallResult::value(value));
    }

    match object {
        Object::List(list) => {
            let container = store.put_reference(session_id, Object::List(list.clone()))?;
            let items = list
                .items()
                .iter()
                .map(|item| store.put_reference(session_id, item.clone()))
                .collect::<Result<Vec<_>>>()?;
            Ok(CallResult::handle_list(RefList {
                container,
                element_type: list.element_type().to_string(),
                items,
            }))
        }
        object => Ok(CallResult::handle(store.put_reference(session_id, object)?)),
    }
}
