//! Overload resolution
//!
//! Candidates are narrowed by arity first. A single survivor wins outright.
//! Among several, the first whose parameters accept every non-null runtime
//! argument type wins; when none does, the first arity match is taken anyway
//! and the argument check before execution reports the mismatch.

use crate::error::{InvokerError, Result};
use crate::object::Object;
use crate::registry::{ConstructorDescriptor, MethodDescriptor, Signature, TypeDescriptor, TypeRegistry};
use std::sync::Arc;
use tracing::warn;

/// A method resolved on a concrete type
#[derive(Debug, Clone)]
pub struct CallTarget {
    pub type_descriptor: Arc<TypeDescriptor>,
    pub method: MethodDescriptor,
}

impl CallTarget {
    /// `type.method(params)` for diagnostics
    pub fn describe(&self) -> String {
        format!("{}.{}", self.type_descriptor.name(), self.method.signature())
    }
}

/// Runtime types of `args`, `null` for null arguments
pub fn runtime_types(args: &[Object]) -> Vec<String> {
    args.iter().map(|arg| arg.type_label().to_string()).collect()
}

/// Every non-null argument is assignable to its declared parameter
pub fn is_compatible(registry: &TypeRegistry, params: &[String], args: &[Object]) -> bool {
    params.len() == args.len()
        && params.iter().zip(args).all(|(param, arg)| match arg.runtime_type() {
            Some(actual) => registry.is_assignable(actual, param),
            None => true,
        })
}

/// Arity filter, compatibility scan, first-candidate fallback
pub fn select_overload<'a, S: Signature>(
    registry: &TypeRegistry,
    candidates: &'a [S],
    args: &[Object],
) -> Option<&'a S> {
    let by_arity: Vec<&S> = candidates
        .iter()
        .filter(|candidate| candidate.arity() == args.len())
        .collect();

    match by_arity.as_slice() {
        [] => None,
        [only] => Some(*only),
        [first, ..] => {
            let selected = by_arity
                .iter()
                .find(|candidate| is_compatible(registry, candidate.params(), args))
                .copied();
            if selected.is_none() {
                warn!(
                    fallback = %first.signature(),
                    args = ?runtime_types(args),
                    "No overload accepts the argument types, using first candidate"
                );
            }
            Some(selected.unwrap_or(*first))
        }
    }
}

pub fn resolve_method(
    registry: &TypeRegistry,
    type_descriptor: &Arc<TypeDescriptor>,
    method_name: &str,
    args: &[Object],
) -> Result<CallTarget> {
    let candidates = registry.methods_named(type_descriptor.name(), method_name);
    match select_overload(registry, &candidates, args) {
        Some(method) => Ok(CallTarget {
            type_descriptor: Arc::clone(type_descriptor),
            method: method.clone(),
        }),
        None => Err(InvokerError::resolution_with_candidates(
            format!(
                "No method '{}' with parameter count {} in type {}",
                method_name,
                args.len(),
                type_descriptor.name()
            ),
            candidates.iter().map(Signature::signature).collect(),
        )),
    }
}

pub fn resolve_constructor<'a>(
    registry: &TypeRegistry,
    type_descriptor: &'a TypeDescriptor,
    args: &[Object],
) -> Result<&'a ConstructorDescriptor> {
    let candidates = type_descriptor.constructors();
    select_overload(registry, candidates, args).ok_or_else(|| {
        InvokerError::resolution_with_candidates(
            format!(
                "No constructor with parameter count {} in type {}",
                args.len(),
                type_descriptor.name()
            ),
            candidates.iter().map(Signature::signature).collect(),
        )
    })
}

/// Reject arguments the selected target cannot accept
pub fn ensure_compatible<S: Signature>(
    registry: &TypeRegistry,
    target: &str,
    signature: &S,
    args: &[Object],
) -> Result<()> {
    if is_compatible(registry, signature.params(), args) {
        return Ok(());
    }
    let err = InvokerError::argument_type_mismatch(
        target,
        signature.params().to_vec(),
        runtime_types(args),
    );
    warn!("{}", err);
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_types::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn editor_registry() -> (TypeRegistry, Arc<TypeDescriptor>) {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::builder("demo.Editor")
                .constructor(&[], |_| Ok(Object::Null))
                .constructor(&["string"], |_| Ok(Object::Null))
                .method("open", &["int"], "string", |_, _| Ok(Object::from(Value::from("int"))))
                .method("open", &["string"], "string", |_, _| Ok(Object::from(Value::from("string"))))
                .method("open", &["any"], "string", |_, _| Ok(Object::from(Value::from("any"))))
                .method("close", &[], "null", |_, _| Ok(Object::Null))
                .build(),
        );
        let descriptor = registry.get("demo.Editor").unwrap();
        (registry, descriptor)
    }

    fn resolved(registry: &TypeRegistry, descriptor: &Arc<TypeDescriptor>, arg: Object) -> String {
        let target = resolve_method(registry, descriptor, "open", &[arg]).unwrap();
        target.method.params()[0].clone()
    }

    #[test]
    fn test_first_compatible_overload_wins() {
        let (registry, descriptor) = editor_registry();
        assert_eq!(resolved(&registry, &descriptor, Object::from(Value::Int(1))), "int");
        assert_eq!(resolved(&registry, &descriptor, Object::from(Value::from("a"))), "string");
        assert_eq!(resolved(&registry, &descriptor, Object::from(Value::Bool(true))), "any");
    }

    #[test]
    fn test_null_is_a_wildcard() {
        let (registry, descriptor) = editor_registry();
        assert_eq!(resolved(&registry, &descriptor, Object::Null), "int");
    }

    #[test]
    fn test_single_arity_match_is_selected_without_type_check() {
        let (registry, descriptor) = editor_registry();
        let ctor = resolve_constructor(&registry, &descriptor, &[Object::from(Value::Int(3))]).unwrap();
        assert_eq!(ctor.params(), &["string".to_string()]);
        let err = ensure_compatible(&registry, "demo.Editor", ctor, &[Object::from(Value::Int(3))])
            .unwrap_err();
        assert_eq!(err.category(), "argument_type_mismatch");
    }

    #[test]
    fn test_fallback_to_first_candidate() {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::builder("demo.Math")
                .static_method("abs", &["int"], "int", |_| Ok(Object::Null))
                .static_method("abs", &["float"], "float", |_| Ok(Object::Null))
                .build(),
        );
        let descriptor = registry.get("demo.Math").unwrap();
        let target =
            resolve_method(&registry, &descriptor, "abs", &[Object::from(Value::from("x"))]).unwrap();
        assert_eq!(target.describe(), "demo.Math.abs(int)");
    }

    #[derive(Clone)]
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_fallback_is_logged_at_warn() {
        let (registry, descriptor) = editor_registry();
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));

        tracing::subscriber::with_default(subscriber, || {
            // "any" accepts a bool, so no fallback
            resolve_method(&registry, &descriptor, "open", &[Object::from(Value::Bool(true))]).unwrap();
            assert_eq!(warnings.load(Ordering::SeqCst), 0);

            let math = TypeRegistry::new();
            math.register(
                TypeDescriptor::builder("demo.Math")
                    .static_method("abs", &["int"], "int", |_| Ok(Object::Null))
                    .static_method("abs", &["float"], "float", |_| Ok(Object::Null))
                    .build(),
            );
            let abs = math.get("demo.Math").unwrap();
            resolve_method(&math, &abs, "abs", &[Object::from(Value::from("x"))]).unwrap();
        });
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_arity_miss_lists_same_named_candidates() {
        let (registry, descriptor) = editor_registry();
        let args = [Object::Null, Object::Null];
        match resolve_method(&registry, &descriptor, "open", &args).unwrap_err() {
            InvokerError::Resolution { message, candidates } => {
                assert_eq!(candidates, vec!["open(int)", "open(string)", "open(any)"]);
                assert!(message.starts_with("No method 'open' with parameter count 2 in type demo.Editor"));
            }
            other => panic!("Expected Resolution, got {:?}", other),
        }
    }
}
