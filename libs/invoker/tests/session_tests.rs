//! Session and handle lifetime tests

mod common;

use common::*;
use driver_invoker::{InvokerError, Object};
use driver_types::{Call, GLOBAL_SESSION_ID};

fn sequence_of(id: &str) -> u64 {
    id.trim_start_matches(driver_invoker::DEFAULT_REF_ID_PREFIX)
        .parse()
        .expect("numeric handle id")
}

#[test]
fn test_session_numbering_is_independent_of_explicit_ids() {
    let (invoker, _) = demo_invoker();
    assert_eq!(invoker.new_session(), 1);
    assert_eq!(invoker.new_session(), 2);
    invoker.new_session_with_id(100).unwrap();
    assert_eq!(invoker.new_session(), 3);
    assert!(invoker.store().has_session(100));
}

#[test]
fn test_explicit_id_replaces_existing_session() {
    let (invoker, _) = demo_invoker();
    let session = invoker.new_session();
    let doc = Object::instance(Document::new("first"));
    let handle = invoker.put_reference(session, doc).unwrap();

    invoker.new_session_with_id(session).unwrap();
    // Only the global mirror could still know the id, and nothing holds the object
    let err = invoker.find_reference(session, &handle.id).unwrap_err();
    assert!(matches!(err, InvokerError::ReferenceNotFound { expired: true, .. }));
}

#[test]
fn test_adhoc_round_trip_while_reachable() {
    let (invoker, _) = demo_invoker();
    let session = invoker.new_session();
    let doc = Object::instance(Document::new("adhoc"));

    let handle = invoker.put_adhoc_reference(doc.clone()).unwrap();
    assert!(invoker.find_reference(GLOBAL_SESSION_ID, &handle.id).unwrap().same_object(&doc));
    assert!(invoker.find_reference(session, &handle.id).unwrap().same_object(&doc));

    drop(doc);
    invoker.cleanup(GLOBAL_SESSION_ID);
    let err = invoker.find_reference(session, &handle.id).unwrap_err();
    assert!(err.to_string().contains("session-scoped"));
}

#[test]
fn test_sessions_are_isolated_except_through_global_mirror() {
    let (invoker, _) = demo_invoker();
    let first = invoker.new_session();
    let second = invoker.new_session();

    let doc = Object::instance(Document::new("shared"));
    let handle = invoker.put_reference(first, doc.clone()).unwrap();

    // Visible from the other session only because the object is still reachable
    assert!(invoker.find_reference(second, &handle.id).unwrap().same_object(&doc));

    let private = invoker
        .put_reference(first, Object::instance(Document::new("private")))
        .unwrap();
    invoker.cleanup(first);
    let err = invoker.find_reference(second, &private.id).unwrap_err();
    assert_eq!(err.category(), "reference_not_found");
}

#[test]
fn test_handle_survives_cleanup_while_reachable() {
    let (invoker, _) = demo_invoker();
    let session = invoker.new_session();
    let doc = Object::instance(Document::new("kept"));
    let handle = invoker.put_reference(session, doc.clone()).unwrap();

    invoker.cleanup(session);
    assert!(!invoker.store().has_session(session));
    assert!(invoker
        .find_reference(GLOBAL_SESSION_ID, &handle.id)
        .unwrap()
        .same_object(&doc));

    drop(doc);
    match invoker.find_reference(GLOBAL_SESSION_ID, &handle.id).unwrap_err() {
        InvokerError::ReferenceNotFound { id, expired } => {
            assert_eq!(id, handle.id);
            assert!(expired);
        }
        other => panic!("Expected ReferenceNotFound, got {:?}", other),
    }
}

#[test]
fn test_cleanup_purges_invoke_results() {
    let (invoker, _) = demo_invoker();
    let session = invoker.new_session();
    let created = invoker
        .invoke(&Call::new_instance(session, DOCUMENT))
        .unwrap();
    let handle = created.as_handle().unwrap().clone();

    invoker.cleanup(session);
    let other = invoker.new_session();
    assert!(invoker.find_reference(other, &handle.id).is_err());
    assert_eq!(invoker.store().global_len(), 0);
}

#[test]
fn test_handle_ids_increase_across_sessions() {
    let (invoker, _) = demo_invoker();
    let first = invoker.new_session();
    let second = invoker.new_session();

    let mut last = 0;
    for round in 0..10 {
        let session = if round % 2 == 0 { first } else { second };
        let handle = invoker
            .invoke(&Call::new_instance(session, DOCUMENT))
            .unwrap()
            .as_handle()
            .cloned()
            .unwrap();
        let sequence = sequence_of(&handle.id);
        assert!(sequence > last, "{} did not increase past {}", sequence, last);
        last = sequence;
    }
}

#[test]
fn test_calls_on_closed_session_fail() {
    let (invoker, _) = demo_invoker();
    let session = invoker.new_session();
    invoker.cleanup(session);
    let err = invoker
        .invoke(&Call::new_instance(session, DOCUMENT))
        .unwrap_err();
    assert!(matches!(err, InvokerError::SessionNotFound { .. }));
}
