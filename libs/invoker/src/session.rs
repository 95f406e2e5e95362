//! Sessions and Handle Tables
//!
//! ```text
//!   sessions: DashMap<u32, Arc<Session>>        global: DashMap<id, Weak<_>>
//!   ┌──────────┬──────────────────────┐         ┌────────┬──────────────┐
//!   │ 1        │ ref-1 → Arc<Editor>  │ ──────▶ │ ref-1  │ Weak<Editor> │
//!   │          │ ref-2 → Arc<Doc>     │ ──────▶ │ ref-2  │ Weak<Doc>    │
//!   │ 2        │ ref-4 → Arc<Doc>     │ ──────▶ │ ref-3  │ Weak<Frame>  │ (adhoc)
//!   └──────────┴──────────────────────┘         │ ref-4  │ Weak<Doc>    │
//!                                               └────────┴──────────────┘
//! ```
//!
//! Session tables own their objects. The global table (session 0) only
//! mirrors them, so a handle survives its session's teardown exactly as long
//! as something else keeps the object alive. Dead global entries are swept on
//! every [`ReferenceStore::cleanup`].

use crate::error::{InvokerError, Result};
use crate::object::{Delegate, Object, Referent, WeakReferent};
use dashmap::DashMap;
use driver_types::{Ref, GLOBAL_SESSION_ID};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Process-wide handle sequence shared by every store
static REF_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_ref_sequence() -> u64 {
    REF_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Strong handle table of one controller session
#[derive(Default)]
struct Session {
    refs: DashMap<String, Referent>,
}

impl Session {
    fn lookup(&self, id: &str) -> Option<Object> {
        self.refs.get(id).map(|entry| entry.value().to_object())
    }
}

/// Outcome of probing one table
enum Lookup {
    Found(Object),
    Expired,
    Missing,
}

pub struct ReferenceStore {
    ref_id_prefix: String,
    sessions: DashMap<u32, Arc<Session>>,
    session_counter: AtomicU32,
    global: DashMap<String, WeakReferent>,
}

impl ReferenceStore {
    pub fn new(ref_id_prefix: impl Into<String>) -> Self {
        Self {
            ref_id_prefix: ref_id_prefix.into(),
            sessions: DashMap::new(),
            session_counter: AtomicU32::new(1),
            global: DashMap::new(),
        }
    }

    pub fn ref_id_prefix(&self) -> &str {
        &self.ref_id_prefix
    }

    /// Open a session with the next auto-assigned id
    pub fn new_session(&self) -> u32 {
        let session_id = self.session_counter.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(session_id, Arc::new(Session::default()));
        debug!(session_id, "Opened session");
        session_id
    }

    /// Open (or replace) a session at a caller-chosen id
    ///
    /// The auto-assign counter is left untouched, so explicit and automatic
    /// ids may later collide; the later registration wins.
    pub fn new_session_with_id(&self, session_id: u32) -> Result<()> {
        if session_id == GLOBAL_SESSION_ID {
            return Err(InvokerError::unsupported("replacing the global session"));
        }
        if let Some(previous) = self.sessions.insert(session_id, Arc::new(Session::default())) {
            previous.refs.clear();
            debug!(session_id, "Replaced existing session");
        } else {
            debug!(session_id, "Opened session with explicit id");
        }
        Ok(())
    }

    /// Drop a session's strong table, then sweep dead global entries
    ///
    /// Cleaning up the global session only sweeps.
    pub fn cleanup(&self, session_id: u32) {
        if session_id != GLOBAL_SESSION_ID {
            match self.sessions.remove(&session_id) {
                Some((_, session)) => {
                    let released = session.refs.len();
                    session.refs.clear();
                    debug!(session_id, released, "Closed session");
                }
                None => debug!(session_id, "Cleanup of unknown session ignored"),
            }
        }

        let before = self.global.len();
        self.global.retain(|_, weak| weak.is_alive());
        let swept = before.saturating_sub(self.global.len());
        if swept > 0 {
            debug!(swept, remaining = self.global.len(), "Swept expired global references");
        }
    }

    pub fn has_session(&self, session_id: u32) -> bool {
        session_id == GLOBAL_SESSION_ID || self.sessions.contains_key(&session_id)
    }

    /// Number of open controller sessions, the global session excluded
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of entries currently held in the global table, dead ones included
    pub fn global_len(&self) -> usize {
        self.global.len()
    }

    /// Issue a handle owned by `session_id`
    ///
    /// The object is held strongly by the session and mirrored weakly in the
    /// global table. In the global session the handle is weak only, and
    /// unlike [`Self::put_adhoc_reference`] pass-by-value data is accepted.
    pub fn put_reference(&self, session_id: u32, object: Object) -> Result<Ref> {
        if session_id == GLOBAL_SESSION_ID {
            return match Self::unwrap_delegates(object)? {
                Unwrapped::Remote(handle) => Ok(handle),
                Unwrapped::Local(referent) => Ok(self.put_weak(referent)),
            };
        }
        let session = self.session(session_id)?;
        let referent = match Self::unwrap_delegates(object)? {
            Unwrapped::Remote(handle) => return Ok(handle),
            Unwrapped::Local(referent) => referent,
        };

        let id = self.next_id();
        let handle = referent.make_ref(id.clone());
        self.global.insert(id.clone(), referent.downgrade());
        session.refs.insert(id.clone(), referent);
        trace!(session_id, ref_id = %id, type_name = %handle.type_name, "Issued session reference");
        Ok(handle)
    }

    /// Issue a handle that is only weakly held in the global table
    pub fn put_adhoc_reference(&self, object: Object) -> Result<Ref> {
        let referent = match Self::unwrap_delegates(object)? {
            Unwrapped::Remote(handle) => return Ok(handle),
            Unwrapped::Local(referent) => referent,
        };
        if matches!(referent, Referent::Value(_)) {
            return Err(InvokerError::unsupported(
                "weak handles to pass-by-value data",
            ));
        }
        Ok(self.put_weak(referent))
    }

    fn put_weak(&self, referent: Referent) -> Ref {
        let id = self.next_id();
        let handle = referent.make_ref(id.clone());
        self.global.insert(id.clone(), referent.downgrade());
        trace!(ref_id = %id, type_name = %handle.type_name, "Issued global reference");
        handle
    }

    /// Resolve a handle id, current session first, then every other table
    pub fn find_reference(&self, session_id: u32, id: &str) -> Result<Object> {
        let mut expired = false;

        if session_id == GLOBAL_SESSION_ID {
            match self.lookup_global(id) {
                Lookup::Found(object) => return Ok(object),
                Lookup::Expired => expired = true,
                Lookup::Missing => {}
            }
        } else if let Some(object) = self.session(session_id)?.lookup(id) {
            return Ok(object);
        }

        // Snapshot so no shard guard is held while probing
        let others: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|entry| *entry.key() != session_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        if let Some(object) = others.iter().find_map(|session| session.lookup(id)) {
            return Ok(object);
        }

        if session_id != GLOBAL_SESSION_ID {
            match self.lookup_global(id) {
                Lookup::Found(object) => return Ok(object),
                Lookup::Expired => expired = true,
                Lookup::Missing => {}
            }
        }

        debug!(session_id, ref_id = %id, expired, "Reference not found");
        Err(InvokerError::reference_not_found(id, expired))
    }

    fn session(&self, session_id: u32) -> Result<Arc<Session>> {
        self.sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| InvokerError::session_not_found(session_id))
    }

    fn lookup_global(&self, id: &str) -> Lookup {
        let upgraded = match self.global.get(id) {
            Some(entry) => entry.value().upgrade(),
            None => return Lookup::Missing,
        };
        match upgraded {
            Some(referent) => Lookup::Found(referent.to_object()),
            None => Lookup::Expired,
        }
    }

    fn next_id(&self) -> String {
        format!("{}{}", self.ref_id_prefix, next_ref_sequence())
    }

    fn unwrap_delegates(mut object: Object) -> Result<Unwrapped> {
        loop {
            if object.is_null() {
                return Err(InvokerError::unsupported("handles to null"));
            }
            let delegate = match &object {
                Object::Instance(instance) => instance.delegate(),
                _ => None,
            };
            match delegate {
                Some(Delegate::Local(inner)) => object = inner,
                Some(Delegate::Remote(handle)) => return Ok(Unwrapped::Remote(handle)),
                None => return Ok(Unwrapped::Local(Referent::from_object(object))),
            }
        }
    }
}

enum Unwrapped {
    Local(Referent),
    Remote(Ref),
}

impl Default for ReferenceStore {
    fn default() -> Self {
        Self::new(crate::DEFAULT_REF_ID_PREFIX)
    }
}

impl std::fmt::Debug for ReferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceStore")
            .field("ref_id_prefix", &self.ref_id_prefix)
            .field("sessions", &self.sessions.len())
            .field("global", &self.global.len())
            .finish()
    }
}
