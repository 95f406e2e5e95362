//! Handles to objects that live inside the driven process

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a live object
///
/// Ids are unique for the lifetime of the process. The identity token and debug
/// text are informational snapshots taken when the handle was issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub id: String,
    pub type_name: String,
    pub identity_hash: u64,
    pub debug_text: String,
}

impl Ref {
    pub fn new(
        id: impl Into<String>,
        type_name: impl Into<String>,
        identity_hash: u64,
        debug_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            identity_hash,
            debug_text: debug_text.into(),
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({}, {})", self.id, self.type_name)
    }
}

/// Handle to a collection plus one handle per element, in iteration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefList {
    pub container: Ref,
    pub element_type: String,
    pub items: Vec<Ref>,
}

impl RefList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
