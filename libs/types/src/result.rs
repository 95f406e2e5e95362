//! Result envelope returned for every successful call

use crate::{Ref, RefList, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallResult {
    Value { value: Value },
    Handle { handle: Ref },
    HandleList { list: RefList },
}

impl CallResult {
    pub fn value(value: Value) -> Self {
        CallResult::Value { value }
    }

    pub fn handle(handle: Ref) -> Self {
        CallResult::Handle { handle }
    }

    pub fn handle_list(list: RefList) -> Self {
        CallResult::HandleList { list }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            CallResult::Value { value } => Some(value),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Ref> {
        match self {
            CallResult::Handle { handle } => Some(handle),
            _ => None,
        }
    }

    pub fn as_handle_list(&self) -> Option<&RefList> {
        match self {
            CallResult::HandleList { list } => Some(list),
            _ => None,
        }
    }
}
