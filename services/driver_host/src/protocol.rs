//! Wire Protocol
//!
//! One JSON document per line in each direction. Requests are tagged by `op`,
//! responses by `status`. Responses on a connection come back in request order.
//!
//! ```text
//! → {"op":"new_session"}
//! ← {"status":"session","session_id":1}
//! → {"op":"invoke","call":{"session_id":1,"kind":{"call":"new_instance"},"type_name":"host.Buffer"}}
//! ← {"status":"result","result":{"kind":"handle","id":"ref-1",...}}
//! → {"op":"cleanup","session_id":1}
//! ← {"status":"done"}
//! ```

use driver_invoker::{Invoker, InvokerError};
use driver_types::{Call, CallResult, ProductVersion};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Category reported for lines that are not a valid request
pub const PROTOCOL_ERROR: &str = "protocol";

/// Category reported when the host itself fails to run a request
pub const INTERNAL_ERROR: &str = "internal";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Invoke {
        call: Call,
    },
    /// Open a session; an explicit id replaces any session already using it
    NewSession {
        #[serde(default)]
        session_id: Option<u32>,
    },
    Cleanup {
        session_id: u32,
    },
    ProductVersion,
    IsInitialized,
    TakeScreenshot {
        #[serde(default)]
        out_folder: Option<String>,
    },
    Exit,
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Invoke { .. } => "invoke",
            Request::NewSession { .. } => "new_session",
            Request::Cleanup { .. } => "cleanup",
            Request::ProductVersion => "product_version",
            Request::IsInitialized => "is_initialized",
            Request::TakeScreenshot { .. } => "take_screenshot",
            Request::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Result { result: CallResult },
    Session { session_id: u32 },
    Version { version: ProductVersion },
    Initialized { initialized: bool },
    Done,
    Error { category: String, message: String },
}

impl Response {
    pub fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<&InvokerError> for Response {
    fn from(err: &InvokerError) -> Self {
        Response::error(err.category(), err.to_string())
    }
}

/// Run one request against the invoker
///
/// Blocks for as long as the call does; the server runs it off the reactor.
pub fn handle_request(invoker: &Invoker, request: Request) -> Response {
    debug!(op = request.op(), "Handling request");
    match request {
        Request::Invoke { call } => match invoker.invoke(&call) {
            Ok(result) => Response::Result { result },
            Err(err) => Response::from(&err),
        },
        Request::NewSession { session_id: None } => Response::Session {
            session_id: invoker.new_session(),
        },
        Request::NewSession {
            session_id: Some(session_id),
        } => match invoker.new_session_with_id(session_id) {
            Ok(()) => Response::Session { session_id },
            Err(err) => Response::from(&err),
        },
        Request::Cleanup { session_id } => {
            invoker.cleanup(session_id);
            Response::Done
        }
        Request::ProductVersion => Response::Version {
            version: invoker.product_version(),
        },
        Request::IsInitialized => Response::Initialized {
            initialized: invoker.is_application_initialized(),
        },
        Request::TakeScreenshot { out_folder } => {
            invoker.take_screenshot(out_folder.as_deref());
            Response::Done
        }
        Request::Exit => {
            invoker.exit();
            Response::Done
        }
    }
}

/// Parse one request line, mapping malformed input to an error response
pub fn parse_request(line: &str) -> std::result::Result<Request, Response> {
    serde_json::from_str(line).map_err(|e| Response::error(PROTOCOL_ERROR, e.to_string()))
}
