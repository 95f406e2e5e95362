//! Execution Context
//!
//! Runs a resolved call body under the requested lock discipline and thread
//! affinity, optionally inside a timed tracing span.
//!
//! ```text
//!  caller thread                     UI executor thread
//!  ─────────────                     ──────────────────
//!  run(Edt) ── task ──▶ bounded queue ──▶ span → lock → body
//!     │                                          │
//!     └──────────── blocks on reply ◀────────────┘
//! ```
//!
//! A body that itself waits on the issuing thread while running on the UI
//! thread deadlocks; the rendezvous is strictly synchronous.

use crate::error::{CallFault, InvokerError, Result};
use crate::object::Object;
use crate::registry::BodyResult;
use crossbeam_channel::{bounded, Sender};
use driver_types::{LockSemantics, OnDispatcher};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Anything held for the duration of a call body and released on drop
pub trait LockGuard {}

impl<T: ?Sized> LockGuard for T {}

/// Host-wide read/write lock that call bodies may run under
pub trait ApplicationLock: Send + Sync {
    fn read(&self) -> Box<dyn LockGuard + '_>;
    fn write(&self) -> Box<dyn LockGuard + '_>;
}

/// Default lock backed by a process-local `parking_lot::RwLock`
///
/// Reads nest, even with a writer queued. Writes are not reentrant: a
/// write-locked body must not issue another locked call on the same thread.
#[derive(Debug, Default)]
pub struct ProcessLock {
    lock: RwLock<()>,
}

impl ProcessLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationLock for ProcessLock {
    fn read(&self) -> Box<dyn LockGuard + '_> {
        Box::new(self.lock.read_recursive())
    }

    fn write(&self) -> Box<dyn LockGuard + '_> {
        Box::new(self.lock.write())
    }
}

pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler for the single UI thread
pub trait UiDispatcher: Send + Sync {
    fn is_ui_thread(&self) -> bool;

    /// Run `task` on the UI thread and block until it has finished
    fn invoke_and_wait(&self, task: UiTask) -> std::result::Result<(), CallFault>;
}

/// Default UI thread: one consumer fed by a bounded crossbeam queue
pub struct UiExecutor {
    sender: Option<Sender<UiTask>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl UiExecutor {
    pub fn start(queue_capacity: usize) -> std::io::Result<Self> {
        let (sender, receiver) = bounded::<UiTask>(queue_capacity.max(1));
        let handle = thread::Builder::new()
            .name("driver-ui".to_string())
            .spawn(move || {
                debug!("UI executor started");
                while let Ok(task) = receiver.recv() {
                    task();
                }
                debug!("UI executor stopped");
            })?;
        Ok(Self {
            sender: Some(sender),
            thread_id: handle.thread().id(),
            handle: Some(handle),
        })
    }
}

impl UiDispatcher for UiExecutor {
    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn invoke_and_wait(&self, task: UiTask) -> std::result::Result<(), CallFault> {
        if self.is_ui_thread() {
            return catch_unwind(AssertUnwindSafe(task)).map_err(panic_fault);
        }

        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| CallFault::illegal_state("UI executor has shut down"))?;
        let (reply_tx, reply_rx) = bounded(1);
        let wrapped: UiTask = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(task)).map_err(panic_fault);
            let _ = reply_tx.send(outcome);
        });
        sender
            .send(wrapped)
            .map_err(|_| CallFault::illegal_state("UI executor has shut down"))?;
        reply_rx
            .recv()
            .map_err(|_| CallFault::illegal_state("UI executor dropped the task"))?
    }
}

impl Drop for UiExecutor {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if thread::current().id() != self.thread_id && handle.join().is_err() {
                error!("UI executor thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for UiExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiExecutor")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

fn panic_fault(payload: Box<dyn Any + Send>) -> CallFault {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "call body panicked".to_string());
    CallFault::new("Panic", message)
}

/// Source of timed spans around call bodies
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str) -> Box<dyn LockGuard>;
}

/// Supplies the ambient trace context new spans are parented to
pub type ContextSupplier = Arc<dyn Fn() -> tracing::Span + Send + Sync>;

/// Tracer built on `tracing` spans
pub struct TracingTracer {
    context: ContextSupplier,
}

impl TracingTracer {
    pub fn new(context: ContextSupplier) -> Self {
        Self { context }
    }

    /// Spans parented to whatever span is current on the executing thread
    pub fn current() -> Self {
        Self::new(Arc::new(tracing::Span::current))
    }
}

struct TimedSpan {
    _entered: tracing::span::EnteredSpan,
    name: String,
    started: Instant,
}

impl Drop for TimedSpan {
    fn drop(&mut self) {
        debug!(
            span_name = %self.name,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "Timed call finished"
        );
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str) -> Box<dyn LockGuard> {
        let parent = (self.context)();
        let span = tracing::info_span!(parent: &parent, "timed_call", span_name = %name);
        Box::new(TimedSpan {
            _entered: span.entered(),
            name: name.to_string(),
            started: Instant::now(),
        })
    }
}

pub type TracerFactory = Arc<dyn Fn() -> Arc<dyn Tracer> + Send + Sync>;

/// Tracer created on first use
struct LazyTracer {
    cell: OnceCell<Arc<dyn Tracer>>,
    factory: TracerFactory,
}

impl LazyTracer {
    fn get(&self) -> &Arc<dyn Tracer> {
        self.cell.get_or_init(|| {
            debug!("Initializing call tracer");
            (self.factory)()
        })
    }
}

/// Lock, thread affinity and tracing applied around every call body
#[derive(Clone)]
pub struct ExecutionContext {
    lock: Arc<dyn ApplicationLock>,
    ui: Arc<dyn UiDispatcher>,
    tracer: Arc<LazyTracer>,
}

impl ExecutionContext {
    pub fn new(
        lock: Arc<dyn ApplicationLock>,
        ui: Arc<dyn UiDispatcher>,
        tracer_factory: TracerFactory,
    ) -> Self {
        Self {
            lock,
            ui,
            tracer: Arc::new(LazyTracer {
                cell: OnceCell::new(),
                factory: tracer_factory,
            }),
        }
    }

    /// Whether the tracer has been created yet
    pub fn tracer_initialized(&self) -> bool {
        self.tracer.cell.get().is_some()
    }

    /// Run `body` for `target` with the given semantics
    ///
    /// Faults raised by the body are logged once and returned inside
    /// [`InvokerError::InvocationFault`].
    pub fn run<F>(
        &self,
        target: &str,
        lock: LockSemantics,
        dispatcher: OnDispatcher,
        span_name: Option<&str>,
        body: F,
    ) -> Result<Object>
    where
        F: FnOnce() -> BodyResult + Send + 'static,
    {
        let outcome = match dispatcher {
            OnDispatcher::Io => {
                return Err(InvokerError::unsupported("IO dispatcher"));
            }
            OnDispatcher::Default => self.run_here(lock, span_name, body),
            OnDispatcher::Edt => self.run_on_ui(lock, span_name, body),
        };

        outcome.map_err(|fault| {
            warn!(call = %target, fault = %fault, "Error during remote driver call");
            InvokerError::invocation_fault(target, fault)
        })
    }

    fn run_on_ui<F>(&self, lock: LockSemantics, span_name: Option<&str>, body: F) -> BodyResult
    where
        F: FnOnce() -> BodyResult + Send + 'static,
    {
        let context = self.clone();
        let span_name = span_name.map(str::to_string);
        let (reply_tx, reply_rx) = bounded(1);
        self.ui.invoke_and_wait(Box::new(move || {
            let outcome = context.run_here(lock, span_name.as_deref(), body);
            let _ = reply_tx.send(outcome);
        }))?;
        reply_rx
            .try_recv()
            .map_err(|_| CallFault::illegal_state("UI task finished without a result"))?
    }

    /// Span, then lock, then body, all on the current thread
    fn run_here<F>(&self, lock: LockSemantics, span_name: Option<&str>, body: F) -> BodyResult
    where
        F: FnOnce() -> BodyResult,
    {
        let _span = span_name
            .filter(|name| !name.is_empty())
            .map(|name| self.tracer.get().start_span(name));

        let _guard = match lock {
            LockSemantics::NoLock => None,
            LockSemantics::ReadAction => Some(self.lock.read()),
            LockSemantics::WriteAction => Some(self.lock.write()),
        };

        catch_unwind(AssertUnwindSafe(body)).map_err(panic_fault)?
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("tracer_initialized", &self.tracer_initialized())
            .finish()
    }
}
