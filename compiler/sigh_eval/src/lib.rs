//! Sigh Eval - evaluator and concurrency runtime for the Sigh language.
//!
//! Runs a program analysed into [`sigh_ir::Program`]:
//! - [`Value`]: runtime values; arrays and structs are shared handles
//! - [`Environment`]: chained scope frames shared between tasks
//! - [`Evaluator`]: tree-walking dispatch over node kinds
//! - [`Coordinator`]: worker pool for `launch`, per-site `protect` locks,
//!   and the end-of-run drain
//!
//! Most callers only need [`interpret`], or [`Interpreter::builder`] to
//! choose the pool size, poll intervals, drain timeout and print handler.

mod builtins;
pub mod coordinator;
pub mod environment;
pub mod errors;
pub mod interpreter;
pub mod operators;
pub mod print_handler;
mod stack;
pub mod tracing_setup;
pub mod value;

pub use coordinator::{Coordinator, DrainStatus, ProtectSites, RunConfig, TaskFailure, TaskId};
pub use environment::{Environment, Frame, SharedFrame};
pub use errors::{ControlAction, EvalError, EvalErrorKind, EvalResult, FaultCategory};
pub use interpreter::{
    interpret, Evaluator, Interpreter, InterpreterBuilder, RunReport, ScopedEvaluator, MAX_INDEX,
};
pub use operators::{evaluate_binary, matrix_product};
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, BufferPrintHandler, PrintHandlerImpl,
    SharedPrintHandler, StdoutPrintHandler,
};
pub use stack::ensure_sufficient_stack;
pub use value::{ArrayRef, StructRef, Value, ValueDisplay};
