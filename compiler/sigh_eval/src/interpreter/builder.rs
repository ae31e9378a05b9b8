//! `InterpreterBuilder` and the run entry points.

use std::time::Duration;

use sigh_ir::SharedProgram;
use tracing::debug;

use super::Evaluator;
use crate::coordinator::{Coordinator, DrainStatus, RunConfig, TaskFailure};
use crate::environment::Environment;
use crate::errors::EvalError;
use crate::print_handler::SharedPrintHandler;
use crate::Value;

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Value of a top-level `return`, or [`Value::Void`].
    pub value: Value,
    /// Whether every task finished before the run returned.
    pub drain: DrainStatus,
    /// Tasks that ended with a fault or a panic.
    pub task_failures: Vec<TaskFailure>,
}

/// A program plus the settings to run it with.
pub struct Interpreter {
    program: SharedProgram,
    config: RunConfig,
}

/// Builder for [`Interpreter`]. Unset options keep [`RunConfig::default`].
pub struct InterpreterBuilder {
    program: SharedProgram,
    config: RunConfig,
}

impl InterpreterBuilder {
    pub fn new(program: SharedProgram) -> Self {
        InterpreterBuilder {
            program,
            config: RunConfig::default(),
        }
    }

    /// Number of worker threads running launched tasks.
    #[must_use]
    pub fn pool_size(mut self, workers: usize) -> Self {
        self.config.pool_size = workers;
        self
    }

    /// Sleep between two checks of `wait`.
    #[must_use]
    pub fn wait_poll_interval(mut self, interval: Duration) -> Self {
        self.config.wait_poll_interval = interval;
        self
    }

    /// Progress interval of the end-of-run drain.
    #[must_use]
    pub fn drain_poll_interval(mut self, interval: Duration) -> Self {
        self.config.drain_poll_interval = interval;
        self
    }

    /// Stop draining after `timeout` and report the run as
    /// [`DrainStatus::Incomplete`]. `None` drains until every task is done.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    /// Destination of `print`. Default is stdout.
    #[must_use]
    pub fn print_handler(mut self, handler: SharedPrintHandler) -> Self {
        self.config.print_handler = handler;
        self
    }

    pub fn build(self) -> Interpreter {
        Interpreter {
            program: self.program,
            config: self.config,
        }
    }
}

impl Interpreter {
    pub fn builder(program: SharedProgram) -> InterpreterBuilder {
        InterpreterBuilder::new(program)
    }

    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the program to completion.
    ///
    /// Seeds the root frame, starts the worker pool, executes the top-level
    /// statements on the calling thread, then drains outstanding tasks.
    /// The drain happens on every path, including a fault in the main
    /// program, which is then returned as the error.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&self) -> Result<RunReport, EvalError> {
        let program = &self.program;
        let coordinator = Coordinator::start(self.config.clone())?;

        let env = Environment::new(program.semantics().root_scope());
        let interner = program.interner();
        for (text, value) in [
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            ("null", Value::Null),
        ] {
            if let Some(name) = interner.get(text) {
                env.root().define(name, value);
            }
        }

        let outcome = Evaluator::new(program, &coordinator, env).eval_root(program.root());
        let drain = coordinator.drain();
        let task_failures = coordinator.take_failures();
        let value = outcome?;
        debug!(?drain, failures = task_failures.len(), "run finished");
        Ok(RunReport {
            value,
            drain,
            task_failures,
        })
    }
}

/// Run `program` with the default configuration and return its top-level
/// value.
pub fn interpret(program: &SharedProgram) -> Result<Value, EvalError> {
    Interpreter::builder(SharedProgram::clone(program))
        .build()
        .run()
        .map(|report| report.value)
}
