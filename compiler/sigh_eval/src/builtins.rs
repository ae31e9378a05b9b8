//! Host functions callable from Sigh: `print` and `wait`.
//!
//! Builtins are the root-scope synthetic functions. Calls reach them with
//! already-evaluated arguments plus the first argument's node, which `wait`
//! needs in order to know which variable to watch.

use sigh_ir::{NodeId, NodeKind, Synthetic};
use tracing::{debug, trace};

use crate::errors::{arity_mismatch, unbound_name, unsupported_builtin, wait_target, EvalError};
use crate::interpreter::Evaluator;
use crate::Value;

impl Evaluator<'_> {
    /// Dispatch a call to a builtin by name.
    pub(crate) fn call_builtin(
        &self,
        builtin: Synthetic,
        arguments: &[Value],
        first_argument: Option<NodeId>,
    ) -> Result<Value, EvalError> {
        let name = self.program().name(builtin.name);
        match name {
            "print" => {
                let [value] = arguments else {
                    return Err(arity_mismatch(name, 1, arguments.len()));
                };
                Ok(self.builtin_print(value))
            }
            "wait" => match (arguments.len(), first_argument) {
                (1, Some(target)) => self.builtin_wait(target),
                (count, _) => Err(arity_mismatch(name, 1, count)),
            },
            _ => Err(unsupported_builtin(name)),
        }
    }

    /// Emit the textual form of `value` as one line and return it.
    fn builtin_print(&self, value: &Value) -> Value {
        let text = value.display(self.program()).to_string();
        self.coordinator().print_handler().println(&text);
        Value::string(text)
    }

    /// Block until the variable named by `target` holds a value.
    ///
    /// Checks, then sleeps the wait poll interval, until the binding is
    /// present and not absent. There is no deadline; the loop only gives up
    /// once the run has ended.
    fn builtin_wait(&self, target: NodeId) -> Result<Value, EvalError> {
        let program = self.program();
        let NodeKind::Reference(name) = program.ast().kind(target) else {
            return Err(wait_target());
        };
        let name = *name;
        let text = program.name(name);
        let frame = program
            .semantics()
            .scope(target)
            .and_then(|scope| self.env().frame_for(scope))
            .ok_or_else(|| unbound_name(text))?
            .clone();

        let coordinator = self.coordinator();
        let interval = coordinator.config().wait_poll_interval;
        let mut polls: u64 = 0;
        loop {
            if frame.lookup(name).is_some_and(|value| !value.is_void()) {
                debug!(variable = text, polls, "wait satisfied");
                return Ok(Value::Void);
            }
            if coordinator.is_closed() {
                return Err(EvalError::new(format!(
                    "run ended while waiting for `{text}`"
                )));
            }
            polls += 1;
            trace!(variable = text, polls, "waiting");
            std::thread::sleep(interval);
        }
    }
}
