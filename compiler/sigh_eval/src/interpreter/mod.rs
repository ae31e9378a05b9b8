//! Tree-walking evaluator.
//!
//! One [`Evaluator`] runs one task: the main program, or the call or
//! declaration carried by a `launch`. Dispatch is a single exhaustive match
//! over [`NodeKind`]. Every rule returns [`EvalResult`], so `?` carries both
//! faults and `return` outward; only call frames and the program root
//! consume [`ControlAction::Return`].
//!
//! Evaluators never own the program or the coordinator. A spawned task's
//! closure owns `Arc` handles to both plus a clone of the spawner's
//! [`Environment`], and builds its evaluator on the worker thread.

mod builder;
mod scope_guard;

use std::sync::Arc;

use sigh_ir::{
    BinaryOp, DeclRef, Name, NodeId, NodeKind, Program, ScopeId, SharedProgram, Synthetic,
    SyntheticKind, Type, UnaryOp,
};
use tracing::debug;

pub use builder::{interpret, Interpreter, InterpreterBuilder, RunReport};
pub use scope_guard::ScopedEvaluator;

use crate::coordinator::Coordinator;
use crate::environment::{Environment, SharedFrame};
use crate::errors::{
    arity_mismatch, index_out_of_bounds, index_too_large, invalid_assignment_target,
    negative_index, not_callable, null_dereference, type_mismatch, unbound_name,
    undefined_field, ControlAction, EvalError, EvalResult,
};
use crate::operators::{evaluate_binary, matrix_product, non_null_array};
use crate::stack::ensure_sufficient_stack;
use crate::value::StructRef;
use crate::Value;

/// Largest index an array access may use.
pub const MAX_INDEX: i64 = i32::MAX as i64 - 1;

static VOID: Type = Type::Void;

/// Evaluates nodes of one program for one task.
pub struct Evaluator<'p> {
    program: &'p SharedProgram,
    coordinator: &'p Arc<Coordinator>,
    pub(crate) env: Environment,
}

impl<'p> Evaluator<'p> {
    pub fn new(
        program: &'p SharedProgram,
        coordinator: &'p Arc<Coordinator>,
        env: Environment,
    ) -> Self {
        Evaluator {
            program,
            coordinator,
            env,
        }
    }

    #[inline]
    pub fn program(&self) -> &'p Program {
        self.program
    }

    #[inline]
    pub fn coordinator(&self) -> &'p Arc<Coordinator> {
        self.coordinator
    }

    #[inline]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Evaluate a node. Faults leaving it without a span get the node's.
    pub fn eval(&mut self, id: NodeId) -> EvalResult {
        ensure_sufficient_stack(|| self.eval_inner(id))
            .map_err(|action| action.with_span_if_error(self.program.ast().span(id)))
    }

    /// Run the top-level statements of the root node in the current frame.
    ///
    /// A `return` at top level ends the program with its value.
    pub fn eval_root(&mut self, root: NodeId) -> Result<Value, EvalError> {
        let program = self.program();
        let NodeKind::Root { statements } = program.ast().kind(root) else {
            return Err(type_mismatch("program root", "statement"));
        };
        match self.eval_statements(statements) {
            Ok(_) => Ok(Value::Void),
            Err(ControlAction::Return(value)) => Ok(value),
            Err(ControlAction::Error(error)) => Err(*error),
        }
    }

    /// Body of a spawned task. Its value is discarded.
    pub fn run_task(&mut self, node: NodeId) -> Result<(), EvalError> {
        match self.eval(node) {
            Ok(_) | Err(ControlAction::Return(_)) => Ok(()),
            Err(ControlAction::Error(error)) => Err(*error),
        }
    }

    fn eval_inner(&mut self, id: NodeId) -> EvalResult {
        let program = self.program();
        match program.ast().kind(id) {
            // Literals
            NodeKind::IntLiteral(n) => Ok(Value::Int(*n)),
            NodeKind::FloatLiteral(x) => Ok(Value::Float(*x)),
            NodeKind::StringLiteral(s) => Ok(Value::Str(Arc::clone(s))),

            // Expressions
            NodeKind::Reference(name) => Ok(self.eval_reference(id, *name)?),
            NodeKind::Constructor { reference } => match program.semantics().decl(*reference) {
                Some(DeclRef::Node(decl)) => Ok(Value::Constructor(decl)),
                _ => Err(type_mismatch("struct", "builtin").into()),
            },
            NodeKind::Parenthesized(inner) => self.eval(*inner),
            NodeKind::ArrayLiteral(elements) => {
                let values = self.eval_all(elements)?;
                Ok(Value::array(values))
            }
            NodeKind::ArrayAccess { array, index } => {
                let array = non_null_array(&self.eval(*array)?)?;
                let index = self.eval_index(*index)?;
                array
                    .get(index)
                    .ok_or_else(|| {
                        ControlAction::from(index_out_of_bounds(index_i64(index), array.len()))
                    })
            }
            NodeKind::FieldAccess { stem, field } => {
                let stem = self.eval(*stem)?;
                Ok(self.read_field(&stem, *field)?)
            }
            NodeKind::FunCall {
                function,
                arguments,
            } => self.eval_call(*function, arguments),
            NodeKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let value = self.eval(*operand)?;
                let b = value
                    .as_bool()
                    .ok_or_else(|| type_mismatch("Bool", value.type_name()))?;
                Ok(Value::Bool(!b))
            }
            NodeKind::Binary { op, left, right } => self.eval_binary(*op, *left, *right),
            NodeKind::Assignment { target, value } => self.eval_assignment(*target, *value),

            // Statements
            NodeKind::Root { statements } => {
                self.eval_statements(statements)?;
                Ok(Value::Void)
            }
            NodeKind::Block { statements } => {
                let scope = self.scope_of(id)?;
                let mut scoped = self.scoped(scope);
                scoped.eval_statements(statements)?;
                Ok(Value::Void)
            }
            NodeKind::ExpressionStatement(expression) => {
                self.eval(*expression)?;
                Ok(Value::Void)
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(*condition)? {
                    self.eval(*then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.eval(*else_branch)?;
                }
                Ok(Value::Void)
            }
            NodeKind::While { condition, body } => {
                while self.eval_condition(*condition)? {
                    self.eval(*body)?;
                }
                Ok(Value::Void)
            }
            NodeKind::Return { value } => {
                let value = match value {
                    Some(value) => self.eval(*value)?,
                    None => Value::Void,
                };
                Err(ControlAction::Return(value))
            }

            // Concurrency
            NodeKind::Launch { call } => {
                self.spawn(*call);
                Ok(Value::Void)
            }
            NodeKind::LaunchDecl { declaration } => {
                self.launch_declaration(*declaration)?;
                Ok(Value::Void)
            }
            NodeKind::ProtectBlock { block } => self.eval_protected(id, *block),

            // Declarations
            NodeKind::VarDecl { name, initializer } => {
                let value = self.eval(*initializer)?;
                let value = widen(value, self.type_of(id));
                let scope = self.scope_of(id)?;
                self.env
                    .set(scope, *name, value, program.name(*name))?;
                Ok(Value::Void)
            }
            NodeKind::FunDecl { .. }
            | NodeKind::Parameter { .. }
            | NodeKind::StructDecl { .. }
            | NodeKind::FieldDecl { .. } => Ok(Value::Void),
        }
    }

    fn eval_statements(&mut self, statements: &[NodeId]) -> EvalResult {
        for &statement in statements {
            self.eval(statement)?;
        }
        Ok(Value::Void)
    }

    fn eval_all(&mut self, nodes: &[NodeId]) -> Result<Vec<Value>, ControlAction> {
        nodes.iter().map(|&node| self.eval(node)).collect()
    }

    fn eval_condition(&mut self, condition: NodeId) -> Result<bool, ControlAction> {
        let value = self.eval(condition)?;
        value
            .as_bool()
            .ok_or_else(|| ControlAction::from(type_mismatch("Bool", value.type_name())))
    }

    /// Evaluate an index expression and check it against the fixed bounds.
    /// The array's own length is checked by the caller.
    fn eval_index(&mut self, index: NodeId) -> Result<usize, ControlAction> {
        let value = self.eval(index)?;
        let index = value
            .as_int()
            .ok_or_else(|| type_mismatch("Int", value.type_name()))?;
        Ok(check_index(index)?)
    }

    // Attributes

    fn scope_of(&self, id: NodeId) -> Result<ScopeId, EvalError> {
        let program = self.program();
        program.semantics().scope(id).ok_or_else(|| {
            let name = match program.ast().kind(id) {
                NodeKind::Reference(name) => program.name(*name),
                kind => kind.declared_name().map_or("<scope>", |n| program.name(n)),
            };
            unbound_name(name)
        })
    }

    fn type_of(&self, id: NodeId) -> &'p Type {
        self.program().semantics().type_of(id).unwrap_or(&VOID)
    }

    // Names

    fn eval_reference(&self, id: NodeId, name: Name) -> Result<Value, EvalError> {
        let program = self.program();
        let text = program.name(name);
        let decl = program
            .semantics()
            .decl(id)
            .ok_or_else(|| unbound_name(text))?;
        match decl {
            DeclRef::Synthetic(Synthetic {
                kind: SyntheticKind::Variable,
                ..
            }) => self.env.get(self.env.root_scope(), name, text),
            DeclRef::Synthetic(Synthetic {
                kind: SyntheticKind::Function,
                ..
            }) => Ok(Value::Function(decl)),
            DeclRef::Synthetic(Synthetic {
                kind: SyntheticKind::Type,
                ..
            }) => Ok(Value::Type(decl)),
            DeclRef::Node(node) => match program.ast().kind(node) {
                NodeKind::VarDecl { .. } | NodeKind::Parameter { .. } => {
                    self.env.get(self.scope_of(id)?, name, text)
                }
                NodeKind::FunDecl { .. } => Ok(Value::Function(decl)),
                NodeKind::StructDecl { .. } => Ok(Value::Type(decl)),
                _ => Err(unbound_name(text)),
            },
        }
    }

    fn read_field(&self, stem: &Value, field: Name) -> Result<Value, EvalError> {
        let text = self.program().name(field);
        match stem {
            Value::Null => Err(null_dereference("accessing field of null object")),
            Value::Array(array) if text == "length" => Ok(Value::Int(index_i64(array.len()))),
            Value::Struct(instance) => instance.get(field).ok_or_else(|| undefined_field(text)),
            _ => Err(undefined_field(text)),
        }
    }

    fn eval_assignment(&mut self, target: NodeId, value: NodeId) -> EvalResult {
        let program = self.program();
        match program.ast().kind(target) {
            NodeKind::Reference(name) => {
                let assigned = widen(self.eval(value)?, self.type_of(target));
                let scope = self.scope_of(target)?;
                self.env
                    .set(scope, *name, assigned.clone(), program.name(*name))?;
                Ok(assigned)
            }
            NodeKind::ArrayAccess { array, index } => {
                let array = non_null_array(&self.eval(*array)?)?;
                let index = self.eval_index(*index)?;
                let assigned = widen(self.eval(value)?, self.type_of(target));
                if array.set(index, assigned.clone()) {
                    Ok(assigned)
                } else {
                    Err(index_out_of_bounds(index_i64(index), array.len()).into())
                }
            }
            NodeKind::FieldAccess { stem, field } => {
                let stem = self.eval(*stem)?;
                let assigned = widen(self.eval(value)?, self.type_of(target));
                match &stem {
                    Value::Null => Err(null_dereference("accessing field of null object").into()),
                    Value::Struct(instance) if instance.set(*field, assigned.clone()) => {
                        Ok(assigned)
                    }
                    _ => Err(undefined_field(program.name(*field)).into()),
                }
            }
            _ => Err(invalid_assignment_target().into()),
        }
    }

    // Operators

    fn eval_binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> EvalResult {
        match op {
            BinaryOp::And => {
                Ok(Value::Bool(self.eval_condition(left)? && self.eval_condition(right)?))
            }
            BinaryOp::Or => {
                Ok(Value::Bool(self.eval_condition(left)? || self.eval_condition(right)?))
            }
            BinaryOp::MatProduct => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                Ok(matrix_product(&l, &r)?)
            }
            _ => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                let left_ty = self.type_of(left);
                let right_ty = self.type_of(right);
                Ok(evaluate_binary(op, &l, &r, left_ty, right_ty, self.program())?)
            }
        }
    }

    // Calls

    fn eval_call(&mut self, function: NodeId, arguments: &[NodeId]) -> EvalResult {
        let callee = self.eval(function)?;
        let values = self.eval_all(arguments)?;
        match callee {
            Value::Function(DeclRef::Synthetic(builtin)) => {
                Ok(self.call_builtin(builtin, &values, arguments.first().copied())?)
            }
            Value::Function(DeclRef::Node(fun)) => self.call_function(fun, values),
            Value::Constructor(decl) => Ok(self.build_struct(decl, values)?),
            Value::Null => Err(null_dereference("calling a null function").into()),
            other => Err(not_callable(other.type_name()).into()),
        }
    }

    /// Call a user function: bind the arguments in a fresh frame for the
    /// parameter scope, run the body, and turn `return` into the result.
    ///
    /// The frame hangs off the frame of the scope the function is declared
    /// in, not off the caller's frame.
    pub fn call_function(&mut self, fun: NodeId, arguments: Vec<Value>) -> EvalResult {
        let program = self.program();
        let NodeKind::FunDecl {
            name,
            parameters,
            body,
        } = program.ast().kind(fun)
        else {
            return Err(not_callable("declaration").into());
        };
        let text = program.name(*name);
        if parameters.len() != arguments.len() {
            return Err(arity_mismatch(text, parameters.len(), arguments.len()).into());
        }

        let semantics = program.semantics();
        let body_scope = semantics
            .body_scope(fun)
            .ok_or_else(|| unbound_name(text))?;
        let parent = self.declaring_frame(body_scope);

        let mut scoped = self.scoped_under(body_scope, parent);
        for (&param, argument) in parameters.iter().zip(arguments) {
            let NodeKind::Parameter { name } = program.ast().kind(param) else {
                continue;
            };
            let argument = widen(argument, scoped.type_of(param));
            scoped.env.current().define(*name, argument);
        }
        match scoped.eval(*body) {
            Ok(_) => Ok(Value::Void),
            Err(ControlAction::Return(value)) => Ok(value),
            Err(error) => Err(error),
        }
    }

    /// Frame that a call of a function with this parameter scope chains to.
    fn declaring_frame(&self, body_scope: ScopeId) -> SharedFrame {
        self.program()
            .semantics()
            .parent_scope(body_scope)
            .and_then(|scope| self.env.frame_for(scope))
            .unwrap_or_else(|| self.env.root())
            .clone()
    }

    fn build_struct(&self, decl: NodeId, values: Vec<Value>) -> Result<Value, EvalError> {
        let program = self.program();
        let NodeKind::StructDecl { name, fields } = program.ast().kind(decl) else {
            return Err(not_callable("constructor"));
        };
        if fields.len() != values.len() {
            return Err(arity_mismatch(
                program.name(*name),
                fields.len(),
                values.len(),
            ));
        }
        let mut names = Vec::with_capacity(fields.len());
        let mut cells = Vec::with_capacity(fields.len());
        for (&field, value) in fields.iter().zip(values) {
            if let NodeKind::FieldDecl { name } = program.ast().kind(field) {
                names.push(*name);
                cells.push(widen(value, self.type_of(field)));
            }
        }
        Ok(Value::Struct(StructRef::new(decl, names, cells)))
    }

    // Concurrency

    /// Submit `node` as a task running on a clone of the current
    /// environment. Frames on the chain right now are shared with the task.
    fn spawn(&self, node: NodeId) {
        let program = Arc::clone(self.program);
        let coordinator = Arc::clone(self.coordinator);
        let env = self.env.clone();
        let task = self.coordinator.spawn(move || {
            let mut evaluator = Evaluator::new(&program, &coordinator, env);
            evaluator.run_task(node)
        });
        debug!(%task, ?node, "launched");
    }

    /// `launch var x = f()`: bind `x` to the absent value now, then let a
    /// task evaluate the declaration, which overwrites it when done.
    fn launch_declaration(&mut self, declaration: NodeId) -> Result<(), EvalError> {
        let program = self.program();
        let NodeKind::VarDecl { name, .. } = program.ast().kind(declaration) else {
            return Err(type_mismatch("variable declaration", "statement"));
        };
        let scope = self.scope_of(declaration)?;
        self.env
            .set(scope, *name, Value::Void, program.name(*name))?;
        self.spawn(declaration);
        Ok(())
    }

    /// Run `block` holding the lock of the protect site `site`. The lock
    /// is released however the block exits; a `return` inside it keeps
    /// propagating afterwards.
    fn eval_protected(&mut self, site: NodeId, block: NodeId) -> EvalResult {
        let lock = self.coordinator.protect_sites().lock_for(site);
        let _guard = lock.lock();
        // An early `return` leaves through `?`; the guard still unlocks.
        self.eval(block)?;
        Ok(Value::Void)
    }
}

/// Integer to float promotion when the binding is `Float`-typed.
#[expect(
    clippy::cast_precision_loss,
    reason = "integer to float widening is the language's promotion rule"
)]
fn widen(value: Value, ty: &Type) -> Value {
    match (value, ty) {
        (Value::Int(n), Type::Float) => Value::Float(n as f64),
        (value, _) => value,
    }
}

fn check_index(index: i64) -> Result<usize, EvalError> {
    if index < 0 {
        return Err(negative_index(index));
    }
    if index >= MAX_INDEX {
        return Err(index_too_large(index));
    }
    usize::try_from(index).map_err(|_| index_too_large(index))
}

fn index_i64(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
