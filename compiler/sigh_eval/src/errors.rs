//! Runtime faults and control-flow signals.
//!
//! Faults are [`EvalError`]s carrying a structured [`EvalErrorKind`]. Early
//! return is not a fault: it travels as [`ControlAction::Return`] on the
//! same `Err` channel so `?` unwinds both, and only call frames and the
//! program root consume it.
//!
//! Factory functions (e.g. `division_by_zero()`) are the public way to
//! build errors; they populate both `kind` and `message`.

use std::fmt;

use sigh_ir::Span;

use crate::Value;

/// Result of evaluating a node.
pub type EvalResult = Result<Value, ControlAction>;

/// Non-local exits propagated through evaluation.
#[derive(Clone, Debug)]
pub enum ControlAction {
    /// A fault; terminates the current task.
    Error(Box<EvalError>),
    /// `return`, carrying the returned value (or [`Value::Void`]).
    Return(Value),
}

impl ControlAction {
    /// Attach a span to a fault that does not have one yet.
    ///
    /// Returns pass through unchanged.
    #[must_use]
    pub fn with_span_if_error(self, span: Span) -> Self {
        match self {
            ControlAction::Error(mut e) if e.span.is_none() => {
                e.span = Some(span);
                ControlAction::Error(e)
            }
            other => other,
        }
    }
}

impl From<EvalError> for ControlAction {
    fn from(error: EvalError) -> Self {
        ControlAction::Error(Box::new(error))
    }
}

/// Coarse fault taxonomy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    /// A declared name has no binding; an upstream analysis defect.
    Unbound,
    NullDereference,
    Index,
    Arithmetic,
    Shape,
    UnsupportedBuiltin,
    /// A value of the wrong runtime shape; an upstream analysis defect.
    Type,
    /// Host-side failures (worker pool, task panics).
    Runtime,
}

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    // Names
    UnboundName {
        name: String,
    },

    // Null
    NullDereference {
        context: &'static str,
    },

    // Indexing
    NegativeIndex {
        index: i64,
    },
    IndexTooLarge {
        index: i64,
    },
    IndexOutOfBounds {
        index: i64,
        length: usize,
    },

    // Arithmetic
    DivisionByZero,
    ModuloByZero,

    // Shape
    LengthMismatch {
        left: usize,
        right: usize,
    },
    EmptyArray,
    NestingMismatch,
    MatrixDimension {
        rows: usize,
        columns: usize,
    },

    // Calls
    UnsupportedBuiltin {
        name: String,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    NotCallable {
        type_name: &'static str,
    },
    WaitTarget,

    // Type
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    InvalidBinaryOp {
        op: &'static str,
        type_name: &'static str,
    },
    UndefinedField {
        field: String,
    },
    InvalidAssignmentTarget,

    // Runtime
    PoolStartup {
        message: String,
    },
    TaskPanicked {
        message: String,
    },
    Custom {
        message: String,
    },
}

impl EvalErrorKind {
    /// Map onto the coarse taxonomy.
    pub fn category(&self) -> FaultCategory {
        match self {
            Self::UnboundName { .. } => FaultCategory::Unbound,
            Self::NullDereference { .. } => FaultCategory::NullDereference,
            Self::NegativeIndex { .. }
            | Self::IndexTooLarge { .. }
            | Self::IndexOutOfBounds { .. } => FaultCategory::Index,
            Self::DivisionByZero | Self::ModuloByZero => FaultCategory::Arithmetic,
            Self::LengthMismatch { .. }
            | Self::EmptyArray
            | Self::NestingMismatch
            | Self::MatrixDimension { .. } => FaultCategory::Shape,
            Self::UnsupportedBuiltin { .. } => FaultCategory::UnsupportedBuiltin,
            Self::ArityMismatch { .. }
            | Self::NotCallable { .. }
            | Self::WaitTarget
            | Self::TypeMismatch { .. }
            | Self::InvalidBinaryOp { .. }
            | Self::UndefinedField { .. }
            | Self::InvalidAssignmentTarget => FaultCategory::Type,
            Self::PoolStartup { .. } | Self::TaskPanicked { .. } | Self::Custom { .. } => {
                FaultCategory::Runtime
            }
        }
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundName { name } => write!(f, "no binding for `{name}`"),
            Self::NullDereference { context } => write!(f, "null dereference: {context}"),
            Self::NegativeIndex { index } => write!(f, "negative index: {index}"),
            Self::IndexTooLarge { index } => {
                write!(f, "index exceeds max array index (2^31 - 2): {index}")
            }
            Self::IndexOutOfBounds { index, length } => {
                write!(f, "index {index} out of bounds for length {length}")
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ModuloByZero => write!(f, "modulo by zero"),
            Self::LengthMismatch { left, right } => write!(
                f,
                "the two arrays must have the same length: left has {left}, right has {right}"
            ),
            Self::EmptyArray => write!(f, "no operations allowed on empty arrays"),
            Self::NestingMismatch => write!(f, "the two arrays have different nesting"),
            Self::MatrixDimension { rows, columns } => write!(
                f,
                "number of rows of the left matrix ({rows}) differs from \
                 number of columns of the right matrix ({columns})"
            ),
            Self::UnsupportedBuiltin { name } => write!(f, "`{name}` is not a builtin function"),
            Self::ArityMismatch {
                name,
                expected,
                got,
            } => write!(
                f,
                "`{name}` expects {expected} argument{}, got {got}",
                if *expected == 1 { "" } else { "s" }
            ),
            Self::NotCallable { type_name } => write!(f, "{type_name} is not callable"),
            Self::WaitTarget => write!(f, "`wait` expects a variable name"),
            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            Self::InvalidBinaryOp { op, type_name } => {
                write!(f, "operator `{op}` cannot be applied to {type_name}")
            }
            Self::UndefinedField { field } => write!(f, "no field `{field}`"),
            Self::InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            Self::PoolStartup { message } => write!(f, "cannot start worker pool: {message}"),
            Self::TaskPanicked { message } => write!(f, "task panicked: {message}"),
            Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    /// Structured error category.
    pub kind: EvalErrorKind,
    /// Human-readable message; equals `kind.to_string()` for factory errors.
    pub message: String,
    /// Source location of the failing construct.
    pub span: Option<Span>,
    /// Additional context, innermost first.
    pub notes: Vec<String>,
}

impl EvalError {
    /// Create an error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: EvalErrorKind::Custom {
                message: message.clone(),
            },
            message,
            span: None,
            notes: Vec::new(),
        }
    }

    fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            span: None,
            notes: Vec::new(),
        }
    }

    #[inline]
    pub fn category(&self) -> FaultCategory {
        self.kind.category()
    }

    /// Attach a source span to this error.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Add a context note to this error.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(span) = self.span {
            write!(f, " at {span}")?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

// Names

#[cold]
pub fn unbound_name(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnboundName {
        name: name.to_owned(),
    })
}

// Null

#[cold]
pub fn null_dereference(context: &'static str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NullDereference { context })
}

// Indexing

#[cold]
pub fn negative_index(index: i64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NegativeIndex { index })
}

#[cold]
pub fn index_too_large(index: i64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexTooLarge { index })
}

#[cold]
pub fn index_out_of_bounds(index: i64, length: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfBounds { index, length })
}

// Arithmetic

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

#[cold]
pub fn modulo_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ModuloByZero)
}

// Shape

#[cold]
pub fn length_mismatch(left: usize, right: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::LengthMismatch { left, right })
}

#[cold]
pub fn empty_array() -> EvalError {
    EvalError::from_kind(EvalErrorKind::EmptyArray)
}

#[cold]
pub fn nesting_mismatch() -> EvalError {
    EvalError::from_kind(EvalErrorKind::NestingMismatch)
}

#[cold]
pub fn matrix_dimension(rows: usize, columns: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MatrixDimension { rows, columns })
}

// Calls

#[cold]
pub fn unsupported_builtin(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnsupportedBuiltin {
        name: name.to_owned(),
    })
}

#[cold]
pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        name: name.to_owned(),
        expected,
        got,
    })
}

#[cold]
pub fn not_callable(type_name: &'static str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable { type_name })
}

#[cold]
pub fn wait_target() -> EvalError {
    EvalError::from_kind(EvalErrorKind::WaitTarget)
}

// Type

#[cold]
pub fn type_mismatch(expected: &'static str, got: &'static str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch { expected, got })
}

#[cold]
pub fn invalid_binary_op(op: &'static str, type_name: &'static str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidBinaryOp { op, type_name })
}

#[cold]
pub fn undefined_field(field: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedField {
        field: field.to_owned(),
    })
}

#[cold]
pub fn invalid_assignment_target() -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidAssignmentTarget)
}

// Runtime

#[cold]
pub fn pool_startup(message: impl fmt::Display) -> EvalError {
    EvalError::from_kind(EvalErrorKind::PoolStartup {
        message: message.to_string(),
    })
}

#[cold]
pub fn task_panicked(message: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TaskPanicked {
        message: message.to_owned(),
    })
}
