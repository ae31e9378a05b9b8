//! Runtime values.
//!
//! Scalars (`Int`, `Float`, `Bool`, `Str`) are immutable and compare by
//! value. Arrays and structs are heap objects shared by reference: cloning
//! a `Value` clones the handle, never the contents, so every task holding
//! the handle sees the same elements. Their interior locks only make single
//! reads and writes atomic; ordering between tasks is the program's job.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sigh_ir::{DeclRef, Name, NodeId, Program};

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<str>),
    Null,
    Array(ArrayRef),
    Struct(StructRef),
    /// A function declaration or builtin used as a value.
    Function(DeclRef),
    /// `$Name`: the constructor of the struct declared at this node.
    Constructor(NodeId),
    /// A struct or builtin type name used as a value.
    Type(DeclRef),
    /// No value: the result of statements, `launch`, and calls that finish
    /// without `return`. Distinct from the language's `null`.
    Void,
}

impl Value {
    /// Create a string value.
    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Value::Str(text.into())
    }

    /// Create an array value from its elements.
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(elements))
    }

    /// Name of the value's runtime kind, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "String",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Function(_) => "function",
            Value::Constructor(_) => "constructor",
            Value::Type(_) => "Type",
            Value::Void => "Void",
        }
    }

    /// Check for the absent value.
    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value widened to `f64`.
    #[expect(
        clippy::cast_precision_loss,
        reason = "integer to float widening is the language's promotion rule"
    )]
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Reference identity: same heap object, same declaration, or both
    /// `null`/absent. Scalars are never identical under this relation.
    pub fn same_reference(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Struct(a), Value::Struct(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) | (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Constructor(a), Value::Constructor(b)) => a == b,
            _ => false,
        }
    }

    /// Value equality for primitives. Integers and floats compare
    /// numerically; everything else falls back to reference identity.
    pub fn primitive_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => self.same_reference(other),
        }
    }

    /// Textual form used by `print` and string concatenation.
    pub fn display<'a>(&'a self, program: &'a Program) -> ValueDisplay<'a> {
        ValueDisplay {
            value: self,
            program,
        }
    }
}

/// Shared, fixed-length array.
#[derive(Clone)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    pub fn new(elements: Vec<Value>) -> Self {
        ArrayRef(Arc::new(RwLock::new(elements)))
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Element at `index`, or `None` when out of bounds.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Overwrite the element at `index`. Returns `false` when out of
    /// bounds; the length never changes.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Copy of the element handles at this instant.
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

/// Shared struct instance with a fixed field set.
#[derive(Clone)]
pub struct StructRef(Arc<StructValue>);

struct StructValue {
    decl: NodeId,
    names: Vec<Name>,
    values: RwLock<Vec<Value>>,
}

impl StructRef {
    /// Build an instance of the struct declared at `decl`, pairing field
    /// names with values in declaration order.
    pub fn new(decl: NodeId, names: Vec<Name>, values: Vec<Value>) -> Self {
        StructRef(Arc::new(StructValue {
            decl,
            names,
            values: RwLock::new(values),
        }))
    }

    /// The declaring struct node.
    pub fn decl(&self) -> NodeId {
        self.0.decl
    }

    pub fn get(&self, field: Name) -> Option<Value> {
        let slot = self.slot(field)?;
        self.0.values.read().get(slot).cloned()
    }

    /// Overwrite a field. Returns `false` if the struct has no such field.
    pub fn set(&self, field: Name, value: Value) -> bool {
        let Some(slot) = self.slot(field) else {
            return false;
        };
        match self.0.values.write().get_mut(slot) {
            Some(current) => {
                *current = value;
                true
            }
            None => false,
        }
    }

    /// Field names paired with their current values.
    pub fn fields(&self) -> Vec<(Name, Value)> {
        let values = self.0.values.read();
        self.0
            .names
            .iter()
            .copied()
            .zip(values.iter().cloned())
            .collect()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &StructRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }

    fn slot(&self, field: Name) -> Option<usize> {
        self.0.names.iter().position(|&name| name == field)
    }
}

impl fmt::Debug for StructRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructRef")
            .field("decl", &self.0.decl)
            .field("fields", &self.fields())
            .finish()
    }
}

/// Renders a value the way `print` shows it.
pub struct ValueDisplay<'a> {
    value: &'a Value,
    program: &'a Program,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.value, self.program, &mut Vec::new())
    }
}

/// `seen` holds the arrays and structs being rendered, so a value that
/// reaches itself prints `[...]` or `{...}` instead of recursing forever.
fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    program: &Program,
    seen: &mut Vec<*const ()>,
) -> fmt::Result {
    match value {
        Value::Int(n) => write!(f, "{n}"),
        Value::Float(x) => f.write_str(&format_float(*x)),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Str(s) => f.write_str(s),
        Value::Null | Value::Void => f.write_str("null"),
        Value::Array(array) => {
            if seen.contains(&array.addr()) {
                return f.write_str("[...]");
            }
            seen.push(array.addr());
            f.write_str("[")?;
            for (i, element) in array.snapshot().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, element, program, seen)?;
            }
            seen.pop();
            f.write_str("]")
        }
        Value::Struct(instance) => {
            if seen.contains(&instance.addr()) {
                return f.write_str("{...}");
            }
            seen.push(instance.addr());
            f.write_str("{")?;
            for (i, (name, field)) in instance.fields().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}=", program.name(*name))?;
                write_value(f, field, program, seen)?;
            }
            seen.pop();
            f.write_str("}")
        }
        Value::Function(decl) | Value::Type(decl) => f.write_str(program.decl_name(*decl)),
        Value::Constructor(decl) => write!(f, "${}", program.decl_name(DeclRef::Node(*decl))),
    }
}

/// Format a float with at least one fractional digit, switching to
/// `1.0E10` notation outside `[1e-3, 1e7)`.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    let magnitude = x.abs();
    if x == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return if x.fract() == 0.0 {
            format!("{x:.1}")
        } else {
            format!("{x}")
        };
    }
    let scientific = format!("{x:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{mantissa}E{exponent}"),
        Some((mantissa, exponent)) => format!("{mantissa}.0E{exponent}"),
        None => scientific,
    }
}
