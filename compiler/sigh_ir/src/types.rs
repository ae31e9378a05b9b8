//! Static type tags recorded by semantic analysis.
//!
//! The evaluator only inspects these to pick operator semantics (string
//! concatenation, float promotion, element-wise array arithmetic, value vs
//! identity equality) and to widen integers stored into float bindings.

use crate::Name;

/// Resolved type of an expression or declaration.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Void,
    Null,
    /// The type of types (`Type`), e.g. a struct name used as a value.
    Type,
    Array(Box<Type>),
    Struct(Name),
    Fun,
}

impl Type {
    /// Array type with the given element type.
    pub fn array_of(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    /// Primitive types compare by value; everything else by identity.
    pub const fn is_primitive(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Bool | Type::String)
    }

    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Type::Float)
    }

    #[inline]
    pub const fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    #[inline]
    pub const fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    /// Strip every level of array nesting: `Float[][]` -> `Float`.
    pub fn leaf(&self) -> &Type {
        let mut ty = self;
        while let Type::Array(element) = ty {
            ty = element;
        }
        ty
    }

    /// Number of array dimensions: `Int` is 0, `Int[][]` is 2.
    pub fn dimensions(&self) -> usize {
        let mut ty = self;
        let mut depth = 0;
        while let Type::Array(element) = ty {
            ty = element;
            depth += 1;
        }
        depth
    }
}
