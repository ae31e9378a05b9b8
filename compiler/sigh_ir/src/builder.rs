//! In-memory program construction with name resolution and typing.
//!
//! `ProgramBuilder` plays the role of parser plus semantic analysis for
//! embedders and tests: it allocates nodes, tracks the open lexical scopes,
//! resolves every reference as it is created, and records the scope, type
//! and declaration attributes the evaluator later queries.
//!
//! Expressions are built bottom-up and returned as [`NodeId`]s. Statements
//! are appended to the innermost open block. Constructs that open a scope
//! (blocks, function bodies, protect blocks, branches, loop bodies) take a
//! closure that emits their statements.
//!
//! Resolution problems do not abort construction; the first one is kept
//! and returned by [`ProgramBuilder::finish`].

use rustc_hash::FxHashMap;

use crate::{
    Ast, AttributeTable, BinaryOp, DeclRef, Name, NodeId, NodeKind, Program, ScopeId, Span,
    StringInterner, Synthetic, SyntheticKind, Type, UnaryOp,
};

/// Failure to assemble a well-formed program.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("cannot find `{name}` in this scope")]
    Unresolved { name: String },
    #[error("`{name}` is already declared in this scope")]
    Redeclared { name: String },
    #[error("`{name}` is not a struct")]
    NotAStruct { name: String },
}

struct OpenScope {
    id: ScopeId,
    names: FxHashMap<Name, DeclRef>,
}

/// Builder for an analysed [`Program`].
pub struct ProgramBuilder {
    ast: Ast,
    attrs: AttributeTable,
    interner: StringInterner,
    scopes: Vec<OpenScope>,
    blocks: Vec<Vec<NodeId>>,
    decl_types: FxHashMap<DeclRef, Type>,
    returns: FxHashMap<DeclRef, Type>,
    struct_fields: FxHashMap<Name, Vec<(Name, Type)>>,
    span: Span,
    error: Option<BuildError>,
}

impl ProgramBuilder {
    /// Create a builder with the root scope open and the host declarations
    /// (`true`, `false`, `null`, `print`, `wait` and the builtin type
    /// names) in scope.
    pub fn new() -> Self {
        let mut attrs = AttributeTable::new();
        let root = attrs.new_scope(None);
        let mut builder = ProgramBuilder {
            ast: Ast::new(),
            attrs,
            interner: StringInterner::new(),
            scopes: vec![OpenScope {
                id: root,
                names: FxHashMap::default(),
            }],
            blocks: vec![Vec::new()],
            decl_types: FxHashMap::default(),
            returns: FxHashMap::default(),
            struct_fields: FxHashMap::default(),
            span: Span::DUMMY,
            error: None,
        };

        builder.synthetic("true", SyntheticKind::Variable, Type::Bool);
        builder.synthetic("false", SyntheticKind::Variable, Type::Bool);
        builder.synthetic("null", SyntheticKind::Variable, Type::Null);
        builder.builtin("print", Type::String);
        builder.builtin("wait", Type::Void);
        for ty in ["Int", "Float", "Bool", "String", "Void", "Type"] {
            builder.synthetic(ty, SyntheticKind::Type, Type::Type);
        }
        builder
    }

    /// Declare a host function in the root scope.
    ///
    /// Calls to it are dispatched to the evaluator's builtin library by
    /// name; names the library does not know fault at run time.
    pub fn builtin(&mut self, name: &str, returns: Type) -> &mut Self {
        let decl = self.synthetic(name, SyntheticKind::Function, Type::Fun);
        self.returns.insert(decl, returns);
        self
    }

    /// Set the span attached to subsequently created nodes.
    pub fn at(&mut self, span: Span) -> &mut Self {
        self.span = span;
        self
    }

    /// Intern an identifier.
    pub fn name(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    // Expressions

    pub fn int(&mut self, value: i64) -> NodeId {
        self.expr(NodeKind::IntLiteral(value), Type::Int)
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.expr(NodeKind::FloatLiteral(value), Type::Float)
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.expr(NodeKind::StringLiteral(value.into()), Type::String)
    }

    /// `true` / `false` are references to root-scope variables.
    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.reference(if value { "true" } else { "false" })
    }

    /// `null` is a reference to a root-scope variable.
    pub fn null(&mut self) -> NodeId {
        self.reference("null")
    }

    /// A use of `name`, resolved against the open scopes.
    pub fn reference(&mut self, name: &str) -> NodeId {
        let interned = self.interner.intern(name);
        let node = self.alloc(NodeKind::Reference(interned));
        match self.resolve(interned) {
            Some((decl, scope)) => {
                self.attrs.set_decl(node, decl);
                self.attrs.set_scope(node, scope);
                if let Some(ty) = self.decl_types.get(&decl).cloned() {
                    self.attrs.set_type(node, ty);
                }
            }
            None => self.fail(BuildError::Unresolved {
                name: name.to_owned(),
            }),
        }
        node
    }

    /// `$Name`: the constructor of struct `name`.
    pub fn constructor(&mut self, name: &str) -> NodeId {
        let reference = self.reference(name);
        let is_struct = matches!(
            self.attrs_decl(reference),
            Some(DeclRef::Node(decl)) if matches!(self.ast.kind(decl), NodeKind::StructDecl { .. })
        );
        if !is_struct {
            self.fail(BuildError::NotAStruct {
                name: name.to_owned(),
            });
        }
        self.expr(NodeKind::Constructor { reference }, Type::Fun)
    }

    pub fn paren(&mut self, inner: NodeId) -> NodeId {
        let ty = self.type_of(inner);
        self.expr(NodeKind::Parenthesized(inner), ty)
    }

    /// Array literal; its type follows the first element.
    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        let element = elements.first().map_or(Type::Void, |&e| self.type_of(e));
        self.expr(NodeKind::ArrayLiteral(elements), Type::array_of(element))
    }

    pub fn index(&mut self, array: NodeId, index: NodeId) -> NodeId {
        let ty = match self.type_of(array) {
            Type::Array(element) => *element,
            _ => Type::Void,
        };
        self.expr(NodeKind::ArrayAccess { array, index }, ty)
    }

    /// `stem.field`; `length` on arrays, a declared field on structs.
    pub fn field(&mut self, stem: NodeId, field: &str) -> NodeId {
        let field = self.interner.intern(field);
        let ty = match self.type_of(stem) {
            Type::Array(_) => Type::Int,
            Type::Struct(name) => self
                .struct_fields
                .get(&name)
                .and_then(|fields| fields.iter().find(|(f, _)| *f == field))
                .map_or(Type::Void, |(_, ty)| ty.clone()),
            _ => Type::Void,
        };
        self.expr(NodeKind::FieldAccess { stem, field }, ty)
    }

    /// Call of the function, builtin or constructor named `callee`.
    pub fn call(&mut self, callee: &str, arguments: Vec<NodeId>) -> NodeId {
        let function = self.reference(callee);
        self.call_with(function, arguments)
    }

    /// Call through an arbitrary callee expression.
    pub fn call_with(&mut self, function: NodeId, arguments: Vec<NodeId>) -> NodeId {
        let ty = match self.ast.kind(function) {
            NodeKind::Constructor { reference } => self
                .attrs_decl(*reference)
                .and_then(|decl| self.decl_name(decl))
                .map_or(Type::Void, Type::Struct),
            _ => self
                .attrs_decl(function)
                .and_then(|decl| self.returns.get(&decl).cloned())
                .unwrap_or(Type::Void),
        };
        self.expr(
            NodeKind::FunCall {
                function,
                arguments,
            },
            ty,
        )
    }

    pub fn not(&mut self, operand: NodeId) -> NodeId {
        self.expr(
            NodeKind::Unary {
                op: UnaryOp::Not,
                operand,
            },
            Type::Bool,
        )
    }

    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        let ty = self.binary_type(op, left, right);
        self.expr(NodeKind::Binary { op, left, right }, ty)
    }

    /// Assignment expression; evaluates to the assigned value.
    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        let ty = self.type_of(target);
        self.expr(NodeKind::Assignment { target, value }, ty)
    }

    // Statements

    /// Emit an expression as a statement.
    pub fn expr_stmt(&mut self, expression: NodeId) -> NodeId {
        let node = self.alloc(NodeKind::ExpressionStatement(expression));
        self.emit(node)
    }

    /// Emit `name = value`.
    pub fn set(&mut self, name: &str, value: NodeId) -> NodeId {
        let target = self.reference(name);
        let assignment = self.assign(target, value);
        self.expr_stmt(assignment)
    }

    /// Emit `var name: ty = initializer`.
    pub fn var(&mut self, name: &str, ty: Type, initializer: NodeId) -> NodeId {
        let node = self.var_decl(name, ty, initializer);
        self.emit(node)
    }

    /// Emit `launch callee(arguments)`.
    pub fn launch(&mut self, callee: &str, arguments: Vec<NodeId>) -> NodeId {
        let call = self.call(callee, arguments);
        let node = self.alloc(NodeKind::Launch { call });
        self.attrs.set_type(node, Type::Void);
        self.emit(node)
    }

    /// Emit `launch var name: ty = callee(arguments)`.
    pub fn launch_var(
        &mut self,
        name: &str,
        ty: Type,
        callee: &str,
        arguments: Vec<NodeId>,
    ) -> NodeId {
        let call = self.call(callee, arguments);
        let declaration = self.var_decl(name, ty, call);
        let node = self.alloc(NodeKind::LaunchDecl { declaration });
        self.attrs.set_type(node, Type::Void);
        self.emit(node)
    }

    /// Emit `return` or `return value`.
    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        let node = self.alloc(NodeKind::Return { value });
        self.emit(node)
    }

    /// Emit a nested block.
    pub fn block(&mut self, body: impl FnOnce(&mut Self)) -> NodeId {
        let node = self.scoped_block(body);
        self.emit(node)
    }

    /// Emit `protect : { ... }`.
    pub fn protect(&mut self, body: impl FnOnce(&mut Self)) -> NodeId {
        let block = self.scoped_block(body);
        let node = self.alloc(NodeKind::ProtectBlock { block });
        self.emit(node)
    }

    /// Emit `if condition { ... }`.
    pub fn if_(&mut self, condition: NodeId, then_branch: impl FnOnce(&mut Self)) -> NodeId {
        let then_branch = self.scoped_block(then_branch);
        let node = self.alloc(NodeKind::If {
            condition,
            then_branch,
            else_branch: None,
        });
        self.emit(node)
    }

    /// Emit `if condition { ... } else { ... }`.
    pub fn if_else(
        &mut self,
        condition: NodeId,
        then_branch: impl FnOnce(&mut Self),
        else_branch: impl FnOnce(&mut Self),
    ) -> NodeId {
        let then_branch = self.scoped_block(then_branch);
        let else_branch = Some(self.scoped_block(else_branch));
        let node = self.alloc(NodeKind::If {
            condition,
            then_branch,
            else_branch,
        });
        self.emit(node)
    }

    /// Emit `while condition { ... }`.
    pub fn while_(&mut self, condition: NodeId, body: impl FnOnce(&mut Self)) -> NodeId {
        let body = self.scoped_block(body);
        let node = self.alloc(NodeKind::While { condition, body });
        self.emit(node)
    }

    /// Emit `fun name(parameters): returns { ... }`.
    ///
    /// The function is in scope inside its own body, so it may recurse.
    pub fn fun(
        &mut self,
        name: &str,
        parameters: &[(&str, Type)],
        returns: Type,
        body: impl FnOnce(&mut Self),
    ) -> NodeId {
        let interned = self.interner.intern(name);
        let function = self.alloc(NodeKind::FunDecl {
            name: interned,
            parameters: Vec::new(),
            body: NodeId::INVALID,
        });
        let decl = DeclRef::Node(function);
        self.attrs.set_type(function, Type::Fun);
        self.decl_types.insert(decl, Type::Fun);
        self.returns.insert(decl, returns);
        self.declare(interned, decl, function);

        let body_scope = self.open_scope();
        self.attrs.set_body_scope(function, body_scope);
        let parameters = parameters
            .iter()
            .map(|(param, ty)| {
                let param = self.interner.intern(param);
                let node = self.alloc(NodeKind::Parameter { name: param });
                self.attrs.set_type(node, ty.clone());
                self.decl_types.insert(DeclRef::Node(node), ty.clone());
                self.declare(param, DeclRef::Node(node), node);
                node
            })
            .collect();
        let body = self.scoped_block(body);
        self.scopes.pop();

        self.ast.set_kind(
            function,
            NodeKind::FunDecl {
                name: interned,
                parameters,
                body,
            },
        );
        self.emit(function)
    }

    /// Emit `struct name { var field: ty; ... }`.
    pub fn structure(&mut self, name: &str, fields: &[(&str, Type)]) -> NodeId {
        let interned = self.interner.intern(name);
        let mut layout = Vec::with_capacity(fields.len());
        let mut field_nodes = Vec::with_capacity(fields.len());
        for (field, ty) in fields {
            let field = self.interner.intern(field);
            let node = self.alloc(NodeKind::FieldDecl { name: field });
            self.attrs.set_type(node, ty.clone());
            layout.push((field, ty.clone()));
            field_nodes.push(node);
        }
        let node = self.alloc(NodeKind::StructDecl {
            name: interned,
            fields: field_nodes,
        });
        let decl = DeclRef::Node(node);
        self.attrs.set_type(node, Type::Type);
        self.decl_types.insert(decl, Type::Type);
        self.returns.insert(decl, Type::Struct(interned));
        self.struct_fields.insert(interned, layout);
        self.declare(interned, decl, node);
        self.emit(node)
    }

    /// Close the root block and produce the program.
    pub fn finish(mut self) -> Result<Program, BuildError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let statements = self.blocks.pop().unwrap_or_default();
        let root = self.alloc(NodeKind::Root { statements });
        let root_scope = self.scopes.first().map_or(ScopeId::INVALID, |s| s.id);
        self.attrs.set_scope(root, root_scope);
        Ok(Program::new(
            self.ast,
            Box::new(self.attrs),
            self.interner,
            root,
        ))
    }

    // Internals

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.ast.alloc(kind, self.span)
    }

    fn expr(&mut self, kind: NodeKind, ty: Type) -> NodeId {
        let node = self.alloc(kind);
        self.attrs.set_type(node, ty);
        node
    }

    fn emit(&mut self, statement: NodeId) -> NodeId {
        if let Some(block) = self.blocks.last_mut() {
            block.push(statement);
        }
        statement
    }

    fn fail(&mut self, error: BuildError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn current_scope(&self) -> ScopeId {
        self.scopes.last().map_or(ScopeId::INVALID, |s| s.id)
    }

    fn open_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let id = self.attrs.new_scope(Some(parent));
        self.scopes.push(OpenScope {
            id,
            names: FxHashMap::default(),
        });
        id
    }

    /// Build a `Block` node with its own scope from the statements `body`
    /// emits. The block is returned, not emitted.
    fn scoped_block(&mut self, body: impl FnOnce(&mut Self)) -> NodeId {
        let scope = self.open_scope();
        self.blocks.push(Vec::new());
        body(self);
        let statements = self.blocks.pop().unwrap_or_default();
        self.scopes.pop();
        let block = self.alloc(NodeKind::Block { statements });
        self.attrs.set_scope(block, scope);
        block
    }

    fn var_decl(&mut self, name: &str, ty: Type, initializer: NodeId) -> NodeId {
        let interned = self.interner.intern(name);
        let node = self.alloc(NodeKind::VarDecl {
            name: interned,
            initializer,
        });
        self.attrs.set_type(node, ty.clone());
        self.decl_types.insert(DeclRef::Node(node), ty);
        self.declare(interned, DeclRef::Node(node), node);
        node
    }

    fn synthetic(&mut self, name: &str, kind: SyntheticKind, ty: Type) -> DeclRef {
        let name = self.interner.intern(name);
        let decl = DeclRef::Synthetic(Synthetic { name, kind });
        self.decl_types.insert(decl, ty);
        if let Some(root) = self.scopes.first_mut() {
            root.names.insert(name, decl);
        }
        decl
    }

    /// Bind `name` in the innermost scope and record that scope on the
    /// declaring node.
    fn declare(&mut self, name: Name, decl: DeclRef, node: NodeId) {
        let scope = self.current_scope();
        self.attrs.set_scope(node, scope);
        let redeclared = match self.scopes.last_mut() {
            Some(open) => open.names.insert(name, decl).is_some(),
            None => false,
        };
        if redeclared {
            self.fail(BuildError::Redeclared {
                name: self.interner.lookup(name).to_owned(),
            });
        }
    }

    fn resolve(&self, name: Name) -> Option<(DeclRef, ScopeId)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|open| open.names.get(&name).map(|&decl| (decl, open.id)))
    }

    fn attrs_decl(&self, node: NodeId) -> Option<DeclRef> {
        crate::SemanticInfo::decl(&self.attrs, node)
    }

    fn decl_name(&self, decl: DeclRef) -> Option<Name> {
        match decl {
            DeclRef::Node(node) => self.ast.kind(node).declared_name(),
            DeclRef::Synthetic(synthetic) => Some(synthetic.name),
        }
    }

    fn type_of(&self, node: NodeId) -> Type {
        crate::SemanticInfo::type_of(&self.attrs, node)
            .cloned()
            .unwrap_or(Type::Void)
    }

    fn binary_type(&self, op: BinaryOp, left: NodeId, right: NodeId) -> Type {
        let left = self.type_of(left);
        let right = self.type_of(right);
        match op {
            BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Gt
            | BinaryOp::Lt
            | BinaryOp::GtEq
            | BinaryOp::LtEq
            | BinaryOp::Eq
            | BinaryOp::NotEq => Type::Bool,
            BinaryOp::MatProduct => Type::array_of(Type::array_of(Type::Float)),
            BinaryOp::Add if left.is_string() || right.is_string() => Type::String,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Add | BinaryOp::Sub => {
                if left.is_array() && right.is_array() {
                    let leaf = if left.leaf().is_float() || right.leaf().is_float() {
                        Type::Float
                    } else {
                        Type::Int
                    };
                    (0..left.dimensions()).fold(leaf, |ty, _| Type::array_of(ty))
                } else if left.is_float() || right.is_float() {
                    Type::Float
                } else {
                    Type::Int
                }
            }
        }
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}
