//! Scope storage: chained binding frames shared across tasks.
//!
//! One [`Frame`] exists per active lexical scope. Frames link outward to
//! their parent, and lookup walks that chain until it reaches the frame
//! owning the requested scope. A spawned task receives a clone of its
//! spawner's [`Environment`], which shares every frame of the chain by
//! reference; frames it pushes afterwards are its own.
//!
//! The root frame is also held directly, so root-scope bindings are reached
//! in one step from any depth and from any task.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sigh_ir::{Name, ScopeId};

use crate::errors::{unbound_name, EvalError};
use crate::Value;

/// Bindings of one scope instance.
pub struct Frame {
    scope: ScopeId,
    bindings: RwLock<FxHashMap<Name, Value>>,
    parent: Option<SharedFrame>,
}

impl Frame {
    #[inline]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    #[inline]
    pub fn parent(&self) -> Option<&SharedFrame> {
        self.parent.as_ref()
    }

    /// Current binding of `name` in this frame only.
    pub fn lookup(&self, name: Name) -> Option<Value> {
        self.bindings.read().get(&name).cloned()
    }

    /// Create or overwrite a binding in this frame.
    pub fn define(&self, name: Name, value: Value) {
        self.bindings.write().insert(name, value);
    }

    /// Whether `name` is bound in this frame.
    pub fn contains(&self, name: Name) -> bool {
        self.bindings.read().contains_key(&name)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("scope", &self.scope)
            .field("bindings", &self.bindings.read().len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Reference-counted handle to a [`Frame`].
///
/// All frame allocations go through [`SharedFrame::new`].
#[derive(Clone, Debug)]
#[repr(transparent)]
pub struct SharedFrame(Arc<Frame>);

impl SharedFrame {
    /// Allocate a frame for `scope` chained to `parent`.
    pub fn new(scope: ScopeId, parent: Option<SharedFrame>) -> Self {
        SharedFrame(Arc::new(Frame {
            scope,
            bindings: RwLock::new(FxHashMap::default()),
            parent,
        }))
    }

    #[inline]
    pub fn ptr_eq(&self, other: &SharedFrame) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for SharedFrame {
    type Target = Frame;

    #[inline]
    fn deref(&self) -> &Frame {
        &self.0
    }
}

/// A task's view of scope storage: its current frame plus the run's root
/// frame. Cloning is two reference-count increments.
#[derive(Clone, Debug)]
pub struct Environment {
    current: SharedFrame,
    root: SharedFrame,
}

impl Environment {
    /// Create the root frame of a run.
    pub fn new(root_scope: ScopeId) -> Self {
        let root = SharedFrame::new(root_scope, None);
        Environment {
            current: root.clone(),
            root,
        }
    }

    #[inline]
    pub fn root(&self) -> &SharedFrame {
        &self.root
    }

    #[inline]
    pub fn current(&self) -> &SharedFrame {
        &self.current
    }

    #[inline]
    pub fn root_scope(&self) -> ScopeId {
        self.root.scope
    }

    /// Enter a nested scope: push a fresh frame on the current chain.
    pub fn push(&mut self, scope: ScopeId) {
        self.push_under(scope, self.current.clone());
    }

    /// Push a fresh frame for `scope` whose parent is `parent` rather than
    /// the current frame. Used for call frames.
    pub fn push_under(&mut self, scope: ScopeId, parent: SharedFrame) {
        self.current = SharedFrame::new(scope, Some(parent));
    }

    /// Leave the current scope. The root frame is never popped.
    pub fn pop(&mut self) {
        if let Some(parent) = self.current.parent.clone() {
            self.current = parent;
        }
    }

    /// Make `frame` current again, discarding frames pushed since it was
    /// saved.
    pub fn restore(&mut self, frame: SharedFrame) {
        self.current = frame;
    }

    /// Nearest frame on the current chain that owns `scope`.
    pub fn frame_for(&self, scope: ScopeId) -> Option<&SharedFrame> {
        if scope == self.root.scope {
            return Some(&self.root);
        }
        let mut frame = &self.current;
        loop {
            if frame.scope == scope {
                return Some(frame);
            }
            frame = frame.parent.as_ref()?;
        }
    }

    /// Read the binding of `name` declared in `scope`.
    ///
    /// Never creates a binding: a missing frame or binding is an
    /// `UnboundName` fault.
    pub fn get(&self, scope: ScopeId, name: Name, text: &str) -> Result<Value, EvalError> {
        self.frame_for(scope)
            .and_then(|frame| frame.lookup(name))
            .ok_or_else(|| unbound_name(text))
    }

    /// Bind `name` in the frame owning `scope`, overwriting any previous
    /// value.
    pub fn set(&self, scope: ScopeId, name: Name, value: Value, text: &str) -> Result<(), EvalError> {
        let frame = self.frame_for(scope).ok_or_else(|| unbound_name(text))?;
        frame.define(name, value);
        Ok(())
    }

    /// Number of frames on the current chain, root included.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = &self.current;
        while let Some(parent) = frame.parent.as_ref() {
            depth += 1;
            frame = parent;
        }
        depth
    }
}
