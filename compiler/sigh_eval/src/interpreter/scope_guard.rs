//! RAII frame management for the evaluator.
//!
//! [`ScopedEvaluator`] pushes a frame on creation and restores the frame
//! that was current before it when dropped, so frames are discarded on
//! every exit path: normal completion, `return`, faults, and unwinding.
//!
//! The guard holds `&mut Evaluator` and implements `Deref`/`DerefMut`, so
//! evaluation continues through it unchanged.

use std::ops::{Deref, DerefMut};

use sigh_ir::ScopeId;

use super::Evaluator;
use crate::environment::SharedFrame;

/// Evaluator with one extra frame, popped on drop.
pub struct ScopedEvaluator<'guard, 'p> {
    evaluator: &'guard mut Evaluator<'p>,
    saved: SharedFrame,
}

impl Drop for ScopedEvaluator<'_, '_> {
    fn drop(&mut self) {
        self.evaluator.env.restore(self.saved.clone());
    }
}

impl<'p> Deref for ScopedEvaluator<'_, 'p> {
    type Target = Evaluator<'p>;

    fn deref(&self) -> &Self::Target {
        self.evaluator
    }
}

impl DerefMut for ScopedEvaluator<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.evaluator
    }
}

impl<'p> Evaluator<'p> {
    /// Enter a block: push a frame for `scope` on the current chain.
    pub fn scoped(&mut self, scope: ScopeId) -> ScopedEvaluator<'_, 'p> {
        let saved = self.env.current().clone();
        self.env.push(scope);
        ScopedEvaluator {
            evaluator: self,
            saved,
        }
    }

    /// Enter a call: push a frame for `scope` chained to `parent` instead
    /// of the current frame.
    pub fn scoped_under(&mut self, scope: ScopeId, parent: SharedFrame) -> ScopedEvaluator<'_, 'p> {
        let saved = self.env.current().clone();
        self.env.push_under(scope, parent);
        ScopedEvaluator {
            evaluator: self,
            saved,
        }
    }
}
