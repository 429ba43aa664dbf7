//! The immutable bundle produced by the AAG front-end and consumed by both
//! verification engines.

use crate::cube::Cube;
use crate::formula::{FormulaManager, Substitution};

/// `{ inputs, primed_inputs, state_vars, primed_state_vars, I, T, P }`,
/// produced once by the parser and shared read-only by every engine
/// component for the rest of the run.
pub struct TransitionSystem<'ctx> {
    pub vars: Vec<String>,
    pub primed_vars: Vec<String>,
    pub inputs: Vec<String>,
    pub primed_inputs: Vec<String>,
    pub init: Cube<'ctx>,
    pub trans: Cube<'ctx>,
    pub post: Cube<'ctx>,
}

impl<'ctx> TransitionSystem<'ctx> {
    pub fn new(
        vars: Vec<String>,
        primed_vars: Vec<String>,
        inputs: Vec<String>,
        primed_inputs: Vec<String>,
        init: Cube<'ctx>,
        trans: Cube<'ctx>,
        post: Cube<'ctx>,
    ) -> Self {
        assert_eq!(vars.len(), primed_vars.len(), "vars/primed_vars arity mismatch");
        assert_eq!(inputs.len(), primed_inputs.len(), "inputs/primed_inputs arity mismatch");
        TransitionSystem {
            vars,
            primed_vars,
            inputs,
            primed_inputs,
            init,
            trans,
            post,
        }
    }

    /// The substitution sending `vars[i] -> primed_vars[i]`, used whenever a
    /// current-state formula needs to be restated over the next-state
    /// vocabulary (e.g. asserting `¬P` at the next frame).
    pub fn prime_map(&self, fm: &FormulaManager<'ctx>) -> Substitution<'ctx> {
        let mut subst = Substitution::new();
        for (v, pv) in self.vars.iter().zip(self.primed_vars.iter()) {
            subst.insert(fm.var(v), fm.var(pv));
        }
        for (i, pi) in self.inputs.iter().zip(self.primed_inputs.iter()) {
            subst.insert(fm.var(i), fm.var(pi));
        }
        subst
    }

    /// All unprimed names (state variables followed by inputs), the
    /// vocabulary a state cube is built over.
    pub fn all_unprimed(&self) -> Vec<String> {
        let mut v = self.vars.clone();
        v.extend(self.inputs.iter().cloned());
        v
    }
}
