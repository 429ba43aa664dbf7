//! The Formula Layer: a thin interface over the z3 SMT backend.
//!
//! Every value the rest of the crate manipulates is a [`Formula`] (a boolean
//! z3 term). Fixed-width words used by the frontend's adder/counter-style
//! circuits are represented as `Vec<Formula>` (one bool per bit) rather than
//! pulling in z3's native bit-vector sort, since AIG/AAG circuits are
//! themselves bit-level: every latch, input and gate is a single Boolean
//! net.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use tracing::trace;
use z3::ast::{Ast, Bool};
use z3::{Context, SatResult, Solver};

use crate::error::SolverError;

pub type Formula<'ctx> = Bool<'ctx>;

/// Creates and memoizes named boolean constants, so that two requests for
/// the same name always return the same underlying z3 term. This is the
/// `var_at`/`vardef` memoization the BMC engine relies on, generalized so
/// the frontend and PDR engine can share it.
pub struct FormulaManager<'ctx> {
    ctx: &'ctx Context,
    vars: RefCell<FxHashMap<String, Formula<'ctx>>>,
}

impl<'ctx> FormulaManager<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        FormulaManager {
            ctx,
            vars: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    /// Returns the boolean constant named `name`, creating it on first use.
    pub fn var(&self, name: &str) -> Formula<'ctx> {
        if let Some(v) = self.vars.borrow().get(name) {
            return v.clone();
        }
        let v = Bool::new_const(self.ctx, name);
        self.vars.borrow_mut().insert(name.to_string(), v.clone());
        v
    }

    pub fn tru(&self) -> Formula<'ctx> {
        Bool::from_bool(self.ctx, true)
    }

    pub fn fls(&self) -> Formula<'ctx> {
        Bool::from_bool(self.ctx, false)
    }

    pub fn and(&self, terms: &[Formula<'ctx>]) -> Formula<'ctx> {
        if terms.is_empty() {
            return self.tru();
        }
        let refs: Vec<&Formula<'ctx>> = terms.iter().collect();
        Bool::and(self.ctx, &refs)
    }

    pub fn or(&self, terms: &[Formula<'ctx>]) -> Formula<'ctx> {
        if terms.is_empty() {
            return self.fls();
        }
        let refs: Vec<&Formula<'ctx>> = terms.iter().collect();
        Bool::or(self.ctx, &refs)
    }

    pub fn not(&self, term: &Formula<'ctx>) -> Formula<'ctx> {
        term.not()
    }

    pub fn eq(&self, a: &Formula<'ctx>, b: &Formula<'ctx>) -> Formula<'ctx> {
        a._eq(b)
    }

    pub fn ite(&self, cond: &Formula<'ctx>, then: &Formula<'ctx>, els: &Formula<'ctx>) -> Formula<'ctx> {
        cond.ite(then, els)
    }

    /// Looks up the boolean value `model` assigns to the named constant, if
    /// the model constrains it. Used to lift a SAT model into a state cube
    /// (`Cube::add_model`).
    pub fn eval(&self, model: &z3::Model<'ctx>, name: &str) -> Option<bool> {
        let v = self.var(name);
        model.eval(&v, true).and_then(|b| b.as_bool())
    }
}

/// A substitution from formula variables to replacement formulas, modeled as
/// an explicit mapping rather than name-based rewriting, per the cube's
/// prime-map and frame substitutions.
#[derive(Default)]
pub struct Substitution<'ctx> {
    pairs: Vec<(Formula<'ctx>, Formula<'ctx>)>,
}

impl<'ctx> Substitution<'ctx> {
    pub fn new() -> Self {
        Substitution { pairs: Vec::new() }
    }

    pub fn insert(&mut self, from: Formula<'ctx>, to: Formula<'ctx>) {
        self.pairs.push((from, to));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Applies this substitution to `formula`, replacing every free
    /// occurrence of a mapped variable with its image.
    pub fn apply(&self, formula: &Formula<'ctx>) -> Formula<'ctx> {
        if self.pairs.is_empty() {
            return formula.clone();
        }
        let refs: Vec<(&Formula<'ctx>, &Formula<'ctx>)> =
            self.pairs.iter().map(|(a, b)| (a, b)).collect();
        formula.substitute(&refs)
    }
}

impl<'ctx> FromIterator<(Formula<'ctx>, Formula<'ctx>)> for Substitution<'ctx> {
    fn from_iter<T: IntoIterator<Item = (Formula<'ctx>, Formula<'ctx>)>>(iter: T) -> Self {
        Substitution {
            pairs: iter.into_iter().collect(),
        }
    }
}

/// Result of a satisfiability query, collapsing z3's `SatResult` into the
/// three-way verdict this crate's error handling design expects.
pub enum CheckResult<'ctx> {
    Sat(z3::Model<'ctx>),
    Unsat,
    Unknown(String),
}

/// A scoped SMT solver: every engine (BMC, PDR) owns one of these against
/// its own `Context`. Speculative assertions are always made inside a
/// `push`/`pop` pair so their effects are bounded to the query that needed
/// them.
pub struct SmtSolver<'ctx> {
    ctx: &'ctx Context,
    solver: Solver<'ctx>,
}

impl<'ctx> SmtSolver<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        SmtSolver {
            ctx,
            solver: Solver::new(ctx),
        }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn assert(&self, formula: &Formula<'ctx>) {
        trace!(formula = %formula, "assert");
        self.solver.assert(formula);
    }

    pub fn push(&self) {
        self.solver.push();
    }

    pub fn pop(&self, n: u32) {
        self.solver.pop(n);
    }

    pub fn check(&self) -> CheckResult<'ctx> {
        match self.solver.check() {
            SatResult::Sat => CheckResult::Sat(self.solver.get_model().expect("sat result without model")),
            SatResult::Unsat => CheckResult::Unsat,
            SatResult::Unknown => {
                let reason = self
                    .solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "no reason given".to_string());
                CheckResult::Unknown(reason)
            }
        }
    }

    /// Convenience for callers that only care whether the query is SAT,
    /// surfacing `unknown` as a [`SolverError`] rather than a third branch.
    pub fn is_sat(&self) -> Result<bool, SolverError> {
        match self.check() {
            CheckResult::Sat(_) => Ok(true),
            CheckResult::Unsat => Ok(false),
            CheckResult::Unknown(reason) => Err(SolverError::Unknown { reason }),
        }
    }

    /// Checks `formula` under a push/pop scope, without polluting the
    /// solver's persistent assertion stack.
    pub fn check_assuming(&self, formula: &Formula<'ctx>) -> CheckResult<'ctx> {
        self.push();
        self.assert(formula);
        let result = self.check();
        self.pop(1);
        result
    }
}
