//! Cubes: conjunctions of literals tagged with a frame index, the unit of
//! state shared by the BMC and PDR engines.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::error::InvariantViolation;
use crate::formula::{Formula, FormulaManager};

/// An atomic literal. Most literals pin a named variable to a constant
/// boolean value (`var == const`); the pin is tracked structurally at
/// construction time rather than recovered by inspecting the z3 AST (the
/// reference implementation parses its own string representation of the
/// formula back apart to recover `var`/`val` — unnecessary once the pin is
/// known at the call site that built the literal).
#[derive(Clone)]
pub struct Literal<'ctx> {
    formula: Formula<'ctx>,
    pin: Option<(String, bool)>,
}

impl<'ctx> Literal<'ctx> {
    /// A literal pinning `var` to `value`.
    pub fn pin(fm: &FormulaManager<'ctx>, var: &str, value: bool) -> Self {
        let v = fm.var(var);
        let const_ = if value { fm.tru() } else { fm.fls() };
        Literal {
            formula: fm.eq(&v, &const_),
            pin: Some((var.to_string(), value)),
        }
    }

    /// An arbitrary sub-formula literal with no tracked variable pin.
    pub fn raw(formula: Formula<'ctx>) -> Self {
        Literal { formula, pin: None }
    }

    /// The constant-`True` tautology literal used by [`Cube::drop`] and
    /// [`Cube::project`] in place of a literal that has been generalized
    /// away.
    pub fn tautology(fm: &FormulaManager<'ctx>) -> Self {
        Literal {
            formula: fm.tru(),
            pin: None,
        }
    }

    pub fn formula(&self) -> &Formula<'ctx> {
        &self.formula
    }

    pub fn pinned_var(&self) -> Option<(&str, bool)> {
        self.pin.as_ref().map(|(name, val)| (name.as_str(), *val))
    }
}

impl<'ctx> PartialEq for Literal<'ctx> {
    fn eq(&self, other: &Self) -> bool {
        self.formula == other.formula
    }
}

/// A conjunction of literals at frame `t`. Value semantics: `clone` yields
/// an independent copy; equality is multiset equality over literals,
/// ignoring order.
pub struct Cube<'ctx> {
    t: usize,
    literals: Vec<Literal<'ctx>>,
    literal_version: u64,
    cache: RefCell<Option<(u64, Formula<'ctx>)>>,
}

impl<'ctx> Cube<'ctx> {
    pub fn new(t: usize) -> Self {
        Cube {
            t,
            literals: Vec::new(),
            literal_version: 0,
            cache: RefCell::new(None),
        }
    }

    pub fn t(&self) -> usize {
        self.t
    }

    pub fn literals(&self) -> &[Literal<'ctx>] {
        &self.literals
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn add_literal(&mut self, literal: Literal<'ctx>) {
        self.literals.push(literal);
        self.literal_version += 1;
    }

    pub fn add_conjuncts(&mut self, literals: impl IntoIterator<Item = Literal<'ctx>>) {
        for l in literals {
            self.add_literal(l);
        }
    }

    /// An independent copy: same `t`, same literals, fresh cache state.
    pub fn clone_cube(&self) -> Self {
        Cube {
            t: self.t,
            literals: self.literals.clone(),
            literal_version: self.literal_version,
            cache: RefCell::new(None),
        }
    }

    /// The simplified conjunction of this cube's literals, memoized. Rebuilt
    /// only when the literal version has advanced past the cached version;
    /// if the cache is ever found to be *ahead* of the literal version, that
    /// is a corruption bug, not a recoverable state.
    pub fn compile(&self, fm: &FormulaManager<'ctx>) -> Result<Formula<'ctx>, InvariantViolation> {
        let mut cache = self.cache.borrow_mut();
        if let Some((cache_version, cached)) = cache.as_ref() {
            if *cache_version > self.literal_version {
                return Err(InvariantViolation::CubeCacheCorrupted {
                    cache_version: *cache_version,
                    literal_version: self.literal_version,
                });
            }
            if *cache_version == self.literal_version {
                return Ok(cached.clone());
            }
        }
        let formulas: Vec<Formula<'ctx>> = self.literals.iter().map(|l| l.formula().clone()).collect();
        let compiled = fm.and(&formulas).simplify();
        *cache = Some((self.literal_version, compiled.clone()));
        Ok(compiled)
    }

    /// Fixes each state variable (and, unless `drop_inputs`, each input) to
    /// the value it takes in `model`. Primed variables are never pinned:
    /// they are functions of the unprimed ones, so they carry no
    /// independent state information.
    pub fn add_model(
        &mut self,
        fm: &FormulaManager<'ctx>,
        model: &z3::Model<'ctx>,
        state_vars: &[String],
        inputs: &[String],
        drop_inputs: bool,
    ) {
        for name in state_vars {
            if let Some(value) = fm.eval(model, name) {
                self.add_literal(Literal::pin(fm, name, value));
            }
        }
        if !drop_inputs {
            for name in inputs {
                if let Some(value) = fm.eval(model, name) {
                    self.add_literal(Literal::pin(fm, name, value));
                }
            }
        }
    }

    /// Removes every literal pinning an input variable. Every remaining
    /// literal must be a `var == const` pin; a raw sub-formula literal here
    /// is a contract violation by the caller.
    pub fn strip_inputs(&mut self, input_names: &HashSet<String>) -> Result<(), InvariantViolation> {
        let mut kept = Vec::with_capacity(self.literals.len());
        for (idx, literal) in self.literals.iter().enumerate() {
            match literal.pinned_var() {
                Some((name, _)) => {
                    if !input_names.contains(name) {
                        kept.push(literal.clone());
                    }
                }
                None => return Err(InvariantViolation::NotAnEqualityLiteral { index: idx }),
            }
        }
        self.literals = kept;
        self.literal_version += 1;
        Ok(())
    }

    /// Retains only literals whose variable appears in `model` with a
    /// matching value; every other literal is replaced by a tautology.
    /// Returns whether any literal was dropped. Used for ternary-
    /// simulation-style generalization during ctg blocking.
    pub fn project(&mut self, fm: &FormulaManager<'ctx>, model: &std::collections::HashMap<String, bool>) -> bool {
        let mut dropped_any = false;
        for literal in self.literals.iter_mut() {
            let keep = match literal.pinned_var() {
                Some((name, value)) => model.get(name).map(|v| *v == value).unwrap_or(false),
                None => true,
            };
            if !keep {
                *literal = Literal::tautology(fm);
                dropped_any = true;
            }
        }
        if dropped_any {
            self.literal_version += 1;
        }
        dropped_any
    }

    /// A new cube identical to `self` except the literal at `i` has been
    /// replaced by a tautology. The intended behavior of the reference
    /// implementation's `delete` (which accidentally calls a nonexistent
    /// list method instead of performing this substitution); see
    /// `DESIGN.md` for the discrepancy.
    pub fn drop(&self, fm: &FormulaManager<'ctx>, i: usize) -> Self {
        let mut literals = self.literals.clone();
        literals[i] = Literal::tautology(fm);
        let mut result = Cube::new(self.t);
        result.add_conjuncts(literals);
        result
    }

    /// Literals present in `self` but not in `other`, by structural
    /// equality. Used during PDR frame propagation to find clauses not yet
    /// carried forward.
    pub fn difference(&self, other: &Cube<'ctx>) -> Vec<Literal<'ctx>> {
        self.literals
            .iter()
            .filter(|l| !other.literals.contains(l))
            .cloned()
            .collect()
    }
}

impl<'ctx> Clone for Cube<'ctx> {
    fn clone(&self) -> Self {
        self.clone_cube()
    }
}

impl<'ctx> PartialEq for Cube<'ctx> {
    fn eq(&self, other: &Self) -> bool {
        if self.literals.len() != other.literals.len() {
            return false;
        }
        let mut unmatched: Vec<&Literal<'ctx>> = other.literals.iter().collect();
        for l in &self.literals {
            if let Some(pos) = unmatched.iter().position(|o| *o == l) {
                unmatched.remove(pos);
            } else {
                return false;
            }
        }
        true
    }
}

/// Cubes are ordered by frame index, used by the PDR proof-obligation
/// priority queue (ties are broken by insertion order at the call site).
impl<'ctx> PartialOrd for Cube<'ctx> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.t.partial_cmp(&other.t)
    }
}
