//! Bounded model checking with an optional k-induction strengthening,
//! grounded in `examples/original_source/code/python/bmc.py`.

use aigc_ir::{
    CheckResult, Formula, FormulaManager, SmtSolver, StateAssignment, Substitution, TransitionSystem,
    VerificationResult,
};
use tracing::{debug, info, instrument};

/// Stateful incremental unroller: a transition system, a solver, and an
/// unrolling counter. `vardict`-style memoization of the step-indexed
/// variables is inherited from `FormulaManager`'s own name cache, so there
/// is no separate cache here.
pub struct Bmc<'a, 'ctx> {
    ts: &'a TransitionSystem<'ctx>,
    fm: &'a FormulaManager<'ctx>,
    solver: SmtSolver<'ctx>,
    cnt: usize,
    vars: Vec<String>,
    primed_vars: Vec<String>,
}

impl<'a, 'ctx> Bmc<'a, 'ctx> {
    pub fn new(ts: &'a TransitionSystem<'ctx>, fm: &'a FormulaManager<'ctx>) -> Self {
        let mut vars = ts.vars.clone();
        vars.extend(ts.inputs.iter().cloned());
        let mut primed_vars = ts.primed_vars.clone();
        primed_vars.extend(ts.primed_inputs.iter().cloned());
        Bmc {
            ts,
            fm,
            solver: SmtSolver::new(fm.ctx()),
            cnt: 0,
            vars,
            primed_vars,
        }
    }

    /// Opens a fresh solver. Unless `induction`, asserts `I` at step 0.
    pub fn setup(&mut self, induction: bool) {
        self.solver = SmtSolver::new(self.fm.ctx());
        self.cnt = 0;
        if !induction {
            let init = self
                .ts
                .init
                .compile(self.fm)
                .expect("init cube cache corrupted");
            let subst = self.frame_substitution(0);
            self.solver.assert(&subst.apply(&init));
        }
    }

    /// `{ vars[i] -> v_i_k, primed_vars[i] -> v_i_{k+1} }`.
    fn frame_substitution(&self, k: usize) -> Substitution<'ctx> {
        let mut subst = Substitution::new();
        for v in &self.vars {
            subst.insert(self.fm.var(v), self.fm.var(&format!("{v}_{k}")));
        }
        for (v, pv) in self.vars.iter().zip(self.primed_vars.iter()) {
            subst.insert(self.fm.var(pv), self.fm.var(&format!("{v}_{}", k + 1)));
        }
        subst
    }

    /// Asserts `T` under the current frame's substitution, then advances.
    pub fn unroll(&mut self) {
        let trans = self.ts.trans.compile(self.fm).expect("trans cube cache corrupted");
        let subst = self.frame_substitution(self.cnt);
        self.solver.assert(&subst.apply(&trans));
        self.cnt += 1;
    }

    /// Asserts `constraint` at the current frontier, without unrolling.
    pub fn add(&mut self, constraint: &Formula<'ctx>) {
        let subst = self.frame_substitution(self.cnt);
        self.solver.assert(&subst.apply(constraint));
    }

    /// Asserts `constraint` at an arbitrary, possibly past, frame index.
    pub fn assert_at(&mut self, k: usize, constraint: &Formula<'ctx>) {
        let subst = self.frame_substitution(k);
        self.solver.assert(&subst.apply(constraint));
    }

    fn state_at(&self, model: &z3::Model<'ctx>, k: usize) -> StateAssignment {
        let mut values = Vec::with_capacity(self.vars.len());
        for v in &self.vars {
            if let Some(value) = self.fm.eval(model, &format!("{v}_{k}")) {
                values.push((v.clone(), value));
            }
        }
        StateAssignment { values }
    }

    fn trace_up_to(&self, model: &z3::Model<'ctx>, upto: usize) -> Vec<StateAssignment> {
        (0..=upto).map(|k| self.state_at(model, k)).collect()
    }

    /// Runs BMC (and, if `k_ind`, k-induction) up to bound `k`.
    ///
    /// 1. Base case: under a pushed scope, check `I ∧ ¬P` at step 0.
    /// 2. If `k_ind`, set up a parallel induction instance asserting `P` at
    ///    step 0 (no `I`), and raise the effective bound.
    /// 3. Interleave: at each step, check the induction query first (an
    ///    UNSAT result proves `P` inductive), then unroll and check the
    ///    base query (a SAT result is a falsifying trace at that depth).
    ///    The induction query additionally asserts `P` at every
    ///    intermediate frame as it unrolls, not just at frame 0.
    /// 4. If the loop exhausts without a verdict, return Unknown.
    #[instrument(skip(self))]
    pub fn run(&mut self, k_ind: bool, k: usize) -> VerificationResult {
        self.setup(false);
        self.solver.push();
        let not_post = self.fm.not(
            &self
                .ts
                .post
                .compile(self.fm)
                .expect("post cube cache corrupted"),
        );
        self.add(&not_post);
        match self.solver.is_sat() {
            Ok(true) => {
                let model = match self.solver.check() {
                    CheckResult::Sat(m) => m,
                    _ => unreachable!("is_sat() already confirmed Sat"),
                };
                let trace = self.trace_up_to(&model, 0);
                self.solver.pop(1);
                info!("Safty property Falsified: bad state is reachable from initial state!");
                return VerificationResult::unsafe_(
                    Some(0),
                    trace,
                    "bad state is reachable from the initial state",
                );
            }
            Ok(false) => {}
            Err(e) => {
                self.solver.pop(1);
                return VerificationResult::unknown(e.to_string());
            }
        }
        self.solver.pop(1);

        let mut kind = if k_ind {
            let mut kind = Bmc::new(self.ts, self.fm);
            kind.setup(true);
            let post = kind.ts.post.compile(kind.fm).expect("post cube cache corrupted");
            kind.add(&post);
            Some(kind)
        } else {
            None
        };
        let effective_k = if k_ind { 1000 } else { k };

        for step in 1..=effective_k {
            if let Some(kind) = kind.as_mut() {
                debug!(step, "checking for CEX after transitions (k-induction)");
                kind.unroll();
                let post = kind.ts.post.compile(kind.fm).expect("post cube corrupted");
                // The frame that was the frontier before this unroll (cnt - 1)
                // is now an intermediate frame; assert P there. Each frame
                // crosses this boundary exactly once, so this never repeats
                // a frame already asserted in an earlier iteration.
                if kind.cnt >= 2 {
                    kind.assert_at(kind.cnt - 1, &post);
                }
                kind.solver.push();
                let not_post = kind.fm.not(&post);
                kind.add(&not_post);
                match kind.solver.is_sat() {
                    Ok(false) => {
                        kind.solver.pop(1);
                        info!(step, "Safty property Proven: get inductive invariant");
                        return VerificationResult::safe(
                            Some(step),
                            Some(format!("P holds inductively after {step} unrolled transitions")),
                            "inductive invariant found",
                        );
                    }
                    Ok(true) => {}
                    Err(e) => {
                        kind.solver.pop(1);
                        return VerificationResult::unknown(e.to_string());
                    }
                }
                kind.solver.pop(1);
            }

            self.unroll();
            self.solver.push();
            let not_post = self.fm.not(&self.ts.post.compile(self.fm).expect("post cube corrupted"));
            self.add(&not_post);
            match self.solver.is_sat() {
                Ok(true) => {
                    let model = match self.solver.check() {
                        CheckResult::Sat(m) => m,
                        _ => unreachable!("is_sat() already confirmed Sat"),
                    };
                    let trace = self.trace_up_to(&model, step);
                    self.solver.pop(1);
                    info!(step, "Safty property Falsified: Found CEX after steps");
                    return VerificationResult::unsafe_(
                        Some(step),
                        trace,
                        format!("counterexample found after {step} steps"),
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    self.solver.pop(1);
                    return VerificationResult::unknown(e.to_string());
                }
            }
            self.solver.pop(1);
        }

        VerificationResult::unknown(format!(
            "invariant couldn't be proven inductive after {effective_k} transitions"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigc_frontend::load_str;
    use z3::{Config, Context};

    #[test]
    fn falsifies_immediately_unsafe_latch() {
        // Latch starts high, stays high, property says it must be low.
        let aag = "aag 1 0 1 1 0\n2 2 1\n2\n";
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fm = FormulaManager::new(&ctx);
        let ts = load_str(&fm, aag).expect("parses");
        let mut bmc = Bmc::new(&ts, &fm);
        let result = bmc.run(false, 5);
        assert_eq!(result.verdict, aigc_ir::Verdict::Unsafe);
    }

    #[test]
    fn proves_constant_low_latch_safe() {
        // Latch starts low and is wired to stay low forever; property (¬latch) holds.
        let aag = "aag 1 0 1 1 0\n2 0 0\n2\n";
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fm = FormulaManager::new(&ctx);
        let ts = load_str(&fm, aag).expect("parses");
        let mut bmc = Bmc::new(&ts, &fm);
        let result = bmc.run(true, 10);
        assert_eq!(result.verdict, aigc_ir::Verdict::Safe);
    }
}
