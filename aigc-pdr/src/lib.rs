//! Property-directed reachability (IC3), grounded in
//! `examples/original_source/code/pdr.py`.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use aigc_ir::{
    CheckResult, Cube, FormulaManager, InvariantViolation, Literal, SmtSolver, SolverError,
    StateAssignment, TransitionSystem, VerificationResult,
};
use tracing::{debug, info, instrument};

struct Obligation<'ctx> {
    i: usize,
    seq: u64,
    cube: Cube<'ctx>,
}

impl PartialEq for Obligation<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.i == other.i && self.seq == other.seq
    }
}
impl Eq for Obligation<'_> {}
impl PartialOrd for Obligation<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Obligation<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.i.cmp(&other.i).then(self.seq.cmp(&other.seq))
    }
}

/// Frame sequence, proof-obligation blocker, and inductive-invariant
/// search. Frames are cubes: `F_i`'s literals are the clauses (each a
/// disjunction formula) strengthening that frame; `F_i.compile()` is their
/// conjunction.
pub struct Pdr<'a, 'ctx> {
    ts: &'a TransitionSystem<'ctx>,
    fm: &'a FormulaManager<'ctx>,
    solver: SmtSolver<'ctx>,
    frames: Vec<Cube<'ctx>>,
    seq: u64,
}

impl<'a, 'ctx> Pdr<'a, 'ctx> {
    pub fn new(ts: &'a TransitionSystem<'ctx>, fm: &'a FormulaManager<'ctx>) -> Self {
        Pdr {
            ts,
            fm,
            solver: SmtSolver::new(fm.ctx()),
            frames: vec![ts.init.clone_cube()],
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Pushes a clone of `P` as the new top frame, tagged with its own
    /// index: sound because the property is assumed to hold at every depth
    /// not yet refuted.
    fn append_new_frame(&mut self) {
        let mut frame = Cube::new(self.frames.len());
        frame.add_conjuncts(self.ts.post.literals().iter().cloned());
        self.frames.push(frame);
    }

    /// `base = true`: is `F_top ∧ ¬P` satisfiable (a bad state already in
    /// the last frame)? `base = false`: is `T ∧ F_top ∧ ¬P'` satisfiable
    /// (a bad state reachable in one more step)?
    fn bad_cube(&self, base: bool) -> Result<Option<Cube<'ctx>>, SolverError> {
        let top = self.frames.len() - 1;
        let post = self.ts.post.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let not_post = self.fm.not(&post);
        let frame_top = self.frames[top].compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;

        self.solver.push();
        self.solver.assert(&frame_top);
        if base {
            self.solver.assert(&not_post);
        } else {
            let trans = self.ts.trans.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
            let not_post_primed = self.ts.prime_map(self.fm).apply(&not_post);
            self.solver.assert(&trans);
            self.solver.assert(&not_post_primed);
        }
        let outcome = self.solver.check();
        let result = match outcome {
            CheckResult::Sat(model) => {
                let mut c = Cube::new(top);
                c.add_model(self.fm, &model, &self.ts.vars, &self.ts.inputs, true);
                Ok(Some(c))
            }
            CheckResult::Unsat => Ok(None),
            CheckResult::Unknown(reason) => Err(SolverError::Unknown { reason }),
        };
        self.solver.pop(1);
        result
    }

    /// The relative-induction query: is `F_{s.t-1} ∧ T ∧ s'` satisfiable?
    /// If so, the current-state projection of the witnessing model is a
    /// predecessor of `s` that must itself be blocked first.
    fn predecessor_of(&self, s: &Cube<'ctx>) -> Result<Option<Cube<'ctx>>, SolverError> {
        let prev_idx = s.t() - 1;
        let f_prev = self.frames[prev_idx]
            .compile(self.fm)
            .map_err(|e| SolverError::Backend(e.to_string()))?;
        let trans = self.ts.trans.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let s_formula = s.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let s_prime = self.ts.prime_map(self.fm).apply(&s_formula);

        self.solver.push();
        self.solver.assert(&f_prev);
        self.solver.assert(&trans);
        self.solver.assert(&s_prime);
        let outcome = self.solver.check();
        let result = match outcome {
            CheckResult::Sat(model) => {
                let mut c = Cube::new(prev_idx);
                c.add_model(self.fm, &model, &self.ts.vars, &self.ts.inputs, true);
                Ok(Some(c))
            }
            CheckResult::Unsat => Ok(None),
            CheckResult::Unknown(reason) => Err(SolverError::Unknown { reason }),
        };
        self.solver.pop(1);
        result
    }

    fn is_blocked(&self, cube: &Cube<'ctx>, i: usize) -> Result<bool, SolverError> {
        let f = self.frames[i].compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let c = cube.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        self.solver.push();
        self.solver.assert(&f);
        self.solver.assert(&c);
        let sat = self.solver.is_sat();
        self.solver.pop(1);
        sat.map(|s| !s)
    }

    /// `down(q)`: true iff `I ∧ q` is UNSAT and `q` is inductive relative
    /// to `F_{q.t-1}`. This is a single check, not a fixed-point loop —
    /// the reference implementation's `down` is named like one but returns
    /// after one iteration regardless, and that is the semantics this spec
    /// preserves (see `DESIGN.md`).
    fn down(&self, q: &Cube<'ctx>) -> Result<bool, SolverError> {
        let q_formula = q.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;

        let init = self.ts.init.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        self.solver.push();
        self.solver.assert(&init);
        self.solver.assert(&q_formula);
        let intersects_init = self.solver.is_sat()?;
        self.solver.pop(1);
        if intersects_init {
            return Ok(false);
        }

        let prev = &self.frames[q.t() - 1];
        let f_prev = prev.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let trans = self.ts.trans.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let q_prime = self.ts.prime_map(self.fm).apply(&q_formula);
        self.solver.push();
        self.solver.assert(&f_prev);
        self.solver.assert(&trans);
        self.solver.assert(&q_prime);
        let relatively_inductive_fails = self.solver.is_sat()?;
        self.solver.pop(1);

        Ok(!relatively_inductive_fails)
    }

    /// Greedily drops literals from `q`, one pass, keeping a drop whenever
    /// the weakened cube still satisfies `down`.
    fn mic(&self, q: &Cube<'ctx>) -> Result<Cube<'ctx>, SolverError> {
        let mut cube = q.clone_cube();
        let n = cube.literals().len();
        for i in 0..n {
            let candidate = cube.drop(self.fm, i);
            if self.down(&candidate)? {
                cube = candidate;
            }
        }
        Ok(cube)
    }

    fn is_inductive(&self, idx: usize) -> Result<bool, SolverError> {
        let f = self.frames[idx].compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let f_prime = self.ts.prime_map(self.fm).apply(&f);
        let trans = self.ts.trans.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        self.solver.push();
        self.solver.assert(&trans);
        self.solver.assert(&f);
        self.solver.assert(&self.fm.not(&f_prime));
        let sat = self.solver.is_sat();
        self.solver.pop(1);
        sat.map(|s| !s)
    }

    /// For every clause in `F_i` not yet in `F_{i+1}`, pushes it forward if
    /// it is relatively inductive: `F_i ∧ T ∧ ¬c'` UNSAT.
    fn propagate_clauses(&mut self, idx: usize) -> Result<(), SolverError> {
        let diff: Vec<Literal<'ctx>> = self.frames[idx].difference(&self.frames[idx + 1]);
        let f_i = self.frames[idx].compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        let trans = self.ts.trans.compile(self.fm).map_err(|e| SolverError::Backend(e.to_string()))?;
        for lit in diff {
            let c = lit.formula().clone();
            let c_prime = self.ts.prime_map(self.fm).apply(&c);
            self.solver.push();
            self.solver.assert(&f_i);
            self.solver.assert(&trans);
            self.solver.assert(&self.fm.not(&c_prime));
            let sat = self.solver.is_sat();
            self.solver.pop(1);
            if !sat? {
                self.frames[idx + 1].add_literal(Literal::raw(c));
            }
        }
        Ok(())
    }

    /// Checks that `F_upper` still implies `F_lower`, i.e. every clause
    /// `F_lower` holds is also implied by `F_upper`'s (larger) clause set.
    /// `propagate_clauses` and `recursive_block` only ever add clauses going
    /// up the frame sequence, so a violation here means one of them lost a
    /// clause it should have kept.
    fn check_monotonic(&self, lower: usize, upper: usize) -> Result<(), SolverError> {
        let f_lower = self.frames[lower]
            .compile(self.fm)
            .map_err(|e| SolverError::Backend(e.to_string()))?;
        let f_upper = self.frames[upper]
            .compile(self.fm)
            .map_err(|e| SolverError::Backend(e.to_string()))?;
        self.solver.push();
        self.solver.assert(&f_upper);
        self.solver.assert(&self.fm.not(&f_lower));
        let violated = self.solver.is_sat()?;
        self.solver.pop(1);
        if violated {
            return Err(SolverError::Backend(
                InvariantViolation::FrameMonotonicityViolated { lower, upper }.to_string(),
            ));
        }
        Ok(())
    }

    /// Recursively blocks `s` at its frame, draining a priority queue of
    /// proof obligations ordered ascending by frame index (FIFO among
    /// equals via a monotonic sequence number). Returns a counterexample
    /// trace if a bad state is found to reach `I`, `None` if `s` was
    /// successfully blocked.
    fn recursive_block(&mut self, s: Cube<'ctx>) -> Result<Option<Vec<Cube<'ctx>>>, SolverError> {
        let mut queue: BinaryHeap<Reverse<Obligation<'ctx>>> = BinaryHeap::new();
        let seq0 = self.next_seq();
        queue.push(Reverse(Obligation { i: s.t(), seq: seq0, cube: s }));

        while let Some(Reverse(Obligation { i, cube, .. })) = queue.pop() {
            if i == 0 {
                let mut remaining: Vec<Obligation<'ctx>> =
                    queue.into_iter().map(|Reverse(o)| o).collect();
                let final_seq = self.next_seq();
                remaining.push(Obligation { i, seq: final_seq, cube });
                remaining.sort_by(|a, b| a.i.cmp(&b.i).then(a.seq.cmp(&b.seq)));
                return Ok(Some(remaining.into_iter().map(|o| o.cube).collect()));
            }

            if self.is_blocked(&cube, i)? {
                continue;
            }

            match self.predecessor_of(&cube)? {
                Some(predecessor) => {
                    debug!(frame = i, "blocking predecessor before revisiting");
                    let seq_pred = self.next_seq();
                    queue.push(Reverse(Obligation {
                        i: cube.t() - 1,
                        seq: seq_pred,
                        cube: predecessor,
                    }));
                    let seq_revisit = self.next_seq();
                    queue.push(Reverse(Obligation { i, seq: seq_revisit, cube }));
                }
                None => {
                    let generalized = self.mic(&cube)?;
                    let generalized_formula = generalized
                        .compile(self.fm)
                        .map_err(|e| SolverError::Backend(e.to_string()))?;
                    let clause = self.fm.not(&generalized_formula);
                    for j in 1..=i {
                        self.frames[j].add_literal(Literal::raw(clause.clone()));
                    }
                    if i < self.frames.len() - 1 {
                        let seq_push = self.next_seq();
                        queue.push(Reverse(Obligation { i: i + 1, seq: seq_push, cube }));
                    }
                }
            }
        }
        Ok(None)
    }

    fn cube_to_assignment(cube: &Cube<'ctx>) -> StateAssignment {
        let values = cube
            .literals()
            .iter()
            .filter_map(|l| l.pinned_var().map(|(name, value)| (name.to_string(), value)))
            .collect();
        StateAssignment { values }
    }

    /// Runs PDR to completion, building at most `max_frames` frames before
    /// giving up with an `Unknown` verdict (a pragmatic bound the
    /// reference implementation, being a one-shot research script run
    /// under human supervision, did not need).
    #[instrument(skip(self))]
    pub fn run(&mut self, max_frames: usize) -> VerificationResult {
        match self.bad_cube(true) {
            Ok(Some(bad)) => {
                info!("Safty property Falsified: bad state is reachable from initial state!");
                return VerificationResult::unsafe_(
                    Some(0),
                    vec![Self::cube_to_assignment(&bad)],
                    "bad state is reachable from the initial state",
                );
            }
            Ok(None) => {}
            Err(e) => return VerificationResult::unknown(e.to_string()),
        }
        self.append_new_frame();

        loop {
            if self.frames.len() > max_frames {
                return VerificationResult::unknown(format!(
                    "PDR did not converge within {max_frames} frames"
                ));
            }
            match self.bad_cube(false) {
                Ok(Some(s)) => match self.recursive_block(s) {
                    Ok(Some(trace)) => {
                        info!(depth = self.frames.len() - 1, "Safty property Falsified");
                        let assignments = trace.iter().map(Self::cube_to_assignment).collect();
                        return VerificationResult::unsafe_(
                            Some(self.frames.len() - 1),
                            assignments,
                            "counterexample reaches the initial state",
                        );
                    }
                    Ok(None) => {}
                    Err(e) => return VerificationResult::unknown(e.to_string()),
                },
                Ok(None) => {
                    self.append_new_frame();
                    let top = self.frames.len() - 1;
                    for i in 0..top {
                        match self.is_inductive(i) {
                            Ok(true) => {
                                info!(frame = i, "Safty property Proven: get inductive invariant");
                                let invariant = self.frames[i]
                                    .compile(self.fm)
                                    .map(|f| f.to_string())
                                    .ok();
                                return VerificationResult::safe(
                                    Some(self.frames.len() - 1),
                                    invariant,
                                    format!("frame {i} is an inductive invariant"),
                                );
                            }
                            Ok(false) => {}
                            Err(e) => return VerificationResult::unknown(e.to_string()),
                        }
                        if let Err(e) = self.propagate_clauses(i) {
                            return VerificationResult::unknown(e.to_string());
                        }
                        if let Err(e) = self.check_monotonic(i, i + 1) {
                            return VerificationResult::unknown(e.to_string());
                        }
                    }
                }
                Err(e) => return VerificationResult::unknown(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigc_frontend::load_str;
    use z3::{Config, Context};

    #[test]
    fn proves_constant_low_latch_safe() {
        let aag = "aag 1 0 1 1 0\n2 0 0\n2\n";
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fm = FormulaManager::new(&ctx);
        let ts = load_str(&fm, aag).expect("parses");
        let mut pdr = Pdr::new(&ts, &fm);
        let result = pdr.run(100);
        assert_eq!(result.verdict, aigc_ir::Verdict::Safe);
    }

    #[test]
    fn falsifies_immediately_unsafe_latch() {
        let aag = "aag 1 0 1 1 0\n2 2 1\n2\n";
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fm = FormulaManager::new(&ctx);
        let ts = load_str(&fm, aag).expect("parses");
        let mut pdr = Pdr::new(&ts, &fm);
        let result = pdr.run(100);
        assert_eq!(result.verdict, aigc_ir::Verdict::Unsafe);
    }
}
