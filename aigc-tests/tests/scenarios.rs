//! End-to-end reachability scenarios, built directly against the IR rather
//! than through AAG text, since several of these (bit-flip games, a
//! saturating counter) are more naturally expressed as formula builders than
//! hand-encoded circuits.

use aigc_bmc::Bmc;
use aigc_ir::{Cube, Formula, FormulaManager, Literal, TransitionSystem, Verdict};
use aigc_pdr::Pdr;
use z3::{Config, Context};

fn bit_name(i: usize) -> String {
    format!("b{i}")
}

fn sel_bits(n: usize) -> usize {
    let mut k = 0;
    while (1usize << k) < n {
        k += 1;
    }
    k.max(1)
}

fn sel_name(j: usize) -> String {
    format!("sel{j}")
}

/// Formula asserting the selector input bits encode exactly `idx`.
fn index_match<'ctx>(fm: &FormulaManager<'ctx>, sel: &[Formula<'ctx>], idx: usize) -> Formula<'ctx> {
    let terms: Vec<Formula<'ctx>> = sel
        .iter()
        .enumerate()
        .map(|(j, s)| {
            if (idx >> j) & 1 == 1 {
                s.clone()
            } else {
                fm.not(s)
            }
        })
        .collect();
    fm.and(&terms)
}

/// `n` boolean bits, all initially true. Each step a nondeterministically
/// chosen index `j` flips bits `j, j-1, ..., j-(window-1)` (mod `n`). The
/// safety property is that at least one bit stays true.
///
/// `window=1` is the classic "one at a time" game (always falsifiable in
/// `n` steps); `window=3` is the "three at a time" game, safe iff `n` is
/// not a multiple of 3 (a count-mod-3 invariant no bounded unrolling can
/// express, the textbook example motivating frame-based PDR over BMC).
fn flip_window_ts<'ctx>(fm: &FormulaManager<'ctx>, n: usize, window: usize) -> TransitionSystem<'ctx> {
    let k = sel_bits(n);
    let names: Vec<String> = (0..n).map(bit_name).collect();
    let primed_names: Vec<String> = names.iter().map(|v| format!("{v}_next")).collect();
    let sel_names: Vec<String> = (0..k).map(sel_name).collect();
    let primed_sel_names: Vec<String> = sel_names.iter().map(|s| format!("{s}_next")).collect();
    let sel_formulas: Vec<Formula<'ctx>> = sel_names.iter().map(|s| fm.var(s)).collect();

    let mut init = Cube::new(0);
    for name in &names {
        init.add_literal(Literal::pin(fm, name, true));
    }

    let mut trans = Cube::new(0);
    for (i, (name, primed_name)) in names.iter().zip(primed_names.iter()).enumerate() {
        let flips: Vec<Formula<'ctx>> = (0..window)
            .map(|d| index_match(fm, &sel_formulas, (i + d) % n))
            .collect();
        let flip = fm.or(&flips);
        let current = fm.var(name);
        let flipped = fm.not(&current);
        let next = fm.ite(&flip, &flipped, &current);
        trans.add_literal(Literal::raw(fm.eq(&fm.var(primed_name), &next)));
    }

    let bit_formulas: Vec<Formula<'ctx>> = names.iter().map(|n| fm.var(n)).collect();
    let mut post = Cube::new(0);
    post.add_literal(Literal::raw(fm.or(&bit_formulas)));

    TransitionSystem::new(names, primed_names, sel_names, primed_sel_names, init, trans, post)
}

/// `n` boolean bits, rotating one position every step (`b_i' = b_{i-1}`).
/// A rotation is a bijection on bit-vectors, so it preserves the number of
/// true bits; since the initial state has exactly one, "at least one bit
/// is true" is itself an inductive invariant.
fn rotate_ts<'ctx>(fm: &FormulaManager<'ctx>, n: usize, init_true: &[usize]) -> TransitionSystem<'ctx> {
    let names: Vec<String> = (0..n).map(bit_name).collect();
    let primed_names: Vec<String> = names.iter().map(|v| format!("{v}_next")).collect();

    let mut init = Cube::new(0);
    for (i, name) in names.iter().enumerate() {
        init.add_literal(Literal::pin(fm, name, init_true.contains(&i)));
    }

    let mut trans = Cube::new(0);
    for (i, primed_name) in primed_names.iter().enumerate() {
        let prev = &names[(i + n - 1) % n];
        trans.add_literal(Literal::raw(fm.eq(&fm.var(primed_name), &fm.var(prev))));
    }

    let bit_formulas: Vec<Formula<'ctx>> = names.iter().map(|n| fm.var(n)).collect();
    let mut post = Cube::new(0);
    post.add_literal(Literal::raw(fm.or(&bit_formulas)));

    TransitionSystem::new(names, primed_names, Vec::new(), Vec::new(), init, trans, post)
}

/// A `width`-bit counter starting at 0, incrementing by one each step
/// unless it has reached `ceiling`, in which case it holds. The property
/// `x < bound` is inductive whenever `ceiling < bound`: once true, the
/// saturating increment can never push `x` past `ceiling`.
fn counter_ts<'ctx>(fm: &FormulaManager<'ctx>, width: usize, ceiling: u64, bound: u64) -> TransitionSystem<'ctx> {
    let names: Vec<String> = (0..width).map(|i| format!("x{i}")).collect();
    let primed_names: Vec<String> = names.iter().map(|v| format!("{v}_next")).collect();
    let bits: Vec<Formula<'ctx>> = names.iter().map(|n| fm.var(n)).collect();

    let mut init = Cube::new(0);
    for name in &names {
        init.add_literal(Literal::pin(fm, name, false));
    }

    // Ripple-carry increment by one.
    let mut carry = fm.tru();
    let mut plus_one = Vec::with_capacity(width);
    for bit in &bits {
        let sum = fm.ite(&carry, &fm.not(bit), bit.clone());
        let next_carry = fm.and(&[bit.clone(), carry.clone()]);
        plus_one.push(sum);
        carry = next_carry;
    }

    let is_ceiling = value_equals(fm, &bits, ceiling);
    let mut trans = Cube::new(0);
    for (i, primed_name) in primed_names.iter().enumerate() {
        let held = bits[i].clone();
        let incremented = plus_one[i].clone();
        let next = fm.ite(&is_ceiling, &held, &incremented);
        trans.add_literal(Literal::raw(fm.eq(&fm.var(primed_name), &next)));
    }

    let below_bound = fm.not(&value_at_least(fm, &bits, bound));
    let mut post = Cube::new(0);
    post.add_literal(Literal::raw(below_bound));

    TransitionSystem::new(names, primed_names, Vec::new(), Vec::new(), init, trans, post)
}

fn value_equals<'ctx>(fm: &FormulaManager<'ctx>, bits: &[Formula<'ctx>], value: u64) -> Formula<'ctx> {
    let terms: Vec<Formula<'ctx>> = bits
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if (value >> i) & 1 == 1 {
                b.clone()
            } else {
                fm.not(b)
            }
        })
        .collect();
    fm.and(&terms)
}

/// True iff the bit-vector's value is >= `value`, by matching every binary
/// representation that is.
fn value_at_least<'ctx>(fm: &FormulaManager<'ctx>, bits: &[Formula<'ctx>], value: u64) -> Formula<'ctx> {
    let max = 1u64 << bits.len();
    let matches: Vec<Formula<'ctx>> = (value..max).map(|v| value_equals(fm, bits, v)).collect();
    fm.or(&matches)
}

#[test]
fn one_at_a_time_is_unsafe() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);
    let ts = flip_window_ts(&fm, 8, 1);
    let result = Bmc::new(&ts, &fm).run(false, 10);
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert!(result.depth.unwrap() <= 8);
}

#[test]
fn three_at_a_time_odd_is_unsafe() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);
    let ts = flip_window_ts(&fm, 9, 3);
    let result = Bmc::new(&ts, &fm).run(false, 5);
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert!(result.depth.unwrap() <= 3);
}

#[test]
fn three_at_a_time_even_is_safe_under_pdr() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);
    let ts = flip_window_ts(&fm, 8, 3);
    let result = Pdr::new(&ts, &fm).run(50);
    assert_eq!(result.verdict, Verdict::Safe);
}

#[test]
fn shifter_is_safe() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);
    let ts = rotate_ts(&fm, 4, &[0]);
    let result = Bmc::new(&ts, &fm).run(true, 5);
    assert_eq!(result.verdict, Verdict::Safe);
}

#[test]
fn swapper_is_safe() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);
    let ts = rotate_ts(&fm, 3, &[0]);
    let result = Bmc::new(&ts, &fm).run(true, 5);
    assert_eq!(result.verdict, Verdict::Safe);
}

#[test]
fn swapper_is_safe_under_pdr() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);
    let ts = rotate_ts(&fm, 3, &[0]);
    let result = Pdr::new(&ts, &fm).run(50);
    assert_eq!(result.verdict, Verdict::Safe);
}

#[test]
fn counter_saturates_below_bound() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);
    let ts = counter_ts(&fm, 5, 6, 7);
    let result = Bmc::new(&ts, &fm).run(true, 5);
    assert_eq!(result.verdict, Verdict::Safe);
}
