//! Resolves a parsed AAG file into symbolic formulas and assembles the
//! `TransitionSystem` the engines consume.

use std::collections::HashMap;

use aigc_ir::{Cube, Formula, FormulaManager, Literal, ParseError, TransitionSystem};

use crate::aag::{Header, RawAag, RawAnd, RawLatch};

fn var_name(prefix: &str, idx: u64, annotation: Option<&str>) -> String {
    match annotation {
        Some(a) => format!("{prefix}{idx}[{a}]"),
        None => format!("{prefix}{idx}"),
    }
}

fn resolve_literal<'ctx>(
    fm: &FormulaManager<'ctx>,
    lit: u64,
    inputs: &HashMap<u64, Formula<'ctx>>,
    vars: &HashMap<u64, Formula<'ctx>>,
    ands: &HashMap<u64, Formula<'ctx>>,
) -> Result<Formula<'ctx>, ParseError> {
    if lit == 0 {
        return Ok(fm.fls());
    }
    if lit == 1 {
        return Ok(fm.tru());
    }
    let node = lit >> 1;
    let negated = lit & 1 == 1;
    let base = inputs
        .get(&node)
        .or_else(|| vars.get(&node))
        .or_else(|| ands.get(&node))
        .cloned()
        .ok_or(ParseError::UndefinedReference { literal: lit })?;
    Ok(if negated { fm.not(&base) } else { base })
}

/// Lowers a parsed AAG file into a `TransitionSystem`, sharing `fm` with
/// whichever engine will assert formulas against it afterwards.
pub fn lower<'ctx>(fm: &FormulaManager<'ctx>, raw: &RawAag) -> Result<TransitionSystem<'ctx>, ParseError> {
    let header: Header = raw
        .header
        .ok_or_else(|| ParseError::MalformedHeader("missing header".to_string()))?;
    let _ = header;

    // The reference parser consumes the symbol table with a single counter
    // shared across inputs, then latches, in file order.
    let mut annotation_cursor = 0usize;
    let mut next_annotation = || -> Option<String> {
        let a = raw.annotations.get(annotation_cursor).cloned();
        annotation_cursor += 1;
        a
    };

    let mut input_formulas: HashMap<u64, Formula<'ctx>> = HashMap::new();
    let mut input_names: Vec<String> = Vec::new();
    let mut primed_input_names: Vec<String> = Vec::new();
    for &it in &raw.inputs {
        let name = var_name("i", it, next_annotation().as_deref());
        // `it` is always the even/positive literal AIGER uses to declare an
        // input; keys throughout these tables are the *node* (`literal >>
        // 1`), matching what `resolve_literal` derives from any reference.
        input_formulas.insert(it >> 1, fm.var(&name));
        primed_input_names.push(format!("{name}_prime"));
        input_names.push(name);
    }

    let mut var_formulas: HashMap<u64, Formula<'ctx>> = HashMap::new();
    let mut var_names: Vec<String> = Vec::new();
    let mut primed_var_names: Vec<String> = Vec::new();
    for latch in &raw.latches {
        let name = var_name("v", latch.var, next_annotation().as_deref());
        var_formulas.insert(latch.var >> 1, fm.var(&name));
        primed_var_names.push(format!("{name}_prime"));
        var_names.push(name);
    }

    let mut and_formulas: HashMap<u64, Formula<'ctx>> = HashMap::new();
    for RawAnd { lhs, rhs0, rhs1 } in &raw.ands {
        let a = resolve_literal(fm, *rhs0, &input_formulas, &var_formulas, &and_formulas)?;
        let b = resolve_literal(fm, *rhs1, &input_formulas, &var_formulas, &and_formulas)?;
        and_formulas.insert(*lhs >> 1, fm.and(&[a, b]));
    }

    let mut init = Cube::new(0);
    for (latch, name) in raw.latches.iter().zip(var_names.iter()) {
        let value = latch.init.unwrap_or(false);
        init.add_literal(Literal::pin(fm, name, value));
    }

    let mut trans = Cube::new(0);
    for (RawLatch { next, .. }, (name, primed_name)) in raw
        .latches
        .iter()
        .zip(var_names.iter().zip(primed_var_names.iter()))
    {
        let next_formula = resolve_literal(fm, *next, &input_formulas, &var_formulas, &and_formulas)?;
        let primed = fm.var(primed_name);
        let _ = name;
        trans.add_literal(Literal::raw(fm.eq(&primed, &next_formula)));
    }

    // AIGER semantics: an output/bad literal signals a *violation* when it
    // evaluates to true, so the safety property being checked is its
    // negation. See SPEC_FULL.md §11 / DESIGN.md for why this differs from
    // the historical reference parser's direct (un-negated) assertion.
    let mut post = Cube::new(0);
    for &out in raw.outputs.iter().chain(raw.bads.iter()) {
        let resolved = resolve_literal(fm, out, &input_formulas, &var_formulas, &and_formulas)?;
        post.add_literal(Literal::raw(fm.not(&resolved)));
    }
    if post.is_empty() {
        post.add_literal(Literal::raw(fm.tru()));
    }

    Ok(TransitionSystem::new(
        var_names,
        primed_var_names,
        input_names,
        primed_input_names,
        init,
        trans,
        post,
    ))
}
