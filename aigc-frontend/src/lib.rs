//! The AIG front-end: parses an AAG (ASCII AIGER) file into a
//! `TransitionSystem`. Binary AIG files are out of scope; converting one to
//! AAG first (e.g. with the upstream `aigtoaig` tool) is the caller's job.

mod aag;
mod lower;

use std::path::Path;

use aigc_ir::{FormulaManager, ParseError, TransitionSystem};

pub use aag::{Header, RawAag, RawAnd, RawLatch};

/// Reads and lowers the AAG file at `path` into a `TransitionSystem` over
/// `fm`'s formula vocabulary.
pub fn load<'ctx>(fm: &FormulaManager<'ctx>, path: &Path) -> Result<TransitionSystem<'ctx>, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let raw = aag::parse_aag(&text)?;
    lower::lower(fm, &raw)
}

/// Lowers an already-read AAG text body. Exposed for tests and for callers
/// that already have the file's contents in memory.
pub fn load_str<'ctx>(fm: &FormulaManager<'ctx>, text: &str) -> Result<TransitionSystem<'ctx>, ParseError> {
    let raw = aag::parse_aag(text)?;
    lower::lower(fm, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::{Config, Context};

    #[test]
    fn parses_single_self_looping_latch() {
        // One latch holding its own value; property is "the latch is low".
        let aag = "aag 1 0 1 1 0\n2 2\n2\n";
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fm = FormulaManager::new(&ctx);
        let ts = load_str(&fm, aag).expect("parses");
        assert_eq!(ts.vars.len(), 1);
        assert_eq!(ts.inputs.len(), 0);
        assert_eq!(ts.vars[0], "v2");
    }

    #[test]
    fn rejects_missing_header() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fm = FormulaManager::new(&ctx);
        assert!(load_str(&fm, "").is_err());
    }

    #[test]
    fn rejects_undefined_reference() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fm = FormulaManager::new(&ctx);
        // and gate references literal 99 which is never defined
        let aag = "aag 2 0 1 1 1\n1 1\n1\n2 99 1\n";
        assert!(matches!(
            load_str(&fm, aag),
            Err(ParseError::UndefinedReference { .. })
        ));
    }
}
