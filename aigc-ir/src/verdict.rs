//! The result type both engines return to the driver. Deliberately owns no
//! formula or z3 handle: once a run concludes, the witness/invariant has
//! already been rendered into plain data so it can cross the engine/CLI
//! boundary (and be serialized to JSON) without a `'ctx` lifetime.

use serde::Serialize;

/// A single state in a counterexample trace: the assignment to every
/// variable the cube pinned a value for.
#[derive(Debug, Clone, Serialize)]
pub struct StateAssignment {
    pub values: Vec<(String, bool)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Unsafe,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub verdict: Verdict,
    /// BMC: the unrolling depth at which the verdict was reached. PDR: the
    /// number of frames built.
    pub depth: Option<usize>,
    /// Populated iff `verdict == Unsafe`: the counterexample from an
    /// initial state to a property violation.
    pub trace: Vec<StateAssignment>,
    /// Populated iff `verdict == Safe` and an inductive invariant was
    /// found: a human-readable rendering of the invariant formula.
    pub invariant: Option<String>,
    pub message: String,
}

impl VerificationResult {
    pub fn safe(depth: Option<usize>, invariant: Option<String>, message: impl Into<String>) -> Self {
        VerificationResult {
            verdict: Verdict::Safe,
            depth,
            trace: Vec::new(),
            invariant,
            message: message.into(),
        }
    }

    pub fn unsafe_(depth: Option<usize>, trace: Vec<StateAssignment>, message: impl Into<String>) -> Self {
        VerificationResult {
            verdict: Verdict::Unsafe,
            depth,
            trace,
            invariant: None,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        VerificationResult {
            verdict: Verdict::Unknown,
            depth: None,
            trace: Vec::new(),
            invariant: None,
            message: message.into(),
        }
    }

    /// The exact strings the external interface contract requires on
    /// stdout.
    pub fn headline(&self) -> &'static str {
        match self.verdict {
            Verdict::Unsafe => "Safty property Falsified",
            Verdict::Safe => "Safty property Proven",
            Verdict::Unknown => "Safty property Unknown",
        }
    }

    /// Every completed run exits 0 regardless of which verdict it reached;
    /// only a usage/parse/solver-setup failure that prevents a run from
    /// completing is non-zero (see `aigc-cli`'s `main`).
    pub fn exit_code(&self) -> i32 {
        0
    }
}
