//! SVA property compilation
//!
//! This crate lowers SystemVerilog Assertion property graphs into
//! synthesizable circuitry: state registers, combinational gates, and
//! formal verification cells sampled at a single clock edge.
//!
//! The pipeline:
//!
//! 1. The sequence compiler builds a non-deterministic FSM whose
//!    transitions either consume a clock cycle ("edges") or propagate
//!    within the same cycle ("links").
//! 2. The accept side is lowered directly from the non-deterministic form:
//!    one register per node, links resolved combinationally in chain order.
//! 3. The reject side requires knowing that *every* possible match has
//!    failed, so the FSM is first unlinked (links folded into control
//!    conjunctions) and then determinized by subset construction.
//! 4. The property driver wires antecedent and consequent FSMs together,
//!    applies `disable iff` and final-stage registration, and emits the
//!    assert/assume/cover cell.

pub mod determinize;
pub mod driver;
pub mod fsm;
pub mod sequence;

use thiserror::Error;

/// Errors surfaced by the property compiler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SvaError {
    /// A primitive the compiler does not lower, in strict mode
    #[error("SVA primitive {prim} ({instance}) is currently unsupported in this context")]
    Unsupported {
        prim: &'static str,
        instance: String,
    },
    /// A DFSM state would enumerate 2^width control assignments
    #[error("SVA property DFSM state control signal has {width} bits; stopping to prevent exponential design size explosion")]
    CtrlTooWide { width: usize },
    /// `s_eventually` on a clocked property has no lowering yet
    #[error("no support for s_eventually on clocked SVA properties")]
    EventuallyUnsupported,
    /// Malformed primitive graph attributes
    #[error(transparent)]
    Ast(#[from] svasynth_ast::AstError),
}

pub type SvaResult<T> = Result<T, SvaError>;

pub use determinize::MAX_CTRL_BITS;
pub use driver::{
    compile_assert, compile_assume, compile_cover, CompileOptions, CompileOutcome, SvaCompiler,
    VerifyMode,
};
pub use fsm::SvaFsm;
