//! svasynth - SVA-to-hardware property compilation
//!
//! Compiles a restricted subset of SystemVerilog Assertions, given as a
//! graph of primitive nodes, into synthesizable logic: clocked state
//! registers plus combinational gates driving formal verification cells
//! (assert/assume/cover) at a single clocked sampling point.
//!
//! The workspace is split by representation:
//!
//! - [`ast`]: the consumed SVA primitive-node graph
//! - [`netlist`]: the emitted wires, gates, flip-flops, and verification
//!   cells
//! - [`compile`]: the pass between them - sequence FSM construction,
//!   determinization, and the property driver

pub use svasynth_ast as ast;
pub use svasynth_compile as compile;
pub use svasynth_netlist as netlist;

pub use svasynth_compile::{
    compile_assert, compile_assume, compile_cover, CompileOptions, CompileOutcome, SvaError,
    SvaResult,
};
