//! Gate-level netlist IR for SVA property synthesis
//!
//! This crate provides the output representation of the property compiler:
//! single-bit wires, combinational gates, D flip-flops, and formal
//! verification cells (assert/assume/cover plus live/fair for liveness).
//!
//! The compiler pass drives the netlist exclusively through the builder
//! methods on [`Netlist`]. Builders never fold constants; gate eliding is the
//! caller's responsibility, which keeps the emitted structure predictable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a wire (net) in the netlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetId(pub u32);

/// Unique identifier for a cell in the netlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// A single-bit signal reference: either a constant or a wire.
///
/// `Bit` is the currency of the whole pass. It is `Copy`, and it orders
/// constants before wires so control-bit vectors can be sorted and
/// deduplicated into a canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bit {
    /// Constant zero or one
    Const(bool),
    /// Output of a wire
    Net(NetId),
}

impl Bit {
    /// Constant zero
    pub const ZERO: Bit = Bit::Const(false);
    /// Constant one
    pub const ONE: Bit = Bit::Const(true);

    /// True if this is a constant (of either value)
    pub fn is_const(&self) -> bool {
        matches!(self, Bit::Const(_))
    }
}

impl Default for Bit {
    fn default() -> Self {
        Bit::ZERO
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bit::Const(false) => write!(f, "0"),
            Bit::Const(true) => write!(f, "1"),
            Bit::Net(id) => write!(f, "n{}", id.0),
        }
    }
}

/// A single-bit wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wire {
    /// Unique identifier
    pub id: NetId,
    /// Wire name (auto-generated for anonymous wires)
    pub name: String,
    /// Power-on value of the register driving this wire, if any
    pub init: Option<bool>,
}

/// A cell instance in the netlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Unique identifier
    pub id: CellId,
    /// Cell name; verification cells carry the property name, gates are anonymous
    pub name: Option<String>,
    /// What the cell is and how it is connected
    pub kind: CellKind,
    /// Attributes copied from the source description
    pub attributes: IndexMap<String, String>,
}

/// Cell kinds emitted by the property compiler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellKind {
    /// 2-input AND gate
    And { a: Bit, b: Bit, y: NetId },
    /// 2-input OR gate
    Or { a: Bit, b: Bit, y: NetId },
    /// Inverter
    Not { a: Bit, y: NetId },
    /// N-input OR reduction
    ReduceOr { a: Vec<Bit>, y: NetId },
    /// Vector equality comparison (single-bit result)
    Eq { a: Vec<Bit>, b: Vec<Bit>, y: NetId },
    /// D flip-flop sampling `d` into `q` on the given clock edge
    Dff {
        clock: Bit,
        /// True for rising-edge, false for falling-edge
        clock_pol: bool,
        d: Bit,
        q: NetId,
    },
    /// Constant tie: drive `q` with `value` combinationally
    Connect { value: Bit, q: NetId },
    /// Assertion: `a` must hold whenever `en` is active
    Assert { a: Bit, en: Bit },
    /// Assumption: `a` is constrained to hold whenever `en` is active
    Assume { a: Bit, en: Bit },
    /// Cover point: `a && en` is claimed reachable
    Cover { a: Bit, en: Bit },
    /// Liveness obligation: `a` must eventually hold whenever `en` is active
    Live { a: Bit, en: Bit },
    /// Fairness constraint: `a` eventually holds whenever `en` is active
    Fair { a: Bit, en: Bit },
}

impl CellKind {
    /// True for state-holding cells
    pub fn is_register(&self) -> bool {
        matches!(self, CellKind::Dff { .. })
    }

    /// True for assert/assume/cover/live/fair cells
    pub fn is_verification(&self) -> bool {
        matches!(
            self,
            CellKind::Assert { .. }
                | CellKind::Assume { .. }
                | CellKind::Cover { .. }
                | CellKind::Live { .. }
                | CellKind::Fair { .. }
        )
    }
}

/// Netlist size summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetlistStats {
    /// Total wires
    pub wires: usize,
    /// Total cells of any kind
    pub cells: usize,
    /// D flip-flops
    pub registers: usize,
    /// Verification cells
    pub verification_cells: usize,
}

/// A flat single-bit netlist under construction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    /// Design name
    pub name: String,
    /// All wires, indexed by `NetId`
    pub wires: Vec<Wire>,
    /// All cells, indexed by `CellId`
    pub cells: Vec<Cell>,
    /// Counter for generated names
    name_seq: u32,
}

impl Netlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wires: Vec::new(),
            cells: Vec::new(),
            name_seq: 0,
        }
    }

    /// Create a fresh anonymous wire
    pub fn add_wire(&mut self) -> NetId {
        let name = self.fresh_name();
        self.add_named_wire(name)
    }

    /// Create a wire with an explicit name (module inputs in tests, for example)
    pub fn add_named_wire(&mut self, name: impl Into<String>) -> NetId {
        let id = NetId(self.wires.len() as u32);
        self.wires.push(Wire {
            id,
            name: name.into(),
            init: None,
        });
        id
    }

    /// Set the power-on value of the register driving `net`
    pub fn set_init(&mut self, net: NetId, value: bool) {
        self.wires[net.0 as usize].init = Some(value);
    }

    pub fn wire(&self, net: NetId) -> &Wire {
        &self.wires[net.0 as usize]
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0 as usize]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.0 as usize]
    }

    /// Generate a fresh anonymous name
    pub fn fresh_name(&mut self) -> String {
        let n = self.name_seq;
        self.name_seq += 1;
        format!("$sva${}", n)
    }

    /// Return `base` if no cell carries it yet, else a suffixed variant
    pub fn uniquify(&self, base: &str) -> String {
        let taken = |cells: &[Cell], name: &str| cells.iter().any(|c| c.name.as_deref() == Some(name));
        if !taken(&self.cells, base) {
            return base.to_string();
        }
        let mut i = 1;
        loop {
            let candidate = format!("{}_{}", base, i);
            if !taken(&self.cells, &candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    fn add_cell(&mut self, name: Option<String>, kind: CellKind) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(Cell {
            id,
            name,
            kind,
            attributes: IndexMap::new(),
        });
        id
    }

    fn add_gate(&mut self, kind: impl FnOnce(NetId) -> CellKind) -> Bit {
        let y = self.add_wire();
        self.add_cell(None, kind(y));
        Bit::Net(y)
    }

    pub fn and_gate(&mut self, a: Bit, b: Bit) -> Bit {
        self.add_gate(|y| CellKind::And { a, b, y })
    }

    pub fn or_gate(&mut self, a: Bit, b: Bit) -> Bit {
        self.add_gate(|y| CellKind::Or { a, b, y })
    }

    pub fn not_gate(&mut self, a: Bit) -> Bit {
        self.add_gate(|y| CellKind::Not { a, y })
    }

    pub fn reduce_or(&mut self, a: Vec<Bit>) -> Bit {
        self.add_gate(|y| CellKind::ReduceOr { a, y })
    }

    /// Vector equality; both operands must have the same width
    pub fn eq_gate(&mut self, a: Vec<Bit>, b: Vec<Bit>) -> Bit {
        assert_eq!(a.len(), b.len(), "eq_gate operand width mismatch");
        self.add_gate(|y| CellKind::Eq { a, b, y })
    }

    /// D flip-flop driving the existing wire `q`
    pub fn add_dff(&mut self, clock: Bit, clock_pol: bool, d: Bit, q: NetId) -> CellId {
        self.add_cell(
            None,
            CellKind::Dff {
                clock,
                clock_pol,
                d,
                q,
            },
        )
    }

    /// Tie the existing wire `q` to `value`
    pub fn connect(&mut self, q: NetId, value: Bit) -> CellId {
        self.add_cell(None, CellKind::Connect { value, q })
    }

    pub fn add_assert(&mut self, name: String, a: Bit, en: Bit) -> CellId {
        self.add_cell(Some(name), CellKind::Assert { a, en })
    }

    pub fn add_assume(&mut self, name: String, a: Bit, en: Bit) -> CellId {
        self.add_cell(Some(name), CellKind::Assume { a, en })
    }

    pub fn add_cover(&mut self, name: String, a: Bit, en: Bit) -> CellId {
        self.add_cell(Some(name), CellKind::Cover { a, en })
    }

    pub fn add_live(&mut self, name: String, a: Bit, en: Bit) -> CellId {
        self.add_cell(Some(name), CellKind::Live { a, en })
    }

    pub fn add_fair(&mut self, name: String, a: Bit, en: Bit) -> CellId {
        self.add_cell(Some(name), CellKind::Fair { a, en })
    }

    /// Size summary of the netlist
    pub fn stats(&self) -> NetlistStats {
        NetlistStats {
            wires: self.wires.len(),
            cells: self.cells.len(),
            registers: self.cells.iter().filter(|c| c.kind.is_register()).count(),
            verification_cells: self
                .cells
                .iter()
                .filter(|c| c.kind.is_verification())
                .count(),
        }
    }

    /// Iterate all D flip-flops
    pub fn registers(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.kind.is_register())
    }

    /// Iterate all verification cells
    pub fn verification_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.kind.is_verification())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_ordering_is_canonical() {
        let mut bits = vec![Bit::Net(NetId(3)), Bit::ONE, Bit::Net(NetId(1)), Bit::Net(NetId(1))];
        bits.sort_unstable();
        bits.dedup();
        assert_eq!(
            bits,
            vec![Bit::ONE, Bit::Net(NetId(1)), Bit::Net(NetId(3))]
        );
    }

    #[test]
    fn test_gate_builders_allocate_wires() {
        let mut nl = Netlist::new("t");
        let a = Bit::Net(nl.add_named_wire("a"));
        let b = Bit::Net(nl.add_named_wire("b"));
        let y = nl.and_gate(a, b);
        assert!(matches!(y, Bit::Net(_)));
        assert_eq!(nl.stats().cells, 1);
        assert_eq!(nl.stats().wires, 3);
    }

    #[test]
    fn test_uniquify_appends_suffix() {
        let mut nl = Netlist::new("t");
        let a = Bit::Net(nl.add_named_wire("a"));
        nl.add_assert("check".to_string(), a, Bit::ONE);
        assert_eq!(nl.uniquify("check"), "check_1");
        assert_eq!(nl.uniquify("other"), "other");
    }

    #[test]
    fn test_stats_counts_registers_and_checks() {
        let mut nl = Netlist::new("t");
        let clk = Bit::Net(nl.add_named_wire("clk"));
        let d = Bit::Net(nl.add_named_wire("d"));
        let q = nl.add_wire();
        nl.add_dff(clk, true, d, q);
        nl.add_cover("c".to_string(), Bit::Net(q), Bit::ONE);
        let stats = nl.stats();
        assert_eq!(stats.registers, 1);
        assert_eq!(stats.verification_cells, 1);
    }
}
