//! Non-deterministic sequence FSM
//!
//! A sequence compiles into a graph of nodes connected by two kinds of
//! transitions:
//!
//! - **Edge**: activate the target node if the control signal is true,
//!   consuming one clock cycle.
//! - **Link**: activate the target node if the control signal is true,
//!   within the same clock cycle.
//!
//! Node 0 is the start node, node 1 the accept node. The FSM can be lowered
//! once: either to an "accept" signal directly from the non-deterministic
//! form ([`SvaFsm::get_accept`]), or to a "reject" signal through
//! determinization (`get_reject`, see the `determinize` module). After
//! lowering, the FSM is materialized and all structural mutation panics.

use serde::{Deserialize, Serialize};
use svasynth_netlist::{Bit, Netlist};
use tracing::debug;

/// One NFSM node: outgoing consuming edges and same-cycle links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsmNode {
    /// (target node, control) pairs consuming one clock cycle
    pub edges: Vec<(usize, Bit)>,
    /// (target node, control) pairs within the same clock cycle
    pub links: Vec<(usize, Bit)>,
}

/// Non-deterministic sequence FSM under construction
#[derive(Debug, Clone)]
pub struct SvaFsm {
    pub(crate) clock: Bit,
    pub(crate) clock_pol: bool,

    /// Injected into the start node every cycle
    pub(crate) trigger: Bit,
    /// Forces all state low while asserted
    pub(crate) disable: Bit,
    /// ANDed into every edge and link created while in force
    pub(crate) throughout: Bit,

    pub(crate) materialized: bool,

    disable_stack: Vec<Bit>,
    throughout_stack: Vec<Bit>,

    pub start_node: usize,
    pub accept_node: usize,
    pub(crate) nodes: Vec<FsmNode>,

    pub(crate) unodes: Vec<crate::determinize::UNode>,
    pub(crate) dnodes: indexmap::IndexMap<Vec<usize>, crate::determinize::DNode>,
}

impl SvaFsm {
    /// Create an FSM clocked by `clock` at polarity `clock_pol`.
    ///
    /// `disable` masks all state while asserted (pass [`Bit::ZERO`] for
    /// none); `trigger` is injected into the start node every cycle (pass
    /// [`Bit::ONE`] for a free-running FSM).
    pub fn new(clock: Bit, clock_pol: bool, disable: Bit, trigger: Bit) -> Self {
        let mut fsm = Self {
            clock,
            clock_pol,
            trigger,
            disable,
            throughout: Bit::ONE,
            materialized: false,
            disable_stack: Vec::new(),
            throughout_stack: Vec::new(),
            start_node: 0,
            accept_node: 0,
            nodes: Vec::new(),
            unodes: Vec::new(),
            dnodes: indexmap::IndexMap::new(),
        };
        fsm.start_node = fsm.create_node();
        fsm.accept_node = fsm.create_node();
        fsm
    }

    /// Extend the disable condition for a nested scope
    pub fn push_disable(&mut self, netlist: &mut Netlist, sig: Bit) {
        assert!(!self.materialized, "mutating a materialized FSM");

        self.disable_stack.push(self.disable);

        if self.disable == Bit::ZERO {
            self.disable = sig;
        } else {
            self.disable = netlist.or_gate(self.disable, sig);
        }
    }

    /// Restore the disable condition of the enclosing scope
    pub fn pop_disable(&mut self) {
        assert!(!self.materialized, "mutating a materialized FSM");

        self.disable = self
            .disable_stack
            .pop()
            .expect("pop_disable without matching push");
    }

    /// Extend the throughout condition for a nested scope
    pub fn push_throughout(&mut self, netlist: &mut Netlist, sig: Bit) {
        assert!(!self.materialized, "mutating a materialized FSM");

        self.throughout_stack.push(self.throughout);

        if self.throughout == Bit::ONE {
            self.throughout = sig;
        } else {
            self.throughout = netlist.and_gate(self.throughout, sig);
        }
    }

    /// Restore the throughout condition of the enclosing scope
    pub fn pop_throughout(&mut self) {
        assert!(!self.materialized, "mutating a materialized FSM");

        self.throughout = self
            .throughout_stack
            .pop()
            .expect("pop_throughout without matching push");
    }

    /// Create a fresh node and return its index
    pub fn create_node(&mut self) -> usize {
        assert!(!self.materialized, "mutating a materialized FSM");

        let idx = self.nodes.len();
        self.nodes.push(FsmNode::default());
        idx
    }

    fn apply_throughout(&self, netlist: &mut Netlist, ctrl: Bit) -> Bit {
        if self.throughout == Bit::ONE {
            ctrl
        } else if ctrl == Bit::ONE {
            self.throughout
        } else {
            netlist.and_gate(self.throughout, ctrl)
        }
    }

    /// Add a consuming edge; the effective control is `throughout AND ctrl`
    pub fn create_edge(&mut self, netlist: &mut Netlist, from: usize, to: usize, ctrl: Bit) {
        assert!(!self.materialized, "mutating a materialized FSM");
        assert!(from < self.nodes.len(), "edge source out of range");
        assert!(to < self.nodes.len(), "edge target out of range");

        let ctrl = self.apply_throughout(netlist, ctrl);
        self.nodes[from].edges.push((to, ctrl));
    }

    /// Add a same-cycle link; the effective control is `throughout AND ctrl`
    pub fn create_link(&mut self, netlist: &mut Netlist, from: usize, to: usize, ctrl: Bit) {
        assert!(!self.materialized, "mutating a materialized FSM");
        assert!(from < self.nodes.len(), "link source out of range");
        assert!(to < self.nodes.len(), "link target out of range");

        let ctrl = self.apply_throughout(netlist, ctrl);
        self.nodes[from].links.push((to, ctrl));
    }

    /// Assign each node the length of the longest link chain reaching it.
    ///
    /// The sequence compiler never closes a link cycle, so chain lengths are
    /// bounded by the node count; anything longer trips the assert.
    pub(crate) fn make_link_order(&self, order: &mut [usize], node: usize, min: usize) {
        assert!(min <= self.nodes.len(), "link cycle in sequence FSM");
        order[node] = order[node].max(min);
        for &(target, _) in &self.nodes[node].links {
            self.make_link_order(order, target, order[node] + 1);
        }
    }

    // ------------------------------------------------------------------
    // NFSM lowering: accept signal

    /// Lower the FSM to circuitry and return the signal that is high in
    /// exactly the cycles in which the accept node is active.
    pub fn get_accept(&mut self, netlist: &mut Netlist) -> Bit {
        assert!(!self.materialized, "FSM lowered twice");
        self.materialized = true;

        let n = self.nodes.len();
        let mut state_wire = Vec::with_capacity(n);
        let mut state_sig: Vec<Bit> = Vec::with_capacity(n);

        // State signals: register output, trigger injection at the start
        // node, disable masking everywhere

        let not_disable = if self.disable != Bit::ZERO {
            netlist.not_gate(self.disable)
        } else {
            Bit::ONE
        };

        for i in 0..n {
            let w = netlist.add_wire();
            state_wire.push(w);
            let mut sig = Bit::Net(w);

            if i == self.start_node {
                sig = netlist.or_gate(sig, self.trigger);
            }

            if self.disable != Bit::ZERO {
                sig = netlist.and_gate(sig, not_disable);
            }

            state_sig.push(sig);
        }

        // Follow links in longest-chain order so every chain converges in a
        // single pass

        let mut node_order = vec![0usize; n];
        for i in 0..n {
            self.make_link_order(&mut node_order, i, 0);
        }

        let mut order_to_nodes: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            if node_order[i] >= order_to_nodes.len() {
                order_to_nodes.resize(node_order[i] + 1, Vec::new());
            }
            order_to_nodes[node_order[i]].push(i);
        }

        for level in &order_to_nodes {
            for &node in level {
                for &(target, link_ctrl) in &self.nodes[node].links {
                    let mut ctrl = state_sig[node];
                    if link_ctrl != Bit::ONE {
                        ctrl = netlist.and_gate(ctrl, link_ctrl);
                    }
                    state_sig[target] = netlist.or_gate(state_sig[target], ctrl);
                }
            }
        }

        // Next-state: OR over all inbound edge activations

        let mut activate: Vec<Vec<Bit>> = vec![Vec::new(); n];
        for i in 0..n {
            for &(target, edge_ctrl) in &self.nodes[i].edges {
                activate[target].push(netlist.and_gate(state_sig[i], edge_ctrl));
            }
        }

        let next_state: Vec<Bit> = activate
            .into_iter()
            .map(|sigs| or_reduce(netlist, &sigs))
            .collect();

        // State registers; nodes with no inbound edges are tied to zero

        for i in 0..n {
            if next_state[i] != Bit::ZERO {
                netlist.set_init(state_wire[i], false);
                netlist.add_dff(self.clock, self.clock_pol, next_state[i], state_wire[i]);
            } else {
                netlist.connect(state_wire[i], Bit::ZERO);
            }
        }

        state_sig[self.accept_node]
    }

    // ------------------------------------------------------------------
    // Structural dump for debugging

    /// Log the NFSM (and, after `get_reject`, the U-NFSM and DFSM) structure
    pub fn dump(&self) {
        if !self.nodes.is_empty() {
            debug!("non-deterministic encoding:");
            for (i, node) in self.nodes.iter().enumerate() {
                let tag = if i == self.start_node {
                    " [start]"
                } else if i == self.accept_node {
                    " [accept]"
                } else {
                    ""
                };
                debug!("  node {}:{}", i, tag);
                for &(target, ctrl) in &node.edges {
                    debug!("    edge {} -> {}", ctrl, target);
                }
                for &(target, ctrl) in &node.links {
                    debug!("    link {} -> {}", ctrl, target);
                }
            }
        }

        if !self.unodes.is_empty() {
            debug!("unlinked non-deterministic encoding:");
            for (i, unode) in self.unodes.iter().enumerate() {
                if !unode.reachable {
                    continue;
                }
                let tag = if i == self.start_node { " [start]" } else { "" };
                debug!("  unode {}:{}", i, tag);
                for (target, ctrl) in &unode.edges {
                    debug!("    edge {} -> {}", fmt_bits(ctrl), target);
                }
                for ctrl in &unode.accept {
                    debug!("    accept {}", fmt_bits(ctrl));
                }
            }
        }

        if !self.dnodes.is_empty() {
            debug!("deterministic encoding:");
            for (state, dnode) in &self.dnodes {
                let tag = if *state == [self.start_node] {
                    " [start]"
                } else {
                    ""
                };
                debug!("  dnode {:?}:{}", state, tag);
                debug!("    ctrl {}", fmt_bits(&dnode.ctrl));
                for (target, value) in &dnode.edges {
                    debug!("    edge {:#b} -> {:?}", value, target);
                }
                for value in &dnode.accept {
                    debug!("    accept {:#b}", value);
                }
                for value in &dnode.reject {
                    debug!("    reject {:#b}", value);
                }
            }
        }
    }
}

fn fmt_bits(bits: &[Bit]) -> String {
    let parts: Vec<String> = bits.iter().map(|b| b.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// OR-reduce a signal list, collapsing the trivial fan-in cases
pub(crate) fn or_reduce(netlist: &mut Netlist, sigs: &[Bit]) -> Bit {
    match sigs.len() {
        0 => Bit::ZERO,
        1 => sigs[0],
        _ => netlist.reduce_or(sigs.to_vec()),
    }
}
