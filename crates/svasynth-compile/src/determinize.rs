//! Determinization and reject-side lowering
//!
//! The non-deterministic FSM cannot answer "has every possible match
//! failed?" directly, so the reject signal is derived in three steps:
//!
//! 1. **Link flattening**: fold same-cycle links into control-vector
//!    prefixes, yielding one unlinked node (`UNode`) per NFSM node whose
//!    edges and accept witnesses carry conjunctions of control bits.
//! 2. **Subset construction**: starting from `{start}`, enumerate all
//!    2^|ctrl| assignments of the control bits a state observes and build a
//!    deterministic state per reachable successor set. First-match policy
//!    truncates successor computation on accepting assignments.
//! 3. **Lowering**: one register per deterministic state; edge, accept, and
//!    reject conditions become equality comparisons of the control vector
//!    (plus the state bit) against constant patterns.
//!
//! The enumeration is refused once a state observes more than
//! [`MAX_CTRL_BITS`] control bits, to keep design size from exploding.
//!
//! A quantifier-based reject computation over the non-deterministic form
//! would avoid determinization entirely; it is left as a future alternative
//! with the same signature.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use svasynth_netlist::{Bit, Netlist};

use crate::fsm::{or_reduce, FsmNode, SvaFsm};
use crate::{SvaError, SvaResult};

/// Refuse to enumerate control assignments beyond this many bits
pub const MAX_CTRL_BITS: usize = 10;

/// NFSM node after link resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UNode {
    /// (target, control conjunction) pairs consuming one clock cycle
    pub edges: Vec<(usize, Vec<Bit>)>,
    /// Control conjunctions under which this node accepts
    pub accept: Vec<Vec<Bit>>,
    /// Reachable from the start node over edges
    pub reachable: bool,
}

/// Deterministic FSM state
///
/// A deterministic state corresponds to a set of unlinked NFSM nodes,
/// keyed by the sorted, deduplicated vector of their indices.
#[derive(Debug, Clone, Default)]
pub struct DNode {
    /// Union of control bits observed by any member node, sorted and unique
    pub ctrl: Vec<Bit>,
    /// (successor state, control pattern) pairs
    pub edges: Vec<(Vec<usize>, u32)>,
    /// Control patterns witnessing acceptance
    pub accept: Vec<u32>,
    /// Control patterns with no successor and no acceptance
    pub reject: Vec<u32>,

    // lowering scratch
    pub(crate) ff_wire: Option<svasynth_netlist::NetId>,
    pub(crate) state_sig: Bit,
    pub(crate) next_state: Vec<Bit>,
}

/// Conjoin a control bit onto a sorted-unique prefix
fn extend_ctrl(prefix: &[Bit], bit: Bit) -> Vec<Bit> {
    let mut v = prefix.to_vec();
    v.push(bit);
    v.sort_unstable();
    v.dedup();
    v
}

/// Fold the links reachable from `node` into `unodes[unode]`, accumulating
/// link controls into the conjunction prefix
fn flatten_links(
    nodes: &[FsmNode],
    unodes: &mut [UNode],
    accept_node: usize,
    node: usize,
    unode: usize,
    prefix: &[Bit],
) {
    if node == accept_node {
        unodes[unode].accept.push(prefix.to_vec());
    }

    for &(target, ctrl) in &nodes[node].edges {
        if ctrl != Bit::ONE {
            unodes[unode].edges.push((target, extend_ctrl(prefix, ctrl)));
        } else {
            unodes[unode].edges.push((target, prefix.to_vec()));
        }
    }

    for &(target, ctrl) in &nodes[node].links {
        if ctrl != Bit::ONE {
            let extended = extend_ctrl(prefix, ctrl);
            flatten_links(nodes, unodes, accept_node, target, unode, &extended);
        } else {
            flatten_links(nodes, unodes, accept_node, target, unode, prefix);
        }
    }
}

fn mark_reachable(unodes: &mut [UNode], unode: usize) {
    if unodes[unode].reachable {
        return;
    }
    unodes[unode].reachable = true;

    let targets: Vec<usize> = unodes[unode].edges.iter().map(|&(t, _)| t).collect();
    for target in targets {
        mark_reachable(unodes, target);
    }
}

/// True when every bit of `ctrl` is asserted by the assignment `set`
fn ctrl_satisfied(set: &[Bit], ctrl: &[Bit]) -> bool {
    ctrl.iter().all(|bit| set.contains(bit))
}

impl SvaFsm {
    fn create_dnode(&mut self, state: Vec<usize>, first_match: bool) -> SvaResult<()> {
        if self.dnodes.contains_key(&state) {
            return Ok(());
        }

        // placeholder breaks recursion on state cycles
        self.dnodes.insert(state.clone(), DNode::default());

        let mut ctrl: Vec<Bit> = Vec::new();
        for &unode in &state {
            assert!(self.unodes[unode].reachable, "dead node in DFSM state");
            for (_, edge_ctrl) in &self.unodes[unode].edges {
                ctrl.extend_from_slice(edge_ctrl);
            }
            for accept_ctrl in &self.unodes[unode].accept {
                ctrl.extend_from_slice(accept_ctrl);
            }
        }
        ctrl.sort_unstable();
        ctrl.dedup();

        if ctrl.len() > MAX_CTRL_BITS {
            return Err(SvaError::CtrlTooWide { width: ctrl.len() });
        }

        let mut dnode = DNode {
            ctrl: ctrl.clone(),
            ..DNode::default()
        };

        for value in 0u32..(1 << ctrl.len()) {
            let asserted: Vec<Bit> = ctrl
                .iter()
                .enumerate()
                .filter(|(i, _)| value & (1 << i) != 0)
                .map(|(_, &bit)| bit)
                .collect();

            let accept = state.iter().any(|&unode| {
                self.unodes[unode]
                    .accept
                    .iter()
                    .any(|c| ctrl_satisfied(&asserted, c))
            });

            let mut new_state: Vec<usize> = Vec::new();
            if !accept || !first_match {
                for &unode in &state {
                    for (target, edge_ctrl) in &self.unodes[unode].edges {
                        if ctrl_satisfied(&asserted, edge_ctrl) {
                            new_state.push(*target);
                        }
                    }
                }
            }

            if accept {
                dnode.accept.push(value);
            }

            if new_state.is_empty() {
                if !accept {
                    dnode.reject.push(value);
                }
            } else {
                new_state.sort_unstable();
                new_state.dedup();
                dnode.edges.push((new_state.clone(), value));
                self.create_dnode(new_state, first_match)?;
            }
        }

        self.dnodes.insert(state, dnode);
        Ok(())
    }

    /// Lower the FSM through determinization and return the signal that is
    /// high in exactly the cycles in which every possible match has failed.
    ///
    /// When `accept_out` is given it receives the determinized accept
    /// signal as well.
    pub fn get_reject(
        &mut self,
        netlist: &mut Netlist,
        accept_out: Option<&mut Bit>,
    ) -> SvaResult<Bit> {
        assert!(!self.materialized, "FSM lowered twice");
        self.materialized = true;

        // Unlinked NFSM

        self.unodes = vec![UNode::default(); self.nodes.len()];
        for node in 0..self.nodes.len() {
            flatten_links(
                &self.nodes,
                &mut self.unodes,
                self.accept_node,
                node,
                node,
                &[],
            );
        }
        mark_reachable(&mut self.unodes, self.start_node);

        // DFSM

        self.create_dnode(vec![self.start_node], true)?;
        self.dnodes.sort_keys();

        // DFSM circuit

        let start_state = vec![self.start_node];

        for (state, dnode) in self.dnodes.iter_mut() {
            let w = netlist.add_wire();
            netlist.set_init(w, false);
            dnode.ff_wire = Some(w);
            dnode.state_sig = Bit::Net(w);

            if *state == start_state {
                dnode.state_sig = netlist.or_gate(dnode.state_sig, self.trigger);
            }
        }

        let mut accept_sig: Vec<Bit> = Vec::new();
        let mut reject_sig: Vec<Bit> = Vec::new();
        let mut edge_triggers: Vec<(Vec<usize>, Bit)> = Vec::new();

        let want_accept = accept_out.is_some();

        for dnode in self.dnodes.values() {
            let pattern = |value: u32, netlist: &mut Netlist| -> Bit {
                let mut a: Vec<Bit> = dnode.ctrl.clone();
                a.push(dnode.state_sig);
                let mut b: Vec<Bit> = (0..dnode.ctrl.len())
                    .map(|i| Bit::Const(value & (1 << i) != 0))
                    .collect();
                b.push(Bit::ONE);
                netlist.eq_gate(a, b)
            };

            for (target, value) in &dnode.edges {
                let trig = pattern(*value, netlist);
                edge_triggers.push((target.clone(), trig));
            }

            if want_accept {
                for &value in &dnode.accept {
                    let sig = pattern(value, netlist);
                    accept_sig.push(sig);
                }
            }

            for &value in &dnode.reject {
                let sig = pattern(value, netlist);
                reject_sig.push(sig);
            }
        }

        for (target, trig) in edge_triggers {
            self.dnodes
                .get_mut(&target)
                .expect("DFSM edge to unknown state")
                .next_state
                .push(trig);
        }

        for dnode in self.dnodes.values() {
            let w = dnode.ff_wire.expect("DFSM state without wire");
            if dnode.next_state.is_empty() {
                netlist.connect(w, Bit::ZERO);
            } else {
                let next = or_reduce(netlist, &dnode.next_state);
                netlist.add_dff(self.clock, self.clock_pol, next, w);
            }
        }

        if let Some(out) = accept_out {
            *out = or_reduce(netlist, &accept_sig);
        }

        Ok(or_reduce(netlist, &reject_sig))
    }
}
