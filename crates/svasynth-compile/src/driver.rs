//! Property driver
//!
//! Recognizes the supported property shapes at the root of an SVA primitive
//! graph and wires the sequence FSMs together:
//!
//! ```text
//! prop:
//!   expr
//!   not seq
//!   seq |-> seq            seq |=> seq
//!   seq |-> not seq        seq |=> not seq
//!   seq |-> seq until seq  seq |=> seq until seq
//! ```
//!
//! optionally wrapped in `@(posedge clk)` / `@(negedge clk)`, any number of
//! `disable iff (expr)` layers, and `s_eventually` (the latter only for
//! immediate assertions). The property-OK signal runs through one final
//! stage register before driving the verification cell.

use svasynth_ast::{AstNetId, InstanceId, SvaGraph, SvaPrim};
use svasynth_netlist::{Bit, CellId, Netlist};
use tracing::debug;

use crate::fsm::SvaFsm;
use crate::{SvaError, SvaResult};

/// Which verification cell the property compiles into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// Obligation on the design
    Assert,
    /// Constraint on the environment
    Assume,
    /// Reachability claim
    Cover,
}

/// Compiler behavior flags
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Warn and degrade on unsupported primitives instead of failing
    pub mode_keep: bool,
    /// Name emitted cells after the root instance even when the name was
    /// generated rather than user-declared
    pub mode_names: bool,
}

/// Result of compiling one property
#[derive(Debug)]
pub struct CompileOutcome {
    /// The emitted verification cell; `None` when an unsupported root was
    /// elided in `mode_keep`
    pub cell: Option<CellId>,
    /// Warnings accumulated during compilation
    pub warnings: Vec<String>,
}

/// Compiles one SVA property graph into the netlist
pub struct SvaCompiler<'a> {
    pub(crate) graph: &'a SvaGraph,
    pub(crate) netlist: &'a mut Netlist,
    mode: VerifyMode,
    options: CompileOptions,
    warnings: Vec<String>,
}

/// Compile the property rooted at `root` into an assert cell
pub fn compile_assert(
    graph: &SvaGraph,
    netlist: &mut Netlist,
    options: CompileOptions,
    root: InstanceId,
) -> SvaResult<CompileOutcome> {
    SvaCompiler::new(graph, netlist, VerifyMode::Assert, options).compile(root)
}

/// Compile the property rooted at `root` into an assume cell
pub fn compile_assume(
    graph: &SvaGraph,
    netlist: &mut Netlist,
    options: CompileOptions,
    root: InstanceId,
) -> SvaResult<CompileOutcome> {
    SvaCompiler::new(graph, netlist, VerifyMode::Assume, options).compile(root)
}

/// Compile the property rooted at `root` into a cover cell
pub fn compile_cover(
    graph: &SvaGraph,
    netlist: &mut Netlist,
    options: CompileOptions,
    root: InstanceId,
) -> SvaResult<CompileOutcome> {
    SvaCompiler::new(graph, netlist, VerifyMode::Cover, options).compile(root)
}

impl<'a> SvaCompiler<'a> {
    pub fn new(
        graph: &'a SvaGraph,
        netlist: &'a mut Netlist,
        mode: VerifyMode,
        options: CompileOptions,
    ) -> Self {
        Self {
            graph,
            netlist,
            mode,
            options,
            warnings: Vec::new(),
        }
    }

    /// Warnings accumulated so far
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Reject an unsupported primitive, or warn and continue in `mode_keep`
    pub(crate) fn unsupported(&mut self, prim: SvaPrim, instance: &str) -> SvaResult<()> {
        if !self.options.mode_keep {
            return Err(SvaError::Unsupported {
                prim: prim.name(),
                instance: instance.to_string(),
            });
        }
        let msg = format!(
            "SVA primitive {} ({}) is currently unsupported in this context",
            prim.name(),
            instance
        );
        tracing::warn!("{}", msg);
        self.warnings.push(msg);
        Ok(())
    }

    /// Compile the property rooted at `root_id`
    pub fn compile(mut self, root_id: InstanceId) -> SvaResult<CompileOutcome> {
        let root = self.graph.instance(root_id);
        let root_prim = root.prim;
        let root_input = root.input;
        let root_name = root.name.clone();
        let root_attributes = root.attributes.clone();
        let named = self.options.mode_names || root.user_declared;

        debug!("compiling SVA property at root instance {}", root_name);

        let cell_name = if named {
            self.netlist.uniquify(&root_name)
        } else {
            self.netlist.fresh_name()
        };

        let at_inst = self
            .graph
            .ast_input(root_id)
            .filter(|&i| self.graph.instance(i).prim == SvaPrim::At);

        // asynchronous immediate assertion/assumption/cover
        if at_inst.is_none()
            && matches!(
                root_prim,
                SvaPrim::ImmediateAssert | SvaPrim::ImmediateAssume | SvaPrim::ImmediateCover
            )
        {
            return self.compile_immediate(root_input, cell_name, &root_name, root_attributes);
        }

        // clocked property: the root wraps an @() envelope
        let at_id = at_inst.expect("clocked property without @() envelope");
        let at = self.graph.instance(at_id);
        let clock_net = at.input1.expect("@() without clock specification");
        let mut net = at.input2.expect("@() without property operand");
        let edge = self.graph.clock_edge(clock_net)?;
        let clock = edge.clock;
        let clock_pol = edge.posedge;

        // peel s_eventually and disable iff layers
        let mut disable_iff = Bit::ZERO;
        let mut eventually = false;

        loop {
            let Some(layer) = self.graph.driver(net) else { break };
            let layer = self.graph.instance(layer);
            match layer.prim {
                SvaPrim::SEventually => {
                    eventually = true;
                    net = layer.input.expect("s_eventually without operand");
                }
                SvaPrim::DisableIff => {
                    let cond_net = layer.input1.expect("disable_iff without condition");
                    let operand = layer.input2.expect("disable_iff without operand");
                    let cond = self.graph.bool_bit(cond_net);
                    disable_iff = if disable_iff == Bit::ZERO {
                        cond
                    } else {
                        self.netlist.or_gate(disable_iff, cond)
                    };
                    net = operand;
                }
                _ => break,
            }
        }

        // dispatch on the property root
        let prop_ok = match self.graph.driver(net) {
            None => self.graph.bool_bit(net),

            Some(inst_id)
                if matches!(
                    self.graph.instance(inst_id).prim,
                    SvaPrim::OverlappedImplication | SvaPrim::NonOverlappedImplication
                ) =>
            {
                self.compile_implication(inst_id, clock, clock_pol, disable_iff)?
            }

            Some(inst_id)
                if self.graph.instance(inst_id).prim == SvaPrim::Not
                    || self.mode == VerifyMode::Cover =>
            {
                let seq_net = if self.mode == VerifyMode::Cover {
                    net
                } else {
                    self.graph
                        .instance(inst_id)
                        .input
                        .expect("not without operand")
                };

                let mut fsm = SvaFsm::new(clock, clock_pol, disable_iff, Bit::ONE);
                let start = fsm.start_node;
                let node = self.compile_sequence(&mut fsm, start, seq_net)?;
                let accept_node = fsm.accept_node;
                fsm.create_link(self.netlist, node, accept_node, Bit::ONE);
                let accept = fsm.get_accept(self.netlist);
                debug!("sequence FSM:");
                fsm.dump();

                if self.mode == VerifyMode::Cover {
                    accept
                } else {
                    self.netlist.not_gate(accept)
                }
            }

            Some(inst_id) => {
                let prim = self.graph.instance(inst_id).prim;
                let name = self.graph.instance(inst_id).name.clone();
                self.unsupported(prim, &name)?;
                return Ok(CompileOutcome {
                    cell: None,
                    warnings: self.warnings,
                });
            }
        };

        if eventually {
            return Err(SvaError::EventuallyUnsupported);
        }

        // final stage register: holds before the first sample for
        // assert/assume, claims nothing before the first sample for cover
        let q = self.netlist.add_wire();
        self.netlist
            .set_init(q, !matches!(self.mode, VerifyMode::Cover));
        self.netlist.add_dff(clock, clock_pol, prop_ok, q);

        let cell = match self.mode {
            VerifyMode::Assert => self.netlist.add_assert(cell_name, Bit::Net(q), Bit::ONE),
            VerifyMode::Assume => self.netlist.add_assume(cell_name, Bit::Net(q), Bit::ONE),
            VerifyMode::Cover => self.netlist.add_cover(cell_name, Bit::Net(q), Bit::ONE),
        };
        self.copy_attributes(cell, &root_attributes);

        Ok(CompileOutcome {
            cell: Some(cell),
            warnings: self.warnings,
        })
    }

    /// Immediate (unclocked) assertion: the verification cell is driven by
    /// the boolean operand directly, with no state
    fn compile_immediate(
        mut self,
        root_input: Option<AstNetId>,
        cell_name: String,
        root_name: &str,
        root_attributes: indexmap::IndexMap<String, String>,
    ) -> SvaResult<CompileOutcome> {
        let mut net = root_input.expect("immediate assertion without operand");
        let mut eventually = false;

        while let Some(layer) = self.graph.driver(net) {
            if self.graph.instance(layer).prim == SvaPrim::SEventually {
                eventually = true;
                net = self
                    .graph
                    .instance(layer)
                    .input
                    .expect("s_eventually without operand");
            } else {
                break;
            }
        }

        let sig = self.graph.bool_bit(net);

        let cell = if eventually {
            match self.mode {
                VerifyMode::Assert => self.netlist.add_live(cell_name, sig, Bit::ONE),
                VerifyMode::Assume => self.netlist.add_fair(cell_name, sig, Bit::ONE),
                VerifyMode::Cover => {
                    self.unsupported(SvaPrim::SEventually, root_name)?;
                    return Ok(CompileOutcome {
                        cell: None,
                        warnings: self.warnings,
                    });
                }
            }
        } else {
            match self.mode {
                VerifyMode::Assert => self.netlist.add_assert(cell_name, sig, Bit::ONE),
                VerifyMode::Assume => self.netlist.add_assume(cell_name, sig, Bit::ONE),
                VerifyMode::Cover => self.netlist.add_cover(cell_name, sig, Bit::ONE),
            }
        };
        self.copy_attributes(cell, &root_attributes);

        Ok(CompileOutcome {
            cell: Some(cell),
            warnings: self.warnings,
        })
    }

    /// Implication: the consequent FSM is triggered by completion of the
    /// antecedent FSM
    fn compile_implication(
        &mut self,
        inst_id: InstanceId,
        clock: Bit,
        clock_pol: bool,
        disable_iff: Bit,
    ) -> SvaResult<Bit> {
        let inst = self.graph.instance(inst_id);
        let non_overlapped = inst.prim == SvaPrim::NonOverlappedImplication;
        let antecedent_net = inst.input1.expect("implication without antecedent");
        let mut consequent_net = inst.input2.expect("implication without consequent");

        // antecedent FSM, lowered to its accept signal
        let mut antecedent_fsm = SvaFsm::new(clock, clock_pol, disable_iff, Bit::ONE);
        let start = antecedent_fsm.start_node;
        let mut node = self.compile_sequence(&mut antecedent_fsm, start, antecedent_net)?;
        if non_overlapped {
            // consequent starts the cycle after antecedent completion
            let next = antecedent_fsm.create_node();
            antecedent_fsm.create_edge(self.netlist, node, next, Bit::ONE);
            node = next;
        }
        let accept_node = antecedent_fsm.accept_node;
        antecedent_fsm.create_link(self.netlist, node, accept_node, Bit::ONE);

        let mut antecedent_match = antecedent_fsm.get_accept(self.netlist);
        debug!("antecedent FSM:");
        antecedent_fsm.dump();

        // peel a leading `not` off the consequent
        let mut consequent_not = false;
        if let Some(ci) = self.graph.driver(consequent_net) {
            if self.graph.instance(ci).prim == SvaPrim::Not {
                consequent_not = true;
                consequent_net = self
                    .graph
                    .instance(ci)
                    .input
                    .expect("not without operand");
            }
        }

        // peel a leading until: while the until condition has not matched,
        // the antecedent match is extended across cycles
        if let Some(ci) = self.graph.driver(consequent_net) {
            let cprim = self.graph.instance(ci).prim;
            if matches!(
                cprim,
                SvaPrim::Until | SvaPrim::SUntil | SvaPrim::UntilWith | SvaPrim::SUntilWith
            ) {
                let until_with = matches!(cprim, SvaPrim::UntilWith | SvaPrim::SUntilWith);
                let until_net = self
                    .graph
                    .instance(ci)
                    .input2
                    .expect("until without condition");
                consequent_net = self
                    .graph
                    .instance(ci)
                    .input1
                    .expect("until without operand");

                if self.mode != VerifyMode::Cover {
                    let mut until_fsm = SvaFsm::new(clock, clock_pol, disable_iff, Bit::ONE);
                    let start = until_fsm.start_node;
                    let mut node = self.compile_sequence(&mut until_fsm, start, until_net)?;
                    if until_with {
                        let next = until_fsm.create_node();
                        until_fsm.create_edge(self.netlist, node, next, Bit::ONE);
                        node = next;
                    }
                    let accept_node = until_fsm.accept_node;
                    until_fsm.create_link(self.netlist, node, accept_node, Bit::ONE);
                    let until_match = until_fsm.get_accept(self.netlist);
                    let not_until_match = self.netlist.not_gate(until_match);

                    let extend_q = self.netlist.add_wire();
                    self.netlist.set_init(extend_q, false);
                    antecedent_match = self.netlist.or_gate(antecedent_match, Bit::Net(extend_q));
                    let extend = self.netlist.and_gate(not_until_match, antecedent_match);
                    self.netlist.add_dff(clock, clock_pol, extend, extend_q);
                }
            }
        }

        // consequent FSM, triggered by antecedent completion
        let mut consequent_fsm = SvaFsm::new(clock, clock_pol, disable_iff, antecedent_match);
        let start = consequent_fsm.start_node;
        let node = self.compile_sequence(&mut consequent_fsm, start, consequent_net)?;
        let accept_node = consequent_fsm.accept_node;
        consequent_fsm.create_link(self.netlist, node, accept_node, Bit::ONE);

        let prop_ok = if self.mode == VerifyMode::Cover {
            if consequent_not {
                consequent_fsm.get_reject(self.netlist, None)?
            } else {
                consequent_fsm.get_accept(self.netlist)
            }
        } else {
            let consequent_match = if consequent_not {
                consequent_fsm.get_accept(self.netlist)
            } else {
                consequent_fsm.get_reject(self.netlist, None)?
            };
            self.netlist.not_gate(consequent_match)
        };
        debug!("consequent FSM:");
        consequent_fsm.dump();

        Ok(prop_ok)
    }

    fn copy_attributes(&mut self, cell: CellId, attributes: &indexmap::IndexMap<String, String>) {
        for (key, value) in attributes {
            self.netlist
                .cell_mut(cell)
                .attributes
                .insert(key.clone(), value.clone());
        }
    }
}
