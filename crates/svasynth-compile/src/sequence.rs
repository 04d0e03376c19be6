//! Sequence compiler
//!
//! Recursive descent over the primitive graph, growing the sequence FSM.
//! Each call starts at an existing node and returns the node the compiled
//! sequence ends on.
//!
//! Supported sequence operators: `##[N:M]` cycle delay, `[*N:M]`
//! consecutive repetition, and `throughout`. Anything else is rejected (or,
//! with `mode_keep`, warned about and elided by returning the start node
//! unchanged, which degrades the surrounding property).

use svasynth_ast::{AstNetId, DelayRange, SvaPrim};
use svasynth_netlist::Bit;

use crate::driver::SvaCompiler;
use crate::fsm::SvaFsm;
use crate::SvaResult;

impl<'a> SvaCompiler<'a> {
    /// Compile the sequence driving `net` into `fsm`, starting at `start`.
    /// Returns the end node of the compiled sequence.
    pub(crate) fn compile_sequence(
        &mut self,
        fsm: &mut SvaFsm,
        start: usize,
        net: AstNetId,
    ) -> SvaResult<usize> {
        let Some(inst_id) = self.graph.driver(net) else {
            // atomic boolean: a same-cycle link gated by the expression
            let node = fsm.create_node();
            let expr = self.graph.bool_bit(net);
            fsm.create_link(self.netlist, start, node, expr);
            return Ok(node);
        };

        let inst = self.graph.instance(inst_id);
        let prim = inst.prim;
        let (input, input1, input2) = (inst.input, inst.input1, inst.input2);
        let inst_name = inst.name.clone();

        match prim {
            SvaPrim::SeqConcat => {
                let range = DelayRange::from_instance(self.graph.instance(inst_id))?;
                let lhs = input1.expect("seq_concat without left operand");
                let rhs = input2.expect("seq_concat without right operand");

                let mut node = self.compile_sequence(fsm, start, lhs)?;

                for _ in 0..range.low {
                    let next = fsm.create_node();
                    fsm.create_edge(self.netlist, node, next, Bit::ONE);
                    node = next;
                }

                match range.high {
                    // unbounded tail: absorb arbitrary extra cycles
                    None => fsm.create_edge(self.netlist, node, node, Bit::ONE),
                    // finite window: each extra step may be taken or skipped
                    Some(high) => {
                        for _ in range.low..high {
                            let next = fsm.create_node();
                            fsm.create_edge(self.netlist, node, next, Bit::ONE);
                            fsm.create_link(self.netlist, node, next, Bit::ONE);
                            node = next;
                        }
                    }
                }

                self.compile_sequence(fsm, node, rhs)
            }

            SvaPrim::ConsecutiveRepeat => {
                let range = DelayRange::from_instance(self.graph.instance(inst_id))?;
                let operand = input.expect("consecutive_repeat without operand");

                let mut node = self.compile_sequence(fsm, start, operand)?;

                for _ in 1..range.low {
                    let next = fsm.create_node();
                    fsm.create_edge(self.netlist, node, next, Bit::ONE);
                    node = self.compile_sequence(fsm, next, operand)?;
                }

                match range.high {
                    None => {
                        // unbounded tail loops back through one more match
                        let next = fsm.create_node();
                        fsm.create_edge(self.netlist, node, next, Bit::ONE);
                        let end = self.compile_sequence(fsm, next, operand)?;
                        fsm.create_link(self.netlist, end, node, Bit::ONE);
                    }
                    Some(high) => {
                        for _ in range.low..high {
                            let next = fsm.create_node();
                            fsm.create_edge(self.netlist, node, next, Bit::ONE);
                            let end = self.compile_sequence(fsm, next, operand)?;
                            // optional repetition: may terminate before it
                            fsm.create_link(self.netlist, node, end, Bit::ONE);
                            node = end;
                        }
                    }
                }

                Ok(node)
            }

            SvaPrim::Throughout => {
                let cond = input1.expect("throughout without condition");
                let seq = input2.expect("throughout without sequence");
                assert!(
                    self.graph.driver(cond).is_none(),
                    "throughout condition must be a plain boolean"
                );
                let expr = self.graph.bool_bit(cond);

                fsm.push_throughout(self.netlist, expr);
                let node = self.compile_sequence(fsm, start, seq)?;
                fsm.pop_throughout();

                Ok(node)
            }

            _ => {
                self.unsupported(prim, &inst_name)?;
                Ok(start)
            }
        }
    }
}
