//! Tests for the property driver: root dispatch, naming, attributes, and
//! the implication wiring variants

use svasynth_ast::{AstNetId, ClockEdge, InstanceId, SvaGraph, SvaPrim};
use svasynth_compile::{compile_assert, compile_assume, compile_cover, CompileOptions, SvaError};
use svasynth_netlist::{Bit, CellKind, Netlist};

struct Fixture {
    graph: SvaGraph,
    netlist: Netlist,
    clk: Bit,
    a: Bit,
    a_net: AstNetId,
    b_net: AstNetId,
}

fn fixture() -> Fixture {
    let mut netlist = Netlist::new("top");
    let clk = Bit::Net(netlist.add_named_wire("clk"));
    let a = Bit::Net(netlist.add_named_wire("a"));
    let b = Bit::Net(netlist.add_named_wire("b"));
    let mut graph = SvaGraph::new();
    let a_net = graph.add_ext_net(a);
    let b_net = graph.add_ext_net(b);
    Fixture {
        graph,
        netlist,
        clk,
        a,
        a_net,
        b_net,
    }
}

/// Wrap `body` in `@(posedge clk)` under a fresh root of kind `prim`
fn clocked_root(f: &mut Fixture, prim: SvaPrim, name: &str, body: AstNetId) -> InstanceId {
    let ev = f.graph.add_net();
    f.graph.register_clock_edge(
        ev,
        ClockEdge {
            clock: f.clk,
            posedge: true,
        },
    );
    let at = f.graph.add_instance(SvaPrim::At, "at");
    let am = f.graph.instance_mut(at);
    am.input1 = Some(ev);
    am.input2 = Some(body);
    let at_net = f.graph.drive(at);

    let root = f.graph.add_instance(prim, name);
    f.graph.instance_mut(root).input = Some(at_net);
    root
}

fn implication(f: &mut Fixture, prim: SvaPrim, lhs: AstNetId, rhs: AstNetId) -> AstNetId {
    let imp = f.graph.add_instance(prim, "imp");
    let im = f.graph.instance_mut(imp);
    im.input1 = Some(lhs);
    im.input2 = Some(rhs);
    f.graph.drive(imp)
}

#[test]
fn test_plain_boolean_property_has_only_final_stage() {
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let root = clocked_root(&mut f, SvaPrim::Assert, "p", f_a_net_tmp);
    let outcome = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();

    assert!(outcome.cell.is_some());
    assert_eq!(f.netlist.stats().registers, 1);
    let dff = f.netlist.registers().next().unwrap();
    if let CellKind::Dff { d, clock, clock_pol, .. } = dff.kind {
        assert_eq!(d, f.a);
        assert_eq!(clock, f.clk);
        assert!(clock_pol);
    } else {
        unreachable!();
    }
}

#[test]
fn test_overlapped_vs_non_overlapped_differ_by_one_edge() {
    // |-> and |=> differ by a single consuming edge in the antecedent tail,
    // which surfaces as exactly one extra register
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let f_b_net_tmp = f.b_net;
    let body = implication(&mut f, SvaPrim::OverlappedImplication, f_a_net_tmp, f_b_net_tmp);
    let root = clocked_root(&mut f, SvaPrim::Assert, "ov", body);
    compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let overlapped_regs = f.netlist.stats().registers;

    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let f_b_net_tmp = f.b_net;
    let body = implication(&mut f, SvaPrim::NonOverlappedImplication, f_a_net_tmp, f_b_net_tmp);
    let root = clocked_root(&mut f, SvaPrim::Assert, "nonov", body);
    compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let non_overlapped_regs = f.netlist.stats().registers;

    assert_eq!(non_overlapped_regs, overlapped_regs + 1);
}

#[test]
fn test_negated_consequent_swaps_accept_and_reject() {
    // a |=> not b must still compile to a single assert cell; the
    // consequent is lowered through the accept path instead of the DFSM
    let mut f = fixture();
    let not = f.graph.add_instance(SvaPrim::Not, "n");
    f.graph.instance_mut(not).input = Some(f.b_net);
    let not_net = f.graph.drive(not);
    let f_a_net_tmp = f.a_net;
    let body = implication(&mut f, SvaPrim::NonOverlappedImplication, f_a_net_tmp, not_net);
    let root = clocked_root(&mut f, SvaPrim::Assert, "negcons", body);

    let outcome = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    assert!(outcome.cell.is_some());
    // the DFSM path would emit equality gates; the accept path never does
    let eqs = f
        .netlist
        .cells
        .iter()
        .filter(|c| matches!(c.kind, CellKind::Eq { .. }))
        .count();
    assert_eq!(eqs, 0);
}

#[test]
fn test_until_consequent_adds_extension_register() {
    // a |=> b until c: antecedent match register, extension register,
    // final stage
    let mut f = fixture();
    let c = Bit::Net(f.netlist.add_named_wire("c"));
    let c_net = f.graph.add_ext_net(c);
    let until = f.graph.add_instance(SvaPrim::Until, "u");
    let um = f.graph.instance_mut(until);
    um.input1 = Some(f.b_net);
    um.input2 = Some(c_net);
    let until_net = f.graph.drive(until);
    let f_a_net_tmp = f.a_net;
    let body = implication(&mut f, SvaPrim::NonOverlappedImplication, f_a_net_tmp, until_net);
    let root = clocked_root(&mut f, SvaPrim::Assert, "untilprop", body);

    compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    assert_eq!(f.netlist.stats().registers, 3);
}

#[test]
fn test_until_extension_is_skipped_in_cover_mode() {
    let mut f = fixture();
    let c = Bit::Net(f.netlist.add_named_wire("c"));
    let c_net = f.graph.add_ext_net(c);
    let until = f.graph.add_instance(SvaPrim::Until, "u");
    let um = f.graph.instance_mut(until);
    um.input1 = Some(f.b_net);
    um.input2 = Some(c_net);
    let until_net = f.graph.drive(until);
    let f_a_net_tmp = f.a_net;
    let body = implication(&mut f, SvaPrim::NonOverlappedImplication, f_a_net_tmp, until_net);
    let root = clocked_root(&mut f, SvaPrim::Cover, "untilcover", body);

    compile_cover(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    // no extension register: antecedent match and final stage only
    assert_eq!(f.netlist.stats().registers, 2);
}

#[test]
fn test_unsupported_root_is_fatal_in_strict_mode() {
    let mut f = fixture();
    let and = f.graph.add_instance(SvaPrim::SeqAnd, "sa");
    let am = f.graph.instance_mut(and);
    am.input1 = Some(f.a_net);
    am.input2 = Some(f.b_net);
    let and_net = f.graph.drive(and);
    let root = clocked_root(&mut f, SvaPrim::Assert, "bad", and_net);

    let err = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap_err();
    assert!(matches!(err, SvaError::Unsupported { prim: "seq_and", .. }));
}

#[test]
fn test_unsupported_root_is_elided_in_keep_mode() {
    let mut f = fixture();
    let and = f.graph.add_instance(SvaPrim::SeqAnd, "sa");
    let am = f.graph.instance_mut(and);
    am.input1 = Some(f.a_net);
    am.input2 = Some(f.b_net);
    let and_net = f.graph.drive(and);
    let root = clocked_root(&mut f, SvaPrim::Assert, "bad", and_net);

    let options = CompileOptions {
        mode_keep: true,
        ..CompileOptions::default()
    };
    let outcome = compile_assert(&f.graph, &mut f.netlist, options, root).unwrap();
    assert!(outcome.cell.is_none());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(f.netlist.stats().verification_cells, 0);
}

#[test]
fn test_clocked_eventually_is_rejected() {
    let mut f = fixture();
    let ev = f.graph.add_instance(SvaPrim::SEventually, "ev");
    f.graph.instance_mut(ev).input = Some(f.a_net);
    let ev_net = f.graph.drive(ev);
    let root = clocked_root(&mut f, SvaPrim::Assert, "live", ev_net);

    let err = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap_err();
    assert_eq!(err, SvaError::EventuallyUnsupported);
}

#[test]
fn test_immediate_eventually_emits_live_and_fair() {
    let mut f = fixture();
    let ev = f.graph.add_instance(SvaPrim::SEventually, "ev");
    f.graph.instance_mut(ev).input = Some(f.a_net);
    let ev_net = f.graph.drive(ev);
    let root = f.graph.add_instance(SvaPrim::ImmediateAssert, "live_a");
    f.graph.instance_mut(root).input = Some(ev_net);

    let outcome = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let cell = f.netlist.cell(outcome.cell.unwrap());
    assert!(matches!(cell.kind, CellKind::Live { a, .. } if a == f.a));

    let mut f = fixture();
    let ev = f.graph.add_instance(SvaPrim::SEventually, "ev");
    f.graph.instance_mut(ev).input = Some(f.a_net);
    let ev_net = f.graph.drive(ev);
    let root = f.graph.add_instance(SvaPrim::ImmediateAssume, "fair_a");
    f.graph.instance_mut(root).input = Some(ev_net);

    let outcome = compile_assume(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let cell = f.netlist.cell(outcome.cell.unwrap());
    assert!(matches!(cell.kind, CellKind::Fair { a, .. } if a == f.a));
}

#[test]
fn test_user_declared_names_are_kept_and_uniquified() {
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let root = clocked_root(&mut f, SvaPrim::Assert, "my_check", f_a_net_tmp);
    f.graph.instance_mut(root).user_declared = true;
    let outcome = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let cell = f.netlist.cell(outcome.cell.unwrap());
    assert_eq!(cell.name.as_deref(), Some("my_check"));

    // a second property with the same declared name gets a suffix
    let f_b_net_tmp = f.b_net;
    let root2 = clocked_root(&mut f, SvaPrim::Assert, "my_check", f_b_net_tmp);
    f.graph.instance_mut(root2).user_declared = true;
    let outcome2 =
        compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root2).unwrap();
    let cell2 = f.netlist.cell(outcome2.cell.unwrap());
    assert_eq!(cell2.name.as_deref(), Some("my_check_1"));
}

#[test]
fn test_generated_names_are_anonymous_by_default() {
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let root = clocked_root(&mut f, SvaPrim::Assert, "elab_gen_7", f_a_net_tmp);
    let outcome = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let cell = f.netlist.cell(outcome.cell.unwrap());
    assert!(cell.name.as_deref().unwrap().starts_with("$sva$"));

    // mode_names forces the elaborator-generated name through
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let root = clocked_root(&mut f, SvaPrim::Assert, "elab_gen_7", f_a_net_tmp);
    let options = CompileOptions {
        mode_names: true,
        ..CompileOptions::default()
    };
    let outcome = compile_assert(&f.graph, &mut f.netlist, options, root).unwrap();
    let cell = f.netlist.cell(outcome.cell.unwrap());
    assert_eq!(cell.name.as_deref(), Some("elab_gen_7"));
}

#[test]
fn test_root_attributes_are_copied_to_the_cell() {
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let root = clocked_root(&mut f, SvaPrim::Assert, "p", f_a_net_tmp);
    f.graph
        .instance_mut(root)
        .attributes
        .insert("src".to_string(), "checks.sv:42".to_string());
    let outcome = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let cell = f.netlist.cell(outcome.cell.unwrap());
    assert_eq!(cell.attributes.get("src").map(String::as_str), Some("checks.sv:42"));
}

#[test]
fn test_missing_clock_edge_is_an_error() {
    let mut f = fixture();
    // build the @() envelope without registering a clock edge
    let ev = f.graph.add_net();
    let at = f.graph.add_instance(SvaPrim::At, "at");
    let am = f.graph.instance_mut(at);
    am.input1 = Some(ev);
    am.input2 = Some(f.a_net);
    let at_net = f.graph.drive(at);
    let root = f.graph.add_instance(SvaPrim::Assert, "p");
    f.graph.instance_mut(root).input = Some(at_net);

    let err = compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap_err();
    assert!(matches!(err, SvaError::Ast(_)));
}

#[test]
fn test_stacked_disable_iff_layers_are_ored() {
    let mut f = fixture();
    let d1 = Bit::Net(f.netlist.add_named_wire("d1"));
    let d2 = Bit::Net(f.netlist.add_named_wire("d2"));
    let d1_net = f.graph.add_ext_net(d1);
    let d2_net = f.graph.add_ext_net(d2);

    let f_a_net_tmp = f.a_net;
    let f_b_net_tmp = f.b_net;
    let body = implication(&mut f, SvaPrim::NonOverlappedImplication, f_a_net_tmp, f_b_net_tmp);
    let inner = f.graph.add_instance(SvaPrim::DisableIff, "di1");
    let im = f.graph.instance_mut(inner);
    im.input1 = Some(d1_net);
    im.input2 = Some(body);
    let inner_net = f.graph.drive(inner);
    let outer = f.graph.add_instance(SvaPrim::DisableIff, "di2");
    let om = f.graph.instance_mut(outer);
    om.input1 = Some(d2_net);
    om.input2 = Some(inner_net);
    let outer_net = f.graph.drive(outer);
    let root = clocked_root(&mut f, SvaPrim::Assert, "dd", outer_net);

    compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();

    // the two layers combine through an OR gate before masking
    let has_or_of_disables = f.netlist.cells.iter().any(|c| {
        matches!(c.kind, CellKind::Or { a, b, .. } if (a == d2 && b == d1) || (a == d1 && b == d2))
    });
    assert!(has_or_of_disables);
}

#[test]
fn test_assume_mode_emits_assume_cell() {
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let f_b_net_tmp = f.b_net;
    let body = implication(&mut f, SvaPrim::NonOverlappedImplication, f_a_net_tmp, f_b_net_tmp);
    let root = clocked_root(&mut f, SvaPrim::Assume, "env", body);
    let outcome = compile_assume(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    let cell = f.netlist.cell(outcome.cell.unwrap());
    assert!(matches!(cell.kind, CellKind::Assume { .. }));
}

#[test]
fn test_each_entry_point_emits_its_own_cell_kind() {
    let mut f = fixture();
    let f_a_net_tmp = f.a_net;
    let root = clocked_root(&mut f, SvaPrim::Assert, "p", f_a_net_tmp);
    compile_assert(&f.graph, &mut f.netlist, CompileOptions::default(), root).unwrap();
    assert_eq!(f.netlist.stats().verification_cells, 1);
    assert_eq!(
        f.netlist
            .verification_cells()
            .filter(|c| matches!(c.kind, CellKind::Assert { .. }))
            .count(),
        1
    );
}
