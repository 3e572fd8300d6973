//! Structuring integration tests.
//!
//! These tests drive the complete pipeline through the public API:
//! 1. Build a DSO instruction stream with `Assembler`
//! 2. Build the control flow graph
//! 3. Structure it into a `VirtualRegion` tree
//! 4. Verify the tree shape, the guards and the reported errors

use dsoscope::{
    analysis::{
        structure_functions, ControlFlowGraph, RegionGraph, StructureAnalyzer, StructureConfig,
        VirtualRegion,
    },
    disassembler::{Assembler, BranchKind, Disassembly, Instruction, Opcode},
    utils::graph::{algorithms::DominatorTree, Address},
    Error, Result,
};

fn block_addrs(cfg: &ControlFlowGraph<'_>) -> Vec<Address> {
    cfg.blocks().map(|block| block.addr()).collect()
}

fn structure(instructions: &[Instruction]) -> Result<VirtualRegion<'_>> {
    let cfg = ControlFlowGraph::build(instructions)?;
    StructureAnalyzer::new(&cfg, StructureConfig::default()).analyze()
}

/// `if (%a) { if (%b) { x } } else { y }`
#[test]
fn test_nested_if_in_then_arm() -> Result<()> {
    let mut asm = Assembler::new();
    asm.load_var("%a")
        .jmp_if_not("else")
        .load_var("%b")
        .jmp_if_not("inner_end")
        .load_immed(1)
        .save_var("%x")
        .label("inner_end")
        .jmp("end")
        .label("else")
        .load_immed(2)
        .save_var("%y")
        .label("end")
        .ret(false);
    let instructions = asm.finish()?;
    let cfg = ControlFlowGraph::build(&instructions)?;
    let b = block_addrs(&cfg);
    assert_eq!(b.len(), 6);

    let region = StructureAnalyzer::new(&cfg, StructureConfig::default()).analyze()?;
    assert_eq!(
        region.outline(),
        format!(
            "Seq[If({}, Seq[If({}, {}), {}], {}), {}]",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    );
    assert_eq!(region.leaves(), b);
    Ok(())
}

/// `if (%a) x; if (%b) y;`
#[test]
fn test_consecutive_conditionals() -> Result<()> {
    let mut asm = Assembler::new();
    asm.load_var("%a")
        .jmp_if_not("second")
        .load_immed(1)
        .save_var("%x")
        .label("second")
        .load_var("%b")
        .jmp_if_not("end")
        .load_immed(2)
        .save_var("%y")
        .label("end")
        .ret(false);
    let instructions = asm.finish()?;
    let cfg = ControlFlowGraph::build(&instructions)?;
    let b = block_addrs(&cfg);

    let region = structure(&instructions)?;
    assert_eq!(
        region.outline(),
        format!("Seq[If({}, {}), If({}, {}), {}]", b[0], b[1], b[2], b[3], b[4])
    );
    Ok(())
}

#[test]
fn test_guard_instruction_is_the_branch() -> Result<()> {
    let mut asm = Assembler::new();
    asm.load_var("%a")
        .jmp_if_not("end")
        .load_immed(1)
        .save_var("%x")
        .label("end")
        .ret(false);
    let instructions = asm.finish()?;

    let region = structure(&instructions)?;
    let VirtualRegion::Sequence(children) = &region else {
        panic!("expected a sequence, got {}", region.outline());
    };
    let guard = children[0]
        .guard_instruction()
        .expect("conditional has a guard");
    assert_eq!(guard.opcode(), Opcode::JmpIfNot);
    assert_eq!(guard.branch_kind(), Some(BranchKind::ConditionalFalse));
    Ok(())
}

/// `while (%i) { if (%j) x; i-- }` in the bottom-tested layout the DSO compiler emits.
#[test]
fn test_while_loop_with_conditional_body() -> Result<()> {
    let mut asm = Assembler::new();
    asm.load_immed(3)
        .save_var("%i")
        .load_var("%i")
        .jmp_if_not("exit")
        .label("body")
        .load_var("%j")
        .jmp_if_not("next")
        .load_immed(1)
        .save_var("%x")
        .label("next")
        .load_var("%i")
        .jmp_if("body")
        .label("exit")
        .ret(false);
    let instructions = asm.finish()?;
    let cfg = ControlFlowGraph::build(&instructions)?;
    let b = block_addrs(&cfg);

    let region = StructureAnalyzer::new(&cfg, StructureConfig::default()).analyze()?;
    assert_eq!(
        region.outline(),
        format!(
            "Seq[If({}, Loop[If({}, {}), {}]), {}]",
            b[0], b[1], b[2], b[3], b[4]
        )
    );
    Ok(())
}

#[test]
fn test_nested_top_tested_loops() -> Result<()> {
    let mut asm = Assembler::new();
    asm.load_immed(0)
        .save_var("%i")
        .label("outer")
        .load_var("%i")
        .jmp_if_not("done")
        .load_immed(0)
        .save_var("%j")
        .label("inner")
        .load_var("%j")
        .jmp_if_not("inner_done")
        .load_immed(1)
        .save_var("%j")
        .jmp("inner")
        .label("inner_done")
        .load_immed(1)
        .save_var("%i")
        .jmp("outer")
        .label("done")
        .ret(false);
    let instructions = asm.finish()?;
    let cfg = ControlFlowGraph::build(&instructions)?;
    let b = block_addrs(&cfg);
    assert_eq!(b.len(), 7);

    let region = StructureAnalyzer::new(&cfg, StructureConfig::default()).analyze()?;
    assert_eq!(
        region.outline(),
        format!(
            "Seq[{}, Loop[{}, {}, Loop[{}, {}], {}], {}]",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6]
        )
    );
    Ok(())
}

#[test]
fn test_loops_disabled_reports_non_termination() -> Result<()> {
    let mut asm = Assembler::new();
    asm.load_immed(0)
        .label("head")
        .load_var("%i")
        .jmp_if_not("exit")
        .load_immed(1)
        .jmp("head")
        .label("exit")
        .ret(false);
    let instructions = asm.finish()?;
    let cfg = ControlFlowGraph::build(&instructions)?;

    let result = StructureAnalyzer::new(&cfg, StructureConfig::acyclic()).analyze();
    match result {
        Err(Error::NonTerminatingStructure { remaining, passes }) => {
            assert_eq!(remaining, cfg.block_count());
            assert!(passes <= cfg.block_count());
        }
        other => panic!("expected non-termination, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_region_graph_matches_cfg_dominators() -> Result<()> {
    let mut asm = Assembler::new();
    asm.load_var("%a")
        .jmp_if_not("else")
        .load_immed(1)
        .jmp("end")
        .label("else")
        .load_immed(2)
        .label("end")
        .ret(false);
    let instructions = asm.finish()?;
    let cfg = ControlFlowGraph::build(&instructions)?;
    let regions = RegionGraph::from(&cfg);

    let from_cfg = DominatorTree::build(&cfg)?;
    let from_regions = DominatorTree::build(&regions)?;
    for a in block_addrs(&cfg) {
        for b in block_addrs(&cfg) {
            assert_eq!(
                from_cfg.dominates(a, b, true),
                from_regions.dominates(a, b, true),
                "{a} dom {b}"
            );
        }
    }
    Ok(())
}

#[test]
fn test_structure_whole_listing() -> Result<()> {
    let mut asm = Assembler::new();
    asm.func_decl("onAdd", &["%this"], "on_add_end")
        .load_var("%this")
        .jmp_if_not("skip")
        .load_immed(1)
        .save_var("%count")
        .label("skip")
        .ret(false)
        .label("on_add_end")
        .func_decl("forward", &[], "")
        .func_decl("spin", &[], "spin_end")
        .load_immed(0)
        .label("spin_head")
        .load_var("%i")
        .jmp_if_not("spin_exit")
        .load_var("%stop")
        .jmp_if("spin_exit")
        .jmp("spin_head")
        .label("spin_exit")
        .ret(false)
        .label("spin_end");
    let listing = Disassembly::new(asm.finish()?)?;

    let results = structure_functions(&listing, &StructureConfig::default())?;
    assert_eq!(results.len(), 2);

    assert_eq!(results[0].name, "onAdd");
    let on_add = results[0].result.as_ref().map_err(Clone::clone)?;
    assert_eq!(on_add.leaf_count(), 3);

    assert_eq!(results[1].name, "spin");
    assert!(matches!(
        results[1].result,
        Err(Error::NonTerminatingStructure { .. })
    ));
    Ok(())
}
