#![no_main]

use libfuzzer_sys::fuzz_target;
use dsoscope::{
    analysis::{ControlFlowGraph, StructureAnalyzer, StructureConfig},
    disassembler::Assembler,
};

// Every input byte becomes one instruction. The low two bits pick the opcode family and
// the rest select a jump target among the emitted instructions.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 512 {
        return;
    }

    let count = data.len();
    let mut asm = Assembler::new();
    for (i, &byte) in data.iter().enumerate() {
        asm.label(&format!("i{i}"));
        let target = format!("i{}", usize::from(byte >> 2) % count);
        match byte & 3 {
            0 => asm.load_immed(u32::from(byte)),
            1 => asm.jmp(&target),
            2 => asm.load_var("%c").jmp_if_not(&target),
            _ => asm.ret(false),
        };
    }
    asm.ret(false);

    let Ok(instructions) = asm.finish() else {
        return;
    };
    let Ok(cfg) = ControlFlowGraph::build(&instructions) else {
        return;
    };
    let _ = StructureAnalyzer::new(&cfg, StructureConfig::default()).analyze();
});
