//! Label-based builder for instruction streams.
//!
//! The byte-level decoder is not part of this crate, so instruction streams are built
//! from code: by a caller's own decoder, or with [`Assembler`] in tests and examples.
//! Addresses advance by one code word per opcode plus one per operand, like in a compiled
//! file.

use rustc_hash::FxHashMap;

use crate::{
    disassembler::{
        AdvanceStringKind, BranchKind, CallType, Instruction, InstructionKind, Opcode,
    },
    utils::graph::Address,
    Error, Result,
};

enum Fixup {
    Target(String),
    FunctionEnd(String),
}

struct Pending {
    opcode: Opcode,
    addr: Address,
    kind: InstructionKind,
    fixup: Option<Fixup>,
}

/// Builds an instruction list with symbolic jump targets.
///
/// Labels name the address of the next emitted instruction and may be used before they
/// are defined. Errors are collected and reported by [`Assembler::finish`].
///
/// # Examples
///
/// ```rust
/// use dsoscope::disassembler::{Assembler, BranchKind};
///
/// // while (%i) { %i = 0; }
/// let mut asm = Assembler::new();
/// asm.label("head")
///     .load_var("%i")
///     .jmp_if_not("exit")
///     .load_immed(0)
///     .save_var("%i")
///     .jmp("head")
///     .label("exit")
///     .ret(false);
///
/// let instructions = asm.finish()?;
/// let back = instructions.iter().find(|i| i.branch_kind() == Some(BranchKind::LoopBack));
/// assert_eq!(back.and_then(|i| i.branch_target()), Some(instructions[0].addr()));
/// # Ok::<(), dsoscope::Error>(())
/// ```
pub struct Assembler {
    pending: Vec<Pending>,
    labels: FxHashMap<String, Address>,
    next_addr: u32,
    error: Option<Error>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// Creates an assembler that starts at address 0.
    #[must_use]
    pub fn new() -> Self {
        Self::at(0)
    }

    /// Creates an assembler that starts at `addr`.
    #[must_use]
    pub fn at(addr: u32) -> Self {
        Assembler {
            pending: Vec::new(),
            labels: FxHashMap::default(),
            next_addr: addr,
            error: None,
        }
    }

    /// Returns the address the next instruction will get.
    #[must_use]
    pub fn current_addr(&self) -> Address {
        Address::new(self.next_addr)
    }

    /// Defines `name` as the address of the next instruction.
    pub fn label(&mut self, name: &str) -> &mut Self {
        let addr = self.current_addr();
        if self.labels.insert(name.to_string(), addr).is_some() {
            self.fail(malformed_error!("Label '{}' defined twice", name));
        }
        self
    }

    /// Emits an instruction with explicit operands.
    pub fn emit(&mut self, opcode: Opcode, kind: InstructionKind) -> &mut Self {
        self.push(opcode, kind, None)
    }

    /// Emits a jump with the given opcode to `label`.
    pub fn branch(&mut self, opcode: Opcode, label: &str) -> &mut Self {
        let Some(kind) = opcode.branch_kind() else {
            self.fail(malformed_error!("{} is not a jump", opcode.mnemonic()));
            return self;
        };

        self.push(
            opcode,
            InstructionKind::Branch {
                target: Address::default(),
                kind,
            },
            Some(Fixup::Target(label.to_string())),
        )
    }

    /// Emits an unconditional jump.
    pub fn jmp(&mut self, label: &str) -> &mut Self {
        self.branch(Opcode::Jmp, label)
    }

    /// Emits a jump taken when the integer on the stack is non-zero.
    pub fn jmp_if(&mut self, label: &str) -> &mut Self {
        self.branch(Opcode::JmpIf, label)
    }

    /// Emits a jump taken when the integer on the stack is zero.
    pub fn jmp_if_not(&mut self, label: &str) -> &mut Self {
        self.branch(Opcode::JmpIfNot, label)
    }

    /// Emits a return.
    pub fn ret(&mut self, returns_value: bool) -> &mut Self {
        self.emit(Opcode::Return, InstructionKind::Return { returns_value })
    }

    /// Emits an integer immediate load.
    pub fn load_immed(&mut self, value: u32) -> &mut Self {
        self.emit(Opcode::LoadImmedUint, InstructionKind::LoadImmed { value })
    }

    /// Emits a variable selection followed by a string load.
    pub fn load_var(&mut self, name: &str) -> &mut Self {
        self.emit(
            Opcode::SetCurVar,
            InstructionKind::SetCurVar {
                name: name.to_string(),
            },
        )
        .emit(Opcode::LoadVarStr, InstructionKind::LoadVar)
    }

    /// Emits a variable selection followed by a string store.
    pub fn save_var(&mut self, name: &str) -> &mut Self {
        self.emit(
            Opcode::SetCurVar,
            InstructionKind::SetCurVar {
                name: name.to_string(),
            },
        )
        .emit(Opcode::SaveVarStr, InstructionKind::SaveVar)
    }

    /// Emits a binary operation.
    pub fn binary(&mut self, opcode: Opcode) -> &mut Self {
        self.emit(opcode, InstructionKind::Binary)
    }

    /// Emits a string comparison.
    pub fn compare_str(&mut self) -> &mut Self {
        self.emit(Opcode::CompareStr, InstructionKind::StringCompare)
    }

    /// Opens an argument frame.
    pub fn push_frame(&mut self) -> &mut Self {
        self.emit(Opcode::PushFrame, InstructionKind::PushFrame)
    }

    /// Pushes the current string as an argument.
    pub fn push_arg(&mut self) -> &mut Self {
        self.emit(Opcode::Push, InstructionKind::Push)
    }

    /// Appends a NUL-separated slot to the string stack.
    pub fn advance_str_nul(&mut self) -> &mut Self {
        self.emit(
            Opcode::AdvanceStrNul,
            InstructionKind::AdvanceString {
                kind: AdvanceStringKind::Null,
                ch: None,
            },
        )
    }

    /// Emits a function call.
    pub fn call(&mut self, name: &str, namespace: Option<&str>, call_type: CallType) -> &mut Self {
        self.emit(
            Opcode::CallFunc,
            InstructionKind::FuncCall {
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                call_type,
            },
        )
    }

    /// Emits a function declaration whose body ends at `end_label`.
    ///
    /// An empty `end_label` declares a function without a body.
    pub fn func_decl(&mut self, name: &str, arguments: &[&str], end_label: &str) -> &mut Self {
        self.push(
            Opcode::FuncDecl,
            InstructionKind::FuncDecl {
                name: name.to_string(),
                namespace: None,
                package: None,
                has_body: !end_label.is_empty(),
                end_addr: Address::default(),
                arguments: arguments.iter().map(|arg| (*arg).to_string()).collect(),
            },
            Some(Fixup::FunctionEnd(end_label.to_string())),
        )
    }

    /// Resolves all labels and returns the instruction list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for undefined or duplicate labels and for operand
    /// shapes that do not belong to their opcode.
    pub fn finish(self) -> Result<Vec<Instruction>> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut instructions = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let Pending {
                opcode,
                addr,
                mut kind,
                fixup,
            } = pending;
            let next = Address::new(addr.value() + 1 + operand_words(&kind));

            match (fixup, &mut kind) {
                (Some(Fixup::Target(label)), InstructionKind::Branch { target, kind }) => {
                    *target = resolve(&self.labels, &label)?;
                    if opcode == Opcode::Jmp && *target <= addr {
                        *kind = BranchKind::LoopBack;
                    }
                }
                (Some(Fixup::FunctionEnd(label)), InstructionKind::FuncDecl { end_addr, .. }) => {
                    *end_addr = if label.is_empty() {
                        next
                    } else {
                        resolve(&self.labels, &label)?
                    };
                }
                _ => {}
            }

            instructions.push(Instruction::new(opcode, addr, kind)?);
        }

        Ok(instructions)
    }

    fn push(&mut self, opcode: Opcode, kind: InstructionKind, fixup: Option<Fixup>) -> &mut Self {
        let addr = self.current_addr();
        self.next_addr += 1 + operand_words(&kind);
        self.pending.push(Pending {
            opcode,
            addr,
            kind,
            fixup,
        });
        self
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn resolve(labels: &FxHashMap<String, Address>, label: &str) -> Result<Address> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| malformed_error!("Undefined label '{}'", label))
}

/// Number of operand words that follow the opcode word in a compiled file.
fn operand_words(kind: &InstructionKind) -> u32 {
    match kind {
        InstructionKind::FuncDecl { arguments, .. } => {
            6 + u32::try_from(arguments.len()).unwrap_or(u32::MAX - 6)
        }
        InstructionKind::CreateObject { .. } | InstructionKind::FuncCall { .. } => 3,
        InstructionKind::AddObject { .. }
        | InstructionKind::EndObject { .. }
        | InstructionKind::Branch { .. }
        | InstructionKind::SetCurVar { .. }
        | InstructionKind::SetCurField { .. }
        | InstructionKind::LoadImmed { .. } => 1,
        InstructionKind::AdvanceString { ch: Some(_), .. } => 1,
        _ => 0,
    }
}
