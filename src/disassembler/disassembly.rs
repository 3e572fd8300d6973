//! Ordered instruction listing of a compiled script file.

use rustc_hash::FxHashMap;

use crate::{
    disassembler::{Instruction, InstructionKind},
    utils::graph::Address,
    Error, Result,
};

/// The linear instruction stream of one script file.
///
/// Instructions are stored in address order. Neighbour lookups ([`Disassembly::prev`],
/// [`Disassembly::next`]) answer what linked-list navigation would.
///
/// # Examples
///
/// ```rust
/// use dsoscope::disassembler::{Assembler, Disassembly};
///
/// let mut asm = Assembler::new();
/// asm.func_decl("greet", &["%name"], "greet_end")
///     .load_var("%name")
///     .ret(true)
///     .label("greet_end")
///     .ret(false);
/// let listing = Disassembly::new(asm.finish()?)?;
///
/// let functions = listing.functions()?;
/// assert_eq!(functions.len(), 1);
/// assert_eq!(functions[0].name(), "greet");
/// assert_eq!(functions[0].body().len(), 3);
/// # Ok::<(), dsoscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Disassembly {
    instructions: Vec<Instruction>,
    index: FxHashMap<Address, usize>,
}

impl Disassembly {
    /// Wraps an instruction list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the addresses are not strictly increasing.
    pub fn new(instructions: Vec<Instruction>) -> Result<Self> {
        for pair in instructions.windows(2) {
            if pair[1].addr() <= pair[0].addr() {
                return Err(malformed_error!(
                    "Instruction address {} does not follow {}",
                    pair[1].addr(),
                    pair[0].addr()
                ));
            }
        }

        let index = instructions
            .iter()
            .enumerate()
            .map(|(i, insn)| (insn.addr(), i))
            .collect();

        Ok(Disassembly {
            instructions,
            index,
        })
    }

    /// Returns the instruction at `addr`.
    #[must_use]
    pub fn get(&self, addr: Address) -> Option<&Instruction> {
        self.index.get(&addr).map(|&i| &self.instructions[i])
    }

    /// Returns the instruction before the one at `addr`.
    #[must_use]
    pub fn prev(&self, addr: Address) -> Option<&Instruction> {
        let i = *self.index.get(&addr)?;
        i.checked_sub(1).map(|i| &self.instructions[i])
    }

    /// Returns the instruction after the one at `addr`.
    #[must_use]
    pub fn next(&self, addr: Address) -> Option<&Instruction> {
        let i = *self.index.get(&addr)?;
        self.instructions.get(i + 1)
    }

    /// Returns an iterator over all instructions in address order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Returns all instructions as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the listing holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Splits out the body of every function declaration that has one.
    ///
    /// A body is the run of instructions after the declaration up to, but excluding,
    /// the declaration's end address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if an end address precedes its declaration.
    pub fn functions(&self) -> Result<Vec<FunctionBody<'_>>> {
        let mut functions = Vec::new();

        for (i, decl) in self.instructions.iter().enumerate() {
            let InstructionKind::FuncDecl {
                has_body: true,
                end_addr,
                ..
            } = decl.kind()
            else {
                continue;
            };

            if *end_addr <= decl.addr() {
                return Err(malformed_error!(
                    "Function at {} ends at {}, before its declaration",
                    decl.addr(),
                    end_addr
                ));
            }

            let start = i + 1;
            let end = self.instructions[start..]
                .iter()
                .position(|insn| insn.addr() >= *end_addr)
                .map_or(self.instructions.len(), |offset| start + offset);

            functions.push(FunctionBody {
                decl,
                body: &self.instructions[start..end],
            });
        }

        Ok(functions)
    }
}

impl<'a> IntoIterator for &'a Disassembly {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A function declaration together with its body.
#[derive(Debug, Clone, Copy)]
pub struct FunctionBody<'a> {
    decl: &'a Instruction,
    body: &'a [Instruction],
}

impl<'a> FunctionBody<'a> {
    /// Returns the declaring instruction.
    #[must_use]
    pub fn decl(&self) -> &'a Instruction {
        self.decl
    }

    /// Returns the instructions of the body.
    #[must_use]
    pub fn body(&self) -> &'a [Instruction] {
        self.body
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self.decl.kind() {
            InstructionKind::FuncDecl { name, .. } => name,
            _ => "",
        }
    }

    /// Returns the namespace the function is declared in.
    #[must_use]
    pub fn namespace(&self) -> Option<&'a str> {
        match self.decl.kind() {
            InstructionKind::FuncDecl { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the qualified name, `Namespace::name` when a namespace is present.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{ns}::{}", self.name()),
            None => self.name().to_string(),
        }
    }
}

impl TryFrom<Vec<Instruction>> for Disassembly {
    type Error = Error;

    fn try_from(instructions: Vec<Instruction>) -> Result<Self> {
        Disassembly::new(instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembler::{Assembler, Opcode};

    fn listing() -> Disassembly {
        let mut asm = Assembler::new();
        asm.func_decl("first", &[], "first_end")
            .ret(false)
            .label("first_end")
            .func_decl("decl_only", &[], "")
            .func_decl("second", &["%x"], "second_end")
            .load_var("%x")
            .ret(true)
            .label("second_end")
            .load_immed(0);
        Disassembly::new(asm.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_rejects_unordered_addresses() {
        let mut instructions = listing().as_slice().to_vec();
        instructions.swap(0, 1);
        assert!(matches!(
            Disassembly::new(instructions),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_neighbours() {
        let listing = listing();
        let first = listing.as_slice()[0].addr();
        let second = listing.as_slice()[1].addr();

        assert_eq!(listing.prev(first), None);
        assert_eq!(listing.next(first).map(Instruction::addr), Some(second));
        assert_eq!(listing.prev(second).map(Instruction::addr), Some(first));
        assert_eq!(listing.get(Address::new(9999)), None);

        let last = listing.as_slice()[listing.len() - 1].addr();
        assert_eq!(listing.next(last), None);
    }

    #[test]
    fn test_functions() {
        let listing = listing();
        let functions = listing.functions().unwrap();

        let names: Vec<&str> = functions.iter().map(FunctionBody::name).collect();
        assert_eq!(names, vec!["first", "second"]);

        assert_eq!(functions[0].body().len(), 1);
        assert!(functions[0].body()[0].is_return());

        let second = functions[1].body();
        assert_eq!(second.len(), 3);
        assert_eq!(second[2].opcode(), Opcode::Return);
    }

    #[test]
    fn test_iteration() {
        let listing = listing();
        assert_eq!((&listing).into_iter().count(), listing.len());
        assert!(!listing.is_empty());
    }
}
