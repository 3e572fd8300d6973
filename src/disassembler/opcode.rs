//! Opcode table of the DSO virtual machine.

use strum::{EnumCount, EnumIter, FromRepr, IntoStaticStr};

/// A DSO bytecode opcode.
///
/// The discriminants are the raw opcode values found in compiled script files, so a
/// decoder turns a code word into an opcode with [`Opcode::from_repr`]. Mnemonics are
/// available through [`Into<&'static str>`].
///
/// # Examples
///
/// ```rust
/// use dsoscope::disassembler::{Opcode, OpcodeCategory};
///
/// let op = Opcode::from_repr(10).unwrap();
/// assert_eq!(op, Opcode::Jmp);
/// assert_eq!(op.category(), OpcodeCategory::Branch);
///
/// let mnemonic: &'static str = Opcode::JmpIfNot.into();
/// assert_eq!(mnemonic, "JMP_IF_NOT");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Opcode {
    /// Declares a function, optionally followed by its body
    FuncDecl = 0,
    /// Starts constructing a new object
    CreateObject,
    /// Registers the constructed object
    AddObject,
    /// Finishes an object declaration
    EndObject,
    /// Jumps if the float on top of the stack is zero
    JmpIffNot,
    /// Jumps if the integer on top of the stack is zero
    JmpIfNot,
    /// Jumps if the float on top of the stack is non-zero
    JmpIff,
    /// Jumps if the integer on top of the stack is non-zero
    JmpIf,
    /// Jumps if zero, leaving the value on the stack (`&&`)
    JmpIfNotNp,
    /// Jumps if non-zero, leaving the value on the stack (`||`)
    JmpIfNp,
    /// Unconditional jump
    Jmp,
    /// Returns from the current function
    Return,
    /// `==`
    CmpEq,
    /// `>`
    CmpGr,
    /// `>=`
    CmpGe,
    /// `<`
    CmpLt,
    /// `<=`
    CmpLe,
    /// `!=`
    CmpNe,
    /// `^`
    Xor,
    /// `%`
    Mod,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// Logical not of an integer
    Not,
    /// Logical not of a float
    NotF,
    /// `~`
    OnesComplement,
    /// `>>`
    Shr,
    /// `<<`
    Shl,
    /// `&&` on evaluated operands
    And,
    /// `||` on evaluated operands
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// Unary minus
    Neg,
    /// Selects a variable by name
    SetCurVar,
    /// Selects a variable by name, creating it
    SetCurVarCreate,
    /// Selects an array variable by the name on the string stack
    SetCurVarArray,
    /// Selects an array variable, creating it
    SetCurVarArrayCreate,
    /// Loads the current variable as an integer
    LoadVarUint,
    /// Loads the current variable as a float
    LoadVarFlt,
    /// Loads the current variable as a string
    LoadVarStr,
    /// Stores an integer into the current variable
    SaveVarUint,
    /// Stores a float into the current variable
    SaveVarFlt,
    /// Stores a string into the current variable
    SaveVarStr,
    /// Selects an object by the name on the string stack
    SetCurObject,
    /// Selects the object under construction
    SetCurObjectNew,
    /// Selects a field by name
    SetCurField,
    /// Selects an array field by the name on the string stack
    SetCurFieldArray,
    /// Loads the current field as an integer
    LoadFieldUint,
    /// Loads the current field as a float
    LoadFieldFlt,
    /// Loads the current field as a string
    LoadFieldStr,
    /// Stores an integer into the current field
    SaveFieldUint,
    /// Stores a float into the current field
    SaveFieldFlt,
    /// Stores a string into the current field
    SaveFieldStr,
    /// String to integer
    StrToUint,
    /// String to float
    StrToFlt,
    /// Discards a string
    StrToNone,
    /// Float to integer
    FltToUint,
    /// Float to string
    FltToStr,
    /// Discards a float
    FltToNone,
    /// Integer to float
    UintToFlt,
    /// Integer to string
    UintToStr,
    /// Discards an integer
    UintToNone,
    /// Loads an integer immediate
    LoadImmedUint,
    /// Loads a float table entry
    LoadImmedFlt,
    /// Loads a tagged string table entry
    TagToStr,
    /// Loads a string table entry
    LoadImmedStr,
    /// Loads an identifier table entry
    LoadImmedIdent,
    /// Calls a function resolved at run time
    CallFuncResolve,
    /// Calls a function
    CallFunc,
    /// Pushes a new string stack slot
    AdvanceStr,
    /// Pushes a slot and appends a character
    AdvanceStrAppendChar,
    /// Pushes a slot separated by a comma
    AdvanceStrComma,
    /// Pushes a slot separated by a NUL
    AdvanceStrNul,
    /// Concatenates the top two string stack slots
    RewindStr,
    /// Rewinds and terminates the string stack
    TerminateRewindStr,
    /// Compares the top two string stack slots
    CompareStr,
    /// Pushes the current string as an argument
    Push,
    /// Opens a new argument frame
    PushFrame,
    /// Debugger breakpoint
    Break,
    /// Unassigned opcode slot
    Unused,
}

/// Coarse grouping of opcodes, one group per instruction shape.
///
/// Every [`InstructionKind`](crate::disassembler::InstructionKind) variant belongs to
/// exactly one category, which is how instructions are checked against their opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum OpcodeCategory {
    /// Function declaration
    FunctionDecl,
    /// Object creation and completion
    Object,
    /// Conditional and unconditional jumps
    Branch,
    /// Function return
    Return,
    /// Two-operand arithmetic, logic and comparison
    Binary,
    /// String comparison on the string stack
    StringCompare,
    /// One-operand arithmetic and logic
    Unary,
    /// Variable selection and access
    Variable,
    /// Object and field selection and access
    Field,
    /// Stack type conversion
    Conversion,
    /// Immediate loads
    Immediate,
    /// Function and method calls
    Call,
    /// String stack manipulation
    StringStack,
    /// Argument frame handling
    Stack,
    /// Debugger break and unused slots
    Misc,
}

/// Direction of a branch.
///
/// Conditional kinds describe the condition under which the branch is *taken*; the
/// fall-through path is executed when it is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum BranchKind {
    /// Always taken, forward
    Unconditional,
    /// Taken when the condition is true
    ConditionalTrue,
    /// Taken when the condition is false
    ConditionalFalse,
    /// Always taken, targeting an address at or before the branch itself
    LoopBack,
}

impl BranchKind {
    /// Returns `true` for the kinds that have a fall-through successor.
    #[must_use]
    pub fn is_conditional(self) -> bool {
        matches!(self, BranchKind::ConditionalTrue | BranchKind::ConditionalFalse)
    }
}

impl Opcode {
    /// Returns the category this opcode belongs to.
    #[must_use]
    pub fn category(self) -> OpcodeCategory {
        use Opcode::*;

        match self {
            FuncDecl => OpcodeCategory::FunctionDecl,
            CreateObject | AddObject | EndObject => OpcodeCategory::Object,
            JmpIffNot | JmpIfNot | JmpIff | JmpIf | JmpIfNotNp | JmpIfNp | Jmp => {
                OpcodeCategory::Branch
            }
            Return => OpcodeCategory::Return,
            CmpEq | CmpGr | CmpGe | CmpLt | CmpLe | CmpNe | Xor | Mod | BitAnd | BitOr | Shr
            | Shl | And | Or | Add | Sub | Mul | Div => OpcodeCategory::Binary,
            CompareStr => OpcodeCategory::StringCompare,
            Not | NotF | OnesComplement | Neg => OpcodeCategory::Unary,
            SetCurVar | SetCurVarCreate | SetCurVarArray | SetCurVarArrayCreate | LoadVarUint
            | LoadVarFlt | LoadVarStr | SaveVarUint | SaveVarFlt | SaveVarStr => {
                OpcodeCategory::Variable
            }
            SetCurObject | SetCurObjectNew | SetCurField | SetCurFieldArray | LoadFieldUint
            | LoadFieldFlt | LoadFieldStr | SaveFieldUint | SaveFieldFlt | SaveFieldStr => {
                OpcodeCategory::Field
            }
            StrToUint | StrToFlt | StrToNone | FltToUint | FltToStr | FltToNone | UintToFlt
            | UintToStr | UintToNone => OpcodeCategory::Conversion,
            LoadImmedUint | LoadImmedFlt | TagToStr | LoadImmedStr | LoadImmedIdent => {
                OpcodeCategory::Immediate
            }
            CallFuncResolve | CallFunc => OpcodeCategory::Call,
            AdvanceStr | AdvanceStrAppendChar | AdvanceStrComma | AdvanceStrNul | RewindStr
            | TerminateRewindStr => OpcodeCategory::StringStack,
            Push | PushFrame => OpcodeCategory::Stack,
            Break | Unused => OpcodeCategory::Misc,
        }
    }

    /// Returns the branch kind of a jump opcode, or `None` for everything else.
    ///
    /// `Jmp` reports [`BranchKind::Unconditional`]; whether it is a loop-back can only be
    /// decided once the target is known.
    #[must_use]
    pub fn branch_kind(self) -> Option<BranchKind> {
        match self {
            Opcode::JmpIffNot | Opcode::JmpIfNot | Opcode::JmpIfNotNp => {
                Some(BranchKind::ConditionalFalse)
            }
            Opcode::JmpIff | Opcode::JmpIf | Opcode::JmpIfNp => Some(BranchKind::ConditionalTrue),
            Opcode::Jmp => Some(BranchKind::Unconditional),
            _ => None,
        }
    }

    /// Returns the mnemonic of this opcode.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_from_repr_round_trips_table() {
        for op in Opcode::iter() {
            assert_eq!(Opcode::from_repr(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_repr(Opcode::COUNT as u8), None);
    }

    #[test]
    fn test_table_is_dense() {
        assert_eq!(Opcode::Unused as usize, Opcode::COUNT - 1);
        assert_eq!(Opcode::from_repr(11), Some(Opcode::Return));
    }

    #[test]
    fn test_branch_kinds() {
        assert_eq!(Opcode::JmpIfNot.branch_kind(), Some(BranchKind::ConditionalFalse));
        assert_eq!(Opcode::JmpIffNot.branch_kind(), Some(BranchKind::ConditionalFalse));
        assert_eq!(Opcode::JmpIfNp.branch_kind(), Some(BranchKind::ConditionalTrue));
        assert_eq!(Opcode::Jmp.branch_kind(), Some(BranchKind::Unconditional));
        assert_eq!(Opcode::Return.branch_kind(), None);

        let jumps = Opcode::iter()
            .filter(|op| op.category() == OpcodeCategory::Branch)
            .count();
        let with_kind = Opcode::iter().filter(|op| op.branch_kind().is_some()).count();
        assert_eq!(jumps, with_kind);
    }

    #[test]
    fn test_is_conditional() {
        assert!(BranchKind::ConditionalTrue.is_conditional());
        assert!(BranchKind::ConditionalFalse.is_conditional());
        assert!(!BranchKind::Unconditional.is_conditional());
        assert!(!BranchKind::LoopBack.is_conditional());
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(Opcode::LoadImmedUint.mnemonic(), "LOAD_IMMED_UINT");
        assert_eq!(Opcode::CallFuncResolve.mnemonic(), "CALL_FUNC_RESOLVE");
    }
}
