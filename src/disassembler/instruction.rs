//! Decoded DSO instructions.
//!
//! An [`Instruction`] pairs an [`Opcode`] and its address with an [`InstructionKind`]
//! carrying the decoded operands. Instructions are created once and never modified;
//! basic blocks and regions borrow contiguous runs of them.

use std::fmt;

use strum::{FromRepr, IntoStaticStr};

use crate::{
    disassembler::{BranchKind, Opcode, OpcodeCategory},
    utils::graph::Address,
    Result,
};

/// How a function call is dispatched.
///
/// Decoded from the raw call-type operand; values outside the known range become
/// [`CallType::Invalid`] instead of failing, so a damaged operand only degrades the call
/// it belongs to.
///
/// # Examples
///
/// ```rust
/// use dsoscope::disassembler::CallType;
///
/// assert_eq!(CallType::from(1), CallType::MethodCall);
/// assert_eq!(CallType::from(77), CallType::Invalid);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum CallType {
    /// Plain function call: `func()` or `ns::func()`
    FunctionCall = 0,
    /// Method call on the first argument: `obj.func()`
    MethodCall = 1,
    /// Call to the parent namespace implementation: `Parent::func()`
    ParentCall = 2,
    /// Unknown call type
    Invalid = 3,
}

impl From<u32> for CallType {
    fn from(value: u32) -> Self {
        CallType::from_repr(value).unwrap_or(CallType::Invalid)
    }
}

/// Target type of a stack conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum ConvertType {
    /// Convert to an unsigned integer
    Uint,
    /// Convert to a float
    Float,
    /// Convert to a string
    String,
    /// Discard the value
    None,
}

/// Separator a string stack advance appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum AdvanceStringKind {
    /// No separator
    Default,
    /// Appends the character operand
    AppendChar,
    /// Appends a comma (array indices)
    Comma,
    /// Appends a NUL (argument lists)
    Null,
}

/// Operands of a decoded instruction, one variant per instruction shape.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
pub enum InstructionKind {
    /// Function declaration
    FuncDecl {
        /// Function name
        name: String,
        /// Namespace the function is declared in
        namespace: Option<String>,
        /// Package the function belongs to
        package: Option<String>,
        /// Whether a body follows the declaration
        has_body: bool,
        /// Address right after the body
        end_addr: Address,
        /// Argument names
        arguments: Vec<String>,
    },
    /// Object creation
    CreateObject {
        /// Name of the object to copy fields from
        parent_name: Option<String>,
        /// Whether the object is a datablock
        is_data_block: bool,
        /// Where execution continues if creation fails
        fail_jump_addr: Address,
    },
    /// Object registration
    AddObject {
        /// Whether the object is added to the root group
        place_at_root: bool,
    },
    /// End of an object declaration
    EndObject {
        /// Whether the object is kept on the stack
        value: bool,
    },
    /// Conditional or unconditional jump
    Branch {
        /// Jump target
        target: Address,
        /// When the jump is taken
        kind: BranchKind,
    },
    /// Function return
    Return {
        /// Whether a value is returned
        returns_value: bool,
    },
    /// Binary operation
    Binary,
    /// String comparison
    StringCompare,
    /// Unary operation
    Unary,
    /// Variable selection by name
    SetCurVar {
        /// Variable name, including its `$` or `%` sigil
        name: String,
    },
    /// Variable selection by computed name
    SetCurVarArray,
    /// Variable load
    LoadVar,
    /// Variable store
    SaveVar,
    /// Object selection
    SetCurObject {
        /// Whether the object under construction is selected
        is_new: bool,
    },
    /// Field selection by name
    SetCurField {
        /// Field name
        name: String,
    },
    /// Field selection by computed name
    SetCurFieldArray,
    /// Field load
    LoadField,
    /// Field store
    SaveField,
    /// Stack conversion
    ConvertToType {
        /// Conversion target
        ty: ConvertType,
    },
    /// Immediate load
    LoadImmed {
        /// Raw table index or integer value
        value: u32,
    },
    /// Function call
    FuncCall {
        /// Function name
        name: String,
        /// Namespace qualifier
        namespace: Option<String>,
        /// Dispatch kind
        call_type: CallType,
    },
    /// String stack advance
    AdvanceString {
        /// Separator kind
        kind: AdvanceStringKind,
        /// Appended character
        ch: Option<char>,
    },
    /// String stack rewind
    Rewind {
        /// Whether the string stack is terminated
        terminate: bool,
    },
    /// Argument push
    Push,
    /// Argument frame push
    PushFrame,
    /// Debugger break
    DebugBreak,
    /// Unused opcode
    Unused,
}

impl InstructionKind {
    /// Returns the opcode category this shape belongs to.
    #[must_use]
    pub fn category(&self) -> OpcodeCategory {
        match self {
            InstructionKind::FuncDecl { .. } => OpcodeCategory::FunctionDecl,
            InstructionKind::CreateObject { .. }
            | InstructionKind::AddObject { .. }
            | InstructionKind::EndObject { .. } => OpcodeCategory::Object,
            InstructionKind::Branch { .. } => OpcodeCategory::Branch,
            InstructionKind::Return { .. } => OpcodeCategory::Return,
            InstructionKind::Binary => OpcodeCategory::Binary,
            InstructionKind::StringCompare => OpcodeCategory::StringCompare,
            InstructionKind::Unary => OpcodeCategory::Unary,
            InstructionKind::SetCurVar { .. }
            | InstructionKind::SetCurVarArray
            | InstructionKind::LoadVar
            | InstructionKind::SaveVar => OpcodeCategory::Variable,
            InstructionKind::SetCurObject { .. }
            | InstructionKind::SetCurField { .. }
            | InstructionKind::SetCurFieldArray
            | InstructionKind::LoadField
            | InstructionKind::SaveField => OpcodeCategory::Field,
            InstructionKind::ConvertToType { .. } => OpcodeCategory::Conversion,
            InstructionKind::LoadImmed { .. } => OpcodeCategory::Immediate,
            InstructionKind::FuncCall { .. } => OpcodeCategory::Call,
            InstructionKind::AdvanceString { .. } | InstructionKind::Rewind { .. } => {
                OpcodeCategory::StringStack
            }
            InstructionKind::Push | InstructionKind::PushFrame => OpcodeCategory::Stack,
            InstructionKind::DebugBreak | InstructionKind::Unused => OpcodeCategory::Misc,
        }
    }

    /// Returns the variant name used in listings.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A decoded DSO instruction.
///
/// # Examples
///
/// ```rust
/// use dsoscope::disassembler::{BranchKind, Instruction, InstructionKind, Opcode};
/// use dsoscope::utils::graph::Address;
///
/// let jump = Instruction::new(
///     Opcode::JmpIfNot,
///     Address::new(4),
///     InstructionKind::Branch { target: Address::new(9), kind: BranchKind::ConditionalFalse },
/// )?;
/// assert!(jump.terminates_block());
/// assert_eq!(jump.branch_target(), Some(Address::new(9)));
/// assert_eq!(jump.to_string(), "[@4, Branch, 9, ConditionalFalse]");
/// # Ok::<(), dsoscope::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    addr: Address,
    kind: InstructionKind,
}

impl Instruction {
    /// Creates an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the operand shape does not belong to the
    /// opcode, or if a conditional opcode carries an unconditional branch kind (or the
    /// other way around).
    pub fn new(opcode: Opcode, addr: Address, kind: InstructionKind) -> Result<Self> {
        if opcode.category() != kind.category() {
            return Err(malformed_error!(
                "Opcode {} at {} cannot carry {} operands",
                opcode.mnemonic(),
                addr,
                kind.name()
            ));
        }

        if let (InstructionKind::Branch { kind: branch, .. }, Some(expected)) =
            (&kind, opcode.branch_kind())
        {
            if branch.is_conditional() != expected.is_conditional() {
                return Err(malformed_error!(
                    "Branch kind {:?} does not match {} at {}",
                    branch,
                    opcode.mnemonic(),
                    addr
                ));
            }
        }

        Ok(Instruction { opcode, addr, kind })
    }

    /// Returns the opcode.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Returns the address.
    #[must_use]
    pub fn addr(&self) -> Address {
        self.addr
    }

    /// Returns the decoded operands.
    #[must_use]
    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    /// Returns `true` for jumps.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self.kind, InstructionKind::Branch { .. })
    }

    /// Returns the jump target of a branch.
    #[must_use]
    pub fn branch_target(&self) -> Option<Address> {
        match self.kind {
            InstructionKind::Branch { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Returns the branch kind of a branch.
    #[must_use]
    pub fn branch_kind(&self) -> Option<BranchKind> {
        match self.kind {
            InstructionKind::Branch { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` for returns.
    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(self.kind, InstructionKind::Return { .. })
    }

    /// Returns `true` if the instruction ends a basic block.
    #[must_use]
    pub fn terminates_block(&self) -> bool {
        self.is_branch() || self.is_return()
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[@{}, {}", self.addr, self.kind.name())?;

        match &self.kind {
            InstructionKind::FuncDecl {
                name,
                namespace,
                package,
                has_body,
                end_addr,
                arguments,
            } => {
                write!(
                    f,
                    ", \"{name}\", \"{}\", \"{}\", {has_body}, {end_addr}",
                    opt(namespace),
                    opt(package)
                )?;
                for arg in arguments {
                    write!(f, ", {arg}")?;
                }
            }
            InstructionKind::CreateObject {
                parent_name,
                is_data_block,
                fail_jump_addr,
            } => write!(
                f,
                ", \"{}\", {is_data_block}, {fail_jump_addr}",
                opt(parent_name)
            )?,
            InstructionKind::AddObject { place_at_root } => write!(f, ", {place_at_root}")?,
            InstructionKind::EndObject { value } => write!(f, ", {value}")?,
            InstructionKind::Branch { target, kind } => write!(f, ", {target}, {kind:?}")?,
            InstructionKind::Return { returns_value } => write!(f, ", {returns_value}")?,
            InstructionKind::SetCurVar { name } | InstructionKind::SetCurField { name } => {
                write!(f, ", \"{name}\"")?;
            }
            InstructionKind::SetCurObject { is_new } => write!(f, ", {is_new}")?,
            InstructionKind::ConvertToType { ty } => write!(f, ", {ty:?}")?,
            InstructionKind::LoadImmed { value } => write!(f, ", {value}")?,
            InstructionKind::FuncCall {
                name,
                namespace,
                call_type,
            } => write!(f, ", \"{name}\", \"{}\", {call_type:?}", opt(namespace))?,
            InstructionKind::AdvanceString { kind, ch } => {
                write!(f, ", {kind:?}")?;
                if let Some(ch) = ch {
                    write!(f, ", {}", u32::from(*ch))?;
                }
            }
            InstructionKind::Rewind { terminate } => write!(f, ", {terminate}")?,
            InstructionKind::Binary
            | InstructionKind::StringCompare
            | InstructionKind::Unary
            | InstructionKind::SetCurVarArray
            | InstructionKind::LoadVar
            | InstructionKind::SaveVar
            | InstructionKind::SetCurFieldArray
            | InstructionKind::LoadField
            | InstructionKind::SaveField
            | InstructionKind::Push
            | InstructionKind::PushFrame
            | InstructionKind::DebugBreak
            | InstructionKind::Unused => {}
        }

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_call_type_from_raw() {
        assert_eq!(CallType::from(0), CallType::FunctionCall);
        assert_eq!(CallType::from(2), CallType::ParentCall);
        assert_eq!(CallType::from(3), CallType::Invalid);
        assert_eq!(CallType::from(u32::MAX), CallType::Invalid);
    }

    #[test]
    fn test_rejects_mismatched_operands() {
        let result = Instruction::new(Opcode::Return, Address::new(0), InstructionKind::Push);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_rejects_mismatched_branch_kind() {
        let result = Instruction::new(
            Opcode::Jmp,
            Address::new(0),
            InstructionKind::Branch {
                target: Address::new(4),
                kind: BranchKind::ConditionalTrue,
            },
        );
        assert!(matches!(result, Err(Error::Malformed { .. })));

        let loop_back = Instruction::new(
            Opcode::Jmp,
            Address::new(8),
            InstructionKind::Branch {
                target: Address::new(2),
                kind: BranchKind::LoopBack,
            },
        );
        assert!(loop_back.is_ok());
    }

    #[test]
    fn test_block_terminators() {
        let ret = Instruction::new(
            Opcode::Return,
            Address::new(3),
            InstructionKind::Return {
                returns_value: false,
            },
        )
        .unwrap();
        assert!(ret.is_return());
        assert!(ret.terminates_block());
        assert_eq!(ret.branch_target(), None);

        let push = Instruction::new(Opcode::Push, Address::new(4), InstructionKind::Push).unwrap();
        assert!(!push.terminates_block());
    }

    #[test]
    fn test_display() {
        let call = Instruction::new(
            Opcode::CallFunc,
            Address::new(12),
            InstructionKind::FuncCall {
                name: "echo".to_string(),
                namespace: None,
                call_type: CallType::FunctionCall,
            },
        )
        .unwrap();
        assert_eq!(call.to_string(), "[@12, FuncCall, \"echo\", \"\", FunctionCall]");

        let decl = Instruction::new(
            Opcode::FuncDecl,
            Address::new(0),
            InstructionKind::FuncDecl {
                name: "add".to_string(),
                namespace: None,
                package: None,
                has_body: true,
                end_addr: Address::new(20),
                arguments: vec!["%a".to_string(), "%b".to_string()],
            },
        )
        .unwrap();
        assert_eq!(
            decl.to_string(),
            "[@0, FuncDecl, \"add\", \"\", \"\", true, 20, %a, %b]"
        );

        let append = Instruction::new(
            Opcode::AdvanceStrAppendChar,
            Address::new(5),
            InstructionKind::AdvanceString {
                kind: AdvanceStringKind::AppendChar,
                ch: Some(' '),
            },
        )
        .unwrap();
        assert_eq!(append.to_string(), "[@5, AdvanceString, AppendChar, 32]");

        let binary = Instruction::new(Opcode::Add, Address::new(6), InstructionKind::Binary).unwrap();
        assert_eq!(binary.to_string(), "[@6, Binary]");
    }
}
