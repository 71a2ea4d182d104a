use crate::{
    compiler::error::CompileError,
    instruction::{Label, Slot},
};

/// The result type for VM operations.
pub type VmResult<T> = Result<T, VmError>;

#[derive(Clone, Debug, PartialEq)]
/// Represents errors that can occur while compiling or executing a program on the VM.
pub enum VmError {
    Compile(CompileError),
    DivisionByZero {
        pc: usize,
    },
    /// `i64::MIN / -1`, which does not fit in 64 bits.
    DivisionOverflow {
        pc: usize,
    },
    StackUnderflow {
        pc: usize,
    },
    SlotOutOfBounds {
        slot: Slot,
        stack_size: usize,
        pc: usize,
    },
    UnresolvedLabel(Label),
    /// Execution ran past the last instruction without reaching `exit`.
    MissingExit,
}

impl VmError {
    pub fn with_context(self, source: &str) -> VmErrorWithContext<'_> {
        VmErrorWithContext { err: self, source }
    }
}

impl std::error::Error for VmError {}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::Compile(compile_error) => write!(f, "{compile_error}"),
            VmError::DivisionByZero { pc } => {
                write!(f, "division by zero at instruction {pc}")
            }
            VmError::DivisionOverflow { pc } => {
                write!(f, "division overflow at instruction {pc}")
            }
            VmError::StackUnderflow { pc } => write!(f, "stack underflow at instruction {pc}"),
            VmError::SlotOutOfBounds {
                slot,
                stack_size,
                pc,
            } => write!(
                f,
                "slot {} is out of bounds for a stack of size {stack_size} at instruction {pc}",
                slot.0
            ),
            VmError::UnresolvedLabel(label) => write!(f, "jump to unresolved {label}"),
            VmError::MissingExit => write!(f, "program ended without an exit"),
        }
    }
}

impl From<CompileError> for VmError {
    fn from(value: CompileError) -> Self {
        VmError::Compile(value)
    }
}

impl<'a> From<VmErrorWithContext<'a>> for VmError {
    fn from(value: VmErrorWithContext<'a>) -> VmError {
        value.err
    }
}

/// A [`VmError`] paired with the source that produced it.
pub struct VmErrorWithContext<'a> {
    err: VmError,
    source: &'a str,
}

impl std::fmt::Debug for VmErrorWithContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for VmErrorWithContext<'_> {}

impl std::fmt::Display for VmErrorWithContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.err {
            VmError::Compile(err) => write!(f, "{}", err.clone().with_context(self.source)),
            err => write!(f, "[Runtime Error] {err}"),
        }
    }
}
