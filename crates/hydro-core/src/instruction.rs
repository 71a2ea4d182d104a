/// A position on the evaluation stack, counted from the bottom of the stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub usize);

/// A jump target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "label{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Represents a single instruction of the target stack machine.
pub enum Instruction {
    /// Pushes an immediate value onto the stack.
    Push(i64),
    /// Pushes a copy of the value in a slot.
    Load(Slot),
    /// Pops the top value and writes it into a slot.
    Store(Slot),
    /// Discards the top `n` values.
    Pop(usize),
    /// Pops `rhs` then `lhs` and pushes `lhs + rhs`.
    Add,
    /// Pops `rhs` then `lhs` and pushes `lhs - rhs`.
    Sub,
    /// Pops `rhs` then `lhs` and pushes `lhs * rhs`.
    Mul,
    /// Pops `rhs` then `lhs` and pushes `lhs / rhs`, truncated toward zero.
    Div,
    /// Pops the top value and jumps to the label if it is zero.
    JumpIfZero(Label),
    /// Jumps to the label.
    Jump(Label),
    /// Marks a jump target.
    Label(Label),
    /// Pops the top value and terminates the program with it as the exit code.
    Exit,
}

impl Instruction {
    /// The change in stack size caused by executing the instruction.
    pub fn stack_effect(self) -> isize {
        match self {
            Instruction::Push(_) | Instruction::Load(_) => 1,
            Instruction::Pop(n) => -(n as isize),
            Instruction::Store(_)
            | Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::JumpIfZero(_)
            | Instruction::Exit => -1,
            Instruction::Jump(_) | Instruction::Label(_) => 0,
        }
    }

    /// The label the instruction may jump to.
    pub fn jump_target(self) -> Option<Label> {
        match self {
            Instruction::JumpIfZero(label) | Instruction::Jump(label) => Some(label),
            _ => None,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Push(n) => write!(f, "    push {n}"),
            Instruction::Load(slot) => write!(f, "    load {}", slot.0),
            Instruction::Store(slot) => write!(f, "    store {}", slot.0),
            Instruction::Pop(n) => write!(f, "    pop {n}"),
            Instruction::Add => f.write_str("    add"),
            Instruction::Sub => f.write_str("    sub"),
            Instruction::Mul => f.write_str("    mul"),
            Instruction::Div => f.write_str("    div"),
            Instruction::JumpIfZero(label) => write!(f, "    jz {label}"),
            Instruction::Jump(label) => write!(f, "    jmp {label}"),
            Instruction::Label(label) => write!(f, "{label}:"),
            Instruction::Exit => f.write_str("    exit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_effects() {
        assert_eq!(Instruction::Push(3).stack_effect(), 1);
        assert_eq!(Instruction::Pop(3).stack_effect(), -3);
        assert_eq!(Instruction::Div.stack_effect(), -1);
        assert_eq!(Instruction::Label(Label(0)).stack_effect(), 0);
    }

    #[test]
    fn instructions_display_as_text() {
        assert_eq!(Instruction::Load(Slot(2)).to_string(), "    load 2");
        assert_eq!(Instruction::JumpIfZero(Label(4)).to_string(), "    jz label4");
        assert_eq!(Instruction::Label(Label(4)).to_string(), "label4:");
    }
}
