//! Renders an [`Assembly`] as NASM source for x86-64 Linux.
//!
//! The evaluation stack maps directly onto the native stack, 8 bytes per value. Slots are
//! addressed relative to `rsp`, which requires knowing the stack size at every instruction. The
//! code generator keeps both branches of every `if` balanced, so walking the instructions in
//! order and applying their stack effects gives the stack size at each point.

use std::fmt::Write;

use crate::{
    assembly::Assembly,
    instruction::{Instruction, Slot},
};

const WORD_SIZE: usize = 8;
const SYS_EXIT: i64 = 60;

/// Displays an [`Assembly`] as NASM source.
pub struct Nasm<'a> {
    assembly: &'a Assembly,
}

impl<'a> Nasm<'a> {
    pub fn new(assembly: &'a Assembly) -> Nasm<'a> {
        Nasm { assembly }
    }
}

/// The byte offset of `slot` from `rsp` when the stack holds `stack_size` values.
fn rsp_offset(stack_size: usize, slot: Slot) -> Result<usize, std::fmt::Error> {
    let below_top = stack_size.checked_sub(slot.0 + 1).ok_or(std::fmt::Error)?;
    Ok(below_top * WORD_SIZE)
}

fn write_instruction(
    f: &mut impl Write,
    instruction: Instruction,
    stack_size: usize,
) -> std::fmt::Result {
    match instruction {
        Instruction::Push(n) => {
            writeln!(f, "    mov rax, {n}")?;
            writeln!(f, "    push rax")
        }
        Instruction::Load(slot) => writeln!(
            f,
            "    push QWORD [rsp + {}]",
            rsp_offset(stack_size, slot)?
        ),
        Instruction::Store(slot) => {
            writeln!(f, "    pop rax")?;
            writeln!(
                f,
                "    mov [rsp + {}], rax",
                rsp_offset(stack_size.checked_sub(1).ok_or(std::fmt::Error)?, slot)?
            )
        }
        Instruction::Pop(n) => writeln!(f, "    add rsp, {}", n * WORD_SIZE),
        Instruction::Add | Instruction::Sub | Instruction::Mul | Instruction::Div => {
            writeln!(f, "    pop rbx")?;
            writeln!(f, "    pop rax")?;
            match instruction {
                Instruction::Add => writeln!(f, "    add rax, rbx")?,
                Instruction::Sub => writeln!(f, "    sub rax, rbx")?,
                Instruction::Mul => writeln!(f, "    imul rax, rbx")?,
                _ => {
                    writeln!(f, "    cqo")?;
                    writeln!(f, "    idiv rbx")?;
                }
            }
            writeln!(f, "    push rax")
        }
        Instruction::JumpIfZero(label) => {
            writeln!(f, "    pop rax")?;
            writeln!(f, "    test rax, rax")?;
            writeln!(f, "    jz {label}")
        }
        Instruction::Jump(label) => writeln!(f, "    jmp {label}"),
        Instruction::Label(label) => writeln!(f, "{label}:"),
        Instruction::Exit => {
            writeln!(f, "    mov rax, {SYS_EXIT}")?;
            writeln!(f, "    pop rdi")?;
            writeln!(f, "    syscall")
        }
    }
}

impl std::fmt::Display for Nasm<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "global _start")?;
        writeln!(f, "_start:")?;
        let mut stack_size = 0usize;
        for instruction in self.assembly.instructions() {
            write_instruction(f, *instruction, stack_size)?;
            stack_size = stack_size
                .checked_add_signed(instruction.stack_effect())
                .ok_or(std::fmt::Error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Label;

    fn render(instructions: Vec<Instruction>) -> String {
        Assembly::new(instructions).unwrap().nasm().to_string()
    }

    #[test]
    fn exit_uses_exit_syscall() {
        assert_eq!(
            render(vec![Instruction::Push(3), Instruction::Exit]),
            "global _start
_start:
    mov rax, 3
    push rax
    mov rax, 60
    pop rdi
    syscall
"
        );
    }

    #[test]
    fn slots_are_addressed_from_the_top_of_the_stack() {
        let nasm = render(vec![
            Instruction::Push(1),
            Instruction::Push(2),
            Instruction::Load(Slot(0)),
            Instruction::Store(Slot(1)),
            Instruction::Pop(2),
        ]);
        assert!(nasm.contains("    push QWORD [rsp + 8]\n"));
        assert!(nasm.contains("    pop rax\n    mov [rsp + 0], rax\n"));
        assert!(nasm.ends_with("    add rsp, 16\n"));
    }

    #[test]
    fn division_is_signed() {
        let nasm = render(vec![
            Instruction::Push(6),
            Instruction::Push(3),
            Instruction::Div,
        ]);
        assert!(nasm.ends_with("    pop rbx\n    pop rax\n    cqo\n    idiv rbx\n    push rax\n"));
    }

    #[test]
    fn jumps_reference_labels() {
        let nasm = render(vec![
            Instruction::Push(0),
            Instruction::JumpIfZero(Label(0)),
            Instruction::Jump(Label(1)),
            Instruction::Label(Label(0)),
            Instruction::Label(Label(1)),
        ]);
        assert!(nasm.contains("    test rax, rax\n    jz label0\n    jmp label1\nlabel0:\nlabel1:\n"));
    }
}
