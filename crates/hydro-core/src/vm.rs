use tracing::{debug, trace};

use crate::{
    assembly::Assembly,
    compiler::compile_source,
    error::{VmError, VmResult},
    instruction::{Instruction, Label, Slot},
};

#[derive(Debug, Default)]
/// The reference stack machine.
///
/// Executes an [`Assembly`] with the same semantics as the NASM output. Values are 64-bit integers
/// and `+`, `-` and `*` wrap. Division faults where `idiv` traps: on a zero divisor and on
/// `i64::MIN / -1`.
pub struct Vm {
    stack: Vec<i64>,
    pc: usize,
}

impl Vm {
    /// Compiles and runs `source`, returning its exit code.
    pub fn eval_str(&mut self, source: &str) -> VmResult<i64> {
        let assembly = compile_source(source)?;
        self.run(&assembly)
    }

    /// Runs `assembly` from the first instruction until it exits. Returns the exit code.
    pub fn run(&mut self, assembly: &Assembly) -> VmResult<i64> {
        self.stack.clear();
        self.pc = 0;
        loop {
            if let Some(code) = self.run_next(assembly)? {
                debug!(code, "program exited");
                return Ok(code);
            }
        }
    }

    /// Returns `true` if the last run of `assembly` exited through its final instruction.
    pub fn exited_at_end(&self, assembly: &Assembly) -> bool {
        self.pc == assembly.instructions().len()
    }

    /// Executes the instruction at the program counter. Returns the exit code if the instruction
    /// terminated the program.
    fn run_next(&mut self, assembly: &Assembly) -> VmResult<Option<i64>> {
        let pc = self.pc;
        let instruction = *assembly
            .instructions()
            .get(pc)
            .ok_or(VmError::MissingExit)?;
        trace!(pc, %instruction, stack = ?self.stack, "step");
        self.pc = pc + 1;
        match instruction {
            Instruction::Push(n) => self.stack.push(n),
            Instruction::Load(slot) => {
                let v = *self.slot_mut(slot)?;
                self.stack.push(v);
            }
            Instruction::Store(slot) => {
                let v = self.pop()?;
                *self.slot_mut(slot)? = v;
            }
            Instruction::Pop(n) => {
                let len = self
                    .stack
                    .len()
                    .checked_sub(n)
                    .ok_or(VmError::StackUnderflow { pc })?;
                self.stack.truncate(len);
            }
            Instruction::Add => self.execute_binary(|a, b| Ok(a.wrapping_add(b)))?,
            Instruction::Sub => self.execute_binary(|a, b| Ok(a.wrapping_sub(b)))?,
            Instruction::Mul => self.execute_binary(|a, b| Ok(a.wrapping_mul(b)))?,
            Instruction::Div => self.execute_binary(|a, b| {
                if b == 0 {
                    return Err(VmError::DivisionByZero { pc });
                }
                a.checked_div(b).ok_or(VmError::DivisionOverflow { pc })
            })?,
            Instruction::JumpIfZero(label) => {
                if self.pop()? == 0 {
                    self.execute_jump(assembly, label)?;
                }
            }
            Instruction::Jump(label) => self.execute_jump(assembly, label)?,
            Instruction::Label(_) => {}
            Instruction::Exit => return self.pop().map(Some),
        }
        Ok(None)
    }

    fn pop(&mut self) -> VmResult<i64> {
        self.stack
            .pop()
            .ok_or(VmError::StackUnderflow { pc: self.current_pc() })
    }

    fn slot_mut(&mut self, slot: Slot) -> VmResult<&mut i64> {
        let stack_size = self.stack.len();
        let pc = self.current_pc();
        self.stack.get_mut(slot.0).ok_or(VmError::SlotOutOfBounds {
            slot,
            stack_size,
            pc,
        })
    }

    /// Pops the right then left operand and pushes `f(lhs, rhs)`.
    fn execute_binary(&mut self, f: impl Fn(i64, i64) -> VmResult<i64>) -> VmResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.stack.push(f(lhs, rhs)?);
        Ok(())
    }

    fn execute_jump(&mut self, assembly: &Assembly, label: Label) -> VmResult<()> {
        self.pc = assembly
            .target(label)
            .ok_or(VmError::UnresolvedLabel(label))?;
        trace!(%label, pc = self.pc, "jump");
        Ok(())
    }

    /// The index of the instruction being executed.
    fn current_pc(&self) -> usize {
        self.pc.saturating_sub(1)
    }
}
