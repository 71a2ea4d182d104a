use std::collections::HashMap;

use crate::{
    compiler::codegen::CodegenError,
    instruction::{Instruction, Label},
    nasm::Nasm,
};

/// A linear instruction sequence whose jump targets have been resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    instructions: Vec<Instruction>,
    labels: HashMap<Label, usize>,
}

impl Assembly {
    /// Resolves the labels of `instructions`.
    ///
    /// Fails if a label is defined twice or if a jump targets a label that is never defined.
    pub fn new(instructions: Vec<Instruction>) -> Result<Assembly, CodegenError> {
        let mut labels = HashMap::new();
        for (idx, instruction) in instructions.iter().enumerate() {
            if let Instruction::Label(label) = instruction {
                if labels.insert(*label, idx).is_some() {
                    return Err(CodegenError::DuplicateLabel(*label));
                }
            }
        }
        if let Some(label) = instructions
            .iter()
            .filter_map(|i| i.jump_target())
            .find(|label| !labels.contains_key(label))
        {
            return Err(CodegenError::UnresolvedLabel(label));
        }
        Ok(Assembly {
            instructions,
            labels,
        })
    }

    /// The instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the index of the instruction that defines `label`.
    pub fn target(&self, label: Label) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    /// The labels defined by the program and their positions, ordered by position.
    pub fn labels(&self) -> Vec<(Label, usize)> {
        let mut labels: Vec<_> = self.labels.iter().map(|(l, idx)| (*l, *idx)).collect();
        labels.sort_by_key(|(_, idx)| *idx);
        labels
    }

    /// Returns a value that renders the assembly as NASM x86-64 source.
    pub fn nasm(&self) -> Nasm<'_> {
        Nasm::new(self)
    }
}

impl std::fmt::Display for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for instruction in self.instructions.iter() {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
