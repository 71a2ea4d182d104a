use bumpalo::Bump;
use error::CompileError;
use tracing::debug;

use crate::assembly::Assembly;

pub mod arena;
pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod symbols;
pub mod tokenizer;

/// Compiles hydrogen source code into a label-resolved [`Assembly`].
///
/// The AST only lives for the duration of the call.
pub fn compile_source(source: &str) -> Result<Assembly, CompileError> {
    let tokens = tokenizer::tokenize(source)?;
    debug!(tokens = tokens.len(), "tokenized source");
    let bump = Bump::new();
    let program = parser::parse(&tokens, &bump)?;
    let assembly = codegen::generate(&program)?;
    debug!(
        instructions = assembly.instructions().len(),
        "compiled source"
    );
    Ok(assembly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn compile_source_produces_assembly() {
        assert_eq!(
            compile_source("exit(7);").unwrap().instructions(),
            &[
                Instruction::Push(7),
                Instruction::Exit,
                Instruction::Push(0),
                Instruction::Exit
            ]
        );
    }

    #[test]
    fn compile_source_reports_each_stage() {
        assert!(matches!(
            compile_source("exit(1) $"),
            Err(CompileError::Lex(_))
        ));
        assert!(matches!(compile_source("exit(1)"), Err(CompileError::Parse(_))));
        assert!(matches!(
            compile_source("exit(y);"),
            Err(CompileError::Codegen(_))
        ));
    }

    #[test]
    fn empty_source_exits_with_zero() {
        assert_eq!(
            compile_source("").unwrap().instructions(),
            &[Instruction::Push(0), Instruction::Exit]
        );
    }
}
