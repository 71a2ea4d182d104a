/// Label-resolved instruction sequences.
pub mod assembly;
/// Compiler.
pub mod compiler;
/// Errors
pub mod error;
/// Instructions.
pub mod instruction;
pub mod nasm;
/// Reference virtual machine.
pub mod vm;

pub use assembly::Assembly;
pub use compiler::compile_source;
