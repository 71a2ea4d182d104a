use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use compact_str::{CompactString, format_compact};
use tracing::info;

#[derive(Debug)]
/// An error from running the external assembler or linker.
pub enum LinkError {
    Spawn {
        program: CompactString,
        err: std::io::Error,
    },
    Failed {
        program: CompactString,
        stderr: CompactString,
    },
}

impl std::error::Error for LinkError {}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::Spawn { program, err } => write!(f, "failed to run {program}: {err}"),
            LinkError::Failed { program, stderr } => write!(f, "{program} failed: {stderr}"),
        }
    }
}

/// Assembles `asm` with `nasm` and links the object with `ld`. Returns the path of the
/// executable.
pub fn assemble_and_link(asm: &Path) -> Result<PathBuf, LinkError> {
    let object = asm.with_extension("o");
    let mut binary = asm.with_extension("");
    if binary == asm {
        binary = asm.with_extension("out");
    }
    run_command(
        Command::new("nasm")
            .arg("-felf64")
            .arg(asm)
            .arg("-o")
            .arg(&object),
    )?;
    run_command(Command::new("ld").arg(&object).arg("-o").arg(&binary))?;
    info!(binary = %binary.display(), "linked executable");
    Ok(binary)
}

fn run_command(cmd: &mut Command) -> Result<(), LinkError> {
    let program = CompactString::from(cmd.get_program().to_string_lossy());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let output = cmd.output().map_err(|err| LinkError::Spawn {
        program: program.clone(),
        err,
    })?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = CompactString::from_utf8_lossy(&output.stderr);
        let stderr = if stderr.trim().is_empty() {
            format_compact!("exited with {}", output.status)
        } else {
            CompactString::from(stderr.trim())
        };
        Err(LinkError::Failed { program, stderr })
    }
}
