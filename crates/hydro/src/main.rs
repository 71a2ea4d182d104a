use std::{path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, ValueEnum};
use hydro_core::{compile_source, vm::Vm};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod link;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The hydrogen source file. Starts a REPL when omitted.
    pub input: Option<PathBuf>,
    /// Where to write the generated code.
    #[arg(short, long, default_value = "out.asm")]
    pub output: PathBuf,
    #[arg(value_enum, long, default_value_t = Emit::Asm)]
    pub emit: Emit,
    /// Run the program on the reference VM and exit with its code.
    #[arg(long)]
    pub run: bool,
    /// Assemble and link the output with nasm and ld.
    #[arg(long)]
    pub link: bool,
    /// Raise the log level. May be repeated.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Default, Debug, ValueEnum)]
pub enum Emit {
    /// NASM x86-64 source.
    #[default]
    Asm,
    /// The instruction listing.
    Instructions,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);
    debug!(?args, "parsed arguments");
    let Some(input) = &args.input else {
        hydro_repl::Repl::default().run()?;
        return Ok(ExitCode::SUCCESS);
    };
    if args.link && args.emit != Emit::Asm {
        return Err("--link requires --emit asm".into());
    }

    let source = std::fs::read_to_string(input)?;
    let assembly = match compile_source(&source) {
        Ok(assembly) => assembly,
        Err(err) => {
            eprintln!("{}", err.with_context(&source));
            return Ok(ExitCode::FAILURE);
        }
    };

    let text = match args.emit {
        Emit::Asm => assembly.nasm().to_string(),
        Emit::Instructions => assembly.to_string(),
    };
    std::fs::write(&args.output, text)?;
    info!(output = %args.output.display(), "wrote output");

    if args.link {
        link::assemble_and_link(&args.output)?;
    }
    if args.run {
        let code = match Vm::default().run(&assembly) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{}", err.with_context(&source));
                return Ok(ExitCode::FAILURE);
            }
        };
        info!(code, "program exited");
        // Truncated like the exit status of a native process.
        return Ok(ExitCode::from(code as u8));
    }
    Ok(ExitCode::SUCCESS)
}
