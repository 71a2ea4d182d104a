use hydro_core::{compile_source, error::VmResult, vm::Vm};
use rustyline::error::ReadlineError;
use tracing::warn;

/// REPL for hydrogen.
///
/// Each accepted input is appended to the session source and the whole session is run again.
/// Inputs that end the program through an explicit `exit` are reported but not kept, so later
/// inputs still run.
pub struct Repl {
    /// The backing Vm.
    vm: Vm,
    /// Source of the inputs that have been accepted so far.
    session: String,
    /// The number of inputs that have been evaluated.
    expressions_count: usize,
}

impl Default for Repl {
    fn default() -> Repl {
        Repl::new(Vm::default())
    }
}

impl Repl {
    /// Creates a new REPL.
    pub fn new(vm: Vm) -> Repl {
        Repl {
            vm,
            session: String::new(),
            expressions_count: 0,
        }
    }

    /// The source accepted so far.
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn run(&mut self) -> Result<(), ReadlineError> {
        let mut rl = rustyline::DefaultEditor::new()?;
        let mut input_buffer = String::new();
        loop {
            let prompt = if input_buffer.is_empty() { ">> " } else { ".. " };
            match rl.readline(prompt) {
                Ok(input) => {
                    input_buffer.push_str(&input);
                    input_buffer.push('\n');
                    if self.needs_more_input(&input_buffer) {
                        continue;
                    }
                    let code = std::mem::take(&mut input_buffer);
                    if let Err(err) = rl.add_history_entry(code.trim_end()) {
                        warn!(%err, "failed to add input to history");
                    }
                    match self.execute_code(&code) {
                        Ok(out) => println!("{out}"),
                        Err(err) => {
                            let source = format!("{}{code}", self.session);
                            println!("Error: {}", err.with_context(&source));
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `input` is an incomplete statement, like an unclosed scope.
    fn needs_more_input(&self, input: &str) -> bool {
        let source = format!("{}{input}", self.session);
        matches!(compile_source(&source), Err(err) if err.is_end_of_input())
    }

    fn execute_code(&mut self, input: &str) -> VmResult<String> {
        let source = format!("{}{input}", self.session);
        let assembly = compile_source(&source)?;
        let code = self.vm.run(&assembly)?;
        if self.vm.exited_at_end(&assembly) {
            self.session = source;
        }
        let res = format!("${n} => {code}", n = self.expressions_count);
        self.expressions_count += 1;
        Ok(res)
    }
}
