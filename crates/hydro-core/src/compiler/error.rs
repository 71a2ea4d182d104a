use super::{codegen::CodegenError, parser::ParseError, tokenizer::LexError};

#[derive(Clone, Debug, PartialEq)]
/// Represents an error that can occur during compilation.
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Codegen(CodegenError),
}

impl From<LexError> for CompileError {
    fn from(value: LexError) -> Self {
        CompileError::Lex(value)
    }
}

impl From<ParseError> for CompileError {
    fn from(value: ParseError) -> Self {
        CompileError::Parse(value)
    }
}

impl From<CodegenError> for CompileError {
    fn from(value: CodegenError) -> Self {
        CompileError::Codegen(value)
    }
}

impl std::error::Error for CompileError {}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{e}"),
            CompileError::Parse(e) => write!(f, "{e}"),
            CompileError::Codegen(e) => write!(f, "{e}"),
        }
    }
}

impl CompileError {
    /// The source line the error refers to, if any.
    pub fn line(&self) -> Option<u32> {
        match self {
            CompileError::Lex(e) => Some(e.line()),
            CompileError::Parse(e) => Some(e.line()),
            CompileError::Codegen(e) => e.line(),
        }
    }

    /// Returns `true` if the error may go away once more source is appended.
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, CompileError::Parse(e) if e.is_end_of_input())
    }

    pub fn with_context(self, source: &str) -> CompileErrorWithContext<'_> {
        CompileErrorWithContext { err: self, source }
    }
}

#[derive(Debug, PartialEq)]
/// A compile error along with the source it came from. Displays the offending source line.
pub struct CompileErrorWithContext<'a> {
    err: CompileError,
    source: &'a str,
}

impl std::error::Error for CompileErrorWithContext<'_> {}

impl std::fmt::Display for CompileErrorWithContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.err {
            CompileError::Lex(_) => "Lexer",
            CompileError::Parse(_) => "Parser",
            CompileError::Codegen(_) => "Generator",
        };
        write!(f, "[{kind} Error] {}", self.err)?;
        let text = self
            .err
            .line()
            .and_then(|line| self.source.lines().nth(line.saturating_sub(1) as usize));
        if let Some(text) = text {
            let line = self.err.line().unwrap_or_default();
            write!(f, "\n{line:>4} | {text}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use compact_str::CompactString;

    use super::*;

    #[test]
    fn context_shows_offending_line() {
        let source = "let x = 1;\nexit(y);";
        let err = CompileError::Codegen(CodegenError::UndeclaredIdentifier {
            name: CompactString::new("y"),
            line: 2,
        });
        assert_eq!(
            err.with_context(source).to_string(),
            "[Generator Error] undeclared identifier `y` on line 2\n   2 | exit(y);"
        );
    }

    #[test]
    fn context_without_line_shows_message_only() {
        let err = CompileError::Codegen(CodegenError::UnresolvedLabel(
            crate::instruction::Label(3),
        ));
        assert_eq!(
            err.with_context("exit(0);").to_string(),
            "[Generator Error] jump to unresolved label3"
        );
    }
}
