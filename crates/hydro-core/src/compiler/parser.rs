use bumpalo::Bump;
use tracing::debug;

use super::{
    arena::BumpVec,
    ast::{Arena, BinaryOp, Expr, ExprId, IfTail, IfTailId, Program, ScopeId, Stmt, StmtId, Term},
    tokenizer::{Token, TokenType},
};

pub type ParseResult<T> = Result<T, ParseError>;

/// The deepest nesting of scopes and expressions the parser accepts.
pub const MAX_NESTING: usize = 256;

/// Parses `tokens` into a program whose nodes are allocated in `bump`.
pub fn parse<'bump>(tokens: &[Token], bump: &'bump Bump) -> ParseResult<Program<'bump>> {
    let program = Parser::new(tokens, bump).parse_program()?;
    debug!(
        tokens = tokens.len(),
        statements = program.stmts.len(),
        exprs = program.arena.exprs.len(),
        "parsed program"
    );
    Ok(program)
}

/// A recursive descent parser over a slice of tokens.
///
/// The parser never backtracks. Statements are recognized by looking at most 3 tokens ahead and
/// binary expressions are parsed with precedence climbing.
pub struct Parser<'t, 'bump> {
    tokens: &'t [Token],
    idx: usize,
    /// The number of scopes and expressions currently being parsed.
    depth: usize,
    bump: &'bump Bump,
    arena: Arena<'bump>,
}

impl<'t, 'bump> Parser<'t, 'bump> {
    pub fn new(tokens: &'t [Token], bump: &'bump Bump) -> Parser<'t, 'bump> {
        Parser {
            tokens,
            idx: 0,
            depth: 0,
            bump,
            arena: Arena::new_in(bump),
        }
    }

    /// Parses statements until all tokens are consumed.
    pub fn parse_program(mut self) -> ParseResult<Program<'bump>> {
        let mut stmts = BumpVec::new_in(self.bump);
        while self.idx < self.tokens.len() {
            match self.parse_stmt()? {
                Some(stmt) => stmts.push(stmt),
                None => return Err(self.invalid_statement()),
            }
        }
        Ok(Program {
            arena: self.arena,
            stmts,
        })
    }

    /// Parses a single term or returns `None` if the next token can not start a term.
    fn parse_term(&mut self) -> ParseResult<Option<Term>> {
        if let Some(token) = self.try_consume(TokenType::IntLiteral) {
            return Ok(Some(Term::IntLiteral(token)));
        }
        if let Some(token) = self.try_consume(TokenType::Identifier) {
            return Ok(Some(Term::Identifier(token)));
        }
        if self.try_consume(TokenType::OpenParen).is_some() {
            let expr = self.parse_expr(0)?;
            self.require(TokenType::CloseParen)?;
            return Ok(Some(Term::Paren(expr)));
        }
        Ok(None)
    }

    /// Parses an expression whose binary operators all have a precedence of at least
    /// `min_precedence`.
    fn parse_expr(&mut self, min_precedence: u8) -> ParseResult<ExprId> {
        self.enter_nesting()?;
        let expr = self.parse_binary(min_precedence);
        self.depth -= 1;
        expr
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<ExprId> {
        let term = self
            .parse_term()?
            .ok_or_else(|| self.expected(Expected::Expression))?;
        let mut lhs = self.arena.exprs.alloc(Expr::Term(term));
        while let Some(op) = self.peek_binary_op() {
            if op.precedence() < min_precedence {
                break;
            }
            self.idx += 1;
            // Requiring a strictly higher precedence on the right makes operators of equal
            // precedence left associative.
            let rhs = self.parse_expr(op.precedence() + 1)?;
            lhs = self.arena.exprs.alloc(Expr::Binary { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_scope(&mut self) -> ParseResult<ScopeId> {
        self.enter_nesting()?;
        let scope = self.parse_scope_body();
        self.depth -= 1;
        scope
    }

    fn parse_scope_body(&mut self) -> ParseResult<ScopeId> {
        let open = self.require(TokenType::OpenCurly)?;
        let mut stmts = BumpVec::new_in(self.bump);
        loop {
            if self.try_consume(TokenType::CloseCurly).is_some() {
                break;
            }
            match self.parse_stmt()? {
                Some(stmt) => stmts.push(stmt),
                None => {
                    return Err(ParseError::UnterminatedScope {
                        open_line: open.line,
                        found: self.statement_found(),
                        line: self.error_line(),
                    });
                }
            }
        }
        Ok(self.arena.alloc_scope(&stmts))
    }

    /// Parses the `elif`/`else` chain that may follow an `if` scope.
    fn parse_if_tail(&mut self) -> ParseResult<Option<IfTailId>> {
        let mut elifs = Vec::new();
        while self.try_consume(TokenType::Elif).is_some() {
            self.require(TokenType::OpenParen)?;
            let pred = self.parse_expr(0)?;
            self.require(TokenType::CloseParen)?;
            elifs.push((pred, self.parse_scope()?));
        }
        let mut tail = match self.try_consume(TokenType::Else) {
            Some(_) => {
                let scope = self.parse_scope()?;
                Some(self.arena.if_tails.alloc(IfTail::Else(scope)))
            }
            None => None,
        };
        // Links are allocated back to front so each `elif` can point at its successor.
        for (pred, scope) in elifs.into_iter().rev() {
            let elif = IfTail::Elif { pred, scope, tail };
            tail = Some(self.arena.if_tails.alloc(elif));
        }
        Ok(tail)
    }

    /// Parses the next statement or returns `None` if the next tokens do not start one.
    fn parse_stmt(&mut self) -> ParseResult<Option<StmtId>> {
        let stmt = match (self.peek_type(0), self.peek_type(1), self.peek_type(2)) {
            (Some(TokenType::Exit), Some(TokenType::OpenParen), _) => {
                self.idx += 2;
                let expr = self.parse_expr(0)?;
                self.require(TokenType::CloseParen)?;
                self.require(TokenType::Semicolon)?;
                Stmt::Exit(expr)
            }
            (Some(TokenType::Let), Some(TokenType::Identifier), Some(TokenType::Eq)) => {
                let ident = self.tokens[self.idx + 1].clone();
                self.idx += 3;
                let expr = self.parse_expr(0)?;
                self.require(TokenType::Semicolon)?;
                Stmt::Let { ident, expr }
            }
            (Some(TokenType::Identifier), Some(TokenType::Eq), _) => {
                let ident = self.tokens[self.idx].clone();
                self.idx += 2;
                let expr = self.parse_expr(0)?;
                self.require(TokenType::Semicolon)?;
                Stmt::Assign { ident, expr }
            }
            (Some(TokenType::OpenCurly), _, _) => Stmt::Scope(self.parse_scope()?),
            (Some(TokenType::If), Some(TokenType::OpenParen), _) => {
                self.idx += 2;
                let pred = self.parse_expr(0)?;
                self.require(TokenType::CloseParen)?;
                let scope = self.parse_scope()?;
                let tail = self.parse_if_tail()?;
                Stmt::If { pred, scope, tail }
            }
            _ => return Ok(None),
        };
        Ok(Some(self.arena.stmts.alloc(stmt)))
    }

    fn enter_nesting(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ParseError::NestingTooDeep {
                line: self.error_line(),
            });
        }
        Ok(())
    }

    /// The token reported when no statement starts at the cursor. `None` if the remaining tokens
    /// are the start of a statement that was cut off by the end of input.
    fn statement_found(&self) -> Option<TokenType> {
        let rest: Vec<TokenType> = self.tokens[self.idx.min(self.tokens.len())..]
            .iter()
            .take(3)
            .map(|t| t.token_type)
            .collect();
        match rest.as_slice() {
            [TokenType::Exit]
            | [TokenType::If]
            | [TokenType::Identifier]
            | [TokenType::Let]
            | [TokenType::Let, TokenType::Identifier] => None,
            _ => self.peek_type(0),
        }
    }

    fn peek_type(&self, offset: usize) -> Option<TokenType> {
        self.tokens.get(self.idx + offset).map(|t| t.token_type)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        self.peek_type(0).and_then(BinaryOp::from_token_type)
    }

    fn try_consume(&mut self, token_type: TokenType) -> Option<Token> {
        let token = self.tokens.get(self.idx)?;
        if token.token_type != token_type {
            return None;
        }
        self.idx += 1;
        Some(token.clone())
    }

    /// Consumes the next token if it is of `token_type` or fails.
    fn require(&mut self, token_type: TokenType) -> ParseResult<Token> {
        self.try_consume(token_type)
            .ok_or_else(|| self.expected(Expected::Token(token_type)))
    }

    /// The line reported for an error at the cursor: the line of the preceding token, or of the
    /// first token when nothing precedes the cursor.
    fn error_line(&self) -> u32 {
        self.idx
            .checked_sub(1)
            .or((!self.tokens.is_empty()).then_some(0))
            .and_then(|idx| self.tokens.get(idx))
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn expected(&self, expected: Expected) -> ParseError {
        ParseError::Expected {
            expected,
            found: self.peek_type(0),
            line: self.error_line(),
        }
    }

    fn invalid_statement(&self) -> ParseError {
        ParseError::InvalidStatement {
            found: self.statement_found(),
            line: self
                .tokens
                .get(self.idx)
                .map(|t| t.line)
                .unwrap_or_else(|| self.error_line()),
        }
    }
}

/// What the parser was looking for when it failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Token(TokenType),
    Expression,
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Token(t) => write!(f, "{t}"),
            Expected::Expression => f.write_str("expression"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Represents an error that can occur during parsing.
///
/// `found` is `None` when the parser ran out of tokens.
pub enum ParseError {
    /// A specific token or production was required but something else was found.
    Expected {
        expected: Expected,
        found: Option<TokenType>,
        line: u32,
    },
    /// A scope opened on `open_line` contains something that is not a statement.
    UnterminatedScope {
        open_line: u32,
        found: Option<TokenType>,
        line: u32,
    },
    /// Top level tokens that do not start a statement.
    InvalidStatement {
        found: Option<TokenType>,
        line: u32,
    },
    /// Scopes or expressions are nested deeper than [`MAX_NESTING`].
    NestingTooDeep { line: u32 },
}

impl ParseError {
    pub fn line(&self) -> u32 {
        match self {
            ParseError::Expected { line, .. }
            | ParseError::UnterminatedScope { line, .. }
            | ParseError::InvalidStatement { line, .. }
            | ParseError::NestingTooDeep { line } => *line,
        }
    }

    /// Returns `true` if the error was caused by running out of tokens. More input may make the
    /// program valid.
    pub fn is_end_of_input(&self) -> bool {
        match self {
            ParseError::Expected { found, .. }
            | ParseError::UnterminatedScope { found, .. }
            | ParseError::InvalidStatement { found, .. } => found.is_none(),
            ParseError::NestingTooDeep { .. } => false,
        }
    }
}

struct Found(Option<TokenType>);

impl std::fmt::Display for Found {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{t}"),
            None => f.write_str("end of input"),
        }
    }
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Expected {
                expected,
                found,
                line,
            } => write!(
                f,
                "expected {expected} on line {line} but found {found}",
                found = Found(*found)
            ),
            ParseError::UnterminatedScope {
                open_line,
                found,
                line,
            } => write!(
                f,
                "unterminated scope opened on line {open_line}, found {found} on line {line}",
                found = Found(*found)
            ),
            ParseError::InvalidStatement { found, line } => write!(
                f,
                "invalid statement on line {line} starting with {found}",
                found = Found(*found)
            ),
            ParseError::NestingTooDeep { line } => write!(
                f,
                "nesting on line {line} exceeds the limit of {MAX_NESTING} levels"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::tokenizer::tokenize;

    fn parse_test(source: &str, test: impl FnOnce(ParseResult<Program<'_>>)) {
        let bump = Bump::new();
        let tokens = tokenize(source).unwrap();
        test(parse(&tokens, &bump));
    }

    /// Parses `exit(<source>);` and returns the fully parenthesized expression.
    fn expr_structure(source: &str) -> String {
        let mut ret = String::new();
        parse_test(&format!("exit({source});"), |program| {
            let program = program.unwrap();
            match program.stmt(program.stmts[0]) {
                Stmt::Exit(expr) => ret = program.expr_structure(*expr),
                stmt => panic!("expected exit but got {stmt:?}"),
            }
        });
        ret
    }

    #[test]
    fn empty_source_is_empty_program() {
        parse_test("", |program| assert!(program.unwrap().stmts.is_empty()));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(expr_structure("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(expr_structure("2 * 3 + 1"), "((2 * 3) + 1)");
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        assert_eq!(expr_structure("8 - 3 - 2"), "((8 - 3) - 2)");
        assert_eq!(expr_structure("8 / 4 * 2"), "((8 / 4) * 2)");
        assert_eq!(expr_structure("1 + 2 - 3 + 4"), "(((1 + 2) - 3) + 4)");
    }

    #[test]
    fn parenthesis_resets_precedence() {
        assert_eq!(expr_structure("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(expr_structure("2 * (3 - (4 + x))"), "(2 * (3 - (4 + x)))");
    }

    #[test]
    fn parenthesized_expression_keeps_paren_node() {
        parse_test("exit((1));", |program| {
            let program = program.unwrap();
            let Stmt::Exit(expr) = program.stmt(program.stmts[0]) else {
                panic!("expected exit");
            };
            assert!(matches!(program.expr(*expr), Expr::Term(Term::Paren(_))));
        });
    }

    #[test]
    fn rendered_expression_parses_to_the_same_tree() {
        let source = "exit((1 + 2) * 3);";
        let bump = Bump::new();
        let tokens = tokenize(source).unwrap();
        let program = parse(&tokens, &bump).unwrap();
        let rendered = program.display().to_string();
        assert_eq!(rendered, "exit((1 + 2) * 3);\n");

        let reparsed_tokens = tokenize(&rendered).unwrap();
        let reparsed = parse(&reparsed_tokens, &bump).unwrap();
        assert_eq!(program, reparsed);
    }

    #[test]
    fn parsing_twice_produces_equal_trees() {
        let source = "let x = 1;\n{ let y = x * 2; x = y; }\nif (x) { exit(1); } else { exit(2); }";
        let tokens = tokenize(source).unwrap();
        let bump = Bump::new();
        let first = parse(&tokens, &bump).unwrap();
        let second = parse(&tokens, &bump).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn statements_are_parsed() {
        parse_test("let x = 1;\nx = x + 1;\n{ exit(x); }", |program| {
            let program = program.unwrap();
            let stmts: Vec<&Stmt> = program.stmts.iter().map(|s| program.stmt(*s)).collect();
            assert!(matches!(stmts[0], Stmt::Let { ident, .. } if ident.text() == "x"));
            assert!(matches!(stmts[1], Stmt::Assign { ident, .. } if ident.text() == "x"));
            let Stmt::Scope(scope) = stmts[2] else {
                panic!("expected scope but got {:?}", stmts[2]);
            };
            let inner = program.scope_stmts(*scope);
            assert_eq!(inner.len(), 1);
            assert!(matches!(program.stmt(inner[0]), Stmt::Exit(_)));
        });
    }

    #[test]
    fn if_elif_else_forms_a_chain() {
        parse_test(
            "if (0) { exit(1); } elif (1) { exit(2); } elif (2) { } else { exit(3); }",
            |program| {
                let program = program.unwrap();
                let Stmt::If { tail, .. } = program.stmt(program.stmts[0]) else {
                    panic!("expected if");
                };
                let mut kinds = Vec::new();
                let mut tail = *tail;
                while let Some(id) = tail {
                    match program.if_tail(id) {
                        IfTail::Elif { tail: next, .. } => {
                            kinds.push("elif");
                            tail = *next;
                        }
                        IfTail::Else(_) => {
                            kinds.push("else");
                            tail = None;
                        }
                    }
                }
                assert_eq!(kinds, vec!["elif", "elif", "else"]);
            },
        );
    }

    #[test]
    fn if_without_tail_is_allowed() {
        parse_test("if (1) { exit(1); } exit(0);", |program| {
            let program = program.unwrap();
            assert_eq!(program.stmts.len(), 2);
            assert!(matches!(
                program.stmt(program.stmts[0]),
                Stmt::If { tail: None, .. }
            ));
        });
    }

    #[test]
    fn program_renders_as_source() {
        parse_test(
            "let x=1; if(x){x=2;}elif(x-1){ {exit(3);} }else{exit(x);}",
            |program| {
                assert_eq!(
                    program.unwrap().display().to_string(),
                    "let x = 1;
if (x) {
    x = 2;
} elif (x - 1) {
    {
        exit(3);
    }
} else {
    exit(x);
}
"
                );
            },
        );
    }

    #[test]
    fn missing_semicolon_reports_previous_line() {
        parse_test("let x = 1\nexit(x);", |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::Expected {
                    expected: Expected::Token(TokenType::Semicolon),
                    found: Some(TokenType::Exit),
                    line: 1,
                }
            );
        });
    }

    #[test]
    fn missing_expression_is_an_error() {
        parse_test("exit();", |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::Expected {
                    expected: Expected::Expression,
                    found: Some(TokenType::CloseParen),
                    line: 1,
                }
            );
        });
        parse_test("let x = 1 + ;", |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::Expected {
                    expected: Expected::Expression,
                    found: Some(TokenType::Semicolon),
                    line: 1,
                }
            );
        });
    }

    #[test]
    fn unclosed_paren_is_an_error() {
        parse_test("exit((1 + 2);", |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::Expected {
                    expected: Expected::Token(TokenType::CloseParen),
                    found: Some(TokenType::Semicolon),
                    line: 1,
                }
            );
        });
    }

    #[test]
    fn non_statement_in_scope_is_unterminated_scope() {
        parse_test("{\nexit(1);\n5;\n}", |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::UnterminatedScope {
                    open_line: 1,
                    found: Some(TokenType::IntLiteral),
                    line: 2,
                }
            );
        });
    }

    #[test]
    fn missing_close_curly_is_end_of_input() {
        parse_test("{ let x = 1;", |program| {
            let err = program.unwrap_err();
            assert!(err.is_end_of_input());
            assert_eq!(
                err,
                ParseError::UnterminatedScope {
                    open_line: 1,
                    found: None,
                    line: 1,
                }
            );
        });
    }

    #[test]
    fn leftover_tokens_are_an_invalid_statement() {
        parse_test("exit(0);\n\n1 + 2;", |program| {
            let err = program.unwrap_err();
            assert!(!err.is_end_of_input());
            assert_eq!(
                err,
                ParseError::InvalidStatement {
                    found: Some(TokenType::IntLiteral),
                    line: 3,
                }
            );
        });
    }

    #[test]
    fn incomplete_statement_prefix_is_invalid() {
        parse_test("let x;", |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::InvalidStatement {
                    found: Some(TokenType::Let),
                    line: 1,
                }
            );
        });
    }

    #[test]
    fn elif_requires_paren() {
        parse_test("if (1) {} elif 1 {}", |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::Expected {
                    expected: Expected::Token(TokenType::OpenParen),
                    found: Some(TokenType::IntLiteral),
                    line: 1,
                }
            );
        });
    }

    #[test]
    fn error_message_names_expected_token() {
        parse_test("exit(1)", |program| {
            assert_eq!(
                program.unwrap_err().to_string(),
                "expected `;` on line 1 but found end of input"
            );
        });
    }

    #[test]
    fn deeply_nested_parens_are_an_error() {
        let source = format!("exit({}1{});", "(".repeat(100_000), ")".repeat(100_000));
        parse_test(&source, |program| {
            assert_eq!(
                program.unwrap_err(),
                ParseError::NestingTooDeep { line: 1 }
            );
        });
    }

    #[test]
    fn deeply_nested_scopes_are_an_error() {
        let source = format!("{}{}", "{".repeat(100_000), "}".repeat(100_000));
        parse_test(&source, |program| {
            let err = program.unwrap_err();
            assert_eq!(err, ParseError::NestingTooDeep { line: 1 });
            assert!(!err.is_end_of_input());
        });
    }

    #[test]
    fn nesting_below_the_limit_is_accepted() {
        let depth = MAX_NESTING / 2;
        let source = format!("exit({}1{});", "(".repeat(depth), ")".repeat(depth));
        parse_test(&source, |program| assert!(program.is_ok()));
        let source = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        parse_test(&source, |program| assert!(program.is_ok()));
    }

    #[test]
    fn long_elif_chain_is_not_nesting() {
        let source = format!(
            "if (0) {{}}{} else {{ exit(1); }}",
            " elif (0) {}".repeat(MAX_NESTING * 4)
        );
        parse_test(&source, |program| assert!(program.is_ok()));
    }

    #[test]
    fn statement_cut_off_by_end_of_input_is_end_of_input() {
        for source in ["exit", "if", "x", "let", "let x", "{ let x", "exit(0); let"] {
            parse_test(source, |program| {
                let err = program.unwrap_err();
                assert!(err.is_end_of_input(), "{source}: {err}");
            });
        }
        for source in ["let x;", "x 1", "exit 1"] {
            parse_test(source, |program| {
                let err = program.unwrap_err();
                assert!(!err.is_end_of_input(), "{source}: {err}");
            });
        }
    }
}
