use bumpalo::Bump;

use super::{
    arena::{BumpVec, NodeId, TypedStore},
    tokenizer::{Token, TokenType},
};

pub type ExprId = NodeId<Expr>;
pub type StmtId = NodeId<Stmt>;
pub type ScopeId = NodeId<Scope>;
pub type IfTailId = NodeId<IfTail>;

/// A leaf of an expression, or a parenthesized expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    /// An integer literal token.
    IntLiteral(Token),
    /// An identifier token.
    Identifier(Token),
    /// An expression surrounded by `(` and `)`.
    Paren(ExprId),
}

/// A binary arithmetic operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Returns the operator for `token_type` or `None` if it is not a binary operator.
    pub fn from_token_type(token_type: TokenType) -> Option<BinaryOp> {
        match token_type {
            TokenType::Plus => Some(BinaryOp::Add),
            TokenType::Minus => Some(BinaryOp::Sub),
            TokenType::Star => Some(BinaryOp::Mul),
            TokenType::Slash => Some(BinaryOp::Div),
            _ => None,
        }
    }

    /// Higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 0,
            BinaryOp::Mul | BinaryOp::Div => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Term(Term),
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `exit(<expr>);`
    Exit(ExprId),
    /// `let <ident> = <expr>;`
    Let { ident: Token, expr: ExprId },
    /// `<ident> = <expr>;`
    Assign { ident: Token, expr: ExprId },
    /// `{ <stmt>* }`
    Scope(ScopeId),
    /// `if (<expr>) <scope> <tail>?`
    If {
        pred: ExprId,
        scope: ScopeId,
        tail: Option<IfTailId>,
    },
}

/// A braced list of statements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    /// The range of the scope's statements within the arena's statement lists.
    start: u32,
    len: u32,
}

/// The continuation of an `if` statement.
#[derive(Clone, Debug, PartialEq)]
pub enum IfTail {
    /// `elif (<expr>) <scope> <tail>?`
    Elif {
        pred: ExprId,
        scope: ScopeId,
        tail: Option<IfTailId>,
    },
    /// `else <scope>`
    Else(ScopeId),
}

/// Owns every node of a single compilation unit.
#[derive(Debug, PartialEq)]
pub struct Arena<'bump> {
    pub exprs: TypedStore<'bump, Expr>,
    pub stmts: TypedStore<'bump, Stmt>,
    pub scopes: TypedStore<'bump, Scope>,
    pub if_tails: TypedStore<'bump, IfTail>,
    stmt_lists: BumpVec<'bump, StmtId>,
}

impl<'bump> Arena<'bump> {
    pub fn new_in(bump: &'bump Bump) -> Arena<'bump> {
        Arena {
            exprs: TypedStore::new_in(bump),
            stmts: TypedStore::new_in(bump),
            scopes: TypedStore::new_in(bump),
            if_tails: TypedStore::new_in(bump),
            stmt_lists: BumpVec::new_in(bump),
        }
    }

    /// Registers a scope containing `stmts`. The statements are copied so they are contiguous in
    /// the arena.
    pub fn alloc_scope(&mut self, stmts: &[StmtId]) -> ScopeId {
        let start = self.stmt_lists.len() as u32;
        self.stmt_lists.extend_from_slice(stmts);
        self.scopes.alloc(Scope {
            start,
            len: stmts.len() as u32,
        })
    }

    /// Returns the statements of `scope` in order.
    pub fn scope_stmts(&self, scope: ScopeId) -> &[StmtId] {
        let Scope { start, len } = self.scopes[scope];
        &self.stmt_lists[start as usize..(start + len) as usize]
    }
}

/// A parsed program.
#[derive(Debug, PartialEq)]
pub struct Program<'bump> {
    /// The nodes of the program.
    pub arena: Arena<'bump>,
    /// The top level statements in order.
    pub stmts: BumpVec<'bump, StmtId>,
}

impl<'bump> Program<'bump> {
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.arena.exprs[id]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.arena.stmts[id]
    }

    pub fn if_tail(&self, id: IfTailId) -> &IfTail {
        &self.arena.if_tails[id]
    }

    pub fn scope_stmts(&self, id: ScopeId) -> &[StmtId] {
        self.arena.scope_stmts(id)
    }

    /// Returns a value that renders the program as source code.
    pub fn display(&self) -> ProgramDisplay<'_, 'bump> {
        ProgramDisplay { program: self }
    }

    /// Returns a value that renders the expression as source code.
    pub fn display_expr(&self, expr: ExprId) -> ExprDisplay<'_, 'bump> {
        ExprDisplay {
            program: self,
            expr,
        }
    }

    /// Splits a chain of binary operations nested on the left, like `1 + 2 - 3`, into its leftmost
    /// operand and the operators and right operands that follow it in evaluation order.
    ///
    /// The chain is empty if `expr` is not a binary operation.
    pub fn left_chain(&self, expr: ExprId) -> (ExprId, Vec<(BinaryOp, ExprId)>) {
        let mut first = expr;
        let mut rest = Vec::new();
        while let Expr::Binary { op, lhs, rhs } = self.expr(first) {
            rest.push((*op, *rhs));
            first = *lhs;
        }
        rest.reverse();
        (first, rest)
    }

    /// Returns a fully parenthesized rendering of the expression, for example `(1 + (2 * 3))`.
    pub fn expr_structure(&self, expr: ExprId) -> String {
        match self.expr(expr) {
            Expr::Term(Term::IntLiteral(t) | Term::Identifier(t)) => t.text().to_string(),
            Expr::Term(Term::Paren(inner)) => self.expr_structure(*inner),
            Expr::Binary { .. } => {
                let (first, rest) = self.left_chain(expr);
                let mut ret = "(".repeat(rest.len());
                ret.push_str(&self.expr_structure(first));
                for (op, rhs) in rest {
                    ret.push_str(&format!(" {} {})", op.symbol(), self.expr_structure(rhs)));
                }
                ret
            }
        }
    }
}

pub struct ExprDisplay<'a, 'bump> {
    program: &'a Program<'bump>,
    expr: ExprId,
}

impl std::fmt::Display for ExprDisplay<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.program.expr(self.expr) {
            Expr::Term(Term::IntLiteral(t) | Term::Identifier(t)) => f.write_str(t.text()),
            Expr::Term(Term::Paren(inner)) => {
                write!(f, "({})", self.program.display_expr(*inner))
            }
            Expr::Binary { .. } => {
                let (first, rest) = self.program.left_chain(self.expr);
                write!(f, "{}", self.program.display_expr(first))?;
                for (op, rhs) in rest {
                    write!(f, " {} {}", op.symbol(), self.program.display_expr(rhs))?;
                }
                Ok(())
            }
        }
    }
}

pub struct ProgramDisplay<'a, 'bump> {
    program: &'a Program<'bump>,
}

impl ProgramDisplay<'_, '_> {
    fn write_stmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        stmt: StmtId,
        depth: usize,
    ) -> std::fmt::Result {
        let program = self.program;
        write!(f, "{:indent$}", "", indent = depth * 4)?;
        match program.stmt(stmt) {
            Stmt::Exit(expr) => writeln!(f, "exit({});", program.display_expr(*expr)),
            Stmt::Let { ident, expr } => writeln!(
                f,
                "let {} = {};",
                ident.text(),
                program.display_expr(*expr)
            ),
            Stmt::Assign { ident, expr } => {
                writeln!(f, "{} = {};", ident.text(), program.display_expr(*expr))
            }
            Stmt::Scope(scope) => {
                self.write_scope(f, *scope, depth)?;
                writeln!(f)
            }
            Stmt::If { pred, scope, tail } => {
                write!(f, "if ({}) ", program.display_expr(*pred))?;
                self.write_scope(f, *scope, depth)?;
                let mut tail = *tail;
                while let Some(id) = tail {
                    match program.if_tail(id) {
                        IfTail::Elif { pred, scope, tail: next } => {
                            write!(f, " elif ({}) ", program.display_expr(*pred))?;
                            self.write_scope(f, *scope, depth)?;
                            tail = *next;
                        }
                        IfTail::Else(scope) => {
                            f.write_str(" else ")?;
                            self.write_scope(f, *scope, depth)?;
                            tail = None;
                        }
                    }
                }
                writeln!(f)
            }
        }
    }

    fn write_scope(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        scope: ScopeId,
        depth: usize,
    ) -> std::fmt::Result {
        writeln!(f, "{{")?;
        for stmt in self.program.scope_stmts(scope) {
            self.write_stmt(f, *stmt, depth + 1)?;
        }
        write!(f, "{:indent$}}}", "", indent = depth * 4)
    }
}

impl std::fmt::Display for ProgramDisplay<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for stmt in self.program.stmts.iter() {
            self.write_stmt(f, *stmt, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{parser::parse, tokenizer::tokenize};

    #[test]
    fn scope_statements_are_contiguous() {
        let bump = Bump::new();
        let mut arena = Arena::new_in(&bump);
        let zero = arena
            .exprs
            .alloc(Expr::Term(Term::IntLiteral(Token::with_text(
                TokenType::IntLiteral,
                1,
                "0",
            ))));
        let a = arena.stmts.alloc(Stmt::Exit(zero));
        let b = arena.stmts.alloc(Stmt::Exit(zero));
        let inner = arena.alloc_scope(&[b]);
        let outer = arena.alloc_scope(&[a, b]);
        assert_eq!(arena.scope_stmts(inner), &[b]);
        assert_eq!(arena.scope_stmts(outer), &[a, b]);
    }

    #[test]
    fn left_chain_lists_operations_in_evaluation_order() {
        let bump = Bump::new();
        let tokens = tokenize("exit(1 - 2 * 3 + 4);").unwrap();
        let program = parse(&tokens, &bump).unwrap();
        let Stmt::Exit(expr) = program.stmt(program.stmts[0]) else {
            panic!("expected exit");
        };
        let (first, rest) = program.left_chain(*expr);
        assert_eq!(program.display_expr(first).to_string(), "1");
        let rest: Vec<String> = rest
            .into_iter()
            .map(|(op, rhs)| format!("{} {}", op.symbol(), program.display_expr(rhs)))
            .collect();
        assert_eq!(rest, vec!["- 2 * 3", "+ 4"]);
    }

    #[test]
    fn empty_scope_has_no_statements() {
        let bump = Bump::new();
        let mut arena = Arena::new_in(&bump);
        let scope = arena.alloc_scope(&[]);
        assert!(arena.scope_stmts(scope).is_empty());
    }

    #[test]
    fn binary_ops_map_from_tokens() {
        assert_eq!(BinaryOp::from_token_type(TokenType::Plus), Some(BinaryOp::Add));
        assert_eq!(BinaryOp::from_token_type(TokenType::Slash), Some(BinaryOp::Div));
        assert_eq!(BinaryOp::from_token_type(TokenType::Eq), None);
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Sub.precedence());
    }
}
