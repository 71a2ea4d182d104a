use compact_str::CompactString;
use tracing::{debug, trace};

use crate::{
    assembly::Assembly,
    instruction::{Instruction, Label, Slot},
};

use super::{
    ast::{BinaryOp, Expr, ExprId, IfTail, IfTailId, Program, ScopeId, Stmt, StmtId, Term},
    symbols::SymbolTable,
    tokenizer::Token,
};

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Lowers `program` into a linear instruction sequence.
///
/// The program always ends with an implicit `exit(0)`.
pub fn generate(program: &Program) -> CodegenResult<Assembly> {
    let mut generator = Generator::new(program);
    generator.symbols.push_frame(0);
    for stmt in program.stmts.iter() {
        generator.compile_stmt(*stmt)?;
    }
    generator.end_scope();
    generator.emit(Instruction::Push(0));
    generator.emit(Instruction::Exit);
    let assembly = Assembly::new(generator.dst)?;
    debug!(
        instructions = assembly.instructions().len(),
        labels = generator.label_count,
        "generated assembly"
    );
    Ok(assembly)
}

/// Walks a program and emits instructions for it.
struct Generator<'a, 'bump> {
    program: &'a Program<'bump>,
    dst: Vec<Instruction>,
    /// The number of values on the stack at the current point of the program.
    stack_size: usize,
    symbols: SymbolTable,
    label_count: u32,
}

impl<'a, 'bump> Generator<'a, 'bump> {
    fn new(program: &'a Program<'bump>) -> Generator<'a, 'bump> {
        Generator {
            program,
            dst: Vec::new(),
            stack_size: 0,
            symbols: SymbolTable::default(),
            label_count: 0,
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.stack_size = self
            .stack_size
            .checked_add_signed(instruction.stack_effect())
            .expect("stack size tracking went negative");
        self.dst.push(instruction);
    }

    fn create_label(&mut self) -> Label {
        let label = Label(self.label_count);
        self.label_count += 1;
        trace!(%label, "created label");
        label
    }

    /// Emits instructions that leave the value of `expr` on top of the stack.
    fn compile_expr(&mut self, expr: ExprId) -> CodegenResult<()> {
        match self.program.expr(expr) {
            Expr::Term(Term::IntLiteral(token)) => {
                let value = token
                    .text()
                    .parse::<i64>()
                    .map_err(|_| CodegenError::IntegerOutOfRange {
                        text: CompactString::new(token.text()),
                        line: token.line,
                    })?;
                self.emit(Instruction::Push(value));
            }
            Expr::Term(Term::Identifier(token)) => {
                let slot = self.symbols.resolve(token.text()).ok_or_else(|| {
                    CodegenError::UndeclaredIdentifier {
                        name: CompactString::new(token.text()),
                        line: token.line,
                    }
                })?;
                self.emit(Instruction::Load(slot));
            }
            Expr::Term(Term::Paren(inner)) => self.compile_expr(*inner)?,
            Expr::Binary { .. } => {
                // Chains like `1 + 2 + 3` nest on the left without bound, so walk them in a loop.
                let (first, rest) = self.program.left_chain(expr);
                self.compile_expr(first)?;
                for (op, rhs) in rest {
                    self.compile_expr(rhs)?;
                    self.emit(match op {
                        BinaryOp::Add => Instruction::Add,
                        BinaryOp::Sub => Instruction::Sub,
                        BinaryOp::Mul => Instruction::Mul,
                        BinaryOp::Div => Instruction::Div,
                    });
                }
            }
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: StmtId) -> CodegenResult<()> {
        match self.program.stmt(stmt) {
            Stmt::Exit(expr) => {
                self.compile_expr(*expr)?;
                self.emit(Instruction::Exit);
            }
            Stmt::Let { ident, expr } => self.compile_let(ident, *expr)?,
            Stmt::Assign { ident, expr } => self.compile_assign(ident, *expr)?,
            Stmt::Scope(scope) => self.compile_scope(*scope)?,
            Stmt::If { pred, scope, tail } => self.compile_if(*pred, *scope, *tail)?,
        }
        Ok(())
    }

    fn compile_let(&mut self, ident: &Token, expr: ExprId) -> CodegenResult<()> {
        let name = ident.text();
        let already_declared = || CodegenError::AlreadyDeclared {
            name: CompactString::new(name),
            line: ident.line,
        };
        if self.symbols.declared_in_current_frame(name) {
            return Err(already_declared());
        }
        self.compile_expr(expr)?;
        let slot = Slot(self.stack_size - 1);
        self.symbols
            .declare(name, slot)
            .map_err(|_| already_declared())
    }

    fn compile_assign(&mut self, ident: &Token, expr: ExprId) -> CodegenResult<()> {
        let slot = self.symbols.resolve(ident.text()).ok_or_else(|| {
            CodegenError::UndeclaredAssignment {
                name: CompactString::new(ident.text()),
                line: ident.line,
            }
        })?;
        self.compile_expr(expr)?;
        self.emit(Instruction::Store(slot));
        Ok(())
    }

    fn compile_scope(&mut self, scope: ScopeId) -> CodegenResult<()> {
        self.symbols.push_frame(self.stack_size);
        for stmt in self.program.scope_stmts(scope) {
            self.compile_stmt(*stmt)?;
        }
        self.end_scope();
        Ok(())
    }

    /// Pops the innermost frame and releases the slots declared in it.
    fn end_scope(&mut self) {
        let Some(frame) = self.symbols.pop_frame() else {
            return;
        };
        let pop_count = self.stack_size - frame.base();
        if pop_count > 0 {
            self.emit(Instruction::Pop(pop_count));
        }
    }

    /// Compiles an `if` and its `elif`/`else` chain. Every branch jumps to its own end label,
    /// and the end labels are placed after the whole chain.
    fn compile_if(
        &mut self,
        mut pred: ExprId,
        mut scope: ScopeId,
        mut tail: Option<IfTailId>,
    ) -> CodegenResult<()> {
        let mut end_labels = Vec::new();
        loop {
            self.compile_expr(pred)?;
            let false_label = self.create_label();
            self.emit(Instruction::JumpIfZero(false_label));
            self.compile_scope(scope)?;
            let end_label = self.create_label();
            self.emit(Instruction::Jump(end_label));
            self.emit(Instruction::Label(false_label));
            end_labels.push(end_label);
            let program = self.program;
            match tail.map(|id| program.if_tail(id)) {
                Some(IfTail::Elif {
                    pred: next_pred,
                    scope: next_scope,
                    tail: next_tail,
                }) => (pred, scope, tail) = (*next_pred, *next_scope, *next_tail),
                Some(IfTail::Else(else_scope)) => {
                    self.compile_scope(*else_scope)?;
                    break;
                }
                None => break,
            }
        }
        for end_label in end_labels.into_iter().rev() {
            self.emit(Instruction::Label(end_label));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Represents an error that can occur during code generation.
pub enum CodegenError {
    /// An expression refers to a name that is not in scope.
    UndeclaredIdentifier { name: CompactString, line: u32 },
    /// An assignment targets a name that is not in scope.
    UndeclaredAssignment { name: CompactString, line: u32 },
    /// A `let` redeclares a name already bound in the same scope.
    AlreadyDeclared { name: CompactString, line: u32 },
    /// An integer literal does not fit in 64 bits.
    IntegerOutOfRange { text: CompactString, line: u32 },
    /// A jump targets a label that was never emitted. This is a bug in the code generator.
    UnresolvedLabel(Label),
    /// A label was emitted twice. This is a bug in the code generator.
    DuplicateLabel(Label),
}

impl CodegenError {
    /// The line the error occurred on, if it is tied to source code.
    pub fn line(&self) -> Option<u32> {
        match self {
            CodegenError::UndeclaredIdentifier { line, .. }
            | CodegenError::UndeclaredAssignment { line, .. }
            | CodegenError::AlreadyDeclared { line, .. }
            | CodegenError::IntegerOutOfRange { line, .. } => Some(*line),
            CodegenError::UnresolvedLabel(_) | CodegenError::DuplicateLabel(_) => None,
        }
    }
}

impl std::error::Error for CodegenError {}

impl std::fmt::Display for CodegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodegenError::UndeclaredIdentifier { name, line } => {
                write!(f, "undeclared identifier `{name}` on line {line}")
            }
            CodegenError::UndeclaredAssignment { name, line } => write!(
                f,
                "assignment to undeclared identifier `{name}` on line {line}"
            ),
            CodegenError::AlreadyDeclared { name, line } => write!(
                f,
                "identifier `{name}` on line {line} is already declared in this scope"
            ),
            CodegenError::IntegerOutOfRange { text, line } => write!(
                f,
                "integer literal {text} on line {line} does not fit in 64 bits"
            ),
            CodegenError::UnresolvedLabel(label) => write!(f, "jump to unresolved {label}"),
            CodegenError::DuplicateLabel(label) => write!(f, "{label} is defined twice"),
        }
    }
}
