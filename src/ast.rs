use std::fmt;
use std::rc::Rc;

use crate::diagnostic::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Greater => ">",
            BinaryOp::Less => "<",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::LessEq => "<=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(Rc<str>),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Lambda(Rc<FunctionDecl>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `object.method(args)`; the receiver is evaluated once and bound as `this`.
    MethodCall {
        object: Box<Expr>,
        method: Rc<str>,
        args: Vec<Expr>,
    },
    Array {
        elements: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        field: Rc<str>,
    },
    Input {
        prompt: Option<Box<Expr>>,
    },
    Grouped(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Variable(Rc<str>),
    Member { object: Expr, field: Rc<str> },
    Index { target: Expr, index: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

/// Shared by `def` statements, class methods and lambdas. Lambdas have no name.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    pub body: FunctionBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Rc<str>,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Rc<str>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<Rc<FunctionDecl>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Rc<str>,
    pub fields: Vec<Rc<str>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: Rc<str>,
        value: Expr,
        span: Span,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    Print {
        args: Vec<Expr>,
        span: Span,
    },
    Delete {
        name: Rc<str>,
        span: Span,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Function(Rc<FunctionDecl>),
    Class(Rc<ClassDecl>),
    Struct(Rc<StructDecl>),
    Return(Option<Expr>),
    /// Consecutive `parallel { .. }` blocks; each block is one task.
    Parallel {
        tasks: Vec<Vec<Stmt>>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Stmt {
    /// Short statement kind for trace logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Let { .. } => "let",
            Stmt::Assign { .. } => "assign",
            Stmt::Expr(_) => "expr",
            Stmt::Print { .. } => "print",
            Stmt::Delete { .. } => "delete",
            Stmt::Block(_) => "block",
            Stmt::If { .. } => "if",
            Stmt::While { .. } => "while",
            Stmt::For { .. } => "for",
            Stmt::Function(_) => "def",
            Stmt::Class(_) => "class",
            Stmt::Struct(_) => "struct",
            Stmt::Return(_) => "return",
            Stmt::Parallel { .. } => "parallel",
        }
    }
}
