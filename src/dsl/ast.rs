use serde::Serialize;

use super::span::Span;
use super::types::{PrimitiveType, Type};

/// A sequence of scripts parsed from one source file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptFile {
    pub scripts: Vec<Script>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    pub text: String,
    pub span: Span,
}

impl Ident {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Annotation {
    pub name: Ident,
    pub value: i32,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub annotations: Vec<Annotation>,
    pub trigger: Ident,
    pub name: Ident,
    pub params: Vec<Param>,
    pub returns: Type,
    pub body: Block,
    pub span: Span,
}

impl Script {
    /// Symbol-table key, `[trigger,name]`.
    pub fn full_name(&self) -> String {
        format!("[{},{}]", self.trigger.text, self.name.text)
    }

    pub fn param_types(&self) -> Vec<PrimitiveType> {
        self.params.iter().map(|p| p.ty).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub ty: PrimitiveType,
    pub name: Ident,
    pub span: Span,
    /// Set by the checker.
    pub local: Option<Local>,
}

/// A resolved local variable. Identity is the id; equal names in different
/// scopes are different locals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Local {
    pub id: u32,
    pub name: String,
    pub ty: PrimitiveType,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum StmtKind {
    Block(Block),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Continue,
    Break,
    Return(Vec<Expr>),
    /// `def_<type> $name [= expr];`
    Declare {
        ty: PrimitiveType,
        name: Ident,
        init: Option<Expr>,
        local: Option<Local>,
    },
    /// `def_<type> $name(size);`
    DeclareArray {
        ty: PrimitiveType,
        name: Ident,
        size: Expr,
        array: Option<u8>,
    },
    /// `$a, %g, $arr(i) = e1, e2, e3;`
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
    },
    Switch(Switch),
    Expr(Expr),
}

#[derive(Debug, Clone, Serialize)]
pub struct Switch {
    pub ty: PrimitiveType,
    pub condition: Expr,
    pub cases: Vec<SwitchCase>,
    pub default: Option<SwitchCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchCase {
    /// Empty for the default case.
    pub keys: Vec<Expr>,
    pub body: Block,
    pub span: Span,
    /// Key values computed by the checker, in order.
    pub key_values: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Or,
    And,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::LessThan | BinaryOp::GreaterThan | BinaryOp::LessThanOrEqual | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equals | BinaryOp::NotEquals)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "|",
            BinaryOp::And => "&",
            BinaryOp::Equals => "=",
            BinaryOp::NotEquals => "!",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Filled in by the checker; `undefined` until then.
    pub ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: Type::UNDEFINED,
        }
    }

    pub fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, span)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Hook {
    pub name: Ident,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Serialize)]
pub enum ExprKind {
    Int(i32),
    Long(i64),
    Str(String),
    Bool(bool),
    Coordgrid(i32),
    Null,
    Local {
        name: Ident,
        local: Option<Local>,
    },
    ArrayElement {
        name: Ident,
        index: Box<Expr>,
        array: Option<u8>,
    },
    Global {
        name: Ident,
    },
    Constant {
        name: Ident,
    },
    /// A bare name: a no-argument command or a config reference.
    Dynamic {
        name: Ident,
        /// Config id, set by the checker when the name resolves to a config.
        config: Option<i32>,
    },
    Command {
        name: Ident,
        args: Vec<Expr>,
        alternative: bool,
    },
    /// `~proc(args)` or `@label(args)`.
    Call {
        trigger: String,
        name: Ident,
        args: Vec<Expr>,
    },
    /// `None` for a `null` hook.
    Hook(Option<Hook>),
    Concat(Vec<Expr>),
    Calc(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Error,
}
