//! Shared syntax tree used by every backend.
//!
//! The parser builds these nodes once; the interpreter walks them directly
//! while the printers and code generators lower them into text listings.

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub name: String,
    pub functions: Vec<FuncDef>,
    pub main: StmtList,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: StmtList,
    pub return_expr: Expression,
}

/// A non-empty, `;`-terminated statement sequence.
#[derive(Debug, PartialEq, Clone)]
pub struct StmtList {
    pub statements: Vec<Statement>,
}

impl StmtList {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }
}

impl<'a> IntoIterator for &'a StmtList {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Declare {
        name: String,
        size: Option<Expression>,
        init: Option<Expression>,
    },
    Assign {
        target: AssignTarget,
        value: Expression,
    },
    If {
        condition: Expression,
        then_body: StmtList,
        else_body: Option<StmtList>,
    },
    While {
        condition: Expression,
        body: StmtList,
    },
    Input(Vec<String>),
    Output(Vec<Expression>),
    Call(Call),
}

/// Assignment target forms accepted by the parser.
///
/// `Deref` holds the pointer-valued operand, so `**pp = 1` stores through
/// the pointer that `*pp` evaluates to.
#[derive(Debug, PartialEq, Clone)]
pub enum AssignTarget {
    Variable(String),
    Index { array: Expression, index: Expression },
    Field { object: Expression, field: String },
    Deref(Expression),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Number(i64),
    Identifier(String),
    ArrayAccess {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    FieldAccess {
        object: Box<Expression>,
        field: String,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Call(Call),
    ArrayLiteral(Vec<Expression>),
    StructLiteral(Vec<(String, Expression)>),
    MapLiteral(Vec<(Expression, Expression)>),
    SetLiteral(Vec<Expression>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Plus,
    Minus,
    AddressOf,
    Deref,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::AddressOf => "&",
            UnaryOperator::Deref => "*",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }
}
