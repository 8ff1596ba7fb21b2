use orlab_solver::Relation;

use crate::lexer::Span;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Lp(LpModel),
    Assignment(AssignmentModel),
    Transport(TransportModel),
}

impl Item {
    pub fn name(&self) -> &str {
        match self {
            Item::Lp(m) => &m.name,
            Item::Assignment(m) => &m.name,
            Item::Transport(m) => &m.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Item::Lp(m) => m.span,
            Item::Assignment(m) => m.span,
            Item::Transport(m) => m.span,
        }
    }

    /// Keyword that introduced the model.
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Lp(_) => "lp",
            Item::Assignment(_) => "assignment",
            Item::Transport(_) => "transport",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LpModel {
    pub span: Span,
    pub name: String,
    pub objective: Option<Objective>,
    pub constraints: Vec<ConstraintDecl>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub span: Span,
    pub sense: Sense,
    pub expr: Expr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

/// `[label:] lhs relation rhs`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDecl {
    pub span: Span,
    pub label: Option<String>,
    pub lhs: Expr,
    pub relation: Relation,
    pub rhs: Expr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentModel {
    pub span: Span,
    pub name: String,
    pub rows: Option<Vec<String>>,
    pub cols: Option<Vec<String>>,
    pub costs: Option<Vec<Vec<f64>>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportModel {
    pub span: Span,
    pub name: String,
    pub sources: Option<Vec<String>>,
    pub destinations: Option<Vec<String>>,
    pub supply: Option<Vec<f64>>,
    pub demand: Option<Vec<f64>>,
    pub costs: Option<Vec<Vec<f64>>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable { name: String, span: Span },
    Neg(Box<Expr>),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Paren(Box<Expr>),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Variable { name, .. } => write!(f, "{}", name),
            Expr::Neg(inner) => write!(f, "-{}", inner),
            Expr::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Paren(inner) => write!(f, "({})", inner),
        }
    }
}
