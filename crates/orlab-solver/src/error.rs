use thiserror::Error;

use crate::problem::Relation;

/// Precondition failures reported by the solvers before any pivoting starts.
///
/// Unbounded, infeasible and iteration-capped outcomes are not errors; they
/// are carried by [`crate::SolutionStatus`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Problem has no variables")]
    NoVariables,
    #[error("Objective has {found} coefficients but {expected} variables are declared")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint {constraint} has {found} coefficients, expected {expected}")]
    ConstraintLength {
        constraint: String,
        expected: usize,
        found: usize,
    },
    #[error("Variable name {0} is reserved for generated slack, surplus and artificial columns")]
    ReservedName(String),
    #[error("Non-finite value in {0}")]
    NonFinite(String),
    #[error("Constraint {constraint} uses {relation}; this method only accepts {expected} constraints")]
    UnsupportedRelation {
        constraint: String,
        relation: Relation,
        expected: &'static str,
    },
    #[error("Constraint {constraint} has negative right-hand side {rhs}; the simplex method needs rhs >= 0")]
    NegativeRhs { constraint: String, rhs: f64 },
    #[error("Pivot element at row {row}, column {col} is zero")]
    ZeroPivot { row: usize, col: usize },
    #[error("The graphical method requires exactly 2 variables, got {0}")]
    GraphicalVariableCount(usize),
    #[error("No feasible vertices")]
    NoFeasibleVertices,
    #[error("Cost matrix is empty")]
    EmptyMatrix,
    #[error("Row {row} of the cost matrix has {found} entries, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Cost at row {row}, column {col} must be a finite non-negative number, got {value}")]
    InvalidCost { row: usize, col: usize, value: f64 },
    #[error("Expected {expected} labels for {axis}, got {found}")]
    LabelCount {
        axis: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Assignment did not converge within {0} adjustments")]
    AssignmentLimit(usize),
    #[error("Transport problem needs at least one source and one destination")]
    EmptyTransport,
    #[error("{kind} {index} must be a finite non-negative amount, got {value}")]
    InvalidAmount {
        kind: &'static str,
        index: usize,
        value: f64,
    },
    #[error("Cost table is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    CostShape {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },
    #[error("Total supply {supply} does not match total demand {demand}")]
    Unbalanced { supply: f64, demand: f64 },
    #[error("Binary enumeration supports at most {limit} variables, got {found}")]
    TooManyBinaryVariables { limit: usize, found: usize },
}
