pub mod config;
mod big_m;
mod binary;
mod dual;
mod error;
mod graphical;
mod hungarian;
mod northwest;
mod problem;
mod simplex;
mod solution;
mod tableau;

pub use big_m::BigMSolver;
pub use binary::{BinaryCandidate, BinarySolution, BinarySolver};
pub use dual::{build_dual, DualSimplexSolver, DualSolution, DualVariable};
pub use error::SolverError;
pub use graphical::{GraphicalSolution, GraphicalSolver, Intersection, Line, Point, Vertex};
pub use hungarian::{
    Assignment, AssignmentSolution, CostMatrix, CoverStrategy, HungarianAction, HungarianSolver,
    HungarianStep,
};
pub use northwest::{NorthwestCorner, TransportProblem, TransportSolution, TransportStep};
pub use problem::{Constraint, LinearProblem, ObjectiveType, Relation};
pub use simplex::SimplexSolver;
pub use solution::{Iteration, Solution, SolutionStatus, VariableValue};
pub use tableau::Tableau;
