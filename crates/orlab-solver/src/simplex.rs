use log::{info, warn};

use crate::config::{SIMPLEX_MAX_ITERATIONS, TOLERANCE};
use crate::error::SolverError;
use crate::problem::{LinearProblem, Relation};
use crate::solution::{Iteration, Solution, SolutionStatus, VariableValue};
use crate::tableau::{run_primal, Outcome, Tableau};

/// Primal simplex solver for problems whose constraints are all `<=`
/// with a non-negative right-hand side
pub struct SimplexSolver {
    /// Maximum pivots before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for SimplexSolver {
    fn default() -> Self {
        Self {
            max_iterations: SIMPLEX_MAX_ITERATIONS,
            tolerance: TOLERANCE,
        }
    }
}

impl SimplexSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Solve `problem`, recording the initial tableau and every pivot.
    pub fn solve(&self, problem: &LinearProblem) -> Result<Solution, SolverError> {
        problem.validate()?;
        check_standard_form(problem)?;

        let mut tableau = build_tableau(problem);
        let mut iterations = vec![Iteration::initial(&tableau, "Initial tableau with slack basis")];

        let outcome = run_primal(&mut tableau, self.max_iterations, self.tolerance, &mut iterations)?;
        match outcome {
            Outcome::Unbounded { column } => {
                info!("simplex: unbounded along {}", tableau.columns()[column]);
                return Ok(Solution::unbounded(iterations));
            }
            Outcome::IterationLimit => {
                warn!("simplex: stopped after {} iterations without reaching optimality", self.max_iterations);
            }
            Outcome::Optimal | Outcome::Infeasible { .. } => {}
        }

        let status = if outcome == Outcome::IterationLimit {
            SolutionStatus::IterationLimit
        } else {
            SolutionStatus::Optimal
        };
        let solution = extract_solution(&tableau, problem, status, iterations);
        info!(
            "simplex: {} after {} iterations, objective {:?}",
            solution.status, solution.iteration_count, solution.objective_value
        );
        Ok(solution)
    }
}

/// Reject anything the slack-only tableau cannot start from.
pub(crate) fn check_standard_form(problem: &LinearProblem) -> Result<(), SolverError> {
    for c in &problem.constraints {
        if c.relation != Relation::Le {
            return Err(SolverError::UnsupportedRelation {
                constraint: c.name.clone(),
                relation: c.relation,
                expected: "<=",
            });
        }
        if c.rhs < 0.0 {
            return Err(SolverError::NegativeRhs {
                constraint: c.name.clone(),
                rhs: c.rhs,
            });
        }
    }
    Ok(())
}

/// Rows `[a | e_i | b_i]` with slack `s_i` basic, objective row `-sign * c`.
fn build_tableau(problem: &LinearProblem) -> Tableau {
    let n = problem.num_variables();
    let m = problem.num_constraints();

    let mut columns = problem.variables.clone();
    columns.extend((1..=m).map(|i| format!("s{}", i)));

    let rows = problem
        .constraints
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let mut row = vec![0.0; n + m + 1];
            row[..n].copy_from_slice(&c.coefficients);
            row[n + i] = 1.0;
            row[n + m] = c.rhs;
            row
        })
        .collect();

    let sign = problem.objective_type.sign();
    let mut objective = vec![0.0; n + m + 1];
    for (j, &coef) in problem.objective.iter().enumerate() {
        objective[j] = -sign * coef;
    }

    Tableau::new(columns, rows, objective, (n..n + m).collect())
}

fn extract_solution(
    tableau: &Tableau,
    problem: &LinearProblem,
    status: SolutionStatus,
    iterations: Vec<Iteration>,
) -> Solution {
    let n = problem.num_variables();

    let variable_values = problem
        .variables
        .iter()
        .enumerate()
        .map(|(j, name)| VariableValue::new(name.clone(), tableau.value_of(j)))
        .collect();

    let slack_values = (0..problem.num_constraints())
        .map(|i| VariableValue::new(tableau.columns()[n + i].clone(), tableau.value_of(n + i)))
        .collect();

    Solution {
        status,
        objective_value: Some(problem.objective_type.sign() * tableau.objective_value()),
        variable_values,
        slack_values,
        artificials: Vec::new(),
        iteration_count: iterations.len() - 1,
        iterations,
    }
}
