//! Big-M method for problems mixing `<=`, `>=` and `=` constraints.
//!
//! Every `>=` row gets a surplus and an artificial column, every `=` row an
//! artificial column. Artificials carry a penalty of `M` in the objective, so
//! any optimum that still uses one means the original problem is infeasible.

use log::{debug, info, warn};

use crate::config::{ARTIFICIAL_TOLERANCE, BIG_M, BIG_M_MAX_ITERATIONS};
use crate::error::SolverError;
use crate::problem::{Constraint, LinearProblem, Relation};
use crate::solution::{Iteration, Solution, SolutionStatus, VariableValue};
use crate::tableau::{run_primal, Outcome, Tableau};

pub struct BigMSolver {
    max_iterations: usize,
    /// Entering/ratio tolerance and the zero threshold for artificials
    tolerance: f64,
    penalty: f64,
}

impl Default for BigMSolver {
    fn default() -> Self {
        Self {
            max_iterations: BIG_M_MAX_ITERATIONS,
            tolerance: ARTIFICIAL_TOLERANCE,
            penalty: BIG_M,
        }
    }
}

/// Where the auxiliary columns of each constraint row live.
struct Layout {
    columns: Vec<String>,
    num_structural: usize,
    /// Slack and surplus column indices, in column order
    auxiliary: Vec<usize>,
    /// Artificial column indices, in column order
    artificial: Vec<usize>,
}

impl BigMSolver {
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

    /// Override the artificial penalty `M`.
    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn solve(&self, problem: &LinearProblem) -> Result<Solution, SolverError> {
        problem.validate()?;

        let constraints: Vec<Constraint> = problem
            .constraints
            .iter()
            .map(|c| if c.rhs < 0.0 { c.negated() } else { c.clone() })
            .collect();

        let (mut tableau, layout) = self.build_tableau(problem, &constraints);
        let mut iterations = vec![Iteration::initial(
            &tableau,
            format!(
                "Initial tableau with M = {} and artificial columns eliminated from the objective",
                self.penalty
            ),
        )];

        let outcome = run_primal(&mut tableau, self.max_iterations, self.tolerance, &mut iterations)?;
        let status = match outcome {
            Outcome::Unbounded { column } => {
                info!("big-m: unbounded along {}", tableau.columns()[column]);
                return Ok(Solution::unbounded(iterations));
            }
            Outcome::IterationLimit => {
                warn!("big-m: stopped after {} iterations without reaching optimality", self.max_iterations);
                SolutionStatus::IterationLimit
            }
            Outcome::Optimal | Outcome::Infeasible { .. } => SolutionStatus::Optimal,
        };

        let artificials: Vec<VariableValue> = layout
            .artificial
            .iter()
            .filter(|&&col| tableau.basic_row(col).is_some())
            .map(|&col| VariableValue::new(tableau.columns()[col].clone(), tableau.value_of(col)))
            .filter(|a| a.value > self.tolerance)
            .collect();

        if status == SolutionStatus::Optimal && !artificials.is_empty() {
            info!(
                "big-m: infeasible, artificials still basic: {}",
                artificials
                    .iter()
                    .map(|a| format!("{}={}", a.name, a.value))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(Solution::infeasible(artificials, iterations));
        }

        let variable_values = (0..layout.num_structural)
            .map(|j| VariableValue::new(layout.columns[j].clone(), tableau.value_of(j)))
            .collect();
        let slack_values = layout
            .auxiliary
            .iter()
            .map(|&col| VariableValue::new(layout.columns[col].clone(), tableau.value_of(col)))
            .collect();

        let objective_value = problem.objective_type.sign() * tableau.objective_value();
        info!(
            "big-m: {} after {} iterations, objective {}",
            status,
            iterations.len() - 1,
            objective_value
        );

        Ok(Solution {
            status,
            objective_value: Some(objective_value),
            variable_values,
            slack_values,
            // Non-empty only when the cap stopped the solve before the artificials left the basis.
            artificials,
            iteration_count: iterations.len() - 1,
            iterations,
        })
    }

    fn build_tableau(&self, problem: &LinearProblem, constraints: &[Constraint]) -> (Tableau, Layout) {
        let n = problem.num_variables();
        let count = |rel: Relation| constraints.iter().filter(|c| c.relation == rel).count();
        let num_le = count(Relation::Le);
        let num_ge = count(Relation::Ge);
        let num_art = num_ge + count(Relation::Eq);

        let slack_start = n;
        let surplus_start = slack_start + num_le;
        let art_start = surplus_start + num_ge;
        let width = art_start + num_art;

        let mut columns = problem.variables.clone();
        columns.extend((1..=num_le).map(|k| format!("s{}", k)));
        columns.extend((1..=num_ge).map(|k| format!("e{}", k)));
        columns.extend((1..=num_art).map(|k| format!("A{}", k)));

        let mut rows = Vec::with_capacity(constraints.len());
        let mut basis = Vec::with_capacity(constraints.len());
        let (mut le, mut ge, mut art) = (0, 0, 0);
        for c in constraints {
            let mut row = vec![0.0; width + 1];
            row[..n].copy_from_slice(&c.coefficients);
            row[width] = c.rhs;
            match c.relation {
                Relation::Le => {
                    row[slack_start + le] = 1.0;
                    basis.push(slack_start + le);
                    le += 1;
                }
                Relation::Ge => {
                    row[surplus_start + ge] = -1.0;
                    row[art_start + art] = 1.0;
                    basis.push(art_start + art);
                    ge += 1;
                    art += 1;
                }
                Relation::Eq => {
                    row[art_start + art] = 1.0;
                    basis.push(art_start + art);
                    art += 1;
                }
            }
            rows.push(row);
        }

        let sign = problem.objective_type.sign();
        let mut objective = vec![0.0; width + 1];
        for (j, &coef) in problem.objective.iter().enumerate() {
            objective[j] = -sign * coef;
        }
        for entry in &mut objective[art_start..width] {
            *entry = self.penalty;
        }

        let mut tableau = Tableau::new(columns.clone(), rows, objective, basis.clone());
        for (row, &col) in basis.iter().enumerate() {
            if col >= art_start {
                tableau.eliminate_from_objective(row, self.penalty);
            }
        }
        debug!("big-m: {} columns, {} artificials", width, num_art);

        let layout = Layout {
            columns,
            num_structural: n,
            auxiliary: (slack_start..art_start).collect(),
            artificial: (art_start..width).collect(),
        };
        (tableau, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ObjectiveType;

    #[test]
    fn test_contradictory_equalities_are_infeasible() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Eq, 2.0);
        problem.add_constraint(vec![1.0, 1.0], Relation::Eq, 5.0);

        let solution = BigMSolver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.objective_value.is_none());
        assert_eq!(solution.artificials.len(), 1);
        assert_eq!(solution.artificials[0].name, "A2");
        assert!((solution.artificials[0].value - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_mixed_relations_minimum() {
        // min 2x1 + 3x2 st x1 + x2 >= 4, x1 <= 3 -> (3, 1), z = 9
        let mut problem = LinearProblem::new(ObjectiveType::Min, vec![2.0, 3.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Ge, 4.0);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 3.0);

        let solution = BigMSolver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 9.0).abs() < 1e-6);
        assert!((solution.value("x1").unwrap() - 3.0).abs() < 1e-6);
        assert!((solution.value("x2").unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(solution.iteration_count, 2);
    }

    #[test]
    fn test_iteration_limit_with_basic_artificial() {
        let mut problem = LinearProblem::new(ObjectiveType::Min, vec![2.0, 3.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Ge, 4.0);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 3.0);

        let solution = BigMSolver::new().with_max_iterations(1).solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::IterationLimit);
        assert_eq!(solution.iteration_count, 1);
        assert_eq!(solution.artificials.len(), 1);
        assert_eq!(solution.artificials[0].name, "A1");
        assert!((solution.artificials[0].value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_column_order() {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Ge, 1.0);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 3.0);
        problem.add_constraint(vec![0.0, 1.0], Relation::Eq, 2.0);

        let solution = BigMSolver::new().solve(&problem).unwrap();
        let initial = &solution.iterations[0].tableau;

        assert_eq!(initial.columns(), ["x1", "x2", "s1", "e1", "A1", "A2"]);
        assert_eq!(initial.basis_labels(), vec!["A1", "s1", "A2"]);
        // Artificial columns start with a zero reduced cost.
        assert_eq!(initial.objective_row()[4], 0.0);
        assert_eq!(initial.objective_row()[5], 0.0);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_rhs_is_normalized() {
        // -x1 - x2 <= -4 is x1 + x2 >= 4
        let mut problem = LinearProblem::new(ObjectiveType::Min, vec![2.0, 3.0]);
        problem.add_constraint(vec![-1.0, -1.0], Relation::Le, -4.0);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 3.0);

        let solution = BigMSolver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 9.0).abs() < 1e-6);
        assert_eq!(solution.iterations[0].tableau.columns()[3], "e1");
    }

    #[test]
    fn test_unbounded() {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0, 0.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Ge, 2.0);

        let solution = BigMSolver::new().solve(&problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_matches_simplex_on_le_problems() {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![3.0, 5.0]);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 4.0);
        problem.add_constraint(vec![0.0, 2.0], Relation::Le, 12.0);
        problem.add_constraint(vec![3.0, 2.0], Relation::Le, 18.0);

        let solution = BigMSolver::new().solve(&problem).unwrap();
        assert!((solution.objective_value.unwrap() - 36.0).abs() < 1e-6);
    }
}
