//! Dual construction and the dual simplex method.

use log::{debug, info, warn};

use crate::config::{DUAL_MAX_ITERATIONS, TOLERANCE};
use crate::error::SolverError;
use crate::problem::{Constraint, LinearProblem, ObjectiveType, Relation};
use crate::solution::{Iteration, SolutionStatus};
use crate::tableau::{record_pivot, Tableau};

/// Result of solving the dual of a primal problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DualSolution {
    /// The constructed dual problem
    pub dual: LinearProblem,
    /// Status of the dual problem. A dual `Unbounded` means the primal is
    /// infeasible, a dual `Infeasible` means the primal is unbounded or infeasible.
    pub status: SolutionStatus,
    /// Primal optimum, equal to the dual optimum when both exist
    pub objective_value: Option<f64>,
    /// Dual objective at the last tableau, in the dual's own sense
    pub dual_objective_value: f64,
    /// Shadow prices, one per primal constraint
    pub dual_values: Vec<DualVariable>,
    pub iteration_count: usize,
    pub iterations: Vec<Iteration>,
}

/// A dual variable and the primal constraint it prices.
///
/// The price refers to the constraint after it was rewritten in symmetric
/// form, so a `>=` row of a maximization reports the price of its negation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DualVariable {
    pub name: String,
    pub constraint: String,
    pub value: f64,
}

impl DualSolution {
    /// Value of the dual variable called `name`.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.dual_values.iter().find(|y| y.name == name).map(|y| y.value)
    }
}

/// Build the dual of `primal`.
///
/// Constraints are first put in symmetric form (`<=` for a maximization,
/// `>=` for a minimization) by negating rows that point the other way.
/// Equality constraints have a free dual variable and are rejected.
pub fn build_dual(primal: &LinearProblem) -> Result<LinearProblem, SolverError> {
    primal.validate()?;

    let wanted = match primal.objective_type {
        ObjectiveType::Max => Relation::Le,
        ObjectiveType::Min => Relation::Ge,
    };
    let mut symmetric: Vec<Constraint> = Vec::with_capacity(primal.num_constraints());
    for c in &primal.constraints {
        if c.relation == Relation::Eq {
            return Err(SolverError::UnsupportedRelation {
                constraint: c.name.clone(),
                relation: c.relation,
                expected: "<= or >=",
            });
        }
        symmetric.push(if c.relation == wanted { c.clone() } else { c.negated() });
    }

    let dual_type = primal.objective_type.opposite();
    let dual_relation = match dual_type {
        ObjectiveType::Min => Relation::Ge,
        ObjectiveType::Max => Relation::Le,
    };

    let variables = (1..=symmetric.len()).map(|i| format!("y{}", i)).collect();
    let objective = symmetric.iter().map(|c| c.rhs).collect();
    let mut dual = LinearProblem::with_variables(variables, dual_type, objective);
    for (j, name) in primal.variables.iter().enumerate() {
        let column = symmetric.iter().map(|c| c.coefficients[j]).collect();
        dual.add_named_constraint(name.clone(), column, dual_relation, primal.objective[j]);
    }
    Ok(dual)
}

pub struct DualSimplexSolver {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for DualSimplexSolver {
    fn default() -> Self {
        Self {
            max_iterations: DUAL_MAX_ITERATIONS,
            tolerance: TOLERANCE,
        }
    }
}

impl DualSimplexSolver {
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

    /// Build the dual of `primal` and solve it.
    pub fn solve(&self, primal: &LinearProblem) -> Result<DualSolution, SolverError> {
        let dual = build_dual(primal)?;
        let mut tableau = dual_tableau(&dual);
        let mut iterations = vec![Iteration::initial(
            &tableau,
            format!("Initial tableau of the dual ({} {})", dual.objective_type, dual.num_variables()),
        )];

        let status = self.iterate(&mut tableau, &mut iterations)?;
        let sign = dual.objective_type.sign();
        let dual_objective_value = sign * tableau.objective_value();

        let dual_values = primal
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| DualVariable {
                name: dual.variables[i].clone(),
                constraint: c.name.clone(),
                value: if status == SolutionStatus::Optimal {
                    tableau.value_of(i)
                } else {
                    0.0
                },
            })
            .collect();

        let objective_value = (status == SolutionStatus::Optimal).then_some(dual_objective_value);
        info!(
            "dual: {} after {} iterations, objective {:?}",
            status,
            iterations.len() - 1,
            objective_value
        );

        Ok(DualSolution {
            dual,
            status,
            objective_value,
            dual_objective_value,
            dual_values,
            iteration_count: iterations.len() - 1,
            iterations,
        })
    }

    /// Dual ratio steps while a right-hand side is negative, primal steps otherwise.
    fn iterate(&self, tableau: &mut Tableau, history: &mut Vec<Iteration>) -> Result<SolutionStatus, SolverError> {
        let tol = self.tolerance;
        for _ in 0..self.max_iterations {
            if let Some(row) = tableau.dual_leaving_row(tol) {
                let Some(col) = tableau.dual_entering_column(row, tol) else {
                    debug!("dual: row {} has no negative entry", row + 1);
                    return Ok(SolutionStatus::Infeasible);
                };
                record_pivot(tableau, row, col, history)?;
                continue;
            }

            let Some(col) = tableau.entering_column(tol) else {
                return Ok(SolutionStatus::Optimal);
            };
            let Some(row) = tableau.leaving_row(col, tol) else {
                debug!("dual: column {} has no positive entry", tableau.columns()[col]);
                return Ok(SolutionStatus::Unbounded);
            };
            record_pivot(tableau, row, col, history)?;
        }

        if tableau.dual_leaving_row(tol).is_none() && tableau.entering_column(tol).is_none() {
            Ok(SolutionStatus::Optimal)
        } else {
            warn!("dual: stopped after {} iterations", self.max_iterations);
            Ok(SolutionStatus::IterationLimit)
        }
    }
}

/// Slack basis tableau for the dual. `>=` rows are negated so every slack
/// enters with +1, leaving negative right-hand sides for the dual ratio test.
fn dual_tableau(dual: &LinearProblem) -> Tableau {
    let n = dual.num_variables();
    let m = dual.num_constraints();

    let mut columns = dual.variables.clone();
    columns.extend((1..=m).map(|i| format!("s{}", i)));

    let rows = dual
        .constraints
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let sign = if c.relation == Relation::Ge { -1.0 } else { 1.0 };
            let mut row = vec![0.0; n + m + 1];
            for (j, &a) in c.coefficients.iter().enumerate() {
                row[j] = sign * a;
            }
            row[n + i] = 1.0;
            row[n + m] = sign * c.rhs;
            row
        })
        .collect();

    let sign = dual.objective_type.sign();
    let mut objective = vec![0.0; n + m + 1];
    for (j, &b) in dual.objective.iter().enumerate() {
        objective[j] = -sign * b;
    }

    Tableau::new(columns, rows, objective, (n..n + m).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplex::SimplexSolver;

    fn textbook() -> LinearProblem {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![3.0, 5.0]);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 4.0);
        problem.add_constraint(vec![0.0, 2.0], Relation::Le, 12.0);
        problem.add_constraint(vec![3.0, 2.0], Relation::Le, 18.0);
        problem
    }

    #[test]
    fn test_build_dual_transposes() {
        let dual = build_dual(&textbook()).unwrap();

        assert_eq!(dual.objective_type, ObjectiveType::Min);
        assert_eq!(dual.variables, vec!["y1", "y2", "y3"]);
        assert_eq!(dual.objective, vec![4.0, 12.0, 18.0]);
        assert_eq!(dual.num_constraints(), 2);
        assert_eq!(dual.constraints[0].name, "x1");
        assert_eq!(dual.constraints[0].coefficients, vec![1.0, 0.0, 3.0]);
        assert_eq!(dual.constraints[1].coefficients, vec![0.0, 2.0, 2.0]);
        assert_eq!(dual.constraints[1].relation, Relation::Ge);
        assert_eq!(dual.constraints[1].rhs, 5.0);
    }

    #[test]
    fn test_shadow_prices() {
        let _ = env_logger::builder().is_test(true).try_init();

        let solution = DualSimplexSolver::new().solve(&textbook()).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 36.0).abs() < 1e-6);
        assert!(solution.value("y1").unwrap().abs() < 1e-6);
        assert!((solution.value("y2").unwrap() - 1.5).abs() < 1e-6);
        assert!((solution.value("y3").unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(solution.dual_values[2].constraint, "R3");
        assert_eq!(solution.iteration_count, 2);
    }

    #[test]
    fn test_strong_duality_against_simplex() {
        let mut min = LinearProblem::new(ObjectiveType::Min, vec![1.0, -2.0]);
        min.add_constraint(vec![1.0, 1.0], Relation::Le, 4.0);
        min.add_constraint(vec![0.0, 1.0], Relation::Le, 3.0);

        let mut max = LinearProblem::new(ObjectiveType::Max, vec![2.0, 3.0, 1.0]);
        max.add_constraint(vec![1.0, 1.0, 1.0], Relation::Le, 10.0);
        max.add_constraint(vec![2.0, 1.0, 0.0], Relation::Le, 14.0);
        max.add_constraint(vec![0.0, 1.0, 3.0], Relation::Le, 12.0);

        for problem in [textbook(), min, max] {
            let primal = SimplexSolver::new().solve(&problem).unwrap();
            let dual = DualSimplexSolver::new().solve(&problem).unwrap();
            assert_eq!(dual.status, SolutionStatus::Optimal);
            let p = primal.objective_value.unwrap();
            let d = dual.objective_value.unwrap();
            assert!((p - d).abs() < 1e-3, "primal {} vs dual {}", p, d);
        }
    }

    #[test]
    fn test_minimization_dual_value() {
        let mut problem = LinearProblem::new(ObjectiveType::Min, vec![1.0, -2.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 4.0);
        problem.add_constraint(vec![0.0, 1.0], Relation::Le, 3.0);

        let solution = DualSimplexSolver::new().solve(&problem).unwrap();

        assert_eq!(solution.dual.objective_type, ObjectiveType::Max);
        assert!((solution.objective_value.unwrap() + 6.0).abs() < 1e-6);
        assert!((solution.value("y2").unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_primal_gives_unbounded_dual() {
        // min x1 st x1 >= 2, x1 <= 1
        let mut problem = LinearProblem::new(ObjectiveType::Min, vec![1.0]);
        problem.add_constraint(vec![1.0], Relation::Ge, 2.0);
        problem.add_constraint(vec![1.0], Relation::Le, 1.0);

        let solution = DualSimplexSolver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Unbounded);
        assert!(solution.objective_value.is_none());
    }

    #[test]
    fn test_unbounded_primal_gives_infeasible_dual() {
        // max x1 + x2 st x1 - x2 <= 1
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, -1.0], Relation::Le, 1.0);

        let solution = DualSimplexSolver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert_eq!(solution.iteration_count, 1);
    }

    #[test]
    fn test_rejects_equality() {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0]);
        problem.add_constraint(vec![1.0], Relation::Eq, 1.0);

        let err = DualSimplexSolver::new().solve(&problem).unwrap_err();
        assert!(matches!(err, SolverError::UnsupportedRelation { .. }));
    }
}
