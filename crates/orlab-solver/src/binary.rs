//! Exhaustive 0/1 enumeration for small knapsack-style models.

use log::{debug, info};

use crate::config::{BINARY_MAX_VARIABLES, BINARY_VARIABLE_LIMIT, TOLERANCE};
use crate::error::SolverError;
use crate::problem::LinearProblem;
use crate::solution::{SolutionStatus, VariableValue};

/// A feasible 0/1 vector and its objective
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryCandidate {
    pub values: Vec<u8>,
    pub objective: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySolution {
    /// `Optimal` or `Infeasible`
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    pub variable_values: Vec<VariableValue>,
    /// Every feasible vector, in enumeration order
    pub candidates: Vec<BinaryCandidate>,
    /// Number of vectors checked, always `2^n`
    pub evaluated: usize,
}

impl BinarySolution {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.variable_values.iter().find(|v| v.name == name).map(|v| v.value)
    }
}

pub struct BinarySolver {
    max_variables: usize,
    tolerance: f64,
}

impl Default for BinarySolver {
    fn default() -> Self {
        Self {
            max_variables: BINARY_MAX_VARIABLES,
            tolerance: TOLERANCE,
        }
    }
}

impl BinarySolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise or lower the variable cap; never above 20.
    pub fn with_max_variables(mut self, max: usize) -> Self {
        self.max_variables = max.min(BINARY_VARIABLE_LIMIT);
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn solve(&self, problem: &LinearProblem) -> Result<BinarySolution, SolverError> {
        problem.validate()?;
        let n = problem.num_variables();
        if n > self.max_variables {
            return Err(SolverError::TooManyBinaryVariables {
                limit: self.max_variables,
                found: n,
            });
        }

        let sign = problem.objective_type.sign();
        let total = 1usize << n;
        let mut candidates = Vec::new();
        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut point = vec![0.0; n];

        // Bit j of the mask is variable j.
        for mask in 0..total {
            for (j, x) in point.iter_mut().enumerate() {
                *x = ((mask >> j) & 1) as f64;
            }
            if !problem.is_feasible(&point, self.tolerance) {
                continue;
            }
            let objective = problem.evaluate(&point);
            candidates.push(BinaryCandidate {
                values: point.iter().map(|&x| x as u8).collect(),
                objective,
            });
            if best.as_ref().is_none_or(|(_, z)| sign * objective > sign * z) {
                best = Some((point.clone(), objective));
            }
        }
        debug!("binary: {} of {} vectors feasible", candidates.len(), total);

        let Some((values, objective)) = best else {
            info!("binary: infeasible after {} vectors", total);
            return Ok(BinarySolution {
                status: SolutionStatus::Infeasible,
                objective_value: None,
                variable_values: Vec::new(),
                candidates,
                evaluated: total,
            });
        };

        info!("binary: optimum {} over {} vectors", objective, total);
        Ok(BinarySolution {
            status: SolutionStatus::Optimal,
            objective_value: Some(objective),
            variable_values: problem
                .variables
                .iter()
                .zip(values)
                .map(|(name, v)| VariableValue::new(name.clone(), v))
                .collect(),
            candidates,
            evaluated: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ObjectiveType, Relation};

    #[test]
    fn test_knapsack() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![60.0, 100.0, 120.0]);
        problem.add_constraint(vec![10.0, 20.0, 30.0], Relation::Le, 50.0);

        let solution = BinarySolver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.objective_value, Some(220.0));
        assert_eq!(solution.value("x1"), Some(0.0));
        assert_eq!(solution.value("x2"), Some(1.0));
        assert_eq!(solution.value("x3"), Some(1.0));
        assert_eq!(solution.evaluated, 8);
        // Only taking all three items (weight 60) is infeasible.
        assert_eq!(solution.candidates.len(), 7);
    }

    #[test]
    fn test_minimization_tie_keeps_first() {
        // min x1 + x2 st x1 + x2 >= 1: (1, 0) is found before (0, 1)
        let mut problem = LinearProblem::new(ObjectiveType::Min, vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Ge, 1.0);

        let solution = BinarySolver::new().solve(&problem).unwrap();

        assert_eq!(solution.objective_value, Some(1.0));
        assert_eq!(solution.value("x1"), Some(1.0));
        assert_eq!(solution.value("x2"), Some(0.0));
    }

    #[test]
    fn test_infeasible() {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0]);
        problem.add_constraint(vec![1.0], Relation::Ge, 2.0);

        let solution = BinarySolver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.candidates.is_empty());
        assert_eq!(solution.evaluated, 2);
    }

    #[test]
    fn test_variable_cap() {
        let problem = LinearProblem::new(ObjectiveType::Max, vec![1.0; 17]);
        let err = BinarySolver::new().solve(&problem).unwrap_err();
        assert_eq!(err, SolverError::TooManyBinaryVariables { limit: 16, found: 17 });

        let solver = BinarySolver::new().with_max_variables(64);
        let err = solver.solve(&LinearProblem::new(ObjectiveType::Max, vec![1.0; 21])).unwrap_err();
        assert_eq!(err, SolverError::TooManyBinaryVariables { limit: 20, found: 21 });
    }
}
