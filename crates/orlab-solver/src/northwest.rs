//! Northwest Corner rule for an initial transportation allocation.

use log::{debug, info};

use crate::config::TOLERANCE;
use crate::error::SolverError;
use crate::tableau::trim_float;

/// Balanced or unbalanced transportation table
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportProblem {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub supply: Vec<f64>,
    pub demand: Vec<f64>,
    /// `costs[i][j]` is the unit cost from source `i` to destination `j`
    pub costs: Vec<Vec<f64>>,
}

impl TransportProblem {
    /// Table with sources labelled `S1..` and destinations `D1..`.
    pub fn new(supply: Vec<f64>, demand: Vec<f64>, costs: Vec<Vec<f64>>) -> Result<Self, SolverError> {
        let sources = (1..=supply.len()).map(|i| format!("S{}", i)).collect();
        let destinations = (1..=demand.len()).map(|j| format!("D{}", j)).collect();
        Self::with_labels(sources, destinations, supply, demand, costs)
    }

    pub fn with_labels(
        sources: Vec<String>,
        destinations: Vec<String>,
        supply: Vec<f64>,
        demand: Vec<f64>,
        costs: Vec<Vec<f64>>,
    ) -> Result<Self, SolverError> {
        let problem = Self {
            sources,
            destinations,
            supply,
            demand,
            costs,
        };
        problem.validate()?;
        Ok(problem)
    }

    /// Shape and value checks. Balance is checked separately.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.supply.is_empty() || self.demand.is_empty() {
            return Err(SolverError::EmptyTransport);
        }
        for (kind, amounts) in [("Supply", &self.supply), ("Demand", &self.demand)] {
            if let Some((index, &value)) = amounts
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v < 0.0)
            {
                return Err(SolverError::InvalidAmount { kind, index, value });
            }
        }
        let shape_ok = self.costs.len() == self.supply.len()
            && self.costs.iter().all(|row| row.len() == self.demand.len());
        if !shape_ok {
            return Err(SolverError::CostShape {
                expected_rows: self.supply.len(),
                expected_cols: self.demand.len(),
                rows: self.costs.len(),
                cols: self.costs.iter().map(Vec::len).max().unwrap_or(0),
            });
        }
        for (i, row) in self.costs.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(SolverError::InvalidCost { row: i, col: j, value });
                }
            }
        }
        if self.sources.len() != self.supply.len() {
            return Err(SolverError::LabelCount {
                axis: "sources",
                expected: self.supply.len(),
                found: self.sources.len(),
            });
        }
        if self.destinations.len() != self.demand.len() {
            return Err(SolverError::LabelCount {
                axis: "destinations",
                expected: self.demand.len(),
                found: self.destinations.len(),
            });
        }
        Ok(())
    }

    pub fn total_supply(&self) -> f64 {
        self.supply.iter().sum()
    }

    pub fn total_demand(&self) -> f64 {
        self.demand.iter().sum()
    }

    /// Supply equals demand up to a relative tolerance.
    pub fn is_balanced(&self) -> bool {
        let (s, d) = (self.total_supply(), self.total_demand());
        (s - d).abs() <= TOLERANCE * s.abs().max(d.abs()).max(1.0)
    }

    /// Add a zero-cost dummy source or destination absorbing the difference.
    pub fn balanced(&self) -> TransportProblem {
        let mut problem = self.clone();
        if self.is_balanced() {
            return problem;
        }
        let gap = self.total_supply() - self.total_demand();
        if gap > 0.0 {
            problem.destinations.push("Dummy".to_string());
            problem.demand.push(gap);
            for row in &mut problem.costs {
                row.push(0.0);
            }
        } else {
            problem.sources.push("Dummy".to_string());
            problem.supply.push(-gap);
            problem.costs.push(vec![0.0; self.demand.len()]);
        }
        problem
    }
}

/// One allocation with the state of the table right after it
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportStep {
    pub index: usize,
    pub source: usize,
    pub destination: usize,
    pub amount: f64,
    pub allocation: Vec<Vec<f64>>,
    pub remaining_supply: Vec<f64>,
    pub remaining_demand: Vec<f64>,
    pub description: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSolution {
    pub problem: TransportProblem,
    pub allocation: Vec<Vec<f64>>,
    pub total_cost: f64,
    pub steps: Vec<TransportStep>,
}

impl TransportSolution {
    /// Cells that received a non-zero amount.
    pub fn occupied_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for (i, row) in self.allocation.iter().enumerate() {
            for (j, &amount) in row.iter().enumerate() {
                if amount > 0.0 {
                    cells.push((i, j));
                }
            }
        }
        cells
    }
}

pub struct NorthwestCorner {
    tolerance: f64,
}

impl Default for NorthwestCorner {
    fn default() -> Self {
        Self { tolerance: TOLERANCE }
    }
}

impl NorthwestCorner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn solve(&self, problem: &TransportProblem) -> Result<TransportSolution, SolverError> {
        problem.validate()?;
        if !problem.is_balanced() {
            return Err(SolverError::Unbalanced {
                supply: problem.total_supply(),
                demand: problem.total_demand(),
            });
        }

        let (rows, cols) = (problem.supply.len(), problem.demand.len());
        let mut supply = problem.supply.clone();
        let mut demand = problem.demand.clone();
        let mut allocation = vec![vec![0.0; cols]; rows];
        let mut steps = Vec::new();

        let (mut i, mut j) = (0, 0);
        while i < rows && j < cols {
            let amount = supply[i].min(demand[j]);
            allocation[i][j] += amount;
            supply[i] -= amount;
            demand[j] -= amount;

            let supply_done = supply[i] <= self.tolerance;
            let demand_done = demand[j] <= self.tolerance;
            let mut description = format!(
                "Allocate {} from {} to {}",
                trim_float(amount),
                problem.sources[i],
                problem.destinations[j]
            );
            match (supply_done, demand_done) {
                (true, true) => description.push_str(&format!(
                    "; {} and {} are both exhausted",
                    problem.sources[i], problem.destinations[j]
                )),
                (true, false) => description.push_str(&format!("; {} is exhausted", problem.sources[i])),
                (false, true) => description.push_str(&format!("; {} is satisfied", problem.destinations[j])),
                (false, false) => {}
            }
            if supply_done {
                supply[i] = 0.0;
            }
            if demand_done {
                demand[j] = 0.0;
            }
            debug!("northwest: {}", description);

            steps.push(TransportStep {
                index: steps.len(),
                source: i,
                destination: j,
                amount,
                allocation: allocation.clone(),
                remaining_supply: supply.clone(),
                remaining_demand: demand.clone(),
                description,
            });

            if supply_done {
                i += 1;
            }
            if demand_done {
                j += 1;
            }
        }

        let total_cost = allocation
            .iter()
            .zip(&problem.costs)
            .flat_map(|(a, c)| a.iter().zip(c).map(|(x, k)| x * k))
            .sum();
        info!("northwest: {} allocations, total cost {}", steps.len(), total_cost);

        Ok(TransportSolution {
            problem: problem.clone(),
            allocation,
            total_cost,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plants() -> TransportProblem {
        TransportProblem::new(
            vec![10.0, 20.0],
            vec![15.0, 15.0],
            vec![vec![2.0, 3.0], vec![5.0, 1.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_balanced_table_is_exhausted() {
        let _ = env_logger::builder().is_test(true).try_init();

        let solution = NorthwestCorner::new().solve(&plants()).unwrap();

        assert_eq!(solution.allocation, vec![vec![10.0, 0.0], vec![5.0, 15.0]]);
        assert_eq!(solution.total_cost, 60.0);
        assert_eq!(solution.steps.len(), 3);
        let last = solution.steps.last().unwrap();
        assert!(last.remaining_supply.iter().all(|&s| s == 0.0));
        assert!(last.remaining_demand.iter().all(|&d| d == 0.0));
        assert_eq!(solution.occupied_cells(), vec![(0, 0), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_tie_advances_both() {
        let problem = TransportProblem::new(
            vec![10.0, 10.0],
            vec![10.0, 10.0],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap();

        let solution = NorthwestCorner::new().solve(&problem).unwrap();

        assert_eq!(solution.steps.len(), 2);
        assert_eq!((solution.steps[1].source, solution.steps[1].destination), (1, 1));
        assert!(solution.steps[0].description.contains("both exhausted"));
    }

    #[test]
    fn test_unbalanced_is_rejected() {
        let problem = TransportProblem::new(
            vec![10.0, 20.0],
            vec![10.0, 10.0],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();

        let err = NorthwestCorner::new().solve(&problem).unwrap_err();
        assert_eq!(
            err,
            SolverError::Unbalanced {
                supply: 30.0,
                demand: 20.0
            }
        );
    }

    #[test]
    fn test_balanced_adds_dummy_destination() {
        let problem = TransportProblem::new(
            vec![10.0, 20.0],
            vec![10.0, 10.0],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();

        let balanced = problem.balanced();

        assert_eq!(balanced.destinations.last().map(String::as_str), Some("Dummy"));
        assert_eq!(balanced.demand, vec![10.0, 10.0, 10.0]);
        assert_eq!(balanced.costs[1], vec![3.0, 4.0, 0.0]);
        assert!(balanced.is_balanced());
        assert!(NorthwestCorner::new().solve(&balanced).is_ok());
    }

    #[test]
    fn test_float_sums_balance() {
        let problem = TransportProblem::new(
            vec![0.1, 0.2],
            vec![0.3],
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap();
        assert!(problem.is_balanced());
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(
            TransportProblem::new(vec![], vec![1.0], vec![]),
            Err(SolverError::EmptyTransport)
        );
        assert!(matches!(
            TransportProblem::new(vec![1.0], vec![1.0, 2.0], vec![vec![1.0]]),
            Err(SolverError::CostShape { .. })
        ));
        assert!(matches!(
            TransportProblem::new(vec![-1.0], vec![1.0], vec![vec![1.0]]),
            Err(SolverError::InvalidAmount { kind: "Supply", index: 0, .. })
        ));
    }
}
