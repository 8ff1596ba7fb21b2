use crate::tableau::Tableau;

/// The result of solving an LP problem with a tableau method
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Objective value in the problem's own sense (absent when unbounded or infeasible)
    pub objective_value: Option<f64>,
    /// Structural variable values, non-basic ones reported as 0
    pub variable_values: Vec<VariableValue>,
    /// Slack variable values, one per `<=` constraint
    pub slack_values: Vec<VariableValue>,
    /// Big-M artificials still basic with a non-zero value, on `Infeasible` or `IterationLimit`
    pub artificials: Vec<VariableValue>,
    /// Number of pivots performed
    pub iteration_count: usize,
    /// Snapshot 0 is the initial tableau, then one per pivot
    pub iterations: Vec<Iteration>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The objective can grow without limit
    Unbounded,
    /// No point satisfies every constraint
    Infeasible,
    /// The pivot cap was hit before optimality; values are from the last tableau
    IterationLimit,
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolutionStatus::Optimal => write!(f, "OPTIMAL"),
            SolutionStatus::Unbounded => write!(f, "UNBOUNDED"),
            SolutionStatus::Infeasible => write!(f, "INFEASIBLE"),
            SolutionStatus::IterationLimit => write!(f, "ITERATION LIMIT"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VariableValue {
    pub name: String,
    pub value: f64,
}

impl VariableValue {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Snapshot of a tableau after one pivot
///
/// The tableau is a deep copy, so later pivots never change a recorded step.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    pub index: usize,
    pub tableau: Tableau,
    pub entering: Option<String>,
    pub leaving: Option<String>,
    pub pivot_row: Option<usize>,
    pub pivot_col: Option<usize>,
    pub description: String,
}

impl Iteration {
    /// The starting tableau, before any pivot.
    pub fn initial(tableau: &Tableau, description: impl Into<String>) -> Self {
        Self {
            index: 0,
            tableau: tableau.clone(),
            entering: None,
            leaving: None,
            pivot_row: None,
            pivot_col: None,
            description: description.into(),
        }
    }
}

impl Solution {
    pub fn unbounded(iterations: Vec<Iteration>) -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            objective_value: None,
            variable_values: Vec::new(),
            slack_values: Vec::new(),
            artificials: Vec::new(),
            iteration_count: iterations.len().saturating_sub(1),
            iterations,
        }
    }

    pub fn infeasible(artificials: Vec<VariableValue>, iterations: Vec<Iteration>) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            objective_value: None,
            variable_values: Vec::new(),
            slack_values: Vec::new(),
            artificials,
            iteration_count: iterations.len().saturating_sub(1),
            iterations,
        }
    }

    /// Value of the variable called `name`, if reported.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.variable_values
            .iter()
            .chain(&self.slack_values)
            .find(|v| v.name == name)
            .map(|v| v.value)
    }

    /// Structural values in variable order.
    pub fn values(&self) -> Vec<f64> {
        self.variable_values.iter().map(|v| v.value).collect()
    }
}
