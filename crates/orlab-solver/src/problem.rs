use std::fmt;

use crate::error::SolverError;

/// A linear programming problem over non-negative variables
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProblem {
    /// Variable names
    pub variables: Vec<String>,
    /// Whether to maximize or minimize
    pub objective_type: ObjectiveType,
    /// Objective function coefficients
    pub objective: Vec<f64>,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveType {
    Max,
    Min,
}

impl ObjectiveType {
    pub fn opposite(self) -> Self {
        match self {
            ObjectiveType::Max => ObjectiveType::Min,
            ObjectiveType::Min => ObjectiveType::Max,
        }
    }

    /// Sign that turns this objective into a maximization.
    pub fn sign(self) -> f64 {
        match self {
            ObjectiveType::Max => 1.0,
            ObjectiveType::Min => -1.0,
        }
    }
}

impl fmt::Display for ObjectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveType::Max => write!(f, "max"),
            ObjectiveType::Min => write!(f, "min"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub relation: Relation,
    /// Right-hand side value
    pub rhs: f64,
}

impl Constraint {
    /// Left-hand side evaluated at `point`.
    pub fn lhs(&self, point: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(point)
            .map(|(a, x)| a * x)
            .sum()
    }

    /// Whether `point` satisfies this constraint within `tolerance`.
    pub fn is_satisfied(&self, point: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(point);
        match self.relation {
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() < tolerance,
        }
    }

    /// The same constraint multiplied by -1.
    pub fn negated(&self) -> Self {
        Self {
            name: self.name.clone(),
            coefficients: self.coefficients.iter().map(|a| -a).collect(),
            relation: self.relation.flipped(),
            rhs: -self.rhs,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (<=)
    Le,
    /// Equal (=)
    Eq,
    /// Greater than or equal (>=)
    Ge,
}

impl Relation {
    /// Relation after multiplying both sides by -1.
    pub fn flipped(self) -> Self {
        match self {
            Relation::Le => Relation::Ge,
            Relation::Ge => Relation::Le,
            Relation::Eq => Relation::Eq,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Eq => write!(f, "="),
            Relation::Ge => write!(f, ">="),
        }
    }
}

impl LinearProblem {
    /// Create a problem with variables named `x1..xn`.
    pub fn new(objective_type: ObjectiveType, objective: Vec<f64>) -> Self {
        let variables = (1..=objective.len()).map(|j| format!("x{}", j)).collect();
        Self::with_variables(variables, objective_type, objective)
    }

    pub fn with_variables(
        variables: Vec<String>,
        objective_type: ObjectiveType,
        objective: Vec<f64>,
    ) -> Self {
        Self {
            variables,
            objective_type,
            objective,
            constraints: Vec::new(),
        }
    }

    /// Add a constraint named `R{k}` after its position.
    pub fn add_constraint(&mut self, coefficients: Vec<f64>, relation: Relation, rhs: f64) {
        let name = format!("R{}", self.constraints.len() + 1);
        self.add_named_constraint(name, coefficients, relation, rhs);
    }

    pub fn add_named_constraint(
        &mut self,
        name: impl Into<String>,
        coefficients: Vec<f64>,
        relation: Relation,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            relation,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value at `point`.
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.objective.iter().zip(point).map(|(c, x)| c * x).sum()
    }

    /// Whether `point` is non-negative and satisfies every constraint.
    pub fn is_feasible(&self, point: &[f64], tolerance: f64) -> bool {
        point.iter().all(|&x| x >= -tolerance)
            && self
                .constraints
                .iter()
                .all(|c| c.is_satisfied(point, tolerance))
    }

    /// Check the shape invariants every solver relies on.
    pub fn validate(&self) -> Result<(), SolverError> {
        let n = self.num_variables();
        if n == 0 {
            return Err(SolverError::NoVariables);
        }
        if self.variables.len() != n {
            return Err(SolverError::ObjectiveLength {
                expected: self.variables.len(),
                found: n,
            });
        }
        if let Some(name) = self.variables.iter().find(|v| is_reserved_name(v)) {
            return Err(SolverError::ReservedName(name.clone()));
        }
        if self.objective.iter().any(|c| !c.is_finite()) {
            return Err(SolverError::NonFinite("objective".to_string()));
        }
        for c in &self.constraints {
            if c.coefficients.len() != n {
                return Err(SolverError::ConstraintLength {
                    constraint: c.name.clone(),
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
            if !c.rhs.is_finite() || c.coefficients.iter().any(|a| !a.is_finite()) {
                return Err(SolverError::NonFinite(format!("constraint {}", c.name)));
            }
        }
        Ok(())
    }
}

/// `s<k>`, `e<k>` and `A<k>` name the columns the tableau methods add.
fn is_reserved_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('s' | 'e' | 'A'))
        && !chars.as_str().is_empty()
        && chars.all(|c| c.is_ascii_digit())
}
