//! Tableau storage and the pivoting rules shared by the simplex family.
//!
//! A tableau always represents a maximization: the objective row holds the
//! negated (internal) objective coefficients, so the primal rule pivots on
//! the most negative entry until none is left. Solvers convert minimization
//! problems once when they build their tableau.

use log::debug;

use crate::error::SolverError;
use crate::solution::Iteration;

/// Numeric grid with labelled columns and a basis.
///
/// `rows` holds one row per constraint followed by the objective row. Every
/// row has one entry per column plus a trailing right-hand side.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
}

/// How a pivoting loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Optimal,
    /// No positive entry below the entering column.
    Unbounded { column: usize },
    /// No negative entry in the leaving row (dual ratio test).
    Infeasible { row: usize },
    IterationLimit,
}

impl Tableau {
    /// Build a tableau from constraint rows, the objective row and the
    /// column index that is basic in each constraint row.
    pub fn new(
        columns: Vec<String>,
        mut rows: Vec<Vec<f64>>,
        objective: Vec<f64>,
        basis: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(rows.len(), basis.len());
        debug_assert!(rows.iter().all(|r| r.len() == columns.len() + 1));
        debug_assert_eq!(objective.len(), columns.len() + 1);
        rows.push(objective);
        Self {
            columns,
            rows,
            basis,
        }
    }

    /// Number of constraint rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len() - 1
    }

    /// Number of variable columns, excluding the right-hand side.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Constraint rows followed by the objective row.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.rows[row]
    }

    pub fn objective_row(&self) -> &[f64] {
        &self.rows[self.num_rows()]
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.rows[row][self.columns.len()]
    }

    /// Current value of the internal (maximized) objective.
    pub fn objective_value(&self) -> f64 {
        self.rhs(self.num_rows())
    }

    pub fn basis(&self) -> &[usize] {
        &self.basis
    }

    pub fn basis_labels(&self) -> Vec<&str> {
        self.basis.iter().map(|&c| self.columns[c].as_str()).collect()
    }

    /// Row in which `col` is basic, if it is.
    pub fn basic_row(&self, col: usize) -> Option<usize> {
        self.basis.iter().position(|&b| b == col)
    }

    /// Value of the variable in column `col`: its row's rhs if basic, else 0.
    pub fn value_of(&self, col: usize) -> f64 {
        self.basic_row(col).map(|r| self.rhs(r)).unwrap_or(0.0)
    }

    /// Whether column `col` is 1 at `row` and 0 everywhere else.
    pub fn is_unit_column(&self, col: usize, row: usize, tolerance: f64) -> bool {
        self.rows.iter().enumerate().all(|(i, r)| {
            let expected = if i == row { 1.0 } else { 0.0 };
            (r[col] - expected).abs() <= tolerance
        })
    }

    /// Subtract `factor` times constraint `row` from the objective row.
    pub(crate) fn eliminate_from_objective(&mut self, row: usize, factor: f64) {
        let obj = self.num_rows();
        for j in 0..=self.columns.len() {
            let delta = factor * self.rows[row][j];
            self.rows[obj][j] -= delta;
        }
    }

    /// Normalize the pivot row and eliminate `col` from every other row,
    /// then record `col` as basic in `row`.
    pub fn pivot(&mut self, row: usize, col: usize) -> Result<(), SolverError> {
        let pivot_val = self.rows[row][col];
        if pivot_val == 0.0 || !pivot_val.is_finite() {
            return Err(SolverError::ZeroPivot { row, col });
        }

        let width = self.columns.len() + 1;
        for j in 0..width {
            self.rows[row][j] /= pivot_val;
        }
        // The pivot entry is exactly one, not merely close to it.
        self.rows[row][col] = 1.0;

        let pivot_row = self.rows[row].clone();
        for (i, r) in self.rows.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = r[col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..width {
                r[j] -= factor * pivot_row[j];
            }
            r[col] = 0.0;
        }

        if row < self.basis.len() {
            self.basis[row] = col;
        }
        Ok(())
    }

    /// Pivot a copy, leaving `self` untouched.
    pub fn pivoted(&self, row: usize, col: usize) -> Result<Tableau, SolverError> {
        let mut next = self.clone();
        next.pivot(row, col)?;
        Ok(next)
    }

    /// Most negative objective entry below `-tolerance`; lowest index wins ties.
    pub fn entering_column(&self, tolerance: f64) -> Option<usize> {
        let obj = self.objective_row();
        let mut best: Option<usize> = None;
        for j in 0..self.columns.len() {
            if obj[j] < -tolerance && best.is_none_or(|b| obj[j] < obj[b]) {
                best = Some(j);
            }
        }
        best
    }

    /// Minimum-ratio row among entries above `tolerance` in `col`; first row wins ties.
    pub fn leaving_row(&self, col: usize, tolerance: f64) -> Option<usize> {
        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;
        for i in 0..self.num_rows() {
            let val = self.rows[i][col];
            if val > tolerance {
                let ratio = self.rhs(i) / val;
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }
        min_row
    }

    /// Dual ratio test: the row with the most negative rhs below `-tolerance`.
    pub fn dual_leaving_row(&self, tolerance: f64) -> Option<usize> {
        let mut best: Option<usize> = None;
        for i in 0..self.num_rows() {
            let rhs = self.rhs(i);
            if rhs < -tolerance && best.is_none_or(|b| rhs < self.rhs(b)) {
                best = Some(i);
            }
        }
        best
    }

    /// Dual ratio test: among negative entries of `row`, the column
    /// minimizing `|objective / entry|`; lowest index wins ties.
    pub fn dual_entering_column(&self, row: usize, tolerance: f64) -> Option<usize> {
        let obj = self.objective_row();
        let mut min_ratio = f64::INFINITY;
        let mut min_col = None;
        for j in 0..self.columns.len() {
            let val = self.rows[row][j];
            if val < -tolerance {
                let ratio = (obj[j] / val).abs();
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_col = Some(j);
                }
            }
        }
        min_col
    }
}

/// Run the primal simplex rule on `tableau` for at most `max_iterations`
/// pivots, appending one snapshot per pivot to `history`.
pub(crate) fn run_primal(
    tableau: &mut Tableau,
    max_iterations: usize,
    tolerance: f64,
    history: &mut Vec<Iteration>,
) -> Result<Outcome, SolverError> {
    for _ in 0..max_iterations {
        let Some(col) = tableau.entering_column(tolerance) else {
            return Ok(Outcome::Optimal);
        };
        let Some(row) = tableau.leaving_row(col, tolerance) else {
            debug!("column {} has no positive entry", tableau.columns[col]);
            return Ok(Outcome::Unbounded { column: col });
        };
        record_pivot(tableau, row, col, history)?;
    }

    if tableau.entering_column(tolerance).is_none() {
        Ok(Outcome::Optimal)
    } else {
        Ok(Outcome::IterationLimit)
    }
}

/// Pivot on `(row, col)` and push the resulting snapshot.
pub(crate) fn record_pivot(
    tableau: &mut Tableau,
    row: usize,
    col: usize,
    history: &mut Vec<Iteration>,
) -> Result<(), SolverError> {
    let entering = tableau.columns[col].clone();
    let leaving = tableau.columns[tableau.basis[row]].clone();
    let element = tableau.get(row, col);
    tableau.pivot(row, col)?;

    let index = history.len();
    debug!(
        "iteration {}: {} enters, {} leaves, pivot {:.6} at ({}, {}), objective {:.6}",
        index,
        entering,
        leaving,
        element,
        row,
        col,
        tableau.objective_value()
    );
    history.push(Iteration {
        index,
        description: format!(
            "{} enters the basis, {} leaves (pivot {} at row {}, column {})",
            entering,
            leaving,
            trim_float(element),
            row + 1,
            col + 1
        ),
        tableau: tableau.clone(),
        entering: Some(entering),
        leaving: Some(leaving),
        pivot_row: Some(row),
        pivot_col: Some(col),
    });
    Ok(())
}

/// Format a float without trailing zeros, for descriptions.
pub(crate) fn trim_float(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tableau {
        // max 3x1 + 5x2 st x1 <= 4, 2x2 <= 12, 3x1 + 2x2 <= 18
        let columns = ["x1", "x2", "s1", "s2", "s3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Tableau::new(
            columns,
            vec![
                vec![1.0, 0.0, 1.0, 0.0, 0.0, 4.0],
                vec![0.0, 2.0, 0.0, 1.0, 0.0, 12.0],
                vec![3.0, 2.0, 0.0, 0.0, 1.0, 18.0],
            ],
            vec![-3.0, -5.0, 0.0, 0.0, 0.0, 0.0],
            vec![2, 3, 4],
        )
    }

    #[test]
    fn test_pivot_makes_unit_column() {
        let mut t = sample();
        t.pivot(2, 0).unwrap();
        assert!(t.is_unit_column(0, 2, 1e-9));
        assert_eq!(t.basis_labels(), vec!["s1", "s2", "x1"]);
        assert!((t.rhs(2) - 6.0).abs() < 1e-9);
        assert!((t.objective_value() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_pivoted_leaves_original() {
        let t = sample();
        let next = t.pivoted(1, 1).unwrap();
        assert_eq!(t, sample());
        assert!(next.is_unit_column(1, 1, 1e-9));
        assert_eq!(next.basis_labels(), vec!["s1", "x2", "s3"]);
    }

    #[test]
    fn test_zero_pivot_rejected() {
        let mut t = sample();
        assert_eq!(t.pivot(0, 1), Err(SolverError::ZeroPivot { row: 0, col: 1 }));
    }

    #[test]
    fn test_ratio_rules() {
        let t = sample();
        assert_eq!(t.entering_column(1e-9), Some(1));
        assert_eq!(t.leaving_row(1, 1e-9), Some(1));
        assert_eq!(t.dual_leaving_row(1e-9), None);
    }

    #[test]
    fn test_entering_tie_takes_lowest_index() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let t = Tableau::new(
            columns,
            vec![vec![1.0, 1.0, 1.0]],
            vec![-2.0, -2.0, 0.0],
            vec![0],
        );
        assert_eq!(t.entering_column(1e-9), Some(0));
    }

    #[test]
    fn test_run_primal_records_history() {
        let mut t = sample();
        let mut history = Vec::new();
        let outcome = run_primal(&mut t, 50, 1e-9, &mut history).unwrap();
        assert_eq!(outcome, Outcome::Optimal);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entering.as_deref(), Some("x2"));
        assert_eq!(history[0].leaving.as_deref(), Some("s2"));
        // Snapshots do not alias the live tableau.
        assert_ne!(history[0].tableau, t);
        assert!((t.objective_value() - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_trim_float() {
        assert_eq!(trim_float(2.0), "2");
        assert_eq!(trim_float(0.5), "0.5");
        assert_eq!(trim_float(-0.00001), "0");
    }
}
