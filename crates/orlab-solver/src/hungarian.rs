//! Hungarian method for the assignment problem.
//!
//! The reduced matrix always equals `cost[i][j] - u[i] - v[j]` for some row
//! and column potentials, so any perfect matching on its zero cells is an
//! optimal assignment of the original costs.

use log::{debug, info};

use crate::config::{ASSIGNMENT_MAX_ADJUSTMENTS, TOLERANCE};
use crate::error::SolverError;
use crate::tableau::trim_float;

/// Rectangular cost matrix with row and column labels
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub costs: Vec<Vec<f64>>,
    /// Rows from this index on are zero-cost padding
    pub real_rows: usize,
    /// Columns from this index on are zero-cost padding
    pub real_cols: usize,
}

impl CostMatrix {
    /// Matrix with rows labelled `R1..` and columns `C1..`.
    pub fn new(costs: Vec<Vec<f64>>) -> Result<Self, SolverError> {
        let rows = costs.len();
        let cols = costs.first().map_or(0, Vec::len);
        let row_labels = (1..=rows).map(|i| format!("R{}", i)).collect();
        let col_labels = (1..=cols).map(|j| format!("C{}", j)).collect();
        Self::with_labels(row_labels, col_labels, costs)
    }

    pub fn with_labels(
        row_labels: Vec<String>,
        col_labels: Vec<String>,
        costs: Vec<Vec<f64>>,
    ) -> Result<Self, SolverError> {
        let matrix = Self {
            real_rows: costs.len(),
            real_cols: costs.first().map_or(0, Vec::len),
            row_labels,
            col_labels,
            costs,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        let cols = self.costs.first().map_or(0, Vec::len);
        if self.costs.is_empty() || cols == 0 {
            return Err(SolverError::EmptyMatrix);
        }
        for (i, row) in self.costs.iter().enumerate() {
            if row.len() != cols {
                return Err(SolverError::RaggedMatrix {
                    row: i,
                    expected: cols,
                    found: row.len(),
                });
            }
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(SolverError::InvalidCost { row: i, col: j, value });
                }
            }
        }
        if self.row_labels.len() != self.costs.len() {
            return Err(SolverError::LabelCount {
                axis: "rows",
                expected: self.costs.len(),
                found: self.row_labels.len(),
            });
        }
        if self.col_labels.len() != cols {
            return Err(SolverError::LabelCount {
                axis: "columns",
                expected: cols,
                found: self.col_labels.len(),
            });
        }
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.costs.len()
    }

    pub fn num_cols(&self) -> usize {
        self.costs.first().map_or(0, Vec::len)
    }

    pub fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }

    pub fn is_dummy_row(&self, row: usize) -> bool {
        row >= self.real_rows
    }

    pub fn is_dummy_col(&self, col: usize) -> bool {
        col >= self.real_cols
    }

    /// Pad with zero-cost dummy rows or columns up to `max(rows, cols)`.
    /// A square matrix comes back unchanged.
    pub fn balance(&self) -> CostMatrix {
        let n = self.num_rows().max(self.num_cols());
        let mut balanced = self.clone();

        for row in &mut balanced.costs {
            row.resize(n, 0.0);
        }
        for k in self.num_cols()..n {
            balanced.col_labels.push(format!("Dummy{}", k - self.num_cols() + 1));
        }
        for k in self.num_rows()..n {
            balanced.costs.push(vec![0.0; n]);
            balanced.row_labels.push(format!("Dummy{}", k - self.num_rows() + 1));
        }
        balanced
    }
}

/// How the zero-covering step chooses its lines
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverStrategy {
    /// Repeatedly cover the row or column with the most uncovered zeros
    #[default]
    Greedy,
    /// Minimum cover derived from a maximum matching
    Konig,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum HungarianAction {
    Balance { dummy_rows: usize, dummy_cols: usize },
    RowReduction { minima: Vec<f64> },
    ColumnReduction { minima: Vec<f64> },
    Cover { rows: Vec<usize>, cols: Vec<usize> },
    Adjustment { value: f64 },
    /// Columns permuted so the chosen zeros sit on the diagonal
    Diagonalize { column_order: Vec<usize> },
}

/// One step of the trace, with the matrix after the step
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct HungarianStep {
    pub action: HungarianAction,
    pub matrix: Vec<Vec<f64>>,
    pub description: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub row: usize,
    pub col: usize,
    pub row_label: String,
    pub col_label: String,
    pub cost: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSolution {
    /// The balanced matrix that was solved
    pub matrix: CostMatrix,
    /// Real row/column pairs, in row order
    pub assignments: Vec<Assignment>,
    /// Real rows or columns that were matched to a dummy
    pub unassigned: Vec<String>,
    /// Sum of the original costs of `assignments`
    pub total_cost: f64,
    /// Column chosen for every row of the balanced matrix
    pub permutation: Vec<usize>,
    pub steps: Vec<HungarianStep>,
}

pub struct HungarianSolver {
    strategy: CoverStrategy,
    max_adjustments: usize,
    tolerance: f64,
}

impl Default for HungarianSolver {
    fn default() -> Self {
        Self {
            strategy: CoverStrategy::default(),
            max_adjustments: ASSIGNMENT_MAX_ADJUSTMENTS,
            tolerance: TOLERANCE,
        }
    }
}

impl HungarianSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cover_strategy(mut self, strategy: CoverStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_adjustments = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn solve(&self, matrix: &CostMatrix) -> Result<AssignmentSolution, SolverError> {
        matrix.validate()?;
        let balanced = matrix.balance();
        let n = balanced.num_rows();
        let mut m = balanced.costs.clone();
        let mut steps = Vec::new();

        let dummy_rows = n - matrix.num_rows();
        let dummy_cols = n - matrix.num_cols();
        steps.push(HungarianStep {
            action: HungarianAction::Balance { dummy_rows, dummy_cols },
            matrix: m.clone(),
            description: if dummy_rows + dummy_cols == 0 {
                format!("Matrix is already square ({}x{})", n, n)
            } else {
                format!(
                    "Added {} dummy row(s) and {} dummy column(s) with zero cost",
                    dummy_rows, dummy_cols
                )
            },
        });

        let minima = reduce_rows(&mut m);
        steps.push(HungarianStep {
            description: format!("Subtracted row minima {}", format_values(&minima)),
            action: HungarianAction::RowReduction { minima },
            matrix: m.clone(),
        });

        let minima = reduce_cols(&mut m);
        steps.push(HungarianStep {
            description: format!("Subtracted column minima {}", format_values(&minima)),
            action: HungarianAction::ColumnReduction { minima },
            matrix: m.clone(),
        });

        let mut adjustments = 0;
        loop {
            let cover = match self.strategy {
                CoverStrategy::Greedy => self.greedy_cover(&m),
                CoverStrategy::Konig => self.konig_cover(&m, &self.max_matching(&m)),
            };
            let lines = push_cover(&mut steps, &m, &cover);
            if lines >= n {
                break;
            }
            self.adjust(&mut m, &cover, &mut steps, &mut adjustments)?;
        }

        // A greedy cover can reach n lines before a perfect matching exists.
        let mut matching = self.max_matching(&m);
        while matching.iter().any(Option::is_none) {
            debug!("hungarian: greedy cover left no perfect matching, switching to minimum cover");
            let cover = self.konig_cover(&m, &matching);
            push_cover(&mut steps, &m, &cover);
            self.adjust(&mut m, &cover, &mut steps, &mut adjustments)?;
            matching = self.max_matching(&m);
        }

        let permutation: Vec<usize> = matching.into_iter().flatten().collect();
        let diagonal = m
            .iter()
            .map(|row| permutation.iter().map(|&j| row[j]).collect())
            .collect();
        steps.push(HungarianStep {
            description: format!(
                "Reordered columns to {} so the assigned zeros lie on the diagonal",
                permutation
                    .iter()
                    .map(|&j| balanced.col_labels[j].as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            action: HungarianAction::Diagonalize {
                column_order: permutation.clone(),
            },
            matrix: diagonal,
        });

        let mut assignments = Vec::new();
        let mut unassigned = Vec::new();
        for (i, &j) in permutation.iter().enumerate() {
            match (balanced.is_dummy_row(i), balanced.is_dummy_col(j)) {
                (false, false) => assignments.push(Assignment {
                    row: i,
                    col: j,
                    row_label: balanced.row_labels[i].clone(),
                    col_label: balanced.col_labels[j].clone(),
                    cost: balanced.costs[i][j],
                }),
                (false, true) => unassigned.push(balanced.row_labels[i].clone()),
                (true, false) => unassigned.push(balanced.col_labels[j].clone()),
                (true, true) => {}
            }
        }
        let total_cost = assignments.iter().map(|a| a.cost).sum();
        info!(
            "hungarian: {} assignments after {} adjustments, total cost {}",
            assignments.len(),
            adjustments,
            total_cost
        );

        Ok(AssignmentSolution {
            matrix: balanced,
            assignments,
            unassigned,
            total_cost,
            permutation,
            steps,
        })
    }

    fn is_zero(&self, value: f64) -> bool {
        value.abs() < self.tolerance
    }

    /// Cover the line with the most uncovered zeros until none is left.
    /// Rows are scanned before columns and only a strictly larger count
    /// replaces the current choice.
    fn greedy_cover(&self, m: &[Vec<f64>]) -> Cover {
        let n = m.len();
        let mut cover = Cover::new(n);
        loop {
            let mut best: Option<(bool, usize)> = None;
            let mut best_count = 0;
            for i in (0..n).filter(|&i| !cover.rows[i]) {
                let count = (0..n)
                    .filter(|&j| !cover.cols[j] && self.is_zero(m[i][j]))
                    .count();
                if count > best_count {
                    best_count = count;
                    best = Some((true, i));
                }
            }
            for j in (0..n).filter(|&j| !cover.cols[j]) {
                let count = (0..n)
                    .filter(|&i| !cover.rows[i] && self.is_zero(m[i][j]))
                    .count();
                if count > best_count {
                    best_count = count;
                    best = Some((false, j));
                }
            }
            match best {
                Some((true, i)) => cover.rows[i] = true,
                Some((false, j)) => cover.cols[j] = true,
                None => return cover,
            }
        }
    }

    /// Minimum cover from a maximum matching: rows not reached by an
    /// alternating path from an unmatched row, plus columns that are.
    fn konig_cover(&self, m: &[Vec<f64>], matching: &[Option<usize>]) -> Cover {
        let n = m.len();
        let mut col_owner: Vec<Option<usize>> = vec![None; n];
        for (i, j) in matching.iter().enumerate() {
            if let Some(j) = j {
                col_owner[*j] = Some(i);
            }
        }
        let mut reached_rows = vec![false; n];
        let mut reached_cols = vec![false; n];
        let mut queue: Vec<usize> = (0..n).filter(|&i| matching[i].is_none()).collect();
        for &i in &queue {
            reached_rows[i] = true;
        }
        while let Some(i) = queue.pop() {
            for j in 0..n {
                if reached_cols[j] || !self.is_zero(m[i][j]) {
                    continue;
                }
                reached_cols[j] = true;
                if let Some(next) = col_owner[j] {
                    if !reached_rows[next] {
                        reached_rows[next] = true;
                        queue.push(next);
                    }
                }
            }
        }

        let mut cover = Cover::new(n);
        for i in 0..n {
            cover.rows[i] = !reached_rows[i];
        }
        cover.cols = reached_cols;
        cover
    }

    /// Maximum matching on zero cells by augmenting paths; entry `i` is the
    /// column matched to row `i`.
    fn max_matching(&self, m: &[Vec<f64>]) -> Vec<Option<usize>> {
        let n = m.len();
        let mut col_owner: Vec<Option<usize>> = vec![None; n];
        for i in 0..n {
            let mut visited = vec![false; n];
            self.augment(m, i, &mut visited, &mut col_owner);
        }
        let mut matching = vec![None; n];
        for (j, owner) in col_owner.iter().enumerate() {
            if let Some(i) = owner {
                matching[*i] = Some(j);
            }
        }
        matching
    }

    fn augment(
        &self,
        m: &[Vec<f64>],
        row: usize,
        visited: &mut [bool],
        col_owner: &mut [Option<usize>],
    ) -> bool {
        for j in 0..m.len() {
            if visited[j] || !self.is_zero(m[row][j]) {
                continue;
            }
            visited[j] = true;
            let free = match col_owner[j] {
                None => true,
                Some(other) => self.augment(m, other, visited, col_owner),
            };
            if free {
                col_owner[j] = Some(row);
                return true;
            }
        }
        false
    }

    /// Subtract the smallest uncovered value from every uncovered cell and
    /// add it to every cell covered twice.
    fn adjust(
        &self,
        m: &mut [Vec<f64>],
        cover: &Cover,
        steps: &mut Vec<HungarianStep>,
        adjustments: &mut usize,
    ) -> Result<(), SolverError> {
        if *adjustments >= self.max_adjustments {
            return Err(SolverError::AssignmentLimit(self.max_adjustments));
        }
        *adjustments += 1;

        let n = m.len();
        let mut min = f64::INFINITY;
        for i in (0..n).filter(|&i| !cover.rows[i]) {
            for j in (0..n).filter(|&j| !cover.cols[j]) {
                min = min.min(m[i][j]);
            }
        }
        for i in 0..n {
            for j in 0..n {
                match (cover.rows[i], cover.cols[j]) {
                    (false, false) => m[i][j] -= min,
                    (true, true) => m[i][j] += min,
                    _ => {}
                }
            }
        }
        debug!("hungarian: adjustment {} by {}", adjustments, min);
        steps.push(HungarianStep {
            action: HungarianAction::Adjustment { value: min },
            matrix: m.to_vec(),
            description: format!(
                "Subtracted {} from uncovered cells and added it to intersections",
                trim_float(min)
            ),
        });
        Ok(())
    }
}

struct Cover {
    rows: Vec<bool>,
    cols: Vec<bool>,
}

impl Cover {
    fn new(n: usize) -> Self {
        Self {
            rows: vec![false; n],
            cols: vec![false; n],
        }
    }

    fn lines(&self) -> usize {
        self.rows.iter().chain(&self.cols).filter(|&&c| c).count()
    }
}

fn push_cover(steps: &mut Vec<HungarianStep>, m: &[Vec<f64>], cover: &Cover) -> usize {
    let lines = cover.lines();
    let rows: Vec<usize> = (0..m.len()).filter(|&i| cover.rows[i]).collect();
    let cols: Vec<usize> = (0..m.len()).filter(|&j| cover.cols[j]).collect();
    debug!("hungarian: cover rows {:?} cols {:?}", rows, cols);
    steps.push(HungarianStep {
        description: if lines >= m.len() {
            format!("All zeros covered with {} lines, an assignment exists", lines)
        } else {
            format!("All zeros covered with {} lines, fewer than {}", lines, m.len())
        },
        action: HungarianAction::Cover { rows, cols },
        matrix: m.to_vec(),
    });
    lines
}

fn reduce_rows(m: &mut [Vec<f64>]) -> Vec<f64> {
    m.iter_mut()
        .map(|row| {
            let min = row.iter().copied().fold(f64::INFINITY, f64::min);
            row.iter_mut().for_each(|v| *v -= min);
            min
        })
        .collect()
}

fn reduce_cols(m: &mut [Vec<f64>]) -> Vec<f64> {
    let n = m.first().map_or(0, Vec::len);
    (0..n)
        .map(|j| {
            let min = m.iter().map(|row| row[j]).fold(f64::INFINITY, f64::min);
            m.iter_mut().for_each(|row| row[j] -= min);
            min
        })
        .collect()
}

fn format_values(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|&v| trim_float(v)).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crews() -> CostMatrix {
        CostMatrix::new(vec![
            vec![4.0, 2.0, 8.0],
            vec![4.0, 3.0, 7.0],
            vec![3.0, 1.0, 6.0],
        ])
        .unwrap()
    }

    fn assert_permutation(solution: &AssignmentSolution) {
        let mut seen = solution.permutation.clone();
        seen.sort();
        assert_eq!(seen, (0..solution.permutation.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_three_by_three() {
        let _ = env_logger::builder().is_test(true).try_init();

        let matrix = crews();
        let solution = HungarianSolver::new().solve(&matrix).unwrap();

        assert_permutation(&solution);
        assert_eq!(solution.assignments.len(), 3);
        let sum: f64 = solution
            .assignments
            .iter()
            .map(|a| matrix.costs[a.row][a.col])
            .sum();
        assert_eq!(solution.total_cost, sum);
        assert_eq!(solution.total_cost, 12.0);
        assert_eq!(solution.permutation, vec![1, 2, 0]);
    }

    #[test]
    fn test_trace_shape() {
        let solution = HungarianSolver::new().solve(&crews()).unwrap();
        let actions: Vec<_> = solution.steps.iter().map(|s| &s.action).collect();

        assert!(matches!(actions[0], HungarianAction::Balance { dummy_rows: 0, dummy_cols: 0 }));
        assert_eq!(actions[1], &HungarianAction::RowReduction { minima: vec![2.0, 3.0, 1.0] });
        assert_eq!(actions[2], &HungarianAction::ColumnReduction { minima: vec![1.0, 0.0, 4.0] });
        assert_eq!(actions[3], &HungarianAction::Cover { rows: vec![1], cols: vec![1] });
        assert_eq!(actions[4], &HungarianAction::Adjustment { value: 1.0 });
        assert_eq!(actions[5], &HungarianAction::Cover { rows: vec![0, 1, 2], cols: vec![] });

        let last = solution.steps.last().unwrap();
        for k in 0..3 {
            assert_eq!(last.matrix[k][k], 0.0);
        }
    }

    #[test]
    fn test_konig_strategy_agrees() {
        let solution = HungarianSolver::new()
            .with_cover_strategy(CoverStrategy::Konig)
            .solve(&crews())
            .unwrap();
        assert_permutation(&solution);
        assert_eq!(solution.total_cost, 12.0);
    }

    #[test]
    fn test_balance_square_is_noop() {
        let matrix = crews();
        assert_eq!(matrix.balance(), matrix);
    }

    #[test]
    fn test_rectangular_gets_dummy_row() {
        let matrix = CostMatrix::new(vec![vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 6.0]]).unwrap();
        let balanced = matrix.balance();
        assert_eq!(balanced.num_rows(), 3);
        assert_eq!(balanced.row_labels[2], "Dummy1");
        assert!(balanced.is_dummy_row(2));

        let solution = HungarianSolver::new().solve(&matrix).unwrap();

        assert_eq!(solution.total_cost, 4.0);
        assert_eq!(solution.assignments.len(), 2);
        assert_eq!(solution.unassigned, vec!["C3".to_string()]);
    }

    #[test]
    fn test_greedy_cover_without_perfect_matching() {
        // Greedy covers these zeros with 4 lines, but only 3 of them can
        // be matched, so one more adjustment is needed.
        let matrix = CostMatrix::new(vec![
            vec![1.0, 0.0, 2.0, 2.0],
            vec![2.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 2.0, 1.0],
            vec![0.0, 2.0, 1.0, 2.0],
        ])
        .unwrap();
        let solution = HungarianSolver::new().solve(&matrix).unwrap();

        assert_permutation(&solution);
        assert_eq!(solution.total_cost, 1.0);
        assert_eq!(solution.permutation, vec![1, 2, 3, 0]);
        let adjustments = solution
            .steps
            .iter()
            .filter(|s| matches!(s.action, HungarianAction::Adjustment { .. }))
            .count();
        assert_eq!(adjustments, 1);
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(CostMatrix::new(vec![]), Err(SolverError::EmptyMatrix));
        assert_eq!(
            CostMatrix::new(vec![vec![1.0, 2.0], vec![1.0]]),
            Err(SolverError::RaggedMatrix {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            CostMatrix::new(vec![vec![1.0, -2.0]]),
            Err(SolverError::InvalidCost { row: 0, col: 1, .. })
        ));
        assert!(matches!(
            CostMatrix::with_labels(vec!["a".into()], vec![], vec![vec![1.0]]),
            Err(SolverError::LabelCount { axis: "columns", .. })
        ));
    }
}
