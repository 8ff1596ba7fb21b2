//! Graphical method for two-variable problems.
//!
//! Intersects every pair of boundary lines, keeps the feasible points and
//! picks the best vertex. Unbounded feasible regions are not detected: the
//! optimum is taken over the vertices that exist.

use log::{debug, info};

use crate::config::{round_to, DISPLAY_DECIMALS, TOLERANCE, VERTEX_TOLERANCE};
use crate::error::SolverError;
use crate::problem::{LinearProblem, ObjectiveType};

/// Boundary line `a * x1 + b * x2 = value`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub name: String,
    pub a: f64,
    pub b: f64,
    pub value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x1: f64,
    pub x2: f64,
}

impl Point {
    pub fn new(x1: f64, x2: f64) -> Self {
        Self { x1, x2 }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x1 - other.x1).hypot(self.x2 - other.x2)
    }
}

/// Crossing of two boundary lines
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub point: Point,
    pub lines: (String, String),
    pub feasible: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub point: Point,
    /// Objective value, rounded
    pub objective: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicalSolution {
    pub objective_type: ObjectiveType,
    pub lines: Vec<Line>,
    /// Every non-parallel pair of lines, in pair order
    pub intersections: Vec<Intersection>,
    /// Distinct feasible vertices in discovery order
    pub vertices: Vec<Vertex>,
    /// The same vertices ordered counter-clockwise around their centroid
    pub polygon: Vec<Point>,
    pub optimum: Vertex,
    pub objective_value: f64,
}

pub struct GraphicalSolver {
    tolerance: f64,
    vertex_tolerance: f64,
    decimals: i32,
}

impl Default for GraphicalSolver {
    fn default() -> Self {
        Self {
            tolerance: TOLERANCE,
            vertex_tolerance: VERTEX_TOLERANCE,
            decimals: DISPLAY_DECIMALS,
        }
    }
}

impl GraphicalSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_vertex_tolerance(mut self, tol: f64) -> Self {
        self.vertex_tolerance = tol;
        self
    }

    pub fn solve(&self, problem: &LinearProblem) -> Result<GraphicalSolution, SolverError> {
        if problem.num_variables() != 2 {
            return Err(SolverError::GraphicalVariableCount(problem.num_variables()));
        }
        problem.validate()?;

        let lines = boundary_lines(problem);
        let feasible = |x1: f64, x2: f64| problem.is_feasible(&[x1, x2], self.tolerance);

        let mut intersections = Vec::new();
        let mut points: Vec<Point> = Vec::new();
        for i in 0..lines.len() {
            for j in i + 1..lines.len() {
                let (l1, l2) = (&lines[i], &lines[j]);
                let det = l1.a * l2.b - l2.a * l1.b;
                if det.abs() < self.tolerance {
                    continue;
                }
                let x1 = (l1.value * l2.b - l2.value * l1.b) / det;
                let x2 = (l1.a * l2.value - l2.a * l1.value) / det;
                let point = Point::new(round_to(x1, self.decimals), round_to(x2, self.decimals));
                let ok = feasible(x1, x2);
                debug!(
                    "graphical: {} x {} at ({}, {}) {}",
                    l1.name,
                    l2.name,
                    point.x1,
                    point.x2,
                    if ok { "feasible" } else { "infeasible" }
                );
                if ok && !points.iter().any(|p| p.distance(&point) < self.vertex_tolerance) {
                    points.push(point);
                }
                intersections.push(Intersection {
                    point,
                    lines: (l1.name.clone(), l2.name.clone()),
                    feasible: ok,
                });
            }
        }

        let origin = Point::new(0.0, 0.0);
        if feasible(0.0, 0.0) && !points.iter().any(|p| p.distance(&origin) < self.vertex_tolerance) {
            points.push(origin);
        }

        if points.is_empty() {
            return Err(SolverError::NoFeasibleVertices);
        }

        let vertices: Vec<Vertex> = points
            .iter()
            .map(|&point| Vertex {
                point,
                objective: round_to(problem.evaluate(&[point.x1, point.x2]), self.decimals),
            })
            .collect();

        let sign = problem.objective_type.sign();
        let mut optimum = &vertices[0];
        for v in &vertices[1..] {
            if sign * v.objective > sign * optimum.objective {
                optimum = v;
            }
        }
        let optimum = optimum.clone();

        info!(
            "graphical: {} feasible vertices, optimum {} at ({}, {})",
            vertices.len(),
            optimum.objective,
            optimum.point.x1,
            optimum.point.x2
        );

        Ok(GraphicalSolution {
            objective_type: problem.objective_type,
            lines,
            intersections,
            polygon: polygon_order(&points),
            objective_value: optimum.objective,
            optimum,
            vertices,
        })
    }
}

/// Constraint lines followed by the two axes.
fn boundary_lines(problem: &LinearProblem) -> Vec<Line> {
    let mut lines: Vec<Line> = problem
        .constraints
        .iter()
        .map(|c| Line {
            name: c.name.clone(),
            a: c.coefficients[0],
            b: c.coefficients[1],
            value: c.rhs,
        })
        .collect();
    lines.push(Line {
        name: format!("{} = 0", problem.variables[0]),
        a: 1.0,
        b: 0.0,
        value: 0.0,
    });
    lines.push(Line {
        name: format!("{} = 0", problem.variables[1]),
        a: 0.0,
        b: 1.0,
        value: 0.0,
    });
    lines
}

/// Sort by angle around the centroid; fewer than three points stay as found.
fn polygon_order(points: &[Point]) -> Vec<Point> {
    let mut ordered = points.to_vec();
    if ordered.len() < 3 {
        return ordered;
    }
    let n = ordered.len() as f64;
    let cx = ordered.iter().map(|p| p.x1).sum::<f64>() / n;
    let cy = ordered.iter().map(|p| p.x2).sum::<f64>() / n;
    let angle = |p: &Point| (p.x2 - cy).atan2(p.x1 - cx);
    ordered.sort_by(|a, b| angle(a).total_cmp(&angle(b)));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Relation;

    fn square_cut() -> LinearProblem {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 4.0);
        problem.add_constraint(vec![0.0, 1.0], Relation::Le, 4.0);
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 6.0);
        problem
    }

    fn has_vertex(solution: &GraphicalSolution, x1: f64, x2: f64) -> bool {
        solution
            .vertices
            .iter()
            .any(|v| (v.point.x1 - x1).abs() < 1e-6 && (v.point.x2 - x2).abs() < 1e-6)
    }

    #[test]
    fn test_vertex_enumeration() {
        let _ = env_logger::builder().is_test(true).try_init();

        let solution = GraphicalSolver::new().solve(&square_cut()).unwrap();

        assert_eq!(solution.vertices.len(), 5);
        for (x1, x2) in [(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (2.0, 4.0), (0.0, 4.0)] {
            assert!(has_vertex(&solution, x1, x2), "missing ({}, {})", x1, x2);
        }
        assert_eq!(solution.objective_value, 6.0);
        assert!((solution.optimum.point.x1 + solution.optimum.point.x2 - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersections_name_their_lines() {
        let solution = GraphicalSolver::new().solve(&square_cut()).unwrap();

        assert_eq!(solution.lines.len(), 5);
        assert_eq!(solution.lines[3].name, "x1 = 0");
        // Parallel pairs are skipped: x1 = 4 / x1 = 0 and x2 = 4 / x2 = 0.
        assert_eq!(solution.intersections.len(), 8);
        let first = &solution.intersections[0];
        assert_eq!(first.lines, ("R1".to_string(), "R2".to_string()));
        assert_eq!(first.point, Point::new(4.0, 4.0));
        assert!(!first.feasible);
    }

    #[test]
    fn test_polygon_is_convex_order() {
        let solution = GraphicalSolver::new().solve(&square_cut()).unwrap();
        let poly = &solution.polygon;
        assert_eq!(poly.len(), 5);

        // Counter-clockwise: every consecutive cross product is non-negative.
        for k in 0..poly.len() {
            let (a, b, c) = (poly[k], poly[(k + 1) % 5], poly[(k + 2) % 5]);
            let cross = (b.x1 - a.x1) * (c.x2 - b.x2) - (b.x2 - a.x2) * (c.x1 - b.x1);
            assert!(cross >= -1e-9);
        }
    }

    #[test]
    fn test_minimization_picks_lowest() {
        // min 3x1 + 2x2 st x1 + x2 >= 2, x1 <= 4, x2 <= 4
        let mut problem = LinearProblem::new(ObjectiveType::Min, vec![3.0, 2.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Ge, 2.0);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 4.0);
        problem.add_constraint(vec![0.0, 1.0], Relation::Le, 4.0);

        let solution = GraphicalSolver::new().solve(&problem).unwrap();

        assert_eq!(solution.objective_value, 4.0);
        assert_eq!(solution.optimum.point, Point::new(0.0, 2.0));
        assert!(!has_vertex(&solution, 0.0, 0.0));
    }

    #[test]
    fn test_feasibility_checked_before_rounding() {
        // 3x1 + 3x2 = 1 meets the axes at 1/3, which does not survive rounding.
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![2.0, 1.0]);
        problem.add_constraint(vec![3.0, 3.0], Relation::Eq, 1.0);

        let solution = GraphicalSolver::new().solve(&problem).unwrap();

        assert!(!problem.is_feasible(&[0.33333, 0.0], 1e-9));
        assert_eq!(solution.vertices.len(), 2);
        assert_eq!(solution.vertices[0].point, Point::new(0.0, 0.33333));
        assert_eq!(solution.optimum.point, Point::new(0.33333, 0.0));
        // Objectives are evaluated at the rounded vertex.
        assert_eq!(solution.objective_value, 0.66666);
    }

    #[test]
    fn test_requires_two_variables() {
        let problem = LinearProblem::new(ObjectiveType::Max, vec![1.0, 1.0, 1.0]);
        let err = GraphicalSolver::new().solve(&problem).unwrap_err();
        assert_eq!(err, SolverError::GraphicalVariableCount(3));
    }

    #[test]
    fn test_no_feasible_vertices() {
        let mut problem = LinearProblem::new(ObjectiveType::Max, vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Ge, 10.0);
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 2.0);

        let err = GraphicalSolver::new().solve(&problem).unwrap_err();
        assert_eq!(err, SolverError::NoFeasibleVertices);
    }
}
