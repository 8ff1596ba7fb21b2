//! Dispatch a compiled model to the solver that handles it.

use std::fmt;
use std::str::FromStr;

use log::info;
use orlab_solver::{
    AssignmentSolution, BigMSolver, BinarySolution, BinarySolver, DualSimplexSolver, DualSolution,
    GraphicalSolution, GraphicalSolver, HungarianSolver, LinearProblem, NorthwestCorner, Relation,
    SimplexSolver, Solution, TransportSolution,
};

use crate::compiler::{CompileError, CompiledModel, Compiler};
use crate::parser::Parser;

/// Solution method for `lp` models
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Simplex,
    BigM,
    Dual,
    Graphical,
    Binary,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Simplex,
        Method::BigM,
        Method::Dual,
        Method::Graphical,
        Method::Binary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Simplex => "simplex",
            Method::BigM => "big-m",
            Method::Dual => "dual",
            Method::Graphical => "graphical",
            Method::Binary => "binary",
        }
    }

    /// Plain simplex when every row is `<=` with a non-negative rhs, Big-M otherwise.
    pub fn default_for(problem: &LinearProblem) -> Method {
        let standard = problem
            .constraints
            .iter()
            .all(|c| c.relation == Relation::Le && c.rhs >= 0.0);
        if standard { Method::Simplex } else { Method::BigM }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| {
                let names: Vec<_> = Method::ALL.iter().map(|m| m.as_str()).collect();
                format!("Unknown method '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Result of running a model, tagged by the algorithm that produced it
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "kebab-case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Tableau {
        model: String,
        method: Method,
        solution: Solution,
    },
    Dual {
        model: String,
        solution: DualSolution,
    },
    Graphical {
        model: String,
        solution: GraphicalSolution,
    },
    Binary {
        model: String,
        solution: BinarySolution,
    },
    Assignment {
        model: String,
        solution: AssignmentSolution,
    },
    Transport {
        model: String,
        solution: TransportSolution,
    },
}

impl SolveOutcome {
    pub fn model(&self) -> &str {
        match self {
            SolveOutcome::Tableau { model, .. }
            | SolveOutcome::Dual { model, .. }
            | SolveOutcome::Graphical { model, .. }
            | SolveOutcome::Binary { model, .. }
            | SolveOutcome::Assignment { model, .. }
            | SolveOutcome::Transport { model, .. } => model,
        }
    }
}

/// Solve `compiled`.
///
/// `method` only applies to `lp` models; assignment and transport models pick
/// their solver by kind. With `balance`, an unbalanced transport table gets a
/// dummy row or column instead of being rejected.
pub fn run(
    compiled: &CompiledModel,
    method: Option<Method>,
    balance: bool,
) -> Result<SolveOutcome, CompileError> {
    let name = compiled.name().to_string();
    let solver_err = |source| CompileError::Solver {
        model: name.clone(),
        source,
    };

    let outcome = match compiled {
        CompiledModel::Lp { problem, .. } => {
            let method = method.unwrap_or_else(|| Method::default_for(problem));
            info!("solving {} with {}", name, method);
            match method {
                Method::Simplex => SolveOutcome::Tableau {
                    model: name.clone(),
                    method,
                    solution: SimplexSolver::new().solve(problem).map_err(solver_err)?,
                },
                Method::BigM => SolveOutcome::Tableau {
                    model: name.clone(),
                    method,
                    solution: BigMSolver::new().solve(problem).map_err(solver_err)?,
                },
                Method::Dual => SolveOutcome::Dual {
                    model: name.clone(),
                    solution: DualSimplexSolver::new().solve(problem).map_err(solver_err)?,
                },
                Method::Graphical => SolveOutcome::Graphical {
                    model: name.clone(),
                    solution: GraphicalSolver::new().solve(problem).map_err(solver_err)?,
                },
                Method::Binary => SolveOutcome::Binary {
                    model: name.clone(),
                    solution: BinarySolver::new().solve(problem).map_err(solver_err)?,
                },
            }
        }
        CompiledModel::Assignment { matrix, .. } => {
            reject_method(compiled, method)?;
            SolveOutcome::Assignment {
                model: name.clone(),
                solution: HungarianSolver::new().solve(matrix).map_err(solver_err)?,
            }
        }
        CompiledModel::Transport { problem, .. } => {
            reject_method(compiled, method)?;
            let problem = if balance { problem.balanced() } else { problem.clone() };
            SolveOutcome::Transport {
                model: name.clone(),
                solution: NorthwestCorner::new().solve(&problem).map_err(solver_err)?,
            }
        }
    };
    Ok(outcome)
}

/// Parse `source`, compile `model` and [`run`] it.
pub fn solve_source(
    source: &str,
    model: &str,
    method: Option<Method>,
    balance: bool,
) -> Result<SolveOutcome, CompileError> {
    let program = Parser::parse(source)
        .map_err(|e| CompileError::ParseError("<source>".to_string(), e.to_string()))?;
    let mut compiler = Compiler::new();
    compiler.load(&program)?;
    let compiled = compiler.compile(model)?;
    run(&compiled, method, balance)
}

fn reject_method(compiled: &CompiledModel, method: Option<Method>) -> Result<(), CompileError> {
    match method {
        Some(method) => Err(CompileError::UnsupportedMethod {
            model: compiled.name().to_string(),
            method: method.to_string(),
            kind: compiled.kind(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orlab_solver::{SolutionStatus, SolverError};

    const SOURCE: &str = r#"
lp production {
    maximize 3 x1 + 5 x2
    x1 <= 4
    2 x2 <= 12
    3 x1 + 2 x2 <= 18
}

lp diet {
    minimize 2 x1 + 3 x2
    x1 + x2 >= 4
    x1 <= 3
}

assignment crews {
    costs { [4, 2, 8] [4, 3, 7] [3, 1, 6] }
}

transport short {
    supply [10, 20]
    demand [10, 10]
    costs { [1, 2] [3, 4] }
}
"#;

    fn compile(name: &str) -> CompiledModel {
        let program = Parser::parse(SOURCE).unwrap();
        let mut compiler = Compiler::new();
        compiler.load(&program).unwrap();
        compiler.compile(name).unwrap()
    }

    #[test]
    fn test_method_names() {
        assert_eq!("big-m".parse::<Method>(), Ok(Method::BigM));
        assert_eq!("Dual".parse::<Method>(), Ok(Method::Dual));
        assert!("revised".parse::<Method>().is_err());
    }

    #[test]
    fn test_default_method() {
        let outcome = run(&compile("production"), None, false).unwrap();
        match outcome {
            SolveOutcome::Tableau { method, solution, .. } => {
                assert_eq!(method, Method::Simplex);
                assert!((solution.objective_value.unwrap() - 36.0).abs() < 1e-6);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }

        match run(&compile("diet"), None, false).unwrap() {
            SolveOutcome::Tableau { method, solution, .. } => {
                assert_eq!(method, Method::BigM);
                assert!((solution.objective_value.unwrap() - 9.0).abs() < 1e-6);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_every_method_agrees_on_production() {
        let compiled = compile("production");
        for method in [Method::Simplex, Method::BigM, Method::Graphical] {
            let value = match run(&compiled, Some(method), false).unwrap() {
                SolveOutcome::Tableau { solution, .. } => solution.objective_value.unwrap(),
                SolveOutcome::Graphical { solution, .. } => solution.objective_value,
                other => panic!("Unexpected outcome {:?}", other),
            };
            assert!((value - 36.0).abs() < 1e-6, "{} gave {}", method, value);
        }

        match run(&compiled, Some(Method::Dual), false).unwrap() {
            SolveOutcome::Dual { solution, .. } => {
                assert_eq!(solution.status, SolutionStatus::Optimal);
                assert!((solution.objective_value.unwrap() - 36.0).abs() < 1e-3);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_assignment_ignores_balance_and_rejects_method() {
        let compiled = compile("crews");
        match run(&compiled, None, false).unwrap() {
            SolveOutcome::Assignment { solution, .. } => {
                assert!((solution.total_cost - 12.0).abs() < 1e-9);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }

        assert!(matches!(
            run(&compiled, Some(Method::Simplex), false),
            Err(CompileError::UnsupportedMethod { kind: "assignment", .. })
        ));
    }

    #[test]
    fn test_transport_balance_flag() {
        let compiled = compile("short");
        assert!(matches!(
            run(&compiled, None, false),
            Err(CompileError::Solver {
                source: SolverError::Unbalanced { .. },
                ..
            })
        ));

        match run(&compiled, None, true).unwrap() {
            SolveOutcome::Transport { solution, .. } => {
                assert_eq!(solution.problem.destinations.len(), 3);
                assert_eq!(solution.problem.destinations[2], "Dummy");
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_solve_source_balances_only_on_request() {
        assert!(matches!(
            solve_source(SOURCE, "short", None, false),
            Err(CompileError::Solver {
                source: SolverError::Unbalanced { .. },
                ..
            })
        ));
        match solve_source(SOURCE, "short", None, true).unwrap() {
            SolveOutcome::Transport { solution, .. } => {
                assert!((solution.problem.total_demand() - 30.0).abs() < 1e-9);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert!(matches!(
            solve_source("lp broken {", "broken", None, false),
            Err(CompileError::ParseError(..))
        ));
    }
}
