use std::collections::HashMap;
use std::path::Path;

use log::debug;
use orlab_solver::{CostMatrix, LinearProblem, ObjectiveType, SolverError, TransportProblem};
use thiserror::Error;

use crate::ast::*;
use crate::Parser;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Model {0} is defined more than once")]
    DuplicateModel(String),
    #[error("Model {0} has no maximize/minimize objective")]
    MissingObjective(String),
    #[error("Model {model} is missing its {section} section")]
    MissingSection { model: String, section: &'static str },
    #[error("Non-linear term in {model}: {expr}")]
    NonLinear { model: String, expr: String },
    #[error("Objective of {0} contains a constant term")]
    ConstantObjective(String),
    #[error("Division by zero in {0}")]
    DivisionByZero(String),
    #[error("Model {0} is {1}, not {2}")]
    WrongKind(String, &'static str, &'static str),
    #[error("Method {method} cannot solve {kind} model {model}")]
    UnsupportedMethod {
        model: String,
        method: String,
        kind: &'static str,
    },
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error in {0}: {1}")]
    ParseError(String, String),
    #[error("{model}: {source}")]
    Solver {
        model: String,
        #[source]
        source: SolverError,
    },
}

/// A model compiled into solver input
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledModel {
    Lp { name: String, problem: LinearProblem },
    Assignment { name: String, matrix: CostMatrix },
    Transport { name: String, problem: TransportProblem },
}

impl CompiledModel {
    pub fn name(&self) -> &str {
        match self {
            CompiledModel::Lp { name, .. }
            | CompiledModel::Assignment { name, .. }
            | CompiledModel::Transport { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CompiledModel::Lp { .. } => "lp",
            CompiledModel::Assignment { .. } => "assignment",
            CompiledModel::Transport { .. } => "transport",
        }
    }
}

/// Linear form `sum(coef * var) + constant`, terms in first-appearance order
#[derive(Debug, Clone, Default, PartialEq)]
struct Linear {
    terms: Vec<(String, f64)>,
    constant: f64,
}

impl Linear {
    fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    fn variable(name: &str) -> Self {
        Self {
            terms: vec![(name.to_string(), 1.0)],
            constant: 0.0,
        }
    }

    fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    fn scale(mut self, factor: f64) -> Self {
        for (_, coef) in &mut self.terms {
            *coef *= factor;
        }
        self.constant *= factor;
        self
    }

    /// `self + sign * other`
    fn combine(mut self, other: Linear, sign: f64) -> Self {
        for (name, coef) in other.terms {
            match self.terms.iter_mut().find(|(n, _)| *n == name) {
                Some((_, c)) => *c += sign * coef,
                None => self.terms.push((name, sign * coef)),
            }
        }
        self.constant += sign * other.constant;
        self
    }

    fn coefficient(&self, name: &str) -> f64 {
        self.terms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| *c)
            .unwrap_or(0.0)
    }
}

/// Compiler for turning parsed models into solver inputs
pub struct Compiler {
    models: HashMap<String, Item>,
    /// Model names in declaration order
    order: Vec<String>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Parse and load a model file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), CompileError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| CompileError::IoError(format!("{}: {}", path.display(), e)))?;
        let program = Parser::parse(&source)
            .map_err(|e| CompileError::ParseError(path.display().to_string(), e.to_string()))?;
        self.load(&program)
    }

    /// Register every model of `program`
    pub fn load(&mut self, program: &Program) -> Result<(), CompileError> {
        for item in &program.items {
            let name = item.name().to_string();
            if self.models.contains_key(&name) {
                return Err(CompileError::DuplicateModel(name));
            }
            self.order.push(name.clone());
            self.models.insert(name, item.clone());
        }
        Ok(())
    }

    pub fn model_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn model(&self, name: &str) -> Option<&Item> {
        self.models.get(name)
    }

    pub fn compile(&self, name: &str) -> Result<CompiledModel, CompileError> {
        let item = self
            .models
            .get(name)
            .ok_or_else(|| CompileError::UnknownModel(name.to_string()))?;
        match item {
            Item::Lp(model) => Ok(CompiledModel::Lp {
                name: model.name.clone(),
                problem: self.compile_lp_model(model)?,
            }),
            Item::Assignment(model) => Ok(CompiledModel::Assignment {
                name: model.name.clone(),
                matrix: compile_assignment_model(model)?,
            }),
            Item::Transport(model) => Ok(CompiledModel::Transport {
                name: model.name.clone(),
                problem: compile_transport_model(model)?,
            }),
        }
    }

    /// Compile an `lp` model into a linear problem
    pub fn compile_lp(&self, name: &str) -> Result<LinearProblem, CompileError> {
        match self.compile(name)? {
            CompiledModel::Lp { problem, .. } => Ok(problem),
            other => Err(CompileError::WrongKind(name.to_string(), other.kind(), "lp")),
        }
    }

    fn compile_lp_model(&self, model: &LpModel) -> Result<LinearProblem, CompileError> {
        let objective = model
            .objective
            .as_ref()
            .ok_or_else(|| CompileError::MissingObjective(model.name.clone()))?;

        let objective_form = linearize(&objective.expr, &model.name)?;
        if objective_form.constant != 0.0 {
            return Err(CompileError::ConstantObjective(model.name.clone()));
        }

        // Move everything to the left: lhs - rhs (relation) 0.
        let mut rows = Vec::with_capacity(model.constraints.len());
        for c in &model.constraints {
            let lhs = linearize(&c.lhs, &model.name)?;
            let rhs = linearize(&c.rhs, &model.name)?;
            rows.push((c, lhs.combine(rhs, -1.0)));
        }

        let mut variables: Vec<String> = Vec::new();
        for form in std::iter::once(&objective_form).chain(rows.iter().map(|(_, f)| f)) {
            for (name, _) in &form.terms {
                if !variables.contains(name) {
                    variables.push(name.clone());
                }
            }
        }

        let objective_type = match objective.sense {
            Sense::Maximize => ObjectiveType::Max,
            Sense::Minimize => ObjectiveType::Min,
        };
        let coefficients = |form: &Linear| -> Vec<f64> {
            variables.iter().map(|v| form.coefficient(v)).collect()
        };

        let mut problem =
            LinearProblem::with_variables(variables.clone(), objective_type, coefficients(&objective_form));
        for (decl, form) in &rows {
            let coefs = coefficients(form);
            let rhs = -form.constant + 0.0;
            match &decl.label {
                Some(label) => problem.add_named_constraint(label.clone(), coefs, decl.relation, rhs),
                None => problem.add_constraint(coefs, decl.relation, rhs),
            }
        }

        problem.validate().map_err(|source| CompileError::Solver {
            model: model.name.clone(),
            source,
        })?;
        debug!(
            "compiled lp {}: {} variables, {} constraints",
            model.name,
            problem.num_variables(),
            problem.num_constraints()
        );
        Ok(problem)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

fn linearize(expr: &Expr, model: &str) -> Result<Linear, CompileError> {
    match expr {
        Expr::Number(n) => Ok(Linear::constant(*n)),
        Expr::Variable { name, .. } => Ok(Linear::variable(name)),
        Expr::Neg(inner) => Ok(linearize(inner, model)?.scale(-1.0)),
        Expr::Paren(inner) => linearize(inner, model),
        Expr::BinaryOp { left, op, right } => {
            let l = linearize(left, model)?;
            let r = linearize(right, model)?;
            match op {
                BinaryOp::Add => Ok(l.combine(r, 1.0)),
                BinaryOp::Sub => Ok(l.combine(r, -1.0)),
                BinaryOp::Mul => {
                    if r.is_constant() {
                        Ok(l.scale(r.constant))
                    } else if l.is_constant() {
                        Ok(r.scale(l.constant))
                    } else {
                        Err(CompileError::NonLinear {
                            model: model.to_string(),
                            expr: expr.to_string(),
                        })
                    }
                }
                BinaryOp::Div => {
                    if !r.is_constant() {
                        return Err(CompileError::NonLinear {
                            model: model.to_string(),
                            expr: expr.to_string(),
                        });
                    }
                    if r.constant == 0.0 {
                        return Err(CompileError::DivisionByZero(model.to_string()));
                    }
                    Ok(l.scale(1.0 / r.constant))
                }
            }
        }
    }
}

fn compile_assignment_model(model: &AssignmentModel) -> Result<CostMatrix, CompileError> {
    let costs = model.costs.clone().ok_or_else(|| CompileError::MissingSection {
        model: model.name.clone(),
        section: "costs",
    })?;
    let rows = costs.len();
    let cols = costs.first().map_or(0, Vec::len);
    let row_labels = model
        .rows
        .clone()
        .unwrap_or_else(|| (1..=rows).map(|i| format!("R{}", i)).collect());
    let col_labels = model
        .cols
        .clone()
        .unwrap_or_else(|| (1..=cols).map(|j| format!("C{}", j)).collect());

    CostMatrix::with_labels(row_labels, col_labels, costs).map_err(|source| CompileError::Solver {
        model: model.name.clone(),
        source,
    })
}

fn compile_transport_model(model: &TransportModel) -> Result<TransportProblem, CompileError> {
    let missing = |section| CompileError::MissingSection {
        model: model.name.clone(),
        section,
    };
    let supply = model.supply.clone().ok_or_else(|| missing("supply"))?;
    let demand = model.demand.clone().ok_or_else(|| missing("demand"))?;
    let costs = model.costs.clone().ok_or_else(|| missing("costs"))?;
    let sources = model
        .sources
        .clone()
        .unwrap_or_else(|| (1..=supply.len()).map(|i| format!("S{}", i)).collect());
    let destinations = model
        .destinations
        .clone()
        .unwrap_or_else(|| (1..=demand.len()).map(|j| format!("D{}", j)).collect());

    TransportProblem::with_labels(sources, destinations, supply, demand, costs).map_err(|source| {
        CompileError::Solver {
            model: model.name.clone(),
            source,
        }
    })
}
