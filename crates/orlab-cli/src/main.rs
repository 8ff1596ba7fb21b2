use clap::{Parser, Subcommand};
use log::debug;
use orlab_lang::{run, CompiledModel, Method, SolveOutcome};
use orlab_solver::{Iteration, Solution, SolutionStatus, Tableau, VariableValue};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "orlab")]
#[command(about = "Operations research algorithms with step-by-step traces", long_about = None)]
struct Cli {
    /// Log solver progress (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a model file and output the AST
    Parse {
        /// The file to parse
        file: PathBuf,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Check a model file for errors
    Check {
        /// The file to check
        file: PathBuf,
    },
    /// Solve one model and print the solution
    Solve {
        /// The file containing the model
        file: PathBuf,
        /// The model name to solve
        model: String,
        /// Method for lp models (simplex, big-m, dual, graphical, binary)
        #[arg(short, long)]
        method: Option<Method>,
        /// Print every intermediate step
        #[arg(short, long)]
        steps: bool,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
        /// Add a dummy source or destination to unbalanced transport tables
        #[arg(short, long)]
        balance: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Parse { file, format } => {
            let source = read_source(&file);
            match orlab_lang::Parser::parse(&source) {
                Ok(program) => {
                    if format == "json" {
                        print_json(&program);
                    } else {
                        println!("{:#?}", program);
                    }
                }
                Err(e) => fail(&format!("Parse error: {}", e)),
            }
        }
        Commands::Check { file } => {
            let compiler = load(&file);
            let mut errors = 0;
            for name in compiler.model_names() {
                match compiler.compile(&name) {
                    Ok(compiled) => println!("✓ {} {}", compiled.kind(), name),
                    Err(e) => {
                        println!("✗ {}", e);
                        errors += 1;
                    }
                }
            }
            if errors > 0 {
                fail(&format!("{} model(s) failed to compile", errors));
            }
        }
        Commands::Solve {
            file,
            model,
            method,
            steps,
            format,
            balance,
        } => {
            let compiler = load(&file);
            let compiled = compiler
                .compile(&model)
                .unwrap_or_else(|e| fail(&format!("Compile error: {}", e)));
            debug!("compiled {} model {}", compiled.kind(), compiled.name());

            let outcome =
                run(&compiled, method, balance).unwrap_or_else(|e| fail(&format!("Solve error: {}", e)));

            if format == "json" {
                print_json(&outcome);
            } else {
                print_outcome(&compiled, &outcome, steps);
            }
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn read_source(file: &Path) -> String {
    std::fs::read_to_string(file).unwrap_or_else(|e| fail(&format!("Error reading file: {}", e)))
}

fn load(file: &Path) -> orlab_lang::Compiler {
    let source = read_source(file);
    let program =
        orlab_lang::Parser::parse(&source).unwrap_or_else(|e| fail(&format!("Parse error: {}", e)));
    let mut compiler = orlab_lang::Compiler::new();
    if let Err(e) = compiler.load(&program) {
        fail(&format!("Compile error: {}", e));
    }
    compiler
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(&format!("Error serializing output: {}", e)),
    }
}

fn num(value: f64) -> String {
    let rounded = (value * 1e4).round() / 1e4;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{}", rounded)
    }
}

fn print_values(title: &str, values: &[VariableValue]) {
    if values.is_empty() {
        return;
    }
    println!("{}:", title);
    for v in values {
        println!("  {:<12} {:>12}", v.name, num(v.value));
    }
}

fn print_tableau(tableau: &Tableau) {
    let width = 10;
    print!("  {:<8}", "basis");
    for col in tableau.columns() {
        print!("{:>width$}", col);
    }
    println!("{:>width$}", "rhs");

    let labels = tableau.basis_labels();
    for (i, row) in tableau.rows().iter().enumerate() {
        let label = if i < labels.len() { labels[i] } else { "z" };
        print!("  {:<8}", label);
        for value in row {
            print!("{:>width$}", num(*value));
        }
        println!();
    }
}

fn print_iterations(iterations: &[Iteration]) {
    for it in iterations {
        println!();
        println!("Step {}: {}", it.index, it.description);
        print_tableau(&it.tableau);
    }
    println!();
}

fn print_tableau_solution(solution: &Solution) {
    println!("Status: {}", solution.status);
    if let Some(value) = solution.objective_value {
        println!("Objective: {}", num(value));
    }
    println!("Iterations: {}", solution.iteration_count);
    if solution.status == SolutionStatus::Infeasible {
        print_values("Artificials still basic", &solution.artificials);
        return;
    }
    if solution.status != SolutionStatus::Unbounded {
        print_values("Variables", &solution.variable_values);
        print_values("Slack", &solution.slack_values);
        print_values("Artificials still basic", &solution.artificials);
    }
}

fn print_matrix(rows: &[Vec<f64>]) {
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>8}", num(*v))).collect();
        println!("  {}", cells.join(""));
    }
}

fn print_outcome(compiled: &CompiledModel, outcome: &SolveOutcome, steps: bool) {
    println!("Model: {} ({})", outcome.model(), compiled.kind());

    match outcome {
        SolveOutcome::Tableau { method, solution, .. } => {
            println!("Method: {}", method);
            if steps {
                print_iterations(&solution.iterations);
            }
            println!();
            print_tableau_solution(solution);
        }
        SolveOutcome::Dual { solution, .. } => {
            println!("Method: {}", Method::Dual);
            println!();
            println!("Dual problem ({:?}):", solution.dual.objective_type);
            for c in &solution.dual.constraints {
                let terms: Vec<String> = c
                    .coefficients
                    .iter()
                    .zip(&solution.dual.variables)
                    .map(|(a, y)| format!("{} {}", num(*a), y))
                    .collect();
                println!("  {}: {} {} {}", c.name, terms.join(" + "), c.relation, num(c.rhs));
            }
            if steps {
                print_iterations(&solution.iterations);
            }
            println!();
            println!("Status: {}", solution.status);
            match solution.objective_value {
                Some(value) => println!("Objective: {}", num(value)),
                None => println!("Dual objective at stop: {}", num(solution.dual_objective_value)),
            }
            println!("Iterations: {}", solution.iteration_count);
            println!("Shadow prices:");
            for y in &solution.dual_values {
                println!("  {:<6} {:<12} {:>12}", y.name, y.constraint, num(y.value));
            }
        }
        SolveOutcome::Graphical { solution, .. } => {
            println!("Method: {}", Method::Graphical);
            println!();
            println!("Lines:");
            for line in &solution.lines {
                println!(
                    "  {:<8} {} x1 + {} x2 = {}",
                    line.name,
                    num(line.a),
                    num(line.b),
                    num(line.value)
                );
            }
            if steps {
                println!("Intersections:");
                for i in &solution.intersections {
                    println!(
                        "  {} x {}: ({}, {}) {}",
                        i.lines.0,
                        i.lines.1,
                        num(i.point.x1),
                        num(i.point.x2),
                        if i.feasible { "feasible" } else { "infeasible" }
                    );
                }
            }
            println!("Vertices:");
            for v in &solution.vertices {
                println!("  ({}, {}) -> {}", num(v.point.x1), num(v.point.x2), num(v.objective));
            }
            println!();
            println!(
                "Optimum: ({}, {}) with objective {}",
                num(solution.optimum.point.x1),
                num(solution.optimum.point.x2),
                num(solution.objective_value)
            );
        }
        SolveOutcome::Binary { solution, .. } => {
            println!("Method: {}", Method::Binary);
            if steps {
                println!();
                println!("Feasible candidates:");
                for c in &solution.candidates {
                    let bits: Vec<String> = c.values.iter().map(|b| b.to_string()).collect();
                    println!("  [{}] -> {}", bits.join(", "), num(c.objective));
                }
            }
            println!();
            println!("Status: {}", solution.status);
            println!("Evaluated: {}", solution.evaluated);
            if let Some(value) = solution.objective_value {
                println!("Objective: {}", num(value));
                print_values("Variables", &solution.variable_values);
            }
        }
        SolveOutcome::Assignment { solution, .. } => {
            if steps {
                for (i, step) in solution.steps.iter().enumerate() {
                    println!();
                    println!("Step {}: {}", i + 1, step.description);
                    print_matrix(&step.matrix);
                }
            }
            println!();
            println!("Assignments:");
            for a in &solution.assignments {
                println!("  {:<10} -> {:<10} {:>8}", a.row_label, a.col_label, num(a.cost));
            }
            if !solution.unassigned.is_empty() {
                println!("Unassigned: {}", solution.unassigned.join(", "));
            }
            println!("Total cost: {}", num(solution.total_cost));
        }
        SolveOutcome::Transport { solution, .. } => {
            if steps {
                for step in &solution.steps {
                    println!();
                    println!("Step {}: {}", step.index, step.description);
                    print_matrix(&step.allocation);
                }
            }
            println!();
            println!("Allocation:");
            let problem = &solution.problem;
            print!("  {:<10}", "");
            for d in &problem.destinations {
                print!("{:>10}", d);
            }
            println!();
            for (source, row) in problem.sources.iter().zip(&solution.allocation) {
                print!("  {:<10}", source);
                for amount in row {
                    print!("{:>10}", num(*amount));
                }
                println!();
            }
            println!("Total cost: {}", num(solution.total_cost));
        }
    }
}
