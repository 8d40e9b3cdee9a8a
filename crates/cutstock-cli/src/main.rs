use clap::Parser;
use cutstock_core::{
    ColumnGeneration, CutStockError, CuttingPlan, GenerationConfig, IterationRecord, PricingMethod, Problem,
    build_allocation_model, build_knapsack_model,
};
use cutstock_solver::VariableKind;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cutstock")]
#[command(about = "One-dimensional cutting stock by column generation", long_about = None)]
struct Cli {
    /// Input file: material length, [part lengths], [part demands]
    file: PathBuf,
    /// Pricing rounds allowed before giving up
    #[arg(long, default_value_t = 1000)]
    max_iterations: usize,
    /// Reduced cost tolerance for convergence
    #[arg(long, default_value_t = 1e-3)]
    epsilon: f64,
    /// Write master.lp, pricing.lp and final.lp of the last iteration here
    #[arg(long, value_name = "DIR")]
    export_lp: Option<PathBuf>,
    /// Pricing method (knapsack, solver)
    #[arg(long, default_value = "knapsack")]
    pricing: String,
    /// Output format (pretty, json)
    #[arg(short, long, default_value = "pretty")]
    format: String,
    /// Log every iteration to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let problem = match cutstock_core::Parser::parse_file(&cli.file) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    };

    let pricing = match cli.pricing.as_str() {
        "knapsack" => PricingMethod::Knapsack,
        "solver" => PricingMethod::Solver,
        other => {
            eprintln!("Unknown pricing method '{}', expected knapsack or solver", other);
            std::process::exit(2);
        }
    };

    let pretty = cli.format != "json";
    if pretty {
        println!("Material length: {}", problem.material_length);
        println!("Part lengths:    {}", format_list(problem.parts.iter().map(|p| p.length)));
        println!("Part demands:    {}", format_list(problem.parts.iter().map(|p| p.demand)));
        println!();
    }

    let config = GenerationConfig::default()
        .with_epsilon(cli.epsilon)
        .with_max_iterations(cli.max_iterations)
        .with_pricing(pricing);
    let mut printed = 0;
    let result = ColumnGeneration::default().with_config(config).run_with(&problem, |record| {
        if pretty {
            printed += 1;
            print_iteration(printed, record);
        }
    });
    if printed > 0 {
        println!();
    }
    let plan = match result {
        Ok(plan) => plan,
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    };

    if let Some(dir) = &cli.export_lp {
        if let Err(e) = export_models(dir, &plan) {
            eprintln!("Error writing LP files to {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }

    if pretty {
        print_plan(&problem, &plan);
    } else {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing plan: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn format_list<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    let items: Vec<String> = items.map(|x| x.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn print_iteration(number: usize, record: &IterationRecord) {
    println!(
        "Iteration {:3}: relaxation value {:.5}, reduced cost {:.5}",
        number, record.relaxation_objective, record.reduced_cost
    );
}

/// Optimality is only ever claimed over the generated pool
fn status_lines(plan: &CuttingPlan) -> Vec<String> {
    let mut lines = vec!["Status: converged (restricted integer plan)".to_string()];
    if plan.allocation.proven_optimal {
        lines.push(format!("Integer allocation: optimal over {} generated patterns", plan.pool.len()));
    } else {
        lines.push("Integer allocation: rounded, not proven optimal over the generated patterns".to_string());
    }
    if let Some(bound) = plan.relaxation_bound {
        lines.push(format!("Relaxation bound: {:.5}", bound));
    }
    lines
}

fn print_plan(problem: &Problem, plan: &CuttingPlan) {
    for line in status_lines(plan) {
        println!("{}", line);
    }
    println!("Material units used: {}", plan.material_units);
    println!();
    println!("Plan:");
    for &(j, units) in &plan.allocation.units {
        println!("  {:30} {:6}", plan.pool[j].display(problem).to_string(), units);
    }
    println!();
    match plan.utilization {
        Some(u) => println!("Utilization: {:.2}%", u * 100.0),
        None => println!("Utilization: n/a (no material used)"),
    }
    println!("Time used: {:.5} s", plan.elapsed.as_secs_f64());
}

fn report_failure(error: &CutStockError) {
    match error {
        CutStockError::MasterNotOptimal { status, violations }
        | CutStockError::FinalNotOptimal { status, violations } => {
            eprintln!("Status: {}", status.to_string().to_uppercase());
            eprintln!("{}", error);
            if !violations.is_empty() {
                eprintln!("Demand that cannot be met:");
                for v in violations {
                    eprintln!("  - {}", v);
                }
            }
        }
        CutStockError::PricingNotOptimal { status } => {
            eprintln!("Status: {}", status.to_string().to_uppercase());
            eprintln!("{}", error);
        }
        CutStockError::NotConverged { .. } => {
            eprintln!("Status: NOT CONVERGED");
            eprintln!("{}", error);
            eprintln!("Try raising --max-iterations or --epsilon.");
        }
        _ => eprintln!("Error: {}", error),
    }
}

fn export_models(dir: &Path, plan: &CuttingPlan) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let master = build_allocation_model(&plan.problem, &plan.pool, VariableKind::Continuous);
    std::fs::write(dir.join("master.lp"), master.to_lp_format())?;

    if let Some(last) = plan.iterations.last() {
        let pricing = build_knapsack_model(&plan.problem, &last.duals);
        std::fs::write(dir.join("pricing.lp"), pricing.to_lp_format())?;
    }

    let final_model = build_allocation_model(&plan.problem, &plan.pool, VariableKind::Integer);
    std::fs::write(dir.join("final.lp"), final_model.to_lp_format())?;

    tracing::info!("Wrote LP models to {}", dir.display());
    Ok(())
}
