use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use loomcore::{parse_canvas, Graph, NodeStatus, RunEvent, RunStatus, Value};
use loomrun::{Engine, NodeRegistry};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Workflow graph engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to a canvas JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial inputs as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file without running it
    Validate {
        /// Path to a canvas JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file, input).await?;
        }
        Commands::Validate { file } => {
            validate_workflow(file)?;
        }
        Commands::Nodes => {
            list_nodes();
        }
    }

    Ok(())
}

fn load_graph(file: &PathBuf) -> Result<Graph> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    parse_canvas(&json).with_context(|| format!("failed to parse {}", file.display()))
}

fn parse_inputs(input: Option<String>) -> Result<HashMap<String, Value>> {
    let Some(input) = input else {
        return Ok(HashMap::new());
    };
    let json: serde_json::Value = serde_json::from_str(&input).context("invalid input JSON")?;
    match Value::from_json(json) {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("input must be a JSON object")),
    }
}

fn engine_with_builtins() -> Engine {
    let mut registry = NodeRegistry::new();
    loomnodes::register_builtins(&mut registry);
    Engine::new(registry)
}

async fn run_workflow(file: PathBuf, input: Option<String>) -> Result<()> {
    let graph = load_graph(&file)?;
    println!("Workflow: {} ({} nodes, {} edges)", graph.name, graph.nodes.len(), graph.edges.len());

    let inputs = parse_inputs(input)?;
    let engine = engine_with_builtins();

    let mut events = engine.subscribe();
    let feed = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RunEvent::RunStarted { run_id, .. } => {
                    println!("run {run_id} started");
                }
                RunEvent::NodeStatusChanged {
                    node_id,
                    status,
                    error,
                    ..
                } => match status {
                    NodeStatus::Running => println!("  {node_id}: running"),
                    NodeStatus::Succeeded => println!("  {node_id}: succeeded"),
                    NodeStatus::Skipped => println!("  {node_id}: skipped"),
                    NodeStatus::Failed => {
                        println!("  {node_id}: failed ({})", error.as_deref().unwrap_or("?"));
                    }
                    _ => {}
                },
                RunEvent::RunFinished {
                    status, duration_ms, ..
                } => {
                    println!("run finished: {status:?} in {duration_ms}ms");
                    break;
                }
            }
        }
    });

    let report = match engine.execute(graph, inputs).await {
        Ok(report) => report,
        Err(loomcore::EngineError::Validation(validation)) => {
            eprintln!("workflow failed validation:");
            for error in &validation.errors {
                eprintln!("  - {error}");
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    let _ = feed.await;

    println!();
    println!("Outputs:");
    let mut node_ids: Vec<_> = report.node_states.keys().collect();
    node_ids.sort();
    for node_id in node_ids {
        let state = &report.node_states[node_id];
        if state.output.is_empty() {
            continue;
        }
        println!("  {node_id}:");
        let mut ports: Vec<_> = state.output.iter().collect();
        ports.sort_by_key(|(port, _)| port.as_str());
        for (port, value) in ports {
            println!("    {port}: {}", value.render());
        }
    }

    if !matches!(report.status, RunStatus::Succeeded) {
        std::process::exit(1);
    }
    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    let graph = load_graph(&file)?;
    let engine = engine_with_builtins();

    let report = engine.validate(&graph);
    if report.ok() {
        println!(
            "{} is valid ({} nodes, {} edges)",
            file.display(),
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(())
    } else {
        eprintln!("{} failed validation:", file.display());
        for error in &report.errors {
            eprintln!("  - {error}");
        }
        std::process::exit(1);
    }
}

fn list_nodes() {
    let mut registry = NodeRegistry::new();
    loomnodes::register_builtins(&mut registry);

    println!("Available node types:");
    for spec in registry.node_types() {
        println!("  {} [{}]", spec.node_type, spec.category);
        if !spec.description.is_empty() {
            println!("    {}", spec.description);
        }
    }
}
