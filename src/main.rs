//! frontpipe - front-end asset pipeline
//!
//! Cleans `dist/`, bundles scripts, minifies styles, compresses images,
//! bundles bower dependencies and watches sources with live-reload.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::style;
use tracing::Level;

mod cli;

use cli::{Cli, Commands, EffectiveCommand, GraphFormat, ListFormat};
use frontpipe::config::{self, Config};
use frontpipe::error::{FrontpipeError, Result};
use frontpipe::graph::TaskGraph;
use frontpipe::pipeline::Pipeline;
use frontpipe::runner::RunnerConfig;

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = Cli::parse();

    let level = if cli.verbose { Level::INFO } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .without_time()
        .init();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:?}", style("error").red().bold(), miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(cwd) = &cli.cwd {
        std::env::set_current_dir(cwd).map_err(|e| FrontpipeError::fs(cwd, e))?;
    }

    match cli.effective_command() {
        EffectiveCommand::Subcommand(cmd) => run_command(cmd, &cli).await,
        EffectiveCommand::RunTasks(tasks) => run_tasks(tasks, &cli).await,
        EffectiveCommand::None => {
            let (config, _) = Config::load(cli.config.as_deref())?;
            let graph = TaskGraph::from_config(&config)?;
            print_task_list(&graph, ListFormat::Table, false);
            Ok(())
        }
    }
}

async fn run_command(cmd: &Commands, cli: &Cli) -> Result<()> {
    match cmd {
        Commands::Run { tasks } => run_tasks(tasks, cli).await,

        Commands::List { format, deps } => {
            let (config, _) = Config::load(cli.config.as_deref())?;
            let graph = TaskGraph::from_config(&config)?;
            print_task_list(&graph, *format, *deps);
            Ok(())
        }

        Commands::Graph { task, format } => {
            let (config, _) = Config::load(cli.config.as_deref())?;
            let graph = TaskGraph::from_config(&config)?;
            print_graph(&graph, task.as_deref(), *format)
        }

        Commands::Init { force } => init_config(*force),

        Commands::Check => {
            let (config, path) = Config::load(cli.config.as_deref())?;
            let graph = TaskGraph::from_config(&config)?;
            config.path_table()?;

            let source = match &path {
                Some(p) => p.display().to_string(),
                None => "default configuration".to_string(),
            };
            println!(
                "{} {} is valid ({} tasks)",
                style("✓").green(),
                source,
                graph.task_names().count()
            );
            Ok(())
        }
    }
}

/// The config file's directory, or the working directory without one
fn project_root(config_path: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(config_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| cwd.join(p))
        .unwrap_or(cwd))
}

async fn run_tasks(tasks: &[String], cli: &Cli) -> Result<()> {
    let (config, path) = Config::load(cli.config.as_deref())?;
    let graph = Arc::new(TaskGraph::from_config(&config)?);

    // Resolve every plan before touching the output tree
    for task in tasks {
        graph.plan(task)?;
    }

    let runner_config = RunnerConfig {
        ordering: config.settings.ordering,
        quiet: cli.quiet,
    };
    let root = project_root(path.as_deref())?;
    let runner = Pipeline::new(root, &config, graph, runner_config)?.runner();

    for task in tasks {
        runner.run_task(task).await?;
    }

    Ok(())
}

fn print_task_list(graph: &TaskGraph, format: ListFormat, show_deps: bool) {
    let mut names: Vec<_> = graph.task_names().collect();
    names.sort();

    match format {
        ListFormat::Table => {
            println!("{}", style("Available tasks:").bold());
            println!();

            let max_name_len = names.iter().map(|n| n.len()).max().unwrap_or(0);

            for name in names {
                let Some(task) = graph.get_task(name) else {
                    continue;
                };
                print!(
                    "  {}{}  {}",
                    style(name).cyan().bold(),
                    " ".repeat(max_name_len - name.len()),
                    style(task.desc.as_deref().unwrap_or("")).dim()
                );

                if show_deps && !task.depends.is_empty() {
                    print!(
                        " {}",
                        style(format!("[deps: {}]", task.depends.join(", "))).yellow().dim()
                    );
                }
                println!();
            }
        }

        ListFormat::Json => {
            let mut tasks = serde_json::Map::new();
            for name in names {
                let Some(task) = graph.get_task(name) else {
                    continue;
                };
                let mut obj = serde_json::Map::new();
                if let Some(desc) = &task.desc {
                    obj.insert("description".to_string(), serde_json::json!(desc));
                }
                if let Some(action) = task.action {
                    obj.insert("action".to_string(), serde_json::json!(action.to_string()));
                }
                if show_deps {
                    obj.insert("depends".to_string(), serde_json::json!(task.depends));
                    obj.insert(
                        "required_by".to_string(),
                        serde_json::json!(graph.dependents(name).unwrap_or_default()),
                    );
                }
                tasks.insert(name.to_string(), serde_json::Value::Object(obj));
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&tasks).unwrap_or_default()
            );
        }

        ListFormat::Plain => {
            for name in names {
                println!("{}", name);
            }
        }
    }
}

fn print_graph(graph: &TaskGraph, task: Option<&str>, format: GraphFormat) -> Result<()> {
    let nodes = match task {
        Some(name) => graph.closure(name)?,
        None => {
            let mut names: Vec<_> = graph.task_names().collect();
            names.sort();
            names.into_iter().filter_map(|n| graph.get_task(n)).collect()
        }
    };

    match format {
        GraphFormat::Text => {
            if let Some(name) = task {
                println!("{} {}", style("Plan for").bold(), style(name).cyan().bold());
                println!();
                for (i, action) in graph.plan(name)?.into_iter().enumerate() {
                    println!("  {}. {}", i + 1, action);
                }
                return Ok(());
            }

            println!("{}", style("Task dependency graph:").bold());
            println!();
            for node in &nodes {
                if node.depends.is_empty() {
                    println!("  {}", style(&node.name).cyan().bold());
                } else {
                    println!(
                        "  {} {} {}",
                        style(&node.name).cyan().bold(),
                        style("←").dim(),
                        node.depends.join(", ")
                    );
                }
            }
        }

        GraphFormat::Dot => {
            println!("digraph frontpipe {{");
            println!("  rankdir=LR;");
            println!("  node [shape=box];");
            for node in &nodes {
                for dep in &node.depends {
                    println!("  \"{}\" -> \"{}\";", dep, node.name);
                }
            }
            println!("}}");
        }

        GraphFormat::Json => {
            let mut json_nodes = Vec::new();
            let mut edges = Vec::new();

            for node in &nodes {
                json_nodes.push(serde_json::json!({
                    "id": node.name,
                    "description": node.desc,
                    "action": node.action.map(|a| a.to_string()),
                }));
                for dep in &node.depends {
                    edges.push(serde_json::json!({ "from": dep, "to": node.name }));
                }
            }

            let mut output = serde_json::json!({ "nodes": json_nodes, "edges": edges });
            if let Some(name) = task {
                let plan: Vec<String> = graph.plan(name)?.iter().map(|a| a.to_string()).collect();
                output["plan"] = serde_json::json!(plan);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = Path::new(config::CONFIG_FILES[0]);

    if path.exists() && !force {
        return Err(FrontpipeError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists (use --force to overwrite)", path.display()),
        )));
    }

    std::fs::write(path, config::TEMPLATE).map_err(|e| FrontpipeError::fs(path, e))?;

    println!(
        "{} Created {}",
        style("✓").green(),
        style(path.display()).bold()
    );

    Ok(())
}
