use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use threadline_config::GraphDef;
use threadline_engine::{Engine, ExecutionEvent, spawn_stream};
use threadline_node::NodeRegistry;
use threadline_workflow::State;

/// Threadline - run workflow graphs of named state-transforming nodes
#[derive(Parser)]
#[command(name = "threadline")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a graph with the initial state read from stdin
  Run {
    /// Path to the graph definition (JSON)
    graph_file: PathBuf,

    /// Print execution events as JSON lines while the graph runs
    #[arg(long)]
    stream: bool,
  },

  /// Validate a graph definition without running it
  Validate {
    /// Path to the graph definition (JSON)
    graph_file: PathBuf,
  },

  /// List the registered nodes
  Nodes,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("threadline=info,warn")),
    )
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run { graph_file, stream }) => {
      run_graph(&graph_file, stream).await?;
    }
    Some(Commands::Validate { graph_file }) => {
      let def = load_graph(&graph_file)?;
      eprintln!("Graph '{}' is valid ({} nodes)", def.name, def.nodes.len());
    }
    Some(Commands::Nodes) => {
      for name in builtin_registry()?.list() {
        println!("{}", name);
      }
    }
    None => {
      println!("threadline - use --help to see available commands");
    }
  }

  Ok(())
}

fn builtin_registry() -> Result<NodeRegistry> {
  let mut registry = NodeRegistry::new();
  threadline_nodes_text::register_builtin(&mut registry)
    .context("failed to register builtin nodes")?;
  Ok(registry)
}

fn load_graph(graph_file: &Path) -> Result<GraphDef> {
  let def = GraphDef::from_file(graph_file)
    .with_context(|| format!("failed to load graph file: {}", graph_file.display()))?;
  def
    .validate()
    .with_context(|| format!("invalid graph file: {}", graph_file.display()))?;
  Ok(def)
}

async fn run_graph(graph_file: &Path, stream: bool) -> Result<()> {
  let def = load_graph(graph_file)?;
  eprintln!("Loaded graph: {}", def.name);

  let registry = builtin_registry()?;
  if let Some(missing) = def.nodes.iter().find(|n| !registry.contains(n)) {
    warn!(node = %missing, "graph declares a node that is not registered");
  }

  let initial_state = read_state_from_stdin()?;
  let engine = Arc::new(Engine::in_memory(registry));
  let graph_id = engine
    .create_graph(def)
    .await
    .context("failed to create graph")?;

  if stream {
    let mut events = spawn_stream(engine.clone(), graph_id, initial_state);
    while let Some(event) = events.events.recv().await {
      println!("{}", serde_json::to_string(&event)?);
      if let ExecutionEvent::Error { message, .. } = &event {
        eprintln!("Run stopped: {}", message);
      }
    }
    let result = events.finish().await.context("graph run failed")?;
    eprintln!("Run {} finished: {:?}", result.run_id, result.status);
  } else {
    let result = engine
      .run_graph(&graph_id, &initial_state)
      .await
      .context("graph run failed")?;
    eprintln!(
      "Run {} finished: {:?} after {} steps",
      result.run_id,
      result.status,
      result.log.len()
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
  }

  Ok(())
}

fn read_state_from_stdin() -> Result<State> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(State::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read initial state from stdin")?;

  if input.trim().is_empty() {
    return Ok(State::new());
  }

  let value: serde_json::Value =
    serde_json::from_str(&input).context("failed to parse initial state JSON from stdin")?;
  match value {
    serde_json::Value::Object(state) => Ok(state),
    other => bail!("initial state must be a JSON object, got {}", other),
  }
}
