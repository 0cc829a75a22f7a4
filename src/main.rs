use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use cpg_serve::api::requests::{
    CallGraphRequest, ImpactRequest, NamedQueryRequest, NeighborhoodRequest, Params, SliceRequest,
};
use cpg_serve::api::wire::{CallGraphJson, ImpactJson, NeighborhoodJson, SliceJson};
use cpg_serve::catalog;
use cpg_serve::config::loader::{load_config, ConfigOverrides};
use cpg_serve::config::schema::ServeConfig;
use cpg_serve::db::schema::{initialize_database, open_read_only, seed_builtin_queries};
use cpg_serve::error::{CpgError, Result};
use cpg_serve::graph::store::SqliteGraph;
use cpg_serve::types::{CallDirection, SliceDirection};
use cpg_serve::{api, observability};

#[derive(Parser)]
#[command(name = "cpg-serve", author, version, about, long_about = None)]
struct Cli {
    /// YAML config file, applied over the user and project config
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CPG database path
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Listen address, e.g. 127.0.0.1:8080
        #[arg(long)]
        addr: Option<String>,

        /// Number of read-only connections
        #[arg(long)]
        pool_size: Option<usize>,
    },
    /// Create an empty CPG database with the expected schema
    Init {
        /// Also install the built-in catalog queries
        #[arg(long)]
        seed_catalog: bool,
    },
    /// Bounded call-graph traversal around a function
    Call {
        function_id: String,

        /// both, callers or callees
        #[arg(long, default_value = "both")]
        direction: CallDirection,

        #[arg(long)]
        max_depth: Option<i64>,

        #[arg(long)]
        max_nodes: Option<i64>,
    },
    /// Direct callers and callees of a function
    Neighbors { function_id: String },
    /// Data-flow slice from a node
    Slice {
        node_id: String,

        /// forward or backward
        #[arg(long, default_value = "forward")]
        direction: SliceDirection,

        #[arg(long)]
        max_depth: Option<i64>,
    },
    /// Functions that transitively call a function
    Impact {
        function_id: String,

        #[arg(long)]
        max_depth: Option<i64>,

        #[arg(long)]
        limit: Option<i64>,
    },
    /// Run a named catalog query
    Query {
        name: String,

        /// Query argument as key=value (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        #[arg(long)]
        limit: Option<i64>,
    },
    /// List catalog queries
    Queries,
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    observability::init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut overrides = ConfigOverrides {
        db: cli.db.clone(),
        ..Default::default()
    };
    if let Commands::Serve { addr, pool_size } = &cli.command {
        overrides.addr = addr.clone();
        overrides.pool_size = *pool_size;
    }
    let project_root = std::env::current_dir().ok();
    let config = load_config(cli.config.as_deref(), project_root.as_deref(), &overrides)?;

    match cli.command {
        Commands::Serve { .. } => api::run_server(&config).await,
        Commands::Init { seed_catalog } => init(&config, seed_catalog),
        Commands::Call {
            function_id,
            direction,
            max_depth,
            max_nodes,
        } => {
            let request = CallGraphRequest::new(function_id, direction, max_depth, max_nodes)?;
            let conn = open_read_only(&config.database.path)?;
            let graph = request.run(&SqliteGraph::new(&conn))?;
            print_json(&CallGraphJson::from(graph))
        }
        Commands::Neighbors { function_id } => {
            let request = NeighborhoodRequest::new(function_id)?;
            let conn = open_read_only(&config.database.path)?;
            let hood = request.run(&SqliteGraph::new(&conn))?;
            print_json(&NeighborhoodJson::from(hood))
        }
        Commands::Slice {
            node_id,
            direction,
            max_depth,
        } => {
            let request = SliceRequest::new(node_id, direction, max_depth)?;
            let conn = open_read_only(&config.database.path)?;
            let slice = request.run(&SqliteGraph::new(&conn))?;
            print_json(&SliceJson::from(slice))
        }
        Commands::Impact {
            function_id,
            max_depth,
            limit,
        } => {
            let request = ImpactRequest::new(function_id, max_depth, limit)?;
            let conn = open_read_only(&config.database.path)?;
            let report = request.run(&SqliteGraph::new(&conn))?;
            print_json(&ImpactJson::from(report))
        }
        Commands::Query {
            name,
            params,
            limit,
        } => {
            let params: Params = params.into_iter().collect();
            let request = NamedQueryRequest::new(name, params, limit)?;
            let conn = open_read_only(&config.database.path)?;
            print_json(&request.run(&conn)?)
        }
        Commands::Queries => {
            let conn = open_read_only(&config.database.path)?;
            print_json(&catalog::list_queries(&conn)?)
        }
    }
}

fn init(config: &ServeConfig, seed_catalog: bool) -> Result<()> {
    let path = &config.database.path;
    let path_str = path
        .to_str()
        .ok_or_else(|| CpgError::Config(format!("database path is not UTF-8: {}", path.display())))?;
    let conn = initialize_database(path_str)?;
    let seeded = if seed_catalog {
        seed_builtin_queries(&conn)?
    } else {
        0
    };
    tracing::info!("initialized {} ({} catalog queries added)", path.display(), seeded);
    print_json(&serde_json::json!({
        "database": path.display().to_string(),
        "catalog_queries_added": seeded,
    }))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
