use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fredsync::config::Config;
use fredsync::db::LocalStore;
use fredsync::fred::FredClient;
use fredsync::model::EntityKind;
use fredsync::sync::SyncOrchestrator;
use fredsync::tree::CategoryTree;

#[derive(Parser, Debug)]
#[command(name = "fredsync")]
#[command(about = "Keep a local cache of FRED categories, series and observations")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fredsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Cache database to use instead of the configured one
  #[arg(long)]
  db: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Print results as JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Count cached rows (category, series or observation)
  Count { kind: EntityKind },

  #[command(flatten)]
  Sync(SyncCommand),
}

/// Commands that may reach the FRED API
#[derive(Subcommand, Debug)]
enum SyncCommand {
  /// List a category and every category below it
  Categories {
    id: i64,
    /// Walk the API depth-first without touching the cache
    #[arg(long)]
    recursive: bool,
  },
  /// Print the category hierarchy below a category
  Tree {
    id: i64,
    /// Only print the branch rooted at this category
    #[arg(long)]
    subtree: Option<i64>,
  },
  /// List the series of a category
  Series { category_id: i64 },
  /// List the observations of a series
  Observations { series_id: String },
  /// Refresh one series if the API has a newer copy
  UpdateSeries { series_id: String },
  /// Refresh every series of a category
  UpdateCategory { category_id: i64 },
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=fredsync=debug)
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  let Some(path) = log_file else {
    tracing_subscriber::registry()
      .with(fmt::layer().with_writer(std::io::stderr))
      .with(filter)
      .init();
    return Ok(None);
  };

  let dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

  let appender = tracing_appender::rolling::never(dir, file_name);
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(filter)
    .init();
  Ok(Some(guard))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_file.as_deref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let db_path = match &args.db {
    Some(path) => path.clone(),
    None => config.database_path()?,
  };

  match args.command {
    Command::Count { kind } => {
      let store = LocalStore::open(&db_path)?;
      let counted = store.count(kind);
      store.close()?;
      println!("{}", counted?);
      Ok(())
    }
    Command::Sync(command) => {
      let client = FredClient::with_base_url(
        &config.fred.url,
        Config::get_api_key()?,
        Duration::from_secs(config.fred.timeout_secs),
      )?;
      let store = LocalStore::open(&db_path)?;
      info!(db = %db_path.display(), "cache opened");
      let orchestrator = SyncOrchestrator::new(client, store).with_pacing(config.discovery);

      // Close the store whether or not the command succeeded
      let outcome = run(&orchestrator, command, args.json).await;
      let closed = orchestrator.close();
      outcome?;
      closed?;
      Ok(())
    }
  }
}

async fn run(
  orchestrator: &SyncOrchestrator<FredClient>,
  command: SyncCommand,
  json: bool,
) -> Result<()> {
  match command {
    SyncCommand::Categories { id, recursive } => {
      let categories = if recursive {
        orchestrator.discover_category_tree_recursive(id).await?
      } else {
        orchestrator.discover_category_tree(id).await?
      };
      print_list(&categories, json)?;
    }
    SyncCommand::Tree { id, subtree } => {
      let categories = orchestrator.discover_category_tree(id).await?;
      let tree = CategoryTree::from_categories(categories)?;
      let tree = match subtree {
        Some(branch) => tree
          .subtree(branch)
          .ok_or_else(|| eyre!("Category {} is not below category {}", branch, id))?,
        None => tree,
      };
      if json {
        let categories: Vec<_> = tree.iter().collect();
        println!("{}", serde_json::to_string_pretty(&categories)?);
      } else {
        print_tree(&tree);
      }
    }
    SyncCommand::Series { category_id } => {
      print_list(&orchestrator.get_series(category_id).await?, json)?;
    }
    SyncCommand::Observations { series_id } => {
      let observations = orchestrator.get_observations(&series_id).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&observations)?);
      } else {
        for o in &observations {
          println!("{}\t{}", o.date, o.value);
        }
      }
    }
    SyncCommand::UpdateSeries { series_id } => {
      if orchestrator.update_series(&series_id).await? {
        println!("{}: updated", series_id);
      } else {
        println!("{}: already up to date", series_id);
      }
    }
    SyncCommand::UpdateCategory { category_id } => {
      let update = orchestrator.update_category(category_id).await?;
      println!(
        "category {}: {} series updated, {} already up to date",
        category_id, update.replaced, update.fresh
      );
    }
  }
  Ok(())
}

fn print_list<T: Display + Serialize>(items: &[T], json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(items)?);
  } else {
    for item in items {
      println!("{}", item);
    }
  }
  Ok(())
}

/// Indented depth-first listing, children in tree order.
fn print_tree(tree: &CategoryTree) {
  let mut stack = vec![(tree.root(), 0usize)];
  while let Some((category, depth)) = stack.pop() {
    println!("{}{} [{}]", "  ".repeat(depth), category.name, category.id);
    for child in tree.children(category.id).into_iter().rev() {
      stack.push((child, depth + 1));
    }
  }
}
