//! provtrail CLI: provenance-tracked RDF curation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use oxigraph::model::{NamedNode, Term};
use serde::Serialize;

use provtrail::config::TrailConfig;
use provtrail::curator::{Curator, SnapshotEntry};

const CONFIG_FILE: &str = "provtrail.toml";

#[derive(Parser)]
#[command(name = "provtrail", version, about = "Provenance-tracked RDF curation with time travel")]
struct Cli {
    /// Data directory for persistent storage. Memory-only when omitted.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to provtrail.toml in the data directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest statements from an N-Quads file, one snapshot per subject.
    Load {
        #[arg(long)]
        file: PathBuf,
    },

    /// List an entity's snapshots and the entities its history touches.
    History {
        /// Entity IRI.
        entity: String,
    },

    /// Restore an entity to its state at a point in time.
    Restore {
        /// Entity IRI.
        entity: String,
        /// Target time, RFC 3339 (e.g. 2024-05-01T12:00:00Z).
        #[arg(long)]
        at: String,
    },

    /// Show the orphans and proxies a deletion would leave behind.
    Impact {
        /// Subject IRI.
        entity: String,
        #[arg(long)]
        predicate: Option<String>,
        /// Object IRI.
        #[arg(long)]
        object: Option<String>,
    },

    /// Delete an entity, or one of its statements, applying deletion policies.
    Delete {
        /// Subject IRI.
        entity: String,
        #[arg(long)]
        predicate: Option<String>,
        /// Object IRI.
        #[arg(long)]
        object: Option<String>,
        /// Confirm deletions the policies ask about.
        #[arg(long)]
        confirm: bool,
    },

    /// Reorder the values of an ordered property.
    Reorder {
        /// Ordering predicate IRI.
        #[arg(long)]
        predicate: String,
        /// Named graph of the link statements.
        #[arg(long)]
        graph: Option<String>,
        /// Values in their new order.
        #[arg(required = true)]
        members: Vec<String>,
    },

    /// Merge a duplicate entity into another.
    Merge {
        /// Entity to keep.
        keep: String,
        /// Entity folded into `keep` and deleted.
        duplicate: String,
    },

    /// Run a SPARQL SELECT against the data.
    Query {
        sparql: String,
    },
}

#[derive(Serialize)]
struct HistoryReport {
    entity: String,
    snapshots: Vec<SnapshotEntry>,
    related: Vec<String>,
}

fn iri(value: &str) -> Result<NamedNode> {
    NamedNode::new(value).into_diagnostic()
}

fn optional_iri(value: Option<&str>) -> Result<Option<NamedNode>> {
    value.map(iri).transpose()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn load_config(explicit: Option<&Path>, data_dir: Option<&Path>) -> Result<TrailConfig> {
    if let Some(path) = explicit {
        return Ok(TrailConfig::load(path)?);
    }
    if let Some(path) = data_dir.map(|d| d.join(CONFIG_FILE)).filter(|p| p.exists()) {
        return Ok(TrailConfig::load(&path)?);
    }
    Ok(TrailConfig::default())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("provtrail=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.data_dir.as_deref())?;
    let curator = match &cli.data_dir {
        Some(dir) => Curator::open(dir, config)?,
        None => Curator::in_memory(config)?,
    };

    match cli.command {
        Commands::Load { file } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let snapshots = curator.load_nquads(&content)?;
            println!(
                "Loaded {} with {} new snapshots ({} statements stored)",
                file.display(),
                snapshots.len(),
                curator.data().len()?
            );
        }

        Commands::History { entity } => {
            let entity = iri(&entity)?;
            let history = curator.history(&entity)?;
            let report = HistoryReport {
                entity: entity.as_str().to_string(),
                snapshots: curator.snapshots(&entity)?,
                related: history
                    .entities()
                    .into_iter()
                    .filter(|e| **e != entity)
                    .map(|e| e.as_str().to_string())
                    .collect(),
            };
            print_json(&report)?;
        }

        Commands::Restore { entity, at } => {
            let entity = iri(&entity)?;
            let at: DateTime<Utc> = DateTime::parse_from_rfc3339(&at)
                .into_diagnostic()?
                .with_timezone(&Utc);
            let outcome = curator.restore(&entity, at)?;
            print_json(&outcome)?;
        }

        Commands::Impact {
            entity,
            predicate,
            object,
        } => {
            let entity = iri(&entity)?;
            let predicate = optional_iri(predicate.as_deref())?;
            let object = optional_iri(object.as_deref())?.map(Term::NamedNode);
            let impact = curator.impact(&entity, predicate.as_ref(), object.as_ref())?;
            print_json(&impact)?;
        }

        Commands::Delete {
            entity,
            predicate,
            object,
            confirm,
        } => {
            let entity = iri(&entity)?;
            let object = optional_iri(object.as_deref())?.map(Term::NamedNode);
            let outcome = match optional_iri(predicate.as_deref())? {
                Some(predicate) => curator.delete_statement(&entity, &predicate, object.as_ref(), confirm)?,
                None if object.is_some() => {
                    miette::bail!("--object needs --predicate");
                }
                None => curator.delete_entity(&entity, confirm)?,
            };
            print_json(&outcome)?;
        }

        Commands::Reorder {
            predicate,
            graph,
            members,
        } => {
            let predicate = iri(&predicate)?;
            let graph = optional_iri(graph.as_deref())?;
            let members = members.iter().map(|m| iri(m)).collect::<Result<Vec<_>>>()?;
            let chain = curator.reorder(&predicate, members, graph.as_ref())?;
            println!("Reordered {} values:", chain.len());
            for (i, member) in chain.members().iter().enumerate() {
                println!("  {}. {}", i + 1, member.as_str());
            }
        }

        Commands::Merge { keep, duplicate } => {
            let keep = iri(&keep)?;
            let duplicate = iri(&duplicate)?;
            let snapshots = curator.merge(&keep, &duplicate)?;
            println!(
                "Merged {} into {} ({} snapshots)",
                duplicate.as_str(),
                keep.as_str(),
                snapshots.len()
            );
        }

        Commands::Query { sparql } => {
            let rows = curator.query(&sparql)?;
            let rows: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|(var, term)| (var, serde_json::Value::String(term.to_string())))
                        .collect()
                })
                .collect();
            print_json(&rows)?;
        }
    }

    Ok(())
}
