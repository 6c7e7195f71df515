//! Command-line front end for the ordered tree engine.
//!
//! # Responsibility
//! - Map subcommands onto `TreeEngine` calls over a SQLite file.
//! - Print results as JSON on stdout and errors on stderr.

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use nodechain_core::{
    core_version, default_log_level, init_logging, DropPosition, NewNode, NodeFieldsUpdate,
    NodeId, NodeType, SqliteNodeStore, TreeConfig, TreeEngine, TreeNode,
};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "nodechain")]
#[command(about = "Ordered typed tree stored as sibling chains")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "nodechain.db")]
    db: PathBuf,

    /// JSON file with types, allowed parents and sort priority
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for rolling log files; logging stays off when omitted
    #[arg(long)]
    log_dir: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the core version
    Version,
    /// Seed a small demo tree and print it
    Demo,
    /// List root records
    Roots,
    /// Create a root record
    Root {
        #[arg(long = "type")]
        node_type: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Insert a node under a parent
    Insert {
        #[arg(long, value_parser = parse_node_id)]
        parent: NodeId,
        #[arg(long = "type")]
        node_type: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_parser = parse_node_id)]
        prev: Option<NodeId>,
        #[arg(long, value_parser = parse_node_id)]
        next: Option<NodeId>,
    },
    /// Move sibling nodes as one block
    Move {
        #[arg(long, value_delimiter = ',', required = true, value_parser = parse_node_id)]
        ids: Vec<NodeId>,
        #[arg(long, value_parser = parse_node_id)]
        parent: NodeId,
        #[arg(long, value_parser = parse_node_id)]
        prev: Option<NodeId>,
        #[arg(long, value_parser = parse_node_id)]
        next: Option<NodeId>,
    },
    /// Move nodes by a drop gesture on a target node
    Drop {
        #[arg(long, value_delimiter = ',', required = true, value_parser = parse_node_id)]
        ids: Vec<NodeId>,
        #[arg(long, value_parser = parse_node_id)]
        target: NodeId,
        #[arg(long, value_enum, default_value = "after")]
        position: DropArg,
    },
    /// Regroup a subtree by type priority
    Sort {
        #[arg(value_parser = parse_node_id)]
        root: NodeId,
    },
    /// Print the nested subtree
    Tree {
        #[arg(value_parser = parse_node_id)]
        root: NodeId,
    },
    /// Verify one parent's sibling chain
    Check {
        #[arg(value_parser = parse_node_id)]
        parent: NodeId,
    },
    /// Rename a node
    Rename {
        #[arg(value_parser = parse_node_id)]
        id: NodeId,
        name: String,
    },
    /// Splice a node out and delete its subtree
    Remove {
        #[arg(value_parser = parse_node_id)]
        id: NodeId,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DropArg {
    Into,
    Before,
    After,
}

impl From<DropArg> for DropPosition {
    fn from(value: DropArg) -> Self {
        match value {
            DropArg::Into => Self::Into,
            DropArg::Before => Self::Before,
            DropArg::After => Self::After,
        }
    }
}

fn parse_node_id(raw: &str) -> Result<NodeId, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("`{raw}` is not an integer: {err}"))?;
    NodeId::new(value).ok_or_else(|| format!("node id must be positive, got {value}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> CliResult<()> {
    if let Some(log_dir) = &args.log_dir {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let config = match &args.config {
        Some(path) => TreeConfig::load(path)?,
        None => TreeConfig::default(),
    };
    let store = SqliteNodeStore::open(&args.db)?;
    let engine = TreeEngine::new(store, config)?;
    info!(
        "event=cli_start module=cli status=ok db={} command={:?}",
        args.db.display(),
        args.command
    );

    let output = match args.command {
        Command::Version => json!({ "version": core_version() }),
        Command::Demo => serde_json::to_value(seed_demo(&engine).await?)?,
        Command::Roots => serde_json::to_value(engine.list_roots().await?)?,
        Command::Root { node_type, name } => {
            let mut node = NewNode::new(NodeType::new(node_type));
            node.name = name;
            serde_json::to_value(engine.create_root(node).await?)?
        }
        Command::Insert {
            parent,
            node_type,
            name,
            content,
            prev,
            next,
        } => {
            let mut node = NewNode::new(NodeType::new(node_type));
            node.name = name;
            node.content = content;
            serde_json::to_value(engine.insert(node, Some(parent), prev, next).await?)?
        }
        Command::Move {
            ids,
            parent,
            prev,
            next,
        } => {
            engine.move_nodes(&ids, Some(parent), prev, next).await?;
            serde_json::to_value(engine.ordered_children(parent).await?)?
        }
        Command::Drop {
            ids,
            target,
            position,
        } => {
            let destination = engine.drop_target(target, position.into()).await?;
            engine.move_to(&ids, destination).await?;
            match destination.parent_id {
                Some(parent) => serde_json::to_value(engine.ordered_children(parent).await?)?,
                None => json!([]),
            }
        }
        Command::Sort { root } => {
            let root = engine.require_node(root).await?;
            serde_json::to_value(engine.sort(root).await?)?
        }
        Command::Tree { root } => serde_json::to_value(engine.assemble_from(root).await?)?,
        Command::Check { parent } => {
            let chain = engine.check_chain(parent).await?;
            json!({
                "parentId": parent,
                "ok": true,
                "order": chain.iter().map(|node| node.id).collect::<Vec<_>>(),
            })
        }
        Command::Rename { id, name } => {
            let update = NodeFieldsUpdate {
                name: Some(Some(name)),
                ..NodeFieldsUpdate::default()
            };
            serde_json::to_value(engine.update_fields(id, update).await?)?
        }
        Command::Remove { id } => json!({ "removed": engine.detach_and_remove(id).await? }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Root task with a nested task, a document and loose pages, left unsorted.
async fn seed_demo(engine: &TreeEngine<SqliteNodeStore>) -> CliResult<TreeNode> {
    let root = engine
        .create_root(NewNode::new(NodeType::task()).with_name("Workspace"))
        .await?;
    engine
        .append_child(root.id, NewNode::new(NodeType::page()).with_name("Readme"))
        .await?;
    let notes = engine
        .append_child(root.id, NewNode::new(NodeType::document()).with_name("Notes"))
        .await?;
    engine
        .append_child(notes.id, NewNode::new(NodeType::page()).with_name("Draft"))
        .await?;
    let plan = engine
        .append_child(root.id, NewNode::new(NodeType::task()).with_name("Plan"))
        .await?;
    for name in ["Research", "Write"] {
        engine
            .append_child(plan.id, NewNode::new(NodeType::task()).with_name(name))
            .await?;
    }
    Ok(engine.assemble(root).await?)
}

#[cfg(test)]
mod tests {
    use super::{parse_node_id, Args};
    use clap::Parser;

    #[test]
    fn node_ids_must_be_positive_integers() {
        assert_eq!(parse_node_id(" 7 ").unwrap().get(), 7);
        assert!(parse_node_id("0").is_err());
        assert!(parse_node_id("seven").is_err());
    }

    #[test]
    fn move_accepts_comma_separated_ids() {
        let args = Args::try_parse_from([
            "nodechain", "move", "--ids", "3,4", "--parent", "2", "--prev", "5",
        ])
        .unwrap();
        match args.command {
            super::Command::Move { ids, prev, next, .. } => {
                assert_eq!(ids.len(), 2);
                assert_eq!(prev.map(|id| id.get()), Some(5));
                assert!(next.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
