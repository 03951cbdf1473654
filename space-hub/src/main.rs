use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use space_hub::render::{render_projection, render_tree};
use space_hub::store::JsonSpaceStore;
use space_hub_core::config::SessionConfig;
use space_hub_core::entity::{EntityKind, NewEntity};
use space_hub_core::filter::{Filters, TimeWindow};
use space_hub_core::projection::{DropRequest, Position};
use space_hub_core::service::ReorderDirection;
use space_hub_core::session::SpaceSession;
use space_hub_core::sort::SortMode;
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "space-hub")]
#[command(about = "Browse and rearrange a tree of documents and folders")]
struct Cli {
    /// Store file
    #[arg(long, env = "SPACE_HUB_DATA", default_value = "space.json")]
    data: PathBuf,

    /// Session settings as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List collections
    Collections,

    /// Create an empty collection
    NewCollection { name: String },

    /// Print the visible tree of a collection
    Tree {
        collection: String,

        /// default, alphabetical_asc, created_desc, ...
        #[arg(long)]
        sort: Option<String>,

        #[arg(long)]
        expand_all: bool,

        /// Only show entities by these authors (and their folders)
        #[arg(long)]
        author: Vec<String>,

        /// day, week, month or year
        #[arg(long)]
        within: Option<String>,
    },

    /// Create a document or folder
    Create {
        collection: String,
        title: String,

        #[arg(long)]
        parent: Option<Uuid>,

        #[arg(long)]
        folder: bool,

        #[arg(long, default_value = "")]
        author: String,
    },

    Rename {
        collection: String,
        id: Uuid,
        title: String,
    },

    /// Move to the trash
    Delete { collection: String, id: Uuid },

    /// Bring back from the trash
    Restore { collection: String, id: Uuid },

    /// List the trash
    Trash { collection: String },

    /// Re-parent, optionally next to a sibling
    Move {
        collection: String,
        id: Uuid,

        /// Target folder; omit for the root
        #[arg(long)]
        parent: Option<Uuid>,

        #[arg(long, conflicts_with = "after")]
        before: Option<Uuid>,

        #[arg(long)]
        after: Option<Uuid>,
    },

    /// Swap with the previous or next sibling
    Nudge {
        collection: String,
        id: Uuid,

        #[arg(long)]
        down: bool,
    },

    /// Show where a drag would drop, and optionally perform it
    Project {
        collection: String,

        #[arg(long)]
        dragged: Uuid,

        #[arg(long)]
        hovered: Uuid,

        #[arg(long)]
        pointer_y: Option<f32>,

        #[arg(long, default_value_t = 0.0)]
        offset_x: f32,

        #[arg(long)]
        expand_all: bool,

        #[arg(long)]
        apply: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let store = Arc::new(JsonSpaceStore::open(&cli.data)?);

    // the session keeps its state in Rc/RefCell, so drive it on a LocalSet
    let local = LocalSet::new();
    local.run_until(run(cli.command, store, config)).await
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(SessionConfig::default()),
    }
}

fn parse_window(s: &str) -> Result<TimeWindow> {
    match s {
        "day" => Ok(TimeWindow::Day),
        "week" => Ok(TimeWindow::Week),
        "month" => Ok(TimeWindow::Month),
        "year" => Ok(TimeWindow::Year),
        other => Err(anyhow!("unknown time window '{}'", other)),
    }
}

async fn open_session(
    store: &Arc<JsonSpaceStore>,
    config: &SessionConfig,
    collection: &str,
) -> Result<SpaceSession> {
    let collection_id = store
        .resolve_collection(collection)
        .await
        .ok_or_else(|| anyhow!("no collection named '{}'", collection))?;
    let session = SpaceSession::new(store.clone(), config.clone());
    session.select_collection(collection_id);
    session.load().await?;
    Ok(session)
}

async fn run(command: Commands, store: Arc<JsonSpaceStore>, config: SessionConfig) -> Result<()> {
    match command {
        Commands::Collections => {
            for (id, name) in store.collections().await {
                println!("{}  {}", id, name);
            }
        }
        Commands::NewCollection { name } => {
            let id = store.create_collection(&name).await?;
            println!("{}", id);
        }
        Commands::Tree {
            collection,
            sort,
            expand_all,
            author,
            within,
        } => {
            let session = open_session(&store, &config, &collection).await?;
            if let Some(sort) = sort {
                let mode = SortMode::parse(&sort).ok_or_else(|| anyhow!("unknown sort '{}'", sort))?;
                session.set_sort_mode(mode);
            }
            if !author.is_empty() || within.is_some() {
                session.set_filters(Filters {
                    time_window: within.as_deref().map(parse_window).transpose()?,
                    authors: author,
                });
            }
            if expand_all {
                session.expand_all();
            }
            // view flags are for this invocation only
            session.cancel_pending_writes();
            let flat = session.flatten();
            print!("{}", render_tree(&flat, &session.state()));
        }
        Commands::Create {
            collection,
            title,
            parent,
            folder,
            author,
        } => {
            let session = open_session(&store, &config, &collection).await?;
            let collection_id = session
                .collection_id()
                .ok_or_else(|| anyhow!("no collection selected"))?;
            let kind = if folder {
                EntityKind::Folder
            } else {
                EntityKind::Document
            };
            let entity = session
                .create_entity(NewEntity {
                    collection_id,
                    parent_id: parent,
                    kind,
                    title,
                    author,
                })
                .await?;
            session.cancel_pending_writes();
            println!("{}", entity.id);
        }
        Commands::Rename {
            collection,
            id,
            title,
        } => {
            let session = open_session(&store, &config, &collection).await?;
            let entity = session.rename(id, &title).await?;
            info!("renamed {} to {}", entity.id, entity.title());
        }
        Commands::Delete { collection, id } => {
            let session = open_session(&store, &config, &collection).await?;
            session.soft_delete(id).await?;
            session.refresh_trash_flag().await?;
        }
        Commands::Restore { collection, id } => {
            let session = open_session(&store, &config, &collection).await?;
            session.restore(id).await?;
        }
        Commands::Trash { collection } => {
            let session = open_session(&store, &config, &collection).await?;
            for entity in session.trash_content().await? {
                println!("{}  {}", entity.id, entity.title());
            }
        }
        Commands::Move {
            collection,
            id,
            parent,
            before,
            after,
        } => {
            let session = open_session(&store, &config, &collection).await?;
            let (reference, position) = match (before, after) {
                (Some(r), _) => (Some(r), Position::Before),
                (None, Some(r)) => (Some(r), Position::After),
                (None, None) => (None, Position::After),
            };
            session.move_to(id, parent, reference, Some(position)).await?;
        }
        Commands::Nudge {
            collection,
            id,
            down,
        } => {
            let session = open_session(&store, &config, &collection).await?;
            let direction = if down {
                ReorderDirection::Down
            } else {
                ReorderDirection::Up
            };
            session.reorder_adjacent(id, direction).await?;
        }
        Commands::Project {
            collection,
            dragged,
            hovered,
            pointer_y,
            offset_x,
            expand_all,
            apply,
        } => {
            let session = open_session(&store, &config, &collection).await?;
            if expand_all {
                session.expand_all();
                session.cancel_pending_writes();
            }
            let flat = session.flatten();
            let layout = session.layout(&flat);
            let mut request = DropRequest::new(dragged, hovered)
                .offset_x(offset_x)
                .layout(&layout);
            if let Some(y) = pointer_y {
                request = request.pointer_y(y);
            }
            match session.project_drop(request) {
                None => println!("no-op"),
                Some(projection) => {
                    println!("{}", render_projection(&projection));
                    if apply {
                        session.drop_projection(dragged, &projection).await?;
                    }
                }
            }
        }
    }
    Ok(())
}
