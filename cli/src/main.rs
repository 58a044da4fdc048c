mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use clap_derive::{Parser, Subcommand};
use config::{load_env_file, PathManager, Settings};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use threadkeep_core::{
    ChatSession, DataLayer, DataLayerOptions, Feedback, FeedbackId, InputBar, MemoryStorageClient,
    Pagination, SqliteDataLayer, StepId, ThreadFilter, ThreadId, User,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and edit persisted chat threads", long_about = None)]
struct Args {
    /// SQLite database to use instead of the configured one
    #[arg(long, env = "THREADKEEP_DB", global = true)]
    db: Option<PathBuf>,

    /// Directory for the default database, payloads and settings
    #[arg(long, env = "THREADKEEP_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, short, global = true)]
    tracing: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Users
    #[command(subcommand)]
    User(UserCommand),
    /// Threads
    #[command(subcommand)]
    Thread(ThreadCommand),
    /// Feedback on steps
    #[command(subcommand)]
    Feedback(FeedbackCommand),
    /// Settings file
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the demo widget bar, optionally applying `id=value` changes
    Widgets {
        #[arg(long = "change")]
        changes: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create a user or merge metadata into an existing one
    Create {
        identifier: String,
        /// Metadata entries as key=value (value parsed as JSON when possible)
        #[arg(long = "meta")]
        metadata: Vec<String>,
    },
    Get {
        identifier: String,
    },
}

#[derive(Subcommand, Debug)]
enum ThreadCommand {
    /// List a user's threads, newest first
    List {
        /// User identifier
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 20)]
        first: usize,
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        feedback: Option<i64>,
    },
    Show {
        thread_id: String,
    },
    Delete {
        thread_id: String,
    },
    Author {
        thread_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum FeedbackCommand {
    Set {
        step_id: String,
        value: i64,
        #[arg(long)]
        comment: Option<String>,
        /// Update this feedback instead of creating one
        #[arg(long)]
        id: Option<String>,
    },
    Delete {
        feedback_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Write the effective settings to the settings file
    Save {
        /// Maximum threads loaded per user (0 for unlimited)
        #[arg(long)]
        thread_limit: Option<u32>,
        #[arg(long)]
        storage_base_url: Option<String>,
    },
}

fn setup_tracing(enable: bool) -> Result<()> {
    let level = if enable { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `key=value` pairs; values that parse as JSON are kept as JSON
fn parse_pairs(pairs: &[String]) -> Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, raw) = pair
                .split_once('=')
                .with_context(|| format!("Expected key=value, got {}", pair))?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}

fn open_layer(db: Option<PathBuf>) -> Result<SqliteDataLayer> {
    PathManager::ensure_dirs_exist().context("Failed to create data directories")?;
    let mut settings = Settings::load();
    if let Some(db) = db {
        settings.database_path = Some(db);
    }
    SqliteDataLayer::from_settings(&settings)
}

async fn run_user(layer: &SqliteDataLayer, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::Create {
            identifier,
            metadata,
        } => {
            let user = User {
                identifier,
                metadata: parse_pairs(&metadata)?,
            };
            print_json(&layer.create_user(&user).await?)
        }
        UserCommand::Get { identifier } => match layer.get_user(&identifier).await? {
            Some(user) => print_json(&user),
            None => anyhow::bail!("No user {}", identifier),
        },
    }
}

async fn run_thread(layer: &SqliteDataLayer, command: ThreadCommand) -> Result<()> {
    match command {
        ThreadCommand::List {
            user,
            first,
            after,
            search,
            feedback,
        } => {
            let persisted = layer
                .get_user(&user)
                .await?
                .with_context(|| format!("No user {}", user))?;
            let mut pagination = Pagination::first(first);
            pagination.cursor = after;
            let filter = ThreadFilter {
                user_id: Some(persisted.id),
                search,
                feedback,
            };
            let page = layer.list_threads(&pagination, &filter).await?;
            for thread in &page.data {
                println!(
                    "{}  {}  {}",
                    thread.id,
                    thread.created_at.as_deref().unwrap_or("-"),
                    thread.name.as_deref().unwrap_or("(unnamed)")
                );
            }
            if let (true, Some(cursor)) = (page.page_info.has_next_page, &page.page_info.end_cursor) {
                println!("more: --after {}", cursor);
            }
            Ok(())
        }
        ThreadCommand::Show { thread_id } => {
            match layer.get_thread(&ThreadId::from(thread_id.as_str())).await? {
                Some(thread) => print_json(&thread),
                None => anyhow::bail!("No thread {}", thread_id),
            }
        }
        ThreadCommand::Delete { thread_id } => {
            layer.delete_thread(&ThreadId::from(thread_id)).await?;
            println!("deleted");
            Ok(())
        }
        ThreadCommand::Author { thread_id } => {
            println!("{}", layer.get_thread_author(&ThreadId::from(thread_id)).await?);
            Ok(())
        }
    }
}

async fn run_feedback(layer: &SqliteDataLayer, command: FeedbackCommand) -> Result<()> {
    match command {
        FeedbackCommand::Set {
            step_id,
            value,
            comment,
            id,
        } => {
            let mut feedback = Feedback::new(StepId::from(step_id), value);
            feedback.comment = comment;
            feedback.id = id.map(FeedbackId::from);
            println!("{}", layer.upsert_feedback(&feedback).await?);
            Ok(())
        }
        FeedbackCommand::Delete { feedback_id } => {
            layer.delete_feedback(&FeedbackId::from(feedback_id)).await?;
            println!("deleted");
            Ok(())
        }
    }
}

fn run_config(command: ConfigCommand) -> Result<()> {
    let mut settings = Settings::load();
    match command {
        ConfigCommand::Show => print_json(&settings),
        ConfigCommand::Save {
            thread_limit,
            storage_base_url,
        } => {
            if let Some(limit) = thread_limit {
                settings.user_thread_limit = limit;
            }
            if storage_base_url.is_some() {
                settings.storage_base_url = storage_base_url;
            }
            settings.save().map_err(anyhow::Error::msg)?;
            if let Some(path) = PathManager::settings_path() {
                println!("saved {}", path.display());
            }
            Ok(())
        }
    }
}

/// Push the demo widgets through a throwaway session and print what the
/// client would receive
async fn run_widgets(changes: Vec<String>) -> Result<()> {
    let layer = SqliteDataLayer::in_memory(
        DataLayerOptions::default().with_storage(Arc::new(MemoryStorageClient::new())),
    )?;
    let (mut session, mut events) = ChatSession::new(Arc::new(layer), ThreadId::new());

    InputBar::set_widgets(&mut session, demo::widgets())?;
    while let Ok(event) = events.try_recv() {
        println!("{}: {}", event.name(), serde_json::to_string_pretty(&event.payload())?);
    }

    for (id, value) in parse_pairs(&changes)? {
        session
            .handle_widget_change(&serde_json::json!({ "id": id, "value": value }))
            .await;
    }

    if !changes.is_empty() {
        println!("Current widget values:");
        for id in demo::WIDGET_IDS {
            let value = session
                .user_value(id)
                .map(Value::to_string)
                .unwrap_or_else(|| "Not set".to_string());
            println!("- {}: {}", id, value);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let args = Args::parse();
    setup_tracing(args.tracing)?;
    if let Some(dir) = args.data_dir.clone() {
        PathManager::set_data_dir(dir);
    }

    match args.command {
        Command::Config(command) => run_config(command),
        Command::Widgets { changes } => run_widgets(changes).await,
        Command::User(command) => run_user(&open_layer(args.db)?, command).await,
        Command::Thread(command) => run_thread(&open_layer(args.db)?, command).await,
        Command::Feedback(command) => run_feedback(&open_layer(args.db)?, command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs_keeps_json() {
        let pairs = parse_pairs(&["n=3".to_string(), "name=bob".to_string(), "on=true".to_string()])
            .unwrap();
        assert_eq!(pairs["n"], Value::from(3));
        assert_eq!(pairs["name"], Value::from("bob"));
        assert_eq!(pairs["on"], Value::Bool(true));
        assert!(parse_pairs(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_args_parse_nested_commands() {
        let args = Args::try_parse_from(["threadkeep", "--db", "x.db", "thread", "list", "--user", "amy"])
            .unwrap();
        assert_eq!(args.db, Some(PathBuf::from("x.db")));
        assert!(matches!(args.command, Command::Thread(ThreadCommand::List { ref user, first: 20, .. }) if user == "amy"));
    }

    #[test]
    fn test_args_parse_config_save() {
        let args = Args::try_parse_from(["threadkeep", "config", "save", "--thread-limit", "0"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Config(ConfigCommand::Save { thread_limit: Some(0), storage_base_url: None })
        ));
    }

    #[test]
    fn test_demo_widgets_are_valid() {
        let widgets = demo::widgets();
        assert_eq!(widgets.len(), demo::WIDGET_IDS.len());
        assert!(widgets.iter().all(|w| w.validate().is_ok()));
    }
}
