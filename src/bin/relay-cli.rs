use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use tracing_subscriber::EnvFilter;

use support_relay::config::{load_dotenv, load_storage_from, ConfigError, StorageConfig};
use support_relay::store::MappingStore;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Inspect and edit the support relay's user/topic mappings", long_about = None)]
struct Cli {
    /// Directory holding the database (defaults to $DATA_DIR, then "data")
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Database file name (defaults to $DB_NAME, then "database.db")
    #[arg(long)]
    db_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up the topic assigned to a user
    GetTopic {
        #[arg(long)]
        user: i64,
    },
    /// Look up the user behind a topic
    GetUser {
        #[arg(long)]
        topic: i64,
    },
    /// Assign a topic to a user, replacing any previous assignment
    Link {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        topic: i64,
    },
    /// Remove a user's mapping
    Unlink {
        #[arg(long)]
        user: i64,
    },
    /// Show mapping count and store counters
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Warnings and store errors go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    load_dotenv();
    let storage = match storage_config(&cli) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return Err(e.into());
        }
    };
    let store = MappingStore::new(&storage);
    store.initialize().await?;

    let result = execute(&store, cli.command).await;
    store.close().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(store: &MappingStore, command: Commands) -> Result<Value, Box<dyn std::error::Error>> {
    let output = match command {
        Commands::GetTopic { user } => match store.get_mapping(user).await? {
            Some(record) => serde_json::to_value(record)?,
            None => json!({ "user_id": user, "topic_id": null }),
        },
        Commands::GetUser { topic } => {
            let user = store.get_user_by_topic(topic).await?;
            json!({ "topic_id": topic, "user_id": user })
        }
        Commands::Link { user, topic } => {
            store.create_user_topic(user, topic).await?;
            json!({ "user_id": user, "topic_id": topic, "linked": true })
        }
        Commands::Unlink { user } => {
            let removed = store.delete_user_topic(user).await?;
            json!({ "user_id": user, "removed": removed })
        }
        Commands::Stats => {
            let mappings = store.count_mappings().await?;
            json!({
                "database": store.path().display().to_string(),
                "mappings": mappings,
                "store": store.stats(),
            })
        }
    };
    Ok(output)
}

/// Storage settings from the environment, with command-line flags taking
/// precedence over `DATA_DIR` and `DB_NAME`.
fn storage_config(cli: &Cli) -> Result<StorageConfig, ConfigError> {
    let data_dir = cli.data_dir.as_ref().map(|dir| dir.display().to_string());
    let mut storage = load_storage_from(|key| match key {
        "DATA_DIR" if data_dir.is_some() => data_dir.clone(),
        "DB_NAME" if cli.db_name.is_some() => cli.db_name.clone(),
        _ => std::env::var(key).ok(),
    })?;
    // One operation at a time; a single slot is enough.
    storage.max_connections = 1;
    Ok(storage)
}
