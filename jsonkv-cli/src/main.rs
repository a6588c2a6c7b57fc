use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jsonkv_core::logging::{init_logging_with_config, LogConfig};
use jsonkv_core::{ClearOutcome, Config, LocalStore};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(name = "jsonkv")]
#[command(author, version, about = "Embedded JSON file key-value store", long_about = None)]
struct Args {
    /// Directory holding database.json (overrides config and environment)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a new entry
    Create {
        key: String,
        /// JSON value; anything that is not valid JSON is stored as a string
        value: String,
        /// Seconds until the entry expires
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Print the value of a live entry
    Read { key: String },
    /// Remove a live entry
    Delete { key: String },
    /// Remove every entry
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print every key and value, expired entries included
    List,
    /// Print entry counts and file size
    Stats,
    /// Remove expired entries
    Purge,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    if let Some(dir) = &args.dir {
        config.store.directory = dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config.validate()?;

    init_logging_with_config(LogConfig::from_settings(&config.logging)?)?;

    let dir = config.store.directory.display();
    let store = LocalStore::open(config.store.clone())
        .with_context(|| format!("opening store in {}", dir))?;
    debug!(path = %store.path().display(), "Store ready");

    run(&store, args.command)
}

fn run(store: &LocalStore, command: Command) -> Result<()> {
    match command {
        Command::Create { key, value, ttl } => {
            store.create(&key, parse_value(&value), ttl)?;
            println!("Value added");
        }
        Command::Read { key } => {
            println!("{}", store.read(&key)?);
        }
        Command::Delete { key } => {
            store.delete(&key)?;
            println!("Deleted {}", key);
        }
        Command::Clear { yes } => {
            let confirmed = yes || confirm("Are you sure you want to clear the datastore? (y/n) ")?;
            match store.clear_all(confirmed)? {
                ClearOutcome::Cleared { removed } => println!("Data cleared ({} entries)", removed),
                ClearOutcome::NotCleared => println!("Data not cleared"),
            }
        }
        Command::List => {
            let all = store.display_all()?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        Command::Stats => {
            let stats = store.stats()?;
            println!("entries:  {}", stats.entries);
            println!("live:     {}", stats.live_entries);
            println!("expired:  {}", stats.expired_entries);
            println!("file:     {} bytes", stats.file_size_bytes);
        }
        Command::Purge => {
            let removed = store.purge_expired()?;
            println!("Purged {} expired entries", removed);
        }
    }

    Ok(())
}

/// Parse as JSON, falling back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        warn!("No confirmation received on stdin");
        return Ok(false);
    }

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value(r#"{"a":1}"#), json!({ "a": 1 }));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
        assert_eq!(parse_value("hello world"), json!("hello world"));
        assert_eq!(parse_value(""), json!(""));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "jsonkv", "--dir", "/tmp/x", "create", "k", "v", "--ttl", "5",
        ])
        .unwrap();
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/x")));
        match args.command {
            Command::Create { key, value, ttl } => {
                assert_eq!(key, "k");
                assert_eq!(value, "v");
                assert_eq!(ttl, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
