use std::io::Write;
use std::time::Duration;

use clap::{Parser, Subcommand};
use memfan::{LinkConfig, Replication, ReplicatedClient};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct App {
    /// Server used for reads and as the first write target.
    #[clap(long, global = true, default_value = "127.0.0.1:11211", env = "MEMFAN_LOCAL")]
    local: String,

    /// Additional servers which receive every write and delete.
    #[clap(long, global = true, value_delimiter = ',', env = "MEMFAN_REPLICAS")]
    replicas: Vec<String>,

    /// Seconds to wait when dialing each server.
    #[clap(long, global = true, default_value = "60")]
    connect_timeout: u64,

    #[clap(long, global = true, default_value = "warn", env = "MEMFAN_LOG")]
    log_level: tracing_subscriber::filter::LevelFilter,

    #[clap(subcommand)]
    subcmd: Action,
}

/// Actions that can be performed by the client.
#[derive(Debug, Subcommand)]
enum Action {
    /// Store a value on the local server and every replica.
    Set { key: String, value: String },

    /// Get a value from the local server.
    Get { key: String },

    /// Remove a value from the local server and every replica.
    #[clap(name = "rm")]
    Remove { key: String },
}

fn main() -> anyhow::Result<()> {
    let app = App::parse();
    tracing_subscriber::fmt()
        .with_max_level(app.log_level)
        .with_writer(std::io::stderr)
        .init();

    let config =
        LinkConfig::default().with_connect_timeout(Duration::from_secs(app.connect_timeout));
    let client = ReplicatedClient::connect_with(&app.local, config)?;
    client.add_replicas(&app.replicas)?;
    debug!(local = %app.local, replicas = ?app.replicas, "Client ready");

    match app.subcmd {
        Action::Set { key, value } => report(client.set(&key, value.as_bytes())),
        Action::Get { key } => match client.get(&key)? {
            Some(value) => {
                let mut stdout = std::io::stdout();
                stdout.write_all(&value)?;
                stdout.write_all(b"\n")?;
            }
            None => {
                println!("Key not found");
                std::process::exit(1);
            }
        },
        Action::Remove { key } => report(client.delete(&key)),
    }

    client.close_all()?;
    Ok(())
}

/// Print every failed target and exit with a failure when replication was incomplete.
fn report(replication: Replication) {
    if replication.is_complete() {
        return;
    }
    for (target, outcome) in replication.iter() {
        if let Err(e) = outcome {
            eprintln!("{}: {}", target, e);
        }
    }
    std::process::exit(1);
}
