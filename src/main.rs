use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsdb_client::{ClientConfig, TsdbClient, TsdbClientBuilder};

#[derive(Parser, Debug)]
#[command(name = "tsdb-cli")]
#[command(about = "Command-line client for the time-series database WebSocket endpoint", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// WebSocket endpoint (e.g., ws://localhost:6041)
    #[arg(long, env = "TSDB_URL")]
    url: Option<String>,

    #[arg(short, long, env = "TSDB_USER")]
    user: Option<String>,

    #[arg(short, long, env = "TSDB_PASSWORD")]
    password: Option<String>,

    /// Default database
    #[arg(short, long, env = "TSDB_DATABASE")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server version
    Version,
    /// Run a statement and print the affected row count
    Exec { sql: String },
    /// Run a query and print the result set summary
    Query { sql: String },
}

impl Args {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if self.database.is_some() {
            config.database = self.database.clone();
        }
        Ok(config)
    }
}

async fn run(client: &TsdbClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Version => println!("{}", client.version().await?),
        Command::Exec { sql } => {
            let affected = client.exec(&sql).await?;
            println!("{} row(s) affected", affected);
        }
        Command::Query { sql } => {
            let result = client.query(&sql).await?;
            println!("{}", result.fields.join("\t"));
            let mut rows = 0;
            while let Some(block) = client.next_block(&result).await? {
                rows += block.rows();
            }
            client.free_result(result.id).await?;
            println!("{} row(s) in set", rows);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tsdb_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.client_config()?;
    tracing::debug!(url = %config.url, "connecting");
    let client = TsdbClientBuilder::from_config(config).build().await?;

    let outcome = run(&client, args.command).await;
    client.close().await;
    outcome
}
