//! tasknest
//!
//! Todo task service whose task hierarchy is guarded against cross-user
//! parent references.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use tasknest::cli::{Cli, Command};
use tasknest::config::Config;
use tasknest::http;
use tasknest::seed::{format_status, seed_basic_data};
use tasknest::store::Database;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    // RUST_LOG wins over --verbose when set.
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()))
    };

    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("opening log file {}", filename))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(ref db_path) = cli.database {
        config.server.db_path = db_path.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

fn open_database(config: &Config) -> Result<Database> {
    config.ensure_db_dir()?;
    info!("Database: {:?}", config.server.db_path);
    Database::open(&config.server.db_path)
        .with_context(|| format!("opening database {}", config.server.db_path.display()))
}

async fn serve(config: &Config) -> Result<()> {
    let db = Arc::new(open_database(config)?);

    let ip: IpAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.server.bind))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let handle = http::start_server(db, addr, &config.cors).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    handle.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Seed => {
            let db = open_database(&config)?;
            let report = seed_basic_data(&db)?;
            println!(
                "Seeded {} users and {} tasks",
                report.users.len(),
                report.tasks_created
            );
            for user in &report.users {
                println!("  {} <{}> ({})", user.name, user.email, user.id);
            }
            Ok(())
        }
        Command::Status => {
            let db = open_database(&config)?;
            db.ping().context("database is not reachable")?;
            print!("{}", format_status(&db.list_users()?, &db.counts()?));
            Ok(())
        }
    }
}
